//! Bit strings for sifted, corrected and final keys.
//!
//! Text form is a run of `0`/`1` characters. Byte packing is MSB-first with the
//! final byte zero-padded. Key bits are wiped when the string is dropped.

use crate::error::{Bb84Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use zeroize::Zeroize;

#[derive(Clone, PartialEq, Eq, Default, Hash)]
pub struct BitString(Vec<bool>);

impl BitString {
    pub fn new(bits: Vec<bool>) -> Self {
        BitString(bits)
    }

    pub fn bits(&self) -> &[bool] {
        &self.0
    }

    pub fn into_bits(mut self) -> Vec<bool> {
        std::mem::take(&mut self.0)
    }

    /// Bits from `offset` onwards; empty when `offset` is past the end.
    pub fn tail(&self, offset: usize) -> &[bool] {
        self.0.get(offset..).unwrap_or(&[])
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        bits_to_bytes(&self.0)
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        BitString(bytes_to_bits(bytes))
    }

    pub fn count_ones(&self) -> usize {
        self.0.iter().filter(|&&bit| bit).count()
    }
}

pub fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; (bits.len() + 7) / 8];
    for (index, bit) in bits.iter().enumerate() {
        if *bit {
            bytes[index / 8] |= 1 << (7 - index % 8);
        }
    }
    bytes
}

pub fn bytes_to_bits(bytes: &[u8]) -> Vec<bool> {
    bytes
        .iter()
        .flat_map(|&byte| (0..8).rev().map(move |i| byte & (1 << i) != 0))
        .collect()
}

impl Drop for BitString {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl Deref for BitString {
    type Target = [bool];

    fn deref(&self) -> &[bool] {
        &self.0
    }
}

impl From<Vec<bool>> for BitString {
    fn from(bits: Vec<bool>) -> Self {
        BitString(bits)
    }
}

impl From<&[bool]> for BitString {
    fn from(bits: &[bool]) -> Self {
        BitString(bits.to_vec())
    }
}

impl FromIterator<bool> for BitString {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        BitString(iter.into_iter().collect())
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &bit in &self.0 {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

// Never print key bits through Debug.
impl fmt::Debug for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitString({} bits)", self.0.len())
    }
}

impl FromStr for BitString {
    type Err = Bb84Error;

    fn from_str(s: &str) -> Result<Self> {
        s.chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(Bb84Error::Configuration(format!(
                    "invalid character {:?} in bit string",
                    other
                ))),
            })
            .collect()
    }
}

// The HTTP boundary ships keys as JSON arrays of 0/1.
impl Serialize for BitString {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(|&bit| bit as u8))
    }
}

impl<'de> Deserialize<'de> for BitString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Digits(Vec<u8>),
            Text(String),
        }

        match Wire::deserialize(deserializer)? {
            Wire::Digits(digits) => digits
                .into_iter()
                .map(|d| match d {
                    0 => Ok(false),
                    1 => Ok(true),
                    other => Err(serde::de::Error::custom(format!(
                        "bit value out of range: {}",
                        other
                    ))),
                })
                .collect(),
            Wire::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_form() {
        let key: BitString = "1011 0001".parse().unwrap();
        assert_eq!(key.len(), 8);
        assert_eq!(key.to_string(), "10110001");
        assert!("10a1".parse::<BitString>().is_err());
    }

    #[test]
    fn test_msb_first_packing() {
        let key: BitString = "0100000101".parse().unwrap();
        assert_eq!(key.to_bytes(), vec![0x41, 0x40]);
        let back = BitString::from_bytes(&[0x41]);
        assert_eq!(back.to_string(), "01000001");
    }

    #[test]
    fn test_tail_past_end_is_empty() {
        let key: BitString = "101".parse().unwrap();
        assert_eq!(key.tail(1), &[false, true]);
        assert!(key.tail(3).is_empty());
        assert!(key.tail(10).is_empty());
    }

    #[test]
    fn test_json_accepts_digits_and_text() {
        let key: BitString = serde_json::from_str("[1,0,1,1]").unwrap();
        assert_eq!(key.to_string(), "1011");
        let key: BitString = serde_json::from_str("\"0110\"").unwrap();
        assert_eq!(key.to_string(), "0110");
        assert!(serde_json::from_str::<BitString>("[2]").is_err());
        assert_eq!(serde_json::to_string(&key).unwrap(), "[0,1,1,0]");
    }

    #[test]
    fn test_debug_hides_bits() {
        let key: BitString = "1111".parse().unwrap();
        assert_eq!(format!("{:?}", key), "BitString(4 bits)");
    }
}
