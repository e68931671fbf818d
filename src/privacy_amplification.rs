//! Privacy amplification: compress the corrected key into a shorter final key.
//!
//! Every amplifier returns `max(1, floor(0.6 * n))` bits for an `n`-bit input
//! (none for an empty input) and is a pure function of its input and its own
//! parameters.

use crate::key_material::{bits_to_bytes, bytes_to_bits, BitString};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ring::hmac;
use serde::{Deserialize, Serialize};

/// Inputs longer than this are truncated before mixing.
pub const MAX_PROCESSED_BITS: usize = 2000;

pub trait PrivacyAmplifier: Send + Sync {
    fn amplify(&self, key: &BitString) -> BitString;

    fn name(&self) -> &'static str;
}

/// `max(1, floor(0.6 * len))`, or 0 for an empty key.
pub fn target_length(len: usize) -> usize {
    if len == 0 {
        0
    } else {
        std::cmp::max(1, len * 3 / 5)
    }
}

fn processed(key: &BitString) -> &[bool] {
    &key[..key.len().min(MAX_PROCESSED_BITS)]
}

/// Strided parity mixing. Output bit `i` XORs the input bits at
/// `i mod s, i mod s + s, ...` (stride `s = m / 50 + 1`), each masked by the
/// Thue-Morse bit of `i + j + 1`.
///
/// Not a vetted extractor; use [`HmacExtractor`] when it matters. On very
/// short keys some input bits get a zero weight for every output bit: a 3-bit
/// key yields one output bit and its last input bit never reaches it.
#[derive(Debug, Clone, Copy, Default)]
pub struct StridedParity;

fn thue_morse(n: usize) -> bool {
    n.count_ones() % 2 == 1
}

impl PrivacyAmplifier for StridedParity {
    fn amplify(&self, key: &BitString) -> BitString {
        let input = processed(key);
        let m = input.len();
        let stride = m / 50 + 1;

        (0..target_length(key.len()))
            .map(|i| {
                (i % stride..m)
                    .step_by(stride)
                    .fold(false, |acc, j| acc ^ (input[j] & thue_morse(i + j + 1)))
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "strided-parity"
    }
}

/// Toeplitz-matrix hashing with a matrix drawn from `seed`.
#[derive(Debug, Clone, Copy)]
pub struct ToeplitzHash {
    pub seed: u64,
}

impl ToeplitzHash {
    /// Diagonal-constant matrix: `T[i][j] = diagonal[i + m - 1 - j]`.
    fn generate_toeplitz_diagonal(&self, rows: usize, cols: usize) -> Vec<bool> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        (0..(rows + cols).saturating_sub(1)).map(|_| rng.gen()).collect()
    }
}

impl PrivacyAmplifier for ToeplitzHash {
    fn amplify(&self, key: &BitString) -> BitString {
        let input = processed(key);
        let m = input.len();
        let rows = target_length(key.len());
        let diagonal = self.generate_toeplitz_diagonal(rows, m);

        (0..rows)
            .map(|i| {
                input.iter().enumerate().fold(false, |hash_bit, (j, &key_bit)| {
                    hash_bit ^ (key_bit & diagonal[i + m - 1 - j])
                })
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "toeplitz"
    }
}

/// HMAC-SHA256 in counter mode over the packed key.
#[derive(Debug, Clone)]
pub struct HmacExtractor {
    pub salt: Vec<u8>,
}

impl HmacExtractor {
    pub fn new(salt: impl Into<Vec<u8>>) -> Self {
        HmacExtractor { salt: salt.into() }
    }
}

impl PrivacyAmplifier for HmacExtractor {
    fn amplify(&self, key: &BitString) -> BitString {
        let target = target_length(key.len());
        let mac_key = hmac::Key::new(hmac::HMAC_SHA256, &self.salt);
        let packed = bits_to_bytes(processed(key));
        // The bit length disambiguates keys that differ only in trailing zeros.
        let bit_len = (key.len() as u64).to_be_bytes();

        let mut out = Vec::with_capacity(target + 256);
        let mut counter: u32 = 0;
        while out.len() < target {
            let mut ctx = hmac::Context::with_key(&mac_key);
            ctx.update(&packed);
            ctx.update(&bit_len);
            ctx.update(&counter.to_be_bytes());
            out.extend(bytes_to_bits(ctx.sign().as_ref()));
            counter += 1;
        }
        out.truncate(target);
        BitString::new(out)
    }

    fn name(&self) -> &'static str {
        "hmac"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmplifierKind {
    #[default]
    StridedParity,
    Toeplitz,
    Hmac,
}

impl AmplifierKind {
    /// `seed` feeds the Toeplitz matrix and the HMAC salt.
    pub fn build(self, seed: u64) -> Box<dyn PrivacyAmplifier> {
        match self {
            AmplifierKind::StridedParity => Box::new(StridedParity),
            AmplifierKind::Toeplitz => Box::new(ToeplitzHash { seed }),
            AmplifierKind::Hmac => Box::new(HmacExtractor::new(seed.to_be_bytes())),
        }
    }
}

/// Default amplification.
pub fn amplify(corrected_key: &BitString) -> BitString {
    StridedParity.amplify(corrected_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    fn random_key(len: usize, seed: u64) -> BitString {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| rng.gen()).collect()
    }

    fn amplifiers() -> Vec<Box<dyn PrivacyAmplifier>> {
        vec![
            AmplifierKind::StridedParity.build(7),
            AmplifierKind::Toeplitz.build(7),
            AmplifierKind::Hmac.build(7),
        ]
    }

    #[test]
    fn test_target_length() {
        assert_eq!(target_length(0), 0);
        assert_eq!(target_length(1), 1);
        assert_eq!(target_length(2), 1);
        assert_eq!(target_length(5), 3);
        assert_eq!(target_length(12), 7);
        assert_eq!(target_length(1000), 600);
    }

    #[test]
    fn test_length_contract_for_all_amplifiers() {
        for amplifier in amplifiers() {
            for len in [0, 1, 2, 3, 7, 49, 50, 51, 333, 1000, 2500] {
                let key = random_key(len, len as u64);
                assert_eq!(
                    amplifier.amplify(&key).len(),
                    target_length(len),
                    "{} with {} bits",
                    amplifier.name(),
                    len
                );
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let key = random_key(300, 1);
        for amplifier in amplifiers() {
            assert_eq!(amplifier.amplify(&key), amplifier.amplify(&key));
        }
        assert_eq!(amplify(&key), amplify(&key.clone()));
    }

    #[test]
    fn test_single_bit_input_is_used() {
        let zero: BitString = "0".parse().unwrap();
        let one: BitString = "1".parse().unwrap();
        assert_ne!(amplify(&zero), amplify(&one));
    }

    #[test]
    fn test_outputs_vary_across_positions() {
        let key = random_key(200, 5);
        let out = amplify(&key);
        assert!(out.count_ones() > 0 && out.count_ones() < out.len());
    }

    #[test]
    fn test_input_change_changes_output() {
        let key = random_key(120, 9);
        let mut flipped = key.clone().into_bits();
        flipped[0] = !flipped[0];
        let flipped = BitString::new(flipped);
        for amplifier in amplifiers() {
            assert_ne!(
                amplifier.amplify(&key),
                amplifier.amplify(&flipped),
                "{}",
                amplifier.name()
            );
        }
    }

    #[test]
    fn test_short_key_zero_weight_position() {
        let key = |text: &str| text.parse::<BitString>().unwrap();
        assert_eq!(amplify(&key("000")), amplify(&key("001")));
        assert_ne!(amplify(&key("000")), amplify(&key("100")));
        assert_ne!(amplify(&key("000")), amplify(&key("010")));
    }

    #[test]
    fn test_toeplitz_seed_matters() {
        let key = random_key(100, 3);
        assert_ne!(
            ToeplitzHash { seed: 1 }.amplify(&key),
            ToeplitzHash { seed: 2 }.amplify(&key)
        );
    }

    #[test]
    fn test_hmac_matches_reference() {
        let key: BitString = "10110011".parse().unwrap();
        let extractor = HmacExtractor::new(b"salt".to_vec());
        let mac_key = hmac::Key::new(hmac::HMAC_SHA256, b"salt");
        let mut msg = vec![0b1011_0011u8];
        msg.extend_from_slice(&8u64.to_be_bytes());
        msg.extend_from_slice(&0u32.to_be_bytes());
        let expected = bytes_to_bits(hmac::sign(&mac_key, &msg).as_ref());
        assert_eq!(extractor.amplify(&key).bits(), &expected[..4]);
    }
}
