//! Encryption with the distilled key.
//!
//! Two modes:
//!
//! - **One-time pad**: UTF-8 plaintext bits XORed against key bits. A message
//!   longer than the remaining key is refused outright; key bits are never
//!   wrapped or reused.
//! - **Derived AEAD**: SHA-256 over the key's `0`/`1` text gives an AES-256-GCM
//!   key. Each encryption draws a fresh 96-bit nonce which is prepended to the
//!   ciphertext.
//!
//! Ciphertexts cross the API as upper-case hex.

use crate::error::{Bb84Error, Result};
use crate::key_material::{bits_to_bytes, BitString};
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use log::debug;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

pub const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CipherMode {
    #[default]
    OneTimePad,
    DerivedAead,
}

pub fn message_bit_len(message: &str) -> usize {
    message.len() * 8
}

/// XORs `message` against the leading bits of `key`.
pub fn otp_encrypt(message: &str, key: &[bool]) -> Result<Vec<u8>> {
    let required = message_bit_len(message);
    if required > key.len() {
        return Err(Bb84Error::InsufficientKeyMaterial {
            required,
            available: key.len(),
        });
    }
    Ok(xor_with_key(message.as_bytes(), &key[..required]))
}

pub fn otp_decrypt(ciphertext: &[u8], key: &[bool]) -> Result<String> {
    let required = ciphertext.len() * 8;
    if required > key.len() {
        return Err(Bb84Error::InsufficientKeyMaterial {
            required,
            available: key.len(),
        });
    }
    let plain = xor_with_key(ciphertext, &key[..required]);
    String::from_utf8(plain)
        .map_err(|_| Bb84Error::MalformedCiphertext("plaintext is not valid UTF-8".into()))
}

fn xor_with_key(data: &[u8], key: &[bool]) -> Vec<u8> {
    let pad = Zeroizing::new(bits_to_bytes(key));
    data.iter().zip(pad.iter()).map(|(d, k)| d ^ k).collect()
}

/// SHA-256 over the key's `0`/`1` text.
pub fn derive_aead_key(final_key: &BitString) -> Zeroizing<[u8; 32]> {
    let text = Zeroizing::new(final_key.to_string());
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    Zeroizing::new(hasher.finalize().into())
}

/// Returns `nonce || ciphertext || tag`.
pub fn aead_encrypt<R: RngCore + CryptoRng>(
    key: &[u8; 32],
    plaintext: &[u8],
    rng: &mut R,
) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| Bb84Error::EncryptionFailure("plaintext too long for AES-GCM".into()))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

pub fn aead_decrypt(key: &[u8; 32], sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(Bb84Error::MalformedCiphertext(format!(
            "{} bytes is shorter than nonce and tag",
            sealed.len()
        )));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| Bb84Error::AuthenticationFailure)
}

/// Stateless encryption as served at the cipher boundary. The one-time pad
/// always starts at bit 0 of `key`.
pub fn encrypt(message: &str, key: &BitString, mode: CipherMode) -> Result<String> {
    let bytes = match mode {
        CipherMode::OneTimePad => otp_encrypt(message, key)?,
        CipherMode::DerivedAead => {
            require_key(key)?;
            aead_encrypt(&derive_aead_key(key), message.as_bytes(), &mut OsRng)?
        }
    };
    Ok(hex::encode_upper(bytes))
}

pub fn decrypt(cipher_text: &str, key: &BitString, mode: CipherMode) -> Result<String> {
    let bytes = hex::decode(cipher_text.trim())?;
    match mode {
        CipherMode::OneTimePad => otp_decrypt(&bytes, key),
        CipherMode::DerivedAead => {
            require_key(key)?;
            let plain = aead_decrypt(&derive_aead_key(key), &bytes)?;
            String::from_utf8(plain)
                .map_err(|_| Bb84Error::MalformedCiphertext("plaintext is not valid UTF-8".into()))
        }
    }
}

fn require_key(key: &BitString) -> Result<()> {
    if key.is_empty() {
        Err(Bb84Error::InsufficientKeyMaterial {
            required: 1,
            available: 0,
        })
    } else {
        Ok(())
    }
}

/// Result of one encryption inside a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sealed {
    pub cipher_text: String,
    /// First key bit used by the pad; always 0 for AEAD.
    pub key_offset: usize,
    pub bits_used: usize,
    pub key_remaining: usize,
}

/// Cipher bound to one session's final key.
///
/// In one-time-pad mode the key is consumed front to back: each message takes
/// the next unused bits, so two messages never share pad bits.
pub struct KeyDerivedCipher {
    mode: CipherMode,
    final_key: BitString,
    aead_key: Option<Zeroizing<[u8; 32]>>,
    bits_consumed: usize,
}

impl KeyDerivedCipher {
    pub fn new(final_key: BitString, mode: CipherMode) -> Result<Self> {
        require_key(&final_key)?;
        let aead_key = match mode {
            CipherMode::OneTimePad => None,
            CipherMode::DerivedAead => Some(derive_aead_key(&final_key)),
        };
        Ok(KeyDerivedCipher {
            mode,
            final_key,
            aead_key,
            bits_consumed: 0,
        })
    }

    pub fn mode(&self) -> CipherMode {
        self.mode
    }

    pub fn final_key(&self) -> &BitString {
        &self.final_key
    }

    pub fn bits_remaining(&self) -> usize {
        match self.mode {
            CipherMode::OneTimePad => self.final_key.len() - self.bits_consumed,
            CipherMode::DerivedAead => self.final_key.len(),
        }
    }

    pub fn encrypt(&mut self, message: &str) -> Result<Sealed> {
        self.encrypt_with_rng(message, &mut OsRng)
    }

    /// Same as [`encrypt`](Self::encrypt) with a caller-supplied nonce source.
    pub fn encrypt_with_rng<R: RngCore + CryptoRng>(
        &mut self,
        message: &str,
        rng: &mut R,
    ) -> Result<Sealed> {
        match &self.aead_key {
            None => {
                let offset = self.bits_consumed;
                let bytes = otp_encrypt(message, self.final_key.tail(offset))?;
                let bits_used = bytes.len() * 8;
                self.bits_consumed += bits_used;
                debug!(
                    "one-time pad used bits {}..{}, {} left",
                    offset,
                    self.bits_consumed,
                    self.bits_remaining()
                );
                Ok(Sealed {
                    cipher_text: hex::encode_upper(bytes),
                    key_offset: offset,
                    bits_used,
                    key_remaining: self.bits_remaining(),
                })
            }
            Some(key) => {
                let bytes = aead_encrypt(key, message.as_bytes(), rng)?;
                Ok(Sealed {
                    cipher_text: hex::encode_upper(bytes),
                    key_offset: 0,
                    bits_used: 0,
                    key_remaining: self.bits_remaining(),
                })
            }
        }
    }

    pub fn decrypt(&self, sealed: &Sealed) -> Result<String> {
        let bytes = hex::decode(sealed.cipher_text.trim())?;
        match &self.aead_key {
            None => otp_decrypt(&bytes, self.final_key.tail(sealed.key_offset)),
            Some(key) => {
                let plain = aead_decrypt(key, &bytes)?;
                String::from_utf8(plain).map_err(|_| {
                    Bb84Error::MalformedCiphertext("plaintext is not valid UTF-8".into())
                })
            }
        }
    }
}
