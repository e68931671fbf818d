//! Error types for the BB84 pipeline.

use thiserror::Error;

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, Bb84Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Bb84Error {
    /// Out-of-range transmission size, probability or unreadable config.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// QBER reached the abort threshold. A valid outcome, not a fault.
    #[error("protocol aborted: QBER {qber:.4} >= threshold {threshold:.2}")]
    ProtocolAborted { qber: f64, threshold: f64 },

    #[error("insufficient key material: message requires {required} bits, key has {available}")]
    InsufficientKeyMaterial { required: usize, available: usize },

    /// AEAD tag mismatch: tampered ciphertext or wrong key.
    #[error("authentication failure")]
    AuthenticationFailure,

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("cannot {action} while {state}")]
    InvalidTransition {
        state: &'static str,
        action: &'static str,
    },

    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    /// The AEAD primitive refused to seal the plaintext.
    #[error("encryption failed: {0}")]
    EncryptionFailure(String),
}

impl Bb84Error {
    /// True for outcomes that end a run normally rather than signalling a fault.
    pub fn is_abort(&self) -> bool {
        matches!(self, Bb84Error::ProtocolAborted { .. })
    }
}

impl From<hex::FromHexError> for Bb84Error {
    fn from(err: hex::FromHexError) -> Self {
        Bb84Error::MalformedCiphertext(err.to_string())
    }
}
