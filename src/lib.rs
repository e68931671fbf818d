//! BB84 quantum key distribution simulator.
//!
//! A run goes transmit -> sift -> QBER abort gate -> reconcile -> privacy
//! amplification, and the final key can then drive a one-time pad or an
//! AES-256-GCM key. [`protocol::Bb84Protocol`] sequences the phases; the
//! phase functions are usable on their own.

pub mod abort_gate;
pub mod backend;
pub mod bb84;
pub mod bb84_states;
pub mod cipher;
pub mod config;
pub mod eavesdropper;
pub mod error;
pub mod error_correction;
pub mod key_material;
pub mod privacy_amplification;
pub mod protocol;
pub mod sifting;


pub use error::{Bb84Error, Result};

pub mod prelude {
    pub use crate::abort_gate::{decide, AbortDecision, QBER_THRESHOLD};
    pub use crate::backend::{
        ChannelRequest, ChannelResponse, ChannelSource, LocalBackend, LocalChannel, QkdBackend,
    };
    pub use crate::bb84::{generate_transmission, ChannelSimulator, QubitRecord, Transmission};
    pub use crate::bb84_states::{BB84State, Basis};
    pub use crate::cipher::{CipherMode, KeyDerivedCipher, Sealed};
    pub use crate::config::ProtocolConfig;
    pub use crate::eavesdropper::{ChannelNoise, Disturbance, EveStrategy};
    pub use crate::error::{Bb84Error, Result};
    pub use crate::key_material::BitString;
    pub use crate::privacy_amplification::{amplify, AmplifierKind, PrivacyAmplifier};
    pub use crate::protocol::{Bb84Protocol, ProtocolState, SessionReport};
    pub use crate::sifting::{sift, SiftResult};
}
