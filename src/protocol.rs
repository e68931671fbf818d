//! BB84 session state machine.
//!
//! ```text
//! Idle --transmit--> Transmitted --sift--> Sifted --reconcile--> Reconciled
//! Reconciled(Corrected) --amplify--> Amplified --derive_cipher_key--> Encrypted
//! Reconciled(Aborted) is terminal; reset() returns to Idle from anywhere.
//! ```
//!
//! Each state owns exactly the data that is valid in it. Finished phases are
//! shared behind `Arc` and never mutated afterwards.

use crate::abort_gate::{decide, AbortDecision, QBER_THRESHOLD};
use crate::backend::{ChannelRequest, ChannelSource, LocalChannel};
use crate::bb84::Transmission;
use crate::cipher::{CipherMode, KeyDerivedCipher, Sealed};
use crate::config::ProtocolConfig;
use crate::error::{Bb84Error, Result};
use crate::error_correction::{parity_mismatched_blocks, residual_mismatches, PassThrough, Reconciler};
use crate::key_material::BitString;
use crate::privacy_amplification::PrivacyAmplifier;
use crate::sifting::{sift, SiftResult};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;

pub enum Reconciliation {
    Aborted {
        transmission: Arc<Transmission>,
        sift: Arc<SiftResult>,
    },
    Corrected {
        transmission: Arc<Transmission>,
        sift: Arc<SiftResult>,
        corrected_key: Arc<BitString>,
    },
}

pub enum ProtocolState {
    Idle,
    Transmitted {
        transmission: Arc<Transmission>,
    },
    Sifted {
        transmission: Arc<Transmission>,
        sift: Arc<SiftResult>,
    },
    Reconciled(Reconciliation),
    Amplified {
        transmission: Arc<Transmission>,
        sift: Arc<SiftResult>,
        corrected_key: Arc<BitString>,
        final_key: Arc<BitString>,
    },
    Encrypted {
        transmission: Arc<Transmission>,
        sift: Arc<SiftResult>,
        corrected_key: Arc<BitString>,
        cipher: KeyDerivedCipher,
    },
}

impl ProtocolState {
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolState::Idle => "idle",
            ProtocolState::Transmitted { .. } => "transmitted",
            ProtocolState::Sifted { .. } => "sifted",
            ProtocolState::Reconciled(Reconciliation::Aborted { .. }) => "aborted",
            ProtocolState::Reconciled(Reconciliation::Corrected { .. }) => "corrected",
            ProtocolState::Amplified { .. } => "amplified",
            ProtocolState::Encrypted { .. } => "encrypted",
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, ProtocolState::Reconciled(Reconciliation::Aborted { .. }))
    }

    pub fn transmission(&self) -> Option<&Arc<Transmission>> {
        match self {
            ProtocolState::Idle => None,
            ProtocolState::Transmitted { transmission }
            | ProtocolState::Sifted { transmission, .. }
            | ProtocolState::Reconciled(Reconciliation::Aborted { transmission, .. })
            | ProtocolState::Reconciled(Reconciliation::Corrected { transmission, .. })
            | ProtocolState::Amplified { transmission, .. }
            | ProtocolState::Encrypted { transmission, .. } => Some(transmission),
        }
    }

    pub fn sift(&self) -> Option<&Arc<SiftResult>> {
        match self {
            ProtocolState::Idle | ProtocolState::Transmitted { .. } => None,
            ProtocolState::Sifted { sift, .. }
            | ProtocolState::Reconciled(Reconciliation::Aborted { sift, .. })
            | ProtocolState::Reconciled(Reconciliation::Corrected { sift, .. })
            | ProtocolState::Amplified { sift, .. }
            | ProtocolState::Encrypted { sift, .. } => Some(sift),
        }
    }

    pub fn corrected_key(&self) -> Option<&Arc<BitString>> {
        match self {
            ProtocolState::Reconciled(Reconciliation::Corrected { corrected_key, .. })
            | ProtocolState::Amplified { corrected_key, .. }
            | ProtocolState::Encrypted { corrected_key, .. } => Some(corrected_key),
            _ => None,
        }
    }

    pub fn final_key(&self) -> Option<&BitString> {
        match self {
            ProtocolState::Amplified { final_key, .. } => Some(&**final_key),
            ProtocolState::Encrypted { cipher, .. } => Some(cipher.final_key()),
            _ => None,
        }
    }
}

/// Snapshot of a session for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub state: &'static str,
    pub channel: &'static str,
    pub transmission_size: usize,
    pub sifted_length: usize,
    pub errors: usize,
    pub qber: f64,
    pub threshold: f64,
    pub aborted: bool,
    pub sifted_key: String,
    pub corrected_key: Option<String>,
    pub final_key: Option<String>,
    pub reconciler: &'static str,
    pub amplifier: &'static str,
}

pub struct Bb84Protocol {
    config: ProtocolConfig,
    channel: Box<dyn ChannelSource>,
    reconciler: Box<dyn Reconciler + Send>,
    amplifier: Box<dyn PrivacyAmplifier>,
    state: ProtocolState,
}

impl Bb84Protocol {
    /// Local channel seeded from `config.seed` (or OS entropy).
    pub fn new(config: ProtocolConfig) -> Result<Self> {
        let channel = LocalChannel::from_config(&config)?;
        Self::with_channel(config, Box::new(channel))
    }

    pub fn with_channel(config: ProtocolConfig, channel: Box<dyn ChannelSource>) -> Result<Self> {
        config.validate()?;
        let amplifier = config.amplifier.build(config.seed.unwrap_or_default());
        Ok(Bb84Protocol {
            config,
            channel,
            reconciler: Box::new(PassThrough),
            amplifier,
            state: ProtocolState::Idle,
        })
    }

    pub fn with_amplifier(mut self, amplifier: Box<dyn PrivacyAmplifier>) -> Self {
        self.amplifier = amplifier;
        self
    }

    pub fn with_reconciler(mut self, reconciler: Box<dyn Reconciler + Send>) -> Self {
        self.reconciler = reconciler;
        self
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn state(&self) -> &ProtocolState {
        &self.state
    }

    pub fn is_aborted(&self) -> bool {
        self.state.is_aborted()
    }

    pub fn qber(&self) -> Option<f64> {
        self.state.sift().map(|s| s.qber)
    }

    pub fn sifted_key(&self) -> Option<BitString> {
        self.state.sift().map(|s| s.sifted_key())
    }

    pub fn corrected_key(&self) -> Option<Arc<BitString>> {
        self.state.corrected_key().cloned()
    }

    pub fn final_key(&self) -> Option<&BitString> {
        self.state.final_key()
    }

    fn refuse(&self, action: &'static str) -> Bb84Error {
        match &self.state {
            ProtocolState::Reconciled(Reconciliation::Aborted { sift, .. }) => {
                Bb84Error::ProtocolAborted {
                    qber: sift.qber,
                    threshold: QBER_THRESHOLD,
                }
            }
            other => Bb84Error::InvalidTransition {
                state: other.name(),
                action,
            },
        }
    }

    /// Idle -> Transmitted.
    pub fn transmit(&mut self) -> Result<Arc<Transmission>> {
        if !matches!(self.state, ProtocolState::Idle) {
            return Err(self.refuse("transmit"));
        }
        let request = ChannelRequest {
            n: self.config.transmission_size,
            eve: self.config.eve_active,
        };
        let transmission = Arc::new(self.channel.transmit(&request)?);
        info!(
            "transmitted {} qubits over {} channel (eve: {})",
            transmission.len(),
            self.channel.name(),
            request.eve
        );
        self.state = ProtocolState::Transmitted {
            transmission: Arc::clone(&transmission),
        };
        Ok(transmission)
    }

    /// Transmitted -> Sifted.
    pub fn sift(&mut self) -> Result<Arc<SiftResult>> {
        let transmission = match &self.state {
            ProtocolState::Transmitted { transmission } => Arc::clone(transmission),
            _ => return Err(self.refuse("sift")),
        };
        let result = Arc::new(sift(&transmission));
        info!(
            "sifted {} of {} qubits, {} errors, QBER {:.4}",
            result.len(),
            transmission.len(),
            result.errors,
            result.qber
        );
        self.state = ProtocolState::Sifted {
            transmission,
            sift: Arc::clone(&result),
        };
        Ok(result)
    }

    /// Sifted -> Reconciled. An abort is a normal outcome, returned as
    /// `Ok(AbortDecision::Abort)`.
    pub fn reconcile(&mut self) -> Result<AbortDecision> {
        let (transmission, sift) = match &self.state {
            ProtocolState::Sifted { transmission, sift } => (Arc::clone(transmission), Arc::clone(sift)),
            _ => return Err(self.refuse("reconcile")),
        };

        let decision = decide(sift.qber, QBER_THRESHOLD);
        self.state = match decision {
            AbortDecision::Abort => {
                warn!(
                    "QBER {:.4} >= {:.2}, possible eavesdropper, aborting",
                    sift.qber, QBER_THRESHOLD
                );
                ProtocolState::Reconciled(Reconciliation::Aborted { transmission, sift })
            }
            AbortDecision::Continue => {
                let corrected_key = self.reconciler.reconcile(&sift);
                debug!(
                    "{} reconciliation: {} residual mismatches, {} parity blocks differ",
                    self.reconciler.name(),
                    residual_mismatches(&sift, &corrected_key),
                    parity_mismatched_blocks(&corrected_key, &sift.bob_key())
                );
                ProtocolState::Reconciled(Reconciliation::Corrected {
                    transmission,
                    sift,
                    corrected_key: Arc::new(corrected_key),
                })
            }
        };
        Ok(decision)
    }

    /// Reconciled(Corrected) -> Amplified.
    pub fn amplify(&mut self) -> Result<Arc<BitString>> {
        let (transmission, sift, corrected_key) = match &self.state {
            ProtocolState::Reconciled(Reconciliation::Corrected {
                transmission,
                sift,
                corrected_key,
            }) => (
                Arc::clone(transmission),
                Arc::clone(sift),
                Arc::clone(corrected_key),
            ),
            _ => return Err(self.refuse("amplify")),
        };
        if corrected_key.is_empty() {
            return Err(Bb84Error::InsufficientKeyMaterial {
                required: 1,
                available: 0,
            });
        }

        let final_key = Arc::new(self.amplifier.amplify(&corrected_key));
        info!(
            "{} amplification: {} -> {} bits",
            self.amplifier.name(),
            corrected_key.len(),
            final_key.len()
        );
        self.state = ProtocolState::Amplified {
            transmission,
            sift,
            corrected_key,
            final_key: Arc::clone(&final_key),
        };
        Ok(final_key)
    }

    /// Amplified -> Encrypted, using the configured cipher mode.
    pub fn derive_cipher_key(&mut self) -> Result<CipherMode> {
        let mode = self.config.cipher_mode;
        let (transmission, sift, corrected_key, final_key) = match &self.state {
            ProtocolState::Amplified {
                transmission,
                sift,
                corrected_key,
                final_key,
            } => (
                Arc::clone(transmission),
                Arc::clone(sift),
                Arc::clone(corrected_key),
                BitString::clone(final_key),
            ),
            _ => return Err(self.refuse("derive a cipher key")),
        };
        let cipher = KeyDerivedCipher::new(final_key, mode)?;
        info!("cipher key derived ({:?})", mode);
        self.state = ProtocolState::Encrypted {
            transmission,
            sift,
            corrected_key,
            cipher,
        };
        Ok(mode)
    }

    pub fn encrypt(&mut self, message: &str) -> Result<Sealed> {
        match &mut self.state {
            ProtocolState::Encrypted { cipher, .. } => cipher.encrypt(message),
            _ => Err(self.refuse("encrypt")),
        }
    }

    pub fn decrypt(&self, sealed: &Sealed) -> Result<String> {
        match &self.state {
            ProtocolState::Encrypted { cipher, .. } => cipher.decrypt(sealed),
            _ => Err(self.refuse("decrypt")),
        }
    }

    /// Any state -> Idle. Drops every transmission and key of the run.
    pub fn reset(&mut self) {
        if !matches!(self.state, ProtocolState::Idle) {
            info!("reset from {}", self.state.name());
        }
        self.state = ProtocolState::Idle;
    }

    /// Idle -> Amplified in one call. An abort leaves the machine in the
    /// aborted state and returns `ProtocolAborted`.
    pub fn run_to_completion(&mut self) -> Result<SessionReport> {
        self.transmit()?;
        self.sift()?;
        if self.reconcile()? == AbortDecision::Abort {
            return Err(self.refuse("amplify"));
        }
        self.amplify()?;
        self.report()
            .ok_or_else(|| Bb84Error::InvalidTransition {
                state: self.state.name(),
                action: "report",
            })
    }

    /// Available once sifting has run.
    pub fn report(&self) -> Option<SessionReport> {
        let transmission = self.state.transmission()?;
        let sift = self.state.sift()?;
        Some(SessionReport {
            state: self.state.name(),
            channel: self.channel.name(),
            transmission_size: transmission.len(),
            sifted_length: sift.len(),
            errors: sift.errors,
            qber: sift.qber,
            threshold: QBER_THRESHOLD,
            aborted: self.state.is_aborted(),
            sifted_key: sift.sifted_key().to_string(),
            corrected_key: self.state.corrected_key().map(|k| k.to_string()),
            final_key: self.state.final_key().map(|k| k.to_string()),
            reconciler: self.reconciler.name(),
            amplifier: self.amplifier.name(),
        })
    }
}
