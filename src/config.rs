//! Run configuration.
//!
//! Mirrors the front end's `{ transmissionSize, eveActive }` payload, with
//! optional knobs for channel noise, Eve's intercept rate, cipher mode,
//! amplifier and seed. Loadable from TOML.

use crate::bb84::check_size;
use crate::cipher::CipherMode;
use crate::eavesdropper::{ChannelNoise, EveStrategy};
use crate::error::{Bb84Error, Result};
use crate::privacy_amplification::AmplifierKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_TRANSMISSION_SIZE: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ProtocolConfig {
    pub transmission_size: usize,
    pub eve_active: bool,
    /// Fraction of qubits Eve intercepts when active.
    pub eve_intercept_probability: f64,
    /// Honest channel flip probability.
    pub channel_noise: f64,
    pub cipher_mode: CipherMode,
    pub amplifier: AmplifierKind,
    /// Fixes the RNG; `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolConfig {
            transmission_size: DEFAULT_TRANSMISSION_SIZE,
            eve_active: false,
            eve_intercept_probability: 1.0,
            channel_noise: 0.0,
            cipher_mode: CipherMode::default(),
            amplifier: AmplifierKind::default(),
            seed: None,
        }
    }
}

impl ProtocolConfig {
    pub fn new(transmission_size: usize, eve_active: bool) -> Result<Self> {
        let config = ProtocolConfig {
            transmission_size,
            eve_active,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ProtocolConfig =
            toml::from_str(text).map_err(|e| Bb84Error::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Bb84Error::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        check_size(self.transmission_size)?;
        // checked even while Eve is off: a backend request may still enable her
        EveStrategy::InterceptResend {
            probability: self.eve_intercept_probability,
        }
        .validate()?;
        ChannelNoise::new(self.channel_noise)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ProtocolConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.eve_active);
        assert_eq!(config.eve_intercept_probability, 1.0);
    }

    #[test]
    fn test_size_bounds() {
        assert!(ProtocolConfig::new(0, false).is_err());
        assert!(ProtocolConfig::new(1001, true).is_err());
        assert!(ProtocolConfig::new(1000, true).is_ok());
    }

    #[test]
    fn test_toml() {
        let config = ProtocolConfig::from_toml_str(
            r#"
            transmissionSize = 500
            eveActive = true
            cipherMode = "derived-aead"
            amplifier = "hmac"
            seed = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.transmission_size, 500);
        assert_eq!(config.cipher_mode, CipherMode::DerivedAead);
        assert_eq!(config.amplifier, AmplifierKind::Hmac);
        assert_eq!(config.seed, Some(7));
        assert!(config.eve_active);
        assert_eq!(config.eve_intercept_probability, 1.0);
    }

    #[test]
    fn test_toml_rejects_bad_values() {
        assert!(ProtocolConfig::from_toml_str("transmissionSize = 0").is_err());
        assert!(ProtocolConfig::from_toml_str("channelNoise = 2.0").is_err());
        assert!(ProtocolConfig::from_toml_str("eveActive = true\neveInterceptProbability = -1.0").is_err());
        assert!(ProtocolConfig::from_toml_str("qubits = 10").is_err());
    }

    #[test]
    fn test_json_payload_from_front_end() {
        let config: ProtocolConfig =
            serde_json::from_str(r#"{"transmissionSize": 12, "eveActive": false}"#).unwrap();
        assert_eq!(config.transmission_size, 12);
        assert!(!config.eve_active);
    }

    #[test]
    fn test_intercept_probability_checked_while_eve_is_off() {
        assert!(ProtocolConfig::from_toml_str("eveInterceptProbability = -1.0").is_err());
        assert!(ProtocolConfig::from_toml_str("eveInterceptProbability = 5.0").is_err());
        let mut config = ProtocolConfig::default();
        config.eve_intercept_probability = 1.5;
        assert!(matches!(config.validate(), Err(Bb84Error::Configuration(_))));
        config.eve_intercept_probability = 0.5;
        assert!(config.validate().is_ok());
    }
}
