//! Channel and cipher boundary.
//!
//! The front end talks to a backend with three JSON calls: `/bb84`,
//! `/encrypt` and `/decrypt`. [`LocalBackend`] answers them in-process;
//! `HttpBackend` (feature `remote`) forwards them to a running server.

use crate::abort_gate::AbortDecision;
use crate::bb84::{check_size, ChannelSimulator, Transmission};
use crate::bb84_states::Basis;
use crate::cipher::{self, message_bit_len, CipherMode};
use crate::config::ProtocolConfig;
use crate::eavesdropper::{ChannelNoise, EveStrategy};
use crate::error::{Bb84Error, Result};
use crate::key_material::BitString;
use crate::protocol::Bb84Protocol;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRequest {
    pub n: usize,
    #[serde(default)]
    pub eve: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelResponse {
    pub alice_bits: Vec<u8>,
    pub alice_bases: Vec<Basis>,
    pub bob_bases: Vec<Basis>,
    pub bob_results: Vec<u8>,
    pub alice_key: BitString,
    pub qber: f64,
    pub aborted: bool,
    pub final_key: BitString,
}

impl ChannelResponse {
    pub fn transmission(&self) -> Result<Transmission> {
        Transmission::from_columns(
            &digits_to_bits(&self.alice_bits)?,
            &self.alice_bases,
            &self.bob_bases,
            &digits_to_bits(&self.bob_results)?,
        )
    }
}

fn digits_to_bits(digits: &[u8]) -> Result<Vec<bool>> {
    digits
        .iter()
        .map(|&d| match d {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Bb84Error::Configuration(format!(
                "bit value out of range: {}",
                other
            ))),
        })
        .collect()
}

fn bits_to_digits(bits: &[bool]) -> Vec<u8> {
    bits.iter().map(|&b| b as u8).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptRequest {
    pub message: String,
    pub key: BitString,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptResponse {
    pub cipher_text: String,
    pub bits_used: usize,
    pub key_remaining: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecryptRequest {
    #[serde(rename = "cipherText")]
    pub cipher_text: String,
    pub key: BitString,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptResponse {
    pub decrypted_message: String,
}

/// Body of a 4xx reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Source of transmissions for the protocol state machine.
pub trait ChannelSource: Send {
    fn transmit(&mut self, request: &ChannelRequest) -> Result<Transmission>;

    fn name(&self) -> &'static str;
}

/// The three backend calls.
pub trait QkdBackend {
    fn run_bb84(&mut self, request: &ChannelRequest) -> Result<ChannelResponse>;

    fn encrypt(&mut self, request: &EncryptRequest) -> Result<EncryptResponse>;

    fn decrypt(&mut self, request: &DecryptRequest) -> Result<DecryptResponse>;
}

/// In-process channel simulator with an owned RNG.
pub struct LocalChannel {
    rng: StdRng,
    intercept_probability: f64,
    noise: ChannelNoise,
}

impl LocalChannel {
    pub fn new(rng: StdRng) -> Self {
        LocalChannel {
            rng,
            intercept_probability: 1.0,
            noise: ChannelNoise {
                flip_probability: 0.0,
            },
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_config(config: &ProtocolConfig) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(LocalChannel {
            rng,
            intercept_probability: config.eve_intercept_probability,
            noise: ChannelNoise::new(config.channel_noise)?,
        })
    }
}

impl ChannelSource for LocalChannel {
    fn transmit(&mut self, request: &ChannelRequest) -> Result<Transmission> {
        let eve = if request.eve {
            EveStrategy::InterceptResend {
                probability: self.intercept_probability,
            }
        } else {
            EveStrategy::NoEve
        };
        ChannelSimulator::new(eve, self.noise).generate(request.n, &mut self.rng)
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// Answers backend calls by running the protocol in-process.
pub struct LocalBackend {
    template: ProtocolConfig,
    rng: StdRng,
}

impl LocalBackend {
    pub fn new(template: ProtocolConfig) -> Result<Self> {
        template.validate()?;
        let rng = match template.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(LocalBackend { template, rng })
    }
}

impl QkdBackend for LocalBackend {
    fn run_bb84(&mut self, request: &ChannelRequest) -> Result<ChannelResponse> {
        check_size(request.n)?;
        let config = ProtocolConfig {
            transmission_size: request.n,
            eve_active: request.eve,
            seed: Some(self.rng.gen()),
            ..self.template.clone()
        };
        let mut protocol = Bb84Protocol::new(config)?;
        let transmission = protocol.transmit()?;
        let sift = protocol.sift()?;
        let decision = protocol.reconcile()?;

        let final_key = match decision {
            AbortDecision::Continue if !sift.is_empty() => (*protocol.amplify()?).clone(),
            _ => BitString::default(),
        };

        Ok(ChannelResponse {
            alice_bits: bits_to_digits(&transmission.alice_bits()),
            alice_bases: transmission.alice_bases(),
            bob_bases: transmission.bob_bases(),
            bob_results: bits_to_digits(&transmission.bob_bits()),
            alice_key: sift.sifted_key(),
            qber: sift.qber,
            aborted: decision == AbortDecision::Abort,
            final_key,
        })
    }

    fn encrypt(&mut self, request: &EncryptRequest) -> Result<EncryptResponse> {
        let mode = self.template.cipher_mode;
        let cipher_text = cipher::encrypt(&request.message, &request.key, mode)?;
        let bits_used = match mode {
            CipherMode::OneTimePad => message_bit_len(&request.message),
            CipherMode::DerivedAead => 0,
        };
        debug!("local backend encrypted {} bits", bits_used);
        Ok(EncryptResponse {
            cipher_text,
            bits_used,
            key_remaining: request.key.len() - bits_used,
        })
    }

    fn decrypt(&mut self, request: &DecryptRequest) -> Result<DecryptResponse> {
        let decrypted_message =
            cipher::decrypt(&request.cipher_text, &request.key, self.template.cipher_mode)?;
        Ok(DecryptResponse { decrypted_message })
    }
}

#[cfg(feature = "remote")]
pub use remote::HttpBackend;

#[cfg(feature = "remote")]
mod remote {
    use super::*;
    use crate::sifting::sift;
    use log::warn;
    use reqwest::blocking::Client;
    use reqwest::StatusCode;
    use serde::de::DeserializeOwned;
    use std::time::Duration;

    /// Blocking client for a running backend server. Unreachable servers are
    /// reported as [`Bb84Error::BackendUnavailable`], never papered over with
    /// local data.
    pub struct HttpBackend {
        base_url: String,
        client: Client,
    }

    impl HttpBackend {
        pub fn new(base_url: impl Into<String>) -> Result<Self> {
            let client = Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .map_err(|e| Bb84Error::BackendUnavailable(e.to_string()))?;
            Ok(HttpBackend {
                base_url: base_url.into().trim_end_matches('/').to_string(),
                client,
            })
        }

        fn post<Req: Serialize, Resp: DeserializeOwned>(
            &self,
            path: &str,
            body: &Req,
        ) -> Result<std::result::Result<Resp, ErrorResponse>> {
            let url = format!("{}{}", self.base_url, path);
            let response = self
                .client
                .post(&url)
                .json(body)
                .send()
                .map_err(|e| Bb84Error::BackendUnavailable(format!("{}: {}", url, e)))?;

            let status = response.status();
            if status.is_success() {
                let body = response.json::<Resp>().map_err(|e| {
                    Bb84Error::BackendUnavailable(format!("{}: unreadable reply: {}", url, e))
                })?;
                Ok(Ok(body))
            } else if status == StatusCode::BAD_REQUEST {
                let body = response.json::<ErrorResponse>().map_err(|e| {
                    Bb84Error::BackendUnavailable(format!("{}: unreadable error: {}", url, e))
                })?;
                Ok(Err(body))
            } else {
                Err(Bb84Error::BackendUnavailable(format!("{}: HTTP {}", url, status)))
            }
        }
    }

    impl QkdBackend for HttpBackend {
        fn run_bb84(&mut self, request: &ChannelRequest) -> Result<ChannelResponse> {
            check_size(request.n)?;
            self.post("/bb84", request)?
                .map_err(|e| Bb84Error::Configuration(e.error))
        }

        fn encrypt(&mut self, request: &EncryptRequest) -> Result<EncryptResponse> {
            let required = message_bit_len(&request.message);
            if required > request.key.len() {
                return Err(Bb84Error::InsufficientKeyMaterial {
                    required,
                    available: request.key.len(),
                });
            }
            self.post("/encrypt", request)?.map_err(|e| {
                if e.error.to_ascii_uppercase().contains("INSUFFICIENT") {
                    Bb84Error::InsufficientKeyMaterial {
                        required,
                        available: request.key.len(),
                    }
                } else {
                    Bb84Error::Configuration(e.error)
                }
            })
        }

        fn decrypt(&mut self, request: &DecryptRequest) -> Result<DecryptResponse> {
            self.post("/decrypt", request)?
                .map_err(|e| Bb84Error::Configuration(e.error))
        }
    }

    impl ChannelSource for HttpBackend {
        fn transmit(&mut self, request: &ChannelRequest) -> Result<Transmission> {
            let response = self.run_bb84(request)?;
            let transmission = response.transmission()?;
            let local = sift(&transmission).qber;
            if (local - response.qber).abs() > 1e-9 {
                warn!(
                    "backend reported QBER {:.4}, recomputed {:.4}",
                    response.qber, local
                );
            }
            Ok(transmission)
        }

        fn name(&self) -> &'static str {
            "http"
        }
    }

}
