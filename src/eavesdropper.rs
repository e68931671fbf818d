//! Disturbance models applied to a qubit between Alice and Bob.

use crate::bb84_states::{BB84State, Basis};
use crate::error::{Bb84Error, Result};
use rand::{Rng, RngCore};

/// Anything that can act on a qubit in flight.
pub trait Disturbance: Send + Sync {
    fn disturb(&self, state: BB84State, rng: &mut dyn RngCore) -> BB84State;

    fn name(&self) -> &'static str;
}

/// Eavesdropper strategies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EveStrategy {
    NoEve,
    /// Eve intercepts each qubit with `probability`, measures it in a random
    /// basis and resends what she measured in that basis.
    InterceptResend { probability: f64 },
}

impl EveStrategy {
    /// Intercept-resend on every qubit, expected QBER 25%.
    pub fn full_intercept() -> Self {
        EveStrategy::InterceptResend { probability: 1.0 }
    }

    pub fn from_flag(eve_active: bool) -> Self {
        if eve_active {
            Self::full_intercept()
        } else {
            EveStrategy::NoEve
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            EveStrategy::NoEve => Ok(()),
            EveStrategy::InterceptResend { probability } => check_probability("intercept", probability),
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, EveStrategy::NoEve)
    }

    /// QBER this strategy introduces on an otherwise noiseless channel.
    pub fn expected_qber(&self) -> f64 {
        match *self {
            EveStrategy::NoEve => 0.0,
            EveStrategy::InterceptResend { probability } => 0.25 * probability,
        }
    }
}

impl Default for EveStrategy {
    fn default() -> Self {
        EveStrategy::NoEve
    }
}

impl Disturbance for EveStrategy {
    fn disturb(&self, state: BB84State, rng: &mut dyn RngCore) -> BB84State {
        match *self {
            EveStrategy::NoEve => state,
            EveStrategy::InterceptResend { probability } => {
                if rng.gen::<f64>() >= probability {
                    return state;
                }
                let eve_basis = Basis::random(rng);
                let eve_bit = state.measure(eve_basis, rng);
                BB84State::prepare(eve_bit, eve_basis)
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            EveStrategy::NoEve => "no-eve",
            EveStrategy::InterceptResend { .. } => "intercept-resend",
        }
    }
}

/// Honest but noisy fibre: flips the qubit with `flip_probability`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelNoise {
    pub flip_probability: f64,
}

impl ChannelNoise {
    pub fn new(flip_probability: f64) -> Result<Self> {
        check_probability("channel noise", flip_probability)?;
        Ok(ChannelNoise { flip_probability })
    }
}

impl Disturbance for ChannelNoise {
    fn disturb(&self, state: BB84State, rng: &mut dyn RngCore) -> BB84State {
        if rng.gen::<f64>() < self.flip_probability {
            state.flip()
        } else {
            state
        }
    }

    fn name(&self) -> &'static str {
        "channel-noise"
    }
}

fn check_probability(what: &str, p: f64) -> Result<()> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(Bb84Error::Configuration(format!(
            "{} probability {} outside [0, 1]",
            what, p
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bb84_states::random_bit;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn error_rate(disturbance: &dyn Disturbance, seed: u64) -> f64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let trials = 20_000;
        let mut errors = 0;
        for _ in 0..trials {
            let basis = Basis::random(&mut rng);
            let bit = random_bit(&mut rng);
            let received = disturbance.disturb(BB84State::prepare(bit, basis), &mut rng);
            if received.measure(basis, &mut rng) != bit {
                errors += 1;
            }
        }
        errors as f64 / trials as f64
    }

    #[test]
    fn test_no_eve_is_transparent() {
        assert_eq!(error_rate(&EveStrategy::NoEve, 1), 0.0);
    }

    #[test]
    fn test_full_intercept_resend_error_rate() {
        let rate = error_rate(&EveStrategy::full_intercept(), 2);
        assert!((rate - 0.25).abs() < 0.02, "rate {}", rate);
    }

    #[test]
    fn test_partial_intercept_scales() {
        let eve = EveStrategy::InterceptResend { probability: 0.5 };
        let rate = error_rate(&eve, 3);
        assert!((rate - eve.expected_qber()).abs() < 0.02, "rate {}", rate);
    }

    #[test]
    fn test_channel_noise_error_rate() {
        let noise = ChannelNoise::new(0.1).unwrap();
        let rate = error_rate(&noise, 4);
        assert!((rate - 0.1).abs() < 0.015, "rate {}", rate);
    }

    #[test]
    fn test_probability_bounds() {
        assert!(ChannelNoise::new(1.5).is_err());
        assert!(EveStrategy::InterceptResend { probability: -0.1 }
            .validate()
            .is_err());
        assert!(EveStrategy::full_intercept().validate().is_ok());
        assert!(EveStrategy::from_flag(true).is_active());
        assert!(!EveStrategy::from_flag(false).is_active());
    }
}
