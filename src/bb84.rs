//! Channel simulator: Alice prepares, the channel disturbs, Bob measures.

use crate::bb84_states::{random_bit, BB84State, Basis};
use crate::eavesdropper::{ChannelNoise, Disturbance, EveStrategy};
use crate::error::{Bb84Error, Result};
use log::debug;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Accepted transmission sizes.
pub const TRANSMISSION_SIZE: RangeInclusive<usize> = 1..=1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QubitRecord {
    pub index: usize,
    pub alice_basis: Basis,
    pub alice_bit: bool,
    pub bob_basis: Basis,
    pub bob_bit: bool,
}

impl QubitRecord {
    pub fn bases_match(&self) -> bool {
        self.alice_basis == self.bob_basis
    }

    pub fn is_error(&self) -> bool {
        self.alice_bit != self.bob_bit
    }
}

/// One run's worth of qubits. Indices are contiguous from 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transmission {
    records: Vec<QubitRecord>,
}

impl Transmission {
    /// Builds a transmission from per-position columns, e.g. a backend reply.
    pub fn from_columns(
        alice_bits: &[bool],
        alice_bases: &[Basis],
        bob_bases: &[Basis],
        bob_bits: &[bool],
    ) -> Result<Self> {
        let n = alice_bits.len();
        if alice_bases.len() != n || bob_bases.len() != n || bob_bits.len() != n {
            return Err(Bb84Error::Configuration(format!(
                "column lengths differ: {} alice bits, {} alice bases, {} bob bases, {} bob bits",
                n,
                alice_bases.len(),
                bob_bases.len(),
                bob_bits.len()
            )));
        }
        check_size(n)?;
        let records = (0..n)
            .map(|index| QubitRecord {
                index,
                alice_basis: alice_bases[index],
                alice_bit: alice_bits[index],
                bob_basis: bob_bases[index],
                bob_bit: bob_bits[index],
            })
            .collect();
        Ok(Transmission { records })
    }

    pub fn records(&self) -> &[QubitRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QubitRecord> {
        self.records.iter()
    }

    pub fn alice_bits(&self) -> Vec<bool> {
        self.records.iter().map(|r| r.alice_bit).collect()
    }

    pub fn alice_bases(&self) -> Vec<Basis> {
        self.records.iter().map(|r| r.alice_basis).collect()
    }

    pub fn bob_bases(&self) -> Vec<Basis> {
        self.records.iter().map(|r| r.bob_basis).collect()
    }

    pub fn bob_bits(&self) -> Vec<bool> {
        self.records.iter().map(|r| r.bob_bit).collect()
    }
}

pub fn check_size(n: usize) -> Result<()> {
    if TRANSMISSION_SIZE.contains(&n) {
        Ok(())
    } else {
        Err(Bb84Error::Configuration(format!(
            "transmission size {} outside [{}, {}]",
            n,
            TRANSMISSION_SIZE.start(),
            TRANSMISSION_SIZE.end()
        )))
    }
}

/// Quantum channel between Alice and Bob with an ordered list of disturbances.
#[derive(Default)]
pub struct ChannelSimulator {
    disturbances: Vec<Box<dyn Disturbance>>,
}

impl ChannelSimulator {
    pub fn ideal() -> Self {
        Self::default()
    }

    pub fn with_eve(eve: EveStrategy) -> Self {
        Self::ideal().with_disturbance(eve)
    }

    /// Eve first, then channel noise.
    pub fn new(eve: EveStrategy, noise: ChannelNoise) -> Self {
        Self::with_eve(eve).with_noise(noise)
    }

    /// Disturbances apply in the order they were added.
    pub fn with_disturbance<D: Disturbance + 'static>(mut self, disturbance: D) -> Self {
        self.disturbances.push(Box::new(disturbance));
        self
    }

    pub fn with_noise(self, noise: ChannelNoise) -> Self {
        if noise.flip_probability > 0.0 {
            self.with_disturbance(noise)
        } else {
            self
        }
    }

    pub fn disturbance_names(&self) -> Vec<&'static str> {
        self.disturbances.iter().map(|d| d.name()).collect()
    }

    /// Draw order per qubit is fixed (Alice's basis, Alice's bit, Bob's basis,
    /// then the disturbances and Bob's measurement), so a seeded generator
    /// reproduces the same transmission.
    pub fn generate<R: RngCore>(&self, n: usize, rng: &mut R) -> Result<Transmission> {
        check_size(n)?;

        let records: Vec<QubitRecord> = (0..n)
            .map(|index| {
                let alice_basis = Basis::random(rng);
                let alice_bit = random_bit(rng);
                let bob_basis = Basis::random(rng);

                let mut state = BB84State::prepare(alice_bit, alice_basis);
                for disturbance in &self.disturbances {
                    state = disturbance.disturb(state, rng);
                }
                let bob_bit = state.measure(bob_basis, rng);

                QubitRecord {
                    index,
                    alice_basis,
                    alice_bit,
                    bob_basis,
                    bob_bit,
                }
            })
            .collect();

        debug!(
            "generated {} qubits through [{}]",
            n,
            self.disturbance_names().join(", ")
        );
        Ok(Transmission { records })
    }
}

/// `generate(n, eve_active, rng)`: ideal channel, optionally with full
/// intercept-resend.
pub fn generate_transmission<R: RngCore>(
    n: usize,
    eve_active: bool,
    rng: &mut R,
) -> Result<Transmission> {
    ChannelSimulator::with_eve(EveStrategy::from_flag(eve_active)).generate(n, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_rejects_out_of_range_sizes() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            generate_transmission(0, false, &mut rng),
            Err(Bb84Error::Configuration(_))
        ));
        assert!(generate_transmission(1001, false, &mut rng).is_err());
        assert_eq!(generate_transmission(1, false, &mut rng).unwrap().len(), 1);
        assert_eq!(generate_transmission(1000, true, &mut rng).unwrap().len(), 1000);
    }

    #[test]
    fn test_indices_are_contiguous() {
        let mut rng = StdRng::seed_from_u64(5);
        let transmission = generate_transmission(64, true, &mut rng).unwrap();
        for (position, record) in transmission.iter().enumerate() {
            assert_eq!(record.index, position);
        }
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let a = generate_transmission(200, true, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = generate_transmission(200, true, &mut StdRng::seed_from_u64(42)).unwrap();
        let c = generate_transmission(200, true, &mut StdRng::seed_from_u64(43)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_ideal_channel_matching_bases_agree() {
        let mut rng = StdRng::seed_from_u64(11);
        let transmission = generate_transmission(1000, false, &mut rng).unwrap();
        for record in transmission.iter().filter(|r| r.bases_match()) {
            assert_eq!(record.alice_bit, record.bob_bit, "qubit {}", record.index);
        }
    }

    #[test]
    fn test_mismatched_bases_are_uncorrelated() {
        let mut rng = StdRng::seed_from_u64(12);
        let mut agree = 0;
        let mut total = 0;
        for _ in 0..5 {
            let transmission = generate_transmission(1000, false, &mut rng).unwrap();
            for record in transmission.iter().filter(|r| !r.bases_match()) {
                total += 1;
                if !record.is_error() {
                    agree += 1;
                }
            }
        }
        let ratio = agree as f64 / total as f64;
        assert!((ratio - 0.5).abs() < 0.03, "ratio {}", ratio);
    }

    #[test]
    fn test_from_columns_validates_lengths() {
        let bases = [Basis::Rectilinear, Basis::Diagonal];
        let bits = [true, false];
        let transmission = Transmission::from_columns(&bits, &bases, &bases, &bits).unwrap();
        assert_eq!(transmission.len(), 2);
        assert_eq!(transmission.alice_bases(), bases.to_vec());
        assert!(Transmission::from_columns(&bits[..1], &bases, &bases, &bits).is_err());
        assert!(Transmission::from_columns(&[], &[], &[], &[]).is_err());
    }

    #[test]
    fn test_noise_is_skipped_when_zero() {
        let simulator = ChannelSimulator::ideal().with_noise(ChannelNoise::new(0.0).unwrap());
        assert!(simulator.disturbance_names().is_empty());
        let simulator = ChannelSimulator::with_eve(EveStrategy::NoEve)
            .with_noise(ChannelNoise::new(0.05).unwrap());
        assert_eq!(simulator.disturbance_names(), vec!["no-eve", "channel-noise"]);
    }

    #[test]
    fn test_new_orders_eve_before_noise() {
        let simulator = ChannelSimulator::new(
            EveStrategy::full_intercept(),
            ChannelNoise::new(0.02).unwrap(),
        );
        assert_eq!(
            simulator.disturbance_names(),
            vec!["intercept-resend", "channel-noise"]
        );
        let quiet = ChannelSimulator::new(EveStrategy::NoEve, ChannelNoise::new(0.0).unwrap());
        assert_eq!(quiet.disturbance_names(), vec!["no-eve"]);
    }
}
