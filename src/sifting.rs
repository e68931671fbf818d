//! Basis sifting and QBER estimation.

use crate::bb84::{QubitRecord, Transmission};
use crate::key_material::BitString;
use serde::Serialize;

/// Records where Alice and Bob measured in the same basis, in transmission order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiftResult {
    pub sifted: Vec<QubitRecord>,
    pub errors: usize,
    pub qber: f64,
}

impl SiftResult {
    pub fn len(&self) -> usize {
        self.sifted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sifted.is_empty()
    }

    /// Alice's sifted bits.
    pub fn sifted_key(&self) -> BitString {
        self.sifted.iter().map(|r| r.alice_bit).collect()
    }

    /// Bob's sifted bits.
    pub fn bob_key(&self) -> BitString {
        self.sifted.iter().map(|r| r.bob_bit).collect()
    }
}

pub fn sift(transmission: &Transmission) -> SiftResult {
    let sifted: Vec<QubitRecord> = transmission
        .iter()
        .filter(|r| r.bases_match())
        .copied()
        .collect();
    let errors = sifted.iter().filter(|r| r.is_error()).count();

    SiftResult {
        qber: qber(errors, sifted.len()),
        sifted,
        errors,
    }
}

/// Error fraction, 0 for an empty sifted set.
pub fn qber(errors: usize, sifted_len: usize) -> f64 {
    if sifted_len == 0 {
        0.0
    } else {
        errors as f64 / sifted_len as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bb84::generate_transmission;
    use crate::bb84_states::Basis::{Diagonal, Rectilinear};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sift_filters_and_counts() {
        let transmission = Transmission::from_columns(
            &[true, false, true, true],
            &[Rectilinear, Diagonal, Diagonal, Rectilinear],
            &[Rectilinear, Rectilinear, Diagonal, Rectilinear],
            &[true, true, false, true],
        )
        .unwrap();
        let result = sift(&transmission);
        assert_eq!(result.len(), 3);
        assert_eq!(
            result.sifted.iter().map(|r| r.index).collect::<Vec<_>>(),
            vec![0, 2, 3]
        );
        assert_eq!(result.errors, 1);
        assert!((result.qber - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(result.sifted_key().to_string(), "111");
        assert_eq!(result.bob_key().to_string(), "101");
    }

    #[test]
    fn test_empty_sifted_set() {
        let transmission = Transmission::from_columns(
            &[true, false],
            &[Rectilinear, Diagonal],
            &[Diagonal, Rectilinear],
            &[false, false],
        )
        .unwrap();
        let result = sift(&transmission);
        assert!(result.is_empty());
        assert_eq!(result.qber, 0.0);
        assert!(result.sifted_key().is_empty());
    }

    #[test]
    fn test_sift_leaves_input_untouched() {
        let mut rng = StdRng::seed_from_u64(8);
        let transmission = generate_transmission(100, true, &mut rng).unwrap();
        let before = transmission.clone();
        let _ = sift(&transmission);
        assert_eq!(transmission, before);
    }

    #[test]
    fn test_ideal_channel_qber_is_zero() {
        let mut rng = StdRng::seed_from_u64(21);
        for n in [1, 12, 500, 1000] {
            let result = sift(&generate_transmission(n, false, &mut rng).unwrap());
            assert_eq!(result.errors, 0);
            assert_eq!(result.qber, 0.0);
        }
    }
}
