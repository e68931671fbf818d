use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four BB84 preparation states.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BB84State {
    QubitZero,
    QubitOne,
    QubitPlus,  // Represents the |+> state
    QubitMinus, // Represents the |-> state
}

/// Measurement orientation: rectilinear (`+`) or diagonal (`x`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Basis {
    #[serde(rename = "+")]
    Rectilinear,
    #[serde(rename = "x")]
    Diagonal,
}

impl Basis {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen::<bool>() {
            Basis::Diagonal
        } else {
            Basis::Rectilinear
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Basis::Rectilinear => '+',
            Basis::Diagonal => 'x',
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "+" => Some(Basis::Rectilinear),
            "x" | "X" | "×" => Some(Basis::Diagonal),
            _ => None,
        }
    }
}

impl fmt::Display for Basis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

pub fn random_bit<R: Rng + ?Sized>(rng: &mut R) -> bool {
    rng.gen()
}

impl BB84State {
    /// Encodes `bit` in `basis`.
    pub fn prepare(bit: bool, basis: Basis) -> Self {
        match (basis, bit) {
            (Basis::Rectilinear, false) => BB84State::QubitZero,
            (Basis::Rectilinear, true) => BB84State::QubitOne,
            (Basis::Diagonal, false) => BB84State::QubitPlus,
            (Basis::Diagonal, true) => BB84State::QubitMinus,
        }
    }

    /// The basis this state was prepared in.
    pub fn basis(self) -> Basis {
        match self {
            BB84State::QubitZero | BB84State::QubitOne => Basis::Rectilinear,
            BB84State::QubitPlus | BB84State::QubitMinus => Basis::Diagonal,
        }
    }

    pub fn bit(self) -> bool {
        matches!(self, BB84State::QubitOne | BB84State::QubitMinus)
    }

    /// Measures in `basis`. A matching basis returns the encoded bit; the
    /// conjugate basis yields a uniformly random outcome.
    pub fn measure<R: Rng + ?Sized>(self, basis: Basis, rng: &mut R) -> bool {
        if self.basis() == basis {
            self.bit()
        } else {
            random_bit(rng)
        }
    }

    /// Bit flip within the same basis.
    pub fn flip(self) -> Self {
        match self {
            BB84State::QubitZero => BB84State::QubitOne,
            BB84State::QubitOne => BB84State::QubitZero,
            BB84State::QubitPlus => BB84State::QubitMinus,
            BB84State::QubitMinus => BB84State::QubitPlus,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_prepare_covers_all_states() {
        let mut counts = [0, 0, 0, 0];
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..100 {
            match BB84State::prepare(random_bit(&mut rng), Basis::random(&mut rng)) {
                BB84State::QubitZero => counts[0] += 1,
                BB84State::QubitOne => counts[1] += 1,
                BB84State::QubitPlus => counts[2] += 1,
                BB84State::QubitMinus => counts[3] += 1,
            }
        }

        for (i, &count) in counts.iter().enumerate() {
            assert!(count > 0, "State variant {} was not generated", i);
        }
    }

    #[test]
    fn test_matching_basis_measurement_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(1);
        for basis in [Basis::Rectilinear, Basis::Diagonal] {
            for bit in [false, true] {
                let state = BB84State::prepare(bit, basis);
                for _ in 0..20 {
                    assert_eq!(state.measure(basis, &mut rng), bit);
                }
            }
        }
    }

    #[test]
    fn test_conjugate_basis_measurement_is_random() {
        let mut rng = StdRng::seed_from_u64(3);
        let state = BB84State::QubitZero;
        let ones = (0..4000)
            .filter(|_| state.measure(Basis::Diagonal, &mut rng))
            .count();
        let ratio = ones as f64 / 4000.0;
        assert!((0.45..0.55).contains(&ratio), "ratio {}", ratio);
    }

    #[test]
    fn test_flip_keeps_basis() {
        for state in [
            BB84State::QubitZero,
            BB84State::QubitOne,
            BB84State::QubitPlus,
            BB84State::QubitMinus,
        ] {
            assert_eq!(state.flip().basis(), state.basis());
            assert_ne!(state.flip().bit(), state.bit());
            assert_eq!(state.flip().flip(), state);
        }
    }

    #[test]
    fn test_random_basis_balance() {
        let mut rng = StdRng::seed_from_u64(99);
        let sample_size = 40000;
        let diagonal = (0..sample_size)
            .filter(|_| Basis::random(&mut rng) == Basis::Diagonal)
            .count();
        let ratio = diagonal as f64 / sample_size as f64;
        assert!((ratio - 0.5).abs() < 0.02, "ratio {}", ratio);
    }

    #[test]
    fn test_basis_symbols() {
        assert_eq!(Basis::from_symbol("+"), Some(Basis::Rectilinear));
        assert_eq!(Basis::from_symbol("x"), Some(Basis::Diagonal));
        assert_eq!(Basis::from_symbol("?"), None);
        assert_eq!(serde_json::to_string(&Basis::Diagonal).unwrap(), "\"x\"");
        assert_eq!(Basis::Rectilinear.to_string(), "+");
    }
}
