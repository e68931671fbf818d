use serde::Serialize;

/// Full intercept-resend on a clean channel lands near 25%; honest noise
/// should stay well under this.
pub const QBER_THRESHOLD: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AbortDecision {
    Continue,
    Abort,
}

/// `qber >= threshold` aborts; the boundary itself aborts.
pub fn decide(qber: f64, threshold: f64) -> AbortDecision {
    if qber >= threshold {
        AbortDecision::Abort
    } else {
        AbortDecision::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_is_inclusive() {
        assert_eq!(decide(0.15, QBER_THRESHOLD), AbortDecision::Abort);
        assert_eq!(decide(3.0 / 20.0, QBER_THRESHOLD), AbortDecision::Abort);
        assert_eq!(decide(0.1499, QBER_THRESHOLD), AbortDecision::Continue);
    }

    #[test]
    fn test_extremes() {
        assert_eq!(decide(0.0, QBER_THRESHOLD), AbortDecision::Continue);
        assert_eq!(decide(1.0, QBER_THRESHOLD), AbortDecision::Abort);
        assert_eq!(decide(0.25, QBER_THRESHOLD), AbortDecision::Abort);
    }
}
