//! The penalty value used for failed evaluations.

/// Finite cost reported for any evaluation that could not be scored.
///
/// Optimizers need a real number from every call, so failures are encoded
/// as a cost far above any plausible geometric error instead of an error.
pub const SENTINEL_COST: f64 = 1e9;

/// True if `cost` is the sentinel or worse, or not a finite number.
#[must_use]
pub fn is_sentinel(cost: f64) -> bool {
    !cost.is_finite() || cost >= SENTINEL_COST
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_detection() {
        assert!(is_sentinel(SENTINEL_COST));
        assert!(is_sentinel(f64::NAN));
        assert!(!is_sentinel(0.42));
    }
}
