//! Property-based tests for normalization.
//!
//! Run with: cargo test -p calib-params -- proptest

use calib_params::{ParameterSpec, PropertyKind, denormalize, normalize};
use proptest::prelude::*;

/// Bounds spanning Poisson ratios up to stiff-tissue moduli.
fn arb_spec() -> impl Strategy<Value = ParameterSpec> {
    (1e-3..5e7f64, 1e-3..5e7f64).prop_filter_map("ordered bounds", |(a, b)| {
        let (min, max) = if a < b { (a, b) } else { (b, a) };
        ParameterSpec::new("p", "R", PropertyKind::Modulus, min, max).ok()
    })
}

proptest! {
    #[test]
    fn proptest_round_trip_inside_bounds(spec in arb_spec(), t in 0.0..=1.0f64) {
        let p = spec.min() + t * (spec.max() - spec.min());
        let p = p.clamp(spec.min(), spec.max());
        let back = denormalize(normalize(p, &spec), &spec);
        prop_assert!((back - p).abs() <= 1e-9 * spec.max(), "{p} -> {back}");
    }

    #[test]
    fn proptest_outside_unit_interval_clamps(spec in arb_spec(), over in 1e-9..1e3f64) {
        prop_assert_eq!(denormalize(1.0 + over, &spec), spec.max());
        prop_assert_eq!(denormalize(-over, &spec), spec.min());
    }

    #[test]
    fn proptest_denormalized_stays_in_bounds(spec in arb_spec(), x in -10.0..10.0f64) {
        let p = denormalize(x, &spec);
        prop_assert!(p >= spec.min() && p <= spec.max());
    }
}
