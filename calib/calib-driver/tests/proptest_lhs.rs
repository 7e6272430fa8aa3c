//! Property-based tests for the Latin hypercube design.
//!
//! Run with: cargo test -p calib-driver -- proptest

use calib_driver::latin_hypercube;
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

proptest! {
    #[test]
    fn proptest_every_bin_holds_one_sample(
        dimension in 1usize..6,
        samples in 1usize..40,
        seed in any::<u64>(),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let design = latin_hypercube(dimension, samples, &mut rng);
        prop_assert_eq!(design.len(), samples);

        for axis in 0..dimension {
            let mut hits = vec![0usize; samples];
            for x in &design {
                prop_assert_eq!(x.len(), dimension);
                let v = x[axis];
                prop_assert!((0.0..=1.0).contains(&v), "{v}");
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
                let bin = ((v * samples as f64) as usize).min(samples - 1);
                hits[bin] += 1;
            }
            prop_assert!(hits.iter().all(|&h| h == 1), "axis {axis}: {hits:?}");
        }
    }

    #[test]
    fn proptest_same_seed_same_design(seed in any::<u64>()) {
        let a = latin_hypercube(3, 12, &mut StdRng::seed_from_u64(seed));
        let b = latin_hypercube(3, 12, &mut StdRng::seed_from_u64(seed));
        prop_assert_eq!(a, b);
    }
}
