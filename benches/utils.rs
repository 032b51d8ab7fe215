#![allow(dead_code)]
use rand::distributions::Uniform;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Column-major data with `n_features` uniform continuous columns and one
/// trailing discrete column taking values in {0, 1, 2, 3}.
pub(crate) fn create_data(n_samples: usize, n_features: usize) -> Vec<f64> {
    // reproducible seed
    let mut rng = StdRng::seed_from_u64(1903);
    let feature_distribution = Uniform::new(0.0, 1.0);

    let mut data = Vec::with_capacity(n_samples * (n_features + 1));
    for _ in 0..n_features {
        data.extend((0..n_samples).map(|_| rng.sample(feature_distribution)));
    }
    data.extend((0..n_samples).map(|_| rng.gen_range(0..4) as f64));
    data
}

/// Label rows with a fixed linear rule on the continuous columns, flipped
/// for the last discrete level.
pub(crate) fn linear_rule(columns: &[&[f64]]) -> Vec<usize> {
    let n_features = columns.len() - 1;
    let n_samples = columns[0].len();
    (0..n_samples)
        .map(|i| {
            let score: f64 = (0..n_features)
                .map(|j| if j % 2 == 0 { columns[j][i] } else { -columns[j][i] })
                .sum();
            let positive = score > 0.0;
            usize::from(positive != (columns[n_features][i] == 3.0))
        })
        .collect()
}
