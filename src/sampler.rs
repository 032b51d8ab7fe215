//! Sampler
//!
//! Synthetic instance generation. A [`Generator`] is fit once on a set of
//! training rows and samples every feature independently from its marginal:
//! a Gaussian kernel density estimate for continuous features and the
//! empirical frequencies for discrete ones.
use crate::constraints::Constraint;
use crate::data::{Matrix, RowMajorMatrix};
use crate::errors::TrepanError;
use crate::feature::FeatureSpec;
use crate::oracle::{label_rows, Oracle};
use log::debug;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Something that can produce one full feature vector at a time.
pub trait Sampler {
    /// Number of features in every generated vector.
    fn n_features(&self) -> usize;
    /// Draw one instance.
    fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64>;
}

/// Marginal sampler for a single feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FeatureSampler {
    /// Gaussian KDE: pick an observed value uniformly, then add noise with
    /// standard deviation `bandwidth`.
    Kde { values: Vec<f64>, bandwidth: f64 },
    /// Empirical distribution over the distinct observed values.
    /// `cumulative[i]` is the number of observations with a value `<= values[i]`.
    Empirical { values: Vec<f64>, cumulative: Vec<usize> },
}

impl FeatureSampler {
    /// Fit a sampler to the observed values of one feature. `values` must not be empty.
    pub fn fit(mut values: Vec<f64>, spec: FeatureSpec) -> Self {
        if spec.is_discrete() {
            values.sort_by(|a, b| a.total_cmp(b));
            let mut distinct: Vec<f64> = Vec::new();
            let mut cumulative: Vec<usize> = Vec::new();
            for (i, v) in values.iter().enumerate() {
                if distinct.last() == Some(v) {
                    if let Some(c) = cumulative.last_mut() {
                        *c = i + 1;
                    }
                } else {
                    distinct.push(*v);
                    cumulative.push(i + 1);
                }
            }
            FeatureSampler::Empirical {
                values: distinct,
                cumulative,
            }
        } else {
            let bandwidth = 1.0 / (values.len() as f64).sqrt();
            FeatureSampler::Kde { values, bandwidth }
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            FeatureSampler::Kde { values, bandwidth } => {
                let loc = values[rng.gen_range(0..values.len())];
                let z: f64 = rng.sample(StandardNormal);
                loc + bandwidth * z
            }
            FeatureSampler::Empirical { values, cumulative } => {
                let total = cumulative[cumulative.len() - 1];
                let u = rng.gen_range(0..total);
                values[cumulative.partition_point(|c| *c <= u)]
            }
        }
    }
}

/// Per-node synthetic data generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generator {
    /// Rows of the training data the generator was fit on.
    pub training_idx: Vec<usize>,
    /// One independent sampler per feature.
    pub features: Vec<FeatureSampler>,
}

impl Generator {
    /// Fit a new generator to the rows `training_idx` of `data`.
    pub fn fit(data: &Matrix<f64>, training_idx: &[usize], feature_spec: &[FeatureSpec]) -> Result<Self, TrepanError> {
        if training_idx.is_empty() {
            return Err(TrepanError::EmptyData);
        }
        let features = feature_spec
            .iter()
            .enumerate()
            .map(|(j, spec)| FeatureSampler::fit(data.gather_col(j, training_idx), *spec))
            .collect();
        Ok(Generator {
            training_idx: training_idx.to_vec(),
            features,
        })
    }
}

impl Sampler for Generator {
    fn n_features(&self) -> usize {
        self.features.len()
    }

    fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        self.features.iter().map(|f| f.sample(rng)).collect()
    }
}

/// Draw one instance that satisfies every constraint, trying at most `max_attempts` times.
pub fn rejection_sample<S, R>(
    sampler: &S,
    constraints: &[Constraint],
    max_attempts: usize,
    rng: &mut R,
) -> Result<Vec<f64>, TrepanError>
where
    S: Sampler + ?Sized,
    R: Rng + ?Sized,
{
    for _ in 0..max_attempts {
        let instance = sampler.generate(rng);
        if constraints.iter().all(|c| c.test(&instance)) {
            return Ok(instance);
        }
    }
    Err(TrepanError::SamplingExhausted { attempts: max_attempts })
}

/// Number of synthetic instances needed to bring `n_real` rows up to `min_sample`.
pub fn top_up_size(min_sample: usize, n_real: usize) -> usize {
    min_sample.saturating_sub(n_real)
}

/// Generate `n` instances inside the region defined by `constraints` and label
/// them with a single oracle call. Nothing is sampled and the oracle is not
/// called when `n` is zero.
pub fn draw_sample<S, O, R>(
    sampler: &S,
    constraints: &[Constraint],
    n: usize,
    oracle: &O,
    max_attempts: usize,
    rng: &mut R,
) -> Result<(RowMajorMatrix<f64>, Vec<usize>), TrepanError>
where
    S: Sampler + ?Sized,
    O: Oracle + ?Sized,
    R: Rng + ?Sized,
{
    let mut data = RowMajorMatrix::empty(sampler.n_features());
    if n == 0 {
        return Ok((data, Vec::new()));
    }
    debug!("Drawing sample of size {}", n);
    for _ in 0..n {
        data.append_row(rejection_sample(sampler, constraints, max_attempts, rng)?);
    }
    let targets = label_rows(oracle, &data);
    if targets.len() != data.rows {
        return Err(TrepanError::DimensionMismatch {
            expected: format!("{} oracle labels", data.rows),
            actual: format!("{} oracle labels", targets.len()),
        });
    }
    debug!("Produced {} instances and {} targets", data.rows, targets.len());
    Ok((data, targets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::cell::Cell;

    struct CountingSampler {
        calls: Cell<usize>,
    }

    impl Sampler for CountingSampler {
        fn n_features(&self) -> usize {
            1
        }
        fn generate<R: Rng + ?Sized>(&self, _rng: &mut R) -> Vec<f64> {
            self.calls.set(self.calls.get() + 1);
            vec![0.0]
        }
    }

    #[test]
    fn test_rejection_sample_exhausts_exactly_max_attempts() {
        let mut rng = StdRng::seed_from_u64(0);
        let sampler = CountingSampler { calls: Cell::new(0) };
        let never = [Constraint::GreaterThan {
            feature: 0,
            value: f64::INFINITY,
        }];
        let err = rejection_sample(&sampler, &never, 5, &mut rng).unwrap_err();
        assert!(matches!(err, TrepanError::SamplingExhausted { attempts: 5 }));
        assert_eq!(sampler.calls.get(), 5);
    }

    #[test]
    fn test_rejection_sample_accepts() {
        let mut rng = StdRng::seed_from_u64(1);
        let data = vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let m = Matrix::new(&data, 6, 1);
        let generator = Generator::fit(&m, &m.index, &[FeatureSpec::Continuous]).unwrap();
        let region = [Constraint::GreaterThan { feature: 0, value: 2.5 }];
        for _ in 0..20 {
            let x = rejection_sample(&generator, &region, 100, &mut rng).unwrap();
            assert!(x[0] > 2.5);
        }
    }

    #[test]
    fn test_kde_bandwidth_and_support() {
        let mut rng = StdRng::seed_from_u64(2);
        let sampler = FeatureSampler::fit(vec![10.0; 25], FeatureSpec::Continuous);
        match &sampler {
            FeatureSampler::Kde { bandwidth, .. } => assert_eq!(*bandwidth, 0.2),
            _ => panic!("expected a KDE sampler"),
        }
        for _ in 0..200 {
            let v = sampler.sample(&mut rng);
            // 6 standard deviations.
            assert!((v - 10.0).abs() < 1.2);
        }
    }

    #[test]
    fn test_empirical_sampler_frequencies() {
        let mut rng = StdRng::seed_from_u64(3);
        let sampler = FeatureSampler::fit(vec![2.0, 1.0, 2.0, 2.0], FeatureSpec::Nominal);
        let n = 4000;
        let twos = (0..n).filter(|_| sampler.sample(&mut rng) == 2.0).count();
        let ones = (0..n).filter(|_| sampler.sample(&mut rng) == 1.0).count();
        assert!((twos as f64 / n as f64 - 0.75).abs() < 0.05);
        assert!((ones as f64 / n as f64 - 0.25).abs() < 0.05);
    }

    #[test]
    fn test_generator_assembles_positionally() {
        let mut rng = StdRng::seed_from_u64(4);
        // Column 0 is discrete with a single value, column 1 continuous.
        let data = vec![7.0, 7.0, 7.0, 100.0, 101.0, 102.0];
        let m = Matrix::new(&data, 3, 2);
        let g = Generator::fit(&m, &[0, 2], &[FeatureSpec::Discrete, FeatureSpec::Continuous]).unwrap();
        assert_eq!(g.training_idx, vec![0, 2]);
        let x = g.generate(&mut rng);
        assert_eq!(x.len(), 2);
        assert_eq!(x[0], 7.0);
        assert!(x[1] > 95.0 && x[1] < 107.0);
        assert!(Generator::fit(&m, &[], &[FeatureSpec::Discrete, FeatureSpec::Continuous]).is_err());
    }

    #[test]
    fn test_top_up() {
        let mut rng = StdRng::seed_from_u64(5);
        let data: Vec<f64> = (0..15).map(|i| i as f64).collect();
        let m = Matrix::new(&data, 15, 1);
        let generator = Generator::fit(&m, &m.index, &[FeatureSpec::Continuous]).unwrap();
        let oracle_calls = Cell::new(0);
        let oracle = |batch: &Matrix<f64>| -> Vec<usize> {
            oracle_calls.set(oracle_calls.get() + 1);
            batch.get_col(0).iter().map(|v| usize::from(*v > 7.0)).collect()
        };

        let min_sample = 20;
        let n = top_up_size(min_sample, 25);
        let (gen, targets) = draw_sample(&generator, &[], n, &oracle, 100, &mut rng).unwrap();
        assert_eq!(gen.rows, 0);
        assert!(targets.is_empty());
        assert_eq!(oracle_calls.get(), 0);

        let n = top_up_size(min_sample, min_sample - 5);
        let (gen, targets) = draw_sample(&generator, &[], n, &oracle, 100, &mut rng).unwrap();
        assert_eq!(gen.rows, 5);
        assert_eq!(targets.len(), 5);
        assert_eq!(oracle_calls.get(), 1);
        for (row, t) in gen.row_iter().zip(&targets) {
            assert_eq!(*t, usize::from(row[0] > 7.0));
        }
    }
}
