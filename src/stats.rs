//! Statistical Hypothesis Testing
//!
//! Two-sample tests used to decide whether a child node's training data is
//! distributed like the data its parent's generator was fit on.
//!
//! # Tests
//!
//! - **chi-square**: homogeneity of two discrete samples (2 x k contingency table)
//! - **Kolmogorov-Smirnov**: equality of two continuous samples
use crate::constants::{GAMMA_EPS, GAMMA_ITERATION_LIMIT, KS_SERIES_TERMS};
use crate::data::Matrix;
use crate::feature::FeatureSpec;
use hashbrown::HashMap;
use log::debug;

/// Result of a chi-square test.
#[derive(Debug, Clone)]
pub struct ChiSquareResult {
    /// Chi-square statistic
    pub statistic: f64,

    /// p-value
    pub pvalue: f64,

    /// Degrees of freedom
    pub df: usize,
}

/// Result of a two-sample Kolmogorov-Smirnov test.
#[derive(Debug, Clone)]
pub struct KsResult {
    /// Largest distance between the two empirical CDFs.
    pub statistic: f64,

    /// p-value (asymptotic)
    pub pvalue: f64,
}

/// Chi-square test of homogeneity for two rows of observed counts over the
/// same `k` categories.
///
/// Returns `None` when the test is undefined: fewer than two categories, or
/// one of the rows is empty.
pub fn chi2_homogeneity(a: &[f64], b: &[f64]) -> Option<ChiSquareResult> {
    if a.len() != b.len() {
        return None;
    }
    // Categories observed in neither sample carry no information.
    let cols: Vec<(f64, f64)> = a.iter().zip(b).map(|(x, y)| (*x, *y)).filter(|(x, y)| x + y > 0.0).collect();
    let k = cols.len();
    if k < 2 {
        return None;
    }
    let total_a: f64 = cols.iter().map(|c| c.0).sum();
    let total_b: f64 = cols.iter().map(|c| c.1).sum();
    if total_a <= 0.0 || total_b <= 0.0 {
        return None;
    }
    let n = total_a + total_b;

    let statistic = cols
        .iter()
        .map(|(x, y)| {
            let col = x + y;
            let e_a = total_a * col / n;
            let e_b = total_b * col / n;
            (x - e_a).powi(2) / e_a + (y - e_b).powi(2) / e_b
        })
        .sum::<f64>();

    let df = k - 1;
    Some(ChiSquareResult {
        statistic,
        pvalue: chi_square_sf(statistic, df),
        df,
    })
}

/// Two-sample Kolmogorov-Smirnov test. Returns `None` if either sample is empty.
pub fn ks_2samp(x: &[f64], y: &[f64]) -> Option<KsResult> {
    if x.is_empty() || y.is_empty() {
        return None;
    }
    let mut x = x.to_vec();
    let mut y = y.to_vec();
    x.sort_by(|a, b| a.total_cmp(b));
    y.sort_by(|a, b| a.total_cmp(b));
    let (n1, n2) = (x.len(), y.len());

    let (mut j1, mut j2) = (0, 0);
    let (mut f1, mut f2) = (0.0, 0.0);
    let mut d: f64 = 0.0;
    while j1 < n1 && j2 < n2 {
        let d1 = x[j1];
        let d2 = y[j2];
        if d1 <= d2 {
            while j1 < n1 && x[j1] == d1 {
                j1 += 1;
            }
            f1 = j1 as f64 / n1 as f64;
        }
        if d2 <= d1 {
            while j2 < n2 && y[j2] == d2 {
                j2 += 1;
            }
            f2 = j2 as f64 / n2 as f64;
        }
        d = d.max((f2 - f1).abs());
    }

    let en = ((n1 * n2) as f64 / (n1 + n2) as f64).sqrt();
    let pvalue = kolmogorov_sf((en + 0.12 + 0.11 / en) * d);
    Some(KsResult { statistic: d, pvalue })
}

/// Survival function of the Kolmogorov distribution, `P(K > lambda)`.
pub fn kolmogorov_sf(lambda: f64) -> f64 {
    let a2 = -2.0 * lambda * lambda;
    let mut fac = 2.0;
    let mut sum = 0.0;
    let mut term_prev: f64 = 0.0;
    for j in 1..=KS_SERIES_TERMS {
        let term = fac * (a2 * (j * j) as f64).exp();
        sum += term;
        if term.abs() <= 0.001 * term_prev || term.abs() <= 1e-8 * sum {
            return sum.clamp(0.0, 1.0);
        }
        fac = -fac;
        term_prev = term.abs();
    }
    // The series does not converge for small lambda, where the tail mass is 1.
    1.0
}

/// Upper tail probability of the chi-square distribution.
pub fn chi_square_sf(statistic: f64, df: usize) -> f64 {
    if statistic <= 0.0 || df == 0 {
        return 1.0;
    }
    regularized_gamma_q(df as f64 / 2.0, statistic / 2.0)
}

/// Natural log of the gamma function (Lanczos approximation), `x > 0`.
pub fn ln_gamma(x: f64) -> f64 {
    const COF: [f64; 6] = [
        76.18009172947146,
        -86.50532032941677,
        24.01409824083091,
        -1.231739572450155,
        0.1208650973866179e-2,
        -0.5395239384953e-5,
    ];
    let mut y = x;
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let mut ser = 1.000000000190015;
    for c in COF {
        y += 1.0;
        ser += c / y;
    }
    -tmp + (2.5066282746310005 * ser / x).ln()
}

/// Regularized upper incomplete gamma function `Q(a, x)`.
pub fn regularized_gamma_q(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    if x < a + 1.0 {
        (1.0 - gamma_series(a, x)).clamp(0.0, 1.0)
    } else {
        gamma_continued_fraction(a, x).clamp(0.0, 1.0)
    }
}

/// Series expansion of the regularized lower incomplete gamma function `P(a, x)`.
fn gamma_series(a: f64, x: f64) -> f64 {
    let mut ap = a;
    let mut del = 1.0 / a;
    let mut sum = del;
    for _ in 0..GAMMA_ITERATION_LIMIT {
        ap += 1.0;
        del *= x / ap;
        sum += del;
        if del.abs() < sum.abs() * GAMMA_EPS {
            break;
        }
    }
    sum * (-x + a * x.ln() - ln_gamma(a)).exp()
}

/// Continued fraction (modified Lentz) for `Q(a, x)`.
fn gamma_continued_fraction(a: f64, x: f64) -> f64 {
    const FPMIN: f64 = 1e-300;
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / FPMIN;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..GAMMA_ITERATION_LIMIT {
        let an = -(i as f64) * (i as f64 - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = b + an / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < GAMMA_EPS {
            break;
        }
    }
    (-x + a * x.ln() - ln_gamma(a)).exp() * h
}

/// Observed frequencies of two samples over the union of their values.
fn paired_frequencies(a: &[f64], b: &[f64]) -> (Vec<f64>, Vec<f64>) {
    // Keyed on the bit pattern, with -0.0 folded into 0.0.
    let key = |v: f64| if v == 0.0 { 0u64 } else { v.to_bits() };
    let mut table: HashMap<u64, (f64, f64)> = HashMap::new();
    for v in a {
        table.entry(key(*v)).or_insert((0.0, 0.0)).0 += 1.0;
    }
    for v in b {
        table.entry(key(*v)).or_insert((0.0, 0.0)).1 += 1.0;
    }
    // Fixed order keeps the statistic reproducible across runs.
    let mut entries: Vec<(u64, (f64, f64))> = table.into_iter().collect();
    entries.sort_unstable_by_key(|(k, _)| *k);
    entries.into_iter().map(|(_, v)| v).unzip()
}

/// Outcome of comparing two row sets feature by feature.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionTest {
    /// Smallest p-value over the tested features.
    pub min_p: f64,
    /// Number of features that produced a valid test.
    pub n_tests: usize,
}

/// Decides whether two subsets of the training data come from the same
/// distribution, using a Bonferroni correction over the per-feature tests.
#[derive(Debug, Clone, Copy)]
pub struct DistributionTester {
    pub alpha: f64,
}

impl DistributionTester {
    pub fn new(alpha: f64) -> Self {
        DistributionTester { alpha }
    }

    /// Run the per-feature tests: chi-square for discrete features (skipped when
    /// only one distinct value is present), Kolmogorov-Smirnov for continuous ones.
    pub fn test(&self, data: &Matrix<f64>, feature_spec: &[FeatureSpec], idx_1: &[usize], idx_2: &[usize]) -> DistributionTest {
        let mut min_p: f64 = 1.0;
        let mut n_tests = 0;
        for (j, spec) in feature_spec.iter().enumerate() {
            let s1 = data.gather_col(j, idx_1);
            let s2 = data.gather_col(j, idx_2);
            let p = if spec.is_discrete() {
                let (f1, f2) = paired_frequencies(&s1, &s2);
                chi2_homogeneity(&f1, &f2).map(|r| r.pvalue)
            } else {
                ks_2samp(&s1, &s2).map(|r| r.pvalue)
            };
            if let Some(p) = p {
                min_p = min_p.min(p);
                n_tests += 1;
            }
        }
        DistributionTest { min_p, n_tests }
    }

    /// `true` unless some feature differs significantly after correction.
    pub fn same_distribution(
        &self,
        data: &Matrix<f64>,
        feature_spec: &[FeatureSpec],
        idx_1: &[usize],
        idx_2: &[usize],
    ) -> bool {
        let result = self.test(data, feature_spec, idx_1, idx_2);
        let different = result.n_tests > 0 && result.min_p < self.alpha / result.n_tests as f64;
        debug!(
            "Distribution test over {} features: min p {:.4}, different: {}",
            result.n_tests, result.min_p, different
        );
        !different
    }
}
