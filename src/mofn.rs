//! M-of-N refinement
//!
//! Local beam search that generalises the best primitive split into an
//! m-of-n test. Every split handled here is a two-way split whose first
//! branch is the m-of-n test and whose second branch is its complement.
use crate::constraints::Constraint;
use crate::data::RowMajorMatrix;
use crate::splitter::{split_score, Split};
use crate::stats::chi2_homogeneity;
use crate::utils::label_counts;
use log::debug;
use std::collections::BTreeMap;

/// Decides whether a neighbouring split differs enough from the split it was
/// derived from to be worth scoring.
pub trait SignificanceGate {
    fn is_significant(&self, neighbor: &[Constraint], source: &[Constraint], rows: &RowMajorMatrix<f64>, targets: &[usize]) -> bool;
}

impl<F> SignificanceGate for F
where
    F: Fn(&[Constraint], &[Constraint], &RowMajorMatrix<f64>, &[usize]) -> bool,
{
    fn is_significant(&self, neighbor: &[Constraint], source: &[Constraint], rows: &RowMajorMatrix<f64>, targets: &[usize]) -> bool {
        self(neighbor, source, rows, targets)
    }
}

/// Chi-square homogeneity test over the class counts of the instances that
/// fall in the first branch of each split.
#[derive(Debug, Clone, Copy)]
pub struct ChiSquareGate {
    pub alpha: f64,
}

impl ChiSquareGate {
    pub fn new(alpha: f64) -> Self {
        ChiSquareGate { alpha }
    }
}

fn selected_counts(constraint: &Constraint, rows: &RowMajorMatrix<f64>, targets: &[usize]) -> BTreeMap<usize, usize> {
    label_counts(
        rows.row_iter()
            .zip(targets)
            .filter(|(r, _)| constraint.test(r))
            .map(|(_, t)| t),
    )
}

impl SignificanceGate for ChiSquareGate {
    fn is_significant(&self, neighbor: &[Constraint], source: &[Constraint], rows: &RowMajorMatrix<f64>, targets: &[usize]) -> bool {
        let (Some(n), Some(s)) = (neighbor.first(), source.first()) else {
            return false;
        };
        let a = selected_counts(n, rows, targets);
        let b = selected_counts(s, rows, targets);
        let mut classes: Vec<usize> = a.keys().chain(b.keys()).copied().collect();
        classes.sort_unstable();
        classes.dedup();
        let table_a: Vec<f64> = classes.iter().map(|c| *a.get(c).unwrap_or(&0) as f64).collect();
        let table_b: Vec<f64> = classes.iter().map(|c| *b.get(c).unwrap_or(&0) as f64).collect();
        match chi2_homogeneity(&table_a, &table_b) {
            Some(result) => result.pvalue < self.alpha,
            None => false,
        }
    }
}

/// Build the two-way split for an m-of-n test. A 1-of-1 test is kept as the
/// primitive comparison and its negation.
pub fn m_of_n_split(m: usize, mut tests: Vec<Constraint>) -> Split {
    if m == 1 && tests.len() == 1 {
        if let Some(test) = tests.pop() {
            let negated = test.negate();
            return vec![test, negated];
        }
    }
    let positive = Constraint::MofN { m, tests };
    let negative = positive.negate();
    vec![positive, negative]
}

/// Neighbouring m-of-n splits of `split`, drawing new tests from every
/// constraint of the candidate pool.
///
/// Moves: add a test keeping `m`, add a test with `m + 1`, remove a test
/// (clamping `m` to the new size), and `m + 1` / `m - 1`.
pub fn neighboring_tests(split: &[Constraint], candidates: &[Split]) -> Vec<Split> {
    let Some((m, tests)) = split.first().and_then(|c| c.as_m_of_n()) else {
        return Vec::new();
    };
    let n = tests.len();
    let mut neighbors = Vec::new();

    for literal in candidates.iter().flatten() {
        if tests.contains(literal) {
            continue;
        }
        let mut extended = tests.clone();
        extended.push(literal.clone());
        neighbors.push(m_of_n_split(m, extended.clone()));
        neighbors.push(m_of_n_split(m + 1, extended));
    }

    if n > 1 {
        for i in 0..n {
            let mut reduced = tests.clone();
            reduced.remove(i);
            neighbors.push(m_of_n_split(m.min(n - 1), reduced));
        }
    }

    if m < n {
        neighbors.push(m_of_n_split(m + 1, tests.clone()));
    }
    if m > 1 {
        neighbors.push(m_of_n_split(m - 1, tests));
    }
    neighbors
}

/// Beam search over m-of-n neighbours, seeded with the best primitive split.
///
/// Stops once a full pass over the beam changes nothing and returns the
/// highest scoring split, the earliest entry winning ties.
pub fn construct_m_of_n_split<G: SignificanceGate + ?Sized>(
    best_split: Split,
    best_score: f64,
    candidates: &[Split],
    rows: &RowMajorMatrix<f64>,
    targets: &[usize],
    beam_width: usize,
    gate: &G,
) -> Split {
    let mut beam: Vec<(f64, Split)> = vec![(best_score, best_split)];
    let mut passes = 0;

    loop {
        passes += 1;
        let mut changed = false;
        let snapshot: Vec<Split> = beam.iter().map(|(_, s)| s.clone()).collect();
        for source in &snapshot {
            for neighbor in neighboring_tests(source, candidates) {
                if beam.iter().any(|(_, s)| *s == neighbor) {
                    continue;
                }
                if !gate.is_significant(&neighbor, source, rows, targets) {
                    continue;
                }
                let score = split_score(&neighbor, rows, targets);
                if beam.len() < beam_width {
                    beam.push((score, neighbor));
                    changed = true;
                    continue;
                }
                let (worst, worst_score) = beam
                    .iter()
                    .enumerate()
                    .fold((0, f64::INFINITY), |acc, (i, (s, _))| if *s < acc.1 { (i, *s) } else { acc });
                if score > worst_score {
                    beam[worst] = (score, neighbor);
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }

    let mut best = 0;
    for (i, (score, _)) in beam.iter().enumerate() {
        if *score > beam[best].0 {
            best = i;
        }
    }
    let (score, split) = beam.swap_remove(best);
    debug!("M-of-n search finished after {} passes with gain {:.4}: {}", passes, score, split[0]);
    split
}
