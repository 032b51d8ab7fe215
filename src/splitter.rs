//! Splitter
//!
//! Candidate split enumeration and scoring. A split is an ordered list of
//! constraints, one per child, that partitions the node's region.
use crate::constraints::Constraint;
use crate::data::RowMajorMatrix;
use crate::feature::FeatureSpec;
use crate::mofn::{construct_m_of_n_split, SignificanceGate};
use crate::utils::{entropy, entropy_of_counts, label_counts};
use log::debug;

/// Child constraints of a split, in child order.
pub type Split = Vec<Constraint>;

/// Strategy used to pick the split applied when a node is expanded.
pub trait Splitter {
    /// Construct the split for a node from its real and synthetic instances.
    /// Returns `None` when no split improves on the node.
    fn construct_split(&self, rows: &RowMajorMatrix<f64>, targets: &[usize], feature_spec: &[FeatureSpec]) -> Option<Split>;
}

/// Threshold candidates at the class boundaries of a continuous feature.
///
/// Values are sorted and grouped; a cut is placed halfway between two
/// consecutive distinct values unless both groups are pure in the same class.
pub fn fayyad_thresholds(rows: &RowMajorMatrix<f64>, targets: &[usize], feature: usize) -> Vec<Split> {
    let mut pairs: Vec<(f64, usize)> = rows.row_iter().zip(targets).map(|(r, t)| (r[feature], *t)).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    // (value, Some(label) if every row with this value has the same label)
    let mut groups: Vec<(f64, Option<usize>)> = Vec::new();
    for (value, label) in pairs {
        match groups.last_mut() {
            Some((v, pure)) if *v == value => {
                if *pure != Some(label) {
                    *pure = None;
                }
            }
            _ => groups.push((value, Some(label))),
        }
    }

    groups
        .windows(2)
        .filter(|w| !(w[0].1.is_some() && w[0].1 == w[1].1))
        .map(|w| {
            let value = (w[0].0 + w[1].0) / 2.0;
            vec![
                Constraint::LessOrEqual { feature, value },
                Constraint::GreaterThan { feature, value },
            ]
        })
        .collect()
}

/// One-vs-rest candidates for a discrete feature, one per observed value.
pub fn one_vs_all(rows: &RowMajorMatrix<f64>, feature: usize) -> Vec<Split> {
    let mut values: Vec<f64> = rows.row_iter().map(|r| r[feature]).collect();
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup();
    if values.len() < 2 {
        return Vec::new();
    }
    values
        .into_iter()
        .map(|value| {
            vec![
                Constraint::Equal { feature, value },
                Constraint::NotEqual { feature, value },
            ]
        })
        .collect()
}

/// All primitive candidate splits over every feature, in feature order.
pub fn make_split_candidates(rows: &RowMajorMatrix<f64>, targets: &[usize], feature_spec: &[FeatureSpec]) -> Vec<Split> {
    let mut result = Vec::new();
    for (j, spec) in feature_spec.iter().enumerate() {
        if spec.is_discrete() {
            result.extend(one_vs_all(rows, j));
        } else {
            result.extend(fayyad_thresholds(rows, targets, j));
        }
    }
    result
}

/// Information gain of a split: parent entropy minus the size-weighted
/// entropy of the children.
pub fn split_score(split: &[Constraint], rows: &RowMajorMatrix<f64>, targets: &[usize]) -> f64 {
    let n = targets.len();
    if n == 0 {
        return 0.0;
    }
    let children_entropy: f64 = split
        .iter()
        .map(|c| {
            let counts = label_counts(rows.row_iter().zip(targets).filter(|(r, _)| c.test(r)).map(|(_, t)| t));
            let n_child: usize = counts.values().sum();
            n_child as f64 / n as f64 * entropy_of_counts(counts.into_values())
        })
        .sum();
    entropy(targets) - children_entropy
}

/// Highest scoring candidate with strictly positive gain, the first one found wins ties.
pub fn best_split(candidates: &[Split], rows: &RowMajorMatrix<f64>, targets: &[usize]) -> Option<(f64, Split)> {
    let mut best: Option<(f64, &Split)> = None;
    for split in candidates {
        let score = split_score(split, rows, targets);
        let best_score = best.map_or(0.0, |b| b.0);
        if score > best_score {
            best = Some((score, split));
        }
    }
    best.map(|(s, split)| (s, split.clone()))
}

/// Trepan's split construction: the best primitive split, optionally refined
/// into an m-of-n split by beam search.
pub struct TrepanSplitter<'g, G: SignificanceGate + ?Sized> {
    pub use_m_of_n: bool,
    pub beam_width: usize,
    pub gate: &'g G,
}

impl<'g, G: SignificanceGate + ?Sized> TrepanSplitter<'g, G> {
    pub fn new(use_m_of_n: bool, beam_width: usize, gate: &'g G) -> Self {
        TrepanSplitter {
            use_m_of_n,
            beam_width,
            gate,
        }
    }
}

impl<'g, G: SignificanceGate + ?Sized> Splitter for TrepanSplitter<'g, G> {
    fn construct_split(&self, rows: &RowMajorMatrix<f64>, targets: &[usize], feature_spec: &[FeatureSpec]) -> Option<Split> {
        let candidates = make_split_candidates(rows, targets, feature_spec);
        let (score, split) = best_split(&candidates, rows, targets)?;
        debug!(
            "Best of {} candidate splits has gain {:.4}: {}",
            candidates.len(),
            score,
            split[0]
        );
        if self.use_m_of_n {
            Some(construct_m_of_n_split(
                split,
                score,
                &candidates,
                rows,
                targets,
                self.beam_width,
                self.gate,
            ))
        } else {
            Some(split)
        }
    }
}
