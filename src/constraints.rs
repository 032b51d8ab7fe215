//! Constraints
//!
//! Testable predicates over a feature vector. Constraints label the edges of
//! the explanation tree: a node's region is the conjunction of the constraints
//! on the path from the root.
use serde::{Deserialize, Serialize};
use std::fmt;

/// A predicate over a single feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
    /// `x[feature] > value`
    GreaterThan { feature: usize, value: f64 },
    /// `x[feature] <= value`
    LessOrEqual { feature: usize, value: f64 },
    /// `x[feature] == value`
    Equal { feature: usize, value: f64 },
    /// `x[feature] != value`
    NotEqual { feature: usize, value: f64 },
    /// At least `m` of the `tests` hold.
    MofN { m: usize, tests: Vec<Constraint> },
    /// Complement of the inner constraint. Used as the second branch of m-of-n splits.
    Not(Box<Constraint>),
}

impl Constraint {
    /// Evaluate the constraint on a feature vector.
    pub fn test(&self, row: &[f64]) -> bool {
        match self {
            Constraint::GreaterThan { feature, value } => row[*feature] > *value,
            Constraint::LessOrEqual { feature, value } => row[*feature] <= *value,
            Constraint::Equal { feature, value } => row[*feature] == *value,
            Constraint::NotEqual { feature, value } => row[*feature] != *value,
            Constraint::MofN { m, tests } => {
                let mut satisfied = 0;
                for t in tests {
                    if t.test(row) {
                        satisfied += 1;
                        if satisfied >= *m {
                            return true;
                        }
                    }
                }
                // Only reachable with m == 0 when there are no tests.
                satisfied >= *m
            }
            Constraint::Not(inner) => !inner.test(row),
        }
    }

    /// The constraint that holds exactly where this one does not.
    pub fn negate(&self) -> Constraint {
        match self {
            Constraint::GreaterThan { feature, value } => Constraint::LessOrEqual {
                feature: *feature,
                value: *value,
            },
            Constraint::LessOrEqual { feature, value } => Constraint::GreaterThan {
                feature: *feature,
                value: *value,
            },
            Constraint::Equal { feature, value } => Constraint::NotEqual {
                feature: *feature,
                value: *value,
            },
            Constraint::NotEqual { feature, value } => Constraint::Equal {
                feature: *feature,
                value: *value,
            },
            Constraint::Not(inner) => (**inner).clone(),
            Constraint::MofN { .. } => Constraint::Not(Box::new(self.clone())),
        }
    }

    /// Single-feature comparisons.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Constraint::GreaterThan { .. }
                | Constraint::LessOrEqual { .. }
                | Constraint::Equal { .. }
                | Constraint::NotEqual { .. }
        )
    }

    /// Sorted, de-duplicated list of the features the constraint reads.
    pub fn features(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect_features(&mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    fn collect_features(&self, out: &mut Vec<usize>) {
        match self {
            Constraint::GreaterThan { feature, .. }
            | Constraint::LessOrEqual { feature, .. }
            | Constraint::Equal { feature, .. }
            | Constraint::NotEqual { feature, .. } => out.push(*feature),
            Constraint::MofN { tests, .. } => tests.iter().for_each(|t| t.collect_features(out)),
            Constraint::Not(inner) => inner.collect_features(out),
        }
    }

    /// `(m, tests)` view of the constraint: primitives are 1-of-1 tests.
    pub fn as_m_of_n(&self) -> Option<(usize, Vec<Constraint>)> {
        match self {
            Constraint::MofN { m, tests } => Some((*m, tests.clone())),
            c if c.is_primitive() => Some((1, vec![c.clone()])),
            _ => None,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::GreaterThan { feature, value } => write!(f, "x{} > {:.4}", feature, value),
            Constraint::LessOrEqual { feature, value } => write!(f, "x{} \u{2264} {:.4}", feature, value),
            Constraint::Equal { feature, value } => write!(f, "x{} = {:.4}", feature, value),
            Constraint::NotEqual { feature, value } => write!(f, "x{} \u{2260} {:.4}", feature, value),
            Constraint::MofN { m, tests } => {
                let parts: Vec<String> = tests.iter().map(|t| t.to_string()).collect();
                write!(f, "{} of {{{}}}", m, parts.join(", "))
            }
            Constraint::Not(inner) => write!(f, "not ({})", inner),
        }
    }
}
