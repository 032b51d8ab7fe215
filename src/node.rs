use crate::constraints::Constraint;
use crate::data::RowMajorMatrix;
use crate::errors::TrepanError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Node of the frontier, waiting to be expanded.
#[derive(Debug, Clone)]
pub struct SplittableNode {
    pub num: usize,
    /// `-coverage * (1 - fidelity)`, `None` until computed.
    pub score: Option<f64>,
    pub depth: usize,
    /// Path from the root, the last entry is the node's own constraint.
    pub constraints: Vec<Constraint>,
    pub training_idx: Vec<usize>,
    /// Index into the tree's generators.
    pub generator: usize,
    pub generated: RowMajorMatrix<f64>,
    pub generated_targets: Vec<usize>,
    pub coverage: f64,
}

/// Order two frontier nodes by score. Fails if either has not been scored.
pub fn compare_nodes(a: &SplittableNode, b: &SplittableNode) -> Result<Ordering, TrepanError> {
    match (a.score, b.score) {
        (Some(x), Some(y)) => Ok(x.total_cmp(&y)),
        (None, _) => Err(TrepanError::UnscoredNode(a.num)),
        (_, None) => Err(TrepanError::UnscoredNode(b.num)),
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub enum NodeKind {
    Leaf,
    Internal {
        /// One constraint per child, in child order.
        split: Vec<Constraint>,
        children: Vec<usize>,
    },
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Node {
    pub num: usize,
    pub depth: usize,
    pub parent_node: Option<usize>,
    /// Constraint on the edge from the parent, `None` at the root.
    pub local_constraint: Option<Constraint>,
    pub generator: usize,
    pub prediction: usize,
    pub fidelity: f64,
    pub coverage: f64,
    pub score: f64,
    pub n_training: usize,
    pub n_generated: usize,
    pub training_target_counts: BTreeMap<usize, usize>,
    pub generated_target_counts: BTreeMap<usize, usize>,
    pub kind: NodeKind,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf)
    }

    pub fn children(&self) -> &[usize] {
        match &self.kind {
            NodeKind::Leaf => &[],
            NodeKind::Internal { children, .. } => children,
        }
    }

    /// Turn a leaf into a parent of `children`, one per constraint of `split`.
    pub fn make_parent_node(&mut self, split: Vec<Constraint>, children: Vec<usize>) {
        self.kind = NodeKind::Internal { split, children };
    }

    /// Class frequencies over the node's real and synthetic instances.
    pub fn probabilities(&self, n_classes: usize) -> Vec<f64> {
        let mut proba = vec![0.0; n_classes];
        let mut total = 0;
        for (label, count) in self.training_target_counts.iter().chain(&self.generated_target_counts) {
            if *label < n_classes {
                proba[*label] += *count as f64;
            }
            total += count;
        }
        if total > 0 {
            proba.iter_mut().for_each(|p| *p /= total as f64);
        }
        proba
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (&self.local_constraint, self.is_leaf()) {
            (None, _) => write!(f, "Root"),
            (Some(c), false) => write!(f, "If {}", c),
            (Some(c), true) => write!(f, "If {} predict {}", c, self.prediction),
        }
    }
}
