use serde::Deserialize;
use serde::Serialize;

use crate::errors::TrepanError;
use crate::node::{compare_nodes, SplittableNode};
use std::cmp::Ordering;
use std::collections::VecDeque;

/// Trait for handling the growth of the tree.
pub trait Grower {
    /// Add a node to the grower.
    fn add_node(&mut self, node: SplittableNode) -> Result<(), TrepanError>;
    /// Get the next node to split, `None` once the grower is empty.
    fn get_next_node(&mut self) -> Option<SplittableNode>;
    /// Check if the grower is empty.
    fn is_empty(&self) -> bool;
    fn len(&self) -> usize;
}

/// Priority queue on the fidelity-coverage score: the node with the most
/// negative score is expanded first, equal scores in insertion order.
#[derive(Debug, Default)]
pub struct FidelityQueue {
    // Descending score, next node at the end.
    nodes: Vec<SplittableNode>,
}

impl FidelityQueue {
    pub fn new() -> Self {
        FidelityQueue { nodes: Vec::new() }
    }
}

impl Grower for FidelityQueue {
    fn add_node(&mut self, node: SplittableNode) -> Result<(), TrepanError> {
        if node.score.is_none() {
            return Err(TrepanError::UnscoredNode(node.num));
        }
        let mut position = self.nodes.len();
        for (i, queued) in self.nodes.iter().enumerate() {
            if compare_nodes(queued, &node)? != Ordering::Greater {
                position = i;
                break;
            }
        }
        self.nodes.insert(position, node);
        Ok(())
    }

    fn get_next_node(&mut self) -> Option<SplittableNode> {
        self.nodes.pop()
    }

    fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }
}

impl Grower for VecDeque<SplittableNode> {
    fn add_node(&mut self, node: SplittableNode) -> Result<(), TrepanError> {
        self.push_front(node);
        Ok(())
    }

    fn get_next_node(&mut self) -> Option<SplittableNode> {
        self.pop_back()
    }

    fn is_empty(&self) -> bool {
        self.is_empty()
    }

    fn len(&self) -> usize {
        VecDeque::len(self)
    }
}

/// Policy for growing the tree.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub enum GrowPolicy {
    /// Expand the node losing the most coverage to infidelity first.
    #[default]
    FidelityCoverage,
    /// Expand nodes level by level.
    BreadthFirst,
}

impl GrowPolicy {
    pub fn grower(&self) -> Box<dyn Grower> {
        match self {
            GrowPolicy::FidelityCoverage => Box::new(FidelityQueue::new()),
            GrowPolicy::BreadthFirst => Box::new(VecDeque::<SplittableNode>::new()),
        }
    }
}
