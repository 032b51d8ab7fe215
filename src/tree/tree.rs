use crate::constraints::Constraint;
use crate::data::{Matrix, RowMajorMatrix};
use crate::errors::TrepanError;
use crate::feature::FeatureSpec;
use crate::grower::Grower;
use crate::node::{Node, NodeKind, SplittableNode};
use crate::oracle::Oracle;
use crate::sampler::{draw_sample, top_up_size, Generator};
use crate::splitter::Splitter;
use crate::stats::DistributionTester;
use crate::utils::{label_counts, merge_counts, mode};
use log::{debug, error, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::max;
use std::fmt::{self, Display};

#[derive(Deserialize, Serialize, Clone, Copy, PartialEq, Debug)]
pub enum TreeStopper {
    /// Every frontier node was expanded or found pure.
    QueueExhausted,
    /// The node budget was reached with nodes left to expand.
    MaxNodes,
}

/// Settings of a single induction run.
#[derive(Debug, Clone, Copy)]
pub struct GrowthParams {
    pub max_tree_size: usize,
    pub min_sample: usize,
    pub max_attempts: usize,
    pub dist_test_alpha: f64,
}

/// Explanation tree. Nodes live in `nodes` at the index given by their `num`,
/// generators are shared between nodes by index into `generators`.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Tree {
    pub nodes: Vec<Node>,
    pub generators: Vec<Generator>,
    pub stopper: TreeStopper,
    pub depth: usize,
    pub n_leaves: usize,
    pub n_classes: usize,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        Tree {
            nodes: Vec::new(),
            generators: Vec::new(),
            stopper: TreeStopper::QueueExhausted,
            depth: 0,
            n_leaves: 0,
            n_classes: 0,
        }
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    /// Grow the tree best-first from the rows of `data`, whose oracle labels are `targets`.
    #[allow(clippy::too_many_arguments)]
    pub fn fit<T, O, R>(
        &mut self,
        data: &Matrix<f64>,
        targets: &[usize],
        feature_spec: &[FeatureSpec],
        splitter: &T,
        oracle: &O,
        growable: &mut dyn Grower,
        params: &GrowthParams,
        rng: &mut R,
    ) -> Result<(), TrepanError>
    where
        T: Splitter + ?Sized,
        O: Oracle + ?Sized,
        R: Rng + ?Sized,
    {
        *self = Tree::new();
        let tester = DistributionTester::new(params.dist_test_alpha);

        self.generators.push(Generator::fit(data, &data.index, feature_spec)?);
        let root = self.create_node(
            0,
            0,
            None,
            Vec::new(),
            data.index.clone(),
            0,
            1.0,
            targets,
            oracle,
            params,
            rng,
        )?;
        let mut n_nodes = 1;
        self.n_leaves = 1;
        self.enqueue_unless_pure(root, growable)?;

        while !growable.is_empty() {
            if n_nodes >= params.max_tree_size {
                warn!(
                    "Node budget of {} reached with {} nodes left to expand",
                    params.max_tree_size,
                    growable.len()
                );
                self.stopper = TreeStopper::MaxNodes;
                break;
            }
            let Some(node) = growable.get_next_node() else {
                break;
            };

            let (rows, labels) = combined_instances(data, targets, &node);
            let Some(split) = splitter.construct_split(&rows, &labels, feature_spec) else {
                debug!("Node {} has no informative split", node.num);
                continue;
            };
            if n_nodes + split.len() > params.max_tree_size {
                warn!(
                    "Node budget of {} reached, a split of node {} into {} would exceed it, {} nodes left to expand",
                    params.max_tree_size,
                    node.num,
                    split.len(),
                    growable.len() + 1
                );
                self.stopper = TreeStopper::MaxNodes;
                break;
            }
            debug!("Splitting node {} on {}", node.num, split[0]);

            let real_rows: Vec<Vec<f64>> = node.training_idx.iter().map(|i| data.get_row(*i)).collect();
            let parent_total = node.training_idx.len() + node.generated.rows;
            let mut children = Vec::with_capacity(split.len());

            for constraint in split.iter() {
                let child_idx: Vec<usize> = node
                    .training_idx
                    .iter()
                    .zip(&real_rows)
                    .filter(|(_, row)| constraint.test(row))
                    .map(|(i, _)| *i)
                    .collect();
                let n_accepted = node.generated.row_iter().filter(|row| constraint.test(row)).count();
                let coverage = if parent_total == 0 {
                    0.0
                } else {
                    (child_idx.len() + n_accepted) as f64 / parent_total as f64 * node.coverage
                };

                let generator = if child_idx.is_empty()
                    || tester.same_distribution(
                        data,
                        feature_spec,
                        &child_idx,
                        &self.generators[node.generator].training_idx,
                    ) {
                    node.generator
                } else {
                    debug!("Fitting a new generator on {} rows", child_idx.len());
                    self.generators.push(Generator::fit(data, &child_idx, feature_spec)?);
                    self.generators.len() - 1
                };

                let mut constraints = node.constraints.clone();
                constraints.push(constraint.clone());
                let child = self.create_node(
                    n_nodes,
                    node.depth + 1,
                    Some(node.num),
                    constraints,
                    child_idx,
                    generator,
                    coverage,
                    targets,
                    oracle,
                    params,
                    rng,
                )?;
                children.push(n_nodes);
                n_nodes += 1;
                self.depth = max(self.depth, node.depth + 1);
                self.enqueue_unless_pure(child, growable)?;
            }

            self.n_leaves += children.len() - 1;
            self.nodes[node.num].make_parent_node(split, children);
        }
        Ok(())
    }

    /// Top up a new node with synthetic instances, label it and record it in the tree.
    #[allow(clippy::too_many_arguments)]
    fn create_node<O, R>(
        &mut self,
        num: usize,
        depth: usize,
        parent_node: Option<usize>,
        constraints: Vec<Constraint>,
        training_idx: Vec<usize>,
        generator: usize,
        coverage: f64,
        targets: &[usize],
        oracle: &O,
        params: &GrowthParams,
        rng: &mut R,
    ) -> Result<SplittableNode, TrepanError>
    where
        O: Oracle + ?Sized,
        R: Rng + ?Sized,
    {
        let n = top_up_size(params.min_sample, training_idx.len());
        let (generated, generated_targets) = draw_sample(
            &self.generators[generator],
            &constraints,
            n,
            oracle,
            params.max_attempts,
            rng,
        )
        .map_err(|e| {
            let path: Vec<String> = constraints.iter().map(|c| c.to_string()).collect();
            error!("Unable to top up node {} in region [{}]: {}", num, path.join(", "), e);
            e
        })?;

        let training_target_counts = label_counts(training_idx.iter().map(|i| &targets[*i]));
        let generated_target_counts = label_counts(&generated_targets);
        let all_counts = merge_counts(&training_target_counts, &generated_target_counts);
        let prediction = mode(&all_counts).unwrap_or(0);
        let total: usize = all_counts.values().sum();
        let fidelity = if total == 0 {
            1.0
        } else {
            *all_counts.get(&prediction).unwrap_or(&0) as f64 / total as f64
        };
        let score = match parent_node {
            None => 0.0,
            Some(_) => -coverage * (1.0 - fidelity),
        };
        if let Some(max_label) = all_counts.keys().next_back() {
            self.n_classes = max(self.n_classes, max_label + 1);
        }

        self.nodes.push(Node {
            num,
            depth,
            parent_node,
            local_constraint: constraints.last().cloned(),
            generator,
            prediction,
            fidelity,
            coverage,
            score,
            n_training: training_idx.len(),
            n_generated: generated.rows,
            training_target_counts,
            generated_target_counts,
            kind: NodeKind::Leaf,
        });

        Ok(SplittableNode {
            num,
            score: Some(score),
            depth,
            constraints,
            training_idx,
            generator,
            generated,
            generated_targets,
            coverage,
        })
    }

    fn enqueue_unless_pure(&self, node: SplittableNode, growable: &mut dyn Grower) -> Result<(), TrepanError> {
        let tree_node = &self.nodes[node.num];
        let pure = tree_node
            .training_target_counts
            .keys()
            .all(|label| *label == tree_node.prediction);
        if pure {
            debug!("Node {} is pure, not expanding", node.num);
            Ok(())
        } else {
            growable.add_node(node)
        }
    }

    /// Constraints on the path from the root to node `num`.
    pub fn constraints(&self, num: usize) -> Vec<Constraint> {
        let mut path = Vec::new();
        let mut current = self.nodes.get(num);
        while let Some(node) = current {
            if let Some(c) = &node.local_constraint {
                path.push(c.clone());
            }
            current = node.parent_node.and_then(|p| self.nodes.get(p));
        }
        path.reverse();
        path
    }
}

/// Real rows of the node followed by its synthetic rows, with their labels.
fn combined_instances(data: &Matrix<f64>, targets: &[usize], node: &SplittableNode) -> (RowMajorMatrix<f64>, Vec<usize>) {
    let mut rows = RowMajorMatrix::empty(data.cols);
    let mut labels = Vec::with_capacity(node.training_idx.len() + node.generated_targets.len());
    for i in &node.training_idx {
        rows.append_row(data.get_row(*i));
        labels.push(targets[*i]);
    }
    rows.append_row(node.generated.data.clone());
    labels.extend(&node.generated_targets);
    (rows, labels)
}

impl Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut print_buffer: Vec<usize> = if self.nodes.is_empty() { Vec::new() } else { vec![0] };
        let mut r = String::new();
        while let Some(idx) = print_buffer.pop() {
            let node = &self.nodes[idx];
            r += format!("{}{}\n", "      ".repeat(node.depth).as_str(), node).as_str();
            print_buffer.extend(node.children().iter().rev());
        }
        write!(f, "{}", r)
    }
}
