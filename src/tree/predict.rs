use crate::data::{Matrix, RowMajorMatrix};
use crate::errors::TrepanError;
use crate::node::{Node, NodeKind};
use crate::tree::tree::Tree;
use log::error;
use rayon::prelude::*;

impl Tree {
    /// Child of an internal node whose constraint accepts `row`. Exactly one
    /// child must match.
    pub fn pick_branch(&self, node: &Node, row: &[f64]) -> Result<usize, TrepanError> {
        let NodeKind::Internal { split, children } = &node.kind else {
            return Ok(node.num);
        };
        let mut matched = split.iter().zip(children).filter(|(c, _)| c.test(row)).map(|(_, child)| *child);
        let first = matched.next();
        let n_matches = usize::from(first.is_some()) + matched.count();
        match (first, n_matches) {
            (Some(child), 1) => Ok(child),
            (None, _) => {
                error!("No branch of node {} ({}) matches data vector {:?}", node.num, node, row);
                Err(TrepanError::NoMatchingBranch {
                    node: node.num,
                    row: row.to_vec(),
                })
            }
            (Some(_), matches) => {
                error!(
                    "{} branches of node {} ({}) match data vector {:?}",
                    matches, node.num, node, row
                );
                Err(TrepanError::AmbiguousBranch {
                    node: node.num,
                    row: row.to_vec(),
                    matches,
                })
            }
        }
    }

    /// Leaf reached by a single row.
    pub fn predict_node_row(&self, row: &[f64]) -> Result<usize, TrepanError> {
        let mut node_idx = 0;
        loop {
            let node = self.nodes.get(node_idx).ok_or(TrepanError::NotFitted)?;
            if node.is_leaf() {
                return Ok(node_idx);
            }
            node_idx = self.pick_branch(node, row)?;
        }
    }

    /// Route a batch of rows down from `node_idx`, partitioning it at every
    /// internal node, and record the leaf reached by each row.
    fn route_batch(&self, data: &Matrix<f64>, node_idx: usize, rows: Vec<usize>, leaves: &mut [usize]) -> Result<(), TrepanError> {
        let node = self.nodes.get(node_idx).ok_or(TrepanError::NotFitted)?;
        let children = node.children();
        if children.is_empty() {
            rows.iter().for_each(|r| leaves[*r] = node_idx);
            return Ok(());
        }
        let mut partition: Vec<Vec<usize>> = vec![Vec::new(); children.len()];
        for r in rows {
            let child = self.pick_branch(node, &data.get_row(r))?;
            if let Some(position) = children.iter().position(|c| *c == child) {
                partition[position].push(r);
            }
        }
        for (child, part) in children.iter().zip(partition) {
            if !part.is_empty() {
                self.route_batch(data, *child, part, leaves)?;
            }
        }
        Ok(())
    }

    fn predict_nodes_single_threaded(&self, data: &Matrix<f64>) -> Result<Vec<usize>, TrepanError> {
        let mut leaves = vec![0; data.rows];
        self.route_batch(data, 0, data.index.clone(), &mut leaves)?;
        Ok(leaves)
    }

    fn predict_nodes_parallel(&self, data: &Matrix<f64>) -> Result<Vec<usize>, TrepanError> {
        data.index
            .par_iter()
            .map(|i| self.predict_node_row(&data.get_row(*i)))
            .collect()
    }

    /// Index of the leaf reached by every row of `data`.
    pub fn predict_nodes(&self, data: &Matrix<f64>, parallel: bool) -> Result<Vec<usize>, TrepanError> {
        if self.nodes.is_empty() {
            return Err(TrepanError::NotFitted);
        }
        if parallel {
            self.predict_nodes_parallel(data)
        } else {
            self.predict_nodes_single_threaded(data)
        }
    }

    /// Prediction of the leaf reached by every row of `data`.
    pub fn predict(&self, data: &Matrix<f64>, parallel: bool) -> Result<Vec<usize>, TrepanError> {
        let leaves = self.predict_nodes(data, parallel)?;
        Ok(leaves.iter().map(|l| self.nodes[*l].prediction).collect())
    }

    /// Class frequencies of the leaf reached by every row, one row per instance
    /// and one column per class.
    pub fn predict_proba(&self, data: &Matrix<f64>, parallel: bool) -> Result<RowMajorMatrix<f64>, TrepanError> {
        let leaves = self.predict_nodes(data, parallel)?;
        let mut proba = RowMajorMatrix::empty(self.n_classes.max(1));
        for l in leaves {
            let mut p = self.nodes[l].probabilities(self.n_classes);
            p.resize(self.n_classes.max(1), 0.0);
            proba.append_row(p);
        }
        Ok(proba)
    }
}
