pub mod predict;
pub mod tree;

// Unit-testing
#[cfg(test)]
mod tests {
    use crate::constraints::Constraint;
    use crate::data::{Matrix, RowMajorMatrix};
    use crate::errors::TrepanError;
    use crate::feature::FeatureSpec;
    use crate::grower::{FidelityQueue, Grower};
    use crate::mofn::ChiSquareGate;
    use crate::node::{Node, NodeKind, SplittableNode};
    use crate::oracle::Oracle;
    use crate::splitter::TrepanSplitter;
    use crate::tree::tree::{GrowthParams, Tree, TreeStopper};
    use crate::utils::{merge_counts, mode};
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::{BTreeMap, VecDeque};

    fn params(max_tree_size: usize, max_attempts: usize) -> GrowthParams {
        GrowthParams {
            max_tree_size,
            min_sample: 20,
            max_attempts,
            dist_test_alpha: 0.05,
        }
    }

    fn fit_tree<O: Oracle>(
        data: &[f64],
        rows: usize,
        feature_spec: &[FeatureSpec],
        oracle: &O,
        growable: &mut dyn Grower,
        params: &GrowthParams,
        seed: u64,
    ) -> Tree {
        let matrix = Matrix::new(data, rows, feature_spec.len());
        let targets = oracle.labels(&matrix);
        let gate = ChiSquareGate::new(0.05);
        let splitter = TrepanSplitter::new(true, 2, &gate);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut tree = Tree::new();
        tree.fit(&matrix, &targets, feature_spec, &splitter, oracle, growable, params, &mut rng)
            .unwrap();
        tree
    }

    // Column-major: x0 = 0.25 * i, x1 = (7 * i) % 11, for i in 1..=40.
    fn threshold_data() -> Vec<f64> {
        let x0 = (1..=40).map(|i| i as f64 * 0.25);
        let x1 = (1..=40).map(|i| ((i * 7) % 11) as f64);
        x0.chain(x1).collect()
    }

    fn threshold_oracle(m: &Matrix<f64>) -> Vec<usize> {
        m.get_col(0).iter().map(|v| usize::from(*v > 5.0)).collect()
    }

    // Label is (x0 > 0.5) xor (x1 == 2).
    fn xor_data() -> Vec<f64> {
        let x0 = (0..60).map(|i| (i % 20) as f64 / 20.0);
        let x1 = (0..60).map(|i| (i / 20) as f64);
        x0.chain(x1).collect()
    }

    fn xor_oracle(m: &Matrix<f64>) -> Vec<usize> {
        m.get_col(0)
            .iter()
            .zip(m.get_col(1))
            .map(|(a, b)| usize::from((*a > 0.5) != (*b == 2.0)))
            .collect()
    }

    #[test]
    fn test_tree_fit_threshold() {
        let data = threshold_data();
        let spec = [FeatureSpec::Continuous, FeatureSpec::Nominal];
        let mut growable = FidelityQueue::new();
        let tree = fit_tree(&data, 40, &spec, &threshold_oracle, &mut growable, &params(3, 100), 0);

        assert!(tree.size() <= 3);
        let root = &tree.nodes[0];
        let NodeKind::Internal { split, children } = &root.kind else {
            panic!("root should be split");
        };
        assert_eq!(children.len(), 2);
        assert_eq!(split[0].features(), vec![0]);
        match split[0] {
            Constraint::LessOrEqual { value, .. } | Constraint::GreaterThan { value, .. } => {
                assert!((0.25..=10.0).contains(&value));
            }
            _ => panic!("expected a threshold split, got {}", split[0]),
        }

        let mut rng = StdRng::seed_from_u64(1);
        let n = 1000;
        let mut test = Vec::with_capacity(2 * n);
        test.extend((0..n).map(|_| rng.gen_range(0.0..10.0)));
        test.extend((0..n).map(|_| rng.gen_range(0..11) as f64));
        let matrix = Matrix::new(&test, n, 2);
        let expected = threshold_oracle(&matrix);
        let predicted = tree.predict(&matrix, false).unwrap();
        let agree = predicted.iter().zip(&expected).filter(|(a, b)| a == b).count();
        assert!(agree as f64 / n as f64 >= 0.95);
        assert_eq!(tree.predict(&matrix, true).unwrap(), predicted);
    }

    #[test]
    fn test_tree_structure_invariants() {
        let data = xor_data();
        let spec = [FeatureSpec::Continuous, FeatureSpec::Discrete];
        let matrix = Matrix::new(&data, 60, 2);
        let targets = xor_oracle(&matrix);
        let mut growable = FidelityQueue::new();
        let tree = fit_tree(&data, 60, &spec, &xor_oracle, &mut growable, &params(7, 1000), 7);

        assert!(tree.size() <= 7);
        assert_eq!(tree.nodes.iter().filter(|n| n.is_leaf()).count(), tree.n_leaves);
        for node in &tree.nodes {
            let path = tree.constraints(node.num);
            if let Some(parent) = node.parent_node {
                let mut expected = tree.constraints(parent);
                expected.extend(node.local_constraint.clone());
                assert_eq!(path, expected);
                assert!(node.coverage <= tree.nodes[parent].coverage + 1e-12);
                assert!(node.depth == tree.nodes[parent].depth + 1);
            }

            let in_region: Vec<usize> = matrix
                .index
                .iter()
                .copied()
                .filter(|i| path.iter().all(|c| c.test(&matrix.get_row(*i))))
                .collect();
            assert_eq!(in_region.len(), node.n_training);

            if node.training_target_counts.keys().all(|l| *l == node.prediction) {
                assert!(node.is_leaf());
            }
            if !node.is_leaf() {
                for i in &in_region {
                    let child = tree.pick_branch(node, &matrix.get_row(*i)).unwrap();
                    assert!(node.children().contains(&child));
                }
            }
        }
        let leaves = tree.predict_nodes(&matrix, false).unwrap();
        assert!(leaves.iter().all(|l| tree.nodes[*l].is_leaf()));
        let agree = tree
            .predict(&matrix, false)
            .unwrap()
            .iter()
            .zip(&targets)
            .filter(|(a, b)| a == b)
            .count();
        // Majority class alone gets 31 / 60.
        assert!(agree > 31);
    }

    #[test]
    fn test_tree_budget_stops_growth() {
        let data = xor_data();
        let spec = [FeatureSpec::Continuous, FeatureSpec::Discrete];
        let mut growable = FidelityQueue::new();
        let tree = fit_tree(&data, 60, &spec, &xor_oracle, &mut growable, &params(1, 100), 3);
        assert_eq!(tree.size(), 1);
        assert_eq!(tree.stopper, TreeStopper::MaxNodes);
        assert_eq!(tree.n_leaves, 1);
    }

    #[test]
    fn test_tree_pure_root() {
        let data = threshold_data();
        let spec = [FeatureSpec::Continuous, FeatureSpec::Nominal];
        let constant = |m: &Matrix<f64>| vec![1; m.rows];
        let mut growable = VecDeque::<SplittableNode>::new();
        let tree = fit_tree(&data, 40, &spec, &constant, &mut growable, &params(10, 100), 0);
        assert_eq!(tree.size(), 1);
        assert_eq!(tree.stopper, TreeStopper::QueueExhausted);
        assert_eq!(tree.nodes[0].prediction, 1);
        assert_eq!(tree.nodes[0].fidelity, 1.0);
        assert_eq!(tree.to_string(), "Root\n");
    }

    #[test]
    fn test_tree_breadth_first() {
        let data = xor_data();
        let spec = [FeatureSpec::Continuous, FeatureSpec::Discrete];
        let mut growable = VecDeque::<SplittableNode>::new();
        let tree = fit_tree(&data, 60, &spec, &xor_oracle, &mut growable, &params(5, 1000), 11);
        assert!(tree.size() <= 5);
        let depths: Vec<usize> = tree.nodes.iter().map(|n| n.depth).collect();
        assert!(depths.windows(2).all(|w| w[0] <= w[1]));
    }

    // Column-major: x0 = i, x1 = i % 2, for i in 0..40. Label is x1 below
    // x0 = 30 and flipped above, so each x1 group holds 15 / 5 labels.
    fn parity_data() -> Vec<f64> {
        let x0 = (0..40).map(|i| i as f64);
        let x1 = (0..40).map(|i| (i % 2) as f64);
        x0.chain(x1).collect()
    }

    fn parity_oracle(m: &Matrix<f64>) -> Vec<usize> {
        m.get_col(0)
            .iter()
            .zip(m.get_col(1))
            .map(|(a, b)| usize::from((*b == 1.0) != (*a >= 30.0)))
            .collect()
    }

    fn fit_parity(min_sample: usize, dist_test_alpha: f64) -> Tree {
        let data = parity_data();
        let matrix = Matrix::new(&data, 40, 2);
        let targets = parity_oracle(&matrix);
        let gate = ChiSquareGate::new(0.05);
        let splitter = TrepanSplitter::new(false, 2, &gate);
        let params = GrowthParams {
            max_tree_size: 3,
            min_sample,
            max_attempts: 100,
            dist_test_alpha,
        };
        let mut growable = FidelityQueue::new();
        let mut rng = StdRng::seed_from_u64(2);
        let mut tree = Tree::new();
        tree.fit(
            &matrix,
            &targets,
            &[FeatureSpec::Continuous, FeatureSpec::Discrete],
            &splitter,
            &parity_oracle,
            &mut growable,
            &params,
            &mut rng,
        )
        .unwrap();
        tree
    }

    fn assert_scored_from_counts(tree: &Tree) {
        for node in &tree.nodes {
            let counts = merge_counts(&node.training_target_counts, &node.generated_target_counts);
            let total: usize = counts.values().sum();
            assert_eq!(total, node.n_training + node.n_generated);
            assert_eq!(Some(node.prediction), mode(&counts));
            assert_relative_eq!(node.fidelity, counts[&node.prediction] as f64 / total as f64);
            if node.parent_node.is_some() {
                assert_relative_eq!(node.score, -node.coverage * (1.0 - node.fidelity));
            }
        }
    }

    #[test]
    fn test_tree_node_statistics() {
        let tree = fit_parity(20, 0.05);
        assert_eq!(tree.size(), 3);
        let root = &tree.nodes[0];
        assert_eq!(root.n_generated, 0);
        assert_eq!(root.coverage, 1.0);
        let NodeKind::Internal { split, children } = &root.kind else {
            panic!("root should be split");
        };
        assert_eq!(split[0].features(), vec![1]);

        for child in children.iter().map(|c| &tree.nodes[*c]) {
            assert_eq!(child.n_training, 20);
            assert_eq!(child.n_generated, 0);
            // Real rows only on both sides: 20 / 40 of the root.
            assert_relative_eq!(child.coverage, 0.5);
            assert_relative_eq!(child.fidelity, 0.75);
            assert_relative_eq!(child.score, -0.125);
            // The x1 = 0 group is mostly labelled 0, the x1 = 1 group mostly 1.
            let local = child.local_constraint.as_ref().unwrap();
            assert_eq!(child.prediction, usize::from(!local.test(&[0.0, 0.0])));
        }
        assert_scored_from_counts(&tree);
    }

    #[test]
    fn test_tree_coverage_counts_parent_synthetic_rows() {
        let tree = fit_parity(60, 0.05);
        let root = &tree.nodes[0];
        assert_eq!(root.n_training, 40);
        assert_eq!(root.n_generated, 20);
        let children = root.children();
        assert_eq!(children.len(), 2);

        // Every real and synthetic row of the root lands in exactly one child.
        let total: f64 = children.iter().map(|c| tree.nodes[*c].coverage).sum();
        assert_relative_eq!(total, root.coverage, epsilon = 1e-12);
        for child in children.iter().map(|c| &tree.nodes[*c]) {
            let n_accepted = child.coverage * 60.0 - child.n_training as f64;
            assert_relative_eq!(n_accepted, n_accepted.round(), epsilon = 1e-9);
            assert!((0.0..=20.0).contains(&n_accepted.round()));
            assert_eq!(child.n_training + child.n_generated, 60);
        }
        assert_scored_from_counts(&tree);
    }

    #[test]
    fn test_tree_generator_refit_and_reuse() {
        // Splitting on x1 shifts its distribution (chi-square p near 1e-4).
        let refit = fit_parity(20, 0.05);
        assert_eq!(refit.generators.len(), 3);
        for child in refit.nodes[0].children() {
            let node = &refit.nodes[*child];
            assert_ne!(node.generator, refit.nodes[0].generator);
            let generator = &refit.generators[node.generator];
            assert_eq!(generator.training_idx.len(), node.n_training);
        }

        let reuse = fit_parity(20, 1e-12);
        assert_eq!(reuse.generators.len(), 1);
        for child in reuse.nodes[0].children() {
            assert_eq!(reuse.nodes[*child].generator, reuse.nodes[0].generator);
        }
    }

    fn hand_built(split: Vec<Constraint>) -> Tree {
        let node = |num: usize, parent_node: Option<usize>, local_constraint: Option<Constraint>, prediction: usize| Node {
            num,
            depth: usize::from(parent_node.is_some()),
            parent_node,
            local_constraint,
            generator: 0,
            prediction,
            fidelity: 1.0,
            coverage: 0.5,
            score: 0.0,
            n_training: 2,
            n_generated: 0,
            training_target_counts: BTreeMap::from([(prediction, 2)]),
            generated_target_counts: BTreeMap::new(),
            kind: NodeKind::Leaf,
        };
        let mut root = node(0, None, None, 0);
        root.make_parent_node(split.clone(), vec![1, 2]);
        let mut tree = Tree::new();
        tree.nodes = vec![
            root,
            node(1, Some(0), Some(split[0].clone()), 0),
            node(2, Some(0), Some(split[1].clone()), 1),
        ];
        tree.n_leaves = 2;
        tree.n_classes = 2;
        tree
    }

    #[test]
    fn test_routing_errors() {
        let overlapping = hand_built(vec![
            Constraint::GreaterThan { feature: 0, value: 5.0 },
            Constraint::GreaterThan { feature: 0, value: 7.0 },
        ]);
        let root = &overlapping.nodes[0];
        assert_eq!(overlapping.pick_branch(root, &[6.0]).unwrap(), 1);
        assert!(matches!(
            overlapping.pick_branch(root, &[8.0]),
            Err(TrepanError::AmbiguousBranch { node: 0, matches: 2, .. })
        ));
        assert!(matches!(
            overlapping.pick_branch(root, &[1.0]),
            Err(TrepanError::NoMatchingBranch { node: 0, .. })
        ));
        let data = vec![1.0, 6.0];
        assert!(overlapping.predict(&Matrix::new(&data, 2, 1), false).is_err());
        assert!(overlapping.predict(&Matrix::new(&data, 2, 1), true).is_err());
    }

    #[test]
    fn test_predict_proba_and_display() {
        let c = Constraint::LessOrEqual { feature: 0, value: 5.0 };
        let tree = hand_built(vec![c.clone(), c.negate()]);
        let data = vec![1.0, 6.0, 3.0];
        let matrix = Matrix::new(&data, 3, 1);
        assert_eq!(tree.predict_nodes(&matrix, false).unwrap(), vec![1, 2, 1]);
        assert_eq!(tree.predict(&matrix, false).unwrap(), vec![0, 1, 0]);
        let proba: RowMajorMatrix<f64> = tree.predict_proba(&matrix, false).unwrap();
        assert_eq!(proba.cols, 2);
        assert_eq!(proba.row(1), &[0.0, 1.0]);
        assert_eq!(
            tree.to_string(),
            "Root\n      If x0 \u{2264} 5.0000 predict 0\n      If x0 > 5.0000 predict 1\n"
        );
        assert!(matches!(Tree::new().predict(&matrix, false), Err(TrepanError::NotFitted)));
    }
}
