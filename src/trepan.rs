use crate::constants::{BEAM_WIDTH, DIST_TEST_ALPHA, GATE_ALPHA, MAX_ATTEMPTS, MAX_TREE_SIZE, MIN_SAMPLE};
use crate::data::{Matrix, RowMajorMatrix};
use crate::errors::TrepanError;
use crate::feature::FeatureSpec;
use crate::grower::GrowPolicy;
use crate::mofn::{ChiSquareGate, SignificanceGate};
use crate::oracle::Oracle;
use crate::splitter::TrepanSplitter;
use crate::tree::tree::{GrowthParams, Tree};
use crate::utils::{agreement, validate_float_parameter, validate_positive_count};
use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_max_tree_size() -> usize {
    MAX_TREE_SIZE
}
fn default_min_sample() -> usize {
    MIN_SAMPLE
}
fn default_dist_test_alpha() -> f64 {
    DIST_TEST_ALPHA
}
fn default_use_m_of_n() -> bool {
    true
}
fn default_beam_width() -> usize {
    BEAM_WIDTH
}
fn default_max_attempts() -> usize {
    MAX_ATTEMPTS
}
fn default_gate_alpha() -> f64 {
    GATE_ALPHA
}
fn default_grow_policy() -> GrowPolicy {
    GrowPolicy::FidelityCoverage
}
fn default_log_iterations() -> usize {
    0
}

/// Trepan explainer: extracts a decision tree that mimics a black-box oracle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trepan {
    /// Maximum number of nodes in the tree.
    #[serde(default = "default_max_tree_size")]
    pub max_tree_size: usize,
    /// Number of instances, real plus synthetic, every node is topped up to.
    #[serde(default = "default_min_sample")]
    pub min_sample: usize,
    /// Significance level of the test deciding whether a child needs its own generator.
    #[serde(default = "default_dist_test_alpha")]
    pub dist_test_alpha: f64,
    /// Refine primitive splits into m-of-n splits.
    #[serde(default = "default_use_m_of_n")]
    pub use_m_of_n: bool,
    #[serde(default = "default_beam_width")]
    pub beam_width: usize,
    /// Cap on rejection sampling draws for a single synthetic instance.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Significance level of the default m-of-n neighbour gate.
    #[serde(default = "default_gate_alpha")]
    pub gate_alpha: f64,
    #[serde(default = "default_grow_policy")]
    pub grow_policy: GrowPolicy,
    /// Log a summary of the fit when non-zero.
    #[serde(default = "default_log_iterations")]
    pub log_iterations: usize,
    /// Feature specification of the last fit.
    #[serde(default)]
    pub feature_spec: Vec<FeatureSpec>,
    /// Fitted tree, `None` before `fit`.
    #[serde(default)]
    pub tree: Option<Tree>,
}

impl Default for Trepan {
    fn default() -> Self {
        Trepan {
            max_tree_size: MAX_TREE_SIZE,
            min_sample: MIN_SAMPLE,
            dist_test_alpha: DIST_TEST_ALPHA,
            use_m_of_n: true,
            beam_width: BEAM_WIDTH,
            max_attempts: MAX_ATTEMPTS,
            gate_alpha: GATE_ALPHA,
            grow_policy: GrowPolicy::FidelityCoverage,
            log_iterations: 0,
            feature_spec: Vec::new(),
            tree: None,
        }
    }
}

impl Trepan {
    /// Trepan explainer with the given parameters.
    ///
    /// * `max_tree_size` - Node budget of the tree.
    /// * `min_sample` - Instances each node is topped up to with synthetic data.
    /// * `dist_test_alpha` - Significance level of the generator distribution test.
    /// * `use_m_of_n` - Search for m-of-n splits.
    /// * `beam_width` - Width of the m-of-n beam.
    /// * `max_attempts` - Rejection sampling cap per synthetic instance.
    /// * `gate_alpha` - Significance level of the m-of-n neighbour gate.
    /// * `grow_policy` - Order in which frontier nodes are expanded.
    /// * `log_iterations` - Setting to a value other than zero logs a summary of every fit.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        max_tree_size: usize,
        min_sample: usize,
        dist_test_alpha: f64,
        use_m_of_n: bool,
        beam_width: usize,
        max_attempts: usize,
        gate_alpha: f64,
        grow_policy: GrowPolicy,
        log_iterations: usize,
    ) -> Result<Self, TrepanError> {
        let explainer = Trepan {
            max_tree_size,
            min_sample,
            dist_test_alpha,
            use_m_of_n,
            beam_width,
            max_attempts,
            gate_alpha,
            grow_policy,
            log_iterations,
            feature_spec: Vec::new(),
            tree: None,
        };
        explainer.validate_parameters()?;
        Ok(explainer)
    }

    pub fn validate_parameters(&self) -> Result<(), TrepanError> {
        validate_positive_count(self.max_tree_size, "max_tree_size")?;
        validate_positive_count(self.min_sample, "min_sample")?;
        validate_positive_count(self.beam_width, "beam_width")?;
        validate_positive_count(self.max_attempts, "max_attempts")?;
        validate_float_parameter(self.dist_test_alpha, 0.0, 1.0, "dist_test_alpha")?;
        validate_float_parameter(self.gate_alpha, 0.0, 1.0, "gate_alpha")?;
        Ok(())
    }

    /// Extract a tree explaining `oracle` on `data`.
    ///
    /// * `data` - Training instances, one row each.
    /// * `oracle` - Black-box classifier to explain.
    /// * `feature_spec` - Continuous or discrete tag of every column.
    /// * `max_tree_size` - Overrides the node budget for this fit when given.
    /// * `rng` - Source of randomness for synthetic instances.
    pub fn fit<O, R>(
        &mut self,
        data: &Matrix<f64>,
        oracle: &O,
        feature_spec: &[FeatureSpec],
        max_tree_size: Option<usize>,
        rng: &mut R,
    ) -> Result<&Tree, TrepanError>
    where
        O: Oracle + ?Sized,
        R: Rng + ?Sized,
    {
        let gate = ChiSquareGate::new(self.gate_alpha);
        self.fit_with_gate(data, oracle, feature_spec, max_tree_size, &gate, rng)
    }

    /// Same as [`Trepan::fit`], with a caller-supplied m-of-n neighbour gate.
    pub fn fit_with_gate<O, G, R>(
        &mut self,
        data: &Matrix<f64>,
        oracle: &O,
        feature_spec: &[FeatureSpec],
        max_tree_size: Option<usize>,
        gate: &G,
        rng: &mut R,
    ) -> Result<&Tree, TrepanError>
    where
        O: Oracle + ?Sized,
        G: SignificanceGate + ?Sized,
        R: Rng + ?Sized,
    {
        if let Some(size) = max_tree_size {
            validate_positive_count(size, "max_tree_size")?;
            self.max_tree_size = size;
        }
        self.validate_parameters()?;
        if data.rows == 0 {
            return Err(TrepanError::EmptyData);
        }
        if data.cols == 0 || feature_spec.len() != data.cols {
            return Err(TrepanError::DimensionMismatch {
                expected: format!("{} feature specifications", data.cols),
                actual: format!("{} feature specifications", feature_spec.len()),
            });
        }

        let targets = oracle.labels(data);
        if targets.len() != data.rows {
            return Err(TrepanError::DimensionMismatch {
                expected: format!("{} oracle labels", data.rows),
                actual: format!("{} oracle labels", targets.len()),
            });
        }

        let splitter = TrepanSplitter::new(self.use_m_of_n, self.beam_width, gate);
        let params = GrowthParams {
            max_tree_size: self.max_tree_size,
            min_sample: self.min_sample,
            max_attempts: self.max_attempts,
            dist_test_alpha: self.dist_test_alpha,
        };
        let mut growable = self.grow_policy.grower();
        let mut tree = Tree::new();
        tree.fit(
            data,
            &targets,
            feature_spec,
            &splitter,
            oracle,
            growable.as_mut(),
            &params,
            rng,
        )?;

        if self.log_iterations > 0 {
            info!(
                "Extracted tree with {} nodes, {} leaves, depth {}, {} generators, stopped by {:?}",
                tree.size(),
                tree.n_leaves,
                tree.depth,
                tree.generators.len(),
                tree.stopper
            );
        }

        self.feature_spec = feature_spec.to_vec();
        Ok(self.tree.insert(tree))
    }

    /// The fitted tree.
    pub fn get_tree(&self) -> Result<&Tree, TrepanError> {
        self.tree.as_ref().ok_or(TrepanError::NotFitted)
    }

    fn check_columns(&self, data: &Matrix<f64>) -> Result<(), TrepanError> {
        if data.cols != self.feature_spec.len() {
            return Err(TrepanError::DimensionMismatch {
                expected: format!("{} columns", self.feature_spec.len()),
                actual: format!("{} columns", data.cols),
            });
        }
        Ok(())
    }

    /// Class label predicted by the explanation for every row of `data`.
    ///
    /// * `data` -  Instances to predict, one row each.
    /// * `parallel` -  Predict in parallel.
    pub fn predict(&self, data: &Matrix<f64>, parallel: bool) -> Result<Vec<usize>, TrepanError> {
        let tree = self.get_tree()?;
        self.check_columns(data)?;
        tree.predict(data, parallel)
    }

    /// Class frequencies of the leaf reached by every row.
    pub fn predict_proba(&self, data: &Matrix<f64>, parallel: bool) -> Result<RowMajorMatrix<f64>, TrepanError> {
        let tree = self.get_tree()?;
        self.check_columns(data)?;
        tree.predict_proba(data, parallel)
    }

    /// Leaf reached by every row.
    pub fn predict_nodes(&self, data: &Matrix<f64>, parallel: bool) -> Result<Vec<usize>, TrepanError> {
        let tree = self.get_tree()?;
        self.check_columns(data)?;
        tree.predict_nodes(data, parallel)
    }

    /// Fraction of rows of `data` on which the explanation agrees with `oracle`.
    pub fn fidelity<O: Oracle + ?Sized>(&self, data: &Matrix<f64>, oracle: &O) -> Result<f64, TrepanError> {
        let predicted = self.predict(data, false)?;
        let expected = oracle.labels(data);
        if expected.len() != predicted.len() {
            return Err(TrepanError::DimensionMismatch {
                expected: format!("{} oracle labels", predicted.len()),
                actual: format!("{} oracle labels", expected.len()),
            });
        }
        Ok(agreement(&predicted, &expected))
    }

    /// Save the explainer as a json object to a file.
    ///
    /// * `path` - Path to save the explainer.
    pub fn save_explainer<P: AsRef<Path>>(&self, path: P) -> Result<(), TrepanError> {
        fs::write(path, self.json_dump()?).map_err(|e| TrepanError::UnableToWrite(e.to_string()))
    }

    /// Dump the explainer as a json object.
    pub fn json_dump(&self) -> Result<String, TrepanError> {
        serde_json::to_string(self).map_err(|e| TrepanError::UnableToWrite(e.to_string()))
    }

    /// Load an explainer from a json string.
    pub fn from_json(json_str: &str) -> Result<Self, TrepanError> {
        serde_json::from_str::<Self>(json_str).map_err(|e| TrepanError::UnableToRead(e.to_string()))
    }

    /// Load an explainer from a path to a json object.
    pub fn load_explainer<P: AsRef<Path>>(path: P) -> Result<Self, TrepanError> {
        let json_str = fs::read_to_string(path).map_err(|e| TrepanError::UnableToRead(e.to_string()))?;
        Self::from_json(&json_str)
    }

    // Set methods for parameters

    /// Set the node budget.
    pub fn set_max_tree_size(mut self, max_tree_size: usize) -> Self {
        self.max_tree_size = max_tree_size;
        self
    }

    /// Set the synthetic top-up target.
    pub fn set_min_sample(mut self, min_sample: usize) -> Self {
        self.min_sample = min_sample;
        self
    }

    pub fn set_dist_test_alpha(mut self, dist_test_alpha: f64) -> Self {
        self.dist_test_alpha = dist_test_alpha;
        self
    }

    pub fn set_use_m_of_n(mut self, use_m_of_n: bool) -> Self {
        self.use_m_of_n = use_m_of_n;
        self
    }

    pub fn set_beam_width(mut self, beam_width: usize) -> Self {
        self.beam_width = beam_width;
        self
    }

    /// Set the rejection sampling cap.
    pub fn set_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn set_gate_alpha(mut self, gate_alpha: f64) -> Self {
        self.gate_alpha = gate_alpha;
        self
    }

    /// Set the order in which frontier nodes are expanded.
    pub fn set_grow_policy(mut self, grow_policy: GrowPolicy) -> Self {
        self.grow_policy = grow_policy;
        self
    }

    pub fn set_log_iterations(mut self, log_iterations: usize) -> Self {
        self.log_iterations = log_iterations;
        self
    }
}
