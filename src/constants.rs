pub const MAX_TREE_SIZE: usize = 10;
pub const MIN_SAMPLE: usize = 20;
pub const DIST_TEST_ALPHA: f64 = 0.05;
pub const GATE_ALPHA: f64 = 0.05;
pub const BEAM_WIDTH: usize = 2;
pub const MAX_ATTEMPTS: usize = 100;
pub const GAMMA_ITERATION_LIMIT: usize = 500;
pub const GAMMA_EPS: f64 = 1e-14;
pub const KS_SERIES_TERMS: usize = 100;
