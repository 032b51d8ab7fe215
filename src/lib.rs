// Modules
pub mod constants;
pub mod constraints;
pub mod data;
pub mod errors;
pub mod feature;
pub mod grower;
pub mod mofn;
pub mod node;
pub mod oracle;
pub mod sampler;
pub mod splitter;
pub mod stats;
pub mod tree;
pub mod trepan;
pub mod utils;

// Individual classes, and functions
pub use constraints::Constraint;
pub use data::{Matrix, RowMajorMatrix};
pub use errors::TrepanError;
pub use feature::FeatureSpec;
pub use grower::GrowPolicy;
pub use mofn::{ChiSquareGate, SignificanceGate};
pub use node::{Node, NodeKind};
pub use oracle::{Oracle, ProbabilityOracle};
pub use tree::tree::{Tree, TreeStopper};
pub use trepan::Trepan;
