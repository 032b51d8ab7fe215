//! Errors
//!
//! Custom error types used throughout the `trepan` crate.
use thiserror::Error;

/// Errors that can occur while extracting or using a Trepan explanation.
#[derive(Debug, Error)]
pub enum TrepanError {
    /// A feature specification string that is not recognised.
    #[error("Unknown feature specification {0}, expected one of continuous, discrete, ordinal, nominal.")]
    UnknownFeatureSpec(String),
    /// No child constraint of an internal node accepted the vector.
    #[error("Unable to pick a branch at node {node} for data vector {row:?}: no child constraint matched.")]
    NoMatchingBranch { node: usize, row: Vec<f64> },
    /// More than one child constraint of an internal node accepted the vector.
    #[error("Unable to pick a branch at node {node} for data vector {row:?}: {matches} child constraints matched.")]
    AmbiguousBranch { node: usize, row: Vec<f64>, matches: usize },
    /// Rejection sampling did not produce an instance inside the constrained region.
    #[error("Could not generate an instance satisfying the node constraints within {attempts} attempts.")]
    SamplingExhausted { attempts: usize },
    /// A node without a score was compared with another node.
    #[error("Unable to compare node {0} with an uninitialized score.")]
    UnscoredNode(usize),
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
    /// The shape of an input did not agree with the data.
    #[error("Dimension mismatch, expected {expected} but found {actual}.")]
    DimensionMismatch { expected: String, actual: String },
    /// Fitting was attempted on a matrix without rows.
    #[error("Training data must contain at least one row.")]
    EmptyData,
    /// Prediction was attempted before fitting.
    #[error("The explainer has not been fitted yet.")]
    NotFitted,
    /// Unable to write model to file.
    #[error("Unable to write model to file: {0}")]
    UnableToWrite(String),
    /// Unable to read model from file.
    #[error("Unable to read model from a file {0}")]
    UnableToRead(String),
}
