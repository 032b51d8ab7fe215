//! Feature specifications
//!
//! Each input dimension is tagged as continuous or as one of the discrete kinds.
//! Only the continuous/discrete distinction changes how features are sampled,
//! tested and split.
use crate::errors::TrepanError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of an input dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureSpec {
    /// Real valued, sampled from a kernel density estimate and split on thresholds.
    Continuous,
    /// Discrete without further information.
    Discrete,
    /// Discrete with a meaningful order.
    Ordinal,
    /// Discrete without order.
    Nominal,
}

impl FeatureSpec {
    pub fn is_discrete(&self) -> bool {
        !matches!(self, FeatureSpec::Continuous)
    }

    /// Parse a list of feature specification names.
    pub fn parse_all<S: AsRef<str>>(names: &[S]) -> Result<Vec<FeatureSpec>, TrepanError> {
        names.iter().map(|s| s.as_ref().parse()).collect()
    }
}

impl FromStr for FeatureSpec {
    type Err = TrepanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continuous" => Ok(FeatureSpec::Continuous),
            "discrete" => Ok(FeatureSpec::Discrete),
            "ordinal" => Ok(FeatureSpec::Ordinal),
            "nominal" => Ok(FeatureSpec::Nominal),
            _ => Err(TrepanError::UnknownFeatureSpec(s.to_string())),
        }
    }
}

impl fmt::Display for FeatureSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeatureSpec::Continuous => "continuous",
            FeatureSpec::Discrete => "discrete",
            FeatureSpec::Ordinal => "ordinal",
            FeatureSpec::Nominal => "nominal",
        };
        write!(f, "{name}")
    }
}
