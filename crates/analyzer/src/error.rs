//! Error taxonomy for the static pipeline.
//!
//! None of these ever abort the analysis of a loop: recognizers turn them into
//! "no match", the dependency analyzer turns ambiguity into `ComplexFlow`, and
//! configuration errors surface before any loop is touched.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("structural prerequisite missing: {0}")]
    StructuralIncomplete(String),

    #[error("dependency cannot be resolved: {0}")]
    AmbiguousDependency(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AnalysisError {
    pub fn structural(what: impl Into<String>) -> Self {
        Self::StructuralIncomplete(what.into())
    }

    pub fn ambiguous(what: impl Into<String>) -> Self {
        Self::AmbiguousDependency(what.into())
    }
}

pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;
