//! Optional out-of-process opinion on a loop.
//!
//! The classifier itself is an injected [`ExternalClassifier`] returning raw
//! JSON. [`ExternalClassifierAdapter`] owns everything that can go wrong
//! around it: timeouts, batching, schema validation and field defaults. Every
//! failure becomes [`ClassifierOutcome::Unavailable`] and the caller falls back
//! to static-only results.

pub mod adapter;
pub mod config;
pub mod mock;
pub mod schemas;
pub mod signatures;

#[cfg(feature = "llm")]
pub mod openai;
#[cfg(feature = "llm")]
pub mod prompts;

use async_trait::async_trait;
use thiserror::Error;

pub use adapter::ExternalClassifierAdapter;
pub use config::ClassifierConfig;
pub use mock::MockClassifier;
pub use schemas::{
    CandidateRecord, ClassificationRequest, ClassifierOutcome, ClassifierResponse,
    ExternalOpinion, ExternalQuality, UnavailableReason,
};
pub use signatures::{PatternSignature, PatternSignatures};

#[cfg(feature = "llm")]
pub use openai::OpenAiClassifier;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("external classifier is not configured")]
    NotConfigured,

    #[error("external classifier unreachable: {0}")]
    Unreachable(String),

    #[error("malformed classifier response: {0}")]
    Malformed(String),

    #[error("classifier timed out after {0} ms")]
    Timeout(u64),

    #[error("classifier API error: {0}")]
    Api(String),

    #[error("classifier reported an error: {0}")]
    Reported(String),
}

impl ClassifierError {
    pub fn reason(&self) -> UnavailableReason {
        match self {
            ClassifierError::NotConfigured => UnavailableReason::NotConfigured,
            ClassifierError::Unreachable(_) | ClassifierError::Api(_) => {
                UnavailableReason::Unreachable
            }
            ClassifierError::Malformed(_) => UnavailableReason::Malformed,
            ClassifierError::Timeout(_) => UnavailableReason::Timeout,
            ClassifierError::Reported(_) => UnavailableReason::Rejected,
        }
    }
}

/// Out-of-process classifier. Implementations return the raw response body;
/// validation is the adapter's job.
#[async_trait]
pub trait ExternalClassifier: Send + Sync {
    fn name(&self) -> &str;

    async fn classify(&self, request: &ClassificationRequest) -> Result<String, ClassifierError>;

    /// Response keyed `candidate_1..=candidate_N` in request order, or a JSON
    /// array of the same length.
    async fn classify_batch(&self, candidates: &[CandidateRecord]) -> Result<String, ClassifierError>;
}
