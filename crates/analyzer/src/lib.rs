//! Loopsight Analyzer - Loop Parallelization Analysis
//!
//! Decides, per loop of a host IR, whether and how the loop can be run in
//! parallel or vectorized. Each loop gets a memory-access profile, a
//! dependency profile, a vectorization verdict, a pattern label from an
//! ordered recognizer battery, a confidence score and transformation
//! suggestions. An optional external classifier can refine the result; its
//! opinion is merged conservatively and never replaces the static pattern.
//!
//! Hosts expose loops through [`ir::LoopHandle`] or lower into the in-memory
//! [`ir::FunctionIr`].

pub mod analysis;
pub mod classifier;
pub mod config;
pub mod context;
pub mod error;
pub mod hybrid;
pub mod ir;
pub mod patterns;
pub mod runner;
pub mod suggestions;

pub use analysis::{
    ConfidenceScorer, DependencyAnalyzer, DependencyKind, DependencyProfile, MemoryAccessAnalyzer,
    MemoryAccessPattern, MemoryAccessProfile, VectorizationAssessor, VectorizationVerdict,
};
pub use classifier::{
    ClassifierConfig, ClassifierOutcome, ExternalClassifier, ExternalClassifierAdapter,
    ExternalOpinion, ExternalQuality, MockClassifier, PatternSignatures,
};
pub use config::AnalyzerConfig;
pub use context::serialize_loop_context;
pub use error::{AnalysisError, AnalysisResult};
pub use hybrid::{CombinationWeights, HybridCombiner, HybridVerdict, SafetyClass};
pub use ir::{FunctionBuilder, FunctionIr, LoopHandle};
pub use patterns::{PatternClassification, PatternKind, PatternMatcher, PatternPolicy};
pub use runner::{AnalysisEngine, AnalysisReport, LoopAnalyzer, LoopReport};
pub use suggestions::TransformationSuggester;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
