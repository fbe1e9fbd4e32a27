//! Static analyses of a single loop.
//!
//! The two leaves ([`MemoryAccessAnalyzer`], [`DependencyAnalyzer`]) decode the
//! loop's memory accesses once; [`VectorizationAssessor`] and
//! [`ConfidenceScorer`] are pure functions of their results.

pub mod access;
pub mod confidence;
pub mod dependency;
pub mod memory_access;
pub mod nesting;
pub mod recurrence;
pub mod vectorization;

pub use access::{AccessKind, AccessSite, IndexTerm};
pub use confidence::{ConfidenceFactor, ConfidenceScore, ConfidenceScorer};
pub use dependency::{CarriedDependence, DependencyAnalyzer, DependencyKind, DependencyProfile};
pub use memory_access::{MemoryAccessAnalyzer, MemoryAccessPattern, MemoryAccessProfile};
pub use nesting::NestingInfo;
pub use recurrence::{Accumulator, AccumulatorStorage, CarriedScalar, ReductionOperator};
pub use vectorization::{VectorizationAssessor, VectorizationVerdict};
