//! Pattern recognition for loops.
//!
//! Each pattern is an independent [`PatternRecognizer`]: a pure predicate over
//! the loop structure plus the memory and dependency profiles. The
//! [`PatternMatcher`] evaluates them in the order given by a versioned
//! [`PatternPolicy`] and the first match labels the loop. A recognizer that
//! lacks a structural prerequisite returns an error, which the matcher treats
//! as "no match" without affecting the others.
//!
//! Recognizers come in two families:
//! - [`basic`]: reductions, maps, filters, scans and plain parallel loops
//! - [`advanced`]: nest- and neighbourhood-level shapes (matrix kernels,
//!   stencils, convolutions, min/max reductions)

pub mod advanced;
pub mod basic;
pub mod context;
pub mod kind;
pub mod matcher;
pub mod registry;

use crate::analysis::ReductionOperator;
use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};

pub use context::RecognitionContext;
pub use kind::PatternKind;
pub use matcher::{PatternMatcher, PatternPolicy};
pub use registry::RecognizerRegistry;

pub trait PatternRecognizer: Send + Sync {
    fn kind(&self) -> PatternKind;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str {
        "No description provided"
    }

    fn recognize(&self, ctx: &RecognitionContext<'_>) -> Result<Option<PatternEvidence>, AnalysisError>;
}

#[macro_export]
macro_rules! impl_recognizer {
    (
        $recognizer:ty,
        kind: $kind:expr,
        name: $name:expr
        $(, description: $description:expr)?
    ) => {
        impl $crate::patterns::PatternRecognizer for $recognizer {
            fn kind(&self) -> $crate::patterns::PatternKind {
                $kind
            }

            fn name(&self) -> &'static str {
                $name
            }

            $(
                fn description(&self) -> &'static str {
                    $description
                }
            )?

            fn recognize(
                &self,
                ctx: &$crate::patterns::RecognitionContext<'_>,
            ) -> Result<Option<$crate::patterns::PatternEvidence>, $crate::error::AnalysisError> {
                self.recognize_impl(ctx)
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReductionInfo {
    pub variable: String,
    pub operator: ReductionOperator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StencilShape {
    pub array: String,
    pub points: usize,
    pub radius: u64,
    /// Nest levels the neighbour offsets span.
    pub dimensions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternEvidence {
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub facts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reduction: Option<ReductionInfo>,
    /// Depth of the perfect nest a `collapse` clause may cover.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapse: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stencil: Option<StencilShape>,
}

impl PatternEvidence {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            facts: Vec::new(),
            reduction: None,
            collapse: None,
            stencil: None,
        }
    }

    pub fn with_fact(mut self, fact: impl Into<String>) -> Self {
        self.facts.push(fact.into());
        self
    }

    pub fn with_reduction(mut self, variable: impl Into<String>, operator: ReductionOperator) -> Self {
        self.reduction = Some(ReductionInfo {
            variable: variable.into(),
            operator,
        });
        self
    }

    pub fn with_collapse(mut self, depth: usize) -> Self {
        self.collapse = Some(depth);
        self
    }

    pub fn with_stencil(mut self, shape: StencilShape) -> Self {
        self.stencil = Some(shape);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternClassification {
    pub kind: PatternKind,
    pub evidence: PatternEvidence,
}

impl PatternClassification {
    pub fn new(kind: PatternKind, evidence: PatternEvidence) -> Self {
        Self { kind, evidence }
    }

    pub fn unknown(reason: impl Into<String>) -> Self {
        Self::new(PatternKind::Unknown, PatternEvidence::new(reason))
    }
}
