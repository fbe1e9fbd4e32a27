use super::registry::RecognizerRegistry;
use super::{PatternClassification, PatternKind, PatternRecognizer, RecognitionContext};
use crate::analysis::{DependencyProfile, MemoryAccessProfile, NestingInfo};
use crate::error::AnalysisError;
use crate::ir::LoopHandle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Evaluation order of the recognizer battery. Reordering changes labels,
/// never the underlying memory or dependency facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternPolicy {
    #[serde(default = "default_policy_version")]
    pub version: u32,
    #[serde(default = "default_order")]
    pub order: Vec<PatternKind>,
}

fn default_policy_version() -> u32 {
    1
}

fn default_order() -> Vec<PatternKind> {
    vec![
        PatternKind::MatrixMultiply,
        PatternKind::Convolution2D,
        PatternKind::ImageProcessing,
        PatternKind::Stencil,
        PatternKind::MatrixAddition,
        PatternKind::MatrixScaling,
        PatternKind::FrobeniusNorm,
        PatternKind::ComplexReduction,
        PatternKind::PrefixSum,
        PatternKind::Reduction,
        PatternKind::Filter,
        PatternKind::EmbarrassinglyParallel,
        PatternKind::Vectorizable,
        PatternKind::Map,
        PatternKind::SimpleParallel,
    ]
}

impl Default for PatternPolicy {
    fn default() -> Self {
        Self {
            version: default_policy_version(),
            order: default_order(),
        }
    }
}

impl PatternPolicy {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let mut seen = std::collections::HashSet::new();
        for kind in &self.order {
            if !seen.insert(kind) {
                return Err(AnalysisError::InvalidConfig(format!(
                    "pattern policy v{} lists {} twice",
                    self.version, kind
                )));
            }
        }
        Ok(())
    }
}

pub struct PatternMatcher {
    policy: PatternPolicy,
    recognizers: Vec<Arc<dyn PatternRecognizer>>,
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new(PatternPolicy::default())
    }
}

impl PatternMatcher {
    pub fn new(policy: PatternPolicy) -> Self {
        Self::with_registry(policy, &RecognizerRegistry::default())
    }

    pub fn with_registry(policy: PatternPolicy, registry: &RecognizerRegistry) -> Self {
        let recognizers = policy
            .order
            .iter()
            .filter(|kind| **kind != PatternKind::Unknown)
            .filter_map(|kind| {
                let recognizer = registry.get(*kind);
                if recognizer.is_none() {
                    warn!("No recognizer registered for {}", kind);
                }
                recognizer
            })
            .collect();

        Self {
            policy,
            recognizers,
        }
    }

    pub fn policy(&self) -> &PatternPolicy {
        &self.policy
    }

    pub fn order(&self) -> Vec<PatternKind> {
        self.recognizers.iter().map(|r| r.kind()).collect()
    }

    pub fn classify(
        &self,
        lp: &dyn LoopHandle,
        mem: &MemoryAccessProfile,
        dep: &DependencyProfile,
        nesting: &NestingInfo,
    ) -> PatternClassification {
        let ctx = RecognitionContext::new(lp, mem, dep, nesting);
        self.classify_with(&ctx)
    }

    pub fn classify_with(&self, ctx: &RecognitionContext<'_>) -> PatternClassification {
        for recognizer in &self.recognizers {
            match recognizer.recognize(ctx) {
                Ok(Some(evidence)) => {
                    debug!(
                        "{}: matched {} ({})",
                        ctx.lp.function_name(),
                        recognizer.kind(),
                        evidence.summary
                    );
                    return PatternClassification::new(recognizer.kind(), evidence);
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(
                        "{}: recognizer {} skipped: {}",
                        ctx.lp.function_name(),
                        recognizer.name(),
                        e
                    );
                }
            }
        }
        PatternClassification::unknown("No recognizer matched this loop")
    }
}
