//! Conservative merge of the static verdict with an external opinion.
//!
//! The static pattern label is never replaced. An external opinion can move
//! the combined confidence, add transformations when it agrees, and flag the
//! loop for review when it disagrees. Contradicting safety verdicts always
//! mark every transformation as requiring verification.

pub mod weights;

pub use weights::CombinationWeights;

use crate::analysis::{DependencyKind, DependencyProfile, VectorizationVerdict};
use crate::classifier::{
    ClassifierOutcome, ExternalOpinion, ExternalQuality, PatternSignatures, UnavailableReason,
};
use crate::patterns::{PatternClassification, PatternKind};
use crate::suggestions::TransformationSuggester;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// What the static analyses are prepared to claim about a loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyClass {
    Vectorizable,
    Parallel,
    Privatizable,
    Unsafe,
}

impl SafetyClass {
    pub fn of(dependency: &DependencyProfile, vectorization: &VectorizationVerdict) -> Self {
        if vectorization.vectorizable {
            SafetyClass::Vectorizable
        } else if dependency.kind.is_safe() {
            SafetyClass::Parallel
        } else if dependency.eliminable {
            SafetyClass::Privatizable
        } else {
            SafetyClass::Unsafe
        }
    }

    pub fn is_safe(self) -> bool {
        self != SafetyClass::Unsafe
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HybridSource {
    StaticOnly,
    Hybrid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridVerdict {
    pub pattern: PatternKind,
    pub static_confidence: f64,
    pub combined_confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_quality: Option<ExternalQuality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable: Option<UnavailableReason>,
    pub safety: SafetyClass,
    pub requires_human_review: bool,
    pub conflict: bool,
    pub risk_assessment: String,
    pub strategy: String,
    pub transformations: Vec<String>,
    pub source: HybridSource,
}

pub struct HybridCombiner {
    weights: CombinationWeights,
    suggester: TransformationSuggester,
    signatures: Option<Arc<PatternSignatures>>,
}

impl Default for HybridCombiner {
    fn default() -> Self {
        Self::new(CombinationWeights::default())
    }
}

impl HybridCombiner {
    pub fn new(weights: CombinationWeights) -> Self {
        Self {
            weights,
            suggester: TransformationSuggester::new(),
            signatures: None,
        }
    }

    /// Uses `signatures` instead of the process-wide list.
    pub fn with_signatures(mut self, signatures: Arc<PatternSignatures>) -> Self {
        self.signatures = Some(signatures);
        self
    }

    pub fn weights(&self) -> &CombinationWeights {
        &self.weights
    }

    fn signatures(&self) -> &PatternSignatures {
        match &self.signatures {
            Some(signatures) => signatures,
            None => PatternSignatures::global(),
        }
    }

    pub fn combine(
        &self,
        classification: &PatternClassification,
        static_confidence: f64,
        vectorization: &VectorizationVerdict,
        dependency: &DependencyProfile,
        outcome: Option<&ClassifierOutcome>,
    ) -> HybridVerdict {
        let static_confidence = static_confidence.clamp(0.0, 1.0);
        let safety = SafetyClass::of(dependency, vectorization);
        let transformations = self.suggester.suggest(classification, vectorization);

        match outcome {
            Some(ClassifierOutcome::Opinion(opinion)) => self.merge(
                classification,
                static_confidence,
                safety,
                dependency,
                vectorization,
                transformations,
                opinion,
            ),
            other => {
                let unavailable = match other {
                    Some(ClassifierOutcome::Unavailable(reason)) => Some(*reason),
                    _ => None,
                };
                let mut risk = Self::static_risk(safety, dependency, vectorization);
                if let Some(reason) = unavailable {
                    risk.push_str(&format!("; external classifier unavailable ({})", Self::reason_text(reason)));
                }
                HybridVerdict {
                    pattern: classification.kind,
                    static_confidence,
                    combined_confidence: static_confidence,
                    external_confidence: None,
                    external_quality: None,
                    unavailable,
                    safety,
                    requires_human_review: false,
                    conflict: false,
                    risk_assessment: risk,
                    strategy: Self::static_strategy(safety).to_string(),
                    transformations: Self::annotate(transformations, safety == SafetyClass::Unsafe),
                    source: HybridSource::StaticOnly,
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn merge(
        &self,
        classification: &PatternClassification,
        static_confidence: f64,
        safety: SafetyClass,
        dependency: &DependencyProfile,
        vectorization: &VectorizationVerdict,
        mut transformations: Vec<String>,
        opinion: &ExternalOpinion,
    ) -> HybridVerdict {
        let external_confidence = opinion.confidence.clamp(0.0, 1.0);
        let combined_confidence = self.weights.combine(static_confidence, external_confidence);
        let requires_human_review = self.weights.disagree(static_confidence, external_confidence);

        let conflict = match (safety, opinion.quality) {
            (s, ExternalQuality::NotParallel) => s.is_safe(),
            (SafetyClass::Unsafe, ExternalQuality::SafeParallel) => true,
            _ => false,
        };
        let caution = opinion.quality == ExternalQuality::RequiresCheck;

        let mut risk = vec![Self::static_risk(safety, dependency, vectorization)];
        if conflict {
            risk.push(format!(
                "conflict: static analysis says {} but the external classifier says {}",
                Self::safety_text(safety),
                opinion.quality.label()
            ));
        } else if caution {
            risk.push("external classifier requests a runtime check".to_string());
        }
        if requires_human_review {
            risk.push(format!(
                "confidence gap {:.2} exceeds {:.2}",
                (static_confidence - external_confidence).abs(),
                self.weights.disagreement_threshold
            ));
        }
        if let Some(label) = &opinion.enhanced_pattern {
            match self.signatures().lookup(label) {
                Some(kind) if kind != PatternKind::Unknown && kind != classification.kind => {
                    risk.push(format!(
                        "external label '{}' suggests {} instead of {}",
                        label, kind, classification.kind
                    ));
                }
                None => debug!("Unrecognized external pattern label '{}'", label),
                _ => {}
            }
        }
        if !opinion.reasoning.is_empty() {
            risk.push(format!("external reasoning: {}", opinion.reasoning));
        }

        if !conflict {
            for suggestion in &opinion.suggested_transformations {
                let suggestion = suggestion.trim();
                if !suggestion.is_empty() && !transformations.iter().any(|t| t == suggestion) {
                    transformations.push(suggestion.to_string());
                }
            }
        }

        let strategy = if conflict {
            "Keep the loop sequential until the conflicting verdicts are resolved"
        } else if requires_human_review {
            "Apply only after human review of the confidence gap"
        } else if caution {
            "Apply behind a runtime check"
        } else {
            Self::static_strategy(safety)
        };

        HybridVerdict {
            pattern: classification.kind,
            static_confidence,
            combined_confidence,
            external_confidence: Some(external_confidence),
            external_quality: Some(opinion.quality),
            unavailable: None,
            safety,
            requires_human_review,
            conflict,
            risk_assessment: risk.join("; "),
            strategy: strategy.to_string(),
            transformations: Self::annotate(
                transformations,
                conflict || caution || safety == SafetyClass::Unsafe,
            ),
            source: HybridSource::Hybrid,
        }
    }

    fn annotate(transformations: Vec<String>, verify: bool) -> Vec<String> {
        if !verify {
            return transformations;
        }
        transformations
            .iter()
            .map(|t| TransformationSuggester::mark_for_verification(t))
            .collect()
    }

    fn static_risk(
        safety: SafetyClass,
        dependency: &DependencyProfile,
        vectorization: &VectorizationVerdict,
    ) -> String {
        match safety {
            SafetyClass::Vectorizable if dependency.eliminable => format!(
                "Low risk: vectorizable at width {} once the accumulator is privatized",
                vectorization.recommended_width
            ),
            SafetyClass::Vectorizable => format!(
                "Low risk: independent iterations, vectorizable at width {}",
                vectorization.recommended_width
            ),
            SafetyClass::Parallel => format!(
                "Low risk: no loop-carried dependencies; not vectorizable ({})",
                vectorization.limitations
            ),
            SafetyClass::Privatizable => {
                let variable = dependency
                    .accumulator()
                    .map(|c| c.variable.as_str())
                    .unwrap_or("accumulator");
                format!("Moderate risk: loop-carried {variable} must be privatized")
            }
            SafetyClass::Unsafe => {
                let variables: Vec<&str> =
                    dependency.dependent_variables.iter().map(String::as_str).collect();
                let mut text = format!("High risk: {} dependency", dependency.kind);
                if dependency.kind != DependencyKind::ComplexFlow && dependency.distance > 0 {
                    text.push_str(&format!(" at distance {}", dependency.distance));
                }
                if !variables.is_empty() {
                    text.push_str(&format!(" on {}", variables.join(", ")));
                }
                text
            }
        }
    }

    fn static_strategy(safety: SafetyClass) -> &'static str {
        match safety {
            SafetyClass::Vectorizable => "Parallelize and vectorize",
            SafetyClass::Parallel => "Parallelize across threads",
            SafetyClass::Privatizable => "Parallelize with a reduction clause",
            SafetyClass::Unsafe => "Do not transform without manual verification",
        }
    }

    fn safety_text(safety: SafetyClass) -> &'static str {
        match safety {
            SafetyClass::Vectorizable => "vectorizable",
            SafetyClass::Parallel => "parallel",
            SafetyClass::Privatizable => "parallel after privatization",
            SafetyClass::Unsafe => "unsafe",
        }
    }

    fn reason_text(reason: UnavailableReason) -> &'static str {
        match reason {
            UnavailableReason::NotConfigured => "not configured",
            UnavailableReason::Unreachable => "unreachable",
            UnavailableReason::Malformed => "malformed response",
            UnavailableReason::Timeout => "timeout",
            UnavailableReason::Rejected => "rejected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ReductionOperator;
    use crate::patterns::PatternEvidence;

    fn vector_ok() -> VectorizationVerdict {
        VectorizationVerdict {
            vectorizable: true,
            recommended_width: 4,
            requires_gather: false,
            expected_speedup: 3.5,
            limitations: "None".to_string(),
        }
    }

    fn map() -> PatternClassification {
        PatternClassification::new(PatternKind::Map, PatternEvidence::new("elementwise"))
    }

    fn opinion(quality: ExternalQuality, confidence: f64) -> ClassifierOutcome {
        ClassifierOutcome::Opinion(ExternalOpinion {
            enhanced_pattern: None,
            quality,
            confidence,
            reasoning: String::new(),
            suggested_transformations: Vec::new(),
        })
    }

    #[test]
    fn test_fallback_is_exact() {
        let combiner = HybridCombiner::default();
        let dep = DependencyProfile::read_only();
        for outcome in [None, Some(ClassifierOutcome::Unavailable(UnavailableReason::Timeout))] {
            let verdict = combiner.combine(&map(), 0.8, &vector_ok(), &dep, outcome.as_ref());
            assert_eq!(verdict.combined_confidence, 0.8);
            assert_eq!(verdict.pattern, PatternKind::Map);
            assert!(!verdict.requires_human_review);
            assert_eq!(verdict.source, HybridSource::StaticOnly);
        }
    }

    #[test]
    fn test_disagreement_requires_review() {
        let combiner = HybridCombiner::default();
        let dep = DependencyProfile::read_only();
        let outcome = opinion(ExternalQuality::SafeParallel, 0.2);
        let verdict = combiner.combine(&map(), 0.9, &vector_ok(), &dep, Some(&outcome));
        assert!(verdict.requires_human_review);
        assert!(!verdict.conflict);
        assert!((verdict.combined_confidence - (0.6 * 0.9 + 0.4 * 0.2)).abs() < 1e-9);
    }

    #[test]
    fn test_conflict_marks_every_transformation() {
        let combiner = HybridCombiner::default();
        let dep = DependencyProfile::read_only();
        let outcome = ClassifierOutcome::Opinion(ExternalOpinion {
            enhanced_pattern: None,
            quality: ExternalQuality::NotParallel,
            confidence: 0.8,
            reasoning: "pointer may alias".to_string(),
            suggested_transformations: vec!["#pragma omp parallel for simd".to_string()],
        });
        let verdict = combiner.combine(&map(), 0.8, &vector_ok(), &dep, Some(&outcome));
        assert!(verdict.conflict);
        assert!(!verdict.requires_human_review);
        assert!(verdict.risk_assessment.contains("conflict"));
        assert!(verdict
            .transformations
            .iter()
            .all(|t| t.ends_with("/* requires verification */")));
        assert!(!verdict.transformations.iter().any(|t| t.contains("parallel for simd")));
    }

    #[test]
    fn test_agreeing_opinion_merges_suggestions_and_notes_label_mismatch() {
        let combiner = HybridCombiner::default().with_signatures(Arc::new(PatternSignatures::builtin()));
        let mut dep = DependencyProfile::read_only();
        dep.kind = DependencyKind::Raw;
        dep.eliminable = true;
        let classification = PatternClassification::new(
            PatternKind::Reduction,
            PatternEvidence::new("sum").with_reduction("sum", ReductionOperator::Sum),
        );
        let outcome = ClassifierOutcome::Opinion(ExternalOpinion {
            enhanced_pattern: Some("stencil_pattern".to_string()),
            quality: ExternalQuality::SafeParallel,
            confidence: 0.7,
            reasoning: String::new(),
            suggested_transformations: vec!["#pragma omp parallel for reduction(+:sum)".to_string()],
        });
        let scalar = VectorizationVerdict {
            vectorizable: false,
            recommended_width: 1,
            ..vector_ok()
        };
        let verdict = combiner.combine(&classification, 0.5, &scalar, &dep, Some(&outcome));
        assert_eq!(verdict.safety, SafetyClass::Privatizable);
        assert_eq!(verdict.pattern, PatternKind::Reduction);
        assert_eq!(verdict.transformations, vec!["#pragma omp parallel for reduction(+:sum)".to_string()]);
        assert!(verdict.risk_assessment.contains("suggests stencil"));
    }
}
