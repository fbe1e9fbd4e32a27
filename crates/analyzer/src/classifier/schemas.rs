//! Wire format of the external classifier and its validated, defaulted
//! in-process form.

use serde::{Deserialize, Serialize};

/// Single-loop request: `{pattern, context, function}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub pattern: String,
    pub context: String,
    pub function: String,
}

/// One entry of a batched request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub candidate_type: String,
    pub file: String,
    pub function: String,
    pub line: u32,
    pub reason: String,
    pub suggested_patch: String,
}

/// Raw response. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierResponse {
    #[serde(default, alias = "enhanced_pattern")]
    pub enhanced_pattern: Option<String>,
    #[serde(default, alias = "classification")]
    pub quality: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(
        default,
        alias = "transformations",
        alias = "code_transformations",
        alias = "suggested_transformations"
    )]
    pub suggested_transformations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExternalQuality {
    SafeParallel,
    RequiresCheck,
    NotParallel,
    Error,
}

impl ExternalQuality {
    /// Unknown or missing labels map to `Error`.
    pub fn from_label(label: Option<&str>) -> Self {
        let Some(label) = label else {
            return ExternalQuality::Error;
        };
        let normalized: String = label
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "safeparallel" | "safe" | "parallel" => ExternalQuality::SafeParallel,
            "requirescheck" | "requiresruntimecheck" | "needscheck" => {
                ExternalQuality::RequiresCheck
            }
            "notparallel" | "unsafe" | "unsafeparallel" => ExternalQuality::NotParallel,
            _ => ExternalQuality::Error,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExternalQuality::SafeParallel => "safe_parallel",
            ExternalQuality::RequiresCheck => "requires_check",
            ExternalQuality::NotParallel => "not_parallel",
            ExternalQuality::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalOpinion {
    pub enhanced_pattern: Option<String>,
    pub quality: ExternalQuality,
    pub confidence: f64,
    pub reasoning: String,
    pub suggested_transformations: Vec<String>,
}

impl From<ClassifierResponse> for ExternalOpinion {
    fn from(response: ClassifierResponse) -> Self {
        let confidence = match response.confidence {
            Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
            Some(c) if c == f64::INFINITY => 1.0,
            _ => 0.0,
        };
        Self {
            enhanced_pattern: response.enhanced_pattern.filter(|p| !p.trim().is_empty()),
            quality: ExternalQuality::from_label(response.quality.as_deref()),
            confidence,
            reasoning: response.reasoning.unwrap_or_default(),
            suggested_transformations: response.suggested_transformations,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    NotConfigured,
    Unreachable,
    Malformed,
    Timeout,
    Rejected,
}

/// What the adapter hands downstream: an opinion, or nothing usable.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierOutcome {
    Opinion(ExternalOpinion),
    Unavailable(UnavailableReason),
}

impl ClassifierOutcome {
    pub fn opinion(&self) -> Option<&ExternalOpinion> {
        match self {
            ClassifierOutcome::Opinion(opinion) => Some(opinion),
            ClassifierOutcome::Unavailable(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.opinion().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_documented_defaults() {
        let response: ClassifierResponse = serde_json::from_str("{}").unwrap();
        let opinion = ExternalOpinion::from(response);
        assert_eq!(opinion.quality, ExternalQuality::Error);
        assert_eq!(opinion.confidence, 0.0);
        assert_eq!(opinion.reasoning, "");
        assert!(opinion.suggested_transformations.is_empty());
    }

    #[test]
    fn test_aliases_and_clamping() {
        let response: ClassifierResponse = serde_json::from_str(
            r##"{"enhanced_pattern": "reduction_safe", "classification": "requires_runtime_check",
                "confidence": 1.7, "code_transformations": ["#pragma omp parallel for"]}"##,
        )
        .unwrap();
        let opinion = ExternalOpinion::from(response);
        assert_eq!(opinion.enhanced_pattern.as_deref(), Some("reduction_safe"));
        assert_eq!(opinion.quality, ExternalQuality::RequiresCheck);
        assert_eq!(opinion.confidence, 1.0);
        assert_eq!(opinion.suggested_transformations.len(), 1);
    }

    #[test]
    fn test_quality_labels() {
        assert_eq!(ExternalQuality::from_label(Some("SafeParallel")), ExternalQuality::SafeParallel);
        assert_eq!(ExternalQuality::from_label(Some("not_parallel")), ExternalQuality::NotParallel);
        assert_eq!(ExternalQuality::from_label(Some("maybe")), ExternalQuality::Error);
        assert_eq!(ExternalQuality::from_label(None), ExternalQuality::Error);
    }
}
