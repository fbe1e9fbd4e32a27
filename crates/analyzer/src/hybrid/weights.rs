use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};

/// Blend of static and external confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombinationWeights {
    #[serde(default = "default_static_weight")]
    pub static_weight: f64,

    #[serde(default = "default_external_weight")]
    pub external_weight: f64,

    /// Confidence gap above which a loop is flagged for human review.
    #[serde(default = "default_disagreement_threshold")]
    pub disagreement_threshold: f64,
}

fn default_static_weight() -> f64 {
    0.6
}
fn default_external_weight() -> f64 {
    0.4
}
fn default_disagreement_threshold() -> f64 {
    0.3
}

impl Default for CombinationWeights {
    fn default() -> Self {
        Self::balanced()
    }
}

impl CombinationWeights {
    pub fn balanced() -> Self {
        Self {
            static_weight: default_static_weight(),
            external_weight: default_external_weight(),
            disagreement_threshold: default_disagreement_threshold(),
        }
    }

    pub fn performance_optimized() -> Self {
        Self {
            static_weight: 0.8,
            external_weight: 0.2,
            disagreement_threshold: 0.4,
        }
    }

    pub fn accuracy_optimized() -> Self {
        Self {
            static_weight: 0.5,
            external_weight: 0.5,
            disagreement_threshold: 0.2,
        }
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.static_weight) || !in_unit(self.external_weight) {
            return Err(AnalysisError::InvalidConfig(format!(
                "weights must lie in [0, 1], got {} and {}",
                self.static_weight, self.external_weight
            )));
        }
        if (self.static_weight + self.external_weight - 1.0).abs() > 1e-6 {
            return Err(AnalysisError::InvalidConfig(format!(
                "weights must sum to 1, got {}",
                self.static_weight + self.external_weight
            )));
        }
        if !in_unit(self.disagreement_threshold) {
            return Err(AnalysisError::InvalidConfig(format!(
                "disagreement threshold must lie in [0, 1], got {}",
                self.disagreement_threshold
            )));
        }
        Ok(())
    }

    pub fn combine(&self, static_confidence: f64, external_confidence: f64) -> f64 {
        (self.static_weight * static_confidence + self.external_weight * external_confidence)
            .clamp(0.0, 1.0)
    }

    pub fn disagree(&self, static_confidence: f64, external_confidence: f64) -> bool {
        (static_confidence - external_confidence).abs() > self.disagreement_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        for weights in [
            CombinationWeights::balanced(),
            CombinationWeights::performance_optimized(),
            CombinationWeights::accuracy_optimized(),
        ] {
            weights.validate().unwrap();
        }
    }

    #[test]
    fn test_rejects_bad_weights() {
        let mut weights = CombinationWeights::balanced();
        weights.external_weight = 0.5;
        assert!(weights.validate().is_err());

        let weights = CombinationWeights {
            static_weight: 1.2,
            external_weight: -0.2,
            disagreement_threshold: 0.3,
        };
        assert!(weights.validate().is_err());

        let weights = CombinationWeights {
            disagreement_threshold: 1.5,
            ..CombinationWeights::balanced()
        };
        assert!(weights.validate().is_err());
    }

    #[test]
    fn test_disagreement_is_strict() {
        let weights = CombinationWeights::balanced();
        assert!(weights.disagree(0.9, 0.2));
        assert!(!weights.disagree(0.8, 0.6));
        assert!((weights.combine(0.8, 0.5) - 0.68).abs() < 1e-9);
    }
}
