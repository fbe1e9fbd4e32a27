//! Confidence Scoring
//!
//! Static confidence (0.0-1.0) that the assigned pattern and its suggested
//! transformation apply:
//! - base score of 0.5
//! - sequential memory access raises it
//! - complex dependence flow lowers it

use super::dependency::{DependencyKind, DependencyProfile};
use super::memory_access::{MemoryAccessPattern, MemoryAccessProfile};
use crate::patterns::PatternKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfidenceFactor {
    SequentialAccess,
    ComplexDependencyFlow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScore {
    pub score: f64,
    pub positive_factors: Vec<ConfidenceFactor>,
    pub negative_factors: Vec<ConfidenceFactor>,
    pub explanation: String,
}

#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    base: f64,
    sequential_bonus: f64,
    complex_flow_penalty: f64,
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfidenceScorer {
    pub fn new() -> Self {
        Self {
            base: 0.5,
            sequential_bonus: 0.3,
            complex_flow_penalty: 0.2,
        }
    }

    pub fn score(&self, pattern: PatternKind, mem: &MemoryAccessProfile, dep: &DependencyProfile) -> f64 {
        self.explain(pattern, mem, dep).score
    }

    pub fn explain(
        &self,
        pattern: PatternKind,
        mem: &MemoryAccessProfile,
        dep: &DependencyProfile,
    ) -> ConfidenceScore {
        let mut score = self.base;
        let mut positive_factors = Vec::new();
        let mut negative_factors = Vec::new();

        if mem.primary_pattern == MemoryAccessPattern::Sequential {
            score += self.sequential_bonus;
            positive_factors.push(ConfidenceFactor::SequentialAccess);
        }

        if dep.kind == DependencyKind::ComplexFlow {
            score -= self.complex_flow_penalty;
            negative_factors.push(ConfidenceFactor::ComplexDependencyFlow);
        }

        let score = score.clamp(0.0, 1.0);
        let explanation = Self::explanation(pattern, score, &positive_factors, &negative_factors);

        ConfidenceScore {
            score,
            positive_factors,
            negative_factors,
            explanation,
        }
    }

    fn explanation(
        pattern: PatternKind,
        score: f64,
        positive: &[ConfidenceFactor],
        negative: &[ConfidenceFactor],
    ) -> String {
        let level = if score >= 0.8 {
            "High"
        } else if score >= 0.5 {
            "Medium"
        } else {
            "Low"
        };
        let mut parts = vec![format!("{level} confidence ({score:.2}) for {pattern}")];
        if positive.contains(&ConfidenceFactor::SequentialAccess) {
            parts.push("sequential memory access".to_string());
        }
        if negative.contains(&ConfidenceFactor::ComplexDependencyFlow) {
            parts.push("complex dependency flow".to_string());
        }
        parts.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profiles(pattern: MemoryAccessPattern, kind: DependencyKind) -> (MemoryAccessProfile, DependencyProfile) {
        let mem = MemoryAccessProfile {
            primary_pattern: pattern,
            ..MemoryAccessProfile::default()
        };
        let mut dep = DependencyProfile::read_only();
        dep.kind = kind;
        (mem, dep)
    }

    #[test]
    fn test_score_table() {
        let scorer = ConfidenceScorer::new();

        let (mem, dep) = profiles(MemoryAccessPattern::Sequential, DependencyKind::None);
        assert!((scorer.score(PatternKind::Map, &mem, &dep) - 0.8).abs() < 1e-9);

        let (mem, dep) = profiles(MemoryAccessPattern::Random, DependencyKind::None);
        assert!((scorer.score(PatternKind::Map, &mem, &dep) - 0.5).abs() < 1e-9);

        let (mem, dep) = profiles(MemoryAccessPattern::GatherScatter, DependencyKind::ComplexFlow);
        assert!((scorer.score(PatternKind::Unknown, &mem, &dep) - 0.3).abs() < 1e-9);

        let (mem, dep) = profiles(MemoryAccessPattern::Sequential, DependencyKind::ComplexFlow);
        let explained = scorer.explain(PatternKind::Stencil, &mem, &dep);
        assert!((explained.score - 0.6).abs() < 1e-9);
        assert_eq!(explained.negative_factors, vec![ConfidenceFactor::ComplexDependencyFlow]);
        assert!(explained.explanation.contains("stencil"));
    }
}
