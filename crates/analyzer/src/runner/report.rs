use crate::analysis::{
    ConfidenceScore, DependencyProfile, MemoryAccessProfile, NestingInfo, VectorizationVerdict,
};
use crate::hybrid::HybridVerdict;
use crate::ir::BlockId;
use crate::patterns::{PatternClassification, PatternKind};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything known about one loop after the pipeline ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopReport {
    pub function: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub header: BlockId,
    pub nesting: NestingInfo,
    pub memory: MemoryAccessProfile,
    pub dependency: DependencyProfile,
    pub vectorization: VectorizationVerdict,
    pub classification: PatternClassification,
    pub confidence: ConfidenceScore,
    pub verdict: HybridVerdict,
    pub annotation: String,
}

impl LoopReport {
    pub fn pattern(&self) -> PatternKind {
        self.classification.kind
    }

    pub fn transformations(&self) -> &[String] {
        &self.verdict.transformations
    }

    pub fn requires_review(&self) -> bool {
        self.verdict.requires_human_review || self.verdict.conflict
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierStatus {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub opinions: usize,
    pub unavailable: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub loops: Vec<LoopReport>,
    pub classifier: ClassifierStatus,
}

impl AnalysisReport {
    pub fn new(loops: Vec<LoopReport>) -> Self {
        Self {
            loops,
            classifier: ClassifierStatus::default(),
        }
    }

    pub fn with_classifier_status(mut self, status: ClassifierStatus) -> Self {
        self.classifier = status;
        self
    }

    pub fn loops(&self) -> &[LoopReport] {
        &self.loops
    }

    pub fn len(&self) -> usize {
        self.loops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    pub fn pattern_counts(&self) -> BTreeMap<PatternKind, usize> {
        let mut counts = BTreeMap::new();
        for report in &self.loops {
            *counts.entry(report.pattern()).or_insert(0) += 1;
        }
        counts
    }

    pub fn vectorizable_count(&self) -> usize {
        self.loops.iter().filter(|r| r.vectorization.vectorizable).count()
    }

    /// Loops flagged for review or with conflicting verdicts.
    pub fn requiring_review(&self) -> Vec<&LoopReport> {
        self.loops.iter().filter(|r| r.requires_review()).collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
