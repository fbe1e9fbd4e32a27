//! Single-loop pipeline: leaves, battery, scoring, then the hybrid merge.

use super::report::LoopReport;
use crate::analysis::access::collect_accesses;
use crate::analysis::{
    ConfidenceScore, ConfidenceScorer, DependencyAnalyzer, DependencyProfile, MemoryAccessAnalyzer,
    MemoryAccessProfile, NestingInfo, VectorizationVerdict,
};
use crate::classifier::{
    CandidateRecord, ClassificationRequest, ClassifierOutcome, ExternalClassifierAdapter,
    PatternSignatures,
};
use crate::context::serialize_loop_context;
use crate::hybrid::{CombinationWeights, HybridCombiner};
use crate::ir::{BlockId, LoopHandle};
use crate::patterns::{PatternClassification, PatternMatcher, PatternPolicy, RecognitionContext};
use crate::suggestions::TransformationSuggester;
use std::sync::Arc;
use tracing::debug;

/// Result of the pure part of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticAnalysis {
    pub function: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub header: BlockId,
    pub nesting: NestingInfo,
    pub memory: MemoryAccessProfile,
    pub dependency: DependencyProfile,
    pub vectorization: VectorizationVerdict,
    pub classification: PatternClassification,
    pub confidence: ConfidenceScore,
}

pub struct LoopAnalyzer {
    memory: MemoryAccessAnalyzer,
    dependency: DependencyAnalyzer,
    matcher: PatternMatcher,
    scorer: ConfidenceScorer,
    combiner: HybridCombiner,
    suggester: TransformationSuggester,
}

impl Default for LoopAnalyzer {
    fn default() -> Self {
        Self::new(PatternPolicy::default(), CombinationWeights::default())
    }
}

impl LoopAnalyzer {
    pub fn new(policy: PatternPolicy, weights: CombinationWeights) -> Self {
        Self {
            memory: MemoryAccessAnalyzer::new(),
            dependency: DependencyAnalyzer::new(),
            matcher: PatternMatcher::new(policy),
            scorer: ConfidenceScorer::new(),
            combiner: HybridCombiner::new(weights),
            suggester: TransformationSuggester::new(),
        }
    }

    pub fn with_matcher(mut self, matcher: PatternMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_signatures(mut self, signatures: Arc<PatternSignatures>) -> Self {
        self.combiner = self.combiner.with_signatures(signatures);
        self
    }

    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    pub fn analyze_static(&self, lp: &dyn LoopHandle) -> StaticAnalysis {
        let sites = collect_accesses(lp);
        let memory = self.memory.analyze_sites(lp, &sites);
        let dependency = self.dependency.analyze_sites(lp, &sites);
        let nesting = NestingInfo::of(lp);

        let ctx = RecognitionContext::new(lp, &memory, &dependency, &nesting);
        let classification = self.matcher.classify_with(&ctx);
        let vectorization = ctx.vectorization.clone();
        drop(ctx);

        let confidence = self.scorer.explain(classification.kind, &memory, &dependency);
        let location = lp.source_location();
        debug!(
            "{}: loop at {} is {} ({:.2})",
            lp.function_name(),
            lp.header(),
            classification.kind,
            confidence.score
        );

        StaticAnalysis {
            function: lp.function_name().to_string(),
            file: location.as_ref().and_then(|l| l.file.clone()),
            line: location.map(|l| l.line),
            header: lp.header(),
            nesting,
            memory,
            dependency,
            vectorization,
            classification,
            confidence,
        }
    }

    /// Static-only analysis.
    pub fn analyze(&self, lp: &dyn LoopHandle) -> LoopReport {
        self.finish(self.analyze_static(lp), None)
    }

    /// Single-loop request to the classifier, then the merge.
    pub async fn analyze_with(
        &self,
        lp: &dyn LoopHandle,
        adapter: &ExternalClassifierAdapter,
    ) -> LoopReport {
        let analysis = self.analyze_static(lp);
        if !adapter.is_available() {
            return self.finish(analysis, None);
        }
        let request = Self::request(&analysis, lp);
        let outcome = adapter.classify(&request).await;
        self.finish(analysis, Some(&outcome))
    }

    pub fn finish(&self, analysis: StaticAnalysis, outcome: Option<&ClassifierOutcome>) -> LoopReport {
        let verdict = self.combiner.combine(
            &analysis.classification,
            analysis.confidence.score,
            &analysis.vectorization,
            &analysis.dependency,
            outcome,
        );
        let annotation = self.suggester.annotation(analysis.classification.kind).to_string();

        LoopReport {
            function: analysis.function,
            file: analysis.file,
            line: analysis.line,
            header: analysis.header,
            nesting: analysis.nesting,
            memory: analysis.memory,
            dependency: analysis.dependency,
            vectorization: analysis.vectorization,
            classification: analysis.classification,
            confidence: analysis.confidence,
            verdict,
            annotation,
        }
    }

    pub fn request(analysis: &StaticAnalysis, lp: &dyn LoopHandle) -> ClassificationRequest {
        ClassificationRequest {
            pattern: analysis.classification.kind.label().to_string(),
            context: serialize_loop_context(lp),
            function: analysis.function.clone(),
        }
    }

    pub fn candidate(&self, analysis: &StaticAnalysis) -> CandidateRecord {
        let patch = self
            .suggester
            .suggest(&analysis.classification, &analysis.vectorization)
            .into_iter()
            .next()
            .unwrap_or_default();
        CandidateRecord {
            candidate_type: analysis.classification.kind.label().to_string(),
            file: analysis.file.clone().unwrap_or_default(),
            function: analysis.function.clone(),
            line: analysis.line.unwrap_or(0),
            reason: self.suggester.annotation(analysis.classification.kind).to_string(),
            suggested_patch: patch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassifierConfig, MockClassifier};
    use crate::hybrid::HybridSource;
    use crate::ir::{BinaryOp, FunctionBuilder, FunctionIr};
    use crate::patterns::PatternKind;

    fn doubled() -> FunctionIr {
        let mut b = FunctionBuilder::new("double_all");
        let lp = b.counted_loop("i", 1024i64);
        let x = b.load_element("src", vec![lp.iv.into()]);
        let y = b.binary(BinaryOp::Mul, x, 2i64);
        b.store_element("dst", vec![lp.iv.into()], y);
        b.close_loop(&lp);
        b.build()
    }

    #[test]
    fn test_static_pipeline_is_idempotent() {
        let function = doubled();
        let lp = function.loop_ref(0).unwrap();
        let analyzer = LoopAnalyzer::default();
        let first = analyzer.analyze(&lp);
        let second = analyzer.analyze(&lp);
        assert_eq!(first, second);
        assert_eq!(first.verdict.source, HybridSource::StaticOnly);
        assert!(first.vectorization.vectorizable);
        assert_ne!(first.pattern(), PatternKind::Unknown);
    }

    #[tokio::test]
    async fn test_analyze_with_disabled_adapter_is_static() {
        let function = doubled();
        let lp = function.loop_ref(0).unwrap();
        let analyzer = LoopAnalyzer::default();
        let report = analyzer
            .analyze_with(&lp, &ExternalClassifierAdapter::disabled())
            .await;
        assert_eq!(report, analyzer.analyze(&lp));
    }

    #[tokio::test]
    async fn test_analyze_with_mock_opinion() {
        let function = doubled();
        let lp = function.loop_ref(0).unwrap();
        let analyzer = LoopAnalyzer::default();
        let classifier = Arc::new(MockClassifier::new().with_default_response(MockClassifier::opinion(
            "safe_parallel",
            0.95,
            "independent",
        )));
        let adapter = ExternalClassifierAdapter::new(classifier.clone(), ClassifierConfig::enabled());
        let report = analyzer.analyze_with(&lp, &adapter).await;
        assert_eq!(classifier.call_count(), 1);
        assert_eq!(report.verdict.source, HybridSource::Hybrid);
        assert!(report.verdict.combined_confidence > report.confidence.score);
    }

    #[test]
    fn test_candidate_record() {
        let function = doubled();
        let lp = function.loop_ref(0).unwrap();
        let analyzer = LoopAnalyzer::default();
        let analysis = analyzer.analyze_static(&lp);
        let candidate = analyzer.candidate(&analysis);
        assert_eq!(candidate.function, "double_all");
        assert_eq!(candidate.candidate_type, analysis.classification.kind.label());
        assert!(candidate.suggested_patch.starts_with("#pragma omp"));
    }
}
