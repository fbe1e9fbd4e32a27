use super::loop_analyzer::{LoopAnalyzer, StaticAnalysis};
use super::report::{AnalysisReport, ClassifierStatus, LoopReport};
use crate::classifier::{ClassifierOutcome, ExternalClassifier, ExternalClassifierAdapter, PatternSignatures};
use crate::config::AnalyzerConfig;
use crate::ir::{FunctionIr, LoopHandle};
use anyhow::Result;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{info, warn};

/// Runs the loop pipeline over whole functions. Static analysis of distinct
/// loops shares nothing and runs on the rayon pool; the external classifier is
/// called once per run with every candidate batched together.
pub struct AnalysisEngine {
    analyzer: LoopAnalyzer,
    adapter: ExternalClassifierAdapter,
    config: AnalyzerConfig,
}

impl AnalysisEngine {
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        if let Some(path) = &config.signatures_path {
            if !PatternSignatures::load_global(path)? {
                warn!(
                    "Pattern signatures already loaded for this process; ignoring {}",
                    path.display()
                );
            }
        }

        Ok(Self {
            analyzer: LoopAnalyzer::new(config.policy.clone(), config.weights),
            adapter: ExternalClassifierAdapter::disabled(),
            config,
        })
    }

    /// Injects the classifier, configured by `config.classifier`.
    pub fn with_classifier(mut self, classifier: Arc<dyn ExternalClassifier>) -> Self {
        self.adapter = ExternalClassifierAdapter::new(classifier, self.config.classifier.clone());
        self
    }

    pub fn with_analyzer(mut self, analyzer: LoopAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn analyzer(&self) -> &LoopAnalyzer {
        &self.analyzer
    }

    pub fn adapter(&self) -> &ExternalClassifierAdapter {
        &self.adapter
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Static-only reports, one per loop in input order.
    pub fn analyze_loops<L: LoopHandle + Sync>(&self, loops: &[L]) -> Vec<LoopReport> {
        self.static_pass(loops)
            .into_iter()
            .map(|analysis| self.analyzer.finish(analysis, None))
            .collect()
    }

    pub fn analyze_function(&self, function: &FunctionIr) -> AnalysisReport {
        let report = AnalysisReport::new(self.analyze_loops(&function.loops()))
            .with_classifier_status(self.status(0, 0));
        Self::log_summary(function.name(), &report);
        report
    }

    pub async fn analyze_function_hybrid(&self, function: &FunctionIr) -> AnalysisReport {
        self.analyze_functions_hybrid(std::slice::from_ref(function))
            .await
            .pop()
            .unwrap_or_default()
    }

    /// One report per function. All loops of the run go to the classifier in
    /// a single batched call (chunked by `batch_size`).
    pub async fn analyze_functions_hybrid(&self, functions: &[FunctionIr]) -> Vec<AnalysisReport> {
        let statics: Vec<Vec<StaticAnalysis>> = functions
            .iter()
            .map(|function| self.static_pass(&function.loops()))
            .collect();

        let outcomes: Vec<Option<ClassifierOutcome>> = if self.adapter.is_available() {
            let candidates: Vec<_> = statics
                .iter()
                .flatten()
                .map(|analysis| self.analyzer.candidate(analysis))
                .collect();
            let outcomes = self.adapter.classify_batch(&candidates).await;
            if outcomes.len() != candidates.len() {
                warn!(
                    "Classifier returned {} outcomes for {} candidates",
                    outcomes.len(),
                    candidates.len()
                );
            }
            outcomes.into_iter().map(Some).collect()
        } else {
            Vec::new()
        };

        let mut outcomes = outcomes.into_iter();
        functions
            .iter()
            .zip(statics)
            .map(|(function, analyses)| {
                let (mut opinions, mut unavailable) = (0, 0);
                let loops = analyses
                    .into_iter()
                    .map(|analysis| {
                        let outcome = outcomes.next().flatten();
                        match &outcome {
                            Some(ClassifierOutcome::Opinion(_)) => opinions += 1,
                            Some(ClassifierOutcome::Unavailable(_)) => unavailable += 1,
                            None => {}
                        }
                        self.analyzer.finish(analysis, outcome.as_ref())
                    })
                    .collect();
                let report = AnalysisReport::new(loops)
                    .with_classifier_status(self.status(opinions, unavailable));
                Self::log_summary(function.name(), &report);
                report
            })
            .collect()
    }

    fn static_pass<L: LoopHandle + Sync>(&self, loops: &[L]) -> Vec<StaticAnalysis> {
        if self.config.parallel_execution {
            loops
                .par_iter()
                .map(|lp| self.analyzer.analyze_static(lp))
                .collect()
        } else {
            loops
                .iter()
                .map(|lp| self.analyzer.analyze_static(lp))
                .collect()
        }
    }

    fn status(&self, opinions: usize, unavailable: usize) -> ClassifierStatus {
        ClassifierStatus {
            enabled: self.adapter.is_available(),
            name: self.adapter.classifier_name().map(str::to_string),
            opinions,
            unavailable,
        }
    }

    fn log_summary(function: &str, report: &AnalysisReport) {
        info!(
            "Analyzed {} loops in {}: {} vectorizable, {} require review",
            report.len(),
            function,
            report.vectorizable_count(),
            report.requiring_review().len()
        );
        if report.classifier.unavailable > 0 {
            warn!(
                "{} loops in {} fell back to static-only results",
                report.classifier.unavailable, function
            );
        }
    }
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self {
            analyzer: LoopAnalyzer::default(),
            adapter: ExternalClassifierAdapter::disabled(),
            config: AnalyzerConfig::default(),
        }
    }
}
