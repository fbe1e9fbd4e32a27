//! Loop analysis orchestration
//!
//! [`LoopAnalyzer`] runs the pipeline for one loop. [`AnalysisEngine`] runs it
//! for every loop of a function, in parallel, and batches the optional
//! external classifier calls per run.

pub mod engine;
pub mod loop_analyzer;
pub mod report;

pub use engine::AnalysisEngine;
pub use loop_analyzer::{LoopAnalyzer, StaticAnalysis};
pub use report::{AnalysisReport, ClassifierStatus, LoopReport};
