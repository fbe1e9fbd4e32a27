//! Pattern and vectorization verdict to OpenMP-style transformation text.

use crate::analysis::VectorizationVerdict;
use crate::patterns::{PatternClassification, PatternKind, ReductionInfo};

pub const REQUIRES_VERIFICATION: &str = "/* requires verification */";

const PARALLEL_FOR: &str = "#pragma omp parallel for";
const BOUNDARY_NOTE: &str = "// Note: boundary conditions may need special handling";

#[derive(Debug, Default, Clone)]
pub struct TransformationSuggester;

impl TransformationSuggester {
    pub fn new() -> Self {
        Self
    }

    /// Ordered suggestions, primary first. Never empty.
    pub fn suggest(
        &self,
        classification: &PatternClassification,
        vectorization: &VectorizationVerdict,
    ) -> Vec<String> {
        let evidence = &classification.evidence;
        let reduction = evidence.reduction.as_ref();
        let mut suggestions = vec![Self::primary(classification.kind, reduction)];

        if let Some(depth) = evidence.collapse.filter(|d| *d >= 2) {
            if !suggestions[0].contains("collapse(") && classification.kind.is_parallel_shape() {
                suggestions.push(format!("{PARALLEL_FOR} collapse({depth})"));
            }
        }

        if vectorization.vectorizable && !suggestions[0].contains("simd") {
            let mut simd = format!("#pragma omp simd simdlen({})", vectorization.recommended_width);
            if let Some(info) = reduction {
                simd.push_str(&format!(" {}", Self::reduction_clause(info)));
            }
            suggestions.push(simd);
        }

        suggestions
    }

    fn primary(kind: PatternKind, reduction: Option<&ReductionInfo>) -> String {
        match kind {
            PatternKind::SimpleParallel
            | PatternKind::EmbarrassinglyParallel
            | PatternKind::Map
            | PatternKind::Filter => PARALLEL_FOR.to_string(),
            PatternKind::Vectorizable => format!("#pragma omp simd\n{PARALLEL_FOR}"),
            PatternKind::Reduction | PatternKind::FrobeniusNorm => match reduction {
                Some(info) => format!("{PARALLEL_FOR} {}", Self::reduction_clause(info)),
                None => format!("{PARALLEL_FOR} reduction(+:sum)"),
            },
            PatternKind::ComplexReduction => match reduction {
                Some(info) => format!("{PARALLEL_FOR} {}", Self::reduction_clause(info)),
                None => format!("{PARALLEL_FOR} reduction(min:var) // or max:var"),
            },
            PatternKind::PrefixSum => match reduction {
                Some(info) => format!(
                    "{PARALLEL_FOR} reduction(inscan, {}:{})\n// Separate update and use with #pragma omp scan inclusive({})",
                    info.operator.clause_symbol(),
                    info.variable,
                    info.variable
                ),
                None => "// Sequential prefix dependency: consider a parallel scan algorithm".to_string(),
            },
            PatternKind::MatrixAddition | PatternKind::MatrixScaling => {
                format!("{PARALLEL_FOR} collapse(2)\n#pragma omp simd")
            }
            PatternKind::MatrixMultiply => {
                format!("{PARALLEL_FOR}\n// Consider blocking for cache efficiency")
            }
            PatternKind::Stencil => format!("{PARALLEL_FOR}\n{BOUNDARY_NOTE}"),
            PatternKind::Convolution2D => format!("{PARALLEL_FOR} collapse(2)"),
            PatternKind::ImageProcessing => format!("{PARALLEL_FOR} collapse(2)\n{BOUNDARY_NOTE}"),
            PatternKind::Unknown => format!("{PARALLEL_FOR} // Pattern-specific optimization needed"),
        }
    }

    fn reduction_clause(info: &ReductionInfo) -> String {
        format!("reduction({}:{})", info.operator.clause_symbol(), info.variable)
    }

    /// Short human-readable note attached to each reported loop.
    pub fn annotation(&self, kind: PatternKind) -> &'static str {
        match kind {
            PatternKind::EmbarrassinglyParallel => {
                "Perfect parallel candidate - no dependencies between iterations"
            }
            PatternKind::Vectorizable => "Array access with arithmetic operations - good for SIMD",
            PatternKind::SimpleParallel => "Array access with simple indexing detected",
            PatternKind::Map => "Elementwise map - each output depends only on its own inputs",
            PatternKind::Filter => "Conditional store - parallel when the guarded writes do not collide",
            PatternKind::Reduction => "Reduction - privatize the accumulator with a reduction clause",
            PatternKind::PrefixSum => "Prefix dependency - needs a scan, not a plain parallel loop",
            PatternKind::Stencil => "Stencil - neighbouring reads of one array, watch the boundaries",
            PatternKind::MatrixMultiply => "Matrix multiply - parallelize the outer loop and block for cache",
            PatternKind::MatrixAddition => "Matrix addition - fully parallel over both dimensions",
            PatternKind::MatrixScaling => "Matrix scaling - fully parallel over both dimensions",
            PatternKind::FrobeniusNorm => "Sum of squares - parallel with a sum reduction",
            PatternKind::Convolution2D => "2-D convolution - collapse the spatial loops",
            PatternKind::ImageProcessing => "Image neighbourhood filter - collapse rows and columns",
            PatternKind::ComplexReduction => "Min/max or bitwise reduction - use the matching reduction operator",
            PatternKind::Unknown => "Function calls or complex operations detected",
        }
    }

    /// Appends the verification marker unless already present.
    pub fn mark_for_verification(transformation: &str) -> String {
        if transformation.contains(REQUIRES_VERIFICATION) {
            transformation.to_string()
        } else {
            format!("{transformation} {REQUIRES_VERIFICATION}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ReductionOperator;
    use crate::patterns::PatternEvidence;

    fn scalar() -> VectorizationVerdict {
        VectorizationVerdict {
            vectorizable: false,
            recommended_width: 1,
            requires_gather: false,
            expected_speedup: 1.0,
            limitations: "Loop-carried dependencies".to_string(),
        }
    }

    #[test]
    fn test_reduction_uses_evidence_variable() {
        let classification = PatternClassification::new(
            PatternKind::Reduction,
            PatternEvidence::new("acc").with_reduction("total", ReductionOperator::Product),
        );
        let suggestions = TransformationSuggester::new().suggest(&classification, &scalar());
        assert_eq!(suggestions, vec!["#pragma omp parallel for reduction(*:total)".to_string()]);
    }

    #[test]
    fn test_vectorizable_adds_simd_and_collapse() {
        let classification = PatternClassification::new(
            PatternKind::EmbarrassinglyParallel,
            PatternEvidence::new("nest").with_collapse(3),
        );
        let verdict = VectorizationVerdict {
            vectorizable: true,
            recommended_width: 4,
            expected_speedup: 3.5,
            limitations: "None".to_string(),
            ..scalar()
        };
        let suggestions = TransformationSuggester::new().suggest(&classification, &verdict);
        assert_eq!(suggestions[0], "#pragma omp parallel for");
        assert!(suggestions.contains(&"#pragma omp parallel for collapse(3)".to_string()));
        assert!(suggestions.contains(&"#pragma omp simd simdlen(4)".to_string()));
    }

    #[test]
    fn test_unknown_has_fallback() {
        let suggestions = TransformationSuggester::new()
            .suggest(&PatternClassification::unknown("nothing matched"), &scalar());
        assert_eq!(suggestions.len(), 1);
        assert!(suggestions[0].contains("Pattern-specific optimization needed"));
    }

    #[test]
    fn test_verification_marker_is_idempotent() {
        let once = TransformationSuggester::mark_for_verification("#pragma omp parallel for");
        assert_eq!(once, "#pragma omp parallel for /* requires verification */");
        assert_eq!(TransformationSuggester::mark_for_verification(&once), once);
    }
}
