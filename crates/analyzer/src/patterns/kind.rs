use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    SimpleParallel,
    Reduction,
    Vectorizable,
    EmbarrassinglyParallel,
    Map,
    Filter,
    PrefixSum,
    Stencil,
    MatrixMultiply,
    MatrixAddition,
    MatrixScaling,
    FrobeniusNorm,
    #[serde(rename = "convolution_2d")]
    Convolution2D,
    ImageProcessing,
    ComplexReduction,
    Unknown,
}

impl PatternKind {
    pub const ALL: [PatternKind; 16] = [
        PatternKind::SimpleParallel,
        PatternKind::Reduction,
        PatternKind::Vectorizable,
        PatternKind::EmbarrassinglyParallel,
        PatternKind::Map,
        PatternKind::Filter,
        PatternKind::PrefixSum,
        PatternKind::Stencil,
        PatternKind::MatrixMultiply,
        PatternKind::MatrixAddition,
        PatternKind::MatrixScaling,
        PatternKind::FrobeniusNorm,
        PatternKind::Convolution2D,
        PatternKind::ImageProcessing,
        PatternKind::ComplexReduction,
        PatternKind::Unknown,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PatternKind::SimpleParallel => "simple_parallel",
            PatternKind::Reduction => "reduction",
            PatternKind::Vectorizable => "vectorizable",
            PatternKind::EmbarrassinglyParallel => "embarrassingly_parallel",
            PatternKind::Map => "map",
            PatternKind::Filter => "filter",
            PatternKind::PrefixSum => "prefix_sum",
            PatternKind::Stencil => "stencil",
            PatternKind::MatrixMultiply => "matrix_multiply",
            PatternKind::MatrixAddition => "matrix_addition",
            PatternKind::MatrixScaling => "matrix_scaling",
            PatternKind::FrobeniusNorm => "frobenius_norm",
            PatternKind::Convolution2D => "convolution_2d",
            PatternKind::ImageProcessing => "image_processing",
            PatternKind::ComplexReduction => "complex_reduction",
            PatternKind::Unknown => "unknown",
        }
    }

    /// Parses a label, also accepting the names external tools use.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        if let Some(kind) = Self::ALL.iter().find(|k| k.label() == normalized) {
            return Some(*kind);
        }
        let kind = match normalized.as_str() {
            "parallel_loop" | "parallel" => PatternKind::SimpleParallel,
            "map_operation" | "elementwise" => PatternKind::Map,
            "scan" | "prefix_scan" => PatternKind::PrefixSum,
            "matrix_multiplication" | "matmul" | "gemm" => PatternKind::MatrixMultiply,
            "matrix_add" => PatternKind::MatrixAddition,
            "matrix_scale" => PatternKind::MatrixScaling,
            "convolution" | "conv2d" | "convolution2d" => PatternKind::Convolution2D,
            "advanced_reduction" | "min_max_reduction" => PatternKind::ComplexReduction,
            "vectorizable_loop" => PatternKind::Vectorizable,
            _ => return None,
        };
        Some(kind)
    }

    /// Loops whose iterations are independent once reductions are privatized.
    pub fn is_parallel_shape(self) -> bool {
        !matches!(self, PatternKind::PrefixSum | PatternKind::Unknown)
    }

    pub fn is_reduction_like(self) -> bool {
        matches!(
            self,
            PatternKind::Reduction | PatternKind::ComplexReduction | PatternKind::FrobeniusNorm
        )
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
