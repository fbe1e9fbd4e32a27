//! Vectorization feasibility as a lookup over the two leaf profiles.

use super::dependency::{DependencyKind, DependencyProfile};
use super::memory_access::{MemoryAccessPattern, MemoryAccessProfile};
use serde::{Deserialize, Serialize};

pub const NO_LIMITATIONS: &str = "None";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorizationVerdict {
    pub vectorizable: bool,
    pub recommended_width: u32,
    pub requires_gather: bool,
    pub expected_speedup: f64,
    pub limitations: String,
}

impl VectorizationVerdict {
    fn scalar(requires_gather: bool, limitations: impl Into<String>) -> Self {
        Self {
            vectorizable: false,
            recommended_width: 1,
            requires_gather,
            expected_speedup: 1.0,
            limitations: limitations.into(),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct VectorizationAssessor;

impl VectorizationAssessor {
    pub fn new() -> Self {
        Self
    }

    pub fn assess(&self, mem: &MemoryAccessProfile, dep: &DependencyProfile) -> VectorizationVerdict {
        let requires_gather = mem.primary_pattern == MemoryAccessPattern::GatherScatter;

        match (mem.primary_pattern, dep.kind) {
            (MemoryAccessPattern::Sequential, DependencyKind::None | DependencyKind::ReadOnly) => {
                VectorizationVerdict {
                    vectorizable: true,
                    recommended_width: 4,
                    requires_gather,
                    expected_speedup: 3.5,
                    limitations: NO_LIMITATIONS.to_string(),
                }
            }
            (MemoryAccessPattern::Strided(_), DependencyKind::None | DependencyKind::ReadOnly) => {
                VectorizationVerdict {
                    vectorizable: true,
                    recommended_width: 2,
                    requires_gather,
                    expected_speedup: 1.8,
                    limitations: "Strided access reduces efficiency".to_string(),
                }
            }
            (MemoryAccessPattern::Sequential, _) if dep.eliminable => VectorizationVerdict {
                vectorizable: true,
                recommended_width: 4,
                requires_gather,
                expected_speedup: 2.5,
                limitations: "Loop-carried accumulator requires reduction privatization".to_string(),
            },
            (pattern, kind) => VectorizationVerdict::scalar(requires_gather, Self::limitation(pattern, kind, dep)),
        }
    }

    fn limitation(pattern: MemoryAccessPattern, kind: DependencyKind, dep: &DependencyProfile) -> String {
        if !kind.is_safe() && !dep.eliminable {
            return if dep.distance > 0 {
                format!("Loop-carried {kind} dependency (distance {})", dep.distance)
            } else {
                format!("Loop-carried {kind} dependency")
            };
        }
        match pattern {
            MemoryAccessPattern::GatherScatter => {
                "Indirect (gather/scatter) memory access".to_string()
            }
            MemoryAccessPattern::Random => "Unpredictable memory access pattern".to_string(),
            MemoryAccessPattern::Reduction => {
                "Accumulation into a single memory location".to_string()
            }
            MemoryAccessPattern::UnitStride => {
                "Offset neighbour accesses overlap across lanes".to_string()
            }
            _ => "Complex memory access pattern or dependencies".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn mem(pattern: MemoryAccessPattern) -> MemoryAccessProfile {
        MemoryAccessProfile {
            primary_pattern: pattern,
            predictability: 1.0,
            ..MemoryAccessProfile::default()
        }
    }

    fn dep(kind: DependencyKind, eliminable: bool) -> DependencyProfile {
        DependencyProfile {
            kind,
            distance: if kind.is_safe() { 0 } else { 1 },
            eliminable,
            dependent_variables: BTreeSet::new(),
            carried: Vec::new(),
        }
    }

    #[test]
    fn test_lookup_rows() {
        let assessor = VectorizationAssessor::new();

        let v = assessor.assess(&mem(MemoryAccessPattern::Sequential), &dep(DependencyKind::None, false));
        assert!(v.vectorizable);
        assert_eq!(v.recommended_width, 4);
        assert_eq!(v.limitations, NO_LIMITATIONS);

        let v = assessor.assess(&mem(MemoryAccessPattern::Strided(2)), &dep(DependencyKind::ReadOnly, false));
        assert!(v.vectorizable);
        assert_eq!(v.recommended_width, 2);
        assert!(v.limitations.contains("Strided"));

        let v = assessor.assess(&mem(MemoryAccessPattern::GatherScatter), &dep(DependencyKind::None, false));
        assert!(!v.vectorizable);
        assert!(v.requires_gather);
        assert_eq!(v.recommended_width, 1);

        let v = assessor.assess(&mem(MemoryAccessPattern::Sequential), &dep(DependencyKind::Raw, false));
        assert!(!v.vectorizable);
        assert!(v.limitations.contains("read-after-write"));
    }

    #[test]
    fn test_privatizable_accumulator_vectorizes() {
        let v = VectorizationAssessor::new().assess(
            &mem(MemoryAccessPattern::Sequential),
            &dep(DependencyKind::Raw, true),
        );
        assert!(v.vectorizable);
        assert!(v.expected_speedup < 3.5);
    }

    #[test]
    fn test_unit_stride_stays_scalar() {
        let v = VectorizationAssessor::new().assess(
            &mem(MemoryAccessPattern::UnitStride),
            &dep(DependencyKind::None, false),
        );
        assert!(!v.vectorizable);
    }
}
