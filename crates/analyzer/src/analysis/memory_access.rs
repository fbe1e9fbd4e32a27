//! Classification of how a loop walks memory.

use super::access::{collect_accesses, AccessSite, IndexTerm};
use crate::ir::LoopHandle;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryAccessPattern {
    Sequential,
    UnitStride,
    /// Element stride; 0 when the stride is a whole (unknown-length) row.
    Strided(i64),
    GatherScatter,
    Random,
    Reduction,
}

impl MemoryAccessPattern {
    /// Higher is less predictable.
    pub fn rank(self) -> u8 {
        match self {
            MemoryAccessPattern::Sequential => 0,
            MemoryAccessPattern::UnitStride => 1,
            MemoryAccessPattern::Strided(_) => 2,
            MemoryAccessPattern::Reduction => 3,
            MemoryAccessPattern::GatherScatter => 4,
            MemoryAccessPattern::Random => 5,
        }
    }

    pub fn is_predictable(self) -> bool {
        matches!(
            self,
            MemoryAccessPattern::Sequential | MemoryAccessPattern::UnitStride
        )
    }
}

impl fmt::Display for MemoryAccessPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryAccessPattern::Sequential => write!(f, "sequential"),
            MemoryAccessPattern::UnitStride => write!(f, "unit-stride"),
            MemoryAccessPattern::Strided(0) => write!(f, "strided (row)"),
            MemoryAccessPattern::Strided(d) => write!(f, "strided ({d})"),
            MemoryAccessPattern::GatherScatter => write!(f, "gather/scatter"),
            MemoryAccessPattern::Random => write!(f, "random"),
            MemoryAccessPattern::Reduction => write!(f, "reduction"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryAccessProfile {
    pub primary_pattern: MemoryAccessPattern,
    pub predictability: f64,
    pub is_aliasing: bool,
    pub accessed_arrays: BTreeSet<String>,
    pub access_count: usize,
}

impl Default for MemoryAccessProfile {
    fn default() -> Self {
        Self {
            primary_pattern: MemoryAccessPattern::Random,
            predictability: 0.0,
            is_aliasing: false,
            accessed_arrays: BTreeSet::new(),
            access_count: 0,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryAccessAnalyzer;

impl MemoryAccessAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, lp: &dyn LoopHandle) -> MemoryAccessProfile {
        let sites = collect_accesses(lp);
        self.analyze_sites(lp, &sites)
    }

    pub fn analyze_sites(&self, lp: &dyn LoopHandle, sites: &[AccessSite]) -> MemoryAccessProfile {
        let accessed_arrays: BTreeSet<String> = sites.iter().map(|s| s.base.clone()).collect();

        if lp.induction_variable().is_none() || sites.is_empty() {
            debug!(
                "{}: no induction variable or no memory accesses, assuming random access",
                lp.function_name()
            );
            return MemoryAccessProfile {
                accessed_arrays,
                access_count: sites.len(),
                ..MemoryAccessProfile::default()
            };
        }

        let written: HashSet<&str> = sites
            .iter()
            .filter(|s| s.is_write())
            .map(|s| s.base.as_str())
            .collect();

        let patterns: Vec<MemoryAccessPattern> = sites
            .iter()
            .map(|site| Self::classify_site(site, &written))
            .collect();

        let primary_pattern = patterns
            .iter()
            .copied()
            .max_by_key(|p| p.rank())
            .unwrap_or(MemoryAccessPattern::Random);
        let predictable = patterns.iter().filter(|p| p.is_predictable()).count();
        let predictability = (predictable as f64 / patterns.len() as f64).clamp(0.0, 1.0);

        let is_aliasing = sites.iter().any(|s| !s.base_invariant)
            || sites.iter().any(|s| {
                written.contains(s.base.as_str()) && s.terms.iter().any(|t| !t.is_resolved())
            });

        MemoryAccessProfile {
            primary_pattern,
            predictability,
            is_aliasing,
            accessed_arrays,
            access_count: sites.len(),
        }
    }

    /// Pattern of a single access.
    pub fn classify_site(site: &AccessSite, written: &HashSet<&str>) -> MemoryAccessPattern {
        if !site.base_invariant {
            return MemoryAccessPattern::Random;
        }
        if site.is_uniform() {
            return if written.contains(site.base.as_str()) {
                MemoryAccessPattern::Reduction
            } else {
                MemoryAccessPattern::Sequential
            };
        }

        let Some(position) = site.terms.iter().rposition(|t| !t.is_uniform()) else {
            return MemoryAccessPattern::Random;
        };
        let crosses_rows = site.terms[position + 1..]
            .iter()
            .any(|t| matches!(t, IndexTerm::Invariant(_)));

        match &site.terms[position] {
            IndexTerm::Indirect => MemoryAccessPattern::GatherScatter,
            IndexTerm::Opaque => MemoryAccessPattern::Random,
            IndexTerm::Affine { .. } if crosses_rows => MemoryAccessPattern::Strided(0),
            IndexTerm::Affine {
                coefficient: 1,
                offset: 0,
            } => MemoryAccessPattern::Sequential,
            IndexTerm::Affine { coefficient: 1, .. } => MemoryAccessPattern::UnitStride,
            IndexTerm::Affine { coefficient, .. } => MemoryAccessPattern::Strided(*coefficient),
            IndexTerm::Invariant(_) | IndexTerm::Swept(_) => MemoryAccessPattern::Sequential,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, FunctionBuilder, FunctionIr, Operand};

    fn single_loop(body: impl FnOnce(&mut FunctionBuilder, crate::ir::ValueId)) -> FunctionIr {
        let mut b = FunctionBuilder::new("kernel");
        let lp = b.counted_loop("i", Operand::symbol("n"));
        body(&mut b, lp.iv);
        b.close_loop(&lp);
        b.build()
    }

    #[test]
    fn test_all_sequential() {
        let function = single_loop(|b, i| {
            let x = b.load_element("A", vec![i.into()]);
            b.store_element("B", vec![i.into()], x);
        });
        let profile = MemoryAccessAnalyzer::new().analyze(&function.loop_ref(0).unwrap());

        assert_eq!(profile.primary_pattern, MemoryAccessPattern::Sequential);
        assert_eq!(profile.predictability, 1.0);
        assert!(!profile.is_aliasing);
        assert_eq!(profile.accessed_arrays.len(), 2);
    }

    #[test]
    fn test_least_predictable_access_wins() {
        let function = single_loop(|b, i| {
            let x = b.load_element("A", vec![i.into()]);
            let twice = b.binary(BinaryOp::Mul, i, 2i64);
            let y = b.load_element("A", vec![twice.into()]);
            let s = b.binary(BinaryOp::Add, x, y);
            b.store_element("B", vec![i.into()], s);
        });
        let profile = MemoryAccessAnalyzer::new().analyze(&function.loop_ref(0).unwrap());

        assert_eq!(profile.primary_pattern, MemoryAccessPattern::Strided(2));
        assert!((profile.predictability - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_gather() {
        let function = single_loop(|b, i| {
            let idx = b.load_element("idx", vec![i.into()]);
            let x = b.load_element("A", vec![idx.into()]);
            b.store_element("B", vec![i.into()], x);
        });
        let profile = MemoryAccessAnalyzer::new().analyze(&function.loop_ref(0).unwrap());
        assert_eq!(profile.primary_pattern, MemoryAccessPattern::GatherScatter);
    }

    #[test]
    fn test_no_accesses_defaults_to_random() {
        let function = single_loop(|b, i| {
            b.binary(BinaryOp::Add, i, 1i64);
        });
        let profile = MemoryAccessAnalyzer::new().analyze(&function.loop_ref(0).unwrap());
        assert_eq!(profile, MemoryAccessProfile::default());
    }

    #[test]
    fn test_column_walk_is_row_strided() {
        let function = single_loop(|b, i| {
            let x = b.load_element("B", vec![i.into(), Operand::symbol("j")]);
            b.store_element("C", vec![i.into()], x);
        });
        let profile = MemoryAccessAnalyzer::new().analyze(&function.loop_ref(0).unwrap());
        assert_eq!(profile.primary_pattern, MemoryAccessPattern::Strided(0));
    }
}
