use super::StencilShape;
use crate::analysis::access::{affine_in, collect_accesses, AccessSite};
use crate::analysis::recurrence::{carried_scalars, memory_accumulators, Accumulator};
use crate::analysis::{
    DependencyProfile, MemoryAccessProfile, NestingInfo, VectorizationAssessor,
    VectorizationVerdict,
};
use crate::error::AnalysisError;
use crate::ir::{Instruction, LoopHandle, Operand, ValueId};
use std::collections::{BTreeMap, BTreeSet};

/// Neighbour offsets beyond this are not treated as stencil points.
pub const STENCIL_RADIUS: u64 = 3;

/// Everything a recognizer may look at, computed once per loop.
pub struct RecognitionContext<'a> {
    pub lp: &'a dyn LoopHandle,
    pub memory: &'a MemoryAccessProfile,
    pub dependency: &'a DependencyProfile,
    pub nesting: &'a NestingInfo,
    pub vectorization: VectorizationVerdict,
    pub sites: Vec<AccessSite>,
    pub accumulators: Vec<Accumulator>,
}

impl<'a> RecognitionContext<'a> {
    pub fn new(
        lp: &'a dyn LoopHandle,
        memory: &'a MemoryAccessProfile,
        dependency: &'a DependencyProfile,
        nesting: &'a NestingInfo,
    ) -> Self {
        let sites = collect_accesses(lp);
        let mut accumulators: Vec<Accumulator> = carried_scalars(lp)
            .into_iter()
            .filter_map(|scalar| scalar.accumulator)
            .collect();
        accumulators.extend(memory_accumulators(lp, &sites).into_iter().map(|(_, acc)| acc));

        Self {
            lp,
            memory,
            dependency,
            nesting,
            vectorization: VectorizationAssessor::new().assess(memory, dependency),
            sites,
            accumulators,
        }
    }

    pub fn induction_variable(&self) -> Result<ValueId, AnalysisError> {
        self.lp
            .induction_variable()
            .ok_or_else(|| AnalysisError::structural("loop has no induction variable"))
    }

    pub fn instructions(&self) -> Vec<&'a Instruction> {
        self.lp.instructions()
    }

    /// Back-edge value of the induction variable (`i + 1`).
    pub fn latch_increment(&self) -> Option<ValueId> {
        let iv = self.lp.induction_variable()?;
        match self.lp.definition(iv)? {
            Instruction::Phi { incoming, .. } => incoming
                .iter()
                .find(|(_, block)| self.lp.contains_block(*block))
                .and_then(|(op, _)| op.as_value()),
            _ => None,
        }
    }

    pub fn definition(&self, operand: &Operand) -> Option<&'a Instruction> {
        operand.as_value().and_then(|v| self.lp.definition(v))
    }

    pub fn has_calls(&self) -> bool {
        self.instructions().iter().any(|inst| inst.is_call())
    }

    pub fn has_side_effect_calls(&self) -> bool {
        self.instructions()
            .iter()
            .any(|inst| inst.is_call() && inst.has_side_effects())
    }

    pub fn reads(&self) -> impl Iterator<Item = &AccessSite> {
        self.sites.iter().filter(|s| s.is_read())
    }

    pub fn writes(&self) -> impl Iterator<Item = &AccessSite> {
        self.sites.iter().filter(|s| s.is_write())
    }

    pub fn distinct_bases(&self) -> usize {
        self.sites.iter().map(|s| s.base.as_str()).collect::<BTreeSet<_>>().len()
    }

    /// Index operand equal to the loop's own induction variable.
    pub fn is_own_iv(&self, operand: &Operand) -> bool {
        let Some(iv) = self.lp.induction_variable() else {
            return false;
        };
        operand.is_value(iv)
            || matches!(
                self.definition(operand),
                Some(Instruction::Cast { operand, .. }) if operand.is_value(iv)
            )
    }

    /// Whether the stored operand comes out of a binary op satisfying `pred`.
    pub fn stores_result_of(&self, pred: impl Fn(&Instruction) -> bool) -> bool {
        self.writes().any(|w| {
            w.value
                .as_ref()
                .and_then(|v| self.definition(v))
                .is_some_and(|inst| pred(inst))
        })
    }

    pub fn multiplies_by_constant(&self) -> bool {
        self.instructions().iter().any(|inst| {
            matches!(inst, Instruction::Binary { op, lhs, rhs, .. }
                if op.is_mul() && (lhs.is_constant() || rhs.is_constant()))
        })
    }

    /// `(nest level, offset)` of an index written as `iv ± c` for an
    /// induction variable of this loop (level 0) or an enclosing one.
    pub fn nest_offset(&self, index: &Operand) -> Option<(usize, i64)> {
        self.nesting
            .nest_ivs
            .iter()
            .enumerate()
            .find_map(|(level, iv)| match affine_in(self.lp, index, (*iv)?) {
                Some((1, offset)) => Some((level, offset)),
                _ => None,
            })
    }

    /// Largest neighbourhood read from a single array, if it looks like a
    /// stencil: three or more distinct small offsets, at least one non-zero.
    pub fn stencil_shape(&self) -> Option<StencilShape> {
        let mut points: BTreeMap<&str, BTreeSet<Vec<(usize, i64)>>> = BTreeMap::new();
        for read in self.reads().filter(|r| r.base_invariant && !r.indices.is_empty()) {
            let offsets: Option<Vec<(usize, i64)>> =
                read.indices.iter().map(|ix| self.nest_offset(ix)).collect();
            if let Some(offsets) = offsets {
                points.entry(read.base.as_str()).or_default().insert(offsets);
            }
        }

        points
            .into_iter()
            .filter(|(_, vectors)| vectors.len() >= 3)
            .filter(|(_, vectors)| {
                vectors
                    .iter()
                    .flatten()
                    .all(|(_, offset)| offset.unsigned_abs() <= STENCIL_RADIUS)
            })
            .filter(|(_, vectors)| vectors.iter().flatten().any(|(_, offset)| *offset != 0))
            .map(|(array, vectors)| {
                let moving_levels: BTreeSet<usize> = vectors
                    .iter()
                    .flatten()
                    .filter(|(_, offset)| *offset != 0)
                    .map(|(level, _)| *level)
                    .collect();
                StencilShape {
                    array: array.to_string(),
                    points: vectors.len(),
                    radius: vectors
                        .iter()
                        .flatten()
                        .map(|(_, offset)| offset.unsigned_abs())
                        .max()
                        .unwrap_or(0),
                    dimensions: moving_levels.len(),
                }
            })
            .max_by_key(|shape| shape.points)
    }
}
