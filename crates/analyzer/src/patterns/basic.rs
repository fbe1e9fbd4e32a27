//! Loop-level recognizers: reductions, scans, filters, maps and plain
//! parallel loops.

use super::{PatternEvidence, PatternKind, RecognitionContext};
use crate::analysis::access::IndexTerm;
use crate::analysis::recurrence::{flows_from, AccumulatorStorage};
use crate::error::AnalysisError;
use crate::impl_recognizer;
use crate::ir::{BlockId, Instruction};
use std::collections::BTreeSet;

type Recognition = Result<Option<PatternEvidence>, AnalysisError>;

pub struct ReductionRecognizer;

impl ReductionRecognizer {
    fn recognize_impl(&self, ctx: &RecognitionContext<'_>) -> Recognition {
        ctx.induction_variable()?;
        let accumulator = ctx
            .accumulators
            .iter()
            .find(|acc| acc.operator.is_arithmetic())
            .or_else(|| ctx.accumulators.first());

        Ok(accumulator.map(|acc| {
            PatternEvidence::new("Loop-carried value accumulated through an associative operator")
                .with_reduction(acc.variable.clone(), acc.operator)
                .with_fact(format!(
                    "{} accumulates with '{}' in {}",
                    acc.variable,
                    acc.operator.clause_symbol(),
                    match acc.storage {
                        AccumulatorStorage::Register => "a register",
                        AccumulatorStorage::Memory => "memory",
                    }
                ))
        }))
    }
}

impl_recognizer!(
    ReductionRecognizer,
    kind: PatternKind::Reduction,
    name: "Reduction",
    description: "Accumulating operation fed by a loop-carried value"
);

pub struct PrefixSumRecognizer;

impl PrefixSumRecognizer {
    fn recognize_impl(&self, ctx: &RecognitionContext<'_>) -> Recognition {
        ctx.induction_variable()?;

        for write in ctx.writes() {
            let Some(value) = write.value.as_ref() else {
                continue;
            };
            for read in ctx.reads().filter(|r| r.base == write.base) {
                let Some(loaded) = read.result else {
                    continue;
                };
                if Self::reads_earlier_element(&write.terms, &read.terms)
                    && flows_from(ctx.lp, value, loaded)
                {
                    return Ok(Some(
                        PatternEvidence::new("Each element is computed from the previous one")
                            .with_fact(format!("{} feeds {}", read.rendered, write.rendered)),
                    ));
                }
            }
        }

        let running = ctx.accumulators.iter().find(|acc| {
            !acc.sole_use
                && ctx.writes().any(|w| {
                    w.value.as_ref().is_some_and(|v| v.is_value(acc.update))
                        && w.terms.iter().any(|t| matches!(t, IndexTerm::Affine { .. }))
                })
        });
        Ok(running.map(|acc| {
            PatternEvidence::new("Running total stored every iteration")
                .with_reduction(acc.variable.clone(), acc.operator)
                .with_fact(format!("{} is written out after each update", acc.variable))
        }))
    }

    /// Same location except one dimension that trails the write by a
    /// constant number of iterations.
    fn reads_earlier_element(write: &[IndexTerm], read: &[IndexTerm]) -> bool {
        if write.len() != read.len() {
            return false;
        }
        let mut trailing = false;
        for (w, r) in write.iter().zip(read) {
            match (w, r) {
                (
                    IndexTerm::Affine {
                        coefficient: 1,
                        offset: ow,
                    },
                    IndexTerm::Affine {
                        coefficient: 1,
                        offset: or,
                    },
                ) if or < ow => trailing = true,
                _ if w == r => {}
                _ => return false,
            }
        }
        trailing
    }
}

impl_recognizer!(
    PrefixSumRecognizer,
    kind: PatternKind::PrefixSum,
    name: "Prefix Sum",
    description: "array[i-1] feeding array[i], or a running total"
);

pub struct FilterRecognizer;

impl FilterRecognizer {
    fn recognize_impl(&self, ctx: &RecognitionContext<'_>) -> Recognition {
        ctx.induction_variable()?;
        let blocks = ctx.lp.blocks();
        // Sub-loop control flow is not a guard of this loop's stores.
        let sub_loops = ctx.lp.sub_loops();
        let nested: BTreeSet<BlockId> = sub_loops
            .iter()
            .flat_map(|sub| sub.blocks().into_iter().map(|b| b.id))
            .collect();

        for block in blocks.iter().filter(|b| !nested.contains(&b.id)) {
            let Some(Instruction::Branch {
                then_block,
                else_block,
                ..
            }) = block.instructions.last()
            else {
                continue;
            };
            if !ctx.lp.contains_block(*then_block) || !ctx.lp.contains_block(*else_block) {
                continue;
            }
            let guarded_store = blocks
                .iter()
                .filter(|b| b.id == *then_block || b.id == *else_block)
                .any(|b| b.instructions.iter().any(|i| matches!(i, Instruction::Store { .. })));
            if guarded_store {
                return Ok(Some(
                    PatternEvidence::new("Conditional branch guards a store")
                        .with_fact(format!("branch in {} selects the stored elements", block.id)),
                ));
            }
        }
        Ok(None)
    }
}

impl_recognizer!(
    FilterRecognizer,
    kind: PatternKind::Filter,
    name: "Filter",
    description: "Conditional branch guarding a store"
);

pub struct EmbarrassinglyParallelRecognizer;

impl EmbarrassinglyParallelRecognizer {
    fn recognize_impl(&self, ctx: &RecognitionContext<'_>) -> Recognition {
        ctx.induction_variable()?;
        if ctx.sites.is_empty() || ctx.has_calls() || !ctx.dependency.kind.is_safe() {
            return Ok(None);
        }

        let simple_indexing = ctx.sites.iter().all(|site| {
            site.base_invariant
                && site.indices.iter().filter(|ix| ctx.is_own_iv(ix)).count() == 1
                && site
                    .indices
                    .iter()
                    .zip(&site.terms)
                    .all(|(ix, term)| ctx.is_own_iv(ix) || matches!(term, IndexTerm::Invariant(_)))
        });

        Ok(simple_indexing.then(|| {
            PatternEvidence::new("Perfect parallel candidate - no dependencies between iterations")
                .with_fact("every access is indexed directly by the induction variable")
        }))
    }
}

impl_recognizer!(
    EmbarrassinglyParallelRecognizer,
    kind: PatternKind::EmbarrassinglyParallel,
    name: "Embarrassingly Parallel",
    description: "Induction-indexed loads and stores with no calls"
);

pub struct VectorizableRecognizer;

impl VectorizableRecognizer {
    fn recognize_impl(&self, ctx: &RecognitionContext<'_>) -> Recognition {
        ctx.induction_variable()?;
        if !ctx.vectorization.vectorizable || ctx.has_side_effect_calls() {
            return Ok(None);
        }
        let increment = ctx.latch_increment();
        let arithmetic = ctx.instructions().iter().any(|inst| {
            matches!(inst, Instruction::Binary { result, .. } if Some(*result) != increment)
                || matches!(inst, Instruction::Cast { .. })
        });

        Ok(arithmetic.then(|| {
            PatternEvidence::new("Array access with arithmetic operations - good for SIMD").with_fact(
                format!(
                    "width {} with ~{:.1}x expected speedup",
                    ctx.vectorization.recommended_width, ctx.vectorization.expected_speedup
                ),
            )
        }))
    }
}

impl_recognizer!(
    VectorizableRecognizer,
    kind: PatternKind::Vectorizable,
    name: "Vectorizable",
    description: "SIMD-friendly arithmetic over predictable accesses"
);

pub struct MapRecognizer;

impl MapRecognizer {
    fn recognize_impl(&self, ctx: &RecognitionContext<'_>) -> Recognition {
        ctx.induction_variable()?;
        if ctx.has_side_effect_calls() || !ctx.dependency.kind.is_safe() {
            return Ok(None);
        }
        let indexed = |terms: &[IndexTerm]| {
            terms
                .iter()
                .any(|t| matches!(t, IndexTerm::Affine { coefficient: 1, offset: 0 }))
        };
        let reads = ctx.reads().any(|r| indexed(r.terms.as_slice()));
        let writes = ctx.writes().any(|w| indexed(w.terms.as_slice()));

        Ok((reads && writes).then(|| {
            let evidence = PatternEvidence::new("Element-wise transformation of independent elements");
            if ctx.has_calls() {
                evidence.with_fact("element function is free of side effects")
            } else {
                evidence
            }
        }))
    }
}

impl_recognizer!(
    MapRecognizer,
    kind: PatternKind::Map,
    name: "Map",
    description: "out[i] = f(in[i]) with a pure f"
);

pub struct SimpleParallelRecognizer;

impl SimpleParallelRecognizer {
    fn recognize_impl(&self, ctx: &RecognitionContext<'_>) -> Recognition {
        ctx.induction_variable()?;
        if ctx.has_side_effect_calls() {
            return Ok(None);
        }
        if !(ctx.dependency.kind.is_safe() || ctx.dependency.eliminable) {
            return Ok(None);
        }
        let uses_iv = ctx
            .sites
            .iter()
            .any(|site| site.indices.iter().any(|ix| ctx.is_own_iv(ix)));

        Ok(uses_iv.then(|| PatternEvidence::new("Array access with simple indexing detected")))
    }
}

impl_recognizer!(
    SimpleParallelRecognizer,
    kind: PatternKind::SimpleParallel,
    name: "Simple Parallel",
    description: "Induction-indexed loop without side-effecting calls"
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, ComparePredicate, FunctionBuilder, Operand};
    use crate::patterns::test_support::with_context;
    use crate::patterns::PatternRecognizer;

    #[test]
    fn test_prefix_sum_from_previous_element() {
        let mut b = FunctionBuilder::new("scan");
        let lp = b.counted_loop("i", Operand::symbol("n"));
        let prev = b.binary(BinaryOp::Sub, lp.iv, 1i64);
        let before = b.load_element("A", vec![prev.into()]);
        let here = b.load_element("A", vec![lp.iv.into()]);
        let total = b.binary(BinaryOp::Add, before, here);
        b.store_element("A", vec![lp.iv.into()], total);
        b.close_loop(&lp);
        let function = b.build();

        with_context(&function, 0, |ctx| {
            let evidence = PrefixSumRecognizer.recognize(ctx).unwrap().unwrap();
            assert!(evidence.facts[0].contains("A[i-1]"));
            assert!(ReductionRecognizer.recognize(ctx).unwrap().is_none());
        });
    }

    #[test]
    fn test_filter_requires_guarded_store() {
        let mut b = FunctionBuilder::new("filter");
        let lp = b.counted_loop("i", Operand::symbol("n"));
        let x = b.load_element("A", vec![lp.iv.into()]);
        let keep = b.compare(ComparePredicate::Gt, x, 0i64);
        let then_block = b.create_block();
        let merge = b.create_block();
        b.branch(keep, then_block, merge);
        b.set_insert_point(then_block);
        b.store_element("B", vec![lp.iv.into()], x);
        b.jump(merge);
        b.set_insert_point(merge);
        b.close_loop(&lp);
        let function = b.build();

        with_context(&function, 0, |ctx| {
            assert!(FilterRecognizer.recognize(ctx).unwrap().is_some());
        });
    }

    #[test]
    fn test_inner_loop_header_is_not_a_filter() {
        let mut b = FunctionBuilder::new("copy2d");
        let i = b.counted_loop("i", Operand::symbol("n"));
        let j = b.counted_loop("j", Operand::symbol("m"));
        let x = b.load_element("A", vec![i.iv.into(), j.iv.into()]);
        b.store_element("B", vec![i.iv.into(), j.iv.into()], x);
        b.close_loop(&j);
        b.close_loop(&i);
        let function = b.build();

        with_context(&function, 0, |ctx| {
            assert!(ctx.nesting.is_nested());
            assert!(FilterRecognizer.recognize(ctx).unwrap().is_none());
        });
        with_context(&function, 1, |ctx| {
            assert!(FilterRecognizer.recognize(ctx).unwrap().is_none());
            assert!(EmbarrassinglyParallelRecognizer.recognize(ctx).unwrap().is_some());
        });
    }

    #[test]
    fn test_missing_induction_variable_is_structural() {
        let mut b = FunctionBuilder::new("copy");
        let lp = b.counted_loop("i", Operand::symbol("n"));
        let x = b.load_element("A", vec![lp.iv.into()]);
        b.store_element("B", vec![lp.iv.into()], x);
        b.close_loop(&lp);
        let function = b.build();

        with_context(&function, 0, |ctx| {
            assert!(EmbarrassinglyParallelRecognizer.recognize(ctx).unwrap().is_some());
            assert!(MapRecognizer.recognize(ctx).unwrap().is_some());
        });

        let lp_ref = function.loop_ref(0).unwrap();
        struct NoIv<'a>(crate::ir::LoopRef<'a>);
        impl crate::ir::LoopHandle for NoIv<'_> {
            fn header(&self) -> crate::ir::BlockId {
                self.0.header()
            }
            fn blocks(&self) -> Vec<&crate::ir::BasicBlock> {
                self.0.blocks()
            }
            fn induction_variable(&self) -> Option<crate::ir::ValueId> {
                None
            }
            fn parent_loop(&self) -> Option<Box<dyn crate::ir::LoopHandle + '_>> {
                None
            }
            fn sub_loops(&self) -> Vec<Box<dyn crate::ir::LoopHandle + '_>> {
                Vec::new()
            }
            fn definition(&self, value: crate::ir::ValueId) -> Option<&Instruction> {
                self.0.definition(value)
            }
            fn function_name(&self) -> &str {
                self.0.function_name()
            }
        }
        let handle = NoIv(lp_ref);
        let mem = crate::analysis::MemoryAccessAnalyzer::new().analyze(&handle);
        let dep = crate::analysis::DependencyAnalyzer::new().analyze(&handle);
        let nesting = crate::analysis::NestingInfo::of(&handle);
        let ctx = RecognitionContext::new(&handle, &mem, &dep, &nesting);
        assert!(matches!(
            SimpleParallelRecognizer.recognize(&ctx),
            Err(AnalysisError::StructuralIncomplete(_))
        ));
    }
}
