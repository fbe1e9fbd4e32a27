//! Nest- and neighbourhood-level recognizers.
//!
//! These look past a single loop body: matrix kernels need the shape of the
//! surrounding nest, stencils need the offsets of every read of an array.

use super::{PatternEvidence, PatternKind, RecognitionContext};
use crate::analysis::access::render;
use crate::analysis::nesting::with_perfect_leaf;
use crate::analysis::ReductionOperator;
use crate::error::AnalysisError;
use crate::impl_recognizer;
use crate::ir::{Instruction, LoopHandle, Operand};

type Recognition = Result<Option<PatternEvidence>, AnalysisError>;

/// `x += a * b` anywhere in the loop body.
fn has_multiply_accumulate(lp: &dyn LoopHandle) -> bool {
    lp.instructions().iter().any(|inst| match inst {
        Instruction::Binary { op, lhs, rhs, .. } if op.is_add() => [lhs, rhs].iter().any(|side| {
            matches!(
                side.as_value().and_then(|v| lp.definition(v)),
                Some(Instruction::Binary { op, .. }) if op.is_mul()
            )
        }),
        _ => false,
    })
}

pub struct MatrixMultiplyRecognizer;

impl MatrixMultiplyRecognizer {
    fn recognize_impl(&self, ctx: &RecognitionContext<'_>) -> Recognition {
        ctx.induction_variable()?;
        if ctx.nesting.perfect_chain_len() < 3 {
            return Err(AnalysisError::structural(
                "matrix multiply needs three perfectly nested loops",
            ));
        }

        let accumulates = with_perfect_leaf(ctx.lp, &mut |leaf: &dyn LoopHandle| {
            has_multiply_accumulate(leaf)
        })
        .unwrap_or(false);

        Ok(accumulates.then(|| {
            PatternEvidence::new("Triple-nested multiply-accumulate (C[i][j] += A[i][k] * B[k][j])")
                .with_fact(format!(
                    "nest depth {}, loop at level {}",
                    ctx.nesting.perfect_chain_len(),
                    ctx.nesting.perfect_above + 1
                ))
                .with_collapse(2)
        }))
    }
}

impl_recognizer!(
    MatrixMultiplyRecognizer,
    kind: PatternKind::MatrixMultiply,
    name: "Matrix Multiply",
    description: "Three perfectly nested loops with a multiply-accumulate innermost"
);

pub struct Convolution2DRecognizer;

impl Convolution2DRecognizer {
    fn recognize_impl(&self, ctx: &RecognitionContext<'_>) -> Recognition {
        ctx.induction_variable()?;
        let Some(shape) = ctx.stencil_shape() else {
            return Ok(None);
        };
        if !ctx.multiplies_by_constant() {
            return Ok(None);
        }

        let mut evidence = PatternEvidence::new("Neighbourhood weighted by constant kernel coefficients")
            .with_fact(format!("{}-point kernel over {}", shape.points, shape.array));
        if ctx.nesting.perfect_below >= 1 || ctx.nesting.perfect_above >= 1 {
            evidence = evidence.with_collapse(2);
        }
        Ok(Some(evidence.with_stencil(shape)))
    }
}

impl_recognizer!(
    Convolution2DRecognizer,
    kind: PatternKind::Convolution2D,
    name: "2D Convolution",
    description: "Stencil plus multiplication by compile-time constants"
);

pub struct ImageProcessingRecognizer;

impl ImageProcessingRecognizer {
    fn recognize_impl(&self, ctx: &RecognitionContext<'_>) -> Recognition {
        ctx.induction_variable()?;
        if !ctx.nesting.is_nested() {
            return Err(AnalysisError::structural("image filters need a loop nest"));
        }
        Ok(ctx
            .stencil_shape()
            .filter(|shape| shape.dimensions >= 2)
            .map(|shape| {
                PatternEvidence::new("Two-dimensional neighbourhood filter")
                    .with_fact(format!("{} neighbours of {}", shape.points, shape.array))
                    .with_collapse(2)
                    .with_stencil(shape)
            }))
    }
}

impl_recognizer!(
    ImageProcessingRecognizer,
    kind: PatternKind::ImageProcessing,
    name: "Image Processing",
    description: "2-D neighbourhood reads in a loop nest"
);

pub struct StencilRecognizer;

impl StencilRecognizer {
    fn recognize_impl(&self, ctx: &RecognitionContext<'_>) -> Recognition {
        ctx.induction_variable()?;
        Ok(ctx.stencil_shape().map(|shape| {
            PatternEvidence::new("Reads neighbouring elements of the same array")
                .with_fact(format!(
                    "{} points of {} within radius {}",
                    shape.points, shape.array, shape.radius
                ))
                .with_stencil(shape)
        }))
    }
}

impl_recognizer!(
    StencilRecognizer,
    kind: PatternKind::Stencil,
    name: "Stencil",
    description: "Three or more offset reads of one array"
);

pub struct MatrixAdditionRecognizer;

impl MatrixAdditionRecognizer {
    fn recognize_impl(&self, ctx: &RecognitionContext<'_>) -> Recognition {
        ctx.induction_variable()?;
        if !ctx.nesting.is_two_level_nest() {
            return Err(AnalysisError::structural(
                "matrix addition needs exactly one nested level",
            ));
        }
        if ctx.distinct_bases() < 3 {
            return Ok(None);
        }
        let adds = ctx.stores_result_of(|inst| {
            matches!(inst, Instruction::Binary { op, .. } if op.is_add())
        });

        Ok(adds.then(|| {
            PatternEvidence::new("Element-wise addition of matrices")
                .with_fact(format!("{} arrays involved", ctx.distinct_bases()))
                .with_collapse(2)
        }))
    }
}

impl_recognizer!(
    MatrixAdditionRecognizer,
    kind: PatternKind::MatrixAddition,
    name: "Matrix Addition",
    description: "C[i][j] = A[i][j] + B[i][j]"
);

pub struct MatrixScalingRecognizer;

impl MatrixScalingRecognizer {
    fn recognize_impl(&self, ctx: &RecognitionContext<'_>) -> Recognition {
        ctx.induction_variable()?;
        if !ctx.nesting.is_two_level_nest() {
            return Err(AnalysisError::structural(
                "matrix scaling needs exactly one nested level",
            ));
        }
        let lp = ctx.lp;
        let scales = ctx.stores_result_of(|inst| match inst {
            Instruction::Binary { op, lhs, rhs, .. } if op.is_mul() => {
                lp.is_loop_invariant(lhs) != lp.is_loop_invariant(rhs)
            }
            _ => false,
        });

        Ok(scales.then(|| {
            PatternEvidence::new("Matrix scaled by a loop-invariant factor").with_collapse(2)
        }))
    }
}

impl_recognizer!(
    MatrixScalingRecognizer,
    kind: PatternKind::MatrixScaling,
    name: "Matrix Scaling",
    description: "A[i][j] = A[i][j] * scalar"
);

pub struct FrobeniusNormRecognizer;

impl FrobeniusNormRecognizer {
    fn squares_or_magnitude(ctx: &RecognitionContext<'_>, addend: &Operand) -> bool {
        match ctx.definition(addend) {
            Some(Instruction::Binary { op, lhs, rhs, .. }) if op.is_mul() => {
                lhs == rhs || render(ctx.lp, lhs) == render(ctx.lp, rhs)
            }
            Some(Instruction::Call {
                callee: Some(callee),
                ..
            }) => callee.to_ascii_lowercase().contains("abs"),
            _ => false,
        }
    }

    fn recognize_impl(&self, ctx: &RecognitionContext<'_>) -> Recognition {
        ctx.induction_variable()?;
        let accumulator = ctx.accumulators.iter().find(|acc| {
            acc.operator == ReductionOperator::Sum && Self::squares_or_magnitude(ctx, &acc.addend)
        });

        Ok(accumulator.map(|acc| {
            PatternEvidence::new("Sum of squared (or absolute) elements")
                .with_reduction(acc.variable.clone(), acc.operator)
        }))
    }
}

impl_recognizer!(
    FrobeniusNormRecognizer,
    kind: PatternKind::FrobeniusNorm,
    name: "Frobenius Norm",
    description: "sum += A[i]*A[i] or sum += abs(A[i])"
);

pub struct ComplexReductionRecognizer;

impl ComplexReductionRecognizer {
    fn recognize_impl(&self, ctx: &RecognitionContext<'_>) -> Recognition {
        ctx.induction_variable()?;
        let accumulator = ctx
            .accumulators
            .iter()
            .find(|acc| !acc.operator.is_arithmetic());

        Ok(accumulator.map(|acc| {
            let kind = match acc.operator {
                ReductionOperator::Min | ReductionOperator::Max => "Min/max",
                _ => "Bitwise",
            };
            PatternEvidence::new(format!("{kind} reduction beyond a simple sum"))
                .with_reduction(acc.variable.clone(), acc.operator)
        }))
    }
}

impl_recognizer!(
    ComplexReductionRecognizer,
    kind: PatternKind::ComplexReduction,
    name: "Complex Reduction",
    description: "Min/max and bitwise accumulators"
);
