//! Loop-carried scalars and accumulators.
//!
//! A carried scalar is a header phi other than the induction variable. It is
//! an accumulator when the back-edge value combines the previous value with
//! something else through an associative operator; memory accumulators are
//! the same shape through a loop-invariant address.

use super::access::{expression_values, render, AccessSite};
use crate::ir::{Instruction, LoopHandle, Operand, ValueId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionOperator {
    Sum,
    Product,
    Min,
    Max,
    BitAnd,
    BitOr,
    BitXor,
}

impl ReductionOperator {
    /// Operator as written in a `reduction(op:var)` clause.
    pub fn clause_symbol(self) -> &'static str {
        match self {
            ReductionOperator::Sum => "+",
            ReductionOperator::Product => "*",
            ReductionOperator::Min => "min",
            ReductionOperator::Max => "max",
            ReductionOperator::BitAnd => "&",
            ReductionOperator::BitOr => "|",
            ReductionOperator::BitXor => "^",
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(self, ReductionOperator::Sum | ReductionOperator::Product)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccumulatorStorage {
    Register,
    Memory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    pub variable: String,
    pub operator: ReductionOperator,
    /// The value folded in each iteration.
    pub addend: Operand,
    /// Value the accumulator holds at the end of an iteration.
    pub update: ValueId,
    /// Previous value is read only by the update, and the update only feeds
    /// the next iteration.
    pub sole_use: bool,
    pub storage: AccumulatorStorage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CarriedScalar {
    pub phi: ValueId,
    pub name: String,
    pub update: Option<Operand>,
    pub accumulator: Option<Accumulator>,
}

pub fn carried_scalars(lp: &dyn LoopHandle) -> Vec<CarriedScalar> {
    let header_id = lp.header();
    let iv = lp.induction_variable();
    let Some(header) = lp.blocks().into_iter().find(|b| b.id == header_id) else {
        return Vec::new();
    };

    header
        .instructions
        .iter()
        .filter_map(|inst| match inst {
            Instruction::Phi { result, incoming } if Some(*result) != iv => {
                Some((*result, incoming))
            }
            _ => None,
        })
        .map(|(phi, incoming)| {
            let name = render(lp, &Operand::Value(phi));
            let update = incoming
                .iter()
                .find(|(_, block)| lp.contains_block(*block))
                .map(|(op, _)| op.clone());

            let accumulator = update.as_ref().and_then(Operand::as_value).and_then(|u| {
                let (operator, addend, expression) = match_accumulation(lp, phi, u)?;
                let sole_use = uses_confined(lp, phi, &expression)
                    && lp.users_of(u).iter().all(|user| {
                        matches!(user, Instruction::Phi { result, .. } if *result == phi)
                    });
                Some(Accumulator {
                    variable: name.clone(),
                    operator,
                    addend,
                    update: u,
                    sole_use,
                    storage: AccumulatorStorage::Register,
                })
            });

            CarriedScalar {
                phi,
                name,
                update,
                accumulator,
            }
        })
        .collect()
}

/// Read-modify-write of one loop-invariant location, keyed by the store's
/// body position.
pub fn memory_accumulators(lp: &dyn LoopHandle, sites: &[AccessSite]) -> Vec<(usize, Accumulator)> {
    let mut found = Vec::new();
    for write in sites.iter().filter(|s| s.is_write() && s.is_uniform()) {
        let Some(update) = write.value.as_ref().and_then(Operand::as_value) else {
            continue;
        };
        let candidate = sites.iter().find_map(|read| {
            let loaded = read.result?;
            if !read.is_read() || read.order > write.order || !read.same_location(write) {
                return None;
            }
            let (operator, addend, expression) = match_accumulation(lp, loaded, update)?;
            Some((loaded, operator, addend, expression))
        });

        if let Some((loaded, operator, addend, expression)) = candidate {
            let sole_use = uses_confined(lp, loaded, &expression)
                && lp
                    .users_of(update)
                    .iter()
                    .all(|user| matches!(user, Instruction::Store { .. }));
            found.push((
                write.order,
                Accumulator {
                    variable: write.rendered.clone(),
                    operator,
                    addend,
                    update,
                    sole_use,
                    storage: AccumulatorStorage::Memory,
                },
            ));
        }
    }
    found
}

/// Recognizes `update = previous ⊕ addend`, including compare/select and
/// min/max intrinsics. Returns the operator, the addend and the values making
/// up the update expression.
fn match_accumulation(
    lp: &dyn LoopHandle,
    previous: ValueId,
    update: ValueId,
) -> Option<(ReductionOperator, Operand, HashSet<ValueId>)> {
    let mut expression = HashSet::from([update]);
    match lp.definition(update)? {
        Instruction::Binary { op, lhs, rhs, .. } => {
            let addend = if lhs.is_value(previous) {
                rhs.clone()
            } else if rhs.is_value(previous) && !op.is_sub() {
                lhs.clone()
            } else {
                return None;
            };
            let operator = match op {
                o if o.is_add() || o.is_sub() => ReductionOperator::Sum,
                o if o.is_mul() => ReductionOperator::Product,
                crate::ir::BinaryOp::And => ReductionOperator::BitAnd,
                crate::ir::BinaryOp::Or => ReductionOperator::BitOr,
                crate::ir::BinaryOp::Xor => ReductionOperator::BitXor,
                _ => return None,
            };
            Some((operator, addend, expression))
        }
        Instruction::Select {
            condition,
            on_true,
            on_false,
            ..
        } => {
            let other = if on_true.is_value(previous) {
                on_false
            } else if on_false.is_value(previous) {
                on_true
            } else {
                return None;
            };
            let compare = condition.as_value()?;
            let Some(Instruction::Compare { predicate, lhs, rhs, .. }) = lp.definition(compare) else {
                return None;
            };
            let operands_match = (lhs.is_value(previous) && rhs == other)
                || (rhs.is_value(previous) && lhs == other);
            if !operands_match || !(predicate.is_greater() || predicate.is_less()) {
                return None;
            }
            expression.insert(compare);
            let picks_lhs = on_true == lhs;
            let operator = if predicate.is_greater() == picks_lhs {
                ReductionOperator::Max
            } else {
                ReductionOperator::Min
            };
            Some((operator, other.clone(), expression))
        }
        Instruction::Call { callee: Some(callee), args, .. } if args.len() == 2 => {
            let name = callee.to_ascii_lowercase();
            let operator = if name.contains("max") {
                ReductionOperator::Max
            } else if name.contains("min") {
                ReductionOperator::Min
            } else {
                return None;
            };
            let addend = args.iter().find(|a| !a.is_value(previous))?.clone();
            if !args.iter().any(|a| a.is_value(previous)) {
                return None;
            }
            Some((operator, addend, expression))
        }
        _ => None,
    }
}

fn uses_confined(lp: &dyn LoopHandle, value: ValueId, expression: &HashSet<ValueId>) -> bool {
    lp.users_of(value)
        .iter()
        .all(|user| user.result().is_some_and(|r| expression.contains(&r)))
}

/// Whether `value` is derived from `source` inside the loop.
pub fn flows_from(lp: &dyn LoopHandle, value: &Operand, source: ValueId) -> bool {
    expression_values(lp, value).contains(&source) || value.is_value(source)
}
