//! Memory access sites and index expressions, decoded relative to one loop.
//!
//! Every index is reduced to an [`IndexTerm`]: affine in the loop's induction
//! variable, invariant, swept by a sub-loop, loaded from memory, or opaque.
//! Both leaf analyzers and the recognizers work from these terms.

use crate::ir::{BinaryOp, Instruction, LoopHandle, Operand, ValueId};
use std::collections::HashSet;

const MAX_EXPR_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexTerm {
    /// `coefficient * iv + offset`, coefficient never zero.
    Affine { coefficient: i64, offset: i64 },
    Invariant(String),
    /// Varies with a sub-loop only: every iteration covers the same range.
    Swept(String),
    Indirect,
    Opaque,
}

impl IndexTerm {
    pub fn is_uniform(&self) -> bool {
        matches!(self, IndexTerm::Invariant(_) | IndexTerm::Swept(_))
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, IndexTerm::Indirect | IndexTerm::Opaque)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

#[derive(Debug, Clone)]
pub struct AccessSite {
    pub kind: AccessKind,
    /// Position in body order.
    pub order: usize,
    pub base: String,
    pub base_invariant: bool,
    pub indices: Vec<Operand>,
    pub terms: Vec<IndexTerm>,
    pub rendered: String,
    /// Stored value, for writes.
    pub value: Option<Operand>,
    /// Loaded value, for reads.
    pub result: Option<ValueId>,
}

impl AccessSite {
    pub fn is_read(&self) -> bool {
        self.kind == AccessKind::Read
    }

    pub fn is_write(&self) -> bool {
        self.kind == AccessKind::Write
    }

    /// Same location in every iteration.
    pub fn is_uniform(&self) -> bool {
        self.base_invariant && self.terms.iter().all(IndexTerm::is_uniform)
    }

    /// Same base and the very same index operands.
    pub fn same_location(&self, other: &AccessSite) -> bool {
        self.rendered == other.rendered && self.indices == other.indices
    }
}

/// Collects loads and stores in body order.
pub fn collect_accesses(lp: &dyn LoopHandle) -> Vec<AccessSite> {
    let mut sites = Vec::new();
    for (order, inst) in lp.instructions().into_iter().enumerate() {
        let (kind, address, value, result) = match inst {
            Instruction::Load { result, address } => (AccessKind::Read, address, None, Some(*result)),
            Instruction::Store { address, value } => {
                (AccessKind::Write, address, Some(value.clone()), None)
            }
            _ => continue,
        };

        let (base, indices) = match address
            .as_value()
            .and_then(|v| lp.definition(v))
        {
            Some(Instruction::ElementPtr { base, indices, .. }) => (base.clone(), indices.clone()),
            _ => (address.clone(), Vec::new()),
        };

        let terms = indices.iter().map(|ix| classify_index(lp, ix)).collect();
        sites.push(AccessSite {
            kind,
            order,
            base: render(lp, &base),
            base_invariant: lp.is_loop_invariant(&base),
            rendered: render(lp, address),
            indices,
            terms,
            value,
            result,
        });
    }
    sites
}

pub fn classify_index(lp: &dyn LoopHandle, index: &Operand) -> IndexTerm {
    if lp.is_loop_invariant(index) {
        return IndexTerm::Invariant(render(lp, index));
    }
    if let Some(iv) = lp.induction_variable() {
        if let Some((coefficient, offset)) = affine_in(lp, index, iv) {
            if coefficient != 0 {
                return IndexTerm::Affine { coefficient, offset };
            }
        }
    }
    if reads_memory(lp, index, 0) {
        return IndexTerm::Indirect;
    }
    let mut inner_ivs = Vec::new();
    collect_sub_loop_ivs(lp, &mut inner_ivs);
    let outer_symbol = |op: &Operand| !op.is_constant() && lp.is_loop_invariant(op);
    if inner_ivs.iter().any(|iv| {
        affine_in_with(lp, index, *iv, &outer_symbol, 0).is_some_and(|(c, _)| c != 0)
    }) {
        return IndexTerm::Swept(render(lp, index));
    }
    IndexTerm::Opaque
}

/// `(coefficient, offset)` when `operand` is affine in `iv` with constant terms.
pub fn affine_in(lp: &dyn LoopHandle, operand: &Operand, iv: ValueId) -> Option<(i64, i64)> {
    affine_in_with(lp, operand, iv, &|_: &Operand| false, 0)
}

/// Like [`affine_in`], but operands accepted by `symbolic` count as opaque
/// additive terms (contribute neither coefficient nor offset).
fn affine_in_with(
    lp: &dyn LoopHandle,
    operand: &Operand,
    iv: ValueId,
    symbolic: &dyn Fn(&Operand) -> bool,
    depth: usize,
) -> Option<(i64, i64)> {
    if depth > MAX_EXPR_DEPTH {
        return None;
    }
    match operand {
        Operand::Int(c) => return Some((0, *c)),
        Operand::Value(v) if *v == iv => return Some((1, 0)),
        _ => {}
    }
    let value = operand.as_value()?;
    match lp.definition(value) {
        Some(Instruction::Cast { operand, .. }) => affine_in_with(lp, operand, iv, symbolic, depth + 1),
        Some(Instruction::Binary { op, lhs, rhs, .. }) => {
            let side = |op: &Operand| -> Option<(i64, i64)> {
                if symbolic(op) && !op.is_value(iv) {
                    Some((0, 0))
                } else {
                    affine_in_with(lp, op, iv, symbolic, depth + 1)
                }
            };
            let (lc, lo) = side(lhs)?;
            let (rc, ro) = side(rhs)?;
            match op {
                BinaryOp::Add => Some((lc.checked_add(rc)?, lo.checked_add(ro)?)),
                BinaryOp::Sub => Some((lc.checked_sub(rc)?, lo.checked_sub(ro)?)),
                BinaryOp::Mul if lc == 0 && !symbolic(lhs) => {
                    Some((rc.checked_mul(lo)?, ro.checked_mul(lo)?))
                }
                BinaryOp::Mul if rc == 0 && !symbolic(rhs) => {
                    Some((lc.checked_mul(ro)?, lo.checked_mul(ro)?))
                }
                BinaryOp::Shl if rc == 0 && (0..32).contains(&ro) => {
                    let scale = 1i64 << ro;
                    Some((lc.checked_mul(scale)?, lo.checked_mul(scale)?))
                }
                _ => None,
            }
        }
        _ => None,
    }
}

fn reads_memory(lp: &dyn LoopHandle, operand: &Operand, depth: usize) -> bool {
    if depth > MAX_EXPR_DEPTH {
        return false;
    }
    let Some(value) = operand.as_value() else {
        return false;
    };
    if !lp.defines(value) {
        return false;
    }
    match lp.definition(value) {
        Some(Instruction::Load { .. }) => true,
        Some(Instruction::Cast { operand, .. }) => reads_memory(lp, operand, depth + 1),
        Some(Instruction::Binary { lhs, rhs, .. }) => {
            reads_memory(lp, lhs, depth + 1) || reads_memory(lp, rhs, depth + 1)
        }
        _ => false,
    }
}

/// Induction variables of every loop nested inside `lp`.
pub fn collect_sub_loop_ivs(lp: &dyn LoopHandle, out: &mut Vec<ValueId>) {
    for sub in lp.sub_loops() {
        if let Some(iv) = sub.induction_variable() {
            out.push(iv);
        }
        collect_sub_loop_ivs(sub.as_ref(), out);
    }
}

/// Human-readable rendering used for identities and reports: `A[i+1]`, `sum`.
pub fn render(lp: &dyn LoopHandle, operand: &Operand) -> String {
    render_at(lp, operand, 0)
}

fn render_at(lp: &dyn LoopHandle, operand: &Operand, depth: usize) -> String {
    match operand {
        Operand::Int(c) => c.to_string(),
        Operand::Float(f) => format!("{f:?}"),
        Operand::Symbol(name) => name.clone(),
        Operand::Value(value) => {
            if let Some(name) = lp.value_name(*value) {
                return name.to_string();
            }
            if depth > MAX_EXPR_DEPTH {
                return value.to_string();
            }
            match lp.definition(*value) {
                Some(Instruction::Cast { operand, .. }) => render_at(lp, operand, depth + 1),
                Some(Instruction::Load { address, .. }) => render_at(lp, address, depth + 1),
                Some(Instruction::ElementPtr { base, indices, .. }) => {
                    let mut text = render_at(lp, base, depth + 1);
                    for index in indices {
                        text.push('[');
                        text.push_str(&render_at(lp, index, depth + 1));
                        text.push(']');
                    }
                    text
                }
                Some(Instruction::Binary { op, lhs, rhs, .. }) => {
                    let symbol = match op {
                        BinaryOp::Add | BinaryOp::FAdd => "+",
                        BinaryOp::Sub | BinaryOp::FSub => "-",
                        BinaryOp::Mul | BinaryOp::FMul => "*",
                        BinaryOp::Div | BinaryOp::FDiv => "/",
                        BinaryOp::Rem => "%",
                        BinaryOp::Shl => "<<",
                        BinaryOp::And => "&",
                        BinaryOp::Or => "|",
                        BinaryOp::Xor => "^",
                    };
                    format!(
                        "{}{}{}",
                        render_at(lp, lhs, depth + 1),
                        symbol,
                        render_at(lp, rhs, depth + 1)
                    )
                }
                _ => value.to_string(),
            }
        }
    }
}

/// Values computed from `root` within the loop, `root` included.
pub fn expression_values(lp: &dyn LoopHandle, root: &Operand) -> HashSet<ValueId> {
    let mut seen = HashSet::new();
    let mut stack: Vec<ValueId> = root.as_value().into_iter().collect();
    while let Some(value) = stack.pop() {
        if seen.len() > 64 || !lp.defines(value) || !seen.insert(value) {
            continue;
        }
        if let Some(inst) = lp.definition(value) {
            if matches!(inst, Instruction::Phi { .. }) {
                continue;
            }
            stack.extend(inst.operands().into_iter().filter_map(Operand::as_value));
        }
    }
    seen
}
