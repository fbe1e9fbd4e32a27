use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// An instruction operand. `Symbol` names storage that lives outside the
/// function body (globals, pointer arguments) and is invariant in every loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Value(ValueId),
    Int(i64),
    Float(f64),
    Symbol(String),
}

impl Operand {
    pub fn symbol(name: impl Into<String>) -> Self {
        Operand::Symbol(name.into())
    }

    pub fn as_value(&self) -> Option<ValueId> {
        match self {
            Operand::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Operand::Int(c) => Some(*c),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Operand::Int(_) | Operand::Float(_))
    }

    pub fn is_value(&self, value: ValueId) -> bool {
        self.as_value() == Some(value)
    }
}

impl From<ValueId> for Operand {
    fn from(value: ValueId) -> Self {
        Operand::Value(value)
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Operand::Int(value)
    }
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Operand::Float(value)
    }
}

impl From<&str> for Operand {
    fn from(value: &str) -> Self {
        Operand::Symbol(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    FAdd,
    Sub,
    FSub,
    Mul,
    FMul,
    Div,
    FDiv,
    Rem,
    Shl,
    And,
    Or,
    Xor,
}

impl BinaryOp {
    pub fn is_add(self) -> bool {
        matches!(self, BinaryOp::Add | BinaryOp::FAdd)
    }

    pub fn is_sub(self) -> bool {
        matches!(self, BinaryOp::Sub | BinaryOp::FSub)
    }

    pub fn is_mul(self) -> bool {
        matches!(self, BinaryOp::Mul | BinaryOp::FMul)
    }

    pub fn is_bitwise(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Xor)
    }

    pub fn is_arithmetic(self) -> bool {
        !self.is_bitwise()
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::FAdd => "fadd",
            BinaryOp::Sub => "sub",
            BinaryOp::FSub => "fsub",
            BinaryOp::Mul => "mul",
            BinaryOp::FMul => "fmul",
            BinaryOp::Div => "div",
            BinaryOp::FDiv => "fdiv",
            BinaryOp::Rem => "rem",
            BinaryOp::Shl => "shl",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparePredicate {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparePredicate {
    pub fn is_greater(self) -> bool {
        matches!(self, ComparePredicate::Gt | ComparePredicate::Ge)
    }

    pub fn is_less(self) -> bool {
        matches!(self, ComparePredicate::Lt | ComparePredicate::Le)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    Phi {
        result: ValueId,
        incoming: Vec<(Operand, BlockId)>,
    },
    Binary {
        result: ValueId,
        op: BinaryOp,
        lhs: Operand,
        rhs: Operand,
    },
    Compare {
        result: ValueId,
        predicate: ComparePredicate,
        lhs: Operand,
        rhs: Operand,
    },
    Select {
        result: ValueId,
        condition: Operand,
        on_true: Operand,
        on_false: Operand,
    },
    Cast {
        result: ValueId,
        operand: Operand,
    },
    /// Address of `base[indices[0]][indices[1]]...`.
    ElementPtr {
        result: ValueId,
        base: Operand,
        indices: Vec<Operand>,
    },
    Load {
        result: ValueId,
        address: Operand,
    },
    Store {
        address: Operand,
        value: Operand,
    },
    Call {
        result: Option<ValueId>,
        callee: Option<String>,
        args: Vec<Operand>,
        pure_function: bool,
    },
    Branch {
        condition: Operand,
        then_block: BlockId,
        else_block: BlockId,
    },
    Jump {
        target: BlockId,
    },
    Return {
        value: Option<Operand>,
    },
}

impl Instruction {
    pub fn result(&self) -> Option<ValueId> {
        match self {
            Instruction::Phi { result, .. }
            | Instruction::Binary { result, .. }
            | Instruction::Compare { result, .. }
            | Instruction::Select { result, .. }
            | Instruction::Cast { result, .. }
            | Instruction::ElementPtr { result, .. }
            | Instruction::Load { result, .. } => Some(*result),
            Instruction::Call { result, .. } => *result,
            Instruction::Store { .. }
            | Instruction::Branch { .. }
            | Instruction::Jump { .. }
            | Instruction::Return { .. } => None,
        }
    }

    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Instruction::Phi { incoming, .. } => incoming.iter().map(|(op, _)| op).collect(),
            Instruction::Binary { lhs, rhs, .. } | Instruction::Compare { lhs, rhs, .. } => {
                vec![lhs, rhs]
            }
            Instruction::Select {
                condition,
                on_true,
                on_false,
                ..
            } => vec![condition, on_true, on_false],
            Instruction::Cast { operand, .. } => vec![operand],
            Instruction::ElementPtr { base, indices, .. } => {
                std::iter::once(base).chain(indices.iter()).collect()
            }
            Instruction::Load { address, .. } => vec![address],
            Instruction::Store { address, value } => vec![address, value],
            Instruction::Call { args, .. } => args.iter().collect(),
            Instruction::Branch { condition, .. } => vec![condition],
            Instruction::Jump { .. } => Vec::new(),
            Instruction::Return { value } => value.iter().collect(),
        }
    }

    pub fn uses(&self, value: ValueId) -> bool {
        self.operands().into_iter().any(|op| op.is_value(value))
    }

    pub fn is_memory_access(&self) -> bool {
        matches!(self, Instruction::Load { .. } | Instruction::Store { .. })
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Instruction::Call { .. })
    }

    pub fn has_side_effects(&self) -> bool {
        match self {
            Instruction::Store { .. } => true,
            Instruction::Call { pure_function, .. } => !pure_function,
            _ => false,
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Phi { .. } => "phi",
            Instruction::Binary { op, .. } => op.mnemonic(),
            Instruction::Compare { .. } => "cmp",
            Instruction::Select { .. } => "select",
            Instruction::Cast { .. } => "cast",
            Instruction::ElementPtr { .. } => "elementptr",
            Instruction::Load { .. } => "load",
            Instruction::Store { .. } => "store",
            Instruction::Call { .. } => "call",
            Instruction::Branch { .. } => "br",
            Instruction::Jump { .. } => "jmp",
            Instruction::Return { .. } => "ret",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: BlockId,
    pub instructions: Vec<Instruction>,
    #[serde(default)]
    pub line: Option<u32>,
}

impl BasicBlock {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            instructions: Vec::new(),
            line: None,
        }
    }

    pub fn successors(&self) -> Vec<BlockId> {
        match self.instructions.last() {
            Some(Instruction::Branch {
                then_block,
                else_block,
                ..
            }) => vec![*then_block, *else_block],
            Some(Instruction::Jump { target }) => vec![*target],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: Option<String>,
    pub line: u32,
}
