//! The capability interface the analyzers see.
//!
//! Hosts expose their loop structure through [`LoopHandle`]; nothing in the
//! analysis pipeline touches a concrete host type. Handles are borrowed and
//! read-only, and every nested handle borrows from its parent.

use super::instruction::{BasicBlock, BlockId, Instruction, Operand, SourceLocation, ValueId};

pub trait LoopHandle {
    fn header(&self) -> BlockId;

    /// Blocks of the loop body in program order, sub-loop blocks included.
    fn blocks(&self) -> Vec<&BasicBlock>;

    fn induction_variable(&self) -> Option<ValueId>;

    fn parent_loop(&self) -> Option<Box<dyn LoopHandle + '_>>;

    fn sub_loops(&self) -> Vec<Box<dyn LoopHandle + '_>>;

    /// Defining instruction of `value` anywhere in the enclosing function.
    fn definition(&self, value: ValueId) -> Option<&Instruction>;

    fn function_name(&self) -> &str;

    fn source_location(&self) -> Option<SourceLocation> {
        None
    }

    fn value_name(&self, _value: ValueId) -> Option<&str> {
        None
    }

    fn instructions(&self) -> Vec<&Instruction> {
        self.blocks()
            .into_iter()
            .flat_map(|block| block.instructions.iter())
            .collect()
    }

    fn contains_block(&self, block: BlockId) -> bool {
        self.blocks().iter().any(|b| b.id == block)
    }

    fn defines(&self, value: ValueId) -> bool {
        self.instructions()
            .iter()
            .any(|inst| inst.result() == Some(value))
    }

    fn is_loop_invariant(&self, operand: &Operand) -> bool {
        match operand {
            Operand::Value(value) => !self.defines(*value),
            Operand::Int(_) | Operand::Float(_) | Operand::Symbol(_) => true,
        }
    }

    /// 1 for an outermost loop.
    fn depth(&self) -> usize {
        self.parent_loop().map_or(1, |parent| parent.depth() + 1)
    }

    /// Instructions that use `value` inside the loop.
    fn users_of(&self, value: ValueId) -> Vec<&Instruction> {
        self.instructions()
            .into_iter()
            .filter(|inst| inst.uses(value))
            .collect()
    }
}
