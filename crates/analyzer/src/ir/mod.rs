//! Loop IR: the host-facing [`LoopHandle`] capability plus an in-memory
//! reference implementation for hosts without their own loop forest.

pub mod builder;
pub mod function;
pub mod handle;
pub mod instruction;

pub use builder::{CountedLoop, FunctionBuilder};
pub use function::{FunctionIr, LoopDescriptor, LoopRef};
pub use handle::LoopHandle;
pub use instruction::{
    BasicBlock, BinaryOp, BlockId, ComparePredicate, Instruction, Operand, SourceLocation,
    ValueId,
};
