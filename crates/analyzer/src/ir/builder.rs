//! Fluent construction of [`FunctionIr`] bodies.
//!
//! Hosts lowering their own IR, and the test-suite, build functions block by
//! block. `counted_loop`/`close_loop` scaffold the canonical
//! `for (i = 0; i < n; ++i)` shape and keep the loop forest consistent.

use super::function::{FunctionIr, LoopDescriptor};
use super::instruction::{
    BasicBlock, BinaryOp, BlockId, ComparePredicate, Instruction, Operand, ValueId,
};
use std::collections::{BTreeMap, HashMap};

/// Blocks and values of a loop opened with [`FunctionBuilder::counted_loop`].
#[derive(Debug, Clone, Copy)]
pub struct CountedLoop {
    pub index: usize,
    pub preheader: BlockId,
    pub header: BlockId,
    pub body: BlockId,
    pub latch: BlockId,
    pub exit: BlockId,
    pub iv: ValueId,
}

pub struct FunctionBuilder {
    name: String,
    source_file: Option<String>,
    blocks: BTreeMap<BlockId, BasicBlock>,
    loops: Vec<LoopDescriptor>,
    open_loops: Vec<usize>,
    value_names: HashMap<ValueId, String>,
    next_value: u32,
    next_block: u32,
    current: BlockId,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let entry = BlockId(0);
        let mut blocks = BTreeMap::new();
        blocks.insert(entry, BasicBlock::new(entry));
        Self {
            name: name.into(),
            source_file: None,
            blocks,
            loops: Vec::new(),
            open_loops: Vec::new(),
            value_names: HashMap::new(),
            next_value: 0,
            next_block: 1,
            current: entry,
        }
    }

    pub fn source_file(&mut self, file: impl Into<String>) -> &mut Self {
        self.source_file = Some(file.into());
        self
    }

    pub fn create_block(&mut self) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        self.blocks.insert(id, BasicBlock::new(id));
        id
    }

    pub fn set_insert_point(&mut self, block: BlockId) -> &mut Self {
        self.current = block;
        self
    }

    pub fn insert_point(&self) -> BlockId {
        self.current
    }

    pub fn set_line(&mut self, line: u32) -> &mut Self {
        if let Some(block) = self.blocks.get_mut(&self.current) {
            block.line = Some(line);
        }
        self
    }

    /// Reserves a value id, e.g. for the back-edge operand of a phi.
    pub fn fresh(&mut self, name: &str) -> ValueId {
        let value = ValueId(self.next_value);
        self.next_value += 1;
        if !name.is_empty() {
            self.value_names.insert(value, name.to_string());
        }
        value
    }

    pub fn name_value(&mut self, value: ValueId, name: &str) -> &mut Self {
        self.value_names.insert(value, name.to_string());
        self
    }

    fn push(&mut self, inst: Instruction) -> &mut Self {
        if let Some(block) = self.blocks.get_mut(&self.current) {
            block.instructions.push(inst);
        }
        self
    }

    fn is_terminated(&self, block: BlockId) -> bool {
        self.blocks
            .get(&block)
            .and_then(|b| b.instructions.last())
            .is_some_and(|inst| {
                matches!(
                    inst,
                    Instruction::Branch { .. } | Instruction::Jump { .. } | Instruction::Return { .. }
                )
            })
    }

    pub fn phi_into(&mut self, result: ValueId, incoming: Vec<(Operand, BlockId)>) -> &mut Self {
        self.push(Instruction::Phi { result, incoming })
    }

    pub fn binary(
        &mut self,
        op: BinaryOp,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) -> ValueId {
        let result = self.fresh("");
        self.binary_into(result, op, lhs, rhs);
        result
    }

    pub fn binary_into(
        &mut self,
        result: ValueId,
        op: BinaryOp,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) -> &mut Self {
        self.push(Instruction::Binary {
            result,
            op,
            lhs: lhs.into(),
            rhs: rhs.into(),
        })
    }

    pub fn compare(
        &mut self,
        predicate: ComparePredicate,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) -> ValueId {
        let result = self.fresh("");
        self.push(Instruction::Compare {
            result,
            predicate,
            lhs: lhs.into(),
            rhs: rhs.into(),
        });
        result
    }

    pub fn select(
        &mut self,
        condition: impl Into<Operand>,
        on_true: impl Into<Operand>,
        on_false: impl Into<Operand>,
    ) -> ValueId {
        let result = self.fresh("");
        self.push(Instruction::Select {
            result,
            condition: condition.into(),
            on_true: on_true.into(),
            on_false: on_false.into(),
        });
        result
    }

    pub fn cast(&mut self, operand: impl Into<Operand>) -> ValueId {
        let result = self.fresh("");
        self.push(Instruction::Cast {
            result,
            operand: operand.into(),
        });
        result
    }

    pub fn element_ptr(&mut self, base: impl Into<Operand>, indices: Vec<Operand>) -> ValueId {
        let result = self.fresh("");
        self.push(Instruction::ElementPtr {
            result,
            base: base.into(),
            indices,
        });
        result
    }

    pub fn load(&mut self, address: impl Into<Operand>) -> ValueId {
        let result = self.fresh("");
        self.push(Instruction::Load {
            result,
            address: address.into(),
        });
        result
    }

    pub fn load_element(&mut self, base: impl Into<Operand>, indices: Vec<Operand>) -> ValueId {
        let address = self.element_ptr(base, indices);
        self.load(address)
    }

    pub fn store(&mut self, address: impl Into<Operand>, value: impl Into<Operand>) -> &mut Self {
        self.push(Instruction::Store {
            address: address.into(),
            value: value.into(),
        })
    }

    pub fn store_element(
        &mut self,
        base: impl Into<Operand>,
        indices: Vec<Operand>,
        value: impl Into<Operand>,
    ) -> &mut Self {
        let address = self.element_ptr(base, indices);
        self.store(address, value)
    }

    pub fn call(&mut self, callee: &str, args: Vec<Operand>, pure_function: bool) -> ValueId {
        let result = self.fresh("");
        self.push(Instruction::Call {
            result: Some(result),
            callee: Some(callee.to_string()),
            args,
            pure_function,
        });
        result
    }

    pub fn branch(
        &mut self,
        condition: impl Into<Operand>,
        then_block: BlockId,
        else_block: BlockId,
    ) -> &mut Self {
        self.push(Instruction::Branch {
            condition: condition.into(),
            then_block,
            else_block,
        })
    }

    pub fn jump(&mut self, target: BlockId) -> &mut Self {
        self.push(Instruction::Jump { target })
    }

    pub fn ret(&mut self, value: Option<Operand>) -> &mut Self {
        self.push(Instruction::Return { value })
    }

    /// Opens `for (iv = 0; iv < bound; ++iv)` nested in the innermost open
    /// loop and leaves the insert point in the body.
    pub fn counted_loop(&mut self, iv_name: &str, bound: impl Into<Operand>) -> CountedLoop {
        let preheader = self.current;
        let header = self.create_block();
        let body = self.create_block();
        let latch = self.create_block();
        let exit = self.create_block();
        let iv = self.fresh(iv_name);
        let next = self.fresh(&format!("{iv_name}.next"));

        self.jump(header);

        self.set_insert_point(header);
        self.phi_into(iv, vec![(Operand::Int(0), preheader), (next.into(), latch)]);
        let in_range = self.compare(ComparePredicate::Lt, iv, bound);
        self.branch(in_range, body, exit);

        self.set_insert_point(latch);
        self.binary_into(next, BinaryOp::Add, iv, 1i64);
        self.jump(header);

        let parent = self.open_loops.last().copied();
        let index = self.loops.len();
        self.loops.push(LoopDescriptor {
            header,
            blocks: vec![header, body, latch],
            induction_variable: Some(iv),
            parent,
            children: Vec::new(),
            line: None,
        });
        if let Some(parent) = parent {
            self.loops[parent].children.push(index);
        }
        self.open_loops.push(index);

        self.set_insert_point(body);
        CountedLoop {
            index,
            preheader,
            header,
            body,
            latch,
            exit,
            iv,
        }
    }

    /// Adds a loop-carried scalar: a header phi starting at `init`.
    pub fn carried(&mut self, lp: &CountedLoop, name: &str, init: impl Into<Operand>) -> ValueId {
        let value = self.fresh(name);
        let phi = Instruction::Phi {
            result: value,
            incoming: vec![(init.into(), lp.preheader)],
        };
        if let Some(header) = self.blocks.get_mut(&lp.header) {
            let position = header
                .instructions
                .iter()
                .take_while(|inst| matches!(inst, Instruction::Phi { .. }))
                .count();
            header.instructions.insert(position, phi);
        }
        value
    }

    /// Sets the value a carried scalar takes on the back edge.
    pub fn update_carried(&mut self, lp: &CountedLoop, carried: ValueId, value: impl Into<Operand>) -> &mut Self {
        let value = value.into();
        if let Some(header) = self.blocks.get_mut(&lp.header) {
            for inst in header.instructions.iter_mut() {
                if let Instruction::Phi { result, incoming } = inst {
                    if *result == carried {
                        incoming.push((value.clone(), lp.latch));
                    }
                }
            }
        }
        self
    }

    pub fn set_loop_line(&mut self, lp: &CountedLoop, line: u32) -> &mut Self {
        if let Some(descriptor) = self.loops.get_mut(lp.index) {
            descriptor.line = Some(line);
        }
        self
    }

    /// Branches the current block to the latch, records every block created
    /// since the loop was opened as part of it, and continues at the exit.
    pub fn close_loop(&mut self, lp: &CountedLoop) -> &mut Self {
        if !self.is_terminated(self.current) {
            self.jump(lp.latch);
        }

        let inner: Vec<BlockId> = (lp.exit.0 + 1..self.next_block).map(BlockId).collect();
        if let Some(descriptor) = self.loops.get_mut(lp.index) {
            let mut blocks = vec![lp.header, lp.body];
            blocks.extend(inner);
            blocks.push(lp.latch);
            descriptor.blocks = blocks;
        }
        if let Some(position) = self.open_loops.iter().rposition(|&i| i == lp.index) {
            self.open_loops.truncate(position);
        }

        self.set_insert_point(lp.exit)
    }

    pub fn build(self) -> FunctionIr {
        FunctionIr::new(
            self.name,
            self.source_file,
            self.blocks.into_values().collect(),
            self.loops,
            self.value_names,
        )
    }
}
