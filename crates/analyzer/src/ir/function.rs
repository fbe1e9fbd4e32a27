use super::handle::LoopHandle;
use super::instruction::{BasicBlock, BlockId, Instruction, SourceLocation, ValueId};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
pub struct LoopDescriptor {
    pub header: BlockId,
    pub blocks: Vec<BlockId>,
    pub induction_variable: Option<ValueId>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub line: Option<u32>,
}

/// In-memory function body with its loop forest.
#[derive(Debug, Clone)]
pub struct FunctionIr {
    name: String,
    source_file: Option<String>,
    blocks: BTreeMap<BlockId, BasicBlock>,
    loops: Vec<LoopDescriptor>,
    value_names: HashMap<ValueId, String>,
    definitions: HashMap<ValueId, (BlockId, usize)>,
}

impl FunctionIr {
    pub fn new(
        name: impl Into<String>,
        source_file: Option<String>,
        blocks: Vec<BasicBlock>,
        loops: Vec<LoopDescriptor>,
        value_names: HashMap<ValueId, String>,
    ) -> Self {
        let blocks: BTreeMap<_, _> = blocks.into_iter().map(|b| (b.id, b)).collect();
        let mut definitions = HashMap::new();
        for block in blocks.values() {
            for (position, inst) in block.instructions.iter().enumerate() {
                if let Some(result) = inst.result() {
                    definitions.insert(result, (block.id, position));
                }
            }
        }

        Self {
            name: name.into(),
            source_file,
            blocks,
            loops,
            value_names,
            definitions,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_file(&self) -> Option<&str> {
        self.source_file.as_deref()
    }

    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(&id)
    }

    pub fn definition(&self, value: ValueId) -> Option<&Instruction> {
        let (block, position) = self.definitions.get(&value)?;
        self.blocks.get(block)?.instructions.get(*position)
    }

    pub fn value_name(&self, value: ValueId) -> Option<&str> {
        self.value_names.get(&value).map(String::as_str)
    }

    pub fn loop_count(&self) -> usize {
        self.loops.len()
    }

    pub fn loop_ref(&self, index: usize) -> Option<LoopRef<'_>> {
        (index < self.loops.len()).then_some(LoopRef {
            function: self,
            index,
        })
    }

    /// Every loop of the forest, outer loops before the loops they contain.
    pub fn loops(&self) -> Vec<LoopRef<'_>> {
        let mut ordered = Vec::with_capacity(self.loops.len());
        for root in self.top_level_loops() {
            self.collect_preorder(root.index, &mut ordered);
        }
        ordered
    }

    pub fn top_level_loops(&self) -> Vec<LoopRef<'_>> {
        self.loops
            .iter()
            .enumerate()
            .filter(|(_, l)| l.parent.is_none())
            .map(|(index, _)| LoopRef {
                function: self,
                index,
            })
            .collect()
    }

    fn collect_preorder<'a>(&'a self, index: usize, out: &mut Vec<LoopRef<'a>>) {
        out.push(LoopRef {
            function: self,
            index,
        });
        for &child in &self.loops[index].children {
            self.collect_preorder(child, out);
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LoopRef<'a> {
    function: &'a FunctionIr,
    index: usize,
}

impl<'a> LoopRef<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn function(&self) -> &'a FunctionIr {
        self.function
    }

    pub fn descriptor(&self) -> &'a LoopDescriptor {
        &self.function.loops[self.index]
    }
}

impl<'a> LoopHandle for LoopRef<'a> {
    fn header(&self) -> BlockId {
        self.descriptor().header
    }

    fn blocks(&self) -> Vec<&BasicBlock> {
        self.descriptor()
            .blocks
            .iter()
            .filter_map(|id| self.function.blocks.get(id))
            .collect()
    }

    fn induction_variable(&self) -> Option<ValueId> {
        self.descriptor().induction_variable
    }

    fn parent_loop(&self) -> Option<Box<dyn LoopHandle + '_>> {
        let parent = self.descriptor().parent?;
        Some(Box::new(LoopRef {
            function: self.function,
            index: parent,
        }))
    }

    fn sub_loops(&self) -> Vec<Box<dyn LoopHandle + '_>> {
        self.descriptor()
            .children
            .iter()
            .map(|&index| {
                Box::new(LoopRef {
                    function: self.function,
                    index,
                }) as Box<dyn LoopHandle + '_>
            })
            .collect()
    }

    fn definition(&self, value: ValueId) -> Option<&Instruction> {
        self.function.definition(value)
    }

    fn function_name(&self) -> &str {
        &self.function.name
    }

    fn source_location(&self) -> Option<SourceLocation> {
        let line = self
            .descriptor()
            .line
            .or_else(|| self.function.block(self.header()).and_then(|b| b.line))?;
        Some(SourceLocation {
            file: self.function.source_file.clone(),
            line,
        })
    }

    fn value_name(&self, value: ValueId) -> Option<&str> {
        self.function.value_name(value)
    }

    fn contains_block(&self, block: BlockId) -> bool {
        self.descriptor().blocks.contains(&block)
    }

    fn defines(&self, value: ValueId) -> bool {
        self.function
            .definitions
            .get(&value)
            .is_some_and(|(block, _)| self.contains_block(*block))
    }
}
