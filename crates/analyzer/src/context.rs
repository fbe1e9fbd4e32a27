//! Best-effort description of a loop for the external classifier.

use crate::analysis::access::collect_accesses;
use crate::ir::{Instruction, LoopHandle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionMix {
    pub loads: usize,
    pub stores: usize,
    pub arithmetic: usize,
    pub compares: usize,
    pub calls: usize,
    pub branches: usize,
    pub phis: usize,
}

impl InstructionMix {
    pub fn of(lp: &dyn LoopHandle) -> Self {
        let mut mix = Self::default();
        for inst in lp.instructions() {
            match inst {
                Instruction::Load { .. } => mix.loads += 1,
                Instruction::Store { .. } => mix.stores += 1,
                Instruction::Binary { .. } | Instruction::Select { .. } => mix.arithmetic += 1,
                Instruction::Compare { .. } => mix.compares += 1,
                Instruction::Call { .. } => mix.calls += 1,
                Instruction::Branch { .. } => mix.branches += 1,
                Instruction::Phi { .. } => mix.phis += 1,
                Instruction::Cast { .. }
                | Instruction::ElementPtr { .. }
                | Instruction::Jump { .. }
                | Instruction::Return { .. } => {}
            }
        }
        mix
    }
}

/// Fields are empty when the host has no debug information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopContext {
    pub function: String,
    pub file: String,
    pub line: Option<u32>,
    pub depth: usize,
    pub sub_loops: usize,
    pub induction_variable: String,
    pub instruction_mix: InstructionMix,
    pub arrays: BTreeSet<String>,
    pub accesses: Vec<String>,
    pub callees: BTreeSet<String>,
}

impl LoopContext {
    pub fn of(lp: &dyn LoopHandle) -> Self {
        let location = lp.source_location();
        let sites = collect_accesses(lp);
        let callees = lp
            .instructions()
            .into_iter()
            .filter_map(|inst| match inst {
                Instruction::Call {
                    callee: Some(name), ..
                } => Some(name.clone()),
                _ => None,
            })
            .collect();

        Self {
            function: lp.function_name().to_string(),
            file: location
                .as_ref()
                .and_then(|l| l.file.clone())
                .unwrap_or_default(),
            line: location.map(|l| l.line),
            depth: lp.depth(),
            sub_loops: lp.sub_loops().len(),
            induction_variable: lp
                .induction_variable()
                .and_then(|iv| lp.value_name(iv))
                .unwrap_or_default()
                .to_string(),
            instruction_mix: InstructionMix::of(lp),
            arrays: sites.iter().map(|s| s.base.clone()).collect(),
            accesses: sites.iter().map(|s| s.rendered.clone()).collect(),
            callees,
        }
    }
}

/// JSON context string sent alongside a classification request.
pub fn serialize_loop_context(lp: &dyn LoopHandle) -> String {
    match serde_json::to_string(&LoopContext::of(lp)) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize loop context for {}: {}", lp.function_name(), e);
            "{}".to_string()
        }
    }
}
