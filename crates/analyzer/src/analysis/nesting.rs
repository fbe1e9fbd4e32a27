//! Position of a loop within its nest.

use crate::ir::{LoopHandle, ValueId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestingInfo {
    /// 1 for an outermost loop.
    pub depth: usize,
    pub sub_loop_count: usize,
    /// Enclosing loops that each contain exactly one loop, counted outwards.
    pub perfect_above: usize,
    /// Levels below this loop that form a single-child chain.
    pub perfect_below: usize,
    /// Induction variables from this loop outwards.
    #[serde(skip)]
    pub nest_ivs: Vec<Option<ValueId>>,
}

impl NestingInfo {
    pub fn of(lp: &dyn LoopHandle) -> Self {
        let mut nest_ivs = vec![lp.induction_variable()];
        let mut perfect_above = 0;
        let mut still_perfect = true;
        Self::walk_up(lp, &mut nest_ivs, &mut perfect_above, &mut still_perfect);

        Self {
            depth: nest_ivs.len(),
            sub_loop_count: lp.sub_loops().len(),
            perfect_above,
            perfect_below: Self::perfect_below(lp),
            nest_ivs,
        }
    }

    fn walk_up(
        lp: &dyn LoopHandle,
        ivs: &mut Vec<Option<ValueId>>,
        perfect_above: &mut usize,
        still_perfect: &mut bool,
    ) {
        if let Some(parent) = lp.parent_loop() {
            ivs.push(parent.induction_variable());
            if *still_perfect && parent.sub_loops().len() == 1 {
                *perfect_above += 1;
            } else {
                *still_perfect = false;
            }
            Self::walk_up(parent.as_ref(), ivs, perfect_above, still_perfect);
        }
    }

    fn perfect_below(lp: &dyn LoopHandle) -> usize {
        let subs = lp.sub_loops();
        if subs.len() == 1 {
            1 + Self::perfect_below(subs[0].as_ref())
        } else {
            0
        }
    }

    pub fn is_innermost(&self) -> bool {
        self.sub_loop_count == 0
    }

    /// Levels in the perfect chain this loop belongs to.
    pub fn perfect_chain_len(&self) -> usize {
        self.perfect_above + 1 + self.perfect_below
    }

    /// Either loop of a two-level nest with no further nesting.
    pub fn is_two_level_nest(&self) -> bool {
        (self.depth == 2 && self.is_innermost() && self.perfect_above == 1)
            || (self.depth == 1 && self.perfect_below == 1 && self.sub_loop_count == 1)
    }

    pub fn is_nested(&self) -> bool {
        self.depth > 1 || self.sub_loop_count > 0
    }
}

/// Runs `f` on the innermost loop of the single-child chain below `lp`.
pub fn with_perfect_leaf<R>(lp: &dyn LoopHandle, f: &mut dyn FnMut(&dyn LoopHandle) -> R) -> Option<R> {
    let subs = lp.sub_loops();
    match subs.len() {
        0 => Some(f(lp)),
        1 => with_perfect_leaf(subs[0].as_ref(), f),
        _ => None,
    }
}
