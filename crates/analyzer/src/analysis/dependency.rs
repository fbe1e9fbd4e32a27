//! Loop-carried dependence classification.
//!
//! Every write is related to every other access of the same base. Affine
//! indices with equal coefficients give an exact iteration distance; anything
//! that cannot be resolved marks the loop ambiguous, which always ends in
//! `ComplexFlow`. An impure call is unresolvable by definition.

use super::access::{collect_accesses, AccessSite, IndexTerm};
use super::recurrence::{carried_scalars, memory_accumulators, ReductionOperator};
use crate::error::{AnalysisError, AnalysisResult};
use crate::ir::{Instruction, LoopHandle, Operand};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyKind {
    None,
    ReadOnly,
    #[serde(rename = "WAR")]
    War,
    #[serde(rename = "RAW")]
    Raw,
    #[serde(rename = "WAW")]
    Waw,
    ComplexFlow,
}

impl DependencyKind {
    pub fn is_safe(self) -> bool {
        matches!(self, DependencyKind::None | DependencyKind::ReadOnly)
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DependencyKind::None => "no loop-carried dependency",
            DependencyKind::ReadOnly => "read-only",
            DependencyKind::War => "write-after-read",
            DependencyKind::Raw => "read-after-write",
            DependencyKind::Waw => "write-after-write",
            DependencyKind::ComplexFlow => "complex flow",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarriedDependence {
    pub kind: DependencyKind,
    pub distance: u32,
    pub variable: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<ReductionOperator>,
    /// Removable by giving each worker a private copy.
    pub privatizable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyProfile {
    pub kind: DependencyKind,
    pub distance: u32,
    pub eliminable: bool,
    pub dependent_variables: BTreeSet<String>,
    #[serde(default)]
    pub carried: Vec<CarriedDependence>,
}

impl DependencyProfile {
    pub fn read_only() -> Self {
        Self {
            kind: DependencyKind::ReadOnly,
            distance: 0,
            eliminable: false,
            dependent_variables: BTreeSet::new(),
            carried: Vec::new(),
        }
    }

    /// The single privatizable accumulator, when the profile is eliminable.
    pub fn accumulator(&self) -> Option<&CarriedDependence> {
        if self.eliminable {
            self.carried.first()
        } else {
            None
        }
    }
}

enum Relation {
    Independent,
    SameIteration,
    /// Second access touches the first one's location `d` iterations later.
    Distance(i64),
    /// Same location in every iteration.
    Uniform,
}

#[derive(Debug, Default, Clone)]
pub struct DependencyAnalyzer;

impl DependencyAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, lp: &dyn LoopHandle) -> DependencyProfile {
        let sites = collect_accesses(lp);
        self.analyze_sites(lp, &sites)
    }

    pub fn analyze_sites(&self, lp: &dyn LoopHandle, sites: &[AccessSite]) -> DependencyProfile {
        let scalars = carried_scalars(lp);
        let effects = side_effect_calls(lp);
        let has_writes = sites.iter().any(AccessSite::is_write);
        if !has_writes && scalars.is_empty() && effects.is_empty() {
            return DependencyProfile::read_only();
        }

        let accumulators = memory_accumulators(lp, sites);
        let mut carried: Vec<CarriedDependence> = Vec::new();
        let mut ambiguous = !effects.is_empty();
        for callee in &effects {
            debug!("{}: call to {} may touch any memory", lp.function_name(), callee);
        }

        for write in sites.iter().filter(|s| s.is_write()) {
            let accumulator = accumulators
                .iter()
                .find(|(order, _)| *order == write.order)
                .map(|(_, acc)| acc);

            for other in sites {
                if other.order == write.order {
                    if accumulator.is_none() {
                        self.relate_self(lp, write, &mut carried, &mut ambiguous);
                    }
                    continue;
                }
                if other.is_write() && other.order < write.order {
                    continue;
                }
                if other.base != write.base {
                    if !(write.base_invariant && other.base_invariant) {
                        debug!(
                            "{}: {} and {} may alias",
                            lp.function_name(),
                            write.rendered,
                            other.rendered
                        );
                        ambiguous = true;
                    }
                    continue;
                }

                match Self::relate(write, other) {
                    Ok(Relation::Independent) | Ok(Relation::SameIteration) => {}
                    Ok(Relation::Distance(d)) => {
                        let kind = match (other.is_read(), d > 0) {
                            (true, true) => DependencyKind::Raw,
                            (true, false) => DependencyKind::War,
                            (false, _) => DependencyKind::Waw,
                        };
                        carried.push(CarriedDependence {
                            kind,
                            distance: d.unsigned_abs().min(u32::MAX as u64) as u32,
                            variable: write.base.clone(),
                            operator: None,
                            privatizable: false,
                        });
                    }
                    Ok(Relation::Uniform) => {
                        let kind = if other.is_write() {
                            DependencyKind::Waw
                        } else if other.order < write.order {
                            DependencyKind::Raw
                        } else {
                            DependencyKind::War
                        };
                        let is_accumulation = kind == DependencyKind::Raw && accumulator.is_some();
                        carried.push(CarriedDependence {
                            kind,
                            distance: 1,
                            variable: accumulator
                                .filter(|_| is_accumulation)
                                .map_or_else(|| write.base.clone(), |acc| acc.variable.clone()),
                            operator: accumulator.filter(|_| is_accumulation).map(|acc| acc.operator),
                            privatizable: accumulator.is_some_and(|acc| is_accumulation && acc.sole_use),
                        });
                    }
                    Err(e) => {
                        debug!("{}: {}", lp.function_name(), e);
                        ambiguous = true;
                    }
                }
            }
        }

        for scalar in &scalars {
            carried.push(CarriedDependence {
                kind: DependencyKind::Raw,
                distance: 1,
                variable: scalar.name.clone(),
                operator: scalar.accumulator.as_ref().map(|acc| acc.operator),
                privatizable: scalar.accumulator.as_ref().is_some_and(|acc| acc.sole_use),
            });
        }

        let mut profile = Self::summarize(carried, ambiguous);
        profile.dependent_variables.extend(effects);
        profile
    }

    fn relate_self(
        &self,
        lp: &dyn LoopHandle,
        write: &AccessSite,
        carried: &mut Vec<CarriedDependence>,
        ambiguous: &mut bool,
    ) {
        match Self::relate(write, write) {
            Ok(Relation::Uniform) => carried.push(CarriedDependence {
                kind: DependencyKind::Waw,
                distance: 1,
                variable: write.base.clone(),
                operator: None,
                privatizable: false,
            }),
            Ok(_) => {}
            Err(e) => {
                debug!("{}: {}", lp.function_name(), e);
                *ambiguous = true;
            }
        }
    }

    fn relate(first: &AccessSite, second: &AccessSite) -> AnalysisResult<Relation> {
        if !first.base_invariant || !second.base_invariant {
            return Err(AnalysisError::ambiguous(format!(
                "base pointer of {} varies inside the loop",
                first.rendered
            )));
        }
        if first.terms.len() != second.terms.len() {
            return Err(AnalysisError::ambiguous(format!(
                "{} and {} use different index shapes",
                first.rendered, second.rendered
            )));
        }

        let mut distance: Option<i64> = None;
        let operands = first.indices.iter().zip(&second.indices);
        for ((a, b), (x, y)) in first.terms.iter().zip(&second.terms).zip(operands) {
            match (a, b) {
                (
                    IndexTerm::Affine {
                        coefficient: ca,
                        offset: oa,
                    },
                    IndexTerm::Affine {
                        coefficient: cb,
                        offset: ob,
                    },
                ) if ca == cb => {
                    let overflow = || {
                        AnalysisError::ambiguous(format!(
                            "offsets of {} and {} overflow",
                            first.rendered, second.rendered
                        ))
                    };
                    let delta = oa.checked_sub(*ob).ok_or_else(overflow)?;
                    if delta.checked_rem(*ca).ok_or_else(overflow)? != 0 {
                        return Ok(Relation::Independent);
                    }
                    let d = delta.checked_div(*ca).ok_or_else(overflow)?;
                    match distance {
                        Some(previous) if previous != d => return Ok(Relation::Independent),
                        _ => distance = Some(d),
                    }
                }
                (IndexTerm::Invariant(rx), IndexTerm::Invariant(ry)) => match (x, y) {
                    _ if x == y => {}
                    (Operand::Int(_), Operand::Int(_)) => return Ok(Relation::Independent),
                    _ => {
                        return Err(AnalysisError::ambiguous(format!(
                            "cannot compare invariant indices {rx} and {ry}"
                        )))
                    }
                },
                (IndexTerm::Swept(_) | IndexTerm::Invariant(_), IndexTerm::Swept(_))
                | (IndexTerm::Swept(_), IndexTerm::Invariant(_)) => {}
                _ => {
                    return Err(AnalysisError::ambiguous(format!(
                        "cannot resolve overlap of {} and {}",
                        first.rendered, second.rendered
                    )))
                }
            }
        }

        Ok(match distance {
            Some(0) => Relation::SameIteration,
            Some(d) => Relation::Distance(d),
            None => Relation::Uniform,
        })
    }

    fn summarize(carried: Vec<CarriedDependence>, ambiguous: bool) -> DependencyProfile {
        let has = |kind: DependencyKind| carried.iter().any(|c| c.kind == kind);
        let (raw, war, waw) = (
            has(DependencyKind::Raw),
            has(DependencyKind::War),
            has(DependencyKind::Waw),
        );

        let kind = if ambiguous || (raw && war) {
            DependencyKind::ComplexFlow
        } else if raw {
            DependencyKind::Raw
        } else if war {
            DependencyKind::War
        } else if waw {
            DependencyKind::Waw
        } else {
            DependencyKind::None
        };

        let eliminable = !ambiguous && carried.len() == 1 && carried[0].privatizable;
        let distance = carried.iter().map(|c| c.distance).min().unwrap_or(0);
        let dependent_variables = carried.iter().map(|c| c.variable.clone()).collect();

        DependencyProfile {
            kind,
            distance,
            eliminable,
            dependent_variables,
            carried,
        }
    }
}

/// Callees of impure calls in the loop body.
fn side_effect_calls(lp: &dyn LoopHandle) -> BTreeSet<String> {
    lp.instructions()
        .into_iter()
        .filter(|inst| inst.is_call() && inst.has_side_effects())
        .map(|inst| match inst {
            Instruction::Call {
                callee: Some(name), ..
            } => name.clone(),
            _ => "<indirect call>".to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, FunctionBuilder, FunctionIr, Operand, ValueId};

    fn single_loop(body: impl FnOnce(&mut FunctionBuilder, ValueId)) -> FunctionIr {
        let mut b = FunctionBuilder::new("kernel");
        let lp = b.counted_loop("i", Operand::symbol("n"));
        body(&mut b, lp.iv);
        b.close_loop(&lp);
        b.build()
    }

    fn analyze(function: &FunctionIr) -> DependencyProfile {
        DependencyAnalyzer::new().analyze(&function.loop_ref(0).unwrap())
    }

    #[test]
    fn test_read_only() {
        let function = single_loop(|b, i| {
            b.load_element("A", vec![i.into()]);
        });
        assert_eq!(analyze(&function).kind, DependencyKind::ReadOnly);
    }

    #[test]
    fn test_independent_elementwise() {
        let function = single_loop(|b, i| {
            let x = b.load_element("A", vec![i.into()]);
            b.store_element("A", vec![i.into()], x);
        });
        let profile = analyze(&function);
        assert_eq!(profile.kind, DependencyKind::None);
        assert_eq!(profile.distance, 0);
    }

    #[test]
    fn test_forward_recurrence_is_raw() {
        let function = single_loop(|b, i| {
            let prev = b.binary(BinaryOp::Sub, i, 1i64);
            let x = b.load_element("A", vec![prev.into()]);
            b.store_element("A", vec![i.into()], x);
        });
        let profile = analyze(&function);
        assert_eq!(profile.kind, DependencyKind::Raw);
        assert_eq!(profile.distance, 1);
        assert!(!profile.eliminable);
        assert!(profile.dependent_variables.contains("A"));
    }

    #[test]
    fn test_read_ahead_is_war() {
        let function = single_loop(|b, i| {
            let ahead = b.binary(BinaryOp::Add, i, 2i64);
            let x = b.load_element("A", vec![ahead.into()]);
            b.store_element("A", vec![i.into()], x);
        });
        let profile = analyze(&function);
        assert_eq!(profile.kind, DependencyKind::War);
        assert_eq!(profile.distance, 2);
    }

    #[test]
    fn test_both_directions_are_complex() {
        let function = single_loop(|b, i| {
            let prev = b.binary(BinaryOp::Sub, i, 1i64);
            let next = b.binary(BinaryOp::Add, i, 1i64);
            let x = b.load_element("A", vec![prev.into()]);
            let y = b.load_element("A", vec![next.into()]);
            let s = b.binary(BinaryOp::Add, x, y);
            b.store_element("A", vec![i.into()], s);
        });
        assert_eq!(analyze(&function).kind, DependencyKind::ComplexFlow);
    }

    #[test]
    fn test_scatter_is_ambiguous() {
        let function = single_loop(|b, i| {
            let idx = b.load_element("idx", vec![i.into()]);
            let x = b.load_element("A", vec![i.into()]);
            b.store_element("B", vec![idx.into()], x);
        });
        assert_eq!(analyze(&function).kind, DependencyKind::ComplexFlow);
    }

    #[test]
    fn test_scalar_accumulator_is_eliminable() {
        let mut b = FunctionBuilder::new("sum");
        let lp = b.counted_loop("i", Operand::symbol("n"));
        let sum = b.carried(&lp, "sum", 0i64);
        let x = b.load_element("A", vec![lp.iv.into()]);
        let next = b.binary(BinaryOp::Add, sum, x);
        b.update_carried(&lp, sum, next);
        b.close_loop(&lp);
        let function = b.build();

        let profile = analyze(&function);
        assert_eq!(profile.kind, DependencyKind::Raw);
        assert!(profile.eliminable);
        assert_eq!(profile.distance, 1);
        assert_eq!(
            profile.accumulator().and_then(|c| c.operator),
            Some(ReductionOperator::Sum)
        );
    }

    #[test]
    fn test_memory_accumulator_is_eliminable() {
        let function = single_loop(|b, i| {
            let x = b.load_element("A", vec![i.into()]);
            let old = b.load("total");
            let next = b.binary(BinaryOp::Add, old, x);
            b.store("total", next);
        });
        let profile = analyze(&function);
        assert_eq!(profile.kind, DependencyKind::Raw);
        assert!(profile.eliminable);
        assert!(profile.dependent_variables.contains("total"));
    }

    #[test]
    fn test_invariant_store_is_output_dependence() {
        let function = single_loop(|b, i| {
            let x = b.load_element("A", vec![i.into()]);
            b.store("last", x);
        });
        let profile = analyze(&function);
        assert_eq!(profile.kind, DependencyKind::Waw);
        assert!(!profile.eliminable);
    }

    #[test]
    fn test_impure_call_is_complex() {
        let function = single_loop(|b, i| {
            let x = b.load_element("A", vec![i.into()]);
            b.call("log_value", vec![x.into()], false);
        });
        let profile = analyze(&function);
        assert_eq!(profile.kind, DependencyKind::ComplexFlow);
        assert!(!profile.eliminable);
        assert!(profile.dependent_variables.contains("log_value"));
    }

    #[test]
    fn test_pure_call_stays_read_only() {
        let function = single_loop(|b, i| {
            let x = b.load_element("A", vec![i.into()]);
            b.call("sqrt", vec![x.into()], true);
        });
        assert_eq!(analyze(&function).kind, DependencyKind::ReadOnly);
    }

    #[test]
    fn test_offset_overflow_is_ambiguous() {
        let function = single_loop(|b, i| {
            let far = b.binary(BinaryOp::Add, i, i64::MAX);
            let prev = b.binary(BinaryOp::Sub, i, 1i64);
            let x = b.load_element("A", vec![prev.into()]);
            b.store_element("A", vec![far.into()], x);
        });
        assert_eq!(analyze(&function).kind, DependencyKind::ComplexFlow);
    }

    #[test]
    fn test_invariant_indices_compare_values_not_names() {
        let mut b = FunctionBuilder::new("kernel");
        let first = b.load("k");
        b.name_value(first, "k");
        let second = b.load("k_next");
        b.name_value(second, "k");
        let lp = b.counted_loop("i", Operand::symbol("n"));
        let x = b.load_element("A", vec![lp.iv.into()]);
        b.store_element("B", vec![first.into()], x);
        let y = b.load_element("B", vec![second.into()]);
        b.store_element("C", vec![lp.iv.into()], y);
        b.close_loop(&lp);
        let function = b.build();

        assert_eq!(analyze(&function).kind, DependencyKind::ComplexFlow);
    }

    #[test]
    fn test_same_invariant_value_is_one_location() {
        let mut b = FunctionBuilder::new("kernel");
        let k = b.load("k");
        let lp = b.counted_loop("i", Operand::symbol("n"));
        let x = b.load_element("A", vec![lp.iv.into()]);
        b.store_element("B", vec![k.into()], x);
        b.close_loop(&lp);
        let function = b.build();

        let profile = analyze(&function);
        assert_eq!(profile.kind, DependencyKind::Waw);
        assert!(profile.dependent_variables.contains("B"));
    }
}
