//! Reassociation.
//!
//! Recognizes `+`/`-` chains whose leaves are `base * const` terms (or the
//! base itself, with implicit coefficient 1), extracts the unique base
//! variable, folds the coefficients, and rewrites the whole subtree into a
//! single `base * Σc`. Gated to integer arithmetic; IEEE addition is not
//! associative.

use crate::cfg::{BlockId, ControlFlowGraph};
use crate::func::IlFunction;
use crate::instr::{ILOpCode, Instruction};
use crate::opt::{OptimizerPass, PassResult};
use crate::value::{IlVarId, Operand};
use crate::visit::{CfgVisitAction, CfgVisitor, traverse_cfg};
use glint_common::{Number, numeric::FoldOp};
use rustc_hash::FxHashMap;

#[derive(Default)]
pub struct Reassociate {
    definitions: FxHashMap<IlVarId, Instruction>,
    changed: bool,
}

struct CoefficientItem {
    operand: Operand,
    multiplier: Number,
}

impl Reassociate {
    fn definition_of(&self, operand: &Operand) -> Option<&Instruction> {
        self.definitions.get(&operand.as_var()?)
    }

    /// Find the unique base variable of an add/sub/mul-by-const chain.
    /// Leaves are bare variables or `var * const`; interior nodes are
    /// `+`/`-`.
    fn extract_base(&self, operand: &Operand, base: &mut Option<IlVarId>) -> bool {
        let mut worklist = vec![*operand];
        while let Some(current) = worklist.pop() {
            let definition = self.definition_of(&current);
            let Some(definition) = definition else {
                if let Operand::Var(var) = current {
                    match *base {
                        None => {
                            *base = Some(var);
                            return true;
                        }
                        Some(existing) if existing == var => return true,
                        _ => {}
                    }
                }
                continue;
            };
            match definition.opcode {
                ILOpCode::Multiply => {
                    if let (Some(Operand::Var(var)), Some(Operand::Imm(_))) =
                        (definition.lhs().copied(), definition.rhs().copied())
                    {
                        match *base {
                            None => {
                                *base = Some(var);
                                return true;
                            }
                            Some(existing) if existing == var => return true,
                            _ => {}
                        }
                    }
                }
                ILOpCode::Add | ILOpCode::Subtract => {
                    if let (Some(lhs), Some(rhs)) = (definition.lhs(), definition.rhs()) {
                        worklist.push(*lhs);
                        worklist.push(*rhs);
                    }
                }
                _ => {}
            }
        }
        false
    }

    /// Accumulate the total coefficient of `base` across the chain, folding
    /// signs for subtraction.
    fn extract_coefficient(&self, operand: &Operand, base: IlVarId) -> Option<Number> {
        let mut worklist = vec![CoefficientItem {
            operand: *operand,
            multiplier: Number::I64(1),
        }];
        let mut total = Number::I64(0);
        let mut found = false;

        while let Some(item) = worklist.pop() {
            if let Operand::Var(var) = item.operand {
                if var == base {
                    total = Number::fold(total, item.multiplier, FoldOp::Add)?;
                    found = true;
                    continue;
                }
            }
            let Some(definition) = self.definition_of(&item.operand) else {
                continue;
            };
            match definition.opcode {
                ILOpCode::Multiply => {
                    if let (Some(Operand::Var(var)), Some(Operand::Imm(constant))) =
                        (definition.lhs().copied(), definition.rhs().copied())
                    {
                        if var == base {
                            if !constant.is_integral() {
                                return None;
                            }
                            let term = Number::fold(item.multiplier, constant, FoldOp::Mul)?;
                            total = Number::fold(total, term, FoldOp::Add)?;
                            found = true;
                        }
                    }
                }
                ILOpCode::Add => {
                    if let (Some(lhs), Some(rhs)) = (definition.lhs(), definition.rhs()) {
                        worklist.push(CoefficientItem {
                            operand: *lhs,
                            multiplier: item.multiplier,
                        });
                        worklist.push(CoefficientItem {
                            operand: *rhs,
                            multiplier: item.multiplier,
                        });
                    }
                }
                ILOpCode::Subtract => {
                    if let (Some(lhs), Some(rhs)) = (definition.lhs(), definition.rhs()) {
                        let negated = Number::fold(Number::I64(0), item.multiplier, FoldOp::Sub)?;
                        worklist.push(CoefficientItem {
                            operand: *lhs,
                            multiplier: item.multiplier,
                        });
                        worklist.push(CoefficientItem {
                            operand: *rhs,
                            multiplier: negated,
                        });
                    }
                }
                _ => {}
            }
        }

        found.then_some(total)
    }

    fn try_reassociate(&self, instruction: &mut Instruction) -> bool {
        let is_subtract = instruction.opcode == ILOpCode::Subtract;
        let (Some(lhs), Some(rhs)) = (instruction.lhs().copied(), instruction.rhs().copied())
        else {
            return false;
        };

        let mut base: Option<IlVarId> = None;
        let lhs_has_base = self.extract_base(&lhs, &mut base);
        let rhs_has_base = self.extract_base(&rhs, &mut base);
        if !lhs_has_base && !rhs_has_base {
            return false;
        }
        let Some(base) = base else { return false };

        let Some(lhs_coefficient) = self.extract_coefficient(&lhs, base) else {
            return false;
        };
        let Some(rhs_coefficient) = self.extract_coefficient(&rhs, base) else {
            return false;
        };
        let op = if is_subtract { FoldOp::Sub } else { FoldOp::Add };
        let Some(combined) = Number::fold(lhs_coefficient, rhs_coefficient, op) else {
            return false;
        };
        if !combined.is_integral() {
            return false;
        }
        let Some(result) = instruction.result else {
            return false;
        };

        // Keep the constant in a width matching the chain's terms.
        let combined = combined.convert(glint_common::NumberKind::I32);
        *instruction = Instruction::binary(
            ILOpCode::Multiply,
            result,
            Operand::Var(base),
            Operand::Imm(combined),
        );
        true
    }
}

impl CfgVisitor for Reassociate {
    fn visit(&mut self, block: BlockId, cfg: &mut ControlFlowGraph) -> CfgVisitAction {
        let count = cfg.block(block).instructions.len();
        for index in 0..count {
            let instruction = cfg.block(block).instructions[index].clone();
            if let Some(result) = instruction.result {
                self.definitions.insert(result, instruction.clone());
            }
            if matches!(instruction.opcode, ILOpCode::Add | ILOpCode::Subtract) {
                let mut rewritten = instruction;
                if self.try_reassociate(&mut rewritten) {
                    if let Some(result) = rewritten.result {
                        self.definitions.insert(result, rewritten.clone());
                    }
                    cfg.block_mut(block).instructions[index] = rewritten;
                    self.changed = true;
                }
            }
        }
        CfgVisitAction::Keep
    }
}

impl OptimizerPass for Reassociate {
    fn name(&self) -> &'static str {
        "Reassociate"
    }

    fn run(&mut self, func: &mut IlFunction) -> PassResult {
        self.changed = false;
        self.definitions.clear();
        traverse_cfg(&mut func.cfg, self);
        if self.changed {
            PassResult::Changed
        } else {
            PassResult::None
        }
    }
}
