//! Algebraic simplification and constant folding.
//!
//! Identity/annihilator rewrites on binary instructions, plus kind-aware
//! constant folding through the `Number` tower. Any rewrite requests a
//! pipeline rerun so downstream users re-examine their definitions.

use crate::cfg::{BlockId, ControlFlowGraph};
use crate::func::IlFunction;
use crate::instr::{ILOpCode, Instruction};
use crate::opt::{OptimizerPass, PassResult};
use crate::value::{IlVarId, Operand};
use crate::visit::{CfgVisitAction, CfgVisitor, traverse_cfg};
use glint_common::Number;
use rustc_hash::FxHashMap;

#[derive(Default)]
pub struct AlgebraicSimplifier {
    /// Known definitions, used to see constants through moves.
    definitions: FxHashMap<IlVarId, Operand>,
    changed: bool,
}

impl AlgebraicSimplifier {
    /// The constant value of an operand, looking through `mov x, imm`.
    fn constant_of(&self, operand: &Operand) -> Option<Number> {
        match operand {
            Operand::Imm(number) => Some(*number),
            Operand::Var(var) => match self.definitions.get(var) {
                Some(Operand::Imm(number)) => Some(*number),
                _ => None,
            },
            _ => None,
        }
    }

    fn same_var(a: &Operand, b: &Operand) -> bool {
        matches!((a, b), (Operand::Var(x), Operand::Var(y)) if x == y)
    }

    /// Try to rewrite one binary instruction; true on change.
    fn simplify_binary(&self, instruction: &mut Instruction) -> bool {
        let Some(result) = instruction.result else {
            return false;
        };
        let (lhs, rhs) = match (instruction.lhs(), instruction.rhs()) {
            (Some(lhs), Some(rhs)) => (*lhs, *rhs),
            _ => return false,
        };
        let lhs_const = self.constant_of(&lhs);
        let rhs_const = self.constant_of(&rhs);

        // Constant fold when both sides are known.
        if let (Some(a), Some(b)) = (lhs_const, rhs_const) {
            if let Some(fold_op) = instruction.opcode.fold_op() {
                if let Some(folded) = Number::fold(a, b, fold_op) {
                    *instruction = Instruction::mov(result, Operand::Imm(folded));
                    return true;
                }
            }
        }

        let rewrite = match instruction.opcode {
            ILOpCode::Add => {
                if rhs_const.is_some_and(|c| c.is_zero()) {
                    Some(Instruction::mov(result, lhs))
                } else if lhs_const.is_some_and(|c| c.is_zero()) {
                    Some(Instruction::mov(result, rhs))
                } else {
                    None
                }
            }
            ILOpCode::Subtract => {
                if Self::same_var(&lhs, &rhs) {
                    Some(Instruction::mov(result, Operand::Imm(Number::I32(0))))
                } else if rhs_const.is_some_and(|c| c.is_zero()) {
                    Some(Instruction::mov(result, lhs))
                } else if lhs_const.is_some_and(|c| c.is_zero()) {
                    Some(Instruction::unary(ILOpCode::Negate, result, rhs))
                } else {
                    None
                }
            }
            ILOpCode::Multiply => {
                if rhs_const.is_some_and(|c| c.is_zero()) || lhs_const.is_some_and(|c| c.is_zero())
                {
                    Some(Instruction::mov(result, Operand::Imm(Number::I32(0))))
                } else if rhs_const.is_some_and(|c| c.is_one()) {
                    Some(Instruction::mov(result, lhs))
                } else if lhs_const.is_some_and(|c| c.is_one()) {
                    Some(Instruction::mov(result, rhs))
                } else if rhs_const.is_some_and(|c| c.is_minus_one()) {
                    Some(Instruction::unary(ILOpCode::Negate, result, lhs))
                } else if lhs_const.is_some_and(|c| c.is_minus_one()) {
                    Some(Instruction::unary(ILOpCode::Negate, result, rhs))
                } else {
                    None
                }
            }
            ILOpCode::Divide => {
                if rhs_const.is_some_and(|c| c.is_one()) {
                    Some(Instruction::mov(result, lhs))
                } else {
                    None
                }
            }
            ILOpCode::BitAnd | ILOpCode::BitOr => {
                if Self::same_var(&lhs, &rhs) {
                    Some(Instruction::mov(result, lhs))
                } else {
                    None
                }
            }
            ILOpCode::BitXor => {
                if Self::same_var(&lhs, &rhs) {
                    Some(Instruction::mov(result, Operand::Imm(Number::I32(0))))
                } else {
                    None
                }
            }
            _ => None,
        };

        match rewrite {
            Some(new_instruction) => {
                *instruction = new_instruction;
                true
            }
            None => false,
        }
    }
}

impl CfgVisitor for AlgebraicSimplifier {
    fn visit(&mut self, block: BlockId, cfg: &mut ControlFlowGraph) -> CfgVisitAction {
        let count = cfg.block(block).instructions.len();
        for index in 0..count {
            let mut instruction = cfg.block(block).instructions[index].clone();
            if instruction.opcode.is_binary() && self.simplify_binary(&mut instruction) {
                cfg.block_mut(block).instructions[index] = instruction.clone();
                self.changed = true;
            }
            // Record the (possibly rewritten) definition.
            if let Some(result) = instruction.result {
                if instruction.opcode == ILOpCode::Move {
                    if let Some(source) = instruction.operands.first() {
                        self.definitions.insert(result, *source);
                    }
                }
            }
        }
        CfgVisitAction::Keep
    }
}

impl OptimizerPass for AlgebraicSimplifier {
    fn name(&self) -> &'static str {
        "AlgebraicSimplifier"
    }

    fn run(&mut self, func: &mut IlFunction) -> PassResult {
        self.changed = false;
        self.definitions.clear();
        traverse_cfg(&mut func.cfg, self);
        if self.changed {
            PassResult::Rerun
        } else {
            PassResult::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_block(instructions: Vec<Instruction>) -> IlFunction {
        let mut cfg = ControlFlowGraph::new();
        let entry = cfg.add_block();
        for instruction in instructions {
            cfg.block_mut(entry).push(instruction);
        }
        IlFunction::new("test", cfg)
    }

    fn run_once(func: &mut IlFunction) -> PassResult {
        AlgebraicSimplifier::default().run(func)
    }

    #[test]
    fn add_zero_becomes_a_move() {
        let x = IlVarId::named(1, 0);
        let t = IlVarId::temp(1);
        let mut func = single_block(vec![Instruction::binary(
            ILOpCode::Add,
            t,
            Operand::Var(x),
            Operand::Imm(Number::I32(0)),
        )]);
        assert_eq!(run_once(&mut func), PassResult::Rerun);
        let instruction = &func.cfg.block(0).instructions[0];
        assert_eq!(instruction.opcode, ILOpCode::Move);
        assert_eq!(instruction.operands[0], Operand::Var(x));
    }

    #[test]
    fn zero_minus_x_negates() {
        let x = IlVarId::named(1, 0);
        let t = IlVarId::temp(1);
        let mut func = single_block(vec![Instruction::binary(
            ILOpCode::Subtract,
            t,
            Operand::Imm(Number::I32(0)),
            Operand::Var(x),
        )]);
        run_once(&mut func);
        assert_eq!(func.cfg.block(0).instructions[0].opcode, ILOpCode::Negate);
    }

    #[test]
    fn x_minus_x_is_zero() {
        let x = IlVarId::named(1, 0);
        let t = IlVarId::temp(1);
        let mut func = single_block(vec![Instruction::binary(
            ILOpCode::Subtract,
            t,
            Operand::Var(x),
            Operand::Var(x),
        )]);
        run_once(&mut func);
        let instruction = &func.cfg.block(0).instructions[0];
        assert_eq!(instruction.opcode, ILOpCode::Move);
        assert!(instruction.operands[0].as_imm().unwrap().is_zero());
    }

    #[test]
    fn mul_identities() {
        let x = IlVarId::named(1, 0);
        let t1 = IlVarId::temp(1);
        let t2 = IlVarId::temp(2);
        let t3 = IlVarId::temp(3);
        let mut func = single_block(vec![
            Instruction::binary(ILOpCode::Multiply, t1, Operand::Var(x), Operand::Imm(Number::I32(1))),
            Instruction::binary(ILOpCode::Multiply, t2, Operand::Var(x), Operand::Imm(Number::I32(0))),
            Instruction::binary(
                ILOpCode::Multiply,
                t3,
                Operand::Var(x),
                Operand::Imm(Number::I32(-1)),
            ),
        ]);
        run_once(&mut func);
        let block = func.cfg.block(0);
        assert_eq!(block.instructions[0].opcode, ILOpCode::Move);
        assert_eq!(block.instructions[0].operands[0], Operand::Var(x));
        assert!(block.instructions[1].operands[0].as_imm().unwrap().is_zero());
        assert_eq!(block.instructions[2].opcode, ILOpCode::Negate);
    }

    #[test]
    fn constant_folding_is_kind_aware() {
        let t = IlVarId::temp(1);
        let mut func = single_block(vec![Instruction::binary(
            ILOpCode::Add,
            t,
            Operand::Imm(Number::U8(250)),
            Operand::Imm(Number::U8(10)),
        )]);
        run_once(&mut func);
        let folded = func.cfg.block(0).instructions[0].operands[0]
            .as_imm()
            .unwrap();
        // Wraps within u8 width.
        assert_eq!(folded, Number::U8(4));
    }

    #[test]
    fn constants_propagate_through_moves() {
        let c = IlVarId::named(1, 0);
        let t = IlVarId::temp(1);
        let mut func = single_block(vec![
            Instruction::mov(c, Operand::Imm(Number::I32(6))),
            Instruction::binary(ILOpCode::Multiply, t, Operand::Var(c), Operand::Imm(Number::I32(7))),
        ]);
        run_once(&mut func);
        let folded = func.cfg.block(0).instructions[1].operands[0]
            .as_imm()
            .unwrap();
        assert_eq!(folded, Number::I32(42));
    }

    #[test]
    fn division_by_zero_is_left_alone() {
        let t = IlVarId::temp(1);
        let mut func = single_block(vec![Instruction::binary(
            ILOpCode::Divide,
            t,
            Operand::Imm(Number::I32(5)),
            Operand::Imm(Number::I32(0)),
        )]);
        assert_eq!(run_once(&mut func), PassResult::None);
        assert_eq!(func.cfg.block(0).instructions[0].opcode, ILOpCode::Divide);
    }
}
