//! Strength reduction.
//!
//! Multiplies by power-of-two integer constants become shifts (safe for
//! signed and unsigned under two's-complement wrapping); divides and
//! remainders reduce only for unsigned operands, where `x / 2^k` is a
//! logical shift and `x % 2^k` is a mask.

use crate::cfg::{BlockId, ControlFlowGraph};
use crate::func::IlFunction;
use crate::instr::{ILOpCode, Instruction};
use crate::opt::{OptimizerPass, PassResult};
use crate::value::Operand;
use crate::visit::{CfgVisitAction, CfgVisitor, traverse_cfg};
use glint_common::{Number, numeric::FoldOp};

#[derive(Default)]
pub struct StrengthReduction {
    changed: bool,
}

impl StrengthReduction {
    fn reduce(instruction: &mut Instruction) -> bool {
        let Some(result) = instruction.result else {
            return false;
        };
        let (Some(lhs), Some(rhs)) = (instruction.lhs().copied(), instruction.rhs().copied())
        else {
            return false;
        };

        match instruction.opcode {
            ILOpCode::Multiply => {
                // Normalize the constant onto the right.
                let (value, constant) = match (lhs, rhs) {
                    (value, Operand::Imm(c)) => (value, c),
                    (Operand::Imm(c), value) => (value, c),
                    _ => return false,
                };
                if !constant.is_power_of_two() {
                    return false;
                }
                let shift = constant.trailing_zeros();
                *instruction = Instruction::binary(
                    ILOpCode::ShiftLeft,
                    result,
                    value,
                    Operand::Imm(Number::U32(shift)),
                );
                true
            }
            ILOpCode::Divide => {
                let Operand::Imm(constant) = rhs else {
                    return false;
                };
                // Signed division by a power of two rounds toward zero;
                // an arithmetic shift rounds toward negative infinity.
                if !constant.is_power_of_two() || constant.kind().is_signed() {
                    return false;
                }
                let shift = constant.trailing_zeros();
                *instruction = Instruction::binary(
                    ILOpCode::ShiftRight,
                    result,
                    lhs,
                    Operand::Imm(Number::U32(shift)),
                );
                true
            }
            ILOpCode::Remainder => {
                let Operand::Imm(constant) = rhs else {
                    return false;
                };
                if !constant.is_power_of_two() || constant.kind().is_signed() {
                    return false;
                }
                let mask = Number::fold(
                    constant,
                    Number::U64(1).convert(constant.kind()),
                    FoldOp::Sub,
                )
                .unwrap_or(Number::U64(0));
                *instruction =
                    Instruction::binary(ILOpCode::BitAnd, result, lhs, Operand::Imm(mask));
                true
            }
            _ => false,
        }
    }
}

impl CfgVisitor for StrengthReduction {
    fn visit(&mut self, block: BlockId, cfg: &mut ControlFlowGraph) -> CfgVisitAction {
        let count = cfg.block(block).instructions.len();
        for index in 0..count {
            let mut instruction = cfg.block(block).instructions[index].clone();
            if matches!(
                instruction.opcode,
                ILOpCode::Multiply | ILOpCode::Divide | ILOpCode::Remainder
            ) && Self::reduce(&mut instruction)
            {
                cfg.block_mut(block).instructions[index] = instruction;
                self.changed = true;
            }
        }
        CfgVisitAction::Keep
    }
}

impl OptimizerPass for StrengthReduction {
    fn name(&self) -> &'static str {
        "StrengthReduction"
    }

    fn run(&mut self, func: &mut IlFunction) -> PassResult {
        self.changed = false;
        traverse_cfg(&mut func.cfg, self);
        if self.changed {
            PassResult::Changed
        } else {
            PassResult::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::IlVarId;

    fn single(instruction: Instruction) -> IlFunction {
        let mut cfg = ControlFlowGraph::new();
        let entry = cfg.add_block();
        cfg.block_mut(entry).push(instruction);
        IlFunction::new("test", cfg)
    }

    #[test]
    fn pow2_multiply_becomes_shift() {
        let x = IlVarId::named(1, 0);
        let t = IlVarId::temp(1);
        let mut func = single(Instruction::binary(
            ILOpCode::Multiply,
            t,
            Operand::Var(x),
            Operand::Imm(Number::U32(8)),
        ));
        assert_eq!(StrengthReduction::default().run(&mut func), PassResult::Changed);
        let instruction = &func.cfg.block(0).instructions[0];
        assert_eq!(instruction.opcode, ILOpCode::ShiftLeft);
        assert_eq!(instruction.operands[1].as_imm().unwrap(), Number::U32(3));
    }

    #[test]
    fn unsigned_divide_becomes_logical_shift() {
        let x = IlVarId::named(1, 0);
        let t = IlVarId::temp(1);
        let mut func = single(Instruction::binary(
            ILOpCode::Divide,
            t,
            Operand::Var(x),
            Operand::Imm(Number::U32(16)),
        ));
        StrengthReduction::default().run(&mut func);
        let instruction = &func.cfg.block(0).instructions[0];
        assert_eq!(instruction.opcode, ILOpCode::ShiftRight);
        assert_eq!(instruction.operands[1].as_imm().unwrap(), Number::U32(4));
    }

    #[test]
    fn signed_divide_is_left_alone() {
        let x = IlVarId::named(1, 0);
        let t = IlVarId::temp(1);
        let mut func = single(Instruction::binary(
            ILOpCode::Divide,
            t,
            Operand::Var(x),
            Operand::Imm(Number::I32(16)),
        ));
        assert_eq!(StrengthReduction::default().run(&mut func), PassResult::None);
        assert_eq!(func.cfg.block(0).instructions[0].opcode, ILOpCode::Divide);
    }

    #[test]
    fn unsigned_remainder_becomes_mask() {
        let x = IlVarId::named(1, 0);
        let t = IlVarId::temp(1);
        let mut func = single(Instruction::binary(
            ILOpCode::Remainder,
            t,
            Operand::Var(x),
            Operand::Imm(Number::U32(8)),
        ));
        StrengthReduction::default().run(&mut func);
        let instruction = &func.cfg.block(0).instructions[0];
        assert_eq!(instruction.opcode, ILOpCode::BitAnd);
        assert_eq!(instruction.operands[1].as_imm().unwrap(), Number::U32(7));
    }

    #[test]
    fn non_pow2_and_float_constants_are_skipped() {
        let x = IlVarId::named(1, 0);
        let t = IlVarId::temp(1);
        let mut func = single(Instruction::binary(
            ILOpCode::Multiply,
            t,
            Operand::Var(x),
            Operand::Imm(Number::I32(6)),
        ));
        assert_eq!(StrengthReduction::default().run(&mut func), PassResult::None);

        let mut func = single(Instruction::binary(
            ILOpCode::Multiply,
            t,
            Operand::Var(x),
            Operand::Imm(Number::F32(4.0)),
        ));
        assert_eq!(StrengthReduction::default().run(&mut func), PassResult::None);
    }
}
