//! Loop unrolling.
//!
//! Applies to outermost counted loops in the canonical shape: a single
//! integer induction variable defined by a header phi whose preheader-side
//! value is a constant move, a header comparison against a constant, one
//! body block, one latch holding the constant-step increment, and one exit.
//! The body is cloned trip-count times into the preheader with the
//! induction variable replaced by its per-iteration constant; every cloned
//! result is re-versioned so SSA holds, and exit-block uses observe the
//! final unrolled values.

use crate::cfg::BlockId;
use crate::func::IlFunction;
use crate::instr::{ILOpCode, Instruction};
use crate::loops::LoopNode;
use crate::opt::{OptimizerPass, PassResult};
use crate::value::{IlVarId, Operand};
use glint_common::{Number, numeric::FoldOp};
use rustc_hash::FxHashMap;
use tracing::debug;

const MAX_TRIP_COUNT: u64 = 16;

#[derive(Default)]
pub struct LoopUnroller {
    var_map: FxHashMap<IlVarId, IlVarId>,
}

struct LoopAnalysis {
    induction_var: IlVarId,
    start: Number,
    step: Number,
    trip_count: u64,
    body: BlockId,
    latch: BlockId,
    exit: BlockId,
}

impl LoopUnroller {
    fn analyze(func: &IlFunction, node: &LoopNode) -> Option<LoopAnalysis> {
        let header = node.header;
        let preheader = node.preheader?;
        // Headers with more than two predecessors are out of scope.
        if func.cfg.block(header).predecessors.len() != 2 {
            return None;
        }
        if node.latches.len() != 1 || node.exits.len() != 1 {
            return None;
        }
        let latch = node.latches[0];
        let exit = node.exits[0];
        // Exactly one body block distinct from header and latch.
        let body = match node
            .blocks
            .iter()
            .copied()
            .filter(|&b| b != header && b != latch)
            .collect::<Vec<_>>()
            .as_slice()
        {
            [single] => *single,
            _ => return None,
        };

        // Induction phi: preheader side must be a constant move.
        let mut induction = None;
        for instruction in &func.cfg.block(header).instructions {
            if instruction.opcode != ILOpCode::Phi {
                continue;
            }
            let Some(Operand::Var(init_var)) = instruction.operands.first().copied() else {
                continue;
            };
            let init = func
                .cfg
                .block(preheader)
                .instructions
                .iter()
                .find(|i| i.result == Some(init_var));
            if let Some(init) = init {
                if init.opcode == ILOpCode::Move {
                    if let Some(Operand::Imm(start)) = init.operands.first().copied() {
                        if start.is_integral() {
                            induction = Some((instruction.result?, start));
                            break;
                        }
                    }
                }
            }
        }
        let (induction_var, start) = induction?;

        // Header comparison against a constant.
        let mut compare = None;
        for instruction in &func.cfg.block(header).instructions {
            if !matches!(
                instruction.opcode,
                ILOpCode::LessThan
                    | ILOpCode::LessThanOrEqual
                    | ILOpCode::GreaterThan
                    | ILOpCode::GreaterThanOrEqual
            ) {
                continue;
            }
            if instruction.lhs().and_then(Operand::as_var) == Some(induction_var) {
                if let Some(Operand::Imm(end)) = instruction.rhs().copied() {
                    compare = Some((instruction.opcode, end));
                    break;
                }
            }
        }
        let (compare_op, end) = compare?;

        // The latch increments by a constant step.
        let step = func
            .cfg
            .block(latch)
            .instructions
            .iter()
            .find_map(|instruction| {
                if instruction.opcode != ILOpCode::Add {
                    return None;
                }
                instruction.rhs().and_then(Operand::as_imm)
            })?;
        if step.is_zero() {
            return None;
        }

        // trip = (end - start) / step, plus one for `<=`.
        let range = Number::fold(end, start, FoldOp::Sub)?;
        let iterations = Number::fold(range, step, FoldOp::Div)?;
        let mut trip_count = iterations.as_u64();
        if compare_op == ILOpCode::LessThanOrEqual || compare_op == ILOpCode::GreaterThanOrEqual {
            trip_count += 1;
        }
        if trip_count == 0 || trip_count > MAX_TRIP_COUNT {
            return None;
        }

        Some(LoopAnalysis {
            induction_var,
            start,
            step,
            trip_count,
            body,
            latch,
            exit,
        })
    }

    fn map_variable(&self, operand: &mut Operand) {
        if let Operand::Var(var) = operand {
            if let Some(&mapped) = self.var_map.get(&var.strip_version()) {
                *operand = Operand::Var(mapped);
            }
        }
    }

    fn map_variable_for_iteration(
        &self,
        analysis: &LoopAnalysis,
        operand: &mut Operand,
        iteration: u64,
    ) {
        if let Operand::Var(var) = operand {
            if *var == analysis.induction_var {
                // start + step * i
                let index = Number::I64(iteration as i64).convert(analysis.step.kind());
                let offset = Number::fold(analysis.step, index, FoldOp::Mul)
                    .unwrap_or(analysis.step);
                let value =
                    Number::fold(analysis.start, offset, FoldOp::Add).unwrap_or(analysis.start);
                *operand = Operand::Imm(value);
                return;
            }
        }
        self.map_variable(operand);
    }

    /// Give a cloned result a fresh version, recording it for later uses.
    fn version_result(&mut self, result: IlVarId) -> IlVarId {
        let canonical = result.strip_version();
        match self.var_map.get(&canonical) {
            None => {
                self.var_map.insert(canonical, result);
                result
            }
            Some(&previous) => {
                let fresh = previous.bump_version();
                self.var_map.insert(canonical, fresh);
                fresh
            }
        }
    }

    fn clone_mapped(
        &mut self,
        analysis: &LoopAnalysis,
        instruction: &Instruction,
        iteration: u64,
    ) -> Instruction {
        let mut cloned = instruction.clone();
        for operand in cloned.operands.iter_mut() {
            self.map_variable_for_iteration(analysis, operand, iteration);
        }
        if let Some(result) = cloned.result {
            cloned.result = Some(self.version_result(result));
        }
        cloned
    }

    fn unroll(&mut self, func: &mut IlFunction, node: &LoopNode, analysis: &LoopAnalysis) -> bool {
        let header = node.header;
        let Some(preheader) = node.preheader else {
            return false;
        };

        self.var_map.clear();
        // Seed each phi's canonical identity with its preheader-side value.
        for instruction in &func.cfg.block(header).instructions {
            if instruction.opcode != ILOpCode::Phi {
                continue;
            }
            if let (Some(result), Some(Operand::Var(init))) =
                (instruction.result, instruction.operands.first().copied())
            {
                self.var_map.insert(result.strip_version(), init);
            }
        }

        for iteration in 0..analysis.trip_count {
            let body: Vec<Instruction> = func.cfg.block(analysis.body).instructions.clone();
            for instruction in &body {
                let cloned = self.clone_mapped(analysis, instruction, iteration);
                func.cfg.block_mut(preheader).push(cloned);
            }
            if iteration + 1 < analysis.trip_count {
                let latch: Vec<Instruction> = func.cfg.block(analysis.latch).instructions.clone();
                for instruction in &latch {
                    if instruction.opcode.is_jump() {
                        continue;
                    }
                    // The induction increment itself is replaced by the
                    // per-iteration constants.
                    if instruction
                        .result
                        .is_some_and(|r| r.strip_version() == analysis.induction_var.strip_version())
                    {
                        continue;
                    }
                    let cloned = self.clone_mapped(analysis, instruction, iteration);
                    func.cfg.block_mut(preheader).push(cloned);
                }
            }
        }

        // Exit-block uses observe the last unrolled values.
        let exit_instructions = &mut func.cfg.block_mut(analysis.exit).instructions;
        let mut remapped = std::mem::take(exit_instructions);
        for instruction in &mut remapped {
            for operand in instruction.operands.iter_mut() {
                self.map_variable(operand);
            }
        }
        func.cfg.block_mut(analysis.exit).instructions = remapped;

        func.cfg.unlink(preheader, header);
        func.cfg.link(preheader, analysis.exit);
        for &block in &node.blocks {
            func.cfg.remove_node(block);
        }
        if func.cfg.block(analysis.exit).predecessors.len() == 1 {
            func.cfg.merge_nodes(preheader, analysis.exit);
        }
        true
    }
}

impl OptimizerPass for LoopUnroller {
    fn name(&self) -> &'static str {
        "LoopUnroller"
    }

    fn run(&mut self, func: &mut IlFunction) -> PassResult {
        let loops = func.loop_tree().clone();
        let mut changed = false;
        for node in loops.nodes() {
            // Only outermost loops.
            if node.depth != 0 {
                continue;
            }
            if let Some(analysis) = Self::analyze(func, node) {
                debug!(
                    header = node.header,
                    trip_count = analysis.trip_count,
                    "unrolling loop"
                );
                if self.unroll(func, node, &analysis) {
                    changed = true;
                }
            }
        }
        if changed {
            func.invalidate_analyses();
            PassResult::Changed
        } else {
            PassResult::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::ControlFlowGraph;

    /// Build `s = 0; for (i = 0; i < n; i++) s += a;` in the canonical
    /// lowering shape and return (func, vars).
    fn counted_loop(n: i32, op: ILOpCode) -> (IlFunction, IlVarId, IlVarId, IlVarId) {
        let a = IlVarId::named(1, 0);
        let s0 = IlVarId::named(2, 0);
        let i0 = IlVarId::named(3, 0);
        let s_h = s0.bump_version();
        let i_h = i0.bump_version();
        let s_b = s_h.bump_version();
        let i_l = i_h.bump_version();
        let t_cmp = IlVarId::temp(1);

        let mut cfg = ControlFlowGraph::new();
        let preheader = cfg.add_block();
        let header = cfg.add_block();
        let body = cfg.add_block();
        let latch = cfg.add_block();
        let exit = cfg.add_block();
        cfg.link(preheader, header);
        cfg.link(header, body);
        cfg.link(header, exit);
        cfg.link(body, latch);
        cfg.link(latch, header);

        cfg.block_mut(preheader)
            .push(Instruction::load_param(a, 0));
        cfg.block_mut(preheader)
            .push(Instruction::mov(s0, Operand::Imm(Number::F32(0.0))));
        cfg.block_mut(preheader)
            .push(Instruction::mov(i0, Operand::Imm(Number::I32(0))));

        cfg.block_mut(header)
            .push(Instruction::phi(i_h, [Operand::Var(i0), Operand::Var(i_l)]));
        cfg.block_mut(header)
            .push(Instruction::phi(s_h, [Operand::Var(s0), Operand::Var(s_b)]));
        cfg.block_mut(header).push(Instruction::binary(
            op,
            t_cmp,
            Operand::Var(i_h),
            Operand::Imm(Number::I32(n)),
        ));
        cfg.block_mut(header)
            .push(Instruction::jump(ILOpCode::JumpZero, exit as u64));

        cfg.block_mut(body).push(Instruction::binary(
            ILOpCode::Add,
            s_b,
            Operand::Var(s_h),
            Operand::Var(a),
        ));

        cfg.block_mut(latch).push(Instruction::binary(
            ILOpCode::Add,
            i_l,
            Operand::Var(i_h),
            Operand::Imm(Number::I32(1)),
        ));
        cfg.block_mut(latch)
            .push(Instruction::jump(ILOpCode::Jump, header as u64));

        cfg.block_mut(exit)
            .push(Instruction::ret(Some(Operand::Var(s_h))));

        (IlFunction::new("loop", cfg), a, s0, s_h)
    }

    #[test]
    fn unrolls_a_four_iteration_loop() {
        let (mut func, a, _s0, _s_h) = counted_loop(4, ILOpCode::LessThan);
        let mut pass = LoopUnroller::default();
        assert_eq!(pass.run(&mut func), PassResult::Changed);

        // The loop blocks are gone; preheader merged with the exit.
        let alive: Vec<_> = func.cfg.block_ids().collect();
        assert_eq!(alive, vec![0]);

        // Four materialized additions of `a`.
        let adds: Vec<&Instruction> = func.cfg.block(0).instructions.iter()
            .filter(|i| i.opcode == ILOpCode::Add)
            .collect();
        assert_eq!(adds.len(), 4);
        for add in &adds {
            assert_eq!(add.rhs().and_then(Operand::as_var), Some(a));
        }

        // The return reads the fourth unrolled version of s.
        let ret = func
            .cfg
            .block(0)
            .instructions
            .iter()
            .find(|i| i.opcode == ILOpCode::Return)
            .unwrap();
        let returned = ret.operands[0].as_var().unwrap();
        assert_eq!(returned, adds[3].result.unwrap());

        assert!(func.is_ssa());
        assert!(func.cfg.edges_consistent());
    }

    #[test]
    fn le_comparison_adds_one_iteration() {
        let (mut func, _, _, _) = counted_loop(3, ILOpCode::LessThanOrEqual);
        let mut pass = LoopUnroller::default();
        assert_eq!(pass.run(&mut func), PassResult::Changed);
        let adds = func
            .cfg
            .block(0)
            .instructions
            .iter()
            .filter(|i| i.opcode == ILOpCode::Add)
            .count();
        assert_eq!(adds, 4);
    }

    #[test]
    fn trip_counts_above_the_limit_are_skipped() {
        let (mut func, _, _, _) = counted_loop(17, ILOpCode::LessThan);
        let mut pass = LoopUnroller::default();
        assert_eq!(pass.run(&mut func), PassResult::None);
        assert_eq!(func.cfg.blocks().count(), 5);
    }

    #[test]
    fn zero_trip_loops_are_skipped() {
        let (mut func, _, _, _) = counted_loop(0, ILOpCode::LessThan);
        let mut pass = LoopUnroller::default();
        assert_eq!(pass.run(&mut func), PassResult::None);
    }

    #[test]
    fn observable_sum_matches_the_rolled_loop() {
        // With a = 1.0 the rolled loop computes s = n for any n ≤ 16; the
        // unrolled body must chain n additions from s0 through the returned
        // version.
        for n in 1..=16 {
            let (mut func, a, s0, _) = counted_loop(n, ILOpCode::LessThan);
            let mut pass = LoopUnroller::default();
            assert_eq!(pass.run(&mut func), PassResult::Changed, "n = {n}");

            let block = func.cfg.block(0);
            let adds: Vec<&Instruction> = block
                .instructions
                .iter()
                .filter(|i| i.opcode == ILOpCode::Add)
                .collect();
            assert_eq!(adds.len(), n as usize);

            // The chain folds left: first add reads s0, each next reads the
            // previous result, all add `a`.
            let mut expected = s0;
            for add in &adds {
                assert_eq!(add.lhs().and_then(Operand::as_var), Some(expected));
                assert_eq!(add.rhs().and_then(Operand::as_var), Some(a));
                expected = add.result.unwrap();
            }
            let ret = block
                .instructions
                .iter()
                .find(|i| i.opcode == ILOpCode::Return)
                .unwrap();
            assert_eq!(ret.operands[0].as_var(), Some(expected));
        }
    }

    #[test]
    fn header_with_extra_predecessors_is_skipped() {
        let (mut func, _, _, _) = counted_loop(4, ILOpCode::LessThan);
        // Add a second entry edge into the header.
        let stray = func.cfg.add_block();
        func.cfg.link(stray, 1);
        func.invalidate_analyses();
        let mut pass = LoopUnroller::default();
        assert_eq!(pass.run(&mut func), PassResult::None);
    }
}
