//! Whole-pipeline behavior across passes.

use glint_common::Number;
use glint_il::{
    ControlFlowGraph, ILOpCode, IlFunction, IlVarId, Instruction, Operand, optimize,
};

fn single_block(instructions: Vec<Instruction>) -> IlFunction {
    let mut cfg = ControlFlowGraph::new();
    let entry = cfg.add_block();
    for instruction in instructions {
        cfg.block_mut(entry).push(instruction);
    }
    IlFunction::new("test", cfg)
}

/// Follow moves back to the defining instruction of a variable.
fn trace_through_moves(func: &IlFunction, mut var: IlVarId) -> Option<&Instruction> {
    loop {
        let def = func
            .cfg
            .blocks()
            .flat_map(|b| b.instructions.iter())
            .find(|i| i.result == Some(var))?;
        if def.opcode == ILOpCode::Move {
            match def.operands.first() {
                Some(Operand::Var(next)) => {
                    var = *next;
                    continue;
                }
                _ => return Some(def),
            }
        }
        return Some(def);
    }
}

#[test]
fn gvn_and_simplify_cooperate() {
    // t1 = a+b; t2 = a+b; t3 = t1+0; ret t3
    // After the pipeline a single addition feeds the return.
    let a = IlVarId::named(1, 0);
    let b = IlVarId::named(2, 0);
    let t1 = IlVarId::temp(1);
    let t2 = IlVarId::temp(2);
    let t3 = IlVarId::temp(3);
    let mut func = single_block(vec![
        Instruction::binary(ILOpCode::Add, t1, Operand::Var(a), Operand::Var(b)),
        Instruction::binary(ILOpCode::Add, t2, Operand::Var(a), Operand::Var(b)),
        Instruction::binary(ILOpCode::Add, t3, Operand::Var(t2), Operand::Imm(Number::I32(0))),
        Instruction::ret(Some(Operand::Var(t3))),
    ]);
    optimize(&mut func);

    let adds: Vec<&Instruction> = func
        .cfg
        .block(0)
        .instructions
        .iter()
        .filter(|i| i.opcode == ILOpCode::Add)
        .collect();
    assert_eq!(adds.len(), 1, "{:#?}", func.cfg.block(0).instructions);
    assert_eq!(adds[0].result, Some(t1));

    let ret = func
        .cfg
        .block(0)
        .instructions
        .iter()
        .find(|i| i.opcode == ILOpCode::Return)
        .unwrap();
    let returned = ret.operands[0].as_var().unwrap();
    let origin = trace_through_moves(&func, returned).unwrap();
    assert_eq!(origin.result, Some(t1));
}

#[test]
fn reassociation_collapses_coefficient_sums() {
    // t1 = a*2; t2 = a*3; r = t1+t2  →  r = a*5 (one multiply computing r).
    let a = IlVarId::named(1, 0);
    let t1 = IlVarId::temp(1);
    let t2 = IlVarId::temp(2);
    let r = IlVarId::temp(3);
    let mut func = single_block(vec![
        Instruction::binary(ILOpCode::Multiply, t1, Operand::Var(a), Operand::Imm(Number::I32(2))),
        Instruction::binary(ILOpCode::Multiply, t2, Operand::Var(a), Operand::Imm(Number::I32(3))),
        Instruction::binary(ILOpCode::Add, r, Operand::Var(t1), Operand::Var(t2)),
        Instruction::ret(Some(Operand::Var(r))),
    ]);
    optimize(&mut func);

    let def = trace_through_moves(&func, r).unwrap();
    assert_eq!(def.opcode, ILOpCode::Multiply);
    assert_eq!(def.operands[0], Operand::Var(a));
    assert_eq!(def.operands[1].as_imm().unwrap(), Number::I32(5));
}

#[test]
fn constant_chains_fold_to_a_constant() {
    // x = 2+3; y = x*4; ret y  →  ret 20 (through moves).
    let x = IlVarId::temp(1);
    let y = IlVarId::temp(2);
    let mut func = single_block(vec![
        Instruction::binary(ILOpCode::Add, x, Operand::Imm(Number::I32(2)), Operand::Imm(Number::I32(3))),
        Instruction::binary(ILOpCode::Multiply, y, Operand::Var(x), Operand::Imm(Number::I32(4))),
        Instruction::ret(Some(Operand::Var(y))),
    ]);
    optimize(&mut func);

    let def = trace_through_moves(&func, y).unwrap();
    assert_eq!(def.opcode, ILOpCode::Move);
    assert_eq!(def.operands[0].as_imm().unwrap(), Number::I32(20));
}

#[test]
fn pow2_multiplies_leave_as_shifts() {
    let a = IlVarId::named(1, 0);
    let t = IlVarId::temp(1);
    let mut func = single_block(vec![
        Instruction::binary(ILOpCode::Multiply, t, Operand::Var(a), Operand::Imm(Number::U32(8))),
        Instruction::ret(Some(Operand::Var(t))),
    ]);
    optimize(&mut func);
    let def = trace_through_moves(&func, t).unwrap();
    assert_eq!(def.opcode, ILOpCode::ShiftLeft);
}

#[test]
fn pipeline_terminates_on_already_optimal_code() {
    let a = IlVarId::named(1, 0);
    let b = IlVarId::named(2, 0);
    let t = IlVarId::temp(1);
    let original = vec![
        Instruction::binary(ILOpCode::Add, t, Operand::Var(a), Operand::Var(b)),
        Instruction::ret(Some(Operand::Var(t))),
    ];
    let mut func = single_block(original.clone());
    optimize(&mut func);
    assert_eq!(func.cfg.block(0).instructions, original);
}

#[test]
fn optimized_loops_round_trip_through_the_codec() {
    // Optimize a counted loop, then serialize and re-read the linear body.
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
    cfg.block_mut(preheader).push(Instruction::load_param(a, 0));
    cfg.block_mut(preheader)
        .push(Instruction::mov(s0, Operand::Imm(Number::F32(0.0))));
    cfg.block_mut(preheader)
        .push(Instruction::mov(i0, Operand::Imm(Number::I32(0))));
    cfg.block_mut(header)
        .push(Instruction::phi(i_h, [Operand::Var(i0), Operand::Var(i_l)]));
    cfg.block_mut(header)
        .push(Instruction::phi(s_h, [Operand::Var(s0), Operand::Var(s_b)]));
    cfg.block_mut(header).push(Instruction::binary(
        ILOpCode::LessThan,
        t_cmp,
        Operand::Var(i_h),
        Operand::Imm(Number::I32(4)),
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

    let mut func = IlFunction::new("loop", cfg);
    optimize(&mut func);

    // Loop gone, four additions remain.
    assert_eq!(func.cfg.blocks().count(), 1);
    let instructions: Vec<Instruction> = func.cfg.block(0).instructions.clone();
    let adds = instructions
        .iter()
        .filter(|i| i.opcode == ILOpCode::Add)
        .count();
    assert_eq!(adds, 4);

    let bytes = glint_il::codec::encode_instructions(&instructions);
    let decoded = glint_il::codec::decode_instructions(&bytes).unwrap();
    assert_eq!(decoded, instructions);
}
