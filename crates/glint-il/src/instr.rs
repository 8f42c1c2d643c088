//! The instruction set.

use crate::value::{IlVarId, Operand};
use num_enum::TryFromPrimitive;
use smallvec::{SmallVec, smallvec};

/// Opcodes. Encoded as ULEB128 on the wire; the class predicates below drive
/// both the reader's payload layout and the optimizer's pattern matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u64)]
pub enum ILOpCode {
    Noop = 0,
    Return,
    Call,
    Jump,
    JumpZero,
    JumpNotZero,
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Equal,
    NotEqual,
    LogicalAnd,
    LogicalOr,
    Negate,
    LogicalNot,
    BitNot,
    Cast,
    StackAlloc,
    OffsetAddress,
    Load,
    Store,
    LoadParam,
    StoreParam,
    Move,
    Phi,
}

impl ILOpCode {
    #[inline]
    pub const fn is_basic(self) -> bool {
        matches!(self, ILOpCode::Noop)
    }

    #[inline]
    pub const fn is_return(self) -> bool {
        matches!(self, ILOpCode::Return)
    }

    #[inline]
    pub const fn is_call(self) -> bool {
        matches!(self, ILOpCode::Call)
    }

    #[inline]
    pub const fn is_jump(self) -> bool {
        matches!(self, ILOpCode::Jump | ILOpCode::JumpZero | ILOpCode::JumpNotZero)
    }

    #[inline]
    pub const fn is_binary(self) -> bool {
        (self as u64) >= ILOpCode::Add as u64 && (self as u64) <= ILOpCode::LogicalOr as u64
    }

    #[inline]
    pub const fn is_unary(self) -> bool {
        (self as u64) >= ILOpCode::Negate as u64 && (self as u64) <= ILOpCode::Cast as u64
    }

    #[inline]
    pub const fn is_comparison(self) -> bool {
        (self as u64) >= ILOpCode::LessThan as u64 && (self as u64) <= ILOpCode::NotEqual as u64
    }

    /// Operand order does not affect the value.
    #[inline]
    pub const fn is_commutative(self) -> bool {
        matches!(
            self,
            ILOpCode::Add | ILOpCode::Multiply | ILOpCode::BitAnd | ILOpCode::BitOr | ILOpCode::BitXor
        )
    }

    pub fn fold_op(self) -> Option<glint_common::numeric::FoldOp> {
        use glint_common::numeric::FoldOp;
        Some(match self {
            ILOpCode::Add => FoldOp::Add,
            ILOpCode::Subtract => FoldOp::Sub,
            ILOpCode::Multiply => FoldOp::Mul,
            ILOpCode::Divide => FoldOp::Div,
            ILOpCode::Remainder => FoldOp::Rem,
            ILOpCode::BitAnd => FoldOp::And,
            ILOpCode::BitOr => FoldOp::Or,
            ILOpCode::BitXor => FoldOp::Xor,
            ILOpCode::ShiftLeft => FoldOp::Shl,
            ILOpCode::ShiftRight => FoldOp::Shr,
            _ => return None,
        })
    }
}

/// One linear IL instruction: an opcode, its operands, and an optional SSA
/// result.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub opcode: ILOpCode,
    pub operands: SmallVec<[Operand; 2]>,
    pub result: Option<IlVarId>,
}

impl Instruction {
    pub fn new(opcode: ILOpCode, operands: SmallVec<[Operand; 2]>, result: Option<IlVarId>) -> Self {
        Instruction {
            opcode,
            operands,
            result,
        }
    }

    pub fn noop() -> Self {
        Instruction::new(ILOpCode::Noop, smallvec![], None)
    }

    pub fn ret(value: Option<Operand>) -> Self {
        Instruction::new(ILOpCode::Return, value.into_iter().collect(), None)
    }

    pub fn call(dst: IlVarId, func: Operand) -> Self {
        Instruction::new(ILOpCode::Call, smallvec![func], Some(dst))
    }

    pub fn jump(opcode: ILOpCode, label: u64) -> Self {
        debug_assert!(opcode.is_jump());
        Instruction::new(opcode, smallvec![Operand::Label(label)], None)
    }

    pub fn binary(opcode: ILOpCode, dst: IlVarId, lhs: Operand, rhs: Operand) -> Self {
        debug_assert!(opcode.is_binary());
        Instruction::new(opcode, smallvec![lhs, rhs], Some(dst))
    }

    pub fn unary(opcode: ILOpCode, dst: IlVarId, operand: Operand) -> Self {
        debug_assert!(opcode.is_unary());
        Instruction::new(opcode, smallvec![operand], Some(dst))
    }

    pub fn mov(dst: IlVarId, src: Operand) -> Self {
        Instruction::new(ILOpCode::Move, smallvec![src], Some(dst))
    }

    pub fn phi(dst: IlVarId, incoming: impl IntoIterator<Item = Operand>) -> Self {
        Instruction::new(ILOpCode::Phi, incoming.into_iter().collect(), Some(dst))
    }

    pub fn load(dst: IlVarId, address: IlVarId) -> Self {
        Instruction::new(ILOpCode::Load, smallvec![Operand::Var(address)], Some(dst))
    }

    pub fn store(address: IlVarId, value: Operand) -> Self {
        Instruction::new(ILOpCode::Store, smallvec![Operand::Var(address), value], None)
    }

    pub fn load_param(dst: IlVarId, slot: u32) -> Self {
        Instruction::new(
            ILOpCode::LoadParam,
            smallvec![Operand::Var(IlVarId::param(slot))],
            Some(dst),
        )
    }

    pub fn store_param(slot: u32, value: Operand) -> Self {
        Instruction::new(
            ILOpCode::StoreParam,
            smallvec![value, Operand::Var(IlVarId::param(slot))],
            None,
        )
    }

    pub fn stack_alloc(dst: IlVarId, type_id: u32) -> Self {
        Instruction::new(ILOpCode::StackAlloc, smallvec![Operand::Type(type_id)], Some(dst))
    }

    pub fn offset_address(dst: IlVarId, base: IlVarId, type_id: u32, field_id: u32) -> Self {
        Instruction::new(
            ILOpCode::OffsetAddress,
            smallvec![Operand::Var(base), Operand::Field { type_id, field_id }],
            Some(dst),
        )
    }

    /// The left/right operands of a binary instruction.
    pub fn lhs(&self) -> Option<&Operand> {
        self.operands.first()
    }

    pub fn rhs(&self) -> Option<&Operand> {
        self.operands.get(1)
    }

    /// True for instructions whose only effect is producing their result.
    pub fn is_pure(&self) -> bool {
        self.opcode.is_binary()
            || self.opcode.is_unary()
            || matches!(self.opcode, ILOpCode::Move | ILOpCode::OffsetAddress)
    }
}
