//! The IL binary codec.
//!
//! Opcodes are ULEB128; payload layout is fixed per instruction class. All
//! multi-byte payloads are little-endian. Binary instructions pack both
//! operand kinds into one byte (`lhs | rhs << 4`); Store/LoadParam/
//! StoreParam/Move/Return carry explicit kind bytes. Unknown opcodes are a
//! hard decode error.

use crate::instr::{ILOpCode, Instruction};
use crate::value::{IlVarId, OP_KIND_BITS, OP_KIND_MASK, OpKind, Operand};
use glint_common::Number;
use smallvec::smallvec;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown opcode {0}")]
    UnknownOpcode(u64),
    #[error("unknown operand kind {0}")]
    UnknownOperandKind(u8),
    #[error("operand kind {0:?} not valid here")]
    UnexpectedOperand(OpKind),
    #[error("unexpected end of stream")]
    UnexpectedEof,
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct IlWriter {
    out: Vec<u8>,
}

impl IlWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.out
    }

    pub fn len(&self) -> usize {
        self.out.len()
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    fn byte(&mut self, value: u8) {
        self.out.push(value);
    }

    fn encode_opcode(&mut self, opcode: ILOpCode) {
        let mut value = opcode as u64;
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            self.byte(byte);
            if value == 0 {
                break;
            }
        }
    }

    fn encode_var_id(&mut self, var: IlVarId) {
        self.out.extend_from_slice(&var.0.to_le_bytes());
    }

    fn encode_immediate(&mut self, imm: &Number) {
        match *imm {
            Number::I8(v) => self.byte(v as u8),
            Number::U8(v) => self.byte(v),
            Number::I16(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            Number::U16(v) | Number::F16(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            Number::I32(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            Number::U32(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            Number::F32(v) => self.out.extend_from_slice(&v.to_bits().to_le_bytes()),
            Number::I64(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            Number::U64(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            Number::F64(v) => self.out.extend_from_slice(&v.to_bits().to_le_bytes()),
        }
    }

    fn encode_operand(&mut self, operand: &Operand) {
        match operand {
            Operand::Var(var) => self.encode_var_id(*var),
            Operand::Imm(imm) => self.encode_immediate(imm),
            Operand::Label(value) => self.out.extend_from_slice(&value.to_le_bytes()),
            Operand::Type(id) => self.out.extend_from_slice(&id.to_le_bytes()),
            Operand::Func(id) => self.out.extend_from_slice(&id.to_le_bytes()),
            Operand::Field { type_id, field_id } => {
                self.out.extend_from_slice(&field_id.to_le_bytes());
                self.out.extend_from_slice(&type_id.to_le_bytes());
            }
        }
    }

    fn packed_kinds(lhs: OpKind, rhs: OpKind) -> u8 {
        debug_assert!((lhs as u8) <= OP_KIND_MASK && (rhs as u8) <= OP_KIND_MASK);
        (lhs as u8) | ((rhs as u8) << OP_KIND_BITS)
    }

    pub fn write(&mut self, instruction: &Instruction) {
        let opcode = instruction.opcode;
        self.encode_opcode(opcode);

        if opcode.is_basic() {
            return;
        }
        if opcode.is_return() {
            match instruction.operands.first() {
                Some(value) => {
                    self.byte(value.kind() as u8);
                    self.encode_operand(value);
                }
                None => self.byte(OpKind::Disabled as u8),
            }
            return;
        }
        if opcode.is_call() {
            if let Some(func) = instruction.operands.first() {
                self.encode_operand(func);
            }
            self.encode_var_id(instruction.result.unwrap_or(IlVarId::INVALID));
            return;
        }
        if opcode.is_jump() {
            if let Some(label) = instruction.operands.first() {
                self.encode_operand(label);
            }
            return;
        }
        if opcode.is_binary() {
            let lhs = &instruction.operands[0];
            let rhs = &instruction.operands[1];
            self.byte(Self::packed_kinds(lhs.kind(), rhs.kind()));
            self.encode_operand(lhs);
            self.encode_operand(rhs);
            self.encode_var_id(instruction.result.unwrap_or(IlVarId::INVALID));
            return;
        }
        if opcode.is_unary() {
            let operand = &instruction.operands[0];
            self.byte(operand.kind() as u8);
            self.encode_operand(operand);
            self.encode_var_id(instruction.result.unwrap_or(IlVarId::INVALID));
            return;
        }
        match opcode {
            ILOpCode::StackAlloc => {
                self.encode_operand(&instruction.operands[0]);
                self.encode_var_id(instruction.result.unwrap_or(IlVarId::INVALID));
            }
            ILOpCode::OffsetAddress => {
                self.encode_operand(&instruction.operands[0]);
                self.encode_operand(&instruction.operands[1]);
                self.encode_var_id(instruction.result.unwrap_or(IlVarId::INVALID));
            }
            ILOpCode::Load => {
                self.encode_operand(&instruction.operands[0]);
                self.encode_var_id(instruction.result.unwrap_or(IlVarId::INVALID));
            }
            ILOpCode::Store => {
                // Destination address, then the kinded source.
                let dst = &instruction.operands[0];
                let src = &instruction.operands[1];
                self.byte(src.kind() as u8);
                self.encode_operand(dst);
                self.encode_operand(src);
            }
            ILOpCode::LoadParam => {
                let src = &instruction.operands[0];
                self.byte(src.kind() as u8);
                self.encode_operand(src);
                self.encode_var_id(instruction.result.unwrap_or(IlVarId::INVALID));
            }
            ILOpCode::StoreParam => {
                let src = &instruction.operands[0];
                let dst = &instruction.operands[1];
                self.byte(Self::packed_kinds(src.kind(), dst.kind()));
                self.encode_operand(src);
                self.encode_operand(dst);
            }
            ILOpCode::Move => {
                let src = &instruction.operands[0];
                self.byte(src.kind() as u8);
                self.encode_operand(src);
                self.encode_var_id(instruction.result.unwrap_or(IlVarId::INVALID));
            }
            ILOpCode::Phi => {
                self.byte(instruction.operands.len() as u8);
                for operand in &instruction.operands {
                    self.byte(operand.kind() as u8);
                    self.encode_operand(operand);
                }
                self.encode_var_id(instruction.result.unwrap_or(IlVarId::INVALID));
            }
            _ => unreachable!("handled by class predicates"),
        }
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct IlReader<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> IlReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        IlReader { input, pos: 0 }
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn byte(&mut self) -> Result<u8, DecodeError> {
        let value = *self.input.get(self.pos).ok_or(DecodeError::UnexpectedEof)?;
        self.pos += 1;
        Ok(value)
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        if self.pos + N > self.input.len() {
            return Err(DecodeError::UnexpectedEof);
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.input[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    fn decode_opcode(&mut self) -> Result<ILOpCode, DecodeError> {
        let mut value: u64 = 0;
        let mut shift = 0;
        loop {
            let byte = self.byte()?;
            value |= u64::from(byte & 0x7F) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                break;
            }
        }
        ILOpCode::try_from(value).map_err(|_| DecodeError::UnknownOpcode(value))
    }

    fn decode_var_id(&mut self) -> Result<IlVarId, DecodeError> {
        Ok(IlVarId(u64::from_le_bytes(self.take::<8>()?)))
    }

    fn decode_kind(&mut self) -> Result<OpKind, DecodeError> {
        let raw = self.byte()?;
        OpKind::try_from(raw).map_err(|_| DecodeError::UnknownOperandKind(raw))
    }

    fn decode_operand(&mut self, kind: OpKind) -> Result<Operand, DecodeError> {
        Ok(match kind {
            OpKind::Variable => Operand::Var(self.decode_var_id()?),
            OpKind::ImmU8 => Operand::Imm(Number::U8(self.byte()?)),
            OpKind::ImmI8 => Operand::Imm(Number::I8(self.byte()? as i8)),
            OpKind::ImmU16 => Operand::Imm(Number::U16(u16::from_le_bytes(self.take::<2>()?))),
            OpKind::ImmI16 => Operand::Imm(Number::I16(i16::from_le_bytes(self.take::<2>()?))),
            // Half floats transit as their raw 16 bits.
            OpKind::ImmF16 => Operand::Imm(Number::F16(u16::from_le_bytes(self.take::<2>()?))),
            OpKind::ImmU32 => Operand::Imm(Number::U32(u32::from_le_bytes(self.take::<4>()?))),
            OpKind::ImmI32 => Operand::Imm(Number::I32(i32::from_le_bytes(self.take::<4>()?))),
            OpKind::ImmF32 => Operand::Imm(Number::F32(f32::from_bits(u32::from_le_bytes(
                self.take::<4>()?,
            )))),
            OpKind::ImmU64 => Operand::Imm(Number::U64(u64::from_le_bytes(self.take::<8>()?))),
            OpKind::ImmI64 => Operand::Imm(Number::I64(i64::from_le_bytes(self.take::<8>()?))),
            OpKind::ImmF64 => Operand::Imm(Number::F64(f64::from_bits(u64::from_le_bytes(
                self.take::<8>()?,
            )))),
            OpKind::Label => Operand::Label(u64::from_le_bytes(self.take::<8>()?)),
            OpKind::Type => Operand::Type(u32::from_le_bytes(self.take::<4>()?)),
            OpKind::Function => Operand::Func(u32::from_le_bytes(self.take::<4>()?)),
            OpKind::Field => {
                let field_id = u32::from_le_bytes(self.take::<4>()?);
                let type_id = u32::from_le_bytes(self.take::<4>()?);
                Operand::Field { type_id, field_id }
            }
            OpKind::Disabled => return Err(DecodeError::UnexpectedOperand(OpKind::Disabled)),
        })
    }

    pub fn read(&mut self) -> Result<Instruction, DecodeError> {
        let opcode = self.decode_opcode()?;

        if opcode.is_basic() {
            return Ok(Instruction::new(opcode, smallvec![], None));
        }
        if opcode.is_return() {
            let kind = self.decode_kind()?;
            let value = if kind == OpKind::Disabled {
                None
            } else {
                Some(self.decode_operand(kind)?)
            };
            return Ok(Instruction::ret(value));
        }
        if opcode.is_call() {
            let func = self.decode_operand(OpKind::Function)?;
            let dst = self.decode_var_id()?;
            return Ok(Instruction::call(dst, func));
        }
        if opcode.is_jump() {
            let label = self.decode_operand(OpKind::Label)?;
            return Ok(Instruction::new(opcode, smallvec![label], None));
        }
        if opcode.is_binary() {
            let packed = self.byte()?;
            let lhs_kind = OpKind::try_from(packed & OP_KIND_MASK)
                .map_err(|_| DecodeError::UnknownOperandKind(packed & OP_KIND_MASK))?;
            let rhs_kind = OpKind::try_from((packed >> OP_KIND_BITS) & OP_KIND_MASK)
                .map_err(|_| DecodeError::UnknownOperandKind(packed >> OP_KIND_BITS))?;
            let lhs = self.decode_operand(lhs_kind)?;
            let rhs = self.decode_operand(rhs_kind)?;
            let dst = self.decode_var_id()?;
            return Ok(Instruction::binary(opcode, dst, lhs, rhs));
        }
        if opcode.is_unary() {
            let kind = self.decode_kind()?;
            let operand = self.decode_operand(kind)?;
            let dst = self.decode_var_id()?;
            return Ok(Instruction::unary(opcode, dst, operand));
        }
        match opcode {
            ILOpCode::StackAlloc => {
                let ty = self.decode_operand(OpKind::Type)?;
                let dst = self.decode_var_id()?;
                Ok(Instruction::new(opcode, smallvec![ty], Some(dst)))
            }
            ILOpCode::OffsetAddress => {
                let src = self.decode_operand(OpKind::Variable)?;
                let field = self.decode_operand(OpKind::Field)?;
                let dst = self.decode_var_id()?;
                Ok(Instruction::new(opcode, smallvec![src, field], Some(dst)))
            }
            ILOpCode::Load => {
                let src = self.decode_operand(OpKind::Variable)?;
                let dst = self.decode_var_id()?;
                Ok(Instruction::new(opcode, smallvec![src], Some(dst)))
            }
            ILOpCode::Store => {
                let src_kind = self.decode_kind()?;
                let dst = self.decode_operand(OpKind::Variable)?;
                let src = self.decode_operand(src_kind)?;
                Ok(Instruction::new(opcode, smallvec![dst, src], None))
            }
            ILOpCode::LoadParam => {
                let src_kind = self.decode_kind()?;
                let src = self.decode_operand(src_kind)?;
                let dst = self.decode_var_id()?;
                Ok(Instruction::new(opcode, smallvec![src], Some(dst)))
            }
            ILOpCode::StoreParam => {
                let packed = self.byte()?;
                let src_kind = OpKind::try_from(packed & OP_KIND_MASK)
                    .map_err(|_| DecodeError::UnknownOperandKind(packed & OP_KIND_MASK))?;
                let dst_kind = OpKind::try_from((packed >> OP_KIND_BITS) & OP_KIND_MASK)
                    .map_err(|_| DecodeError::UnknownOperandKind(packed >> OP_KIND_BITS))?;
                let src = self.decode_operand(src_kind)?;
                let dst = self.decode_operand(dst_kind)?;
                Ok(Instruction::new(opcode, smallvec![src, dst], None))
            }
            ILOpCode::Move => {
                let src_kind = self.decode_kind()?;
                let src = self.decode_operand(src_kind)?;
                let dst = self.decode_var_id()?;
                Ok(Instruction::mov(dst, src))
            }
            ILOpCode::Phi => {
                let count = self.byte()? as usize;
                let mut operands = smallvec![];
                for _ in 0..count {
                    let kind = self.decode_kind()?;
                    operands.push(self.decode_operand(kind)?);
                }
                let dst = self.decode_var_id()?;
                Ok(Instruction::new(opcode, operands, Some(dst)))
            }
            _ => Err(DecodeError::UnknownOpcode(opcode as u64)),
        }
    }
}

/// Serialize a whole function body: instruction count, then instructions,
/// with block boundaries marked by label moves is left to the caller; the
/// linear form is enough for the assembly container.
pub fn encode_instructions(instructions: &[Instruction]) -> Vec<u8> {
    let mut writer = IlWriter::new();
    for instruction in instructions {
        writer.write(instruction);
    }
    writer.into_bytes()
}

pub fn decode_instructions(bytes: &[u8]) -> Result<Vec<Instruction>, DecodeError> {
    let mut reader = IlReader::new(bytes);
    let mut out = Vec::new();
    while !reader.is_at_end() {
        out.push(reader.read()?);
    }
    Ok(out)
}
