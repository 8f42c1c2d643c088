//! The Glint intermediate language.
//!
//! Functions lower to a control-flow graph of basic blocks holding linear
//! SSA instructions. Variables are versioned (`IlVarId` packs base, version,
//! and tag); phi instructions reconcile versions at join points. The
//! optimizer pipeline runs a fixed set of passes under a change-tracking
//! scheduler, and the binary codec serializes instructions with ULEB128
//! opcodes and little-endian payloads.

pub mod cfg;
pub mod codec;
pub mod dom;
pub mod func;
pub mod instr;
pub mod loops;
pub mod lower;
pub mod metadata;
pub mod opt;
pub mod value;
pub mod visit;

pub use cfg::{BasicBlock, BlockId, ControlFlowGraph};
pub use codec::{DecodeError, IlReader, IlWriter};
pub use dom::DominatorTree;
pub use func::IlFunction;
pub use instr::{ILOpCode, Instruction};
pub use loops::{LoopNode, LoopTree};
pub use lower::{LowerError, SymbolNames, lower_function};
pub use metadata::IlMetadata;
pub use opt::{OptimizerPass, PassResult, optimize};
pub use value::{IlVarId, OpKind, Operand};
pub use visit::{CfgVisitAction, CfgVisitor, traverse_cfg};
