//! Arena-based AST model for the Glint compiler.
//!
//! Nodes live in a [`NodeArena`] and reference each other by [`NodeId`];
//! every node stores its parent. Symbol references ([`SymbolRef`]) live in a
//! side table of the arena and are addressed by [`RefId`]. Child enumeration
//! is a match over the node payload, and traversal goes through the visitor
//! in [`visit`], which supports deferral and node replacement.

pub mod arena;
pub mod node;
pub mod operators;
pub mod primitive;
pub mod refs;
pub mod signature;
pub mod visit;

pub use arena::{NodeArena, NodeId, RefId};
pub use node::{
    Access, ExprData, ExprInfo, ExprKind, LazyEval, LiteralValue, Node, NodeData, NodeKind,
};
pub use operators::{Operator, OperatorFlags};
pub use primitive::{PrimitiveClass, PrimitiveKind, primitive_name};
pub use refs::{RefKind, RefState, SymbolRef};
pub use signature::{OverloadKey, SigOwner, render_cast_signature, render_operator_signature};
pub use visit::{AstVisitor, VisitAction, traverse};
