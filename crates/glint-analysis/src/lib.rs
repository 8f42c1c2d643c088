//! Semantic analysis for the Glint compiler.
//!
//! Three passes over the arena AST, in order:
//! - `collect` - insert every declared symbol under its lexical scope
//! - `resolve` - bind every symbol reference (scopes, namespaces, usings,
//!   referenced assemblies; member chains with deferral; swizzle synthesis)
//! - `check` - bottom-up type inference, operator/overload selection,
//!   implicit-cast insertion

pub mod check;
pub mod collect;
pub mod resolve;
pub mod scopes;
pub mod testing;

pub use check::{TypeChecker, check};
pub use collect::{SymbolCollector, collect};
pub use resolve::{SymbolResolver, kind_accepts, resolve, resolve_external};
pub use scopes::{ScopeFrame, ScopeStack};
