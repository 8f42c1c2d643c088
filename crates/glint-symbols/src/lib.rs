//! Symbol storage for the Glint compiler.
//!
//! This crate provides:
//! - `SymbolTable` - The name trie with weak-index handles
//! - `Assembly` / `AssemblyCollection` - Compilation outputs and references
//! - The binary assembly codec (magic `GLAS`, version 1)
//! - The process-wide primitive catalog (the full scalar×shape lattice)
//! - Swizzle, array, and pointer managers that synthesize definitions on
//!   demand

pub mod arrays;
pub mod assembly;
pub mod codec;
pub mod metadata;
pub mod pointers;
pub mod primitives;
pub mod swizzle;
pub mod table;

pub use arrays::ArrayManager;
pub use assembly::{
    ARRAY_ASSEMBLY, Assembly, AssemblyCollection, AssemblyError, POINTER_ASSEMBLY,
    SWIZZLE_ASSEMBLY, TARGET_ASSEMBLY,
};
pub use metadata::{ScopeKind, SymbolKind, SymbolMetadata};
pub use pointers::PointerManager;
pub use primitives::{PrimitiveInfo, primitive_info, primitives};
pub use swizzle::SwizzleManager;
pub use table::{ROOT_INDEX, SymbolTable, TableNode};
