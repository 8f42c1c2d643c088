//! Weak-index handles into symbol tables.
//!
//! A symbol table stores each node's index in a shared `Arc<AtomicUsize>`
//! cell. Swap-removal rewrites the moved node's cell, so every handle handed
//! out earlier keeps resolving to the right node; handles to removed nodes
//! observe a dropped cell and report invalid.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Identifies an assembly within an [`AssemblyRegistry`], which owns the
/// symbol table a handle points into.
///
/// [`AssemblyRegistry`]: https://docs.rs/glint-symbols
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AssemblyId(pub u32);

impl AssemblyId {
    /// The process-wide primitive assembly is always registered first.
    pub const PRIMITIVES: AssemblyId = AssemblyId(0);
}

/// The shared index cell owned by a table node.
pub type IndexCell = Arc<AtomicUsize>;

/// Weak reference to a symbol-table node that stays valid across
/// swap-removes of *other* nodes.
#[derive(Clone, Debug, Default)]
pub struct SymbolHandle {
    assembly: Option<AssemblyId>,
    cell: Weak<AtomicUsize>,
}

impl SymbolHandle {
    pub fn new(assembly: AssemblyId, cell: &IndexCell) -> Self {
        SymbolHandle {
            assembly: Some(assembly),
            cell: Arc::downgrade(cell),
        }
    }

    /// A handle that never resolves. `Insert` returns this on redefinition.
    pub fn invalid() -> Self {
        SymbolHandle::default()
    }

    pub fn is_valid(&self) -> bool {
        self.cell.strong_count() > 0
    }

    pub fn assembly(&self) -> Option<AssemblyId> {
        if self.is_valid() { self.assembly } else { None }
    }

    /// Current node index, or `None` once the node has been removed.
    pub fn index(&self) -> Option<usize> {
        self.cell.upgrade().map(|c| c.load(Ordering::Acquire))
    }
}

impl PartialEq for SymbolHandle {
    fn eq(&self, other: &Self) -> bool {
        self.assembly == other.assembly && self.index() == other.index() && self.is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_tracks_cell_updates() {
        let cell: IndexCell = Arc::new(AtomicUsize::new(3));
        let handle = SymbolHandle::new(AssemblyId(1), &cell);
        assert_eq!(handle.index(), Some(3));
        cell.store(7, Ordering::Release);
        assert_eq!(handle.index(), Some(7));
    }

    #[test]
    fn handle_invalidates_when_cell_drops() {
        let cell: IndexCell = Arc::new(AtomicUsize::new(0));
        let handle = SymbolHandle::new(AssemblyId(0), &cell);
        drop(cell);
        assert!(!handle.is_valid());
        assert_eq!(handle.index(), None);
        assert_eq!(handle.assembly(), None);
    }

    #[test]
    fn invalid_handle_is_never_equal() {
        let a = SymbolHandle::invalid();
        let b = SymbolHandle::invalid();
        assert_ne!(a, b);
    }
}
