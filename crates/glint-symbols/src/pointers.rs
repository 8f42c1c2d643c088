//! Pointer type synthesis.
//!
//! Pointer types (`T*`) are synthesized on demand during lowering of
//! indirect accesses. They never appear in surface syntax.

use crate::assembly::{Assembly, POINTER_ASSEMBLY};
use crate::metadata::{ScopeKind, SymbolKind, SymbolMetadata};
use crate::table::ROOT_INDEX;
use glint_ast::node::Access;
use glint_ast::{NodeData, NodeId, NodeKind, RefKind, SymbolRef};
use glint_common::{Span, SymbolHandle, intern};

/// Pointee kinds a pointer may be formed over.
pub fn can_form_pointer_over(kind: SymbolKind) -> bool {
    matches!(
        kind,
        SymbolKind::Pointer
            | SymbolKind::Struct
            | SymbolKind::Class
            | SymbolKind::Primitive
            | SymbolKind::Enum
    )
}

/// Owns the table of synthesized pointer types for one compilation.
#[derive(Debug, Default)]
pub struct PointerManager {
    assembly: Assembly,
}

impl PointerManager {
    pub fn new() -> Self {
        PointerManager {
            assembly: Assembly::create("$pointers"),
        }
    }

    pub fn assembly(&self) -> &Assembly {
        &self.assembly
    }

    /// Get or synthesize `pointee_fqn*`.
    pub fn get_or_create(&mut self, pointee_fqn: &str) -> Option<(SymbolHandle, NodeId)> {
        let name = format!("{pointee_fqn}*");
        if let Some(index) = self.assembly.table.find_full_path(&name, ROOT_INDEX) {
            let decl = self.assembly.table.get(index).metadata.as_ref()?.declaration?;
            return Some((self.assembly.make_handle(POINTER_ASSEMBLY, index), decl));
        }
        let pointee = self.assembly.arena.add_ref(SymbolRef::fully_qualified(
            intern(pointee_fqn),
            RefKind::Type,
            Span::synthetic(),
        ));
        let def = self.assembly.arena.alloc(
            NodeKind::PointerDef,
            Span::synthetic(),
            NodeData::PointerDef {
                name: intern(&name),
                pointee,
            },
        );
        let index = self.assembly.add_named(
            &name,
            SymbolMetadata::new(SymbolKind::Pointer, ScopeKind::Global, Access::Public, def),
            ROOT_INDEX,
        );
        if index == 0 {
            return None;
        }
        Some((self.assembly.make_handle(POINTER_ASSEMBLY, index), def))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_names_append_a_star() {
        let mut pointers = PointerManager::new();
        let (handle, def) = pointers.get_or_create("float4").unwrap();
        let index = handle.index().unwrap();
        assert_eq!(pointers.assembly().table.fully_qualified_name(index), "float4*");
        match &pointers.assembly().arena.get(def).data {
            NodeData::PointerDef { pointee, .. } => {
                assert_eq!(pointers.assembly().arena.symbol_ref(*pointee).name.as_str(), "float4");
            }
            other => panic!("expected pointer def, got {other:?}"),
        }
    }

    #[test]
    fn creation_is_idempotent() {
        let mut pointers = PointerManager::new();
        let (a, _) = pointers.get_or_create("int").unwrap();
        let (b, _) = pointers.get_or_create("int").unwrap();
        assert_eq!(a.index(), b.index());
    }
}
