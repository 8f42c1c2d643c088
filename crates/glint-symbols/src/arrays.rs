//! Array type synthesis.
//!
//! Array types are synthesized on demand from an element type and constant
//! dimensions: `float[4]`, `gfx.Material[2][3]`. Multi-dimensional arrays
//! nest one definition per dimension, each naming the previous level as its
//! element.

use crate::assembly::{ARRAY_ASSEMBLY, Assembly};
use crate::metadata::{ScopeKind, SymbolKind, SymbolMetadata};
use crate::table::ROOT_INDEX;
use glint_ast::node::Access;
use glint_ast::{NodeData, NodeId, NodeKind, RefKind, SymbolRef};
use glint_common::{Span, SymbolHandle, intern};
use smallvec::smallvec;

/// Element kinds an array may be formed over.
pub fn can_form_array_over(kind: SymbolKind) -> bool {
    matches!(
        kind,
        SymbolKind::Array
            | SymbolKind::Struct
            | SymbolKind::Class
            | SymbolKind::Primitive
            | SymbolKind::Enum
    )
}

fn array_type_name(element_fqn: &str, dims: &[u32]) -> String {
    let mut name = element_fqn.to_string();
    for dim in dims {
        name.push('[');
        name.push_str(&dim.to_string());
        name.push(']');
    }
    name
}

/// Owns the table of synthesized array types for one compilation.
#[derive(Debug, Default)]
pub struct ArrayManager {
    assembly: Assembly,
}

impl ArrayManager {
    pub fn new() -> Self {
        ArrayManager {
            assembly: Assembly::create("$arrays"),
        }
    }

    pub fn assembly(&self) -> &Assembly {
        &self.assembly
    }

    /// Get or synthesize the array type `element_fqn[d0][d1]…`. Returns the
    /// handle of the outermost level and its definition node.
    pub fn get_or_create(&mut self, element_fqn: &str, dims: &[u32]) -> Option<(SymbolHandle, NodeId)> {
        if dims.is_empty() {
            return None;
        }
        let full_name = array_type_name(element_fqn, dims);
        if let Some(index) = self.assembly.table.find_full_path(&full_name, ROOT_INDEX) {
            let decl = self.assembly.table.get(index).metadata.as_ref()?.declaration?;
            return Some((self.assembly.make_handle(ARRAY_ASSEMBLY, index), decl));
        }

        let mut last = None;
        for level in 0..dims.len() {
            let name = array_type_name(element_fqn, &dims[..=level]);
            let element_name = if level == 0 {
                element_fqn.to_string()
            } else {
                array_type_name(element_fqn, &dims[..level])
            };
            if let Some(existing) = self.assembly.table.find_full_path(&name, ROOT_INDEX) {
                let decl = self
                    .assembly
                    .table
                    .get(existing)
                    .metadata
                    .as_ref()
                    .and_then(|m| m.declaration);
                if let Some(decl) = decl {
                    last = Some((self.assembly.make_handle(ARRAY_ASSEMBLY, existing), decl));
                    continue;
                }
            }
            let element = self.assembly.arena.add_ref(SymbolRef::fully_qualified(
                intern(&element_name),
                RefKind::Type,
                Span::synthetic(),
            ));
            let def = self.assembly.arena.alloc(
                NodeKind::ArrayDef,
                Span::synthetic(),
                NodeData::ArrayDef {
                    name: intern(&name),
                    element,
                    dims: smallvec![dims[level]],
                },
            );
            let index = self.assembly.add_named(
                &name,
                SymbolMetadata::new(SymbolKind::Array, ScopeKind::Global, Access::Public, def),
                ROOT_INDEX,
            );
            if index == 0 {
                return None;
            }
            last = Some((self.assembly.make_handle(ARRAY_ASSEMBLY, index), def));
        }
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_dimension() {
        let mut arrays = ArrayManager::new();
        let (handle, def) = arrays.get_or_create("float", &[4]).unwrap();
        let index = handle.index().unwrap();
        assert_eq!(arrays.assembly().table.fully_qualified_name(index), "float[4]");
        match &arrays.assembly().arena.get(def).data {
            NodeData::ArrayDef { element, dims, .. } => {
                assert_eq!(arrays.assembly().arena.symbol_ref(*element).name.as_str(), "float");
                assert_eq!(dims.as_slice(), &[4]);
            }
            other => panic!("expected array def, got {other:?}"),
        }
    }

    #[test]
    fn nested_dimensions_chain() {
        let mut arrays = ArrayManager::new();
        let (_, def) = arrays.get_or_create("gfx.Material", &[2, 3]).unwrap();
        match &arrays.assembly().arena.get(def).data {
            NodeData::ArrayDef { name, element, .. } => {
                assert_eq!(name.as_str(), "gfx.Material[2][3]");
                assert_eq!(
                    arrays.assembly().arena.symbol_ref(*element).name.as_str(),
                    "gfx.Material[2]"
                );
            }
            other => panic!("expected array def, got {other:?}"),
        }
    }

    #[test]
    fn creation_is_idempotent() {
        let mut arrays = ArrayManager::new();
        let (a, _) = arrays.get_or_create("int", &[8]).unwrap();
        let before = arrays.assembly().table.len();
        let (b, _) = arrays.get_or_create("int", &[8]).unwrap();
        assert_eq!(a.index(), b.index());
        assert_eq!(arrays.assembly().table.len(), before);
    }

    #[test]
    fn element_kind_filter() {
        assert!(can_form_array_over(SymbolKind::Primitive));
        assert!(can_form_array_over(SymbolKind::Struct));
        assert!(!can_form_array_over(SymbolKind::Function));
        assert!(!can_form_array_over(SymbolKind::Namespace));
    }
}
