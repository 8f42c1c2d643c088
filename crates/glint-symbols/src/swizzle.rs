//! Swizzle synthesis.
//!
//! Swizzle accessors (`v.xyz`, `c.rgb`) are not declared anywhere; when
//! member resolution fails on a non-matrix primitive, the pattern is
//! validated and a `SwizzleDef` is synthesized into the per-compilation
//! swizzle table, keyed `<primitive>.<pattern>`, so later uses reuse it.

use crate::assembly::{Assembly, SWIZZLE_ASSEMBLY};
use crate::metadata::{ScopeKind, SymbolKind, SymbolMetadata};
use crate::primitives::{self, PrimitiveInfo};
use crate::table::ROOT_INDEX;
use glint_ast::node::Access;
use glint_ast::{NodeData, NodeKind, PrimitiveClass, RefKind, SymbolRef, primitive_name};
use glint_common::{Span, SymbolHandle, intern};

/// Map a swizzle letter to its component index; accepts the `xyzw`, `rgba`,
/// and `stpq` alphabets.
fn component_index(letter: char) -> Option<u8> {
    match letter {
        'x' | 'r' | 's' => Some(0),
        'y' | 'g' | 't' => Some(1),
        'z' | 'b' | 'p' => Some(2),
        'w' | 'a' | 'q' => Some(3),
        _ => None,
    }
}

/// Owns the table of synthesized swizzle members for one compilation.
#[derive(Debug, Default)]
pub struct SwizzleManager {
    assembly: Assembly,
}

impl SwizzleManager {
    pub fn new() -> Self {
        SwizzleManager {
            assembly: Assembly::create("$swizzles"),
        }
    }

    pub fn assembly(&self) -> &Assembly {
        &self.assembly
    }

    /// Validate `pattern` against the primitive and return a handle to the
    /// (possibly freshly synthesized) swizzle member. `None` means the
    /// pattern is not a valid swizzle for this type.
    pub fn verify(&mut self, primitive: &PrimitiveInfo, pattern: &str) -> Option<SymbolHandle> {
        if primitive.class == PrimitiveClass::Matrix {
            return None;
        }
        if pattern.is_empty() || pattern.len() > 4 {
            return None;
        }

        let prim_name = primitive.name();
        if let Some(prim_index) = self.assembly.table.find_part(&prim_name, ROOT_INDEX) {
            if let Some(existing) = self.assembly.table.find_part(pattern, prim_index) {
                return Some(self.assembly.make_handle(SWIZZLE_ASSEMBLY, existing));
            }
        }

        let component_count = match primitive.class {
            PrimitiveClass::Scalar => 1,
            PrimitiveClass::Vector => primitive.rows,
            PrimitiveClass::Matrix => return None,
        };

        // 2 bits per selected component, first letter in the low bits.
        let mut mask = 0u8;
        for (position, letter) in pattern.chars().enumerate() {
            let index = component_index(letter)?;
            if u32::from(index) >= component_count {
                return None;
            }
            mask |= (index & 0x3) << (2 * position as u8);
        }

        // The result type keeps the scalar kind: `v.xz` on float4 is float2.
        let result_name = if pattern.len() > 1 {
            primitive_name(primitive.kind, PrimitiveClass::Vector, pattern.len() as u32, 1)
        } else {
            primitive_name(primitive.kind, PrimitiveClass::Scalar, 1, 1)
        };
        let result_handle = primitives::primitive_handle(&result_name)?;

        let mut ty = SymbolRef::fully_qualified(
            intern(&result_name),
            RefKind::Type,
            Span::synthetic(),
        );
        ty.resolve_to(result_handle);
        let ty = self.assembly.arena.add_ref(ty);

        let def = self.assembly.arena.alloc(
            NodeKind::SwizzleDef,
            Span::synthetic(),
            NodeData::SwizzleDef {
                name: intern(pattern),
                mask,
                component_count: pattern.len() as u8,
                ty,
            },
        );

        let path = format!("{prim_name}.{pattern}");
        let index = self.assembly.add_named(
            &path,
            SymbolMetadata::new(SymbolKind::Swizzle, ScopeKind::Struct, Access::Public, def),
            ROOT_INDEX,
        );
        if index == 0 {
            return None;
        }
        Some(self.assembly.make_handle(SWIZZLE_ASSEMBLY, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_ast::PrimitiveKind;

    fn float4() -> PrimitiveInfo {
        PrimitiveInfo {
            kind: PrimitiveKind::Float,
            class: PrimitiveClass::Vector,
            rows: 4,
            cols: 1,
        }
    }

    #[test]
    fn valid_patterns_synthesize_defs() {
        let mut swizzles = SwizzleManager::new();
        let handle = swizzles.verify(&float4(), "xyz").unwrap();
        let index = handle.index().unwrap();
        let meta = swizzles.assembly().table.get(index).metadata.as_ref().unwrap();
        assert_eq!(meta.kind, SymbolKind::Swizzle);
        match &swizzles.assembly().arena.get(meta.declaration.unwrap()).data {
            NodeData::SwizzleDef {
                mask,
                component_count,
                ty,
                ..
            } => {
                // x=0, y=1, z=2 → 0b10_01_00.
                assert_eq!(*mask, 0b10_01_00);
                assert_eq!(*component_count, 3);
                let name = swizzles.assembly().arena.symbol_ref(*ty).name;
                assert_eq!(name.as_str(), "float3");
            }
            other => panic!("expected swizzle, got {other:?}"),
        }
    }

    #[test]
    fn repeated_patterns_reuse_the_entry() {
        let mut swizzles = SwizzleManager::new();
        let a = swizzles.verify(&float4(), "rgba").unwrap();
        let b = swizzles.verify(&float4(), "rgba").unwrap();
        assert_eq!(a.index(), b.index());
        assert_eq!(swizzles.assembly().table.find_part("float4", 0).is_some(), true);
    }

    #[test]
    fn out_of_range_components_fail() {
        let mut swizzles = SwizzleManager::new();
        let float2 = PrimitiveInfo {
            kind: PrimitiveKind::Float,
            class: PrimitiveClass::Vector,
            rows: 2,
            cols: 1,
        };
        assert!(swizzles.verify(&float2, "xy").is_some());
        assert!(swizzles.verify(&float2, "xyz").is_none());
        assert!(swizzles.verify(&float2, "q").is_none());
        assert!(swizzles.verify(&float2, "n").is_none());
        assert!(swizzles.verify(&float2, "xyzwx").is_none());
    }

    #[test]
    fn matrices_do_not_swizzle() {
        let mut swizzles = SwizzleManager::new();
        let mat = PrimitiveInfo {
            kind: PrimitiveKind::Float,
            class: PrimitiveClass::Matrix,
            rows: 4,
            cols: 4,
        };
        assert!(swizzles.verify(&mat, "x").is_none());
    }

    #[test]
    fn single_letter_yields_scalar() {
        let mut swizzles = SwizzleManager::new();
        let handle = swizzles.verify(&float4(), "w").unwrap();
        let index = handle.index().unwrap();
        let meta = swizzles.assembly().table.get(index).metadata.as_ref().unwrap();
        match &swizzles.assembly().arena.get(meta.declaration.unwrap()).data {
            NodeData::SwizzleDef { ty, mask, .. } => {
                assert_eq!(swizzles.assembly().arena.symbol_ref(*ty).name.as_str(), "float");
                assert_eq!(*mask, 0b11);
            }
            other => panic!("expected swizzle, got {other:?}"),
        }
    }
}
