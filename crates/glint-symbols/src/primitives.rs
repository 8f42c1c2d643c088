//! The process-wide primitive catalog.
//!
//! Populated once: the full lattice (`void` plus every numeric/bool kind
//! crossed with scalar, vec2..4, and mat1x1..4x4 shapes), the built-in cast
//! overloads between matching shapes, mixed vector/scalar arithmetic
//! overloads, and the built-in resource classes. The catalog is immutable
//! after initialization; synthesized swizzles live in the per-compilation
//! swizzle table instead.

use crate::assembly::Assembly;
use crate::metadata::{ScopeKind, SymbolKind, SymbolMetadata};
use crate::table::ROOT_INDEX;
use glint_ast::node::Access;
use glint_ast::{
    NodeArena, NodeData, NodeId, NodeKind, Operator, PrimitiveClass, PrimitiveKind, RefKind,
    SymbolRef, primitive_name, render_cast_signature, render_operator_signature,
};
use glint_common::{AssemblyId, Span, SymbolHandle, intern};
use once_cell::sync::Lazy;
use smallvec::smallvec;

static CATALOG: Lazy<Assembly> = Lazy::new(build_catalog);

/// The global primitive assembly.
pub fn primitives() -> &'static Assembly {
    &CATALOG
}

/// Shape data of a primitive definition node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrimitiveInfo {
    pub kind: PrimitiveKind,
    pub class: PrimitiveClass,
    pub rows: u32,
    pub cols: u32,
}

impl PrimitiveInfo {
    pub fn name(&self) -> String {
        primitive_name(self.kind, self.class, self.rows, self.cols)
    }

    /// The scalar/vector component count (1 for scalars).
    pub fn component_count(&self) -> u32 {
        match self.class {
            PrimitiveClass::Scalar => 1,
            PrimitiveClass::Vector => self.rows,
            PrimitiveClass::Matrix => self.rows * self.cols,
        }
    }
}

/// Read the shape of a primitive declaration node.
pub fn primitive_info(arena: &NodeArena, decl: NodeId) -> Option<PrimitiveInfo> {
    match &arena.get(decl).data {
        NodeData::Primitive {
            kind,
            class,
            rows,
            cols,
            ..
        } => Some(PrimitiveInfo {
            kind: *kind,
            class: *class,
            rows: *rows,
            cols: *cols,
        }),
        _ => None,
    }
}

/// Table index of a primitive by canonical name.
pub fn find_primitive(name: &str) -> Option<usize> {
    CATALOG.table.find_part(name, ROOT_INDEX)
}

/// Handle to a primitive by canonical name.
pub fn primitive_handle(name: &str) -> Option<SymbolHandle> {
    find_primitive(name).map(|index| CATALOG.make_handle(AssemblyId::PRIMITIVES, index))
}

fn resolved_type_ref(assembly: &mut Assembly, name: &str, index: usize) -> glint_ast::RefId {
    let mut symbol_ref = SymbolRef::fully_qualified(intern(name), RefKind::Type, Span::synthetic());
    symbol_ref.resolve_to(assembly.table.make_handle(AssemblyId::PRIMITIVES, index));
    assembly.arena.add_ref(symbol_ref)
}

fn add_prim(
    assembly: &mut Assembly,
    kind: PrimitiveKind,
    class: PrimitiveClass,
    rows: u32,
    cols: u32,
) {
    let name = primitive_name(kind, class, rows, cols);
    let node = assembly.arena.alloc(
        NodeKind::Primitive,
        Span::synthetic(),
        NodeData::Primitive {
            name: intern(&name),
            kind,
            class,
            rows,
            cols,
        },
    );
    let index = assembly.add_named(
        &name,
        SymbolMetadata::new(SymbolKind::Primitive, ScopeKind::Global, Access::Public, node),
        ROOT_INDEX,
    );
    debug_assert_ne!(index, 0, "duplicate primitive {name}");
}

fn add_parameter(assembly: &mut Assembly, name: &str, ty_name: &str, ty_index: usize) -> NodeId {
    let ty = resolved_type_ref(assembly, ty_name, ty_index);
    assembly.arena.alloc(
        NodeKind::Parameter,
        Span::synthetic(),
        NodeData::Parameter {
            name: intern(name),
            ty,
        },
    )
}

/// Register a cast operator `#target(source)` under the source primitive.
fn add_cast(assembly: &mut Assembly, source: &str, target: &str, implicit: bool) {
    let source_index = assembly.find(source).expect("source primitive");
    let target_index = assembly.find(target).expect("target primitive");
    let return_type = resolved_type_ref(assembly, target, target_index);
    let param = add_parameter(assembly, "value", source, source_index);
    let node = assembly.arena.alloc(
        NodeKind::OperatorDecl,
        Span::synthetic(),
        NodeData::OperatorDecl {
            op: Operator::Cast,
            access: Access::Public,
            return_type,
            parameters: vec![param],
            body: None,
            implicit,
        },
    );
    assembly.arena.adopt_children(node);
    let signature = render_cast_signature(target, source);
    let index = assembly.add_named(
        &signature,
        SymbolMetadata::new(SymbolKind::Operator, ScopeKind::Struct, Access::Public, node),
        source_index,
    );
    debug_assert_ne!(index, 0, "duplicate cast {signature}");
}

/// Register a binary operator overload under `owner`.
fn add_operator(
    assembly: &mut Assembly,
    owner: &str,
    op: Operator,
    lhs: &str,
    rhs: &str,
    ret: &str,
) {
    let owner_index = assembly.find(owner).expect("owner primitive");
    let lhs_index = assembly.find(lhs).expect("lhs primitive");
    let rhs_index = assembly.find(rhs).expect("rhs primitive");
    let ret_index = assembly.find(ret).expect("return primitive");
    let return_type = resolved_type_ref(assembly, ret, ret_index);
    let left = add_parameter(assembly, "left", lhs, lhs_index);
    let right = add_parameter(assembly, "right", rhs, rhs_index);
    let node = assembly.arena.alloc(
        NodeKind::OperatorDecl,
        Span::synthetic(),
        NodeData::OperatorDecl {
            op,
            access: Access::Public,
            return_type,
            parameters: vec![left, right],
            body: None,
            implicit: false,
        },
    );
    assembly.arena.adopt_children(node);
    let signature = render_operator_signature(op, &[lhs, rhs]);
    let index = assembly.add_named(
        &signature,
        SymbolMetadata::new(SymbolKind::Operator, ScopeKind::Struct, Access::Public, node),
        owner_index,
    );
    debug_assert_ne!(index, 0, "duplicate operator {signature}");
}

fn add_builtin_classes(assembly: &mut Assembly) {
    // SamplerState first so Texture2D.Sample can reference it.
    let sampler = assembly.arena.alloc(
        NodeKind::Class,
        Span::synthetic(),
        NodeData::Class {
            name: intern("SamplerState"),
            access: Access::Public,
            attributes: Vec::new(),
            members: Vec::new(),
        },
    );
    let sampler_index = assembly.add_named(
        "SamplerState",
        SymbolMetadata::new(SymbolKind::Class, ScopeKind::Global, Access::Public, sampler),
        ROOT_INDEX,
    );

    let texture = assembly.arena.alloc(
        NodeKind::Class,
        Span::synthetic(),
        NodeData::Class {
            name: intern("Texture2D"),
            access: Access::Public,
            attributes: Vec::new(),
            members: Vec::new(),
        },
    );
    let texture_index = assembly.add_named(
        "Texture2D",
        SymbolMetadata::new(SymbolKind::Class, ScopeKind::Global, Access::Public, texture),
        ROOT_INDEX,
    );

    let float4_index = assembly.find("float4").expect("float4");
    let float2_index = assembly.find("float2").expect("float2");
    let return_type = resolved_type_ref(assembly, "float4", float4_index);
    let sampler_param = add_parameter(assembly, "sampler", "SamplerState", sampler_index);
    let uv_param = add_parameter(assembly, "uv", "float2", float2_index);
    let sample = assembly.arena.alloc(
        NodeKind::Function,
        Span::synthetic(),
        NodeData::Function {
            name: intern("Sample"),
            access: Access::Public,
            return_type,
            parameters: vec![sampler_param, uv_param],
            body: None,
            attributes: Vec::new(),
        },
    );
    assembly.arena.adopt_children(sample);
    assembly.add_named(
        "Sample(SamplerState,float2)",
        SymbolMetadata::new(SymbolKind::Function, ScopeKind::Class, Access::Public, sample),
        texture_index,
    );
}

fn build_catalog() -> Assembly {
    let mut assembly = Assembly::create("$primitives");

    add_prim(&mut assembly, PrimitiveKind::Void, PrimitiveClass::Scalar, 1, 1);

    let lattice_kinds: smallvec::SmallVec<[PrimitiveKind; 12]> = smallvec![
        PrimitiveKind::Bool,
        PrimitiveKind::Int8,
        PrimitiveKind::UInt8,
        PrimitiveKind::Int16,
        PrimitiveKind::UInt16,
        PrimitiveKind::Int32,
        PrimitiveKind::UInt32,
        PrimitiveKind::Int64,
        PrimitiveKind::UInt64,
        PrimitiveKind::Half,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
    ];

    for &kind in &lattice_kinds {
        add_prim(&mut assembly, kind, PrimitiveClass::Scalar, 1, 1);
        for n in 2..=4 {
            add_prim(&mut assembly, kind, PrimitiveClass::Vector, n, 1);
        }
        for r in 1..=4 {
            for c in 1..=4 {
                add_prim(&mut assembly, kind, PrimitiveClass::Matrix, r, c);
            }
        }
    }

    // Casts between numeric kinds of matching shape: implicit when widening
    // by promotion rank, explicit otherwise. Matrix shapes only get
    // same-type arithmetic, so no matrix casts are registered.
    for &src in PrimitiveKind::ALL_NUMERIC {
        for &dst in PrimitiveKind::ALL_NUMERIC {
            if src == dst {
                continue;
            }
            let implicit = dst.promotion_rank() >= src.promotion_rank();
            let src_scalar = primitive_name(src, PrimitiveClass::Scalar, 1, 1);
            let dst_scalar = primitive_name(dst, PrimitiveClass::Scalar, 1, 1);
            add_cast(&mut assembly, &src_scalar, &dst_scalar, implicit);
            for n in 2..=4 {
                let src_vec = primitive_name(src, PrimitiveClass::Vector, n, 1);
                let dst_vec = primitive_name(dst, PrimitiveClass::Vector, n, 1);
                add_cast(&mut assembly, &src_vec, &dst_vec, implicit);
            }
        }
    }

    // Mixed vector/scalar arithmetic, both operand orders, registered under
    // the vector type.
    for &kind in PrimitiveKind::ALL_NUMERIC {
        let scalar = primitive_name(kind, PrimitiveClass::Scalar, 1, 1);
        for n in 2..=4 {
            let vector = primitive_name(kind, PrimitiveClass::Vector, n, 1);
            for op in [
                Operator::Add,
                Operator::Subtract,
                Operator::Multiply,
                Operator::Divide,
            ] {
                add_operator(&mut assembly, &vector, op, &vector, &scalar, &vector);
                add_operator(&mut assembly, &vector, op, &scalar, &vector, &vector);
            }
        }
    }

    add_builtin_classes(&mut assembly);
    assembly
}
