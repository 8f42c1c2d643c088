//! The binary assembly container.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! MAGIC         4 bytes "GLAS"
//! VERSION       u32, currently 1
//! SYMBOL_COUNT  u32
//! SYMBOL_NODES  SYMBOL_COUNT records:
//!     NODE_INDEX u32, NAME (u32 len + utf8), CHILD_COUNT u32,
//!     CHILD_INDICES u32×n, DEPTH u32, PARENT_INDEX u32,
//!     HAS_METADATA u8, then metadata (kind/scope/access/size u32 each,
//!     HAS_DECL u8, DECL_KIND u32 + DECL_BODY when present)
//! IL_COUNT      u32
//! IL_ENTRIES    u32 node index, u32 byte length, bytes
//! ```
//!
//! Declaration bodies carry just enough to rebuild the definition nodes a
//! consumer needs for resolution; references are stored as fully-qualified
//! names and re-resolved on use.

use crate::assembly::{Assembly, AssemblyError};
use crate::metadata::{ScopeKind, SymbolKind, SymbolMetadata};
use crate::table::{ROOT_INDEX, SymbolTable};
use glint_ast::node::Access;
use glint_ast::{
    NodeArena, NodeData, NodeId, NodeKind, Operator, PrimitiveClass, PrimitiveKind, RefId, RefKind,
    SymbolRef,
};
use glint_common::{Span, intern};
use smallvec::SmallVec;
use std::io::{Read, Write};

pub const MAGIC: &[u8; 4] = b"GLAS";
pub const VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Byte-level helpers
// ---------------------------------------------------------------------------

fn write_u8(out: &mut impl Write, value: u8) -> Result<(), AssemblyError> {
    out.write_all(&[value])?;
    Ok(())
}

fn write_u32(out: &mut impl Write, value: u32) -> Result<(), AssemblyError> {
    out.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_i64(out: &mut impl Write, value: i64) -> Result<(), AssemblyError> {
    out.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_str(out: &mut impl Write, value: &str) -> Result<(), AssemblyError> {
    write_u32(out, value.len() as u32)?;
    out.write_all(value.as_bytes())?;
    Ok(())
}

fn read_exact(input: &mut impl Read, buf: &mut [u8]) -> Result<(), AssemblyError> {
    input.read_exact(buf).map_err(|err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            AssemblyError::Truncated
        } else {
            AssemblyError::from(err)
        }
    })
}

fn read_u8(input: &mut impl Read) -> Result<u8, AssemblyError> {
    let mut buf = [0u8; 1];
    read_exact(input, &mut buf)?;
    Ok(buf[0])
}

fn read_u32(input: &mut impl Read) -> Result<u32, AssemblyError> {
    let mut buf = [0u8; 4];
    read_exact(input, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_i64(input: &mut impl Read) -> Result<i64, AssemblyError> {
    let mut buf = [0u8; 8];
    read_exact(input, &mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

fn read_str(input: &mut impl Read) -> Result<String, AssemblyError> {
    let len = read_u32(input)? as usize;
    if len > 1 << 24 {
        return Err(AssemblyError::Parse(format!("unreasonable string length {len}")));
    }
    let mut buf = vec![0u8; len];
    read_exact(input, &mut buf)?;
    String::from_utf8(buf).map_err(|_| AssemblyError::Parse("invalid utf-8 in name".into()))
}

fn access_code(access: Access) -> u32 {
    match access {
        Access::Public => 0,
        Access::Internal => 1,
        Access::Private => 2,
    }
}

fn access_from(code: u32) -> Access {
    match code {
        0 => Access::Public,
        1 => Access::Internal,
        _ => Access::Private,
    }
}

// ---------------------------------------------------------------------------
// Declaration bodies
// ---------------------------------------------------------------------------

mod decl_kind {
    pub const NAMESPACE: u32 = 1;
    pub const STRUCT: u32 = 2;
    pub const CLASS: u32 = 3;
    pub const ENUM: u32 = 4;
    pub const ENUM_MEMBER: u32 = 5;
    pub const FIELD: u32 = 6;
    pub const FUNCTION: u32 = 7;
    pub const OPERATOR: u32 = 8;
    pub const CONSTRUCTOR: u32 = 9;
    pub const PARAMETER: u32 = 10;
    pub const PRIMITIVE: u32 = 11;
    pub const ARRAY: u32 = 12;
    pub const POINTER: u32 = 13;
    pub const SWIZZLE: u32 = 14;
    pub const THIS: u32 = 15;
    pub const VARIABLE: u32 = 16;
}

fn ref_name(arena: &NodeArena, id: RefId) -> &'static str {
    arena.symbol_ref(id).name.as_str()
}

fn write_params(
    out: &mut impl Write,
    arena: &NodeArena,
    params: &[NodeId],
) -> Result<(), AssemblyError> {
    write_u32(out, params.len() as u32)?;
    for &param in params {
        match &arena.get(param).data {
            NodeData::Parameter { name, ty } => {
                write_str(out, name.as_str())?;
                write_str(out, ref_name(arena, *ty))?;
            }
            _ => return Err(AssemblyError::Parse("parameter node expected".into())),
        }
    }
    Ok(())
}

fn write_decl(out: &mut impl Write, arena: &NodeArena, decl: NodeId) -> Result<(), AssemblyError> {
    let node = arena.get(decl);
    match &node.data {
        NodeData::Namespace { path, .. } => {
            write_u32(out, decl_kind::NAMESPACE)?;
            write_u32(out, path.len() as u32)?;
            for segment in path {
                write_str(out, segment.as_str())?;
            }
        }
        NodeData::Struct { access, .. } => {
            write_u32(out, decl_kind::STRUCT)?;
            write_u32(out, access_code(*access))?;
        }
        NodeData::Class { access, .. } => {
            write_u32(out, decl_kind::CLASS)?;
            write_u32(out, access_code(*access))?;
        }
        NodeData::Enum { access, .. } => {
            write_u32(out, decl_kind::ENUM)?;
            write_u32(out, access_code(*access))?;
        }
        NodeData::EnumMember { value, .. } => {
            write_u32(out, decl_kind::ENUM_MEMBER)?;
            write_i64(out, *value)?;
        }
        NodeData::Field { access, ty, .. } => {
            write_u32(out, decl_kind::FIELD)?;
            write_u32(out, access_code(*access))?;
            write_str(out, ref_name(arena, *ty))?;
        }
        NodeData::Function {
            access,
            return_type,
            parameters,
            ..
        } => {
            write_u32(out, decl_kind::FUNCTION)?;
            write_u32(out, access_code(*access))?;
            write_str(out, ref_name(arena, *return_type))?;
            write_params(out, arena, parameters)?;
        }
        NodeData::OperatorDecl {
            op,
            access,
            return_type,
            parameters,
            implicit,
            ..
        } => {
            write_u32(out, decl_kind::OPERATOR)?;
            write_u32(out, op.code())?;
            write_u32(out, access_code(*access))?;
            write_u8(out, u8::from(*implicit))?;
            write_str(out, ref_name(arena, *return_type))?;
            write_params(out, arena, parameters)?;
        }
        NodeData::Constructor {
            access, parameters, ..
        } => {
            write_u32(out, decl_kind::CONSTRUCTOR)?;
            write_u32(out, access_code(*access))?;
            write_params(out, arena, parameters)?;
        }
        NodeData::Parameter { ty, .. } => {
            write_u32(out, decl_kind::PARAMETER)?;
            write_str(out, ref_name(arena, *ty))?;
        }
        NodeData::Primitive {
            kind,
            class,
            rows,
            cols,
            ..
        } => {
            write_u32(out, decl_kind::PRIMITIVE)?;
            write_u32(out, *kind as u32)?;
            write_u32(out, *class as u32)?;
            write_u32(out, *rows)?;
            write_u32(out, *cols)?;
        }
        NodeData::ArrayDef { element, dims, .. } => {
            write_u32(out, decl_kind::ARRAY)?;
            write_str(out, ref_name(arena, *element))?;
            write_u32(out, dims.len() as u32)?;
            for dim in dims {
                write_u32(out, *dim)?;
            }
        }
        NodeData::PointerDef { pointee, .. } => {
            write_u32(out, decl_kind::POINTER)?;
            write_str(out, ref_name(arena, *pointee))?;
        }
        NodeData::SwizzleDef {
            mask,
            component_count,
            ty,
            ..
        } => {
            write_u32(out, decl_kind::SWIZZLE)?;
            write_u8(out, *mask)?;
            write_u8(out, *component_count)?;
            write_str(out, ref_name(arena, *ty))?;
        }
        NodeData::ThisDef { ty } => {
            write_u32(out, decl_kind::THIS)?;
            write_str(out, ref_name(arena, *ty))?;
        }
        NodeData::DeclarationStatement { ty, .. } => {
            write_u32(out, decl_kind::VARIABLE)?;
            write_str(out, ref_name(arena, *ty))?;
        }
        _ => {
            return Err(AssemblyError::Parse(format!(
                "node kind {:?} cannot appear as a symbol declaration",
                node.kind
            )));
        }
    }
    Ok(())
}

fn type_ref(arena: &mut NodeArena, name: &str) -> RefId {
    arena.add_ref(SymbolRef::fully_qualified(
        intern(name),
        RefKind::Type,
        Span::synthetic(),
    ))
}

fn read_params(input: &mut impl Read, arena: &mut NodeArena) -> Result<Vec<NodeId>, AssemblyError> {
    let count = read_u32(input)? as usize;
    let mut params = Vec::with_capacity(count);
    for _ in 0..count {
        let name = read_str(input)?;
        let ty_name = read_str(input)?;
        let ty = type_ref(arena, &ty_name);
        params.push(arena.alloc(
            NodeKind::Parameter,
            Span::synthetic(),
            NodeData::Parameter {
                name: intern(&name),
                ty,
            },
        ));
    }
    Ok(params)
}

fn read_decl(
    input: &mut impl Read,
    arena: &mut NodeArena,
    name: &str,
) -> Result<NodeId, AssemblyError> {
    let kind = read_u32(input)?;
    let node = match kind {
        decl_kind::NAMESPACE => {
            let segments = read_u32(input)? as usize;
            let mut path = SmallVec::new();
            for _ in 0..segments {
                path.push(intern(&read_str(input)?));
            }
            arena.alloc(
                NodeKind::Namespace,
                Span::synthetic(),
                NodeData::Namespace {
                    path,
                    usings: Vec::new(),
                    declarations: Vec::new(),
                },
            )
        }
        decl_kind::STRUCT | decl_kind::CLASS => {
            let access = access_from(read_u32(input)?);
            let data = if kind == decl_kind::STRUCT {
                NodeData::Struct {
                    name: intern(name),
                    access,
                    attributes: Vec::new(),
                    members: Vec::new(),
                }
            } else {
                NodeData::Class {
                    name: intern(name),
                    access,
                    attributes: Vec::new(),
                    members: Vec::new(),
                }
            };
            let node_kind = if kind == decl_kind::STRUCT {
                NodeKind::Struct
            } else {
                NodeKind::Class
            };
            arena.alloc(node_kind, Span::synthetic(), data)
        }
        decl_kind::ENUM => {
            let access = access_from(read_u32(input)?);
            arena.alloc(
                NodeKind::Enum,
                Span::synthetic(),
                NodeData::Enum {
                    name: intern(name),
                    access,
                    members: Vec::new(),
                },
            )
        }
        decl_kind::ENUM_MEMBER => {
            let value = read_i64(input)?;
            arena.alloc(
                NodeKind::EnumMember,
                Span::synthetic(),
                NodeData::EnumMember {
                    name: intern(name),
                    value,
                },
            )
        }
        decl_kind::FIELD => {
            let access = access_from(read_u32(input)?);
            let ty_name = read_str(input)?;
            let ty = type_ref(arena, &ty_name);
            arena.alloc(
                NodeKind::Field,
                Span::synthetic(),
                NodeData::Field {
                    name: intern(name),
                    access,
                    ty,
                    attributes: Vec::new(),
                },
            )
        }
        decl_kind::FUNCTION => {
            let access = access_from(read_u32(input)?);
            let return_name = read_str(input)?;
            let return_type = type_ref(arena, &return_name);
            let parameters = read_params(input, arena)?;
            // The table stores functions under signature names; the short
            // name is the part before '('.
            let short = name.split('(').next().unwrap_or(name);
            let id = arena.alloc(
                NodeKind::Function,
                Span::synthetic(),
                NodeData::Function {
                    name: intern(short),
                    access,
                    return_type,
                    parameters,
                    body: None,
                    attributes: Vec::new(),
                },
            );
            arena.adopt_children(id);
            id
        }
        decl_kind::OPERATOR => {
            let op = Operator::from_code(read_u32(input)?)
                .ok_or_else(|| AssemblyError::Parse("unknown operator code".into()))?;
            let access = access_from(read_u32(input)?);
            let implicit = read_u8(input)? != 0;
            let return_name = read_str(input)?;
            let return_type = type_ref(arena, &return_name);
            let parameters = read_params(input, arena)?;
            let id = arena.alloc(
                NodeKind::OperatorDecl,
                Span::synthetic(),
                NodeData::OperatorDecl {
                    op,
                    access,
                    return_type,
                    parameters,
                    body: None,
                    implicit,
                },
            );
            arena.adopt_children(id);
            id
        }
        decl_kind::CONSTRUCTOR => {
            let access = access_from(read_u32(input)?);
            let parameters = read_params(input, arena)?;
            let short = name.split('(').next().unwrap_or(name);
            let id = arena.alloc(
                NodeKind::Constructor,
                Span::synthetic(),
                NodeData::Constructor {
                    name: intern(short),
                    access,
                    parameters,
                    body: None,
                },
            );
            arena.adopt_children(id);
            id
        }
        decl_kind::PARAMETER => {
            let ty_name = read_str(input)?;
            let ty = type_ref(arena, &ty_name);
            arena.alloc(
                NodeKind::Parameter,
                Span::synthetic(),
                NodeData::Parameter {
                    name: intern(name),
                    ty,
                },
            )
        }
        decl_kind::PRIMITIVE => {
            let prim_kind = PrimitiveKind::from_u32(read_u32(input)?)
                .ok_or_else(|| AssemblyError::Parse("unknown primitive kind".into()))?;
            let class = PrimitiveClass::from_u32(read_u32(input)?)
                .ok_or_else(|| AssemblyError::Parse("unknown primitive class".into()))?;
            let rows = read_u32(input)?;
            let cols = read_u32(input)?;
            arena.alloc(
                NodeKind::Primitive,
                Span::synthetic(),
                NodeData::Primitive {
                    name: intern(name),
                    kind: prim_kind,
                    class,
                    rows,
                    cols,
                },
            )
        }
        decl_kind::ARRAY => {
            let element_name = read_str(input)?;
            let element = type_ref(arena, &element_name);
            let count = read_u32(input)? as usize;
            let mut dims = SmallVec::new();
            for _ in 0..count {
                dims.push(read_u32(input)?);
            }
            arena.alloc(
                NodeKind::ArrayDef,
                Span::synthetic(),
                NodeData::ArrayDef {
                    name: intern(name),
                    element,
                    dims,
                },
            )
        }
        decl_kind::POINTER => {
            let pointee_name = read_str(input)?;
            let pointee = type_ref(arena, &pointee_name);
            arena.alloc(
                NodeKind::PointerDef,
                Span::synthetic(),
                NodeData::PointerDef {
                    name: intern(name),
                    pointee,
                },
            )
        }
        decl_kind::SWIZZLE => {
            let mask = read_u8(input)?;
            let component_count = read_u8(input)?;
            let ty_name = read_str(input)?;
            let ty = type_ref(arena, &ty_name);
            arena.alloc(
                NodeKind::SwizzleDef,
                Span::synthetic(),
                NodeData::SwizzleDef {
                    name: intern(name),
                    mask,
                    component_count,
                    ty,
                },
            )
        }
        decl_kind::THIS => {
            let ty_name = read_str(input)?;
            let ty = type_ref(arena, &ty_name);
            arena.alloc(NodeKind::ThisDef, Span::synthetic(), NodeData::ThisDef { ty })
        }
        decl_kind::VARIABLE => {
            let ty_name = read_str(input)?;
            let ty = type_ref(arena, &ty_name);
            arena.alloc(
                NodeKind::DeclarationStatement,
                Span::synthetic(),
                NodeData::DeclarationStatement {
                    name: intern(name),
                    ty,
                    initializer: None,
                },
            )
        }
        other => {
            return Err(AssemblyError::Parse(format!(
                "unknown declaration kind {other}"
            )));
        }
    };
    Ok(node)
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

fn write_metadata(
    out: &mut impl Write,
    arena: &NodeArena,
    metadata: &SymbolMetadata,
) -> Result<(), AssemblyError> {
    write_u32(out, metadata.kind as u32)?;
    write_u32(out, metadata.scope as u32)?;
    write_u32(out, access_code(metadata.access))?;
    write_u32(out, metadata.size)?;
    match metadata.declaration {
        Some(decl) => {
            write_u8(out, 1)?;
            write_decl(out, arena, decl)?;
        }
        None => write_u8(out, 0)?,
    }
    Ok(())
}

fn read_metadata(
    input: &mut impl Read,
    arena: &mut NodeArena,
    name: &str,
) -> Result<SymbolMetadata, AssemblyError> {
    let kind = SymbolKind::from_u32(read_u32(input)?)
        .ok_or_else(|| AssemblyError::Parse("unknown symbol kind".into()))?;
    let scope = ScopeKind::from_u32(read_u32(input)?)
        .ok_or_else(|| AssemblyError::Parse("unknown scope kind".into()))?;
    let access = access_from(read_u32(input)?);
    let size = read_u32(input)?;
    let has_decl = read_u8(input)? != 0;
    let declaration = if has_decl {
        Some(read_decl(input, arena, name)?)
    } else {
        None
    };
    Ok(SymbolMetadata {
        kind,
        scope,
        access,
        size,
        declaration,
    })
}

// ---------------------------------------------------------------------------
// The container
// ---------------------------------------------------------------------------

pub fn write_assembly(assembly: &Assembly, out: &mut impl Write) -> Result<(), AssemblyError> {
    out.write_all(MAGIC)?;
    write_u32(out, VERSION)?;
    write_u32(out, assembly.table.len() as u32)?;

    // Depth-first from the root, indices written explicitly so the reader
    // can rebuild regardless of order.
    let mut stack = vec![ROOT_INDEX];
    while let Some(index) = stack.pop() {
        let node = assembly.table.get(index);
        write_u32(out, index as u32)?;
        write_str(out, &node.name)?;
        write_u32(out, node.children.len() as u32)?;
        for &child in node.children.values() {
            write_u32(out, child as u32)?;
        }
        write_u32(out, node.depth)?;
        write_u32(out, node.parent as u32)?;
        match &node.metadata {
            Some(metadata) => {
                write_u8(out, 1)?;
                write_metadata(out, &assembly.arena, metadata)?;
            }
            None => write_u8(out, 0)?,
        }
        for &child in node.children.values() {
            stack.push(child);
        }
    }

    write_u32(out, assembly.il_payloads().len() as u32)?;
    for (&node_index, payload) in assembly.il_payloads() {
        write_u32(out, node_index)?;
        write_u32(out, payload.len() as u32)?;
        out.write_all(payload)?;
    }
    Ok(())
}

pub fn read_assembly(name: String, input: &mut impl Read) -> Result<Assembly, AssemblyError> {
    let mut magic = [0u8; 4];
    read_exact(input, &mut magic)?;
    if &magic != MAGIC {
        return Err(AssemblyError::Parse("bad magic".into()));
    }
    let version = read_u32(input)?;
    if version != VERSION {
        return Err(AssemblyError::UnsupportedVersion(version));
    }

    let count = read_u32(input)? as usize;
    if count == 0 {
        return Err(AssemblyError::Parse("empty symbol table".into()));
    }

    let mut arena = NodeArena::new();
    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        let index = read_u32(input)? as usize;
        let node_name = read_str(input)?;
        let child_count = read_u32(input)? as usize;
        if child_count > count {
            return Err(AssemblyError::Parse("child count exceeds node count".into()));
        }
        let mut children = Vec::with_capacity(child_count);
        for _ in 0..child_count {
            children.push(read_u32(input)? as usize);
        }
        let depth = read_u32(input)?;
        let parent = read_u32(input)? as usize;
        let metadata = if read_u8(input)? != 0 {
            Some(read_metadata(input, &mut arena, &node_name)?)
        } else {
            None
        };
        records.push((index, node_name, depth, parent, metadata, children));
    }

    let table = SymbolTable::from_records(records)
        .ok_or_else(|| AssemblyError::Parse("inconsistent symbol records".into()))?;

    let mut assembly = Assembly::create(name);
    assembly.table = table;
    assembly.arena = arena;

    let il_count = read_u32(input)? as usize;
    for _ in 0..il_count {
        let node_index = read_u32(input)?;
        let len = read_u32(input)? as usize;
        let mut payload = vec![0u8; len];
        read_exact(input, &mut payload)?;
        assembly.set_il(node_index, payload);
    }
    Ok(assembly)
}
