//! Symbol metadata stored on table nodes.

use glint_ast::NodeId;
use glint_ast::node::Access;

/// What a table node's symbol is.
///
/// `Scope` is not a real symbol: it marks block scopes created during
/// collection, and `SymbolTable::strip` removes them before serialization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SymbolKind {
    #[default]
    Unknown,
    Scope,
    Namespace,
    Struct,
    Class,
    Array,
    Pointer,
    Enum,
    EnumMember,
    Attribute,
    Primitive,
    Field,
    Function,
    Operator,
    Constructor,
    Parameter,
    Variable,
    Swizzle,
    This,
}

impl SymbolKind {
    pub fn describe(self) -> &'static str {
        match self {
            SymbolKind::Unknown => "unknown",
            SymbolKind::Scope => "scope",
            SymbolKind::Namespace => "namespace",
            SymbolKind::Struct => "struct",
            SymbolKind::Class => "class",
            SymbolKind::Array => "array",
            SymbolKind::Pointer => "pointer",
            SymbolKind::Enum => "enum",
            SymbolKind::EnumMember => "enum member",
            SymbolKind::Attribute => "attribute",
            SymbolKind::Primitive => "primitive",
            SymbolKind::Field => "field",
            SymbolKind::Function => "function",
            SymbolKind::Operator => "operator",
            SymbolKind::Constructor => "constructor",
            SymbolKind::Parameter => "parameter",
            SymbolKind::Variable => "variable",
            SymbolKind::Swizzle => "swizzle",
            SymbolKind::This => "this",
        }
    }

    pub fn from_u32(raw: u32) -> Option<SymbolKind> {
        use SymbolKind::*;
        Some(match raw {
            0 => Unknown,
            1 => Scope,
            2 => Namespace,
            3 => Struct,
            4 => Class,
            5 => Array,
            6 => Pointer,
            7 => Enum,
            8 => EnumMember,
            9 => Attribute,
            10 => Primitive,
            11 => Field,
            12 => Function,
            13 => Operator,
            14 => Constructor,
            15 => Parameter,
            16 => Variable,
            17 => Swizzle,
            18 => This,
            _ => return None,
        })
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.describe())
    }
}

/// The lexical scope a symbol was declared in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ScopeKind {
    #[default]
    Global,
    Namespace,
    Struct,
    Class,
    Enum,
    Function,
    Constructor,
    Operator,
    Block,
}

impl ScopeKind {
    pub fn from_u32(raw: u32) -> Option<ScopeKind> {
        use ScopeKind::*;
        Some(match raw {
            0 => Global,
            1 => Namespace,
            2 => Struct,
            3 => Class,
            4 => Enum,
            5 => Function,
            6 => Constructor,
            7 => Operator,
            8 => Block,
            _ => return None,
        })
    }
}

/// Metadata attached to declared symbols. Pure scope nodes carry none.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SymbolMetadata {
    pub kind: SymbolKind,
    pub scope: ScopeKind,
    pub access: Access,
    pub size: u32,
    /// The declaring AST node, interpreted in the owning assembly's arena.
    pub declaration: Option<NodeId>,
}

impl SymbolMetadata {
    pub fn new(kind: SymbolKind, scope: ScopeKind, access: Access, declaration: NodeId) -> Self {
        SymbolMetadata {
            kind,
            scope,
            access,
            size: 0,
            declaration: Some(declaration),
        }
    }

    /// Marker metadata for a block scope.
    pub fn scope_marker(scope: ScopeKind) -> Self {
        SymbolMetadata {
            kind: SymbolKind::Scope,
            scope,
            access: Access::Private,
            size: 0,
            declaration: None,
        }
    }

    pub fn is_scope_marker(&self) -> bool {
        self.kind == SymbolKind::Scope
    }
}
