//! Symbol references - use sites awaiting resolution.

use glint_common::{Istr, Span, SymbolHandle};
use smallvec::SmallVec;

/// What kind of definition a reference expects to resolve to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefKind {
    Namespace,
    Function,
    Operator,
    Constructor,
    FunctionOrConstructor,
    Struct,
    Class,
    Enum,
    /// A value name: field, parameter, or local variable.
    Identifier,
    Attribute,
    /// A member on the left-hand type of a chain: field or swizzle.
    Member,
    Type,
    ArrayType,
    This,
    Any,
}

/// Resolution state of a reference.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RefState {
    #[default]
    Unresolved,
    Resolved(SymbolHandle),
    NotFound,
    Deferred,
}

/// A use site of a name. Array-typed refs additionally carry constant
/// dimensions.
#[derive(Clone, Debug)]
pub struct SymbolRef {
    pub name: Istr,
    pub kind: RefKind,
    pub span: Span,
    pub state: RefState,
    /// True when the name is already a dotted, fully-qualified path.
    pub fully_qualified: bool,
    pub array_dims: SmallVec<[u32; 2]>,
}

impl SymbolRef {
    pub fn new(name: Istr, kind: RefKind, span: Span) -> Self {
        SymbolRef {
            name,
            kind,
            span,
            state: RefState::Unresolved,
            fully_qualified: false,
            array_dims: SmallVec::new(),
        }
    }

    pub fn fully_qualified(name: Istr, kind: RefKind, span: Span) -> Self {
        SymbolRef {
            fully_qualified: true,
            ..SymbolRef::new(name, kind, span)
        }
    }

    pub fn array(name: Istr, span: Span, dims: &[u32]) -> Self {
        SymbolRef {
            array_dims: SmallVec::from_slice(dims),
            ..SymbolRef::new(name, RefKind::ArrayType, span)
        }
    }

    #[inline]
    pub fn is_resolved(&self) -> bool {
        matches!(self.state, RefState::Resolved(_))
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        self.state == RefState::NotFound
    }

    /// The handle this ref resolved to, if any.
    pub fn handle(&self) -> Option<&SymbolHandle> {
        match &self.state {
            RefState::Resolved(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn resolve_to(&mut self, handle: SymbolHandle) {
        self.state = RefState::Resolved(handle);
    }

    pub fn mark_not_found(&mut self) {
        self.state = RefState::NotFound;
    }

    pub fn mark_deferred(&mut self) {
        self.state = RefState::Deferred;
    }
}
