//! Symbol collection.
//!
//! First analysis pass: walk the AST and insert every declared symbol into
//! the assembly's table under its lexical scope. Block statements get
//! synthetic `#blockN` scope nodes (stripped again before serialization).
//! Overloadable declarations are inserted under placeholder signatures;
//! the resolver renames them once parameter types are known.

use crate::scopes::ScopeStack;
use glint_ast::node::Access;
use glint_ast::{
    AstVisitor, NodeArena, NodeData, NodeId, OverloadKey, SigOwner, VisitAction, traverse,
};
use glint_common::{DiagnosticBag, diagnostic_codes};
use glint_symbols::{ScopeKind, SymbolKind, SymbolMetadata, SymbolTable};
use tracing::debug;

pub struct SymbolCollector<'a> {
    table: &'a mut SymbolTable,
    diagnostics: &'a mut DiagnosticBag,
    scopes: ScopeStack,
}

/// Collect all declarations of `root` into the assembly's symbol table.
pub fn collect(
    assembly: &mut glint_symbols::Assembly,
    root: NodeId,
    diagnostics: &mut DiagnosticBag,
) {
    let (table, arena) = assembly.parts_mut();
    let mut collector = SymbolCollector {
        table,
        diagnostics,
        scopes: ScopeStack::new(),
    };
    traverse(arena, root, &mut collector);
}

impl SymbolCollector<'_> {
    fn redefinition(&mut self, arena: &NodeArena, node: NodeId, name: &str) {
        self.diagnostics.error(
            diagnostic_codes::REDEFINITION,
            arena.get(node).span,
            format!("redefinition of symbol '{name}'"),
        );
    }

    /// Insert a leaf symbol under the current scope.
    fn insert_leaf(
        &mut self,
        arena: &NodeArena,
        node: NodeId,
        name: &str,
        kind: SymbolKind,
        access: Access,
    ) -> usize {
        let metadata = SymbolMetadata {
            kind,
            scope: self.scopes.current().kind,
            access,
            size: 0,
            declaration: Some(node),
        };
        let index = self
            .table
            .insert(name, metadata, self.scopes.current().table_index);
        if index == 0 {
            self.redefinition(arena, node, name);
        }
        index
    }

    /// Insert a symbol and enter its scope.
    fn insert_scope(
        &mut self,
        arena: &NodeArena,
        node: NodeId,
        name: &str,
        kind: SymbolKind,
        access: Access,
        scope_kind: ScopeKind,
    ) {
        let index = self.insert_leaf(arena, node, name, kind, access);
        if index != 0 {
            self.scopes.push(node, index, scope_kind);
        }
    }

    fn placeholder_signature(&self, arena: &NodeArena, node: NodeId) -> Option<String> {
        let key = match &arena.get(node).data {
            NodeData::Function {
                name, parameters, ..
            } => OverloadKey::placeholder(SigOwner::Function(name.as_str().into()), parameters),
            NodeData::OperatorDecl { op, parameters, .. } => {
                OverloadKey::placeholder(SigOwner::Operator(*op), parameters)
            }
            NodeData::Constructor {
                name, parameters, ..
            } => OverloadKey::placeholder(SigOwner::Function(name.as_str().into()), parameters),
            _ => return None,
        };
        Some(key.render())
    }
}

impl AstVisitor for SymbolCollector<'_> {
    type DeferCtx = ();

    fn visit(
        &mut self,
        arena: &mut NodeArena,
        node: &mut NodeId,
        _depth: usize,
        _deferred: Option<&()>,
    ) -> VisitAction<()> {
        let id = *node;
        match &arena.get(id).data {
            NodeData::Namespace { path, .. } => {
                let dotted = path
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(".");
                let metadata = SymbolMetadata {
                    kind: SymbolKind::Namespace,
                    scope: self.scopes.current().kind,
                    access: Access::Public,
                    size: 0,
                    declaration: Some(id),
                };
                let parent = self.scopes.current().table_index;
                let mut index = self.table.insert(&dotted, metadata, parent);
                if index == 0 {
                    // Namespaces may be re-opened across compilation units.
                    match self.table.find_full_path(&dotted, parent) {
                        Some(existing)
                            if self.table.get(existing).metadata.as_ref().is_some_and(|m| {
                                m.kind == SymbolKind::Namespace
                            }) =>
                        {
                            index = existing;
                        }
                        _ => {
                            self.redefinition(arena, id, &dotted);
                            return VisitAction::Skip;
                        }
                    }
                }
                debug!(namespace = %dotted, index, "entering namespace");
                self.scopes.push(id, index, ScopeKind::Namespace);
                self.scopes.set_namespace(id);
            }
            NodeData::Struct { name, access, .. } => {
                let (name, access) = (name.as_str(), *access);
                self.insert_scope(arena, id, name, SymbolKind::Struct, access, ScopeKind::Struct);
            }
            NodeData::Class { name, access, .. } => {
                let (name, access) = (name.as_str(), *access);
                self.insert_scope(arena, id, name, SymbolKind::Class, access, ScopeKind::Class);
            }
            NodeData::Enum { name, access, .. } => {
                let (name, access) = (name.as_str(), *access);
                self.insert_scope(arena, id, name, SymbolKind::Enum, access, ScopeKind::Enum);
            }
            NodeData::EnumMember { name, .. } => {
                let name = name.as_str();
                self.insert_leaf(arena, id, name, SymbolKind::EnumMember, Access::Public);
            }
            NodeData::Field { name, access, .. } => {
                let (name, access) = (name.as_str(), *access);
                self.insert_leaf(arena, id, name, SymbolKind::Field, access);
            }
            NodeData::Function { access, .. } => {
                let access = *access;
                if let Some(signature) = self.placeholder_signature(arena, id) {
                    self.insert_scope(
                        arena,
                        id,
                        &signature,
                        SymbolKind::Function,
                        access,
                        ScopeKind::Function,
                    );
                }
            }
            NodeData::OperatorDecl { access, .. } => {
                let access = *access;
                if let Some(signature) = self.placeholder_signature(arena, id) {
                    self.insert_scope(
                        arena,
                        id,
                        &signature,
                        SymbolKind::Operator,
                        access,
                        ScopeKind::Operator,
                    );
                }
            }
            NodeData::Constructor { access, .. } => {
                let access = *access;
                if let Some(signature) = self.placeholder_signature(arena, id) {
                    self.insert_scope(
                        arena,
                        id,
                        &signature,
                        SymbolKind::Constructor,
                        access,
                        ScopeKind::Constructor,
                    );
                }
            }
            NodeData::Parameter { name, .. } => {
                let name = name.as_str();
                self.insert_leaf(arena, id, name, SymbolKind::Parameter, Access::Private);
            }
            NodeData::ThisDef { .. } => {
                self.insert_leaf(arena, id, "this", SymbolKind::This, Access::Private);
            }
            NodeData::BlockStatement { .. } => {
                let name = self.scopes.next_block_name();
                let metadata = SymbolMetadata::scope_marker(self.scopes.current().kind);
                let index = self
                    .table
                    .insert(&name, metadata, self.scopes.current().table_index);
                if index == 0 {
                    self.redefinition(arena, id, &name);
                } else {
                    self.scopes.push(id, index, ScopeKind::Block);
                }
            }
            NodeData::DeclarationStatement { name, .. } => {
                let name = name.as_str();
                self.insert_leaf(arena, id, name, SymbolKind::Variable, Access::Private);
            }
            _ => {}
        }
        VisitAction::Keep
    }

    fn leave(&mut self, _arena: &mut NodeArena, node: NodeId, _depth: usize) {
        self.scopes.pop_if_owner(node);
    }
}
