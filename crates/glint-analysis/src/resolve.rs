//! Symbol resolution.
//!
//! Second analysis pass: every `SymbolRef` is resolved by name lookup with
//! the scope, namespace, using, and assembly-reference search paths, in that
//! order:
//!
//! 1. the primitive assembly,
//! 2. the local assembly at the current scope, walking outward,
//! 3. the current namespace in each referenced assembly,
//! 4. non-aliased `using`s of the current namespace,
//! 5. `using`s at compilation-unit scope.
//!
//! Member-access chains resolve left-to-right against the left-hand type's
//! table entry; a chain whose left-hand type is not resolved yet returns
//! `Defer` and is re-visited once the main walk is done. Missing members on
//! non-matrix primitives go through swizzle synthesis.

use crate::scopes::{ScopeFrame, ScopeStack};
use glint_ast::{
    AstVisitor, ExprKind, NodeArena, NodeData, NodeId, NodeKind, OverloadKey, RefId, RefKind,
    SigOwner, SymbolRef, VisitAction, traverse,
};
use glint_common::{AssemblyId, DiagnosticBag, SymbolHandle, diagnostic_codes};
use glint_symbols::{
    ARRAY_ASSEMBLY, ArrayManager, Assembly, AssemblyCollection, POINTER_ASSEMBLY, ROOT_INDEX,
    SWIZZLE_ASSEMBLY, SwizzleManager, SymbolKind, SymbolMetadata, SymbolTable, TARGET_ASSEMBLY,
    arrays::can_form_array_over, primitives,
};
use tracing::{debug, trace};

/// Scope snapshot captured when a member chain defers.
pub struct ResolverDeferral {
    scopes: (ScopeFrame, Vec<ScopeFrame>),
}

/// One `using` directive, resolved to its target nodes per assembly.
struct UsingTarget {
    roots: Vec<(AssemblyId, usize)>,
}

/// Per-namespace lookup context.
struct NamespaceCtx {
    assembly_refs: Vec<(AssemblyId, usize)>,
    usings: Vec<UsingTarget>,
}

pub struct SymbolResolver<'a> {
    table: &'a mut SymbolTable,
    references: &'a AssemblyCollection,
    swizzles: &'a mut SwizzleManager,
    arrays: &'a mut ArrayManager,
    diagnostics: &'a mut DiagnosticBag,
    scopes: ScopeStack,
    namespaces: Vec<NamespaceCtx>,
    unit_usings: Vec<UsingTarget>,
}

/// Resolve all references under `root` in the target assembly.
pub fn resolve(
    assembly: &mut Assembly,
    root: NodeId,
    references: &AssemblyCollection,
    swizzles: &mut SwizzleManager,
    arrays: &mut ArrayManager,
    diagnostics: &mut DiagnosticBag,
) {
    let (table, arena) = assembly.parts_mut();
    let mut resolver = SymbolResolver {
        table,
        references,
        swizzles,
        arrays,
        diagnostics,
        scopes: ScopeStack::new(),
        namespaces: Vec::new(),
        unit_usings: Vec::new(),
    };
    traverse(arena, root, &mut resolver);
}

/// Resolve the references of a loaded assembly against the primitive
/// catalog and its own table. Loaded references are fully qualified, so a
/// root-relative lookup is sufficient. Run once after `Assembly::load`.
pub fn resolve_external(assembly: &mut Assembly, id: AssemblyId) {
    let mut resolutions: Vec<(usize, SymbolHandle)> = Vec::new();
    for (ref_index, symbol_ref) in assembly.arena.refs().enumerate() {
        if symbol_ref.is_resolved() {
            continue;
        }
        let name = symbol_ref.name.as_str();
        let handle = if let Some(index) = primitives().table.find_full_path(name, ROOT_INDEX) {
            Some(primitives().make_handle(AssemblyId::PRIMITIVES, index))
        } else {
            assembly
                .table
                .find_full_path(name, ROOT_INDEX)
                .map(|index| assembly.make_handle(id, index))
        };
        if let Some(handle) = handle {
            resolutions.push((ref_index, handle));
        }
    }
    for (ref_index, handle) in resolutions {
        if let Some(symbol_ref) = assembly.arena.refs_mut().nth(ref_index) {
            symbol_ref.resolve_to(handle);
        }
    }
}

/// The kind-compatibility table: which definition kinds satisfy a reference
/// of a given expectation.
pub fn kind_accepts(expected: RefKind, actual: SymbolKind) -> bool {
    use SymbolKind as S;
    match expected {
        RefKind::Namespace => actual == S::Namespace,
        RefKind::Function => actual == S::Function,
        RefKind::Operator => actual == S::Operator,
        RefKind::Constructor => actual == S::Constructor,
        RefKind::FunctionOrConstructor => matches!(actual, S::Function | S::Constructor),
        RefKind::Struct => matches!(actual, S::Struct | S::Primitive),
        RefKind::Class => actual == S::Class,
        RefKind::Enum => actual == S::Enum,
        RefKind::Identifier => {
            matches!(actual, S::Field | S::Parameter | S::Variable | S::This | S::EnumMember)
        }
        RefKind::Attribute => actual == S::Attribute,
        RefKind::Member => matches!(actual, S::Field | S::Swizzle),
        RefKind::Type => matches!(
            actual,
            S::Struct | S::Primitive | S::Class | S::Enum | S::Array | S::Pointer
        ),
        RefKind::ArrayType => actual == S::Array,
        RefKind::This => actual == S::This,
        RefKind::Any => true,
    }
}

enum MemberStep {
    Done,
    Defer,
    Fail,
}

impl<'a> SymbolResolver<'a> {
    // -- assembly plumbing --------------------------------------------------

    fn table_of(&self, id: AssemblyId) -> Option<&SymbolTable> {
        match id {
            AssemblyId::PRIMITIVES => Some(&primitives().table),
            TARGET_ASSEMBLY => Some(&*self.table),
            SWIZZLE_ASSEMBLY => Some(&self.swizzles.assembly().table),
            ARRAY_ASSEMBLY => Some(&self.arrays.assembly().table),
            POINTER_ASSEMBLY => None,
            other => self.references.get(other).map(|a| &a.table),
        }
    }

    /// Arena holding definitions of `id`, with the target's passed in by the
    /// caller (it is the one under mutation).
    fn arena_of<'s>(&'s self, id: AssemblyId, target_arena: &'s NodeArena) -> Option<&'s NodeArena> {
        match id {
            AssemblyId::PRIMITIVES => Some(&primitives().arena),
            TARGET_ASSEMBLY => Some(target_arena),
            SWIZZLE_ASSEMBLY => Some(&self.swizzles.assembly().arena),
            ARRAY_ASSEMBLY => Some(&self.arrays.assembly().arena),
            POINTER_ASSEMBLY => None,
            other => self.references.get(other).map(|a| &a.arena),
        }
    }

    fn metadata_of(&self, handle: &SymbolHandle) -> Option<SymbolMetadata> {
        let id = handle.assembly()?;
        let index = handle.index()?;
        self.table_of(id)?.get(index).metadata.clone()
    }

    fn fqn_of(&self, handle: &SymbolHandle) -> Option<String> {
        let id = handle.assembly()?;
        let index = handle.index()?;
        Some(self.table_of(id)?.fully_qualified_name(index))
    }

    // -- the lookup order ---------------------------------------------------

    fn resolve_name(&self, name: &str) -> Option<(AssemblyId, usize)> {
        if let Some(index) = primitives().table.find_full_path(name, ROOT_INDEX) {
            return Some((AssemblyId::PRIMITIVES, index));
        }
        for frame in self.scopes.frames_outward() {
            if let Some(index) = self.table.find_full_path(name, frame.table_index) {
                return Some((TARGET_ASSEMBLY, index));
            }
        }
        if let Some(ctx) = self.namespaces.last() {
            for &(id, ns_index) in &ctx.assembly_refs {
                if let Some(table) = self.table_of(id) {
                    if let Some(index) = table.find_full_path(name, ns_index) {
                        return Some((id, index));
                    }
                }
            }
            for using in &ctx.usings {
                for &(id, root) in &using.roots {
                    if let Some(table) = self.table_of(id) {
                        if let Some(index) = table.find_full_path(name, root) {
                            return Some((id, index));
                        }
                    }
                }
            }
        }
        for using in &self.unit_usings {
            for &(id, root) in &using.roots {
                if let Some(table) = self.table_of(id) {
                    if let Some(index) = table.find_full_path(name, root) {
                        return Some((id, index));
                    }
                }
            }
        }
        None
    }

    fn handle_for(&self, id: AssemblyId, index: usize) -> Option<SymbolHandle> {
        Some(match id {
            TARGET_ASSEMBLY => self.table.make_handle(TARGET_ASSEMBLY, index),
            _ => self.table_of(id)?.make_handle(id, index),
        })
    }

    fn sanity_check(&mut self, arena: &NodeArena, ref_id: RefId, metadata: &SymbolMetadata) -> bool {
        let symbol_ref = arena.symbol_ref(ref_id);
        if kind_accepts(symbol_ref.kind, metadata.kind) {
            return true;
        }
        self.diagnostics.error(
            diagnostic_codes::SYMBOL_KIND_MISMATCH,
            symbol_ref.span,
            format!(
                "symbol '{}' is a {}, but a {:?} was expected",
                symbol_ref.name, metadata.kind, symbol_ref.kind
            ),
        );
        false
    }

    /// Resolve one reference. Returns true when the ref ends up resolved.
    fn resolve_ref(&mut self, arena: &mut NodeArena, ref_id: RefId) -> bool {
        if arena.symbol_ref(ref_id).is_resolved() {
            return true;
        }
        if arena.symbol_ref(ref_id).kind == RefKind::ArrayType {
            return self.resolve_array_ref(arena, ref_id);
        }
        let name = arena.symbol_ref(ref_id).name;
        match self.resolve_name(name.as_str()) {
            Some((id, index)) => {
                let Some(metadata) = self
                    .table_of(id)
                    .and_then(|t| t.get(index).metadata.clone())
                else {
                    return false;
                };
                if !self.sanity_check(arena, ref_id, &metadata) {
                    return false;
                }
                if let Some(handle) = self.handle_for(id, index) {
                    trace!(name = %name, assembly = ?id, index, "resolved");
                    arena.symbol_ref_mut(ref_id).resolve_to(handle);
                    true
                } else {
                    false
                }
            }
            None => {
                let span = arena.symbol_ref(ref_id).span;
                self.diagnostics.error(
                    diagnostic_codes::SYMBOL_NOT_FOUND,
                    span,
                    format!("symbol not found '{name}'"),
                );
                arena.symbol_ref_mut(ref_id).mark_not_found();
                false
            }
        }
    }

    /// Array-typed refs resolve their element, then synthesize (or reuse)
    /// the array definition carrying the constant dimensions.
    fn resolve_array_ref(&mut self, arena: &mut NodeArena, ref_id: RefId) -> bool {
        let name = arena.symbol_ref(ref_id).name;
        let dims: Vec<u32> = arena.symbol_ref(ref_id).array_dims.to_vec();
        let span = arena.symbol_ref(ref_id).span;
        let Some((id, index)) = self.resolve_name(name.as_str()) else {
            self.diagnostics.error(
                diagnostic_codes::SYMBOL_NOT_FOUND,
                span,
                format!("symbol not found '{name}'"),
            );
            arena.symbol_ref_mut(ref_id).mark_not_found();
            return false;
        };
        let Some(metadata) = self.table_of(id).and_then(|t| t.get(index).metadata.clone()) else {
            return false;
        };
        if !can_form_array_over(metadata.kind) {
            self.diagnostics.error(
                diagnostic_codes::SYMBOL_KIND_MISMATCH,
                span,
                format!("symbol '{name}' is a {}, which cannot be an array element", metadata.kind),
            );
            return false;
        }
        let Some(element_fqn) = self.table_of(id).map(|t| t.fully_qualified_name(index)) else {
            return false;
        };
        match self.arrays.get_or_create(&element_fqn, &dims) {
            Some((handle, _)) => {
                arena.symbol_ref_mut(ref_id).resolve_to(handle);
                true
            }
            None => false,
        }
    }

    // -- use-before-declaration and self-initializer ------------------------

    fn order_checks(&mut self, arena: &NodeArena, ref_id: RefId, usage: NodeId) {
        let Some(handle) = arena.symbol_ref(ref_id).handle() else {
            return;
        };
        if handle.assembly() != Some(TARGET_ASSEMBLY) {
            return;
        }
        let Some(metadata) = self.metadata_of(handle) else {
            return;
        };
        if metadata.kind != SymbolKind::Variable {
            return;
        }
        let Some(decl) = metadata.declaration else {
            return;
        };
        let name = arena.symbol_ref(ref_id).name;
        let span = arena.symbol_ref(ref_id).span;

        // A reference inside the variable's own initializer is legal only
        // from within a nested initializer list.
        let mut inside_decl = usage == decl;
        let mut initializer_lists = 0usize;
        for ancestor in arena.ancestors(usage) {
            if ancestor == decl {
                inside_decl = true;
                break;
            }
            if arena.get(ancestor).kind == NodeKind::InitializerListExpr {
                initializer_lists += 1;
            }
        }
        if inside_decl {
            if initializer_lists == 0 {
                self.diagnostics.error(
                    diagnostic_codes::SELF_INITIALIZER,
                    span,
                    format!("variable '{name}' referenced in its own initializer"),
                );
            }
            return;
        }
        if usage < decl {
            self.diagnostics.error(
                diagnostic_codes::USE_BEFORE_DECLARATION,
                span,
                format!("use of variable '{name}' before its declaration"),
            );
        }
    }

    // -- member chains ------------------------------------------------------

    /// The resolved handle of the declared *type* of whatever `ref_id`
    /// resolved to: a field's type, a parameter's type, a variable's type,
    /// a swizzle's result type.
    fn declared_type_handle(
        &self,
        target_arena: &NodeArena,
        ref_id: RefId,
        arena_for_ref: &NodeArena,
    ) -> Result<SymbolHandle, MemberStep> {
        let symbol_ref = arena_for_ref.symbol_ref(ref_id);
        let Some(handle) = symbol_ref.handle() else {
            return Err(MemberStep::Fail);
        };
        let Some(metadata) = self.metadata_of(handle) else {
            return Err(MemberStep::Fail);
        };
        let Some(decl) = metadata.declaration else {
            return Err(MemberStep::Fail);
        };
        let Some(id) = handle.assembly() else {
            return Err(MemberStep::Fail);
        };
        let Some(decl_arena) = self.arena_of(id, target_arena) else {
            return Err(MemberStep::Fail);
        };
        let type_ref = match &decl_arena.get(decl).data {
            NodeData::Field { ty, .. }
            | NodeData::Parameter { ty, .. }
            | NodeData::DeclarationStatement { ty, .. }
            | NodeData::SwizzleDef { ty, .. }
            | NodeData::ThisDef { ty } => *ty,
            _ => return Err(MemberStep::Fail),
        };
        match decl_arena.symbol_ref(type_ref).handle() {
            Some(type_handle) => Ok(type_handle.clone()),
            // The declared type exists but has not been resolved yet: defer.
            None => Err(MemberStep::Defer),
        }
    }

    fn resolve_member_segment(
        &mut self,
        arena: &mut NodeArena,
        type_handle: &SymbolHandle,
        seg_ref: RefId,
    ) -> MemberStep {
        let Some(type_assembly) = type_handle.assembly() else {
            return MemberStep::Defer;
        };
        let Some(type_index) = type_handle.index() else {
            return MemberStep::Defer;
        };
        let name = arena.symbol_ref(seg_ref).name;
        let found = self
            .table_of(type_assembly)
            .and_then(|t| t.find_part(name.as_str(), type_index));
        if let Some(member_index) = found {
            let Some(metadata) = self
                .table_of(type_assembly)
                .and_then(|t| t.get(member_index).metadata.clone())
            else {
                return MemberStep::Fail;
            };
            if !self.sanity_check(arena, seg_ref, &metadata) {
                return MemberStep::Fail;
            }
            if let Some(handle) = self.handle_for(type_assembly, member_index) {
                arena.symbol_ref_mut(seg_ref).resolve_to(handle);
                return MemberStep::Done;
            }
            return MemberStep::Fail;
        }

        // Missing member on a primitive: try swizzle synthesis.
        let Some(type_meta) = self.metadata_of(type_handle) else {
            return MemberStep::Fail;
        };
        if type_meta.kind == SymbolKind::Primitive {
            let info = type_meta.declaration.and_then(|decl| {
                glint_symbols::primitive_info(&primitives().arena, decl)
            });
            if let Some(info) = info {
                if let Some(handle) = self.swizzles.verify(&info, name.as_str()) {
                    arena.symbol_ref_mut(seg_ref).resolve_to(handle);
                    return MemberStep::Done;
                }
                let span = arena.symbol_ref(seg_ref).span;
                self.diagnostics.error(
                    diagnostic_codes::INVALID_SWIZZLE,
                    span,
                    format!("invalid swizzle pattern '{name}' for type '{}'", info.name()),
                );
                return MemberStep::Fail;
            }
        }
        MemberStep::Fail
    }

    fn resolve_member_chain(
        &mut self,
        arena: &mut NodeArena,
        node: NodeId,
    ) -> VisitAction<ResolverDeferral> {
        let (root_ref, mut next) = match arena.get(node).expr().map(|e| &e.kind) {
            Some(ExprKind::MemberAccess { symbol, next }) => (*symbol, *next),
            _ => return VisitAction::Keep,
        };
        if !self.resolve_ref(arena, root_ref) {
            return VisitAction::Keep;
        }
        self.order_checks(arena, root_ref, node);

        let mut current_ref = root_ref;
        while let Some(segment) = next {
            let seg_ref = match arena.get(segment).expr().map(|e| &e.kind) {
                Some(ExprKind::MemberAccess { symbol, next: n }) => {
                    let seg = *symbol;
                    next = *n;
                    seg
                }
                _ => {
                    let span = arena.get(segment).span;
                    self.diagnostics.error(
                        diagnostic_codes::MEMBER_NOT_FOUND,
                        span,
                        "couldn't resolve member chain".to_string(),
                    );
                    return VisitAction::Keep;
                }
            };
            if arena.symbol_ref(seg_ref).is_resolved() {
                current_ref = seg_ref;
                continue;
            }
            let type_handle = match self.declared_type_handle(arena, current_ref, arena) {
                Ok(handle) => handle,
                Err(MemberStep::Defer) => {
                    arena.symbol_ref_mut(seg_ref).mark_deferred();
                    debug!("member chain deferred: left-hand type unresolved");
                    return VisitAction::Defer(ResolverDeferral {
                        scopes: self.scopes.snapshot(),
                    });
                }
                Err(_) => {
                    let r = arena.symbol_ref(current_ref);
                    let (span, name) = (r.span, r.name);
                    self.diagnostics.error(
                        diagnostic_codes::MEMBER_TYPE_UNRESOLVED,
                        span,
                        format!("couldn't resolve type of member '{name}'"),
                    );
                    return VisitAction::Keep;
                }
            };
            match self.resolve_member_segment(arena, &type_handle, seg_ref) {
                MemberStep::Done => current_ref = seg_ref,
                MemberStep::Defer => {
                    arena.symbol_ref_mut(seg_ref).mark_deferred();
                    return VisitAction::Defer(ResolverDeferral {
                        scopes: self.scopes.snapshot(),
                    });
                }
                MemberStep::Fail => {
                    let r = arena.symbol_ref(seg_ref);
                    if !self.diagnostics.is_saturated() && !r.is_not_found() {
                        let (span, name) = (r.span, r.name);
                        self.diagnostics.error(
                            diagnostic_codes::MEMBER_NOT_FOUND,
                            span,
                            format!("couldn't resolve member '{name}'"),
                        );
                    }
                    arena.symbol_ref_mut(seg_ref).mark_not_found();
                    return VisitAction::Keep;
                }
            }
        }
        VisitAction::Keep
    }

    // -- scope entry helpers ------------------------------------------------

    fn enter_named_scope(
        &mut self,
        node: NodeId,
        name: &str,
        kind: glint_symbols::ScopeKind,
    ) -> bool {
        // Signature names may embed dotted FQNs, so try the name as a single
        // segment before walking it as a path (namespaces are dotted paths).
        let current = self.scopes.current().table_index;
        let found = self
            .table
            .find_part(name, current)
            .or_else(|| self.table.find_full_path(name, current));
        match found {
            Some(index) => {
                self.scopes.push(node, index, kind);
                true
            }
            None => false,
        }
    }

    fn resolve_using_targets(&self, path: &str) -> UsingTarget {
        let mut roots = Vec::new();
        if let Some(index) = self.table.find_full_path(path, ROOT_INDEX) {
            roots.push((TARGET_ASSEMBLY, index));
        }
        for (id, assembly) in self.references.iter() {
            if let Some(index) = assembly.table.find_full_path(path, ROOT_INDEX) {
                roots.push((id, index));
            }
        }
        UsingTarget { roots }
    }

    fn enter_namespace(&mut self, arena: &NodeArena, node: NodeId) {
        let NodeData::Namespace { path, usings, .. } = &arena.get(node).data else {
            return;
        };
        let dotted = path
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(".");
        if !self.enter_named_scope(node, &dotted, glint_symbols::ScopeKind::Namespace) {
            return;
        }
        self.scopes.set_namespace(node);

        let mut assembly_refs = Vec::new();
        for (id, assembly) in self.references.iter() {
            if let Some(index) = assembly.table.find_full_path(&dotted, ROOT_INDEX) {
                assembly_refs.push((id, index));
            }
        }
        let mut using_targets = Vec::new();
        for &using in usings {
            if let NodeData::UsingDecl { path, alias } = &arena.get(using).data {
                if alias.is_some() {
                    continue;
                }
                using_targets.push(self.resolve_using_targets(path.as_str()));
            }
        }
        self.namespaces.push(NamespaceCtx {
            assembly_refs,
            usings: using_targets,
        });
    }

    fn enter_unit(&mut self, arena: &NodeArena, node: NodeId) {
        let NodeData::CompilationUnit { usings, .. } = &arena.get(node).data else {
            return;
        };
        for &using in usings {
            if let NodeData::UsingDecl { path, alias } = &arena.get(using).data {
                if alias.is_some() {
                    continue;
                }
                self.unit_usings.push(self.resolve_using_targets(path.as_str()));
            }
        }
    }

    /// Rename an overloadable declaration's table node from its placeholder
    /// signature to the real one once parameter types are resolved.
    fn rename_signature(&mut self, arena: &NodeArena, node: NodeId, table_index: usize) {
        let real = match &arena.get(node).data {
            NodeData::Function {
                name, parameters, ..
            } => {
                let args = self.param_fqns(arena, parameters);
                args.map(|args| OverloadKey::function(name.as_str(), args))
            }
            NodeData::Constructor {
                name, parameters, ..
            } => {
                let args = self.param_fqns(arena, parameters);
                args.map(|args| OverloadKey::function(name.as_str(), args))
            }
            NodeData::OperatorDecl {
                op: glint_ast::Operator::Cast,
                return_type,
                parameters,
                ..
            } => {
                let target = arena
                    .symbol_ref(*return_type)
                    .handle()
                    .and_then(|h| self.fqn_of(h));
                let args = self.param_fqns(arena, parameters);
                match (target, args) {
                    (Some(target), Some(args)) => Some(OverloadKey {
                        owner: SigOwner::Cast { target_fqn: target },
                        arg_fqns: args,
                        placeholder: false,
                    }),
                    _ => None,
                }
            }
            NodeData::OperatorDecl { op, parameters, .. } => {
                let args = self.param_fqns(arena, parameters);
                args.map(|args| OverloadKey::operator(*op, args))
            }
            _ => None,
        };
        let Some(key) = real else { return };
        let rendered = key.render();
        if self.table.get(table_index).name != rendered && !self.table.rename(table_index, &rendered)
        {
            let span = arena.get(node).span;
            self.diagnostics.error(
                diagnostic_codes::REDEFINITION,
                span,
                format!("redefinition of symbol '{rendered}'"),
            );
        }
    }

    fn param_fqns(&self, arena: &NodeArena, parameters: &[NodeId]) -> Option<Vec<String>> {
        let mut out = Vec::with_capacity(parameters.len());
        for &param in parameters {
            let NodeData::Parameter { ty, .. } = &arena.get(param).data else {
                return None;
            };
            let handle = arena.symbol_ref(*ty).handle()?;
            out.push(self.fqn_of(handle)?);
        }
        Some(out)
    }

    fn scope_entry_name(&self, arena: &NodeArena, node: NodeId) -> Option<String> {
        // Scopes were created by the collector under placeholder signatures;
        // re-derive the same name.
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

impl AstVisitor for SymbolResolver<'_> {
    type DeferCtx = ResolverDeferral;

    fn visit(
        &mut self,
        arena: &mut NodeArena,
        node: &mut NodeId,
        _depth: usize,
        deferred: Option<&ResolverDeferral>,
    ) -> VisitAction<ResolverDeferral> {
        let id = *node;
        match arena.get(id).kind {
            NodeKind::CompilationUnit => self.enter_unit(arena, id),
            NodeKind::Namespace => self.enter_namespace(arena, id),
            NodeKind::Struct | NodeKind::Class | NodeKind::Enum => {
                if let Some(name) = arena.get(id).name() {
                    let kind = match arena.get(id).kind {
                        NodeKind::Struct => glint_symbols::ScopeKind::Struct,
                        NodeKind::Class => glint_symbols::ScopeKind::Class,
                        _ => glint_symbols::ScopeKind::Enum,
                    };
                    self.enter_named_scope(id, name.as_str(), kind);
                }
            }
            NodeKind::Field => {
                if let NodeData::Field { ty, .. } = &arena.get(id).data {
                    let ty = *ty;
                    self.resolve_ref(arena, ty);
                }
            }
            NodeKind::Function => {
                if let NodeData::Function { return_type, .. } = &arena.get(id).data {
                    let return_type = *return_type;
                    self.resolve_ref(arena, return_type);
                }
                if let Some(name) = self.scope_entry_name(arena, id) {
                    self.enter_named_scope(id, &name, glint_symbols::ScopeKind::Function);
                }
            }
            NodeKind::OperatorDecl => {
                if let NodeData::OperatorDecl { return_type, .. } = &arena.get(id).data {
                    let return_type = *return_type;
                    self.resolve_ref(arena, return_type);
                }
                if let Some(name) = self.scope_entry_name(arena, id) {
                    self.enter_named_scope(id, &name, glint_symbols::ScopeKind::Operator);
                }
            }
            NodeKind::Constructor => {
                if let Some(name) = self.scope_entry_name(arena, id) {
                    self.enter_named_scope(id, &name, glint_symbols::ScopeKind::Constructor);
                }
            }
            NodeKind::Parameter => {
                if let NodeData::Parameter { ty, .. } = &arena.get(id).data {
                    let ty = *ty;
                    self.resolve_ref(arena, ty);
                }
            }
            NodeKind::ThisDef => {
                if let NodeData::ThisDef { ty } = &arena.get(id).data {
                    let ty = *ty;
                    self.resolve_ref(arena, ty);
                }
            }
            NodeKind::BlockStatement => {
                let name = self.scopes.next_block_name();
                self.enter_named_scope(id, &name, glint_symbols::ScopeKind::Block);
            }
            NodeKind::DeclarationStatement => {
                if let NodeData::DeclarationStatement { ty, .. } = &arena.get(id).data {
                    let ty = *ty;
                    self.resolve_ref(arena, ty);
                }
            }
            NodeKind::AttributeDecl => {
                if let NodeData::AttributeDecl { target, .. } = &arena.get(id).data {
                    let target = *target;
                    self.resolve_ref(arena, target);
                }
            }
            NodeKind::SymbolRefExpr => {
                if let Some(ExprKind::SymbolRef { symbol }) = arena.get(id).expr().map(|e| e.kind.clone())
                {
                    if self.resolve_ref(arena, symbol) {
                        self.order_checks(arena, symbol, id);
                    }
                }
            }
            NodeKind::CastExpr => {
                if let Some(ExprKind::Cast { ty, .. }) = arena.get(id).expr().map(|e| e.kind.clone()) {
                    self.resolve_ref(arena, ty);
                }
            }
            NodeKind::MemberAccessExpr => {
                if let Some(ctx) = deferred {
                    self.scopes.restore(&ctx.scopes);
                }
                return self.resolve_member_chain(arena, id);
            }
            _ => {}
        }
        VisitAction::Keep
    }

    fn leave(&mut self, arena: &mut NodeArena, node: NodeId, _depth: usize) {
        let owned = self.scopes.current().owner == Some(node);
        if !owned {
            return;
        }
        let table_index = self.scopes.current().table_index;
        let kind = arena.get(node).kind;
        self.scopes.pop_if_owner(node);
        match kind {
            NodeKind::Namespace => {
                self.namespaces.pop();
            }
            NodeKind::Function | NodeKind::OperatorDecl | NodeKind::Constructor => {
                self.rename_signature(arena, node, table_index);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect;
    use crate::testing::AstBuilder;

    fn analyze(build: AstBuilder) -> (Assembly, NodeId, DiagnosticBag) {
        let (mut assembly, root) = build.finish();
        let mut diagnostics = DiagnosticBag::new();
        collect::collect(&mut assembly, root, &mut diagnostics);
        let references = AssemblyCollection::new();
        let mut swizzles = SwizzleManager::new();
        let mut arrays = ArrayManager::new();
        resolve(
            &mut assembly,
            root,
            &references,
            &mut swizzles,
            &mut arrays,
            &mut diagnostics,
        );
        (assembly, root, diagnostics)
    }

    #[test]
    fn unknown_identifier_is_one_diagnostic() {
        // namespace A { void f() { x; } } with no x declared.
        let mut build = AstBuilder::new("A");
        let ret = build.type_ref("void");
        let x = build.ident("x");
        let stmt = build.expr_stmt(x);
        build.function("f", ret, vec![], vec![stmt]);
        let (_, _, diagnostics) = analyze(build);

        assert_eq!(diagnostics.error_count(), 1);
        let diag = diagnostics.iter().next().unwrap();
        assert_eq!(diag.code, diagnostic_codes::SYMBOL_NOT_FOUND);
        assert!(diag.message.contains('x'));
    }

    #[test]
    fn locals_resolve_within_their_block() {
        let mut build = AstBuilder::new("A");
        let ret = build.type_ref("void");
        let ty = build.type_ref("int");
        let init = build.int_literal(1);
        let decl = build.declaration("x", ty, Some(init));
        let x = build.ident("x");
        let stmt = build.expr_stmt(x);
        build.function("f", ret, vec![], vec![decl, stmt]);
        let (assembly, _, diagnostics) = analyze(build);
        assert!(!diagnostics.has_errors(), "{:?}", diagnostics.iter().collect::<Vec<_>>());

        // Both the declared type and the use site resolved.
        let resolved = assembly.arena.refs().filter(|r| r.is_resolved()).count();
        assert!(resolved >= 3, "resolved {resolved}");
    }

    #[test]
    fn use_before_declaration_diagnoses() {
        let mut build = AstBuilder::new("A");
        let ret = build.type_ref("void");
        let x_use = build.ident("x");
        let use_stmt = build.expr_stmt(x_use);
        let ty = build.type_ref("int");
        let init = build.int_literal(1);
        let decl = build.declaration("x", ty, Some(init));
        build.function("f", ret, vec![], vec![use_stmt, decl]);
        let (_, _, diagnostics) = analyze(build);
        assert!(
            diagnostics
                .iter()
                .any(|d| d.code == diagnostic_codes::USE_BEFORE_DECLARATION)
        );
    }

    #[test]
    fn direct_self_initializer_diagnoses() {
        let mut build = AstBuilder::new("A");
        let ret = build.type_ref("void");
        let ty = build.type_ref("int");
        let self_use = build.ident("x");
        let decl = build.declaration("x", ty, Some(self_use));
        build.function("f", ret, vec![], vec![decl]);
        let (_, _, diagnostics) = analyze(build);
        assert!(
            diagnostics
                .iter()
                .any(|d| d.code == diagnostic_codes::SELF_INITIALIZER)
        );
        assert!(
            !diagnostics
                .iter()
                .any(|d| d.code == diagnostic_codes::USE_BEFORE_DECLARATION)
        );
    }

    #[test]
    fn nested_initializer_list_self_reference_is_permitted() {
        let mut build = AstBuilder::new("A");
        let ret = build.type_ref("void");
        let ty = build.array_type_ref("int", &[2]);
        let self_use = build.ident("x");
        let one = build.int_literal(1);
        let list = build.initializer_list(vec![one, self_use]);
        let decl = build.declaration("x", ty, Some(list));
        build.function("f", ret, vec![], vec![decl]);
        let (_, _, diagnostics) = analyze(build);
        assert!(
            !diagnostics
                .iter()
                .any(|d| d.code == diagnostic_codes::SELF_INITIALIZER),
            "{:?}",
            diagnostics.iter().collect::<Vec<_>>()
        );
    }

    #[test]
    fn member_chain_resolves_fields_and_swizzles() {
        // struct M { float4 color; } void f(M m) { m.color.xyz; }
        let mut build = AstBuilder::new("A");
        let float4 = build.type_ref("float4");
        let color = build.field("color", float4);
        build.struct_def("M", vec![color]);
        let ret = build.type_ref("void");
        let m = build.param("m", "M");
        let chain = build.member_chain("m", &["color", "xyz"]);
        let stmt = build.expr_stmt(chain);
        build.function("f", ret, vec![m], vec![stmt]);
        let (assembly, _, diagnostics) = analyze(build);
        assert!(!diagnostics.has_errors(), "{:?}", diagnostics.iter().collect::<Vec<_>>());

        // Every member ref in the chain resolved.
        let unresolved = assembly
            .arena
            .refs()
            .filter(|r| r.kind == RefKind::Member && !r.is_resolved())
            .count();
        assert_eq!(unresolved, 0);
    }

    #[test]
    fn bad_swizzle_pattern_diagnoses() {
        let mut build = AstBuilder::new("A");
        let ret = build.type_ref("void");
        let v = build.param("v", "float2");
        let chain = build.member_chain("v", &["xyz"]);
        let stmt = build.expr_stmt(chain);
        build.function("f", ret, vec![v], vec![stmt]);
        let (_, _, diagnostics) = analyze(build);
        assert!(
            diagnostics
                .iter()
                .any(|d| d.code == diagnostic_codes::INVALID_SWIZZLE)
        );
    }

    #[test]
    fn functions_are_renamed_to_real_signatures() {
        let mut build = AstBuilder::new("A");
        let ret = build.type_ref("float");
        let a = build.param("a", "float");
        let b = build.param("b", "int");
        build.function("mix", ret, vec![a, b], vec![]);
        let (assembly, _, diagnostics) = analyze(build);
        assert!(!diagnostics.has_errors());
        assert!(assembly.find("A.mix(float,int)").is_some());
    }

    #[test]
    fn operator_decls_get_cast_signatures() {
        // struct M { operator implicit float(M value); }
        let mut build = AstBuilder::new("A");
        let value = build.param("value", "M");
        let cast = build.cast_operator("float", value, true);
        build.struct_def("M", vec![cast]);
        let (assembly, _, diagnostics) = analyze(build);
        assert!(!diagnostics.has_errors(), "{:?}", diagnostics.iter().collect::<Vec<_>>());
        // Signature names embed dotted FQNs, so they are single segments.
        let m = assembly.find("A.M").unwrap();
        assert!(assembly.table.find_part("#float(A.M)", m).is_some());
    }

    #[test]
    fn cyclic_member_types_resolve_through_deferral() {
        // The function walks chains through A and B before either struct's
        // field types have been visited; both structs come after it, and
        // their fields reference each other's types. The second chain
        // segments can only resolve after a deferral drain.
        let mut build = AstBuilder::new("N");
        let ret = build.type_ref("void");
        let pa = build.param("a", "A");
        let pb = build.param("b", "B");
        let chain_a = build.member_chain("a", &["other", "other"]);
        let sa = build.expr_stmt(chain_a);
        let chain_b = build.member_chain("b", &["other", "other"]);
        let sb = build.expr_stmt(chain_b);
        build.function("f", ret, vec![pa, pb], vec![sa, sb]);

        let b_ty = build.type_ref("B");
        let a_field = build.field("other", b_ty);
        build.struct_def("A", vec![a_field]);
        let a_ty = build.type_ref("A");
        let b_field = build.field("other", a_ty);
        build.struct_def("B", vec![b_field]);

        let (assembly, _, diagnostics) = analyze(build);
        assert!(!diagnostics.has_errors(), "{:?}", diagnostics.iter().collect::<Vec<_>>());
        let unresolved = assembly
            .arena
            .refs()
            .filter(|r| r.kind == RefKind::Member && !r.is_resolved())
            .count();
        assert_eq!(unresolved, 0);
    }

    #[test]
    fn array_typed_declarations_synthesize_array_defs() {
        let mut build = AstBuilder::new("A");
        let ret = build.type_ref("void");
        let arr_ty = build.array_type_ref("float", &[4]);
        let decl = build.declaration("values", arr_ty, None);
        build.function("f", ret, vec![], vec![decl]);
        let (mut assembly, root) = build.finish();

        let mut diagnostics = DiagnosticBag::new();
        collect::collect(&mut assembly, root, &mut diagnostics);
        let references = AssemblyCollection::new();
        let mut swizzles = SwizzleManager::new();
        let mut arrays = ArrayManager::new();
        resolve(
            &mut assembly,
            root,
            &references,
            &mut swizzles,
            &mut arrays,
            &mut diagnostics,
        );
        assert!(!diagnostics.has_errors(), "{:?}", diagnostics.iter().collect::<Vec<_>>());
        assert!(arrays.assembly().find("float[4]").is_some());
    }

    #[test]
    fn kind_table_accepts_expected_definitions() {
        assert!(kind_accepts(RefKind::Struct, SymbolKind::Primitive));
        assert!(kind_accepts(RefKind::Type, SymbolKind::Array));
        assert!(kind_accepts(RefKind::Member, SymbolKind::Swizzle));
        assert!(kind_accepts(RefKind::Identifier, SymbolKind::Parameter));
        assert!(!kind_accepts(RefKind::Function, SymbolKind::Struct));
        assert!(!kind_accepts(RefKind::Namespace, SymbolKind::Field));
        assert!(kind_accepts(RefKind::Any, SymbolKind::Namespace));
    }
}
