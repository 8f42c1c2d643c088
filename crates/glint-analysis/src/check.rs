//! Type checking and overload selection.
//!
//! Third analysis pass. Expression types are inferred bottom-up with an
//! explicit worklist (each expression node carries a small lazy-eval state
//! machine, so arbitrarily deep trees never recurse). Arithmetic uses the
//! numeric promotion table and falls back to operator-overload lookup by
//! signature; calls are scored by summed implicit-cast distance; converted
//! arguments get `Cast` nodes inserted around them.

use crate::scopes::ScopeStack;
use glint_ast::node::{ExprData, ExprInfo};
use glint_ast::{
    AstVisitor, ExprKind, LazyEval, LiteralValue, NodeArena, NodeData, NodeId, NodeKind, Operator,
    OperatorFlags, OverloadKey, PrimitiveClass, PrimitiveKind, RefId, RefKind, SigOwner, SymbolRef,
    VisitAction, primitive_name, render_cast_signature, render_operator_signature, traverse,
};
use glint_common::{
    AssemblyId, DiagnosticBag, NumberKind, SymbolHandle, diagnostic_codes, intern,
};
use glint_symbols::{
    ARRAY_ASSEMBLY, ArrayManager, Assembly, AssemblyCollection, PrimitiveInfo, ROOT_INDEX,
    SWIZZLE_ASSEMBLY, SwizzleManager, SymbolKind, SymbolMetadata, SymbolTable, TARGET_ASSEMBLY,
    primitives,
};
use tracing::trace;

pub struct TypeChecker<'a> {
    table: &'a SymbolTable,
    references: &'a AssemblyCollection,
    swizzles: &'a SwizzleManager,
    arrays: &'a ArrayManager,
    diagnostics: &'a mut DiagnosticBag,
    scopes: ScopeStack,
    functions: Vec<NodeId>,
    /// Dotted path of the namespace currently being checked, for candidate
    /// lookups inside referenced assemblies.
    namespace_paths: Vec<String>,
}

/// Type-check everything under `root` in the target assembly.
pub fn check(
    assembly: &mut Assembly,
    root: NodeId,
    references: &AssemblyCollection,
    swizzles: &SwizzleManager,
    arrays: &ArrayManager,
    diagnostics: &mut DiagnosticBag,
) {
    let (table, arena) = assembly.parts_mut();
    let mut checker = TypeChecker {
        table,
        references,
        swizzles,
        arrays,
        diagnostics,
        scopes: ScopeStack::new(),
        functions: Vec::new(),
        namespace_paths: Vec::new(),
    };
    traverse(arena, root, &mut checker);
}

/// How one type converts to another.
#[derive(Clone, Debug, PartialEq)]
enum Conversion {
    Identity,
    /// Implicit cast with its ranking distance and the cast operator node.
    Implicit(u32, Option<SymbolHandle>),
}

impl Conversion {
    fn distance(&self) -> u32 {
        match self {
            Conversion::Identity => 0,
            Conversion::Implicit(distance, _) => *distance,
        }
    }
}

impl<'a> TypeChecker<'a> {
    // -- assembly plumbing --------------------------------------------------

    fn table_of(&self, id: AssemblyId) -> Option<&SymbolTable> {
        match id {
            AssemblyId::PRIMITIVES => Some(&primitives().table),
            TARGET_ASSEMBLY => Some(self.table),
            SWIZZLE_ASSEMBLY => Some(&self.swizzles.assembly().table),
            ARRAY_ASSEMBLY => Some(&self.arrays.assembly().table),
            other => self.references.get(other).map(|a| &a.table),
        }
    }

    fn arena_of<'s>(&'s self, id: AssemblyId, target_arena: &'s NodeArena) -> Option<&'s NodeArena> {
        match id {
            AssemblyId::PRIMITIVES => Some(&primitives().arena),
            TARGET_ASSEMBLY => Some(target_arena),
            SWIZZLE_ASSEMBLY => Some(&self.swizzles.assembly().arena),
            ARRAY_ASSEMBLY => Some(&self.arrays.assembly().arena),
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

    fn handles_equal(a: &SymbolHandle, b: &SymbolHandle) -> bool {
        a.assembly().is_some() && a.assembly() == b.assembly() && a.index() == b.index()
    }

    /// Shape of a primitive type handle, if it is one.
    fn prim_info(&self, handle: &SymbolHandle) -> Option<PrimitiveInfo> {
        let metadata = self.metadata_of(handle)?;
        if metadata.kind != SymbolKind::Primitive {
            return None;
        }
        glint_symbols::primitive_info(&primitives().arena, metadata.declaration?)
    }

    fn primitive(&self, kind: PrimitiveKind, class: PrimitiveClass, rows: u32, cols: u32) -> Option<SymbolHandle> {
        glint_symbols::primitives::primitive_handle(&primitive_name(kind, class, rows, cols))
    }

    fn scalar(&self, kind: PrimitiveKind) -> Option<SymbolHandle> {
        self.primitive(kind, PrimitiveClass::Scalar, 1, 1)
    }

    /// The declared type of whatever a resolved ref points at.
    fn declared_type(&self, target_arena: &NodeArena, ref_id: RefId) -> Option<SymbolHandle> {
        let symbol_ref = target_arena.symbol_ref(ref_id);
        let handle = symbol_ref.handle()?;
        let metadata = self.metadata_of(handle)?;

        // A ref that resolved to a type names the type itself.
        if matches!(
            metadata.kind,
            SymbolKind::Primitive
                | SymbolKind::Struct
                | SymbolKind::Class
                | SymbolKind::Enum
                | SymbolKind::Array
                | SymbolKind::Pointer
        ) {
            return Some(handle.clone());
        }

        // Enum members are typed by their enclosing enum.
        if metadata.kind == SymbolKind::EnumMember {
            let id = handle.assembly()?;
            let index = handle.index()?;
            let table = self.table_of(id)?;
            let parent = table.get(index).parent;
            return Some(table.make_handle(id, parent));
        }

        let id = handle.assembly()?;
        let decl = metadata.declaration?;
        let decl_arena = self.arena_of(id, target_arena)?;
        let type_ref = match &decl_arena.get(decl).data {
            NodeData::Field { ty, .. }
            | NodeData::Parameter { ty, .. }
            | NodeData::DeclarationStatement { ty, .. }
            | NodeData::SwizzleDef { ty, .. }
            | NodeData::ThisDef { ty } => *ty,
            _ => return None,
        };
        decl_arena.symbol_ref(type_ref).handle().cloned()
    }

    /// Return type handle of a function/operator declaration handle.
    fn return_type_of(&self, target_arena: &NodeArena, handle: &SymbolHandle) -> Option<SymbolHandle> {
        let id = handle.assembly()?;
        let metadata = self.metadata_of(handle)?;
        let decl = metadata.declaration?;
        let decl_arena = self.arena_of(id, target_arena)?;
        let ret = match &decl_arena.get(decl).data {
            NodeData::Function { return_type, .. }
            | NodeData::OperatorDecl { return_type, .. } => *return_type,
            NodeData::Constructor { .. } => {
                // A constructor yields its enclosing type.
                let index = handle.index()?;
                let table = self.table_of(id)?;
                let parent = table.get(index).parent;
                return Some(table.make_handle(id, parent));
            }
            _ => return None,
        };
        decl_arena.symbol_ref(ret).handle().cloned()
    }

    fn param_types_of(
        &self,
        target_arena: &NodeArena,
        handle: &SymbolHandle,
    ) -> Option<Vec<SymbolHandle>> {
        let id = handle.assembly()?;
        let metadata = self.metadata_of(handle)?;
        let decl = metadata.declaration?;
        let decl_arena = self.arena_of(id, target_arena)?;
        let params = match &decl_arena.get(decl).data {
            NodeData::Function { parameters, .. }
            | NodeData::OperatorDecl { parameters, .. }
            | NodeData::Constructor { parameters, .. } => parameters.clone(),
            _ => return None,
        };
        let mut out = Vec::with_capacity(params.len());
        for param in params {
            let NodeData::Parameter { ty, .. } = &decl_arena.get(param).data else {
                return None;
            };
            out.push(decl_arena.symbol_ref(*ty).handle()?.clone());
        }
        Some(out)
    }

    // -- conversions --------------------------------------------------------

    /// Find the cast operator `#to(from)` on the source type first, then
    /// the target type. `implicit_only` restricts to the implicit set.
    fn find_cast_operator(
        &self,
        target_arena: &NodeArena,
        from: &SymbolHandle,
        to: &SymbolHandle,
        implicit_only: bool,
    ) -> Option<SymbolHandle> {
        let from_fqn = self.fqn_of(from)?;
        let to_fqn = self.fqn_of(to)?;
        let signature = render_cast_signature(&to_fqn, &from_fqn);
        for owner in [from, to] {
            let Some(id) = owner.assembly() else { continue };
            let Some(index) = owner.index() else { continue };
            let Some(table) = self.table_of(id) else { continue };
            let Some(found) = table.find_part(&signature, index) else {
                continue;
            };
            let Some(metadata) = table.get(found).metadata.clone() else {
                continue;
            };
            if metadata.kind != SymbolKind::Operator {
                continue;
            }
            if implicit_only {
                let Some(decl_arena) = self.arena_of(id, target_arena) else {
                    continue;
                };
                let Some(decl) = metadata.declaration else { continue };
                let NodeData::OperatorDecl { implicit, .. } = &decl_arena.get(decl).data else {
                    continue;
                };
                if !implicit {
                    continue;
                }
            }
            return Some(table.make_handle(id, found));
        }
        None
    }

    /// Ranked implicit conversion: identity is rank 0, an implicit cast
    /// ranks by primitive-kind ordinal distance, anything else fails.
    fn implicit_conversion(
        &self,
        target_arena: &NodeArena,
        from: &SymbolHandle,
        to: &SymbolHandle,
    ) -> Option<Conversion> {
        if Self::handles_equal(from, to) {
            return Some(Conversion::Identity);
        }
        let operator = self.find_cast_operator(target_arena, from, to, true)?;
        let distance = match (self.prim_info(from), self.prim_info(to)) {
            (Some(from_info), Some(to_info)) => from_info.kind.distance(to_info.kind),
            // User-defined implicit casts rank just above identity.
            _ => 1,
        };
        Some(Conversion::Implicit(distance, Some(operator)))
    }

    /// Wrap `expr` in a synthesized cast to `to`, so lowering sees the
    /// conversion explicitly.
    fn insert_cast(
        &mut self,
        arena: &mut NodeArena,
        expr: NodeId,
        to: &SymbolHandle,
        operator: Option<SymbolHandle>,
    ) -> NodeId {
        let span = arena.get(expr).span;
        let fqn = self.fqn_of(to).unwrap_or_default();
        let mut ty = SymbolRef::fully_qualified(intern(&fqn), RefKind::Type, span);
        ty.resolve_to(to.clone());
        let ty = arena.add_ref(ty);
        let operator = operator.map(|op_handle| {
            let mut op_ref = SymbolRef::new(intern(&fqn), RefKind::Operator, span);
            op_ref.resolve_to(op_handle);
            arena.add_ref(op_ref)
        });
        let cast = arena.alloc(
            NodeKind::CastExpr,
            span,
            NodeData::Expr(ExprData {
                info: ExprInfo {
                    inferred_type: Some(to.clone()),
                    lazy: LazyEval::Done,
                },
                kind: ExprKind::Cast {
                    ty,
                    operand: expr,
                    operator,
                },
            }),
        );
        arena.set_parent(expr, cast);
        cast
    }

    /// Convert `expr` to `to` if an implicit conversion exists, inserting a
    /// cast node when the conversion is not the identity. Returns false when
    /// no conversion exists (the caller reports the diagnostic).
    fn coerce(&mut self, arena: &mut NodeArena, expr: NodeId, to: &SymbolHandle) -> Option<NodeId> {
        let from = arena.expr_info(expr)?.inferred_type.clone()?;
        match self.implicit_conversion(arena, &from, to)? {
            Conversion::Identity => Some(expr),
            Conversion::Implicit(_, operator) => Some(self.insert_cast(arena, expr, to, operator)),
        }
    }

    // -- expression inference ----------------------------------------------

    fn expr_type(&self, arena: &NodeArena, expr: NodeId) -> Option<SymbolHandle> {
        arena.expr_info(expr)?.inferred_type.clone()
    }

    fn set_expr_type(&self, arena: &mut NodeArena, expr: NodeId, ty: Option<SymbolHandle>) {
        if let Some(info) = arena.expr_info_mut(expr) {
            info.inferred_type = ty;
            info.lazy = LazyEval::Done;
        }
    }

    /// Bottom-up inference over one expression tree with an explicit stack.
    fn infer(&mut self, arena: &mut NodeArena, root: NodeId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(expr) = arena.get(id).expr() else {
                continue;
            };
            match expr.info.lazy {
                LazyEval::Done => continue,
                LazyEval::NotVisited => {
                    let children: Vec<NodeId> = {
                        let mut out = Vec::new();
                        arena.get(id).push_children(&mut out);
                        out
                    };
                    if children.is_empty() {
                        self.compute(arena, id);
                    } else {
                        if let Some(info) = arena.expr_info_mut(id) {
                            info.lazy = LazyEval::ChildrenPushed;
                        }
                        stack.push(id);
                        for child in children.into_iter().rev() {
                            stack.push(child);
                        }
                    }
                }
                LazyEval::ChildrenPushed => self.compute(arena, id),
            }
        }
    }

    /// All children are typed; compute this node's type.
    fn compute(&mut self, arena: &mut NodeArena, id: NodeId) {
        let kind = arena.get(id).expr().map(|e| e.kind.clone());
        let Some(kind) = kind else { return };
        let ty = match kind {
            ExprKind::Literal { value } => self.literal_type(&value),
            ExprKind::SymbolRef { symbol } => self.declared_type(arena, symbol),
            ExprKind::Binary {
                op, left, right, ..
            } => self.compute_binary(arena, id, op, left, right),
            ExprKind::Unary { op, operand, .. } => self.compute_unary(arena, id, op, operand),
            ExprKind::Cast { ty, operand, .. } => self.compute_cast(arena, id, ty, operand),
            ExprKind::Call { callee, ref args } => self.compute_call(arena, id, callee, args),
            ExprKind::MemberAccess { .. } => self.compute_member_access(arena, id),
            ExprKind::Indexer { target, index } => self.compute_indexer(arena, id, target, index),
            ExprKind::InitializerList { .. } => None,
            ExprKind::Ternary {
                condition,
                then_expr,
                else_expr,
            } => self.compute_ternary(arena, condition, then_expr, else_expr),
        };
        trace!(node = ?id, resolved = ty.is_some(), "inferred expression type");
        self.set_expr_type(arena, id, ty);
    }

    fn literal_type(&self, value: &LiteralValue) -> Option<SymbolHandle> {
        match value {
            LiteralValue::Number(number) => {
                let kind = match number.kind() {
                    NumberKind::I8 => PrimitiveKind::Int8,
                    NumberKind::U8 => PrimitiveKind::UInt8,
                    NumberKind::I16 => PrimitiveKind::Int16,
                    NumberKind::U16 => PrimitiveKind::UInt16,
                    NumberKind::I32 => PrimitiveKind::Int32,
                    NumberKind::U32 => PrimitiveKind::UInt32,
                    NumberKind::I64 => PrimitiveKind::Int64,
                    NumberKind::U64 => PrimitiveKind::UInt64,
                    NumberKind::F16 => PrimitiveKind::Half,
                    NumberKind::F32 => PrimitiveKind::Float,
                    NumberKind::F64 => PrimitiveKind::Double,
                };
                self.scalar(kind)
            }
            LiteralValue::Bool(_) => self.scalar(PrimitiveKind::Bool),
            // String literals only appear in attribute arguments.
            LiteralValue::String(_) => None,
        }
    }

    /// Numeric promotion over two primitives of the same class and shape.
    fn promote(&self, lhs: &PrimitiveInfo, rhs: &PrimitiveInfo) -> Option<SymbolHandle> {
        if lhs.class != rhs.class || lhs.rows != rhs.rows || lhs.cols != rhs.cols {
            return None;
        }
        if !lhs.kind.is_numeric() || !rhs.kind.is_numeric() {
            return None;
        }
        let kind = if lhs.kind.promotion_rank() >= rhs.kind.promotion_rank() {
            lhs.kind
        } else {
            rhs.kind
        };
        self.primitive(kind, lhs.class, lhs.rows, lhs.cols)
    }

    /// Operator-overload fallback: look `op(LHS_FQN,RHS_FQN)` up under the
    /// left type, then the right type.
    fn find_binary_overload(
        &self,
        target_arena: &NodeArena,
        op: Operator,
        lhs: &SymbolHandle,
        rhs: &SymbolHandle,
    ) -> Option<(SymbolHandle, SymbolHandle)> {
        let lhs_fqn = self.fqn_of(lhs)?;
        let rhs_fqn = self.fqn_of(rhs)?;
        let signature = render_operator_signature(op, &[&lhs_fqn, &rhs_fqn]);
        for owner in [lhs, rhs] {
            let Some(id) = owner.assembly() else { continue };
            let Some(index) = owner.index() else { continue };
            let Some(table) = self.table_of(id) else { continue };
            let Some(found) = table.find_part(&signature, index) else {
                continue;
            };
            let handle = table.make_handle(id, found);
            if let Some(ret) = self.return_type_of(target_arena, &handle) {
                return Some((handle, ret));
            }
        }
        None
    }

    fn set_binary_operator_ref(&self, arena: &mut NodeArena, id: NodeId, op_handle: SymbolHandle) {
        let span = arena.get(id).span;
        let mut op_ref = SymbolRef::new(intern("operator"), RefKind::Operator, span);
        op_ref.resolve_to(op_handle);
        let op_ref = arena.add_ref(op_ref);
        if let Some(expr) = arena.get_mut(id).expr_mut() {
            match &mut expr.kind {
                ExprKind::Binary { operator, .. } | ExprKind::Unary { operator, .. } => {
                    *operator = Some(op_ref);
                }
                _ => {}
            }
        }
    }

    fn no_operator(&mut self, arena: &NodeArena, id: NodeId, op: Operator, lhs: &Option<SymbolHandle>, rhs: &Option<SymbolHandle>) {
        let span = arena.get(id).span;
        let lhs_name = lhs
            .as_ref()
            .and_then(|h| self.fqn_of(h))
            .unwrap_or_else(|| "?".into());
        let rhs_name = rhs
            .as_ref()
            .and_then(|h| self.fqn_of(h))
            .unwrap_or_else(|| "?".into());
        self.diagnostics.error(
            diagnostic_codes::NO_OPERATOR_OVERLOAD,
            span,
            format!("couldn't find operator '{op}' for '{lhs_name}' and '{rhs_name}'"),
        );
    }

    fn compute_binary(
        &mut self,
        arena: &mut NodeArena,
        id: NodeId,
        op: Operator,
        left: NodeId,
        right: NodeId,
    ) -> Option<SymbolHandle> {
        let lhs = self.expr_type(arena, left);
        let rhs = self.expr_type(arena, right);
        let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
            // A child already failed; stay quiet.
            return None;
        };

        let flags = op.flags();
        let lhs_info = self.prim_info(&lhs);
        let rhs_info = self.prim_info(&rhs);

        if flags.contains(OperatorFlags::LOGICAL) {
            // Logical ops need boolean operands of matching shape.
            if let (Some(li), Some(ri)) = (&lhs_info, &rhs_info) {
                if li.kind == PrimitiveKind::Bool
                    && ri.kind == PrimitiveKind::Bool
                    && li.class == ri.class
                    && li.rows == ri.rows
                {
                    return Some(lhs);
                }
            }
            self.no_operator(arena, id, op, &Some(lhs), &Some(rhs));
            return None;
        }

        if flags.contains(OperatorFlags::COMPARISON) {
            if let (Some(li), Some(ri)) = (&lhs_info, &rhs_info) {
                let shapes_match = li.class == ri.class && li.rows == ri.rows && li.cols == ri.cols;
                let comparable = Self::handles_equal(&lhs, &rhs)
                    || (shapes_match && li.kind.is_numeric() && ri.kind.is_numeric());
                if comparable && li.class != PrimitiveClass::Matrix {
                    // bool for scalars, boolN for vectors.
                    return match li.class {
                        PrimitiveClass::Scalar => self.scalar(PrimitiveKind::Bool),
                        PrimitiveClass::Vector => {
                            self.primitive(PrimitiveKind::Bool, PrimitiveClass::Vector, li.rows, 1)
                        }
                        PrimitiveClass::Matrix => None,
                    };
                }
            }
            if let Some((op_handle, ret)) = self.find_binary_overload(arena, op, &lhs, &rhs) {
                self.set_binary_operator_ref(arena, id, op_handle);
                return Some(ret);
            }
            self.no_operator(arena, id, op, &Some(lhs), &Some(rhs));
            return None;
        }

        // Arithmetic, bitwise, and shift ops.
        if Self::handles_equal(&lhs, &rhs) {
            if let Some(info) = &lhs_info {
                let valid = info.kind.is_numeric()
                    && (!flags.intersects(OperatorFlags::BITWISE | OperatorFlags::SHIFT)
                        || !info.kind.is_float());
                if valid {
                    return Some(lhs);
                }
            } else {
                // Same non-primitive type: only an overload can apply.
                if let Some((op_handle, ret)) = self.find_binary_overload(arena, op, &lhs, &rhs) {
                    self.set_binary_operator_ref(arena, id, op_handle);
                    return Some(ret);
                }
                self.no_operator(arena, id, op, &Some(lhs), &Some(rhs));
                return None;
            }
        }

        if let (Some(li), Some(ri)) = (&lhs_info, &rhs_info) {
            if flags.intersects(OperatorFlags::BITWISE | OperatorFlags::SHIFT)
                && (li.kind.is_float() || ri.kind.is_float())
            {
                self.no_operator(arena, id, op, &Some(lhs), &Some(rhs));
                return None;
            }
            if let Some(promoted) = self.promote(li, ri) {
                return Some(promoted);
            }
        }

        if let Some((op_handle, ret)) = self.find_binary_overload(arena, op, &lhs, &rhs) {
            self.set_binary_operator_ref(arena, id, op_handle);
            return Some(ret);
        }
        self.no_operator(arena, id, op, &Some(lhs), &Some(rhs));
        None
    }

    fn is_assignable_expr(arena: &NodeArena, expr: NodeId) -> bool {
        matches!(
            arena.get(expr).kind,
            NodeKind::SymbolRefExpr | NodeKind::MemberAccessExpr | NodeKind::IndexerExpr
        )
    }

    fn compute_unary(
        &mut self,
        arena: &mut NodeArena,
        id: NodeId,
        op: Operator,
        operand: NodeId,
    ) -> Option<SymbolHandle> {
        let ty = self.expr_type(arena, operand)?;
        let info = self.prim_info(&ty);
        let span = arena.get(id).span;

        if matches!(op, Operator::Increment | Operator::Decrement)
            && !Self::is_assignable_expr(arena, operand)
        {
            self.diagnostics.error(
                diagnostic_codes::NOT_ASSIGNABLE,
                span,
                "expression is not assignable".to_string(),
            );
            return None;
        }

        if let Some(info) = &info {
            let ok = match op {
                Operator::Subtract => info.kind.is_numeric(),
                Operator::LogicalNot => info.kind == PrimitiveKind::Bool,
                Operator::BitwiseNot => info.kind.is_numeric() && !info.kind.is_float(),
                Operator::Increment | Operator::Decrement => info.kind.is_numeric(),
                _ => false,
            };
            if ok {
                return Some(ty);
            }
        }

        // Operand-ranked overload on the operand's type.
        if let Some(fqn) = self.fqn_of(&ty) {
            let signature = render_operator_signature(op, &[&fqn]);
            if let (Some(assembly), Some(index)) = (ty.assembly(), ty.index()) {
                if let Some(table) = self.table_of(assembly) {
                    if let Some(found) = table.find_part(&signature, index) {
                        let handle = table.make_handle(assembly, found);
                        if let Some(ret) = self.return_type_of(arena, &handle) {
                            self.set_binary_operator_ref(arena, id, handle);
                            return Some(ret);
                        }
                    }
                }
            }
        }

        let name = self.fqn_of(&ty).unwrap_or_else(|| "?".into());
        self.diagnostics.error(
            diagnostic_codes::NO_OPERATOR_OVERLOAD,
            span,
            format!("couldn't find operator '{op}' for '{name}'"),
        );
        None
    }

    fn compute_cast(
        &mut self,
        arena: &mut NodeArena,
        id: NodeId,
        ty: RefId,
        operand: NodeId,
    ) -> Option<SymbolHandle> {
        let target = arena.symbol_ref(ty).handle().cloned()?;
        let Some(source) = self.expr_type(arena, operand) else {
            return Some(target);
        };
        if Self::handles_equal(&source, &target) {
            return Some(target);
        }
        // Explicit casts may use the whole cast set, implicit or not.
        match self.find_cast_operator(arena, &source, &target, false) {
            Some(op_handle) => {
                let span = arena.get(id).span;
                let fqn = self.fqn_of(&target).unwrap_or_default();
                let mut op_ref = SymbolRef::new(intern(&fqn), RefKind::Operator, span);
                op_ref.resolve_to(op_handle);
                let op_ref = arena.add_ref(op_ref);
                if let Some(expr) = arena.get_mut(id).expr_mut() {
                    if let ExprKind::Cast { operator, .. } = &mut expr.kind {
                        *operator = Some(op_ref);
                    }
                }
                Some(target)
            }
            None => {
                let span = arena.get(id).span;
                let from = self.fqn_of(&source).unwrap_or_else(|| "?".into());
                let to = self.fqn_of(&target).unwrap_or_else(|| "?".into());
                self.diagnostics.error(
                    diagnostic_codes::NO_EXPLICIT_CONVERSION,
                    span,
                    format!("no conversion from '{from}' to '{to}'"),
                );
                None
            }
        }
    }

    // -- calls --------------------------------------------------------------

    /// Gather overload candidates named `name` along the lookup order.
    fn gather_candidates(&self, name: &str) -> Vec<SymbolHandle> {
        let prefix = format!("{name}(");
        let mut out: Vec<SymbolHandle> = Vec::new();
        let push_from = |table: &SymbolTable, id: AssemblyId, scope_index: usize, out: &mut Vec<SymbolHandle>| {
            for (child_name, &child_index) in table.get(scope_index).children.iter() {
                if !child_name.starts_with(&prefix) {
                    continue;
                }
                let is_callable = table
                    .get(child_index)
                    .metadata
                    .as_ref()
                    .is_some_and(|m| {
                        matches!(m.kind, SymbolKind::Function | SymbolKind::Constructor)
                    });
                if is_callable {
                    let handle = table.make_handle(id, child_index);
                    if !out.iter().any(|h| Self::handles_equal(h, &handle)) {
                        out.push(handle);
                    }
                }
            }
        };

        push_from(&primitives().table, AssemblyId::PRIMITIVES, ROOT_INDEX, &mut out);
        for frame in self.scopes.frames_outward() {
            push_from(self.table, TARGET_ASSEMBLY, frame.table_index, &mut out);
        }
        for (id, assembly) in self.references.iter() {
            if let Some(namespace) = self.namespace_paths.last() {
                if let Some(ns_index) = assembly.table.find_full_path(namespace, ROOT_INDEX) {
                    push_from(&assembly.table, id, ns_index, &mut out);
                }
            }
            push_from(&assembly.table, id, ROOT_INDEX, &mut out);
        }
        out
    }

    fn compute_call(
        &mut self,
        arena: &mut NodeArena,
        id: NodeId,
        callee: RefId,
        args: &[NodeId],
    ) -> Option<SymbolHandle> {
        let name = arena.symbol_ref(callee).name;
        let span = arena.get(id).span;

        let mut arg_types = Vec::with_capacity(args.len());
        for &arg in args {
            match self.expr_type(arena, arg) {
                Some(ty) => arg_types.push(ty),
                // An argument already failed to type; stay quiet.
                None => return None,
            }
        }

        let candidates = self.gather_candidates(name.as_str());
        let mut scored: Vec<(u32, SymbolHandle, Vec<Conversion>)> = Vec::new();
        for candidate in candidates {
            let Some(params) = self.param_types_of(arena, &candidate) else {
                continue;
            };
            if params.len() != args.len() {
                continue;
            }
            let mut conversions = Vec::with_capacity(args.len());
            let mut total = 0u32;
            let mut viable = true;
            for (arg_ty, param_ty) in arg_types.iter().zip(&params) {
                match self.implicit_conversion(arena, arg_ty, param_ty) {
                    Some(conversion) => {
                        total += conversion.distance();
                        conversions.push(conversion);
                    }
                    None => {
                        viable = false;
                        break;
                    }
                }
            }
            if viable {
                scored.push((total, candidate, conversions));
            }
        }

        if scored.is_empty() {
            self.diagnostics.error(
                diagnostic_codes::NO_MATCHING_OVERLOAD,
                span,
                format!("no overload of '{name}' matches the argument list"),
            );
            arena.symbol_ref_mut(callee).mark_not_found();
            return None;
        }

        scored.sort_by_key(|(total, _, _)| *total);
        let best = scored[0].0;
        if scored.len() > 1 && scored[1].0 == best {
            self.diagnostics.error(
                diagnostic_codes::AMBIGUOUS_CALL,
                span,
                format!("ambiguous call to '{name}'"),
            );
            return None;
        }

        let (_, winner, conversions) = scored.swap_remove(0);
        let params = self.param_types_of(arena, &winner)?;
        for (i, conversion) in conversions.iter().enumerate() {
            if let Conversion::Implicit(_, operator) = conversion {
                let arg = match arena.get(id).expr().map(|e| &e.kind) {
                    Some(ExprKind::Call { args, .. }) => args[i],
                    _ => continue,
                };
                let cast = self.insert_cast(arena, arg, &params[i], operator.clone());
                if let Some(expr) = arena.get_mut(id).expr_mut() {
                    if let ExprKind::Call { args, .. } = &mut expr.kind {
                        args[i] = cast;
                    }
                }
                arena.set_parent(cast, id);
            }
        }

        arena.symbol_ref_mut(callee).resolve_to(winner.clone());
        self.return_type_of(arena, &winner)
    }

    // -- member access, indexing, ternary -----------------------------------

    /// The chain's type is the declared type of its last resolved segment.
    fn compute_member_access(&mut self, arena: &NodeArena, id: NodeId) -> Option<SymbolHandle> {
        let mut last_ref = None;
        let mut current = Some(id);
        while let Some(node) = current {
            match arena.get(node).expr().map(|e| &e.kind) {
                Some(ExprKind::MemberAccess { symbol, next }) => {
                    last_ref = Some(*symbol);
                    current = *next;
                }
                _ => break,
            }
        }
        self.declared_type(arena, last_ref?)
    }

    fn compute_indexer(
        &mut self,
        arena: &mut NodeArena,
        id: NodeId,
        target: NodeId,
        index: NodeId,
    ) -> Option<SymbolHandle> {
        let span = arena.get(id).span;
        if let Some(index_ty) = self.expr_type(arena, index) {
            if let Some(info) = self.prim_info(&index_ty) {
                if info.kind.is_float() || info.class != PrimitiveClass::Scalar {
                    self.diagnostics.error(
                        diagnostic_codes::TYPE_MISMATCH,
                        span,
                        "index expressions must be integral scalars".to_string(),
                    );
                    return None;
                }
            }
        }

        let target_ty = self.expr_type(arena, target)?;
        if let Some(info) = self.prim_info(&target_ty) {
            return match info.class {
                PrimitiveClass::Vector => self.scalar(info.kind),
                PrimitiveClass::Matrix => {
                    self.primitive(info.kind, PrimitiveClass::Vector, info.cols, 1)
                }
                PrimitiveClass::Scalar => {
                    self.diagnostics.error(
                        diagnostic_codes::TYPE_MISMATCH,
                        span,
                        "scalar values cannot be indexed".to_string(),
                    );
                    None
                }
            };
        }

        // Arrays: strip one dimension by resolving the element name.
        let metadata = self.metadata_of(&target_ty)?;
        if metadata.kind == SymbolKind::Array {
            let decl = metadata.declaration?;
            let element_name = match &self.arrays.assembly().arena.get(decl).data {
                NodeData::ArrayDef { element, .. } => {
                    self.arrays.assembly().arena.symbol_ref(*element).name
                }
                _ => return None,
            };
            let name = element_name.as_str();
            if let Some(index) = self.arrays.assembly().table.find_full_path(name, ROOT_INDEX) {
                return Some(self.arrays.assembly().make_handle(ARRAY_ASSEMBLY, index));
            }
            if let Some(index) = primitives().table.find_full_path(name, ROOT_INDEX) {
                return Some(primitives().make_handle(AssemblyId::PRIMITIVES, index));
            }
            if let Some(index) = self.table.find_full_path(name, ROOT_INDEX) {
                return Some(self.table.make_handle(TARGET_ASSEMBLY, index));
            }
            for (id, assembly) in self.references.iter() {
                if let Some(index) = assembly.table.find_full_path(name, ROOT_INDEX) {
                    return Some(assembly.make_handle(id, index));
                }
            }
        }
        None
    }

    fn compute_ternary(
        &mut self,
        arena: &mut NodeArena,
        condition: NodeId,
        then_expr: NodeId,
        else_expr: NodeId,
    ) -> Option<SymbolHandle> {
        self.require_bool(arena, condition);
        let then_ty = self.expr_type(arena, then_expr)?;
        let else_ty = self.expr_type(arena, else_expr)?;
        if Self::handles_equal(&then_ty, &else_ty) {
            return Some(then_ty);
        }
        if let (Some(ti), Some(ei)) = (self.prim_info(&then_ty), self.prim_info(&else_ty)) {
            if let Some(promoted) = self.promote(&ti, &ei) {
                return Some(promoted);
            }
        }
        let span = arena.get(then_expr).span.merge(arena.get(else_expr).span);
        let a = self.fqn_of(&then_ty).unwrap_or_else(|| "?".into());
        let b = self.fqn_of(&else_ty).unwrap_or_else(|| "?".into());
        self.diagnostics.error(
            diagnostic_codes::TYPE_MISMATCH,
            span,
            format!("type mismatch: expected '{a}', found '{b}'"),
        );
        None
    }

    fn require_bool(&mut self, arena: &mut NodeArena, condition: NodeId) {
        let Some(ty) = self.expr_type(arena, condition) else {
            return;
        };
        let is_bool = self
            .prim_info(&ty)
            .is_some_and(|info| info.kind == PrimitiveKind::Bool && info.class == PrimitiveClass::Scalar);
        if !is_bool {
            let span = arena.get(condition).span;
            let found = self.fqn_of(&ty).unwrap_or_else(|| "?".into());
            self.diagnostics.error(
                diagnostic_codes::TYPE_MISMATCH,
                span,
                format!("type mismatch: expected 'bool', found '{found}'"),
            );
        }
    }

    // -- statements ---------------------------------------------------------

    fn check_declaration(&mut self, arena: &mut NodeArena, id: NodeId) {
        let NodeData::DeclarationStatement {
            ty, initializer, ..
        } = &arena.get(id).data
        else {
            return;
        };
        let (ty, initializer) = (*ty, *initializer);
        let Some(init) = initializer else { return };
        self.infer(arena, init);
        if arena.get(init).kind == NodeKind::InitializerListExpr {
            // Aggregate initializers are checked element-by-element during
            // lowering against the aggregate layout.
            return;
        }
        let Some(declared) = arena.symbol_ref(ty).handle().cloned() else {
            return;
        };
        let Some(init_ty) = self.expr_type(arena, init) else {
            return;
        };
        match self.coerce(arena, init, &declared) {
            Some(converted) => {
                if converted != init {
                    if let NodeData::DeclarationStatement { initializer, .. } =
                        &mut arena.get_mut(id).data
                    {
                        *initializer = Some(converted);
                    }
                    arena.set_parent(converted, id);
                }
            }
            None => {
                let span = arena.get(init).span;
                let from = self.fqn_of(&init_ty).unwrap_or_else(|| "?".into());
                let to = self.fqn_of(&declared).unwrap_or_else(|| "?".into());
                self.diagnostics.error(
                    diagnostic_codes::NO_IMPLICIT_CONVERSION,
                    span,
                    format!("no implicit conversion from '{from}' to '{to}'"),
                );
            }
        }
    }

    fn check_assignment(&mut self, arena: &mut NodeArena, id: NodeId) {
        let NodeData::AssignmentStatement { op, target, value } = arena.get(id).data.clone() else {
            return;
        };
        self.infer(arena, target);
        self.infer(arena, value);
        if !Self::is_assignable_expr(arena, target) {
            let span = arena.get(target).span;
            self.diagnostics.error(
                diagnostic_codes::NOT_ASSIGNABLE,
                span,
                "expression is not assignable".to_string(),
            );
            return;
        }
        let Some(target_ty) = self.expr_type(arena, target) else {
            return;
        };
        let Some(value_ty) = self.expr_type(arena, value) else {
            return;
        };

        // Compound assignments must also form a valid binary op.
        if let Some(core) = op.without_assignment() {
            let lhs_info = self.prim_info(&target_ty);
            let rhs_info = self.prim_info(&value_ty);
            let numeric_ok = match (&lhs_info, &rhs_info) {
                (Some(li), Some(ri)) => {
                    let float_bitwise = core
                        .flags()
                        .intersects(OperatorFlags::BITWISE | OperatorFlags::SHIFT)
                        && (li.kind.is_float() || ri.kind.is_float());
                    !float_bitwise && li.kind.is_numeric() && ri.kind.is_numeric()
                }
                _ => false,
            };
            if !numeric_ok
                && self
                    .find_binary_overload(arena, core, &target_ty, &value_ty)
                    .is_none()
            {
                self.no_operator(arena, id, core, &Some(target_ty), &Some(value_ty));
                return;
            }
        }

        match self.coerce(arena, value, &target_ty) {
            Some(converted) => {
                if converted != value {
                    if let NodeData::AssignmentStatement { value, .. } = &mut arena.get_mut(id).data
                    {
                        *value = converted;
                    }
                    arena.set_parent(converted, id);
                }
            }
            None => {
                let span = arena.get(value).span;
                let from = self.fqn_of(&value_ty).unwrap_or_else(|| "?".into());
                let to = self.fqn_of(&target_ty).unwrap_or_else(|| "?".into());
                self.diagnostics.error(
                    diagnostic_codes::NO_IMPLICIT_CONVERSION,
                    span,
                    format!("no implicit conversion from '{from}' to '{to}'"),
                );
            }
        }
    }

    fn check_return(&mut self, arena: &mut NodeArena, id: NodeId) {
        let NodeData::ReturnStatement { value } = arena.get(id).data else {
            return;
        };
        let Some(&function) = self.functions.last() else {
            return;
        };
        let return_ref = match &arena.get(function).data {
            NodeData::Function { return_type, .. }
            | NodeData::OperatorDecl { return_type, .. } => *return_type,
            _ => return,
        };
        let Some(expected) = arena.symbol_ref(return_ref).handle().cloned() else {
            return;
        };
        let expected_is_void = self
            .prim_info(&expected)
            .is_some_and(|info| info.kind == PrimitiveKind::Void);

        match value {
            None => {
                if !expected_is_void {
                    let span = arena.get(id).span;
                    let to = self.fqn_of(&expected).unwrap_or_else(|| "?".into());
                    self.diagnostics.error(
                        diagnostic_codes::RETURN_TYPE_MISMATCH,
                        span,
                        format!("cannot convert return expression from 'void' to '{to}'"),
                    );
                }
            }
            Some(value) => {
                self.infer(arena, value);
                let Some(value_ty) = self.expr_type(arena, value) else {
                    return;
                };
                match self.coerce(arena, value, &expected) {
                    Some(converted) => {
                        if converted != value {
                            if let NodeData::ReturnStatement { value } = &mut arena.get_mut(id).data
                            {
                                *value = Some(converted);
                            }
                            arena.set_parent(converted, id);
                        }
                    }
                    None => {
                        let span = arena.get(value).span;
                        let from = self.fqn_of(&value_ty).unwrap_or_else(|| "?".into());
                        let to = self.fqn_of(&expected).unwrap_or_else(|| "?".into());
                        self.diagnostics.error(
                            diagnostic_codes::RETURN_TYPE_MISMATCH,
                            span,
                            format!("cannot convert return expression from '{from}' to '{to}'"),
                        );
                    }
                }
            }
        }
    }

    // -- scope entry --------------------------------------------------------

    /// Functions were renamed to their real signatures by the resolver;
    /// fall back to the placeholder when parameters failed to resolve.
    fn callable_scope_name(&self, arena: &NodeArena, node: NodeId) -> Option<String> {
        let (owner, parameters) = match &arena.get(node).data {
            NodeData::Function {
                name, parameters, ..
            } => (SigOwner::Function(name.as_str().into()), parameters),
            NodeData::Constructor {
                name, parameters, ..
            } => (SigOwner::Function(name.as_str().into()), parameters),
            NodeData::OperatorDecl {
                op: Operator::Cast,
                return_type,
                parameters,
                ..
            } => {
                let target = arena
                    .symbol_ref(*return_type)
                    .handle()
                    .and_then(|h| self.fqn_of(h));
                match target {
                    Some(target_fqn) => (SigOwner::Cast { target_fqn }, parameters),
                    None => (SigOwner::Operator(Operator::Cast), parameters),
                }
            }
            NodeData::OperatorDecl { op, parameters, .. } => (SigOwner::Operator(*op), parameters),
            _ => return None,
        };

        let mut fqns = Vec::with_capacity(parameters.len());
        for &param in parameters.iter() {
            let NodeData::Parameter { ty, .. } = &arena.get(param).data else {
                return None;
            };
            match arena.symbol_ref(*ty).handle().and_then(|h| self.fqn_of(h)) {
                Some(fqn) => fqns.push(fqn),
                None => {
                    return Some(OverloadKey::placeholder(owner, parameters).render());
                }
            }
        }
        Some(
            OverloadKey {
                owner,
                arg_fqns: fqns,
                placeholder: false,
            }
            .render(),
        )
    }

    fn enter_scope(&mut self, node: NodeId, name: &str, kind: glint_symbols::ScopeKind) {
        // Signature names may embed dotted FQNs; try a single segment first.
        let current = self.scopes.current().table_index;
        let found = self
            .table
            .find_part(name, current)
            .or_else(|| self.table.find_full_path(name, current));
        if let Some(index) = found {
            self.scopes.push(node, index, kind);
        }
    }
}

impl AstVisitor for TypeChecker<'_> {
    type DeferCtx = ();

    fn visit(
        &mut self,
        arena: &mut NodeArena,
        node: &mut NodeId,
        _depth: usize,
        _deferred: Option<&()>,
    ) -> VisitAction<()> {
        let id = *node;
        match arena.get(id).kind {
            NodeKind::Namespace => {
                if let NodeData::Namespace { path, .. } = &arena.get(id).data {
                    let dotted = path
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join(".");
                    self.enter_scope(id, &dotted, glint_symbols::ScopeKind::Namespace);
                    self.namespace_paths.push(dotted);
                }
            }
            NodeKind::Struct | NodeKind::Class | NodeKind::Enum => {
                if let Some(name) = arena.get(id).name() {
                    self.enter_scope(id, name.as_str(), glint_symbols::ScopeKind::Struct);
                }
            }
            NodeKind::Function | NodeKind::OperatorDecl | NodeKind::Constructor => {
                if let Some(name) = self.callable_scope_name(arena, id) {
                    self.enter_scope(id, &name, glint_symbols::ScopeKind::Function);
                }
                self.functions.push(id);
            }
            NodeKind::BlockStatement => {
                let name = self.scopes.next_block_name();
                self.enter_scope(id, &name, glint_symbols::ScopeKind::Block);
            }
            NodeKind::DeclarationStatement => self.check_declaration(arena, id),
            NodeKind::AssignmentStatement => self.check_assignment(arena, id),
            NodeKind::ReturnStatement => self.check_return(arena, id),
            NodeKind::ExpressionStatement => {
                if let NodeData::ExpressionStatement { expr } = arena.get(id).data {
                    self.infer(arena, expr);
                }
            }
            NodeKind::IfStatement => {
                if let NodeData::IfStatement { condition, .. } = arena.get(id).data {
                    self.infer(arena, condition);
                    self.require_bool(arena, condition);
                }
            }
            NodeKind::WhileStatement => {
                if let NodeData::WhileStatement { condition, .. } = arena.get(id).data {
                    self.infer(arena, condition);
                    self.require_bool(arena, condition);
                }
            }
            NodeKind::ForStatement => {
                if let NodeData::ForStatement { condition, .. } = arena.get(id).data {
                    if let Some(condition) = condition {
                        self.infer(arena, condition);
                        self.require_bool(arena, condition);
                    }
                }
            }
            kind if kind.is_expression() => {
                // Expressions are inferred from their statement roots.
                return VisitAction::Skip;
            }
            _ => {}
        }
        VisitAction::Keep
    }

    fn leave(&mut self, arena: &mut NodeArena, node: NodeId, _depth: usize) {
        if matches!(
            arena.get(node).kind,
            NodeKind::Function | NodeKind::OperatorDecl | NodeKind::Constructor
        ) && self.functions.last() == Some(&node)
        {
            self.functions.pop();
        }
        let owned = self.scopes.current().owner == Some(node);
        if self.scopes.pop_if_owner(node) && owned && arena.get(node).kind == NodeKind::Namespace {
            self.namespace_paths.pop();
        }
    }
}
