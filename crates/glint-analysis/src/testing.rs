//! Test-support AST construction.
//!
//! The lexer and parser are external collaborators; analysis tests (and the
//! driver's integration tests) build ASTs directly through this builder,
//! which allocates nodes in source order the way the front-end would.

use glint_ast::node::Access;
use glint_ast::{
    ExprKind, LiteralValue, NodeData, NodeId, NodeKind, Operator, RefId, RefKind, SymbolRef,
};
use glint_common::{Number, Span, intern};
use glint_symbols::Assembly;
use smallvec::SmallVec;

/// Result of running the full analysis pipeline in tests.
pub struct Analyzed {
    pub assembly: Assembly,
    pub root: NodeId,
    pub diagnostics: glint_common::DiagnosticBag,
    pub swizzles: glint_symbols::SwizzleManager,
    pub arrays: glint_symbols::ArrayManager,
}

pub struct AstBuilder {
    pub assembly: Assembly,
    namespace_path: Vec<String>,
    usings: Vec<NodeId>,
    declarations: Vec<NodeId>,
}

impl AstBuilder {
    pub fn new(namespace: &str) -> Self {
        AstBuilder {
            assembly: Assembly::create("test"),
            namespace_path: namespace.split('.').map(str::to_string).collect(),
            usings: Vec::new(),
            declarations: Vec::new(),
        }
    }

    fn span(&self) -> Span {
        Span::synthetic()
    }

    // -- refs ---------------------------------------------------------------

    pub fn type_ref(&mut self, name: &str) -> RefId {
        self.assembly
            .arena
            .add_ref(SymbolRef::new(intern(name), RefKind::Type, self.span()))
    }

    pub fn array_type_ref(&mut self, element: &str, dims: &[u32]) -> RefId {
        self.assembly
            .arena
            .add_ref(SymbolRef::array(intern(element), self.span(), dims))
    }

    pub fn ident_ref(&mut self, name: &str) -> RefId {
        self.assembly
            .arena
            .add_ref(SymbolRef::new(intern(name), RefKind::Identifier, self.span()))
    }

    pub fn member_ref(&mut self, name: &str) -> RefId {
        self.assembly
            .arena
            .add_ref(SymbolRef::new(intern(name), RefKind::Member, self.span()))
    }

    // -- declarations -------------------------------------------------------

    pub fn field(&mut self, name: &str, ty: RefId) -> NodeId {
        self.assembly.arena.alloc(
            NodeKind::Field,
            self.span(),
            NodeData::Field {
                name: intern(name),
                access: Access::Public,
                ty,
                attributes: Vec::new(),
            },
        )
    }

    pub fn struct_def(&mut self, name: &str, members: Vec<NodeId>) -> NodeId {
        let node = self.assembly.arena.alloc(
            NodeKind::Struct,
            self.span(),
            NodeData::Struct {
                name: intern(name),
                access: Access::Public,
                attributes: Vec::new(),
                members,
            },
        );
        self.declarations.push(node);
        node
    }

    pub fn param(&mut self, name: &str, ty_name: &str) -> NodeId {
        let ty = self.type_ref(ty_name);
        self.assembly.arena.alloc(
            NodeKind::Parameter,
            self.span(),
            NodeData::Parameter {
                name: intern(name),
                ty,
            },
        )
    }

    pub fn block(&mut self, statements: Vec<NodeId>) -> NodeId {
        self.assembly.arena.alloc(
            NodeKind::BlockStatement,
            self.span(),
            NodeData::BlockStatement { statements },
        )
    }

    pub fn function(&mut self, name: &str, return_type: RefId, parameters: Vec<NodeId>, body: Vec<NodeId>) -> NodeId {
        let body = self.block(body);
        self.function_with_body(name, return_type, parameters, body)
    }

    /// Build a cast operator `operator [implicit] <target>(param)`. Operator
    /// overloads are members: pass the node to `struct_def`.
    pub fn cast_operator(&mut self, target: &str, param: NodeId, implicit: bool) -> NodeId {
        let return_type = self.type_ref(target);
        self.assembly.arena.alloc(
            NodeKind::OperatorDecl,
            self.span(),
            NodeData::OperatorDecl {
                op: Operator::Cast,
                access: Access::Public,
                return_type,
                parameters: vec![param],
                body: None,
                implicit,
            },
        )
    }

    /// Build a binary operator overload, for inclusion in a struct's members.
    pub fn binary_operator(&mut self, op: Operator, ret: &str, left: NodeId, right: NodeId) -> NodeId {
        let return_type = self.type_ref(ret);
        self.assembly.arena.alloc(
            NodeKind::OperatorDecl,
            self.span(),
            NodeData::OperatorDecl {
                op,
                access: Access::Public,
                return_type,
                parameters: vec![left, right],
                body: None,
                implicit: false,
            },
        )
    }

    pub fn function_with_body(
        &mut self,
        name: &str,
        return_type: RefId,
        parameters: Vec<NodeId>,
        body: NodeId,
    ) -> NodeId {
        let node = self.assembly.arena.alloc(
            NodeKind::Function,
            self.span(),
            NodeData::Function {
                name: intern(name),
                access: Access::Public,
                return_type,
                parameters,
                body: Some(body),
                attributes: Vec::new(),
            },
        );
        self.declarations.push(node);
        node
    }

    // -- statements ---------------------------------------------------------

    pub fn declaration(&mut self, name: &str, ty: RefId, initializer: Option<NodeId>) -> NodeId {
        self.assembly.arena.alloc(
            NodeKind::DeclarationStatement,
            self.span(),
            NodeData::DeclarationStatement {
                name: intern(name),
                ty,
                initializer,
            },
        )
    }

    pub fn assign(&mut self, target: NodeId, value: NodeId) -> NodeId {
        self.compound_assign(Operator::Assign, target, value)
    }

    pub fn compound_assign(&mut self, op: Operator, target: NodeId, value: NodeId) -> NodeId {
        self.assembly.arena.alloc(
            NodeKind::AssignmentStatement,
            self.span(),
            NodeData::AssignmentStatement { op, target, value },
        )
    }

    pub fn expr_stmt(&mut self, expr: NodeId) -> NodeId {
        self.assembly.arena.alloc(
            NodeKind::ExpressionStatement,
            self.span(),
            NodeData::ExpressionStatement { expr },
        )
    }

    pub fn ret(&mut self, value: Option<NodeId>) -> NodeId {
        self.assembly.arena.alloc(
            NodeKind::ReturnStatement,
            self.span(),
            NodeData::ReturnStatement { value },
        )
    }

    pub fn for_stmt(
        &mut self,
        init: Option<NodeId>,
        condition: Option<NodeId>,
        step: Option<NodeId>,
        body: NodeId,
    ) -> NodeId {
        self.assembly.arena.alloc(
            NodeKind::ForStatement,
            self.span(),
            NodeData::ForStatement {
                init,
                condition,
                step,
                body,
            },
        )
    }

    pub fn if_stmt(&mut self, condition: NodeId, then_block: NodeId, else_block: Option<NodeId>) -> NodeId {
        self.assembly.arena.alloc(
            NodeKind::IfStatement,
            self.span(),
            NodeData::IfStatement {
                condition,
                then_block,
                else_block,
            },
        )
    }

    // -- expressions --------------------------------------------------------

    pub fn int_literal(&mut self, value: i32) -> NodeId {
        self.literal(LiteralValue::Number(Number::I32(value)))
    }

    pub fn float_literal(&mut self, value: f32) -> NodeId {
        self.literal(LiteralValue::Number(Number::F32(value)))
    }

    pub fn bool_literal(&mut self, value: bool) -> NodeId {
        self.literal(LiteralValue::Bool(value))
    }

    pub fn literal(&mut self, value: LiteralValue) -> NodeId {
        self.assembly
            .arena
            .alloc_expr(NodeKind::LiteralExpr, self.span(), ExprKind::Literal { value })
    }

    pub fn ident(&mut self, name: &str) -> NodeId {
        let symbol = self.ident_ref(name);
        self.assembly
            .arena
            .alloc_expr(NodeKind::SymbolRefExpr, self.span(), ExprKind::SymbolRef { symbol })
    }

    pub fn binary(&mut self, op: Operator, left: NodeId, right: NodeId) -> NodeId {
        self.assembly.arena.alloc_expr(
            NodeKind::BinaryExpr,
            self.span(),
            ExprKind::Binary {
                op,
                left,
                right,
                operator: None,
            },
        )
    }

    pub fn unary(&mut self, op: Operator, operand: NodeId) -> NodeId {
        self.assembly.arena.alloc_expr(
            NodeKind::UnaryExpr,
            self.span(),
            ExprKind::Unary {
                op,
                operand,
                operator: None,
            },
        )
    }

    pub fn call(&mut self, name: &str, args: Vec<NodeId>) -> NodeId {
        let callee = self.assembly.arena.add_ref(SymbolRef::new(
            intern(name),
            RefKind::FunctionOrConstructor,
            self.span(),
        ));
        self.assembly
            .arena
            .alloc_expr(NodeKind::CallExpr, self.span(), ExprKind::Call { callee, args })
    }

    pub fn indexer(&mut self, target: NodeId, index: NodeId) -> NodeId {
        self.assembly
            .arena
            .alloc_expr(NodeKind::IndexerExpr, self.span(), ExprKind::Indexer { target, index })
    }

    pub fn initializer_list(&mut self, items: Vec<NodeId>) -> NodeId {
        self.assembly.arena.alloc_expr(
            NodeKind::InitializerListExpr,
            self.span(),
            ExprKind::InitializerList { items },
        )
    }

    pub fn cast(&mut self, ty_name: &str, operand: NodeId) -> NodeId {
        let ty = self.type_ref(ty_name);
        self.assembly.arena.alloc_expr(
            NodeKind::CastExpr,
            self.span(),
            ExprKind::Cast {
                ty,
                operand,
                operator: None,
            },
        )
    }

    /// Build a member-access chain `root.seg1.seg2…`; the root segment's ref
    /// resolves through the scope lookup, the rest are members.
    pub fn member_chain(&mut self, root: &str, segments: &[&str]) -> NodeId {
        let mut next: Option<NodeId> = None;
        for segment in segments.iter().rev() {
            let symbol = self.member_ref(segment);
            let node = self.assembly.arena.alloc_expr(
                NodeKind::MemberAccessExpr,
                self.span(),
                ExprKind::MemberAccess { symbol, next },
            );
            next = Some(node);
        }
        let symbol = self.ident_ref(root);
        self.assembly.arena.alloc_expr(
            NodeKind::MemberAccessExpr,
            self.span(),
            ExprKind::MemberAccess { symbol, next },
        )
    }

    // -- pipeline -----------------------------------------------------------

    /// Run collect + resolve + check over the finished unit.
    pub fn analyze(self) -> Analyzed {
        let (mut assembly, root) = self.finish();
        let mut diagnostics = glint_common::DiagnosticBag::new();
        let references = glint_symbols::AssemblyCollection::new();
        let mut swizzles = glint_symbols::SwizzleManager::new();
        let mut arrays = glint_symbols::ArrayManager::new();
        crate::collect::collect(&mut assembly, root, &mut diagnostics);
        crate::resolve::resolve(
            &mut assembly,
            root,
            &references,
            &mut swizzles,
            &mut arrays,
            &mut diagnostics,
        );
        crate::check::check(
            &mut assembly,
            root,
            &references,
            &swizzles,
            &arrays,
            &mut diagnostics,
        );
        Analyzed {
            assembly,
            root,
            diagnostics,
            swizzles,
            arrays,
        }
    }

    // -- finishing ----------------------------------------------------------

    /// Wrap everything in the namespace and compilation unit and hand back
    /// the assembly with parent links fixed.
    pub fn finish(mut self) -> (Assembly, NodeId) {
        let path: SmallVec<[glint_common::Istr; 2]> = self
            .namespace_path
            .iter()
            .map(|part| intern(part))
            .collect();
        let namespace = self.assembly.arena.alloc(
            NodeKind::Namespace,
            Span::synthetic(),
            NodeData::Namespace {
                path,
                usings: Vec::new(),
                declarations: std::mem::take(&mut self.declarations),
            },
        );
        let unit = self.assembly.arena.alloc(
            NodeKind::CompilationUnit,
            Span::synthetic(),
            NodeData::CompilationUnit {
                usings: std::mem::take(&mut self.usings),
                declarations: vec![namespace],
            },
        );
        self.assembly.arena.adopt_subtree(unit);
        (self.assembly, unit)
    }
}
