//! Node payloads and the kind tag.
//!
//! Every AST node is a `Node` in the arena: a kind tag, a span, a parent
//! link, and a `NodeData` payload. Child enumeration is a match over the
//! payload (`push_children`), which keeps traversal free of RTTI and keeps
//! declaration order deterministic.

use crate::arena::{NodeId, RefId};
use crate::operators::Operator;
use crate::primitive::{PrimitiveClass, PrimitiveKind};
use glint_common::{Istr, Number, Span};
use smallvec::SmallVec;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    CompilationUnit,
    UsingDecl,
    Namespace,
    Struct,
    Class,
    Enum,
    EnumMember,
    Field,
    Function,
    OperatorDecl,
    Constructor,
    Parameter,
    AttributeDecl,
    Primitive,
    ArrayDef,
    PointerDef,
    SwizzleDef,
    ThisDef,
    BlockStatement,
    DeclarationStatement,
    AssignmentStatement,
    IfStatement,
    WhileStatement,
    ForStatement,
    ReturnStatement,
    ExpressionStatement,
    LiteralExpr,
    SymbolRefExpr,
    BinaryExpr,
    UnaryExpr,
    CastExpr,
    CallExpr,
    MemberAccessExpr,
    IndexerExpr,
    InitializerListExpr,
    TernaryExpr,
}

impl NodeKind {
    pub fn is_expression(self) -> bool {
        matches!(
            self,
            NodeKind::LiteralExpr
                | NodeKind::SymbolRefExpr
                | NodeKind::BinaryExpr
                | NodeKind::UnaryExpr
                | NodeKind::CastExpr
                | NodeKind::CallExpr
                | NodeKind::MemberAccessExpr
                | NodeKind::IndexerExpr
                | NodeKind::InitializerListExpr
                | NodeKind::TernaryExpr
        )
    }

    pub fn is_statement(self) -> bool {
        matches!(
            self,
            NodeKind::BlockStatement
                | NodeKind::DeclarationStatement
                | NodeKind::AssignmentStatement
                | NodeKind::IfStatement
                | NodeKind::WhileStatement
                | NodeKind::ForStatement
                | NodeKind::ReturnStatement
                | NodeKind::ExpressionStatement
        )
    }

    /// Kinds that introduce a name into the symbol table.
    pub fn is_symbol_def(self) -> bool {
        matches!(
            self,
            NodeKind::Namespace
                | NodeKind::Struct
                | NodeKind::Class
                | NodeKind::Enum
                | NodeKind::EnumMember
                | NodeKind::Field
                | NodeKind::Function
                | NodeKind::OperatorDecl
                | NodeKind::Constructor
                | NodeKind::Parameter
                | NodeKind::Primitive
                | NodeKind::ArrayDef
                | NodeKind::PointerDef
                | NodeKind::SwizzleDef
                | NodeKind::ThisDef
                | NodeKind::DeclarationStatement
        )
    }
}

/// Access modifier on type members and declarations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Access {
    Public,
    Internal,
    #[default]
    Private,
}

/// Literal payloads.
#[derive(Clone, Debug, PartialEq)]
pub enum LiteralValue {
    Number(Number),
    Bool(bool),
    String(Istr),
}

/// Lazy-evaluation state used by the bottom-up type checker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LazyEval {
    #[default]
    NotVisited,
    ChildrenPushed,
    Done,
}

/// Common state carried by every expression node.
#[derive(Clone, Debug, Default)]
pub struct ExprInfo {
    /// Handle of the inferred type's definition; `None` until checked.
    pub inferred_type: Option<glint_common::SymbolHandle>,
    pub lazy: LazyEval,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Literal {
        value: LiteralValue,
    },
    SymbolRef {
        symbol: RefId,
    },
    Binary {
        op: Operator,
        left: NodeId,
        right: NodeId,
        /// Filled in when the checker falls back to an operator overload.
        operator: Option<RefId>,
    },
    Unary {
        op: Operator,
        operand: NodeId,
        operator: Option<RefId>,
    },
    Cast {
        ty: RefId,
        operand: NodeId,
        operator: Option<RefId>,
    },
    Call {
        callee: RefId,
        args: Vec<NodeId>,
    },
    /// One segment of a member-access chain `a.b.c`. The chain tail is not a
    /// generic child; the resolver walks it explicitly.
    MemberAccess {
        symbol: RefId,
        next: Option<NodeId>,
    },
    Indexer {
        target: NodeId,
        index: NodeId,
    },
    InitializerList {
        items: Vec<NodeId>,
    },
    Ternary {
        condition: NodeId,
        then_expr: NodeId,
        else_expr: NodeId,
    },
}

#[derive(Clone, Debug)]
pub struct ExprData {
    pub info: ExprInfo,
    pub kind: ExprKind,
}

#[derive(Clone, Debug)]
pub enum NodeData {
    CompilationUnit {
        usings: Vec<NodeId>,
        declarations: Vec<NodeId>,
    },
    UsingDecl {
        path: Istr,
        alias: Option<Istr>,
    },
    Namespace {
        /// Dotted segments, `a.b.c` → `[a, b, c]`.
        path: SmallVec<[Istr; 2]>,
        usings: Vec<NodeId>,
        declarations: Vec<NodeId>,
    },
    Struct {
        name: Istr,
        access: Access,
        attributes: Vec<NodeId>,
        members: Vec<NodeId>,
    },
    Class {
        name: Istr,
        access: Access,
        attributes: Vec<NodeId>,
        members: Vec<NodeId>,
    },
    Enum {
        name: Istr,
        access: Access,
        members: Vec<NodeId>,
    },
    EnumMember {
        name: Istr,
        value: i64,
    },
    Field {
        name: Istr,
        access: Access,
        ty: RefId,
        attributes: Vec<NodeId>,
    },
    Function {
        name: Istr,
        access: Access,
        return_type: RefId,
        parameters: Vec<NodeId>,
        body: Option<NodeId>,
        attributes: Vec<NodeId>,
    },
    OperatorDecl {
        op: Operator,
        access: Access,
        return_type: RefId,
        parameters: Vec<NodeId>,
        body: Option<NodeId>,
        /// Cast operators marked `implicit` join the implicit overload set.
        implicit: bool,
    },
    Constructor {
        name: Istr,
        access: Access,
        parameters: Vec<NodeId>,
        body: Option<NodeId>,
    },
    Parameter {
        name: Istr,
        ty: RefId,
    },
    AttributeDecl {
        target: RefId,
        args: Vec<NodeId>,
    },
    Primitive {
        name: Istr,
        kind: PrimitiveKind,
        class: PrimitiveClass,
        rows: u32,
        cols: u32,
    },
    ArrayDef {
        name: Istr,
        element: RefId,
        dims: SmallVec<[u32; 2]>,
    },
    PointerDef {
        name: Istr,
        pointee: RefId,
    },
    SwizzleDef {
        /// The pattern itself (`xyz`, `rgba`, ...).
        name: Istr,
        /// 2 bits per selected component, first component in the low bits.
        mask: u8,
        component_count: u8,
        /// The resulting primitive type.
        ty: RefId,
    },
    ThisDef {
        ty: RefId,
    },
    BlockStatement {
        statements: Vec<NodeId>,
    },
    DeclarationStatement {
        name: Istr,
        ty: RefId,
        initializer: Option<NodeId>,
    },
    AssignmentStatement {
        op: Operator,
        target: NodeId,
        value: NodeId,
    },
    IfStatement {
        condition: NodeId,
        then_block: NodeId,
        else_block: Option<NodeId>,
    },
    WhileStatement {
        condition: NodeId,
        body: NodeId,
    },
    ForStatement {
        init: Option<NodeId>,
        condition: Option<NodeId>,
        step: Option<NodeId>,
        body: NodeId,
    },
    ReturnStatement {
        value: Option<NodeId>,
    },
    ExpressionStatement {
        expr: NodeId,
    },
    Expr(ExprData),
}

#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    pub parent: Option<NodeId>,
    pub data: NodeData,
}

impl Node {
    /// Append the node's children in declaration order.
    ///
    /// Member-access chain tails are deliberately absent: the resolver walks
    /// chains itself and replaces the traversal node at the chain end.
    pub fn push_children(&self, out: &mut Vec<NodeId>) {
        match &self.data {
            NodeData::CompilationUnit {
                usings,
                declarations,
            } => {
                out.extend_from_slice(usings);
                out.extend_from_slice(declarations);
            }
            NodeData::UsingDecl { .. } => {}
            NodeData::Namespace {
                usings,
                declarations,
                ..
            } => {
                out.extend_from_slice(usings);
                out.extend_from_slice(declarations);
            }
            NodeData::Struct {
                attributes, members, ..
            }
            | NodeData::Class {
                attributes, members, ..
            } => {
                out.extend_from_slice(attributes);
                out.extend_from_slice(members);
            }
            NodeData::Enum { members, .. } => out.extend_from_slice(members),
            NodeData::EnumMember { .. } => {}
            NodeData::Field { attributes, .. } => out.extend_from_slice(attributes),
            NodeData::Function {
                parameters,
                body,
                attributes,
                ..
            } => {
                out.extend_from_slice(attributes);
                out.extend_from_slice(parameters);
                out.extend(body.iter().copied());
            }
            NodeData::OperatorDecl {
                parameters, body, ..
            }
            | NodeData::Constructor {
                parameters, body, ..
            } => {
                out.extend_from_slice(parameters);
                out.extend(body.iter().copied());
            }
            NodeData::Parameter { .. } => {}
            NodeData::AttributeDecl { args, .. } => out.extend_from_slice(args),
            NodeData::Primitive { .. }
            | NodeData::ArrayDef { .. }
            | NodeData::PointerDef { .. }
            | NodeData::SwizzleDef { .. }
            | NodeData::ThisDef { .. } => {}
            NodeData::BlockStatement { statements } => out.extend_from_slice(statements),
            NodeData::DeclarationStatement { initializer, .. } => {
                out.extend(initializer.iter().copied());
            }
            NodeData::AssignmentStatement { target, value, .. } => {
                out.push(*target);
                out.push(*value);
            }
            NodeData::IfStatement {
                condition,
                then_block,
                else_block,
            } => {
                out.push(*condition);
                out.push(*then_block);
                out.extend(else_block.iter().copied());
            }
            NodeData::WhileStatement { condition, body } => {
                out.push(*condition);
                out.push(*body);
            }
            NodeData::ForStatement {
                init,
                condition,
                step,
                body,
            } => {
                out.extend(init.iter().copied());
                out.extend(condition.iter().copied());
                out.extend(step.iter().copied());
                out.push(*body);
            }
            NodeData::ReturnStatement { value } => out.extend(value.iter().copied()),
            NodeData::ExpressionStatement { expr } => out.push(*expr),
            NodeData::Expr(expr) => match &expr.kind {
                ExprKind::Literal { .. } | ExprKind::SymbolRef { .. } => {}
                ExprKind::Binary { left, right, .. } => {
                    out.push(*left);
                    out.push(*right);
                }
                ExprKind::Unary { operand, .. } => out.push(*operand),
                ExprKind::Cast { operand, .. } => out.push(*operand),
                ExprKind::Call { args, .. } => out.extend_from_slice(args),
                ExprKind::MemberAccess { .. } => {}
                ExprKind::Indexer { target, index } => {
                    out.push(*target);
                    out.push(*index);
                }
                ExprKind::InitializerList { items } => out.extend_from_slice(items),
                ExprKind::Ternary {
                    condition,
                    then_expr,
                    else_expr,
                } => {
                    out.push(*condition);
                    out.push(*then_expr);
                    out.push(*else_expr);
                }
            },
        }
    }

    /// The declared short name, for kinds that introduce one.
    pub fn name(&self) -> Option<Istr> {
        match &self.data {
            NodeData::Namespace { path, .. } => path.last().copied(),
            NodeData::Struct { name, .. }
            | NodeData::Class { name, .. }
            | NodeData::Enum { name, .. }
            | NodeData::EnumMember { name, .. }
            | NodeData::Field { name, .. }
            | NodeData::Function { name, .. }
            | NodeData::Constructor { name, .. }
            | NodeData::Parameter { name, .. }
            | NodeData::Primitive { name, .. }
            | NodeData::ArrayDef { name, .. }
            | NodeData::PointerDef { name, .. }
            | NodeData::SwizzleDef { name, .. }
            | NodeData::DeclarationStatement { name, .. } => Some(*name),
            _ => None,
        }
    }

    pub fn expr(&self) -> Option<&ExprData> {
        match &self.data {
            NodeData::Expr(expr) => Some(expr),
            _ => None,
        }
    }

    pub fn expr_mut(&mut self) -> Option<&mut ExprData> {
        match &mut self.data {
            NodeData::Expr(expr) => Some(expr),
            _ => None,
        }
    }
}
