//! The node arena.
//!
//! Nodes are allocated once and addressed by `NodeId` for the life of the
//! compilation. Ids are handed out in creation order, which the front-end
//! produces in source order; the resolver's use-before-declaration check
//! relies on that ordering.

use crate::node::{ExprData, ExprInfo, ExprKind, Node, NodeData, NodeKind};
use crate::refs::SymbolRef;
use glint_common::Span;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefId(pub u32);

impl RefId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Debug for RefId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RefId({})", self.0)
    }
}

/// Arena owning all AST nodes and symbol references of one assembly.
#[derive(Debug, Default, Clone)]
pub struct NodeArena {
    nodes: Vec<Node>,
    refs: Vec<SymbolRef>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, kind: NodeKind, span: Span, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            span,
            parent: None,
            data,
        });
        id
    }

    /// Allocate an expression node with fresh checker state.
    pub fn alloc_expr(&mut self, kind: NodeKind, span: Span, expr: ExprKind) -> NodeId {
        debug_assert!(kind.is_expression());
        self.alloc(
            kind,
            span,
            NodeData::Expr(ExprData {
                info: ExprInfo::default(),
                kind: expr,
            }),
        )
    }

    pub fn add_ref(&mut self, symbol_ref: SymbolRef) -> RefId {
        let id = RefId(self.refs.len() as u32);
        self.refs.push(symbol_ref);
        id
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    #[inline]
    pub fn symbol_ref(&self, id: RefId) -> &SymbolRef {
        &self.refs[id.index()]
    }

    #[inline]
    pub fn symbol_ref_mut(&mut self, id: RefId) -> &mut SymbolRef {
        &mut self.refs[id.index()]
    }

    pub fn set_parent(&mut self, child: NodeId, parent: NodeId) {
        self.nodes[child.index()].parent = Some(parent);
    }

    /// Fix up parent links for `node`'s direct children.
    pub fn adopt_children(&mut self, node: NodeId) {
        let mut children = Vec::new();
        self.nodes[node.index()].push_children(&mut children);
        for child in children {
            self.set_parent(child, node);
        }
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.nodes[node.index()].push_children(&mut out);
        out
    }

    /// Fix up parent links for the whole subtree under `root`. Front-ends
    /// that build bottom-up call this once on the finished unit.
    pub fn adopt_subtree(&mut self, root: NodeId) {
        let mut stack = vec![root];
        let mut children = Vec::new();
        while let Some(node) = stack.pop() {
            children.clear();
            self.nodes[node.index()].push_children(&mut children);
            // Member-access chains are not generic children; adopt them too.
            if let NodeData::Expr(expr) = &self.nodes[node.index()].data {
                if let crate::node::ExprKind::MemberAccess {
                    next: Some(next), ..
                } = expr.kind
                {
                    children.push(next);
                }
            }
            for &child in &children {
                self.set_parent(child, node);
                stack.push(child);
            }
        }
    }

    /// Walk parent links from `node` to the root.
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut current = self.nodes[node.index()].parent;
        std::iter::from_fn(move || {
            let next = current?;
            current = self.nodes[next.index()].parent;
            Some(next)
        })
    }

    pub fn expr_info(&self, node: NodeId) -> Option<&ExprInfo> {
        self.get(node).expr().map(|e| &e.info)
    }

    pub fn expr_info_mut(&mut self, node: NodeId) -> Option<&mut ExprInfo> {
        self.get_mut(node).expr_mut().map(|e| &mut e.info)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ref_count(&self) -> usize {
        self.refs.len()
    }

    pub fn refs(&self) -> impl Iterator<Item = &SymbolRef> {
        self.refs.iter()
    }

    pub fn refs_mut(&mut self) -> impl Iterator<Item = &mut SymbolRef> {
        self.refs.iter_mut()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// Merge another arena into this one, rewriting all ids in the absorbed
    /// nodes. Per-unit arenas are parsed independently and merged into the
    /// target assembly this way. Returns the (node, ref) id offsets.
    pub fn absorb(&mut self, mut other: NodeArena) -> (u32, u32) {
        let node_offset = self.nodes.len() as u32;
        let ref_offset = self.refs.len() as u32;
        for node in &mut other.nodes {
            shift_node_ids(node, node_offset, ref_offset);
        }
        self.nodes.append(&mut other.nodes);
        self.refs.append(&mut other.refs);
        (node_offset, ref_offset)
    }
}

fn shift_node_ids(node: &mut Node, nodes: u32, refs: u32) {
    let n = |id: &mut NodeId| id.0 += nodes;
    let n_opt = |id: &mut Option<NodeId>| {
        if let Some(id) = id {
            id.0 += nodes;
        }
    };
    let n_vec = |ids: &mut Vec<NodeId>| {
        for id in ids {
            id.0 += nodes;
        }
    };
    let r = |id: &mut RefId| id.0 += refs;

    n_opt(&mut node.parent);
    match &mut node.data {
        NodeData::CompilationUnit {
            usings,
            declarations,
        } => {
            n_vec(usings);
            n_vec(declarations);
        }
        NodeData::UsingDecl { .. } => {}
        NodeData::Namespace {
            usings,
            declarations,
            ..
        } => {
            n_vec(usings);
            n_vec(declarations);
        }
        NodeData::Struct {
            attributes, members, ..
        }
        | NodeData::Class {
            attributes, members, ..
        } => {
            n_vec(attributes);
            n_vec(members);
        }
        NodeData::Enum { members, .. } => n_vec(members),
        NodeData::EnumMember { .. } => {}
        NodeData::Field { ty, attributes, .. } => {
            r(ty);
            n_vec(attributes);
        }
        NodeData::Function {
            return_type,
            parameters,
            body,
            attributes,
            ..
        } => {
            r(return_type);
            n_vec(parameters);
            n_opt(body);
            n_vec(attributes);
        }
        NodeData::OperatorDecl {
            return_type,
            parameters,
            body,
            ..
        } => {
            r(return_type);
            n_vec(parameters);
            n_opt(body);
        }
        NodeData::Constructor {
            parameters, body, ..
        } => {
            n_vec(parameters);
            n_opt(body);
        }
        NodeData::Parameter { ty, .. } => r(ty),
        NodeData::AttributeDecl { target, args } => {
            r(target);
            n_vec(args);
        }
        NodeData::Primitive { .. } => {}
        NodeData::ArrayDef { element, .. } => r(element),
        NodeData::PointerDef { pointee, .. } => r(pointee),
        NodeData::SwizzleDef { ty, .. } => r(ty),
        NodeData::ThisDef { ty } => r(ty),
        NodeData::BlockStatement { statements } => n_vec(statements),
        NodeData::DeclarationStatement {
            ty, initializer, ..
        } => {
            r(ty);
            n_opt(initializer);
        }
        NodeData::AssignmentStatement { target, value, .. } => {
            n(target);
            n(value);
        }
        NodeData::IfStatement {
            condition,
            then_block,
            else_block,
        } => {
            n(condition);
            n(then_block);
            n_opt(else_block);
        }
        NodeData::WhileStatement { condition, body } => {
            n(condition);
            n(body);
        }
        NodeData::ForStatement {
            init,
            condition,
            step,
            body,
        } => {
            n_opt(init);
            n_opt(condition);
            n_opt(step);
            n(body);
        }
        NodeData::ReturnStatement { value } => n_opt(value),
        NodeData::ExpressionStatement { expr } => n(expr),
        NodeData::Expr(expr) => match &mut expr.kind {
            crate::node::ExprKind::Literal { .. } => {}
            crate::node::ExprKind::SymbolRef { symbol } => r(symbol),
            crate::node::ExprKind::Binary {
                left,
                right,
                operator,
                ..
            } => {
                n(left);
                n(right);
                if let Some(operator) = operator {
                    r(operator);
                }
            }
            crate::node::ExprKind::Unary {
                operand, operator, ..
            } => {
                n(operand);
                if let Some(operator) = operator {
                    r(operator);
                }
            }
            crate::node::ExprKind::Cast {
                ty,
                operand,
                operator,
            } => {
                r(ty);
                n(operand);
                if let Some(operator) = operator {
                    r(operator);
                }
            }
            crate::node::ExprKind::Call { callee, args } => {
                r(callee);
                n_vec(args);
            }
            crate::node::ExprKind::MemberAccess { symbol, next } => {
                r(symbol);
                n_opt(next);
            }
            crate::node::ExprKind::Indexer { target, index } => {
                n(target);
                n(index);
            }
            crate::node::ExprKind::InitializerList { items } => n_vec(items),
            crate::node::ExprKind::Ternary {
                condition,
                then_expr,
                else_expr,
            } => {
                n(condition);
                n(then_expr);
                n(else_expr);
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::LiteralValue;
    use glint_common::Number;

    #[test]
    fn alloc_and_parents() {
        let mut arena = NodeArena::new();
        let lit = arena.alloc_expr(
            NodeKind::LiteralExpr,
            Span::synthetic(),
            ExprKind::Literal {
                value: LiteralValue::Number(Number::I32(1)),
            },
        );
        let ret = arena.alloc(
            NodeKind::ReturnStatement,
            Span::synthetic(),
            NodeData::ReturnStatement { value: Some(lit) },
        );
        arena.adopt_children(ret);
        assert_eq!(arena.get(lit).parent, Some(ret));
        assert_eq!(arena.children(ret), vec![lit]);
        assert!(arena.ancestors(lit).any(|a| a == ret));
    }

    #[test]
    fn ids_are_creation_ordered() {
        let mut arena = NodeArena::new();
        let a = arena.alloc(
            NodeKind::BlockStatement,
            Span::synthetic(),
            NodeData::BlockStatement { statements: vec![] },
        );
        let b = arena.alloc(
            NodeKind::BlockStatement,
            Span::synthetic(),
            NodeData::BlockStatement { statements: vec![] },
        );
        assert!(a < b);
    }
}
