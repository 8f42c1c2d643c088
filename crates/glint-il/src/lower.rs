//! Lowering from the typed AST to IL.
//!
//! Structured control flow lowers to the canonical block shapes the
//! analyses expect: loops get a preheader, a header carrying the phis and
//! the exit test, one body block, and a latch with the step and back edge.
//! Variables are versioned on every assignment; joins get phis for the
//! variables both paths assigned.

use crate::cfg::{BlockId, ControlFlowGraph};
use crate::func::IlFunction;
use crate::instr::{ILOpCode, Instruction};
use crate::metadata::IlMetadata;
use crate::value::{IlVarId, Operand};
use glint_ast::{ExprKind, LiteralValue, NodeArena, NodeData, NodeId, Operator, RefId};
use glint_common::{Istr, Number, SymbolHandle};
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LowerError {
    #[error("function has no body")]
    NoBody,
    #[error("lowering requires a resolved symbol for '{0}'")]
    Unresolved(String),
}

/// Name lookups the lowerer needs from the symbol layer.
pub trait SymbolNames {
    /// Fully-qualified name of a resolved definition.
    fn fqn(&self, handle: &SymbolHandle) -> Option<String>;
    /// FQN of the definition's parent (a member's owning type).
    fn parent_fqn(&self, handle: &SymbolHandle) -> Option<String>;
    /// Short name of the definition.
    fn short_name(&self, handle: &SymbolHandle) -> Option<String>;
}

struct Lowerer<'a> {
    arena: &'a NodeArena,
    names: &'a dyn SymbolNames,
    metadata: &'a mut IlMetadata,
    cfg: ControlFlowGraph,
    current: BlockId,
    vars: FxHashMap<Istr, IlVarId>,
    bases: FxHashMap<Istr, u32>,
    /// High-water version per name; branches each mint fresh versions.
    versions: FxHashMap<Istr, u16>,
    next_base: u32,
    next_temp: u32,
}

/// Lower one function declaration to IL.
pub fn lower_function(
    arena: &NodeArena,
    function: NodeId,
    names: &dyn SymbolNames,
    metadata: &mut IlMetadata,
) -> Result<IlFunction, LowerError> {
    let (name, parameters, body) = match &arena.get(function).data {
        NodeData::Function {
            name,
            parameters,
            body,
            ..
        } => (name.as_str().to_string(), parameters.clone(), *body),
        NodeData::OperatorDecl {
            parameters, body, ..
        } => ("operator".to_string(), parameters.clone(), *body),
        _ => return Err(LowerError::NoBody),
    };
    let body = body.ok_or(LowerError::NoBody)?;

    let mut lowerer = Lowerer {
        arena,
        names,
        metadata,
        cfg: ControlFlowGraph::new(),
        current: 0,
        vars: FxHashMap::default(),
        bases: FxHashMap::default(),
        versions: FxHashMap::default(),
        next_base: 1,
        next_temp: 1,
    };
    lowerer.current = lowerer.cfg.add_block();

    for (slot, &param) in parameters.iter().enumerate() {
        if let NodeData::Parameter { name, .. } = &arena.get(param).data {
            let var = lowerer.define(*name);
            lowerer.emit(Instruction::load_param(var, slot as u32));
        }
    }

    lowerer.lower_statement(body);
    Ok(IlFunction::new(name, lowerer.cfg))
}

impl<'a> Lowerer<'a> {
    fn emit(&mut self, instruction: Instruction) {
        self.cfg.block_mut(self.current).push(instruction);
    }

    fn temp(&mut self) -> IlVarId {
        let id = IlVarId::temp(self.next_temp);
        self.next_temp += 1;
        id
    }

    /// First definition of a named variable.
    fn define(&mut self, name: Istr) -> IlVarId {
        let base = *self.bases.entry(name).or_insert_with(|| {
            let base = self.next_base;
            self.next_base += 1;
            base
        });
        self.versions.entry(name).or_insert(0);
        let var = IlVarId::named(base, 0);
        self.vars.insert(name, var);
        var
    }

    /// A fresh version for a reassignment. Versions come from a per-name
    /// high-water counter, so diverging branches never mint the same one.
    fn reassign(&mut self, name: Istr) -> IlVarId {
        let Some(&base) = self.bases.get(&name) else {
            return self.define(name);
        };
        let counter = self.versions.entry(name).or_insert(0);
        *counter = counter.wrapping_add(1);
        let var = IlVarId::named(base, *counter);
        self.vars.insert(name, var);
        var
    }

    fn current_version(&self, name: Istr) -> Option<IlVarId> {
        self.vars.get(&name).copied()
    }

    fn ref_handle(&self, symbol: RefId) -> Option<SymbolHandle> {
        self.arena.symbol_ref(symbol).handle().cloned()
    }

    fn binary_opcode(op: Operator) -> Option<ILOpCode> {
        Some(match op {
            Operator::Add => ILOpCode::Add,
            Operator::Subtract => ILOpCode::Subtract,
            Operator::Multiply => ILOpCode::Multiply,
            Operator::Divide => ILOpCode::Divide,
            Operator::Modulus => ILOpCode::Remainder,
            Operator::BitwiseAnd => ILOpCode::BitAnd,
            Operator::BitwiseOr => ILOpCode::BitOr,
            Operator::BitwiseXor => ILOpCode::BitXor,
            Operator::ShiftLeft => ILOpCode::ShiftLeft,
            Operator::ShiftRight => ILOpCode::ShiftRight,
            Operator::LessThan => ILOpCode::LessThan,
            Operator::LessThanOrEqual => ILOpCode::LessThanOrEqual,
            Operator::GreaterThan => ILOpCode::GreaterThan,
            Operator::GreaterThanOrEqual => ILOpCode::GreaterThanOrEqual,
            Operator::Equal => ILOpCode::Equal,
            Operator::NotEqual => ILOpCode::NotEqual,
            Operator::LogicalAnd => ILOpCode::LogicalAnd,
            Operator::LogicalOr => ILOpCode::LogicalOr,
            _ => return None,
        })
    }

    // -- expressions --------------------------------------------------------

    fn lower_expr(&mut self, expr: NodeId) -> Operand {
        let kind = match self.arena.get(expr).expr() {
            Some(data) => data.kind.clone(),
            None => return Operand::Imm(Number::I32(0)),
        };
        match kind {
            ExprKind::Literal { value } => match value {
                LiteralValue::Number(number) => Operand::Imm(number),
                LiteralValue::Bool(flag) => Operand::Imm(Number::I32(i32::from(flag))),
                LiteralValue::String(_) => Operand::Imm(Number::I32(0)),
            },
            ExprKind::SymbolRef { symbol } => {
                let name = self.arena.symbol_ref(symbol).name;
                match self.current_version(name) {
                    Some(var) => Operand::Var(var),
                    None => {
                        // A field or global without local storage yet.
                        let var = self.define(name);
                        self.emit(Instruction::mov(var, Operand::Imm(Number::I32(0))));
                        Operand::Var(var)
                    }
                }
            }
            ExprKind::Binary {
                op, left, right, ..
            } => {
                let lhs = self.lower_expr(left);
                let rhs = self.lower_expr(right);
                match Self::binary_opcode(op) {
                    Some(opcode) => {
                        let dst = self.temp();
                        self.emit(Instruction::binary(opcode, dst, lhs, rhs));
                        Operand::Var(dst)
                    }
                    None => lhs,
                }
            }
            ExprKind::Unary { op, operand, .. } => self.lower_unary(op, operand),
            ExprKind::Cast { operand, .. } => {
                let source = self.lower_expr(operand);
                let dst = self.temp();
                self.emit(Instruction::unary(ILOpCode::Cast, dst, source));
                Operand::Var(dst)
            }
            ExprKind::Call { callee, args } => {
                for (slot, &arg) in args.iter().enumerate() {
                    let value = self.lower_expr(arg);
                    self.emit(Instruction::store_param(slot as u32, value));
                }
                let func_id = self
                    .ref_handle(callee)
                    .and_then(|handle| self.names.fqn(&handle))
                    .map(|fqn| self.metadata.func_id(&fqn))
                    .unwrap_or(0);
                let dst = self.temp();
                self.emit(Instruction::call(dst, Operand::Func(func_id)));
                Operand::Var(dst)
            }
            ExprKind::MemberAccess { symbol, next } => self.lower_member_chain(symbol, next),
            ExprKind::Indexer { target, index } => {
                let base = self.lower_expr(target);
                let offset = self.lower_expr(index);
                let address = self.temp();
                self.emit(Instruction::binary(ILOpCode::Add, address, base, offset));
                let dst = self.temp();
                self.emit(Instruction::load(dst, address));
                Operand::Var(dst)
            }
            ExprKind::InitializerList { items } => {
                // Aggregate initialization materializes element stores during
                // declaration lowering; as a value it contributes nothing.
                for item in items {
                    self.lower_expr(item);
                }
                Operand::Imm(Number::I32(0))
            }
            ExprKind::Ternary {
                condition,
                then_expr,
                else_expr,
            } => self.lower_ternary(condition, then_expr, else_expr),
        }
    }

    fn lower_unary(&mut self, op: Operator, operand: NodeId) -> Operand {
        match op {
            Operator::Increment | Operator::Decrement => {
                let value = self.lower_expr(operand);
                let step_op = if op == Operator::Increment {
                    ILOpCode::Add
                } else {
                    ILOpCode::Subtract
                };
                let name = self.expr_var_name(operand);
                let dst = match name {
                    Some(name) => self.reassign(name),
                    None => self.temp(),
                };
                self.emit(Instruction::binary(
                    step_op,
                    dst,
                    value,
                    Operand::Imm(Number::I32(1)),
                ));
                Operand::Var(dst)
            }
            _ => {
                let value = self.lower_expr(operand);
                let opcode = match op {
                    Operator::Subtract => ILOpCode::Negate,
                    Operator::LogicalNot => ILOpCode::LogicalNot,
                    Operator::BitwiseNot => ILOpCode::BitNot,
                    _ => ILOpCode::Move,
                };
                let dst = self.temp();
                if opcode == ILOpCode::Move {
                    self.emit(Instruction::mov(dst, value));
                } else {
                    self.emit(Instruction::unary(opcode, dst, value));
                }
                Operand::Var(dst)
            }
        }
    }

    fn lower_member_chain(&mut self, root: RefId, mut next: Option<NodeId>) -> Operand {
        let root_name = self.arena.symbol_ref(root).name;
        let mut base = match self.current_version(root_name) {
            Some(var) => var,
            None => {
                let var = self.define(root_name);
                self.emit(Instruction::mov(var, Operand::Imm(Number::I32(0))));
                var
            }
        };
        while let Some(segment) = next {
            let (symbol, tail) = match self.arena.get(segment).expr().map(|e| &e.kind) {
                Some(ExprKind::MemberAccess { symbol, next }) => (*symbol, *next),
                _ => break,
            };
            let handle = self.ref_handle(symbol);
            let (type_id, field_id) = match handle.as_ref() {
                Some(handle) => {
                    let owner = self.names.parent_fqn(handle).unwrap_or_default();
                    let member = self.names.short_name(handle).unwrap_or_default();
                    let type_id = self.metadata.type_id(&owner);
                    (type_id, self.metadata.field_id(type_id, &member))
                }
                None => (0, 0),
            };
            let address = self.temp();
            self.emit(Instruction::offset_address(address, base, type_id, field_id));
            let loaded = self.temp();
            self.emit(Instruction::load(loaded, address));
            base = loaded;
            next = tail;
        }
        Operand::Var(base)
    }

    fn lower_ternary(&mut self, condition: NodeId, then_expr: NodeId, else_expr: NodeId) -> Operand {
        let cond = self.lower_expr(condition);
        let result = self.temp();

        let then_block = self.cfg.add_block();
        let else_block = self.cfg.add_block();
        let join = self.cfg.add_block();
        self.emit(Instruction::jump(ILOpCode::JumpZero, else_block as u64));
        self.cfg.link(self.current, then_block);
        self.cfg.link(self.current, else_block);
        let _ = cond;

        self.current = then_block;
        let then_value = self.lower_expr(then_expr);
        let then_result = self.temp();
        self.emit(Instruction::mov(then_result, then_value));
        self.emit(Instruction::jump(ILOpCode::Jump, join as u64));
        self.cfg.link(then_block, join);
        let then_end = self.current;

        self.current = else_block;
        let else_value = self.lower_expr(else_expr);
        let else_result = self.temp();
        self.emit(Instruction::mov(else_result, else_value));
        self.cfg.link(self.current, join);
        let else_end = self.current;
        let _ = (then_end, else_end);

        self.current = join;
        self.emit(Instruction::phi(
            result,
            [Operand::Var(then_result), Operand::Var(else_result)],
        ));
        Operand::Var(result)
    }

    fn expr_var_name(&self, expr: NodeId) -> Option<Istr> {
        match self.arena.get(expr).expr().map(|e| &e.kind) {
            Some(ExprKind::SymbolRef { symbol }) => Some(self.arena.symbol_ref(*symbol).name),
            Some(ExprKind::MemberAccess { symbol, next: None }) => {
                Some(self.arena.symbol_ref(*symbol).name)
            }
            _ => None,
        }
    }

    // -- assigned-name pre-scan --------------------------------------------

    fn collect_assigned(&self, node: NodeId, out: &mut FxHashSet<Istr>) {
        match &self.arena.get(node).data {
            NodeData::DeclarationStatement { name, .. } => {
                out.insert(*name);
            }
            NodeData::AssignmentStatement { target, .. } => {
                if let Some(name) = self.expr_var_name(*target) {
                    out.insert(name);
                }
            }
            NodeData::Expr(expr) => {
                if let ExprKind::Unary {
                    op: Operator::Increment | Operator::Decrement,
                    operand,
                    ..
                } = &expr.kind
                {
                    if let Some(name) = self.expr_var_name(*operand) {
                        out.insert(name);
                    }
                }
            }
            _ => {}
        }
        for child in self.arena.children(node) {
            self.collect_assigned(child, out);
        }
    }

    // -- statements ---------------------------------------------------------

    fn lower_statement(&mut self, stmt: NodeId) {
        match self.arena.get(stmt).data.clone() {
            NodeData::BlockStatement { statements } => {
                for statement in statements {
                    self.lower_statement(statement);
                }
            }
            NodeData::DeclarationStatement {
                name, initializer, ..
            } => {
                let value = match initializer {
                    Some(init) => self.lower_expr(init),
                    None => Operand::Imm(Number::I32(0)),
                };
                let var = self.define(name);
                self.emit(Instruction::mov(var, value));
            }
            NodeData::AssignmentStatement { op, target, value } => {
                self.lower_assignment(op, target, value);
            }
            NodeData::ExpressionStatement { expr } => {
                self.lower_expr(expr);
            }
            NodeData::ReturnStatement { value } => {
                let operand = value.map(|v| self.lower_expr(v));
                self.emit(Instruction::ret(operand));
            }
            NodeData::IfStatement {
                condition,
                then_block,
                else_block,
            } => self.lower_if(condition, then_block, else_block),
            NodeData::WhileStatement { condition, body } => {
                self.lower_loop(None, Some(condition), None, body);
            }
            NodeData::ForStatement {
                init,
                condition,
                step,
                body,
            } => self.lower_loop(init, condition, step, body),
            _ => {}
        }
    }

    fn lower_assignment(&mut self, op: Operator, target: NodeId, value: NodeId) {
        let rhs = self.lower_expr(value);
        if let Some(name) = self.expr_var_name(target) {
            match op.without_assignment() {
                Some(core) => {
                    let current = self
                        .current_version(name)
                        .unwrap_or_else(|| IlVarId::named(0, 0));
                    let next = self.reassign(name);
                    if let Some(opcode) = Self::binary_opcode(core) {
                        self.emit(Instruction::binary(opcode, next, Operand::Var(current), rhs));
                    } else {
                        self.emit(Instruction::mov(next, rhs));
                    }
                }
                None => {
                    let next = self.reassign(name);
                    self.emit(Instruction::mov(next, rhs));
                }
            }
        } else {
            // Member/indexer target: compute the address and store through it.
            let address = self.lower_expr(target);
            if let Operand::Var(address) = address {
                self.emit(Instruction::store(address, rhs));
            }
        }
    }

    fn lower_if(&mut self, condition: NodeId, then_block: NodeId, else_block: Option<NodeId>) {
        let cond = self.lower_expr(condition);
        let _ = cond;
        let then_id = self.cfg.add_block();
        let else_id = else_block.map(|_| self.cfg.add_block());
        let join = self.cfg.add_block();
        let jump_target = else_id.unwrap_or(join);
        self.emit(Instruction::jump(ILOpCode::JumpZero, jump_target as u64));
        self.cfg.link(self.current, then_id);
        self.cfg.link(self.current, jump_target);

        let entry_vars = self.vars.clone();

        self.current = then_id;
        self.lower_statement(then_block);
        self.emit(Instruction::jump(ILOpCode::Jump, join as u64));
        self.cfg.link(self.current, join);
        let then_vars = self.vars.clone();

        let else_vars = match (else_id, else_block) {
            (Some(else_id), Some(else_stmt)) => {
                self.vars = entry_vars.clone();
                self.current = else_id;
                self.lower_statement(else_stmt);
                self.cfg.link(self.current, join);
                self.vars.clone()
            }
            _ => entry_vars.clone(),
        };

        self.current = join;
        self.vars = entry_vars.clone();
        // Phi for every variable either side redefined.
        let mut names: Vec<Istr> = then_vars
            .keys()
            .chain(else_vars.keys())
            .copied()
            .collect::<FxHashSet<_>>()
            .into_iter()
            .collect();
        names.sort_unstable();
        for name in names {
            let then_version = then_vars.get(&name).copied();
            let else_version = else_vars.get(&name).copied();
            match (then_version, else_version) {
                (Some(a), Some(b)) if a != b => {
                    let merged = self.reassign(name);
                    self.emit(Instruction::phi(merged, [Operand::Var(a), Operand::Var(b)]));
                }
                (Some(a), Some(_)) => {
                    self.vars.insert(name, a);
                }
                _ => {}
            }
        }
    }

    /// Shared shape for `while` and `for`: preheader, header (phis + test),
    /// one body block, latch (step + back edge), exit.
    fn lower_loop(
        &mut self,
        init: Option<NodeId>,
        condition: Option<NodeId>,
        step: Option<NodeId>,
        body: NodeId,
    ) {
        if let Some(init) = init {
            self.lower_statement(init);
        }
        let preheader = self.current;
        let header = self.cfg.add_block();
        let body_id = self.cfg.add_block();
        let latch = self.cfg.add_block();
        let exit = self.cfg.add_block();
        self.cfg.link(preheader, header);
        self.cfg.link(header, body_id);
        self.cfg.link(header, exit);
        self.cfg.link(latch, header);

        // Phis for everything the body or step assigns.
        let mut assigned = FxHashSet::default();
        self.collect_assigned(body, &mut assigned);
        if let Some(step) = step {
            self.collect_assigned(step, &mut assigned);
        }
        let mut loop_names: Vec<Istr> = assigned
            .into_iter()
            .filter(|name| self.vars.contains_key(name))
            .collect();
        loop_names.sort_unstable();

        self.current = header;
        let mut phis: Vec<(Istr, usize, IlVarId)> = Vec::new();
        for &name in &loop_names {
            let incoming = self.vars[&name];
            let merged = self.reassign(name);
            let index = self.cfg.block(header).instructions.len();
            self.emit(Instruction::phi(
                merged,
                [Operand::Var(incoming), Operand::Var(incoming)],
            ));
            phis.push((name, index, merged));
        }

        if let Some(condition) = condition {
            let cond = self.lower_expr(condition);
            let _ = cond;
        }
        self.emit(Instruction::jump(ILOpCode::JumpZero, exit as u64));

        self.current = body_id;
        self.lower_statement(body);
        self.cfg.link(self.current, latch);

        self.current = latch;
        if let Some(step) = step {
            self.lower_statement(step);
        }
        self.emit(Instruction::jump(ILOpCode::Jump, header as u64));

        // Patch the latch-side phi operands with the final loop versions.
        for (name, index, _) in &phis {
            let latest = self.vars[name];
            if let Some(instruction) = self.cfg.block_mut(header).instructions.get_mut(*index) {
                if let Some(op) = instruction.operands.get_mut(1) {
                    *op = Operand::Var(latest);
                }
            }
        }

        // Code after the loop observes the header versions.
        for (name, _, merged) in phis {
            self.vars.insert(name, merged);
        }
        self.current = exit;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoNames;
    impl SymbolNames for NoNames {
        fn fqn(&self, _handle: &SymbolHandle) -> Option<String> {
            None
        }
        fn parent_fqn(&self, _handle: &SymbolHandle) -> Option<String> {
            None
        }
        fn short_name(&self, _handle: &SymbolHandle) -> Option<String> {
            None
        }
    }

    fn build_for_loop() -> (NodeArena, NodeId) {
        // float f(float a) { float s = 0; for (int i = 0; i < 4; i++) { s += a; } return s; }
        use glint_ast::node::Access;
        use glint_ast::{NodeKind, RefKind, SymbolRef};
        use glint_common::{Span, intern};

        let mut arena = NodeArena::new();
        let span = Span::synthetic();
        let mk_ref = |arena: &mut NodeArena, name: &str, kind| {
            arena.add_ref(SymbolRef::new(intern(name), kind, span))
        };

        let s_init = arena.alloc_expr(
            NodeKind::LiteralExpr,
            span,
            ExprKind::Literal {
                value: LiteralValue::Number(Number::F32(0.0)),
            },
        );
        let s_ty = mk_ref(&mut arena, "float", RefKind::Type);
        let s_decl = arena.alloc(
            NodeKind::DeclarationStatement,
            span,
            NodeData::DeclarationStatement {
                name: intern("s"),
                ty: s_ty,
                initializer: Some(s_init),
            },
        );

        let i_init = arena.alloc_expr(
            NodeKind::LiteralExpr,
            span,
            ExprKind::Literal {
                value: LiteralValue::Number(Number::I32(0)),
            },
        );
        let i_ty = mk_ref(&mut arena, "int", RefKind::Type);
        let i_decl = arena.alloc(
            NodeKind::DeclarationStatement,
            span,
            NodeData::DeclarationStatement {
                name: intern("i"),
                ty: i_ty,
                initializer: Some(i_init),
            },
        );

        let i_ref = mk_ref(&mut arena, "i", RefKind::Identifier);
        let i_use = arena.alloc_expr(NodeKind::SymbolRefExpr, span, ExprKind::SymbolRef { symbol: i_ref });
        let four = arena.alloc_expr(
            NodeKind::LiteralExpr,
            span,
            ExprKind::Literal {
                value: LiteralValue::Number(Number::I32(4)),
            },
        );
        let cond = arena.alloc_expr(
            NodeKind::BinaryExpr,
            span,
            ExprKind::Binary {
                op: Operator::LessThan,
                left: i_use,
                right: four,
                operator: None,
            },
        );

        let i_ref2 = mk_ref(&mut arena, "i", RefKind::Identifier);
        let i_use2 =
            arena.alloc_expr(NodeKind::SymbolRefExpr, span, ExprKind::SymbolRef { symbol: i_ref2 });
        let inc = arena.alloc_expr(
            NodeKind::UnaryExpr,
            span,
            ExprKind::Unary {
                op: Operator::Increment,
                operand: i_use2,
                operator: None,
            },
        );
        let step = arena.alloc(
            NodeKind::ExpressionStatement,
            span,
            NodeData::ExpressionStatement { expr: inc },
        );

        let s_target_ref = mk_ref(&mut arena, "s", RefKind::Identifier);
        let s_target =
            arena.alloc_expr(NodeKind::SymbolRefExpr, span, ExprKind::SymbolRef { symbol: s_target_ref });
        let a_ref = mk_ref(&mut arena, "a", RefKind::Identifier);
        let a_use = arena.alloc_expr(NodeKind::SymbolRefExpr, span, ExprKind::SymbolRef { symbol: a_ref });
        let accumulate = arena.alloc(
            NodeKind::AssignmentStatement,
            span,
            NodeData::AssignmentStatement {
                op: Operator::PlusAssign,
                target: s_target,
                value: a_use,
            },
        );
        let loop_body = arena.alloc(
            NodeKind::BlockStatement,
            span,
            NodeData::BlockStatement {
                statements: vec![accumulate],
            },
        );

        let for_stmt = arena.alloc(
            NodeKind::ForStatement,
            span,
            NodeData::ForStatement {
                init: Some(i_decl),
                condition: Some(cond),
                step: Some(step),
                body: loop_body,
            },
        );

        let s_ret_ref = mk_ref(&mut arena, "s", RefKind::Identifier);
        let s_ret =
            arena.alloc_expr(NodeKind::SymbolRefExpr, span, ExprKind::SymbolRef { symbol: s_ret_ref });
        let ret = arena.alloc(
            NodeKind::ReturnStatement,
            span,
            NodeData::ReturnStatement { value: Some(s_ret) },
        );

        let body = arena.alloc(
            NodeKind::BlockStatement,
            span,
            NodeData::BlockStatement {
                statements: vec![s_decl, for_stmt, ret],
            },
        );

        let ret_ty = mk_ref(&mut arena, "float", RefKind::Type);
        let a_param_ty = mk_ref(&mut arena, "float", RefKind::Type);
        let a_param = arena.alloc(
            NodeKind::Parameter,
            span,
            NodeData::Parameter {
                name: intern("a"),
                ty: a_param_ty,
            },
        );
        let function = arena.alloc(
            NodeKind::Function,
            span,
            NodeData::Function {
                name: intern("f"),
                access: Access::Public,
                return_type: ret_ty,
                parameters: vec![a_param],
                body: Some(body),
                attributes: Vec::new(),
            },
        );
        arena.adopt_subtree(function);
        (arena, function)
    }

    #[test]
    fn for_loops_lower_to_the_canonical_shape() {
        let (arena, function) = build_for_loop();
        let mut metadata = IlMetadata::new();
        let mut func = lower_function(&arena, function, &NoNames, &mut metadata).unwrap();

        // preheader, header, body, latch, exit.
        assert_eq!(func.cfg.blocks().count(), 5);
        assert!(func.cfg.edges_consistent());
        assert!(func.is_ssa(), "{:#?}", func.cfg);

        let loops = func.loop_tree().clone();
        assert_eq!(loops.nodes().len(), 1);
        let node = &loops.nodes()[0];
        assert_eq!(node.preheader, Some(0));
        assert_eq!(node.latches.len(), 1);
        assert_eq!(node.exits.len(), 1);

        // The header carries phis for i and s plus the compare and exit jump.
        let header = func.cfg.block(node.header);
        let phi_count = header
            .instructions
            .iter()
            .filter(|i| i.opcode == ILOpCode::Phi)
            .count();
        assert_eq!(phi_count, 2);
        assert!(
            header
                .instructions
                .iter()
                .any(|i| i.opcode == ILOpCode::LessThan)
        );
        assert!(
            header
                .instructions
                .iter()
                .any(|i| i.opcode == ILOpCode::JumpZero)
        );

        // The latch holds the induction increment.
        let latch = func.cfg.block(node.latches[0]);
        assert!(latch.instructions.iter().any(|i| i.opcode == ILOpCode::Add));
    }

    #[test]
    fn if_joins_insert_phis() {
        use glint_ast::{NodeKind, RefKind, SymbolRef};
        use glint_common::{Span, intern};

        // int f() { int x = 1; if (true) { x = 2; } else { x = 3; } return x; }
        let mut arena = NodeArena::new();
        let span = Span::synthetic();

        let one = arena.alloc_expr(
            NodeKind::LiteralExpr,
            span,
            ExprKind::Literal {
                value: LiteralValue::Number(Number::I32(1)),
            },
        );
        let x_ty = arena.add_ref(SymbolRef::new(intern("int"), RefKind::Type, span));
        let x_decl = arena.alloc(
            NodeKind::DeclarationStatement,
            span,
            NodeData::DeclarationStatement {
                name: intern("x"),
                ty: x_ty,
                initializer: Some(one),
            },
        );

        let cond = arena.alloc_expr(
            NodeKind::LiteralExpr,
            span,
            ExprKind::Literal {
                value: LiteralValue::Bool(true),
            },
        );
        let assign = |arena: &mut NodeArena, value: i32| {
            let target_ref = arena.add_ref(SymbolRef::new(intern("x"), RefKind::Identifier, span));
            let target =
                arena.alloc_expr(NodeKind::SymbolRefExpr, span, ExprKind::SymbolRef { symbol: target_ref });
            let literal = arena.alloc_expr(
                NodeKind::LiteralExpr,
                span,
                ExprKind::Literal {
                    value: LiteralValue::Number(Number::I32(value)),
                },
            );
            let stmt = arena.alloc(
                NodeKind::AssignmentStatement,
                span,
                NodeData::AssignmentStatement {
                    op: Operator::Assign,
                    target,
                    value: literal,
                },
            );
            arena.alloc(
                NodeKind::BlockStatement,
                span,
                NodeData::BlockStatement {
                    statements: vec![stmt],
                },
            )
        };
        let then_block = assign(&mut arena, 2);
        let else_block = assign(&mut arena, 3);
        let if_stmt = arena.alloc(
            NodeKind::IfStatement,
            span,
            NodeData::IfStatement {
                condition: cond,
                then_block,
                else_block: Some(else_block),
            },
        );

        let x_ret_ref = arena.add_ref(SymbolRef::new(intern("x"), RefKind::Identifier, span));
        let x_ret =
            arena.alloc_expr(NodeKind::SymbolRefExpr, span, ExprKind::SymbolRef { symbol: x_ret_ref });
        let ret = arena.alloc(
            NodeKind::ReturnStatement,
            span,
            NodeData::ReturnStatement { value: Some(x_ret) },
        );
        let body = arena.alloc(
            NodeKind::BlockStatement,
            span,
            NodeData::BlockStatement {
                statements: vec![x_decl, if_stmt, ret],
            },
        );
        let ret_ty = arena.add_ref(SymbolRef::new(intern("int"), RefKind::Type, span));
        let function = arena.alloc(
            NodeKind::Function,
            span,
            NodeData::Function {
                name: intern("f"),
                access: glint_ast::Access::Public,
                return_type: ret_ty,
                parameters: vec![],
                body: Some(body),
                attributes: Vec::new(),
            },
        );
        arena.adopt_subtree(function);

        let mut metadata = IlMetadata::new();
        let func = lower_function(&arena, function, &NoNames, &mut metadata).unwrap();
        assert!(func.is_ssa());
        let phis: usize = func
            .cfg
            .blocks()
            .map(|b| {
                b.instructions
                    .iter()
                    .filter(|i| i.opcode == ILOpCode::Phi)
                    .count()
            })
            .sum();
        assert_eq!(phis, 1);
    }
}
