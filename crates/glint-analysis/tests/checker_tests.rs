//! Type-checker scenarios: promotion, overloads, casts, and conversions.

use glint_analysis::testing::{Analyzed, AstBuilder};
use glint_ast::{ExprKind, NodeData, NodeId, NodeKind, Operator};
use glint_common::diagnostic_codes;

fn type_name(result: &Analyzed, expr: NodeId) -> Option<String> {
    let handle = result
        .assembly
        .arena
        .expr_info(expr)?
        .inferred_type
        .clone()?;
    let index = handle.index()?;
    match handle.assembly()? {
        glint_common::AssemblyId::PRIMITIVES => Some(
            glint_symbols::primitives()
                .table
                .fully_qualified_name(index),
        ),
        glint_symbols::TARGET_ASSEMBLY => Some(result.assembly.table.fully_qualified_name(index)),
        glint_symbols::SWIZZLE_ASSEMBLY => Some(
            result
                .swizzles
                .assembly()
                .table
                .fully_qualified_name(index),
        ),
        glint_symbols::ARRAY_ASSEMBLY => {
            Some(result.arrays.assembly().table.fully_qualified_name(index))
        }
        _ => None,
    }
}

#[test]
fn arithmetic_promotes_by_rank() {
    let mut build = AstBuilder::new("A");
    let ret = build.type_ref("void");
    let lhs = build.int_literal(3);
    let rhs = build.float_literal(0.5);
    let sum = build.binary(Operator::Add, lhs, rhs);
    let stmt = build.expr_stmt(sum);
    build.function("f", ret, vec![], vec![stmt]);
    let result = build.analyze();
    assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics.iter().collect::<Vec<_>>());
    assert_eq!(type_name(&result, sum).as_deref(), Some("float"));
}

#[test]
fn equal_types_keep_their_type() {
    let mut build = AstBuilder::new("A");
    let ret = build.type_ref("void");
    let a = build.int_literal(1);
    let b = build.int_literal(2);
    let sum = build.binary(Operator::Add, a, b);
    let stmt = build.expr_stmt(sum);
    build.function("f", ret, vec![], vec![stmt]);
    let result = build.analyze();
    assert!(!result.diagnostics.has_errors());
    assert_eq!(type_name(&result, sum).as_deref(), Some("int"));
}

#[test]
fn vector_arithmetic_promotes_elementwise() {
    let mut build = AstBuilder::new("A");
    let ret = build.type_ref("void");
    let a = build.param("a", "int3");
    let b = build.param("b", "float3");
    let left = build.ident("a");
    let right = build.ident("b");
    let sum = build.binary(Operator::Add, left, right);
    let stmt = build.expr_stmt(sum);
    build.function("f", ret, vec![a, b], vec![stmt]);
    let result = build.analyze();
    assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics.iter().collect::<Vec<_>>());
    assert_eq!(type_name(&result, sum).as_deref(), Some("float3"));
}

#[test]
fn vector_times_scalar_uses_builtin_overload() {
    let mut build = AstBuilder::new("A");
    let ret = build.type_ref("void");
    let v = build.param("v", "float3");
    let left = build.ident("v");
    let right = build.float_literal(2.0);
    let product = build.binary(Operator::Multiply, left, right);
    let stmt = build.expr_stmt(product);
    build.function("f", ret, vec![v], vec![stmt]);
    let result = build.analyze();
    assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics.iter().collect::<Vec<_>>());
    assert_eq!(type_name(&result, product).as_deref(), Some("float3"));

    // The overload was recorded on the node.
    match &result.assembly.arena.get(product).expr().unwrap().kind {
        ExprKind::Binary { operator, .. } => assert!(operator.is_some()),
        other => panic!("expected binary, got {other:?}"),
    }
}

#[test]
fn comparisons_yield_bool_and_bool_vectors() {
    let mut build = AstBuilder::new("A");
    let ret = build.type_ref("void");
    let a = build.param("a", "float3");
    let b = build.param("b", "float3");
    let x = build.int_literal(1);
    let y = build.int_literal(2);
    let scalar_cmp = build.binary(Operator::LessThan, x, y);
    let s1 = build.expr_stmt(scalar_cmp);
    let va = build.ident("a");
    let vb = build.ident("b");
    let vector_cmp = build.binary(Operator::Equal, va, vb);
    let s2 = build.expr_stmt(vector_cmp);
    build.function("f", ret, vec![a, b], vec![s1, s2]);
    let result = build.analyze();
    assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics.iter().collect::<Vec<_>>());
    assert_eq!(type_name(&result, scalar_cmp).as_deref(), Some("bool"));
    assert_eq!(type_name(&result, vector_cmp).as_deref(), Some("bool3"));
}

#[test]
fn logical_ops_require_bool() {
    let mut build = AstBuilder::new("A");
    let ret = build.type_ref("void");
    let a = build.int_literal(1);
    let b = build.int_literal(2);
    let and = build.binary(Operator::LogicalAnd, a, b);
    let stmt = build.expr_stmt(and);
    build.function("f", ret, vec![], vec![stmt]);
    let result = build.analyze();
    assert!(
        result
            .diagnostics
            .iter()
            .any(|d| d.code == diagnostic_codes::NO_OPERATOR_OVERLOAD)
    );
}

#[test]
fn ambiguous_call_is_diagnosed() {
    // f(float,int) and f(int,float) called as f(1,2).
    let mut build = AstBuilder::new("A");
    let r1 = build.type_ref("void");
    let p1a = build.param("a", "float");
    let p1b = build.param("b", "int");
    build.function("f", r1, vec![p1a, p1b], vec![]);

    let r2 = build.type_ref("void");
    let p2a = build.param("a", "int");
    let p2b = build.param("b", "float");
    build.function("f", r2, vec![p2a, p2b], vec![]);

    let r3 = build.type_ref("void");
    let one = build.int_literal(1);
    let two = build.int_literal(2);
    let call = build.call("f", vec![one, two]);
    let stmt = build.expr_stmt(call);
    build.function("g", r3, vec![], vec![stmt]);

    let result = build.analyze();
    assert!(
        result
            .diagnostics
            .iter()
            .any(|d| d.code == diagnostic_codes::AMBIGUOUS_CALL),
        "{:?}",
        result.diagnostics.iter().collect::<Vec<_>>()
    );
}

#[test]
fn unique_minimum_overload_wins_and_args_get_casts() {
    // g(float) called with an int literal: the int->float conversion is
    // materialized as a cast node around the argument.
    let mut build = AstBuilder::new("A");
    let r1 = build.type_ref("float");
    let p = build.param("x", "float");
    build.function("g", r1, vec![p], vec![]);

    let r2 = build.type_ref("void");
    let arg = build.int_literal(7);
    let call = build.call("g", vec![arg]);
    let stmt = build.expr_stmt(call);
    build.function("h", r2, vec![], vec![stmt]);

    let result = build.analyze();
    assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics.iter().collect::<Vec<_>>());
    assert_eq!(type_name(&result, call).as_deref(), Some("float"));

    match &result.assembly.arena.get(call).expr().unwrap().kind {
        ExprKind::Call { args, .. } => {
            assert_eq!(args.len(), 1);
            assert_eq!(result.assembly.arena.get(args[0]).kind, NodeKind::CastExpr);
            assert_eq!(type_name(&result, args[0]).as_deref(), Some("float"));
        }
        other => panic!("expected call, got {other:?}"),
    }
}

#[test]
fn no_matching_overload_is_diagnosed() {
    let mut build = AstBuilder::new("A");
    let r1 = build.type_ref("void");
    let p = build.param("x", "float");
    build.function("g", r1, vec![p], vec![]);

    let r2 = build.type_ref("void");
    let a = build.int_literal(1);
    let b = build.int_literal(2);
    let call = build.call("g", vec![a, b]);
    let stmt = build.expr_stmt(call);
    build.function("h", r2, vec![], vec![stmt]);

    let result = build.analyze();
    assert!(
        result
            .diagnostics
            .iter()
            .any(|d| d.code == diagnostic_codes::NO_MATCHING_OVERLOAD)
    );
}

#[test]
fn explicit_casts_resolve_cast_operators() {
    let mut build = AstBuilder::new("A");
    let ret = build.type_ref("void");
    let d = build.param("d", "double");
    let operand = build.ident("d");
    let cast = build.cast("int", operand);
    let stmt = build.expr_stmt(cast);
    build.function("f", ret, vec![d], vec![stmt]);
    let result = build.analyze();
    assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics.iter().collect::<Vec<_>>());
    assert_eq!(type_name(&result, cast).as_deref(), Some("int"));
}

#[test]
fn struct_without_cast_operator_rejects_conversion() {
    let mut build = AstBuilder::new("A");
    build.struct_def("M", vec![]);
    let ret = build.type_ref("void");
    let m = build.param("m", "M");
    let operand = build.ident("m");
    let cast = build.cast("float", operand);
    let stmt = build.expr_stmt(cast);
    build.function("f", ret, vec![m], vec![stmt]);
    let result = build.analyze();
    assert!(
        result
            .diagnostics
            .iter()
            .any(|d| d.code == diagnostic_codes::NO_EXPLICIT_CONVERSION)
    );
}

#[test]
fn user_defined_implicit_cast_applies_in_declarations() {
    // struct M {}; operator implicit float(M value);
    // void f(M m) { float x = m; }
    let mut build = AstBuilder::new("A");
    let value = build.param("value", "M");
    let cast = build.cast_operator("float", value, true);
    build.struct_def("M", vec![cast]);

    let ret = build.type_ref("void");
    let m = build.param("m", "M");
    let init = build.ident("m");
    let ty = build.type_ref("float");
    let decl = build.declaration("x", ty, Some(init));
    build.function("f", ret, vec![m], vec![decl]);

    let result = build.analyze();
    assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics.iter().collect::<Vec<_>>());

    // The initializer got wrapped in a cast.
    match &result.assembly.arena.get(decl).data {
        NodeData::DeclarationStatement { initializer, .. } => {
            let init = initializer.unwrap();
            assert_eq!(result.assembly.arena.get(init).kind, NodeKind::CastExpr);
        }
        other => panic!("expected declaration, got {other:?}"),
    }
}

#[test]
fn narrowing_initializer_is_rejected() {
    // int x = 1.5; (double -> int is explicit only)
    let mut build = AstBuilder::new("A");
    let ret = build.type_ref("void");
    let init = build.literal(glint_ast::LiteralValue::Number(glint_common::Number::F64(1.5)));
    let ty = build.type_ref("int");
    let decl = build.declaration("x", ty, Some(init));
    build.function("f", ret, vec![], vec![decl]);
    let result = build.analyze();
    assert!(
        result
            .diagnostics
            .iter()
            .any(|d| d.code == diagnostic_codes::NO_IMPLICIT_CONVERSION),
        "{:?}",
        result.diagnostics.iter().collect::<Vec<_>>()
    );
}

#[test]
fn return_values_convert_to_the_declared_type() {
    let mut build = AstBuilder::new("A");
    let ret = build.type_ref("float");
    let value = build.int_literal(1);
    let ret_stmt = build.ret(Some(value));
    build.function("f", ret, vec![], vec![ret_stmt]);
    let result = build.analyze();
    assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics.iter().collect::<Vec<_>>());
    match &result.assembly.arena.get(ret_stmt).data {
        NodeData::ReturnStatement { value } => {
            assert_eq!(
                result.assembly.arena.get(value.unwrap()).kind,
                NodeKind::CastExpr
            );
        }
        other => panic!("expected return, got {other:?}"),
    }
}

#[test]
fn incompatible_return_is_diagnosed() {
    let mut build = AstBuilder::new("A");
    let ret = build.type_ref("float");
    let v = build.param("v", "float4");
    let value = build.ident("v");
    let ret_stmt = build.ret(Some(value));
    build.function("f", ret, vec![v], vec![ret_stmt]);
    let result = build.analyze();
    assert!(
        result
            .diagnostics
            .iter()
            .any(|d| d.code == diagnostic_codes::RETURN_TYPE_MISMATCH)
    );
}

#[test]
fn swizzle_chains_infer_component_types() {
    let mut build = AstBuilder::new("A");
    let float4 = build.type_ref("float4");
    let color = build.field("color", float4);
    build.struct_def("M", vec![color]);
    let ret = build.type_ref("void");
    let m = build.param("m", "M");
    let chain = build.member_chain("m", &["color", "xyz"]);
    let stmt = build.expr_stmt(chain);
    build.function("f", ret, vec![m], vec![stmt]);
    let result = build.analyze();
    assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics.iter().collect::<Vec<_>>());
    assert_eq!(type_name(&result, chain).as_deref(), Some("float3"));
}

#[test]
fn indexing_arrays_and_vectors() {
    let mut build = AstBuilder::new("A");
    let ret = build.type_ref("void");
    let arr_ty = build.array_type_ref("float", &[8]);
    let decl = build.declaration("values", arr_ty, None);
    let target = build.ident("values");
    let index = build.int_literal(2);
    let element = build.indexer(target, index);
    let s1 = build.expr_stmt(element);

    let v = build.param("v", "float3");
    let vt = build.ident("v");
    let vi = build.int_literal(0);
    let lane = build.indexer(vt, vi);
    let s2 = build.expr_stmt(lane);
    build.function("f", ret, vec![v], vec![decl, s1, s2]);

    let result = build.analyze();
    assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics.iter().collect::<Vec<_>>());
    assert_eq!(type_name(&result, element).as_deref(), Some("float"));
    assert_eq!(type_name(&result, lane).as_deref(), Some("float"));
}

#[test]
fn conditions_must_be_boolean() {
    let mut build = AstBuilder::new("A");
    let ret = build.type_ref("void");
    let cond = build.int_literal(1);
    let body = build.block(vec![]);
    let loop_stmt = build.assembly.arena.alloc(
        glint_ast::NodeKind::WhileStatement,
        glint_common::Span::synthetic(),
        NodeData::WhileStatement {
            condition: cond,
            body,
        },
    );
    let outer = build.block(vec![loop_stmt]);
    build.function_with_body("f", ret, vec![], outer);
    let result = build.analyze();
    assert!(
        result
            .diagnostics
            .iter()
            .any(|d| d.code == diagnostic_codes::TYPE_MISMATCH)
    );
}

#[test]
fn increment_requires_an_assignable_operand() {
    let mut build = AstBuilder::new("A");
    let ret = build.type_ref("void");
    let one = build.int_literal(1);
    let two = build.int_literal(2);
    let sum = build.binary(Operator::Add, one, two);
    let inc = build.unary(Operator::Increment, sum);
    let stmt = build.expr_stmt(inc);
    build.function("f", ret, vec![], vec![stmt]);
    let result = build.analyze();
    assert!(
        result
            .diagnostics
            .iter()
            .any(|d| d.code == diagnostic_codes::NOT_ASSIGNABLE)
    );
}

#[test]
fn user_defined_binary_operator_is_selected() {
    // struct V { float x; }; operator +(V,V) -> V
    let mut build = AstBuilder::new("A");
    let fx = build.type_ref("float");
    let x = build.field("x", fx);
    let left = build.param("l", "V");
    let right = build.param("r", "V");
    let plus = build.binary_operator(Operator::Add, "V", left, right);
    build.struct_def("V", vec![x, plus]);

    let ret = build.type_ref("void");
    let a = build.param("a", "V");
    let b = build.param("b", "V");
    let la = build.ident("a");
    let rb = build.ident("b");
    let sum = build.binary(Operator::Add, la, rb);
    let stmt = build.expr_stmt(sum);
    build.function("f", ret, vec![a, b], vec![stmt]);

    let result = build.analyze();
    assert!(!result.diagnostics.has_errors(), "{:?}", result.diagnostics.iter().collect::<Vec<_>>());
    assert_eq!(type_name(&result, sum).as_deref(), Some("A.V"));
}
