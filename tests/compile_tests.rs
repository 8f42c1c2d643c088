//! End-to-end pipeline scenarios: parse (stub front-end) → analyze → lower →
//! optimize → serialize → reload.

use glint::{CompileStatus, Frontend, ParsedUnit, SourceUnit, compile};
use glint_analysis::testing::AstBuilder;
use glint_ast::{NodeData, Operator};
use glint_common::{DiagnosticBag, SourceId, diagnostic_codes};
use glint_il::{ILOpCode, codec};
use glint_symbols::Assembly;

/// A front-end stub that maps unit names to prebuilt ASTs.
struct FnFrontend<F>(F);

impl<F> Frontend for FnFrontend<F>
where
    F: Fn(&SourceUnit) -> ParsedUnit + Sync,
{
    fn parse(&self, unit: &SourceUnit) -> ParsedUnit {
        (self.0)(unit)
    }
}

fn unit(name: &str) -> SourceUnit {
    init_tracing();
    SourceUnit {
        id: SourceId(0),
        name: name.to_string(),
        text: String::new(),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn parsed(build: AstBuilder) -> ParsedUnit {
    let (assembly, root) = build.finish();
    ParsedUnit {
        arena: assembly.arena,
        root,
        diagnostics: DiagnosticBag::new(),
    }
}

#[test]
fn unknown_identifier_fails_analysis_with_one_diagnostic() {
    // namespace A { void f() { x; } } with no x anywhere.
    let frontend = FnFrontend(|_: &SourceUnit| {
        let mut build = AstBuilder::new("A");
        let ret = build.type_ref("void");
        let x = build.ident("x");
        let stmt = build.expr_stmt(x);
        build.function("f", ret, vec![], vec![stmt]);
        parsed(build)
    });

    let result = compile("demo", &[unit("main.gl")], &frontend, vec![], None);
    assert_eq!(result.status, CompileStatus::AnalysisFailed);
    assert!(result.assembly.is_none());
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, diagnostic_codes::SYMBOL_NOT_FOUND);
}

#[test]
fn counted_loops_unroll_into_the_serialized_il() {
    // float f(float x) { float s = 0; for (int i = 0; i < 4; i++) { s += x; } return s; }
    let frontend = FnFrontend(|_: &SourceUnit| {
        let mut build = AstBuilder::new("gfx");
        let ret = build.type_ref("float");
        let x = build.param("x", "float");

        let s_ty = build.type_ref("float");
        let zero = build.float_literal(0.0);
        let s_decl = build.declaration("s", s_ty, Some(zero));

        let i_ty = build.type_ref("int");
        let i_zero = build.int_literal(0);
        let i_decl = build.declaration("i", i_ty, Some(i_zero));
        let i_use = build.ident("i");
        let four = build.int_literal(4);
        let cond = build.binary(Operator::LessThan, i_use, four);
        let i_step = build.ident("i");
        let inc = build.unary(Operator::Increment, i_step);
        let step = build.expr_stmt(inc);

        let s_target = build.ident("s");
        let x_use = build.ident("x");
        let accumulate = build.compound_assign(Operator::PlusAssign, s_target, x_use);
        let body = build.block(vec![accumulate]);
        let for_stmt = build.for_stmt(Some(i_decl), Some(cond), Some(step), body);

        let s_use = build.ident("s");
        let ret_stmt = build.ret(Some(s_use));

        build.function("f", ret, vec![x], vec![s_decl, for_stmt, ret_stmt]);
        parsed(build)
    });

    let result = compile("demo", &[unit("main.gl")], &frontend, vec![], None);
    assert_eq!(result.status, CompileStatus::Success, "{:?}", result.diagnostics);
    let assembly = result.assembly.unwrap();

    // Block scopes were stripped from the emitted table.
    assert!(assembly.table.iter().all(|(_, node)| {
        node.metadata.as_ref().is_none_or(|m| !m.is_scope_marker())
    }));

    let func_index = assembly.find("gfx.f(float)").expect("function symbol");
    let payload = &assembly.il_payloads()[&(func_index as u32)];
    let instructions = codec::decode_instructions(payload).unwrap();

    // Post-unroll: four materialized additions, no loop control left.
    let adds = instructions
        .iter()
        .filter(|i| i.opcode == ILOpCode::Add)
        .count();
    assert_eq!(adds, 4, "{instructions:#?}");
    assert!(!instructions.iter().any(|i| i.opcode == ILOpCode::Phi));
    assert!(!instructions.iter().any(|i| i.opcode.is_jump()));
    assert!(instructions.iter().any(|i| i.opcode == ILOpCode::Return));
}

#[test]
fn cyclic_member_types_compile_and_round_trip() {
    // struct A { B other; }  struct B { A other; } with chains through both,
    // compiled to disk and reloaded.
    let frontend = FnFrontend(|_: &SourceUnit| {
        let mut build = AstBuilder::new("gfx");
        let b_ty = build.type_ref("B");
        let a_field = build.field("other", b_ty);
        build.struct_def("A", vec![a_field]);

        let ret = build.type_ref("void");
        let pa = build.param("a", "A");
        let pb = build.param("b", "B");
        let chain_a = build.member_chain("a", &["other"]);
        let sa = build.expr_stmt(chain_a);
        let chain_b = build.member_chain("b", &["other"]);
        let sb = build.expr_stmt(chain_b);
        build.function("touch", ret, vec![pa, pb], vec![sa, sb]);

        let a_ty = build.type_ref("A");
        let b_field = build.field("other", a_ty);
        build.struct_def("B", vec![b_field]);
        parsed(build)
    });

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cyclic.glas");
    let result = compile("cyclic", &[unit("main.gl")], &frontend, vec![], Some(&path));
    assert_eq!(result.status, CompileStatus::Success, "{:?}", result.diagnostics);

    let loaded = Assembly::load_from_file(&path).unwrap();
    let a = loaded.find("gfx.A").expect("struct A");
    let b = loaded.find("gfx.B").expect("struct B");
    assert_eq!(loaded.fqn(a), "gfx.A");
    assert_eq!(loaded.fqn(b), "gfx.B");

    // Field types were serialized as fully-qualified names.
    let a_other = loaded.find("gfx.A.other").expect("field A.other");
    let meta = loaded.table.get(a_other).metadata.as_ref().unwrap();
    match &loaded.arena.get(meta.declaration.unwrap()).data {
        NodeData::Field { ty, .. } => {
            assert_eq!(loaded.arena.symbol_ref(*ty).name.as_str(), "gfx.B");
        }
        other => panic!("expected field, got {other:?}"),
    }
}

#[test]
fn multiple_units_merge_into_one_assembly() {
    // Unit 1 declares the struct; unit 2 uses it.
    let frontend = FnFrontend(|source: &SourceUnit| {
        if source.name == "types.gl" {
            let mut build = AstBuilder::new("gfx");
            let float4 = build.type_ref("float4");
            let color = build.field("color", float4);
            build.struct_def("Material", vec![color]);
            parsed(build)
        } else {
            let mut build = AstBuilder::new("gfx");
            let ret = build.type_ref("float4");
            let m = build.param("m", "Material");
            let chain = build.member_chain("m", &["color"]);
            let ret_stmt = build.ret(Some(chain));
            build.function("albedo", ret, vec![m], vec![ret_stmt]);
            parsed(build)
        }
    });

    let result = compile(
        "demo",
        &[unit("types.gl"), unit("shading.gl")],
        &frontend,
        vec![],
        None,
    );
    assert_eq!(result.status, CompileStatus::Success, "{:?}", result.diagnostics);
    let assembly = result.assembly.unwrap();
    assert!(assembly.find("gfx.Material").is_some());
    // The signature embeds a dotted FQN, so it is a single table segment.
    let ns = assembly.find("gfx").unwrap();
    assert!(
        assembly
            .table
            .get(ns)
            .children
            .keys()
            .any(|name| name == "albedo(gfx.Material)")
    );
}

#[test]
fn compiled_assemblies_link_as_references() {
    // Library: float brighten(float). Client: calls brighten(0.25).
    let lib_frontend = FnFrontend(|_: &SourceUnit| {
        let mut build = AstBuilder::new("gfx");
        let ret = build.type_ref("float");
        let v = build.param("v", "float");
        let v_use = build.ident("v");
        let two = build.float_literal(2.0);
        let doubled = build.binary(Operator::Multiply, v_use, two);
        let ret_stmt = build.ret(Some(doubled));
        build.function("brighten", ret, vec![v], vec![ret_stmt]);
        parsed(build)
    });

    let dir = tempfile::tempdir().unwrap();
    let lib_path = dir.path().join("lib.glas");
    let lib = compile("lib", &[unit("lib.gl")], &lib_frontend, vec![], Some(&lib_path));
    assert_eq!(lib.status, CompileStatus::Success, "{:?}", lib.diagnostics);

    let reference = glint::driver::load_reference(&lib_path).unwrap();

    let client_frontend = FnFrontend(|_: &SourceUnit| {
        let mut build = AstBuilder::new("gfx");
        let ret = build.type_ref("float");
        let arg = build.float_literal(0.25);
        let call = build.call("brighten", vec![arg]);
        let ret_stmt = build.ret(Some(call));
        build.function("shade", ret, vec![], vec![ret_stmt]);
        parsed(build)
    });

    let client = compile(
        "client",
        &[unit("client.gl")],
        &client_frontend,
        vec![reference],
        None,
    );
    assert_eq!(client.status, CompileStatus::Success, "{:?}", client.diagnostics);
    let assembly = client.assembly.unwrap();
    assert!(assembly.find("gfx.shade()").is_some());
}

#[test]
fn overload_ambiguity_surfaces_through_the_driver() {
    let frontend = FnFrontend(|_: &SourceUnit| {
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
        parsed(build)
    });

    let result = compile("demo", &[unit("main.gl")], &frontend, vec![], None);
    assert_eq!(result.status, CompileStatus::AnalysisFailed);
    assert!(result.assembly.is_none());
    assert!(
        result
            .diagnostics
            .iter()
            .any(|d| d.code == diagnostic_codes::AMBIGUOUS_CALL)
    );
}
