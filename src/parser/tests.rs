use super::*;
use crate::diagnostics::syntax;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::path::PathBuf;

fn parse(source: &str) -> Program {
    let result = parse_source(source, &PathBuf::from("test.omn"));
    match result {
        Ok(program) => program,
        Err(e) => panic!("Parse error: {:?}", e),
    }
}

fn parse_err(source: &str) -> Diagnostic {
    parse_source(source, &PathBuf::from("test.omn"))
        .expect_err("expected a syntax error")
        .diagnostic()
        .clone()
}

fn first_expr(source: &str) -> Expr {
    match parse(source).stmts.into_iter().next() {
        Some(Stmt::Expr { expr, .. }) => expr,
        other => panic!("expected expression statement, got {:?}", other),
    }
}

#[test]
fn test_parse_empty_program() {
    assert!(parse("").stmts.is_empty());
    assert!(parse("// only a comment\n;;").stmts.is_empty());
}

#[test]
fn test_parse_bindings() {
    let program = parse("let a = 1\nvar b: Int = 2\nconst C = \"c\"");
    let kinds: Vec<BindingKind> = program
        .stmts
        .iter()
        .map(|s| match s {
            Stmt::VarDecl { kind, .. } => *kind,
            other => panic!("expected declaration, got {:?}", other),
        })
        .collect();
    assert_eq!(kinds, vec![BindingKind::Let, BindingKind::Var, BindingKind::Const]);
}

#[test]
fn test_precedence() {
    let expr = first_expr("1 + 2 * 3 == 7 && true");
    let Expr::Binary { op, left, .. } = expr else {
        panic!("expected binary");
    };
    assert_eq!(op, BinaryOp::And);
    let Expr::Binary { op, left, .. } = *left else {
        panic!("expected equality");
    };
    assert_eq!(op, BinaryOp::Eq);
    let Expr::Binary { op, right, .. } = *left else {
        panic!("expected addition");
    };
    assert_eq!(op, BinaryOp::Add);
    assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
}

#[test]
fn test_range_binds_looser_than_addition() {
    let expr = first_expr("0..n + 1");
    let Expr::Range { end, .. } = expr else {
        panic!("expected range");
    };
    assert!(matches!(*end, Expr::Binary { op: BinaryOp::Add, .. }));
}

#[test]
fn test_function_with_defaults_and_variadic() {
    let program = parse("fun f(a, b = 2, *rest) -> Int: { return a }");
    let Stmt::FunDecl { decl, .. } = &program.stmts[0] else {
        panic!("expected function");
    };
    assert_eq!(decl.name.as_deref(), Some("f"));
    assert_eq!(decl.params.len(), 3);
    assert_eq!(decl.required_params(), 1);
    assert_eq!(decl.positional_params(), 2);
    assert!(decl.is_variadic());
}

#[test]
fn test_function_without_colon() {
    let program = parse("fun greet(name) {\n  print(name)\n}");
    assert!(matches!(program.stmts[0], Stmt::FunDecl { .. }));
}

#[test]
fn test_single_statement_bodies() {
    let program = parse("fun double(x): return x * 2\nwhile false: print(1)");
    let Stmt::FunDecl { decl, .. } = &program.stmts[0] else {
        panic!("expected function");
    };
    assert_eq!(decl.body.stmts.len(), 1);
    assert!(matches!(program.stmts[1], Stmt::While { .. }));
}

#[test]
fn test_while_requires_colon() {
    let diag = parse_err("while true { }");
    assert_eq!(diag.code, syntax::UNEXPECTED_TOKEN);
    assert!(!diag.notes.is_empty());
}

#[test]
fn test_else_if_chain() {
    let expr = first_expr("if a: 1 else if b: 2 else: 3");
    let Expr::If { else_branch, .. } = expr else {
        panic!("expected if");
    };
    let else_block = else_branch.expect("else branch");
    assert!(matches!(
        else_block.stmts[0],
        Stmt::Expr {
            expr: Expr::If { .. },
            ..
        }
    ));
}

#[test]
fn test_else_brace_without_colon() {
    let expr = first_expr("if a: { 1 } else { 2 }");
    assert!(matches!(expr, Expr::If { else_branch: Some(_), .. }));
}

#[test]
fn test_struct_definition() {
    let program = parse(
        r#"
struct Dog inherits Animal, Speaker: {
    name: String
    private secret: Int = 3
    override fun speak(self) -> String: {
        return "Woof"
    }
    fun create(name): Dog { name: name }
}
"#,
    );
    let Stmt::StructDef { decl, .. } = &program.stmts[0] else {
        panic!("expected struct");
    };
    assert_eq!(decl.name, "Dog");
    assert_eq!(decl.inherits, vec!["Animal".to_string(), "Speaker".to_string()]);
    assert_eq!(decl.fields.len(), 2);
    assert_eq!(decl.fields[0].visibility, Visibility::Public);
    assert_eq!(decl.fields[1].visibility, Visibility::Private);
    assert_eq!(decl.methods.len(), 2);
    assert!(decl.methods[0].is_override);
    assert!(decl.methods[0].takes_self);
    assert!(decl.methods[0].func.params.is_empty());
    assert!(!decl.methods[1].takes_self);
}

#[test]
fn test_trait_definition() {
    let program = parse("trait Speaker: {\n fun speak(self) -> String\n fun rename(self, name)\n}");
    let Stmt::TraitDef { decl, .. } = &program.stmts[0] else {
        panic!("expected trait");
    };
    let arities: Vec<usize> = decl.methods.iter().map(|m| m.arity).collect();
    assert_eq!(arities, vec![0, 1]);
}

#[test]
fn test_struct_literal_needs_field_lookahead() {
    assert!(matches!(
        first_expr("Point { x: 1, y: 2 }"),
        Expr::StructLiteral { .. }
    ));
    assert!(matches!(first_expr("Empty {}"), Expr::StructLiteral { .. }));
    // a brace on the next line opens a new statement
    let program = parse("p\n{ 1: 2 }");
    assert_eq!(program.stmts.len(), 2);
}

#[test]
fn test_call_does_not_continue_across_lines() {
    let program = parse("let f = g\n(1 + 2)");
    assert_eq!(program.stmts.len(), 2);
    let program = parse("let f = g\n[1]");
    assert_eq!(program.stmts.len(), 2);
}

#[test]
fn test_minus_on_new_line_starts_statement() {
    let program = parse("let a = 1\n-a");
    assert_eq!(program.stmts.len(), 2);
    assert!(matches!(
        program.stmts[1],
        Stmt::Expr {
            expr: Expr::Unary { op: UnaryOp::Neg, .. },
            ..
        }
    ));
}

#[test]
fn test_method_chain_across_lines() {
    let expr = first_expr("items\n  .map(fun(x): x)\n  .len()");
    assert!(matches!(expr, Expr::MethodCall { ref method, .. } if method == "len"));
}

#[test]
fn test_return_value_only_on_same_line() {
    let program = parse("fun f(): {\n return\n 1\n}");
    let Stmt::FunDecl { decl, .. } = &program.stmts[0] else {
        panic!("expected function");
    };
    assert!(matches!(decl.body.stmts[0], Stmt::Return { value: None, .. }));
    assert_eq!(decl.body.stmts.len(), 2);
}

#[test]
fn test_comprehensions() {
    assert!(matches!(
        first_expr("[x * x for x in 0..10 if x % 2 == 0]"),
        Expr::ListComprehension { filter: Some(_), .. }
    ));
    assert!(matches!(
        first_expr("{k: v for k in keys}"),
        Expr::MapComprehension { filter: None, .. }
    ));
}

#[test]
fn test_map_and_list_literals() {
    let Expr::Map { entries, .. } = first_expr("{\"a\": 1, \"b\": 2,}") else {
        panic!("expected map");
    };
    assert_eq!(entries.len(), 2);
    let Expr::List { elements, .. } = first_expr("[1, 2, 3]") else {
        panic!("expected list");
    };
    assert_eq!(elements.len(), 3);
}

#[test]
fn test_try_catch_finally() {
    let program = parse("try { risky() } catch e { print(e) } finally { done() }");
    let Stmt::Try { catch, finally, .. } = &program.stmts[0] else {
        panic!("expected try");
    };
    assert_eq!(catch.as_ref().and_then(|c| c.name.as_deref()), Some("e"));
    assert!(finally.is_some());
}

#[test]
fn test_try_needs_handler() {
    assert_eq!(parse_err("try { x() }").code, syntax::INCOMPLETE_TRY);
}

#[test]
fn test_compound_assignment() {
    let program = parse("var x = 1\nx += 2\nobj.count -= 1\nitems[0] *= 3");
    let ops: Vec<AssignOp> = program.stmts[1..]
        .iter()
        .map(|s| match s {
            Stmt::Assign { op, .. } => *op,
            other => panic!("expected assignment, got {:?}", other),
        })
        .collect();
    assert_eq!(ops, vec![AssignOp::Add, AssignOp::Sub, AssignOp::Mul]);
}

#[test]
fn test_invalid_assignment_target() {
    assert_eq!(parse_err("f() = 3").code, syntax::INVALID_ASSIGNMENT_TARGET);
}

#[test]
fn test_spawn_requires_call() {
    assert!(matches!(first_expr("spawn worker(1)"), Expr::Spawn { .. }));
    assert!(matches!(first_expr("spawn obj.run()"), Expr::Spawn { .. }));
    assert_eq!(parse_err("spawn 42").code, syntax::INVALID_SPAWN);
}

#[test]
fn test_control_flow_placement() {
    assert_eq!(parse_err("break").code, syntax::MISPLACED_CONTROL_FLOW);
    assert_eq!(parse_err("return 1").code, syntax::MISPLACED_CONTROL_FLOW);
    // a lambda body is not inside the enclosing loop
    assert_eq!(
        parse_err("while true: { let f = fun(): { break } }").code,
        syntax::MISPLACED_CONTROL_FLOW
    );
    parse("for i in 0..3: { if i == 1: continue }");
}

#[test]
fn test_parameter_validation() {
    assert_eq!(parse_err("fun f(*a, b) {}").code, syntax::INVALID_PARAMETERS);
    assert_eq!(parse_err("fun f(*a = []) {}").code, syntax::INVALID_PARAMETERS);
    assert_eq!(parse_err("fun f(a, a) {}").code, syntax::INVALID_PARAMETERS);
}

#[test]
fn test_import_with_alias() {
    let program = parse("import math as m\nimport utils");
    assert!(matches!(
        &program.stmts[0],
        Stmt::Import { module, alias: Some(alias), .. } if module == "math" && alias == "m"
    ));
    assert!(matches!(&program.stmts[1], Stmt::Import { alias: None, .. }));
}

#[test]
fn test_unexpected_eof_reports_position() {
    let diag = parse_err("let x =");
    assert_eq!(diag.code, syntax::UNEXPECTED_EOF);
    assert_eq!(diag.span.start_line, 1);
}

#[test]
fn test_lex_errors_surface_as_syntax_errors() {
    let err = parse_source("let s = \"open", &PathBuf::from("test.omn")).unwrap_err();
    assert!(matches!(err, SyntaxError::Lex(_)));
}

#[test]
fn test_parse_is_deterministic() {
    let source = "fun f(a, b = 1): { return [x + b for x in a] }\nprint(f([1, 2]))";
    let first = parse(source);
    let second = parse(source);
    assert_eq!(first, second);
}

#[test]
fn test_ast_serializes_to_json() {
    let program = parse("let x = 1");
    let json = serde_json::to_value(&program).expect("serialize");
    assert_eq!(json["stmts"][0]["stmt"], "VarDecl");
    assert_eq!(json["stmts"][0]["value"]["node"], "Literal");
}

#[test]
fn test_unary_operands_serialize() {
    let program = parse("let y = -x\nlet c = !b");
    let json = serde_json::to_value(&program).expect("serialize");

    let neg = &json["stmts"][0]["value"];
    assert_eq!(neg["node"], "Unary");
    assert_eq!(neg["op"], "Neg");
    assert_eq!(neg["expr"]["node"], "Identifier");
    assert_eq!(neg["expr"]["name"], "x");

    let not = &json["stmts"][1]["value"];
    assert_eq!(not["op"], "Not");
    assert_eq!(not["expr"]["name"], "b");
}

proptest! {
    #[test]
    fn prop_integer_sums_parse(values in proptest::collection::vec(0i64..1000, 1..8)) {
        let source = values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" + ");
        let program = parse_source(&source, &PathBuf::from("p.omn"));
        prop_assert!(program.is_ok());
        prop_assert_eq!(program.map(|p| p.stmts.len()).unwrap_or(0), 1);
    }
}
