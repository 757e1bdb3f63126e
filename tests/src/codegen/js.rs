use crate::utils::{
    arrow, bin, call, expr_stmt, ident, ident_pat, identity_program, let_decl, lower_program,
    num, program,
};
use etna_ast::nodes::{ConditionalExpression, Expr as AstExpr, NewExpression};
use etna_codegen::js::{JsOptions, emit};
use etna_ir::cancel::Cancellation;

fn emit_js(program: &etna_ast::nodes::Program, options: &JsOptions) -> String {
    let lowered = lower_program(program);
    emit(&lowered.program, options, &Cancellation::never())
        .expect("emission should succeed")
        .output
}

#[test]
fn test_identity_function_text() {
    let js = emit_js(&identity_program(), &JsOptions::default());
    assert_eq!(js, "function id(x) {\n  return x;\n}\n");
}

#[test]
fn test_semicolons_are_configurable() {
    let js = emit_js(
        &identity_program(),
        &JsOptions {
            semicolons: false,
            indent: 2,
        },
    );
    assert_eq!(js, "function id(x) {\n  return x\n}\n");
}

#[test]
fn test_indent_width_is_configurable() {
    let js = emit_js(
        &identity_program(),
        &JsOptions {
            semicolons: true,
            indent: 4,
        },
    );
    assert_eq!(js, "function id(x) {\n    return x;\n}\n");
}

#[test]
fn test_strict_equality_round_trips() {
    let input = program(vec![
        let_decl("a", Some(num(1.0))),
        let_decl("b", Some(bin("===", ident("a"), num(1.0)))),
        let_decl("c", Some(bin("==", ident("a"), num(1.0)))),
    ]);
    let js = emit_js(&input, &JsOptions::default());
    assert!(js.contains("a === 1"), "{js}");
    assert!(js.contains("a == 1"), "{js}");
}

#[test]
fn test_declaration_kinds_survive() {
    let input = program(vec![
        crate::utils::decl(
            etna_ast::nodes::DeclKind::Const,
            ident_pat("k"),
            Some(num(1.0)),
        ),
        crate::utils::decl(
            etna_ast::nodes::DeclKind::Var,
            ident_pat("v"),
            Some(num(2.0)),
        ),
    ]);
    let js = emit_js(&input, &JsOptions::default());
    assert!(js.contains("const k = 1;"), "{js}");
    assert!(js.contains("var v = 2;"), "{js}");
}

#[test]
fn test_ternary_prints_as_conditional() {
    let input = program(vec![
        let_decl("a", Some(num(1.0))),
        let_decl(
            "b",
            Some(AstExpr::ConditionalExpression(ConditionalExpression {
                test: Box::new(bin(">", ident("a"), num(0.0))),
                consequent: Box::new(num(1.0)),
                alternate: Box::new(num(2.0)),
                loc: None,
            })),
        ),
    ]);
    let js = emit_js(&input, &JsOptions::default());
    assert!(js.contains("let b = a > 0 ? 1 : 2;"), "{js}");
}

#[test]
fn test_new_calls_are_restored() {
    let input = program(vec![
        crate::utils::fn_decl("E", &[], vec![]),
        expr_stmt(AstExpr::NewExpression(NewExpression {
            callee: Box::new(ident("E")),
            arguments: vec![num(1.0)],
            loc: None,
        })),
    ]);
    let js = emit_js(&input, &JsOptions::default());
    assert!(js.contains("new E(1);"), "{js}");
}

#[test]
fn test_arrow_functions_print_as_arrows() {
    let input = program(vec![let_decl(
        "inc",
        Some(arrow(vec![ident_pat("x")], bin("+", ident("x"), num(1.0)))),
    )]);
    let js = emit_js(&input, &JsOptions::default());
    assert!(js.contains("let inc = (x) => {"), "{js}");
    assert!(js.contains("return x + 1;"), "{js}");
}

#[test]
fn test_console_log_is_preserved() {
    let input = program(vec![expr_stmt(call(
        crate::utils::member(ident("console"), "log"),
        vec![num(1.0)],
    ))]);
    let js = emit_js(&input, &JsOptions::default());
    assert!(js.contains("console.log(1);"), "{js}");
}

#[test]
fn test_emission_is_deterministic() {
    let input = identity_program();
    let a = emit_js(&input, &JsOptions::default());
    let b = emit_js(&input, &JsOptions::default());
    assert_eq!(a, b);
}
