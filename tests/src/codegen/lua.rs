use crate::utils::{
    bin, call, case, decl, expr_stmt, ident, identity_program, let_decl, lower_program, member,
    num, program, ret, str_lit, switch,
};
use etna_ast::nodes::{
    AssignmentExpression, ContinueStatement, DeclKind, DoWhileStatement, Expr as AstExpr,
    Stmt as AstStmt, TemplateElement, TemplateLiteral, TemplateValue, WhileStatement,
};
use etna_codegen::EmitError;
use etna_codegen::lua::{LuaOptions, emit};
use etna_ir::cancel::Cancellation;

fn emit_lua(program: &etna_ast::nodes::Program) -> (String, Vec<etna_ir::diagnostics::Warning>) {
    let lowered = lower_program(program);
    let emission = emit(&lowered.program, &LuaOptions::default(), &Cancellation::never())
        .expect("emission should succeed");
    (emission.output, emission.warnings)
}

fn assign(target: AstExpr, operator: &str, value: AstExpr) -> AstExpr {
    AstExpr::AssignmentExpression(AssignmentExpression {
        operator: operator.to_string(),
        left: Box::new(target),
        right: Box::new(value),
        loc: None,
    })
}

#[test]
fn test_identity_function_text() {
    let (lua, _) = emit_lua(&identity_program());
    assert_eq!(lua, "local function id(x)\n  return x\nend\n");
}

#[test]
fn test_switch_desugars_to_if_chain() {
    let input = program(vec![
        let_decl("x", Some(num(1.0))),
        let_decl("y", Some(num(0.0))),
        switch(
            ident("x"),
            vec![
                case(
                    Some(num(1.0)),
                    vec![
                        expr_stmt(assign(ident("y"), "=", num(1.0))),
                        AstStmt::BreakStatement(etna_ast::nodes::BreakStatement {
                            label: None,
                            loc: None,
                        }),
                    ],
                ),
                case(
                    Some(num(2.0)),
                    vec![
                        expr_stmt(assign(ident("y"), "=", num(2.0))),
                        AstStmt::BreakStatement(etna_ast::nodes::BreakStatement {
                            label: None,
                            loc: None,
                        }),
                    ],
                ),
                case(None, vec![expr_stmt(assign(ident("y"), "=", num(0.0)))]),
            ],
        ),
    ]);
    let (lua, _) = emit_lua(&input);
    assert!(lua.contains("local __switch_"), "{lua}");
    assert!(lua.contains("if __switch_"), "{lua}");
    assert!(lua.contains("== 1 then"), "{lua}");
    assert!(lua.contains("elseif __switch_"), "{lua}");
    assert!(lua.contains("== 2 then"), "{lua}");
    assert!(lua.contains("else\n"), "{lua}");
    assert!(lua.contains("y = 0"), "{lua}");
    // The discriminant temporary is deterministic across runs.
    let (again, _) = emit_lua(&input);
    assert_eq!(lua, again);
}

#[test]
fn test_template_concatenation_uses_tostring() {
    let template = AstExpr::TemplateLiteral(TemplateLiteral {
        quasis: vec![
            TemplateElement {
                value: TemplateValue {
                    cooked: Some("hi ".to_string()),
                    raw: "hi ".to_string(),
                },
                tail: false,
            },
            TemplateElement {
                value: TemplateValue {
                    cooked: Some(String::new()),
                    raw: String::new(),
                },
                tail: true,
            },
        ],
        expressions: vec![ident("name")],
        loc: None,
    });
    let input = program(vec![
        let_decl("name", Some(num(1.0))),
        let_decl("s", Some(template)),
    ]);
    let (lua, _) = emit_lua(&input);
    assert!(lua.contains("\"hi \" .. tostring(name)"), "{lua}");
}

#[test]
fn test_statically_string_plus_becomes_concat() {
    let input = program(vec![
        let_decl("n", Some(num(1.0))),
        let_decl("s", Some(bin("+", str_lit("a"), ident("n")))),
    ]);
    let (lua, _) = emit_lua(&input);
    assert!(lua.contains("\"a\" .. tostring(n)"), "{lua}");
}

#[test]
fn test_plus_preserved_without_string_evidence() {
    let input = program(vec![
        let_decl("a", Some(num(1.0))),
        let_decl("b", Some(num(2.0))),
        let_decl("c", Some(bin("+", ident("a"), ident("b")))),
    ]);
    let (lua, _) = emit_lua(&input);
    assert!(lua.contains("local c = a + b"), "{lua}");
}

#[test]
fn test_operator_translation() {
    let input = program(vec![
        let_decl("a", Some(num(1.0))),
        let_decl("b", Some(num(2.0))),
        let_decl("c", Some(bin("!==", ident("a"), ident("b")))),
        let_decl("d", Some(bin("&&", ident("a"), ident("b")))),
        let_decl("e", Some(bin("||", ident("a"), ident("b")))),
    ]);
    let (lua, _) = emit_lua(&input);
    assert!(lua.contains("a ~= b"), "{lua}");
    assert!(lua.contains("a and b"), "{lua}");
    assert!(lua.contains("a or b"), "{lua}");
}

#[test]
fn test_console_log_becomes_print() {
    let input = program(vec![expr_stmt(call(
        member(ident("console"), "log"),
        vec![str_lit("hello")],
    ))]);
    let (lua, _) = emit_lua(&input);
    assert!(lua.contains("print(\"hello\")"), "{lua}");
}

#[test]
fn test_null_and_undefined_become_nil() {
    let input = program(vec![
        let_decl("a", Some(crate::utils::null_lit())),
        let_decl("b", Some(ident("undefined"))),
    ]);
    let (lua, _) = emit_lua(&input);
    assert!(lua.contains("local a = nil"), "{lua}");
    assert!(lua.contains("local b = nil"), "{lua}");
}

#[test]
fn test_do_while_maps_to_repeat_until() {
    let input = program(vec![
        let_decl("x", Some(num(0.0))),
        AstStmt::DoWhileStatement(DoWhileStatement {
            body: Box::new(crate::utils::block(vec![expr_stmt(assign(
                ident("x"),
                "+=",
                num(1.0),
            ))])),
            test: bin("<", ident("x"), num(3.0)),
            loc: None,
        }),
    ]);
    let (lua, _) = emit_lua(&input);
    assert!(lua.contains("repeat"), "{lua}");
    assert!(lua.contains("until not (x < 3)"), "{lua}");
    assert!(lua.contains("x = x + 1"), "{lua}");
}

#[test]
fn test_continue_rewrites_to_goto_with_warning() {
    let input = program(vec![
        let_decl("x", Some(num(0.0))),
        AstStmt::WhileStatement(WhileStatement {
            test: bin("<", ident("x"), num(3.0)),
            body: Box::new(crate::utils::block(vec![
                expr_stmt(assign(ident("x"), "+=", num(1.0))),
                AstStmt::ContinueStatement(ContinueStatement {
                    label: None,
                    loc: None,
                }),
            ])),
            loc: None,
        }),
    ]);
    let (lua, warnings) = emit_lua(&input);
    assert!(lua.contains("goto __continue_"), "{lua}");
    assert!(lua.contains("::__continue_"), "{lua}");
    assert!(warnings.iter().any(|w| w.message.contains("continue")));
}

#[test]
fn test_continue_is_rejected_in_strict_mode() {
    let input = program(vec![
        let_decl("x", Some(num(0.0))),
        AstStmt::WhileStatement(WhileStatement {
            test: bin("<", ident("x"), num(3.0)),
            body: Box::new(crate::utils::block(vec![AstStmt::ContinueStatement(
                ContinueStatement {
                    label: None,
                    loc: None,
                },
            )])),
            loc: None,
        }),
    ]);
    let lowered = lower_program(&input);
    let options = LuaOptions {
        strict: true,
        ..LuaOptions::default()
    };
    let err = emit(&lowered.program, &options, &Cancellation::never()).unwrap_err();
    assert!(matches!(err, EmitError::UnsupportedForLua { .. }));
}

#[test]
fn test_const_collapse_warns_once() {
    let input = program(vec![
        decl(DeclKind::Const, crate::utils::ident_pat("a"), Some(num(1.0))),
        decl(DeclKind::Const, crate::utils::ident_pat("b"), Some(num(2.0))),
    ]);
    let (lua, warnings) = emit_lua(&input);
    assert!(lua.contains("local a = 1"), "{lua}");
    assert!(lua.contains("local b = 2"), "{lua}");
    let collapse_warnings = warnings
        .iter()
        .filter(|w| w.message.contains("const"))
        .count();
    assert_eq!(collapse_warnings, 1);
}

#[test]
fn test_functions_returning_nothing_emit_bare_return() {
    let input = program(vec![crate::utils::fn_decl("noop", &[], vec![ret(None)])]);
    let (lua, _) = emit_lua(&input);
    assert_eq!(lua, "local function noop()\n  return\nend\n");
}
