use crate::utils::{
    bin, block, call, decl, expr_stmt, factorial_program, fn_decl, ident, let_decl,
    lower_program, num, program, ret, str_lit,
};
use etna_ast::nodes::{
    AssignmentExpression, BreakStatement, ContinueStatement, DeclKind, Expr as AstExpr,
    Stmt as AstStmt,
};
use etna_validator::{ValidationError, validate};

fn assign(target: AstExpr, value: AstExpr) -> AstExpr {
    AstExpr::AssignmentExpression(AssignmentExpression {
        operator: "=".to_string(),
        left: Box::new(target),
        right: Box::new(value),
        loc: None,
    })
}

#[test]
fn test_factorial_is_valid() {
    let lowered = lower_program(&factorial_program());
    let validation = validate(&lowered.program);
    assert!(validation.valid, "unexpected errors: {:?}", validation.errors);
    assert!(validation.errors.is_empty());
}

#[test]
fn test_validation_is_deterministic() {
    let lowered = lower_program(&factorial_program());
    let a = validate(&lowered.program);
    let b = validate(&lowered.program);
    let render = |v: &etna_validator::Validation| {
        v.errors.iter().map(ToString::to_string).collect::<Vec<_>>()
    };
    assert_eq!(render(&a), render(&b));
}

#[test]
fn test_break_outside_loop_is_an_error() {
    let lowered = lower_program(&program(vec![AstStmt::BreakStatement(BreakStatement {
        label: None,
        loc: None,
    })]));
    let validation = validate(&lowered.program);
    assert!(
        validation
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::BreakOutsideLoop { .. }))
    );
}

#[test]
fn test_continue_outside_loop_is_an_error() {
    let lowered = lower_program(&program(vec![AstStmt::ContinueStatement(
        ContinueStatement {
            label: None,
            loc: None,
        },
    )]));
    let validation = validate(&lowered.program);
    assert!(
        validation
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::ContinueOutsideLoop { .. }))
    );
}

#[test]
fn test_return_outside_function_is_an_error() {
    let lowered = lower_program(&program(vec![ret(Some(num(1.0)))]));
    let validation = validate(&lowered.program);
    assert!(
        validation
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::ReturnOutsideFunction { .. }))
    );
}

#[test]
fn test_undeclared_identifier_is_an_error() {
    let lowered = lower_program(&program(vec![expr_stmt(ident("ghost"))]));
    let validation = validate(&lowered.program);
    assert!(validation.errors.iter().any(|e| matches!(
        e,
        ValidationError::UndeclaredIdentifier { name, .. } if name == "ghost"
    )));
}

#[test]
fn test_free_identifiers_are_permitted() {
    let lowered = lower_program(&program(vec![expr_stmt(call(
        crate::utils::member(ident("console"), "log"),
        vec![num(1.0)],
    ))]));
    let validation = validate(&lowered.program);
    assert!(validation.valid, "{:?}", validation.errors);
}

#[test]
fn test_call_arity_is_checked() {
    let mut stmts = vec![fn_decl("id", &["x"], vec![ret(Some(ident("x")))])];
    stmts.push(expr_stmt(call(ident("id"), vec![])));
    let lowered = lower_program(&program(stmts));
    let validation = validate(&lowered.program);
    assert!(validation.errors.iter().any(|e| matches!(
        e,
        ValidationError::ArityMismatch { function, found: 0, .. } if function == "id"
    )));
}

#[test]
fn test_assignment_to_const_is_an_error() {
    let lowered = lower_program(&program(vec![
        decl(DeclKind::Const, crate::utils::ident_pat("k"), Some(num(1.0))),
        expr_stmt(assign(ident("k"), num(2.0))),
    ]));
    let validation = validate(&lowered.program);
    assert!(validation.errors.iter().any(|e| matches!(
        e,
        ValidationError::AssignmentToConst { name, .. } if name == "k"
    )));
}

#[test]
fn test_arithmetic_on_strings_is_a_type_error() {
    let lowered = lower_program(&program(vec![expr_stmt(bin(
        "-",
        num(1.0),
        str_lit("x"),
    ))]));
    let validation = validate(&lowered.program);
    assert!(
        validation
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::IncompatibleOperand { .. }))
    );
}

#[test]
fn test_plus_accepts_strings() {
    let lowered = lower_program(&program(vec![expr_stmt(bin(
        "+",
        str_lit("a"),
        str_lit("b"),
    ))]));
    let validation = validate(&lowered.program);
    assert!(validation.valid, "{:?}", validation.errors);
}

#[test]
fn test_comparing_unrelated_types_is_an_error() {
    let lowered = lower_program(&program(vec![expr_stmt(bin(
        "<",
        num(1.0),
        str_lit("x"),
    ))]));
    let validation = validate(&lowered.program);
    assert!(
        validation
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::IncomparableOperands { .. }))
    );
}

#[test]
fn test_unreachable_code_is_a_warning() {
    let lowered = lower_program(&program(vec![fn_decl(
        "f",
        &[],
        vec![ret(Some(num(1.0))), expr_stmt(num(2.0))],
    )]));
    let validation = validate(&lowered.program);
    assert!(validation.valid);
    assert!(
        validation
            .warnings
            .iter()
            .any(|w| w.message.contains("unreachable"))
    );
}

#[test]
fn test_shadowing_is_a_warning() {
    let lowered = lower_program(&program(vec![
        let_decl("x", Some(num(1.0))),
        block(vec![let_decl("x", Some(num(2.0)))]),
    ]));
    let validation = validate(&lowered.program);
    assert!(validation.valid);
    assert!(
        validation
            .warnings
            .iter()
            .any(|w| w.message.contains("shadows"))
    );
}

#[test]
fn test_mixed_returns_are_a_warning() {
    let lowered = lower_program(&program(vec![fn_decl(
        "f",
        &["x"],
        vec![crate::utils::if_stmt(
            ident("x"),
            vec![ret(Some(num(1.0)))],
            None,
        ),
        ret(None)],
    )]));
    let validation = validate(&lowered.program);
    assert!(validation.valid);
    assert!(
        validation
            .warnings
            .iter()
            .any(|w| w.message.contains("mixes value and bare returns"))
    );
}
