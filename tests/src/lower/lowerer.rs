use crate::utils::{
    bin, call, expr_stmt, factorial_program, fn_decl, ident, identity_program, let_decl,
    lower_program, lower_strict, num, program, ret, try_lower,
};
use etna_ast::nodes::{
    Expr as AstExpr, ForStatement, NewExpression, Stmt as AstStmt, TemplateElement,
    TemplateLiteral, TemplateValue, UpdateExpression,
};
use etna_ir::metadata;
use etna_ir::nodes::{BinaryOperator, Expr, LiteralValue, Stmt};
use etna_ir::types::Type;
use etna_lower::LowerError;
use etna_lower::errors::ScopeViolation;

#[test]
fn test_identity_function_shape() {
    let lowered = lower_program(&identity_program());
    assert_eq!(lowered.program.body.len(), 1);
    let Stmt::FunctionDecl(f) = &lowered.program.body[0] else {
        panic!("expected a function declaration");
    };
    assert_eq!(f.name, "id");
    assert_eq!(f.params.len(), 1);
    assert_eq!(f.params[0].name, "x");
    assert_eq!(f.body.statements.len(), 1);
    let Stmt::Return(r) = &f.body.statements[0] else {
        panic!("expected a return");
    };
    let Some(Expr::Identifier(value)) = &r.value else {
        panic!("expected an identifier return value");
    };
    assert_eq!(value.name, "x");
}

#[test]
fn test_factorial_invariants() {
    let lowered = lower_program(&factorial_program());
    let Stmt::FunctionDecl(f) = &lowered.program.body[0] else {
        panic!("expected a function declaration");
    };
    // Two returns, an if without an alternate, and a recursive call whose
    // argument is `n - 1`.
    let Stmt::If(if_stmt) = &f.body.statements[0] else {
        panic!("expected the guard if");
    };
    assert!(if_stmt.alternate.is_none());
    let Stmt::Return(second) = &f.body.statements[1] else {
        panic!("expected the trailing return");
    };
    let Some(Expr::BinaryOp(mul)) = &second.value else {
        panic!("expected a multiplication");
    };
    assert_eq!(mul.operator, BinaryOperator::Mul);
    let Expr::Call(recursion) = &mul.right else {
        panic!("expected the recursive call");
    };
    let Expr::Identifier(callee) = &recursion.callee else {
        panic!("expected an identifier callee");
    };
    assert_eq!(callee.name, "f");
    let Expr::BinaryOp(argument) = &recursion.arguments[0] else {
        panic!("expected a binary argument");
    };
    assert_eq!(argument.operator, BinaryOperator::Sub);

    let guarded_returns = if_stmt
        .consequent
        .statements
        .iter()
        .filter(|s| matches!(s, Stmt::Return(_)))
        .count();
    let trailing_returns = f
        .body
        .statements
        .iter()
        .filter(|s| matches!(s, Stmt::Return(_)))
        .count();
    assert_eq!(guarded_returns + trailing_returns, 2);
}

#[test]
fn test_new_expression_sets_is_new_metadata() {
    let input = program(vec![
        fn_decl("E", &[], vec![]),
        expr_stmt(AstExpr::NewExpression(NewExpression {
            callee: Box::new(ident("E")),
            arguments: vec![num(1.0)],
            loc: None,
        })),
    ]);
    let lowered = lower_program(&input);
    let Stmt::ExpressionStmt(stmt) = &lowered.program.body[1] else {
        panic!("expected an expression statement");
    };
    let Expr::Call(call) = &stmt.expression else {
        panic!("expected a call");
    };
    assert!(call.metadata.flag(metadata::IS_NEW));
}

#[test]
fn test_strict_equality_preserved_in_metadata() {
    let lowered = lower_program(&program(vec![
        let_decl("a", Some(num(1.0))),
        expr_stmt(bin("===", ident("a"), num(1.0))),
    ]));
    let Stmt::ExpressionStmt(stmt) = &lowered.program.body[1] else {
        panic!("expected an expression statement");
    };
    let Expr::BinaryOp(b) = &stmt.expression else {
        panic!("expected a binary op");
    };
    assert_eq!(b.operator, BinaryOperator::Eq);
    assert!(b.metadata.flag(metadata::IS_STRICT));
}

#[test]
fn test_template_literal_lowers_to_tagged_concatenation() {
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
    let lowered = lower_program(&program(vec![
        let_decl("name", Some(crate::utils::str_lit("world"))),
        let_decl("s", Some(template)),
    ]));
    let Stmt::VarDecl(decl) = &lowered.program.body[1] else {
        panic!("expected the template declaration");
    };
    let Some(Expr::BinaryOp(concat)) = &decl.init else {
        panic!("expected a concatenation");
    };
    assert_eq!(concat.operator, BinaryOperator::Add);
    assert!(concat.metadata.flag(metadata::IS_CONCATENATION));
    assert_eq!(concat.ty, Some(Type::String));
    let Expr::Literal(head) = &concat.left else {
        panic!("expected a literal head");
    };
    assert_eq!(head.value, LiteralValue::Str("hi ".to_string()));
}

#[test]
fn test_for_without_test_gets_synthetic_true() {
    let input = program(vec![AstStmt::ForStatement(ForStatement {
        init: None,
        test: None,
        update: None,
        body: Box::new(crate::utils::block(vec![AstStmt::BreakStatement(
            etna_ast::nodes::BreakStatement {
                label: None,
                loc: None,
            },
        )])),
        loc: None,
    })]);
    let lowered = lower_program(&input);
    let Stmt::For(for_stmt) = &lowered.program.body[0] else {
        panic!("expected a for loop");
    };
    let Expr::Literal(test) = &for_stmt.test else {
        panic!("expected a literal test");
    };
    assert_eq!(test.value, LiteralValue::Bool(true));
}

#[test]
fn test_strict_mode_rejects_undeclared_identifiers() {
    let err = lower_strict(&program(vec![expr_stmt(ident("ghost"))])).unwrap_err();
    let LowerError::Scope {
        name, violation, ..
    } = err
    else {
        panic!("expected a scope error");
    };
    assert_eq!(name, "ghost");
    assert_eq!(violation, ScopeViolation::Undeclared);
}

#[test]
fn test_loose_mode_warns_on_undeclared_identifiers() {
    let lowered = lower_program(&program(vec![expr_stmt(ident("ghost"))]));
    assert!(
        lowered
            .warnings
            .iter()
            .any(|w| w.message.contains("undeclared") && w.message.contains("ghost"))
    );
}

#[test]
fn test_recursive_reference_resolves_via_hoisting() {
    // `f` is referenced inside its own body and before its declaration.
    let input = program(vec![
        fn_decl("g", &[], vec![ret(Some(call(ident("f"), vec![])))]),
        fn_decl("f", &[], vec![ret(Some(num(1.0)))]),
    ]);
    assert!(lower_strict(&input).is_ok());
}

#[test]
fn test_undefined_identifier_becomes_null_literal() {
    let lowered = lower_program(&program(vec![let_decl("x", Some(ident("undefined")))]));
    let Stmt::VarDecl(decl) = &lowered.program.body[0] else {
        panic!("expected a declaration");
    };
    let Some(Expr::Literal(lit)) = &decl.init else {
        panic!("expected a literal");
    };
    assert_eq!(lit.value, LiteralValue::Null);
    assert!(lit.metadata.flag(metadata::IS_UNDEFINED));
}

#[test]
fn test_update_expression_in_value_position_rejected() {
    let update = AstExpr::UpdateExpression(UpdateExpression {
        operator: "++".to_string(),
        argument: Box::new(ident("x")),
        prefix: false,
        loc: None,
    });
    let input = program(vec![
        let_decl("x", Some(num(0.0))),
        let_decl("y", Some(update)),
    ]);
    let err = try_lower(&input).unwrap_err();
    assert!(matches!(err, LowerError::UnsupportedConstruct { .. }));
}

#[test]
fn test_update_expression_in_statement_position_becomes_assignment() {
    let update = AstExpr::UpdateExpression(UpdateExpression {
        operator: "++".to_string(),
        argument: Box::new(ident("x")),
        prefix: false,
        loc: None,
    });
    let lowered = lower_program(&program(vec![
        let_decl("x", Some(num(0.0))),
        expr_stmt(update),
    ]));
    let Stmt::ExpressionStmt(stmt) = &lowered.program.body[1] else {
        panic!("expected an expression statement");
    };
    let Expr::Assignment(assignment) = &stmt.expression else {
        panic!("expected a compound assignment");
    };
    assert_eq!(
        assignment.operator,
        etna_ir::nodes::AssignOperator::AddAssign
    );
}

#[test]
fn test_labeled_break_is_unsupported() {
    let input = program(vec![AstStmt::BreakStatement(etna_ast::nodes::BreakStatement {
        label: Some(etna_ast::nodes::IdentifierName {
            name: "outer".to_string(),
        }),
        loc: None,
    })]);
    let err = try_lower(&input).unwrap_err();
    assert!(matches!(err, LowerError::UnsupportedConstruct { .. }));
}
