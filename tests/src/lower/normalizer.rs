use crate::utils::{expr_stmt, ident, ident_pat, num, program};
use etna_ast::nodes::{
    ArrowBody, ArrowFunctionExpression, BlockStatement, DeclKind, Expr, IfStatement, Stmt,
    VariableDeclaration, VariableDeclarator, WhileStatement,
};
use etna_lower::normalize;

#[test]
fn test_single_statement_if_body_becomes_block() {
    let input = program(vec![Stmt::IfStatement(IfStatement {
        test: ident("x"),
        consequent: Box::new(expr_stmt(num(1.0))),
        alternate: Some(Box::new(expr_stmt(num(2.0)))),
        loc: None,
    })]);
    let normalized = normalize(&input);
    let Stmt::IfStatement(if_stmt) = &normalized.body[0] else {
        panic!("expected if statement");
    };
    assert!(matches!(*if_stmt.consequent, Stmt::BlockStatement(_)));
    assert!(matches!(
        if_stmt.alternate.as_deref(),
        Some(Stmt::BlockStatement(_))
    ));
}

#[test]
fn test_single_statement_while_body_becomes_block() {
    let input = program(vec![Stmt::WhileStatement(WhileStatement {
        test: ident("x"),
        body: Box::new(expr_stmt(num(1.0))),
        loc: None,
    })]);
    let normalized = normalize(&input);
    let Stmt::WhileStatement(while_stmt) = &normalized.body[0] else {
        panic!("expected while statement");
    };
    assert!(matches!(*while_stmt.body, Stmt::BlockStatement(_)));
}

#[test]
fn test_multi_declarator_declarations_split() {
    let input = program(vec![Stmt::VariableDeclaration(VariableDeclaration {
        kind: DeclKind::Let,
        declarations: vec![
            VariableDeclarator {
                id: ident_pat("a"),
                init: Some(num(1.0)),
                loc: None,
            },
            VariableDeclarator {
                id: ident_pat("b"),
                init: None,
                loc: None,
            },
        ],
        loc: None,
    })]);
    let normalized = normalize(&input);
    assert_eq!(normalized.body.len(), 2);
    for stmt in &normalized.body {
        let Stmt::VariableDeclaration(decl) = stmt else {
            panic!("expected declaration");
        };
        assert_eq!(decl.declarations.len(), 1);
        assert_eq!(decl.kind, DeclKind::Let);
    }
}

#[test]
fn test_arrow_expression_body_becomes_block_with_return() {
    let input = program(vec![expr_stmt(Expr::ArrowFunctionExpression(
        ArrowFunctionExpression {
            params: vec![ident_pat("x")],
            body: ArrowBody::Expression(Box::new(ident("x"))),
            loc: None,
        },
    ))]);
    let normalized = normalize(&input);
    let Stmt::ExpressionStatement(stmt) = &normalized.body[0] else {
        panic!("expected expression statement");
    };
    let Expr::ArrowFunctionExpression(arrow) = &stmt.expression else {
        panic!("expected arrow function");
    };
    let ArrowBody::Block(block) = &arrow.body else {
        panic!("expected block body");
    };
    assert_eq!(block.body.len(), 1);
    assert!(matches!(block.body[0], Stmt::ReturnStatement(_)));
}

#[test]
fn test_empty_statements_dropped() {
    let input = program(vec![
        Stmt::EmptyStatement(etna_ast::nodes::EmptyStatement { loc: None }),
        expr_stmt(num(1.0)),
    ]);
    let normalized = normalize(&input);
    assert_eq!(normalized.body.len(), 1);
}

#[test]
fn test_empty_block_stays_an_empty_block() {
    let input = program(vec![Stmt::BlockStatement(BlockStatement {
        body: Vec::new(),
        loc: None,
    })]);
    let normalized = normalize(&input);
    let Stmt::BlockStatement(block) = &normalized.body[0] else {
        panic!("expected block");
    };
    assert!(block.body.is_empty());
}

#[test]
fn test_normalization_is_idempotent() {
    let input = program(vec![
        Stmt::IfStatement(IfStatement {
            test: ident("x"),
            consequent: Box::new(expr_stmt(num(1.0))),
            alternate: None,
            loc: None,
        }),
        Stmt::VariableDeclaration(VariableDeclaration {
            kind: DeclKind::Const,
            declarations: vec![
                VariableDeclarator {
                    id: ident_pat("a"),
                    init: Some(num(1.0)),
                    loc: None,
                },
                VariableDeclarator {
                    id: ident_pat("b"),
                    init: Some(num(2.0)),
                    loc: None,
                },
            ],
            loc: None,
        }),
    ]);
    let once = normalize(&input);
    let twice = normalize(&once);
    assert_eq!(once, twice);
}
