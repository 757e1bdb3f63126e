//! Shared builders for surface ASTs and pipeline shortcuts.

use etna_ast::nodes::{
    ArrowBody, ArrowFunctionExpression, BinaryExpression, BlockStatement, CallExpression,
    DeclKind, Expr, ExpressionStatement, FunctionDeclaration, Identifier, IdentifierName,
    IfStatement, Literal, LiteralValue, MemberExpression, Pattern, Program, ReturnStatement,
    Stmt, SwitchCase, SwitchStatement, VariableDeclaration, VariableDeclarator,
};
use etna_ir::cancel::Cancellation;
use etna_ir::nodes as ir;
use etna_lower::{LowerOptions, Lowered, lower, normalize};

pub(crate) fn program(body: Vec<Stmt>) -> Program {
    Program { body, loc: None }
}

pub(crate) fn ident(name: &str) -> Expr {
    Expr::Identifier(Identifier {
        name: name.to_string(),
        loc: None,
    })
}

pub(crate) fn ident_pat(name: &str) -> Pattern {
    Pattern::Identifier(Identifier {
        name: name.to_string(),
        loc: None,
    })
}

pub(crate) fn num(value: f64) -> Expr {
    Expr::Literal(Literal {
        value: LiteralValue::Number(value),
        loc: None,
    })
}

pub(crate) fn str_lit(value: &str) -> Expr {
    Expr::Literal(Literal {
        value: LiteralValue::Str(value.to_string()),
        loc: None,
    })
}

pub(crate) fn null_lit() -> Expr {
    Expr::Literal(Literal {
        value: LiteralValue::Null,
        loc: None,
    })
}

pub(crate) fn bin(operator: &str, left: Expr, right: Expr) -> Expr {
    Expr::BinaryExpression(BinaryExpression {
        operator: operator.to_string(),
        left: Box::new(left),
        right: Box::new(right),
        loc: None,
    })
}

pub(crate) fn call(callee: Expr, arguments: Vec<Expr>) -> Expr {
    Expr::CallExpression(CallExpression {
        callee: Box::new(callee),
        arguments,
        loc: None,
    })
}

pub(crate) fn member(object: Expr, property: &str) -> Expr {
    Expr::MemberExpression(MemberExpression {
        object: Box::new(object),
        property: Box::new(ident(property)),
        computed: false,
        loc: None,
    })
}

pub(crate) fn arrow(params: Vec<Pattern>, body: Expr) -> Expr {
    Expr::ArrowFunctionExpression(ArrowFunctionExpression {
        params,
        body: ArrowBody::Expression(Box::new(body)),
        loc: None,
    })
}

pub(crate) fn expr_stmt(expression: Expr) -> Stmt {
    Stmt::ExpressionStatement(ExpressionStatement {
        expression,
        loc: None,
    })
}

pub(crate) fn ret(argument: Option<Expr>) -> Stmt {
    Stmt::ReturnStatement(ReturnStatement {
        argument,
        loc: None,
    })
}

pub(crate) fn block(body: Vec<Stmt>) -> Stmt {
    Stmt::BlockStatement(BlockStatement { body, loc: None })
}

pub(crate) fn fn_decl(name: &str, params: &[&str], body: Vec<Stmt>) -> Stmt {
    Stmt::FunctionDeclaration(FunctionDeclaration {
        id: IdentifierName {
            name: name.to_string(),
        },
        params: params.iter().map(|p| ident_pat(p)).collect(),
        body: BlockStatement { body, loc: None },
        loc: None,
    })
}

pub(crate) fn decl(kind: DeclKind, pattern: Pattern, init: Option<Expr>) -> Stmt {
    Stmt::VariableDeclaration(VariableDeclaration {
        kind,
        declarations: vec![VariableDeclarator {
            id: pattern,
            init,
            loc: None,
        }],
        loc: None,
    })
}

pub(crate) fn let_decl(name: &str, init: Option<Expr>) -> Stmt {
    decl(DeclKind::Let, ident_pat(name), init)
}

pub(crate) fn if_stmt(test: Expr, consequent: Vec<Stmt>, alternate: Option<Vec<Stmt>>) -> Stmt {
    Stmt::IfStatement(IfStatement {
        test,
        consequent: Box::new(block(consequent)),
        alternate: alternate.map(|body| Box::new(block(body))),
        loc: None,
    })
}

pub(crate) fn switch(discriminant: Expr, cases: Vec<SwitchCase>) -> Stmt {
    Stmt::SwitchStatement(SwitchStatement {
        discriminant,
        cases,
        loc: None,
    })
}

pub(crate) fn case(test: Option<Expr>, consequent: Vec<Stmt>) -> SwitchCase {
    SwitchCase {
        test,
        consequent,
        loc: None,
    }
}

// ------------------------------------------------------------------------
// Seed programs
// ------------------------------------------------------------------------

/// `function id(x) { return x; }`
pub(crate) fn identity_program() -> Program {
    program(vec![fn_decl("id", &["x"], vec![ret(Some(ident("x")))])])
}

/// `function f(n) { if (n <= 1) return 1; return n * f(n - 1); }`
pub(crate) fn factorial_program() -> Program {
    program(vec![fn_decl(
        "f",
        &["n"],
        vec![
            if_stmt(
                bin("<=", ident("n"), num(1.0)),
                vec![ret(Some(num(1.0)))],
                None,
            ),
            ret(Some(bin(
                "*",
                ident("n"),
                call(ident("f"), vec![bin("-", ident("n"), num(1.0))]),
            ))),
        ],
    )])
}

// ------------------------------------------------------------------------
// Pipeline shortcuts
// ------------------------------------------------------------------------

pub(crate) fn lower_program(program: &Program) -> Lowered {
    let normalized = normalize(program);
    lower(&normalized, &LowerOptions::default(), &Cancellation::never())
        .expect("lowering should succeed")
}

pub(crate) fn lower_strict(
    program: &Program,
) -> Result<Lowered, etna_lower::LowerError> {
    let normalized = normalize(program);
    lower(&normalized, &LowerOptions { strict: true }, &Cancellation::never())
}

pub(crate) fn try_lower(program: &Program) -> Result<Lowered, etna_lower::LowerError> {
    let normalized = normalize(program);
    lower(&normalized, &LowerOptions::default(), &Cancellation::never())
}

// ------------------------------------------------------------------------
// IR inspection
// ------------------------------------------------------------------------

/// Collects every node ID in the tree, pre-order.
pub(crate) fn collect_ids(program: &ir::Program) -> Vec<String> {
    let mut ids = vec![program.id.as_str().to_string()];
    for stmt in &program.body {
        collect_stmt_ids(stmt, &mut ids);
    }
    ids
}

fn collect_stmt_ids(stmt: &ir::Stmt, ids: &mut Vec<String>) {
    ids.push(stmt.id().as_str().to_string());
    match stmt {
        ir::Stmt::FunctionDecl(f) => collect_function_ids(f, ids),
        ir::Stmt::VarDecl(d) => {
            if let Some(init) = &d.init {
                collect_expr_ids(init, ids);
            }
        }
        ir::Stmt::Block(b) => collect_block_ids(b, ids),
        ir::Stmt::Return(r) => {
            if let Some(value) = &r.value {
                collect_expr_ids(value, ids);
            }
        }
        ir::Stmt::If(s) => {
            collect_expr_ids(&s.condition, ids);
            collect_block_ids(&s.consequent, ids);
            if let Some(alternate) = &s.alternate {
                collect_block_ids(alternate, ids);
            }
        }
        ir::Stmt::While(s) => {
            collect_expr_ids(&s.condition, ids);
            collect_block_ids(&s.body, ids);
        }
        ir::Stmt::DoWhile(s) => {
            collect_block_ids(&s.body, ids);
            collect_expr_ids(&s.condition, ids);
        }
        ir::Stmt::For(s) => {
            if let Some(init) = &s.init {
                collect_stmt_ids(init, ids);
            }
            collect_expr_ids(&s.test, ids);
            if let Some(update) = &s.update {
                collect_expr_ids(update, ids);
            }
            collect_block_ids(&s.body, ids);
        }
        ir::Stmt::Switch(s) => {
            collect_expr_ids(&s.discriminant, ids);
            for case in &s.cases {
                ids.push(case.id.as_str().to_string());
                if let Some(test) = &case.test {
                    collect_expr_ids(test, ids);
                }
                for stmt in &case.body {
                    collect_stmt_ids(stmt, ids);
                }
            }
        }
        ir::Stmt::Break(_) | ir::Stmt::Continue(_) => {}
        ir::Stmt::ExpressionStmt(s) => collect_expr_ids(&s.expression, ids),
    }
}

fn collect_block_ids(block: &ir::Block, ids: &mut Vec<String>) {
    ids.push(block.id.as_str().to_string());
    for stmt in &block.statements {
        collect_stmt_ids(stmt, ids);
    }
}

fn collect_function_ids(f: &ir::FunctionDecl, ids: &mut Vec<String>) {
    for param in &f.params {
        ids.push(param.id.as_str().to_string());
    }
    collect_block_ids(&f.body, ids);
}

fn collect_expr_ids(expr: &ir::Expr, ids: &mut Vec<String>) {
    ids.push(expr.id().as_str().to_string());
    match expr {
        ir::Expr::BinaryOp(b) => {
            collect_expr_ids(&b.left, ids);
            collect_expr_ids(&b.right, ids);
        }
        ir::Expr::UnaryOp(u) => collect_expr_ids(&u.operand, ids),
        ir::Expr::Call(c) => {
            collect_expr_ids(&c.callee, ids);
            for argument in &c.arguments {
                collect_expr_ids(argument, ids);
            }
        }
        ir::Expr::Member(m) => {
            collect_expr_ids(&m.object, ids);
            collect_expr_ids(&m.property, ids);
        }
        ir::Expr::ArrayLiteral(a) => {
            for element in &a.elements {
                collect_expr_ids(element, ids);
            }
        }
        ir::Expr::ObjectLiteral(o) => {
            for property in &o.properties {
                ids.push(property.id.as_str().to_string());
                collect_expr_ids(&property.value, ids);
            }
        }
        ir::Expr::Identifier(_) | ir::Expr::Literal(_) => {}
        ir::Expr::Assignment(a) => {
            collect_expr_ids(&a.target, ids);
            collect_expr_ids(&a.value, ids);
        }
        ir::Expr::Conditional(c) => {
            collect_expr_ids(&c.condition, ids);
            collect_expr_ids(&c.consequent, ids);
            collect_expr_ids(&c.alternate, ids);
        }
        ir::Expr::FunctionDecl(f) => collect_function_ids(f, ids),
    }
}
