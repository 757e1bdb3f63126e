//! Surface AST normalization.
//!
//! The normalizer is total and idempotent: it never fails and applying it
//! twice yields the same tree. Guarantees established here and relied on by
//! the lowerer:
//!
//! - single-statement bodies of `if`/`while`/`do`/`for` are wrapped in
//!   blocks;
//! - variable declarations with multiple declarators are split into separate
//!   declarations (outside `for` init slots, which are single-slot);
//! - arrow functions with expression bodies become block bodies containing a
//!   single `return`;
//! - empty statements are dropped.
//!
//! Unknown constructs pass through untouched and are rejected later by the
//! lowerer.

use etna_ast::nodes::{
    ArrowBody, ArrowFunctionExpression, BlockStatement, Expr, ForInit, Program, Property,
    ReturnStatement, Stmt, SwitchCase, VariableDeclaration,
};

/// Normalizes a surface program.
#[must_use]
pub fn normalize(program: &Program) -> Program {
    Program {
        body: normalize_stmts(&program.body),
        loc: program.loc,
    }
}

fn normalize_stmts(stmts: &[Stmt]) -> Vec<Stmt> {
    let mut out = Vec::with_capacity(stmts.len());
    for stmt in stmts {
        normalize_stmt_into(stmt, &mut out);
    }
    out
}

fn normalize_stmt_into(stmt: &Stmt, out: &mut Vec<Stmt>) {
    match stmt {
        Stmt::EmptyStatement(_) => {}
        Stmt::VariableDeclaration(decl) if decl.declarations.len() > 1 => {
            for declarator in &decl.declarations {
                let mut declarator = declarator.clone();
                declarator.init = declarator.init.as_ref().map(normalize_expr);
                out.push(Stmt::VariableDeclaration(VariableDeclaration {
                    kind: decl.kind,
                    declarations: vec![declarator],
                    loc: decl.loc,
                }));
            }
        }
        other => out.push(normalize_single(other)),
    }
}

#[allow(clippy::too_many_lines)]
fn normalize_single(stmt: &Stmt) -> Stmt {
    match stmt {
        Stmt::FunctionDeclaration(f) => {
            let mut f = f.clone();
            f.body = normalize_block(&f.body);
            Stmt::FunctionDeclaration(f)
        }
        Stmt::VariableDeclaration(decl) => {
            let mut decl = decl.clone();
            for declarator in &mut decl.declarations {
                declarator.init = declarator.init.as_ref().map(normalize_expr);
            }
            Stmt::VariableDeclaration(decl)
        }
        Stmt::ExpressionStatement(s) => {
            let mut s = s.clone();
            s.expression = normalize_expr(&s.expression);
            Stmt::ExpressionStatement(s)
        }
        Stmt::BlockStatement(b) => Stmt::BlockStatement(normalize_block(b)),
        Stmt::ReturnStatement(r) => {
            let mut r = r.clone();
            r.argument = r.argument.as_ref().map(normalize_expr);
            Stmt::ReturnStatement(r)
        }
        Stmt::IfStatement(s) => {
            let mut s = s.clone();
            s.test = normalize_expr(&s.test);
            s.consequent = Box::new(Stmt::BlockStatement(as_block(&s.consequent)));
            s.alternate = s
                .alternate
                .as_ref()
                .map(|alt| Box::new(Stmt::BlockStatement(as_block(alt))));
            Stmt::IfStatement(s)
        }
        Stmt::WhileStatement(s) => {
            let mut s = s.clone();
            s.test = normalize_expr(&s.test);
            s.body = Box::new(Stmt::BlockStatement(as_block(&s.body)));
            Stmt::WhileStatement(s)
        }
        Stmt::DoWhileStatement(s) => {
            let mut s = s.clone();
            s.test = normalize_expr(&s.test);
            s.body = Box::new(Stmt::BlockStatement(as_block(&s.body)));
            Stmt::DoWhileStatement(s)
        }
        Stmt::ForStatement(s) => {
            let mut s = s.clone();
            s.init = s.init.as_ref().map(|init| match init {
                ForInit::Declaration(decl) => {
                    let mut decl = decl.clone();
                    for declarator in &mut decl.declarations {
                        declarator.init = declarator.init.as_ref().map(normalize_expr);
                    }
                    ForInit::Declaration(decl)
                }
                ForInit::Expression(e) => ForInit::Expression(Box::new(normalize_expr(e))),
            });
            s.test = s.test.as_ref().map(normalize_expr);
            s.update = s.update.as_ref().map(normalize_expr);
            s.body = Box::new(Stmt::BlockStatement(as_block(&s.body)));
            Stmt::ForStatement(s)
        }
        Stmt::SwitchStatement(s) => {
            let mut s = s.clone();
            s.discriminant = normalize_expr(&s.discriminant);
            s.cases = s
                .cases
                .iter()
                .map(|case| SwitchCase {
                    test: case.test.as_ref().map(normalize_expr),
                    consequent: normalize_stmts(&case.consequent),
                    loc: case.loc,
                })
                .collect();
            Stmt::SwitchStatement(s)
        }
        Stmt::BreakStatement(_) | Stmt::ContinueStatement(_) | Stmt::EmptyStatement(_) => {
            stmt.clone()
        }
    }
}

fn normalize_block(block: &BlockStatement) -> BlockStatement {
    BlockStatement {
        body: normalize_stmts(&block.body),
        loc: block.loc,
    }
}

/// Wraps a statement into a block unless it already is one.
fn as_block(stmt: &Stmt) -> BlockStatement {
    match stmt {
        Stmt::BlockStatement(b) => normalize_block(b),
        other => {
            let mut body = Vec::new();
            normalize_stmt_into(other, &mut body);
            BlockStatement { body, loc: None }
        }
    }
}

#[allow(clippy::too_many_lines)]
fn normalize_expr(expr: &Expr) -> Expr {
    match expr {
        Expr::Identifier(_) | Expr::Literal(_) => expr.clone(),
        Expr::TemplateLiteral(t) => {
            let mut t = t.clone();
            t.expressions = t.expressions.iter().map(normalize_expr).collect();
            Expr::TemplateLiteral(t)
        }
        Expr::BinaryExpression(b) => {
            let mut b = b.clone();
            b.left = Box::new(normalize_expr(&b.left));
            b.right = Box::new(normalize_expr(&b.right));
            Expr::BinaryExpression(b)
        }
        Expr::LogicalExpression(b) => {
            let mut b = b.clone();
            b.left = Box::new(normalize_expr(&b.left));
            b.right = Box::new(normalize_expr(&b.right));
            Expr::LogicalExpression(b)
        }
        Expr::UnaryExpression(u) => {
            let mut u = u.clone();
            u.argument = Box::new(normalize_expr(&u.argument));
            Expr::UnaryExpression(u)
        }
        Expr::UpdateExpression(u) => {
            let mut u = u.clone();
            u.argument = Box::new(normalize_expr(&u.argument));
            Expr::UpdateExpression(u)
        }
        Expr::AssignmentExpression(a) => {
            let mut a = a.clone();
            a.left = Box::new(normalize_expr(&a.left));
            a.right = Box::new(normalize_expr(&a.right));
            Expr::AssignmentExpression(a)
        }
        Expr::ConditionalExpression(c) => {
            let mut c = c.clone();
            c.test = Box::new(normalize_expr(&c.test));
            c.consequent = Box::new(normalize_expr(&c.consequent));
            c.alternate = Box::new(normalize_expr(&c.alternate));
            Expr::ConditionalExpression(c)
        }
        Expr::CallExpression(c) => {
            let mut c = c.clone();
            c.callee = Box::new(normalize_expr(&c.callee));
            c.arguments = c.arguments.iter().map(normalize_expr).collect();
            Expr::CallExpression(c)
        }
        Expr::NewExpression(n) => {
            let mut n = n.clone();
            n.callee = Box::new(normalize_expr(&n.callee));
            n.arguments = n.arguments.iter().map(normalize_expr).collect();
            Expr::NewExpression(n)
        }
        Expr::MemberExpression(m) => {
            let mut m = m.clone();
            m.object = Box::new(normalize_expr(&m.object));
            if m.computed {
                m.property = Box::new(normalize_expr(&m.property));
            }
            Expr::MemberExpression(m)
        }
        Expr::ArrayExpression(a) => {
            let mut a = a.clone();
            a.elements = a
                .elements
                .iter()
                .map(|e| e.as_ref().map(normalize_expr))
                .collect();
            Expr::ArrayExpression(a)
        }
        Expr::ObjectExpression(o) => {
            let mut o = o.clone();
            o.properties = o
                .properties
                .iter()
                .map(|p| Property {
                    key: p.key.clone(),
                    value: normalize_expr(&p.value),
                    method: p.method,
                    loc: p.loc,
                })
                .collect();
            Expr::ObjectExpression(o)
        }
        Expr::ArrowFunctionExpression(arrow) => {
            let body = match &arrow.body {
                ArrowBody::Block(block) => ArrowBody::Block(normalize_block(block)),
                ArrowBody::Expression(e) => ArrowBody::Block(BlockStatement {
                    body: vec![Stmt::ReturnStatement(ReturnStatement {
                        argument: Some(normalize_expr(e)),
                        loc: arrow.loc,
                    })],
                    loc: arrow.loc,
                }),
            };
            Expr::ArrowFunctionExpression(ArrowFunctionExpression {
                params: arrow.params.clone(),
                body,
                loc: arrow.loc,
            })
        }
        Expr::FunctionExpression(f) => {
            let mut f = f.clone();
            f.body = normalize_block(&f.body);
            Expr::FunctionExpression(f)
        }
    }
}
