//! The validation walk.

use etna_ir::diagnostics::Warning;
use etna_ir::nodes::{
    BinaryOperator, Block, Case, Expr, FunctionDecl, NodeKind, Program, Span, Stmt, UnaryOperator,
};
use etna_ir::types::Type;
use etna_lower::scope::{DeclarationKind, Redeclaration, ScopeStack};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::errors::{OperandSide, ValidationError};

/// Runs the full validation pass, returning diagnostics in pre-order.
#[must_use]
pub fn run(program: &Program) -> (Vec<ValidationError>, Vec<Warning>) {
    let mut checker = Checker {
        scopes: ScopeStack::new(),
        functions: FxHashMap::default(),
        errors: Vec::new(),
        warnings: Vec::new(),
        fn_frames: Vec::new(),
        loop_depth: 0,
        switch_depth: 0,
    };
    checker.collect_signatures(&program.body);
    checker.scopes.push();
    checker.hoist(&program.body);
    checker.check_stmts(&program.body);
    checker.scopes.pop();
    (checker.errors, checker.warnings)
}

/// Callee signature used for arity checks.
#[derive(Debug, Clone, Copy)]
struct Signature {
    params: usize,
    has_rest: bool,
}

struct FnFrame {
    name: String,
    has_value_return: bool,
    has_bare_return: bool,
}

struct Checker {
    scopes: ScopeStack,
    functions: FxHashMap<String, Signature>,
    errors: Vec<ValidationError>,
    warnings: Vec<Warning>,
    fn_frames: Vec<FnFrame>,
    loop_depth: usize,
    switch_depth: usize,
}

impl Checker {
    // --------------------------------------------------------------------
    // Registration
    // --------------------------------------------------------------------

    /// Collects every statement-position function signature in the tree so
    /// calls can be arity-checked regardless of declaration order.
    fn collect_signatures(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            match stmt {
                Stmt::FunctionDecl(f) => {
                    self.functions.insert(
                        f.name.clone(),
                        Signature {
                            params: f.params.len(),
                            has_rest: f.params.last().is_some_and(is_rest),
                        },
                    );
                    self.collect_signatures(&f.body.statements);
                }
                Stmt::Block(b) => self.collect_signatures(&b.statements),
                Stmt::If(s) => {
                    self.collect_signatures(&s.consequent.statements);
                    if let Some(alternate) = &s.alternate {
                        self.collect_signatures(&alternate.statements);
                    }
                }
                Stmt::While(s) => self.collect_signatures(&s.body.statements),
                Stmt::DoWhile(s) => self.collect_signatures(&s.body.statements),
                Stmt::For(s) => self.collect_signatures(&s.body.statements),
                Stmt::Switch(s) => {
                    for case in &s.cases {
                        self.collect_signatures(&case.body);
                    }
                }
                _ => {}
            }
        }
    }

    fn hoist(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            if let Stmt::FunctionDecl(f) = stmt {
                self.declare(&f.name, DeclarationKind::Function, f.location);
            }
        }
    }

    fn declare(&mut self, name: &str, kind: DeclarationKind, location: Option<Span>) {
        let const_involved = kind == DeclarationKind::Const
            || self
                .scopes
                .lookup_current(name)
                .is_some_and(|existing| existing.kind == DeclarationKind::Const);
        let shadows_outer = self.scopes.lookup_current(name).is_none()
            && self.scopes.lookup(name).is_some();
        match self.scopes.declare(name, kind, None) {
            Ok(_) => {
                if shadows_outer {
                    self.warnings.push(Warning::new(
                        format!("declaration of `{name}` shadows an earlier binding"),
                        location,
                    ));
                }
            }
            Err(Redeclaration) => {
                if const_involved {
                    self.errors.push(ValidationError::Redeclaration {
                        name: name.to_string(),
                        location,
                    });
                } else {
                    self.warnings.push(Warning::new(
                        format!("redeclaration of `{name}`"),
                        location,
                    ));
                }
            }
        }
    }

    // --------------------------------------------------------------------
    // Statements
    // --------------------------------------------------------------------

    fn check_stmts(&mut self, stmts: &[Stmt]) {
        let mut reachable = true;
        for stmt in stmts {
            if !reachable {
                self.warnings
                    .push(Warning::new("unreachable code", stmt.location()));
                // Report once per list and keep checking the rest.
                reachable = true;
            }
            self.check_stmt(stmt);
            if matches!(stmt, Stmt::Return(_) | Stmt::Break(_) | Stmt::Continue(_)) {
                reachable = false;
            }
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::FunctionDecl(f) => self.check_function(f),
            Stmt::VarDecl(decl) => {
                if let Some(init) = &decl.init {
                    self.check_expr(init);
                }
                let kind = match decl.declaration_kind() {
                    Some("const") => DeclarationKind::Const,
                    Some("var") => DeclarationKind::Var,
                    _ => DeclarationKind::Let,
                };
                self.declare(&decl.name, kind, decl.location);
            }
            Stmt::Block(b) => self.check_block(b),
            Stmt::Return(r) => {
                if let Some(value) = &r.value {
                    self.check_expr(value);
                }
                match self.fn_frames.last_mut() {
                    Some(frame) => {
                        if r.value.is_some() {
                            frame.has_value_return = true;
                        } else {
                            frame.has_bare_return = true;
                        }
                    }
                    None => self.errors.push(ValidationError::ReturnOutsideFunction {
                        location: r.location,
                    }),
                }
            }
            Stmt::If(s) => {
                self.check_expr(&s.condition);
                self.check_block(&s.consequent);
                if let Some(alternate) = &s.alternate {
                    self.check_block(alternate);
                }
            }
            Stmt::While(s) => {
                self.check_expr(&s.condition);
                self.loop_depth += 1;
                self.check_block(&s.body);
                self.loop_depth -= 1;
            }
            Stmt::DoWhile(s) => {
                self.loop_depth += 1;
                self.check_block(&s.body);
                self.loop_depth -= 1;
                self.check_expr(&s.condition);
            }
            Stmt::For(s) => {
                self.scopes.push();
                if let Some(init) = &s.init {
                    self.check_stmt(init);
                }
                self.check_expr(&s.test);
                if let Some(update) = &s.update {
                    self.check_expr(update);
                }
                self.loop_depth += 1;
                self.check_block(&s.body);
                self.loop_depth -= 1;
                self.scopes.pop();
            }
            Stmt::Switch(s) => {
                self.check_expr(&s.discriminant);
                self.check_switch_cases(s);
            }
            Stmt::Break(b) => {
                if self.loop_depth == 0 && self.switch_depth == 0 {
                    self.errors.push(ValidationError::BreakOutsideLoop {
                        location: b.location,
                    });
                }
            }
            Stmt::Continue(c) => {
                if self.loop_depth == 0 {
                    self.errors.push(ValidationError::ContinueOutsideLoop {
                        location: c.location,
                    });
                }
            }
            Stmt::ExpressionStmt(s) => self.check_expr(&s.expression),
        }
    }

    fn check_block(&mut self, block: &Block) {
        self.scopes.push();
        self.hoist(&block.statements);
        self.check_stmts(&block.statements);
        self.scopes.pop();
    }

    fn check_switch_cases(&mut self, switch: &etna_ir::nodes::Switch) {
        let defaults = switch.cases.iter().filter(|c| c.test.is_none()).count();
        if defaults > 1 {
            self.errors.push(ValidationError::Structural {
                kind: NodeKind::Switch,
                reason: format!("{defaults} default cases"),
                location: switch.location,
            });
        }
        self.scopes.push();
        self.switch_depth += 1;
        for case in &switch.cases {
            self.check_case(case);
        }
        self.switch_depth -= 1;
        self.scopes.pop();
    }

    fn check_case(&mut self, case: &Case) {
        if let Some(test) = &case.test {
            self.check_expr(test);
        }
        self.check_stmts(&case.body);
    }

    fn check_function(&mut self, f: &FunctionDecl) {
        let mut seen = FxHashSet::default();
        for param in &f.params {
            if !seen.insert(param.name.as_str()) {
                self.errors.push(ValidationError::Structural {
                    kind: NodeKind::FunctionDecl,
                    reason: format!("duplicate parameter `{}`", param.name),
                    location: f.location,
                });
            }
        }
        self.fn_frames.push(FnFrame {
            name: if f.name.is_empty() {
                "<anonymous>".to_string()
            } else {
                f.name.clone()
            },
            has_value_return: false,
            has_bare_return: false,
        });
        // Loop and switch contexts do not cross function boundaries.
        let saved_loop = std::mem::replace(&mut self.loop_depth, 0);
        let saved_switch = std::mem::replace(&mut self.switch_depth, 0);
        self.scopes.push();
        for param in &f.params {
            self.declare(&param.name, DeclarationKind::Parameter, param.location);
        }
        self.hoist(&f.body.statements);
        self.check_stmts(&f.body.statements);
        self.scopes.pop();
        self.loop_depth = saved_loop;
        self.switch_depth = saved_switch;
        let frame = self
            .fn_frames
            .pop()
            .expect("function frame pushed above");
        if frame.has_value_return && frame.has_bare_return {
            self.warnings.push(Warning::new(
                format!("function `{}` mixes value and bare returns", frame.name),
                f.location,
            ));
        }
    }

    // --------------------------------------------------------------------
    // Expressions
    // --------------------------------------------------------------------

    #[allow(clippy::too_many_lines)]
    fn check_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Identifier(id) => {
                if !self.scopes.resolves(&id.name) {
                    self.errors.push(ValidationError::UndeclaredIdentifier {
                        name: id.name.clone(),
                        location: id.location,
                    });
                }
            }
            Expr::Literal(lit) => {
                if let Some(ty) = &lit.ty {
                    if !lit.value.matches_type(ty) {
                        self.errors.push(ValidationError::LiteralTypeMismatch {
                            declared: ty.clone(),
                            found: lit.value.primitive_type(),
                            location: lit.location,
                        });
                    }
                }
            }
            Expr::BinaryOp(b) => {
                self.check_expr(&b.left);
                self.check_expr(&b.right);
                self.check_binary_types(b);
            }
            Expr::UnaryOp(u) => {
                self.check_expr(&u.operand);
                if u.operator == UnaryOperator::Neg {
                    let found = ty_of(&u.operand);
                    if !found.is_compatible_with(&Type::Number) {
                        self.errors.push(ValidationError::IncompatibleUnaryOperand {
                            operator: u.operator,
                            expected: Type::Number,
                            found,
                            location: u.location,
                        });
                    }
                }
            }
            Expr::Call(call) => {
                self.check_expr(&call.callee);
                for argument in &call.arguments {
                    self.check_expr(argument);
                }
                if let Expr::Identifier(callee) = &call.callee {
                    if let Some(signature) = self.functions.get(&callee.name).copied() {
                        self.check_arity(&callee.name, signature, call);
                    }
                }
            }
            Expr::Member(m) => {
                self.check_expr(&m.object);
                if m.computed {
                    self.check_expr(&m.property);
                } else if !matches!(m.property, Expr::Identifier(_)) {
                    self.errors.push(ValidationError::Structural {
                        kind: NodeKind::Member,
                        reason: "non-computed member access requires an identifier property"
                            .to_string(),
                        location: m.location,
                    });
                }
            }
            Expr::ArrayLiteral(a) => {
                for element in &a.elements {
                    self.check_expr(element);
                }
            }
            Expr::ObjectLiteral(o) => {
                for property in &o.properties {
                    self.check_expr(&property.value);
                }
            }
            Expr::Assignment(a) => {
                match &a.target {
                    Expr::Identifier(id) => {
                        match self.scopes.lookup(&id.name) {
                            Some(symbol) => {
                                if symbol.kind == DeclarationKind::Const {
                                    self.errors.push(ValidationError::AssignmentToConst {
                                        name: id.name.clone(),
                                        location: a.location,
                                    });
                                }
                            }
                            None => {
                                if !etna_lower::scope::is_free_identifier(&id.name) {
                                    self.errors.push(
                                        ValidationError::UndeclaredIdentifier {
                                            name: id.name.clone(),
                                            location: id.location,
                                        },
                                    );
                                }
                            }
                        }
                    }
                    Expr::Member(m) => {
                        self.check_expr(&m.object);
                        if m.computed {
                            self.check_expr(&m.property);
                        }
                    }
                    other => {
                        self.errors.push(ValidationError::Structural {
                            kind: NodeKind::Assignment,
                            reason: format!("{} is not an assignable target", other.kind()),
                            location: a.location,
                        });
                    }
                }
                self.check_expr(&a.value);
            }
            Expr::Conditional(c) => {
                self.check_expr(&c.condition);
                self.check_expr(&c.consequent);
                self.check_expr(&c.alternate);
            }
            Expr::FunctionDecl(f) => self.check_function(f),
        }
    }

    fn check_arity(&mut self, name: &str, signature: Signature, call: &etna_ir::nodes::Call) {
        let found = call.arguments.len();
        let ok = if signature.has_rest {
            found >= signature.params.saturating_sub(1)
        } else {
            found == signature.params
        };
        if !ok {
            let expected = if signature.has_rest {
                format!("at least {}", signature.params.saturating_sub(1))
            } else {
                signature.params.to_string()
            };
            self.errors.push(ValidationError::ArityMismatch {
                function: name.to_string(),
                expected,
                found,
                location: call.location,
            });
        }
    }

    fn check_binary_types(&mut self, node: &etna_ir::nodes::BinaryOp) {
        let op = node.operator;
        let left = ty_of(&node.left);
        let right = ty_of(&node.right);
        if op.is_logical() {
            return;
        }
        if op.is_comparison() {
            if !left.is_compatible_with(&right) {
                self.errors.push(ValidationError::IncomparableOperands {
                    operator: op,
                    left,
                    right,
                    location: node.location,
                });
            }
            return;
        }
        // Arithmetic. `+` additionally accepts strings on either side.
        let accepts = |ty: &Type| {
            ty.is_compatible_with(&Type::Number)
                || (op == BinaryOperator::Add && ty.is_compatible_with(&Type::String))
        };
        if !accepts(&left) {
            self.errors.push(ValidationError::IncompatibleOperand {
                operator: op,
                side: OperandSide::Left,
                expected: Type::Number,
                found: left,
                location: node.location,
            });
        }
        if !accepts(&right) {
            self.errors.push(ValidationError::IncompatibleOperand {
                operator: op,
                side: OperandSide::Right,
                expected: Type::Number,
                found: right,
                location: node.location,
            });
        }
    }
}

fn ty_of(expr: &Expr) -> Type {
    expr.ty().cloned().unwrap_or(Type::Unknown)
}

/// True for rest parameters.
fn is_rest(param: &etna_ir::nodes::Parameter) -> bool {
    param.is_rest()
}
