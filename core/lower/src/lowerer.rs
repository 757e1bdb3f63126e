//! AST to IR lowering.
//!
//! A single top-down recursive traversal over the normalized surface tree.
//! The lowerer tracks scopes on a stack, pre-registers function names per
//! block so forward and recursive references resolve, tags metadata the
//! emitters rely on (`isNew`, `isStrict`, `isConcatenation`), expands
//! destructuring into explicit bindings, and annotates the types it can see
//! bottom-up (literals, comparisons, concatenations).
//!
//! The lowerer fails fast: the first error aborts the unit. In strict mode
//! undeclared and re-declared identifiers are errors; otherwise they are
//! warnings.

use etna_ast::nodes::{self as ast, span_of};
use etna_ir::builder::Builder;
use etna_ir::cancel::Cancellation;
use etna_ir::diagnostics::Warning;
use etna_ir::metadata;
use etna_ir::nodes::{
    AssignOperator, BinaryOperator, Block, Expr, FunctionDecl, LiteralValue, Parameter, Program,
    Span, Stmt, UnaryOperator,
};
use etna_ir::types::Type;

use crate::errors::{LowerError, ScopeViolation};
use crate::scope::{DeclarationKind, Redeclaration, ScopeStack};

/// Options controlling the lowering pass.
#[derive(Debug, Clone, Default)]
pub struct LowerOptions {
    /// Treat undeclared/re-declared identifiers as errors.
    pub strict: bool,
}

/// Result of a successful lowering.
#[derive(Debug)]
pub struct Lowered {
    pub program: Program,
    pub warnings: Vec<Warning>,
}

/// Lowers a normalized surface program into canonical IR.
///
/// # Errors
///
/// Returns the first [`LowerError`] encountered; partial output is
/// discarded.
pub fn lower(
    program: &ast::Program,
    options: &LowerOptions,
    cancel: &Cancellation,
) -> Result<Lowered, LowerError> {
    let mut lowerer = Lowerer {
        builder: Builder::new(),
        scopes: ScopeStack::new(),
        warnings: Vec::new(),
        strict: options.strict,
        cancel,
        destructure_counter: 0,
    };
    lowerer.scopes.push();
    if lowerer.cancel.is_requested() {
        return Err(LowerError::Cancelled);
    }
    lowerer.hoist_functions(&program.body)?;
    let mut body = Vec::new();
    for stmt in &program.body {
        lowerer.lower_stmt_into(stmt, &mut body)?;
    }
    lowerer.scopes.pop();
    let program = lowerer.builder.program(body, span_of(program.loc))?;
    Ok(Lowered {
        program,
        warnings: lowerer.warnings,
    })
}

/// Where a value-binding slot reads from during destructuring expansion.
/// Slots are pure and cheap to re-materialize, which keeps default-value
/// expansion free of shared subtrees.
enum Slot {
    Ident(String),
    Element { base: String, index: usize },
}

enum FunctionForm {
    Declaration,
    Expression,
    Arrow,
}

struct Lowerer<'a> {
    builder: Builder,
    scopes: ScopeStack,
    warnings: Vec<Warning>,
    strict: bool,
    cancel: &'a Cancellation,
    destructure_counter: u32,
}

impl Lowerer<'_> {
    // --------------------------------------------------------------------
    // Scope bookkeeping
    // --------------------------------------------------------------------

    fn declare(
        &mut self,
        name: &str,
        kind: DeclarationKind,
        node_id: Option<etna_ir::id::NodeId>,
        location: Option<Span>,
    ) -> Result<(), LowerError> {
        match self.scopes.declare(name, kind, node_id) {
            Ok(_) => Ok(()),
            Err(Redeclaration) => {
                if self.strict {
                    Err(LowerError::Scope {
                        name: name.to_string(),
                        violation: ScopeViolation::Redeclared,
                        location,
                    })
                } else {
                    self.warnings.push(Warning::new(
                        format!("redeclaration of identifier `{name}`"),
                        location,
                    ));
                    Ok(())
                }
            }
        }
    }

    fn reference(&mut self, name: &str, location: Option<Span>) -> Result<(), LowerError> {
        if self.scopes.resolves(name) {
            return Ok(());
        }
        if self.strict {
            return Err(LowerError::Scope {
                name: name.to_string(),
                violation: ScopeViolation::Undeclared,
                location,
            });
        }
        self.warnings.push(Warning::new(
            format!("use of undeclared identifier `{name}`"),
            location,
        ));
        Ok(())
    }

    fn hoist_functions(&mut self, stmts: &[ast::Stmt]) -> Result<(), LowerError> {
        for stmt in stmts {
            if let ast::Stmt::FunctionDeclaration(f) = stmt {
                self.declare(
                    &f.id.name,
                    DeclarationKind::Function,
                    None,
                    span_of(f.loc),
                )?;
            }
        }
        Ok(())
    }

    fn next_destructure(&mut self) -> String {
        self.destructure_counter += 1;
        format!("_destructure_{}", self.destructure_counter)
    }

    // --------------------------------------------------------------------
    // Statements
    // --------------------------------------------------------------------

    #[allow(clippy::too_many_lines)]
    fn lower_stmt_into(
        &mut self,
        stmt: &ast::Stmt,
        out: &mut Vec<Stmt>,
    ) -> Result<(), LowerError> {
        match stmt {
            ast::Stmt::FunctionDeclaration(f) => {
                let lowered = self.lower_function(
                    &f.id.name,
                    &f.params,
                    &f.body,
                    span_of(f.loc),
                    &FunctionForm::Declaration,
                )?;
                out.push(Stmt::FunctionDecl(Box::new(lowered)));
            }
            ast::Stmt::VariableDeclaration(decl) => {
                for declarator in &decl.declarations {
                    self.lower_declarator(decl.kind, declarator, out)?;
                }
            }
            ast::Stmt::ExpressionStatement(s) => {
                let location = span_of(s.loc);
                let expression = match &s.expression {
                    ast::Expr::UpdateExpression(u) => self.lower_update(u)?,
                    other => self.lower_expr(other)?,
                };
                out.push(Stmt::ExpressionStmt(Box::new(
                    self.builder.expression_stmt(expression, location)?,
                )));
            }
            ast::Stmt::BlockStatement(b) => {
                let block = self.lower_block(b)?;
                out.push(Stmt::Block(Box::new(block)));
            }
            ast::Stmt::ReturnStatement(r) => {
                let value = r.argument.as_ref().map(|e| self.lower_expr(e)).transpose()?;
                out.push(Stmt::Return(Box::new(
                    self.builder.return_stmt(value, span_of(r.loc))?,
                )));
            }
            ast::Stmt::IfStatement(s) => {
                let condition = self.lower_expr(&s.test)?;
                let consequent = self.lower_stmt_as_block(&s.consequent)?;
                let alternate = s
                    .alternate
                    .as_ref()
                    .map(|alt| self.lower_stmt_as_block(alt))
                    .transpose()?;
                out.push(Stmt::If(Box::new(self.builder.if_stmt(
                    condition,
                    consequent,
                    alternate,
                    span_of(s.loc),
                )?)));
            }
            ast::Stmt::WhileStatement(s) => {
                let condition = self.lower_expr(&s.test)?;
                let body = self.lower_stmt_as_block(&s.body)?;
                out.push(Stmt::While(Box::new(self.builder.while_stmt(
                    condition,
                    body,
                    span_of(s.loc),
                )?)));
            }
            ast::Stmt::DoWhileStatement(s) => {
                let body = self.lower_stmt_as_block(&s.body)?;
                let condition = self.lower_expr(&s.test)?;
                out.push(Stmt::DoWhile(Box::new(self.builder.do_while_stmt(
                    body,
                    condition,
                    span_of(s.loc),
                )?)));
            }
            ast::Stmt::ForStatement(s) => {
                self.scopes.push();
                let init = s.init.as_ref().map(|i| self.lower_for_init(i)).transpose()?;
                let test = match &s.test {
                    Some(test) => self.lower_expr(test)?,
                    // A missing test slot means "loop forever".
                    None => Expr::Literal(Box::new(
                        self.builder.literal(LiteralValue::Bool(true), span_of(s.loc))?,
                    )),
                };
                let update = s
                    .update
                    .as_ref()
                    .map(|u| self.lower_for_update(u))
                    .transpose()?;
                let body = self.lower_stmt_as_block(&s.body)?;
                self.scopes.pop();
                out.push(Stmt::For(Box::new(self.builder.for_stmt(
                    init,
                    test,
                    update,
                    body,
                    span_of(s.loc),
                )?)));
            }
            ast::Stmt::SwitchStatement(s) => {
                let discriminant = self.lower_expr(&s.discriminant)?;
                self.scopes.push();
                let mut cases = Vec::with_capacity(s.cases.len());
                for case in &s.cases {
                    let test = case.test.as_ref().map(|t| self.lower_expr(t)).transpose()?;
                    let mut body = Vec::new();
                    for stmt in &case.consequent {
                        self.lower_stmt_into(stmt, &mut body)?;
                    }
                    cases.push(self.builder.case(test, body, span_of(case.loc))?);
                }
                self.scopes.pop();
                out.push(Stmt::Switch(Box::new(self.builder.switch_stmt(
                    discriminant,
                    cases,
                    span_of(s.loc),
                )?)));
            }
            ast::Stmt::BreakStatement(s) => {
                if s.label.is_some() {
                    return Err(LowerError::UnsupportedConstruct {
                        construct: "labeled break".to_string(),
                        location: span_of(s.loc),
                    });
                }
                out.push(Stmt::Break(Box::new(
                    self.builder.break_stmt(span_of(s.loc))?,
                )));
            }
            ast::Stmt::ContinueStatement(s) => {
                if s.label.is_some() {
                    return Err(LowerError::UnsupportedConstruct {
                        construct: "labeled continue".to_string(),
                        location: span_of(s.loc),
                    });
                }
                out.push(Stmt::Continue(Box::new(
                    self.builder.continue_stmt(span_of(s.loc))?,
                )));
            }
            ast::Stmt::EmptyStatement(_) => {}
        }
        Ok(())
    }

    /// The normalizer guarantees block bodies; wrap defensively anyway so
    /// un-normalized input still lowers to the invariant shape.
    fn lower_stmt_as_block(&mut self, stmt: &ast::Stmt) -> Result<Block, LowerError> {
        if let ast::Stmt::BlockStatement(b) = stmt {
            return self.lower_block(b);
        }
        self.scopes.push();
        let mut body = Vec::new();
        self.lower_stmt_into(stmt, &mut body)?;
        self.scopes.pop();
        Ok(self.builder.block(body, None)?)
    }

    fn lower_block(&mut self, block: &ast::BlockStatement) -> Result<Block, LowerError> {
        self.scopes.push();
        self.hoist_functions(&block.body)?;
        let mut body = Vec::new();
        for stmt in &block.body {
            self.lower_stmt_into(stmt, &mut body)?;
        }
        self.scopes.pop();
        Ok(self.builder.block(body, span_of(block.loc))?)
    }

    fn lower_for_init(&mut self, init: &ast::ForInit) -> Result<Stmt, LowerError> {
        match init {
            ast::ForInit::Declaration(decl) => {
                if decl.declarations.len() != 1 {
                    return Err(LowerError::UnsupportedConstruct {
                        construct: "multiple declarators in for-loop init".to_string(),
                        location: span_of(decl.loc),
                    });
                }
                let mut out = Vec::new();
                self.lower_declarator(decl.kind, &decl.declarations[0], &mut out)?;
                if out.len() != 1 {
                    return Err(LowerError::UnsupportedConstruct {
                        construct: "destructuring in for-loop init".to_string(),
                        location: span_of(decl.loc),
                    });
                }
                Ok(out.remove(0))
            }
            ast::ForInit::Expression(e) => {
                let expression = match e.as_ref() {
                    ast::Expr::UpdateExpression(u) => self.lower_update(u)?,
                    other => self.lower_expr(other)?,
                };
                Ok(Stmt::ExpressionStmt(Box::new(
                    self.builder.expression_stmt(expression, None)?,
                )))
            }
        }
    }

    fn lower_for_update(&mut self, update: &ast::Expr) -> Result<Expr, LowerError> {
        match update {
            ast::Expr::UpdateExpression(u) => self.lower_update(u),
            other => self.lower_expr(other),
        }
    }

    // --------------------------------------------------------------------
    // Declarations and destructuring
    // --------------------------------------------------------------------

    fn lower_declarator(
        &mut self,
        kind: ast::DeclKind,
        declarator: &ast::VariableDeclarator,
        out: &mut Vec<Stmt>,
    ) -> Result<(), LowerError> {
        let location = span_of(declarator.loc);
        let init = declarator
            .init
            .as_ref()
            .map(|e| self.lower_expr(e))
            .transpose()?;
        match &declarator.id {
            ast::Pattern::Identifier(id) => {
                let init_ty = init.as_ref().and_then(|e| e.ty().cloned());
                let mut decl = self.builder.var_decl(&id.name, kind.as_str(), init, location)?;
                decl.ty = init_ty;
                self.declare(
                    &id.name,
                    decl_kind(kind),
                    Some(decl.id.clone()),
                    location,
                )?;
                out.push(Stmt::VarDecl(Box::new(decl)));
            }
            pattern => {
                let Some(init) = init else {
                    return Err(LowerError::Pattern {
                        reason: "destructuring declaration requires an initializer".to_string(),
                        location,
                    });
                };
                let temp = self.next_destructure();
                let mut decl =
                    self.builder.var_decl(&temp, kind.as_str(), Some(init), location)?;
                decl.metadata.set_flag(metadata::IS_SYNTHETIC);
                self.declare(&temp, decl_kind(kind), Some(decl.id.clone()), location)?;
                out.push(Stmt::VarDecl(Box::new(decl)));
                self.bind_pattern(pattern, kind, &Slot::Ident(temp), location, out)?;
            }
        }
        Ok(())
    }

    fn slot_expr(&mut self, slot: &Slot, location: Option<Span>) -> Result<Expr, LowerError> {
        match slot {
            Slot::Ident(name) => Ok(Expr::Identifier(Box::new(
                self.builder.identifier(name, location)?,
            ))),
            Slot::Element { base, index } => {
                let object = Expr::Identifier(Box::new(self.builder.identifier(base, location)?));
                #[allow(clippy::cast_precision_loss)]
                let index = Expr::Literal(Box::new(
                    self.builder
                        .literal(LiteralValue::Number(*index as f64), location)?,
                ));
                Ok(Expr::Member(Box::new(
                    self.builder.member(object, index, true, location)?,
                )))
            }
        }
    }

    /// Binds one pattern against a re-materializable slot, appending one
    /// `VarDecl` per bound name.
    fn bind_pattern(
        &mut self,
        pattern: &ast::Pattern,
        kind: ast::DeclKind,
        slot: &Slot,
        location: Option<Span>,
        out: &mut Vec<Stmt>,
    ) -> Result<(), LowerError> {
        match pattern {
            ast::Pattern::Identifier(id) => {
                let value = self.slot_expr(slot, location)?;
                let decl = self
                    .builder
                    .var_decl(&id.name, kind.as_str(), Some(value), location)?;
                self.declare(&id.name, decl_kind(kind), Some(decl.id.clone()), location)?;
                out.push(Stmt::VarDecl(Box::new(decl)));
            }
            ast::Pattern::AssignmentPattern(assignment) => {
                // `[x = d]` binds x to `slot == null ? d : slot`.
                let probe = self.slot_expr(slot, location)?;
                let null = Expr::Literal(Box::new(
                    self.builder.literal(LiteralValue::Null, location)?,
                ));
                let mut test = self
                    .builder
                    .binary(BinaryOperator::Eq, probe, null, location)?;
                test.ty = Some(Type::Boolean);
                let default = self.lower_expr(&assignment.right)?;
                let fallback = self.slot_expr(slot, location)?;
                let value = Expr::Conditional(Box::new(self.builder.conditional(
                    Expr::BinaryOp(Box::new(test)),
                    default,
                    fallback,
                    location,
                )?));
                match assignment.left.as_ref() {
                    ast::Pattern::Identifier(id) => {
                        let decl = self
                            .builder
                            .var_decl(&id.name, kind.as_str(), Some(value), location)?;
                        self.declare(
                            &id.name,
                            decl_kind(kind),
                            Some(decl.id.clone()),
                            location,
                        )?;
                        out.push(Stmt::VarDecl(Box::new(decl)));
                    }
                    nested => {
                        let temp = self.next_destructure();
                        let mut decl =
                            self.builder
                                .var_decl(&temp, kind.as_str(), Some(value), location)?;
                        decl.metadata.set_flag(metadata::IS_SYNTHETIC);
                        self.declare(&temp, decl_kind(kind), Some(decl.id.clone()), location)?;
                        out.push(Stmt::VarDecl(Box::new(decl)));
                        self.bind_pattern(nested, kind, &Slot::Ident(temp), location, out)?;
                    }
                }
            }
            ast::Pattern::ArrayPattern(array) => {
                let base = match slot {
                    Slot::Ident(name) => name.clone(),
                    element => {
                        let temp = self.next_destructure();
                        let value = self.slot_expr(element, location)?;
                        let mut decl =
                            self.builder
                                .var_decl(&temp, kind.as_str(), Some(value), location)?;
                        decl.metadata.set_flag(metadata::IS_SYNTHETIC);
                        self.declare(&temp, decl_kind(kind), Some(decl.id.clone()), location)?;
                        out.push(Stmt::VarDecl(Box::new(decl)));
                        temp
                    }
                };
                let last = array.elements.len().saturating_sub(1);
                for (index, element) in array.elements.iter().enumerate() {
                    let Some(element) = element else { continue };
                    if let ast::Pattern::RestElement(rest) = element {
                        if index != last {
                            return Err(LowerError::Pattern {
                                reason: "rest element must be last in an array pattern"
                                    .to_string(),
                                location,
                            });
                        }
                        let ast::Pattern::Identifier(id) = rest.argument.as_ref() else {
                            return Err(LowerError::Pattern {
                                reason: "rest element must bind an identifier".to_string(),
                                location,
                            });
                        };
                        let value = self.slice_from(&base, index, location)?;
                        let decl = self
                            .builder
                            .var_decl(&id.name, kind.as_str(), Some(value), location)?;
                        self.declare(
                            &id.name,
                            decl_kind(kind),
                            Some(decl.id.clone()),
                            location,
                        )?;
                        out.push(Stmt::VarDecl(Box::new(decl)));
                        continue;
                    }
                    self.bind_pattern(
                        element,
                        kind,
                        &Slot::Element {
                            base: base.clone(),
                            index,
                        },
                        location,
                        out,
                    )?;
                }
            }
            ast::Pattern::RestElement(_) => {
                return Err(LowerError::Pattern {
                    reason: "rest element outside an array pattern".to_string(),
                    location,
                });
            }
            ast::Pattern::ObjectPattern(_) => {
                return Err(LowerError::Pattern {
                    reason: "object patterns are not supported".to_string(),
                    location,
                });
            }
        }
        Ok(())
    }

    /// Builds `<base>.slice(<from>)`.
    fn slice_from(
        &mut self,
        base: &str,
        from: usize,
        location: Option<Span>,
    ) -> Result<Expr, LowerError> {
        let object = Expr::Identifier(Box::new(self.builder.identifier(base, location)?));
        let property = Expr::Identifier(Box::new(self.builder.identifier("slice", location)?));
        let callee = Expr::Member(Box::new(
            self.builder.member(object, property, false, location)?,
        ));
        #[allow(clippy::cast_precision_loss)]
        let from = Expr::Literal(Box::new(
            self.builder
                .literal(LiteralValue::Number(from as f64), location)?,
        ));
        Ok(Expr::Call(Box::new(
            self.builder.call(callee, vec![from], false, location)?,
        )))
    }

    // --------------------------------------------------------------------
    // Functions
    // --------------------------------------------------------------------

    fn lower_function(
        &mut self,
        name: &str,
        params: &[ast::Pattern],
        body: &ast::BlockStatement,
        location: Option<Span>,
        form: &FunctionForm,
    ) -> Result<FunctionDecl, LowerError> {
        if self.cancel.is_requested() {
            return Err(LowerError::Cancelled);
        }
        let saved_counter = std::mem::replace(&mut self.destructure_counter, 0);
        self.scopes.push();

        let mut parameters: Vec<Parameter> = Vec::with_capacity(params.len());
        let mut prologue: Vec<Stmt> = Vec::new();
        let last = params.len().saturating_sub(1);
        for (index, pattern) in params.iter().enumerate() {
            match pattern {
                ast::Pattern::Identifier(id) => {
                    let param = self.builder.parameter(&id.name, false, span_of(id.loc))?;
                    self.declare(
                        &id.name,
                        DeclarationKind::Parameter,
                        Some(param.id.clone()),
                        span_of(id.loc),
                    )?;
                    parameters.push(param);
                }
                ast::Pattern::RestElement(rest) => {
                    if index != last {
                        return Err(LowerError::Pattern {
                            reason: "rest parameter must be last".to_string(),
                            location: span_of(rest.loc),
                        });
                    }
                    let ast::Pattern::Identifier(id) = rest.argument.as_ref() else {
                        return Err(LowerError::Pattern {
                            reason: "rest parameter must bind an identifier".to_string(),
                            location: span_of(rest.loc),
                        });
                    };
                    let param = self.builder.parameter(&id.name, true, span_of(rest.loc))?;
                    self.declare(
                        &id.name,
                        DeclarationKind::Parameter,
                        Some(param.id.clone()),
                        span_of(rest.loc),
                    )?;
                    parameters.push(param);
                }
                ast::Pattern::ArrayPattern(_) | ast::Pattern::AssignmentPattern(_) => {
                    let synthetic = self.next_destructure();
                    let param = self.builder.parameter(&synthetic, false, location)?;
                    self.declare(
                        &synthetic,
                        DeclarationKind::Parameter,
                        Some(param.id.clone()),
                        location,
                    )?;
                    parameters.push(param);
                    self.bind_pattern(
                        pattern,
                        ast::DeclKind::Let,
                        &Slot::Ident(synthetic),
                        location,
                        &mut prologue,
                    )?;
                }
                ast::Pattern::ObjectPattern(p) => {
                    return Err(LowerError::Pattern {
                        reason: "object patterns are not supported".to_string(),
                        location: span_of(p.loc),
                    });
                }
            }
        }

        self.hoist_functions(&body.body)?;
        let mut statements = prologue;
        for stmt in &body.body {
            self.lower_stmt_into(stmt, &mut statements)?;
        }
        self.scopes.pop();
        self.destructure_counter = saved_counter;

        let block = self.builder.block(statements, span_of(body.loc))?;
        let lowered = match form {
            FunctionForm::Declaration => {
                self.builder.function_decl(name, parameters, block, location)?
            }
            FunctionForm::Expression => {
                self.builder
                    .function_expr(name, parameters, block, false, location)?
            }
            FunctionForm::Arrow => {
                self.builder
                    .function_expr(name, parameters, block, true, location)?
            }
        };
        Ok(lowered)
    }

    // --------------------------------------------------------------------
    // Expressions
    // --------------------------------------------------------------------

    #[allow(clippy::too_many_lines)]
    fn lower_expr(&mut self, expr: &ast::Expr) -> Result<Expr, LowerError> {
        match expr {
            ast::Expr::Identifier(id) => {
                let location = span_of(id.loc);
                if id.name == "undefined" {
                    let mut literal = self.builder.literal(LiteralValue::Null, location)?;
                    literal.metadata.set_flag(metadata::IS_UNDEFINED);
                    return Ok(Expr::Literal(Box::new(literal)));
                }
                self.reference(&id.name, location)?;
                Ok(Expr::Identifier(Box::new(
                    self.builder.identifier(&id.name, location)?,
                )))
            }
            ast::Expr::Literal(lit) => {
                let value = match &lit.value {
                    ast::LiteralValue::Null => LiteralValue::Null,
                    ast::LiteralValue::Bool(b) => LiteralValue::Bool(*b),
                    ast::LiteralValue::Number(n) => LiteralValue::Number(*n),
                    ast::LiteralValue::Str(s) => LiteralValue::Str(s.clone()),
                };
                Ok(Expr::Literal(Box::new(
                    self.builder.literal(value, span_of(lit.loc))?,
                )))
            }
            ast::Expr::TemplateLiteral(t) => self.lower_template(t),
            ast::Expr::BinaryExpression(b) | ast::Expr::LogicalExpression(b) => {
                let location = span_of(b.loc);
                let (operator, strict) = map_binary_operator(&b.operator, location)?;
                let left = self.lower_expr(&b.left)?;
                let right = self.lower_expr(&b.right)?;
                let mut node = self.builder.binary(operator, left, right, location)?;
                if strict {
                    node.metadata.set_flag(metadata::IS_STRICT);
                }
                node.ty = infer_binary_type(&node);
                Ok(Expr::BinaryOp(Box::new(node)))
            }
            ast::Expr::UnaryExpression(u) => {
                let location = span_of(u.loc);
                let operator = match u.operator.as_str() {
                    "!" => UnaryOperator::Not,
                    "-" => UnaryOperator::Neg,
                    other => {
                        return Err(LowerError::UnsupportedConstruct {
                            construct: format!("unary operator `{other}`"),
                            location,
                        });
                    }
                };
                let operand = self.lower_expr(&u.argument)?;
                let mut node = self.builder.unary(operator, operand, location)?;
                node.ty = match operator {
                    UnaryOperator::Not => Some(Type::Boolean),
                    UnaryOperator::Neg => match node.operand.ty() {
                        Some(Type::Number) => Some(Type::Number),
                        _ => None,
                    },
                };
                Ok(Expr::UnaryOp(Box::new(node)))
            }
            ast::Expr::UpdateExpression(u) => Err(LowerError::UnsupportedConstruct {
                construct: "update expression in value position".to_string(),
                location: span_of(u.loc),
            }),
            ast::Expr::AssignmentExpression(a) => {
                let location = span_of(a.loc);
                let Some(operator) = AssignOperator::from_str(&a.operator) else {
                    return Err(LowerError::UnsupportedConstruct {
                        construct: format!("assignment operator `{}`", a.operator),
                        location,
                    });
                };
                let target = self.lower_expr(&a.left)?;
                let value = self.lower_expr(&a.right)?;
                Ok(Expr::Assignment(Box::new(
                    self.builder.assignment(operator, target, value, location)?,
                )))
            }
            ast::Expr::ConditionalExpression(c) => {
                let location = span_of(c.loc);
                let condition = self.lower_expr(&c.test)?;
                let consequent = self.lower_expr(&c.consequent)?;
                let alternate = self.lower_expr(&c.alternate)?;
                let mut node = self
                    .builder
                    .conditional(condition, consequent, alternate, location)?;
                node.ty = match (node.consequent.ty(), node.alternate.ty()) {
                    (Some(a), Some(b)) => Some(a.clone().union_with(b.clone())),
                    _ => None,
                };
                Ok(Expr::Conditional(Box::new(node)))
            }
            ast::Expr::CallExpression(c) => {
                let location = span_of(c.loc);
                let callee = self.lower_expr(&c.callee)?;
                let arguments = c
                    .arguments
                    .iter()
                    .map(|a| self.lower_expr(a))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expr::Call(Box::new(
                    self.builder.call(callee, arguments, false, location)?,
                )))
            }
            ast::Expr::NewExpression(n) => {
                let location = span_of(n.loc);
                let callee = self.lower_expr(&n.callee)?;
                let arguments = n
                    .arguments
                    .iter()
                    .map(|a| self.lower_expr(a))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expr::Call(Box::new(
                    self.builder.call(callee, arguments, true, location)?,
                )))
            }
            ast::Expr::MemberExpression(m) => {
                let location = span_of(m.loc);
                let object = self.lower_expr(&m.object)?;
                let property = if m.computed {
                    self.lower_expr(&m.property)?
                } else {
                    let ast::Expr::Identifier(id) = m.property.as_ref() else {
                        return Err(LowerError::UnsupportedConstruct {
                            construct: "non-identifier member property".to_string(),
                            location,
                        });
                    };
                    Expr::Identifier(Box::new(
                        self.builder.identifier(&id.name, span_of(id.loc))?,
                    ))
                };
                Ok(Expr::Member(Box::new(
                    self.builder.member(object, property, m.computed, location)?,
                )))
            }
            ast::Expr::ArrayExpression(a) => {
                let location = span_of(a.loc);
                let mut elements = Vec::with_capacity(a.elements.len());
                for element in &a.elements {
                    let Some(element) = element else {
                        return Err(LowerError::UnsupportedConstruct {
                            construct: "array hole".to_string(),
                            location,
                        });
                    };
                    elements.push(self.lower_expr(element)?);
                }
                let element_ty = common_type(&elements).unwrap_or(Type::Unknown);
                let mut node = self.builder.array_literal(elements, location)?;
                node.ty = Some(Type::array(element_ty));
                Ok(Expr::ArrayLiteral(Box::new(node)))
            }
            ast::Expr::ObjectExpression(o) => {
                let location = span_of(o.loc);
                let mut properties = Vec::with_capacity(o.properties.len());
                let mut fields = std::collections::BTreeMap::new();
                for property in &o.properties {
                    let value = self.lower_expr(&property.value)?;
                    let is_method = property.method
                        || matches!(value, Expr::FunctionDecl(_));
                    let key = property.key.as_name();
                    fields.insert(
                        key.clone(),
                        value.ty().cloned().unwrap_or(Type::Unknown),
                    );
                    properties.push(self.builder.property(
                        key,
                        value,
                        is_method,
                        span_of(property.loc),
                    )?);
                }
                let mut node = self.builder.object_literal(properties, location)?;
                node.ty = Some(Type::Object {
                    fields,
                    open: false,
                });
                Ok(Expr::ObjectLiteral(Box::new(node)))
            }
            ast::Expr::ArrowFunctionExpression(arrow) => {
                let body = match &arrow.body {
                    ast::ArrowBody::Block(block) => block.clone(),
                    // The normalizer rewrites expression bodies; mirror it
                    // here for un-normalized input.
                    ast::ArrowBody::Expression(e) => ast::BlockStatement {
                        body: vec![ast::Stmt::ReturnStatement(ast::ReturnStatement {
                            argument: Some(e.as_ref().clone()),
                            loc: arrow.loc,
                        })],
                        loc: arrow.loc,
                    },
                };
                let lowered = self.lower_function(
                    "",
                    &arrow.params,
                    &body,
                    span_of(arrow.loc),
                    &FunctionForm::Arrow,
                )?;
                Ok(Expr::FunctionDecl(Box::new(lowered)))
            }
            ast::Expr::FunctionExpression(f) => {
                let name = f.id.as_ref().map(|id| id.name.as_str()).unwrap_or_default();
                let lowered = self.lower_function(
                    name,
                    &f.params,
                    &f.body,
                    span_of(f.loc),
                    &FunctionForm::Expression,
                )?;
                Ok(Expr::FunctionDecl(Box::new(lowered)))
            }
        }
    }

    /// Template literals lower to a left-associated `+` chain over string
    /// literals and expressions, each node flagged `isConcatenation` and
    /// typed `string`.
    fn lower_template(&mut self, template: &ast::TemplateLiteral) -> Result<Expr, LowerError> {
        let location = span_of(template.loc);
        let head_text = template
            .quasis
            .first()
            .map(ast::TemplateElement::text)
            .unwrap_or_default()
            .to_string();
        let mut acc = Expr::Literal(Box::new(
            self.builder.literal(LiteralValue::Str(head_text), location)?,
        ));
        if template.expressions.is_empty() {
            return Ok(acc);
        }
        for (index, expression) in template.expressions.iter().enumerate() {
            let lowered = self.lower_expr(expression)?;
            acc = self.concat(acc, lowered, location)?;
            if let Some(quasi) = template.quasis.get(index + 1) {
                let text = quasi.text();
                if !text.is_empty() {
                    let lit = Expr::Literal(Box::new(
                        self.builder
                            .literal(LiteralValue::Str(text.to_string()), location)?,
                    ));
                    acc = self.concat(acc, lit, location)?;
                }
            }
        }
        Ok(acc)
    }

    fn concat(
        &mut self,
        left: Expr,
        right: Expr,
        location: Option<Span>,
    ) -> Result<Expr, LowerError> {
        let mut node = self
            .builder
            .binary(BinaryOperator::Add, left, right, location)?;
        node.metadata.set_flag(metadata::IS_CONCATENATION);
        node.ty = Some(Type::String);
        Ok(Expr::BinaryOp(Box::new(node)))
    }

    /// `i++`/`--i` in statement or for-update position becomes a compound
    /// assignment.
    fn lower_update(&mut self, update: &ast::UpdateExpression) -> Result<Expr, LowerError> {
        let location = span_of(update.loc);
        let operator = match update.operator.as_str() {
            "++" => AssignOperator::AddAssign,
            "--" => AssignOperator::SubAssign,
            other => {
                return Err(LowerError::UnsupportedConstruct {
                    construct: format!("update operator `{other}`"),
                    location,
                });
            }
        };
        let target = self.lower_expr(&update.argument)?;
        let one = Expr::Literal(Box::new(
            self.builder.literal(LiteralValue::Number(1.0), location)?,
        ));
        Ok(Expr::Assignment(Box::new(
            self.builder.assignment(operator, target, one, location)?,
        )))
    }
}

fn decl_kind(kind: ast::DeclKind) -> DeclarationKind {
    match kind {
        ast::DeclKind::Let => DeclarationKind::Let,
        ast::DeclKind::Const => DeclarationKind::Const,
        ast::DeclKind::Var => DeclarationKind::Var,
    }
}

fn map_binary_operator(
    raw: &str,
    location: Option<Span>,
) -> Result<(BinaryOperator, bool), LowerError> {
    let (operator, strict) = match raw {
        "===" => (BinaryOperator::Eq, true),
        "!==" => (BinaryOperator::Ne, true),
        other => match BinaryOperator::from_str(other) {
            Some(op) => (op, false),
            None => {
                return Err(LowerError::UnsupportedConstruct {
                    construct: format!("binary operator `{other}`"),
                    location,
                });
            }
        },
    };
    Ok((operator, strict))
}

fn infer_binary_type(node: &etna_ir::nodes::BinaryOp) -> Option<Type> {
    let op = node.operator;
    if op.is_comparison() || op.is_logical() {
        return Some(Type::Boolean);
    }
    let left = node.left.ty();
    let right = node.right.ty();
    if op == BinaryOperator::Add
        && (left.is_some_and(Type::is_string) || right.is_some_and(Type::is_string))
    {
        return Some(Type::String);
    }
    if op.is_arithmetic()
        && left.is_some_and(Type::is_number)
        && right.is_some_and(Type::is_number)
    {
        return Some(Type::Number);
    }
    None
}

fn common_type(elements: &[Expr]) -> Option<Type> {
    let mut iter = elements.iter();
    let mut acc = iter.next()?.ty()?.clone();
    for element in iter {
        acc = acc.union_with(element.ty()?.clone());
    }
    Some(acc)
}
