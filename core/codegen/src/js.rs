//! JavaScript emission.
//!
//! A near-identity printer: operator form, block structure, and declaration
//! kinds survive unchanged. Strict equality is restored from the `isStrict`
//! flag, constructor calls from `isNew`, arrow syntax from `isArrow`.
//! Trailing semicolons and indent width are configurable.

use etna_ir::cancel::Cancellation;
use etna_ir::metadata;
use etna_ir::nodes::{
    BinaryOp, BinaryOperator, Block, Expr, FunctionDecl, If, LiteralValue, Program, Stmt, Switch,
    UnaryOperator, VarDecl,
};

use crate::errors::EmitError;
use crate::{Emission, fmt_number};

/// Options for the JavaScript backend.
#[derive(Debug, Clone)]
pub struct JsOptions {
    pub semicolons: bool,
    pub indent: usize,
}

impl Default for JsOptions {
    fn default() -> Self {
        Self {
            semicolons: true,
            indent: 2,
        }
    }
}

/// Emits a validated program as JavaScript source.
///
/// # Errors
///
/// Fails only on [`EmitError::Cancelled`]; every IR construct has a
/// JavaScript rendering.
pub fn emit(
    program: &Program,
    options: &JsOptions,
    cancel: &Cancellation,
) -> Result<Emission<String>, EmitError> {
    let mut emitter = JsEmitter {
        options: options.clone(),
        out: String::new(),
        depth: 0,
        cancel,
    };
    emitter.emit_stmts(&program.body)?;
    Ok(Emission {
        output: emitter.out,
        warnings: Vec::new(),
    })
}

struct JsEmitter<'a> {
    options: JsOptions,
    out: String,
    depth: usize,
    cancel: &'a Cancellation,
}

impl JsEmitter<'_> {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth * self.options.indent {
            self.out.push(' ');
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn stmt_line(&mut self, text: &str) {
        if self.options.semicolons {
            self.line(&format!("{text};"));
        } else {
            self.line(text);
        }
    }

    fn indent(&self) -> String {
        " ".repeat(self.depth * self.options.indent)
    }

    fn emit_stmts(&mut self, stmts: &[Stmt]) -> Result<(), EmitError> {
        for stmt in stmts {
            self.emit_stmt(stmt)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    fn emit_stmt(&mut self, stmt: &Stmt) -> Result<(), EmitError> {
        match stmt {
            Stmt::FunctionDecl(f) => {
                if self.cancel.is_requested() {
                    return Err(EmitError::Cancelled);
                }
                let header = format!("function {}({}) {{", f.name, render_params(f));
                self.line(&header);
                self.emit_block_body(&f.body)?;
                self.line("}");
                Ok(())
            }
            Stmt::VarDecl(decl) => {
                let rendered = self.render_var_decl(decl)?;
                self.stmt_line(&rendered);
                Ok(())
            }
            Stmt::Block(b) => {
                self.line("{");
                self.emit_block_body(b)?;
                self.line("}");
                Ok(())
            }
            Stmt::Return(r) => {
                match &r.value {
                    Some(value) => {
                        let value = self.expr(value, prec::LOWEST)?;
                        self.stmt_line(&format!("return {value}"));
                    }
                    None => self.stmt_line("return"),
                }
                Ok(())
            }
            Stmt::If(s) => self.emit_if(s),
            Stmt::While(s) => {
                let condition = self.expr(&s.condition, prec::LOWEST)?;
                self.line(&format!("while ({condition}) {{"));
                self.emit_block_body(&s.body)?;
                self.line("}");
                Ok(())
            }
            Stmt::DoWhile(s) => {
                self.line("do {");
                self.emit_block_body(&s.body)?;
                let condition = self.expr(&s.condition, prec::LOWEST)?;
                self.stmt_line(&format!("}} while ({condition})"));
                Ok(())
            }
            Stmt::For(s) => {
                let init = match &s.init {
                    Some(init) => self.render_inline_stmt(init)?,
                    None => String::new(),
                };
                let test = self.expr(&s.test, prec::LOWEST)?;
                let update = match &s.update {
                    Some(update) => self.expr(update, prec::LOWEST)?,
                    None => String::new(),
                };
                self.line(&format!("for ({init}; {test}; {update}) {{"));
                self.emit_block_body(&s.body)?;
                self.line("}");
                Ok(())
            }
            Stmt::Switch(s) => self.emit_switch(s),
            Stmt::Break(_) => {
                self.stmt_line("break");
                Ok(())
            }
            Stmt::Continue(_) => {
                self.stmt_line("continue");
                Ok(())
            }
            Stmt::ExpressionStmt(s) => {
                let rendered = self.expr(&s.expression, prec::LOWEST)?;
                self.stmt_line(&rendered);
                Ok(())
            }
        }
    }

    fn render_var_decl(&mut self, decl: &VarDecl) -> Result<String, EmitError> {
        let kind = decl.declaration_kind().unwrap_or("let");
        Ok(match &decl.init {
            Some(init) => {
                let init = self.expr(init, prec::ASSIGN)?;
                format!("{kind} {} = {init}", decl.name)
            }
            None => format!("{kind} {}", decl.name),
        })
    }

    /// Renders a statement without indentation or terminator, for `for`
    /// init slots.
    fn render_inline_stmt(&mut self, stmt: &Stmt) -> Result<String, EmitError> {
        match stmt {
            Stmt::VarDecl(decl) => self.render_var_decl(decl),
            Stmt::ExpressionStmt(s) => self.expr(&s.expression, prec::LOWEST),
            other => Err(EmitError::Internal {
                reason: format!("{} in for-loop init slot", other.kind()),
            }),
        }
    }

    fn emit_block_body(&mut self, block: &Block) -> Result<(), EmitError> {
        self.depth += 1;
        self.emit_stmts(&block.statements)?;
        self.depth -= 1;
        Ok(())
    }

    fn emit_if(&mut self, s: &If) -> Result<(), EmitError> {
        let condition = self.expr(&s.condition, prec::LOWEST)?;
        self.line(&format!("if ({condition}) {{"));
        self.emit_block_body(&s.consequent)?;
        let mut alternate = s.alternate.as_ref();
        while let Some(block) = alternate {
            if let [Stmt::If(nested)] = block.statements.as_slice() {
                let condition = self.expr(&nested.condition, prec::LOWEST)?;
                self.line(&format!("}} else if ({condition}) {{"));
                self.emit_block_body(&nested.consequent)?;
                alternate = nested.alternate.as_ref();
            } else {
                self.line("} else {");
                self.emit_block_body(block)?;
                alternate = None;
            }
        }
        self.line("}");
        Ok(())
    }

    fn emit_switch(&mut self, s: &Switch) -> Result<(), EmitError> {
        let discriminant = self.expr(&s.discriminant, prec::LOWEST)?;
        self.line(&format!("switch ({discriminant}) {{"));
        self.depth += 1;
        for case in &s.cases {
            match &case.test {
                Some(test) => {
                    let test = self.expr(test, prec::LOWEST)?;
                    self.line(&format!("case {test}:"));
                }
                None => self.line("default:"),
            }
            self.depth += 1;
            self.emit_stmts(&case.body)?;
            self.depth -= 1;
        }
        self.depth -= 1;
        self.line("}");
        Ok(())
    }

    // --------------------------------------------------------------------
    // Expressions
    // --------------------------------------------------------------------

    #[allow(clippy::too_many_lines)]
    fn expr(&mut self, expr: &Expr, min_prec: u8) -> Result<String, EmitError> {
        let my_prec = precedence(expr);
        let rendered = match expr {
            Expr::Identifier(id) => id.name.clone(),
            Expr::Literal(lit) => {
                if lit.metadata.flag(metadata::IS_UNDEFINED) {
                    "undefined".to_string()
                } else {
                    render_literal(&lit.value)
                }
            }
            Expr::BinaryOp(b) => {
                let op_prec = binary_precedence(b.operator);
                let left = self.expr(&b.left, op_prec)?;
                let right = self.expr(&b.right, op_prec + 1)?;
                format!("{left} {} {right}", js_operator(b))
            }
            Expr::UnaryOp(u) => {
                let operand = self.expr(&u.operand, prec::UNARY)?;
                match u.operator {
                    UnaryOperator::Not => format!("!{operand}"),
                    UnaryOperator::Neg => format!("-{operand}"),
                }
            }
            Expr::Call(call) => {
                let callee = self.expr(&call.callee, prec::CALL)?;
                let arguments = call
                    .arguments
                    .iter()
                    .map(|a| self.expr(a, prec::ASSIGN))
                    .collect::<Result<Vec<_>, _>>()?
                    .join(", ");
                if call.metadata.flag(metadata::IS_NEW) {
                    format!("new {callee}({arguments})")
                } else {
                    format!("{callee}({arguments})")
                }
            }
            Expr::Member(m) => {
                let object = self.expr(&m.object, prec::CALL)?;
                if m.computed {
                    let property = self.expr(&m.property, prec::LOWEST)?;
                    format!("{object}[{property}]")
                } else {
                    let Expr::Identifier(name) = &m.property else {
                        return Err(EmitError::Internal {
                            reason: "non-identifier member property".to_string(),
                        });
                    };
                    format!("{object}.{}", name.name)
                }
            }
            Expr::ArrayLiteral(a) => {
                let elements = a
                    .elements
                    .iter()
                    .map(|e| self.expr(e, prec::ASSIGN))
                    .collect::<Result<Vec<_>, _>>()?;
                format!("[{}]", elements.join(", "))
            }
            Expr::ObjectLiteral(o) => {
                let mut fields = Vec::with_capacity(o.properties.len());
                for property in &o.properties {
                    let value = self.expr(&property.value, prec::ASSIGN)?;
                    let key = if is_js_identifier(&property.key) {
                        property.key.clone()
                    } else {
                        render_string(&property.key)
                    };
                    fields.push(format!("{key}: {value}"));
                }
                format!("{{ {} }}", fields.join(", "))
            }
            Expr::Assignment(a) => {
                let target = self.expr(&a.target, prec::CALL)?;
                let value = self.expr(&a.value, prec::ASSIGN)?;
                format!("{target} {} {value}", a.operator)
            }
            Expr::Conditional(c) => {
                let condition = self.expr(&c.condition, prec::OR)?;
                let consequent = self.expr(&c.consequent, prec::ASSIGN)?;
                let alternate = self.expr(&c.alternate, prec::ASSIGN)?;
                format!("{condition} ? {consequent} : {alternate}")
            }
            Expr::FunctionDecl(f) => self.function_expr(f)?,
        };
        if my_prec < min_prec {
            Ok(format!("({rendered})"))
        } else {
            Ok(rendered)
        }
    }

    fn function_expr(&mut self, f: &FunctionDecl) -> Result<String, EmitError> {
        let params = render_params(f);
        let header = if f.is_arrow() {
            format!("({params}) => {{\n")
        } else if f.name.is_empty() {
            format!("function ({params}) {{\n")
        } else {
            format!("function {}({params}) {{\n", f.name)
        };
        let saved_out = std::mem::take(&mut self.out);
        self.depth += 1;
        self.emit_stmts(&f.body.statements)?;
        self.depth -= 1;
        let body = std::mem::replace(&mut self.out, saved_out);
        let mut rendered = header;
        rendered.push_str(&body);
        rendered.push_str(&self.indent());
        rendered.push('}');
        Ok(rendered)
    }
}

mod prec {
    pub const LOWEST: u8 = 0;
    pub const ASSIGN: u8 = 1;
    pub const COND: u8 = 2;
    pub const OR: u8 = 3;
    pub const AND: u8 = 4;
    pub const EQUALITY: u8 = 5;
    pub const RELATIONAL: u8 = 6;
    pub const ADDITIVE: u8 = 7;
    pub const MULTIPLICATIVE: u8 = 8;
    pub const UNARY: u8 = 9;
    pub const CALL: u8 = 10;
    pub const ATOM: u8 = 11;
}

fn binary_precedence(op: BinaryOperator) -> u8 {
    match op {
        BinaryOperator::Or => prec::OR,
        BinaryOperator::And => prec::AND,
        BinaryOperator::Eq | BinaryOperator::Ne => prec::EQUALITY,
        BinaryOperator::Lt | BinaryOperator::Le | BinaryOperator::Gt | BinaryOperator::Ge => {
            prec::RELATIONAL
        }
        BinaryOperator::Add | BinaryOperator::Sub => prec::ADDITIVE,
        BinaryOperator::Mul | BinaryOperator::Div | BinaryOperator::Mod => prec::MULTIPLICATIVE,
    }
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::BinaryOp(b) => binary_precedence(b.operator),
        Expr::UnaryOp(_) => prec::UNARY,
        Expr::Assignment(_) => prec::ASSIGN,
        Expr::Conditional(_) => prec::COND,
        Expr::Call(_) | Expr::Member(_) => prec::CALL,
        _ => prec::ATOM,
    }
}

fn js_operator(b: &BinaryOp) -> String {
    let strict = b.metadata.flag(metadata::IS_STRICT);
    match (b.operator, strict) {
        (BinaryOperator::Eq, true) => "===".to_string(),
        (BinaryOperator::Ne, true) => "!==".to_string(),
        (op, _) => op.as_str().to_string(),
    }
}

fn render_params(f: &FunctionDecl) -> String {
    f.params
        .iter()
        .map(|p| {
            if p.is_rest() {
                format!("...{}", p.name)
            } else {
                p.name.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_literal(value: &LiteralValue) -> String {
    match value {
        LiteralValue::Null => "null".to_string(),
        LiteralValue::Bool(b) => b.to_string(),
        LiteralValue::Number(n) => fmt_number(*n),
        LiteralValue::Str(s) => render_string(s),
    }
}

fn render_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn is_js_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    }
}
