//! Lua 5.1 emission.
//!
//! Key translations:
//!
//! - every declaration kind becomes `local` (Lua has no `const`; collapsed
//!   with a warning);
//! - `===`/`!==` print as `==`/`~=`, `&&`/`||`/`!` as `and`/`or`/`not`;
//! - `+` prints as `..` when either operand is statically string-typed or
//!   the node carries the `isConcatenation` flag, with non-string operands
//!   wrapped in `tostring`; otherwise `+` is preserved;
//! - `console.log(…)` prints as `print(…)`, `null`/`undefined` as `nil`;
//! - `switch` desugars to an `if`/`elseif` chain over a `__switch_<id>`
//!   temporary; `do`/`while` maps to `repeat … until not (…)`;
//! - `continue` has no Lua 5.1 form: strict mode rejects it, otherwise the
//!   loop is rewritten with a `goto __continue_<id>` label and a warning is
//!   raised.

use etna_ir::cancel::Cancellation;
use etna_ir::diagnostics::Warning;
use etna_ir::metadata;
use etna_ir::nodes::{
    BinaryOp, BinaryOperator, Block, Case, Expr, FunctionDecl, If, LiteralValue, Program, Span,
    Stmt, Switch, UnaryOperator, VarDecl,
};
use etna_ir::types::Type;

use crate::errors::EmitError;
use crate::{Emission, fmt_number};

/// Options for the Lua backend.
#[derive(Debug, Clone)]
pub struct LuaOptions {
    pub indent: usize,
    /// Announce `continue` rewrites with a warning.
    pub emit_continue_warning: bool,
    /// Reject `continue` instead of rewriting it.
    pub strict: bool,
}

impl Default for LuaOptions {
    fn default() -> Self {
        Self {
            indent: 2,
            emit_continue_warning: true,
            strict: false,
        }
    }
}

/// Emits a validated program as Lua source.
///
/// # Errors
///
/// Fails with [`EmitError::UnsupportedForLua`] on constructs with no Lua
/// rendering under the active policy, or [`EmitError::Cancelled`].
pub fn emit(
    program: &Program,
    options: &LuaOptions,
    cancel: &Cancellation,
) -> Result<Emission<String>, EmitError> {
    let mut emitter = LuaEmitter {
        options: options.clone(),
        out: String::new(),
        depth: 0,
        warnings: Vec::new(),
        cancel,
        const_warned: false,
        breakables: Vec::new(),
    };
    emitter.emit_stmts(&program.body)?;
    Ok(Emission {
        output: emitter.out,
        warnings: emitter.warnings,
    })
}

enum Breakable {
    Loop { continue_label: Option<String> },
    Switch,
}

struct LuaEmitter<'a> {
    options: LuaOptions,
    out: String,
    depth: usize,
    warnings: Vec<Warning>,
    cancel: &'a Cancellation,
    const_warned: bool,
    breakables: Vec<Breakable>,
}

const LUA_KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "if", "in",
    "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

impl LuaEmitter<'_> {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth * self.options.indent {
            self.out.push(' ');
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn indent(&self) -> String {
        " ".repeat(self.depth * self.options.indent)
    }

    // --------------------------------------------------------------------
    // Statements
    // --------------------------------------------------------------------

    fn emit_stmts(&mut self, stmts: &[Stmt]) -> Result<(), EmitError> {
        for stmt in stmts {
            self.emit_stmt(stmt)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    fn emit_stmt(&mut self, stmt: &Stmt) -> Result<(), EmitError> {
        match stmt {
            Stmt::FunctionDecl(f) => self.emit_function_decl(f),
            Stmt::VarDecl(decl) => self.emit_var_decl(decl),
            Stmt::Block(b) => {
                self.line("do");
                self.emit_block_body(b)?;
                self.line("end");
                Ok(())
            }
            Stmt::Return(r) => {
                match &r.value {
                    Some(value) => {
                        let value = self.expr(value)?;
                        self.line(&format!("return {value}"));
                    }
                    None => self.line("return"),
                }
                Ok(())
            }
            Stmt::If(s) => self.emit_if(s),
            Stmt::While(s) => {
                let condition = self.expr(&s.condition)?;
                let continue_label = self.continue_label_for(s.id.as_str(), &s.body);
                self.line(&format!("while {condition} do"));
                self.breakables.push(Breakable::Loop {
                    continue_label: continue_label.clone(),
                });
                self.emit_block_body(&s.body)?;
                if let Some(label) = &continue_label {
                    self.depth += 1;
                    self.line(&format!("::{label}::"));
                    self.depth -= 1;
                }
                self.breakables.pop();
                self.line("end");
                Ok(())
            }
            Stmt::DoWhile(s) => {
                let continue_label = self.continue_label_for(s.id.as_str(), &s.body);
                self.line("repeat");
                self.breakables.push(Breakable::Loop {
                    continue_label: continue_label.clone(),
                });
                self.emit_block_body(&s.body)?;
                if let Some(label) = &continue_label {
                    self.depth += 1;
                    self.line(&format!("::{label}::"));
                    self.depth -= 1;
                }
                self.breakables.pop();
                let condition = self.expr(&s.condition)?;
                self.line(&format!("until not ({condition})"));
                Ok(())
            }
            Stmt::For(s) => {
                let continue_label = self.continue_label_for(s.id.as_str(), &s.body);
                self.line("do");
                self.depth += 1;
                if let Some(init) = &s.init {
                    self.emit_stmt(init)?;
                }
                let test = self.expr(&s.test)?;
                self.line(&format!("while {test} do"));
                self.breakables.push(Breakable::Loop {
                    continue_label: continue_label.clone(),
                });
                self.emit_block_body(&s.body)?;
                self.depth += 1;
                if let Some(label) = &continue_label {
                    self.line(&format!("::{label}::"));
                }
                if let Some(update) = &s.update {
                    self.emit_expression_line(update)?;
                }
                self.depth -= 1;
                self.breakables.pop();
                self.line("end");
                self.depth -= 1;
                self.line("end");
                Ok(())
            }
            Stmt::Switch(s) => self.emit_switch(s),
            Stmt::Break(b) => {
                let in_loop = match self.breakables.last() {
                    // In the if/elseif desugaring of a switch, cases cannot
                    // fall through, so the break is already implied.
                    Some(Breakable::Switch) => false,
                    Some(Breakable::Loop { .. }) => true,
                    None => {
                        return Err(EmitError::UnsupportedForLua {
                            construct: "break outside a loop or switch".to_string(),
                            location: b.location,
                        });
                    }
                };
                if in_loop {
                    self.line("break");
                }
                Ok(())
            }
            Stmt::Continue(c) => self.emit_continue(c.location),
            Stmt::ExpressionStmt(s) => self.emit_expression_line(&s.expression),
        }
    }

    /// An expression in statement position. Calls and assignments are valid
    /// Lua statements; anything else is parked in a throwaway local.
    fn emit_expression_line(&mut self, expr: &Expr) -> Result<(), EmitError> {
        match expr {
            Expr::Assignment(_) | Expr::Call(_) => {
                let text = self.expr(expr)?;
                self.line(&text);
            }
            other => {
                let text = self.expr(other)?;
                self.line(&format!("local _ = {text}"));
            }
        }
        Ok(())
    }

    fn emit_function_decl(&mut self, f: &FunctionDecl) -> Result<(), EmitError> {
        if self.cancel.is_requested() {
            return Err(EmitError::Cancelled);
        }
        let (params, prologue) = self.render_params(f);
        self.line(&format!("local function {}({params})", f.name));
        // Loop and switch contexts do not cross function boundaries.
        let saved = std::mem::take(&mut self.breakables);
        self.depth += 1;
        for line in prologue {
            self.line(&line);
        }
        self.depth -= 1;
        self.emit_block_body(&f.body)?;
        self.breakables = saved;
        self.line("end");
        Ok(())
    }

    fn render_params(&mut self, f: &FunctionDecl) -> (String, Vec<String>) {
        let mut rendered = Vec::with_capacity(f.params.len());
        let mut prologue = Vec::new();
        for param in &f.params {
            if param.is_rest() {
                rendered.push("...".to_string());
                prologue.push(format!("local {} = {{...}}", param.name));
            } else {
                rendered.push(param.name.clone());
            }
        }
        (rendered.join(", "), prologue)
    }

    fn emit_var_decl(&mut self, decl: &VarDecl) -> Result<(), EmitError> {
        if decl.declaration_kind() == Some("const") && !self.const_warned {
            self.const_warned = true;
            self.warnings.push(Warning::new(
                "const declarations are emitted as plain locals (Lua has no const)",
                decl.location,
            ));
        }
        match &decl.init {
            Some(init) => {
                let init = self.expr(init)?;
                self.line(&format!("local {} = {init}", decl.name));
            }
            None => self.line(&format!("local {}", decl.name)),
        }
        Ok(())
    }

    fn emit_block_body(&mut self, block: &Block) -> Result<(), EmitError> {
        self.depth += 1;
        self.emit_stmts(&block.statements)?;
        self.depth -= 1;
        Ok(())
    }

    fn emit_if(&mut self, s: &If) -> Result<(), EmitError> {
        let condition = self.expr(&s.condition)?;
        self.line(&format!("if {condition} then"));
        self.emit_block_body(&s.consequent)?;
        let mut alternate = s.alternate.as_ref();
        while let Some(block) = alternate {
            // A lone nested `if` in the alternate folds into `elseif`.
            if let [Stmt::If(nested)] = block.statements.as_slice() {
                let condition = self.expr(&nested.condition)?;
                self.line(&format!("elseif {condition} then"));
                self.emit_block_body(&nested.consequent)?;
                alternate = nested.alternate.as_ref();
            } else {
                self.line("else");
                self.emit_block_body(block)?;
                alternate = None;
            }
        }
        self.line("end");
        Ok(())
    }

    fn emit_switch(&mut self, s: &Switch) -> Result<(), EmitError> {
        let discriminant = self.expr(&s.discriminant)?;
        let temp = format!("__switch_{}", s.id.as_str());
        self.line(&format!("local {temp} = {discriminant}"));
        let last_index = s.cases.len().saturating_sub(1);
        let tests: Vec<(usize, &Case)> = s
            .cases
            .iter()
            .enumerate()
            .filter(|(_, c)| c.test.is_some())
            .collect();
        let default = s
            .cases
            .iter()
            .enumerate()
            .find(|(_, c)| c.test.is_none());
        if tests.is_empty() {
            if let Some((index, default)) = default {
                self.line("do");
                self.breakables.push(Breakable::Switch);
                self.depth += 1;
                self.emit_case_body(default, index < last_index)?;
                self.depth -= 1;
                self.breakables.pop();
                self.line("end");
            }
            return Ok(());
        }
        self.breakables.push(Breakable::Switch);
        for (position, (index, case)) in tests.iter().enumerate() {
            let test = case.test.as_ref().expect("filtered on test presence");
            let test = self.expr(test)?;
            let keyword = if position == 0 { "if" } else { "elseif" };
            self.line(&format!("{keyword} {temp} == {test} then"));
            self.depth += 1;
            self.emit_case_body(case, *index < last_index)?;
            self.depth -= 1;
        }
        if let Some((index, default)) = default {
            self.line("else");
            self.depth += 1;
            self.emit_case_body(default, index < last_index)?;
            self.depth -= 1;
        }
        self.breakables.pop();
        self.line("end");
        Ok(())
    }

    fn emit_case_body(&mut self, case: &Case, can_fall_through: bool) -> Result<(), EmitError> {
        // A trailing break is implied by the if/elseif dispatch.
        let body = match case.body.split_last() {
            Some((Stmt::Break(_), rest)) => rest,
            _ => case.body.as_slice(),
        };
        let falls_through = can_fall_through
            && !body.is_empty()
            && !matches!(case.body.last(), Some(Stmt::Break(_) | Stmt::Return(_)));
        if falls_through {
            self.warnings.push(Warning::new(
                "switch case falls through; fallthrough is not preserved in Lua",
                case.location,
            ));
        }
        self.emit_stmts(body)
    }

    fn continue_label_for(&self, loop_id: &str, body: &Block) -> Option<String> {
        if !self.options.strict && contains_continue(&body.statements) {
            Some(format!("__continue_{loop_id}"))
        } else {
            None
        }
    }

    fn emit_continue(&mut self, location: Option<Span>) -> Result<(), EmitError> {
        if self.options.strict {
            return Err(EmitError::UnsupportedForLua {
                construct: "continue (Lua 5.1 has no continue statement)".to_string(),
                location,
            });
        }
        let label = self.breakables.iter().rev().find_map(|b| match b {
            Breakable::Loop { continue_label } => Some(continue_label.clone()),
            Breakable::Switch => None,
        });
        match label.flatten() {
            Some(label) => {
                if self.options.emit_continue_warning {
                    self.warnings.push(Warning::new(
                        "continue rewritten as a goto label (Lua 5.1 has no continue)",
                        location,
                    ));
                }
                self.line(&format!("goto {label}"));
                Ok(())
            }
            None => Err(EmitError::UnsupportedForLua {
                construct: "continue outside a loop".to_string(),
                location,
            }),
        }
    }

    // --------------------------------------------------------------------
    // Expressions
    // --------------------------------------------------------------------

    #[allow(clippy::too_many_lines)]
    fn expr(&mut self, expr: &Expr) -> Result<String, EmitError> {
        Ok(match expr {
            Expr::Identifier(id) => id.name.clone(),
            Expr::Literal(lit) => render_literal(&lit.value),
            Expr::BinaryOp(b) => self.binary(b)?,
            Expr::UnaryOp(u) => {
                let operand = self.operand(&u.operand, prec::UNARY)?;
                match u.operator {
                    UnaryOperator::Not => format!("not {operand}"),
                    UnaryOperator::Neg => format!("-{operand}"),
                }
            }
            Expr::Call(call) => self.call(call)?,
            Expr::Member(m) => {
                let object = self.operand(&m.object, prec::ATOM)?;
                if m.computed {
                    let property = self.expr(&m.property)?;
                    format!("{object}[{property}]")
                } else {
                    let Expr::Identifier(name) = &m.property else {
                        return Err(EmitError::UnsupportedForLua {
                            construct: "non-identifier member property".to_string(),
                            location: m.location,
                        });
                    };
                    format!("{object}.{}", name.name)
                }
            }
            Expr::ArrayLiteral(a) => {
                let elements = a
                    .elements
                    .iter()
                    .map(|e| self.expr(e))
                    .collect::<Result<Vec<_>, _>>()?;
                format!("{{{}}}", elements.join(", "))
            }
            Expr::ObjectLiteral(o) => {
                let mut fields = Vec::with_capacity(o.properties.len());
                for property in &o.properties {
                    let value = self.expr(&property.value)?;
                    if is_lua_identifier(&property.key) {
                        fields.push(format!("{} = {value}", property.key));
                    } else {
                        fields.push(format!("[{}] = {value}", render_string(&property.key)));
                    }
                }
                format!("{{{}}}", fields.join(", "))
            }
            Expr::Assignment(a) => {
                let target = self.expr(&a.target)?;
                let value = self.operand(&a.value, prec::LOWEST)?;
                match a.operator.binary_operator() {
                    None => format!("{target} = {value}"),
                    Some(op) => {
                        // Compound assignments expand target-specifically.
                        if op == BinaryOperator::Add && self.concatenates_assign(a) {
                            format!("{target} = {target} .. {value}")
                        } else {
                            format!("{target} = {target} {} {value}", lua_operator(op))
                        }
                    }
                }
            }
            Expr::Conditional(c) => {
                let condition = self.operand(&c.condition, prec::AND)?;
                let consequent = self.operand(&c.consequent, prec::AND)?;
                let alternate = self.operand(&c.alternate, prec::OR)?;
                format!("({condition} and {consequent} or {alternate})")
            }
            Expr::FunctionDecl(f) => self.function_expr(f)?,
        })
    }

    fn concatenates_assign(&self, a: &etna_ir::nodes::Assignment) -> bool {
        is_static_string(&a.target) || is_static_string(&a.value)
    }

    fn binary(&mut self, b: &BinaryOp) -> Result<String, EmitError> {
        let op = b.operator;
        if op == BinaryOperator::Add && self.concatenates(b) {
            let left = self.concat_operand(&b.left)?;
            let right = self.concat_operand(&b.right)?;
            return Ok(format!("{left} .. {right}"));
        }
        let my_prec = lua_precedence(op);
        let left = self.operand(&b.left, my_prec)?;
        let right = self.operand(&b.right, my_prec + 1)?;
        Ok(format!("{left} {} {right}", lua_operator(op)))
    }

    /// `+` becomes `..` on static string evidence or the lowerer's
    /// concatenation flag; without either, `+` is preserved.
    fn concatenates(&self, b: &BinaryOp) -> bool {
        is_static_string(&b.left)
            || is_static_string(&b.right)
            || b.metadata.flag(metadata::IS_CONCATENATION)
    }

    fn concat_operand(&mut self, operand: &Expr) -> Result<String, EmitError> {
        if is_static_string(operand) {
            self.operand(operand, prec::CONCAT)
        } else {
            let inner = self.expr(operand)?;
            Ok(format!("tostring({inner})"))
        }
    }

    fn call(&mut self, call: &etna_ir::nodes::Call) -> Result<String, EmitError> {
        let arguments = call
            .arguments
            .iter()
            .map(|a| self.expr(a))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");
        if let Some(method) = console_method(&call.callee) {
            if method != "log" {
                self.warnings.push(Warning::new(
                    format!("console.{method} translated to print"),
                    call.location,
                ));
            }
            return Ok(format!("print({arguments})"));
        }
        let callee = self.operand(&call.callee, prec::ATOM)?;
        Ok(format!("{callee}({arguments})"))
    }

    fn function_expr(&mut self, f: &FunctionDecl) -> Result<String, EmitError> {
        let (params, prologue) = self.render_params(f);
        let mut rendered = format!("function({params})\n");
        let saved_out = std::mem::take(&mut self.out);
        let saved_breakables = std::mem::take(&mut self.breakables);
        self.depth += 1;
        for line in prologue {
            self.line(&line);
        }
        self.emit_stmts(&f.body.statements)?;
        self.depth -= 1;
        let body = std::mem::replace(&mut self.out, saved_out);
        self.breakables = saved_breakables;
        rendered.push_str(&body);
        rendered.push_str(&self.indent());
        rendered.push_str("end");
        Ok(rendered)
    }

    /// Renders a sub-expression, parenthesizing when its precedence is
    /// looser than the context requires.
    fn operand(&mut self, expr: &Expr, min_prec: u8) -> Result<String, EmitError> {
        let rendered = self.expr(expr)?;
        if expression_precedence(expr) < min_prec {
            Ok(format!("({rendered})"))
        } else {
            Ok(rendered)
        }
    }
}

mod prec {
    pub const LOWEST: u8 = 0;
    pub const OR: u8 = 1;
    pub const AND: u8 = 2;
    pub const COMPARE: u8 = 3;
    pub const CONCAT: u8 = 4;
    pub const ADD: u8 = 5;
    pub const MUL: u8 = 6;
    pub const UNARY: u8 = 7;
    pub const ATOM: u8 = 9;
}

fn lua_precedence(op: BinaryOperator) -> u8 {
    match op {
        BinaryOperator::Or => prec::OR,
        BinaryOperator::And => prec::AND,
        BinaryOperator::Eq
        | BinaryOperator::Ne
        | BinaryOperator::Lt
        | BinaryOperator::Le
        | BinaryOperator::Gt
        | BinaryOperator::Ge => prec::COMPARE,
        BinaryOperator::Add | BinaryOperator::Sub => prec::ADD,
        BinaryOperator::Mul | BinaryOperator::Div | BinaryOperator::Mod => prec::MUL,
    }
}

fn expression_precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::BinaryOp(b) => {
            if b.operator == BinaryOperator::Add
                && (is_static_string(&b.left)
                    || is_static_string(&b.right)
                    || b.metadata.flag(metadata::IS_CONCATENATION))
            {
                prec::CONCAT
            } else {
                lua_precedence(b.operator)
            }
        }
        Expr::UnaryOp(_) => prec::UNARY,
        Expr::Assignment(_) => prec::LOWEST,
        _ => prec::ATOM,
    }
}

fn lua_operator(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Eq => "==",
        BinaryOperator::Ne => "~=",
        BinaryOperator::And => "and",
        BinaryOperator::Or => "or",
        other => other.as_str(),
    }
}

fn is_static_string(expr: &Expr) -> bool {
    expr.ty().is_some_and(Type::is_string)
}

/// Matches `console.<method>(…)` callees.
fn console_method(callee: &Expr) -> Option<&str> {
    let Expr::Member(member) = callee else {
        return None;
    };
    if member.computed {
        return None;
    }
    let Expr::Identifier(object) = &member.object else {
        return None;
    };
    if object.name != "console" {
        return None;
    }
    let Expr::Identifier(property) = &member.property else {
        return None;
    };
    Some(&property.name)
}

fn render_literal(value: &LiteralValue) -> String {
    match value {
        LiteralValue::Null => "nil".to_string(),
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

fn is_lua_identifier(name: &str) -> bool {
    if name.is_empty() || LUA_KEYWORDS.contains(&name) {
        return false;
    }
    let mut chars = name.chars();
    let first = chars.next().expect("checked non-empty");
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// True when the statement list contains a `continue` belonging to the
/// current loop (nested loops and functions own their own).
fn contains_continue(stmts: &[Stmt]) -> bool {
    stmts.iter().any(|stmt| match stmt {
        Stmt::Continue(_) => true,
        Stmt::Block(b) => contains_continue(&b.statements),
        Stmt::If(s) => {
            contains_continue(&s.consequent.statements)
                || s
                    .alternate
                    .as_ref()
                    .is_some_and(|alt| contains_continue(&alt.statements))
        }
        Stmt::Switch(s) => s.cases.iter().any(|case| contains_continue(&case.body)),
        _ => false,
    })
}
