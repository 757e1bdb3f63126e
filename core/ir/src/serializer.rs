//! Canonical JSON serialization of the IR.
//!
//! The writer is hand-rolled because the byte-level shape of the document is
//! part of the determinism contract: keys appear in schema order (`kind`,
//! `version` on the root, `id`, variant fields alphabetically, then `type`,
//! `location`, `metadata`), integral numbers print without a fraction, and
//! absent optional slots are omitted. Indentation is configurable and
//! semantically irrelevant; `from_json` accepts any whitespace.
//!
//! `from_json(to_json(tree))` is the identity on validated trees.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde_json::Value;

use crate::errors::SerializeError;
use crate::id::NodeId;
use crate::metadata::{MetaValue, Metadata};
use crate::nodes::{
    ArrayLiteral, AssignOperator, Assignment, BinaryOp, BinaryOperator, Block, Break, Call, Case,
    Conditional, Continue, DoWhile, Expr, ExpressionStmt, For, FunctionDecl, Identifier, If,
    Literal, LiteralValue, Member, ObjectLiteral, Parameter, Program, Property, Return, Span, Stmt,
    Switch, UnaryOp, UnaryOperator, VarDecl, While,
};
use crate::types::Type;

/// Version of the IR JSON schema this build reads and writes.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Serializes a program to canonical JSON.
///
/// `indent` of `None` produces the compact form; `Some(n)` indents nested
/// structures by `n` spaces per level.
#[must_use]
pub fn to_json(program: &Program, indent: Option<usize>) -> String {
    let mut w = Writer::new(indent);
    w.program(program);
    w.out
}

/// Deserializes canonical IR JSON back into a tree.
///
/// # Errors
///
/// Fails on malformed JSON, a schema-version mismatch, an unknown node
/// `kind`, or any field that does not match the node's variant schema.
pub fn from_json(text: &str) -> Result<Program, SerializeError> {
    let value: Value = serde_json::from_str(text)?;
    Reader::program(&value)
}

// ------------------------------------------------------------------------
// Writer
// ------------------------------------------------------------------------

struct Writer {
    out: String,
    indent: Option<usize>,
    depth: usize,
    first: Vec<bool>,
}

impl Writer {
    fn new(indent: Option<usize>) -> Self {
        Self {
            out: String::new(),
            indent,
            depth: 0,
            first: Vec::new(),
        }
    }

    fn newline_indent(&mut self) {
        if let Some(width) = self.indent {
            self.out.push('\n');
            for _ in 0..self.depth * width {
                self.out.push(' ');
            }
        }
    }

    fn open(&mut self, bracket: char) {
        self.out.push(bracket);
        self.depth += 1;
        self.first.push(true);
    }

    fn close(&mut self, bracket: char) {
        self.depth -= 1;
        let had_items = !self.first.pop().unwrap_or(true);
        if had_items {
            self.newline_indent();
        }
        self.out.push(bracket);
    }

    fn separate(&mut self) {
        if let Some(first) = self.first.last_mut() {
            if *first {
                *first = false;
            } else {
                self.out.push(',');
            }
        }
        self.newline_indent();
    }

    fn key(&mut self, name: &str) {
        self.separate();
        self.string(name);
        self.out.push(':');
        if self.indent.is_some() {
            self.out.push(' ');
        }
    }

    fn string(&mut self, value: &str) {
        self.out.push('"');
        for ch in value.chars() {
            match ch {
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                '\n' => self.out.push_str("\\n"),
                '\r' => self.out.push_str("\\r"),
                '\t' => self.out.push_str("\\t"),
                c if (c as u32) < 0x20 => {
                    let _ = write!(self.out, "\\u{:04x}", c as u32);
                }
                c => self.out.push(c),
            }
        }
        self.out.push('"');
    }

    /// Canonical number form: integral values print without a fraction,
    /// everything else uses the shortest round-trip rendering.
    fn number(&mut self, value: f64) {
        #[allow(clippy::cast_possible_truncation)]
        if value.is_finite() && value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
            let _ = write!(self.out, "{}", value as i64);
        } else {
            let _ = write!(self.out, "{value}");
        }
    }

    fn bool(&mut self, value: bool) {
        self.out.push_str(if value { "true" } else { "false" });
    }

    fn head(&mut self, kind: &str, id: &NodeId) {
        self.open('{');
        self.key("kind");
        self.string(kind);
        self.key("id");
        self.string(id.as_str());
    }

    fn tail(&mut self, ty: Option<&Type>, location: Option<Span>, metadata: &Metadata) {
        if let Some(ty) = ty {
            self.key("type");
            self.type_value(ty);
        }
        if let Some(span) = location {
            self.key("location");
            self.open('{');
            self.key("line");
            self.number(f64::from(span.line));
            self.key("column");
            self.number(f64::from(span.column));
            self.close('}');
        }
        if !metadata.is_empty() {
            self.key("metadata");
            self.open('{');
            for (k, v) in metadata.iter() {
                self.key(k);
                match v {
                    MetaValue::Bool(b) => self.bool(*b),
                    #[allow(clippy::cast_precision_loss)]
                    MetaValue::Int(i) => self.number(*i as f64),
                    MetaValue::Float(f) => self.number(*f),
                    MetaValue::Str(s) => self.string(s),
                }
            }
            self.close('}');
        }
        self.close('}');
    }

    fn type_value(&mut self, ty: &Type) {
        match ty {
            Type::Number => self.string("number"),
            Type::String => self.string("string"),
            Type::Boolean => self.string("boolean"),
            Type::Null => self.string("null"),
            Type::Void => self.string("void"),
            Type::Unknown => self.string("unknown"),
            Type::Array(element) => {
                self.open('{');
                self.key("array");
                self.type_value(element);
                self.close('}');
            }
            Type::Object { fields, open } => {
                self.open('{');
                self.key("object");
                self.open('{');
                self.key("fields");
                self.open('{');
                for (name, field_ty) in fields {
                    self.key(name);
                    self.type_value(field_ty);
                }
                self.close('}');
                self.key("open");
                self.bool(*open);
                self.close('}');
                self.close('}');
            }
            Type::Function { params, ret } => {
                self.open('{');
                self.key("function");
                self.open('{');
                self.key("params");
                self.open('[');
                for p in params {
                    self.separate();
                    self.type_value(p);
                }
                self.close(']');
                self.key("return");
                self.type_value(ret);
                self.close('}');
                self.close('}');
            }
            Type::Optional(base) => {
                self.open('{');
                self.key("optional");
                self.type_value(base);
                self.close('}');
            }
            Type::Union(members) => {
                self.open('{');
                self.key("union");
                self.open('[');
                for m in members {
                    self.separate();
                    self.type_value(m);
                }
                self.close(']');
                self.close('}');
            }
        }
    }

    fn program(&mut self, n: &Program) {
        self.open('{');
        self.key("kind");
        self.string("Program");
        self.key("version");
        self.string(SCHEMA_VERSION);
        self.key("id");
        self.string(n.id.as_str());
        self.key("body");
        self.stmt_list(&n.body);
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
        if self.indent.is_some() {
            self.out.push('\n');
        }
    }

    fn stmt_list(&mut self, stmts: &[Stmt]) {
        self.open('[');
        for stmt in stmts {
            self.separate();
            self.stmt(stmt);
        }
        self.close(']');
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::FunctionDecl(n) => self.function_decl(n),
            Stmt::VarDecl(n) => self.var_decl(n),
            Stmt::Block(n) => self.block(n),
            Stmt::Return(n) => self.return_stmt(n),
            Stmt::If(n) => self.if_stmt(n),
            Stmt::While(n) => self.while_stmt(n),
            Stmt::DoWhile(n) => self.do_while(n),
            Stmt::For(n) => self.for_stmt(n),
            Stmt::Switch(n) => self.switch(n),
            Stmt::Break(n) => self.break_stmt(n),
            Stmt::Continue(n) => self.continue_stmt(n),
            Stmt::ExpressionStmt(n) => self.expression_stmt(n),
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::BinaryOp(n) => self.binary(n),
            Expr::UnaryOp(n) => self.unary(n),
            Expr::Call(n) => self.call(n),
            Expr::Member(n) => self.member(n),
            Expr::ArrayLiteral(n) => self.array_literal(n),
            Expr::ObjectLiteral(n) => self.object_literal(n),
            Expr::Identifier(n) => self.identifier(n),
            Expr::Literal(n) => self.literal(n),
            Expr::Assignment(n) => self.assignment(n),
            Expr::Conditional(n) => self.conditional(n),
            Expr::FunctionDecl(n) => self.function_decl(n),
        }
    }

    fn function_decl(&mut self, n: &FunctionDecl) {
        self.head("FunctionDecl", &n.id);
        self.key("body");
        self.block(&n.body);
        self.key("name");
        self.string(&n.name);
        self.key("params");
        self.open('[');
        for param in &n.params {
            self.separate();
            self.parameter(param);
        }
        self.close(']');
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
    }

    fn parameter(&mut self, n: &Parameter) {
        self.head("Parameter", &n.id);
        self.key("name");
        self.string(&n.name);
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
    }

    fn var_decl(&mut self, n: &VarDecl) {
        self.head("VarDecl", &n.id);
        if let Some(init) = &n.init {
            self.key("init");
            self.expr(init);
        }
        self.key("name");
        self.string(&n.name);
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
    }

    fn block(&mut self, n: &Block) {
        self.head("Block", &n.id);
        self.key("statements");
        self.stmt_list(&n.statements);
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
    }

    fn return_stmt(&mut self, n: &Return) {
        self.head("Return", &n.id);
        if let Some(value) = &n.value {
            self.key("value");
            self.expr(value);
        }
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
    }

    fn if_stmt(&mut self, n: &If) {
        self.head("If", &n.id);
        if let Some(alternate) = &n.alternate {
            self.key("alternate");
            self.block(alternate);
        }
        self.key("condition");
        self.expr(&n.condition);
        self.key("consequent");
        self.block(&n.consequent);
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
    }

    fn while_stmt(&mut self, n: &While) {
        self.head("While", &n.id);
        self.key("body");
        self.block(&n.body);
        self.key("condition");
        self.expr(&n.condition);
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
    }

    fn do_while(&mut self, n: &DoWhile) {
        self.head("DoWhile", &n.id);
        self.key("body");
        self.block(&n.body);
        self.key("condition");
        self.expr(&n.condition);
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
    }

    fn for_stmt(&mut self, n: &For) {
        self.head("For", &n.id);
        self.key("body");
        self.block(&n.body);
        if let Some(init) = &n.init {
            self.key("init");
            self.stmt(init);
        }
        self.key("test");
        self.expr(&n.test);
        if let Some(update) = &n.update {
            self.key("update");
            self.expr(update);
        }
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
    }

    fn switch(&mut self, n: &Switch) {
        self.head("Switch", &n.id);
        self.key("cases");
        self.open('[');
        for case in &n.cases {
            self.separate();
            self.case(case);
        }
        self.close(']');
        self.key("discriminant");
        self.expr(&n.discriminant);
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
    }

    fn case(&mut self, n: &Case) {
        self.head("Case", &n.id);
        self.key("body");
        self.stmt_list(&n.body);
        if let Some(test) = &n.test {
            self.key("test");
            self.expr(test);
        }
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
    }

    fn break_stmt(&mut self, n: &Break) {
        self.head("Break", &n.id);
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
    }

    fn continue_stmt(&mut self, n: &Continue) {
        self.head("Continue", &n.id);
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
    }

    fn expression_stmt(&mut self, n: &ExpressionStmt) {
        self.head("ExpressionStmt", &n.id);
        self.key("expression");
        self.expr(&n.expression);
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
    }

    fn binary(&mut self, n: &BinaryOp) {
        self.head("BinaryOp", &n.id);
        self.key("left");
        self.expr(&n.left);
        self.key("operator");
        self.string(n.operator.as_str());
        self.key("right");
        self.expr(&n.right);
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
    }

    fn unary(&mut self, n: &UnaryOp) {
        self.head("UnaryOp", &n.id);
        self.key("operand");
        self.expr(&n.operand);
        self.key("operator");
        self.string(n.operator.as_str());
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
    }

    fn call(&mut self, n: &Call) {
        self.head("Call", &n.id);
        self.key("arguments");
        self.open('[');
        for arg in &n.arguments {
            self.separate();
            self.expr(arg);
        }
        self.close(']');
        self.key("callee");
        self.expr(&n.callee);
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
    }

    fn member(&mut self, n: &Member) {
        self.head("Member", &n.id);
        self.key("computed");
        self.bool(n.computed);
        self.key("object");
        self.expr(&n.object);
        self.key("property");
        self.expr(&n.property);
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
    }

    fn array_literal(&mut self, n: &ArrayLiteral) {
        self.head("ArrayLiteral", &n.id);
        self.key("elements");
        self.open('[');
        for element in &n.elements {
            self.separate();
            self.expr(element);
        }
        self.close(']');
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
    }

    fn object_literal(&mut self, n: &ObjectLiteral) {
        self.head("ObjectLiteral", &n.id);
        self.key("properties");
        self.open('[');
        for property in &n.properties {
            self.separate();
            self.property(property);
        }
        self.close(']');
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
    }

    fn property(&mut self, n: &Property) {
        self.head("Property", &n.id);
        self.key("key");
        self.string(&n.key);
        self.key("value");
        self.expr(&n.value);
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
    }

    fn identifier(&mut self, n: &Identifier) {
        self.head("Identifier", &n.id);
        self.key("name");
        self.string(&n.name);
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
    }

    fn literal(&mut self, n: &Literal) {
        self.head("Literal", &n.id);
        self.key("value");
        match &n.value {
            LiteralValue::Null => self.out.push_str("null"),
            LiteralValue::Bool(b) => self.bool(*b),
            LiteralValue::Number(v) => self.number(*v),
            LiteralValue::Str(s) => self.string(s),
        }
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
    }

    fn assignment(&mut self, n: &Assignment) {
        self.head("Assignment", &n.id);
        self.key("operator");
        self.string(n.operator.as_str());
        self.key("target");
        self.expr(&n.target);
        self.key("value");
        self.expr(&n.value);
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
    }

    fn conditional(&mut self, n: &Conditional) {
        self.head("Conditional", &n.id);
        self.key("alternate");
        self.expr(&n.alternate);
        self.key("condition");
        self.expr(&n.condition);
        self.key("consequent");
        self.expr(&n.consequent);
        self.tail(n.ty.as_ref(), n.location, &n.metadata);
    }
}

// ------------------------------------------------------------------------
// Reader
// ------------------------------------------------------------------------

struct Reader;

impl Reader {
    fn program(value: &Value) -> Result<Program, SerializeError> {
        let map = expect_object(value)?;
        let kind = expect_str(map, "kind")?;
        if kind != "Program" {
            return Err(malformed(format!("root kind is `{kind}`, expected `Program`")));
        }
        let version = expect_str(map, "version")?;
        if version != SCHEMA_VERSION {
            return Err(SerializeError::UnsupportedVersion {
                found: version.to_string(),
                expected: SCHEMA_VERSION.to_string(),
            });
        }
        Ok(Program {
            id: Self::id(map)?,
            ty: Self::ty(map)?,
            location: Self::location(map)?,
            metadata: Self::metadata(map)?,
            body: Self::stmt_list(expect_field(map, "body")?)?,
        })
    }

    fn stmt_list(value: &Value) -> Result<Vec<Stmt>, SerializeError> {
        expect_array(value)?.iter().map(Self::stmt).collect()
    }

    fn stmt(value: &Value) -> Result<Stmt, SerializeError> {
        let map = expect_object(value)?;
        let kind = expect_str(map, "kind")?;
        Ok(match kind {
            "FunctionDecl" => Stmt::FunctionDecl(Box::new(Self::function_decl(map)?)),
            "VarDecl" => Stmt::VarDecl(Box::new(Self::var_decl(map)?)),
            "Block" => Stmt::Block(Box::new(Self::block_from(map)?)),
            "Return" => Stmt::Return(Box::new(Return {
                id: Self::id(map)?,
                ty: Self::ty(map)?,
                location: Self::location(map)?,
                metadata: Self::metadata(map)?,
                value: Self::opt_expr(map, "value")?,
            })),
            "If" => Stmt::If(Box::new(If {
                id: Self::id(map)?,
                ty: Self::ty(map)?,
                location: Self::location(map)?,
                metadata: Self::metadata(map)?,
                alternate: match map.get("alternate") {
                    Some(v) => Some(Self::block(v)?),
                    None => None,
                },
                condition: Self::expr(expect_field(map, "condition")?)?,
                consequent: Self::block(expect_field(map, "consequent")?)?,
            })),
            "While" => Stmt::While(Box::new(While {
                id: Self::id(map)?,
                ty: Self::ty(map)?,
                location: Self::location(map)?,
                metadata: Self::metadata(map)?,
                body: Self::block(expect_field(map, "body")?)?,
                condition: Self::expr(expect_field(map, "condition")?)?,
            })),
            "DoWhile" => Stmt::DoWhile(Box::new(DoWhile {
                id: Self::id(map)?,
                ty: Self::ty(map)?,
                location: Self::location(map)?,
                metadata: Self::metadata(map)?,
                body: Self::block(expect_field(map, "body")?)?,
                condition: Self::expr(expect_field(map, "condition")?)?,
            })),
            "For" => Stmt::For(Box::new(For {
                id: Self::id(map)?,
                ty: Self::ty(map)?,
                location: Self::location(map)?,
                metadata: Self::metadata(map)?,
                body: Self::block(expect_field(map, "body")?)?,
                init: match map.get("init") {
                    Some(v) => Some(Self::stmt(v)?),
                    None => None,
                },
                test: Self::expr(expect_field(map, "test")?)?,
                update: Self::opt_expr(map, "update")?,
            })),
            "Switch" => Stmt::Switch(Box::new(Switch {
                id: Self::id(map)?,
                ty: Self::ty(map)?,
                location: Self::location(map)?,
                metadata: Self::metadata(map)?,
                cases: expect_array(expect_field(map, "cases")?)?
                    .iter()
                    .map(Self::case)
                    .collect::<Result<_, _>>()?,
                discriminant: Self::expr(expect_field(map, "discriminant")?)?,
            })),
            "Break" => Stmt::Break(Box::new(Break {
                id: Self::id(map)?,
                ty: Self::ty(map)?,
                location: Self::location(map)?,
                metadata: Self::metadata(map)?,
            })),
            "Continue" => Stmt::Continue(Box::new(Continue {
                id: Self::id(map)?,
                ty: Self::ty(map)?,
                location: Self::location(map)?,
                metadata: Self::metadata(map)?,
            })),
            "ExpressionStmt" => Stmt::ExpressionStmt(Box::new(ExpressionStmt {
                id: Self::id(map)?,
                ty: Self::ty(map)?,
                location: Self::location(map)?,
                metadata: Self::metadata(map)?,
                expression: Self::expr(expect_field(map, "expression")?)?,
            })),
            other => {
                return Err(SerializeError::UnknownKind {
                    kind: other.to_string(),
                })
            }
        })
    }

    fn expr(value: &Value) -> Result<Expr, SerializeError> {
        let map = expect_object(value)?;
        let kind = expect_str(map, "kind")?;
        Ok(match kind {
            "BinaryOp" => {
                let raw = expect_str(map, "operator")?;
                let operator = BinaryOperator::from_str(raw)
                    .ok_or_else(|| malformed(format!("unknown binary operator `{raw}`")))?;
                Expr::BinaryOp(Box::new(BinaryOp {
                    id: Self::id(map)?,
                    ty: Self::ty(map)?,
                    location: Self::location(map)?,
                    metadata: Self::metadata(map)?,
                    operator,
                    left: Self::expr(expect_field(map, "left")?)?,
                    right: Self::expr(expect_field(map, "right")?)?,
                }))
            }
            "UnaryOp" => {
                let raw = expect_str(map, "operator")?;
                let operator = UnaryOperator::from_str(raw)
                    .ok_or_else(|| malformed(format!("unknown unary operator `{raw}`")))?;
                Expr::UnaryOp(Box::new(UnaryOp {
                    id: Self::id(map)?,
                    ty: Self::ty(map)?,
                    location: Self::location(map)?,
                    metadata: Self::metadata(map)?,
                    operator,
                    operand: Self::expr(expect_field(map, "operand")?)?,
                }))
            }
            "Call" => Expr::Call(Box::new(Call {
                id: Self::id(map)?,
                ty: Self::ty(map)?,
                location: Self::location(map)?,
                metadata: Self::metadata(map)?,
                arguments: expect_array(expect_field(map, "arguments")?)?
                    .iter()
                    .map(Self::expr)
                    .collect::<Result<_, _>>()?,
                callee: Self::expr(expect_field(map, "callee")?)?,
            })),
            "Member" => Expr::Member(Box::new(Member {
                id: Self::id(map)?,
                ty: Self::ty(map)?,
                location: Self::location(map)?,
                metadata: Self::metadata(map)?,
                computed: expect_bool(map, "computed")?,
                object: Self::expr(expect_field(map, "object")?)?,
                property: Self::expr(expect_field(map, "property")?)?,
            })),
            "ArrayLiteral" => Expr::ArrayLiteral(Box::new(ArrayLiteral {
                id: Self::id(map)?,
                ty: Self::ty(map)?,
                location: Self::location(map)?,
                metadata: Self::metadata(map)?,
                elements: expect_array(expect_field(map, "elements")?)?
                    .iter()
                    .map(Self::expr)
                    .collect::<Result<_, _>>()?,
            })),
            "ObjectLiteral" => Expr::ObjectLiteral(Box::new(ObjectLiteral {
                id: Self::id(map)?,
                ty: Self::ty(map)?,
                location: Self::location(map)?,
                metadata: Self::metadata(map)?,
                properties: expect_array(expect_field(map, "properties")?)?
                    .iter()
                    .map(Self::property)
                    .collect::<Result<_, _>>()?,
            })),
            "Identifier" => Expr::Identifier(Box::new(Identifier {
                id: Self::id(map)?,
                ty: Self::ty(map)?,
                location: Self::location(map)?,
                metadata: Self::metadata(map)?,
                name: expect_str(map, "name")?.to_string(),
            })),
            "Literal" => Expr::Literal(Box::new(Literal {
                id: Self::id(map)?,
                ty: Self::ty(map)?,
                location: Self::location(map)?,
                metadata: Self::metadata(map)?,
                value: Self::literal_value(expect_field(map, "value")?)?,
            })),
            "Assignment" => {
                let raw = expect_str(map, "operator")?;
                let operator = AssignOperator::from_str(raw)
                    .ok_or_else(|| malformed(format!("unknown assignment operator `{raw}`")))?;
                Expr::Assignment(Box::new(Assignment {
                    id: Self::id(map)?,
                    ty: Self::ty(map)?,
                    location: Self::location(map)?,
                    metadata: Self::metadata(map)?,
                    operator,
                    target: Self::expr(expect_field(map, "target")?)?,
                    value: Self::expr(expect_field(map, "value")?)?,
                }))
            }
            "Conditional" => Expr::Conditional(Box::new(Conditional {
                id: Self::id(map)?,
                ty: Self::ty(map)?,
                location: Self::location(map)?,
                metadata: Self::metadata(map)?,
                alternate: Self::expr(expect_field(map, "alternate")?)?,
                condition: Self::expr(expect_field(map, "condition")?)?,
                consequent: Self::expr(expect_field(map, "consequent")?)?,
            })),
            "FunctionDecl" => Expr::FunctionDecl(Box::new(Self::function_decl(map)?)),
            other => {
                return Err(SerializeError::UnknownKind {
                    kind: other.to_string(),
                })
            }
        })
    }

    fn function_decl(
        map: &serde_json::Map<String, Value>,
    ) -> Result<FunctionDecl, SerializeError> {
        Ok(FunctionDecl {
            id: Self::id(map)?,
            ty: Self::ty(map)?,
            location: Self::location(map)?,
            metadata: Self::metadata(map)?,
            body: Self::block(expect_field(map, "body")?)?,
            name: expect_str(map, "name")?.to_string(),
            params: expect_array(expect_field(map, "params")?)?
                .iter()
                .map(Self::parameter)
                .collect::<Result<_, _>>()?,
        })
    }

    fn parameter(value: &Value) -> Result<Parameter, SerializeError> {
        let map = expect_object(value)?;
        let kind = expect_str(map, "kind")?;
        if kind != "Parameter" {
            return Err(malformed(format!("expected Parameter, found `{kind}`")));
        }
        Ok(Parameter {
            id: Self::id(map)?,
            ty: Self::ty(map)?,
            location: Self::location(map)?,
            metadata: Self::metadata(map)?,
            name: expect_str(map, "name")?.to_string(),
        })
    }

    fn var_decl(map: &serde_json::Map<String, Value>) -> Result<VarDecl, SerializeError> {
        Ok(VarDecl {
            id: Self::id(map)?,
            ty: Self::ty(map)?,
            location: Self::location(map)?,
            metadata: Self::metadata(map)?,
            init: Self::opt_expr(map, "init")?,
            name: expect_str(map, "name")?.to_string(),
        })
    }

    fn block(value: &Value) -> Result<Block, SerializeError> {
        let map = expect_object(value)?;
        let kind = expect_str(map, "kind")?;
        if kind != "Block" {
            return Err(malformed(format!("expected Block, found `{kind}`")));
        }
        Self::block_from(map)
    }

    fn block_from(map: &serde_json::Map<String, Value>) -> Result<Block, SerializeError> {
        Ok(Block {
            id: Self::id(map)?,
            ty: Self::ty(map)?,
            location: Self::location(map)?,
            metadata: Self::metadata(map)?,
            statements: Self::stmt_list(expect_field(map, "statements")?)?,
        })
    }

    fn case(value: &Value) -> Result<Case, SerializeError> {
        let map = expect_object(value)?;
        let kind = expect_str(map, "kind")?;
        if kind != "Case" {
            return Err(malformed(format!("expected Case, found `{kind}`")));
        }
        Ok(Case {
            id: Self::id(map)?,
            ty: Self::ty(map)?,
            location: Self::location(map)?,
            metadata: Self::metadata(map)?,
            body: Self::stmt_list(expect_field(map, "body")?)?,
            test: Self::opt_expr(map, "test")?,
        })
    }

    fn property(value: &Value) -> Result<Property, SerializeError> {
        let map = expect_object(value)?;
        let kind = expect_str(map, "kind")?;
        if kind != "Property" {
            return Err(malformed(format!("expected Property, found `{kind}`")));
        }
        Ok(Property {
            id: Self::id(map)?,
            ty: Self::ty(map)?,
            location: Self::location(map)?,
            metadata: Self::metadata(map)?,
            key: expect_str(map, "key")?.to_string(),
            value: Self::expr(expect_field(map, "value")?)?,
        })
    }

    fn literal_value(value: &Value) -> Result<LiteralValue, SerializeError> {
        Ok(match value {
            Value::Null => LiteralValue::Null,
            Value::Bool(b) => LiteralValue::Bool(*b),
            Value::Number(n) => LiteralValue::Number(
                n.as_f64()
                    .ok_or_else(|| malformed("literal number out of f64 range".to_string()))?,
            ),
            Value::String(s) => LiteralValue::Str(s.clone()),
            _ => return Err(malformed("literal value must be a scalar".to_string())),
        })
    }

    fn opt_expr(
        map: &serde_json::Map<String, Value>,
        key: &str,
    ) -> Result<Option<Expr>, SerializeError> {
        match map.get(key) {
            Some(v) => Ok(Some(Self::expr(v)?)),
            None => Ok(None),
        }
    }

    fn id(map: &serde_json::Map<String, Value>) -> Result<NodeId, SerializeError> {
        Ok(NodeId::from_string(expect_str(map, "id")?.to_string()))
    }

    fn ty(map: &serde_json::Map<String, Value>) -> Result<Option<Type>, SerializeError> {
        match map.get("type") {
            Some(v) => Ok(Some(Self::type_value(v)?)),
            None => Ok(None),
        }
    }

    fn type_value(value: &Value) -> Result<Type, SerializeError> {
        match value {
            Value::String(atom) => Ok(match atom.as_str() {
                "number" => Type::Number,
                "string" => Type::String,
                "boolean" => Type::Boolean,
                "null" => Type::Null,
                "void" => Type::Void,
                "unknown" => Type::Unknown,
                other => return Err(malformed(format!("unknown type atom `{other}`"))),
            }),
            Value::Object(map) => {
                if let Some(element) = map.get("array") {
                    return Ok(Type::array(Self::type_value(element)?));
                }
                if let Some(base) = map.get("optional") {
                    return Ok(Type::optional(Self::type_value(base)?));
                }
                if let Some(members) = map.get("union") {
                    return Ok(Type::Union(
                        expect_array(members)?
                            .iter()
                            .map(Self::type_value)
                            .collect::<Result<_, _>>()?,
                    ));
                }
                if let Some(object) = map.get("object") {
                    let object = expect_object(object)?;
                    let raw_fields = expect_object(expect_field(object, "fields")?)?;
                    let mut fields = BTreeMap::new();
                    for (name, field_ty) in raw_fields {
                        fields.insert(name.clone(), Self::type_value(field_ty)?);
                    }
                    return Ok(Type::Object {
                        fields,
                        open: expect_bool(object, "open")?,
                    });
                }
                if let Some(function) = map.get("function") {
                    let function = expect_object(function)?;
                    let params = expect_array(expect_field(function, "params")?)?
                        .iter()
                        .map(Self::type_value)
                        .collect::<Result<_, _>>()?;
                    let ret = Self::type_value(expect_field(function, "return")?)?;
                    return Ok(Type::function(params, ret));
                }
                Err(malformed("unrecognized type object".to_string()))
            }
            _ => Err(malformed("type must be a string or object".to_string())),
        }
    }

    fn location(map: &serde_json::Map<String, Value>) -> Result<Option<Span>, SerializeError> {
        let Some(value) = map.get("location") else {
            return Ok(None);
        };
        let loc = expect_object(value)?;
        let line = expect_u32(loc, "line")?;
        let column = expect_u32(loc, "column")?;
        Ok(Some(Span::new(line, column)))
    }

    fn metadata(map: &serde_json::Map<String, Value>) -> Result<Metadata, SerializeError> {
        let Some(value) = map.get("metadata") else {
            return Ok(Metadata::new());
        };
        let raw = expect_object(value)?;
        let mut metadata = Metadata::new();
        for (key, entry) in raw {
            let meta_value = match entry {
                Value::Bool(b) => MetaValue::Bool(*b),
                Value::Number(n) => {
                    if let Some(i) = n.as_i64() {
                        MetaValue::Int(i)
                    } else {
                        MetaValue::Float(n.as_f64().ok_or_else(|| {
                            malformed("metadata number out of f64 range".to_string())
                        })?)
                    }
                }
                Value::String(s) => MetaValue::Str(s.clone()),
                _ => return Err(malformed(format!("metadata value for `{key}` must be scalar"))),
            };
            metadata.insert(key.clone(), meta_value);
        }
        Ok(metadata)
    }
}

fn malformed(reason: String) -> SerializeError {
    SerializeError::Malformed { reason }
}

fn expect_object(value: &Value) -> Result<&serde_json::Map<String, Value>, SerializeError> {
    value
        .as_object()
        .ok_or_else(|| malformed("expected a JSON object".to_string()))
}

fn expect_array(value: &Value) -> Result<&Vec<Value>, SerializeError> {
    value
        .as_array()
        .ok_or_else(|| malformed("expected a JSON array".to_string()))
}

fn expect_field<'a>(
    map: &'a serde_json::Map<String, Value>,
    key: &str,
) -> Result<&'a Value, SerializeError> {
    map.get(key)
        .ok_or_else(|| malformed(format!("missing field `{key}`")))
}

fn expect_str<'a>(
    map: &'a serde_json::Map<String, Value>,
    key: &str,
) -> Result<&'a str, SerializeError> {
    expect_field(map, key)?
        .as_str()
        .ok_or_else(|| malformed(format!("field `{key}` must be a string")))
}

fn expect_bool(map: &serde_json::Map<String, Value>, key: &str) -> Result<bool, SerializeError> {
    expect_field(map, key)?
        .as_bool()
        .ok_or_else(|| malformed(format!("field `{key}` must be a boolean")))
}

fn expect_u32(map: &serde_json::Map<String, Value>, key: &str) -> Result<u32, SerializeError> {
    let n = expect_field(map, key)?
        .as_u64()
        .ok_or_else(|| malformed(format!("field `{key}` must be an unsigned integer")))?;
    u32::try_from(n).map_err(|_| malformed(format!("field `{key}` exceeds u32 range")))
}
