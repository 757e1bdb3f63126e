//! WebAssembly 1.0 binary emission.
//!
//! The module carries Type, Function, Memory, Export, and Code sections, in
//! that order. Numbers are `f64`; comparison and logical results are `i32`
//! and converted at use sites. Control flow is structured (`block`/`loop`/
//! `if`), with `br` depths computed from an explicit frame stack; `%`
//! expands to `a - trunc(a/b) * b` through scratch locals.
//!
//! This backend's value model is deliberately narrow: strings, arrays,
//! object literals, nested function values, and calls to host functions have
//! no encoding here and fail with `UnsupportedForWasm`, carrying the
//! offending node's location.

use etna_ir::cancel::Cancellation;
use etna_ir::metadata;
use etna_ir::nodes::{
    BinaryOperator, Expr, FunctionDecl, LiteralValue, Program, Span, Stmt, UnaryOperator,
};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

use crate::errors::EmitError;
use crate::Emission;

/// Options for the WebAssembly backend.
#[derive(Debug, Clone)]
pub struct WasmOptions {
    pub memory_initial_pages: u32,
    pub memory_max_pages: Option<u32>,
}

impl Default for WasmOptions {
    fn default() -> Self {
        Self {
            memory_initial_pages: 1,
            memory_max_pages: None,
        }
    }
}

/// Emits a validated program as a WebAssembly binary.
///
/// # Errors
///
/// Fails with [`EmitError::UnsupportedForWasm`] on constructs outside this
/// backend's value model, or [`EmitError::Cancelled`].
pub fn emit(
    program: &Program,
    options: &WasmOptions,
    cancel: &Cancellation,
) -> Result<Emission<Vec<u8>>, EmitError> {
    let mut functions: Vec<CompiledSource> = Vec::new();
    let mut top_level: Vec<Stmt> = Vec::new();
    for stmt in &program.body {
        match stmt {
            Stmt::FunctionDecl(f) => functions.push(CompiledSource::Declared(f)),
            other => top_level.push(other.clone()),
        }
    }
    if !top_level.is_empty() {
        if functions
            .iter()
            .any(|f| matches!(f, CompiledSource::Declared(d) if d.name == "main"))
        {
            return Err(EmitError::UnsupportedForWasm {
                construct: "top-level statements alongside a `main` function".to_string(),
                location: top_level[0].location(),
            });
        }
        functions.push(CompiledSource::Main(top_level));
    }

    let mut emitter = WasmEmitter {
        cancel,
        types: Vec::new(),
        indices: FxHashMap::default(),
        signatures: Vec::new(),
    };

    // Signatures first so calls can be resolved in any order.
    for (index, source) in functions.iter().enumerate() {
        let (name, params, ret) = match source {
            CompiledSource::Declared(f) => {
                if f.params.iter().any(etna_ir::nodes::Parameter::is_rest) {
                    return Err(EmitError::UnsupportedForWasm {
                        construct: "rest parameter".to_string(),
                        location: f.location,
                    });
                }
                (
                    f.name.clone(),
                    f.params.len(),
                    returns_value(&f.body.statements),
                )
            }
            CompiledSource::Main(stmts) => ("main".to_string(), 0, returns_value(stmts)),
        };
        #[allow(clippy::cast_possible_truncation)]
        emitter.indices.insert(name, index as u32);
        emitter.signatures.push(Signature { params, ret });
    }

    let mut bodies: Vec<Vec<u8>> = Vec::with_capacity(functions.len());
    for (index, source) in functions.iter().enumerate() {
        let signature = emitter.signatures[index];
        let body = match source {
            CompiledSource::Declared(f) => {
                if emitter.cancel.is_requested() {
                    return Err(EmitError::Cancelled);
                }
                let params: Vec<String> = f.params.iter().map(|p| p.name.clone()).collect();
                emitter.compile_body(&params, &f.body.statements, signature.ret)?
            }
            CompiledSource::Main(stmts) => {
                if emitter.cancel.is_requested() {
                    return Err(EmitError::Cancelled);
                }
                emitter.compile_body(&[], stmts, signature.ret)?
            }
        };
        bodies.push(body);
    }

    let type_indices: Vec<u32> = emitter
        .signatures
        .iter()
        .map(|s| emitter_type_index(&mut emitter.types, *s))
        .collect();

    let mut out = Vec::new();
    out.extend_from_slice(&[0x00, 0x61, 0x73, 0x6D]);
    out.extend_from_slice(&[0x01, 0x00, 0x00, 0x00]);

    // Type section.
    let mut payload = Vec::new();
    uleb(&mut payload, emitter.types.len() as u64);
    for ty in &emitter.types {
        payload.push(0x60);
        uleb(&mut payload, ty.params as u64);
        for _ in 0..ty.params {
            payload.push(0x7C);
        }
        if ty.ret {
            payload.push(0x01);
            payload.push(0x7C);
        } else {
            payload.push(0x00);
        }
    }
    section(&mut out, 1, &payload);

    // Function section.
    let mut payload = Vec::new();
    uleb(&mut payload, type_indices.len() as u64);
    for index in &type_indices {
        uleb(&mut payload, u64::from(*index));
    }
    section(&mut out, 3, &payload);

    // Memory section: one linear memory.
    let mut payload = Vec::new();
    uleb(&mut payload, 1);
    match options.memory_max_pages {
        Some(max) => {
            payload.push(0x01);
            uleb(&mut payload, u64::from(options.memory_initial_pages));
            uleb(&mut payload, u64::from(max));
        }
        None => {
            payload.push(0x00);
            uleb(&mut payload, u64::from(options.memory_initial_pages));
        }
    }
    section(&mut out, 5, &payload);

    // Export section: every function by name.
    let mut payload = Vec::new();
    uleb(&mut payload, functions.len() as u64);
    for (index, source) in functions.iter().enumerate() {
        let name = match source {
            CompiledSource::Declared(f) => f.name.as_str(),
            CompiledSource::Main(_) => "main",
        };
        uleb(&mut payload, name.len() as u64);
        payload.extend_from_slice(name.as_bytes());
        payload.push(0x00);
        uleb(&mut payload, index as u64);
    }
    section(&mut out, 7, &payload);

    // Code section.
    let mut payload = Vec::new();
    uleb(&mut payload, bodies.len() as u64);
    for body in &bodies {
        uleb(&mut payload, body.len() as u64);
        payload.extend_from_slice(body);
    }
    section(&mut out, 10, &payload);

    Ok(Emission {
        output: out,
        warnings: Vec::new(),
    })
}

enum CompiledSource<'a> {
    Declared(&'a FunctionDecl),
    Main(Vec<Stmt>),
}

#[derive(Clone, Copy, PartialEq, Eq)]
struct Signature {
    params: usize,
    ret: bool,
}

/// Interns a signature into the Type section, first-use order.
fn emitter_type_index(types: &mut Vec<Signature>, signature: Signature) -> u32 {
    if let Some(position) = types.iter().position(|t| *t == signature) {
        #[allow(clippy::cast_possible_truncation)]
        return position as u32;
    }
    types.push(signature);
    #[allow(clippy::cast_possible_truncation)]
    {
        (types.len() - 1) as u32
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum ValType {
    F64,
    I32,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FrameRole {
    /// `br` target for `break`.
    Break,
    /// `br` target for `continue`.
    Continue,
    /// Structural only (an `if` arm or a plain backedge target).
    Neutral,
}

struct FuncCx {
    code: Vec<u8>,
    frames: Vec<FrameRole>,
    scopes: Vec<FxHashMap<String, u32>>,
    pending_locals: VecDeque<u32>,
    mod_scratch: Option<(u32, u32)>,
    switch_scratch: VecDeque<u32>,
    ret: bool,
}

impl FuncCx {
    fn lookup(&self, name: &str) -> Option<u32> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .copied()
    }

    fn branch_depth(&self, role: FrameRole) -> Option<u64> {
        self.frames
            .iter()
            .rev()
            .position(|frame| *frame == role)
            .map(|depth| depth as u64)
    }
}

struct WasmEmitter<'a> {
    cancel: &'a Cancellation,
    types: Vec<Signature>,
    indices: FxHashMap<String, u32>,
    signatures: Vec<Signature>,
}

impl WasmEmitter<'_> {
    #[allow(clippy::cast_possible_truncation)]
    fn compile_body(
        &mut self,
        params: &[String],
        stmts: &[Stmt],
        ret: bool,
    ) -> Result<Vec<u8>, EmitError> {
        let mut locals = Vec::new();
        scan_locals(stmts, &mut locals);
        let mut uses_mod = false;
        scan_mod(stmts, &mut uses_mod);
        let switch_count = count_switches(stmts);

        let param_count = params.len() as u32;
        let named_count = locals.len() as u32;
        let mod_scratch = if uses_mod {
            Some((param_count + named_count, param_count + named_count + 1))
        } else {
            None
        };
        let scratch_base = param_count + named_count + if uses_mod { 2 } else { 0 };
        let switch_scratch: VecDeque<u32> =
            (0..switch_count).map(|k| scratch_base + k as u32).collect();
        let extra_locals = named_count + if uses_mod { 2 } else { 0 } + switch_count as u32;

        let mut cx = FuncCx {
            code: Vec::new(),
            frames: Vec::new(),
            scopes: vec![FxHashMap::default()],
            pending_locals: (param_count..param_count + named_count).collect(),
            mod_scratch,
            switch_scratch,
            ret,
        };
        for (index, param) in params.iter().enumerate() {
            cx.scopes[0].insert(param.clone(), index as u32);
        }

        for stmt in stmts {
            self.stmt(&mut cx, stmt)?;
        }
        if ret {
            // Falling off the end yields the default result.
            f64_const(&mut cx.code, 0.0);
        }
        cx.code.push(0x0B);

        let mut body = Vec::new();
        if extra_locals > 0 {
            uleb(&mut body, 1);
            uleb(&mut body, u64::from(extra_locals));
            body.push(0x7C);
        } else {
            uleb(&mut body, 0);
        }
        body.extend_from_slice(&cx.code);
        Ok(body)
    }

    // --------------------------------------------------------------------
    // Statements
    // --------------------------------------------------------------------

    #[allow(clippy::too_many_lines)]
    fn stmt(&mut self, cx: &mut FuncCx, stmt: &Stmt) -> Result<(), EmitError> {
        match stmt {
            Stmt::FunctionDecl(f) => Err(EmitError::UnsupportedForWasm {
                construct: "nested function declaration".to_string(),
                location: f.location,
            }),
            Stmt::VarDecl(decl) => {
                let index = cx.pending_locals.pop_front().ok_or_else(|| {
                    EmitError::Internal {
                        reason: format!("no pre-assigned local for `{}`", decl.name),
                    }
                })?;
                cx.scopes
                    .last_mut()
                    .expect("function scope always present")
                    .insert(decl.name.clone(), index);
                match &decl.init {
                    Some(init) => self.expr_as_f64(cx, init)?,
                    None => f64_const(&mut cx.code, 0.0),
                }
                local_op(&mut cx.code, 0x21, index);
                Ok(())
            }
            Stmt::Block(b) => {
                cx.scopes.push(FxHashMap::default());
                for stmt in &b.statements {
                    self.stmt(cx, stmt)?;
                }
                cx.scopes.pop();
                Ok(())
            }
            Stmt::Return(r) => {
                match (&r.value, cx.ret) {
                    (Some(value), true) => self.expr_as_f64(cx, value)?,
                    (Some(value), false) => {
                        if let Some(_ty) = self.expr(cx, value)? {
                            cx.code.push(0x1A);
                        }
                    }
                    (None, true) => f64_const(&mut cx.code, 0.0),
                    (None, false) => {}
                }
                cx.code.push(0x0F);
                Ok(())
            }
            Stmt::If(s) => {
                self.expr_as_i32(cx, &s.condition)?;
                cx.code.extend_from_slice(&[0x04, 0x40]);
                cx.frames.push(FrameRole::Neutral);
                cx.scopes.push(FxHashMap::default());
                for stmt in &s.consequent.statements {
                    self.stmt(cx, stmt)?;
                }
                cx.scopes.pop();
                if let Some(alternate) = &s.alternate {
                    cx.code.push(0x05);
                    cx.scopes.push(FxHashMap::default());
                    for stmt in &alternate.statements {
                        self.stmt(cx, stmt)?;
                    }
                    cx.scopes.pop();
                }
                cx.code.push(0x0B);
                cx.frames.pop();
                Ok(())
            }
            Stmt::While(s) => {
                cx.code.extend_from_slice(&[0x02, 0x40]);
                cx.frames.push(FrameRole::Break);
                cx.code.extend_from_slice(&[0x03, 0x40]);
                cx.frames.push(FrameRole::Continue);
                self.expr_as_i32(cx, &s.condition)?;
                cx.code.push(0x45);
                let exit = cx
                    .branch_depth(FrameRole::Break)
                    .expect("break frame pushed above");
                cx.code.push(0x0D);
                uleb(&mut cx.code, exit);
                cx.scopes.push(FxHashMap::default());
                for stmt in &s.body.statements {
                    self.stmt(cx, stmt)?;
                }
                cx.scopes.pop();
                cx.code.push(0x0C);
                uleb(&mut cx.code, 0);
                cx.code.push(0x0B);
                cx.frames.pop();
                cx.code.push(0x0B);
                cx.frames.pop();
                Ok(())
            }
            Stmt::DoWhile(s) => {
                cx.code.extend_from_slice(&[0x02, 0x40]);
                cx.frames.push(FrameRole::Break);
                cx.code.extend_from_slice(&[0x03, 0x40]);
                cx.frames.push(FrameRole::Neutral);
                cx.code.extend_from_slice(&[0x02, 0x40]);
                cx.frames.push(FrameRole::Continue);
                cx.scopes.push(FxHashMap::default());
                for stmt in &s.body.statements {
                    self.stmt(cx, stmt)?;
                }
                cx.scopes.pop();
                cx.code.push(0x0B);
                cx.frames.pop();
                self.expr_as_i32(cx, &s.condition)?;
                cx.code.push(0x0D);
                uleb(&mut cx.code, 0);
                cx.code.push(0x0B);
                cx.frames.pop();
                cx.code.push(0x0B);
                cx.frames.pop();
                Ok(())
            }
            Stmt::For(s) => {
                cx.scopes.push(FxHashMap::default());
                if let Some(init) = &s.init {
                    self.stmt(cx, init)?;
                }
                cx.code.extend_from_slice(&[0x02, 0x40]);
                cx.frames.push(FrameRole::Break);
                cx.code.extend_from_slice(&[0x03, 0x40]);
                cx.frames.push(FrameRole::Neutral);
                self.expr_as_i32(cx, &s.test)?;
                cx.code.push(0x45);
                let exit = cx
                    .branch_depth(FrameRole::Break)
                    .expect("break frame pushed above");
                cx.code.push(0x0D);
                uleb(&mut cx.code, exit);
                cx.code.extend_from_slice(&[0x02, 0x40]);
                cx.frames.push(FrameRole::Continue);
                cx.scopes.push(FxHashMap::default());
                for stmt in &s.body.statements {
                    self.stmt(cx, stmt)?;
                }
                cx.scopes.pop();
                cx.code.push(0x0B);
                cx.frames.pop();
                if let Some(update) = &s.update {
                    if let Some(_ty) = self.expr(cx, update)? {
                        cx.code.push(0x1A);
                    }
                }
                cx.code.push(0x0C);
                uleb(&mut cx.code, 0);
                cx.code.push(0x0B);
                cx.frames.pop();
                cx.code.push(0x0B);
                cx.frames.pop();
                cx.scopes.pop();
                Ok(())
            }
            Stmt::Switch(s) => self.switch(cx, s),
            Stmt::Break(b) => {
                let Some(depth) = cx.branch_depth(FrameRole::Break) else {
                    return Err(EmitError::Internal {
                        reason: format!(
                            "{}break outside a loop or switch",
                            crate::errors::at(&b.location)
                        ),
                    });
                };
                cx.code.push(0x0C);
                uleb(&mut cx.code, depth);
                Ok(())
            }
            Stmt::Continue(c) => {
                let Some(depth) = cx.branch_depth(FrameRole::Continue) else {
                    return Err(EmitError::Internal {
                        reason: format!(
                            "{}continue outside a loop",
                            crate::errors::at(&c.location)
                        ),
                    });
                };
                cx.code.push(0x0C);
                uleb(&mut cx.code, depth);
                Ok(())
            }
            Stmt::ExpressionStmt(s) => {
                if let Some(_ty) = self.expr(cx, &s.expression)? {
                    cx.code.push(0x1A);
                }
                Ok(())
            }
        }
    }

    fn switch(&mut self, cx: &mut FuncCx, s: &etna_ir::nodes::Switch) -> Result<(), EmitError> {
        let scratch = cx.switch_scratch.pop_front().ok_or_else(|| EmitError::Internal {
            reason: "no pre-assigned switch scratch local".to_string(),
        })?;
        self.expr_as_f64(cx, &s.discriminant)?;
        local_op(&mut cx.code, 0x21, scratch);

        cx.code.extend_from_slice(&[0x02, 0x40]);
        cx.frames.push(FrameRole::Break);
        cx.scopes.push(FxHashMap::default());
        let tests: Vec<&etna_ir::nodes::Case> =
            s.cases.iter().filter(|c| c.test.is_some()).collect();
        let default = s.cases.iter().find(|c| c.test.is_none());
        let mut open_ifs = 0usize;
        for case in &tests {
            local_op(&mut cx.code, 0x20, scratch);
            let test = case.test.as_ref().expect("filtered on test presence");
            self.expr_as_f64(cx, test)?;
            cx.code.push(0x61);
            cx.code.extend_from_slice(&[0x04, 0x40]);
            cx.frames.push(FrameRole::Neutral);
            open_ifs += 1;
            for stmt in &case.body {
                self.stmt(cx, stmt)?;
            }
            cx.code.push(0x05);
        }
        if let Some(default) = default {
            for stmt in &default.body {
                self.stmt(cx, stmt)?;
            }
        }
        for _ in 0..open_ifs {
            cx.code.push(0x0B);
            cx.frames.pop();
        }
        cx.scopes.pop();
        cx.code.push(0x0B);
        cx.frames.pop();
        Ok(())
    }

    // --------------------------------------------------------------------
    // Expressions
    // --------------------------------------------------------------------

    fn expr_as_f64(&mut self, cx: &mut FuncCx, expr: &Expr) -> Result<(), EmitError> {
        match self.expr(cx, expr)? {
            Some(ValType::F64) => Ok(()),
            Some(ValType::I32) => {
                cx.code.push(0xB7);
                Ok(())
            }
            None => Err(EmitError::UnsupportedForWasm {
                construct: "void value used as a number".to_string(),
                location: expr.location(),
            }),
        }
    }

    fn expr_as_i32(&mut self, cx: &mut FuncCx, expr: &Expr) -> Result<(), EmitError> {
        match self.expr(cx, expr)? {
            Some(ValType::I32) => Ok(()),
            Some(ValType::F64) => {
                f64_const(&mut cx.code, 0.0);
                cx.code.push(0x62);
                Ok(())
            }
            None => Err(EmitError::UnsupportedForWasm {
                construct: "void value used as a condition".to_string(),
                location: expr.location(),
            }),
        }
    }

    #[allow(clippy::too_many_lines)]
    fn expr(&mut self, cx: &mut FuncCx, expr: &Expr) -> Result<Option<ValType>, EmitError> {
        match expr {
            Expr::Literal(lit) => match &lit.value {
                LiteralValue::Number(n) => {
                    f64_const(&mut cx.code, *n);
                    Ok(Some(ValType::F64))
                }
                LiteralValue::Bool(b) => {
                    cx.code.push(0x41);
                    sleb(&mut cx.code, i64::from(*b));
                    Ok(Some(ValType::I32))
                }
                LiteralValue::Null => Err(EmitError::UnsupportedForWasm {
                    construct: "null literal".to_string(),
                    location: lit.location,
                }),
                LiteralValue::Str(_) => Err(EmitError::UnsupportedForWasm {
                    construct: "string constant (no data segment in this layout)".to_string(),
                    location: lit.location,
                }),
            },
            Expr::Identifier(id) => {
                let Some(index) = cx.lookup(&id.name) else {
                    return Err(EmitError::UnsupportedForWasm {
                        construct: format!("unresolved identifier `{}`", id.name),
                        location: id.location,
                    });
                };
                local_op(&mut cx.code, 0x20, index);
                Ok(Some(ValType::F64))
            }
            Expr::BinaryOp(b) => {
                let op = b.operator;
                if op.is_logical() {
                    self.expr_as_i32(cx, &b.left)?;
                    self.expr_as_i32(cx, &b.right)?;
                    cx.code
                        .push(if op == BinaryOperator::And { 0x71 } else { 0x72 });
                    return Ok(Some(ValType::I32));
                }
                if op.is_comparison() {
                    self.expr_as_f64(cx, &b.left)?;
                    self.expr_as_f64(cx, &b.right)?;
                    cx.code.push(match op {
                        BinaryOperator::Eq => 0x61,
                        BinaryOperator::Ne => 0x62,
                        BinaryOperator::Lt => 0x63,
                        BinaryOperator::Gt => 0x64,
                        BinaryOperator::Le => 0x65,
                        BinaryOperator::Ge => 0x66,
                        _ => unreachable!("comparison operators only"),
                    });
                    return Ok(Some(ValType::I32));
                }
                self.expr_as_f64(cx, &b.left)?;
                self.expr_as_f64(cx, &b.right)?;
                self.arith(cx, op, b.location)?;
                Ok(Some(ValType::F64))
            }
            Expr::UnaryOp(u) => match u.operator {
                UnaryOperator::Not => {
                    self.expr_as_i32(cx, &u.operand)?;
                    cx.code.push(0x45);
                    Ok(Some(ValType::I32))
                }
                UnaryOperator::Neg => {
                    self.expr_as_f64(cx, &u.operand)?;
                    cx.code.push(0x9A);
                    Ok(Some(ValType::F64))
                }
            },
            Expr::Call(call) => self.call(cx, call),
            Expr::Assignment(a) => {
                let Expr::Identifier(target) = &a.target else {
                    return Err(EmitError::UnsupportedForWasm {
                        construct: "assignment to a member expression".to_string(),
                        location: a.location,
                    });
                };
                let Some(index) = cx.lookup(&target.name) else {
                    return Err(EmitError::UnsupportedForWasm {
                        construct: format!("assignment to unresolved identifier `{}`", target.name),
                        location: a.location,
                    });
                };
                match a.operator.binary_operator() {
                    None => self.expr_as_f64(cx, &a.value)?,
                    Some(op) => {
                        local_op(&mut cx.code, 0x20, index);
                        self.expr_as_f64(cx, &a.value)?;
                        self.arith(cx, op, a.location)?;
                    }
                }
                // tee keeps the stored value as the expression's value.
                local_op(&mut cx.code, 0x22, index);
                Ok(Some(ValType::F64))
            }
            Expr::Conditional(c) => {
                self.expr_as_i32(cx, &c.condition)?;
                cx.code.extend_from_slice(&[0x04, 0x7C]);
                self.expr_as_f64(cx, &c.consequent)?;
                cx.code.push(0x05);
                self.expr_as_f64(cx, &c.alternate)?;
                cx.code.push(0x0B);
                Ok(Some(ValType::F64))
            }
            Expr::Member(m) => Err(EmitError::UnsupportedForWasm {
                construct: "member access (no object model in this layout)".to_string(),
                location: m.location,
            }),
            Expr::ArrayLiteral(a) => Err(EmitError::UnsupportedForWasm {
                construct: "array literal".to_string(),
                location: a.location,
            }),
            Expr::ObjectLiteral(o) => {
                let construct = if o
                    .properties
                    .iter()
                    .any(|p| p.metadata.flag(metadata::IS_METHOD))
                {
                    "object literal with a method property".to_string()
                } else {
                    "object literal".to_string()
                };
                Err(EmitError::UnsupportedForWasm {
                    construct,
                    location: o.location,
                })
            }
            Expr::FunctionDecl(f) => Err(EmitError::UnsupportedForWasm {
                construct: "function value".to_string(),
                location: f.location,
            }),
        }
    }

    fn call(
        &mut self,
        cx: &mut FuncCx,
        call: &etna_ir::nodes::Call,
    ) -> Result<Option<ValType>, EmitError> {
        if call.metadata.flag(metadata::IS_NEW) {
            return Err(EmitError::UnsupportedForWasm {
                construct: "constructor call".to_string(),
                location: call.location,
            });
        }
        let Expr::Identifier(callee) = &call.callee else {
            return Err(EmitError::UnsupportedForWasm {
                construct: "indirect or host call".to_string(),
                location: call.location,
            });
        };
        let Some(&index) = self.indices.get(&callee.name) else {
            return Err(EmitError::UnsupportedForWasm {
                construct: format!("call to unknown function `{}`", callee.name),
                location: call.location,
            });
        };
        let signature = self.signatures[index as usize];
        for argument in &call.arguments {
            self.expr_as_f64(cx, argument)?;
        }
        cx.code.push(0x10);
        uleb(&mut cx.code, u64::from(index));
        Ok(if signature.ret {
            Some(ValType::F64)
        } else {
            None
        })
    }

    /// Applies an arithmetic operator to the two `f64`s on the stack. `%`
    /// expands to `a - trunc(a/b) * b` through the scratch pair.
    fn arith(
        &mut self,
        cx: &mut FuncCx,
        op: BinaryOperator,
        location: Option<Span>,
    ) -> Result<(), EmitError> {
        match op {
            BinaryOperator::Add => cx.code.push(0xA0),
            BinaryOperator::Sub => cx.code.push(0xA1),
            BinaryOperator::Mul => cx.code.push(0xA2),
            BinaryOperator::Div => cx.code.push(0xA3),
            BinaryOperator::Mod => {
                let Some((s0, s1)) = cx.mod_scratch else {
                    return Err(EmitError::Internal {
                        reason: format!(
                            "{}no scratch locals reserved for %",
                            crate::errors::at(&location)
                        ),
                    });
                };
                local_op(&mut cx.code, 0x21, s1);
                local_op(&mut cx.code, 0x21, s0);
                local_op(&mut cx.code, 0x20, s0);
                local_op(&mut cx.code, 0x20, s0);
                local_op(&mut cx.code, 0x20, s1);
                cx.code.push(0xA3);
                cx.code.push(0x9D);
                local_op(&mut cx.code, 0x20, s1);
                cx.code.push(0xA2);
                cx.code.push(0xA1);
            }
            other => {
                return Err(EmitError::Internal {
                    reason: format!("`{other}` is not an arithmetic operator"),
                });
            }
        }
        Ok(())
    }
}

// ------------------------------------------------------------------------
// Encoding helpers
// ------------------------------------------------------------------------

fn section(out: &mut Vec<u8>, id: u8, payload: &[u8]) {
    out.push(id);
    uleb(out, payload.len() as u64);
    out.extend_from_slice(payload);
}

fn uleb(out: &mut Vec<u8>, value: u64) {
    leb128::write::unsigned(out, value).expect("writing to a Vec cannot fail");
}

fn sleb(out: &mut Vec<u8>, value: i64) {
    leb128::write::signed(out, value).expect("writing to a Vec cannot fail");
}

fn f64_const(out: &mut Vec<u8>, value: f64) {
    out.push(0x44);
    out.extend_from_slice(&value.to_le_bytes());
}

fn local_op(out: &mut Vec<u8>, opcode: u8, index: u32) {
    out.push(opcode);
    uleb(out, u64::from(index));
}

/// Collects local declarations in pre-order, stopping at nested functions.
fn scan_locals(stmts: &[Stmt], out: &mut Vec<String>) {
    for stmt in stmts {
        match stmt {
            Stmt::VarDecl(decl) => out.push(decl.name.clone()),
            Stmt::Block(b) => scan_locals(&b.statements, out),
            Stmt::If(s) => {
                scan_locals(&s.consequent.statements, out);
                if let Some(alternate) = &s.alternate {
                    scan_locals(&alternate.statements, out);
                }
            }
            Stmt::While(s) => scan_locals(&s.body.statements, out),
            Stmt::DoWhile(s) => scan_locals(&s.body.statements, out),
            Stmt::For(s) => {
                if let Some(init) = &s.init {
                    scan_locals(std::slice::from_ref(init), out);
                }
                scan_locals(&s.body.statements, out);
            }
            Stmt::Switch(s) => {
                for case in &s.cases {
                    scan_locals(&case.body, out);
                }
            }
            _ => {}
        }
    }
}

fn count_switches(stmts: &[Stmt]) -> usize {
    stmts
        .iter()
        .map(|stmt| match stmt {
            Stmt::Switch(s) => {
                1 + s
                    .cases
                    .iter()
                    .map(|case| count_switches(&case.body))
                    .sum::<usize>()
            }
            Stmt::Block(b) => count_switches(&b.statements),
            Stmt::If(s) => {
                count_switches(&s.consequent.statements)
                    + s.alternate
                        .as_ref()
                        .map_or(0, |alt| count_switches(&alt.statements))
            }
            Stmt::While(s) => count_switches(&s.body.statements),
            Stmt::DoWhile(s) => count_switches(&s.body.statements),
            Stmt::For(s) => count_switches(&s.body.statements),
            _ => 0,
        })
        .sum()
}

fn scan_mod_expr(expr: &Expr, found: &mut bool) {
    if *found {
        return;
    }
    match expr {
        Expr::BinaryOp(b) => {
            if b.operator == BinaryOperator::Mod {
                *found = true;
                return;
            }
            scan_mod_expr(&b.left, found);
            scan_mod_expr(&b.right, found);
        }
        Expr::UnaryOp(u) => scan_mod_expr(&u.operand, found),
        Expr::Call(c) => {
            scan_mod_expr(&c.callee, found);
            for argument in &c.arguments {
                scan_mod_expr(argument, found);
            }
        }
        Expr::Member(m) => {
            scan_mod_expr(&m.object, found);
            scan_mod_expr(&m.property, found);
        }
        Expr::ArrayLiteral(a) => {
            for element in &a.elements {
                scan_mod_expr(element, found);
            }
        }
        Expr::ObjectLiteral(o) => {
            for property in &o.properties {
                scan_mod_expr(&property.value, found);
            }
        }
        Expr::Assignment(a) => {
            if a.operator == etna_ir::nodes::AssignOperator::ModAssign {
                *found = true;
                return;
            }
            scan_mod_expr(&a.target, found);
            scan_mod_expr(&a.value, found);
        }
        Expr::Conditional(c) => {
            scan_mod_expr(&c.condition, found);
            scan_mod_expr(&c.consequent, found);
            scan_mod_expr(&c.alternate, found);
        }
        Expr::Identifier(_) | Expr::Literal(_) | Expr::FunctionDecl(_) => {}
    }
}

fn scan_mod(stmts: &[Stmt], found: &mut bool) {
    for stmt in stmts {
        if *found {
            return;
        }
        match stmt {
            Stmt::VarDecl(decl) => {
                if let Some(init) = &decl.init {
                    scan_mod_expr(init, found);
                }
            }
            Stmt::Block(b) => scan_mod(&b.statements, found),
            Stmt::Return(r) => {
                if let Some(value) = &r.value {
                    scan_mod_expr(value, found);
                }
            }
            Stmt::If(s) => {
                scan_mod_expr(&s.condition, found);
                scan_mod(&s.consequent.statements, found);
                if let Some(alternate) = &s.alternate {
                    scan_mod(&alternate.statements, found);
                }
            }
            Stmt::While(s) => {
                scan_mod_expr(&s.condition, found);
                scan_mod(&s.body.statements, found);
            }
            Stmt::DoWhile(s) => {
                scan_mod_expr(&s.condition, found);
                scan_mod(&s.body.statements, found);
            }
            Stmt::For(s) => {
                if let Some(init) = &s.init {
                    scan_mod(std::slice::from_ref(init), found);
                }
                scan_mod_expr(&s.test, found);
                if let Some(update) = &s.update {
                    scan_mod_expr(update, found);
                }
                scan_mod(&s.body.statements, found);
            }
            Stmt::Switch(s) => {
                scan_mod_expr(&s.discriminant, found);
                for case in &s.cases {
                    if let Some(test) = &case.test {
                        scan_mod_expr(test, found);
                    }
                    scan_mod(&case.body, found);
                }
            }
            Stmt::ExpressionStmt(s) => scan_mod_expr(&s.expression, found),
            Stmt::Break(_) | Stmt::Continue(_) | Stmt::FunctionDecl(_) => {}
        }
    }
}

/// True when any return in this body carries a value.
fn returns_value(stmts: &[Stmt]) -> bool {
    stmts.iter().any(|stmt| match stmt {
        Stmt::Return(r) => r.value.is_some(),
        Stmt::Block(b) => returns_value(&b.statements),
        Stmt::If(s) => {
            returns_value(&s.consequent.statements)
                || s
                    .alternate
                    .as_ref()
                    .is_some_and(|alt| returns_value(&alt.statements))
        }
        Stmt::While(s) => returns_value(&s.body.statements),
        Stmt::DoWhile(s) => returns_value(&s.body.statements),
        Stmt::For(s) => returns_value(&s.body.statements),
        Stmt::Switch(s) => s.cases.iter().any(|case| returns_value(&case.body)),
        _ => false,
    })
}
