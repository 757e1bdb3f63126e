//! LLVM textual IR emission.
//!
//! The module is built in SSA form without phi nodes: every parameter and
//! local gets a stack slot (`alloca`) in the entry block, reads become
//! `load`s and writes become `store`s. Control flow uses labeled basic
//! blocks (`if_then<N>`, `while_cond<N>`, `for_update<N>`, …) with a
//! per-function monotonic label counter; `break`/`continue` branch through a
//! loop stack. Value names (`%<base><N>`) come from a per-function value
//! counter, so each name is assigned exactly once.
//!
//! Numbers are `double` (literals rendered as bit-pattern hex so the text is
//! toolchain-independent), booleans `i1`, strings opaque `ptr`s into private
//! constants interned per module. Arrays and object literals lower to
//! `malloc` plus 8-byte element stores; their layout is not standardized at
//! this level.

use etna_ir::cancel::Cancellation;
use etna_ir::diagnostics::Warning;
use etna_ir::metadata;
use etna_ir::nodes::{
    BinaryOp, BinaryOperator, Block, Expr, FunctionDecl, LiteralValue, Program, Span, Stmt,
    UnaryOperator, VarDecl,
};
use etna_ir::types::Type;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::fmt::Write as _;

use crate::errors::EmitError;
use crate::Emission;

/// Options for the LLVM backend.
#[derive(Debug, Clone)]
pub struct LlvmOptions {
    pub module_name: String,
    pub target_triple: String,
}

impl Default for LlvmOptions {
    fn default() -> Self {
        Self {
            module_name: "main".to_string(),
            target_triple: "x86_64-unknown-linux-gnu".to_string(),
        }
    }
}

/// Emits a validated program as an LLVM textual module.
///
/// # Errors
///
/// Fails with [`EmitError::UnsupportedForLlvm`] on constructs outside this
/// backend's model (nested function values, named member access, string
/// arithmetic), or [`EmitError::Cancelled`].
pub fn emit(
    program: &Program,
    options: &LlvmOptions,
    cancel: &Cancellation,
) -> Result<Emission<String>, EmitError> {
    let mut emitter = LlvmEmitter {
        strings: StringTable::default(),
        warnings: Vec::new(),
        cancel,
        functions: FxHashMap::default(),
    };

    let mut top_level: Vec<&Stmt> = Vec::new();
    let mut declared: Vec<&FunctionDecl> = Vec::new();
    for stmt in &program.body {
        match stmt {
            Stmt::FunctionDecl(f) => declared.push(f),
            other => top_level.push(other),
        }
    }
    for f in &declared {
        emitter.functions.insert(
            f.name.clone(),
            Signature {
                ret: if returns_value(&f.body.statements) {
                    LlvmType::Double
                } else {
                    LlvmType::Void
                },
            },
        );
    }
    if !top_level.is_empty() {
        if emitter.functions.contains_key("main") {
            return Err(EmitError::UnsupportedForLlvm {
                construct: "top-level statements alongside a `main` function".to_string(),
                location: top_level[0].location(),
            });
        }
        emitter
            .functions
            .insert("main".to_string(), Signature { ret: LlvmType::Void });
    }

    let mut bodies = Vec::new();
    for f in &declared {
        bodies.push(emitter.emit_function(f)?);
    }
    if !top_level.is_empty() {
        bodies.push(emitter.emit_main(&top_level)?);
    }

    let mut out = String::new();
    let _ = writeln!(out, "; ModuleID = '{}'", options.module_name);
    let _ = writeln!(out, "target triple = \"{}\"", options.target_triple);
    out.push('\n');
    out.push_str("declare i32 @printf(ptr, ...)\n");
    out.push_str("declare ptr @malloc(i64)\n");
    out.push_str("declare void @free(ptr)\n");
    out.push_str("declare ptr @memcpy(ptr, ptr, i64)\n");
    if !emitter.strings.constants.is_empty() {
        out.push('\n');
        for (index, constant) in emitter.strings.constants.iter().enumerate() {
            let _ = writeln!(
                out,
                "@.str.{index} = private unnamed_addr constant [{} x i8] c\"{}\"",
                constant.len() + 1,
                escape_bytes(constant)
            );
        }
    }
    for body in bodies {
        out.push('\n');
        out.push_str(&body);
    }
    Ok(Emission {
        output: out,
        warnings: emitter.warnings,
    })
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum LlvmType {
    Double,
    I1,
    Ptr,
    Void,
}

impl LlvmType {
    fn as_str(self) -> &'static str {
        match self {
            LlvmType::Double => "double",
            LlvmType::I1 => "i1",
            LlvmType::Ptr => "ptr",
            LlvmType::Void => "void",
        }
    }
}

#[derive(Clone)]
struct Value {
    repr: String,
    ty: LlvmType,
}

#[derive(Clone, Copy)]
struct Signature {
    ret: LlvmType,
}

#[derive(Default)]
struct StringTable {
    constants: Vec<String>,
    index: FxHashMap<String, usize>,
}

impl StringTable {
    /// Interns a constant, returning its `@.str.<idx>` index.
    fn intern(&mut self, text: &str) -> usize {
        if let Some(&index) = self.index.get(text) {
            return index;
        }
        let index = self.constants.len();
        self.constants.push(text.to_string());
        self.index.insert(text.to_string(), index);
        index
    }
}

#[derive(Clone)]
struct Local {
    slot: String,
    ty: LlvmType,
}

struct BasicBlock {
    label: String,
    insts: Vec<String>,
    terminated: bool,
}

struct LoopLabels {
    /// Absent for switch frames, which accept `break` but not `continue`.
    continue_label: Option<String>,
    break_label: String,
}

struct FuncCx {
    value_counter: u32,
    label_counter: u32,
    blocks: Vec<BasicBlock>,
    current: usize,
    scopes: Vec<FxHashMap<String, Local>>,
    pending_slots: VecDeque<Local>,
    loop_stack: Vec<LoopLabels>,
    ret: LlvmType,
}

impl FuncCx {
    fn lookup(&self, name: &str) -> Option<&Local> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }
}

struct LlvmEmitter<'a> {
    strings: StringTable,
    warnings: Vec<Warning>,
    cancel: &'a Cancellation,
    functions: FxHashMap<String, Signature>,
}

impl LlvmEmitter<'_> {
    // --------------------------------------------------------------------
    // Function skeletons
    // --------------------------------------------------------------------

    fn emit_function(&mut self, f: &FunctionDecl) -> Result<String, EmitError> {
        if self.cancel.is_requested() {
            return Err(EmitError::Cancelled);
        }
        let signature = self.functions[&f.name];
        let params: Vec<String> = f.params.iter().map(|p| p.name.clone()).collect();
        self.compile_body(&f.name, &params, &f.body.statements, signature.ret)
    }

    fn emit_main(&mut self, top_level: &[&Stmt]) -> Result<String, EmitError> {
        if self.cancel.is_requested() {
            return Err(EmitError::Cancelled);
        }
        let stmts: Vec<Stmt> = top_level.iter().map(|s| (*s).clone()).collect();
        self.compile_body("main", &[], &stmts, LlvmType::Void)
    }

    #[allow(clippy::too_many_lines)]
    fn compile_body(
        &mut self,
        name: &str,
        params: &[String],
        stmts: &[Stmt],
        ret: LlvmType,
    ) -> Result<String, EmitError> {
        let mut cx = FuncCx {
            value_counter: 0,
            label_counter: 0,
            blocks: vec![BasicBlock {
                label: "entry".to_string(),
                insts: Vec::new(),
                terminated: false,
            }],
            current: 0,
            scopes: vec![FxHashMap::default()],
            pending_slots: VecDeque::new(),
            loop_stack: Vec::new(),
            ret,
        };

        // Entry block: one stack slot per parameter and local. Storing the
        // incoming parameter value keeps everything mutable without phi
        // nodes.
        let mut used_slots: FxHashSet<String> = FxHashSet::default();
        for param in params {
            let slot = slot_name(param, &mut used_slots);
            inst(&mut cx, &format!("{slot} = alloca double"));
            inst(&mut cx, &format!("store double %{param}, ptr {slot}"));
            cx.scopes[0].insert(
                param.clone(),
                Local {
                    slot,
                    ty: LlvmType::Double,
                },
            );
        }
        let mut locals = Vec::new();
        scan_locals(stmts, &mut locals);
        for (local_name, ty) in locals {
            let slot = slot_name(&local_name, &mut used_slots);
            inst(&mut cx, &format!("{slot} = alloca {}", ty.as_str()));
            cx.pending_slots.push_back(Local { slot, ty });
        }

        for stmt in stmts {
            self.stmt(&mut cx, stmt)?;
        }

        // Control can fall off the end; supply the default return.
        match cx.ret {
            LlvmType::Void => terminate(&mut cx, "ret void"),
            LlvmType::Double => terminate(&mut cx, "ret double 0x0000000000000000"),
            LlvmType::I1 => terminate(&mut cx, "ret i1 false"),
            LlvmType::Ptr => terminate(&mut cx, "ret ptr null"),
        }

        let rendered_params = params
            .iter()
            .map(|p| format!("double %{p}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut out = format!("define {} @{name}({rendered_params}) {{\n", ret.as_str());
        for block in &cx.blocks {
            let _ = writeln!(out, "{}:", block.label);
            for inst in &block.insts {
                let _ = writeln!(out, "  {inst}");
            }
        }
        out.push_str("}\n");
        Ok(out)
    }

    // --------------------------------------------------------------------
    // Statements
    // --------------------------------------------------------------------

    #[allow(clippy::too_many_lines)]
    fn stmt(&mut self, cx: &mut FuncCx, stmt: &Stmt) -> Result<(), EmitError> {
        match stmt {
            Stmt::FunctionDecl(f) => Err(EmitError::UnsupportedForLlvm {
                construct: "nested function declaration".to_string(),
                location: f.location,
            }),
            Stmt::VarDecl(decl) => self.var_decl(cx, decl),
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
                    (Some(value), LlvmType::Double) => {
                        let value = self.value(cx, value)?;
                        let value = self.to_double(cx, value, r.location)?;
                        terminate(cx, &format!("ret double {}", value.repr));
                    }
                    (Some(value), _) => {
                        // Value discarded; the validator warns about this.
                        let _ = self.value(cx, value)?;
                        terminate(cx, "ret void");
                    }
                    (None, LlvmType::Double) => {
                        terminate(cx, "ret double 0x0000000000000000");
                    }
                    (None, _) => terminate(cx, "ret void"),
                }
                Ok(())
            }
            Stmt::If(s) => {
                let n = next_label(cx);
                let condition = self.value(cx, &s.condition)?;
                let condition = self.to_i1(cx, condition, s.location)?;
                let then_label = format!("if_then{n}");
                let end_label = format!("if_end{n}");
                let else_label = if s.alternate.is_some() {
                    format!("if_else{n}")
                } else {
                    end_label.clone()
                };
                terminate(
                    cx,
                    &format!("br i1 {}, label %{then_label}, label %{else_label}", condition.repr),
                );
                new_block(cx, then_label);
                self.scoped_block(cx, &s.consequent)?;
                terminate(cx, &format!("br label %{end_label}"));
                if let Some(alternate) = &s.alternate {
                    new_block(cx, else_label);
                    self.scoped_block(cx, alternate)?;
                    terminate(cx, &format!("br label %{end_label}"));
                }
                new_block(cx, end_label);
                Ok(())
            }
            Stmt::While(s) => {
                let n = next_label(cx);
                let cond_label = format!("while_cond{n}");
                let body_label = format!("while_body{n}");
                let end_label = format!("while_end{n}");
                terminate(cx, &format!("br label %{cond_label}"));
                new_block(cx, cond_label.clone());
                let condition = self.value(cx, &s.condition)?;
                let condition = self.to_i1(cx, condition, s.location)?;
                terminate(
                    cx,
                    &format!("br i1 {}, label %{body_label}, label %{end_label}", condition.repr),
                );
                new_block(cx, body_label);
                cx.loop_stack.push(LoopLabels {
                    continue_label: Some(cond_label.clone()),
                    break_label: end_label.clone(),
                });
                self.scoped_block(cx, &s.body)?;
                cx.loop_stack.pop();
                terminate(cx, &format!("br label %{cond_label}"));
                new_block(cx, end_label);
                Ok(())
            }
            Stmt::DoWhile(s) => {
                let n = next_label(cx);
                let cond_label = format!("while_cond{n}");
                let body_label = format!("while_body{n}");
                let end_label = format!("while_end{n}");
                terminate(cx, &format!("br label %{body_label}"));
                new_block(cx, body_label.clone());
                cx.loop_stack.push(LoopLabels {
                    continue_label: Some(cond_label.clone()),
                    break_label: end_label.clone(),
                });
                self.scoped_block(cx, &s.body)?;
                cx.loop_stack.pop();
                terminate(cx, &format!("br label %{cond_label}"));
                new_block(cx, cond_label);
                let condition = self.value(cx, &s.condition)?;
                let condition = self.to_i1(cx, condition, s.location)?;
                terminate(
                    cx,
                    &format!("br i1 {}, label %{body_label}, label %{end_label}", condition.repr),
                );
                new_block(cx, end_label);
                Ok(())
            }
            Stmt::For(s) => {
                cx.scopes.push(FxHashMap::default());
                if let Some(init) = &s.init {
                    self.stmt(cx, init)?;
                }
                let n = next_label(cx);
                let cond_label = format!("for_cond{n}");
                let body_label = format!("for_body{n}");
                let update_label = format!("for_update{n}");
                let end_label = format!("for_end{n}");
                terminate(cx, &format!("br label %{cond_label}"));
                new_block(cx, cond_label.clone());
                let test = self.value(cx, &s.test)?;
                let test = self.to_i1(cx, test, s.location)?;
                terminate(
                    cx,
                    &format!("br i1 {}, label %{body_label}, label %{end_label}", test.repr),
                );
                new_block(cx, body_label);
                cx.loop_stack.push(LoopLabels {
                    continue_label: Some(update_label.clone()),
                    break_label: end_label.clone(),
                });
                self.scoped_block(cx, &s.body)?;
                cx.loop_stack.pop();
                terminate(cx, &format!("br label %{update_label}"));
                new_block(cx, update_label);
                if let Some(update) = &s.update {
                    let _ = self.value(cx, update)?;
                }
                terminate(cx, &format!("br label %{cond_label}"));
                new_block(cx, end_label);
                cx.scopes.pop();
                Ok(())
            }
            Stmt::Switch(s) => self.switch(cx, s),
            Stmt::Break(b) => {
                let Some(frame) = cx.loop_stack.last() else {
                    return Err(EmitError::Internal {
                        reason: format!("{}break outside a loop", crate::errors::at(&b.location)),
                    });
                };
                let label = frame.break_label.clone();
                terminate(cx, &format!("br label %{label}"));
                Ok(())
            }
            Stmt::Continue(c) => {
                let label = cx
                    .loop_stack
                    .iter()
                    .rev()
                    .find_map(|frame| frame.continue_label.clone());
                let Some(label) = label else {
                    return Err(EmitError::Internal {
                        reason: format!(
                            "{}continue outside a loop",
                            crate::errors::at(&c.location)
                        ),
                    });
                };
                terminate(cx, &format!("br label %{label}"));
                Ok(())
            }
            Stmt::ExpressionStmt(s) => {
                let _ = self.value(cx, &s.expression)?;
                Ok(())
            }
        }
    }

    fn scoped_block(&mut self, cx: &mut FuncCx, block: &Block) -> Result<(), EmitError> {
        cx.scopes.push(FxHashMap::default());
        for stmt in &block.statements {
            self.stmt(cx, stmt)?;
        }
        cx.scopes.pop();
        Ok(())
    }

    fn var_decl(&mut self, cx: &mut FuncCx, decl: &VarDecl) -> Result<(), EmitError> {
        let local = cx.pending_slots.pop_front().ok_or_else(|| EmitError::Internal {
            reason: format!("no pre-allocated slot for `{}`", decl.name),
        })?;
        let slot = local.slot.clone();
        let ty = local.ty;
        cx.scopes
            .last_mut()
            .expect("function scope always present")
            .insert(decl.name.clone(), local);
        match &decl.init {
            Some(init) => {
                let value = self.value(cx, init)?;
                let value = self.coerce(cx, value, ty, decl.location)?;
                inst(cx, &format!("store {} {}, ptr {slot}", ty.as_str(), value.repr));
            }
            None => {
                let default = default_value(ty);
                inst(cx, &format!("store {} {default}, ptr {slot}", ty.as_str()));
            }
        }
        Ok(())
    }

    fn switch(&mut self, cx: &mut FuncCx, s: &etna_ir::nodes::Switch) -> Result<(), EmitError> {
        let discriminant = self.value(cx, &s.discriminant)?;
        let tests: Vec<&etna_ir::nodes::Case> =
            s.cases.iter().filter(|c| c.test.is_some()).collect();
        let default = s.cases.iter().find(|c| c.test.is_none());

        let end_n = next_label(cx);
        let end_label = format!("if_end{end_n}");
        cx.loop_stack.push(LoopLabels {
            continue_label: None,
            break_label: end_label.clone(),
        });
        for case in &tests {
            let n = next_label(cx);
            let then_label = format!("if_then{n}");
            let else_label = format!("if_else{n}");
            let test = case.test.as_ref().expect("filtered on test presence");
            let test = self.value(cx, test)?;
            let matched = self.comparison(
                cx,
                discriminant.clone(),
                test,
                BinaryOperator::Eq,
                case.location,
            )?;
            terminate(
                cx,
                &format!("br i1 {}, label %{then_label}, label %{else_label}", matched.repr),
            );
            new_block(cx, then_label);
            cx.scopes.push(FxHashMap::default());
            for stmt in &case.body {
                self.stmt(cx, stmt)?;
            }
            cx.scopes.pop();
            terminate(cx, &format!("br label %{end_label}"));
            new_block(cx, else_label);
        }
        if let Some(default) = default {
            cx.scopes.push(FxHashMap::default());
            for stmt in &default.body {
                self.stmt(cx, stmt)?;
            }
            cx.scopes.pop();
        }
        terminate(cx, &format!("br label %{end_label}"));
        cx.loop_stack.pop();
        new_block(cx, end_label);
        Ok(())
    }

    // --------------------------------------------------------------------
    // Expressions
    // --------------------------------------------------------------------

    #[allow(clippy::too_many_lines)]
    fn value(&mut self, cx: &mut FuncCx, expr: &Expr) -> Result<Value, EmitError> {
        match expr {
            Expr::Literal(lit) => Ok(match &lit.value {
                LiteralValue::Null => Value {
                    repr: "null".to_string(),
                    ty: LlvmType::Ptr,
                },
                LiteralValue::Bool(b) => Value {
                    repr: b.to_string(),
                    ty: LlvmType::I1,
                },
                LiteralValue::Number(n) => Value {
                    repr: double_hex(*n),
                    ty: LlvmType::Double,
                },
                LiteralValue::Str(s) => {
                    let index = self.strings.intern(s);
                    Value {
                        repr: format!("@.str.{index}"),
                        ty: LlvmType::Ptr,
                    }
                }
            }),
            Expr::Identifier(id) => {
                let Some(local) = cx.lookup(&id.name).cloned() else {
                    return Err(EmitError::UnsupportedForLlvm {
                        construct: format!("unresolved identifier `{}`", id.name),
                        location: id.location,
                    });
                };
                let name = fresh(cx, &id.name);
                inst(
                    cx,
                    &format!("{name} = load {}, ptr {}", local.ty.as_str(), local.slot),
                );
                Ok(Value {
                    repr: name,
                    ty: local.ty,
                })
            }
            Expr::BinaryOp(b) => self.binary(cx, b),
            Expr::UnaryOp(u) => {
                let operand = self.value(cx, &u.operand)?;
                match u.operator {
                    UnaryOperator::Not => {
                        let operand = self.to_i1(cx, operand, u.location)?;
                        let name = fresh(cx, "not");
                        inst(cx, &format!("{name} = xor i1 {}, true", operand.repr));
                        Ok(Value {
                            repr: name,
                            ty: LlvmType::I1,
                        })
                    }
                    UnaryOperator::Neg => {
                        let operand = self.to_double(cx, operand, u.location)?;
                        let name = fresh(cx, "neg");
                        inst(cx, &format!("{name} = fneg double {}", operand.repr));
                        Ok(Value {
                            repr: name,
                            ty: LlvmType::Double,
                        })
                    }
                }
            }
            Expr::Call(call) => self.call(cx, call),
            Expr::Member(m) => {
                if !m.computed {
                    return Err(EmitError::UnsupportedForLlvm {
                        construct: "named member access".to_string(),
                        location: m.location,
                    });
                }
                let object = self.value(cx, &m.object)?;
                if object.ty != LlvmType::Ptr {
                    return Err(EmitError::UnsupportedForLlvm {
                        construct: "indexing a non-pointer value".to_string(),
                        location: m.location,
                    });
                }
                let index = self.value(cx, &m.property)?;
                let index = self.to_double(cx, index, m.location)?;
                let cast = fresh(cx, "idx");
                inst(cx, &format!("{cast} = fptosi double {} to i64", index.repr));
                let gep = fresh(cx, "elt");
                inst(
                    cx,
                    &format!("{gep} = getelementptr double, ptr {}, i64 {cast}", object.repr),
                );
                let load = fresh(cx, "val");
                inst(cx, &format!("{load} = load double, ptr {gep}"));
                Ok(Value {
                    repr: load,
                    ty: LlvmType::Double,
                })
            }
            Expr::ArrayLiteral(a) => {
                let slots: Vec<&Expr> = a.elements.iter().collect();
                self.heap_aggregate(cx, &slots, a.location)
            }
            Expr::ObjectLiteral(o) => {
                let mut slots: Vec<&Expr> = Vec::with_capacity(o.properties.len());
                for property in &o.properties {
                    if property.metadata.flag(metadata::IS_METHOD)
                        || matches!(property.value, Expr::FunctionDecl(_))
                    {
                        self.warnings.push(Warning::new(
                            format!(
                                "function-valued property `{}` has no LLVM representation and was dropped",
                                property.key
                            ),
                            o.location,
                        ));
                    } else {
                        slots.push(&property.value);
                    }
                }
                self.heap_aggregate_n(cx, o.properties.len(), &slots, o.location)
            }
            Expr::Assignment(a) => self.assignment(cx, a),
            Expr::Conditional(c) => {
                let n = next_label(cx);
                let then_label = format!("if_then{n}");
                let else_label = format!("if_else{n}");
                let end_label = format!("if_end{n}");
                let slot = fresh(cx, "sel_addr");
                inst(cx, &format!("{slot} = alloca double"));
                let condition = self.value(cx, &c.condition)?;
                let condition = self.to_i1(cx, condition, c.location)?;
                terminate(
                    cx,
                    &format!("br i1 {}, label %{then_label}, label %{else_label}", condition.repr),
                );
                new_block(cx, then_label);
                let consequent = self.value(cx, &c.consequent)?;
                let consequent = self.to_double(cx, consequent, c.location)?;
                inst(cx, &format!("store double {}, ptr {slot}", consequent.repr));
                terminate(cx, &format!("br label %{end_label}"));
                new_block(cx, else_label);
                let alternate = self.value(cx, &c.alternate)?;
                let alternate = self.to_double(cx, alternate, c.location)?;
                inst(cx, &format!("store double {}, ptr {slot}", alternate.repr));
                terminate(cx, &format!("br label %{end_label}"));
                new_block(cx, end_label);
                let load = fresh(cx, "sel");
                inst(cx, &format!("{load} = load double, ptr {slot}"));
                Ok(Value {
                    repr: load,
                    ty: LlvmType::Double,
                })
            }
            Expr::FunctionDecl(f) => Err(EmitError::UnsupportedForLlvm {
                construct: "function value".to_string(),
                location: f.location,
            }),
        }
    }

    fn binary(&mut self, cx: &mut FuncCx, b: &BinaryOp) -> Result<Value, EmitError> {
        let op = b.operator;
        if op.is_logical() {
            let left = self.value(cx, &b.left)?;
            let left = self.to_i1(cx, left, b.location)?;
            let right = self.value(cx, &b.right)?;
            let right = self.to_i1(cx, right, b.location)?;
            let mnemonic = if op == BinaryOperator::And { "and" } else { "or" };
            let name = fresh(cx, mnemonic);
            inst(
                cx,
                &format!("{name} = {mnemonic} i1 {}, {}", left.repr, right.repr),
            );
            return Ok(Value {
                repr: name,
                ty: LlvmType::I1,
            });
        }
        if op.is_comparison() {
            let left = self.value(cx, &b.left)?;
            let right = self.value(cx, &b.right)?;
            return self.comparison(cx, left, right, op, b.location);
        }
        // Arithmetic: double family throughout; integer selection would
        // require integer-typed operands, which the lattice never produces
        // here.
        let left = self.value(cx, &b.left)?;
        if left.ty == LlvmType::Ptr {
            return Err(EmitError::UnsupportedForLlvm {
                construct: "string arithmetic".to_string(),
                location: b.location,
            });
        }
        let left = self.to_double(cx, left, b.location)?;
        let right = self.value(cx, &b.right)?;
        if right.ty == LlvmType::Ptr {
            return Err(EmitError::UnsupportedForLlvm {
                construct: "string arithmetic".to_string(),
                location: b.location,
            });
        }
        let right = self.to_double(cx, right, b.location)?;
        let (mnemonic, base) = match op {
            BinaryOperator::Add => ("fadd", "add"),
            BinaryOperator::Sub => ("fsub", "sub"),
            BinaryOperator::Mul => ("fmul", "mul"),
            BinaryOperator::Div => ("fdiv", "div"),
            BinaryOperator::Mod => ("frem", "rem"),
            _ => unreachable!("arithmetic operators handled above"),
        };
        let name = fresh(cx, base);
        inst(
            cx,
            &format!("{name} = {mnemonic} double {}, {}", left.repr, right.repr),
        );
        Ok(Value {
            repr: name,
            ty: LlvmType::Double,
        })
    }

    fn comparison(
        &mut self,
        cx: &mut FuncCx,
        left: Value,
        right: Value,
        op: BinaryOperator,
        location: Option<Span>,
    ) -> Result<Value, EmitError> {
        if left.ty == LlvmType::Ptr || right.ty == LlvmType::Ptr {
            if !matches!(op, BinaryOperator::Eq | BinaryOperator::Ne) {
                return Err(EmitError::UnsupportedForLlvm {
                    construct: "ordered comparison of pointer values".to_string(),
                    location,
                });
            }
            let pred = if op == BinaryOperator::Eq { "eq" } else { "ne" };
            let name = fresh(cx, "cmp");
            inst(
                cx,
                &format!("{name} = icmp {pred} ptr {}, {}", left.repr, right.repr),
            );
            return Ok(Value {
                repr: name,
                ty: LlvmType::I1,
            });
        }
        if left.ty == LlvmType::I1 && right.ty == LlvmType::I1 {
            let pred = match op {
                BinaryOperator::Eq => "eq",
                BinaryOperator::Ne => "ne",
                BinaryOperator::Lt => "slt",
                BinaryOperator::Le => "sle",
                BinaryOperator::Gt => "sgt",
                BinaryOperator::Ge => "sge",
                _ => unreachable!("comparison operators only"),
            };
            let name = fresh(cx, "cmp");
            inst(
                cx,
                &format!("{name} = icmp {pred} i1 {}, {}", left.repr, right.repr),
            );
            return Ok(Value {
                repr: name,
                ty: LlvmType::I1,
            });
        }
        let left = self.to_double(cx, left, location)?;
        let right = self.to_double(cx, right, location)?;
        let pred = match op {
            BinaryOperator::Eq => "oeq",
            BinaryOperator::Ne => "one",
            BinaryOperator::Lt => "olt",
            BinaryOperator::Le => "ole",
            BinaryOperator::Gt => "ogt",
            BinaryOperator::Ge => "oge",
            _ => unreachable!("comparison operators only"),
        };
        let name = fresh(cx, "cmp");
        inst(
            cx,
            &format!("{name} = fcmp {pred} double {}, {}", left.repr, right.repr),
        );
        Ok(Value {
            repr: name,
            ty: LlvmType::I1,
        })
    }

    #[allow(clippy::too_many_lines)]
    fn call(&mut self, cx: &mut FuncCx, call: &etna_ir::nodes::Call) -> Result<Value, EmitError> {
        if console_method(&call.callee).is_some() {
            let mut parts: Vec<&str> = Vec::with_capacity(call.arguments.len());
            let mut rendered: Vec<String> = Vec::with_capacity(call.arguments.len());
            for argument in &call.arguments {
                let value = self.value(cx, argument)?;
                match value.ty {
                    LlvmType::Double => {
                        parts.push("%f");
                        rendered.push(format!("double {}", value.repr));
                    }
                    LlvmType::Ptr => {
                        parts.push("%s");
                        rendered.push(format!("ptr {}", value.repr));
                    }
                    LlvmType::I1 => {
                        parts.push("%d");
                        let wide = fresh(cx, "ext");
                        inst(cx, &format!("{wide} = zext i1 {} to i32", value.repr));
                        rendered.push(format!("i32 {wide}"));
                    }
                    LlvmType::Void => {
                        return Err(EmitError::UnsupportedForLlvm {
                            construct: "void value as argument".to_string(),
                            location: call.location,
                        });
                    }
                }
            }
            let mut format_string = parts.join(" ");
            format_string.push('\n');
            let index = self.strings.intern(&format_string);
            let name = fresh(cx, "print");
            let mut args = format!("ptr @.str.{index}");
            for r in rendered {
                args.push_str(", ");
                args.push_str(&r);
            }
            inst(cx, &format!("{name} = call i32 (ptr, ...) @printf({args})"));
            return Ok(Value {
                repr: name,
                ty: LlvmType::Void,
            });
        }
        let Expr::Identifier(callee) = &call.callee else {
            return Err(EmitError::UnsupportedForLlvm {
                construct: "indirect call".to_string(),
                location: call.location,
            });
        };
        let Some(signature) = self.functions.get(&callee.name).copied() else {
            return Err(EmitError::UnsupportedForLlvm {
                construct: format!("call to unknown function `{}`", callee.name),
                location: call.location,
            });
        };
        let mut rendered = Vec::with_capacity(call.arguments.len());
        for argument in &call.arguments {
            let value = self.value(cx, argument)?;
            let value = self.to_double(cx, value, call.location)?;
            rendered.push(format!("double {}", value.repr));
        }
        let args = rendered.join(", ");
        match signature.ret {
            LlvmType::Void => {
                inst(cx, &format!("call void @{}({args})", callee.name));
                Ok(Value {
                    repr: String::new(),
                    ty: LlvmType::Void,
                })
            }
            ret => {
                let name = fresh(cx, "call");
                inst(
                    cx,
                    &format!("{name} = call {} @{}({args})", ret.as_str(), callee.name),
                );
                Ok(Value {
                    repr: name,
                    ty: ret,
                })
            }
        }
    }

    fn assignment(
        &mut self,
        cx: &mut FuncCx,
        a: &etna_ir::nodes::Assignment,
    ) -> Result<Value, EmitError> {
        let stored = match &a.target {
            Expr::Identifier(id) => {
                let Some(local) = cx.lookup(&id.name).cloned() else {
                    return Err(EmitError::UnsupportedForLlvm {
                        construct: format!("assignment to unresolved identifier `{}`", id.name),
                        location: a.location,
                    });
                };
                let value = self.rhs_value(cx, a, |cx| {
                    let current = fresh(cx, &id.name);
                    inst(
                        cx,
                        &format!("{current} = load {}, ptr {}", local.ty.as_str(), local.slot),
                    );
                    Ok(Value {
                        repr: current,
                        ty: local.ty,
                    })
                })?;
                let value = self.coerce(cx, value, local.ty, a.location)?;
                inst(
                    cx,
                    &format!("store {} {}, ptr {}", local.ty.as_str(), value.repr, local.slot),
                );
                value
            }
            Expr::Member(m) if m.computed => {
                let object = self.value(cx, &m.object)?;
                if object.ty != LlvmType::Ptr {
                    return Err(EmitError::UnsupportedForLlvm {
                        construct: "indexing a non-pointer value".to_string(),
                        location: m.location,
                    });
                }
                let index = self.value(cx, &m.property)?;
                let index = self.to_double(cx, index, m.location)?;
                let cast = fresh(cx, "idx");
                inst(cx, &format!("{cast} = fptosi double {} to i64", index.repr));
                let gep = fresh(cx, "elt");
                inst(
                    cx,
                    &format!("{gep} = getelementptr double, ptr {}, i64 {cast}", object.repr),
                );
                let gep_for_load = gep.clone();
                let value = self.rhs_value(cx, a, move |cx| {
                    let current = fresh(cx, "cur");
                    inst(cx, &format!("{current} = load double, ptr {gep_for_load}"));
                    Ok(Value {
                        repr: current,
                        ty: LlvmType::Double,
                    })
                })?;
                let value = self.to_double(cx, value, a.location)?;
                inst(cx, &format!("store double {}, ptr {gep}", value.repr));
                value
            }
            other => {
                return Err(EmitError::UnsupportedForLlvm {
                    construct: format!("assignment to {}", other.kind()),
                    location: a.location,
                });
            }
        };
        Ok(stored)
    }

    /// Computes the right-hand side of an assignment, expanding compound
    /// operators through `load_current`.
    fn rhs_value(
        &mut self,
        cx: &mut FuncCx,
        a: &etna_ir::nodes::Assignment,
        load_current: impl FnOnce(&mut FuncCx) -> Result<Value, EmitError>,
    ) -> Result<Value, EmitError> {
        let rhs = self.value(cx, &a.value)?;
        let Some(op) = a.operator.binary_operator() else {
            return Ok(rhs);
        };
        let current = load_current(cx)?;
        let current = self.to_double(cx, current, a.location)?;
        let rhs = self.to_double(cx, rhs, a.location)?;
        let (mnemonic, base) = match op {
            BinaryOperator::Add => ("fadd", "add"),
            BinaryOperator::Sub => ("fsub", "sub"),
            BinaryOperator::Mul => ("fmul", "mul"),
            BinaryOperator::Div => ("fdiv", "div"),
            BinaryOperator::Mod => ("frem", "rem"),
            _ => {
                return Err(EmitError::Internal {
                    reason: format!("compound assignment with `{op}`"),
                });
            }
        };
        let name = fresh(cx, base);
        inst(
            cx,
            &format!("{name} = {mnemonic} double {current}, {rhs}", current = current.repr, rhs = rhs.repr),
        );
        Ok(Value {
            repr: name,
            ty: LlvmType::Double,
        })
    }

    fn heap_aggregate(
        &mut self,
        cx: &mut FuncCx,
        elements: &[&Expr],
        location: Option<Span>,
    ) -> Result<Value, EmitError> {
        self.heap_aggregate_n(cx, elements.len(), elements, location)
    }

    /// `malloc`s `slot_count` 8-byte slots and stores `elements` into the
    /// leading slots.
    fn heap_aggregate_n(
        &mut self,
        cx: &mut FuncCx,
        slot_count: usize,
        elements: &[&Expr],
        location: Option<Span>,
    ) -> Result<Value, EmitError> {
        let base = fresh(cx, "agg");
        let bytes = 8 * slot_count.max(1);
        inst(cx, &format!("{base} = call ptr @malloc(i64 {bytes})"));
        for (index, element) in elements.iter().enumerate() {
            let value = self.value(cx, element)?;
            let value = self.to_double(cx, value, location)?;
            let gep = fresh(cx, "slot");
            inst(
                cx,
                &format!("{gep} = getelementptr double, ptr {base}, i64 {index}"),
            );
            inst(cx, &format!("store double {}, ptr {gep}", value.repr));
        }
        Ok(Value {
            repr: base,
            ty: LlvmType::Ptr,
        })
    }

    // --------------------------------------------------------------------
    // Coercions
    // --------------------------------------------------------------------

    fn to_double(
        &mut self,
        cx: &mut FuncCx,
        value: Value,
        location: Option<Span>,
    ) -> Result<Value, EmitError> {
        match value.ty {
            LlvmType::Double => Ok(value),
            LlvmType::I1 => {
                let name = fresh(cx, "conv");
                inst(cx, &format!("{name} = uitofp i1 {} to double", value.repr));
                Ok(Value {
                    repr: name,
                    ty: LlvmType::Double,
                })
            }
            LlvmType::Ptr => Err(EmitError::UnsupportedForLlvm {
                construct: "pointer value used as a number".to_string(),
                location,
            }),
            LlvmType::Void => Err(EmitError::UnsupportedForLlvm {
                construct: "void value used as a number".to_string(),
                location,
            }),
        }
    }

    fn to_i1(
        &mut self,
        cx: &mut FuncCx,
        value: Value,
        location: Option<Span>,
    ) -> Result<Value, EmitError> {
        match value.ty {
            LlvmType::I1 => Ok(value),
            LlvmType::Double => {
                let name = fresh(cx, "tobool");
                inst(
                    cx,
                    &format!(
                        "{name} = fcmp one double {}, 0x0000000000000000",
                        value.repr
                    ),
                );
                Ok(Value {
                    repr: name,
                    ty: LlvmType::I1,
                })
            }
            LlvmType::Ptr => {
                let name = fresh(cx, "tobool");
                inst(cx, &format!("{name} = icmp ne ptr {}, null", value.repr));
                Ok(Value {
                    repr: name,
                    ty: LlvmType::I1,
                })
            }
            LlvmType::Void => Err(EmitError::UnsupportedForLlvm {
                construct: "void value used as a condition".to_string(),
                location,
            }),
        }
    }

    fn coerce(
        &mut self,
        cx: &mut FuncCx,
        value: Value,
        target: LlvmType,
        location: Option<Span>,
    ) -> Result<Value, EmitError> {
        if value.ty == target {
            return Ok(value);
        }
        match target {
            LlvmType::Double => self.to_double(cx, value, location),
            LlvmType::I1 => self.to_i1(cx, value, location),
            LlvmType::Ptr | LlvmType::Void => Err(EmitError::UnsupportedForLlvm {
                construct: format!(
                    "storing a {} value into a {} slot",
                    value.ty.as_str(),
                    target.as_str()
                ),
                location,
            }),
        }
    }
}

// ------------------------------------------------------------------------
// Free helpers
// ------------------------------------------------------------------------

fn inst(cx: &mut FuncCx, text: &str) {
    let block = &mut cx.blocks[cx.current];
    // Instructions after a terminator are unreachable; the validator has
    // already warned about them.
    if !block.terminated {
        block.insts.push(text.to_string());
    }
}

fn terminate(cx: &mut FuncCx, text: &str) {
    let block = &mut cx.blocks[cx.current];
    if !block.terminated {
        block.insts.push(text.to_string());
        block.terminated = true;
    }
}

fn new_block(cx: &mut FuncCx, label: String) {
    cx.blocks.push(BasicBlock {
        label,
        insts: Vec::new(),
        terminated: false,
    });
    cx.current = cx.blocks.len() - 1;
}

fn fresh(cx: &mut FuncCx, base: &str) -> String {
    cx.value_counter += 1;
    format!("%{base}{}", cx.value_counter)
}

fn next_label(cx: &mut FuncCx) -> u32 {
    let n = cx.label_counter;
    cx.label_counter += 1;
    n
}

fn slot_name(name: &str, used: &mut FxHashSet<String>) -> String {
    let mut candidate = format!("%{name}_addr");
    let mut suffix = 1;
    while used.contains(&candidate) {
        candidate = format!("%{name}_addr{suffix}");
        suffix += 1;
    }
    used.insert(candidate.clone());
    candidate
}

fn default_value(ty: LlvmType) -> &'static str {
    match ty {
        LlvmType::Double => "0x0000000000000000",
        LlvmType::I1 => "false",
        LlvmType::Ptr => "null",
        LlvmType::Void => "undef",
    }
}

fn double_hex(value: f64) -> String {
    format!("0x{:016X}", value.to_bits())
}

/// Slot type for a local, picked from the lowerer's annotation.
fn local_type(decl: &VarDecl) -> LlvmType {
    match decl.ty {
        Some(Type::String) => LlvmType::Ptr,
        Some(Type::Boolean) => LlvmType::I1,
        Some(Type::Array(_) | Type::Object { .. }) => LlvmType::Ptr,
        _ => LlvmType::Double,
    }
}

/// Collects local declarations in pre-order, stopping at nested functions.
fn scan_locals(stmts: &[Stmt], out: &mut Vec<(String, LlvmType)>) {
    for stmt in stmts {
        match stmt {
            Stmt::VarDecl(decl) => out.push((decl.name.clone(), local_type(decl))),
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

/// True when any return in this body carries a value (nested functions are
/// their own bodies).
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

fn escape_bytes(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 3);
    for byte in text.bytes() {
        match byte {
            b'"' | b'\\' => {
                let _ = write!(out, "\\{byte:02X}");
            }
            0x20..=0x7E => out.push(byte as char),
            other => {
                let _ = write!(out, "\\{other:02X}");
            }
        }
    }
    out.push_str("\\00");
    out
}
