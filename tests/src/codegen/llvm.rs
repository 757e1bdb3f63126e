use crate::utils::{
    bin, call, expr_stmt, factorial_program, ident, identity_program, let_decl, lower_program,
    num, program, str_lit,
};
use etna_ast::nodes::{Stmt as AstStmt, WhileStatement};
use etna_codegen::llvm::{LlvmOptions, emit};
use etna_ir::cancel::Cancellation;
use rustc_hash::FxHashSet;

fn emit_llvm(program: &etna_ast::nodes::Program) -> String {
    let lowered = lower_program(program);
    emit(&lowered.program, &LlvmOptions::default(), &Cancellation::never())
        .expect("emission should succeed")
        .output
}

#[test]
fn test_module_header() {
    let module = emit_llvm(&identity_program());
    assert!(module.starts_with("; ModuleID = 'main'\n"), "{module}");
    assert!(
        module.contains("target triple = \"x86_64-unknown-linux-gnu\""),
        "{module}"
    );
}

#[test]
fn test_external_declarations_present() {
    let module = emit_llvm(&identity_program());
    for declaration in [
        "declare i32 @printf(ptr, ...)",
        "declare ptr @malloc(i64)",
        "declare void @free(ptr)",
        "declare ptr @memcpy(ptr, ptr, i64)",
    ] {
        assert!(module.contains(declaration), "missing `{declaration}`");
    }
}

#[test]
fn test_identity_function_compilation() {
    let module = emit_llvm(&identity_program());
    assert!(module.contains("define double @id(double %x)"), "{module}");
    assert!(module.contains("%x_addr = alloca double"), "{module}");
    assert!(module.contains("store double %x, ptr %x_addr"), "{module}");
    assert!(module.contains("load double, ptr %x_addr"), "{module}");
    assert!(module.contains("ret double"), "{module}");
}

#[test]
fn test_factorial_control_flow() {
    let module = emit_llvm(&factorial_program());
    assert!(module.contains("entry:"), "{module}");
    assert!(module.contains("if_then0:"), "{module}");
    assert!(module.contains("if_end0:"), "{module}");
    assert!(module.contains("fcmp ole"), "{module}");
    assert!(module.contains("call double @f"), "{module}");
    assert!(module.contains("fmul"), "{module}");
}

#[test]
fn test_while_loop_block_naming() {
    let input = program(vec![
        let_decl("x", Some(num(0.0))),
        AstStmt::WhileStatement(WhileStatement {
            test: bin("<", ident("x"), num(3.0)),
            body: Box::new(crate::utils::block(vec![expr_stmt(
                crate::utils::ident("x"),
            )])),
            loc: None,
        }),
    ]);
    let module = emit_llvm(&input);
    assert!(module.contains("while_cond0:"), "{module}");
    assert!(module.contains("while_body0:"), "{module}");
    assert!(module.contains("while_end0:"), "{module}");
}

#[test]
fn test_string_constants_are_interned() {
    let input = program(vec![
        expr_stmt(call(
            crate::utils::member(ident("console"), "log"),
            vec![str_lit("hello")],
        )),
        expr_stmt(call(
            crate::utils::member(ident("console"), "log"),
            vec![str_lit("hello")],
        )),
    ]);
    let module = emit_llvm(&input);
    // Two identical literals share one constant; the format string adds
    // another.
    assert_eq!(module.matches("@.str.0 =").count(), 1, "{module}");
    assert!(module.contains("private unnamed_addr constant"), "{module}");
    assert!(module.contains("call i32 (ptr, ...) @printf"), "{module}");
    assert_eq!(module.matches("c\"hello\\00\"").count(), 1, "{module}");
}

#[test]
fn test_ssa_names_are_assigned_once_per_function() {
    let module = emit_llvm(&factorial_program());
    for function in module.split("define ").skip(1) {
        let mut assigned = FxHashSet::default();
        for line in function.lines() {
            let trimmed = line.trim_start();
            if let Some((lhs, _)) = trimmed.split_once(" = ") {
                if let Some(name) = lhs.strip_prefix('%') {
                    assert!(
                        assigned.insert(name.to_string()),
                        "%{name} assigned twice in:\n{function}"
                    );
                }
            }
        }
    }
}

#[test]
fn test_every_block_ends_with_one_terminator() {
    let module = emit_llvm(&factorial_program());
    for function in module.split("define ").skip(1) {
        let body = function
            .split_once('{')
            .map(|(_, rest)| rest)
            .unwrap_or(function);
        let mut current: Vec<&str> = Vec::new();
        for line in body.lines() {
            let trimmed = line.trim();
            if trimmed == "}" || trimmed.ends_with(':') {
                if !current.is_empty() {
                    let last = current.last().unwrap();
                    assert!(
                        last.starts_with("ret ")
                            || last.starts_with("br ")
                            || *last == "unreachable",
                        "block does not end with a terminator: {current:?}"
                    );
                    let terminators = current
                        .iter()
                        .filter(|i| {
                            i.starts_with("ret ") || i.starts_with("br ") || **i == "unreachable"
                        })
                        .count();
                    assert_eq!(terminators, 1, "multiple terminators in {current:?}");
                }
                current.clear();
            } else if !trimmed.is_empty() {
                current.push(trimmed);
            }
        }
    }
}

#[test]
fn test_numeric_literals_are_double_bit_patterns() {
    let module = emit_llvm(&factorial_program());
    // 1.0 as an IEEE-754 bit pattern.
    assert!(module.contains("0x3FF0000000000000"), "{module}");
}

#[test]
fn test_top_level_statements_synthesize_main() {
    let input = program(vec![
        let_decl("x", Some(num(1.0))),
        expr_stmt(call(
            crate::utils::member(ident("console"), "log"),
            vec![ident("x")],
        )),
    ]);
    let module = emit_llvm(&input);
    assert!(module.contains("define void @main()"), "{module}");
}

#[test]
fn test_emission_is_deterministic() {
    let a = emit_llvm(&factorial_program());
    let b = emit_llvm(&factorial_program());
    assert_eq!(a, b);
}
