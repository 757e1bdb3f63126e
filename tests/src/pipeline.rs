use crate::utils::{
    block, factorial_program, fn_decl, identity_program, let_decl, lower_program, num, program,
    ret,
};
use etna::{CompileError, CompilerConfig, Target, compile};
use etna_ir::cancel::Cancellation;

const ALL_TARGETS: &[Target] = &[
    Target::Ir,
    Target::Lua,
    Target::Js,
    Target::Llvm,
    Target::Wasm,
];

#[test]
fn test_all_targets_for_factorial() {
    let outcome = compile(
        &factorial_program(),
        &CompilerConfig::default(),
        ALL_TARGETS,
        &Cancellation::never(),
    )
    .expect("compilation should succeed");
    let artifacts = outcome.artifacts;
    assert!(artifacts.ir_json.is_some());
    assert!(artifacts.lua.is_some());
    assert!(artifacts.js.is_some());
    assert!(artifacts.llvm.is_some());
    assert!(artifacts.wasm.is_some());
}

#[test]
fn test_outputs_are_byte_identical_across_runs() {
    let run = || {
        compile(
            &factorial_program(),
            &CompilerConfig::default(),
            ALL_TARGETS,
            &Cancellation::never(),
        )
        .expect("compilation should succeed")
        .artifacts
    };
    let a = run();
    let b = run();
    assert_eq!(a.ir_json, b.ir_json);
    assert_eq!(a.lua, b.lua);
    assert_eq!(a.js, b.js);
    assert_eq!(a.llvm, b.llvm);
    assert_eq!(a.wasm, b.wasm);
}

#[test]
fn test_ir_json_round_trips_through_the_serializer() {
    let lowered = lower_program(&factorial_program());
    let document = etna::serialize(&lowered.program, Some(2));
    let read_back = etna::deserialize(&document).expect("round trip should parse");
    assert_eq!(read_back, lowered.program);
    assert_eq!(etna::serialize(&read_back, Some(2)), document);
}

#[test]
fn test_validated_trees_emit_without_internal_errors() {
    let lowered = lower_program(&factorial_program());
    let validation = etna::validate(&lowered.program);
    assert!(validation.valid);
    let config = CompilerConfig::default();
    let cancel = Cancellation::never();
    assert!(etna::emit_lua(&lowered.program, &config, &cancel).is_ok());
    assert!(etna::emit_js(&lowered.program, &config, &cancel).is_ok());
    assert!(etna::emit_llvm(&lowered.program, &config, &cancel).is_ok());
    assert!(etna::emit_wasm(&lowered.program, &config, &cancel).is_ok());
}

#[test]
fn test_cancellation_discards_output() {
    let cancel = Cancellation::with(|| true);
    let errors = compile(
        &identity_program(),
        &CompilerConfig::default(),
        &[Target::Lua],
        &cancel,
    )
    .unwrap_err();
    assert!(errors.iter().any(|e| matches!(e, CompileError::Cancelled)));
}

#[test]
fn test_validation_errors_surface_with_no_artifacts() {
    // `return` at the top level is rejected by the validator.
    let errors = compile(
        &program(vec![ret(Some(num(1.0)))]),
        &CompilerConfig::default(),
        &[Target::Lua],
        &Cancellation::never(),
    )
    .unwrap_err();
    assert!(!errors.is_empty());
}

#[test]
fn test_strict_mode_promotes_warnings_to_errors() {
    // Shadowing is a warning in loose mode.
    let shadowing = program(vec![
        let_decl("x", Some(num(1.0))),
        block(vec![let_decl("x", Some(num(2.0)))]),
    ]);

    let loose = compile(
        &shadowing,
        &CompilerConfig::default(),
        &[Target::Lua],
        &Cancellation::never(),
    )
    .expect("loose mode should succeed");
    assert!(loose.warnings.iter().any(|w| w.message.contains("shadows")));

    let mut strict = CompilerConfig::default();
    strict.determinism.strict = true;
    let errors = compile(&shadowing, &strict, &[Target::Lua], &Cancellation::never()).unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, CompileError::StrictWarning { .. }))
    );
}

#[test]
fn test_emitter_failures_carry_the_backend_variant() {
    // Strings have no WASM lowering in this layout.
    let input = program(vec![fn_decl(
        "greet",
        &[],
        vec![ret(Some(crate::utils::str_lit("hi")))],
    )]);
    let errors = compile(
        &input,
        &CompilerConfig::default(),
        &[Target::Wasm],
        &Cancellation::never(),
    )
    .unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, CompileError::UnsupportedForWasm { .. }))
    );
}

#[test]
fn test_config_deserializes_from_camel_case_json() {
    let config = CompilerConfig::from_json(
        r#"{
            "optimizationLevel": 2,
            "targetTriple": "wasm32-unknown-unknown",
            "wasm": { "memoryInitialPages": 4, "memoryMaxPages": 16 },
            "lua": { "emitContinueWarning": false },
            "js": { "semicolons": false, "indent": 4 },
            "determinism": { "strict": true }
        }"#,
    )
    .expect("config should parse");
    assert_eq!(config.optimization_level, 2);
    assert_eq!(config.target_triple, "wasm32-unknown-unknown");
    assert_eq!(config.wasm.memory_initial_pages, 4);
    assert_eq!(config.wasm.memory_max_pages, Some(16));
    assert!(!config.lua.emit_continue_warning);
    assert!(!config.js.semicolons);
    assert_eq!(config.js.indent, 4);
    assert!(config.strict());
}

#[test]
fn test_empty_config_uses_defaults() {
    let config = CompilerConfig::from_json("{}").expect("empty config should parse");
    assert_eq!(config.target_triple, "x86_64-unknown-linux-gnu");
    assert_eq!(config.wasm.memory_initial_pages, 1);
    assert!(config.js.semicolons);
    assert!(!config.strict());
}
