use crate::utils::{
    bin, expr_stmt, factorial_program, identity_program, let_decl, lower_program, num, program,
    str_lit,
};
use etna_ir::serializer::{SCHEMA_VERSION, from_json, to_json};

#[test]
fn test_root_document_shape() {
    let lowered = lower_program(&identity_program());
    let compact = to_json(&lowered.program, None);
    assert!(
        compact.starts_with("{\"kind\":\"Program\",\"version\":\"1.0.0\",\"id\":\""),
        "unexpected head: {}",
        &compact[..60.min(compact.len())]
    );
    assert_eq!(SCHEMA_VERSION, "1.0.0");
}

#[test]
fn test_key_order_is_schema_defined() {
    let lowered = lower_program(&identity_program());
    let compact = to_json(&lowered.program, None);
    // FunctionDecl variant fields appear alphabetically after kind/id.
    let decl = compact
        .find("\"kind\":\"FunctionDecl\"")
        .expect("function node present");
    let tail = &compact[decl..];
    let body = tail.find("\"body\":").expect("body key");
    let name = tail.find("\"name\":").expect("name key");
    let params = tail.find("\"params\":").expect("params key");
    assert!(body < name && name < params);
}

#[test]
fn test_round_trip_is_identity() {
    let lowered = lower_program(&factorial_program());
    let document = to_json(&lowered.program, Some(2));
    let read_back = from_json(&document).expect("round trip should parse");
    assert_eq!(read_back, lowered.program);
}

#[test]
fn test_indentation_does_not_change_meaning() {
    let lowered = lower_program(&factorial_program());
    let compact = from_json(&to_json(&lowered.program, None)).unwrap();
    let pretty = from_json(&to_json(&lowered.program, Some(4))).unwrap();
    assert_eq!(compact, pretty);
}

#[test]
fn test_serialization_is_deterministic() {
    let a = lower_program(&factorial_program());
    let b = lower_program(&factorial_program());
    assert_eq!(to_json(&a.program, Some(2)), to_json(&b.program, Some(2)));
}

#[test]
fn test_integral_numbers_have_no_fraction() {
    let lowered = lower_program(&program(vec![let_decl("x", Some(num(2.0)))]));
    let compact = to_json(&lowered.program, None);
    assert!(compact.contains("\"value\":2"), "{compact}");
    assert!(!compact.contains("2.0"), "{compact}");
}

#[test]
fn test_non_integral_numbers_round_trip() {
    let lowered = lower_program(&program(vec![let_decl("x", Some(num(2.5)))]));
    let document = to_json(&lowered.program, None);
    assert!(document.contains("\"value\":2.5"), "{document}");
    assert_eq!(from_json(&document).unwrap(), lowered.program);
}

#[test]
fn test_metadata_and_types_survive_round_trip() {
    // Template-style concatenation carries both a type and a metadata flag.
    let lowered = lower_program(&program(vec![
        let_decl("name", Some(str_lit("world"))),
        expr_stmt(bin("+", str_lit("hi "), num(1.0))),
    ]));
    let document = to_json(&lowered.program, Some(2));
    assert!(document.contains("\"type\": \"string\""), "{document}");
    assert_eq!(from_json(&document).unwrap(), lowered.program);
}

#[test]
fn test_version_mismatch_is_rejected() {
    let lowered = lower_program(&identity_program());
    let document = to_json(&lowered.program, None);
    let tampered = document.replace("\"version\":\"1.0.0\"", "\"version\":\"9.9.9\"");
    let err = from_json(&tampered).unwrap_err();
    assert!(err.to_string().contains("9.9.9"), "{err}");
}
