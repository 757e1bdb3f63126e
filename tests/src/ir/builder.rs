use etna_ir::builder::Builder;
use etna_ir::nodes::{AssignOperator, Expr, LiteralValue, NodeKind};
use etna_ir::types::Type;

#[test]
fn test_duplicate_parameter_names_rejected() {
    let mut b = Builder::new();
    let params = vec![
        b.parameter("a", false, None).unwrap(),
        b.parameter("a", false, None).unwrap(),
    ];
    let body = b.block(Vec::new(), None).unwrap();
    let err = b.function_decl("f", params, body, None).unwrap_err();
    assert_eq!(err.kind, NodeKind::FunctionDecl);
    assert!(err.reason.contains("duplicate parameter"));
}

#[test]
fn test_empty_function_name_rejected() {
    let mut b = Builder::new();
    let body = b.block(Vec::new(), None).unwrap();
    let err = b.function_decl("", Vec::new(), body, None).unwrap_err();
    assert_eq!(err.kind, NodeKind::FunctionDecl);
}

#[test]
fn test_unknown_declaration_kind_rejected() {
    let mut b = Builder::new();
    let err = b.var_decl("x", "static", None, None).unwrap_err();
    assert_eq!(err.kind, NodeKind::VarDecl);
    assert!(err.reason.contains("static"));
}

#[test]
fn test_literal_type_agreement_enforced() {
    let mut b = Builder::new();
    let err = b
        .literal_typed(LiteralValue::Str("x".to_string()), Type::Number, None)
        .unwrap_err();
    assert_eq!(err.kind, NodeKind::Literal);

    let ok = b
        .literal_typed(LiteralValue::Number(1.0), Type::Number, None)
        .unwrap();
    assert_eq!(ok.ty, Some(Type::Number));
}

#[test]
fn test_literal_factory_annotates_primitive_type() {
    let mut b = Builder::new();
    let lit = b.literal(LiteralValue::Bool(true), None).unwrap();
    assert_eq!(lit.ty, Some(Type::Boolean));
}

#[test]
fn test_assignment_target_must_be_assignable() {
    let mut b = Builder::new();
    let target = Expr::Literal(Box::new(b.literal(LiteralValue::Number(1.0), None).unwrap()));
    let value = Expr::Literal(Box::new(b.literal(LiteralValue::Number(2.0), None).unwrap()));
    let err = b
        .assignment(AssignOperator::Assign, target, value, None)
        .unwrap_err();
    assert_eq!(err.kind, NodeKind::Assignment);
}

#[test]
fn test_switch_rejects_two_default_cases() {
    let mut b = Builder::new();
    let disc = Expr::Identifier(Box::new(b.identifier("x", None).unwrap()));
    let first = b.case(None, Vec::new(), None).unwrap();
    let second = b.case(None, Vec::new(), None).unwrap();
    let err = b.switch_stmt(disc, vec![first, second], None).unwrap_err();
    assert_eq!(err.kind, NodeKind::Switch);
}

#[test]
fn test_member_non_computed_requires_identifier_property() {
    let mut b = Builder::new();
    let object = Expr::Identifier(Box::new(b.identifier("o", None).unwrap()));
    let property = Expr::Literal(Box::new(b.literal(LiteralValue::Number(0.0), None).unwrap()));
    let err = b.member(object, property, false, None).unwrap_err();
    assert_eq!(err.kind, NodeKind::Member);
}

#[test]
fn test_declare_and_init_is_var_decl_sugar() {
    let mut b = Builder::new();
    let init = Expr::Literal(Box::new(b.literal(LiteralValue::Number(3.0), None).unwrap()));
    let decl = b.declare_and_init("x", "let", init, None).unwrap();
    assert_eq!(decl.name, "x");
    assert_eq!(decl.declaration_kind(), Some("let"));
    assert!(decl.init.is_some());
}

#[test]
fn test_factories_never_mutate_arguments_and_assign_fresh_ids() {
    let mut b = Builder::new();
    let a = b.identifier("a", None).unwrap();
    let c = b.identifier("a", None).unwrap();
    assert_ne!(a.id, c.id);
    assert_eq!(b.nodes_created(), 2);
}
