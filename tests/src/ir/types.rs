use etna_ir::types::Type;
use std::collections::BTreeMap;

#[test]
fn test_unknown_is_top() {
    for ty in [
        Type::Number,
        Type::String,
        Type::Boolean,
        Type::Null,
        Type::Void,
        Type::array(Type::Number),
        Type::Unknown,
    ] {
        assert!(ty.is_subtype_of(&Type::Unknown));
    }
    assert!(!Type::Unknown.is_subtype_of(&Type::Number));
}

#[test]
fn test_optional_admits_base_and_null() {
    let optional = Type::optional(Type::Number);
    assert!(Type::Number.is_subtype_of(&optional));
    assert!(Type::Null.is_subtype_of(&optional));
    assert!(!Type::String.is_subtype_of(&optional));
}

#[test]
fn test_union_is_least_upper_bound() {
    let joined = Type::Number.union_with(Type::String);
    assert_eq!(joined, Type::Union(vec![Type::Number, Type::String]));
    assert!(Type::Number.is_subtype_of(&joined));
    assert!(Type::String.is_subtype_of(&joined));

    assert_eq!(Type::Number.union_with(Type::Number), Type::Number);
    assert_eq!(
        Type::Null.union_with(Type::Number),
        Type::optional(Type::Number)
    );
}

#[test]
fn test_array_covariance() {
    let numbers = Type::array(Type::Number);
    let anything = Type::array(Type::Unknown);
    assert!(numbers.is_subtype_of(&anything));
    assert!(!anything.is_subtype_of(&numbers));
}

#[test]
fn test_function_variance() {
    // (unknown) => number  <:  (number) => unknown
    let general = Type::function(vec![Type::Unknown], Type::Number);
    let specific = Type::function(vec![Type::Number], Type::Unknown);
    assert!(general.is_subtype_of(&specific));
    assert!(!specific.is_subtype_of(&general));
}

#[test]
fn test_object_width_subtyping() {
    let mut closed_fields = BTreeMap::new();
    closed_fields.insert("x".to_string(), Type::Number);
    closed_fields.insert("y".to_string(), Type::Number);
    let closed = Type::Object {
        fields: closed_fields,
        open: false,
    };
    let mut open_fields = BTreeMap::new();
    open_fields.insert("x".to_string(), Type::Number);
    let open = Type::Object {
        fields: open_fields,
        open: true,
    };
    assert!(closed.is_subtype_of(&open));
    assert!(!open.is_subtype_of(&closed));
}

#[test]
fn test_compatibility_is_symmetric_with_unknown() {
    assert!(Type::Unknown.is_compatible_with(&Type::Number));
    assert!(Type::Number.is_compatible_with(&Type::Unknown));
    assert!(!Type::Number.is_compatible_with(&Type::String));
}
