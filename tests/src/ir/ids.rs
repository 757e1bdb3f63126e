use crate::utils::{collect_ids, factorial_program, lower_program};
use etna_ir::id::IdGenerator;
use rustc_hash::FxHashSet;

#[test]
fn test_balanced_ternary_prefix() {
    let mut ids = IdGenerator::new();
    let rendered: Vec<String> = (0..8).map(|_| ids.next_id().to_string()).collect();
    assert_eq!(rendered, ["1", "1T", "10", "11", "1TT", "1T0", "1T1", "10T"]);
}

#[test]
fn test_ids_use_only_balanced_ternary_digits() {
    let mut ids = IdGenerator::new();
    for _ in 0..500 {
        let id = ids.next_id();
        assert!(
            id.as_str().chars().all(|c| matches!(c, 'T' | '0' | '1')),
            "unexpected digit in {id}"
        );
    }
}

#[test]
fn test_generator_resets_per_unit() {
    let mut first = IdGenerator::new();
    let mut second = IdGenerator::new();
    for _ in 0..20 {
        assert_eq!(first.next_id(), second.next_id());
    }
    first.reset();
    assert_eq!(first.next_id().as_str(), "1");
}

#[test]
fn test_node_ids_unique_within_a_tree() {
    let lowered = lower_program(&factorial_program());
    let ids = collect_ids(&lowered.program);
    let unique: FxHashSet<&String> = ids.iter().collect();
    assert_eq!(ids.len(), unique.len(), "duplicate node IDs in {ids:?}");
}

#[test]
fn test_identical_input_yields_identical_ids() {
    let a = lower_program(&factorial_program());
    let b = lower_program(&factorial_program());
    assert_eq!(collect_ids(&a.program), collect_ids(&b.program));
}
