// tests/merge_tests.rs

use jsonte::{EvalError, Value, merge, merge_into, strip_nulls};
use pretty_assertions::assert_eq;
use serde_json::json;

fn value(json: serde_json::Value) -> Value {
    Value::from(json)
}

fn to_json(value: &Value) -> serde_json::Value {
    serde_json::Value::try_from(value).unwrap()
}

// ============================================================================
// Key Rules
// ============================================================================

#[test]
fn test_template_wins_for_scalars() {
    let merged = merge(value(json!({"a": 1})), &value(json!({"a": 2, "b": 3}))).unwrap();
    assert_eq!(to_json(&merged), json!({"a": 1, "b": 3}));
}

#[test]
fn test_nested_objects_merge_recursively() {
    let merged = merge(
        value(json!({"outer": {"keep": true}})),
        &value(json!({"outer": {"keep": false, "added": 1}})),
    )
    .unwrap();
    assert_eq!(to_json(&merged), json!({"outer": {"keep": true, "added": 1}}));
}

#[test]
fn test_arrays_concatenate_template_first() {
    let merged = merge(value(json!({"list": [1, 2]})), &value(json!({"list": [3]}))).unwrap();
    assert_eq!(to_json(&merged), json!({"list": [1, 2, 3]}));
}

#[test]
fn test_scalar_prepended_to_parent_array() {
    let merged = merge(value(json!({"list": 0})), &value(json!({"list": [1, 2]}))).unwrap();
    assert_eq!(to_json(&merged), json!({"list": [0, 1, 2]}));
}

#[test]
fn test_parent_object_appended_to_template_array() {
    let merged = merge(value(json!({"list": [1]})), &value(json!({"list": {"x": 1}}))).unwrap();
    assert_eq!(to_json(&merged), json!({"list": [1, {"x": 1}]}));
}

#[test]
fn test_scalar_over_parent_object_conflicts() {
    let err = merge(
        value(json!({"a": {"b": 1}})),
        &value(json!({"a": {"b": {"c": 1}}})),
    )
    .unwrap_err();
    match err {
        EvalError::MergeConflict { path, .. } => assert_eq!(path.to_string(), "#/a/b"),
        other => panic!("expected a merge conflict, got {:?}", other),
    }
}

// ============================================================================
// Deletion Sentinel
// ============================================================================

#[test]
fn test_null_removes_parent_container() {
    let merged = merge(
        value(json!({"a": null, "b": "null", "c": 1})),
        &value(json!({"a": {"x": 1}, "b": [1, 2], "d": 2})),
    )
    .unwrap();
    assert_eq!(to_json(&merged), json!({"c": 1, "d": 2}));
}

#[test]
fn test_null_over_parent_scalar_is_stripped_later() {
    let mut merged = merge(value(json!({"a": null})), &value(json!({"a": 1}))).unwrap();
    assert_eq!(to_json(&merged), json!({"a": null}));
    strip_nulls(&mut merged);
    assert_eq!(to_json(&merged), json!({}));
}

#[test]
fn test_strip_nulls_is_recursive() {
    let mut tree = value(json!({"a": [1, null, "null", {"b": null, "c": 2}], "d": "null"}));
    strip_nulls(&mut tree);
    assert_eq!(to_json(&tree), json!({"a": [1, {"c": 2}]}));
}

// ============================================================================
// Identity and Idempotence
// ============================================================================

#[test]
fn test_self_merge_fails() {
    let shared = value(json!({"a": 1}));
    assert!(matches!(
        merge(shared.clone(), &shared),
        Err(EvalError::MergeConflict { .. })
    ));

    let list = value(json!([1, 2]));
    let mut alias = list.clone();
    assert!(matches!(merge_into(&mut alias, &list), Err(EvalError::MergeConflict { .. })));
}

#[test]
fn test_shared_nested_node_fails() {
    let inner = value(json!({"x": 1}));
    let mut template = jsonte::value::Map::new();
    template.insert("k".to_string(), inner.clone());
    let mut parent = jsonte::value::Map::new();
    parent.insert("k".to_string(), inner);

    let err = merge(Value::object(template), &Value::object(parent)).unwrap_err();
    match err {
        EvalError::MergeConflict { path, .. } => assert_eq!(path.to_string(), "#/k"),
        other => panic!("expected a merge conflict, got {:?}", other),
    }
}

#[test]
fn test_merge_is_idempotent_without_arrays() {
    let template = value(json!({"a": 1, "nested": {"x": true}}));
    let parent = value(json!({"a": 2, "nested": {"x": false, "y": "z"}}));

    let once = merge(template, &parent).unwrap();
    let twice = merge(once.clone(), &parent).unwrap();
    assert_eq!(to_json(&twice), to_json(&once));
}

#[test]
fn test_arrays_grow_on_repeated_merge() {
    let parent = value(json!({"list": [1]}));
    let once = merge(value(json!({"list": []})), &parent).unwrap();
    let twice = merge(once, &parent).unwrap();
    assert_eq!(to_json(&twice), json!({"list": [1, 1]}));
}

#[test]
fn test_parent_is_not_aliased() {
    let parent = value(json!({"nested": {"x": 1}, "list": [1]}));
    let merged = merge(value(json!({})), &parent).unwrap();

    let (Value::Object(merged_map), Value::Object(parent_map)) = (&merged, &parent) else {
        panic!("expected objects");
    };
    for key in ["nested", "list"] {
        assert!(!merged_map[key].same_node(&parent_map[key]), "{} is aliased", key);
    }

    // The parent stays reusable as a module scope.
    let again = merge(merged, &parent).unwrap();
    assert_eq!(to_json(&again), json!({"nested": {"x": 1}, "list": [1, 1]}));
}
