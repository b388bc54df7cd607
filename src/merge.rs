//! # Merge Engine
//!
//! Combines a `parent` value into a `template` value. Used for module and
//! scope composition, for `$extend` inheritance, and for folding iteration
//! results into their enclosing object.
//!
//! Rules, applied key by key for objects:
//!
//! | parent value | template value        | result                                   |
//! |--------------|-----------------------|------------------------------------------|
//! | any          | absent                | deep copy of the parent value            |
//! | object       | array                 | parent object appended to the array      |
//! | object       | `null` / `"null"`     | key removed                              |
//! | object       | object                | merged recursively                       |
//! | object       | other scalar          | [`EvalError::MergeConflict`]             |
//! | array        | array                 | parent elements appended                 |
//! | array        | `null` / `"null"`     | key removed                              |
//! | array        | other                 | `[template, ...parent]`                  |
//! | scalar       | any                   | template value kept                      |
//!
//! Parent values are always deep-copied, so the parent stays reusable.
//! Merging a node into itself is a [`EvalError::MergeConflict`].

use std::sync::Arc;

use crate::{
    evaluator::EvalError,
    path::Path,
    value::{Map, Value},
};

#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Keep,
    Remove,
}

/// Merge `parent` into `template` and return the result.
///
/// ```
/// use jsonte::merge::merge;
/// use jsonte::Value;
///
/// let template = Value::from(serde_json::json!({"a": 1, "list": [1]}));
/// let parent = Value::from(serde_json::json!({"a": 2, "b": 3, "list": [2]}));
///
/// let merged = merge(template, &parent).unwrap();
/// assert_eq!(merged.to_string(), r#"{"a":1,"list":[1,2],"b":3}"#);
/// ```
pub fn merge(mut template: Value, parent: &Value) -> Result<Value, EvalError> {
    merge_into(&mut template, parent)?;
    Ok(template)
}

/// Merge `parent` into `template` in place.
pub fn merge_into(template: &mut Value, parent: &Value) -> Result<(), EvalError> {
    merge_at(template, parent, &Path::root())
}

fn self_merge(path: &Path) -> EvalError {
    EvalError::MergeConflict {
        path: path.clone(),
        reason: "cannot merge a value into itself".to_string(),
    }
}

fn merge_at(template: &mut Value, parent: &Value, path: &Path) -> Result<(), EvalError> {
    if template.same_node(parent) {
        return Err(self_merge(path));
    }

    match (template, parent) {
        (Value::Object(map), Value::Object(parent_map)) => {
            merge_objects(Arc::make_mut(map), parent_map, path)
        }
        (Value::Array(items), Value::Array(parent_items)) => {
            Arc::make_mut(items).extend(parent_items.iter().map(Value::deep_copy));
            Ok(())
        }
        (Value::Array(items), Value::Object(_)) => {
            Arc::make_mut(items).push(parent.deep_copy());
            Ok(())
        }
        (template, Value::Object(_) | Value::Array(_)) => Err(EvalError::MergeConflict {
            path: path.clone(),
            reason: format!(
                "cannot merge {} into {}",
                parent.kind_name(),
                template.kind_name()
            ),
        }),
        _ => Ok(()),
    }
}

fn merge_objects(template: &mut Map, parent: &Map, path: &Path) -> Result<(), EvalError> {
    for (key, parent_value) in parent {
        let Some(template_value) = template.get_mut(key) else {
            template.insert(key.clone(), parent_value.deep_copy());
            continue;
        };
        if merge_entry(template_value, parent_value, &path.field(key))? == Outcome::Remove {
            template.shift_remove(key);
        }
    }
    Ok(())
}

/// Merge one key present on both sides.
fn merge_entry(template: &mut Value, parent: &Value, path: &Path) -> Result<Outcome, EvalError> {
    if template.same_node(parent) {
        return Err(self_merge(path));
    }

    match parent {
        Value::Object(_) | Value::Array(_) if template.is_deletion_sentinel() => {
            Ok(Outcome::Remove)
        }
        Value::Object(_) => {
            merge_at(template, parent, path)?;
            Ok(Outcome::Keep)
        }
        Value::Array(parent_items) => {
            match template {
                Value::Array(items) => {
                    Arc::make_mut(items).extend(parent_items.iter().map(Value::deep_copy));
                }
                scalar => {
                    let mut items = Vec::with_capacity(parent_items.len() + 1);
                    items.push(std::mem::replace(scalar, Value::Null));
                    items.extend(parent_items.iter().map(Value::deep_copy));
                    *scalar = Value::array(items);
                }
            }
            Ok(Outcome::Keep)
        }
        _ => Ok(Outcome::Keep),
    }
}

/// Remove every `null` and `"null"` from objects and arrays, recursively.
pub fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let map = Arc::make_mut(map);
            map.retain(|_, v| !v.is_deletion_sentinel());
            map.values_mut().for_each(strip_nulls);
        }
        Value::Array(items) => {
            let items = Arc::make_mut(items);
            items.retain(|v| !v.is_deletion_sentinel());
            items.iter_mut().for_each(strip_nulls);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_conflict_reports_path() {
        let template = Value::from(json!({"a": {"b": 1}}));
        let parent = Value::from(json!({"a": {"b": {"c": 1}}}));
        match merge(template, &parent) {
            Err(EvalError::MergeConflict { path, .. }) => assert_eq!(path.to_string(), "#/a/b"),
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_parent_stays_unaliased() {
        let parent = Value::from(json!({"list": [1, {"x": 1}]}));
        let merged = merge(Value::from(json!({})), &parent).unwrap();

        let copied = &merged.as_object().unwrap()["list"];
        let original = &parent.as_object().unwrap()["list"];
        assert_eq!(copied, original);
        assert!(!copied.same_node(original));
    }

    #[test]
    fn test_strip_nulls_is_recursive() {
        let mut value = Value::from(json!({"a": null, "b": ["null", 1, null, {"c": "null"}]}));
        strip_nulls(&mut value);
        assert_eq!(value, Value::from(json!({"b": [1, {}]})));
    }
}
