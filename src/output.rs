//! JSON conversion and output for template values.
//!
//! Values convert to and from [`serde_json::Value`]. Object keys keep their
//! insertion order in both directions, so output follows the order in which
//! the template produced the keys.
//!
//! # Features
//!
//! - **Compact output** via [`to_json()`] - minimal whitespace
//! - **Pretty output** via [`to_json_pretty()`] - human-readable with 2-space indentation
//! - **Type preservation** - integers stay integers, floats stay floats
//!
//! # Examples
//!
//! ```
//! use jsonte::Value;
//! use jsonte::output::{to_json, to_json_pretty};
//!
//! let value = Value::from(serde_json::json!({"b": 1, "a": [true, null]}));
//!
//! assert_eq!(to_json(&value).unwrap(), r#"{"b":1,"a":[true,null]}"#);
//! assert_eq!(
//!     to_json_pretty(&value).unwrap(),
//!     "{\n  \"b\": 1,\n  \"a\": [\n    true,\n    null\n  ]\n}"
//! );
//! ```

use crate::{
    evaluator::EvalError,
    value::{Map, Value},
};

pub struct JsonPrinter {
    pretty: bool,
}

impl JsonPrinter {
    pub fn new(pretty: bool) -> Self {
        JsonPrinter { pretty }
    }

    /// Render a value as JSON text.
    ///
    /// Fails for lambdas and function references, which have no JSON form.
    pub fn print(&self, value: &Value) -> Result<String, EvalError> {
        let json = serde_json::Value::try_from(value)?;
        let text = if self.pretty {
            serde_json::to_string_pretty(&json)
        } else {
            serde_json::to_string(&json)
        };
        text.map_err(|e| EvalError::TypeError(format!("Cannot serialize value: {}", e)))
    }
}

/// Convert value to compact JSON string
pub fn to_json(value: &Value) -> Result<String, EvalError> {
    JsonPrinter::new(false).print(value)
}

/// Convert value to pretty-printed JSON string
pub fn to_json_pretty(value: &Value) -> Result<String, EvalError> {
    JsonPrinter::new(true).print(value)
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map_or(Value::Null, Value::Float),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect::<Map>(),
            ),
        }
    }
}

impl TryFrom<&Value> for serde_json::Value {
    type Error = EvalError;

    /// Non-finite floats become `null`, as JSON has no representation for them.
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Ok(match value {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(serde_json::Value::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), serde_json::Value::try_from(v)?)))
                    .collect::<Result<_, EvalError>>()?,
            ),
            Value::Lambda(_) | Value::Function(_) => {
                return Err(EvalError::TypeError(format!(
                    "Cannot convert {} to JSON",
                    value.kind_name()
                )));
            }
        })
    }
}

impl TryFrom<Value> for serde_json::Value {
    type Error = EvalError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        serde_json::Value::try_from(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integers_and_floats_survive() {
        let json = json!({"i": 3, "f": 2.5, "big": 1e300});
        let value = Value::from(json.clone());
        assert_eq!(value.as_object().unwrap()["i"], Value::Integer(3));
        assert_eq!(value.as_object().unwrap()["f"], Value::Float(2.5));
        assert_eq!(serde_json::Value::try_from(&value).unwrap(), json);
    }

    #[test]
    fn test_callables_are_rejected() {
        let value = Value::array(vec![Value::Function(crate::value::FunctionRef {
            name: "keys".into(),
        })]);
        assert!(matches!(to_json(&value), Err(EvalError::TypeError(_))));
    }
}
