//! Array and object helpers.
//!
//! Array functions are instance callable, so `filter(xs, p)` and
//! `xs.filter(p)` are the same call. Lambdas receive `(element, index)`.

use crate::{
    evaluator::{EvalError, Evaluator},
    functions::{
        ParamKind, Registry, Signature, array_arg, callable_arg, number_arg, object_arg,
        string_arg,
    },
    value::{Map, Value},
};

pub fn register(registry: &mut Registry) {
    use ParamKind::*;

    registry.register(Signature::new("asArray", [Object, String, String]), as_array);
    registry.register(Signature::new("keys", [Object]), keys);
    registry.register(Signature::new("values", [Object]), values);
    registry.register(Signature::new("reverse", [Array]).instance(), reverse);
    registry.register(Signature::new("contains", [Array, String]).instance(), contains_string);
    registry.register(Signature::new("contains", [Array, Number]).instance(), contains_number);
    registry.register(Signature::new("filter", [Array, Lambda]).instance(), filter);
    registry.register(Signature::new("map", [Array, Lambda]).instance(), map);
    registry.register(
        Signature::new("flatMap", [Array, Lambda]).instance().optional_lambda(),
        flat_map,
    );
    registry.register(
        Signature::new("count", [Array, Lambda]).instance().optional_lambda(),
        count,
    );
    registry.register(Signature::new("findFirst", [Array, Lambda]).instance(), find_first);
    registry.register(Signature::new("indexOf", [Array, Any]).instance(), index_of);
    registry.register(Signature::new("encode", [Array, Number, Lambda]).instance(), encode);
    registry.register(Signature::new("sublist", [Array, Number, Number]).instance(), sublist);
    registry.register(Signature::new("sublist", [Array, Number]).instance(), sublist);
    registry.register(
        Signature::new("max", [Array, Lambda]).instance().optional_lambda(),
        max,
    );
    registry.register(
        Signature::new("min", [Array, Lambda]).instance().optional_lambda(),
        min,
    );
}

fn failed(function: &str, message: impl Into<String>) -> EvalError {
    EvalError::FunctionFailed {
        function: function.to_string(),
        message: message.into(),
    }
}

/// Invoke the optional lambda at `args[1]`, or return the element itself.
fn apply(
    evaluator: &mut Evaluator<'_>,
    lambda: Option<&Value>,
    element: &Value,
    index: usize,
) -> Result<Value, EvalError> {
    match lambda {
        Some(lambda) => {
            evaluator.invoke(lambda, vec![element.clone(), Value::Integer(index as i64)])
        }
        None => Ok(element.clone()),
    }
}

/// `asArray({a: 1}, 'key', 'value')` → `[{key: 'a', value: 1}]`
fn as_array(_: &mut Evaluator<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let object = object_arg("asArray", &args, 0)?;
    let key_name = string_arg("asArray", &args, 1)?;
    let value_name = string_arg("asArray", &args, 2)?;

    let entries = object
        .iter()
        .map(|(key, value)| {
            let mut entry = Map::new();
            entry.insert(key_name.to_string(), Value::String(key.clone()));
            entry.insert(value_name.to_string(), value.clone());
            Value::object(entry)
        })
        .collect();
    Ok(Value::array(entries))
}

fn keys(_: &mut Evaluator<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let object = object_arg("keys", &args, 0)?;
    Ok(Value::array(
        object.keys().map(|key| Value::String(key.clone())).collect(),
    ))
}

fn values(_: &mut Evaluator<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let object = object_arg("values", &args, 0)?;
    Ok(Value::array(object.values().cloned().collect()))
}

fn reverse(_: &mut Evaluator<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let items = array_arg("reverse", &args, 0)?;
    Ok(Value::array(items.iter().rev().cloned().collect()))
}

/// Only string elements can match.
fn contains_string(_: &mut Evaluator<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let items = array_arg("contains", &args, 0)?;
    let needle = string_arg("contains", &args, 1)?;
    Ok(Value::Boolean(
        items.iter().any(|item| item.as_str() == Some(needle)),
    ))
}

/// Only numeric elements can match, compared by value.
fn contains_number(_: &mut Evaluator<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let items = array_arg("contains", &args, 0)?;
    let needle = number_arg("contains", &args, 1)?.as_f64();
    Ok(Value::Boolean(items.iter().any(|item| match item {
        Value::Integer(n) => *n as f64 == needle,
        Value::Float(n) => *n == needle,
        _ => false,
    })))
}

fn filter(evaluator: &mut Evaluator<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let items = array_arg("filter", &args, 0)?;
    let predicate = callable_arg(&args, 1);

    let mut kept = Vec::new();
    for (index, item) in items.iter().enumerate() {
        if apply(evaluator, predicate, item, index)?.is_truthy() {
            kept.push(item.clone());
        }
    }
    Ok(Value::array(kept))
}

fn map(evaluator: &mut Evaluator<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let items = array_arg("map", &args, 0)?;
    let lambda = callable_arg(&args, 1);

    let mapped = items
        .iter()
        .enumerate()
        .map(|(index, item)| apply(evaluator, lambda, item, index))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::array(mapped))
}

/// Map, then splice array results into the output one level deep.
fn flat_map(evaluator: &mut Evaluator<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let items = array_arg("flatMap", &args, 0)?;
    let lambda = callable_arg(&args, 1);

    let mut flattened = Vec::new();
    for (index, item) in items.iter().enumerate() {
        match apply(evaluator, lambda, item, index)? {
            Value::Array(inner) => flattened.extend(inner.iter().cloned()),
            other => flattened.push(other),
        }
    }
    Ok(Value::array(flattened))
}

fn count(evaluator: &mut Evaluator<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let items = array_arg("count", &args, 0)?;
    let Some(predicate) = callable_arg(&args, 1) else {
        return Ok(Value::Integer(items.len() as i64));
    };

    let mut matched = 0;
    for (index, item) in items.iter().enumerate() {
        if apply(evaluator, Some(predicate), item, index)?.is_truthy() {
            matched += 1;
        }
    }
    Ok(Value::Integer(matched))
}

fn find_first(evaluator: &mut Evaluator<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let items = array_arg("findFirst", &args, 0)?;
    let predicate = callable_arg(&args, 1);

    for (index, item) in items.iter().enumerate() {
        if apply(evaluator, predicate, item, index)?.is_truthy() {
            return Ok(item.clone());
        }
    }
    Err(failed("findFirst", "no matching items found"))
}

/// Position of the first element whose text form equals the needle's, or -1.
fn index_of(_: &mut Evaluator<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let items = array_arg("indexOf", &args, 0)?;
    let needle = args.get(1).map(Value::to_display_string).unwrap_or_default();

    let position = items
        .iter()
        .position(|item| item.to_display_string() == needle)
        .map_or(-1, |index| index as i64);
    Ok(Value::Integer(position))
}

/// Pack lambda results into fixed-width bit fields of a 32-bit integer.
///
/// `space` must be a power of two of at least 2; each field is
/// `log2(space)` bits wide and the first element occupies the lowest bits.
/// Elements beyond what fits in 32 bits are ignored.
fn encode(evaluator: &mut Evaluator<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let items = array_arg("encode", &args, 0)?;
    let space = number_arg("encode", &args, 1)?.as_i64();
    let lambda = callable_arg(&args, 2);

    if space < 2 || space > i64::from(i32::MAX) || space & (space - 1) != 0 {
        return Err(EvalError::ArgumentTypeError {
            function: "encode".to_string(),
            message: format!("space must be a power of 2 greater than 1, found {}", space),
        });
    }

    let bits = space.trailing_zeros() as usize;
    let mut result: i32 = 0;
    for (index, item) in items.iter().take(32 / bits).enumerate() {
        let value = apply(evaluator, lambda, item, index)?;
        let number = value
            .to_number()
            .ok_or_else(|| {
                let message = format!("lambda must return a number, found {}", value.kind_name());
                failed("encode", message)
            })?
            .as_i64();
        if !(0..space).contains(&number) {
            return Err(failed(
                "encode",
                format!("number {} is out of range 0..{}", number, space - 1),
            ));
        }
        result = result.wrapping_add((number as i32) << (index * bits));
    }
    Ok(Value::Integer(i64::from(result)))
}

/// Elements from `start` (inclusive) to `end` (exclusive, defaults to the length).
fn sublist(_: &mut Evaluator<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let items = array_arg("sublist", &args, 0)?;
    let length = items.len();
    let start = number_arg("sublist", &args, 1)?.as_i64();

    if start < 0 || start as usize >= length {
        return Err(EvalError::IndexOutOfRange { index: start, length });
    }
    let end = match args.get(2) {
        Some(_) => {
            let end = number_arg("sublist", &args, 2)?.as_i64();
            if end < start || end as usize >= length {
                return Err(EvalError::IndexOutOfRange { index: end, length });
            }
            end as usize
        }
        None => length,
    };

    Ok(Value::array(items[start as usize..end].to_vec()))
}

/// Element whose key (the lambda result, or the element) is extreme.
/// Earlier elements win ties.
fn extreme(
    function: &str,
    evaluator: &mut Evaluator<'_>,
    args: &[Value],
    better: fn(f64, f64) -> bool,
) -> Result<Value, EvalError> {
    let items = array_arg(function, args, 0)?;
    let lambda = callable_arg(args, 1);

    let mut best: Option<(&Value, f64)> = None;
    for (index, item) in items.iter().enumerate() {
        let key = apply(evaluator, lambda, item, index)?;
        let key = key
            .to_number()
            .ok_or_else(|| {
                failed(function, format!("expected a number, found {}", key.kind_name()))
            })?
            .as_f64();
        if best.is_none_or(|(_, current)| better(key, current)) {
            best = Some((item, key));
        }
    }
    Ok(best.map_or(Value::Null, |(item, _)| item.clone()))
}

fn max(evaluator: &mut Evaluator<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    extreme("max", evaluator, &args, |candidate, current| candidate > current)
}

fn min(evaluator: &mut Evaluator<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    extreme("min", evaluator, &args, |candidate, current| candidate < current)
}

#[cfg(test)]
mod tests {
    use crate::evaluator::resolve_expression;
    use crate::scope::Scope;
    use crate::value::Value;

    fn eval(source: &str) -> Value {
        resolve_expression(source, &Scope::new()).unwrap()
    }

    fn ints(values: &[i64]) -> Value {
        Value::array(values.iter().map(|n| Value::Integer(*n)).collect())
    }

    #[test]
    fn test_flat_map_without_lambda() {
        assert_eq!(eval("flatMap([[1, 2], 3, [4]])"), ints(&[1, 2, 3, 4]));
    }

    #[test]
    fn test_count_with_and_without_predicate() {
        assert_eq!(eval("count(0..4)"), Value::Integer(5));
        assert_eq!(eval("count(0..4, x => mod(x, 2) == 0)"), Value::Integer(3));
    }

    #[test]
    fn test_index_of_compares_text() {
        assert_eq!(eval("indexOf(1..5, 2)"), Value::Integer(1));
        assert_eq!(eval("indexOf(['a', '2'], 2)"), Value::Integer(1));
        assert_eq!(eval("indexOf(1..5, 9)"), Value::Integer(-1));
    }

    #[test]
    fn test_max_min() {
        assert_eq!(eval("max(0..4)"), Value::Integer(4));
        assert_eq!(eval("min([3, 1, 2])"), Value::Integer(1));
        assert_eq!(eval("max([])"), Value::Null);
        assert_eq!(eval("[[1], [1, 2, 3], [1, 2]].max(x => count(x))"), ints(&[1, 2, 3]));
    }

    #[test]
    fn test_encode_packs_nibbles() {
        assert_eq!(eval("1..10.encode(16, x => x)"), Value::Integer(-2023406815));
        assert_eq!(eval("[1, 1].encode(2, x => x)"), Value::Integer(3));
    }

    #[test]
    fn test_sublist_without_end() {
        assert_eq!(eval("0..10.sublist(4, 8)"), ints(&[4, 5, 6, 7]));
        assert_eq!(eval("0..5.sublist(3)"), ints(&[3, 4, 5]));
    }
}
