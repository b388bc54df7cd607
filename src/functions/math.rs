//! Numeric helpers. Results stay integral when every input is.

use crate::{
    evaluator::{EvalError, Evaluator},
    functions::{ParamKind, Registry, Signature, number_arg},
    value::{Number, Value},
};

pub fn register(registry: &mut Registry) {
    use ParamKind::Number as Num;

    registry.register(Signature::new("mod", [Num, Num]), modulo);
    registry.register(Signature::new("floor", [Num]).instance(), floor);
    registry.register(Signature::new("ceil", [Num]).instance(), ceil);
    registry.register(Signature::new("round", [Num]).instance(), round);
    registry.register(Signature::new("abs", [Num]).instance(), abs);
    registry.register(Signature::new("pow", [Num, Num]).instance(), pow);
}

/// Remainder with the sign of the dividend.
fn modulo(_: &mut Evaluator<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let a = number_arg("mod", &args, 0)?;
    let b = number_arg("mod", &args, 1)?;
    match (a, b) {
        (_, Number::Integer(0)) => Err(EvalError::DivisionByZero),
        (_, Number::Float(d)) if d == 0.0 => Err(EvalError::DivisionByZero),
        (Number::Integer(a), Number::Integer(b)) => Ok(Value::Integer(a.wrapping_rem(b))),
        (a, b) => Ok(Value::Float(a.as_f64() % b.as_f64())),
    }
}

fn rounded(function: &str, args: &[Value], op: fn(f64) -> f64) -> Result<Value, EvalError> {
    match number_arg(function, args, 0)? {
        Number::Integer(n) => Ok(Value::Integer(n)),
        Number::Float(n) => {
            let n = op(n);
            if n.is_finite() && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
                Ok(Value::Integer(n as i64))
            } else {
                Ok(Value::Float(n))
            }
        }
    }
}

fn floor(_: &mut Evaluator<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    rounded("floor", &args, f64::floor)
}

fn ceil(_: &mut Evaluator<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    rounded("ceil", &args, f64::ceil)
}

fn round(_: &mut Evaluator<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    rounded("round", &args, f64::round)
}

fn abs(_: &mut Evaluator<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    match number_arg("abs", &args, 0)? {
        Number::Integer(n) => Ok(n
            .checked_abs()
            .map_or(Value::Float((n as f64).abs()), Value::Integer)),
        Number::Float(n) => Ok(Value::Float(n.abs())),
    }
}

fn pow(_: &mut Evaluator<'_>, args: Vec<Value>) -> Result<Value, EvalError> {
    let base = number_arg("pow", &args, 0)?;
    let exponent = number_arg("pow", &args, 1)?;

    if let (Number::Integer(b), Number::Integer(e)) = (base, exponent)
        && let Ok(e) = u32::try_from(e)
        && let Some(result) = b.checked_pow(e)
    {
        return Ok(Value::Integer(result));
    }
    Ok(Value::Float(base.as_f64().powf(exponent.as_f64())))
}
