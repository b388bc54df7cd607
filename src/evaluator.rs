use std::sync::Arc;

use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};
use thiserror::Error;
use tracing::trace;

use crate::{
    ast::{BinOp, Expr, UnaryOp},
    functions::Registry,
    lexer::{LexError, tokenize},
    parser::{ParseError, parse},
    path::Path,
    scope::Scope,
    value::{FunctionRef, Lambda, Map, Number, Value},
};

/// Errors that can occur while evaluating expressions or merging values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("Lex error: {0}")]
    Lex(#[from] LexError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Identifier not bound in any scope layer
    #[error("Unknown variable: {name}")]
    UnknownVariable { name: String },

    /// No overload accepts the name and argument count
    #[error("Unknown function: {name} with {arity} argument(s)")]
    UnknownFunction { name: String, arity: usize },

    /// The chosen overload could not accept an argument
    #[error("Invalid argument for {function}: {message}")]
    ArgumentTypeError { function: String, message: String },

    /// Type mismatch or invalid operation for the given type
    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Index {index} is out of range for length {length}")]
    IndexOutOfRange { index: i64, length: usize },

    #[error("Recursion limit of {limit} exceeded")]
    RecursionLimitExceeded { limit: usize },

    /// Self-merge or structurally irreconcilable merge
    #[error("Merge conflict at {path}: {reason}")]
    MergeConflict { path: Path, reason: String },

    #[error("Module not found: {name}")]
    ModuleNotFound { name: String },

    /// Domain failure raised by a registered function
    #[error("{function} failed: {message}")]
    FunctionFailed { function: String, message: String },
}

/// Limits applied during evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalConfig {
    /// Maximum nesting of expressions, lambda invocations and function calls
    pub max_depth: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig { max_depth: 256 }
    }
}

/// The expression evaluator.
///
/// Evaluates parsed expressions against a [`Scope`], dispatching calls
/// through a [`Registry`]. An evaluator only tracks the current nesting
/// depth, so one can be created per document or per expression.
pub struct Evaluator<'r> {
    registry: &'r Registry,
    config: EvalConfig,
    depth: usize,
}

impl<'r> Evaluator<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Evaluator::with_config(registry, EvalConfig::default())
    }

    pub fn with_config(registry: &'r Registry, config: EvalConfig) -> Self {
        Evaluator {
            registry,
            config,
            depth: 0,
        }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Evaluates an expression against a scope.
    ///
    /// Operands and arguments are evaluated left to right.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use jsonte::{Evaluator, Registry, Scope, Value, compile};
    ///
    /// let registry = Registry::with_builtins();
    /// let mut scope = Scope::new();
    /// scope.insert("price", Value::Integer(100));
    ///
    /// let expr = compile("price > 50 ? 'expensive' : 'cheap'").unwrap();
    /// let mut evaluator = Evaluator::new(&registry);
    /// let result = evaluator.evaluate(&expr, &Arc::new(scope)).unwrap();
    /// assert_eq!(result, Value::String("expensive".into()));
    /// ```
    pub fn evaluate(&mut self, expr: &Expr, scope: &Arc<Scope>) -> Result<Value, EvalError> {
        self.enter()?;
        let result = self.eval_expr(expr, scope);
        self.depth -= 1;
        result
    }

    fn enter(&mut self) -> Result<(), EvalError> {
        if self.depth >= self.config.max_depth {
            return Err(EvalError::RecursionLimitExceeded {
                limit: self.config.max_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    /// Calls a lambda or function reference with positional arguments.
    ///
    /// A lambda binds its parameters to the arguments in a fresh layer over
    /// the scope it was created in; missing arguments bind to null and extra
    /// ones are ignored. A function reference calls the registered function
    /// with as many leading arguments as it accepts.
    pub fn invoke(&mut self, callable: &Value, args: Vec<Value>) -> Result<Value, EvalError> {
        match callable {
            Value::Lambda(lambda) => {
                let mut bindings = Map::new();
                for (i, param) in lambda.params.iter().enumerate() {
                    bindings.insert(param.clone(), args.get(i).cloned().unwrap_or(Value::Null));
                }
                let scope = Arc::new(Scope::with_bindings(&lambda.scope, bindings));
                self.evaluate(&lambda.body, &scope)
            }
            Value::Function(function) => self.invoke_function_ref(function, args),
            other => Err(EvalError::TypeError(format!(
                "{} is not callable",
                other.kind_name()
            ))),
        }
    }

    fn invoke_function_ref(
        &mut self,
        function: &FunctionRef,
        mut args: Vec<Value>,
    ) -> Result<Value, EvalError> {
        let arity = args.len();
        while !self.registry.accepts_arity(&function.name, args.len()) {
            if args.pop().is_none() {
                return Err(EvalError::UnknownFunction {
                    name: function.name.clone(),
                    arity,
                });
            }
            trace!(function = %function.name, arity = args.len(), "dropping trailing argument");
        }
        self.call_function(&function.name, args, false)
    }

    /// Resolves `name` in the registry and calls the chosen overload.
    pub fn call_function(
        &mut self,
        name: &str,
        args: Vec<Value>,
        has_target: bool,
    ) -> Result<Value, EvalError> {
        let registry = self.registry;
        let resolved = registry.resolve(name, args, has_target)?;
        self.enter()?;
        let result = (resolved.overload.implementation)(self, resolved.args);
        self.depth -= 1;
        result
    }

    fn eval_args(&mut self, args: &[Expr], scope: &Arc<Scope>) -> Result<Vec<Value>, EvalError> {
        args.iter().map(|arg| self.evaluate(arg, scope)).collect()
    }

    fn eval_expr(&mut self, expr: &Expr, scope: &Arc<Scope>) -> Result<Value, EvalError> {
        match expr {
            Expr::Float(n) => Ok(Value::Float(*n)),
            Expr::Integer(n) => Ok(Value::Integer(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Boolean(b) => Ok(Value::Boolean(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Identifier(name) => {
                if let Some(value) = scope.get(name) {
                    Ok(value.clone())
                } else if self.registry.contains(name) {
                    Ok(Value::Function(FunctionRef { name: name.clone() }))
                } else {
                    Err(EvalError::UnknownVariable { name: name.clone() })
                }
            }
            Expr::Array(items) => Ok(Value::array(self.eval_args(items, scope)?)),
            Expr::Object(entries) => {
                let mut map = Map::new();
                for (key, expr) in entries {
                    let value = self.evaluate(expr, scope)?;
                    map.insert(key.clone(), value);
                }
                Ok(Value::object(map))
            }
            Expr::Range { start, end } => {
                let start = self.evaluate(start, scope)?;
                let end = self.evaluate(end, scope)?;
                range(&start, &end)
            }
            Expr::Unary { op, operand } => {
                let value = self.evaluate(operand, scope)?;
                apply_unary(*op, &value)
            }
            Expr::BinaryOp { op, left, right } => match op {
                BinOp::And => {
                    let left = self.evaluate(left, scope)?;
                    if !left.is_truthy() {
                        return Ok(Value::Boolean(false));
                    }
                    Ok(Value::Boolean(self.evaluate(right, scope)?.is_truthy()))
                }
                BinOp::Or => {
                    let left = self.evaluate(left, scope)?;
                    if left.is_truthy() {
                        return Ok(Value::Boolean(true));
                    }
                    Ok(Value::Boolean(self.evaluate(right, scope)?.is_truthy()))
                }
                _ => {
                    let left = self.evaluate(left, scope)?;
                    let right = self.evaluate(right, scope)?;
                    apply_binop(*op, &left, &right)
                }
            },
            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition, scope)?.is_truthy() {
                    self.evaluate(then_branch, scope)
                } else {
                    self.evaluate(else_branch, scope)
                }
            }
            Expr::Member { object, name } => {
                let target = self.evaluate(object, scope)?;
                self.member_access(target, name)
            }
            Expr::Index { object, index } => {
                let target = self.evaluate(object, scope)?;
                let index = self.evaluate(index, scope)?;
                apply_index(&target, &index)
            }
            Expr::Call {
                target: Some(target),
                name,
                args,
            } => {
                let target = self.evaluate(target, scope)?;
                if let Value::Object(map) = &target
                    && let Some(member) = map.get(name)
                {
                    // Object members shadow instance functions of the same name.
                    let member = member.clone();
                    let args = self.eval_args(args, scope)?;
                    return self.invoke(&member, args).map_err(|err| match err {
                        EvalError::TypeError(_) if !member.is_callable() => {
                            EvalError::TypeError(format!(
                                "member '{}' is a {}, not a function",
                                name,
                                member.kind_name()
                            ))
                        }
                        other => other,
                    });
                }
                let mut values = Vec::with_capacity(args.len() + 1);
                values.push(target);
                values.extend(self.eval_args(args, scope)?);
                self.call_function(name, values, true)
            }
            Expr::Call {
                target: None,
                name,
                args,
            } => {
                if let Some(bound) = scope.get(name)
                    && bound.is_callable()
                {
                    let bound = bound.clone();
                    let args = self.eval_args(args, scope)?;
                    return self.invoke(&bound, args);
                }
                let args = self.eval_args(args, scope)?;
                self.call_function(name, args, false)
            }
            Expr::Lambda { params, body } => Ok(Value::Lambda(Arc::new(Lambda {
                params: params.clone(),
                body: Arc::clone(body),
                scope: Arc::clone(scope),
            }))),
        }
    }

    /// `target.name` without a call.
    ///
    /// Objects yield the bound member, falling back to an instance function
    /// taking only the target, and null when neither exists. Other values
    /// only have instance functions.
    fn member_access(&mut self, target: Value, name: &str) -> Result<Value, EvalError> {
        if let Value::Object(map) = &target {
            if let Some(value) = map.get(name) {
                return Ok(value.clone());
            }
            return match self.call_function(name, vec![target], true) {
                Err(EvalError::UnknownFunction { .. } | EvalError::ArgumentTypeError { .. }) => {
                    Ok(Value::Null)
                }
                result => result,
            };
        }

        let kind = target.kind_name();
        match self.call_function(name, vec![target], true) {
            Err(EvalError::UnknownFunction { .. }) => Err(EvalError::TypeError(format!(
                "{} has no member '{}'",
                kind, name
            ))),
            result => result,
        }
    }
}

/// Inclusive integer sequence between two numeric ends, ascending or descending.
fn range(start: &Value, end: &Value) -> Result<Value, EvalError> {
    let bound = |value: &Value| {
        value.to_number().map(Number::as_i64).ok_or_else(|| {
            EvalError::TypeError(format!(
                "Range bounds must be numbers, found {}",
                value.kind_name()
            ))
        })
    };
    let (start, end) = (bound(start)?, bound(end)?);

    let items = if start <= end {
        (start..=end).map(Value::Integer).collect()
    } else {
        (end..=start).rev().map(Value::Integer).collect()
    };
    Ok(Value::array(items))
}

fn apply_unary(op: UnaryOp, value: &Value) -> Result<Value, EvalError> {
    match (op, value) {
        (UnaryOp::Not, value) => Ok(Value::Boolean(!value.is_truthy())),
        (UnaryOp::Negate, Value::Integer(n)) => Ok(n
            .checked_neg()
            .map_or(Value::Float(-(*n as f64)), Value::Integer)),
        (UnaryOp::Negate, Value::Float(n)) => Ok(Value::Float(-n)),
        (UnaryOp::Negate, other) => Err(EvalError::TypeError(format!(
            "Cannot negate {}",
            other.kind_name()
        ))),
    }
}

fn apply_index(target: &Value, index: &Value) -> Result<Value, EvalError> {
    let position = |length: usize| -> Result<usize, EvalError> {
        match index.to_number() {
            Some(n) if n.is_integral() => {
                let i = n.as_i64();
                if i < 0 || i as usize >= length {
                    Err(EvalError::IndexOutOfRange { index: i, length })
                } else {
                    Ok(i as usize)
                }
            }
            _ => Err(EvalError::TypeError(format!(
                "Cannot index {} with {}",
                target.kind_name(),
                index.kind_name()
            ))),
        }
    };

    match (target, index) {
        (Value::Object(map), Value::String(key)) => {
            Ok(map.get(key).cloned().unwrap_or(Value::Null))
        }
        (Value::Object(map), _) => {
            let i = position(map.len())?;
            Ok(map
                .get_index(i)
                .map_or(Value::Null, |(key, _)| Value::String(key.clone())))
        }
        (Value::Array(items), _) => Ok(items[position(items.len())?].clone()),
        (Value::String(s), _) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::String(chars[position(chars.len())?].to_string()))
        }
        _ => Err(EvalError::TypeError(format!(
            "Cannot index {} with {}",
            target.kind_name(),
            index.kind_name()
        ))),
    }
}

fn apply_binop(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match op {
        BinOp::Equal => Ok(Value::Boolean(left.equals(right))),
        BinOp::NotEqual => Ok(Value::Boolean(!left.equals(right))),
        BinOp::LessThan | BinOp::GreaterThan | BinOp::LessEqual | BinOp::GreaterEqual => {
            let ordering = left.compare(right).ok_or_else(|| {
                EvalError::TypeError(format!(
                    "Cannot compare {} {} {}",
                    left.kind_name(),
                    op.symbol(),
                    right.kind_name()
                ))
            })?;
            Ok(Value::Boolean(match op {
                BinOp::LessThan => ordering.is_lt(),
                BinOp::GreaterThan => ordering.is_gt(),
                BinOp::LessEqual => ordering.is_le(),
                _ => ordering.is_ge(),
            }))
        }
        BinOp::Add if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) => {
            if left.is_callable() || right.is_callable() {
                return Err(EvalError::TypeError(format!(
                    "Cannot add {} and {}",
                    left.kind_name(),
                    right.kind_name()
                )));
            }
            Ok(Value::String(format!(
                "{}{}",
                left.to_display_string(),
                right.to_display_string()
            )))
        }
        BinOp::And => Ok(Value::Boolean(left.is_truthy() && right.is_truthy())),
        BinOp::Or => Ok(Value::Boolean(left.is_truthy() || right.is_truthy())),
        BinOp::Add | BinOp::Subtract | BinOp::Multiply | BinOp::Divide | BinOp::Modulo => {
            arithmetic(op, left, right)
        }
    }
}

fn arithmetic(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let numeric = |value: &Value| match value {
        Value::Integer(n) => Some(Number::Integer(*n)),
        Value::Float(n) => Some(Number::Float(*n)),
        _ => None,
    };
    let (Some(a), Some(b)) = (numeric(left), numeric(right)) else {
        return Err(EvalError::TypeError(format!(
            "Cannot apply '{}' to {} and {}",
            op.symbol(),
            left.kind_name(),
            right.kind_name()
        )));
    };

    if matches!(op, BinOp::Divide | BinOp::Modulo) && b.as_f64() == 0.0 {
        return Err(EvalError::DivisionByZero);
    }

    Ok(match (a, b) {
        (Number::Integer(a), Number::Integer(b)) => integer_arithmetic(op, a, b),
        (Number::Float(a), Number::Float(b)) => Value::Float(float_arithmetic(op, a, b)),
        (a, b) => mixed_arithmetic(op, a, b),
    })
}

/// Integer arithmetic; overflow and inexact division fall back to floats.
fn integer_arithmetic(op: BinOp, a: i64, b: i64) -> Value {
    let exact = match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Subtract => a.checked_sub(b),
        BinOp::Multiply => a.checked_mul(b),
        BinOp::Divide => a
            .checked_rem(b)
            .filter(|rem| *rem == 0)
            .and_then(|_| a.checked_div(b)),
        BinOp::Modulo => a.checked_rem(b),
        _ => None,
    };
    exact.map_or_else(
        || Value::Float(float_arithmetic(op, a as f64, b as f64)),
        Value::Integer,
    )
}

fn float_arithmetic(op: BinOp, a: f64, b: f64) -> f64 {
    match op {
        BinOp::Add => a + b,
        BinOp::Subtract => a - b,
        BinOp::Multiply => a * b,
        BinOp::Divide => a / b,
        _ => a % b,
    }
}

/// Integer and float mixed: computed exactly in decimal and collapsed to an
/// integer when the result is whole.
fn mixed_arithmetic(op: BinOp, a: Number, b: Number) -> Value {
    let decimal = |n: Number| match n {
        Number::Integer(n) => Decimal::from_i64(n),
        Number::Float(n) => Decimal::from_f64(n),
    };

    if let Some(ad) = decimal(a)
        && let Some(bd) = decimal(b)
        && let Some(rd) = match op {
            BinOp::Add => ad.checked_add(bd),
            BinOp::Subtract => ad.checked_sub(bd),
            BinOp::Multiply => ad.checked_mul(bd),
            BinOp::Divide => ad.checked_div(bd),
            BinOp::Modulo => ad.checked_rem(bd),
            _ => None,
        }
    {
        if rd.is_integer()
            && let Some(r) = rd.to_i64()
        {
            return Value::Integer(r);
        } else if let Some(r) = rd.to_f64() {
            return Value::Float(r);
        }
    }
    Value::Float(float_arithmetic(op, a.as_f64(), b.as_f64()))
}

/// Lex and parse an expression source.
pub fn compile(source: &str) -> Result<Expr, EvalError> {
    let tokens = tokenize(source)?;
    Ok(parse(tokens)?)
}

/// Evaluate a single expression source against a scope using the built-in
/// registry and default limits.
///
/// ```
/// use jsonte::{Scope, Value, resolve_expression};
///
/// let result = resolve_expression("map(0..4, x => x * 2)", &Scope::new()).unwrap();
/// assert_eq!(result.to_string(), "[0,2,4,6,8]");
/// ```
pub fn resolve_expression(source: &str, scope: &Scope) -> Result<Value, EvalError> {
    let expr = compile(source)?;
    let registry = Registry::builtins();
    let mut evaluator = Evaluator::new(&registry);
    evaluator.evaluate(&expr, &Arc::new(scope.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(source: &str) -> Result<Value, EvalError> {
        resolve_expression(source, &Scope::new())
    }

    #[test]
    fn test_mixed_arithmetic_collapses_to_integer() {
        assert_eq!(eval("1 + 1.0").unwrap(), Value::Integer(2));
        assert_eq!(eval("1.5 + 1.5").unwrap(), Value::Float(3.0));
        assert_eq!(eval("3 * 0.5").unwrap(), Value::Float(1.5));
        assert_eq!(eval("7 / 2").unwrap(), Value::Float(3.5));
        assert_eq!(eval("8 / 2").unwrap(), Value::Integer(4));
    }

    #[test]
    fn test_short_circuit() {
        assert_eq!(eval("false && missing").unwrap(), Value::Boolean(false));
        assert_eq!(eval("true or missing").unwrap(), Value::Boolean(true));
        assert!(matches!(
            eval("true && missing"),
            Err(EvalError::UnknownVariable { .. })
        ));
    }

    #[test]
    fn test_recursion_limit() {
        let registry = Registry::with_builtins();
        let mut evaluator = Evaluator::with_config(&registry, EvalConfig { max_depth: 4 });
        let expr = compile("((((((1))))))+1+1+1+1+1").unwrap();
        let result = evaluator.evaluate(&expr, &Arc::new(Scope::new()));
        assert!(matches!(
            result,
            Err(EvalError::RecursionLimitExceeded { limit: 4 })
        ));
    }

    #[test]
    fn test_index_on_object_and_string() {
        let mut scope = Scope::new();
        let mut map = Map::new();
        map.insert("first".into(), Value::Integer(1));
        map.insert("second".into(), Value::Integer(2));
        scope.insert("obj", Value::object(map));

        assert_eq!(
            resolve_expression("obj[1]", &scope).unwrap(),
            Value::String("second".into())
        );
        assert_eq!(resolve_expression("obj['first']", &scope).unwrap(), Value::Integer(1));
        assert_eq!(eval("'abc'[2]").unwrap(), Value::String("c".into()));
    }
}
