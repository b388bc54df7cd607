//! # Function Registry
//!
//! Named, overloaded native functions callable from expressions.
//!
//! Functions are registered explicitly with a [`Signature`] describing the
//! parameter kinds they accept. A name may carry several overloads; the
//! registry picks one per call by arity and by how many arguments already
//! have the declared kind (see [`Registry::resolve`]).
//!
//! Built-in libraries live in submodules and are installed by
//! [`Registry::with_builtins`]:
//!
//! - **[array]** - array and object helpers (`filter`, `map`, `keys`, `encode`, ...)
//! - **[math]** - numeric helpers (`mod`, `floor`, `pow`, ...)
//!
//! ## Example
//!
//! ```
//! use jsonte::functions::{ParamKind, Registry, Signature};
//! use jsonte::Value;
//!
//! let mut registry = Registry::new();
//! registry.register(
//!     Signature::new("twice", [ParamKind::Number]),
//!     |_, args| match &args[0] {
//!         Value::Integer(n) => Ok(Value::Integer(n * 2)),
//!         other => Ok(Value::Float(other.to_number().map_or(0.0, |n| n.as_f64()) * 2.0)),
//!     },
//! );
//! assert!(registry.contains("twice"));
//! ```
pub mod array;
pub mod math;

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, OnceLock},
};

use tracing::trace;

use crate::{
    evaluator::{EvalError, Evaluator},
    value::{Map, Value},
};

/// Native implementation of a registered function.
///
/// Receives the evaluator (for invoking lambda arguments) and the arguments
/// already coerced to the declared parameter kinds.
pub type NativeFn =
    dyn Fn(&mut Evaluator<'_>, Vec<Value>) -> Result<Value, EvalError> + Send + Sync;

/// Kind of value a parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Any value, passed through unchanged
    Any,
    /// Coerced through truthiness
    Boolean,
    /// Numbers, or strings that coerce to numbers
    Number,
    /// Strings, or scalars rendered as strings
    String,
    Array,
    Object,
    /// Lambdas and function references
    Lambda,
}

impl ParamKind {
    /// The value already has this kind, no coercion needed.
    fn matches_exactly(self, value: &Value) -> bool {
        match self {
            ParamKind::Any => false,
            ParamKind::Boolean => matches!(value, Value::Boolean(_)),
            ParamKind::Number => matches!(value, Value::Integer(_) | Value::Float(_)),
            ParamKind::String => matches!(value, Value::String(_)),
            ParamKind::Array => matches!(value, Value::Array(_)),
            ParamKind::Object => matches!(value, Value::Object(_)),
            ParamKind::Lambda => value.is_callable(),
        }
    }

    /// Convert `value` to this kind, or `None` when it cannot be.
    fn coerce(self, value: Value) -> Option<Value> {
        match self {
            ParamKind::Any => Some(value),
            ParamKind::Boolean => Some(Value::Boolean(value.is_truthy())),
            ParamKind::Number => value.to_number().map(Value::from),
            ParamKind::String => match value {
                Value::String(_) => Some(value),
                Value::Integer(_) | Value::Float(_) | Value::Boolean(_) => {
                    Some(Value::String(value.to_display_string()))
                }
                _ => None,
            },
            ParamKind::Array => matches!(value, Value::Array(_)).then_some(value),
            ParamKind::Object => matches!(value, Value::Object(_)).then_some(value),
            ParamKind::Lambda => value.is_callable().then_some(value),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::Any => "any",
            ParamKind::Boolean => "boolean",
            ParamKind::Number => "number",
            ParamKind::String => "string",
            ParamKind::Array => "array",
            ParamKind::Object => "object",
            ParamKind::Lambda => "lambda",
        };
        write!(f, "{}", name)
    }
}

/// Declared shape of one overload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub params: Vec<ParamKind>,
    /// May be called as `target.name(rest...)`
    pub instance: bool,
    /// The trailing lambda parameter may be omitted
    pub optional_lambda: bool,
}

impl Signature {
    pub fn new(name: impl Into<String>, params: impl IntoIterator<Item = ParamKind>) -> Self {
        Signature {
            name: name.into(),
            params: params.into_iter().collect(),
            instance: false,
            optional_lambda: false,
        }
    }

    pub fn instance(mut self) -> Self {
        self.instance = true;
        self
    }

    /// Mark the trailing lambda as optional.
    ///
    /// Has no effect unless the last parameter is [`ParamKind::Lambda`].
    pub fn optional_lambda(mut self) -> Self {
        self.optional_lambda = self.params.last() == Some(&ParamKind::Lambda);
        self
    }

    fn accepts_arity(&self, arity: usize) -> bool {
        arity == self.params.len() || (self.optional_lambda && arity + 1 == self.params.len())
    }

    /// Number of arguments that already have the declared kind.
    fn score(&self, args: &[Value]) -> usize {
        self.params
            .iter()
            .zip(args)
            .filter(|(kind, value)| kind.matches_exactly(value))
            .count()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, kind) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", kind)?;
            if self.optional_lambda && i + 1 == self.params.len() {
                write!(f, "?")?;
            }
        }
        write!(f, ")")
    }
}

/// A registered overload: its signature and implementation.
#[derive(Clone)]
pub struct Overload {
    pub signature: Signature,
    pub implementation: Arc<NativeFn>,
}

impl fmt::Debug for Overload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overload")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Result of overload resolution: the chosen overload and its coerced arguments.
#[derive(Debug)]
pub struct Resolved<'r> {
    pub overload: &'r Overload,
    pub args: Vec<Value>,
}

/// Table of named functions and their overloads.
///
/// Read-only once populated; share it between evaluations behind an [`Arc`]
/// or a plain reference.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    functions: HashMap<String, Vec<Overload>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Registry::default()
    }

    /// A registry holding the built-in array, object and math functions.
    pub fn with_builtins() -> Self {
        let mut registry = Registry::new();
        array::register(&mut registry);
        math::register(&mut registry);
        registry
    }

    /// Process-wide built-in registry, created on first use.
    pub fn builtins() -> Arc<Registry> {
        static BUILTINS: OnceLock<Arc<Registry>> = OnceLock::new();
        Arc::clone(BUILTINS.get_or_init(|| Arc::new(Registry::with_builtins())))
    }

    /// Add an overload. Overloads of one name are tried in registration order
    /// when their scores tie.
    pub fn register<F>(&mut self, signature: Signature, implementation: F)
    where
        F: Fn(&mut Evaluator<'_>, Vec<Value>) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.functions
            .entry(signature.name.clone())
            .or_default()
            .push(Overload {
                signature,
                implementation: Arc::new(implementation),
            });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn overloads(&self, name: &str) -> &[Overload] {
        self.functions.get(name).map_or(&[], Vec::as_slice)
    }

    /// Whether some overload of `name` takes `arity` arguments.
    pub fn accepts_arity(&self, name: &str, arity: usize) -> bool {
        self.overloads(name)
            .iter()
            .any(|overload| overload.signature.accepts_arity(arity))
    }

    /// Pick the overload of `name` for `args` and coerce the arguments to it.
    ///
    /// Candidates must accept the argument count (an optional trailing lambda
    /// allows one argument less) and, when `has_target` is set, be instance
    /// callable. The candidate with the most arguments already of the declared
    /// kind wins; ties go to the earliest registered.
    ///
    /// # Errors
    ///
    /// `UnknownFunction` when no candidate exists, `ArgumentTypeError` when an
    /// argument of the chosen candidate cannot be coerced.
    pub fn resolve(
        &self,
        name: &str,
        args: Vec<Value>,
        has_target: bool,
    ) -> Result<Resolved<'_>, EvalError> {
        let arity = args.len();
        let mut best: Option<(&Overload, usize)> = None;

        for overload in self.overloads(name) {
            let signature = &overload.signature;
            if (has_target && !signature.instance) || !signature.accepts_arity(arity) {
                continue;
            }
            let score = signature.score(&args);
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((overload, score));
            }
        }

        let Some((overload, score)) = best else {
            return Err(EvalError::UnknownFunction {
                name: name.to_string(),
                arity,
            });
        };
        trace!(function = name, arity, score, signature = %overload.signature, "resolved overload");

        let mut coerced = Vec::with_capacity(arity);
        for (position, (kind, value)) in overload.signature.params.iter().zip(args).enumerate() {
            let found = value.kind_name();
            match kind.coerce(value) {
                Some(value) => coerced.push(value),
                None => {
                    return Err(EvalError::ArgumentTypeError {
                        function: name.to_string(),
                        message: format!(
                            "argument {} of {} expects {}, found {}",
                            position + 1,
                            overload.signature,
                            kind,
                            found
                        ),
                    });
                }
            }
        }

        Ok(Resolved {
            overload,
            args: coerced,
        })
    }
}

// Accessors used by the built-in implementations. Arguments arrive already
// coerced, so a mismatch here means a signature and its body disagree.

fn argument_error(function: &str, message: impl Into<String>) -> EvalError {
    EvalError::ArgumentTypeError {
        function: function.to_string(),
        message: message.into(),
    }
}

pub(crate) fn array_arg<'a>(
    function: &str,
    args: &'a [Value],
    index: usize,
) -> Result<&'a [Value], EvalError> {
    args.get(index).and_then(Value::as_array).ok_or_else(|| {
        argument_error(function, format!("argument {} must be an array", index + 1))
    })
}

pub(crate) fn object_arg<'a>(
    function: &str,
    args: &'a [Value],
    index: usize,
) -> Result<&'a Map, EvalError> {
    args.get(index).and_then(Value::as_object).ok_or_else(|| {
        argument_error(function, format!("argument {} must be an object", index + 1))
    })
}

pub(crate) fn string_arg<'a>(
    function: &str,
    args: &'a [Value],
    index: usize,
) -> Result<&'a str, EvalError> {
    args.get(index).and_then(Value::as_str).ok_or_else(|| {
        argument_error(function, format!("argument {} must be a string", index + 1))
    })
}

pub(crate) fn number_arg(
    function: &str,
    args: &[Value],
    index: usize,
) -> Result<crate::value::Number, EvalError> {
    args.get(index)
        .and_then(Value::to_number)
        .ok_or_else(|| argument_error(function, format!("argument {} must be a number", index + 1)))
}

/// The optional callable at `index`, if one was passed.
pub(crate) fn callable_arg(args: &[Value], index: usize) -> Option<&Value> {
    args.get(index).filter(|value| value.is_callable())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(
        tag: &'static str,
    ) -> impl Fn(&mut Evaluator<'_>, Vec<Value>) -> Result<Value, EvalError> + Send + Sync + 'static
    {
        move |_, _| Ok(Value::String(tag.to_string()))
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.register(
            Signature::new("pick", [ParamKind::Array, ParamKind::String]).instance(),
            tagged("string"),
        );
        registry.register(
            Signature::new("pick", [ParamKind::Array, ParamKind::Number]).instance(),
            tagged("number"),
        );
        registry.register(
            Signature::new("plain", [ParamKind::Any]),
            tagged("plain"),
        );
        registry.register(
            Signature::new("tally", [ParamKind::Array, ParamKind::Lambda]).optional_lambda(),
            tagged("tally"),
        );
        registry
    }

    fn numbers() -> Value {
        Value::array(vec![Value::Integer(1), Value::Integer(2)])
    }

    #[test]
    fn test_exact_kind_wins() {
        let registry = registry();
        let resolved = registry
            .resolve("pick", vec![numbers(), Value::Integer(2)], false)
            .unwrap();
        assert_eq!(resolved.overload.signature.params[1], ParamKind::Number);

        let resolved = registry
            .resolve("pick", vec![numbers(), Value::String("2".into())], false)
            .unwrap();
        assert_eq!(resolved.overload.signature.params[1], ParamKind::String);
    }

    #[test]
    fn test_tie_goes_to_first_registered() {
        let registry = registry();
        let resolved = registry
            .resolve("pick", vec![numbers(), Value::Boolean(true)], false)
            .unwrap();
        assert_eq!(resolved.overload.signature.params[1], ParamKind::String);
        assert_eq!(resolved.args[1], Value::String("true".into()));
    }

    #[test]
    fn test_optional_lambda_arities() {
        let registry = registry();
        assert!(registry.resolve("tally", vec![numbers()], false).is_ok());
        assert!(matches!(
            registry.resolve("tally", vec![], false),
            Err(EvalError::UnknownFunction { arity: 0, .. })
        ));
        assert!(registry.accepts_arity("tally", 1));
        assert!(registry.accepts_arity("tally", 2));
        assert!(!registry.accepts_arity("tally", 3));
        assert!(!registry.accepts_arity("missing", 0));
    }

    #[test]
    fn test_target_requires_instance() {
        let registry = registry();
        assert!(matches!(
            registry.resolve("plain", vec![Value::Null], true),
            Err(EvalError::UnknownFunction { .. })
        ));
        assert!(registry.resolve("plain", vec![Value::Null], false).is_ok());
    }

    #[test]
    fn test_argument_type_error() {
        let registry = registry();
        let err = registry
            .resolve("pick", vec![Value::Null, Value::Integer(1)], false)
            .unwrap_err();
        assert!(matches!(
            err,
            EvalError::ArgumentTypeError { ref function, .. } if function == "pick"
        ));
    }

    #[test]
    fn test_signature_display() {
        let signature =
            Signature::new("count", [ParamKind::Array, ParamKind::Lambda]).optional_lambda();
        assert_eq!(signature.to_string(), "count(array, lambda?)");
    }
}
