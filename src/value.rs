use std::{cmp::Ordering, fmt, sync::Arc};

use indexmap::IndexMap;

use crate::{ast::Expr, scope::Scope};

/// Ordered mapping used for objects and scopes. Insertion order is preserved.
pub type Map = IndexMap<String, Value>;

/// A runtime value produced by expressions and stored in templates.
///
/// This covers every JSON type, keeps integers and floats apart (unlike
/// JSON's single "number"), and adds the two callable kinds that only exist
/// during evaluation: lambdas and references to registered functions.
///
/// Arrays and objects are reference counted. Cloning a value is cheap and
/// mutation goes through [`Arc::make_mut`], so a clone is never changed behind
/// the back of its original. Two values that share the same allocation are
/// the same node, see [`Value::same_node`].
///
/// # Examples
///
/// ```
/// use jsonte::Value;
/// use jsonte::value::Map;
///
/// let integer = Value::Integer(42);
/// let string = Value::String("hello".to_string());
/// let array = Value::array(vec![Value::Integer(1), Value::Integer(2)]);
///
/// let mut map = Map::new();
/// map.insert("key".to_string(), Value::String("value".to_string()));
/// let object = Value::object(map);
///
/// assert!(object.is_truthy());
/// assert_eq!(array.kind_name(), "array");
/// ```
#[derive(Clone)]
pub enum Value {
    /// JSON null
    Null,

    /// JSON boolean (true/false)
    Boolean(bool),

    /// Floating-point number
    Float(f64),

    /// Integer number (preserved separately from floats)
    Integer(i64),

    /// UTF-8 string
    String(String),

    /// Array of values
    Array(Arc<Vec<Value>>),

    /// Object with string keys in insertion order
    Object(Arc<Map>),

    /// Lambda created by an `x => ...` literal
    Lambda(Arc<Lambda>),

    /// Reference to a function in the registry, created by naming it without calling it
    Function(FunctionRef),
}

/// A lambda value: parameter names, body, and the scope it was created in.
#[derive(Clone)]
pub struct Lambda {
    pub params: Vec<String>,
    pub body: Arc<Expr>,
    pub scope: Arc<Scope>,
}

impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lambda")
            .field("params", &self.params)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRef {
    pub name: String,
}

/// A number after coercion, either integral or floating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Integer(n) => n as f64,
            Number::Float(n) => n,
        }
    }

    /// Integral value, truncating floats toward zero.
    pub fn as_i64(self) -> i64 {
        match self {
            Number::Integer(n) => n,
            Number::Float(n) => n as i64,
        }
    }

    pub fn is_integral(self) -> bool {
        match self {
            Number::Integer(_) => true,
            Number::Float(n) => n.fract() == 0.0 && n.is_finite(),
        }
    }
}

impl From<Number> for Value {
    fn from(number: Number) -> Self {
        match number {
            Number::Integer(n) => Value::Integer(n),
            Number::Float(n) => Value::Float(n),
        }
    }
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(items))
    }

    pub fn object(map: Map) -> Self {
        Value::Object(Arc::new(map))
    }

    /// Human-readable kind name used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Lambda(_) => "lambda",
            Value::Function(_) => "function",
        }
    }

    /// Check if the value is truthy (for conditions)
    ///
    /// Objects and arrays are truthy even when empty.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Float(n) => *n != 0.0,
            Value::Integer(n) => *n != 0,
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Lambda(_) | Value::Function(_) => true,
        }
    }

    /// Numeric coercion.
    ///
    /// Strings without a decimal point must parse as an integer, strings with
    /// one must parse as a float. Everything else is not a number.
    pub fn to_number(&self) -> Option<Number> {
        match self {
            Value::Integer(n) => Some(Number::Integer(*n)),
            Value::Float(n) => Some(Number::Float(*n)),
            Value::String(s) => {
                let s = s.trim();
                if s.contains('.') {
                    s.parse::<f64>().ok().map(Number::Float)
                } else {
                    s.parse::<i64>().ok().map(Number::Integer)
                }
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Lambda(_) | Value::Function(_))
    }

    /// `null` and the string `"null"` mark a key for removal.
    pub fn is_deletion_sentinel(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s == "null",
            _ => false,
        }
    }

    /// Whether both values are the same array or object allocation.
    pub fn same_node(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Copies arrays and objects into fresh allocations at every level.
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::Array(items) => Value::array(items.iter().map(Value::deep_copy).collect()),
            Value::Object(map) => Value::object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.deep_copy()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Text used for string concatenation and computed object keys.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Numeric view used by comparisons: numbers, and strings that coerce.
    fn comparable_number(&self) -> Option<Number> {
        match self {
            Value::Integer(_) | Value::Float(_) | Value::String(_) => self.to_number(),
            _ => None,
        }
    }

    /// Equality used by `==` and `!=`.
    ///
    /// Integers and floats compare by value. A number compared with a string
    /// compares numerically when the string coerces to a number. Arrays
    /// compare element-wise in order, objects key-wise regardless of order.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.equals(w)))
            }
            (Value::Lambda(a), Value::Lambda(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::Integer(_) | Value::Float(_), _) | (_, Value::Integer(_) | Value::Float(_)) => {
                match (self.comparable_number(), other.comparable_number()) {
                    (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// Ordering used by `<`, `<=`, `>` and `>=`.
    ///
    /// Two strings compare by code point. Otherwise both sides must be
    /// numeric; `None` means the operands cannot be ordered.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        if let (Value::String(a), Value::String(b)) = (self, other) {
            return Some(a.cmp(b));
        }
        match (self.comparable_number()?, other.comparable_number()?) {
            (Number::Integer(a), Number::Integer(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

impl PartialEq for Value {
    /// Strict structural equality: kinds must match exactly.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Lambda(a), Value::Lambda(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Boolean(b) => write!(f, "Boolean({})", b),
            Value::Float(n) => write!(f, "Float({})", n),
            Value::Integer(n) => write!(f, "Integer({})", n),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Array(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Object(map) => f.debug_map().entries(map.iter()).finish(),
            Value::Lambda(lambda) => lambda.fmt(f),
            Value::Function(func) => write!(f, "Function({})", func.name),
        }
    }
}

/// JSON-style rendering; lambdas and function references get a placeholder.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => match serde_json::Number::from_f64(*n) {
                Some(number) => write!(f, "{}", number),
                None => write!(f, "{}", n),
            },
            Value::String(s) => write!(f, "{}", serde_json::Value::String(s.clone())),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}:{}", serde_json::Value::String(key.clone()), value)?;
                }
                write!(f, "}}")
            }
            Value::Lambda(lambda) => write!(f, "<lambda({})>", lambda.params.join(", ")),
            Value::Function(func) => write!(f, "<function {}>", func.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Integer(0).is_truthy());
        assert!(Value::Integer(-1).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
        assert!(Value::String("false".into()).is_truthy());
        assert!(Value::array(vec![]).is_truthy());
        assert!(Value::object(Map::new()).is_truthy());
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Value::String("12".into()).to_number(), Some(Number::Integer(12)));
        assert_eq!(Value::String("1.5".into()).to_number(), Some(Number::Float(1.5)));
        assert_eq!(Value::String("1e5".into()).to_number(), None);
        assert_eq!(Value::String("abc".into()).to_number(), None);
        assert_eq!(Value::Boolean(true).to_number(), None);
        assert_eq!(Value::Null.to_number(), None);
    }

    #[test]
    fn test_loose_equality() {
        assert!(Value::Integer(2).equals(&Value::Float(2.0)));
        assert!(Value::Integer(2).equals(&Value::String("2".into())));
        assert!(!Value::String("2".into()).equals(&Value::String("2.0".into())));
        assert!(!Value::Null.equals(&Value::Integer(0)));

        let mut a = Map::new();
        a.insert("x".into(), Value::Integer(1));
        a.insert("y".into(), Value::Integer(2));
        let mut b = Map::new();
        b.insert("y".into(), Value::Float(2.0));
        b.insert("x".into(), Value::Integer(1));
        assert!(Value::object(a).equals(&Value::object(b)));
    }

    #[test]
    fn test_compare() {
        assert_eq!(
            Value::Integer(1).compare(&Value::Float(1.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::String("b".into()).compare(&Value::String("a".into())),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Null.compare(&Value::Integer(1)), None);
    }

    #[test]
    fn test_deep_copy_breaks_identity() {
        let original = Value::array(vec![Value::array(vec![Value::Integer(1)])]);
        let shallow = original.clone();
        let deep = original.deep_copy();

        assert!(original.same_node(&shallow));
        assert!(!original.same_node(&deep));
        assert_eq!(original, deep);
    }

    #[test]
    fn test_display() {
        let mut map = Map::new();
        map.insert("a".into(), Value::array(vec![Value::Integer(1), Value::Float(2.5)]));
        map.insert("b".into(), Value::String("x\"y".into()));
        assert_eq!(Value::object(map).to_string(), r#"{"a":[1,2.5],"b":"x\"y"}"#);
        assert_eq!(Value::String("plain".into()).to_display_string(), "plain");
    }
}
