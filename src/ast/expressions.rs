use std::sync::Arc;

use crate::ast::{BinOp, UnaryOp};

/// Abstract Syntax Tree node representing a parsed expression.
///
/// The tree is immutable once parsed. Lambda bodies are shared behind an
/// [`Arc`] so that lambda values created during evaluation can hold on to
/// them without copying the subtree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Literals
    /// Literal floating point number
    ///
    /// # Example
    /// ```text
    /// 42.5
    /// ```
    Float(f64),

    /// Literal integer
    ///
    /// # Example
    /// ```text
    /// 42
    /// ```
    Integer(i64),

    /// String literal
    ///
    /// # Example
    /// ```text
    /// 'hello'
    /// ```
    String(String),

    /// Boolean literal
    Boolean(bool),

    /// Null literal
    Null,

    /// Variable reference, resolved against the scope stack
    ///
    /// # Example
    /// ```text
    /// index
    /// ```
    Identifier(String),

    /// Array literal
    ///
    /// # Example
    /// ```text
    /// ['asd', '123', 123, 9]
    /// ```
    Array(Vec<Expr>),

    /// Object literal
    ///
    /// # Example
    /// ```text
    /// {name: value, "count": 3}
    /// ```
    Object(Vec<(String, Expr)>),

    /// Inclusive integer range
    ///
    /// # Example
    /// ```text
    /// 0..4
    /// ```
    Range { start: Box<Expr>, end: Box<Expr> },

    /// Prefix operation
    Unary { op: UnaryOp, operand: Box<Expr> },

    /// Binary operation (arithmetic, comparison, logical)
    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Conditional expression
    ///
    /// # Example
    /// ```text
    /// index == 0 ? 'first' : 'rest'
    /// ```
    Ternary {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },

    /// Member access
    ///
    /// # Example
    /// ```text
    /// item.name
    /// ```
    Member { object: Box<Expr>, name: String },

    /// Index access
    ///
    /// # Example
    /// ```text
    /// items[0]
    /// ```
    Index { object: Box<Expr>, index: Box<Expr> },

    /// Function call
    ///
    /// `target` is present for instance-style calls, where the target binds
    /// to the first parameter.
    ///
    /// # Examples
    /// ```text
    /// keys(testObject)
    /// items.filter(x => x > 2)
    /// ```
    Call {
        target: Option<Box<Expr>>,
        name: String,
        args: Vec<Expr>,
    },

    /// Lambda literal
    ///
    /// # Examples
    /// ```text
    /// x => x * 2
    /// (x, i) => i
    /// ```
    Lambda { params: Vec<String>, body: Arc<Expr> },
}
