//! # jsonte
//!
//! A templating engine for JSON documents. Templates embed expressions
//! (`"{{ ... }}"`) and directives (`$template`, `$extend`, iteration keys)
//! in ordinary JSON; the engine resolves them against a scope of variables
//! to produce plain JSON.
//!
//! ## Layers
//!
//! - **[lexer]** / **[parser]** - expression source to [`Expr`]
//! - **[value]** / **[scope]** - runtime values and layered variable scopes
//! - **[functions]** - overloaded native function registry and built-ins
//! - **[evaluator]** - expression evaluation
//! - **[merge]** - merging of scopes, modules and templates
//! - **[processor]** - template documents and modules
//! - **[output]** - JSON conversion
//!
//! ## Example
//!
//! ```
//! use jsonte::{Processor, Scope, Value};
//!
//! let mut scope = Scope::new();
//! scope.insert("names", Value::from(serde_json::json!(["a", "b"])));
//!
//! let outputs = Processor::default()
//!     .process_document(
//!         "example",
//!         r#"{"$template": {"{{#names as n}}": {"{{n}}": "{{index}}"}}}"#,
//!         &scope,
//!     )
//!     .unwrap();
//! assert_eq!(outputs["example"], serde_json::json!({"a": 0, "b": 1}));
//! ```
pub mod ast;
pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod merge;
pub mod output;
pub mod parser;
pub mod path;
pub mod processor;
pub mod scope;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{BinOp, Expr, Token, TokenKind, UnaryOp};
pub use evaluator::{EvalConfig, EvalError, Evaluator, compile, resolve_expression};
pub use functions::{ParamKind, Registry, Signature};
pub use lexer::{LexError, Lexer, tokenize};
pub use merge::{merge, merge_into, strip_nulls};
pub use output::{to_json, to_json_pretty};
pub use parser::{ParseError, Parser, parse};
pub use processor::{Module, Processor, TemplateError, load_module_source};
pub use scope::Scope;
pub use value::Value;
