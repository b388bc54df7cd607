//! # Expression Language - Abstract Syntax Tree
//!
//! This module defines the tokens and syntax tree for the expressions that
//! templates embed between `{{` and `}}`.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Expression nodes (literals, access, calls, lambdas)
//! - **[operators]** - Binary and unary operators
//!
//! ## Precedence
//!
//! From loosest to tightest binding:
//!
//! ```text
//! ?:  ||  &&  == !=  < <= > >=  ..  + -  * / %  ! -  . [] ()
//! ```
//!
//! ## Examples
//!
//! ```text
//! filter(0..4, x => mod(x, 2) == 0)
//! 1..10.encode(16, x => x)
//! index == 0 ? item.name : 'minecraft:' + item.name
//! ```
pub mod expressions;
pub mod operators;
pub mod tokens;

pub use expressions::Expr;
pub use operators::{BinOp, UnaryOp};
pub use tokens::{Token, TokenKind};
