// tests/parser_tests.rs

use jsonte::ast::{BinOp, Expr, UnaryOp};
use jsonte::lexer::{Lexer, tokenize};
use jsonte::parser::{DEFAULT_MAX_DEPTH, ParseError, Parser, parse};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn parse_str(source: &str) -> Expr {
    let mut parser = Parser::new(Lexer::new(source)).expect("source should tokenize");
    parser.parse().expect("source should parse")
}

fn ident(name: &str) -> Box<Expr> {
    Box::new(Expr::Identifier(name.to_string()))
}

fn int(n: i64) -> Box<Expr> {
    Box::new(Expr::Integer(n))
}

// ============================================================================
// Precedence
// ============================================================================

#[test]
fn test_multiplication_binds_tighter_than_addition() {
    assert_eq!(
        parse_str("a + b * c"),
        Expr::BinaryOp {
            op: BinOp::Add,
            left: ident("a"),
            right: Box::new(Expr::BinaryOp {
                op: BinOp::Multiply,
                left: ident("b"),
                right: ident("c"),
            }),
        }
    );
}

#[test]
fn test_and_binds_tighter_than_or() {
    assert_eq!(
        parse_str("a || b && c"),
        Expr::BinaryOp {
            op: BinOp::Or,
            left: ident("a"),
            right: Box::new(Expr::BinaryOp {
                op: BinOp::And,
                left: ident("b"),
                right: ident("c"),
            }),
        }
    );
}

#[test]
fn test_range_binds_looser_than_addition() {
    assert_eq!(
        parse_str("a..b + 1"),
        Expr::Range {
            start: ident("a"),
            end: Box::new(Expr::BinaryOp {
                op: BinOp::Add,
                left: ident("b"),
                right: int(1),
            }),
        }
    );
}

#[test]
fn test_ternary_is_loosest() {
    assert_eq!(
        parse_str("index == 0 ? a : b"),
        Expr::Ternary {
            condition: Box::new(Expr::BinaryOp {
                op: BinOp::Equal,
                left: ident("index"),
                right: int(0),
            }),
            then_branch: ident("a"),
            else_branch: ident("b"),
        }
    );
}

#[test]
fn test_parentheses_override_precedence() {
    assert_eq!(
        parse_str("(a + b) * c"),
        Expr::BinaryOp {
            op: BinOp::Multiply,
            left: Box::new(Expr::BinaryOp {
                op: BinOp::Add,
                left: ident("a"),
                right: ident("b"),
            }),
            right: ident("c"),
        }
    );
}

#[test]
fn test_unary_operators() {
    assert_eq!(
        parse_str("!done"),
        Expr::Unary {
            op: UnaryOp::Not,
            operand: ident("done"),
        }
    );
    assert_eq!(
        parse_str("-x"),
        Expr::Unary {
            op: UnaryOp::Negate,
            operand: ident("x"),
        }
    );
}

#[test]
fn test_negative_number_literal() {
    assert_eq!(parse_str("-5"), Expr::Integer(-5));
    assert_eq!(
        parse_str("2 - -1"),
        Expr::BinaryOp {
            op: BinOp::Subtract,
            left: int(2),
            right: int(-1),
        }
    );
}

// ============================================================================
// Postfix and Calls
// ============================================================================

#[test]
fn test_member_and_index_chain() {
    assert_eq!(
        parse_str("item.tags[0]"),
        Expr::Index {
            object: Box::new(Expr::Member {
                object: ident("item"),
                name: "tags".to_string(),
            }),
            index: int(0),
        }
    );
}

#[test]
fn test_plain_call() {
    assert_eq!(
        parse_str("keys(obj)"),
        Expr::Call {
            target: None,
            name: "keys".to_string(),
            args: vec![Expr::Identifier("obj".to_string())],
        }
    );
}

#[test]
fn test_dotted_call_carries_target() {
    assert_eq!(
        parse_str("list.contains('a')"),
        Expr::Call {
            target: Some(ident("list")),
            name: "contains".to_string(),
            args: vec![Expr::String("a".to_string())],
        }
    );
}

#[test]
fn test_literal_range_is_an_atom_for_calls() {
    let expr = parse_str("1..10.encode(16, x => x)");
    let Expr::Call { target: Some(target), name, args } = expr else {
        panic!("expected a dotted call");
    };
    assert_eq!(name, "encode");
    assert_eq!(*target, Expr::Range { start: int(1), end: int(10) });
    assert_eq!(args.len(), 2);
}

#[test]
fn test_literal_range_end_takes_arithmetic() {
    assert_eq!(
        parse_str("0..4-1"),
        Expr::Range {
            start: int(0),
            end: Box::new(Expr::BinaryOp {
                op: BinOp::Subtract,
                left: int(4),
                right: int(1),
            }),
        }
    );
    assert_eq!(
        parse_str("0..2*2"),
        Expr::Range {
            start: int(0),
            end: Box::new(Expr::BinaryOp {
                op: BinOp::Multiply,
                left: int(2),
                right: int(2),
            }),
        }
    );
}

#[test]
fn test_literal_range_with_negative_end_is_an_atom_for_index() {
    assert_eq!(
        parse_str("2..-2[0]"),
        Expr::Index {
            object: Box::new(Expr::Range { start: int(2), end: int(-2) }),
            index: int(0),
        }
    );
}

// ============================================================================
// Lambdas
// ============================================================================

#[test]
fn test_single_parameter_lambda() {
    assert_eq!(
        parse_str("x => x * 2"),
        Expr::Lambda {
            params: vec!["x".to_string()],
            body: Arc::new(Expr::BinaryOp {
                op: BinOp::Multiply,
                left: ident("x"),
                right: int(2),
            }),
        }
    );
}

#[test]
fn test_parenthesized_lambda_parameters() {
    let Expr::Lambda { params, .. } = parse_str("(item, i) => i") else {
        panic!("expected a lambda");
    };
    assert_eq!(params, vec!["item".to_string(), "i".to_string()]);
}

#[test]
fn test_lambda_as_call_argument() {
    let Expr::Call { args, .. } = parse_str("filter(0..4, x => mod(x, 2) == 0)") else {
        panic!("expected a call");
    };
    assert_eq!(args[0], Expr::Range { start: int(0), end: int(4) });
    assert!(matches!(&args[1], Expr::Lambda { params, .. } if params == &["x".to_string()]));
}

// ============================================================================
// Collections
// ============================================================================

#[test]
fn test_array_literal() {
    assert_eq!(
        parse_str("['asd', 123, null]"),
        Expr::Array(vec![
            Expr::String("asd".to_string()),
            Expr::Integer(123),
            Expr::Null,
        ])
    );
}

#[test]
fn test_object_literal() {
    assert_eq!(
        parse_str("{name: 'x', \"count\": 3}"),
        Expr::Object(vec![
            ("name".to_string(), Expr::String("x".to_string())),
            ("count".to_string(), Expr::Integer(3)),
        ])
    );
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_trailing_tokens_are_rejected() {
    let err = parse(tokenize("a b").unwrap()).unwrap_err();
    assert_eq!(err.position(), 2);
}

#[test]
fn test_unbalanced_parenthesis() {
    assert!(parse(tokenize("(a + b").unwrap()).is_err());
}

#[test]
fn test_missing_operand() {
    let err = parse(tokenize("1 +").unwrap()).unwrap_err();
    assert!(matches!(
        err,
        ParseError::Unexpected { ref found, .. } if found == "end of expression"
    ));
}

// ============================================================================
// Nesting Limit
// ============================================================================

#[test]
fn test_deep_parentheses_are_rejected() {
    let source = format!("{}1{}", "(".repeat(5000), ")".repeat(5000));
    let err = parse(tokenize(&source).unwrap()).unwrap_err();
    assert_eq!(
        err,
        ParseError::TooDeep {
            position: DEFAULT_MAX_DEPTH,
            limit: DEFAULT_MAX_DEPTH,
        }
    );
}

#[test]
fn test_deep_prefix_operators_are_rejected() {
    let source = format!("{}x", "!".repeat(5000));
    let err = parse(tokenize(&source).unwrap()).unwrap_err();
    assert!(matches!(err, ParseError::TooDeep { .. }));
}

#[test]
fn test_nesting_within_limit_parses() {
    let source = format!("{}1{}", "[".repeat(50), "]".repeat(50));
    let mut expr = parse(tokenize(&source).unwrap()).unwrap();
    for _ in 0..50 {
        let Expr::Array(mut items) = expr else {
            panic!("expected an array");
        };
        expr = items.remove(0);
    }
    assert_eq!(expr, Expr::Integer(1));
}

#[test]
fn test_custom_nesting_limit() {
    let tokens = tokenize("((a))").unwrap();
    let err = Parser::from_tokens(tokens.clone())
        .with_max_depth(2)
        .parse()
        .unwrap_err();
    assert_eq!(err, ParseError::TooDeep { position: 2, limit: 2 });
    assert!(Parser::from_tokens(tokens).with_max_depth(3).parse().is_ok());
}
