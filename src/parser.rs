use std::sync::Arc;

use thiserror::Error;

use crate::{
    ast::{BinOp, Expr, Token, TokenKind, UnaryOp},
    lexer::{LexError, Lexer},
};

/// Nesting allowed when no limit is configured.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Error raised when a token stream does not form a valid expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Expected {expected}, found {found} at position {position}")]
    Unexpected {
        position: usize,
        expected: String,
        found: String,
    },

    /// Sub-expressions or prefix operators nested deeper than the limit
    #[error("Expression nesting exceeds {limit} levels at position {position}")]
    TooDeep { position: usize, limit: usize },
}

impl ParseError {
    pub fn position(&self) -> usize {
        match self {
            ParseError::Unexpected { position, .. } | ParseError::TooDeep { position, .. } => {
                *position
            }
        }
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    /// Creates a parser by draining the lexer.
    pub fn new(lexer: Lexer) -> Result<Self, LexError> {
        let tokens = lexer.collect::<Result<Vec<_>, _>>()?;
        Ok(Parser::from_tokens(tokens))
    }

    pub fn from_tokens(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last(), Some(Token { kind: TokenKind::Eof, .. })) {
            let position = tokens
                .last()
                .map(|t| t.position + t.text.chars().count())
                .unwrap_or(0);
            tokens.push(Token::new(TokenKind::Eof, "", position));
        }
        Parser {
            tokens,
            index: 0,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Limit on how deeply sub-expressions and prefix operators may nest.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn current(&self) -> &Token {
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self, offset: usize) -> &TokenKind {
        let index = (self.index + offset).min(self.tokens.len() - 1);
        &self.tokens[index].kind
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.current().kind.clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        kind
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    fn error(&self, expected: &str) -> ParseError {
        let token = self.current();
        ParseError::Unexpected {
            position: token.position,
            expected: expected.to_string(),
            found: token.kind.describe(),
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<(), ParseError> {
        if !self.check(&kind) {
            return Err(self.error(expected));
        }
        self.advance();
        Ok(())
    }

    fn expect_identifier(&mut self, expected: &str) -> Result<String, ParseError> {
        match &self.current().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error(expected)),
        }
    }

    fn is_number(kind: &TokenKind) -> bool {
        matches!(kind, TokenKind::Integer(_) | TokenKind::Float(_))
    }

    /// Parse a complete expression; trailing tokens are an error.
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expression()?;
        self.expect(TokenKind::Eof, "end of expression")?;
        Ok(expr)
    }

    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::parse_ternary)
    }

    /// Run `parse` one nesting level deeper.
    fn nested(
        &mut self,
        parse: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        if self.depth >= self.max_depth {
            return Err(ParseError::TooDeep {
                position: self.current().position,
                limit: self.max_depth,
            });
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_ternary(&mut self) -> Result<Expr, ParseError> {
        let condition = self.parse_or()?;

        if !self.check(&TokenKind::Question) {
            return Ok(condition);
        }
        self.advance();
        let then_branch = self.nested(Self::parse_ternary)?;
        self.expect(TokenKind::Colon, "':' in conditional expression")?;
        let else_branch = self.nested(Self::parse_ternary)?;

        Ok(Expr::Ternary {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;

        while self.check(&TokenKind::Or) {
            self.advance();
            let right = self.parse_and()?;

            left = Expr::BinaryOp {
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;

        while self.check(&TokenKind::And) {
            self.advance();
            let right = self.parse_equality()?;

            left = Expr::BinaryOp {
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_relational()?;

        loop {
            let op = match &self.current().kind {
                TokenKind::EqEq => BinOp::Equal,
                TokenKind::NotEq => BinOp::NotEqual,
                _ => break,
            };

            self.advance();
            let right = self.parse_relational()?;

            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_range()?;

        loop {
            let op = match &self.current().kind {
                TokenKind::Lt => BinOp::LessThan,
                TokenKind::Gt => BinOp::GreaterThan,
                TokenKind::LtEq => BinOp::LessEqual,
                TokenKind::GtEq => BinOp::GreaterEqual,
                _ => break,
            };

            self.advance();
            let right = self.parse_range()?;

            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_range(&mut self) -> Result<Expr, ParseError> {
        let start = self.parse_additive()?;

        if !self.check(&TokenKind::DotDot) {
            return Ok(start);
        }
        self.advance();
        let end = self.parse_additive()?;

        Ok(Expr::Range {
            start: Box::new(start),
            end: Box::new(end),
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match &self.current().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Subtract,
                _ => break,
            };

            self.advance();
            let right = self.parse_multiplicative()?;

            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match &self.current().kind {
                TokenKind::Star => BinOp::Multiply,
                TokenKind::Slash => BinOp::Divide,
                TokenKind::Percent => BinOp::Modulo,
                _ => break,
            };

            self.advance();
            let right = self.parse_unary()?;

            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match &self.current().kind {
            TokenKind::Exclamation => UnaryOp::Not,
            // A minus directly before a number literal is part of the literal
            TokenKind::Minus if !Self::is_number(self.peek_kind(1)) => UnaryOp::Negate,
            _ => return self.parse_postfix(),
        };

        self.advance();
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.check(&TokenKind::Dot) {
                self.advance();
                let name = self.expect_identifier("member name after '.'")?;

                if self.check(&TokenKind::LParen) {
                    let args = self.parse_arguments()?;
                    expr = Expr::Call {
                        target: Some(Box::new(expr)),
                        name,
                        args,
                    };
                } else {
                    expr = Expr::Member {
                        object: Box::new(expr),
                        name,
                    };
                }
            } else if self.check(&TokenKind::LBracket) {
                self.advance();
                let index = self.parse_expression()?;
                self.expect(TokenKind::RBracket, "']'")?;

                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// Parse primary expressions (atoms): literals, identifiers, calls,
    /// lambdas, literal ranges, groups and collection literals
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match &self.current().kind {
            TokenKind::Float(_) | TokenKind::Integer(_) | TokenKind::Minus => {
                let start = self.parse_number_literal()?;
                self.parse_literal_range(start)
            }
            TokenKind::String(s) => {
                let s = s.clone();
                self.advance();
                Ok(Expr::String(s))
            }
            TokenKind::Boolean(b) => {
                let b = *b;
                self.advance();
                Ok(Expr::Boolean(b))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Null)
            }
            TokenKind::Identifier(name) => {
                let name = name.clone();

                match self.peek_kind(1) {
                    TokenKind::Arrow => {
                        self.advance(); // parameter
                        self.advance(); // =>
                        self.parse_lambda_body(vec![name])
                    }
                    TokenKind::LParen => {
                        self.advance();
                        let args = self.parse_arguments()?;
                        Ok(Expr::Call {
                            target: None,
                            name,
                            args,
                        })
                    }
                    _ => {
                        self.advance();
                        Ok(Expr::Identifier(name))
                    }
                }
            }
            TokenKind::LParen => {
                if self.is_lambda_parameter_list() {
                    return self.parse_lambda();
                }
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.advance();
                self.parse_array_literal()
            }
            TokenKind::LBrace => {
                self.advance();
                self.parse_object_literal()
            }
            _ => Err(self.error("expression")),
        }
    }

    /// Reads an optionally negated number literal.
    fn parse_number_literal(&mut self) -> Result<Expr, ParseError> {
        let negative = self.check(&TokenKind::Minus);
        if negative {
            self.advance();
        }

        let kind = self.current().kind.clone();
        match kind {
            TokenKind::Integer(n) => {
                self.advance();
                Ok(Expr::Integer(if negative { -n } else { n }))
            }
            TokenKind::Float(n) => {
                self.advance();
                Ok(Expr::Float(if negative { -n } else { n }))
            }
            _ => Err(self.error("number")),
        }
    }

    /// `1..10` written with literal bounds and followed by `.` or `[` is a
    /// single atom, so that `1..10.encode(16, x => x)` applies to the whole
    /// range. Anything else is left to the `..` precedence level.
    fn parse_literal_range(&mut self, start: Expr) -> Result<Expr, ParseError> {
        let after_bound = match self.peek_kind(1) {
            TokenKind::Minus if Self::is_number(self.peek_kind(2)) => 3,
            kind if Self::is_number(kind) => 2,
            _ => return Ok(start),
        };
        let postfix_follows = matches!(
            self.peek_kind(after_bound),
            TokenKind::Dot | TokenKind::LBracket
        );
        if !self.check(&TokenKind::DotDot) || !postfix_follows {
            return Ok(start);
        }

        self.advance();
        let end = self.parse_number_literal()?;
        Ok(Expr::Range {
            start: Box::new(start),
            end: Box::new(end),
        })
    }

    /// Looks ahead from a `(` for `(a, b) =>` or `() =>`.
    fn is_lambda_parameter_list(&self) -> bool {
        let mut offset = 1;

        if matches!(self.peek_kind(offset), TokenKind::RParen) {
            return matches!(self.peek_kind(offset + 1), TokenKind::Arrow);
        }

        loop {
            if !matches!(self.peek_kind(offset), TokenKind::Identifier(_)) {
                return false;
            }
            offset += 1;

            match self.peek_kind(offset) {
                TokenKind::Comma => offset += 1,
                TokenKind::RParen => {
                    return matches!(self.peek_kind(offset + 1), TokenKind::Arrow);
                }
                _ => return false,
            }
        }
    }

    fn parse_lambda(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LParen, "'('")?;

        let mut params = vec![];
        while !self.check(&TokenKind::RParen) {
            params.push(self.expect_identifier("lambda parameter name")?);

            if !self.check(&TokenKind::RParen) {
                self.expect(TokenKind::Comma, "',' or ')'")?;
            }
        }

        self.expect(TokenKind::RParen, "')'")?;
        self.expect(TokenKind::Arrow, "'=>'")?;
        self.parse_lambda_body(params)
    }

    fn parse_lambda_body(&mut self, params: Vec<String>) -> Result<Expr, ParseError> {
        let body = self.parse_expression()?;
        Ok(Expr::Lambda {
            params,
            body: Arc::new(body),
        })
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(TokenKind::LParen, "'('")?;

        let mut args = vec![];
        while !self.check(&TokenKind::RParen) {
            args.push(self.parse_expression()?);

            if !self.check(&TokenKind::RParen) {
                self.expect(TokenKind::Comma, "',' or ')'")?;
            }
        }

        self.expect(TokenKind::RParen, "')'")?;
        Ok(args)
    }

    fn parse_object_literal(&mut self) -> Result<Expr, ParseError> {
        let mut pairs = vec![];

        while !self.check(&TokenKind::RBrace) {
            let key = match &self.current().kind {
                TokenKind::String(s) => s.clone(),
                TokenKind::Identifier(s) => s.clone(),
                _ => return Err(self.error("string or identifier as object key")),
            };

            self.advance();

            self.expect(TokenKind::Colon, "':'")?;

            let value = self.parse_expression()?;
            pairs.push((key, value));

            if !self.check(&TokenKind::RBrace) {
                self.expect(TokenKind::Comma, "',' or '}'")?;
            }
        }

        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(Expr::Object(pairs))
    }

    fn parse_array_literal(&mut self) -> Result<Expr, ParseError> {
        let mut elements = vec![];

        while !self.check(&TokenKind::RBracket) {
            elements.push(self.parse_expression()?);

            if !self.check(&TokenKind::RBracket) {
                self.expect(TokenKind::Comma, "',' or ']'")?;
            }
        }

        self.expect(TokenKind::RBracket, "']'")?;
        Ok(Expr::Array(elements))
    }
}

/// Parse a token stream into an expression tree.
pub fn parse(tokens: Vec<Token>) -> Result<Expr, ParseError> {
    Parser::from_tokens(tokens).parse()
}
