use thiserror::Error;

use crate::ast::{Token, TokenKind};

/// Error raised when the expression source cannot be split into tokens.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{reason} at position {position}")]
pub struct LexError {
    pub position: usize,
    pub reason: String,
}

impl LexError {
    fn new(position: usize, reason: impl Into<String>) -> Self {
        LexError {
            position,
            reason: reason.into(),
        }
    }
}

/// Splits an expression source into tokens.
///
/// The lexer is lazy: tokens are produced one at a time by [`Lexer::next_token`]
/// or through its [`Iterator`] implementation, which yields the trailing `Eof`
/// token once and then stops. [`Lexer::reset`] rewinds it to the start.
#[derive(Debug, Clone)]
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    finished: bool,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            finished: false,
        }
    }

    /// Rewind to the beginning of the source.
    pub fn reset(&mut self) {
        self.position = 0;
        self.finished = false;
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn text_from(&self, start: usize) -> String {
        self.input[start..self.position].iter().collect()
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_string(&mut self, quote: char) -> Result<String, LexError> {
        let start = self.position;
        let mut result = String::new();
        self.advance(); // Consume opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => {
                    self.advance(); // Consume backslash
                    match self.current_char() {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some('"') => result.push('"'),
                        Some('\'') => result.push('\''),
                        Some('\\') => result.push('\\'),
                        Some('/') => result.push('/'),
                        Some('u') => {
                            result.push(self.read_unicode_escape()?);
                            continue;
                        }
                        Some(ch) => {
                            return Err(LexError::new(
                                self.position,
                                format!("Invalid escape sequence '\\{}'", ch),
                            ));
                        }
                        None => break,
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(LexError::new(start, "Unterminated string literal"))
    }

    /// Reads the `XXXX` of a `\uXXXX` escape; the lexer sits on the `u`.
    fn read_unicode_escape(&mut self) -> Result<char, LexError> {
        let start = self.position;
        self.advance();
        let mut code = 0u32;
        for _ in 0..4 {
            let digit = self
                .current_char()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| LexError::new(start, "Invalid unicode escape"))?;
            code = code * 16 + digit;
            self.advance();
        }
        char::from_u32(code).ok_or_else(|| LexError::new(start, "Invalid unicode code point"))
    }

    fn read_number(&mut self) -> Result<TokenKind, LexError> {
        let start = self.position;
        let mut number = String::new();
        let mut is_float = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.'
                && !is_float
                && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if is_float {
            number
                .parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| LexError::new(start, format!("Invalid number '{}'", number)))
        } else {
            number
                .parse::<i64>()
                .map(TokenKind::Integer)
                .map_err(|_| LexError::new(start, format!("Integer '{}' is out of range", number)))
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn double(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        self.advance();
        kind
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();
        let start = self.position;

        let kind = match self.current_char() {
            None => return Ok(Token::new(TokenKind::Eof, "", start)),
            Some('.') => {
                if self.peek_char(1) == Some('.') {
                    self.double(TokenKind::DotDot)
                } else {
                    self.single(TokenKind::Dot)
                }
            }
            Some(',') => self.single(TokenKind::Comma),
            Some('+') => self.single(TokenKind::Plus),
            Some('-') => self.single(TokenKind::Minus),
            Some('*') => self.single(TokenKind::Star),
            Some('/') => self.single(TokenKind::Slash),
            Some('%') => self.single(TokenKind::Percent),
            Some('?') => self.single(TokenKind::Question),
            Some(':') => self.single(TokenKind::Colon),
            Some('=') => match self.peek_char(1) {
                Some('=') => self.double(TokenKind::EqEq),
                Some('>') => self.double(TokenKind::Arrow),
                _ => {
                    return Err(LexError::new(
                        start,
                        "Unexpected '=' (did you mean '==' or '=>'?)",
                    ));
                }
            },
            Some('>') => {
                if self.peek_char(1) == Some('=') {
                    self.double(TokenKind::GtEq)
                } else {
                    self.single(TokenKind::Gt)
                }
            }
            Some('<') => {
                if self.peek_char(1) == Some('=') {
                    self.double(TokenKind::LtEq)
                } else {
                    self.single(TokenKind::Lt)
                }
            }
            Some('!') => {
                if self.peek_char(1) == Some('=') {
                    self.double(TokenKind::NotEq)
                } else {
                    self.single(TokenKind::Exclamation)
                }
            }
            Some('&') => {
                if self.peek_char(1) == Some('&') {
                    self.double(TokenKind::And)
                } else {
                    return Err(LexError::new(start, "Unexpected '&' (did you mean '&&'?)"));
                }
            }
            Some('|') => {
                if self.peek_char(1) == Some('|') {
                    self.double(TokenKind::Or)
                } else {
                    return Err(LexError::new(start, "Unexpected '|' (did you mean '||'?)"));
                }
            }
            Some('(') => self.single(TokenKind::LParen),
            Some(')') => self.single(TokenKind::RParen),
            Some('[') => self.single(TokenKind::LBracket),
            Some(']') => self.single(TokenKind::RBracket),
            Some('{') => self.single(TokenKind::LBrace),
            Some('}') => self.single(TokenKind::RBrace),
            Some('"') => TokenKind::String(self.read_string('"')?),
            Some('\'') => TokenKind::String(self.read_string('\'')?),
            Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => {
                let ident = self.read_identifier();

                match ident.as_str() {
                    "and" => TokenKind::And,
                    "or" => TokenKind::Or,
                    "true" => TokenKind::Boolean(true),
                    "false" => TokenKind::Boolean(false),
                    "null" => TokenKind::Null,
                    _ => TokenKind::Identifier(ident),
                }
            }
            Some(ch) if ch.is_ascii_digit() => self.read_number()?,
            Some(ch) => {
                return Err(LexError::new(
                    start,
                    format!("Unexpected character '{}'", ch),
                ));
            }
        };

        Ok(Token::new(kind, self.text_from(start), start))
    }
}

impl Iterator for Lexer {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let token = self.next_token();
        if matches!(&token, Err(_) | Ok(Token { kind: TokenKind::Eof, .. })) {
            self.finished = true;
        }
        Some(token)
    }
}

/// Tokenize a whole expression source, including the trailing `Eof` token.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            kinds("and or true false null"),
            vec![
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Boolean(true),
                TokenKind::Boolean(false),
                TokenKind::Null,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_range_after_integer() {
        assert_eq!(
            kinds("1..10.encode"),
            vec![
                TokenKind::Integer(1),
                TokenKind::DotDot,
                TokenKind::Integer(10),
                TokenKind::Dot,
                TokenKind::Identifier("encode".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_iterator_is_restartable() {
        let mut lexer = Lexer::new("x => x");
        let first: Vec<_> = lexer.by_ref().collect();
        assert_eq!(first.len(), 4);
        assert!(lexer.next().is_none());

        lexer.reset();
        let second: Vec<_> = lexer.collect();
        assert_eq!(first, second);
    }
}
