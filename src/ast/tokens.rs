/// A lexical token together with the source text it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,

    /// Raw source text of the token (empty for `Eof`)
    pub text: String,

    /// Character offset of the first character of the token
    pub position: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, position: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            position,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    /// Floating-point number
    ///
    /// # Examples
    /// ```text
    /// 3.14
    /// 0.5
    /// ```
    Float(f64),

    /// Integer
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 0
    /// ```
    Integer(i64),

    /// String literal enclosed in single or double quotes
    ///
    /// # Examples
    /// ```text
    /// "hello"
    /// 'minecraft:stone'
    /// ```
    String(String),

    /// Boolean values
    Boolean(bool),

    /// Null value
    Null,

    /// Variable or function name
    ///
    /// Must start with a letter or underscore, followed by letters, digits, or underscores.
    ///
    /// # Examples
    /// ```text
    /// index
    /// findFirst
    /// _internal
    /// ```
    Identifier(String),

    // Arithmetic
    /// Addition or string concatenation
    Plus,

    /// Subtraction or negation
    Minus,

    /// Multiplication
    Star,

    /// Division
    Slash,

    /// Modulo
    Percent,

    // Comparison
    /// Equality operator
    EqEq,

    /// Inequality operator
    NotEq,

    /// Less than
    Lt,

    /// Greater than
    Gt,

    /// Less than or equal
    LtEq,

    /// Greater than or equal
    GtEq,

    // Logical
    /// Logical AND (`&&` or the word `and`)
    And,

    /// Logical OR (`||` or the word `or`)
    Or,

    /// Logical NOT
    Exclamation,

    /// Ternary condition marker
    ///
    /// # Examples
    /// ```text
    /// index == 0 ? 'first' : 'other'
    /// ```
    Question,

    /// Ternary branch separator and object literal key separator
    Colon,

    /// Range operator
    ///
    /// # Examples
    /// ```text
    /// 0..4
    /// 1..count(items)
    /// ```
    DotDot,

    /// Lambda arrow
    ///
    /// # Examples
    /// ```text
    /// x => x * 2
    /// (x, i) => i
    /// ```
    Arrow,

    // Delimiters
    /// Left parenthesis for grouping, calls, or lambda parameter lists
    LParen,

    /// Right parenthesis
    RParen,

    /// Left bracket for index access or array literals
    LBracket,

    /// Right bracket
    RBracket,

    /// Left brace for object literals
    LBrace,

    /// Right brace
    RBrace,

    /// Dot for member access and instance calls
    Dot,

    /// Comma for separating arguments or elements
    Comma,

    /// End of input
    Eof,
}

impl TokenKind {
    /// Short human-readable description used in parse diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Float(n) => format!("number {}", n),
            TokenKind::Integer(n) => format!("number {}", n),
            TokenKind::String(s) => format!("string '{}'", s),
            TokenKind::Boolean(b) => format!("'{}'", b),
            TokenKind::Null => "'null'".to_string(),
            TokenKind::Identifier(name) => format!("identifier '{}'", name),
            TokenKind::Plus => "'+'".to_string(),
            TokenKind::Minus => "'-'".to_string(),
            TokenKind::Star => "'*'".to_string(),
            TokenKind::Slash => "'/'".to_string(),
            TokenKind::Percent => "'%'".to_string(),
            TokenKind::EqEq => "'=='".to_string(),
            TokenKind::NotEq => "'!='".to_string(),
            TokenKind::Lt => "'<'".to_string(),
            TokenKind::Gt => "'>'".to_string(),
            TokenKind::LtEq => "'<='".to_string(),
            TokenKind::GtEq => "'>='".to_string(),
            TokenKind::And => "'&&'".to_string(),
            TokenKind::Or => "'||'".to_string(),
            TokenKind::Exclamation => "'!'".to_string(),
            TokenKind::Question => "'?'".to_string(),
            TokenKind::Colon => "':'".to_string(),
            TokenKind::DotDot => "'..'".to_string(),
            TokenKind::Arrow => "'=>'".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::LBracket => "'['".to_string(),
            TokenKind::RBracket => "']'".to_string(),
            TokenKind::LBrace => "'{'".to_string(),
            TokenKind::RBrace => "'}'".to_string(),
            TokenKind::Dot => "'.'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Eof => "end of expression".to_string(),
        }
    }
}
