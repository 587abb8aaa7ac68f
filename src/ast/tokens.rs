use crate::value::Value;

/// The classified kind of a lexed token.
///
/// Literal and identifier kinds are fixed; the remaining kinds come from the
/// grammar's element table, so a custom operator registered at runtime lexes
/// as [`TokenKind::BinaryOp`] or [`TokenKind::UnaryOp`] like any built-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals
    /// String literal enclosed in single or double quotes
    StringLiteral,

    /// Integer or floating-point number
    NumberLiteral,

    /// `true` or `false`
    BooleanLiteral,

    /// `null`
    NullLiteral,

    // Identifiers
    /// Lowercase-leading identifier, or one of the iteration sigils
    /// (`@`, `#`, `~`, `$`, optionally fused with a property name)
    Identifier,

    /// Uppercase-leading type name
    TypeName,

    // Grammar-defined operators
    /// Registered binary operator
    BinaryOp,

    /// Registered unary operator
    UnaryOp,

    // Structural elements
    /// Property traversal
    Dot,

    /// Element or argument separator
    Comma,

    /// Object key/value separator, ternary alternate
    Colon,

    /// Line separator (same role as a newline)
    Semicolon,

    /// Ternary test
    Question,

    /// Variable or type declaration
    Equals,

    /// Transform application, or union separator in a type declaration
    Pipe,

    /// Transform assignment (`|=`)
    Turnstile,

    /// Grouping / argument list open
    OpenParen,

    /// Grouping / argument list close
    CloseParen,

    /// Array literal or filter open
    OpenBracket,

    /// Array literal or filter close
    CloseBracket,

    /// Object literal open
    OpenCurl,

    /// Object literal close
    CloseCurl,

    /// Collect/reduce open (`<|`)
    OpenIter,

    /// Collect/find/reduce close (`|>`)
    CloseIter,

    /// Find open (`<|*`)
    OpenFind,
}

impl TokenKind {
    /// Name used in parse error messages
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::StringLiteral => "stringLiteral",
            TokenKind::NumberLiteral => "numberLiteral",
            TokenKind::BooleanLiteral => "booleanLiteral",
            TokenKind::NullLiteral => "nullLiteral",
            TokenKind::Identifier => "identifier",
            TokenKind::TypeName => "type",
            TokenKind::BinaryOp => "binaryOp",
            TokenKind::UnaryOp => "unaryOp",
            TokenKind::Dot => "dot",
            TokenKind::Comma => "comma",
            TokenKind::Colon => "colon",
            TokenKind::Semicolon => "semicolon",
            TokenKind::Question => "question",
            TokenKind::Equals => "equals",
            TokenKind::Pipe => "pipe",
            TokenKind::Turnstile => "turnstile",
            TokenKind::OpenParen => "openParen",
            TokenKind::CloseParen => "closeParen",
            TokenKind::OpenBracket => "openBracket",
            TokenKind::CloseBracket => "closeBracket",
            TokenKind::OpenCurl => "openCurl",
            TokenKind::CloseCurl => "closeCurl",
            TokenKind::OpenIter => "openIter",
            TokenKind::CloseIter => "closeIter",
            TokenKind::OpenFind => "openFind",
        }
    }

    /// True for the four literal kinds
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            TokenKind::StringLiteral
                | TokenKind::NumberLiteral
                | TokenKind::BooleanLiteral
                | TokenKind::NullLiteral
        )
    }
}

/// One lexed token. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Classified kind
    pub kind: TokenKind,

    /// Parsed literal value, or the raw symbol for operators and identifiers
    pub value: Value,

    /// The raw source text of the token
    pub raw: String,

    /// Zero-based physical line index
    pub line: usize,

    /// Zero-based character offset within the line
    pub column: usize,
}

impl Token {
    /// The symbol carried by operator and identifier tokens
    pub fn symbol(&self) -> &str {
        match &self.value {
            Value::String(s) => s,
            _ => &self.raw,
        }
    }
}
