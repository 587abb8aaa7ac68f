//! The operator/element table that configures the lexer and parser.
//!
//! A grammar maps each lexeme to either a structural element (brackets,
//! separators, the iteration delimiters) or an operator with a precedence
//! and an implementation function. Grammars are instance-scoped: every
//! [`crate::engine::Engine`] owns one, and registering or removing an
//! operator mutates that instance immediately. Mutating a grammar while
//! expressions built from it are still evaluating is unsupported.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::tokens::TokenKind;
use crate::error::EvalError;
use crate::ops;
use crate::value::Value;

/// Implementation of a binary operator.
pub type BinaryFn = Rc<dyn Fn(&Value, &Value) -> Result<Value, EvalError>>;

/// Implementation of a unary operator.
pub type UnaryFn = Rc<dyn Fn(&Value) -> Result<Value, EvalError>>;

/// Precedence assigned to every unary operator. Higher than any binary
/// operator, so `!a + b` parses as `(!a) + b`.
pub const UNARY_PRECEDENCE: u64 = u64::MAX;

/// One grammar element.
#[derive(Clone)]
pub enum Element {
    /// A structural token with no evaluation semantics of its own
    Structural(TokenKind),

    /// A binary operator
    Binary { precedence: u64, apply: BinaryFn },

    /// A unary (prefix) operator
    Unary { apply: UnaryFn },
}

/// Mapping from lexeme to element.
#[derive(Clone)]
pub struct Grammar {
    elements: HashMap<String, Element>,
}

impl Grammar {
    /// A grammar with the default structural elements and operator set.
    pub fn new() -> Self {
        let mut grammar = Grammar {
            elements: HashMap::new(),
        };
        grammar.register_structural();
        ops::register_defaults(&mut grammar);
        grammar
    }

    fn register_structural(&mut self) {
        let table: &[(&str, TokenKind)] = &[
            (".", TokenKind::Dot),
            (",", TokenKind::Comma),
            (":", TokenKind::Colon),
            (";", TokenKind::Semicolon),
            ("?", TokenKind::Question),
            ("=", TokenKind::Equals),
            ("|", TokenKind::Pipe),
            ("|=", TokenKind::Turnstile),
            ("(", TokenKind::OpenParen),
            (")", TokenKind::CloseParen),
            ("[", TokenKind::OpenBracket),
            ("]", TokenKind::CloseBracket),
            ("{", TokenKind::OpenCurl),
            ("}", TokenKind::CloseCurl),
            ("<|", TokenKind::OpenIter),
            ("|>", TokenKind::CloseIter),
            ("<|*", TokenKind::OpenFind),
        ];
        for (lexeme, kind) in table {
            self.elements
                .insert((*lexeme).to_string(), Element::Structural(*kind));
        }
    }

    /// Registers (or replaces) a binary operator.
    pub fn add_binary_op(&mut self, symbol: &str, precedence: u64, apply: BinaryFn) {
        self.elements
            .insert(symbol.to_string(), Element::Binary { precedence, apply });
    }

    /// Registers (or replaces) a unary operator.
    pub fn add_unary_op(&mut self, symbol: &str, apply: UnaryFn) {
        self.elements
            .insert(symbol.to_string(), Element::Unary { apply });
    }

    /// Removes a registered operator. Structural elements cannot be removed.
    pub fn remove_op(&mut self, symbol: &str) {
        if matches!(
            self.elements.get(symbol),
            Some(Element::Binary { .. }) | Some(Element::Unary { .. })
        ) {
            self.elements.remove(symbol);
        }
    }

    pub fn element(&self, lexeme: &str) -> Option<&Element> {
        self.elements.get(lexeme)
    }

    /// The token kind a lexeme classifies as, if it is a grammar element.
    pub fn token_kind(&self, lexeme: &str) -> Option<TokenKind> {
        self.elements.get(lexeme).map(|element| match element {
            Element::Structural(kind) => *kind,
            Element::Binary { .. } => TokenKind::BinaryOp,
            Element::Unary { .. } => TokenKind::UnaryOp,
        })
    }

    /// Precedence of an operator symbol; unknown symbols weigh nothing.
    pub fn precedence(&self, symbol: &str) -> u64 {
        match self.elements.get(symbol) {
            Some(Element::Binary { precedence, .. }) => *precedence,
            Some(Element::Unary { .. }) => UNARY_PRECEDENCE,
            _ => 0,
        }
    }

    pub fn binary(&self, symbol: &str) -> Option<BinaryFn> {
        match self.elements.get(symbol) {
            Some(Element::Binary { apply, .. }) => Some(apply.clone()),
            _ => None,
        }
    }

    pub fn unary(&self, symbol: &str) -> Option<UnaryFn> {
        match self.elements.get(symbol) {
            Some(Element::Unary { apply }) => Some(apply.clone()),
            _ => None,
        }
    }

    /// All registered lexemes, for the lexer's split regex.
    pub fn lexemes(&self) -> impl Iterator<Item = &str> {
        self.elements.keys().map(|k| k.as_str())
    }
}

impl Default for Grammar {
    fn default() -> Self {
        Grammar::new()
    }
}
