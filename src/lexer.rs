//! Regex-driven tokenizer.
//!
//! One alternation regex is assembled per grammar: whitespace and newlines,
//! quoted strings, the boolean/null keywords, the grammar's operator lexemes
//! sorted longest-first (so `<|*` wins over `<|` over `|`), identifiers, the
//! iteration sigils, and numerics. Word-like lexemes such as `in` get word
//! boundary guards so they never split an identifier.
//!
//! Newlines and semicolons both separate logical lines; each line is parsed
//! independently, but later lines may reference variables defined earlier.

use std::rc::Rc;

use regex::Regex;

use crate::ast::tokens::{Token, TokenKind};
use crate::error::LexError;
use crate::grammar::Grammar;
use crate::value::Value;

pub struct Lexer {
    grammar: Rc<Grammar>,
    regex: Regex,
}

impl Lexer {
    pub fn new(grammar: Rc<Grammar>) -> Self {
        let pattern = split_pattern(&grammar);
        // Every lexeme is regex-escaped, so the assembled pattern is valid.
        let regex = Regex::new(&pattern).expect("escaped grammar lexemes form a valid pattern");
        Lexer { grammar, regex }
    }

    /// Splits source text into logical lines of classified tokens.
    pub fn tokenize(&self, source: &str) -> Result<Vec<Vec<Token>>, LexError> {
        let mut lines: Vec<Vec<Token>> = vec![Vec::new()];
        let mut line_ix = 0usize;
        let mut line_start = 0usize;
        let mut last_end = 0usize;

        for m in self.regex.find_iter(source) {
            if m.start() > last_end {
                let gap = source[last_end..m.start()].trim();
                if !gap.is_empty() {
                    return Err(LexError::InvalidToken(gap.to_string()));
                }
            }
            last_end = m.end();

            let fragment = m.as_str();
            if fragment.chars().all(|c| c == ' ' || c == '\t') {
                continue;
            }
            if fragment == "\n" || fragment == "\r\n" {
                line_ix += 1;
                line_start = m.end();
                lines.push(Vec::new());
                continue;
            }

            let token = self.classify(fragment, line_ix, m.start() - line_start)?;
            if token.kind == TokenKind::Semicolon {
                lines.push(Vec::new());
                continue;
            }
            if let Some(line) = lines.last_mut() {
                line.push(token);
            }
        }

        if last_end < source.len() {
            let gap = source[last_end..].trim();
            if !gap.is_empty() {
                return Err(LexError::InvalidToken(gap.to_string()));
            }
        }

        Ok(lines
            .into_iter()
            .map(merge_negatives)
            .filter(|line| !line.is_empty())
            .collect())
    }

    fn classify(&self, fragment: &str, line: usize, column: usize) -> Result<Token, LexError> {
        let first = fragment.chars().next();
        let (kind, value) = if matches!(first, Some('\'') | Some('"')) {
            (TokenKind::StringLiteral, Value::String(unquote(fragment)))
        } else if first.is_some_and(|c| c.is_ascii_digit()) {
            let value = if fragment.contains('.') {
                Value::Float(
                    fragment
                        .parse::<f64>()
                        .map_err(|_| LexError::InvalidToken(fragment.to_string()))?,
                )
            } else {
                Value::Integer(
                    fragment
                        .parse::<i64>()
                        .map_err(|_| LexError::InvalidToken(fragment.to_string()))?,
                )
            };
            (TokenKind::NumberLiteral, value)
        } else if fragment == "true" || fragment == "false" {
            (TokenKind::BooleanLiteral, Value::Boolean(fragment == "true"))
        } else if fragment == "null" {
            (TokenKind::NullLiteral, Value::Null)
        } else if let Some(kind) = self.grammar.token_kind(fragment) {
            (kind, Value::String(fragment.to_string()))
        } else if first.is_some_and(|c| c.is_ascii_lowercase()) {
            (TokenKind::Identifier, Value::String(fragment.to_string()))
        } else if matches!(first, Some('@') | Some('#') | Some('$') | Some('~')) {
            (TokenKind::Identifier, Value::String(fragment.to_string()))
        } else if first.is_some_and(|c| c.is_ascii_uppercase()) {
            (TokenKind::TypeName, Value::String(fragment.to_string()))
        } else {
            return Err(LexError::InvalidToken(fragment.to_string()));
        };

        Ok(Token {
            kind,
            value,
            raw: fragment.to_string(),
            line,
            column,
        })
    }
}

/// Fuses `-` into a directly following number literal when it sits in operand
/// position: at the start of a line, or after an operator, opener, or
/// separator. Everywhere else `-` stays a binary operator.
fn merge_negatives(line: Vec<Token>) -> Vec<Token> {
    let mut merged: Vec<Token> = Vec::with_capacity(line.len());
    let mut tokens = line.into_iter().peekable();
    while let Some(token) = tokens.next() {
        let operand_position = token.kind == TokenKind::BinaryOp
            && token.symbol() == "-"
            && match merged.last() {
                None => true,
                Some(prev) => matches!(
                    prev.kind,
                    TokenKind::BinaryOp
                        | TokenKind::UnaryOp
                        | TokenKind::Dot
                        | TokenKind::Comma
                        | TokenKind::Colon
                        | TokenKind::Question
                        | TokenKind::Equals
                        | TokenKind::Pipe
                        | TokenKind::Turnstile
                        | TokenKind::OpenParen
                        | TokenKind::OpenBracket
                        | TokenKind::OpenCurl
                        | TokenKind::OpenIter
                        | TokenKind::OpenFind
                ),
            };
        if operand_position
            && tokens
                .peek()
                .is_some_and(|next| next.kind == TokenKind::NumberLiteral)
        {
            if let Some(number) = tokens.next() {
                let value = match number.value {
                    Value::Integer(n) => Value::Integer(-n),
                    Value::Float(n) => Value::Float(-n),
                    other => other,
                };
                merged.push(Token {
                    kind: TokenKind::NumberLiteral,
                    value,
                    raw: format!("-{}", number.raw),
                    line: token.line,
                    column: token.column,
                });
            }
            continue;
        }
        merged.push(token);
    }
    merged
}

fn unquote(fragment: &str) -> String {
    let quote = fragment.chars().next().unwrap_or('"');
    let inner = &fragment[1..fragment.len().saturating_sub(1)];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) if next == quote || next == '\\' => out.push(next),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn split_pattern(grammar: &Grammar) -> String {
    // Longest lexeme first, so operators sharing a prefix never shadow
    let mut lexemes: Vec<&str> = grammar.lexemes().collect();
    lexemes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let ops = lexemes
        .iter()
        .map(|lexeme| escape_lexeme(lexeme))
        .collect::<Vec<_>>()
        .join("|");
    format!(
        r#"\r?\n|[ \t]+|'(?:\\.|[^'\\])*'|"(?:\\.|[^"\\])*"|\btrue\b|\bfalse\b|\bnull\b|{ops}|[a-zA-Z][a-zA-Z0-9_]*|[@#$~][a-zA-Z0-9_]*|(?:[0-9]*\.[0-9]+)|[0-9]+"#
    )
}

fn escape_lexeme(lexeme: &str) -> String {
    let escaped = regex::escape(lexeme);
    let word_like = !lexeme.is_empty()
        && lexeme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && lexeme
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if word_like {
        format!(r"\b{escaped}\b")
    } else {
        escaped
    }
}

#[test]
fn test_longer_lexemes_win() {
    let lexer = Lexer::new(Rc::new(Grammar::new()));
    let lines = lexer.tokenize("a <|* b").unwrap();
    assert_eq!(lines[0][1].kind, TokenKind::OpenFind);
    let lines = lexer.tokenize("a |= b").unwrap();
    assert_eq!(lines[0][1].kind, TokenKind::Turnstile);
}

#[test]
fn test_unquote() {
    assert_eq!(unquote(r#"'it\'s'"#), "it's");
    assert_eq!(unquote(r#""say \"hi\"""#), "say \"hi\"");
    assert_eq!(unquote(r#"'a\\b'"#), "a\\b");
}
