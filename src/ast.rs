//! # Rill - Abstract Syntax Tree
//!
//! This module defines the tokens and the syntax tree for the Rill
//! expression language.
//!
//! ## Architecture Overview
//!
//! The AST module is organized into focused submodules:
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[nodes]** - Arena-allocated expression nodes
//!
//! ## Arena Layout
//!
//! Nodes live in a growable arena keyed by [`nodes::NodeId`]; children are
//! held as indices. The arena also carries a parent map that exists purely
//! for the parser's precedence climbing; the evaluator only ever walks
//! child edges.
//!
//! ## Core Concepts
//!
//! A program is a sequence of lines. Each line is either a plain
//! expression, a variable or type declaration (`name = expr`,
//! `Name = a | b`), or a transform assignment (`name(args) |= expr`).
//! Lines evaluate in order against a shared context copy:
//!
//! ```text
//! foo = 5 + 7; bar = foo * 2; bar
//! ```
//!
//! Expressions support binary and unary operators, ternaries, transforms
//! (`value | name(args)`), filters (`subject[expr]`), and the three
//! iteration forms:
//!
//! ```text
//! [1,2,3,4,5] <| @ > 2 ? ~ : @ |>     collect
//! [1,2,3,4,5] <|* @ % 4 == 0 ? @ : ~ |>   find
//! [1,2,3,4,5] <| @ + $, 0 |>          reduce
//! ```

pub mod nodes;
pub mod tokens;

pub use nodes::{Ast, Node, NodeId};
pub use tokens::{Token, TokenKind};
