//! Error taxonomy for the Rill engine.
//!
//! Lexing and parsing errors surface synchronously from `compile`; evaluation
//! errors travel through the same deferred channel as results. Flow errors
//! mark violations of the flow protocol (pushing after end, ending twice,
//! listening to a closed flow) and always fail loudly.

use thiserror::Error;

/// Errors raised while splitting an expression into tokens.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    /// A run of characters matched no literal, operator, or identifier rule
    #[error("Invalid expression token: {0}")]
    InvalidToken(String),
}

/// Errors raised while parsing a token stream into a syntax tree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// A token that the current parser state does not accept
    #[error("Token {raw} ({kind}) unexpected in expression: {expr}")]
    UnexpectedToken {
        raw: String,
        kind: &'static str,
        expr: String,
    },

    /// The expression ended while an operand or delimiter was still expected
    #[error("Unexpected end of expression: {0}")]
    UnexpectedEnd(String),

    /// Tokens were added after the parser was completed
    #[error("Cannot add a new token to a completed parser")]
    Completed,

    /// A second variable definition on the same line
    #[error("Only one definition per line")]
    DuplicateDefinition,

    /// A definition inside a relative subexpression
    #[error("Definitions may only appear at the top level")]
    RelativeDefinition,

    /// A variable referenced in its own definition
    #[error("Cannot reference {0} in its own definition")]
    SelfReference(String),

    /// Two lines assigning the same top-level name
    #[error("{0} is assigned more than once")]
    DuplicateAssignment(String),

    /// A structurally impossible token placement
    #[error("Malformed expression: {0}")]
    Malformed(String),
}

/// Errors raised while evaluating a syntax tree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    /// Type mismatch or invalid operation for the given types
    #[error("Type error: {0}")]
    TypeError(String),

    /// Division by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// A binary or unary operator with no registered implementation
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    /// A transform name with no expression-defined or registered function
    #[error("Unknown transform: {0}")]
    UnknownTransform(String),

    /// A collect/find/reduce subject that is not an array, object, or flow
    #[error("Iterable expression applied over non-iterable {0}")]
    NotIterable(String),

    /// A registered transform implementation failed
    #[error("Transform failed: {0}")]
    Transform(String),

    /// An evaluation reached a subtree the parser never finished
    #[error("Incomplete expression tree")]
    IncompleteTree,

    /// A flow protocol violation observed during evaluation
    #[error(transparent)]
    Flow(#[from] FlowError),
}

/// Flow protocol violations. These are programming errors, not data errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowError {
    /// `push` or `end` called on a flow that has already ended
    #[error("May not be called on an ended flow")]
    Ended,

    /// `listen` or `push` called on a flow whose history has been released
    #[error("May not be called on a closed flow")]
    Closed,
}

/// Any error the engine can produce, for callers that do not care which
/// stage failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}
