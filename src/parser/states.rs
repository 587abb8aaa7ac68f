//! The parser's state table.
//!
//! Every state is handled in one of two schemes. Token-mapped states list
//! the token kinds that are legal in that state, each with an optional
//! handler and an optional state to transition to; any other token kind is
//! checked against the active stop map and otherwise raises a parse error.
//! Sub states delegate every token to a nested sub-parser until one of the
//! stop tokens in `ends` arrives, at which point the sub-parser's tree is
//! handed to the state's handler and the machine transitions to the state
//! the stop token maps to. A sub state with no `ends` of its own borrows the
//! enclosing parser's stop map and propagates the stop upward.
//!
//! States marked completable are the only ones in which an expression may
//! legally end.

use crate::ast::tokens::TokenKind;
use crate::parser::handlers;
use crate::parser::{SubHandler, TokenHandler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    ExpectInitialOperand,
    ExpectOperand,
    ExpectBinOp,
    ExpectTransform,
    ExpectTransformAssignment,
    ExpectObjKey,
    ExpectKeyValSep,
    InitialIdentifier,
    InitialType,
    Identifier,
    PostTransform,
    ExpectUnionOperand,
    UnionOperand,
    Traverse,
    SubExpression,
    ArgVal,
    ObjVal,
    ArrayVal,
    Filter,
    Iter,
    Find,
    Reduce,
    TernaryMid,
    TernaryEnd,
    TransformArgName,
    Complete,
}

#[derive(Clone, Copy)]
pub struct TokenOpts {
    pub handler: Option<TokenHandler>,
    pub to: Option<State>,
}

#[derive(Clone, Copy)]
pub enum StateDef {
    Tokens {
        accepts: &'static [(TokenKind, TokenOpts)],
        completable: bool,
    },
    Sub {
        handler: SubHandler,
        start: State,
        ends: Option<&'static [(TokenKind, State)]>,
        completable: bool,
    },
}

macro_rules! accept {
    ($kind:ident => _, $to:ident) => {
        (
            TokenKind::$kind,
            TokenOpts {
                handler: None,
                to: Some(State::$to),
            },
        )
    };
    ($kind:ident => $handler:ident, $to:ident) => {
        (
            TokenKind::$kind,
            TokenOpts {
                handler: Some(handlers::$handler),
                to: Some(State::$to),
            },
        )
    };
}

/// Operand-position tokens shared by the operand states.
macro_rules! operand_accepts {
    ($ident_to:ident, $type_entry:expr) => {
        &[
            accept!(StringLiteral => literal, ExpectBinOp),
            accept!(NumberLiteral => literal, ExpectBinOp),
            accept!(BooleanLiteral => literal, ExpectBinOp),
            accept!(NullLiteral => literal, ExpectBinOp),
            accept!(Identifier => identifier, $ident_to),
            $type_entry,
            accept!(UnaryOp => unary_op, ExpectOperand),
            accept!(OpenParen => _, SubExpression),
            accept!(OpenCurl => obj_start, ExpectObjKey),
            accept!(OpenBracket => array_start, ArrayVal),
            accept!(Dot => dot_relative, Traverse),
        ]
    };
}

static EXPECT_INITIAL_OPERAND: StateDef = StateDef::Tokens {
    accepts: operand_accepts!(
        InitialIdentifier,
        accept!(TypeName => type_identifier, InitialType)
    ),
    completable: false,
};

static EXPECT_OPERAND: StateDef = StateDef::Tokens {
    accepts: operand_accepts!(Identifier, accept!(TypeName => type_identifier, Identifier)),
    completable: false,
};

/// Tokens legal after any completed operand.
macro_rules! post_operand_accepts {
    ($($extra:expr,)*) => {
        &[
            accept!(BinaryOp => binary_op, ExpectOperand),
            accept!(Pipe => _, ExpectTransform),
            accept!(Dot => dot_traverse, Traverse),
            accept!(OpenBracket => _, Filter),
            accept!(OpenIter => _, Iter),
            accept!(OpenFind => _, Find),
            accept!(Question => ternary_start, TernaryMid),
            $($extra,)*
        ]
    };
}

static EXPECT_BIN_OP: StateDef = StateDef::Tokens {
    accepts: post_operand_accepts!(),
    completable: true,
};

static IDENTIFIER: StateDef = StateDef::Tokens {
    accepts: post_operand_accepts!(
        accept!(Identifier => call_operand, Identifier),
        accept!(StringLiteral => call_operand, Identifier),
        accept!(NumberLiteral => call_operand, Identifier),
        accept!(BooleanLiteral => call_operand, Identifier),
        accept!(NullLiteral => call_operand, Identifier),
    ),
    completable: true,
};

static INITIAL_IDENTIFIER: StateDef = StateDef::Tokens {
    accepts: post_operand_accepts!(
        accept!(Identifier => call_operand, Identifier),
        accept!(StringLiteral => call_operand, Identifier),
        accept!(NumberLiteral => call_operand, Identifier),
        accept!(BooleanLiteral => call_operand, Identifier),
        accept!(NullLiteral => call_operand, Identifier),
        accept!(Equals => declaration_start, ExpectOperand),
        accept!(OpenParen => transform_assignment_start, TransformArgName),
    ),
    completable: true,
};

static INITIAL_TYPE: StateDef = StateDef::Tokens {
    accepts: post_operand_accepts!(
        accept!(Equals => type_declaration_start, ExpectUnionOperand),
    ),
    completable: true,
};

static POST_TRANSFORM: StateDef = StateDef::Tokens {
    accepts: post_operand_accepts!(accept!(OpenParen => _, ArgVal),),
    completable: true,
};

static EXPECT_TRANSFORM: StateDef = StateDef::Tokens {
    accepts: &[accept!(Identifier => transform, PostTransform)],
    completable: false,
};

static EXPECT_TRANSFORM_ASSIGNMENT: StateDef = StateDef::Tokens {
    accepts: &[accept!(Turnstile => _, ExpectOperand)],
    completable: false,
};

static EXPECT_OBJ_KEY: StateDef = StateDef::Tokens {
    accepts: &[
        accept!(Identifier => obj_key, ExpectKeyValSep),
        accept!(StringLiteral => obj_key, ExpectKeyValSep),
        accept!(NumberLiteral => obj_key, ExpectKeyValSep),
        accept!(CloseCurl => _, ExpectBinOp),
    ],
    completable: false,
};

static EXPECT_KEY_VAL_SEP: StateDef = StateDef::Tokens {
    accepts: &[accept!(Colon => _, ObjVal)],
    completable: false,
};

static EXPECT_UNION_OPERAND: StateDef = StateDef::Tokens {
    accepts: &[
        accept!(Identifier => identifier, UnionOperand),
        accept!(TypeName => type_identifier, UnionOperand),
        accept!(StringLiteral => literal, UnionOperand),
        accept!(NumberLiteral => literal, UnionOperand),
        accept!(BooleanLiteral => literal, UnionOperand),
        accept!(NullLiteral => literal, UnionOperand),
    ],
    completable: false,
};

static UNION_OPERAND: StateDef = StateDef::Tokens {
    accepts: &[accept!(Pipe => union, ExpectUnionOperand)],
    completable: true,
};

static TRAVERSE: StateDef = StateDef::Tokens {
    accepts: &[accept!(Identifier => identifier, Identifier)],
    completable: false,
};

static SUB_EXPRESSION: StateDef = StateDef::Sub {
    handler: handlers::sub_expression,
    start: State::ExpectOperand,
    ends: Some(&[(TokenKind::CloseParen, State::ExpectBinOp)]),
    completable: false,
};

static ARG_VAL: StateDef = StateDef::Sub {
    handler: handlers::arg_val,
    start: State::ExpectOperand,
    ends: Some(&[
        (TokenKind::Comma, State::ArgVal),
        (TokenKind::CloseParen, State::ExpectBinOp),
    ]),
    completable: false,
};

static OBJ_VAL: StateDef = StateDef::Sub {
    handler: handlers::obj_val,
    start: State::ExpectOperand,
    ends: Some(&[
        (TokenKind::Comma, State::ExpectObjKey),
        (TokenKind::CloseCurl, State::ExpectBinOp),
    ]),
    completable: false,
};

static ARRAY_VAL: StateDef = StateDef::Sub {
    handler: handlers::array_val,
    start: State::ExpectOperand,
    ends: Some(&[
        (TokenKind::Comma, State::ArrayVal),
        (TokenKind::CloseBracket, State::ExpectBinOp),
    ]),
    completable: false,
};

static FILTER: StateDef = StateDef::Sub {
    handler: handlers::filter,
    start: State::ExpectOperand,
    ends: Some(&[(TokenKind::CloseBracket, State::Identifier)]),
    completable: false,
};

static ITER: StateDef = StateDef::Sub {
    handler: handlers::iter,
    start: State::ExpectOperand,
    ends: Some(&[
        (TokenKind::Comma, State::Reduce),
        (TokenKind::CloseIter, State::ExpectBinOp),
    ]),
    completable: false,
};

static FIND: StateDef = StateDef::Sub {
    handler: handlers::find,
    start: State::ExpectOperand,
    ends: Some(&[(TokenKind::CloseIter, State::ExpectBinOp)]),
    completable: false,
};

static REDUCE: StateDef = StateDef::Sub {
    handler: handlers::reduce,
    start: State::ExpectOperand,
    ends: Some(&[(TokenKind::CloseIter, State::ExpectBinOp)]),
    completable: false,
};

static TERNARY_MID: StateDef = StateDef::Sub {
    handler: handlers::ternary_mid,
    start: State::ExpectOperand,
    ends: Some(&[(TokenKind::Colon, State::TernaryEnd)]),
    completable: false,
};

static TERNARY_END: StateDef = StateDef::Sub {
    handler: handlers::ternary_end,
    start: State::ExpectOperand,
    ends: None,
    completable: true,
};

static TRANSFORM_ARG_NAME: StateDef = StateDef::Sub {
    handler: handlers::arg_name,
    start: State::ExpectOperand,
    ends: Some(&[
        (TokenKind::Comma, State::TransformArgName),
        (TokenKind::CloseParen, State::ExpectTransformAssignment),
    ]),
    completable: false,
};

static COMPLETE: StateDef = StateDef::Tokens {
    accepts: &[],
    completable: true,
};

pub fn def(state: State) -> &'static StateDef {
    match state {
        State::ExpectInitialOperand => &EXPECT_INITIAL_OPERAND,
        State::ExpectOperand => &EXPECT_OPERAND,
        State::ExpectBinOp => &EXPECT_BIN_OP,
        State::ExpectTransform => &EXPECT_TRANSFORM,
        State::ExpectTransformAssignment => &EXPECT_TRANSFORM_ASSIGNMENT,
        State::ExpectObjKey => &EXPECT_OBJ_KEY,
        State::ExpectKeyValSep => &EXPECT_KEY_VAL_SEP,
        State::InitialIdentifier => &INITIAL_IDENTIFIER,
        State::InitialType => &INITIAL_TYPE,
        State::Identifier => &IDENTIFIER,
        State::PostTransform => &POST_TRANSFORM,
        State::ExpectUnionOperand => &EXPECT_UNION_OPERAND,
        State::UnionOperand => &UNION_OPERAND,
        State::Traverse => &TRAVERSE,
        State::SubExpression => &SUB_EXPRESSION,
        State::ArgVal => &ARG_VAL,
        State::ObjVal => &OBJ_VAL,
        State::ArrayVal => &ARRAY_VAL,
        State::Filter => &FILTER,
        State::Iter => &ITER,
        State::Find => &FIND,
        State::Reduce => &REDUCE,
        State::TernaryMid => &TERNARY_MID,
        State::TernaryEnd => &TERNARY_END,
        State::TransformArgName => &TRANSFORM_ARG_NAME,
        State::Complete => &COMPLETE,
    }
}

pub fn completable(state: State) -> bool {
    match def(state) {
        StateDef::Tokens { completable, .. } => *completable,
        StateDef::Sub { completable, .. } => *completable,
    }
}
