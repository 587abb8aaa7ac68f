//! Finite-state-machine parser.
//!
//! The parser consumes one token at a time, holding a cursor into the tree
//! under construction. Each state either maps acceptable token kinds to a
//! handler and a next state, or delegates to a nested sub-parser together
//! with a stop-token map; see [`states`] for the full table and
//! [`handlers`] for the tree-building steps.
//!
//! Binary operators are inserted precedence-correctly during parsing: the
//! handler climbs the parent chain from the cursor while the parent operator
//! binds at least as tightly, then re-links the new node at that point. The
//! parent map lives in the arena and is discarded after parsing.

use std::collections::HashSet;
use std::rc::Rc;

use crate::ast::nodes::{Ast, Node, NodeId};
use crate::ast::tokens::{Token, TokenKind};
use crate::error::ParseError;
use crate::grammar::Grammar;

pub(crate) mod handlers;
pub mod states;

pub use states::State;

/// What the next identifier token should build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdentMode {
    /// A plain context lookup
    Plain,
    /// A relative lookup (`.foo` - leading dot in operand position)
    Relative,
    /// A traversal chained off the cursor (`foo.bar`)
    Encapsulate,
}

/// Handler for a single token in a token-mapped state.
pub type TokenHandler = fn(&mut Parser, &mut Ast, &Token) -> Result<(), ParseError>;

/// Handler invoked with a completed subexpression tree.
pub type SubHandler = fn(&mut Parser, &mut Ast, Option<NodeId>) -> Result<(), ParseError>;

pub struct Parser {
    pub(crate) grammar: Rc<Grammar>,
    pub(crate) state: State,
    pub(crate) tree: Option<NodeId>,
    pub(crate) cursor: Option<NodeId>,
    pub(crate) expr_str: String,
    pub(crate) relative: bool,
    /// Relative flag of the most recently completed sub-parser
    pub(crate) sub_relative: bool,
    stop_map: Vec<(TokenKind, State)>,
    parent_stop: bool,
    sub: Option<Box<Parser>>,
    /// Whether this parser has accepted any token
    started: bool,
    pub(crate) definition: bool,
    pub(crate) assignment: Option<String>,
    pub(crate) cur_obj_key: Option<String>,
    /// Pending transform assignment: name and collected parameter names
    pub(crate) transform: Option<(String, Vec<String>)>,
    pub(crate) next_ident: IdentMode,
}

impl Parser {
    pub fn new(grammar: Rc<Grammar>) -> Self {
        Self::with_state(grammar, String::new(), Vec::new(), State::ExpectInitialOperand)
    }

    fn with_state(
        grammar: Rc<Grammar>,
        prefix: String,
        stop_map: Vec<(TokenKind, State)>,
        state: State,
    ) -> Self {
        Parser {
            grammar,
            state,
            tree: None,
            cursor: None,
            expr_str: prefix,
            relative: false,
            sub_relative: false,
            stop_map,
            parent_stop: false,
            sub: None,
            started: false,
            definition: false,
            assignment: None,
            cur_obj_key: None,
            transform: None,
            next_ident: IdentMode::Plain,
        }
    }

    /// Parses each tokenized line independently, failing when two lines
    /// assign the same top-level name. Returns the line roots in order.
    pub fn complete_lines(
        grammar: &Rc<Grammar>,
        ast: &mut Ast,
        lines: &[Vec<Token>],
    ) -> Result<Vec<NodeId>, ParseError> {
        let mut assigned: HashSet<String> = HashSet::new();
        let mut body = Vec::new();
        for line in lines {
            let mut parser = Parser::new(grammar.clone());
            let root = parser.add_tokens(ast, line)?;
            if let Some(name) = parser.assignment.as_ref()
                && !assigned.insert(name.clone())
            {
                return Err(ParseError::DuplicateAssignment(name.clone()));
            }
            if let Some(root) = root {
                body.push(root);
            }
        }
        Ok(body)
    }

    /// Advances the machine by one token.
    ///
    /// Returns the mapped stop state when the token hit this parser's
    /// stop map, which tells the owning parser to finish this
    /// subexpression; `None` means tokens can continue.
    pub fn add_token(
        &mut self,
        ast: &mut Ast,
        token: &Token,
    ) -> Result<Option<State>, ParseError> {
        if self.state == State::Complete {
            return Err(ParseError::Completed);
        }
        let start_expr = self.expr_str.clone();
        if !self.expr_str.is_empty() {
            self.expr_str.push(' ');
        }
        self.expr_str.push_str(&token.raw);

        match *states::def(self.state) {
            states::StateDef::Sub { start, ends, .. } => {
                if self.sub.is_none() {
                    let stops = match ends {
                        Some(ends) => ends.to_vec(),
                        None => {
                            // No stop tokens of its own: the subexpression
                            // ends wherever this parser's own stop map says
                            self.parent_stop = true;
                            self.stop_map.clone()
                        }
                    };
                    let mut sub = Parser::with_state(self.grammar.clone(), start_expr, stops, start);
                    sub.assignment = self.assignment.clone();
                    self.sub = Some(Box::new(sub));
                }
                let stop = match self.sub.as_mut() {
                    Some(sub) => sub.add_token(ast, token)?,
                    None => None,
                };
                if let Some(stop_state) = stop {
                    self.end_sub(ast)?;
                    if self.parent_stop {
                        return Ok(Some(stop_state));
                    }
                    self.state = stop_state;
                }
                Ok(None)
            }
            states::StateDef::Tokens { accepts, .. } => {
                if let Some(opts) = accepts
                    .iter()
                    .find(|(kind, _)| *kind == token.kind)
                    .map(|(_, opts)| *opts)
                {
                    self.started = true;
                    if let Some(handler) = opts.handler {
                        handler(self, ast, token)?;
                    }
                    if let Some(to) = opts.to {
                        self.state = to;
                    }
                    Ok(None)
                } else if let Some((_, stop)) =
                    self.stop_map.iter().find(|(kind, _)| *kind == token.kind)
                {
                    Ok(Some(*stop))
                } else {
                    Err(ParseError::UnexpectedToken {
                        raw: token.raw.clone(),
                        kind: token.kind.name(),
                        expr: self.expr_str.clone(),
                    })
                }
            }
        }
    }

    /// Feeds a whole token line and completes.
    pub fn add_tokens(
        &mut self,
        ast: &mut Ast,
        tokens: &[Token],
    ) -> Result<Option<NodeId>, ParseError> {
        for token in tokens {
            self.add_token(ast, token)?;
        }
        self.complete(ast)
    }

    /// Finalizes the parse and returns the tree root, or `None` when no
    /// tokens were seen.
    pub fn complete(&mut self, ast: &mut Ast) -> Result<Option<NodeId>, ParseError> {
        if !self.started {
            self.state = State::Complete;
            return Ok(None);
        }
        if !states::completable(self.state) {
            return Err(ParseError::UnexpectedEnd(self.expr_str.clone()));
        }
        if self.sub.is_some() {
            self.end_sub(ast)?;
        }
        self.state = State::Complete;
        if let Some((name, params)) = self.transform.take() {
            let body = self
                .tree
                .take()
                .ok_or_else(|| ParseError::UnexpectedEnd(self.expr_str.clone()))?;
            let node = ast.push(Node::TransformAssignment { name, params, body });
            ast.set_parent(body, Some(node));
            self.tree = Some(node);
        }
        Ok(self.tree)
    }

    /// Whether the parsed expression referenced the per-element context.
    pub fn is_relative(&self) -> bool {
        self.relative
    }

    fn end_sub(&mut self, ast: &mut Ast) -> Result<(), ParseError> {
        let Some(mut sub) = self.sub.take() else {
            return Ok(());
        };
        let sub_tree = sub.complete(ast)?;
        self.sub_relative = sub.relative;
        self.relative = self.relative || sub.relative;
        if let states::StateDef::Sub { handler, .. } = *states::def(self.state) {
            handler(self, ast, sub_tree)?;
        }
        Ok(())
    }

    pub(crate) fn cursor_id(&self) -> Result<NodeId, ParseError> {
        self.cursor.ok_or_else(|| {
            ParseError::Malformed(format!("missing operand in expression: {}", self.expr_str))
        })
    }

    /// Places a node at the cursor (into the cursor's open right slot, or as
    /// the tree root) and advances the cursor to it.
    pub(crate) fn place_at_cursor(&mut self, ast: &mut Ast, node: NodeId) -> Result<(), ParseError> {
        match self.cursor {
            None => {
                self.tree = Some(node);
                ast.set_parent(node, None);
            }
            Some(cursor) => {
                if !set_right(ast, cursor, node) {
                    return Err(ParseError::Malformed(format!(
                        "misplaced operand in expression: {}",
                        self.expr_str
                    )));
                }
                ast.set_parent(node, Some(cursor));
            }
        }
        self.cursor = Some(node);
        Ok(())
    }

    /// Places a node where the cursor currently sits. The node must already
    /// hold the cursor's subtree as a child.
    pub(crate) fn place_before_cursor(
        &mut self,
        ast: &mut Ast,
        node: NodeId,
    ) -> Result<(), ParseError> {
        let cursor = self.cursor_id()?;
        let parent = ast.parent(cursor);
        ast.set_parent(cursor, Some(node));
        self.cursor = parent;
        self.place_at_cursor(ast, node)
    }
}

/// Writes `child` into the open right slot of `parent`. Returns false when
/// the parent variant has no such slot.
pub(crate) fn set_right(ast: &mut Ast, parent: NodeId, child: NodeId) -> bool {
    match ast.node_mut(parent) {
        Node::BinaryExpression { right, .. }
        | Node::UnaryExpression { right, .. }
        | Node::VariableDeclaration { right, .. }
        | Node::TypeDeclaration { right, .. }
        | Node::UnionExpression { right, .. } => {
            *right = Some(child);
            true
        }
        _ => false,
    }
}
