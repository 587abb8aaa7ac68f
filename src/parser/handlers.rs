//! Tree-building steps invoked by the state table.

use crate::ast::nodes::{Ast, Node, NodeId};
use crate::ast::tokens::{Token, TokenKind};
use crate::error::ParseError;
use crate::parser::{IdentMode, Parser, set_right};
use crate::value::Value;

/// Handles literal tokens by adding them as a new node at the cursor.
pub(crate) fn literal(parser: &mut Parser, ast: &mut Ast, token: &Token) -> Result<(), ParseError> {
    let node = ast.push(Node::Literal {
        value: token.value.clone(),
    });
    parser.place_at_cursor(ast, node)
}

/// Handles identifier tokens. Depending on the pending mode the identifier
/// becomes a plain lookup, a relative lookup (after a leading dot), or a
/// traversal chained off the cursor (after a trailing dot).
pub(crate) fn identifier(
    parser: &mut Parser,
    ast: &mut Ast,
    token: &Token,
) -> Result<(), ParseError> {
    let symbol = token.symbol().to_string();
    if parser.assignment.as_deref() == Some(symbol.as_str()) {
        return Err(ParseError::SelfReference(symbol));
    }
    match parser.next_ident {
        IdentMode::Encapsulate => {
            parser.next_ident = IdentMode::Plain;
            let cursor = parser.cursor_id()?;
            let node = ast.push(Node::Identifier {
                name: symbol,
                from: Some(cursor),
                relative: false,
            });
            parser.place_before_cursor(ast, node)
        }
        IdentMode::Relative => {
            parser.next_ident = IdentMode::Plain;
            let node = ast.push(Node::Identifier {
                name: symbol,
                from: None,
                relative: true,
            });
            parser.place_at_cursor(ast, node)
        }
        IdentMode::Plain => {
            let node = make_identifier(ast, &symbol);
            parser.place_at_cursor(ast, node)
        }
    }
}

/// Builds an identifier node; a sigil-fused name like `@bar` becomes `bar`
/// looked up on the `@` binding.
fn make_identifier(ast: &mut Ast, symbol: &str) -> NodeId {
    let mut chars = symbol.chars();
    let first = chars.next();
    let rest: String = chars.collect();
    if matches!(first, Some('@') | Some('#') | Some('$') | Some('~')) && !rest.is_empty() {
        let sigil = first.map(String::from).unwrap_or_default();
        let base = ast.push(Node::Identifier {
            name: sigil,
            from: None,
            relative: false,
        });
        let node = ast.push(Node::Identifier {
            name: rest,
            from: Some(base),
            relative: false,
        });
        ast.set_parent(base, Some(node));
        node
    } else {
        ast.push(Node::Identifier {
            name: symbol.to_string(),
            from: None,
            relative: false,
        })
    }
}

pub(crate) fn type_identifier(
    parser: &mut Parser,
    ast: &mut Ast,
    token: &Token,
) -> Result<(), ParseError> {
    let node = ast.push(Node::TypeIdentifier {
        name: token.symbol().to_string(),
    });
    parser.place_at_cursor(ast, node)
}

/// Handles binary operator tokens. Climbs the parent chain from the cursor
/// while the parent operator binds at least as tightly, then inserts the new
/// node there with the walked-past subtree as its left side.
pub(crate) fn binary_op(
    parser: &mut Parser,
    ast: &mut Ast,
    token: &Token,
) -> Result<(), ParseError> {
    let symbol = token.symbol().to_string();
    let precedence = parser.grammar.precedence(&symbol);
    let mut cursor = parser.cursor_id()?;
    let mut parent = ast.parent(cursor);
    while let Some(p) = parent {
        let climbs = match ast.node(p) {
            Node::BinaryExpression { operator, .. } | Node::UnaryExpression { operator, .. } => {
                parser.grammar.precedence(operator) >= precedence
            }
            _ => false,
        };
        if !climbs {
            break;
        }
        cursor = p;
        parent = ast.parent(p);
    }
    let node = ast.push(Node::BinaryExpression {
        operator: symbol,
        left: cursor,
        right: None,
    });
    ast.set_parent(cursor, Some(node));
    parser.cursor = parent;
    parser.place_at_cursor(ast, node)
}

/// Handles unary operator tokens; the operand arrives into the right slot.
pub(crate) fn unary_op(
    parser: &mut Parser,
    ast: &mut Ast,
    token: &Token,
) -> Result<(), ParseError> {
    let node = ast.push(Node::UnaryExpression {
        operator: token.symbol().to_string(),
        right: None,
    });
    parser.place_at_cursor(ast, node)
}

/// Handles an operand juxtaposed to an identifier or call: wraps the cursor
/// as the callee of a new curried call, preserving left-associativity.
pub(crate) fn call_operand(
    parser: &mut Parser,
    ast: &mut Ast,
    token: &Token,
) -> Result<(), ParseError> {
    let argument = if token.kind == TokenKind::Identifier {
        make_identifier(ast, token.symbol())
    } else {
        ast.push(Node::Literal {
            value: token.value.clone(),
        })
    };
    let cursor = parser.cursor_id()?;
    let node = ast.push(Node::CallExpression {
        function: cursor,
        argument: Some(argument),
    });
    ast.set_parent(argument, Some(node));
    parser.place_before_cursor(ast, node)
}

/// A leading dot marks the next identifier (and the whole expression) as
/// relative to the per-element context.
pub(crate) fn dot_relative(
    parser: &mut Parser,
    _ast: &mut Ast,
    _token: &Token,
) -> Result<(), ParseError> {
    parser.relative = true;
    parser.next_ident = IdentMode::Relative;
    Ok(())
}

/// A dot after an operand chains the next identifier off the cursor.
pub(crate) fn dot_traverse(
    parser: &mut Parser,
    _ast: &mut Ast,
    _token: &Token,
) -> Result<(), ParseError> {
    parser.next_ident = IdentMode::Encapsulate;
    Ok(())
}

/// Handles new object literals, initialized empty.
pub(crate) fn obj_start(
    parser: &mut Parser,
    ast: &mut Ast,
    _token: &Token,
) -> Result<(), ParseError> {
    let node = ast.push(Node::ObjectLiteral {
        entries: Vec::new(),
    });
    parser.place_at_cursor(ast, node)
}

/// Queues an object key to be written once its value subexpression completes.
pub(crate) fn obj_key(
    parser: &mut Parser,
    _ast: &mut Ast,
    token: &Token,
) -> Result<(), ParseError> {
    parser.cur_obj_key = Some(match &token.value {
        Value::String(s) => s.clone(),
        other => other.as_string(),
    });
    Ok(())
}

/// Writes a completed value subexpression under the queued object key.
pub(crate) fn obj_val(
    parser: &mut Parser,
    ast: &mut Ast,
    sub: Option<NodeId>,
) -> Result<(), ParseError> {
    let value = sub.ok_or_else(|| ParseError::UnexpectedEnd(parser.expr_str.clone()))?;
    let key = parser.cur_obj_key.take().ok_or_else(|| {
        ParseError::Malformed(format!("missing object key in expression: {}", parser.expr_str))
    })?;
    let cursor = parser.cursor_id()?;
    match ast.node_mut(cursor) {
        Node::ObjectLiteral { entries } => entries.push((key, value)),
        _ => {
            return Err(ParseError::Malformed(format!(
                "misplaced object value in expression: {}",
                parser.expr_str
            )));
        }
    }
    ast.set_parent(value, Some(cursor));
    Ok(())
}

/// Handles new array literals, initialized empty.
pub(crate) fn array_start(
    parser: &mut Parser,
    ast: &mut Ast,
    _token: &Token,
) -> Result<(), ParseError> {
    let node = ast.push(Node::ArrayLiteral {
        elements: Vec::new(),
    });
    parser.place_at_cursor(ast, node)
}

/// Appends a completed element subexpression to the array literal at the
/// cursor. An absent subexpression (an empty `[]`) appends nothing.
pub(crate) fn array_val(
    parser: &mut Parser,
    ast: &mut Ast,
    sub: Option<NodeId>,
) -> Result<(), ParseError> {
    let Some(value) = sub else {
        return Ok(());
    };
    let cursor = parser.cursor_id()?;
    match ast.node_mut(cursor) {
        Node::ArrayLiteral { elements } => elements.push(value),
        _ => {
            return Err(ParseError::Malformed(format!(
                "misplaced array element in expression: {}",
                parser.expr_str
            )));
        }
    }
    ast.set_parent(value, Some(cursor));
    Ok(())
}

/// Handles a parenthesized subexpression by placing its tree at the cursor.
pub(crate) fn sub_expression(
    parser: &mut Parser,
    ast: &mut Ast,
    sub: Option<NodeId>,
) -> Result<(), ParseError> {
    let value = sub.ok_or_else(|| ParseError::UnexpectedEnd(parser.expr_str.clone()))?;
    parser.place_at_cursor(ast, value)
}

/// `?` wraps the tree built so far as a conditional's test. Inside a
/// declaration only the right-hand side is wrapped.
pub(crate) fn ternary_start(
    parser: &mut Parser,
    ast: &mut Ast,
    _token: &Token,
) -> Result<(), ParseError> {
    let root = parser.tree.ok_or_else(|| {
        ParseError::Malformed(format!("missing operand in expression: {}", parser.expr_str))
    })?;
    let declaration_right = match ast.node(root) {
        Node::VariableDeclaration { right, .. } | Node::TypeDeclaration { right, .. } => {
            Some(right.ok_or_else(|| ParseError::UnexpectedEnd(parser.expr_str.clone()))?)
        }
        _ => None,
    };
    match declaration_right {
        Some(test) => {
            let node = ast.push(Node::ConditionalExpression {
                test,
                consequent: None,
                alternate: None,
            });
            ast.set_parent(test, Some(node));
            set_right(ast, root, node);
            ast.set_parent(node, Some(root));
            parser.cursor = Some(node);
        }
        None => {
            let node = ast.push(Node::ConditionalExpression {
                test: root,
                consequent: None,
                alternate: None,
            });
            ast.set_parent(root, Some(node));
            ast.set_parent(node, None);
            parser.tree = Some(node);
            parser.cursor = Some(node);
        }
    }
    Ok(())
}

pub(crate) fn ternary_mid(
    parser: &mut Parser,
    ast: &mut Ast,
    sub: Option<NodeId>,
) -> Result<(), ParseError> {
    let value = sub.ok_or_else(|| ParseError::UnexpectedEnd(parser.expr_str.clone()))?;
    let cursor = parser.cursor_id()?;
    match ast.node_mut(cursor) {
        Node::ConditionalExpression { consequent, .. } => *consequent = Some(value),
        _ => {
            return Err(ParseError::Malformed(format!(
                "misplaced ternary branch in expression: {}",
                parser.expr_str
            )));
        }
    }
    ast.set_parent(value, Some(cursor));
    Ok(())
}

pub(crate) fn ternary_end(
    parser: &mut Parser,
    ast: &mut Ast,
    sub: Option<NodeId>,
) -> Result<(), ParseError> {
    let value = sub.ok_or_else(|| ParseError::UnexpectedEnd(parser.expr_str.clone()))?;
    let cursor = parser.cursor_id()?;
    match ast.node_mut(cursor) {
        Node::ConditionalExpression { alternate, .. } => *alternate = Some(value),
        _ => {
            return Err(ParseError::Malformed(format!(
                "misplaced ternary branch in expression: {}",
                parser.expr_str
            )));
        }
    }
    ast.set_parent(value, Some(cursor));
    Ok(())
}

/// `| name` wraps the cursor as the subject of a transform application.
pub(crate) fn transform(
    parser: &mut Parser,
    ast: &mut Ast,
    token: &Token,
) -> Result<(), ParseError> {
    let cursor = parser.cursor_id()?;
    let node = ast.push(Node::Transform {
        name: token.symbol().to_string(),
        subject: cursor,
        args: Vec::new(),
    });
    parser.place_before_cursor(ast, node)
}

/// Appends a completed argument subexpression to the transform at the cursor.
pub(crate) fn arg_val(
    parser: &mut Parser,
    ast: &mut Ast,
    sub: Option<NodeId>,
) -> Result<(), ParseError> {
    let Some(value) = sub else {
        return Ok(());
    };
    let cursor = parser.cursor_id()?;
    match ast.node_mut(cursor) {
        Node::Transform { args, .. } => args.push(value),
        _ => {
            return Err(ParseError::Malformed(format!(
                "misplaced transform argument in expression: {}",
                parser.expr_str
            )));
        }
    }
    ast.set_parent(value, Some(cursor));
    Ok(())
}

/// `subject[expr]` wraps the cursor in a filter carrying the subexpression
/// and whether it referenced the per-element context.
pub(crate) fn filter(
    parser: &mut Parser,
    ast: &mut Ast,
    sub: Option<NodeId>,
) -> Result<(), ParseError> {
    let expr = sub.ok_or_else(|| ParseError::UnexpectedEnd(parser.expr_str.clone()))?;
    let relative = parser.sub_relative;
    let cursor = parser.cursor_id()?;
    let node = ast.push(Node::FilterExpression {
        subject: cursor,
        expr,
        relative,
    });
    ast.set_parent(expr, Some(node));
    parser.place_before_cursor(ast, node)
}

/// `subject <| expr` wraps the cursor in a collect. A following comma turns
/// it into a reduce.
pub(crate) fn iter(
    parser: &mut Parser,
    ast: &mut Ast,
    sub: Option<NodeId>,
) -> Result<(), ParseError> {
    let expr = sub.ok_or_else(|| ParseError::UnexpectedEnd(parser.expr_str.clone()))?;
    let cursor = parser.cursor_id()?;
    let node = ast.push(Node::Collect {
        subject: cursor,
        expr,
    });
    ast.set_parent(expr, Some(node));
    parser.place_before_cursor(ast, node)
}

/// `subject <|* expr` wraps the cursor in a find.
pub(crate) fn find(
    parser: &mut Parser,
    ast: &mut Ast,
    sub: Option<NodeId>,
) -> Result<(), ParseError> {
    let expr = sub.ok_or_else(|| ParseError::UnexpectedEnd(parser.expr_str.clone()))?;
    let cursor = parser.cursor_id()?;
    let node = ast.push(Node::Find {
        subject: cursor,
        expr,
    });
    ast.set_parent(expr, Some(node));
    parser.place_before_cursor(ast, node)
}

/// The accumulator subexpression after the comma rewrites the collect at the
/// cursor into a reduce.
pub(crate) fn reduce(
    parser: &mut Parser,
    ast: &mut Ast,
    sub: Option<NodeId>,
) -> Result<(), ParseError> {
    let accumulator = sub.ok_or_else(|| ParseError::UnexpectedEnd(parser.expr_str.clone()))?;
    let cursor = parser.cursor_id()?;
    let (subject, expr) = match ast.node(cursor) {
        Node::Collect { subject, expr } => (*subject, *expr),
        _ => {
            return Err(ParseError::Malformed(format!(
                "misplaced accumulator in expression: {}",
                parser.expr_str
            )));
        }
    };
    *ast.node_mut(cursor) = Node::Reduce {
        subject,
        expr,
        accumulator,
    };
    ast.set_parent(accumulator, Some(cursor));
    Ok(())
}

/// `name =` at the start of a line begins a variable declaration.
pub(crate) fn declaration_start(
    parser: &mut Parser,
    ast: &mut Ast,
    _token: &Token,
) -> Result<(), ParseError> {
    if parser.definition {
        return Err(ParseError::DuplicateDefinition);
    }
    if parser.relative {
        return Err(ParseError::RelativeDefinition);
    }
    let cursor = parser.cursor_id()?;
    let name = match ast.node(cursor) {
        Node::Identifier {
            name,
            from: None,
            relative: false,
        } => name.clone(),
        _ => {
            return Err(ParseError::Malformed(format!(
                "only a plain name may be assigned in expression: {}",
                parser.expr_str
            )));
        }
    };
    parser.definition = true;
    parser.assignment = Some(name.clone());
    let node = ast.push(Node::VariableDeclaration { name, right: None });
    ast.set_parent(node, None);
    parser.tree = Some(node);
    parser.cursor = Some(node);
    Ok(())
}

/// `Name =` at the start of a line begins a type declaration whose right
/// side is a union of alternatives.
pub(crate) fn type_declaration_start(
    parser: &mut Parser,
    ast: &mut Ast,
    _token: &Token,
) -> Result<(), ParseError> {
    if parser.definition {
        return Err(ParseError::DuplicateDefinition);
    }
    if parser.relative {
        return Err(ParseError::RelativeDefinition);
    }
    let cursor = parser.cursor_id()?;
    let name = match ast.node(cursor) {
        Node::TypeIdentifier { name } => name.clone(),
        _ => {
            return Err(ParseError::Malformed(format!(
                "only a plain type name may be declared in expression: {}",
                parser.expr_str
            )));
        }
    };
    parser.definition = true;
    parser.assignment = Some(name.clone());
    let node = ast.push(Node::TypeDeclaration { name, right: None });
    ast.set_parent(node, None);
    parser.tree = Some(node);
    parser.cursor = Some(node);
    Ok(())
}

/// `|` between union operands; chains to the right.
pub(crate) fn union(parser: &mut Parser, ast: &mut Ast, _token: &Token) -> Result<(), ParseError> {
    let cursor = parser.cursor_id()?;
    let parent = ast.parent(cursor);
    let node = ast.push(Node::UnionExpression {
        left: cursor,
        right: None,
    });
    ast.set_parent(cursor, Some(node));
    parser.cursor = parent;
    parser.place_at_cursor(ast, node)
}

/// `name(` at the start of a line begins a transform assignment; the tree is
/// reset so the body parses fresh, and the pending name/parameters are
/// wrapped around it on completion.
pub(crate) fn transform_assignment_start(
    parser: &mut Parser,
    ast: &mut Ast,
    _token: &Token,
) -> Result<(), ParseError> {
    if parser.definition {
        return Err(ParseError::DuplicateDefinition);
    }
    if parser.relative {
        return Err(ParseError::RelativeDefinition);
    }
    let cursor = parser.cursor_id()?;
    let name = match ast.node(cursor) {
        Node::Identifier {
            name,
            from: None,
            relative: false,
        } => name.clone(),
        _ => {
            return Err(ParseError::Malformed(format!(
                "only a plain name may define a transform in expression: {}",
                parser.expr_str
            )));
        }
    };
    parser.definition = true;
    parser.assignment = Some(name.clone());
    parser.transform = Some((name, Vec::new()));
    parser.tree = None;
    parser.cursor = None;
    Ok(())
}

/// Collects one parameter name of a transform assignment.
pub(crate) fn arg_name(
    parser: &mut Parser,
    ast: &mut Ast,
    sub: Option<NodeId>,
) -> Result<(), ParseError> {
    let Some(value) = sub else {
        return Ok(());
    };
    let name = match ast.node(value) {
        Node::Identifier {
            name,
            from: None,
            relative: false,
        } => name.clone(),
        _ => {
            return Err(ParseError::Malformed(format!(
                "transform parameters must be plain names in expression: {}",
                parser.expr_str
            )));
        }
    };
    match parser.transform.as_mut() {
        Some((_, params)) => {
            params.push(name);
            Ok(())
        }
        None => Err(ParseError::Malformed(format!(
            "parameter outside a transform assignment in expression: {}",
            parser.expr_str
        ))),
    }
}
