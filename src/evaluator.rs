//! Asynchronous tree-walking evaluator.
//!
//! Evaluation of every node returns a future. Operands with no ordering
//! requirement (the two sides of a binary operator, the elements of a
//! literal) are awaited jointly; constructs with mandatory ordering (the
//! lines of a program, the branches of a conditional, reduce steps) are
//! awaited strictly in sequence. Ternaries short-circuit: the untaken
//! branch is never evaluated.
//!
//! The evaluator is a cheap-clone bundle of shared references. Sub-parts of
//! an evaluation (iteration elements, filter predicates, transform bodies)
//! run on clones with adjusted contexts; the caller-supplied context is
//! never mutated.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{LocalBoxFuture, try_join_all};

use crate::ast::nodes::{Ast, Node, NodeId};
use crate::error::EvalError;
use crate::flow::Flow;
use crate::grammar::Grammar;
use crate::value::Value;

pub mod iter;
pub mod resolve;

/// Variable bindings an expression evaluates against.
pub type Context = HashMap<String, Value>;

/// A host-registered transform implementation.
pub type TransformFn = Rc<dyn Fn(&Value, &[Value]) -> Result<Value, EvalError>>;

/// Name to host transform mapping.
pub type Transforms = HashMap<String, TransformFn>;

/// An expression-defined transform (`name(params) |= body`).
#[derive(Debug, Clone)]
struct LocalTransform {
    params: Vec<String>,
    body: NodeId,
}

#[derive(Clone)]
pub struct Evaluator {
    ast: Rc<Ast>,
    grammar: Rc<Grammar>,
    transforms: Rc<Transforms>,
    /// Transforms defined by the expression itself, visible for the rest of
    /// the evaluation
    locals: Rc<RefCell<HashMap<String, LocalTransform>>>,
    context: Rc<Context>,
    /// Per-element subject for relative identifiers inside filters
    relative: Option<Rc<Value>>,
}

impl Evaluator {
    pub fn new(
        ast: Rc<Ast>,
        grammar: Rc<Grammar>,
        transforms: Rc<Transforms>,
        context: Context,
    ) -> Evaluator {
        Evaluator {
            ast,
            grammar,
            transforms,
            locals: Rc::new(RefCell::new(HashMap::new())),
            context: Rc::new(context),
            relative: None,
        }
    }

    /// Fully evaluates a node; the result has every nested flow resolved.
    pub fn eval(&self, node: NodeId) -> LocalBoxFuture<'static, Result<Value, EvalError>> {
        let this = self.clone();
        async move {
            let value = this.visit(node).await?;
            resolve::materialize(value).await
        }
        .boxed_local()
    }

    /// Evaluates a node but leaves flows unresolved, so downstream consumers
    /// can keep streaming.
    pub fn eval_lazy(&self, node: NodeId) -> LocalBoxFuture<'static, Result<Value, EvalError>> {
        let this = self.clone();
        async move { this.visit(node).await }.boxed_local()
    }

    async fn visit(&self, id: NodeId) -> Result<Value, EvalError> {
        match self.ast.node(id).clone() {
            Node::Program { body } => self.visit_program(&body).await,
            Node::Literal { value } => Ok(value),
            Node::Identifier {
                name,
                from,
                relative,
            } => self.visit_identifier(&name, from, relative).await,
            Node::TypeIdentifier { name } => Ok(self.lookup(&name)),
            Node::BinaryExpression {
                operator,
                left,
                right,
            } => {
                let right = right.ok_or(EvalError::IncompleteTree)?;
                let apply = self
                    .grammar
                    .binary(&operator)
                    .ok_or_else(|| EvalError::UnknownOperator(operator.clone()))?;
                let (lhs, rhs) = futures::try_join!(self.eval(left), self.eval(right))?;
                apply(&lhs, &rhs)
            }
            Node::UnaryExpression { operator, right } => {
                let right = right.ok_or(EvalError::IncompleteTree)?;
                let apply = self
                    .grammar
                    .unary(&operator)
                    .ok_or_else(|| EvalError::UnknownOperator(operator.clone()))?;
                let value = self.eval(right).await?;
                apply(&value)
            }
            Node::ConditionalExpression {
                test,
                consequent,
                alternate,
            } => {
                let test = self.eval(test).await?;
                if test.as_bool() {
                    self.eval_lazy(consequent.ok_or(EvalError::IncompleteTree)?)
                        .await
                } else {
                    self.eval_lazy(alternate.ok_or(EvalError::IncompleteTree)?)
                        .await
                }
            }
            Node::ArrayLiteral { elements } => {
                let values = try_join_all(elements.iter().map(|&e| self.eval_lazy(e))).await?;
                Ok(Value::Array(values))
            }
            Node::ObjectLiteral { entries } => {
                let values = try_join_all(entries.iter().map(|(_, v)| self.eval_lazy(*v))).await?;
                let map = entries.iter().map(|(k, _)| k.clone()).zip(values).collect();
                Ok(Value::Object(map))
            }
            Node::CallExpression { function, argument } => {
                self.visit_call(function, argument).await
            }
            Node::Transform {
                name,
                subject,
                args,
            } => {
                let subject = self.eval_lazy(subject).await?;
                let args = try_join_all(args.iter().map(|&a| self.eval_lazy(a))).await?;
                self.apply_transform(&name, subject, args).await
            }
            Node::TransformAssignment { name, params, body } => {
                self.locals
                    .borrow_mut()
                    .insert(name, LocalTransform { params, body });
                Ok(Value::Undefined)
            }
            Node::FilterExpression {
                subject,
                expr,
                relative,
            } => self.visit_filter(subject, expr, relative).await,
            Node::Collect { subject, expr } => {
                let subject = self.eval_lazy(subject).await?;
                iter::collect(self, subject, expr)
            }
            Node::Find { subject, expr } => {
                let subject = self.eval_lazy(subject).await?;
                iter::find(self, subject, expr).await
            }
            Node::Reduce {
                subject,
                expr,
                accumulator,
            } => {
                let subject = self.eval_lazy(subject).await?;
                iter::reduce(self, subject, expr, accumulator).await
            }
            // A declaration outside a program position yields its value;
            // binding is handled line by line in visit_program
            Node::VariableDeclaration { right, .. } | Node::TypeDeclaration { right, .. } => {
                self.eval_lazy(right.ok_or(EvalError::IncompleteTree)?).await
            }
            Node::UnionExpression { left, right } => {
                let value = self.eval_lazy(left).await?;
                if !matches!(value, Value::Undefined) {
                    return Ok(value);
                }
                match right {
                    Some(right) => self.eval_lazy(right).await,
                    None => Ok(Value::Undefined),
                }
            }
        }
    }

    async fn visit_program(&self, body: &[NodeId]) -> Result<Value, EvalError> {
        let mut current = self.clone();
        let mut last = Value::Undefined;
        for &line in body {
            match current.ast.node(line).clone() {
                Node::VariableDeclaration { name, right }
                | Node::TypeDeclaration { name, right } => {
                    let right = right.ok_or(EvalError::IncompleteTree)?;
                    let value = current.eval_lazy(right).await?;
                    last = value.clone();
                    current = current.bind(&name, value);
                }
                Node::TransformAssignment { name, params, body } => {
                    current
                        .locals
                        .borrow_mut()
                        .insert(name, LocalTransform { params, body });
                    last = Value::Undefined;
                }
                _ => last = current.eval_lazy(line).await?,
            }
        }
        Ok(last)
    }

    async fn visit_identifier(
        &self,
        name: &str,
        from: Option<NodeId>,
        relative: bool,
    ) -> Result<Value, EvalError> {
        if let Some(from) = from {
            let base = self.eval_lazy(from).await?;
            let base = resolve::materialize(base).await?;
            return Ok(property_of(&base, name));
        }
        if relative {
            let subject = match &self.relative {
                Some(value) => (**value).clone(),
                None => Value::Undefined,
            };
            let subject = resolve::materialize(subject).await?;
            return Ok(property_of(&subject, name));
        }
        Ok(self.lookup(name))
    }

    async fn visit_call(
        &self,
        function: NodeId,
        argument: Option<NodeId>,
    ) -> Result<Value, EvalError> {
        let mut arg_nodes = vec![argument.ok_or(EvalError::IncompleteTree)?];
        let mut callee = function;
        let name = loop {
            match self.ast.node(callee) {
                Node::CallExpression { function, argument } => {
                    arg_nodes.push(argument.ok_or(EvalError::IncompleteTree)?);
                    callee = *function;
                }
                Node::Identifier {
                    name,
                    from: None,
                    relative: false,
                } => break name.clone(),
                _ => {
                    return Err(EvalError::TypeError(
                        "only a named transform may be applied to arguments".to_string(),
                    ));
                }
            }
        };
        arg_nodes.reverse();
        let values = try_join_all(arg_nodes.iter().map(|&a| self.eval_lazy(a))).await?;
        let mut values = values.into_iter();
        let subject = values.next().unwrap_or(Value::Undefined);
        let rest: Vec<Value> = values.collect();
        self.apply_transform(&name, subject, rest).await
    }

    /// Applies a transform by name: expression-defined transforms first,
    /// then the engine registry. Registry functions are host code working on
    /// plain values, so their inputs are resolved.
    async fn apply_transform(
        &self,
        name: &str,
        subject: Value,
        args: Vec<Value>,
    ) -> Result<Value, EvalError> {
        let local = self.locals.borrow().get(name).cloned();
        if let Some(local) = local {
            let mut context = (*self.context).clone();
            let mut inputs = std::iter::once(subject).chain(args);
            for param in &local.params {
                context.insert(param.clone(), inputs.next().unwrap_or(Value::Undefined));
            }
            let mut child = self.clone();
            child.context = Rc::new(context);
            return child.eval_lazy(local.body).await;
        }
        if let Some(apply) = self.transforms.get(name) {
            let subject = resolve::materialize(subject).await?;
            let mut resolved = Vec::with_capacity(args.len());
            for arg in args {
                resolved.push(resolve::materialize(arg).await?);
            }
            return apply(&subject, &resolved);
        }
        Err(EvalError::UnknownTransform(name.to_string()))
    }

    async fn visit_filter(
        &self,
        subject: NodeId,
        expr: NodeId,
        relative: bool,
    ) -> Result<Value, EvalError> {
        let subject = self.eval_lazy(subject).await?;
        if relative {
            let subject = match subject {
                Value::Undefined | Value::Null => return Ok(Value::Undefined),
                Value::Flow(_) | Value::Array(_) => subject,
                other => Value::Array(vec![other]),
            };
            let flow = Flow::from_value(subject)?;
            let filterer = self.clone();
            let filtered = flow.filter(move |value, _key| {
                let child = filterer.with_relative(value);
                async move {
                    let result = child.eval(expr).await?;
                    Ok(result.as_bool())
                }
                .boxed_local()
            });
            return Ok(Value::Flow(filtered));
        }
        let filter_value = self.eval(expr).await?;
        let subject = resolve::materialize(subject).await?;
        Ok(apply_static_filter(subject, filter_value))
    }

    fn lookup(&self, name: &str) -> Value {
        self.context.get(name).cloned().unwrap_or(Value::Undefined)
    }

    fn bind(&self, name: &str, value: Value) -> Evaluator {
        let mut context = (*self.context).clone();
        context.insert(name.to_string(), value);
        let mut child = self.clone();
        child.context = Rc::new(context);
        child
    }

    /// Child evaluator carrying the iteration bindings: `@` the value, `#`
    /// the key, `~` the omit sentinel, and optionally `$` the accumulator.
    pub(crate) fn with_iteration(
        &self,
        value: Value,
        key: Value,
        accumulator: Option<Value>,
    ) -> Evaluator {
        let mut context = (*self.context).clone();
        context.insert("@".to_string(), value);
        context.insert("#".to_string(), key);
        context.insert("~".to_string(), Value::Omit);
        if let Some(acc) = accumulator {
            context.insert("$".to_string(), acc);
        }
        let mut child = self.clone();
        child.context = Rc::new(context);
        child
    }

    /// Child evaluator whose relative identifiers resolve against `value`.
    pub(crate) fn with_relative(&self, value: Value) -> Evaluator {
        let mut child = self.clone();
        child.relative = Some(Rc::new(value));
        child
    }
}

/// Property lookup with permissive semantics: anything missing yields
/// `Undefined`, and arrays traverse through their first element.
fn property_of(base: &Value, name: &str) -> Value {
    match base {
        Value::Object(map) => map.get(name).cloned().unwrap_or(Value::Undefined),
        Value::Array(items) => items
            .first()
            .map(|v| property_of(v, name))
            .unwrap_or(Value::Undefined),
        _ => Value::Undefined,
    }
}

/// A filter whose expression never referenced the per-element context is
/// evaluated once: a number indexes an array subject, a string keys an
/// object subject, and anything else gates the whole subject by truthiness.
fn apply_static_filter(subject: Value, filter: Value) -> Value {
    match filter {
        Value::Integer(index) => match subject {
            Value::Array(items) => {
                if index >= 0 {
                    items
                        .into_iter()
                        .nth(index as usize)
                        .unwrap_or(Value::Undefined)
                } else {
                    Value::Undefined
                }
            }
            _ => Value::Undefined,
        },
        Value::String(key) => match subject {
            Value::Object(mut map) => map.remove(&key).unwrap_or(Value::Undefined),
            _ => Value::Undefined,
        },
        other => {
            if other.as_bool() {
                subject
            } else {
                Value::Undefined
            }
        }
    }
}
