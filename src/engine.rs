//! Engine instances and the public evaluation entry points.
//!
//! An [`Engine`] owns a grammar and a transform registry. Operator and
//! transform registration mutate the instance immediately; compiled
//! expressions snapshot both, so registrations apply to subsequent
//! compiles. Mutating an engine while expressions compiled from it are
//! still evaluating is unsupported.

use std::collections::HashMap;
use std::rc::Rc;

use futures::FutureExt;
use futures::executor::block_on;

use crate::ast::nodes::{Ast, Node, NodeId};
use crate::error::{Error, EvalError};
use crate::evaluator::{Context, Evaluator, TransformFn, Transforms, resolve};
use crate::flow::Flow;
use crate::grammar::Grammar;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::value::Value;

pub struct Engine {
    grammar: Grammar,
    transforms: Transforms,
}

impl Engine {
    pub fn new() -> Self {
        Engine {
            grammar: Grammar::new(),
            transforms: HashMap::new(),
        }
    }

    /// Registers a binary operator for subsequent compiles.
    pub fn add_binary_op<F>(&mut self, symbol: &str, precedence: u64, apply: F)
    where
        F: Fn(&Value, &Value) -> Result<Value, EvalError> + 'static,
    {
        self.grammar.add_binary_op(symbol, precedence, Rc::new(apply));
    }

    /// Registers a unary operator for subsequent compiles.
    pub fn add_unary_op<F>(&mut self, symbol: &str, apply: F)
    where
        F: Fn(&Value) -> Result<Value, EvalError> + 'static,
    {
        self.grammar.add_unary_op(symbol, Rc::new(apply));
    }

    /// Removes a registered operator; later expressions using it fail.
    pub fn remove_op(&mut self, symbol: &str) {
        self.grammar.remove_op(symbol);
    }

    /// Registers a named transform.
    pub fn add_transform<F>(&mut self, name: &str, apply: F)
    where
        F: Fn(&Value, &[Value]) -> Result<Value, EvalError> + 'static,
    {
        self.transforms.insert(name.to_string(), Rc::new(apply));
    }

    pub fn get_transform(&self, name: &str) -> Option<TransformFn> {
        self.transforms.get(name).cloned()
    }

    /// Compiles an expression into a reusable form. Lex and parse errors
    /// surface here, synchronously.
    pub fn compile(&self, expression: &str) -> Result<Expression, Error> {
        let grammar = Rc::new(self.grammar.clone());
        let lexer = Lexer::new(grammar.clone());
        let lines = lexer.tokenize(expression)?;
        let mut ast = Ast::new();
        let body = Parser::complete_lines(&grammar, &mut ast, &lines)?;
        let program = ast.push(Node::Program { body });
        Ok(Expression {
            ast: Rc::new(ast),
            program,
            grammar,
            transforms: Rc::new(self.transforms.clone()),
        })
    }

    /// Evaluates an expression against an empty context.
    pub fn eval(&self, expression: &str) -> Result<Value, Error> {
        self.eval_in(expression, &Value::Object(HashMap::new()))
    }

    /// Evaluates an expression against a context. An array or flow of
    /// contexts re-runs the expression once per element.
    pub fn eval_in(&self, expression: &str, context: &Value) -> Result<Value, Error> {
        let compiled = self.compile(expression)?;
        Ok(block_on(compiled.eval_async(context))?)
    }

    /// Callback-style variant of [`Engine::eval_in`].
    pub fn eval_with_callback<F>(&self, expression: &str, context: &Value, callback: F)
    where
        F: FnOnce(Result<Value, Error>),
    {
        callback(self.eval_in(expression, context));
    }

    /// Non-blocking variant of [`Engine::eval_in`] for embedding in an
    /// existing executor.
    pub async fn eval_async(&self, expression: &str, context: &Value) -> Result<Value, Error> {
        let compiled = self.compile(expression)?;
        Ok(compiled.eval_async(context).await?)
    }

    /// Evaluates an expression over a source of contexts, producing a flow
    /// with one result per context, in order.
    pub fn stream(&self, expression: &str, source: &Value) -> Result<Flow, Error> {
        let compiled = self.compile(expression)?;
        let input = Flow::from_value(source.clone()).map_err(Error::Eval)?;
        Ok(compiled.stream(input))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

/// A compiled expression, reusable across contexts. Holds a snapshot of the
/// engine's grammar and transform registry as of compilation.
#[derive(Clone)]
pub struct Expression {
    ast: Rc<Ast>,
    program: NodeId,
    grammar: Rc<Grammar>,
    transforms: Rc<Transforms>,
}

impl Expression {
    /// Blocking evaluation against one context.
    pub fn eval(&self, context: &Value) -> Result<Value, EvalError> {
        block_on(self.eval_async(context))
    }

    /// Evaluates against a context; arrays and flows of contexts fan out
    /// into one result per element. The result is fully resolved.
    pub async fn eval_async(&self, context: &Value) -> Result<Value, EvalError> {
        let value = match context {
            Value::Array(items) => {
                let mut results = Vec::with_capacity(items.len());
                for item in items {
                    results.push(self.eval_one(item.clone()).await?);
                }
                Value::Array(results)
            }
            Value::Flow(flow) => Value::Flow(self.stream(flow.clone())),
            other => self.eval_one(other.clone()).await?,
        };
        resolve::materialize(value).await
    }

    /// Runs the expression once per value of `source`, delivering the
    /// results as a flow. Each result is resolved before delivery.
    pub fn stream(&self, source: Flow) -> Flow {
        let this = self.clone();
        source.map(move |context, _key| {
            let this = this.clone();
            async move { this.eval_one(context).await }.boxed_local()
        })
    }

    async fn eval_one(&self, context: Value) -> Result<Value, EvalError> {
        let bindings: Context = match context {
            Value::Object(map) => map,
            _ => HashMap::new(),
        };
        let evaluator = Evaluator::new(
            self.ast.clone(),
            self.grammar.clone(),
            self.transforms.clone(),
            bindings,
        );
        evaluator.eval(self.program).await
    }
}
