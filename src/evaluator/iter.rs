//! The collect/find/reduce sub-processors.
//!
//! Each one wraps its subject in a flow (arrays and objects become ended
//! flows, an existing flow streams through) and runs the element
//! subexpression on a child evaluator with `@`, `#`, and `~` bound. Reduce
//! additionally threads `$`, relying on the flow's strictly sequential
//! per-listener delivery so each step reads the accumulator its predecessor
//! left.

use futures::FutureExt;

use crate::ast::nodes::NodeId;
use crate::error::EvalError;
use crate::flow::Flow;
use crate::value::{Value, type_name};

use super::Evaluator;

fn source(subject: Value) -> Result<Flow, EvalError> {
    match subject {
        Value::Flow(_) | Value::Array(_) | Value::Object(_) => Flow::from_value(subject),
        other => Err(EvalError::NotIterable(type_name(&other).to_string())),
    }
}

/// Maps every element through the subexpression, dropping elements whose
/// result is the omit sentinel. The output is a flow with the subject's
/// shape, so an object subject collects back into an object.
pub(crate) fn collect(
    evaluator: &Evaluator,
    subject: Value,
    expr: NodeId,
) -> Result<Value, EvalError> {
    let flow = source(subject)?;
    let mapper = evaluator.clone();
    let mapped = flow.map(move |value, key| {
        let child = mapper.with_iteration(value, key, None);
        async move { child.eval_lazy(expr).await }.boxed_local()
    });
    let filtered = mapped.filter(|value, _key| {
        let keep = !matches!(value, Value::Omit);
        async move { Ok(keep) }.boxed_local()
    });
    Ok(Value::Flow(filtered))
}

/// Resolves with the first element whose mapped result is truthy and not
/// omitted, or `Undefined` when the subject runs out.
pub(crate) async fn find(
    evaluator: &Evaluator,
    subject: Value,
    expr: NodeId,
) -> Result<Value, EvalError> {
    let flow = source(subject)?;
    let mapper = evaluator.clone();
    let mapped = flow.map(move |value, key| {
        let child = mapper.with_iteration(value, key, None);
        async move { child.eval_lazy(expr).await }.boxed_local()
    });
    mapped
        .find(|value, _key| {
            let hit = !matches!(value, Value::Omit) && value.as_bool();
            async move { Ok(hit) }.boxed_local()
        })
        .await
}

/// Left-folds the elements with `$` bound to the running accumulator,
/// seeded from the accumulator subexpression. An omitted step leaves the
/// accumulator unchanged.
pub(crate) async fn reduce(
    evaluator: &Evaluator,
    subject: Value,
    expr: NodeId,
    accumulator: NodeId,
) -> Result<Value, EvalError> {
    let flow = source(subject)?;
    let initial = evaluator.eval_lazy(accumulator).await?;
    let stepper = evaluator.clone();
    flow.reduce(
        move |acc, value, key| {
            let child = stepper.with_iteration(value, key, Some(acc.clone()));
            async move {
                let result = child.eval_lazy(expr).await?;
                Ok(if matches!(result, Value::Omit) {
                    acc
                } else {
                    result
                })
            }
            .boxed_local()
        },
        initial,
    )
    .await
}
