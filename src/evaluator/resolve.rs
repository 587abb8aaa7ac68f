//! Resolution of lazy values into plain ones.

use std::collections::HashMap;

use futures::FutureExt;
use futures::future::LocalBoxFuture;

use crate::error::EvalError;
use crate::flow::{Flow, Shape};
use crate::value::Value;

/// Recursively resolves flows, arrays, and objects into plain values. This
/// is the boundary between the lazy streaming world and ordinary values; a
/// flow that has not ended suspends resolution until it does.
pub fn materialize(value: Value) -> LocalBoxFuture<'static, Result<Value, EvalError>> {
    async move {
        match value {
            Value::Flow(flow) => materialize_flow(flow).await,
            Value::Array(items) => {
                let mut resolved = Vec::with_capacity(items.len());
                for item in items {
                    resolved.push(materialize(item).await?);
                }
                Ok(Value::Array(resolved))
            }
            Value::Object(map) => {
                let mut resolved = HashMap::with_capacity(map.len());
                for (key, item) in map {
                    resolved.insert(key, materialize(item).await?);
                }
                Ok(Value::Object(resolved))
            }
            other => Ok(other),
        }
    }
    .boxed_local()
}

async fn materialize_flow(flow: Flow) -> Result<Value, EvalError> {
    let mut listener = flow.listen()?;
    match flow.shape() {
        Shape::Array => {
            let mut items = Vec::new();
            while let Some((_key, value)) = listener.next().await? {
                items.push(materialize(value).await?);
            }
            Ok(Value::Array(items))
        }
        Shape::Object => {
            let mut map = HashMap::new();
            while let Some((key, value)) = listener.next().await? {
                map.insert(key.as_string(), materialize(value).await?);
            }
            Ok(Value::Object(map))
        }
    }
}
