//! Method dispatch table.

use std::collections::HashMap;
use std::future::Future;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::error::BoxError;

/// Failure of a single call. Local to one request/response pair.
#[derive(Debug, Error)]
pub enum MethodError {
    #[error("rpc: can't find method {0}")]
    UnknownMethod(String),

    #[error("rpc: invalid params for {method}: {source}")]
    InvalidParams {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rpc: malformed request: {0}")]
    MalformedRequest(#[source] serde_json::Error),

    #[error("rpc: request line exceeds {0} bytes")]
    RequestTooLarge(usize),

    #[error("rpc: failed to encode result: {0}")]
    Encode(#[source] serde_json::Error),

    /// Error returned by the hosted capability.
    #[error("{0}")]
    Plugin(#[source] BoxError),
}

impl MethodError {
    pub fn plugin(err: impl Into<BoxError>) -> Self {
        MethodError::Plugin(err.into())
    }
}

type HandlerFuture = BoxFuture<'static, Result<Value, MethodError>>;
type Handler = Box<dyn Fn(Value) -> HandlerFuture + Send + Sync>;

/// Maps `"<Service>.<Method>"` names to typed handlers.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Handler>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler taking `P` and producing `R`.
    ///
    /// Registering the same name twice replaces the earlier handler.
    pub fn register<P, R, F, Fut>(&mut self, method: impl Into<String>, handler: F) -> &mut Self
    where
        P: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, MethodError>> + Send + 'static,
    {
        let method = method.into();
        let name = method.clone();

        let handler: Handler = Box::new(move |params: Value| -> HandlerFuture {
            match serde_json::from_value::<P>(params) {
                Ok(input) => {
                    let call = handler(input);
                    async move {
                        let output = call.await?;
                        serde_json::to_value(output).map_err(MethodError::Encode)
                    }
                    .boxed()
                }
                Err(source) => {
                    let method = name.clone();
                    async move { Err(MethodError::InvalidParams { method, source }) }.boxed()
                }
            }
        });

        if self.handlers.insert(method.clone(), handler).is_some() {
            tracing::warn!(method = %method, "Replaced existing handler");
        }
        self
    }

    pub fn contains(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Decode `params`, invoke the handler for `method` and encode its result.
    pub async fn dispatch(&self, method: &str, params: Value) -> Result<Value, MethodError> {
        let handler = self
            .handlers
            .get(method)
            .ok_or_else(|| MethodError::UnknownMethod(method.to_string()))?;
        handler(params).await
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").field("methods", &self.methods()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct AddRequest {
        a: i64,
        b: i64,
    }

    #[derive(Serialize)]
    struct AddResponse {
        sum: i64,
    }

    fn calculator() -> Dispatcher {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .register("Calc.Add", |req: AddRequest| async move {
                Ok(AddResponse { sum: req.a + req.b })
            })
            .register("Calc.Fail", |_: AddRequest| async move {
                Err::<AddResponse, _>(MethodError::plugin("overflow"))
            });
        dispatcher
    }

    #[tokio::test]
    async fn dispatches_typed_handler() {
        let result = calculator().dispatch("Calc.Add", json!({"a": 2, "b": 3})).await.unwrap();
        assert_eq!(result, json!({"sum": 5}));
    }

    #[tokio::test]
    async fn unknown_method_is_an_error() {
        let err = calculator().dispatch("Calc.Mul", json!({})).await.unwrap_err();
        assert!(matches!(err, MethodError::UnknownMethod(ref m) if m == "Calc.Mul"));
        assert_eq!(err.to_string(), "rpc: can't find method Calc.Mul");
    }

    #[tokio::test]
    async fn bad_params_are_reported_per_method() {
        let err = calculator().dispatch("Calc.Add", json!({"a": "two"})).await.unwrap_err();
        assert!(matches!(err, MethodError::InvalidParams { ref method, .. } if method == "Calc.Add"));
    }

    #[tokio::test]
    async fn plugin_errors_keep_their_message() {
        let err = calculator().dispatch("Calc.Fail", json!({"a": 1, "b": 1})).await.unwrap_err();
        assert_eq!(err.to_string(), "overflow");
    }

    #[test]
    fn lists_methods_sorted() {
        assert_eq!(calculator().methods(), vec!["Calc.Add", "Calc.Fail"]);
    }
}
