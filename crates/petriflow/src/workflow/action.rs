//! Adapts task actions to the kernel's token contract

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::net::{ActionError, Token};

/// Input handed to a task action.
#[derive(Debug, Clone, Default)]
pub struct TaskInput {
    /// First data payload consumed by the firing, if any.
    pub payload: Option<Value>,

    /// Shared context mapping, when the task declares a context.
    /// Mutations made through the handle are visible to later holders of
    /// the context token.
    pub context: Option<crate::net::ContextHandle>,
}

/// Async task body: one input payload in, at most one output payload out.
///
/// Register one with [`Task::with_action`](super::Task::with_action).
pub type TaskAction = Arc<
    dyn Fn(CancellationToken, TaskInput) -> BoxFuture<'static, Result<Option<Value>, ActionError>>
        + Send
        + Sync,
>;

/// Wrap a task action into a kernel action.
///
/// The consumed tuple arrives in input-arc order: the context token when
/// declared, data tokens from input channels, and resource permits. The
/// adapter picks the first data payload as the task input, exposes the
/// context mapping, and emits at most one data token carrying the output
/// payload. Permits and the context token return to their places through
/// the kernel's pass-through routing.
pub(crate) fn adapt_task_action(
    task_id: &str,
    action: TaskAction,
) -> impl Fn(CancellationToken, Vec<Token>) -> BoxFuture<'static, Result<Vec<Token>, ActionError>>
       + Send
       + Sync
       + 'static {
    let task_id = task_id.to_string();
    move |cancel: CancellationToken, tokens: Vec<Token>| {
        let action = action.clone();
        let task_id = task_id.clone();
        Box::pin(async move {
            let payload = tokens.iter().find_map(|token| token.as_data().cloned());
            let context = tokens.iter().find_map(|token| token.as_context().cloned());

            let output = action(cancel, TaskInput { payload, context }).await?;
            Ok(match output {
                Some(value) => vec![Token::data(format!("{task_id}-output"), value)],
                None => Vec::new(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::net::ContextHandle;

    fn action(f: impl Fn(TaskInput) -> Result<Option<Value>, ActionError> + Send + Sync + 'static) -> TaskAction {
        let f = Arc::new(f);
        Arc::new(move |_cancel, input| {
            let f = f.clone();
            Box::pin(async move { f(input) })
        })
    }

    #[tokio::test]
    async fn test_adapter_picks_first_data_payload() {
        let seen = action(|input| Ok(input.payload));
        let adapted = adapt_task_action("fetch", seen);

        let tokens = vec![
            Token::resource("api-0", "api_tokens"),
            Token::data("req-0", json!({"request_id": 0})),
            Token::data("req-1", json!({"request_id": 1})),
        ];
        let output = adapted(CancellationToken::new(), tokens).await.unwrap();

        assert_eq!(output.len(), 1);
        assert_eq!(output[0].id(), "fetch-output");
        assert_eq!(output[0].as_data(), Some(&json!({"request_id": 0})));
    }

    #[tokio::test]
    async fn test_adapter_exposes_context_handle() {
        let bump = action(|input| {
            let context = input.context.expect("task declared a context");
            let processed = context
                .get("processed")
                .and_then(|value| value.as_u64())
                .unwrap_or(0);
            context.insert("processed", json!(processed + 1));
            Ok(None)
        });
        let adapted = adapt_task_action("count", bump);

        let handle = ContextHandle::new();
        let tokens = vec![Token::context("ctx-token", handle.clone())];
        let output = adapted(CancellationToken::new(), tokens).await.unwrap();

        // No output payload means no data token; the context token itself
        // returns through pass-through routing.
        assert!(output.is_empty());
        assert_eq!(handle.get("processed"), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_adapter_propagates_failure() {
        let fail = action(|_input| Err("upstream timeout".into()));
        let adapted = adapt_task_action("flaky", fail);

        let err = adapted(CancellationToken::new(), Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "upstream timeout");
    }
}
