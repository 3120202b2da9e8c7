//! # Remote Invoker Contract
//!
//! A [`RemoteInvoker`] owns one physical connection to one remote node and
//! sends [`Invocation`]s over it. Its lifecycle is one way:
//!
//! ```text
//! created --start()--> started --stop()--> stopped
//! ```
//!
//! Every invocation produces one primary result (the future's output) and may
//! produce any number of additional results, delivered to the supplied
//! [`ResultConsumer`]s by position. Failures that have no caller to return
//! to are funnelled through the single [`ErrorConsumer`].
//!
//! ## Invocation Styles
//!
//! | method | returns | failures |
//! |---|---|---|
//! | [`invoke`](RemoteInvoker::invoke) | lazy future | future output |
//! | [`invoke_completion_stage`](RemoteInvoker::invoke_completion_stage) | boxed lazy future | future output |
//! | [`invoke_future`](RemoteInvoker::invoke_future) | spawned [`InvocationFuture`] | future output |
//! | [`invoke_async`](RemoteInvoker::invoke_async) | nothing | error consumer |
//! | [`invoke_sync`](RemoteInvoker::invoke_sync) | value | returned directly |

mod priority;

pub use priority::PriorityRemoteInvoker;

use crate::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tracing::{error, warn};
use types::{Invocation, InvocationError, InvocationResult};

/// Outcome of the primary part of an invocation
pub type InvocationOutcome = std::result::Result<Value, InvocationError>;

/// Connection to one remote node
#[async_trait]
pub trait RemoteInvoker: Send + Sync + fmt::Debug + 'static {
    /// Connect to `address`. Called once, before any invocation.
    fn start(&self, address: &str, connect_timeout: Option<Duration>) -> Result<()>;

    /// Release the connection. Called once; the invoker is unusable afterwards.
    fn stop(&self) -> Result<()>;

    /// Send the invocation and resolve to its primary result. Nothing is sent
    /// until the returned future is polled.
    async fn invoke(
        &self,
        invocation: Invocation,
        result_consumers: Vec<ResultConsumer>,
        error_consumer: ErrorConsumer,
    ) -> InvocationOutcome;

    /// [`invoke`](RemoteInvoker::invoke) as a boxed future
    fn invoke_completion_stage(
        &self,
        invocation: Invocation,
        result_consumers: Vec<ResultConsumer>,
        error_consumer: ErrorConsumer,
    ) -> BoxFuture<'_, InvocationOutcome> {
        self.invoke(invocation, result_consumers, error_consumer)
    }

    /// Start the invocation immediately on the tokio runtime
    fn invoke_future(
        self: Arc<Self>,
        invocation: Invocation,
        result_consumers: Vec<ResultConsumer>,
        error_consumer: ErrorConsumer,
    ) -> InvocationFuture {
        InvocationFuture::spawn(async move {
            self.invoke(invocation, result_consumers, error_consumer)
                .await
        })
    }

    /// Fire and forget. A failed primary result goes to `error_consumer`.
    fn invoke_async(
        self: Arc<Self>,
        invocation: Invocation,
        result_consumers: Vec<ResultConsumer>,
        error_consumer: ErrorConsumer,
    ) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                error_consumer.accept_and_log(InvocationError::internal(
                    "asynchronous invocation requires a tokio runtime",
                ));
                return;
            }
        };

        handle.spawn(async move {
            let forward = error_consumer.clone();
            if let Err(err) = self
                .invoke(invocation, result_consumers, error_consumer)
                .await
            {
                forward.accept_and_log(err);
            }
        });
    }

    /// Block the calling thread until the primary result arrives.
    ///
    /// Must not be called from a tokio worker thread; use
    /// `tokio::task::spawn_blocking` when on the runtime.
    fn invoke_sync(
        &self,
        invocation: Invocation,
        result_consumers: Vec<ResultConsumer>,
        error_consumer: ErrorConsumer,
    ) -> InvocationOutcome {
        futures::executor::block_on(self.invoke(invocation, result_consumers, error_consumer))
    }
}

/// Receives the additional results of an invocation
#[derive(Clone)]
pub struct ResultConsumer(Arc<dyn Fn(InvocationResult) + Send + Sync>);

impl ResultConsumer {
    pub fn new<F>(consumer: F) -> Self
    where
        F: Fn(InvocationResult) + Send + Sync + 'static,
    {
        Self(Arc::new(consumer))
    }

    pub fn accept(&self, result: InvocationResult) {
        (self.0)(result)
    }
}

impl fmt::Debug for ResultConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResultConsumer")
    }
}

/// Single funnel for failures that have no caller to return to. Returning
/// `Err` re-raises the failure to whoever invoked the consumer.
#[derive(Clone)]
pub struct ErrorConsumer(
    Arc<dyn Fn(InvocationError) -> std::result::Result<(), InvocationError> + Send + Sync>,
);

impl ErrorConsumer {
    pub fn new<F>(consumer: F) -> Self
    where
        F: Fn(InvocationError) -> std::result::Result<(), InvocationError> + Send + Sync + 'static,
    {
        Self(Arc::new(consumer))
    }

    /// Log every failure and swallow it
    pub fn logging() -> Self {
        Self::new(|err| {
            error!(error = %err, "Unhandled invocation error");
            Ok(())
        })
    }

    pub fn accept(&self, err: InvocationError) -> std::result::Result<(), InvocationError> {
        (self.0)(err)
    }

    /// Deliver `err`, logging it if the consumer re-raises
    pub fn accept_and_log(&self, err: InvocationError) {
        if let Err(rethrown) = self.accept(err) {
            warn!(error = %rethrown, "Error consumer re-raised invocation error");
        }
    }
}

impl Default for ErrorConsumer {
    fn default() -> Self {
        Self::logging()
    }
}

impl fmt::Debug for ErrorConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorConsumer")
    }
}

/// Handle to an invocation that is already running
pub struct InvocationFuture {
    inner: BoxFuture<'static, InvocationOutcome>,
}

impl InvocationFuture {
    /// Spawn `future` on the current tokio runtime. Without a runtime the
    /// handle resolves to an internal error.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = InvocationOutcome> + Send + 'static,
    {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle.spawn(future),
            Err(_) => {
                return Self::ready(Err(InvocationError::internal(
                    "future invocation requires a tokio runtime",
                )))
            }
        };

        Self {
            inner: Box::pin(async move {
                handle.await.unwrap_or_else(|join_error| {
                    Err(InvocationError::internal(format!(
                        "invocation task failed: {}",
                        join_error
                    )))
                })
            }),
        }
    }

    /// Already completed handle
    pub fn ready(outcome: InvocationOutcome) -> Self {
        Self {
            inner: Box::pin(futures::future::ready(outcome)),
        }
    }
}

impl Future for InvocationFuture {
    type Output = InvocationOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl fmt::Debug for InvocationFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InvocationFuture")
    }
}
