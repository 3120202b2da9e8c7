//! Load-weighted invoker wrapper

use super::{ErrorConsumer, InvocationOutcome, RemoteInvoker, ResultConsumer};
use crate::Result;
use async_trait::async_trait;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use types::Invocation;

/// Pairs an invoker with the load reported by its instance.
///
/// Ordering is ascending by load, so the least loaded invoker sorts first.
/// Equality and ordering only consider the load; use
/// [`is_delegate`](Self::is_delegate) to compare by invoker identity.
#[derive(Clone)]
pub struct PriorityRemoteInvoker {
    load: f64,
    delegate: Arc<dyn RemoteInvoker>,
}

impl PriorityRemoteInvoker {
    pub fn new(load: f64, delegate: Arc<dyn RemoteInvoker>) -> Self {
        Self { load, delegate }
    }

    pub fn load(&self) -> f64 {
        self.load
    }

    pub fn delegate(&self) -> &Arc<dyn RemoteInvoker> {
        &self.delegate
    }

    pub fn into_delegate(self) -> Arc<dyn RemoteInvoker> {
        self.delegate
    }

    /// Whether this wraps exactly `invoker`
    pub fn is_delegate(&self, invoker: &Arc<dyn RemoteInvoker>) -> bool {
        Arc::ptr_eq(&self.delegate, invoker)
    }
}

impl PartialEq for PriorityRemoteInvoker {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PriorityRemoteInvoker {}

impl PartialOrd for PriorityRemoteInvoker {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityRemoteInvoker {
    fn cmp(&self, other: &Self) -> Ordering {
        self.load.total_cmp(&other.load)
    }
}

impl fmt::Debug for PriorityRemoteInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityRemoteInvoker")
            .field("load", &self.load)
            .field("delegate", &self.delegate)
            .finish()
    }
}

#[async_trait]
impl RemoteInvoker for PriorityRemoteInvoker {
    fn start(&self, address: &str, connect_timeout: Option<Duration>) -> Result<()> {
        self.delegate.start(address, connect_timeout)
    }

    fn stop(&self) -> Result<()> {
        self.delegate.stop()
    }

    async fn invoke(
        &self,
        invocation: Invocation,
        result_consumers: Vec<ResultConsumer>,
        error_consumer: ErrorConsumer,
    ) -> InvocationOutcome {
        self.delegate
            .invoke(invocation, result_consumers, error_consumer)
            .await
    }
}
