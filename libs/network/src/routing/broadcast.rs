//! Every node of an application

use super::{RouteAddress, RoutingStrategy, StrategyType};
use crate::invoker::{ErrorConsumer, InvocationFuture, ResultConsumer};
use crate::registry::RemoteInvokerRegistry;
use crate::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use types::Invocation;

/// Sends a copy of each invocation to every node of the application.
///
/// The primary result is `null`. Result consumers are shared, so each one
/// receives the results of every node.
pub struct BroadcastRoutingStrategy {
    registry: Arc<dyn RemoteInvokerRegistry>,
}

impl BroadcastRoutingStrategy {
    pub fn new(registry: Arc<dyn RemoteInvokerRegistry>) -> Self {
        Self { registry }
    }
}

impl RoutingStrategy for BroadcastRoutingStrategy {
    fn strategy_type(&self) -> StrategyType {
        StrategyType::Broadcast
    }

    /// Calls every node one after another, then returns the first failure
    fn invoke_sync(
        &self,
        address: &RouteAddress,
        invocation: Invocation,
        result_consumers: Vec<ResultConsumer>,
        error_consumer: ErrorConsumer,
    ) -> Result<Value> {
        let invokers = self.registry.get_all_remote_invokers(&address.application_id()?)?;
        debug!(%address, targets = invokers.len(), "Broadcasting invocation");

        let mut first_failure = None;
        for invoker in invokers {
            let outcome = invoker.invoke_sync(
                invocation.clone(),
                result_consumers.clone(),
                error_consumer.clone(),
            );
            if let Err(err) = outcome {
                debug!(?invoker, error = %err, "Broadcast target failed");
                first_failure.get_or_insert(err);
            }
        }

        match first_failure {
            Some(err) => Err(err.into()),
            None => Ok(Value::Null),
        }
    }

    fn invoke_async(
        &self,
        address: &RouteAddress,
        invocation: Invocation,
        result_consumers: Vec<ResultConsumer>,
        error_consumer: ErrorConsumer,
    ) -> Result<()> {
        let invokers = self.registry.get_all_remote_invokers(&address.application_id()?)?;
        debug!(%address, targets = invokers.len(), "Broadcasting invocation");

        for invoker in invokers {
            invoker.invoke_async(
                invocation.clone(),
                result_consumers.clone(),
                error_consumer.clone(),
            );
        }
        Ok(())
    }

    /// Resolves once every node answered, or with the first failure in
    /// node order
    fn invoke_future(
        &self,
        address: &RouteAddress,
        invocation: Invocation,
        result_consumers: Vec<ResultConsumer>,
        error_consumer: ErrorConsumer,
    ) -> Result<InvocationFuture> {
        let invokers = self.registry.get_all_remote_invokers(&address.application_id()?)?;
        debug!(%address, targets = invokers.len(), "Broadcasting invocation");

        let pending: Vec<InvocationFuture> = invokers
            .into_iter()
            .map(|invoker| {
                invoker.invoke_future(
                    invocation.clone(),
                    result_consumers.clone(),
                    error_consumer.clone(),
                )
            })
            .collect();

        Ok(InvocationFuture::spawn(async move {
            for outcome in futures::future::join_all(pending).await {
                outcome?;
            }
            Ok(Value::Null)
        }))
    }
}
