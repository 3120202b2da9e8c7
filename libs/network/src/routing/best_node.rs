//! Least loaded node of an application

use super::{RouteAddress, RoutingStrategy, StrategyType};
use crate::invoker::{ErrorConsumer, InvocationFuture, RemoteInvoker, ResultConsumer};
use crate::registry::RemoteInvokerRegistry;
use crate::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::trace;
use types::Invocation;

/// Sends each invocation to the node with the lowest reported load
pub struct BestNodeRoutingStrategy {
    registry: Arc<dyn RemoteInvokerRegistry>,
}

impl BestNodeRoutingStrategy {
    pub fn new(registry: Arc<dyn RemoteInvokerRegistry>) -> Self {
        Self { registry }
    }

    fn resolve(&self, address: &RouteAddress) -> Result<Arc<dyn RemoteInvoker>> {
        let application_id = address.application_id()?;
        let invoker = self.registry.get_any_remote_invoker(&application_id)?;
        trace!(%application_id, ?invoker, "Routing to best node");
        Ok(invoker)
    }
}

impl RoutingStrategy for BestNodeRoutingStrategy {
    fn strategy_type(&self) -> StrategyType {
        StrategyType::BestNode
    }

    fn invoke_sync(
        &self,
        address: &RouteAddress,
        invocation: Invocation,
        result_consumers: Vec<ResultConsumer>,
        error_consumer: ErrorConsumer,
    ) -> Result<Value> {
        let invoker = self.resolve(address)?;
        Ok(invoker.invoke_sync(invocation, result_consumers, error_consumer)?)
    }

    fn invoke_async(
        &self,
        address: &RouteAddress,
        invocation: Invocation,
        result_consumers: Vec<ResultConsumer>,
        error_consumer: ErrorConsumer,
    ) -> Result<()> {
        self.resolve(address)?
            .invoke_async(invocation, result_consumers, error_consumer);
        Ok(())
    }

    fn invoke_future(
        &self,
        address: &RouteAddress,
        invocation: Invocation,
        result_consumers: Vec<ResultConsumer>,
        error_consumer: ErrorConsumer,
    ) -> Result<InvocationFuture> {
        Ok(self
            .resolve(address)?
            .invoke_future(invocation, result_consumers, error_consumer))
    }
}
