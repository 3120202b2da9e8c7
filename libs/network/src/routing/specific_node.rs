//! One addressed node

use super::{RouteAddress, RoutingStrategy, StrategyType};
use crate::invoker::{ErrorConsumer, InvocationFuture, RemoteInvoker, ResultConsumer};
use crate::registry::RemoteInvokerRegistry;
use crate::Result;
use serde_json::Value;
use std::sync::Arc;
use types::Invocation;

/// Sends each invocation to the node named by the address. Accepts
/// [`RouteAddress::Node`] and node-context [`RouteAddress::Path`].
pub struct SpecificNodeRoutingStrategy {
    registry: Arc<dyn RemoteInvokerRegistry>,
}

impl SpecificNodeRoutingStrategy {
    pub fn new(registry: Arc<dyn RemoteInvokerRegistry>) -> Self {
        Self { registry }
    }

    fn resolve(&self, address: &RouteAddress) -> Result<Arc<dyn RemoteInvoker>> {
        self.registry.get_remote_invoker(&address.node_id()?)
    }
}

impl RoutingStrategy for SpecificNodeRoutingStrategy {
    fn strategy_type(&self) -> StrategyType {
        StrategyType::SpecificNode
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
