//! Route-driven invocation dispatch
//!
//! [`RemoteInvocationDispatcher`] maps each [`StrategyType`] to a
//! [`RoutingStrategy`] sharing one registry, and performs calls in the
//! requested [`InvocationStyle`].

use crate::invoker::{ErrorConsumer, InvocationFuture, ResultConsumer};
use crate::registry::RemoteInvokerRegistry;
use crate::routing::{
    BestNodeRoutingStrategy, BroadcastRoutingStrategy, ListAggregateRoutingStrategy, Route,
    RoutingStrategy, SpecificNodeRoutingStrategy, StrategyType,
};
use crate::{ClusterError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use types::Invocation;

/// How the caller wants the result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStyle {
    /// Block for the primary result
    Sync,
    /// Fire and forget
    Async,
    /// Handle to an already running call
    #[default]
    Future,
}

/// Result of [`RemoteInvocationDispatcher::dispatch`], one variant per style
#[derive(Debug)]
pub enum DispatchOutcome {
    Value(Value),
    Dispatched,
    Future(InvocationFuture),
}

impl DispatchOutcome {
    /// Primary result, waiting for it when the call is still running
    pub async fn into_value(self) -> Result<Value> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Dispatched => Ok(Value::Null),
            Self::Future(future) => Ok(future.await?),
        }
    }
}

pub struct RemoteInvocationDispatcher {
    strategies: RwLock<HashMap<StrategyType, Arc<dyn RoutingStrategy>>>,
}

impl RemoteInvocationDispatcher {
    /// Dispatcher with the built-in strategies registered
    pub fn new(registry: Arc<dyn RemoteInvokerRegistry>) -> Self {
        let dispatcher = Self::empty();
        dispatcher.register_strategy(Arc::new(BestNodeRoutingStrategy::new(registry.clone())));
        dispatcher.register_strategy(Arc::new(SpecificNodeRoutingStrategy::new(registry.clone())));
        dispatcher.register_strategy(Arc::new(BroadcastRoutingStrategy::new(registry.clone())));
        dispatcher.register_strategy(Arc::new(ListAggregateRoutingStrategy::new(registry)));
        dispatcher
    }

    /// Dispatcher with no strategies
    pub fn empty() -> Self {
        Self {
            strategies: RwLock::new(HashMap::new()),
        }
    }

    /// Register `strategy` under its own type, returning the one it replaced
    pub fn register_strategy(
        &self,
        strategy: Arc<dyn RoutingStrategy>,
    ) -> Option<Arc<dyn RoutingStrategy>> {
        let strategy_type = strategy.strategy_type();
        debug!(strategy = %strategy_type, "Registering routing strategy");

        let replaced = self.strategies.write().insert(strategy_type.clone(), strategy);
        if replaced.is_some() {
            info!(strategy = %strategy_type, "Replaced routing strategy");
        }
        replaced
    }

    pub fn strategy(&self, strategy_type: &StrategyType) -> Result<Arc<dyn RoutingStrategy>> {
        self.strategies
            .read()
            .get(strategy_type)
            .cloned()
            .ok_or_else(|| ClusterError::unknown_strategy(strategy_type.to_string()))
    }

    pub fn strategy_types(&self) -> Vec<StrategyType> {
        self.strategies.read().keys().cloned().collect()
    }

    pub fn invoke_sync(
        &self,
        route: &Route,
        invocation: Invocation,
        result_consumers: Vec<ResultConsumer>,
        error_consumer: ErrorConsumer,
    ) -> Result<Value> {
        self.strategy(&route.strategy)?.invoke_sync(
            &route.address,
            invocation,
            result_consumers,
            error_consumer,
        )
    }

    pub fn invoke_async(
        &self,
        route: &Route,
        invocation: Invocation,
        result_consumers: Vec<ResultConsumer>,
        error_consumer: ErrorConsumer,
    ) -> Result<()> {
        self.strategy(&route.strategy)?.invoke_async(
            &route.address,
            invocation,
            result_consumers,
            error_consumer,
        )
    }

    pub fn invoke_future(
        &self,
        route: &Route,
        invocation: Invocation,
        result_consumers: Vec<ResultConsumer>,
        error_consumer: ErrorConsumer,
    ) -> Result<InvocationFuture> {
        self.strategy(&route.strategy)?.invoke_future(
            &route.address,
            invocation,
            result_consumers,
            error_consumer,
        )
    }

    /// Call in the given style
    pub fn dispatch(
        &self,
        route: &Route,
        style: InvocationStyle,
        invocation: Invocation,
        result_consumers: Vec<ResultConsumer>,
        error_consumer: ErrorConsumer,
    ) -> Result<DispatchOutcome> {
        debug!(%route, ?style, %invocation, "Dispatching invocation");
        match style {
            InvocationStyle::Sync => self
                .invoke_sync(route, invocation, result_consumers, error_consumer)
                .map(DispatchOutcome::Value),
            InvocationStyle::Async => self
                .invoke_async(route, invocation, result_consumers, error_consumer)
                .map(|()| DispatchOutcome::Dispatched),
            InvocationStyle::Future => self
                .invoke_future(route, invocation, result_consumers, error_consumer)
                .map(DispatchOutcome::Future),
        }
    }
}
