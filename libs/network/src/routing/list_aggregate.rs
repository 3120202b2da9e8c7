//! Every node of an application, results concatenated

use super::{RouteAddress, RoutingStrategy, StrategyType};
use crate::invoker::{ErrorConsumer, InvocationFuture, RemoteInvoker, ResultConsumer};
use crate::registry::RemoteInvokerRegistry;
use crate::Result;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use types::{Invocation, InvocationResult};

/// Concatenate results in order. Arrays are flattened one level, `null` is
/// skipped and any other value becomes a single element.
pub fn concat_results<I>(values: I) -> Value
where
    I: IntoIterator<Item = Value>,
{
    let mut merged = Vec::new();
    for value in values {
        match value {
            Value::Array(items) => merged.extend(items),
            Value::Null => {}
            other => merged.push(other),
        }
    }
    Value::Array(merged)
}

struct Row {
    values: Vec<Option<Value>>,
    delivered: bool,
}

/// Collects the additional results of every node for each caller consumer.
/// Once every node has reported to consumer `i`, that consumer receives one
/// result holding the concatenation in node order.
struct Aggregator {
    consumers: Vec<ResultConsumer>,
    rows: Mutex<Vec<Row>>,
}

impl Aggregator {
    fn new(consumers: Vec<ResultConsumer>, targets: usize) -> Arc<Self> {
        let rows = consumers
            .iter()
            .map(|_| Row {
                values: vec![None; targets],
                delivered: false,
            })
            .collect();

        Arc::new(Self {
            consumers,
            rows: Mutex::new(rows),
        })
    }

    /// Consumers handed to the node at `target`
    fn proxies(self: &Arc<Self>, target: usize) -> Vec<ResultConsumer> {
        (0..self.consumers.len())
            .map(|slot| {
                let aggregator = self.clone();
                ResultConsumer::new(move |result: InvocationResult| {
                    aggregator.record(slot, target, result.into_result())
                })
            })
            .collect()
    }

    fn record(&self, slot: usize, target: usize, value: Value) {
        let complete = {
            let mut rows = self.rows.lock();
            let row = &mut rows[slot];
            if row.delivered {
                return;
            }

            row.values[target] = Some(value);
            if row.values.iter().all(Option::is_some) {
                row.delivered = true;
                Some(concat_results(row.values.iter_mut().filter_map(Option::take)))
            } else {
                None
            }
        };

        if let Some(merged) = complete {
            self.consumers[slot].accept(InvocationResult::new(merged));
        }
    }
}

/// Sends each invocation to every node of the application and concatenates
/// the results in node order, least loaded first
pub struct ListAggregateRoutingStrategy {
    registry: Arc<dyn RemoteInvokerRegistry>,
}

impl ListAggregateRoutingStrategy {
    pub fn new(registry: Arc<dyn RemoteInvokerRegistry>) -> Self {
        Self { registry }
    }

    fn resolve(&self, address: &RouteAddress) -> Result<Vec<Arc<dyn RemoteInvoker>>> {
        let invokers = self.registry.get_all_remote_invokers(&address.application_id()?)?;
        debug!(%address, targets = invokers.len(), "Aggregating invocation");
        Ok(invokers)
    }
}

impl RoutingStrategy for ListAggregateRoutingStrategy {
    fn strategy_type(&self) -> StrategyType {
        StrategyType::ListAggregate
    }

    fn invoke_sync(
        &self,
        address: &RouteAddress,
        invocation: Invocation,
        result_consumers: Vec<ResultConsumer>,
        error_consumer: ErrorConsumer,
    ) -> Result<Value> {
        let invokers = self.resolve(address)?;
        let aggregator = Aggregator::new(result_consumers, invokers.len());

        let mut results = Vec::with_capacity(invokers.len());
        for (target, invoker) in invokers.iter().enumerate() {
            results.push(invoker.invoke_sync(
                invocation.clone(),
                aggregator.proxies(target),
                error_consumer.clone(),
            )?);
        }
        Ok(concat_results(results))
    }

    /// Primary results are discarded; aggregated additional results still
    /// reach the consumers
    fn invoke_async(
        &self,
        address: &RouteAddress,
        invocation: Invocation,
        result_consumers: Vec<ResultConsumer>,
        error_consumer: ErrorConsumer,
    ) -> Result<()> {
        let invokers = self.resolve(address)?;
        let aggregator = Aggregator::new(result_consumers, invokers.len());

        for (target, invoker) in invokers.into_iter().enumerate() {
            invoker.invoke_async(
                invocation.clone(),
                aggregator.proxies(target),
                error_consumer.clone(),
            );
        }
        Ok(())
    }

    fn invoke_future(
        &self,
        address: &RouteAddress,
        invocation: Invocation,
        result_consumers: Vec<ResultConsumer>,
        error_consumer: ErrorConsumer,
    ) -> Result<InvocationFuture> {
        let invokers = self.resolve(address)?;
        let aggregator = Aggregator::new(result_consumers, invokers.len());

        let pending: Vec<InvocationFuture> = invokers
            .into_iter()
            .enumerate()
            .map(|(target, invoker)| {
                invoker.invoke_future(
                    invocation.clone(),
                    aggregator.proxies(target),
                    error_consumer.clone(),
                )
            })
            .collect();

        Ok(InvocationFuture::spawn(async move {
            let mut results = Vec::with_capacity(pending.len());
            for outcome in futures::future::join_all(pending).await {
                results.push(outcome?);
            }
            Ok(concat_results(results))
        }))
    }
}
