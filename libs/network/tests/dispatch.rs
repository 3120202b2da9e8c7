//! Routing strategies and dispatcher against a running registry

mod common;

use common::*;
use network::{
    ClusterError, DispatchOutcome, ErrorConsumer, InvocationFuture, InvocationStyle,
    RemoteInvocationDispatcher, RemoteInvokerRegistry, ResultConsumer, Route, RouteAddress,
    RoutingStrategy, StrategyType,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use types::{ApplicationId, InstanceId, Invocation, InvocationError, NodeId, Path};

fn lookup() -> Invocation {
    Invocation::builder("InventoryService", "lookup")
        .parameter(&"sku-42")
        .unwrap()
        .build()
}

/// Three nodes of one application with loads 0.5, 0.1 and 0.9
struct Fixture {
    cluster: TestCluster,
    dispatcher: Arc<RemoteInvocationDispatcher>,
    application: ApplicationId,
    nodes: Vec<NodeId>,
}

impl Fixture {
    async fn start() -> Self {
        let cluster = TestCluster::new();
        let application = ApplicationId::random();
        let nodes: Vec<NodeId> = (0..3)
            .map(|_| NodeId::new(InstanceId::random(), application))
            .collect();
        for (node, load) in nodes.iter().zip([0.5, 0.1, 0.9]) {
            cluster.connect(load, &[*node]);
        }
        cluster.registry.start().await.unwrap();

        let dispatcher = Arc::new(RemoteInvocationDispatcher::new(cluster.registry.clone()));
        Self {
            cluster,
            dispatcher,
            application,
            nodes,
        }
    }

    /// Node addresses, least loaded first
    fn addresses_by_load(&self) -> Vec<Value> {
        [1, 0, 2]
            .iter()
            .map(|&i| json!(address_of(&self.nodes[i])))
            .collect()
    }

    async fn stop(self) {
        self.cluster.registry.stop().await.unwrap();
    }
}

#[test_log::test(tokio::test)]
async fn best_node_uses_least_loaded() {
    let fixture = Fixture::start().await;

    let value = fixture
        .dispatcher
        .invoke_future(
            &Route::best_node(fixture.application),
            lookup(),
            vec![],
            ErrorConsumer::logging(),
        )
        .unwrap()
        .await
        .unwrap();

    assert_eq!(value, json!([address_of(&fixture.nodes[1])]));
    assert_eq!(fixture.cluster.invoker(&fixture.nodes[1]).invocations(), 1);
    assert_eq!(fixture.cluster.invoker(&fixture.nodes[0]).invocations(), 0);

    fixture.stop().await;
}

#[test_log::test(tokio::test)]
async fn specific_node_by_node_and_path() {
    let fixture = Fixture::start().await;
    let target = fixture.nodes[2];

    let by_node = fixture
        .dispatcher
        .invoke_future(&Route::specific_node(target), lookup(), vec![], ErrorConsumer::logging())
        .unwrap()
        .await
        .unwrap();
    assert_eq!(by_node, json!([address_of(&target)]));

    let path = Path::from_node_and_components(Some(&target), ["inventory", "lookup"]).unwrap();
    let by_path = fixture
        .dispatcher
        .invoke_future(
            &Route::new(path, StrategyType::SpecificNode),
            lookup(),
            vec![],
            ErrorConsumer::logging(),
        )
        .unwrap()
        .await
        .unwrap();
    assert_eq!(by_path, by_node);
    assert_eq!(fixture.cluster.invoker(&target).invocations(), 2);

    fixture.stop().await;
}

#[test_log::test(tokio::test)]
async fn specific_node_requires_a_node_address() {
    let fixture = Fixture::start().await;

    let err = fixture
        .dispatcher
        .invoke_future(
            &Route::new(fixture.application, StrategyType::SpecificNode),
            lookup(),
            vec![],
            ErrorConsumer::logging(),
        )
        .unwrap_err();
    assert!(err.is_invalid_argument());

    let err = fixture
        .dispatcher
        .invoke_future(
            &Route::specific_node(NodeId::random()),
            lookup(),
            vec![],
            ErrorConsumer::logging(),
        )
        .unwrap_err();
    assert!(err.is_not_found());

    fixture.stop().await;
}

#[test_log::test(tokio::test)]
async fn broadcast_reaches_every_node() {
    let fixture = Fixture::start().await;
    let (consumer, seen) = result_collector();

    let value = fixture
        .dispatcher
        .invoke_future(
            &Route::broadcast(fixture.application),
            lookup(),
            vec![consumer],
            ErrorConsumer::logging(),
        )
        .unwrap()
        .await
        .unwrap();

    assert_eq!(value, Value::Null);
    for node in &fixture.nodes {
        assert_eq!(fixture.cluster.invoker(node).invocations(), 1);
    }
    assert_eq!(seen.lock().len(), 3);

    fixture.stop().await;
}

#[test_log::test(tokio::test)]
async fn list_aggregate_concatenates_in_load_order() {
    let fixture = Fixture::start().await;
    let (consumer, seen) = result_collector();

    let value = fixture
        .dispatcher
        .invoke_future(
            &Route::list_aggregate(fixture.application),
            lookup(),
            vec![consumer],
            ErrorConsumer::logging(),
        )
        .unwrap()
        .await
        .unwrap();

    let expected = Value::Array(fixture.addresses_by_load());
    assert_eq!(value, expected);
    assert_eq!(seen.lock().as_slice(), &[expected]);

    fixture.stop().await;
}

#[test_log::test(tokio::test)]
async fn sync_dispatch_off_the_runtime() {
    let fixture = Fixture::start().await;
    let dispatcher = fixture.dispatcher.clone();
    let route = Route::list_aggregate(fixture.application);

    let outcome = tokio::task::spawn_blocking(move || {
        dispatcher.dispatch(
            &route,
            InvocationStyle::Sync,
            lookup(),
            vec![],
            ErrorConsumer::logging(),
        )
    })
    .await
    .unwrap()
    .unwrap();

    match outcome {
        DispatchOutcome::Value(value) => {
            assert_eq!(value, Value::Array(fixture.addresses_by_load()))
        }
        other => panic!("expected a value, got {:?}", other),
    }

    fixture.stop().await;
}

#[test_log::test(tokio::test)]
async fn sync_broadcast_reaches_nodes_after_a_failure() {
    let fixture = Fixture::start().await;
    let failing_node = NodeId::new(InstanceId::random(), fixture.application);
    fixture
        .cluster
        .registry
        .register_remote_invoker(
            failing_node,
            0.0,
            Arc::new(MockInvoker::started("mem://failing").failing_invoke()),
        )
        .unwrap();

    let dispatcher = fixture.dispatcher.clone();
    let route = Route::broadcast(fixture.application);
    let result = tokio::task::spawn_blocking(move || {
        dispatcher.invoke_sync(&route, lookup(), vec![], ErrorConsumer::logging())
    })
    .await
    .unwrap();

    assert!(matches!(result, Err(ClusterError::Invocation(_))));
    for node in &fixture.nodes {
        assert_eq!(fixture.cluster.invoker(node).invocations(), 1);
    }

    fixture.stop().await;
}

#[test_log::test(tokio::test)]
async fn async_dispatch_reports_failures_to_error_consumer() {
    let fixture = Fixture::start().await;
    let failing_node = NodeId::random();
    fixture
        .cluster
        .registry
        .register_remote_invoker(
            failing_node,
            0.0,
            Arc::new(MockInvoker::started("mem://failing").failing_invoke()),
        )
        .unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel::<InvocationError>();
    let tx = Mutex::new(Some(tx));
    let error_consumer = ErrorConsumer::new(move |err| {
        if let Some(tx) = tx.lock().take() {
            let _ = tx.send(err);
        }
        Ok(())
    });

    let outcome = fixture
        .dispatcher
        .dispatch(
            &Route::specific_node(failing_node),
            InvocationStyle::Async,
            lookup(),
            vec![],
            error_consumer,
        )
        .unwrap();
    assert!(matches!(outcome, DispatchOutcome::Dispatched));

    let err = rx.await.unwrap();
    assert_eq!(err.message(), "mem://failing rejected the call");

    fixture.stop().await;
}

#[test_log::test(tokio::test)]
async fn future_failure_surfaces_as_invocation_error() {
    let fixture = Fixture::start().await;
    let failing_node = NodeId::random();
    fixture
        .cluster
        .registry
        .register_remote_invoker(
            failing_node,
            0.0,
            Arc::new(MockInvoker::started("mem://failing").failing_invoke()),
        )
        .unwrap();

    let outcome = fixture
        .dispatcher
        .dispatch(
            &Route::specific_node(failing_node),
            InvocationStyle::Future,
            lookup(),
            vec![],
            ErrorConsumer::logging(),
        )
        .unwrap();

    let err = outcome.into_value().await.unwrap_err();
    assert!(matches!(err, ClusterError::Invocation(_)));

    fixture.stop().await;
}

#[test_log::test(tokio::test)]
async fn unknown_application_is_not_found() {
    let fixture = Fixture::start().await;

    for route in [
        Route::best_node(ApplicationId::random()),
        Route::broadcast(ApplicationId::random()),
        Route::list_aggregate(ApplicationId::random()),
    ] {
        let err = fixture
            .dispatcher
            .invoke_async(&route, lookup(), vec![], ErrorConsumer::logging())
            .unwrap_err();
        assert!(err.is_not_found(), "{} should not resolve", route);
    }

    fixture.stop().await;
}

/// Answers every call locally with a fixed value
struct PinnedStrategy {
    answer: Value,
}

impl RoutingStrategy for PinnedStrategy {
    fn strategy_type(&self) -> StrategyType {
        StrategyType::Custom("pinned".into())
    }

    fn invoke_sync(
        &self,
        _address: &RouteAddress,
        _invocation: Invocation,
        _result_consumers: Vec<ResultConsumer>,
        _error_consumer: ErrorConsumer,
    ) -> network::Result<Value> {
        Ok(self.answer.clone())
    }

    fn invoke_async(
        &self,
        _address: &RouteAddress,
        _invocation: Invocation,
        _result_consumers: Vec<ResultConsumer>,
        _error_consumer: ErrorConsumer,
    ) -> network::Result<()> {
        Ok(())
    }

    fn invoke_future(
        &self,
        _address: &RouteAddress,
        _invocation: Invocation,
        _result_consumers: Vec<ResultConsumer>,
        _error_consumer: ErrorConsumer,
    ) -> network::Result<InvocationFuture> {
        Ok(InvocationFuture::ready(Ok(self.answer.clone())))
    }
}

#[test_log::test(tokio::test)]
async fn custom_strategies_can_be_registered() {
    let fixture = Fixture::start().await;
    let route = Route::new(fixture.application, StrategyType::Custom("pinned".into()));

    let err = fixture
        .dispatcher
        .invoke_future(&route, lookup(), vec![], ErrorConsumer::logging())
        .unwrap_err();
    assert!(matches!(err, ClusterError::UnknownStrategy { .. }));

    let replaced = fixture
        .dispatcher
        .register_strategy(Arc::new(PinnedStrategy { answer: json!(1) }));
    assert!(replaced.is_none());

    let value = fixture
        .dispatcher
        .invoke_future(&route, lookup(), vec![], ErrorConsumer::logging())
        .unwrap()
        .await
        .unwrap();
    assert_eq!(value, json!(1));

    let replaced = fixture
        .dispatcher
        .register_strategy(Arc::new(PinnedStrategy { answer: json!(2) }));
    assert!(replaced.is_some());
    assert_eq!(fixture.dispatcher.strategy_types().len(), 5);

    fixture.stop().await;
}
