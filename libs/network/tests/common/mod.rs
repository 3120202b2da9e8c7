//! Shared fixtures for registry and dispatch tests
#![allow(dead_code)]

use async_trait::async_trait;
use cluster_config::RegistrySettings;
use network::{
    ClusterError, ErrorConsumer, InMemoryConnection, InMemoryConnectionService,
    InstanceConnection, InvocationOutcome, InvokerFactory, RemoteInvoker, ResultConsumer,
    SimpleRemoteInvokerRegistry,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use types::{InstanceId, Invocation, InvocationError, InvocationResult, NodeId};

/// Records its lifecycle and answers every invocation with `[address]`
#[derive(Debug, Default)]
pub struct MockInvoker {
    address: Mutex<Option<String>>,
    connect_timeout: Mutex<Option<Duration>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
    invocations: AtomicUsize,
    fail_invoke: bool,
    fail_stop: bool,
}

impl MockInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Already started invoker, as a caller registering directly would hold
    pub fn started(address: &str) -> Self {
        let invoker = Self::new();
        *invoker.address.lock() = Some(address.to_string());
        invoker.starts.fetch_add(1, Ordering::SeqCst);
        invoker
    }

    pub fn failing_invoke(mut self) -> Self {
        self.fail_invoke = true;
        self
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub fn address(&self) -> Option<String> {
        self.address.lock().clone()
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        *self.connect_timeout.lock()
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteInvoker for MockInvoker {
    fn start(&self, address: &str, connect_timeout: Option<Duration>) -> network::Result<()> {
        *self.address.lock() = Some(address.to_string());
        *self.connect_timeout.lock() = connect_timeout;
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> network::Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            return Err(ClusterError::connection("socket already closed"));
        }
        Ok(())
    }

    async fn invoke(
        &self,
        _invocation: Invocation,
        result_consumers: Vec<ResultConsumer>,
        _error_consumer: ErrorConsumer,
    ) -> InvocationOutcome {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let address = self.address().unwrap_or_default();

        if self.fail_invoke {
            return Err(InvocationError::remote(format!("{} rejected the call", address)));
        }

        for consumer in &result_consumers {
            consumer.accept(InvocationResult::new(json!([address])));
        }
        Ok(json!([address]))
    }
}

/// Hands out [`MockInvoker`]s and keeps them for inspection
#[derive(Debug, Default)]
pub struct MockFactory {
    created: Mutex<Vec<Arc<MockInvoker>>>,
    fail_stop: bool,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_stop() -> Self {
        Self {
            fail_stop: true,
            ..Self::default()
        }
    }

    pub fn created(&self) -> Vec<Arc<MockInvoker>> {
        self.created.lock().clone()
    }

    /// The invoker started against `address`
    pub fn invoker_for(&self, address: &str) -> Option<Arc<MockInvoker>> {
        self.created
            .lock()
            .iter()
            .find(|invoker| invoker.address().as_deref() == Some(address))
            .cloned()
    }
}

impl InvokerFactory for MockFactory {
    fn create(&self) -> Arc<dyn RemoteInvoker> {
        let invoker = Arc::new(if self.fail_stop {
            MockInvoker::new().failing_stop()
        } else {
            MockInvoker::new()
        });
        self.created.lock().push(invoker.clone());
        invoker
    }
}

/// Connection whose metadata reads fail
#[derive(Debug)]
pub struct FailingConnection {
    pub instance_id: InstanceId,
}

#[async_trait]
impl InstanceConnection for FailingConnection {
    fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    async fn instance_load(&self) -> network::Result<f64> {
        Err(ClusterError::connection("load average unavailable"))
    }

    async fn node_ids(&self) -> network::Result<Vec<NodeId>> {
        Ok(vec![NodeId::new(self.instance_id, types::ApplicationId::random())])
    }

    fn open_route_to_node(&self, node_id: &NodeId) -> network::Result<String> {
        Ok(address_of(node_id))
    }
}

/// Connection whose load read never completes
#[derive(Debug)]
pub struct StalledConnection {
    pub instance_id: InstanceId,
    pub node_id: NodeId,
}

#[async_trait]
impl InstanceConnection for StalledConnection {
    fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    async fn instance_load(&self) -> network::Result<f64> {
        futures::future::pending().await
    }

    async fn node_ids(&self) -> network::Result<Vec<NodeId>> {
        Ok(vec![self.node_id])
    }

    fn open_route_to_node(&self, node_id: &NodeId) -> network::Result<String> {
        Ok(address_of(node_id))
    }
}

/// Connection hosting two nodes, only one of which can be routed to
#[derive(Debug)]
pub struct PartlyRoutableConnection {
    pub instance_id: InstanceId,
    pub routable: NodeId,
    pub unroutable: NodeId,
}

#[async_trait]
impl InstanceConnection for PartlyRoutableConnection {
    fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    async fn instance_load(&self) -> network::Result<f64> {
        Ok(0.2)
    }

    async fn node_ids(&self) -> network::Result<Vec<NodeId>> {
        Ok(vec![self.unroutable, self.routable])
    }

    fn open_route_to_node(&self, node_id: &NodeId) -> network::Result<String> {
        if *node_id == self.unroutable {
            return Err(ClusterError::connection(format!("no route to {}", node_id)));
        }
        Ok(address_of(node_id))
    }
}

/// Connection whose load read takes `delay`
#[derive(Debug)]
pub struct SlowConnection {
    pub node_id: NodeId,
    pub delay: Duration,
}

#[async_trait]
impl InstanceConnection for SlowConnection {
    fn instance_id(&self) -> InstanceId {
        self.node_id.instance_id()
    }

    async fn instance_load(&self) -> network::Result<f64> {
        tokio::time::sleep(self.delay).await;
        Ok(0.5)
    }

    async fn node_ids(&self) -> network::Result<Vec<NodeId>> {
        Ok(vec![self.node_id])
    }

    fn open_route_to_node(&self, node_id: &NodeId) -> network::Result<String> {
        Ok(address_of(node_id))
    }
}

pub fn address_of(node_id: &NodeId) -> String {
    format!("mem://{}", node_id)
}

/// Settings that leave reconciliation to explicit refreshes and events
pub fn test_settings() -> RegistrySettings {
    RegistrySettings {
        refresh_interval_ms: 3_600_000,
        shutdown_timeout_ms: 1_000,
        metadata_timeout_ms: 100,
        total_refresh_timeout_ms: 500,
        report_interval_ms: 3_600_000,
        connect_timeout_ms: Some(250),
    }
}

pub fn same_invoker(invoker: &Arc<dyn RemoteInvoker>, mock: &Arc<MockInvoker>) -> bool {
    Arc::as_ptr(invoker) as *const () == Arc::as_ptr(mock) as *const ()
}

/// Registry wired to an in-memory discovery service and a mock factory
pub struct TestCluster {
    pub service: Arc<InMemoryConnectionService>,
    pub factory: Arc<MockFactory>,
    pub registry: Arc<SimpleRemoteInvokerRegistry>,
}

impl TestCluster {
    pub fn new() -> Self {
        Self::with_factory(MockFactory::new())
    }

    pub fn with_factory(factory: MockFactory) -> Self {
        let service = Arc::new(InMemoryConnectionService::new());
        let factory = Arc::new(factory);
        let registry = SimpleRemoteInvokerRegistry::new(
            test_settings(),
            service.clone(),
            factory.clone(),
        )
        .expect("test settings are valid");

        Self {
            service,
            factory,
            registry: Arc::new(registry),
        }
    }

    /// Connection for a new instance hosting `nodes`, not yet connected
    pub fn instance(&self, load: f64, nodes: &[NodeId]) -> Arc<InMemoryConnection> {
        let instance_id = nodes
            .first()
            .map(NodeId::instance_id)
            .unwrap_or_else(InstanceId::random);

        let connection = InMemoryConnection::new(instance_id, load);
        for node_id in nodes {
            connection.add_node(*node_id, address_of(node_id));
        }
        Arc::new(connection)
    }

    /// Create and connect an instance hosting `nodes`
    pub fn connect(&self, load: f64, nodes: &[NodeId]) -> Arc<InMemoryConnection> {
        let connection = self.instance(load, nodes);
        self.service.connect(connection.clone());
        connection
    }

    pub fn invoker(&self, node_id: &NodeId) -> Arc<MockInvoker> {
        self.factory
            .invoker_for(&address_of(node_id))
            .expect("an invoker was created for the node")
    }
}

/// Poll `condition` until it holds or two seconds pass
pub async fn eventually<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

pub fn result_collector() -> (ResultConsumer, Arc<Mutex<Vec<Value>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let consumer = ResultConsumer::new(move |result: InvocationResult| {
        sink.lock().push(result.into_result())
    });
    (consumer, seen)
}
