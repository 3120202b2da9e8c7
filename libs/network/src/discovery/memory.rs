//! In-process discovery
//!
//! Instances are connected and disconnected by calling
//! [`InMemoryConnectionService::connect`] and
//! [`InMemoryConnectionService::disconnect`]; listeners fire synchronously on
//! the calling thread, outside any internal lock.

use super::{ConnectionListener, InstanceConnection, InstanceConnectionService, Subscription};
use crate::{ClusterError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;
use types::{InstanceId, NodeId};

#[derive(Default)]
struct Listeners {
    next_id: AtomicU64,
    entries: RwLock<HashMap<u64, ConnectionListener>>,
}

impl Listeners {
    fn subscribe(self: &Arc<Self>, listener: ConnectionListener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.write().insert(id, listener);

        let weak: Weak<Listeners> = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(listeners) = weak.upgrade() {
                listeners.entries.write().remove(&id);
            }
        })
    }

    fn notify(&self, connection: &Arc<dyn InstanceConnection>) {
        let snapshot: Vec<ConnectionListener> = self.entries.read().values().cloned().collect();
        for listener in snapshot {
            listener(connection.clone());
        }
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

/// Discovery collaborator driven by explicit calls
#[derive(Default)]
pub struct InMemoryConnectionService {
    connections: RwLock<BTreeMap<InstanceId, Arc<dyn InstanceConnection>>>,
    on_connect: Arc<Listeners>,
    on_disconnect: Arc<Listeners>,
}

impl InMemoryConnectionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a connection and notify connect listeners
    pub fn connect(&self, connection: Arc<dyn InstanceConnection>) {
        let instance_id = connection.instance_id();
        self.connections
            .write()
            .insert(instance_id, connection.clone());

        debug!(%instance_id, "Instance connected");
        self.on_connect.notify(&connection);
    }

    /// Remove a connection and notify disconnect listeners
    pub fn disconnect(&self, instance_id: &InstanceId) -> Option<Arc<dyn InstanceConnection>> {
        let removed = self.connections.write().remove(instance_id)?;

        debug!(%instance_id, "Instance disconnected");
        self.on_disconnect.notify(&removed);
        Some(removed)
    }

    pub fn connect_listener_count(&self) -> usize {
        self.on_connect.len()
    }

    pub fn disconnect_listener_count(&self) -> usize {
        self.on_disconnect.len()
    }
}

impl InstanceConnectionService for InMemoryConnectionService {
    fn active_connections(&self) -> Vec<Arc<dyn InstanceConnection>> {
        self.connections.read().values().cloned().collect()
    }

    fn subscribe_to_connect(&self, listener: ConnectionListener) -> Subscription {
        self.on_connect.subscribe(listener)
    }

    fn subscribe_to_disconnect(&self, listener: ConnectionListener) -> Subscription {
        self.on_disconnect.subscribe(listener)
    }
}

/// Connection whose load and hosted nodes are set programmatically
#[derive(Debug)]
pub struct InMemoryConnection {
    instance_id: InstanceId,
    load: RwLock<f64>,
    routes: RwLock<BTreeMap<NodeId, String>>,
}

impl InMemoryConnection {
    pub fn new(instance_id: InstanceId, load: f64) -> Self {
        Self {
            instance_id,
            load: RwLock::new(load),
            routes: RwLock::new(BTreeMap::new()),
        }
    }

    /// Host `node_id`, reachable at `address`
    pub fn with_node(self, node_id: NodeId, address: impl Into<String>) -> Self {
        self.add_node(node_id, address);
        self
    }

    pub fn add_node(&self, node_id: NodeId, address: impl Into<String>) {
        self.routes.write().insert(node_id, address.into());
    }

    pub fn remove_node(&self, node_id: &NodeId) -> bool {
        self.routes.write().remove(node_id).is_some()
    }

    pub fn set_load(&self, load: f64) {
        *self.load.write() = load;
    }
}

#[async_trait]
impl InstanceConnection for InMemoryConnection {
    fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    async fn instance_load(&self) -> Result<f64> {
        Ok(*self.load.read())
    }

    async fn node_ids(&self) -> Result<Vec<NodeId>> {
        Ok(self.routes.read().keys().copied().collect())
    }

    fn open_route_to_node(&self, node_id: &NodeId) -> Result<String> {
        self.routes.read().get(node_id).cloned().ok_or_else(|| {
            ClusterError::connection(format!(
                "instance {} does not host node {}",
                self.instance_id, node_id
            ))
        })
    }
}
