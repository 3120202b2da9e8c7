//! Instance Discovery
//!
//! ## Purpose
//! Tells the registry which instances are reachable, what nodes each one
//! hosts and how loaded it is. The registry never opens sockets itself: it
//! asks an [`InstanceConnection`] for a route to a node and hands the
//! resulting address to a fresh invoker from the [`InvokerFactory`].
//!
//! ```mermaid
//! graph LR
//!     Service[InstanceConnectionService] -->|active_connections| Registry
//!     Service -->|connect / disconnect| Registry
//!     Registry -->|open_route_to_node| Connection[InstanceConnection]
//!     Registry -->|create + start| Factory[InvokerFactory]
//! ```
//!
//! [`memory::InMemoryConnectionService`] is a programmatic implementation for
//! embedded clusters and tests.

pub mod memory;

pub use memory::{InMemoryConnection, InMemoryConnectionService};

use crate::invoker::RemoteInvoker;
use crate::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use types::{InstanceId, NodeId};

/// Callback fired when an instance connects or disconnects
pub type ConnectionListener = Arc<dyn Fn(Arc<dyn InstanceConnection>) + Send + Sync>;

/// Source of live instance connections
pub trait InstanceConnectionService: Send + Sync {
    /// Every currently connected instance
    fn active_connections(&self) -> Vec<Arc<dyn InstanceConnection>>;

    fn subscribe_to_connect(&self, listener: ConnectionListener) -> Subscription;

    fn subscribe_to_disconnect(&self, listener: ConnectionListener) -> Subscription;
}

/// One connected instance
#[async_trait]
pub trait InstanceConnection: Send + Sync + fmt::Debug {
    fn instance_id(&self) -> InstanceId;

    /// Current load of the instance; lower is preferred
    async fn instance_load(&self) -> Result<f64>;

    /// Nodes hosted by the instance
    async fn node_ids(&self) -> Result<Vec<NodeId>>;

    /// Wire address an invoker should connect to for `node_id`
    fn open_route_to_node(&self, node_id: &NodeId) -> Result<String>;
}

/// Produces unstarted invokers, one per call
pub trait InvokerFactory: Send + Sync {
    fn create(&self) -> Arc<dyn RemoteInvoker>;
}

impl<F> InvokerFactory for F
where
    F: Fn() -> Arc<dyn RemoteInvoker> + Send + Sync,
{
    fn create(&self) -> Arc<dyn RemoteInvoker> {
        self()
    }
}

/// Handle that removes a listener. Dropping it unsubscribes as well.
pub struct Subscription {
    unsubscribe: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    pub fn new<F>(unsubscribe: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            unsubscribe: Mutex::new(Some(Box::new(unsubscribe))),
        }
    }

    pub fn unsubscribe(self) {
        self.cancel();
    }

    fn cancel(&self) {
        if let Some(unsubscribe) = self.unsubscribe.lock().take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.lock().is_some())
            .finish()
    }
}
