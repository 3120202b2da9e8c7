//! Remote Invoker Registry
//!
//! ## Purpose
//! Keeps one started [`RemoteInvoker`] per reachable node and answers which
//! invoker to use for a node or an application. The view is reconciled
//! against discovery on a fixed interval and on every connect or disconnect
//! event.
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Discovery as InstanceConnectionService
//!     participant Refresher
//!     participant Snapshot as RemoteInvokerRegistrySnapshot
//!     participant Reader
//!
//!     Refresher->>Discovery: active_connections()
//!     Refresher->>Refresher: read load + node ids (bounded)
//!     Refresher->>Snapshot: refresh().add(..).prune().commit()
//!     Snapshot-->>Refresher: purged invokers stopped
//!     Reader->>Snapshot: get_best_invoker_for_application()
//! ```
//!
//! ## Lifecycle
//! `Stopped --start()--> Running --stop()--> Stopped`. Lookups on a stopped
//! registry fail with [`ClusterError::IllegalState`](crate::ClusterError),
//! distinct from a per-key not-found.

pub mod simple;
pub mod snapshot;

pub use simple::{establish_new_connection, SimpleRemoteInvokerRegistry};
pub use snapshot::{InvokerSupplier, RefreshBuilder, RemoteInvokerRegistrySnapshot};

use crate::invoker::RemoteInvoker;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use types::{ApplicationId, NodeId};

/// Public lookup surface of the registry
#[async_trait]
pub trait RemoteInvokerRegistry: Send + Sync {
    /// Begin reconciling with discovery. Resolves once the first refresh has
    /// completed.
    async fn start(&self) -> Result<()>;

    /// Stop reconciling and stop every registered invoker
    async fn stop(&self) -> Result<()>;

    /// Run one reconciliation cycle now
    async fn refresh(&self) -> Result<()>;

    fn is_running(&self) -> bool;

    fn get_remote_invoker(&self, node_id: &NodeId) -> Result<Arc<dyn RemoteInvoker>>;

    /// Least loaded invoker of the application
    fn get_any_remote_invoker(&self, application_id: &ApplicationId)
        -> Result<Arc<dyn RemoteInvoker>>;

    /// Every invoker of the application, least loaded first
    fn get_all_remote_invokers(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<Arc<dyn RemoteInvoker>>>;

    /// Register an already started invoker. If the node is known, only its
    /// load is updated and `invoker`, unless it is the registered one, is
    /// stopped.
    fn register_remote_invoker(
        &self,
        node_id: NodeId,
        load: f64,
        invoker: Arc<dyn RemoteInvoker>,
    ) -> Result<()>;

    /// Remove the node and stop its invoker
    fn unregister_remote_invoker(&self, node_id: &NodeId) -> Result<()>;
}
