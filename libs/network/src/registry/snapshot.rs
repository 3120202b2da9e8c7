//! Copy-on-write invoker storage
//!
//! Readers clone the current `Arc<Storage>` under a read lock and look up
//! without holding it. Writers batch operations in a [`RefreshBuilder`] and
//! [`commit`](RefreshBuilder::commit) them: under the write lock the current
//! storage is copied, the batch applied to the copy, and the copy published.
//! A published storage is never mutated.
//!
//! Invokers removed by a commit are purged through the caller's cleanup
//! callback after the lock is released. [`clear`](RemoteInvokerRegistrySnapshot::clear)
//! closes the snapshot; later commits are rejected.

use crate::invoker::{PriorityRemoteInvoker, RemoteInvoker};
use crate::{ClusterError, Result};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, warn};
use types::{ApplicationId, InstanceId, NodeId};

/// Lazily creates the invoker for a node that is not yet registered
pub type InvokerSupplier = Box<dyn FnOnce() -> Result<Arc<dyn RemoteInvoker>> + Send>;

#[derive(Default)]
struct Storage {
    invokers_by_node: BTreeMap<NodeId, Arc<dyn RemoteInvoker>>,
    invokers_by_application: HashMap<ApplicationId, Vec<PriorityRemoteInvoker>>,
    invokers_to_purge: Vec<Arc<dyn RemoteInvoker>>,
    invokers_created: Vec<Arc<dyn RemoteInvoker>>,
    closed: bool,
}

impl Storage {
    /// Private copy for one commit. The purge and created lists start empty.
    fn begin(&self) -> Storage {
        Storage {
            invokers_by_node: self.invokers_by_node.clone(),
            invokers_by_application: self.invokers_by_application.clone(),
            invokers_to_purge: Vec::new(),
            invokers_created: Vec::new(),
            closed: self.closed,
        }
    }

    fn closed_empty() -> Storage {
        Storage {
            closed: true,
            ..Storage::default()
        }
    }

    fn apply(
        &mut self,
        updates: Vec<Update>,
        retain: &HashSet<NodeId>,
        prune: bool,
    ) -> Result<()> {
        for op in updates {
            match op {
                Update::Add {
                    node_id,
                    load,
                    supplier,
                    skip_on_failure,
                } => {
                    if let Err(err) = self.add(node_id, load, supplier) {
                        if !skip_on_failure {
                            return Err(err);
                        }
                        warn!(%node_id, error = %err, "Failed to connect to node, skipping it");
                    }
                }
                Update::RemoveNode(node_id) => self.remove_node(&node_id),
                Update::RemoveInstance(instance_id) => self.remove_instance(&instance_id),
            }
        }

        if prune {
            self.prune(retain);
        }

        self.sort();
        Ok(())
    }

    fn add(&mut self, node_id: NodeId, load: f64, supplier: InvokerSupplier) -> Result<()> {
        let invoker = match self.invokers_by_node.get(&node_id) {
            Some(existing) => existing.clone(),
            None => {
                let created = supplier()?;
                self.invokers_by_node.insert(node_id, created.clone());
                self.invokers_created.push(created.clone());
                created
            }
        };

        let wrappers = self
            .invokers_by_application
            .entry(node_id.application_id())
            .or_default();

        wrappers.retain(|wrapper| !wrapper.is_delegate(&invoker));
        wrappers.push(PriorityRemoteInvoker::new(load, invoker));
        Ok(())
    }

    fn remove_node(&mut self, node_id: &NodeId) {
        let Some(removed) = self.invokers_by_node.remove(node_id) else {
            return;
        };

        let application_id = node_id.application_id();
        if let Some(wrappers) = self.invokers_by_application.get_mut(&application_id) {
            wrappers.retain(|wrapper| !wrapper.is_delegate(&removed));
            if wrappers.is_empty() {
                self.invokers_by_application.remove(&application_id);
            }
        }

        self.invokers_to_purge.push(removed);
    }

    fn remove_instance(&mut self, instance_id: &InstanceId) {
        let nodes: Vec<NodeId> = self
            .invokers_by_node
            .keys()
            .filter(|node_id| node_id.instance_id() == *instance_id)
            .copied()
            .collect();

        for node_id in &nodes {
            self.remove_node(node_id);
        }
    }

    fn prune(&mut self, retain: &HashSet<NodeId>) {
        let stale: Vec<NodeId> = self
            .invokers_by_node
            .keys()
            .filter(|node_id| !retain.contains(node_id))
            .copied()
            .collect();

        for node_id in &stale {
            self.remove_node(node_id);
        }
    }

    fn sort(&mut self) {
        for wrappers in self.invokers_by_application.values_mut() {
            wrappers.sort();
        }
    }
}

enum Update {
    Add {
        node_id: NodeId,
        load: f64,
        supplier: InvokerSupplier,
        skip_on_failure: bool,
    },
    RemoveNode(NodeId),
    RemoveInstance(InstanceId),
}

/// Current set of remote invokers, indexed by node and by application
#[derive(Clone, Default)]
pub struct RemoteInvokerRegistrySnapshot {
    storage: Arc<RwLock<Arc<Storage>>>,
}

impl RemoteInvokerRegistrySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> Arc<Storage> {
        self.storage.read().clone()
    }

    pub fn get_remote_invoker(&self, node_id: &NodeId) -> Result<Arc<dyn RemoteInvoker>> {
        self.current()
            .invokers_by_node
            .get(node_id)
            .cloned()
            .ok_or_else(|| ClusterError::node_not_found(*node_id))
    }

    /// Least loaded invoker of the application
    pub fn get_best_invoker_for_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<PriorityRemoteInvoker> {
        self.current()
            .invokers_by_application
            .get(application_id)
            .and_then(|wrappers| wrappers.first())
            .cloned()
            .ok_or_else(|| ClusterError::application_not_found(*application_id))
    }

    /// Every invoker of the application, least loaded first
    pub fn get_all_remote_invokers_for_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<PriorityRemoteInvoker>> {
        self.current()
            .invokers_by_application
            .get(application_id)
            .filter(|wrappers| !wrappers.is_empty())
            .cloned()
            .ok_or_else(|| ClusterError::application_not_found(*application_id))
    }

    /// Ordered copy of the node table
    pub fn invokers_by_node(&self) -> BTreeMap<NodeId, Arc<dyn RemoteInvoker>> {
        self.current().invokers_by_node.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.current().invokers_by_node.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.current().closed
    }

    /// Publish an empty, closed storage and purge every invoker it replaced.
    /// Commits after this fail with an illegal state error.
    pub fn clear<F>(&self, cleanup: F)
    where
        F: Fn(&Arc<dyn RemoteInvoker>, Option<&ClusterError>) -> Result<()>,
    {
        let closed = Arc::new(Storage::closed_empty());
        let old = std::mem::replace(&mut *self.storage.write(), closed);
        let invokers: Vec<Arc<dyn RemoteInvoker>> = old.invokers_by_node.values().cloned().collect();
        purge(invokers, &cleanup);
    }

    /// Start a batch of updates
    pub fn refresh(&self) -> RefreshBuilder {
        RefreshBuilder {
            snapshot: self.clone(),
            updates: Vec::new(),
            retain: HashSet::new(),
            prune: false,
        }
    }
}

/// Batch of updates applied atomically by [`commit`](Self::commit)
#[must_use = "updates are only applied by commit"]
pub struct RefreshBuilder {
    snapshot: RemoteInvokerRegistrySnapshot,
    updates: Vec<Update>,
    retain: HashSet<NodeId>,
    prune: bool,
}

impl RefreshBuilder {
    /// Register `node_id` with `load`. `supplier` runs only if the node has no
    /// invoker yet; its failure aborts the commit.
    pub fn add<F>(self, node_id: NodeId, load: f64, supplier: F) -> Self
    where
        F: FnOnce() -> Result<Arc<dyn RemoteInvoker>> + Send + 'static,
    {
        self.push_add(node_id, load, Box::new(supplier), false)
    }

    /// Like [`add`](Self::add), but a failing supplier only skips this node
    pub fn try_add<F>(self, node_id: NodeId, load: f64, supplier: F) -> Self
    where
        F: FnOnce() -> Result<Arc<dyn RemoteInvoker>> + Send + 'static,
    {
        self.push_add(node_id, load, Box::new(supplier), true)
    }

    fn push_add(
        mut self,
        node_id: NodeId,
        load: f64,
        supplier: InvokerSupplier,
        skip_on_failure: bool,
    ) -> Self {
        self.retain.insert(node_id);
        self.updates.push(Update::Add {
            node_id,
            load,
            supplier,
            skip_on_failure,
        });
        self
    }

    pub fn remove_node(mut self, node_id: NodeId) -> Self {
        self.updates.push(Update::RemoveNode(node_id));
        self
    }

    /// Remove every node hosted by the instance
    pub fn remove_instance(mut self, instance_id: InstanceId) -> Self {
        self.updates.push(Update::RemoveInstance(instance_id));
        self
    }

    /// Also remove every node not added in this batch
    pub fn prune(mut self) -> Self {
        self.prune = true;
        self
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && !self.prune
    }

    /// Apply the batch and publish it. A failing [`add`](Self::add) supplier
    /// aborts the commit, leaving the published storage untouched; invokers
    /// created earlier in the batch are then cleaned up. A closed snapshot
    /// rejects the commit before anything is applied.
    ///
    /// Each removed invoker is passed to `cleanup(invoker, None)`; if that
    /// fails, `cleanup(invoker, Some(&error))` is called once more.
    pub fn commit<F>(self, cleanup: F) -> Result<()>
    where
        F: Fn(&Arc<dyn RemoteInvoker>, Option<&ClusterError>) -> Result<()>,
    {
        let RefreshBuilder {
            snapshot,
            updates,
            retain,
            prune,
        } = self;

        let outcome = {
            let mut published = snapshot.storage.write();
            if published.closed {
                return Err(ClusterError::illegal_state("Invoker registry snapshot is closed."));
            }

            let mut update = published.begin();
            match update.apply(updates, &retain, prune) {
                Ok(()) => {
                    let to_purge = std::mem::take(&mut update.invokers_to_purge);
                    update.invokers_created.clear();
                    *published = Arc::new(update);
                    Ok(to_purge)
                }
                Err(err) => Err((err, update.invokers_created)),
            }
        };

        match outcome {
            Ok(to_purge) => {
                debug!(purged = to_purge.len(), "Committed invoker registry update");
                purge(to_purge, &cleanup);
                Ok(())
            }
            Err((err, created)) => {
                warn!(created = created.len(), error = %err, "Aborted invoker registry update");
                purge(created, &cleanup);
                Err(err)
            }
        }
    }
}

fn purge<F>(invokers: Vec<Arc<dyn RemoteInvoker>>, cleanup: &F)
where
    F: Fn(&Arc<dyn RemoteInvoker>, Option<&ClusterError>) -> Result<()>,
{
    for invoker in invokers {
        if let Err(err) = cleanup(&invoker, None) {
            if let Err(second) = cleanup(&invoker, Some(&err)) {
                error!(?invoker, error = %second, "Cleanup failed twice");
            }
        }
    }
}
