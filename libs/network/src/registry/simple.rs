//! Registry backed by an [`InstanceConnectionService`]

use super::snapshot::{RefreshBuilder, RemoteInvokerRegistrySnapshot};
use super::RemoteInvokerRegistry;
use crate::discovery::{InstanceConnection, InstanceConnectionService, InvokerFactory, Subscription};
use crate::invoker::RemoteInvoker;
use crate::{ClusterError, Result};
use async_trait::async_trait;
use cluster_config::RegistrySettings;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use std::fmt::Write as _;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn, Level};
use types::{ApplicationId, InstanceId, NodeId};

/// Resolve the node's address, create an invoker and start it
pub fn establish_new_connection(
    node_id: &NodeId,
    connection: &dyn InstanceConnection,
    invoker_factory: &dyn InvokerFactory,
    connect_timeout: Option<Duration>,
) -> Result<Arc<dyn RemoteInvoker>> {
    let address = connection.open_route_to_node(node_id)?;
    let invoker = invoker_factory.create();

    info!(%node_id, %address, "Connecting to node");
    invoker.start(&address, connect_timeout)?;
    Ok(invoker)
}

/// Cleanup used for every purge: stop the invoker, log if that failed
fn stop_and_log(invoker: &Arc<dyn RemoteInvoker>, error: Option<&ClusterError>) -> Result<()> {
    match error {
        None => {
            info!(?invoker, "Cleaning up");
            invoker.stop()
        }
        Some(err) => {
            error!(?invoker, error = %err, "Failed to stop remote invoker");
            Ok(())
        }
    }
}

enum RegistryState {
    Stopped,
    Running(RegistryContext),
}

/// Everything owned by one run of the registry
struct RegistryContext {
    worker: Arc<RegistryWorker>,
    shutdown: watch::Sender<bool>,
    subscriptions: Vec<Subscription>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    listeners: Arc<Mutex<JoinSet<()>>>,
}

impl RegistryContext {
    async fn shutdown(self, timeout: Duration) {
        let RegistryContext {
            worker,
            shutdown,
            subscriptions,
            tasks,
            listeners,
        } = self;

        for subscription in subscriptions {
            subscription.unsubscribe();
        }
        let _ = shutdown.send(true);
        let mut listeners = std::mem::take(&mut *listeners.lock());

        let deadline = Instant::now() + timeout;
        for (name, task) in tasks {
            match tokio::time::timeout_at(deadline, task).await {
                Ok(Ok(())) => debug!(task = name, "Registry task stopped"),
                Ok(Err(err)) => warn!(task = name, error = %err, "Registry task failed"),
                Err(_) => warn!(
                    task = name,
                    timeout_ms = timeout.as_millis() as u64,
                    "Registry task did not stop in time, abandoning it"
                ),
            }
        }

        loop {
            match tokio::time::timeout_at(deadline, listeners.join_next()).await {
                Ok(Some(Ok(()))) => {}
                Ok(Some(Err(err))) => warn!(error = %err, "Discovery listener task failed"),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        pending = listeners.len(),
                        timeout_ms = timeout.as_millis() as u64,
                        "Discovery listeners did not finish in time, abandoning them"
                    );
                    listeners.detach_all();
                    break;
                }
            }
        }

        let snapshot = worker.snapshot.clone();
        if let Err(err) = tokio::task::spawn_blocking(move || snapshot.clear(stop_and_log)).await {
            error!(error = %err, "Failed to clear invoker registry");
        }
    }
}

/// Reconciliation logic shared by the refresher and the discovery listeners
struct RegistryWorker {
    snapshot: RemoteInvokerRegistrySnapshot,
    settings: RegistrySettings,
    connection_service: Arc<dyn InstanceConnectionService>,
    invoker_factory: Arc<dyn InvokerFactory>,
    shutdown: watch::Receiver<bool>,
}

impl RegistryWorker {
    fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Register every node of every live connection and drop the rest
    async fn refresh(&self) -> Result<()> {
        let connections = self.connection_service.active_connections();
        let reads = join_all(connections.iter().map(|c| self.read_metadata(c)));

        let total_timeout = self.settings.total_refresh_timeout();
        let metadata = match tokio::time::timeout(total_timeout, reads).await {
            Ok(metadata) => metadata,
            Err(_) => {
                info!(
                    timeout_ms = self.settings.total_refresh_timeout_ms,
                    "Timed out. Skipping refresh this cycle."
                );
                return Ok(());
            }
        };

        let mut builder = self.snapshot.refresh();
        for (connection, metadata) in connections.iter().zip(metadata) {
            if let Some((load, node_ids)) = metadata {
                builder = self.queue_adds(builder, connection, load, node_ids);
            }
        }

        debug!(connections = connections.len(), "Refreshing invoker registry");
        self.commit(builder.prune()).await
    }

    async fn on_connect(&self, connection: Arc<dyn InstanceConnection>) {
        if self.is_shutting_down() || self.snapshot.is_closed() {
            return;
        }

        let instance_id = connection.instance_id();
        let Some((load, node_ids)) = self.read_metadata(&connection).await else {
            return;
        };

        let builder = self.queue_adds(self.snapshot.refresh(), &connection, load, node_ids);
        if let Err(err) = self.commit(builder).await {
            warn!(%instance_id, error = %err, "Failed to register connected instance");
        }
    }

    async fn on_disconnect(&self, instance_id: InstanceId) {
        if self.is_shutting_down() {
            return;
        }

        let builder = self.snapshot.refresh().remove_instance(instance_id);
        if let Err(err) = self.commit(builder).await {
            warn!(%instance_id, error = %err, "Failed to remove disconnected instance");
        }
    }

    /// Load and node ids of one connection, or `None` if either read failed
    async fn read_metadata(
        &self,
        connection: &Arc<dyn InstanceConnection>,
    ) -> Option<(f64, Vec<NodeId>)> {
        let instance_id = connection.instance_id();
        let read = async {
            let load = connection.instance_load().await?;
            let node_ids = connection.node_ids().await?;
            Ok::<_, ClusterError>((load, node_ids))
        };

        match tokio::time::timeout(self.settings.metadata_timeout(), read).await {
            Ok(Ok(metadata)) => Some(metadata),
            Ok(Err(err)) => {
                warn!(%instance_id, error = %err, "Failed to read instance metadata, skipping");
                None
            }
            Err(_) => {
                warn!(
                    %instance_id,
                    timeout_ms = self.settings.metadata_timeout_ms,
                    "Timed out reading instance metadata, skipping"
                );
                None
            }
        }
    }

    fn queue_adds(
        &self,
        mut builder: RefreshBuilder,
        connection: &Arc<dyn InstanceConnection>,
        load: f64,
        node_ids: Vec<NodeId>,
    ) -> RefreshBuilder {
        for node_id in node_ids {
            let connection = connection.clone();
            let invoker_factory = self.invoker_factory.clone();
            let connect_timeout = self.settings.connect_timeout();

            builder = builder.try_add(node_id, load, move || {
                establish_new_connection(
                    &node_id,
                    connection.as_ref(),
                    invoker_factory.as_ref(),
                    connect_timeout,
                )
            });
        }
        builder
    }

    /// Commit on the blocking pool; new invokers are started under the lock
    async fn commit(&self, builder: RefreshBuilder) -> Result<()> {
        tokio::task::spawn_blocking(move || builder.commit(stop_and_log))
            .await
            .map_err(|err| ClusterError::illegal_state(format!("registry commit failed: {}", err)))?
    }

    /// Run a discovery notification as a tracked listener task
    fn spawn_listener<F>(&self, listeners: &Mutex<JoinSet<()>>, handle: &Handle, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_shutting_down() {
            return;
        }

        let mut listeners = listeners.lock();
        while listeners.try_join_next().is_some() {}
        listeners.spawn_on(task, handle);
    }

    fn report(&self) {
        if !tracing::enabled!(Level::INFO) {
            return;
        }

        let table = self.snapshot.invokers_by_node();
        let mut report = String::from("Invocation Table:");
        for (node_id, invoker) in &table {
            let _ = write!(report, "\n  {} -> {:?}", node_id, invoker);
        }
        info!(nodes = table.len(), "{}", report);
    }
}

async fn run_refresher(
    worker: Arc<RegistryWorker>,
    mut shutdown: watch::Receiver<bool>,
    ready: oneshot::Sender<()>,
) {
    let mut ticker = tokio::time::interval(worker.settings.refresh_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ready = Some(ready);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = worker.refresh().await {
                    warn!(error = %err, "Invoker registry refresh failed");
                }
                if let Some(ready) = ready.take() {
                    let _ = ready.send(());
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

async fn run_reporter(worker: Arc<RegistryWorker>, mut shutdown: watch::Receiver<bool>) {
    let period = worker.settings.report_interval();
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => worker.report(),
            _ = shutdown.changed() => break,
        }
    }
}

/// Registry that reconciles against an [`InstanceConnectionService`]
pub struct SimpleRemoteInvokerRegistry {
    settings: RegistrySettings,
    connection_service: Arc<dyn InstanceConnectionService>,
    invoker_factory: Arc<dyn InvokerFactory>,
    state: RwLock<RegistryState>,
}

impl SimpleRemoteInvokerRegistry {
    pub fn new(
        settings: RegistrySettings,
        connection_service: Arc<dyn InstanceConnectionService>,
        invoker_factory: Arc<dyn InvokerFactory>,
    ) -> Result<Self> {
        settings
            .validate()
            .map_err(|err| ClusterError::configuration(err.to_string(), Some("registry")))?;

        Ok(Self {
            settings,
            connection_service,
            invoker_factory,
            state: RwLock::new(RegistryState::Stopped),
        })
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    fn worker(&self) -> Result<Arc<RegistryWorker>> {
        match &*self.state.read() {
            RegistryState::Running(context) => Ok(context.worker.clone()),
            RegistryState::Stopped => Err(ClusterError::illegal_state("Not running.")),
        }
    }

    fn snapshot(&self) -> Result<RemoteInvokerRegistrySnapshot> {
        self.worker().map(|worker| worker.snapshot.clone())
    }

    /// Subscribe listeners and spawn background tasks. Runs under the state
    /// lock so that concurrent starts cannot both succeed.
    fn launch(&self) -> Result<oneshot::Receiver<()>> {
        let mut state = self.state.write();
        if let RegistryState::Running(_) = &*state {
            return Err(ClusterError::illegal_state("Already started."));
        }

        let handle = Handle::try_current().map_err(|_| {
            ClusterError::illegal_state("Registry must be started within a tokio runtime.")
        })?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = Arc::new(RegistryWorker {
            snapshot: RemoteInvokerRegistrySnapshot::new(),
            settings: self.settings.clone(),
            connection_service: self.connection_service.clone(),
            invoker_factory: self.invoker_factory.clone(),
            shutdown: shutdown_rx.clone(),
        });

        let listeners = Arc::new(Mutex::new(JoinSet::new()));

        let on_connect = {
            let (worker, handle, listeners) = (worker.clone(), handle.clone(), listeners.clone());
            self.connection_service
                .subscribe_to_connect(Arc::new(move |connection: Arc<dyn InstanceConnection>| {
                    let task = {
                        let worker = worker.clone();
                        async move { worker.on_connect(connection).await }
                    };
                    worker.spawn_listener(&listeners, &handle, task);
                }))
        };

        let on_disconnect = {
            let (worker, handle, listeners) = (worker.clone(), handle.clone(), listeners.clone());
            self.connection_service
                .subscribe_to_disconnect(Arc::new(move |connection: Arc<dyn InstanceConnection>| {
                    let instance_id = connection.instance_id();
                    let task = {
                        let worker = worker.clone();
                        async move { worker.on_disconnect(instance_id).await }
                    };
                    worker.spawn_listener(&listeners, &handle, task);
                }))
        };

        let (ready_tx, ready_rx) = oneshot::channel();
        let refresher = handle.spawn(run_refresher(worker.clone(), shutdown_rx.clone(), ready_tx));
        let reporter = handle.spawn(run_reporter(worker.clone(), shutdown_rx));

        *state = RegistryState::Running(RegistryContext {
            worker,
            shutdown: shutdown_tx,
            subscriptions: vec![on_connect, on_disconnect],
            tasks: vec![("refresher", refresher), ("reporter", reporter)],
            listeners,
        });

        info!(
            refresh_interval_ms = self.settings.refresh_interval_ms,
            "Invoker registry started"
        );
        Ok(ready_rx)
    }
}

#[async_trait]
impl RemoteInvokerRegistry for SimpleRemoteInvokerRegistry {
    async fn start(&self) -> Result<()> {
        let ready = self.launch()?;
        ready
            .await
            .map_err(|_| ClusterError::illegal_state("Stopped before the first refresh completed."))
    }

    async fn stop(&self) -> Result<()> {
        let previous = std::mem::replace(&mut *self.state.write(), RegistryState::Stopped);
        let context = match previous {
            RegistryState::Running(context) => context,
            RegistryState::Stopped => return Err(ClusterError::illegal_state("Not running.")),
        };

        context.shutdown(self.settings.shutdown_timeout()).await;
        info!("Invoker registry stopped");
        Ok(())
    }

    async fn refresh(&self) -> Result<()> {
        self.worker()?.refresh().await
    }

    fn is_running(&self) -> bool {
        matches!(&*self.state.read(), RegistryState::Running(_))
    }

    fn get_remote_invoker(&self, node_id: &NodeId) -> Result<Arc<dyn RemoteInvoker>> {
        self.snapshot()?.get_remote_invoker(node_id)
    }

    fn get_any_remote_invoker(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Arc<dyn RemoteInvoker>> {
        self.snapshot()?
            .get_best_invoker_for_application(application_id)
            .map(|best| best.into_delegate())
    }

    fn get_all_remote_invokers(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<Arc<dyn RemoteInvoker>>> {
        let all = self
            .snapshot()?
            .get_all_remote_invokers_for_application(application_id)?;
        Ok(all.into_iter().map(|wrapper| wrapper.into_delegate()).collect())
    }

    fn register_remote_invoker(
        &self,
        node_id: NodeId,
        load: f64,
        invoker: Arc<dyn RemoteInvoker>,
    ) -> Result<()> {
        let snapshot = self.snapshot()?;
        let supplied = Arc::new(AtomicBool::new(false));
        let supplier = {
            let (supplied, invoker) = (supplied.clone(), invoker.clone());
            move || {
                supplied.store(true, Ordering::SeqCst);
                Ok(invoker)
            }
        };

        snapshot
            .refresh()
            .add(node_id, load, supplier)
            .commit(stop_and_log)?;

        if supplied.load(Ordering::SeqCst) {
            return Ok(());
        }

        // the node kept its existing invoker; stop the offered one unless it is that invoker
        let kept = snapshot.get_remote_invoker(&node_id).is_ok_and(|existing| {
            Arc::as_ptr(&existing) as *const () == Arc::as_ptr(&invoker) as *const ()
        });
        if !kept {
            debug!(%node_id, "Node already registered, stopping the offered invoker");
            if let Err(err) = stop_and_log(&invoker, None) {
                stop_and_log(&invoker, Some(&err))?;
            }
        }
        Ok(())
    }

    fn unregister_remote_invoker(&self, node_id: &NodeId) -> Result<()> {
        self.snapshot()?
            .refresh()
            .remove_node(*node_id)
            .commit(stop_and_log)
    }
}

impl Drop for SimpleRemoteInvokerRegistry {
    fn drop(&mut self) {
        if let RegistryState::Running(context) = &*self.state.get_mut() {
            let _ = context.shutdown.send(true);
            warn!("Invoker registry dropped while running; invokers were not stopped");
        }
    }
}
