//! Cluster Routing
//!
//! Keeps a live table of remote invokers for every node in the cluster and
//! routes invocations to them.
//!
//! - [`discovery`]: instances, their nodes and load, as reported by the cluster
//! - [`registry`]: copy-on-write invoker table reconciled against discovery
//! - [`invoker`]: the contract every remote connection implements
//! - [`routing`] and [`dispatch`]: node selection and fan-out per route

pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod invoker;
pub mod registry;
pub mod routing;

// Re-export commonly used types
pub use error::{ClusterError, Result};

pub use discovery::{
    ConnectionListener, InMemoryConnection, InMemoryConnectionService, InstanceConnection,
    InstanceConnectionService, InvokerFactory, Subscription,
};
pub use dispatch::{DispatchOutcome, InvocationStyle, RemoteInvocationDispatcher};
pub use invoker::{
    ErrorConsumer, InvocationFuture, InvocationOutcome, PriorityRemoteInvoker, RemoteInvoker,
    ResultConsumer,
};
pub use registry::{
    establish_new_connection, RefreshBuilder, RemoteInvokerRegistry,
    RemoteInvokerRegistrySnapshot, SimpleRemoteInvokerRegistry,
};
pub use routing::{
    BestNodeRoutingStrategy, BroadcastRoutingStrategy, ListAggregateRoutingStrategy, Route,
    RouteAddress, RoutingStrategy, SpecificNodeRoutingStrategy, StrategyType,
};
