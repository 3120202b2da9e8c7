//! Invocation Routing
//!
//! ## Purpose
//! Decides which registered invokers receive an invocation. A [`Route`] pairs
//! an address with a [`StrategyType`]; the dispatcher resolves the strategy
//! and the strategy resolves invokers from the shared registry.
//!
//! | strategy | targets | primary result |
//! |---|---|---|
//! | [`BestNodeRoutingStrategy`] | least loaded node of the application | that node's |
//! | [`SpecificNodeRoutingStrategy`] | the addressed node | that node's |
//! | [`BroadcastRoutingStrategy`] | every node of the application | `null` |
//! | [`ListAggregateRoutingStrategy`] | every node of the application | concatenated arrays |

pub mod best_node;
pub mod broadcast;
pub mod list_aggregate;
pub mod specific_node;

pub use best_node::BestNodeRoutingStrategy;
pub use broadcast::BroadcastRoutingStrategy;
pub use list_aggregate::ListAggregateRoutingStrategy;
pub use specific_node::SpecificNodeRoutingStrategy;

use crate::invoker::{ErrorConsumer, InvocationFuture, ResultConsumer};
use crate::{ClusterError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use types::{ApplicationId, Invocation, NodeId, Path};

/// Destination of a routed invocation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteAddress {
    Application(ApplicationId),
    Node(NodeId),
    /// Path whose context names a node
    Path(Path),
}

impl RouteAddress {
    /// Application the address belongs to
    pub fn application_id(&self) -> Result<ApplicationId> {
        match self {
            Self::Application(application_id) => Ok(*application_id),
            Self::Node(node_id) => Ok(node_id.application_id()),
            Self::Path(_) => self.node_id().map(|node_id| node_id.application_id()),
        }
    }

    /// Node the address names. Application addresses name no node.
    pub fn node_id(&self) -> Result<NodeId> {
        match self {
            Self::Node(node_id) => Ok(*node_id),
            Self::Path(path) => path.node_id()?.ok_or_else(|| {
                ClusterError::invalid_route(format!("path '{}' does not name a node", path))
            }),
            Self::Application(application_id) => Err(ClusterError::invalid_route(format!(
                "application {} does not name a node",
                application_id
            ))),
        }
    }
}

impl fmt::Display for RouteAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Application(application_id) => fmt::Display::fmt(application_id, f),
            Self::Node(node_id) => fmt::Display::fmt(node_id, f),
            Self::Path(path) => fmt::Display::fmt(path, f),
        }
    }
}

impl From<ApplicationId> for RouteAddress {
    fn from(application_id: ApplicationId) -> Self {
        Self::Application(application_id)
    }
}

impl From<NodeId> for RouteAddress {
    fn from(node_id: NodeId) -> Self {
        Self::Node(node_id)
    }
}

impl From<Path> for RouteAddress {
    fn from(path: Path) -> Self {
        Self::Path(path)
    }
}

/// Node selection and fan-out policy
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyType {
    BestNode,
    SpecificNode,
    Broadcast,
    ListAggregate,
    Custom(String),
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BestNode => f.write_str("best-node"),
            Self::SpecificNode => f.write_str("specific-node"),
            Self::Broadcast => f.write_str("broadcast"),
            Self::ListAggregate => f.write_str("list-aggregate"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

impl FromStr for StrategyType {
    type Err = std::convert::Infallible;

    /// Built-in names map to their variants, anything else is custom
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "best-node" => Self::BestNode,
            "specific-node" => Self::SpecificNode,
            "broadcast" => Self::Broadcast,
            "list-aggregate" => Self::ListAggregate,
            other => Self::Custom(other.to_string()),
        })
    }
}

/// Address plus the strategy that interprets it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    pub address: RouteAddress,
    pub strategy: StrategyType,
}

impl Route {
    pub fn new(address: impl Into<RouteAddress>, strategy: StrategyType) -> Self {
        Self {
            address: address.into(),
            strategy,
        }
    }

    pub fn best_node(application_id: ApplicationId) -> Self {
        Self::new(application_id, StrategyType::BestNode)
    }

    pub fn specific_node(node_id: NodeId) -> Self {
        Self::new(node_id, StrategyType::SpecificNode)
    }

    pub fn broadcast(application_id: ApplicationId) -> Self {
        Self::new(application_id, StrategyType::Broadcast)
    }

    pub fn list_aggregate(application_id: ApplicationId) -> Self {
        Self::new(application_id, StrategyType::ListAggregate)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.strategy, self.address)
    }
}

/// Policy that picks invokers for an address and performs the call.
///
/// Resolution failures (unknown node, malformed address) are returned
/// directly by every style. Failures of the call itself follow the style:
/// returned by `invoke_sync`, carried by the future of `invoke_future`,
/// delivered to the error consumer by `invoke_async`.
pub trait RoutingStrategy: Send + Sync {
    fn strategy_type(&self) -> StrategyType;

    /// Block until the primary result arrives. Must not run on a tokio
    /// worker thread.
    fn invoke_sync(
        &self,
        address: &RouteAddress,
        invocation: Invocation,
        result_consumers: Vec<ResultConsumer>,
        error_consumer: ErrorConsumer,
    ) -> Result<Value>;

    /// Fire and forget
    fn invoke_async(
        &self,
        address: &RouteAddress,
        invocation: Invocation,
        result_consumers: Vec<ResultConsumer>,
        error_consumer: ErrorConsumer,
    ) -> Result<()>;

    /// Start the call now and return a handle to its primary result
    fn invoke_future(
        &self,
        address: &RouteAddress,
        invocation: Invocation,
        result_consumers: Vec<ResultConsumer>,
        error_consumer: ErrorConsumer,
    ) -> Result<InvocationFuture>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_resolution() {
        let node = NodeId::random();

        let by_node = RouteAddress::from(node);
        assert_eq!(by_node.node_id().unwrap(), node);
        assert_eq!(by_node.application_id().unwrap(), node.application_id());

        let by_path = RouteAddress::from(Path::from_node_and_components(Some(&node), ["orders"]).unwrap());
        assert_eq!(by_path.node_id().unwrap(), node);
        assert_eq!(by_path.application_id().unwrap(), node.application_id());

        let by_application = RouteAddress::from(node.application_id());
        assert_eq!(by_application.application_id().unwrap(), node.application_id());
        assert!(by_application.node_id().unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_path_without_node_context() {
        let relative = RouteAddress::from(Path::parse("/a/b").unwrap());
        assert!(matches!(relative.node_id(), Err(ClusterError::InvalidRoute { .. })));

        let wildcard = RouteAddress::from(Path::parse("*://a").unwrap());
        assert!(wildcard.application_id().is_err());

        let not_a_node = RouteAddress::from(Path::parse("orders://a").unwrap());
        assert!(matches!(
            not_a_node.node_id(),
            Err(ClusterError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_strategy_type_names() {
        for strategy in [
            StrategyType::BestNode,
            StrategyType::SpecificNode,
            StrategyType::Broadcast,
            StrategyType::ListAggregate,
            StrategyType::Custom("round-robin".into()),
        ] {
            let parsed: StrategyType = strategy.to_string().parse().unwrap();
            assert_eq!(parsed, strategy);
        }
    }
}
