//! Cluster Error Types
//!
//! Error handling for registry lookups, lifecycle misuse, routing and
//! invocation failures.

use thiserror::Error;
use types::{ApplicationId, IdentifierError, InvocationError, NodeId, PathError};

/// Main cluster error type
#[derive(Error, Debug)]
pub enum ClusterError {
    /// No invoker is registered for the node
    #[error("No remote invoker for node {node_id}")]
    NodeNotFound { node_id: NodeId },

    /// No invoker is registered for any node of the application
    #[error("Unknown application: {application_id}")]
    ApplicationNotFound { application_id: ApplicationId },

    /// Operation not valid in the current lifecycle state
    #[error("Illegal state: {message}")]
    IllegalState { message: String },

    /// Malformed path argument
    #[error("Invalid path: {0}")]
    InvalidPath(#[from] PathError),

    /// Malformed identifier argument
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(#[from] IdentifierError),

    /// Route address cannot be resolved by the chosen strategy
    #[error("Invalid route: {message}")]
    InvalidRoute { message: String },

    /// No strategy registered for the route's strategy type
    #[error("No routing strategy registered for '{strategy}'")]
    UnknownStrategy { strategy: String },

    /// Connection establishment or discovery errors
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Bounded operation did not complete in time
    #[error("Timeout error: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Remote call failed
    #[error("Invocation error: {0}")]
    Invocation(#[from] InvocationError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },
}

/// Result type alias for cluster operations
pub type Result<T> = std::result::Result<T, ClusterError>;

impl ClusterError {
    pub fn node_not_found(node_id: NodeId) -> Self {
        Self::NodeNotFound { node_id }
    }

    pub fn application_not_found(application_id: ApplicationId) -> Self {
        Self::ApplicationNotFound { application_id }
    }

    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    pub fn invalid_route(message: impl Into<String>) -> Self {
        Self::InvalidRoute {
            message: message.into(),
        }
    }

    pub fn unknown_strategy(strategy: impl Into<String>) -> Self {
        Self::UnknownStrategy {
            strategy: strategy.into(),
        }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: field.map(|s| s.to_string()),
        }
    }

    /// Node or application lookup failed
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NodeNotFound { .. } | Self::ApplicationNotFound { .. }
        )
    }

    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Self::IllegalState { .. })
    }

    /// Malformed caller input rather than a cluster condition
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::InvalidPath(_) | Self::InvalidIdentifier(_) | Self::InvalidRoute { .. }
        )
    }
}
