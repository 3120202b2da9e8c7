//! # Cluster Routing Types
//!
//! Value types shared by every layer of the cluster routing stack.
//!
//! ## Design Philosophy
//!
//! - **Immutable Values**: paths, identifiers and invocation descriptors are
//!   never mutated once built; derivations produce new values
//! - **Validated at Construction**: a [`Path`] or [`NodeId`] that exists is
//!   well formed, so downstream code never re-checks
//! - **Typed Identifiers**: [`InstanceId`], [`ApplicationId`] and [`NodeId`]
//!   cannot be mixed up even though all are UUID based
//!
//! ## Quick Start
//!
//! ```rust
//! use types::{NodeId, Path};
//!
//! let node = NodeId::random();
//! let path = Path::parse("/inventory/items/*").unwrap().with_node_id(&node);
//!
//! assert_eq!(path.node_id().unwrap(), Some(node));
//! assert!(path.is_wildcard_terminated());
//! ```
//!
//! ## Integration Points
//!
//! - **network**: routes invocations by [`NodeId`] and [`ApplicationId`]
//! - **Wire Format**: [`Path::to_bytes`] is the canonical UTF-8 encoding

pub mod common;
pub mod invocation;
pub mod path;

pub use common::errors::{IdentifierError, PathError};
pub use common::identifiers::{ApplicationId, InstanceId, NodeId, NODE_ID_SEPARATOR};
pub use invocation::{
    Invocation, InvocationBuilder, InvocationError, InvocationErrorKind, InvocationResult,
};
pub use path::{
    Component, Path, CONTEXT_SEPARATOR, EXTENSION_SEPARATOR, PATH_SEPARATOR, WILDCARD,
    WILDCARD_RECURSIVE,
};
