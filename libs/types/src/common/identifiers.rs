//! # Cluster Identifiers
//!
//! Typed wrappers for the three identifiers the routing layer works with:
//!
//! - [`InstanceId`]: one process in the cluster
//! - [`ApplicationId`]: one application deployed to the cluster
//! - [`NodeId`]: one application-partition hosted by one instance
//!
//! Every instance hosts one node per application it serves, so a cluster with
//! instances `I1, I2` and applications `A1, A2` has four nodes:
//! `(I1, A1)`, `(I1, A2)`, `(I2, A1)`, `(I2, A2)`.
//!
//! ## String Form
//!
//! A [`NodeId`] renders as `{instance}.{application}` using hyphenated UUIDs.
//! This form contains neither `/` nor `://`, so it is always a valid
//! [`Path`](crate::Path) context.
//!
//! ```rust
//! use types::{ApplicationId, InstanceId, NodeId};
//!
//! let node = NodeId::new(InstanceId::random(), ApplicationId::random());
//! let parsed: NodeId = node.to_string().parse().unwrap();
//! assert_eq!(node, parsed);
//! ```

use crate::common::errors::IdentifierError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between the instance and application halves of a [`NodeId`]
pub const NODE_ID_SEPARATOR: char = '.';

/// Macro for generating UUID-backed typed identifiers
///
/// The generated type is `Copy`, ordered, hashable and serializes as the bare
/// UUID string.
#[macro_export]
macro_rules! define_uuid_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            serde::Serialize,
            serde::Deserialize
        )]
        #[serde(transparent)]
        #[repr(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Wrap an existing UUID
            #[inline(always)]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Generate a random identifier
            pub fn random() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Extract the UUID
            #[inline(always)]
            pub const fn uuid(&self) -> uuid::Uuid {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0.hyphenated())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::common::errors::IdentifierError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| $crate::common::errors::IdentifierError::InvalidUuid {
                        input: s.to_string(),
                    })
            }
        }

        impl From<uuid::Uuid> for $name {
            #[inline(always)]
            fn from(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for uuid::Uuid {
            #[inline(always)]
            fn from(id: $name) -> uuid::Uuid {
                id.0
            }
        }
    };
}

define_uuid_id! {
    /// Identifies one process hosting any number of nodes
    InstanceId
}

define_uuid_id! {
    /// Identifies one application deployed across the cluster
    ApplicationId
}

/// Identifies one application-partition running inside one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId {
    instance: InstanceId,
    application: ApplicationId,
}

impl NodeId {
    pub const fn new(instance: InstanceId, application: ApplicationId) -> Self {
        Self {
            instance,
            application,
        }
    }

    /// The master node of an instance: its application id equals the instance
    /// UUID, so it can be addressed knowing only the instance.
    pub fn for_master_node(instance: InstanceId) -> Self {
        Self::new(instance, ApplicationId::from_uuid(instance.uuid()))
    }

    /// Random node id, mostly useful in tests
    pub fn random() -> Self {
        Self::new(InstanceId::random(), ApplicationId::random())
    }

    pub const fn instance_id(&self) -> InstanceId {
        self.instance
    }

    pub const fn application_id(&self) -> ApplicationId {
        self.application
    }

    pub fn is_master_node(&self) -> bool {
        self.instance.uuid() == self.application.uuid()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.instance, NODE_ID_SEPARATOR, self.application)
    }
}

impl FromStr for NodeId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (instance, application) =
            trimmed
                .split_once(NODE_ID_SEPARATOR)
                .ok_or_else(|| IdentifierError::MalformedNodeId {
                    input: s.to_string(),
                    reason: format!("missing '{}' separator", NODE_ID_SEPARATOR),
                })?;

        if application.contains(NODE_ID_SEPARATOR) {
            return Err(IdentifierError::MalformedNodeId {
                input: s.to_string(),
                reason: "more than two segments".to_string(),
            });
        }

        Ok(Self::new(instance.parse()?, application.parse()?))
    }
}

impl TryFrom<String> for NodeId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NodeId> for String {
    fn from(node: NodeId) -> Self {
        node.to_string()
    }
}

impl From<(InstanceId, ApplicationId)> for NodeId {
    fn from((instance, application): (InstanceId, ApplicationId)) -> Self {
        Self::new(instance, application)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_string_roundtrip() {
        let node = NodeId::random();
        let text = node.to_string();

        assert!(text.contains(NODE_ID_SEPARATOR));
        assert!(!text.contains('/'));
        assert_eq!(text.parse::<NodeId>().unwrap(), node);
    }

    #[test]
    fn test_node_id_components() {
        let instance = InstanceId::random();
        let application = ApplicationId::random();
        let node = NodeId::new(instance, application);

        assert_eq!(node.instance_id(), instance);
        assert_eq!(node.application_id(), application);
        assert!(!node.is_master_node());
    }

    #[test]
    fn test_master_node() {
        let instance = InstanceId::random();
        let master = NodeId::for_master_node(instance);

        assert!(master.is_master_node());
        assert_eq!(master.application_id().uuid(), instance.uuid());
    }

    #[test]
    fn test_malformed_node_ids() {
        assert!(matches!(
            "not-a-node".parse::<NodeId>(),
            Err(IdentifierError::MalformedNodeId { .. })
        ));
        assert!(matches!(
            "abc.def".parse::<NodeId>(),
            Err(IdentifierError::InvalidUuid { .. })
        ));

        let node = NodeId::random();
        let three = format!("{}.{}", node, uuid::Uuid::new_v4());
        assert!(matches!(
            three.parse::<NodeId>(),
            Err(IdentifierError::MalformedNodeId { .. })
        ));
    }

    #[test]
    fn test_node_id_serde() {
        let node = NodeId::random();
        let json = serde_json::to_string(&node).unwrap();

        assert_eq!(json, format!("\"{}\"", node));
        assert_eq!(serde_json::from_str::<NodeId>(&json).unwrap(), node);
    }
}
