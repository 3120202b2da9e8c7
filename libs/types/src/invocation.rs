//! # Invocation Data
//!
//! Call descriptors and outcomes exchanged with remote invokers. None of these
//! types carry identity beyond their contents; parameters and results travel
//! as [`serde_json::Value`] so any serde type can cross the wire.
//!
//! Service calls are described through [`InvocationBuilder`]:
//!
//! ```rust
//! use types::Invocation;
//!
//! let invocation = Invocation::builder("InventoryService", "reserve")
//!     .name("primary")
//!     .parameter(&"sku-42")
//!     .unwrap()
//!     .parameter(&3u32)
//!     .unwrap()
//!     .build();
//!
//! assert_eq!(invocation.parameters().len(), 2);
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Description of one remote method call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    type_name: String,
    name: Option<String>,
    method: String,
    parameters: Vec<Value>,
}

impl Invocation {
    pub fn new(
        type_name: impl Into<String>,
        name: Option<String>,
        method: impl Into<String>,
        parameters: Vec<Value>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            name,
            method: method.into(),
            parameters,
        }
    }

    pub fn builder(type_name: impl Into<String>, method: impl Into<String>) -> InvocationBuilder {
        InvocationBuilder::new(type_name, method)
    }

    /// Fully qualified service type
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Named service instance, when more than one is bound
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}[{}].{}", self.type_name, name, self.method),
            None => write!(f, "{}.{}", self.type_name, self.method),
        }
    }
}

/// Typed builder for [`Invocation`] descriptors
#[derive(Debug, Clone)]
pub struct InvocationBuilder {
    type_name: String,
    name: Option<String>,
    method: String,
    parameters: Vec<Value>,
}

impl InvocationBuilder {
    pub fn new(type_name: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: None,
            method: method.into(),
            parameters: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Serialize and append one positional parameter
    pub fn parameter<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, InvocationError> {
        let value = serde_json::to_value(value).map_err(|e| {
            InvocationError::internal(format!("failed to serialize parameter: {}", e))
        })?;
        self.parameters.push(value);
        Ok(self)
    }

    /// Append an already encoded parameter
    pub fn parameter_value(mut self, value: Value) -> Self {
        self.parameters.push(value);
        self
    }

    pub fn build(self) -> Invocation {
        Invocation {
            type_name: self.type_name,
            name: self.name,
            method: self.method,
            parameters: self.parameters,
        }
    }
}

/// Successful outcome of an invocation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InvocationResult {
    result: Value,
}

impl InvocationResult {
    pub fn new(result: Value) -> Self {
        Self { result }
    }

    pub fn result(&self) -> &Value {
        &self.result
    }

    pub fn into_result(self) -> Value {
        self.result
    }

    /// Decode the result into a concrete type
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, InvocationError> {
        serde_json::from_value(self.result.clone()).map_err(|e| {
            InvocationError::internal(format!("failed to deserialize result: {}", e))
        })
    }
}

impl From<Value> for InvocationResult {
    fn from(result: Value) -> Self {
        Self::new(result)
    }
}

/// Where an invocation failure originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvocationErrorKind {
    /// The remote method itself failed
    Remote,
    /// The call never completed a round trip
    Transport,
    /// Local failure while preparing or decoding the call
    Internal,
}

impl fmt::Display for InvocationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InvocationErrorKind::Remote => "remote",
            InvocationErrorKind::Transport => "transport",
            InvocationErrorKind::Internal => "internal",
        };
        f.write_str(label)
    }
}

/// Failed outcome of an invocation
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind} invocation failure: {message}")]
pub struct InvocationError {
    kind: InvocationErrorKind,
    message: String,
}

impl InvocationError {
    pub fn new(kind: InvocationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::new(InvocationErrorKind::Remote, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(InvocationErrorKind::Transport, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(InvocationErrorKind::Internal, message)
    }

    pub fn kind(&self) -> InvocationErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
