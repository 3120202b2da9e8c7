//! Identifier and error types shared across the workspace

pub mod errors;
pub mod identifiers;
