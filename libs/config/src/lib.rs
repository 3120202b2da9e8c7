//! # Cluster Configuration
//!
//! Configuration management and tracing setup for the cluster routing layer.
//!
//! ## Features
//!
//! - **Registry Settings**: refresh, shutdown, metadata and report timings
//! - **Layered Loading**: TOML file, per-environment overrides, `CLUSTER_`
//!   environment variables
//! - **Tracing**: one call installs the `tracing-subscriber` stack
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cluster_config::{init_tracing, ClusterConfig};
//!
//! let config = ClusterConfig::load(None, Some("production"))?;
//! init_tracing(&config.logging)?;
//!
//! let refresh = config.registry.refresh_interval();
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod cluster_config;
pub mod defaults;
pub mod logging;

// Re-export commonly used types
pub use cluster_config::{load_config, ClusterConfig, LoggingSettings, RegistrySettings};
pub use logging::init_tracing;
