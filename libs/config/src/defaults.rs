//! Default values for the cluster routing layer
//!
//! Used as serde defaults when a configuration file omits a setting.

/// Remote invoker registry defaults
pub mod registry {
    /// Interval between full discovery refreshes (milliseconds)
    pub const REFRESH_INTERVAL_MS: u64 = 5_000;

    /// Time to wait for background tasks on stop (milliseconds)
    pub const SHUTDOWN_TIMEOUT_MS: u64 = 60_000;

    /// Bound on each per-connection metadata read (milliseconds)
    pub const METADATA_TIMEOUT_MS: u64 = 1_000;

    /// Bound on the whole metadata phase of one refresh (milliseconds)
    pub const TOTAL_REFRESH_TIMEOUT_MS: u64 = 3_000;

    /// Interval between invocation table reports (milliseconds)
    pub const REPORT_INTERVAL_MS: u64 = 15_000;
}

/// Logging defaults
pub mod logging {
    /// Filter used when `RUST_LOG` is unset
    pub const LEVEL: &str = "info";
}

/// Environment variable prefix for overrides, e.g.
/// `CLUSTER_REGISTRY__REFRESH_INTERVAL_MS=1000`
pub const ENV_PREFIX: &str = "CLUSTER";

/// Default base configuration file
pub const CONFIG_FILE: &str = "config/cluster.toml";
