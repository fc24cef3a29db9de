//! Configuration for the projection and sync engine.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`TWINLINK_SYNC__` prefix)
//! 2. Config file (`twinlink.toml`, `[sync]` section)
//! 3. Defaults

use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

/// How a full-tree compile reacts to a failing subtree.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failing subtree and keep compiling its siblings.
    #[default]
    BestEffort,
    /// Abort the compile on the first failure.
    FailFast,
}

/// Engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Behaviour of the initial compile on subtree failures.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Force property value nodes read-only when no owning submodel is
    /// attached (default: true).
    #[serde(default = "default_true")]
    pub read_only_without_submodel: bool,

    /// Upper bound on a single operation invocation.
    #[serde(default = "default_invocation_timeout_ms")]
    pub invocation_timeout_ms: u64,

    /// Capacity of the change event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Offset applied to date-times that carry no zone, in minutes east of UTC.
    #[serde(default)]
    pub default_utc_offset_minutes: i32,

    /// Namespace index for all allocated node ids.
    #[serde(default = "default_namespace_index")]
    pub namespace_index: u16,
}

impl SyncConfig {
    pub fn invocation_timeout(&self) -> Duration {
        Duration::from_millis(self.invocation_timeout_ms)
    }

    /// Load from `<file_prefix>.toml` (optional) and `TWINLINK_SYNC__*`
    /// environment variables. A missing `[sync]` section yields defaults.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("TWINLINK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        match cfg.get::<SyncConfig>("sync") {
            Ok(c) => Ok(c),
            Err(config::ConfigError::NotFound(_)) => Ok(SyncConfig::default()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            read_only_without_submodel: true,
            invocation_timeout_ms: default_invocation_timeout_ms(),
            event_buffer: default_event_buffer(),
            default_utc_offset_minutes: 0,
            namespace_index: default_namespace_index(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_invocation_timeout_ms() -> u64 {
    5_000
}

fn default_event_buffer() -> usize {
    1024
}

fn default_namespace_index() -> u16 {
    2
}
