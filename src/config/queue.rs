//! Queue configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning knobs for the build queue.
///
/// # Example
///
/// ```
/// use forge_queue::config::QueueConfig;
///
/// let config = QueueConfig::new()
///     .with_root_dir("/var/lib/forge")
///     .with_maintenance_interval_secs(5);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Controller root directory; the queue snapshot lives at
    /// `<root_dir>/queue.txt`.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Seconds between maintenance ticks.
    ///
    /// The ticker only matters when every executor is busy; parked executors
    /// re-evaluate due dates on their own.
    #[serde(default = "default_maintenance_interval_secs")]
    pub maintenance_interval_secs: u64,

    /// Agent count above which the deployment counts as large. Large
    /// deployments keep the controller node free for coordination.
    #[serde(default = "default_large_deployment_agents")]
    pub large_deployment_agents: usize,

    /// Estimated duration above which a task counts as long, in
    /// milliseconds. Long tasks are steered away from the controller node.
    #[serde(default = "default_long_task_ms")]
    pub long_task_ms: u64,

    /// Lower bound on a parked executor's timed sleep, in milliseconds.
    #[serde(default = "default_min_park_ms")]
    pub min_park_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            maintenance_interval_secs: default_maintenance_interval_secs(),
            large_deployment_agents: default_large_deployment_agents(),
            long_task_ms: default_long_task_ms(),
            min_park_ms: default_min_park_ms(),
        }
    }
}

impl QueueConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the controller root directory.
    #[must_use]
    pub fn with_root_dir(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.root_dir = root_dir.into();
        self
    }

    /// Sets the maintenance tick interval in seconds.
    #[must_use]
    pub fn with_maintenance_interval_secs(mut self, secs: u64) -> Self {
        self.maintenance_interval_secs = secs;
        self
    }

    /// Sets the large-deployment agent threshold.
    #[must_use]
    pub fn with_large_deployment_agents(mut self, agents: usize) -> Self {
        self.large_deployment_agents = agents;
        self
    }

    /// Sets the long-task threshold in milliseconds.
    #[must_use]
    pub fn with_long_task_ms(mut self, ms: u64) -> Self {
        self.long_task_ms = ms;
        self
    }

    /// The maintenance tick interval as a `Duration`.
    #[must_use]
    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }

    /// Path of the queue snapshot file.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.root_dir.join("queue.txt")
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.maintenance_interval_secs == 0 {
            return Err("maintenance_interval_secs must be greater than 0".into());
        }
        if self.min_park_ms == 0 {
            return Err("min_park_ms must be greater than 0".into());
        }
        if self.root_dir == Path::new("") {
            return Err("root_dir must not be empty".into());
        }
        Ok(())
    }

    /// Parses a configuration from a JSON string and validates it.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let config: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        config.validate()?;
        Ok(config)
    }
}

fn default_root_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Default seconds between maintenance ticks.
fn default_maintenance_interval_secs() -> u64 {
    5
}

/// Default agent count above which the controller is kept free.
fn default_large_deployment_agents() -> usize {
    10
}

/// Default long-task threshold: 15 minutes.
fn default_long_task_ms() -> u64 {
    15 * 60 * 1000
}

/// Default minimum parked sleep: avoids a zero-length wait.
fn default_min_park_ms() -> u64 {
    100
}
