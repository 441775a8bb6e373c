use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use super::validate_tree_path;
use crate::Error;
use crate::Result;
use crate::TreePath;

/// Scheduling and delivery parameters of the notification engine
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EngineConfig {
    /// Root of the data tree read on every periodic trigger
    #[serde(default = "default_root_path")]
    pub root_path: String,

    /// How long `quiet_close` waits for an in-flight cycle before aborting it
    #[serde(default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,

    /// Jitter accepted when comparing a fire instant against the stop time
    #[serde(default = "default_stop_time_tolerance_ms")]
    pub stop_time_tolerance_ms: u64,

    /// Emit `notification-complete` once a subscription's stop time passes
    #[serde(default = "default_complete_on_stop")]
    pub complete_on_stop: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            close_timeout_ms: default_close_timeout_ms(),
            stop_time_tolerance_ms: default_stop_time_tolerance_ms(),
            complete_on_stop: default_complete_on_stop(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        validate_tree_path(&self.root_path, "engine.root_path")?;

        if self.close_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "engine.close_timeout_ms must be greater than 0".into(),
            )));
        }
        Ok(())
    }

    pub fn root(&self) -> TreePath {
        TreePath::from(self.root_path.as_str())
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    pub fn stop_time_tolerance(&self) -> Duration {
        Duration::from_millis(self.stop_time_tolerance_ms)
    }
}

fn default_root_path() -> String {
    "/".to_string()
}
fn default_close_timeout_ms() -> u64 {
    2000
}
fn default_stop_time_tolerance_ms() -> u64 {
    10
}
fn default_complete_on_stop() -> bool {
    true
}
