use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use super::validate_tree_path;
use crate::Datastore;
use crate::Error;
use crate::Result;
use crate::TreePath;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegistryConfig {
    /// Prepended to the allocation counter: "20" gives "200", "201", ...
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,

    /// Mirror subscription records into the data store
    #[serde(default = "default_mirror_enabled")]
    pub mirror_enabled: bool,

    #[serde(default = "default_mirror_partition")]
    pub mirror_partition: Datastore,

    /// Path of the container holding mirrored records
    #[serde(default = "default_mirror_root")]
    pub mirror_root: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            id_prefix: default_id_prefix(),
            mirror_enabled: default_mirror_enabled(),
            mirror_partition: default_mirror_partition(),
            mirror_root: default_mirror_root(),
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.id_prefix.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "registry.id_prefix cannot be empty".into(),
            )));
        }

        let root = validate_tree_path(&self.mirror_root, "registry.mirror_root")?;
        if self.mirror_enabled && root.is_root() {
            return Err(Error::Config(ConfigError::Message(
                "registry.mirror_root cannot be the tree root when mirroring is enabled".into(),
            )));
        }
        Ok(())
    }

    pub fn mirror_root(&self) -> TreePath {
        TreePath::from(self.mirror_root.as_str())
    }
}

fn default_id_prefix() -> String {
    "20".to_string()
}
fn default_mirror_enabled() -> bool {
    true
}
fn default_mirror_partition() -> Datastore {
    Datastore::Operational
}
fn default_mirror_root() -> String {
    "/subscriptions".to_string()
}
