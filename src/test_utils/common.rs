use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::DataNode;
use crate::DataStore;
use crate::Datastore;
use crate::MemDataStore;
use crate::TreePath;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

/// Operational tree with a single interface counter.
pub fn interface_tree(in_octets: u64) -> DataNode {
    DataNode::container("interfaces").with_child(
        DataNode::container("interface")
            .with_child(DataNode::leaf("name", "eth0"))
            .with_child(DataNode::leaf("in-octets", in_octets.to_string())),
    )
}

/// Store preloaded with an operational and a configuration subtree.
pub async fn seeded_store() -> Arc<MemDataStore> {
    let store = Arc::new(MemDataStore::new());
    store
        .merge(Datastore::Operational, &TreePath::from("/interfaces"), interface_tree(0))
        .await
        .unwrap();
    store
        .merge(
            Datastore::Configuration,
            &TreePath::from("/system"),
            DataNode::container("system").with_child(DataNode::leaf("hostname", "r1")),
        )
        .await
        .unwrap();
    store
}

pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}
