use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use telepush::DataNode;
use telepush::DataStore;
use telepush::Datastore;
use telepush::MemDataStore;
use telepush::Notification;
use telepush::NotificationKind;
use telepush::PushConfig;
use telepush::PushService;
use telepush::PushServiceBuilder;
use telepush::Result;
use telepush::Transport;
use telepush::TreePath;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for integration test.");
}

pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

/// Collects delivered notifications with their virtual delivery time.
#[derive(Debug, Default)]
pub struct CollectingTransport {
    sent: Mutex<Vec<(Instant, Notification)>>,
    closed: Mutex<Vec<String>>,
}

impl CollectingTransport {
    pub fn sent_for(
        &self,
        subscription_id: &str,
    ) -> Vec<(Instant, Notification)> {
        self.sent
            .lock()
            .iter()
            .filter(|(_, n)| n.subscription_id() == subscription_id)
            .cloned()
            .collect()
    }

    pub fn count(
        &self,
        subscription_id: &str,
        kind: NotificationKind,
    ) -> usize {
        self.sent_for(subscription_id)
            .iter()
            .filter(|(_, n)| n.kind() == kind)
            .count()
    }

    pub fn closed(&self) -> Vec<String> {
        self.closed.lock().clone()
    }
}

#[async_trait]
impl Transport for CollectingTransport {
    async fn send(
        &self,
        notification: Notification,
        _subscription_id: &str,
    ) -> Result<()> {
        self.sent.lock().push((Instant::now(), notification));
        Ok(())
    }

    async fn close_channel(
        &self,
        subscription_id: &str,
    ) -> Result<()> {
        self.closed.lock().push(subscription_id.to_string());
        Ok(())
    }
}

pub struct TestContext {
    pub service: PushService,
    pub store: Arc<MemDataStore>,
    pub transport: Arc<CollectingTransport>,
}

pub async fn start_service() -> TestContext {
    enable_logger();
    let store = Arc::new(MemDataStore::new());
    store
        .merge(Datastore::Configuration, &TreePath::from("/system"), system_tree("r1"))
        .await
        .unwrap();
    store
        .merge(Datastore::Operational, &TreePath::from("/interfaces"), interfaces_tree(0))
        .await
        .unwrap();

    let transport = Arc::new(CollectingTransport::default());
    let service = PushServiceBuilder::new(PushConfig::default())
        .store(store.clone())
        .transport(transport.clone())
        .build()
        .await
        .unwrap();

    TestContext {
        service,
        store,
        transport,
    }
}

pub fn system_tree(hostname: &str) -> DataNode {
    DataNode::container("system").with_child(DataNode::leaf("hostname", hostname))
}

pub fn interfaces_tree(in_octets: u64) -> DataNode {
    DataNode::container("interfaces").with_child(
        DataNode::container("interface")
            .with_child(DataNode::leaf("name", "eth0"))
            .with_child(DataNode::leaf("in-octets", in_octets.to_string())),
    )
}
