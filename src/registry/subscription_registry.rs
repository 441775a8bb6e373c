//! Subscription Registry
//!
//! Authoritative in-memory store of subscription records. Every trigger
//! consults it before delivering, so reads must stay cheap:
//!
//! - records are kept as `Arc<Subscription>` in a sharded [`DashMap`];
//!   readers clone the `Arc` and never hold a shard lock across an await
//! - updates replace the whole record, so no reader observes a half
//!   written subscription
//!
//! Records are mirrored into the data store on a best-effort basis. A
//! failed mirror write is logged and never rolls back the in-memory state.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::RegistryConfig;
use crate::constants::MIRROR_CONTAINER;
use crate::constants::MIRROR_LEAF_ENCODING;
use crate::constants::MIRROR_LEAF_ID;
use crate::constants::MIRROR_LEAF_MODE;
use crate::constants::MIRROR_LEAF_START_TIME;
use crate::constants::MIRROR_LEAF_STATUS;
use crate::constants::MIRROR_LEAF_STOP_TIME;
use crate::constants::MIRROR_LEAF_STREAM;
use crate::metrics::DELIVERY_FAILURES;
use crate::DataNode;
use crate::DataStore;
use crate::Result;
use crate::StreamStatus;
use crate::Subscription;
use crate::SubtreeLocation;
use crate::TreePath;

/// Outcome of [`SubscriptionRegistry::set_status_if`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    Applied { previous: StreamStatus },
    Rejected { current: StreamStatus },
    NotFound,
}

pub struct SubscriptionRegistry {
    subscriptions: DashMap<String, Arc<Subscription>>,
    next_id: AtomicU64,
    /// Mirror target, `None` when mirroring is disabled
    mirror: Option<Arc<dyn DataStore>>,
    config: RegistryConfig,
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("subscriptions", &self.subscriptions.len())
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .field("mirror", &self.mirror.is_some())
            .finish()
    }
}

impl SubscriptionRegistry {
    pub fn new(
        config: RegistryConfig,
        store: Option<Arc<dyn DataStore>>,
    ) -> Self {
        let mirror = if config.mirror_enabled { store } else { None };
        Self {
            subscriptions: DashMap::new(),
            next_id: AtomicU64::new(0),
            mirror,
            config,
        }
    }

    /// Allocates a fresh id, `<id_prefix><counter>`. Never reused.
    pub fn generate_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", self.config.id_prefix, n)
    }

    /// Creates the empty mirror container. Failures are logged only.
    pub async fn init_mirror(&self) {
        let Some(store) = &self.mirror else {
            return;
        };
        let root = self.config.mirror_root();
        match store
            .merge(self.config.mirror_partition, &root, DataNode::container(MIRROR_CONTAINER))
            .await
        {
            Ok(()) => debug!(%root, "subscription mirror initialised"),
            Err(e) => {
                warn!(%root, "failed to initialise subscription mirror: {:?}", e);
                DELIVERY_FAILURES.with_label_values(&["mirror"]).inc();
            }
        }
    }

    /// Inserts `subscription` unless its id is already present.
    ///
    /// Returns `Ok(false)` for a duplicate id, leaving the first record
    /// untouched.
    ///
    /// # Errors
    /// [`SubscriptionError`](crate::SubscriptionError) when the record fails
    /// validation.
    pub async fn establish(
        &self,
        subscription: Subscription,
    ) -> Result<bool> {
        subscription.validate()?;

        let record = match self.subscriptions.entry(subscription.id.clone()) {
            Entry::Occupied(_) => {
                info!(subscription_id = %subscription.id, "subscription already established, ignoring");
                return Ok(false);
            }
            Entry::Vacant(vacant) => {
                let record = Arc::new(subscription);
                vacant.insert(record.clone());
                record
            }
        };

        info!(
            subscription_id = %record.id,
            stream = %record.stream,
            mode = record.mode.name(),
            "subscription established"
        );
        self.mirror_record(&record).await;
        Ok(true)
    }

    /// Replaces an existing record, keeping its current status. Running
    /// triggers are not restarted.
    ///
    /// Returns `Ok(false)` when the id is unknown or the update trigger
    /// would change, which is not allowed after establishment.
    pub async fn modify(
        &self,
        subscription: Subscription,
    ) -> Result<bool> {
        subscription.validate()?;

        let record = {
            let Some(mut current) = self.subscriptions.get_mut(&subscription.id) else {
                info!(subscription_id = %subscription.id, "subscription not found, nothing to modify");
                return Ok(false);
            };
            if current.mode.name() != subscription.mode.name() {
                warn!(
                    subscription_id = %subscription.id,
                    from = current.mode.name(),
                    to = subscription.mode.name(),
                    "update trigger cannot change, modification rejected"
                );
                return Ok(false);
            }
            // Status only moves through suspend, resume and terminate.
            let record = Arc::new(Subscription {
                status: current.status,
                ..subscription
            });
            *current = record.clone();
            record
        };

        info!(subscription_id = %record.id, "subscription modified");
        self.mirror_record(&record).await;
        Ok(true)
    }

    /// Removes the record. Returns `false` when the id is unknown.
    pub async fn remove(
        &self,
        subscription_id: &str,
    ) -> bool {
        if self.subscriptions.remove(subscription_id).is_none() {
            info!(subscription_id, "subscription not found, nothing to remove");
            return false;
        }

        info!(subscription_id, "subscription removed");
        if let Some(store) = &self.mirror {
            let path = self.record_path(subscription_id);
            if let Err(e) = store.delete(self.config.mirror_partition, &path).await {
                warn!(subscription_id, %path, "failed to remove mirrored subscription: {:?}", e);
                DELIVERY_FAILURES.with_label_values(&["mirror"]).inc();
            }
        }
        true
    }

    /// Updates the streaming status. Returns `false` when the id is unknown.
    pub async fn set_status(
        &self,
        subscription_id: &str,
        status: StreamStatus,
    ) -> bool {
        let update = self
            .set_status_if(subscription_id, StreamStatus::ALL, status)
            .await;
        update != StatusUpdate::NotFound
    }

    /// Moves the record to `to` only if its current status is one of
    /// `from`. Check and write happen under the record's shard lock, so
    /// concurrent transitions on one id are serialised.
    pub async fn set_status_if(
        &self,
        subscription_id: &str,
        from: &[StreamStatus],
        to: StreamStatus,
    ) -> StatusUpdate {
        let (previous, record) = {
            let Some(mut current) = self.subscriptions.get_mut(subscription_id) else {
                return StatusUpdate::NotFound;
            };
            let previous = current.status;
            if !from.contains(&previous) {
                return StatusUpdate::Rejected { current: previous };
            }
            let record = Arc::new(Subscription {
                status: to,
                ..Subscription::clone(&current)
            });
            *current = record.clone();
            (previous, record)
        };

        debug!(subscription_id, from = %previous, %to, "subscription status updated");
        self.mirror_record(&record).await;
        StatusUpdate::Applied { previous }
    }

    pub fn exists(
        &self,
        subscription_id: &str,
    ) -> bool {
        self.subscriptions.contains_key(subscription_id)
    }

    /// Snapshot of the current record.
    pub fn get(
        &self,
        subscription_id: &str,
    ) -> Option<Arc<Subscription>> {
        self.subscriptions.get(subscription_id).map(|r| r.value().clone())
    }

    pub fn ids(&self) -> Vec<String> {
        self.subscriptions.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Where records are mirrored, `None` when mirroring is disabled.
    pub fn mirror_location(&self) -> Option<SubtreeLocation> {
        self.mirror.as_ref().map(|_| SubtreeLocation {
            partition: self.config.mirror_partition,
            path: self.config.mirror_root(),
        })
    }

    fn record_path(
        &self,
        subscription_id: &str,
    ) -> TreePath {
        self.config
            .mirror_root()
            .child(format!("subscription[{subscription_id}]"))
    }

    async fn mirror_record(
        &self,
        subscription: &Subscription,
    ) {
        let Some(store) = &self.mirror else {
            return;
        };
        let path = self.record_path(&subscription.id);
        if let Err(e) = store
            .merge(self.config.mirror_partition, &path, mirror_node(subscription))
            .await
        {
            warn!(
                subscription_id = %subscription.id,
                %path,
                "failed to mirror subscription, in-memory record stays authoritative: {:?}", e
            );
            DELIVERY_FAILURES.with_label_values(&["mirror"]).inc();
        }
    }
}

fn mirror_node(subscription: &Subscription) -> DataNode {
    let mut node = DataNode::container(format!("subscription[{}]", subscription.id))
        .with_child(DataNode::leaf(MIRROR_LEAF_ID, subscription.id.as_str()))
        .with_child(DataNode::leaf(MIRROR_LEAF_STREAM, subscription.stream.as_str()))
        .with_child(DataNode::leaf(MIRROR_LEAF_ENCODING, subscription.encoding.to_string()))
        .with_child(DataNode::leaf(MIRROR_LEAF_MODE, subscription.mode.name()))
        .with_child(DataNode::leaf(MIRROR_LEAF_STATUS, subscription.status.to_string()));
    if let Some(start) = subscription.start_time {
        node = node.with_child(DataNode::leaf(MIRROR_LEAF_START_TIME, epoch_timestamp(start)));
    }
    if let Some(stop) = subscription.stop_time {
        node = node.with_child(DataNode::leaf(MIRROR_LEAF_STOP_TIME, epoch_timestamp(stop)));
    }
    node
}

/// Seconds since the epoch with millisecond precision, e.g. `1700000000.250`.
fn epoch_timestamp(at: SystemTime) -> String {
    let since = at.duration_since(UNIX_EPOCH).unwrap_or_default();
    format!("{}.{:03}", since.as_secs(), since.subsec_millis())
}
