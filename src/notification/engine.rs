//! Notification Engine
//!
//! Orchestrates delivery for every registered subscription:
//!
//! ```text
//! PeriodicScheduler ─┐                      ┌─► DataStore::read (per partition)
//!                    ├─► TriggerHandler ────┼─► NotificationComposer
//! ChangeWatcher ─────┘   (this engine)      └─► Transport::send
//! ```
//!
//! Liveness and status decisions read the in-memory registry only. Each
//! trigger runs on its subscription's own task, so a slow read on one
//! subscription never delays another. Nothing on the trigger path returns
//! an error: failures are logged, counted and degrade the cycle.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::Weak;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::NotificationComposer;
use super::UpdateKind;
use crate::config::EngineConfig;
use crate::metrics::DELIVERY_FAILURES;
use crate::metrics::NOTIFICATIONS_SENT;
use crate::metrics::TRIGGERS_SKIPPED;
use crate::trigger::ChangeWatcher;
use crate::trigger::DeliveryWindow;
use crate::trigger::PeriodicScheduler;
use crate::trigger::TriggerHandle;
use crate::trigger::TriggerHandler;
use crate::trigger::WatchOptions;
use crate::ChangeEvent;
use crate::DataNode;
use crate::DataStore;
use crate::Datastore;
use crate::Error;
use crate::Notification;
use crate::OamStatus;
use crate::Result;
use crate::StatusUpdate;
use crate::Stream;
use crate::StreamStatus;
use crate::Subscription;
use crate::SubscriptionError;
use crate::SubscriptionMode;
use crate::SubscriptionRegistry;
use crate::Transport;
use crate::TreePath;

pub struct NotificationEngine {
    me: Weak<NotificationEngine>,
    registry: Arc<SubscriptionRegistry>,
    store: Arc<dyn DataStore>,
    transport: Arc<dyn Transport>,
    composer: NotificationComposer,
    config: EngineConfig,
    /// At most one running trigger source per subscription id
    handles: Mutex<HashMap<String, TriggerHandle>>,
}

impl std::fmt::Debug for NotificationEngine {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("NotificationEngine")
            .field("registry", &self.registry)
            .field("handles", &*self.handles.lock())
            .field("config", &self.config)
            .finish()
    }
}

impl NotificationEngine {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        store: Arc<dyn DataStore>,
        transport: Arc<dyn Transport>,
        composer: NotificationComposer,
        config: EngineConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            registry,
            store,
            transport,
            composer,
            config,
            handles: Mutex::new(HashMap::new()),
        })
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Arms a [`PeriodicScheduler`] for an established periodic
    /// subscription, replacing any trigger source it already had.
    ///
    /// # Errors
    /// - [`SubscriptionError::NotFound`] if the id is not established
    /// - [`SubscriptionError::ModeMismatch`] for an on-change subscription
    pub async fn register_periodic(
        &self,
        subscription_id: &str,
    ) -> Result<()> {
        let subscription = self.lookup(subscription_id)?;
        let SubscriptionMode::Periodic { period, .. } = subscription.mode else {
            return Err(mode_mismatch(&subscription, "periodic"));
        };

        self.close_handle(subscription_id).await;
        let scheduler =
            PeriodicScheduler::schedule(subscription_id, self.window(&subscription), period, self.handler())?;
        self.install(TriggerHandle::Periodic(scheduler)).await;
        self.ensure_still_established(subscription_id).await?;

        info!(subscription_id, ?period, "periodic subscription registered");
        Ok(())
    }

    /// Arms a [`ChangeWatcher`] on the subscription's stream partitions.
    ///
    /// # Errors
    /// - [`SubscriptionError::NotFound`] if the id is not established
    /// - [`SubscriptionError::ModeMismatch`] for a periodic subscription
    /// - [`SubscriptionError::UnknownStream`] if the stream has no partitions
    /// - [`StoreError`](crate::StoreError) if a listener cannot be installed
    pub async fn register_on_change(
        &self,
        subscription_id: &str,
    ) -> Result<()> {
        let subscription = self.lookup(subscription_id)?;
        let SubscriptionMode::OnChange {
            dampening_period,
            no_initial_sync,
        } = subscription.mode
        else {
            return Err(mode_mismatch(&subscription, "on-change"));
        };
        let stream = Stream::from_str(&subscription.stream).map_err(|e| {
            error!(subscription_id, stream = %subscription.stream, "stream not supported");
            Error::from(e)
        })?;

        self.close_handle(subscription_id).await;
        let watcher = ChangeWatcher::schedule(
            subscription_id,
            &self.store,
            stream.partitions(),
            &self.config.root(),
            self.window(&subscription),
            WatchOptions {
                dampening_period,
                no_initial_sync,
                ignored: self.registry.mirror_location(),
            },
            self.handler(),
        )?;
        self.install(TriggerHandle::OnChange(watcher)).await;
        self.ensure_still_established(subscription_id).await?;

        info!(subscription_id, ?dampening_period, no_initial_sync, "on-change subscription registered");
        Ok(())
    }

    /// Stops and forgets the subscription's trigger source. Missing handles
    /// are logged, never reported.
    pub async fn unregister(
        &self,
        subscription_id: &str,
    ) {
        if !self.close_handle(subscription_id).await {
            warn!(subscription_id, "no scheduler or watcher registered, nothing to unregister");
        }
    }

    /// Whether the subscription currently has a trigger source armed.
    ///
    /// A source whose stop time passed stays registered, with its store
    /// listeners already released, until it is unregistered or deleted.
    pub fn is_registered(
        &self,
        subscription_id: &str,
    ) -> bool {
        self.handles.lock().contains_key(subscription_id)
    }

    /// `"periodic"` or `"on-change"` for a registered subscription.
    pub fn registered_mode(
        &self,
        subscription_id: &str,
    ) -> Option<&'static str> {
        self.handles.lock().get(subscription_id).map(TriggerHandle::mode_name)
    }

    /// Builds and dispatches an OAM notification. `notificationComplete`
    /// also tears down the subscriber's delivery channel.
    ///
    /// # Errors
    /// [`Error::Unsupported`] when `subscription_id` is `None`: broadcast
    /// OAM events have no defined fan-out.
    pub async fn oam_notify(
        &self,
        subscription_id: Option<&str>,
        status: OamStatus,
        reason: Option<&str>,
    ) -> Result<()> {
        let Some(subscription_id) = subscription_id else {
            warn!(%status, "broadcast OAM notification requested");
            return Err(Error::Unsupported(format!(
                "broadcast OAM notification ({status})"
            )));
        };

        let notification = self.composer.compose_oam(subscription_id, status, reason);
        self.dispatch(notification, subscription_id).await;

        if status == OamStatus::NotificationComplete {
            match self.transport.close_channel(subscription_id).await {
                Ok(()) => debug!(subscription_id, "delivery channel closed"),
                Err(e) => {
                    warn!(subscription_id, "closing delivery channel failed: {:?}", e);
                    DELIVERY_FAILURES.with_label_values(&["close_channel"]).inc();
                }
            }
        }
        Ok(())
    }

    /// Pauses delivery and emits `subscriptionSuspended`.
    ///
    /// Returns `false` when the id is unknown or the subscription is not
    /// active.
    pub async fn suspend(
        &self,
        subscription_id: &str,
        reason: Option<&str>,
    ) -> bool {
        self.transition(
            subscription_id,
            &[StreamStatus::Active],
            StreamStatus::Suspended,
            OamStatus::SubscriptionSuspended,
            reason,
        )
        .await
    }

    /// Re-enables delivery of a suspended subscription and emits
    /// `subscriptionResumed`.
    pub async fn resume(
        &self,
        subscription_id: &str,
    ) -> bool {
        self.transition(
            subscription_id,
            &[StreamStatus::Suspended],
            StreamStatus::Active,
            OamStatus::SubscriptionResumed,
            None,
        )
        .await
    }

    /// Moves the subscription to the terminal `terminated` status and emits
    /// `subscriptionTerminated`. The registry entry stays until deleted.
    pub async fn terminate(
        &self,
        subscription_id: &str,
        reason: Option<&str>,
    ) -> bool {
        self.transition(
            subscription_id,
            &[StreamStatus::Active, StreamStatus::Suspended],
            StreamStatus::Terminated,
            OamStatus::SubscriptionTerminated,
            reason,
        )
        .await
    }

    /// Quietly closes every trigger source.
    pub async fn shutdown(&self) {
        let handles: Vec<TriggerHandle> = self.handles.lock().drain().map(|(_, h)| h).collect();
        let timeout = self.config.close_timeout();
        info!(count = handles.len(), "closing all schedulers and watchers");
        join_all(handles.iter().map(|h| h.quiet_close(timeout))).await;
    }

    // -
    // Internals

    fn handler(&self) -> Weak<dyn TriggerHandler> {
        self.me.clone()
    }

    fn lookup(
        &self,
        subscription_id: &str,
    ) -> Result<Arc<Subscription>> {
        self.registry
            .get(subscription_id)
            .ok_or_else(|| SubscriptionError::NotFound(subscription_id.to_string()).into())
    }

    fn window(
        &self,
        subscription: &Subscription,
    ) -> DeliveryWindow {
        DeliveryWindow {
            start_time: subscription.start_time,
            stop_time: subscription.stop_time,
            stop_tolerance: self.config.stop_time_tolerance(),
        }
    }

    async fn install(
        &self,
        handle: TriggerHandle,
    ) {
        let replaced = self
            .handles
            .lock()
            .insert(handle.subscription_id().to_string(), handle);
        // A concurrent registration for the same id won the race; only the
        // last one stays armed.
        if let Some(replaced) = replaced {
            debug!(
                subscription_id = replaced.subscription_id(),
                "replacing concurrently registered trigger"
            );
            replaced.quiet_close(self.config.close_timeout()).await;
        }
    }

    /// Undoes a registration whose record was deleted while it was being
    /// armed, so a concurrent delete never leaves a running trigger behind.
    async fn ensure_still_established(
        &self,
        subscription_id: &str,
    ) -> Result<()> {
        if self.registry.exists(subscription_id) {
            return Ok(());
        }
        warn!(subscription_id, "subscription deleted during registration, closing trigger");
        self.close_handle(subscription_id).await;
        Err(SubscriptionError::NotFound(subscription_id.to_string()).into())
    }

    /// Keeps the mirrored subscription records out of delivered data.
    fn hide_mirror(
        &self,
        partition: Datastore,
        at: &TreePath,
        data: &mut Option<DataNode>,
    ) {
        if let (Some(mirror), Some(node)) = (self.registry.mirror_location(), data.as_mut()) {
            mirror.prune(partition, at, node);
        }
    }

    /// Returns `false` when there was nothing to close.
    async fn close_handle(
        &self,
        subscription_id: &str,
    ) -> bool {
        let handle = self.handles.lock().remove(subscription_id);
        match handle {
            Some(handle) => {
                handle.quiet_close(self.config.close_timeout()).await;
                info!(subscription_id, mode = handle.mode_name(), "trigger source closed");
                true
            }
            None => false,
        }
    }

    async fn transition(
        &self,
        subscription_id: &str,
        from: &[StreamStatus],
        to: StreamStatus,
        event: OamStatus,
        reason: Option<&str>,
    ) -> bool {
        let previous = match self.registry.set_status_if(subscription_id, from, to).await {
            StatusUpdate::Applied { previous } => previous,
            StatusUpdate::Rejected { current } => {
                info!(
                    subscription_id,
                    %current,
                    requested = %to,
                    "status transition not allowed, ignoring"
                );
                return false;
            }
            StatusUpdate::NotFound => {
                info!(subscription_id, "subscription not found, status unchanged");
                return false;
            }
        };

        info!(subscription_id, from = %previous, %to, "subscription status changed");
        if let Err(e) = self.oam_notify(Some(subscription_id), event, reason).await {
            warn!(subscription_id, "OAM notification failed: {:?}", e);
        }
        true
    }

    /// Current record if it should be delivered, `None` to skip this trigger.
    fn deliverable(
        &self,
        subscription_id: &str,
    ) -> Option<Arc<Subscription>> {
        let Some(subscription) = self.registry.get(subscription_id) else {
            debug!(subscription_id, "trigger for unknown subscription, skipping");
            TRIGGERS_SKIPPED.with_label_values(&["unknown"]).inc();
            return None;
        };
        if !subscription.is_active() {
            debug!(subscription_id, status = %subscription.status, "subscription not active, skipping");
            TRIGGERS_SKIPPED.with_label_values(&["inactive"]).inc();
            return None;
        }
        Some(subscription)
    }

    /// Reads every partition of the stream, one notification each.
    async fn read_and_send(
        &self,
        kind: UpdateKind,
        subscription: &Subscription,
    ) {
        let stream = match Stream::from_str(&subscription.stream) {
            Ok(stream) => stream,
            Err(e) => {
                error!(subscription_id = %subscription.id, "{}", e);
                TRIGGERS_SKIPPED.with_label_values(&["unknown_stream"]).inc();
                return;
            }
        };

        for partition in stream.partitions() {
            self.read_partition_and_send(kind, subscription, *partition).await;
        }
    }

    async fn read_partition_and_send(
        &self,
        kind: UpdateKind,
        subscription: &Subscription,
        partition: Datastore,
    ) {
        let root = self.config.root();
        let mut data = match self.store.read(partition, &root).await {
            Ok(data) => data,
            Err(e) => {
                warn!(
                    subscription_id = %subscription.id,
                    %partition,
                    "reading data tree failed, sending empty document: {:?}", e
                );
                DELIVERY_FAILURES.with_label_values(&["read"]).inc();
                None
            }
        };
        self.hide_mirror(partition, &root, &mut data);

        let notification = self
            .composer
            .compose(kind, data.as_ref(), subscription.filter.as_ref(), &subscription.id);
        self.dispatch(notification, &subscription.id).await;
    }

    async fn dispatch(
        &self,
        notification: Notification,
        subscription_id: &str,
    ) {
        let kind = notification.kind();
        match self.transport.send(notification, subscription_id).await {
            Ok(()) => {
                info!(subscription_id, kind = kind.as_str(), "notification sent");
                NOTIFICATIONS_SENT.with_label_values(&[kind.as_str()]).inc();
            }
            Err(e) => {
                warn!(subscription_id, kind = kind.as_str(), "sending notification failed: {:?}", e);
                DELIVERY_FAILURES.with_label_values(&["send"]).inc();
            }
        }
    }
}

#[async_trait]
impl TriggerHandler for NotificationEngine {
    async fn periodic_trigger(
        &self,
        subscription_id: &str,
    ) {
        let Some(subscription) = self.deliverable(subscription_id) else {
            return;
        };
        self.read_and_send(UpdateKind::Periodic, &subscription).await;
    }

    async fn initial_sync(
        &self,
        subscription_id: &str,
    ) {
        let Some(subscription) = self.deliverable(subscription_id) else {
            return;
        };
        debug!(subscription_id, "sending initial synchronization");
        self.read_and_send(UpdateKind::OnChange, &subscription).await;
    }

    async fn on_change_trigger(
        &self,
        subscription_id: &str,
        event: ChangeEvent,
    ) {
        let Some(subscription) = self.deliverable(subscription_id) else {
            return;
        };
        debug!(subscription_id, partition = %event.partition, path = %event.path, "change delivered");
        let ChangeEvent {
            partition,
            path,
            mut data,
        } = event;
        self.hide_mirror(partition, &path, &mut data);
        let notification = self.composer.compose(
            UpdateKind::OnChange,
            data.as_ref(),
            subscription.filter.as_ref(),
            subscription_id,
        );
        self.dispatch(notification, subscription_id).await;
    }

    async fn delivery_window_closed(
        &self,
        subscription_id: &str,
    ) {
        info!(subscription_id, "stop time reached");
        if !self.config.complete_on_stop {
            return;
        }
        if let Err(e) = self
            .oam_notify(Some(subscription_id), OamStatus::NotificationComplete, None)
            .await
        {
            warn!(subscription_id, "notification complete failed: {:?}", e);
        }
    }
}

fn mode_mismatch(
    subscription: &Subscription,
    expected: &'static str,
) -> Error {
    SubscriptionError::ModeMismatch {
        id: subscription.id.clone(),
        expected,
        actual: subscription.mode.name(),
    }
    .into()
}
