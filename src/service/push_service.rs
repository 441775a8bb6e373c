use std::sync::Arc;

use tracing::info;

use crate::NotificationEngine;
use crate::OamStatus;
use crate::PushConfig;
use crate::Result;
use crate::Subscription;
use crate::SubscriptionRegistry;

/// Entry point for the subscription-management layer.
///
/// One instance per process, built with
/// [`PushServiceBuilder`](crate::PushServiceBuilder) and shared by
/// reference. Several independent instances may coexist.
#[derive(Debug, Clone)]
pub struct PushService {
    config: PushConfig,
    registry: Arc<SubscriptionRegistry>,
    engine: Arc<NotificationEngine>,
}

impl PushService {
    pub(crate) fn new(
        config: PushConfig,
        registry: Arc<SubscriptionRegistry>,
        engine: Arc<NotificationEngine>,
    ) -> Self {
        Self {
            config,
            registry,
            engine,
        }
    }

    pub fn config(&self) -> &PushConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn engine(&self) -> &Arc<NotificationEngine> {
        &self.engine
    }

    pub fn generate_id(&self) -> String {
        self.registry.generate_id()
    }

    /// See [`SubscriptionRegistry::establish`].
    pub async fn establish(
        &self,
        subscription: Subscription,
    ) -> Result<bool> {
        self.registry.establish(subscription).await
    }

    /// See [`SubscriptionRegistry::modify`]. Callers re-register when the
    /// cadence parameters changed.
    pub async fn modify(
        &self,
        subscription: Subscription,
    ) -> Result<bool> {
        self.registry.modify(subscription).await
    }

    /// Removes the record, then stops the subscription's scheduler or
    /// watcher. Returns `false` when the id was not established.
    ///
    /// The record goes first so a registration racing with the delete
    /// either fails its lookup or is closed here.
    pub async fn delete(
        &self,
        subscription_id: &str,
    ) -> bool {
        let removed = self.registry.remove(subscription_id).await;
        if self.engine.is_registered(subscription_id) {
            self.engine.unregister(subscription_id).await;
        }
        if removed {
            info!(subscription_id, "subscription deleted");
        }
        removed
    }

    pub async fn register_periodic(
        &self,
        subscription_id: &str,
    ) -> Result<()> {
        self.engine.register_periodic(subscription_id).await
    }

    pub async fn register_on_change(
        &self,
        subscription_id: &str,
    ) -> Result<()> {
        self.engine.register_on_change(subscription_id).await
    }

    /// Arms whichever trigger source matches the subscription's mode.
    pub async fn register(
        &self,
        subscription_id: &str,
    ) -> Result<()> {
        let periodic = self
            .registry
            .get(subscription_id)
            .map(|s| s.mode.is_periodic())
            .unwrap_or(true);
        if periodic {
            self.register_periodic(subscription_id).await
        } else {
            self.register_on_change(subscription_id).await
        }
    }

    pub async fn unregister(
        &self,
        subscription_id: &str,
    ) {
        self.engine.unregister(subscription_id).await
    }

    pub async fn oam_notify(
        &self,
        subscription_id: Option<&str>,
        status: OamStatus,
        reason: Option<&str>,
    ) -> Result<()> {
        self.engine.oam_notify(subscription_id, status, reason).await
    }

    pub async fn suspend(
        &self,
        subscription_id: &str,
        reason: Option<&str>,
    ) -> bool {
        self.engine.suspend(subscription_id, reason).await
    }

    pub async fn resume(
        &self,
        subscription_id: &str,
    ) -> bool {
        self.engine.resume(subscription_id).await
    }

    pub async fn terminate(
        &self,
        subscription_id: &str,
        reason: Option<&str>,
    ) -> bool {
        self.engine.terminate(subscription_id, reason).await
    }

    /// Quietly closes every scheduler and watcher. Records stay in place.
    pub async fn shutdown(&self) {
        self.engine.shutdown().await;
        info!("push service stopped");
    }
}
