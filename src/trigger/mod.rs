//! Per-subscription trigger sources.
//!
//! Each registered subscription owns exactly one [`TriggerHandle`]: a
//! [`PeriodicScheduler`] for periodic subscriptions or a [`ChangeWatcher`]
//! for on-change ones. Both run as independent tasks and call back into a
//! [`TriggerHandler`] held weakly, so a dropped engine stops its triggers.

mod change_watcher;
mod periodic_scheduler;


pub use change_watcher::*;
pub use periodic_scheduler::*;

use std::future::pending;
use std::time::Duration;
use std::time::SystemTime;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::time::sleep_until;
use tokio::time::Instant;

use crate::utils::time::instant_at;
use crate::utils::time::start_instant;
use crate::ChangeEvent;

/// Receiver of trigger callbacks.
///
/// Implementations must not fail: every error on the delivery path is
/// logged and absorbed so the calling task keeps its cadence.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TriggerHandler: Send + Sync + 'static {
    /// One periodic read-and-send cycle.
    async fn periodic_trigger(
        &self,
        subscription_id: &str,
    );

    /// Full snapshot delivered when a change watch starts.
    async fn initial_sync(
        &self,
        subscription_id: &str,
    );

    async fn on_change_trigger(
        &self,
        subscription_id: &str,
        event: ChangeEvent,
    );

    /// The subscription's stop time has passed; no more triggers follow.
    async fn delivery_window_closed(
        &self,
        subscription_id: &str,
    );
}

/// Wall-clock bounds of active delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryWindow {
    pub start_time: Option<SystemTime>,
    pub stop_time: Option<SystemTime>,
    /// Added to `stop_time` to absorb timer jitter on the last tick.
    pub stop_tolerance: Duration,
}

impl DeliveryWindow {
    pub(crate) fn start(&self) -> Instant {
        start_instant(self.start_time)
    }

    pub(crate) fn stop(&self) -> Option<Instant> {
        self.stop_time.map(|t| instant_at(t) + self.stop_tolerance)
    }
}

/// Resolves at `deadline`, or never when there is none.
pub(crate) async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending::<()>().await,
    }
}

/// The single running trigger source of a subscription.
#[derive(Debug)]
pub enum TriggerHandle {
    Periodic(PeriodicScheduler),
    OnChange(ChangeWatcher),
}

impl TriggerHandle {
    pub fn subscription_id(&self) -> &str {
        match self {
            TriggerHandle::Periodic(scheduler) => scheduler.subscription_id(),
            TriggerHandle::OnChange(watcher) => watcher.subscription_id(),
        }
    }

    pub fn mode_name(&self) -> &'static str {
        match self {
            TriggerHandle::Periodic(_) => "periodic",
            TriggerHandle::OnChange(_) => "on-change",
        }
    }

    /// `false` once cancelled or past the stop time.
    pub fn is_running(&self) -> bool {
        match self {
            TriggerHandle::Periodic(scheduler) => scheduler.is_running(),
            TriggerHandle::OnChange(watcher) => watcher.is_running(),
        }
    }

    /// Idempotent, never fails.
    pub async fn quiet_close(
        &self,
        close_timeout: Duration,
    ) {
        match self {
            TriggerHandle::Periodic(scheduler) => scheduler.quiet_close(close_timeout).await,
            TriggerHandle::OnChange(watcher) => watcher.quiet_close(close_timeout).await,
        }
    }
}
