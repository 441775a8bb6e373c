use std::sync::Weak;
use std::time::Duration;

use tokio::time::interval_at;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::trace;

use super::sleep_until_opt;
use super::DeliveryWindow;
use super::TriggerHandler;
use crate::utils::async_task::ScheduledTask;
use crate::Result;
use crate::SubscriptionError;

/// Repeating timer of one periodic subscription.
///
/// Fires at the window start (or immediately), then every `period` until
/// the stop time. A tick that races with [`PeriodicScheduler::quiet_close`]
/// is dropped before reaching the handler.
#[derive(Debug)]
pub struct PeriodicScheduler {
    subscription_id: String,
    period: Duration,
    task: ScheduledTask,
}

impl PeriodicScheduler {
    pub fn schedule(
        subscription_id: impl Into<String>,
        window: DeliveryWindow,
        period: Duration,
        handler: Weak<dyn TriggerHandler>,
    ) -> Result<Self> {
        let subscription_id = subscription_id.into();
        if period.is_zero() {
            return Err(SubscriptionError::InvalidPeriod { id: subscription_id }.into());
        }

        let id = subscription_id.clone();
        let task = ScheduledTask::spawn(format!("periodic-{subscription_id}"), move |token| async move {
            let stop = window.stop();
            let mut ticker = interval_at(window.start(), period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!(subscription_id = %id, "periodic scheduler cancelled");
                        return Ok(());
                    }
                    _ = sleep_until_opt(stop) => {
                        debug!(subscription_id = %id, "periodic scheduler reached stop time");
                        break;
                    }
                    _ = ticker.tick() => {
                        let Some(handler) = handler.upgrade() else {
                            return Ok(());
                        };
                        trace!(subscription_id = %id, "periodic tick");
                        handler.periodic_trigger(&id).await;
                    }
                }
            }

            if let Some(handler) = handler.upgrade() {
                handler.delivery_window_closed(&id).await;
            }
            Ok(())
        });

        debug!(%subscription_id, ?period, "periodic scheduler armed");
        Ok(Self {
            subscription_id,
            period,
            task,
        })
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_cancelled() && !self.task.is_finished()
    }

    /// Cancels the timer and waits for an in-flight cycle, bounded by
    /// `close_timeout`. No tick reaches the handler once this returns.
    pub async fn quiet_close(
        &self,
        close_timeout: Duration,
    ) {
        self.task.quiet_close(close_timeout).await;
    }
}
