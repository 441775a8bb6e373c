use std::fmt;
use std::mem;
use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::sleep_until;
use tokio::time::Instant;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::sleep_until_opt;
use super::DeliveryWindow;
use super::TriggerHandler;
use crate::utils::async_task::ScheduledTask;
use crate::ChangeEvent;
use crate::DataStore;
use crate::Datastore;
use crate::ListenerRegistration;
use crate::Result;
use crate::SubtreeLocation;
use crate::TreePath;

/// Dampening settings of an on-change subscription.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WatchOptions {
    pub dampening_period: Duration,
    pub no_initial_sync: bool,
    /// Writes inside this subtree never trigger a delivery
    pub ignored: Option<SubtreeLocation>,
}

/// Store listener of one on-change subscription.
///
/// Events arriving at least one dampening period after the previous
/// delivery go out immediately. Events inside the window are coalesced,
/// latest wins, into a single delivery when the window ends. Events seen
/// before the start time are discarded; the initial sync covers them.
///
/// Store listeners are released once the stop time passes; the watcher
/// itself stays with its owner until closed.
pub struct ChangeWatcher {
    subscription_id: String,
    options: WatchOptions,
    registrations: Arc<Mutex<Vec<Box<dyn ListenerRegistration>>>>,
    task: ScheduledTask,
}

impl fmt::Debug for ChangeWatcher {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ChangeWatcher")
            .field("subscription_id", &self.subscription_id)
            .field("options", &self.options)
            .field("listeners", &self.registrations.lock().len())
            .field("task", &self.task)
            .finish()
    }
}

impl ChangeWatcher {
    /// Installs one listener per partition on `path`, then starts watching.
    ///
    /// Listener installation happens before this returns so no change made
    /// after scheduling can be missed.
    pub fn schedule(
        subscription_id: impl Into<String>,
        store: &Arc<dyn DataStore>,
        partitions: &[Datastore],
        path: &TreePath,
        window: DeliveryWindow,
        options: WatchOptions,
        handler: Weak<dyn TriggerHandler>,
    ) -> Result<Self> {
        let subscription_id = subscription_id.into();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut registrations = Vec::with_capacity(partitions.len());
        for partition in partitions {
            match store.subscribe_changes(*partition, path, tx.clone()) {
                Ok(registration) => registrations.push(registration),
                Err(e) => {
                    close_registrations(&subscription_id, registrations);
                    return Err(e);
                }
            }
        }
        drop(tx);
        let registrations = Arc::new(Mutex::new(registrations));

        let id = subscription_id.clone();
        let task_options = options.clone();
        let task_registrations = registrations.clone();
        let task = ScheduledTask::spawn(format!("on-change-{subscription_id}"), move |token| async move {
            let mut events = rx;
            let options = task_options;
            let start = window.start();
            let stop = window.stop();

            // Phase 1: wait for the start time, discarding early changes.
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Ok(()),
                    _ = sleep_until_opt(stop) => {
                        release(&id, &task_registrations);
                        if let Some(handler) = handler.upgrade() {
                            handler.delivery_window_closed(&id).await;
                        }
                        return Ok(());
                    }
                    _ = sleep_until(start) => break,
                    event = events.recv() => match event {
                        Some(event) => trace!(subscription_id = %id, path = %event.path, "change before start time discarded"),
                        None => return Ok(()),
                    },
                }
            }

            let mut last_delivery: Option<Instant> = None;
            if !options.no_initial_sync {
                let Some(handler) = handler.upgrade() else {
                    return Ok(());
                };
                handler.initial_sync(&id).await;
                last_delivery = Some(Instant::now());
            }

            // Phase 2: change driven delivery with dampening.
            let mut pending: Option<ChangeEvent> = None;
            loop {
                let flush_at = pending
                    .as_ref()
                    .and(last_delivery)
                    .map(|last| last + options.dampening_period);

                let due = tokio::select! {
                    biased;
                    _ = token.cancelled() => return Ok(()),
                    _ = sleep_until_opt(stop) => break,
                    _ = sleep_until_opt(flush_at) => pending.take(),
                    event = events.recv() => match event {
                        Some(event) if is_ignored(&options, &event) => {
                            trace!(subscription_id = %id, path = %event.path, "change in ignored subtree");
                            None
                        }
                        Some(event) => {
                            let window_open = last_delivery
                                .map_or(true, |last| Instant::now() >= last + options.dampening_period);
                            if pending.is_none() && window_open {
                                Some(event)
                            } else {
                                trace!(subscription_id = %id, "change coalesced into pending delivery");
                                pending = Some(event);
                                None
                            }
                        }
                        None => {
                            warn!(subscription_id = %id, "change listener closed by the store");
                            return Ok(());
                        }
                    },
                };

                if let Some(event) = due {
                    let Some(handler) = handler.upgrade() else {
                        return Ok(());
                    };
                    handler.on_change_trigger(&id, event).await;
                    last_delivery = Some(Instant::now());
                }
            }

            if pending.is_some() {
                debug!(subscription_id = %id, "stop time reached with a pending change, dropping it");
            }
            release(&id, &task_registrations);
            if let Some(handler) = handler.upgrade() {
                handler.delivery_window_closed(&id).await;
            }
            Ok(())
        });

        debug!(%subscription_id, ?options, "change watcher armed");
        Ok(Self {
            subscription_id,
            options,
            registrations,
            task,
        })
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn options(&self) -> &WatchOptions {
        &self.options
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_cancelled() && !self.task.is_finished()
    }

    /// Closes the store listeners and stops the watch task. Teardown errors
    /// are logged, never returned.
    pub async fn quiet_close(
        &self,
        close_timeout: Duration,
    ) {
        self.task.cancel();
        release(&self.subscription_id, &self.registrations);
        self.task.quiet_close(close_timeout).await;
    }
}

fn is_ignored(
    options: &WatchOptions,
    event: &ChangeEvent,
) -> bool {
    options
        .ignored
        .as_ref()
        .is_some_and(|subtree| subtree.covers(event.partition, &event.path))
}

/// Closes whatever listeners are still installed. Safe to call repeatedly.
fn release(
    subscription_id: &str,
    registrations: &Mutex<Vec<Box<dyn ListenerRegistration>>>,
) {
    let registrations = mem::take(&mut *registrations.lock());
    close_registrations(subscription_id, registrations);
}

fn close_registrations(
    subscription_id: &str,
    registrations: Vec<Box<dyn ListenerRegistration>>,
) {
    for registration in registrations {
        if let Err(e) = registration.close() {
            warn!(subscription_id, "closing change listener failed: {:?}", e);
        }
    }
}
