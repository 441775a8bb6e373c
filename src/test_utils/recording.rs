use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::trigger::TriggerHandler;
use crate::ChangeEvent;
use crate::Notification;
use crate::NotificationKind;
use crate::Result;
use crate::Transport;
use crate::TransportError;

/// Transport that keeps every notification handed to it.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(Instant, Notification)>>,
    closed: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send for `subscription_id` fail.
    pub fn fail_for(
        &self,
        subscription_id: &str,
    ) {
        self.failing.lock().insert(subscription_id.to_string());
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().iter().map(|(_, n)| n.clone()).collect()
    }

    pub fn sent_at(&self) -> Vec<(Instant, Notification)> {
        self.sent.lock().clone()
    }

    pub fn sent_for(
        &self,
        subscription_id: &str,
    ) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| n.subscription_id() == subscription_id)
            .collect()
    }

    pub fn count_kind(
        &self,
        subscription_id: &str,
        kind: NotificationKind,
    ) -> usize {
        self.sent_for(subscription_id)
            .iter()
            .filter(|n| n.kind() == kind)
            .count()
    }

    pub fn closed_channels(&self) -> Vec<String> {
        self.closed.lock().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(
        &self,
        notification: Notification,
        subscription_id: &str,
    ) -> Result<()> {
        if self.failing.lock().contains(subscription_id) {
            return Err(TransportError::SendFailed {
                id: subscription_id.to_string(),
                reason: "peer unreachable".to_string(),
            }
            .into());
        }
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

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerCall {
    Periodic,
    InitialSync,
    OnChange(ChangeEvent),
    WindowClosed,
}

/// Trigger handler recording each callback with its (virtual) time.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    calls: Mutex<Vec<(Instant, String, TriggerCall)>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(Instant, String, TriggerCall)> {
        self.calls.lock().clone()
    }

    pub fn count(
        &self,
        matches: impl Fn(&TriggerCall) -> bool,
    ) -> usize {
        self.calls.lock().iter().filter(|(_, _, c)| matches(c)).count()
    }

    pub fn on_change_events(&self) -> Vec<(Instant, ChangeEvent)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|(at, _, c)| match c {
                TriggerCall::OnChange(event) => Some((*at, event.clone())),
                _ => None,
            })
            .collect()
    }

    fn record(
        &self,
        subscription_id: &str,
        call: TriggerCall,
    ) {
        self.calls
            .lock()
            .push((Instant::now(), subscription_id.to_string(), call));
    }
}

#[async_trait]
impl TriggerHandler for RecordingHandler {
    async fn periodic_trigger(
        &self,
        subscription_id: &str,
    ) {
        self.record(subscription_id, TriggerCall::Periodic);
    }

    async fn initial_sync(
        &self,
        subscription_id: &str,
    ) {
        self.record(subscription_id, TriggerCall::InitialSync);
    }

    async fn on_change_trigger(
        &self,
        subscription_id: &str,
        event: ChangeEvent,
    ) {
        self.record(subscription_id, TriggerCall::OnChange(event));
    }

    async fn delivery_window_closed(
        &self,
        subscription_id: &str,
    ) {
        self.record(subscription_id, TriggerCall::WindowClosed);
    }
}
