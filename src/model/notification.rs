use std::fmt;
use std::time::SystemTime;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

/// Canonical document body of an update notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Value);

impl Document {
    /// Document with no content, used when a read yields nothing.
    pub fn empty() -> Self {
        Self(Value::Object(Map::new()))
    }

    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Value> for Document {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Opaque subtree filter specification, interpreted only by the
/// [`SubtreeFilter`](crate::SubtreeFilter) collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSpec(Value);

impl FilterSpec {
    pub fn new(spec: Value) -> Self {
        Self(spec)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Operational lifecycle events, named after their wire identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OamStatus {
    SubscriptionStarted,
    SubscriptionSuspended,
    SubscriptionResumed,
    SubscriptionTerminated,
    SubscriptionModified,
    NotificationComplete,
}

impl OamStatus {
    /// Only suspension and termination carry a reason.
    pub fn carries_reason(&self) -> bool {
        matches!(
            self,
            OamStatus::SubscriptionSuspended | OamStatus::SubscriptionTerminated
        )
    }
}

impl fmt::Display for OamStatus {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            OamStatus::SubscriptionStarted => "subscription-started",
            OamStatus::SubscriptionSuspended => "subscription-suspended",
            OamStatus::SubscriptionResumed => "subscription-resumed",
            OamStatus::SubscriptionTerminated => "subscription-terminated",
            OamStatus::SubscriptionModified => "subscription-modified",
            OamStatus::NotificationComplete => "notification-complete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    PeriodicUpdate,
    OnChangeUpdate,
    OamStatus,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::PeriodicUpdate => "push-update",
            NotificationKind::OnChangeUpdate => "push-change-update",
            NotificationKind::OamStatus => "oam",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationPayload {
    PeriodicUpdate(Document),
    OnChangeUpdate(Document),
    OamStatus {
        status: OamStatus,
        reason: Option<String>,
    },
}

/// Transport-ready notification. Built fresh per trigger and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    subscription_id: String,
    event_time: SystemTime,
    payload: NotificationPayload,
}

impl Notification {
    pub(crate) fn new(
        subscription_id: impl Into<String>,
        payload: NotificationPayload,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            event_time: SystemTime::now(),
            payload,
        }
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn event_time(&self) -> SystemTime {
        self.event_time
    }

    pub fn payload(&self) -> &NotificationPayload {
        &self.payload
    }

    pub fn kind(&self) -> NotificationKind {
        match self.payload {
            NotificationPayload::PeriodicUpdate(_) => NotificationKind::PeriodicUpdate,
            NotificationPayload::OnChangeUpdate(_) => NotificationKind::OnChangeUpdate,
            NotificationPayload::OamStatus { .. } => NotificationKind::OamStatus,
        }
    }

    /// Body of an update notification, `None` for OAM events.
    pub fn document(&self) -> Option<&Document> {
        match &self.payload {
            NotificationPayload::PeriodicUpdate(doc) | NotificationPayload::OnChangeUpdate(doc) => {
                Some(doc)
            }
            NotificationPayload::OamStatus { .. } => None,
        }
    }

    pub fn oam_status(&self) -> Option<OamStatus> {
        match &self.payload {
            NotificationPayload::OamStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match &self.payload {
            NotificationPayload::OamStatus { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }
}
