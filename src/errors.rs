//! Telemetry Push Error Hierarchy
//!
//! Defines the error types for the subscription and notification engine,
//! categorized by the collaborator that produced them.
//!
//! Most of these never reach a caller: the delivery path recovers locally
//! and logs. They are surfaced only where an operation genuinely cannot
//! proceed (invalid subscription data, configuration problems, broadcast
//! OAM requests).

use config::ConfigError;

use crate::model::Datastore;
use crate::model::TreePath;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Data store read/write/listen failures
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Delivery channel failures
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Subtree filter evaluation failures
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Tree-to-document conversion failures
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// Subscription lookup and validation failures
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    /// Requested behaviour is a known extension point without an implementation
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Unrecoverable failures
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("Subscription {0} not found")]
    NotFound(String),

    /// Register call does not match the subscription's update trigger
    #[error("Subscription {id} is {actual}, expected {expected}")]
    ModeMismatch {
        id: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Stream {0} not supported")]
    UnknownStream(String),

    #[error("Subscription {id} has a zero period")]
    InvalidPeriod { id: String },

    #[error("Subscription {id} stop time is before its start time")]
    InvalidTimeWindow { id: String },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Read of {path} from {partition} failed: {reason}")]
    ReadFailed {
        partition: Datastore,
        path: TreePath,
        reason: String,
    },

    #[error("Write of {path} to {partition} failed: {reason}")]
    WriteFailed {
        partition: Datastore,
        path: TreePath,
        reason: String,
    },

    #[error("Change listener on {path} in {partition} failed: {reason}")]
    ListenerFailed {
        partition: Datastore,
        path: TreePath,
        reason: String,
    },

    #[error("Data store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No open delivery channel for the subscriber
    #[error("Channel for subscription {0} is closed")]
    ChannelClosed(String),

    #[error("Failed to send notification for subscription {id}: {reason}")]
    SendFailed { id: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// Filter specification could not be interpreted
    #[error("Malformed subtree filter: {0}")]
    Malformed(String),

    /// Filter was valid but evaluation against the document failed
    #[error("Subtree filter evaluation failed: {0}")]
    Evaluation(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("Failed to encode data tree: {0}")]
    Encode(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
