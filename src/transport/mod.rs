//! Delivery hand-off to the wire layer.
//!
//! How a notification reaches the subscriber (chunked HTTP, a persistent
//! session, ...) is decided by the implementation; the engine only hands
//! over composed notifications and asks for channel teardown.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::Notification;
use crate::Result;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(
        &self,
        notification: Notification,
        subscription_id: &str,
    ) -> Result<()>;

    /// Tears down the subscriber's delivery channel.
    async fn close_channel(
        &self,
        subscription_id: &str,
    ) -> Result<()>;
}
