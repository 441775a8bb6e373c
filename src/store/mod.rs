//! Data store collaborator
//!
//! The engine consumes the store through [`DataStore`] only:
//! - point-in-time reads of a subtree, per partition
//! - change listeners on a path, delivering [`ChangeEvent`]s until closed
//! - best-effort merge/delete used to mirror subscription records
//!
//! [`MemDataStore`] is an in-memory adaptor suitable for embedding and tests.

mod adaptors;

pub use adaptors::*;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;

use crate::ChangeEvent;
use crate::DataNode;
use crate::Datastore;
use crate::Result;
use crate::TreePath;

/// Sending half handed to the store when a change listener is installed.
pub type ChangeSink = mpsc::UnboundedSender<ChangeEvent>;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait DataStore: Send + Sync + 'static {
    /// Reads the subtree at `path`. `Ok(None)` when nothing is stored there.
    async fn read(
        &self,
        partition: Datastore,
        path: &TreePath,
    ) -> Result<Option<DataNode>>;

    /// Installs a change listener on `path`; events for writes at or
    /// below `path` are pushed into `sink` until the registration closes.
    fn subscribe_changes(
        &self,
        partition: Datastore,
        path: &TreePath,
        sink: ChangeSink,
    ) -> Result<Box<dyn ListenerRegistration>>;

    /// Merges `value` at `path`, creating intermediate containers.
    async fn merge(
        &self,
        partition: Datastore,
        path: &TreePath,
        value: DataNode,
    ) -> Result<()>;

    async fn delete(
        &self,
        partition: Datastore,
        path: &TreePath,
    ) -> Result<()>;
}

/// Live change listener; closing it stops event delivery.
#[cfg_attr(test, automock)]
pub trait ListenerRegistration: Send + Sync {
    /// Must tolerate being called more than once.
    fn close(&self) -> Result<()>;
}
