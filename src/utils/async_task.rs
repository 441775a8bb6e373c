use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::Result;

// Helper function to spawn tasks and log how they ended
pub(crate) fn spawn_task<F, Fut>(
    name: &str,
    task_fn: F,
) -> JoinHandle<()>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<()>> + Send + 'static,
{
    // Clone the name so it can be safely moved into the async block
    let name = name.to_string();
    tokio::spawn(async move {
        match task_fn().await {
            Ok(()) => debug!("spawned task: {name} finished"),
            Err(e) => error!("spawned task: {name} stopped or encountered an error: {:?}", e),
        }
    })
}

/// A spawned background loop paired with its cancellation token.
///
/// [`ScheduledTask::quiet_close`] is idempotent and never fails: the first
/// call cancels the loop and waits (bounded) for it to finish, later calls
/// return immediately. Must not be closed from inside its own loop.
#[derive(Debug)]
pub(crate) struct ScheduledTask {
    name: String,
    token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ScheduledTask {
    pub(crate) fn spawn<F, Fut>(
        name: impl Into<String>,
        task_fn: F,
    ) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let name = name.into();
        let token = CancellationToken::new();
        let child = token.clone();
        let handle = spawn_task(&name, move || task_fn(child));
        Self {
            name,
            token,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Signals the loop to stop without waiting for it.
    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.lock().as_ref().map_or(true, |h| h.is_finished())
    }

    pub(crate) async fn quiet_close(
        &self,
        close_timeout: Duration,
    ) {
        self.token.cancel();

        let Some(handle) = self.handle.lock().take() else {
            debug!("task {} already closed", self.name);
            return;
        };

        let abort = handle.abort_handle();
        match timeout(close_timeout, handle).await {
            Ok(Ok(())) => debug!("task {} closed", self.name),
            Ok(Err(e)) if e.is_cancelled() => debug!("task {} aborted", self.name),
            Ok(Err(e)) => warn!("task {} ended abnormally while closing: {:?}", self.name, e),
            Err(_) => {
                warn!(
                    "task {} did not finish within {:?}, aborting",
                    self.name, close_timeout
                );
                abort.abort();
            }
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
