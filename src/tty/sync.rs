use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{ResizeNotifications, TerminalSizeSource};
use crate::error::SessionError;
use crate::session::Session;

/// Remote side of a resize push.
#[async_trait]
pub trait Resizer: Send + Sync {
    async fn resize(
        &self,
        container_id: &str,
        exec_id: &str,
        height: u16,
        width: u16,
    ) -> Result<(), SessionError>;
}

/// Handle to a running resize loop.
///
/// The loop stops when [`ResizeSync::stop`] is called, when the handle is
/// dropped, or when the notification stream ends.
#[must_use = "dropping the handle stops the resize loop"]
pub struct ResizeSync {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ResizeSync {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancels the loop and waits for it to exit. A push already in flight
    /// completes first.
    pub async fn stop(self) {
        self.cancel.cancel();
        self.join().await;
    }

    /// Waits for the loop to end on its own, once the notification stream
    /// is exhausted.
    pub async fn wait(self) {
        self.join().await;
    }

    async fn join(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                log::warn!("resize loop ended abnormally: {err}");
            }
        }
    }
}

impl Drop for ResizeSync {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawns the background loop that pushes the local terminal size to
/// `session` after every notification.
///
/// Nothing is pushed at start. Sizes are queried when a notification
/// arrives; `(0, 0)` means the output is not a terminal and is skipped.
/// Failed pushes are logged and the loop carries on.
pub fn start_resize_sync(
    session: Session,
    terminal: Arc<dyn TerminalSizeSource>,
    notifications: ResizeNotifications,
    resizer: Arc<dyn Resizer>,
) -> ResizeSync {
    let cancel = CancellationToken::new();
    let task = tokio::spawn(listen(
        session,
        terminal,
        notifications,
        resizer,
        cancel.clone(),
    ));
    ResizeSync {
        cancel,
        task: Some(task),
    }
}

async fn listen(
    session: Session,
    terminal: Arc<dyn TerminalSizeSource>,
    mut notifications: ResizeNotifications,
    resizer: Arc<dyn Resizer>,
    cancel: CancellationToken,
) {
    log::debug!("listening for terminal resizes on {session}");
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,
            event = notifications.next() => match event {
                Some(()) => push_size(&session, terminal.as_ref(), resizer.as_ref()).await,
                None => break,
            },
        }
    }
    log::debug!("stopped resize sync for {session}");
}

/// Pushes the current local size to `session`, skipping `(0, 0)`. Failures
/// are logged and swallowed.
pub async fn push_size(session: &Session, terminal: &dyn TerminalSizeSource, resizer: &dyn Resizer) {
    let size = terminal.query();
    if size.is_none() {
        log::trace!("output is not a terminal, skipping resize");
        return;
    }
    if let Err(err) = resizer
        .resize(session.container_id(), session.exec_id(), size.height, size.width)
        .await
    {
        log::warn!("failed to resize tty of {session}: {err}");
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
