use std::io;
use std::pin::Pin;

use futures::stream::Stream;

/// Stream yielding once per local terminal resize.
pub type ResizeNotifications = Pin<Box<dyn Stream<Item = ()> + Send>>;

/// Subscribes to `SIGWINCH`. Must be called from within a tokio runtime.
#[cfg(unix)]
pub fn window_change_notifications() -> io::Result<ResizeNotifications> {
    use tokio::signal::unix::{signal, SignalKind};

    let sigwinch = signal(SignalKind::window_change())?;
    let events = futures::stream::unfold(sigwinch, |mut sigwinch| async move {
        sigwinch.recv().await.map(|()| ((), sigwinch))
    });
    Ok(Box::pin(events))
}

/// No resize signal exists on this platform; the stream never yields.
#[cfg(not(unix))]
pub fn window_change_notifications() -> io::Result<ResizeNotifications> {
    Ok(Box::pin(futures::stream::pending()))
}
