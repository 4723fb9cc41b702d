use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{start_resize_sync, Resizer};
use crate::error::SessionError;
use crate::session::Session;
use crate::tty::{ResizeNotifications, TerminalSize, TerminalSizeSource};

struct SharedSize(Mutex<TerminalSize>);

impl SharedSize {
    fn set(&self, size: TerminalSize) {
        *self.0.lock().unwrap() = size;
    }
}

impl TerminalSizeSource for SharedSize {
    fn query(&self) -> TerminalSize {
        *self.0.lock().unwrap()
    }
}

type Push = (String, String, u16, u16);

struct RecordingResizer {
    calls: Mutex<Vec<Push>>,
    pushed: mpsc::UnboundedSender<()>,
    fail: bool,
}

#[async_trait]
impl Resizer for RecordingResizer {
    async fn resize(
        &self,
        container_id: &str,
        exec_id: &str,
        height: u16,
        width: u16,
    ) -> Result<(), SessionError> {
        self.calls.lock().unwrap().push((
            container_id.to_string(),
            exec_id.to_string(),
            height,
            width,
        ));
        let _ = self.pushed.send(());
        if self.fail {
            return Err(SessionError::Resize("daemon unavailable".to_string()));
        }
        Ok(())
    }
}

struct Harness {
    size: Arc<SharedSize>,
    resizer: Arc<RecordingResizer>,
    notify: mpsc::UnboundedSender<()>,
    pushed: mpsc::UnboundedReceiver<()>,
    sync: super::ResizeSync,
}

fn notifications() -> (mpsc::UnboundedSender<()>, ResizeNotifications) {
    let (tx, rx) = mpsc::unbounded_channel();
    let events = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (event, rx))
    });
    (tx, Box::pin(events))
}

fn harness(initial: TerminalSize, fail: bool) -> Harness {
    let size = Arc::new(SharedSize(Mutex::new(initial)));
    let (pushed_tx, pushed) = mpsc::unbounded_channel();
    let resizer = Arc::new(RecordingResizer {
        calls: Mutex::new(Vec::new()),
        pushed: pushed_tx,
        fail,
    });
    let (notify, events) = notifications();
    let sync = start_resize_sync(
        Session::new("pod-1", "tag-1"),
        size.clone(),
        events,
        resizer.clone(),
    );
    Harness {
        size,
        resizer,
        notify,
        pushed,
        sync,
    }
}

async fn next_push(pushed: &mut mpsc::UnboundedReceiver<()>) {
    tokio::time::timeout(Duration::from_secs(5), pushed.recv())
        .await
        .expect("resize was not pushed")
        .expect("resizer dropped");
}

#[tokio::test]
async fn pushes_size_queried_at_notification_time() {
    let mut h = harness(TerminalSize::new(24, 80), false);

    h.size.set(TerminalSize::new(40, 120));
    h.notify.send(()).unwrap();
    next_push(&mut h.pushed).await;

    h.size.set(TerminalSize::new(50, 150));
    h.notify.send(()).unwrap();
    next_push(&mut h.pushed).await;

    h.sync.stop().await;
    assert_eq!(
        *h.resizer.calls.lock().unwrap(),
        vec![
            ("pod-1".to_string(), "tag-1".to_string(), 40, 120),
            ("pod-1".to_string(), "tag-1".to_string(), 50, 150),
        ]
    );
}

#[tokio::test]
async fn not_a_terminal_never_pushes() {
    let h = harness(TerminalSize::NONE, false);

    for _ in 0..3 {
        h.notify.send(()).unwrap();
    }
    drop(h.notify);
    tokio::time::timeout(Duration::from_secs(5), h.sync.wait())
        .await
        .unwrap();

    assert!(h.resizer.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failed_push_keeps_listening() {
    let mut h = harness(TerminalSize::new(24, 80), true);

    h.notify.send(()).unwrap();
    next_push(&mut h.pushed).await;
    h.notify.send(()).unwrap();
    next_push(&mut h.pushed).await;

    assert!(h.sync.is_running());
    h.sync.stop().await;
    assert_eq!(h.resizer.calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn stop_releases_the_notification_source() {
    let h = harness(TerminalSize::new(24, 80), false);

    h.sync.stop().await;
    assert!(h.notify.send(()).is_err());
    assert!(h.resizer.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn dropping_the_handle_stops_the_loop() {
    let h = harness(TerminalSize::new(24, 80), false);

    drop(h.sync);
    tokio::time::timeout(Duration::from_secs(5), h.notify.closed())
        .await
        .unwrap();
}
