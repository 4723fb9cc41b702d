//! Interactive session transport: authenticated daemon operations, output
//! routing and tty size synchronization wired together.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::auth::{AuthConfig, AuthRetryGate, IndexInfo, Login, SharedCredentials};
use crate::client::{DaemonClient, LogsOptions};
use crate::error::SessionError;
use crate::stream::{Body, OutputWriter, StreamEnvelope, StreamRouter};
use crate::tty::{self, LocalTerminal, ResizeNotifications, ResizeSync, TerminalSizeSource};

const TAG_LEN: usize = 8;

/// A process running inside a container, addressed by container id and
/// exec tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Session {
    container_id: String,
    exec_id: String,
}

impl Session {
    pub fn new(container_id: impl Into<String>, exec_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            exec_id: exec_id.into(),
        }
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn exec_id(&self) -> &str {
        &self.exec_id
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container_id, self.exec_id)
    }
}

/// Random alphanumeric tag identifying a new exec session.
pub fn random_tag() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TAG_LEN)
        .map(char::from)
        .collect()
}

/// Client-side session shim over a [`DaemonClient`].
pub struct SessionClient {
    daemon: Arc<DaemonClient>,
    gate: AuthRetryGate,
    router: StreamRouter,
    terminal: Arc<dyn TerminalSizeSource>,
}

impl SessionClient {
    /// Session client rendering to the process's own terminal.
    pub fn new(daemon: DaemonClient, credentials: SharedCredentials, login: Arc<dyn Login>) -> Self {
        let local = LocalTerminal::detect();
        Self::with_terminal(
            daemon,
            credentials,
            login,
            local.is_terminal_out(),
            Arc::new(local),
        )
    }

    pub fn with_terminal(
        daemon: DaemonClient,
        credentials: SharedCredentials,
        login: Arc<dyn Login>,
        is_terminal_out: bool,
        terminal: Arc<dyn TerminalSizeSource>,
    ) -> Self {
        Self {
            daemon: Arc::new(daemon),
            gate: AuthRetryGate::new(credentials, login),
            router: StreamRouter::new(is_terminal_out, Arc::clone(&terminal)),
            terminal,
        }
    }

    pub fn daemon(&self) -> &DaemonClient {
        &self.daemon
    }

    pub fn credentials(&self) -> &SharedCredentials {
        self.gate.credentials()
    }

    /// Runs `operation`, logging in and retrying once if the daemon answers
    /// "unauthorized". The login prompt goes to stdout.
    pub async fn perform_with_auth_retry<F, Fut>(
        &self,
        index: &IndexInfo,
        operation: F,
        tag: &str,
    ) -> Result<StreamEnvelope, SessionError>
    where
        F: FnMut(AuthConfig) -> Fut,
        Fut: Future<Output = Result<StreamEnvelope, SessionError>>,
    {
        let mut stdout = tokio::io::stdout();
        self.gate.perform(index, operation, tag, &mut stdout).await
    }

    /// Consumes `body` and writes it to the given outputs.
    pub async fn route_output(
        &self,
        body: Body,
        content_type: &str,
        raw_terminal: bool,
        stdout: Option<OutputWriter<'_>>,
        stderr: Option<OutputWriter<'_>>,
    ) -> Result<(), SessionError> {
        self.router
            .route(body, content_type, raw_terminal, stdout, stderr)
            .await
    }

    /// Starts pushing local terminal resizes to `session`.
    pub fn start_resize_sync(&self, session: &Session) -> Result<ResizeSync, SessionError> {
        let notifications = tty::window_change_notifications()?;
        Ok(self.resize_sync_with(session, notifications))
    }

    fn resize_sync_with(&self, session: &Session, notifications: ResizeNotifications) -> ResizeSync {
        tty::start_resize_sync(
            session.clone(),
            Arc::clone(&self.terminal),
            notifications,
            self.daemon.clone(),
        )
    }

    /// Pushes the current terminal size to `session` once, then keeps it in
    /// sync until the returned handle is stopped. A failed initial push is
    /// logged and does not prevent the loop from starting.
    pub async fn attach_resize(&self, session: &Session) -> Result<ResizeSync, SessionError> {
        tty::push_size(session, self.terminal.as_ref(), self.daemon.as_ref()).await;
        self.start_resize_sync(session)
    }

    /// Renders the raw terminal output of an interactive `session` while
    /// keeping its pty sized to the local terminal.
    ///
    /// The resize loop lives exactly as long as the output: it is stopped
    /// once `envelope` is fully consumed, whether routing succeeded or not.
    pub async fn interactive(
        &self,
        session: &Session,
        envelope: StreamEnvelope,
        stdout: Option<OutputWriter<'_>>,
        stderr: Option<OutputWriter<'_>>,
    ) -> Result<(), SessionError> {
        let notifications = tty::window_change_notifications()?;
        self.interactive_with(session, envelope, notifications, stdout, stderr)
            .await
    }

    /// [`SessionClient::interactive`] driven by an explicit notification
    /// stream.
    pub async fn interactive_with(
        &self,
        session: &Session,
        envelope: StreamEnvelope,
        notifications: ResizeNotifications,
        stdout: Option<OutputWriter<'_>>,
        stderr: Option<OutputWriter<'_>>,
    ) -> Result<(), SessionError> {
        let sync = self.resize_sync_with(session, notifications);
        let routed = self.consume(envelope, true, stdout, stderr).await;
        sync.stop().await;
        log::debug!("interactive output of {session} ended");
        routed
    }

    /// Pulls `image` and renders its progress.
    pub async fn pull_image(
        &self,
        image: &str,
        stdout: Option<OutputWriter<'_>>,
        stderr: Option<OutputWriter<'_>>,
    ) -> Result<(), SessionError> {
        let daemon = &self.daemon;
        let envelope = self
            .perform_with_auth_retry(
                &IndexInfo::from_image(image),
                move |auth| async move { daemon.pull_image(image, &auth).await },
                "pull",
            )
            .await?;
        self.consume(envelope, false, stdout, stderr).await
    }

    /// Pushes `image` and renders its progress.
    pub async fn push_image(
        &self,
        image: &str,
        stdout: Option<OutputWriter<'_>>,
        stderr: Option<OutputWriter<'_>>,
    ) -> Result<(), SessionError> {
        let daemon = &self.daemon;
        let envelope = self
            .perform_with_auth_retry(
                &IndexInfo::from_image(image),
                move |auth| async move { daemon.push_image(image, &auth).await },
                "push",
            )
            .await?;
        self.consume(envelope, false, stdout, stderr).await
    }

    /// Streams the output of `container`. `raw_terminal` must be set when
    /// the container runs with a tty, whose output is not multiplexed.
    pub async fn container_logs(
        &self,
        container: &str,
        options: &LogsOptions,
        raw_terminal: bool,
        stdout: Option<OutputWriter<'_>>,
        stderr: Option<OutputWriter<'_>>,
    ) -> Result<(), SessionError> {
        let envelope = self.daemon.container_logs(container, options).await?;
        self.consume(envelope, raw_terminal, stdout, stderr).await
    }

    async fn consume(
        &self,
        envelope: StreamEnvelope,
        raw_terminal: bool,
        stdout: Option<OutputWriter<'_>>,
        stderr: Option<OutputWriter<'_>>,
    ) -> Result<(), SessionError> {
        let StreamEnvelope {
            body, content_type, ..
        } = envelope;
        self.route_output(body, &content_type, raw_terminal, stdout, stderr)
            .await
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
