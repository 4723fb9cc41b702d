//! HTTP client for the container daemon.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};

use crate::auth::{AuthConfig, REGISTRY_AUTH_HEADER};
use crate::error::SessionError;
use crate::stream::StreamEnvelope;
use crate::tty::Resizer;

/// Address the daemon listens on when nothing else is configured.
pub const DEFAULT_HOST: &str = "http://127.0.0.1:22318";

/// Query options for [`DaemonClient::container_logs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogsOptions {
    pub follow: bool,
    pub stdout: bool,
    pub stderr: bool,
    pub timestamps: bool,
    /// Number of trailing lines, or `"all"`
    pub tail: String,
}

impl Default for LogsOptions {
    fn default() -> Self {
        Self {
            follow: false,
            stdout: true,
            stderr: true,
            timestamps: false,
            tail: "all".to_string(),
        }
    }
}

/// Client for the daemon's HTTP API.
///
/// Responses are returned as [`StreamEnvelope`]s without buffering so the
/// caller can render them while they arrive.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    base_url: String,
    client: Client,
}

impl DaemonClient {
    /// Creates a client for `host`.
    ///
    /// `tcp://` hosts are spoken to over plain HTTP; a host without a scheme
    /// gets `http://`. `timeout` bounds connection setup only, since log
    /// streams may stay open indefinitely.
    pub fn new(host: &str, timeout: Option<Duration>) -> Result<Self, SessionError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.connect_timeout(timeout);
        }
        Ok(Self {
            base_url: normalize_host(host)?,
            client: builder.build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Pulls `image`, streaming JSON progress messages.
    pub async fn pull_image(
        &self,
        image: &str,
        auth: &AuthConfig,
    ) -> Result<StreamEnvelope, SessionError> {
        let request = self
            .client
            .post(self.url("/image/create"))
            .query(&[("imageName", image)])
            .header(REGISTRY_AUTH_HEADER, auth.encode_header()?);
        self.stream("pull", request).await
    }

    /// Pushes `image` to its registry, streaming JSON progress messages.
    pub async fn push_image(
        &self,
        image: &str,
        auth: &AuthConfig,
    ) -> Result<StreamEnvelope, SessionError> {
        let request = self
            .client
            .post(self.url("/image/push"))
            .query(&[("remote", image)])
            .header(REGISTRY_AUTH_HEADER, auth.encode_header()?);
        self.stream("push", request).await
    }

    /// Fetches the output of `container`, multiplexed unless the container
    /// runs with a tty.
    pub async fn container_logs(
        &self,
        container: &str,
        options: &LogsOptions,
    ) -> Result<StreamEnvelope, SessionError> {
        let request = self.client.get(self.url("/container/logs")).query(&[
            ("container", container),
            ("follow", bool_param(options.follow)),
            ("stdout", bool_param(options.stdout)),
            ("stderr", bool_param(options.stderr)),
            ("timestamps", bool_param(options.timestamps)),
            ("tail", options.tail.as_str()),
        ]);
        self.stream("logs", request).await
    }

    /// Sets the pty size of exec `tag` in `container`.
    pub async fn win_resize(
        &self,
        container: &str,
        tag: &str,
        height: u16,
        width: u16,
    ) -> Result<(), SessionError> {
        let (height, width) = (height.to_string(), width.to_string());
        let response = self
            .client
            .post(self.url("/tty/resize"))
            .query(&[
                ("id", container),
                ("tag", tag),
                ("h", height.as_str()),
                ("w", width.as_str()),
            ])
            .send()
            .await?;
        log::debug!("resize HTTP status: {}", response.status());
        check_status(response).await?;
        Ok(())
    }

    async fn stream(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> Result<StreamEnvelope, SessionError> {
        let response = request.send().await?;
        log::debug!("{operation} HTTP status: {}", response.status());
        let response = check_status(response).await?;
        Ok(StreamEnvelope::from_response(response))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Resizer for DaemonClient {
    async fn resize(
        &self,
        container_id: &str,
        exec_id: &str,
        height: u16,
        width: u16,
    ) -> Result<(), SessionError> {
        self.win_resize(container_id, exec_id, height, width)
            .await
            .map_err(|err| SessionError::Resize(err.to_string()))
    }
}

/// Turns a non-2xx response into [`SessionError::Status`] carrying the
/// trimmed response body.
async fn check_status(response: Response) -> Result<Response, SessionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    log::trace!("error body: {body}");
    Err(SessionError::Status {
        status,
        message: body.trim().to_string(),
    })
}

fn normalize_host(host: &str) -> Result<String, SessionError> {
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() {
        return Err(SessionError::Config("daemon host is empty".to_string()));
    }
    match host.split_once("://") {
        None => Ok(format!("http://{host}")),
        Some(("tcp", rest)) => Ok(format!("http://{rest}")),
        Some(("http" | "https", _)) => Ok(host.to_string()),
        Some((scheme, _)) => Err(SessionError::Config(format!(
            "unsupported daemon host scheme: {scheme}"
        ))),
    }
}

fn bool_param(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
