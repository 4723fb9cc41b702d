//! Consumption of daemon response bodies.
//!
//! A body is either a sequence of JSON progress messages, a raw terminal
//! byte stream, or stdout and stderr multiplexed into length-prefixed frames.
//! [`StreamMode::select`] picks the strategy and [`StreamRouter`] runs it.

mod jsonmessage;
mod progress;
mod stdcopy;

use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

use futures::TryStreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::io::StreamReader;

use crate::error::SessionError;
use crate::tty::TerminalSizeSource;

pub use jsonmessage::{display_json_messages, JsonError, JsonMessage};
pub use progress::{human_size, JsonProgress};
pub use stdcopy::{demultiplex, StdStream, FRAME_HEADER_LEN};

const JSON_CONTENT_TYPE: &str = "application/json";

/// Owned response body. Dropping it closes the underlying connection.
pub type Body = Pin<Box<dyn AsyncRead + Send>>;

/// Destination for routed output.
pub type OutputWriter<'a> = &'a mut (dyn AsyncWrite + Unpin + Send);

/// A daemon response ready to be consumed exactly once.
pub struct StreamEnvelope {
    pub body: Body,
    pub content_type: String,
    pub status: StatusCode,
}

impl StreamEnvelope {
    pub fn new(body: Body, content_type: impl Into<String>, status: StatusCode) -> Self {
        Self {
            body,
            content_type: content_type.into(),
            status,
        }
    }

    /// Wraps a streaming HTTP response without buffering it.
    pub fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = response.bytes_stream().map_err(io::Error::other);
        Self::new(Box::pin(StreamReader::new(bytes)), content_type, status)
    }

    /// Envelope over an in-memory body.
    pub fn from_bytes(
        bytes: Vec<u8>,
        content_type: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self::new(Box::pin(io::Cursor::new(bytes)), content_type, status)
    }
}

impl fmt::Debug for StreamEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamEnvelope")
            .field("content_type", &self.content_type)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Strategy used to consume a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// Structured progress messages rendered to stdout
    JsonMessages,
    /// Unframed terminal bytes copied to stdout
    Raw,
    /// Length-prefixed stdout/stderr frames
    Multiplexed,
}

impl StreamMode {
    pub fn select(content_type: &str, raw_terminal: bool) -> Self {
        if matches_content_type(content_type, JSON_CONTENT_TYPE) {
            StreamMode::JsonMessages
        } else if raw_terminal {
            StreamMode::Raw
        } else {
            StreamMode::Multiplexed
        }
    }
}

/// Compares the media type of `content_type` with `expected`, ignoring
/// parameters such as `charset`.
pub fn matches_content_type(content_type: &str, expected: &str) -> bool {
    match parse_media_type(content_type) {
        Some(media_type) => media_type.eq_ignore_ascii_case(expected),
        None => {
            if !content_type.trim().is_empty() {
                log::warn!("error parsing media type: {content_type:?}");
            }
            false
        }
    }
}

/// Media type of a `Content-Type` value, or `None` when the value is
/// malformed. Every parameter must be `key=value` with a token key and a
/// token or quoted-string value.
fn parse_media_type(content_type: &str) -> Option<&str> {
    let mut parts = content_type.split(';');
    let media_type = parts.next()?.trim();
    let (kind, subtype) = media_type.split_once('/')?;
    if !(is_token(kind) && is_token(subtype)) {
        return None;
    }
    for param in parts.map(str::trim).filter(|param| !param.is_empty()) {
        let (key, value) = param.split_once('=')?;
        if !is_token(key.trim_end()) || !is_param_value(value.trim_start()) {
            return None;
        }
    }
    Some(media_type)
}

fn is_token(part: &str) -> bool {
    !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c))
}

fn is_param_value(value: &str) -> bool {
    match value.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) {
        Some(quoted) => {
            let mut chars = quoted.chars();
            while let Some(c) = chars.next() {
                match c {
                    '\\' if chars.next().is_none() => return false,
                    '"' => return false,
                    _ => {}
                }
            }
            true
        }
        None => is_token(value),
    }
}

/// Routes response bodies to the local terminal.
#[derive(Clone)]
pub struct StreamRouter {
    is_terminal_out: bool,
    terminal: Arc<dyn TerminalSizeSource>,
}

impl StreamRouter {
    /// `is_terminal_out` selects animated progress rendering; `terminal`
    /// supplies the width used to lay out progress bars.
    pub fn new(is_terminal_out: bool, terminal: Arc<dyn TerminalSizeSource>) -> Self {
        Self {
            is_terminal_out,
            terminal,
        }
    }

    /// Consumes `body` entirely.
    ///
    /// With no writer at all the body is drained and discarded so the
    /// connection stays reusable. The body is dropped exactly once when this
    /// returns, whatever the outcome.
    pub async fn route(
        &self,
        mut body: Body,
        content_type: &str,
        raw_terminal: bool,
        stdout: Option<OutputWriter<'_>>,
        stderr: Option<OutputWriter<'_>>,
    ) -> Result<(), SessionError> {
        let mode = StreamMode::select(content_type, raw_terminal);
        log::debug!("routing {content_type:?} body as {mode:?}");

        match (mode, stdout, stderr) {
            (StreamMode::JsonMessages, Some(out), _) => {
                display_json_messages(
                    &mut body,
                    out,
                    self.is_terminal_out,
                    self.terminal.as_ref(),
                )
                .await
            }
            (StreamMode::JsonMessages, None, _) => {
                display_json_messages(
                    &mut body,
                    &mut tokio::io::sink(),
                    self.is_terminal_out,
                    self.terminal.as_ref(),
                )
                .await
            }
            (_, None, None) => drain(&mut body).await,
            (StreamMode::Raw, Some(out), _) => {
                tokio::io::copy(&mut body, out).await?;
                Ok(())
            }
            (StreamMode::Raw, None, Some(_)) => drain(&mut body).await,
            (StreamMode::Multiplexed, out, err) => {
                demultiplex(&mut body, out, err).await?;
                Ok(())
            }
        }
    }
}

async fn drain(body: &mut Body) -> Result<(), SessionError> {
    let discarded = tokio::io::copy(body, &mut tokio::io::sink()).await?;
    log::trace!("discarded {discarded} bytes with no output attached");
    Ok(())
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
