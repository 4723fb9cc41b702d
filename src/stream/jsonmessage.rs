use std::collections::HashMap;
use std::fmt;
use std::io::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::progress::JsonProgress;
use crate::error::SessionError;
use crate::tty::TerminalSizeSource;

const READ_CHUNK: usize = 8 * 1024;
const DEFAULT_WIDTH: u16 = 200;
const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Error embedded by the daemon in a progress message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JsonError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl fmt::Display for JsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// One record of a structured progress stream.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct JsonMessage {
    pub stream: String,
    pub status: String,
    #[serde(rename = "progressDetail")]
    pub progress_detail: Option<JsonProgress>,
    /// Pre-rendered progress bar sent by older daemons
    #[serde(rename = "progress")]
    pub progress_message: String,
    pub id: String,
    pub from: String,
    pub time: i64,
    #[serde(rename = "timeNano")]
    pub time_nano: i64,
    #[serde(rename = "errorDetail")]
    pub error_detail: Option<JsonError>,
    #[serde(rename = "error")]
    pub error_message: String,
    pub aux: Option<serde_json::Value>,
}

impl JsonMessage {
    fn failure(&self) -> Option<SessionError> {
        if let Some(detail) = &self.error_detail {
            if detail.code == 401 {
                return Some(SessionError::Decode(
                    "Authentication is required.".to_string(),
                ));
            }
            return Some(SessionError::Decode(detail.to_string()));
        }
        if !self.error_message.is_empty() {
            return Some(SessionError::Decode(self.error_message.clone()));
        }
        None
    }

    /// Renders the message into `out`. An embedded error is returned
    /// instead of being printed.
    fn render(
        &self,
        out: &mut Vec<u8>,
        is_terminal: bool,
        width: u16,
        now: i64,
    ) -> Result<(), SessionError> {
        if let Some(err) = self.failure() {
            return Err(err);
        }

        let bar = self
            .progress_detail
            .map(|progress| progress.render(width, now))
            .unwrap_or_default();
        let mut endl = "";
        if is_terminal && self.stream.is_empty() && self.progress_detail.is_some() {
            out.extend_from_slice(b"\x1b[2K\r");
            endl = "\r";
        } else if !bar.is_empty() {
            // progress bars only make sense on a terminal
            return Ok(());
        }

        if self.time_nano != 0 {
            write!(out, "{} ", format_timestamp(self.time_nano))?;
        } else if self.time != 0 {
            write!(
                out,
                "{} ",
                format_timestamp(self.time.saturating_mul(NANOS_PER_SEC))
            )?;
        }
        if !self.id.is_empty() {
            write!(out, "{}: ", self.id)?;
        }
        if !self.from.is_empty() {
            write!(out, "(from {}) ", self.from)?;
        }

        if self.progress_detail.is_some() && is_terminal {
            write!(out, "{} {}{}", self.status, bar, endl)?;
        } else if !self.progress_message.is_empty() {
            write!(out, "{} {}{}", self.status, self.progress_message, endl)?;
        } else if !self.stream.is_empty() {
            write!(out, "{}{}", self.stream, endl)?;
        } else {
            writeln!(out, "{}{}", self.status, endl)?;
        }
        Ok(())
    }

    fn tracks_progress(&self) -> bool {
        !self.id.is_empty() && (self.progress_detail.is_some() || !self.progress_message.is_empty())
    }
}

fn format_timestamp(nanos: i64) -> String {
    let secs = nanos.div_euclid(NANOS_PER_SEC);
    let subsec = nanos.rem_euclid(NANOS_PER_SEC) as u32;
    DateTime::<Utc>::from_timestamp(secs, subsec)
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Nanos, true))
        .unwrap_or_default()
}

/// Keeps one terminal line per in-flight progress id so updates overwrite
/// their own line.
struct ProgressDisplay {
    is_terminal: bool,
    lines: HashMap<String, usize>,
}

impl ProgressDisplay {
    fn new(is_terminal: bool) -> Self {
        Self {
            is_terminal,
            lines: HashMap::new(),
        }
    }

    fn show(
        &mut self,
        message: &JsonMessage,
        terminal: &dyn TerminalSizeSource,
        out: &mut Vec<u8>,
    ) -> Result<(), SessionError> {
        if message.aux.is_some() {
            return Ok(());
        }

        let mut diff = 0;
        if message.tracks_progress() {
            let tracked = self.lines.len();
            match self.lines.get(&message.id) {
                Some(line) => diff = tracked - line,
                None => {
                    self.lines.insert(message.id.clone(), tracked);
                    if self.is_terminal {
                        out.push(b'\n');
                    }
                }
            }
            if self.is_terminal {
                write!(out, "\x1b[{diff}A")?;
            }
        } else {
            self.lines.clear();
        }

        let width = match message.progress_detail {
            Some(_) => match terminal.query().width {
                0 => DEFAULT_WIDTH,
                width => width,
            },
            None => DEFAULT_WIDTH,
        };
        let rendered = message.render(out, self.is_terminal, width, Utc::now().timestamp());

        if !message.id.is_empty() && self.is_terminal {
            write!(out, "\x1b[{diff}B")?;
        }
        rendered
    }
}

/// Incremental decoder for whitespace-separated JSON messages that may be
/// split arbitrarily across reads.
#[derive(Default)]
struct MessageDecoder {
    buffer: Vec<u8>,
}

impl MessageDecoder {
    fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    fn next_message(&mut self) -> Result<Option<JsonMessage>, SessionError> {
        let mut messages =
            serde_json::Deserializer::from_slice(&self.buffer).into_iter::<JsonMessage>();
        match messages.next() {
            None => {
                self.buffer.clear();
                Ok(None)
            }
            Some(Ok(message)) => {
                let consumed = messages.byte_offset();
                self.buffer.drain(..consumed);
                Ok(Some(message))
            }
            Some(Err(err)) if err.is_eof() => Ok(None),
            Some(Err(err)) => Err(err.into()),
        }
    }

    fn finish(&self) -> Result<(), SessionError> {
        if self.buffer.iter().all(u8::is_ascii_whitespace) {
            Ok(())
        } else {
            Err(SessionError::Decode(
                "unexpected end of JSON message stream".to_string(),
            ))
        }
    }
}

/// Decodes every progress message in `body` and renders it to `out`.
///
/// On a terminal, progress updates for the same id rewrite their line in
/// place; otherwise messages carrying a progress bar are skipped and the
/// rest are printed one per line. The first embedded error aborts the call.
pub async fn display_json_messages<R, W>(
    body: &mut R,
    out: &mut W,
    is_terminal: bool,
    terminal: &dyn TerminalSizeSource,
) -> Result<(), SessionError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut decoder = MessageDecoder::default();
    let mut display = ProgressDisplay::new(is_terminal);
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let read = body.read(&mut chunk).await?;
        decoder.push(&chunk[..read]);

        while let Some(message) = decoder.next_message()? {
            let mut rendered = Vec::new();
            let shown = display.show(&message, terminal, &mut rendered);
            out.write_all(&rendered).await?;
            out.flush().await?;
            shown?;
        }

        if read == 0 {
            decoder.finish()?;
            break;
        }
    }

    out.flush().await?;
    Ok(())
}
