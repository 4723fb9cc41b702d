use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use super::OutputWriter;
use crate::error::SessionError;

/// `[stream type, 0, 0, 0, size as u32 big-endian]`
pub const FRAME_HEADER_LEN: usize = 8;

/// Channel a multiplexed frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdStream {
    Stdin,
    Stdout,
    Stderr,
    /// Out-of-band error reported by the daemon
    SystemErr,
}

impl StdStream {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(StdStream::Stdin),
            1 => Some(StdStream::Stdout),
            2 => Some(StdStream::Stderr),
            3 => Some(StdStream::SystemErr),
            _ => None,
        }
    }
}

/// Splits a multiplexed stream into `stdout` and `stderr`.
///
/// Stdin frames are echoed to `stdout`. Frames for a missing writer are
/// discarded. Returns the number of payload bytes consumed.
pub async fn demultiplex<R>(
    body: &mut R,
    mut stdout: Option<OutputWriter<'_>>,
    mut stderr: Option<OutputWriter<'_>>,
) -> Result<u64, SessionError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; FRAME_HEADER_LEN];
    let mut written = 0u64;

    while read_header(body, &mut header).await? {
        let size = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        let stream = StdStream::from_byte(header[0]).ok_or_else(|| {
            SessionError::Decode(format!("unrecognized stream type: {}", header[0]))
        })?;

        let mut frame = (&mut *body).take(u64::from(size));
        let copied = match stream {
            StdStream::Stdin | StdStream::Stdout => {
                copy_frame(&mut frame, stdout.as_deref_mut()).await?
            }
            StdStream::Stderr => copy_frame(&mut frame, stderr.as_deref_mut()).await?,
            StdStream::SystemErr => {
                let mut message = Vec::with_capacity(size as usize);
                frame.read_to_end(&mut message).await?;
                return Err(SessionError::Decode(format!(
                    "error from daemon in stream: {}",
                    String::from_utf8_lossy(&message)
                )));
            }
        };

        if copied < u64::from(size) {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("frame truncated after {copied} of {size} bytes"),
            )
            .into());
        }
        written += copied;
    }

    Ok(written)
}

/// Fills `header`, returning `false` on a clean end of stream.
async fn read_header<R>(
    body: &mut R,
    header: &mut [u8; FRAME_HEADER_LEN],
) -> Result<bool, SessionError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < FRAME_HEADER_LEN {
        let read = body.read(&mut header[filled..]).await?;
        if read == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("frame header truncated after {filled} bytes"),
            )
            .into());
        }
        filled += read;
    }
    Ok(true)
}

async fn copy_frame<R, W>(frame: &mut R, out: Option<&mut W>) -> io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    match out {
        Some(out) => tokio::io::copy(frame, out).await,
        None => tokio::io::copy(frame, &mut tokio::io::sink()).await,
    }
}
