//! Client-side session transport for `hyperctl`.
//!
//! This crate talks to a container daemon over HTTP and handles the
//! interactive side of a session:
//!
//! - retrying a privileged operation once after an interactive login when the
//!   daemon answers "unauthorized" ([`auth::AuthRetryGate`]),
//! - rendering daemon response bodies, whether JSON progress messages, raw
//!   terminal bytes or multiplexed stdout/stderr frames ([`stream::StreamRouter`]),
//! - keeping the remote pty size in step with the local terminal
//!   ([`tty::start_resize_sync`]).
//!
//! [`session::SessionClient`] wires these together over a
//! [`client::DaemonClient`].

/// Registry credentials, login flow and the auth retry gate
pub mod auth;

/// HTTP client for the daemon API
pub mod client;

/// Error types
pub mod error;

/// Session client composing auth, output routing and resize sync
pub mod session;

/// Response body decoding and routing
pub mod stream;

/// Local terminal size and remote pty synchronization
pub mod tty;

pub use client::{DaemonClient, LogsOptions};
pub use error::SessionError;
pub use session::{random_tag, Session, SessionClient};
