//! Local terminal size and its synchronization with the remote pty.

mod signal;
mod sync;

use std::io::IsTerminal;

pub use signal::{window_change_notifications, ResizeNotifications};
pub use sync::{push_size, start_resize_sync, ResizeSync, Resizer};

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerminalSize {
    pub height: u16,
    pub width: u16,
}

impl TerminalSize {
    /// Sentinel returned when the output is not a terminal.
    pub const NONE: TerminalSize = TerminalSize {
        height: 0,
        width: 0,
    };

    pub fn new(height: u16, width: u16) -> Self {
        Self { height, width }
    }

    pub fn is_none(&self) -> bool {
        self.height == 0 && self.width == 0
    }
}

/// Something that can report the current terminal size.
pub trait TerminalSizeSource: Send + Sync {
    fn query(&self) -> TerminalSize;
}

/// The process's own standard output.
#[derive(Debug, Clone, Copy)]
pub struct LocalTerminal {
    is_terminal_out: bool,
}

impl LocalTerminal {
    pub fn detect() -> Self {
        Self {
            is_terminal_out: std::io::stdout().is_terminal(),
        }
    }

    pub fn is_terminal_out(&self) -> bool {
        self.is_terminal_out
    }
}

impl TerminalSizeSource for LocalTerminal {
    fn query(&self) -> TerminalSize {
        if !self.is_terminal_out {
            return TerminalSize::NONE;
        }
        match crossterm::terminal::size() {
            Ok((width, height)) => TerminalSize::new(height, width),
            Err(err) => {
                log::warn!("error getting terminal size: {err}");
                TerminalSize::NONE
            }
        }
    }
}
