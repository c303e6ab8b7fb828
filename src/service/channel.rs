//! Outgoing command buffer.
//!
//! Handshake traffic goes out immediately; everything else is queued FIFO
//! and held back until the handshake completes. The serial worker drains the
//! channel to the transport after every unit of work.

use std::collections::VecDeque;

use tracing::trace;

#[derive(Debug, Default)]
pub struct CommandChannel {
    immediate: VecDeque<String>,
    queued: VecDeque<String>,
    open: bool,
}

impl CommandChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept commands from now on.
    pub fn open(&mut self) {
        self.open = true;
    }

    /// Stop accepting commands and forget everything pending.
    pub fn close(&mut self) {
        self.open = false;
        self.immediate.clear();
        self.queued.clear();
    }

    /// Send ahead of any queued command.
    pub fn send_immediately(&mut self, line: impl Into<String>) {
        let line = line.into();
        if !self.open {
            trace!("Dropping command while closed: {}", line);
            return;
        }
        self.immediate.push_back(line);
    }

    /// Queue a command behind the handshake.
    pub fn send(&mut self, line: impl Into<String>) {
        let line = line.into();
        if !self.open {
            trace!("Dropping command while closed: {}", line);
            return;
        }
        self.queued.push_back(line);
    }

    /// Lines ready for the wire, immediate first. Queued lines are released
    /// only once `handshake_complete`.
    pub fn take_ready(&mut self, handshake_complete: bool) -> Vec<String> {
        let mut lines: Vec<String> = self.immediate.drain(..).collect();
        if handshake_complete {
            lines.extend(self.queued.drain(..));
        }
        lines
    }
}
