//! Connection handshake: login, capability discovery, version confirmation.
//!
//! The server acknowledges a bad password and then drops the link, so a
//! disconnect before [`HandshakePhase::Ready`] is read as a login failure.

use crate::error::{ClientError, ClientResult};
use crate::protocol::token::encode;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandshakePhase {
    #[default]
    Disconnected,
    Connecting,
    AwaitingLogin,
    AwaitingCapabilities,
    Ready,
}

/// Sent right after `login` is acknowledged. `version ?` must stay last: its
/// answer is what completes the handshake.
pub const CAPABILITY_QUERIES: &[&str] = &[
    "listen 1",
    "can musicfolder ?",
    "can randomplay ?",
    "can favorites items ?",
    "can myapps items ?",
    "pref httpport ?",
    "pref jivealbumsort ?",
    "pref mediadirs ?",
    "version ?",
];

pub fn login_command(username: Option<&str>, password: Option<&str>) -> String {
    format!(
        "login {} {}",
        encode(username.unwrap_or_default()),
        encode(password.unwrap_or_default())
    )
}

#[derive(Debug, Default)]
pub struct Handshake {
    phase: HandshakePhase,
    logged_in: bool,
}

impl Handshake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> HandshakePhase {
        self.phase
    }

    pub fn is_complete(&self) -> bool {
        self.phase == HandshakePhase::Ready
    }

    /// The transport is open (any phase from login onwards).
    pub fn is_connected(&self) -> bool {
        self.phase >= HandshakePhase::AwaitingLogin
    }

    pub fn is_connecting(&self) -> bool {
        self.phase == HandshakePhase::Connecting
    }

    pub fn start_connecting(&mut self) {
        self.phase = HandshakePhase::Connecting;
        self.logged_in = false;
    }

    pub fn transport_opened(&mut self) {
        self.phase = HandshakePhase::AwaitingLogin;
    }

    /// Returns true for the first `login` of a connection, including one
    /// echoed after `version` already completed the handshake. The phase
    /// never moves back from [`HandshakePhase::Ready`].
    pub fn login_acknowledged(&mut self) -> bool {
        if !self.is_connected() || self.logged_in {
            return false;
        }
        self.logged_in = true;
        if self.phase == HandshakePhase::AwaitingLogin {
            self.phase = HandshakePhase::AwaitingCapabilities;
        }
        true
    }

    /// Mark the handshake complete. Returns true if it was not complete
    /// already. Any connected phase qualifies; login need not have been seen.
    pub fn version_received(&mut self) -> bool {
        if !self.is_connected() || self.is_complete() {
            return false;
        }
        self.phase = HandshakePhase::Ready;
        true
    }

    pub fn reset(&mut self) {
        self.phase = HandshakePhase::Disconnected;
        self.logged_in = false;
    }

    pub fn require_complete(&self) -> ClientResult<()> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(ClientError::HandshakeNotComplete)
        }
    }
}
