//! Error types surfaced by the client API

use thiserror::Error;

/// Errors returned by [`crate::service::SqueezeClient`] and the engine operations.
///
/// `HandshakeNotComplete` means "not yet", never "the server refused".
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("handshake with server has not completed")]
    HandshakeNotComplete,

    #[error("not connected to a server")]
    NotConnected,

    #[error("no active player")]
    NoActivePlayer,

    #[error("unknown player: {0}")]
    UnknownPlayer(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("client worker has stopped")]
    WorkerGone,
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
