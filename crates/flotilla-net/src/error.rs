//! Transport error types.

use thiserror::Error;

/// Errors surfaced by the peer transport.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame codec: {0}")]
    Codec(#[from] bincode::Error),

    #[error("frame of {0} bytes exceeds the {1} byte limit")]
    FrameTooLarge(usize, usize),

    #[error("handshake: {0}")]
    Handshake(String),

    #[error("no connected peer with uuid {0}")]
    PeerUnavailable(String),

    #[error("tls: {0}")]
    Tls(String),

    #[error("tls config: {0}")]
    Rustls(#[from] rustls::Error),
}
