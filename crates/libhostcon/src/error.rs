use std::path::PathBuf;

use hostcon_protocol::{FrameError, MessageKind};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChannelError>;

/// Failures of the command channel and the dispatcher built on it.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("host error {code}: {text}")]
    HostError { code: i32, text: String },

    #[error("unexpected message kind: expected {expected}, got {actual}")]
    UnexpectedMessageKind {
        expected: MessageKind,
        actual: MessageKind,
    },

    #[error("command channel already has a connected peer")]
    AlreadyConnected,

    #[error("command channel has no connected peer")]
    NotConnected,

    #[error("no free port for command channel from {start_port} after {attempts} attempts: {last_error}")]
    BindRetryExhausted {
        start_port: u16,
        attempts: u32,
        last_error: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChannelError {
    /// True when the peer closed the connection mid-message.
    pub fn is_connection_broken(&self) -> bool {
        matches!(self, ChannelError::Frame(FrameError::ConnectionBroken { .. }))
    }
}

/// Failures building a session context snapshot.
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("session context is missing required field: {0}")]
    MissingField(&'static str),

    #[error("session workdir must be absolute: {}", .0.display())]
    RelativeWorkdir(PathBuf),

    #[error("invalid session context: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Failures launching or shutting down a console session.
#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("failed to enter session workdir {}: {source}", path.display())]
    Workdir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[cfg(feature = "relay")]
    #[error(transparent)]
    Relay(#[from] crate::relay::RelayError),
}
