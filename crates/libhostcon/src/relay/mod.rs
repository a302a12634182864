//! Session relay: republishes the [`SessionContext`](crate::SessionContext)
//! and a console text sink to satellite processes over TCP.

pub mod client;
pub mod server;
pub mod service;

pub use client::RelayClient;
pub use server::{RelayServer, RelayThread};
pub use service::RelayService;

use hostcon_protocol::RelayErrorCode;
use thiserror::Error;

pub type RelayResult<T> = std::result::Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to bind relay on {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("relay server already started")]
    AlreadyStarted,

    #[error("relay worker panicked")]
    WorkerPanicked,

    #[error("relay connection closed")]
    Disconnected,

    #[error("relay protocol error: {0}")]
    Protocol(String),

    #[error("relay error ({code:?}): {message}")]
    Remote {
        code: RelayErrorCode,
        message: String,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("line codec error: {0}")]
    Codec(#[from] tokio_util::codec::LinesCodecError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
