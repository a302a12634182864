//! Wire formats shared by the client, the host and satellite processes.

pub mod command;
pub mod frame;
pub mod paths;
pub mod relay;

pub use command::{HostLine, ParseHostLineError};
pub use frame::{ErrorPayload, FrameError, FrameResult, MessageKind};
pub use relay::{RelayErrorCode, RelayRequest, RelayResponse};
