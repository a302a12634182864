//! Client side of the host console link.
//!
//! - [`Dispatcher`] sends textual commands to the host and, for
//!   result-bearing commands, blocks on a [`CommandChannel`] for the framed
//!   reply.
//! - [`SessionContext`] is the frozen session snapshot; the `relay` module
//!   serves it, plus a console text sink, to satellite processes.
//! - [`ConsoleSession`] ties one console launch together.

pub mod capability;
pub mod channel;
pub mod config;
pub mod console;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod host;
#[cfg(feature = "relay")]
pub mod relay;

pub use capability::{Capabilities, PluginRequest, check_if_disabled};
pub use channel::CommandChannel;
pub use config::{ChannelConfig, HostconConfig, RelayConfig};
pub use console::ConsoleSession;
pub use context::{SessionContext, SessionContextBuilder};
pub use dispatcher::{Dispatcher, exec, exec_rv, init_process_dispatcher};
pub use error::{ChannelError, ConfigError, ConsoleError, ContextError, Result};
pub use host::HostResponder;
