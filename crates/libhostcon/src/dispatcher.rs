use std::io::{self, Stdout, Write};
use std::sync::{Mutex, OnceLock, PoisonError};

use hostcon_protocol::{HostLine, MessageKind};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::channel::CommandChannel;
use crate::config::ChannelConfig;
use crate::error::Result;

/// Sends commands to the host and, when asked for, waits for their results.
///
/// Commands go to `sink`, the host's input stream. The command channel is
/// opened by the first result-bearing command and reused for every later
/// one; it lives as long as the dispatcher. If a read breaks the channel's
/// connection, the next result-bearing command opens a new channel and
/// announces its port again.
pub struct Dispatcher<W: Write> {
    sink: W,
    channel_config: ChannelConfig,
    channel: Option<CommandChannel>,
}

impl<W: Write> Dispatcher<W> {
    pub fn new(sink: W, channel_config: ChannelConfig) -> Self {
        Self {
            sink,
            channel_config,
            channel: None,
        }
    }

    /// Port of the command channel, once one has been established.
    pub fn channel_port(&self) -> Option<u16> {
        self.channel.as_ref().map(CommandChannel::port)
    }

    pub fn dispatch(
        &mut self,
        command: &str,
        expects_result: bool,
    ) -> Result<Option<serde_json::Value>> {
        if expects_result {
            self.exec_rv(command).map(Some)
        } else {
            self.exec(command).map(|()| None)
        }
    }

    /// Fire and forget.
    pub fn exec(&mut self, command: &str) -> Result<()> {
        self.write_line(&HostLine::exec(command))
    }

    /// Send `command` and block until the host returns its result.
    ///
    /// Also used purely to wait for the host to finish a command before
    /// the next one is issued.
    pub fn exec_rv<T: DeserializeOwned>(&mut self, command: &str) -> Result<T> {
        if let Some(channel) = self.channel.as_mut().filter(|c| c.is_connected()) {
            write_line(&mut self.sink, &HostLine::exec_rv(None, command))?;
            return channel.receive_expected(MessageKind::Result);
        }

        if self.channel.take().is_some() {
            debug!("command channel lost its host connection, reopening");
        }
        let mut channel = CommandChannel::open(&self.channel_config)?;
        write_line(&mut self.sink, &HostLine::exec_rv(Some(channel.port()), command))?;
        channel.accept()?;
        self.channel.insert(channel).receive_expected(MessageKind::Result)
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    fn write_line(&mut self, line: &HostLine) -> Result<()> {
        write_line(&mut self.sink, line)
    }
}

fn write_line<W: Write>(sink: &mut W, line: &HostLine) -> Result<()> {
    debug!(%line, "dispatching command");
    writeln!(sink, "{line}")?;
    sink.flush()?;
    Ok(())
}

static PROCESS_DISPATCHER: OnceLock<Mutex<Dispatcher<Stdout>>> = OnceLock::new();

fn stdout_dispatcher(channel_config: ChannelConfig) -> Mutex<Dispatcher<Stdout>> {
    Mutex::new(Dispatcher::new(io::stdout(), channel_config))
}

/// Set the channel config of the process-wide dispatcher.
///
/// Must run before the first [`exec`] or [`exec_rv`]; returns `false`
/// (and keeps the existing config) once the dispatcher exists.
pub fn init_process_dispatcher(channel_config: ChannelConfig) -> bool {
    let installed = PROCESS_DISPATCHER.set(stdout_dispatcher(channel_config)).is_ok();
    if !installed {
        warn!("process dispatcher already initialised, keeping its channel config");
    }
    installed
}

/// The dispatcher every command of this process goes through; stdout is
/// the host's input stream.
fn process_dispatcher() -> &'static Mutex<Dispatcher<Stdout>> {
    PROCESS_DISPATCHER.get_or_init(|| stdout_dispatcher(ChannelConfig::default()))
}

/// Run a command on the host without waiting for it.
pub fn exec(command: &str) -> Result<()> {
    process_dispatcher()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .exec(command)
}

/// Run a command on the host and return its result.
///
/// The lock is held for the whole round trip, so only one command is ever
/// outstanding per process.
pub fn exec_rv<T: DeserializeOwned>(command: &str) -> Result<T> {
    process_dispatcher()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .exec_rv(command)
}
