//! Lines written to the host's input stream.
//!
//! The host parses these prefixes byte for byte:
//!
//! - `Exec: <command>` runs a command with no reply.
//! - `ExecRV<port>: <command>` runs a command and connects back to `port`
//!   on the client's command channel to deliver the framed result.
//! - `ExecRV: <command>` runs a command and replies on the already
//!   established channel connection.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

const EXEC: &str = "Exec";
const EXEC_RV: &str = "ExecRV";
const SEPARATOR: &str = ": ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostLine {
    Exec { command: String },
    ExecRv { port: Option<u16>, command: String },
}

impl HostLine {
    pub fn exec(command: impl Into<String>) -> Self {
        HostLine::Exec {
            command: command.into(),
        }
    }

    pub fn exec_rv(port: Option<u16>, command: impl Into<String>) -> Self {
        HostLine::ExecRv {
            port,
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        match self {
            HostLine::Exec { command } | HostLine::ExecRv { command, .. } => command,
        }
    }

    pub fn expects_result(&self) -> bool {
        matches!(self, HostLine::ExecRv { .. })
    }
}

/// Renders the line without its trailing newline.
impl fmt::Display for HostLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostLine::Exec { command } => write!(f, "{EXEC}{SEPARATOR}{command}"),
            HostLine::ExecRv {
                port: Some(port),
                command,
            } => write!(f, "{EXEC_RV}{port}{SEPARATOR}{command}"),
            HostLine::ExecRv {
                port: None,
                command,
            } => write!(f, "{EXEC_RV}{SEPARATOR}{command}"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseHostLineError {
    #[error("missing ': ' separator")]
    MissingSeparator,
    #[error("unknown line prefix: {0:?}")]
    UnknownPrefix(String),
    #[error("invalid port in prefix: {0:?}")]
    InvalidPort(String),
}

impl FromStr for HostLine {
    type Err = ParseHostLineError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (prefix, command) = line
            .split_once(SEPARATOR)
            .ok_or(ParseHostLineError::MissingSeparator)?;

        if prefix == EXEC {
            return Ok(HostLine::exec(command));
        }
        let Some(port) = prefix.strip_prefix(EXEC_RV) else {
            return Err(ParseHostLineError::UnknownPrefix(prefix.to_string()));
        };
        let port = if port.is_empty() {
            None
        } else {
            Some(
                port.parse::<u16>()
                    .map_err(|_| ParseHostLineError::InvalidPort(port.to_string()))?,
            )
        };
        Ok(HostLine::exec_rv(port, command))
    }
}
