//! The host's end of the command channel.

use std::net::{SocketAddr, TcpStream};

use hostcon_protocol::frame::{self, ErrorPayload, MessageKind};
use serde::Serialize;

use crate::error::Result;

/// Connects back to a client's command channel and answers its
/// result-bearing commands, one framed message per command.
pub struct HostResponder {
    stream: TcpStream,
}

impl HostResponder {
    /// Connect to the port announced in an `ExecRV<port>:` line.
    pub fn connect(port: u16) -> Result<Self> {
        Self::connect_addr(SocketAddr::from(([127, 0, 0, 1], port)))
    }

    pub fn connect_addr(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    pub fn send_result<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        frame::write_message(&mut self.stream, MessageKind::Result, value)?;
        Ok(())
    }

    pub fn send_error(&mut self, code: i32, text: &str) -> Result<()> {
        frame::write_message(&mut self.stream, MessageKind::Error, &ErrorPayload::new(code, text))?;
        Ok(())
    }
}
