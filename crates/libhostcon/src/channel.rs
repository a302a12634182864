//! Rendezvous point for result-bearing commands.
//!
//! A [`CommandChannel`] listens on a local port, the host connects to it
//! once, and every framed result for this process is read from that one
//! connection.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;

use hostcon_protocol::frame::{self, ErrorPayload, MessageKind};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::ChannelConfig;
use crate::error::{ChannelError, Result};

pub struct CommandChannel {
    listener: TcpListener,
    port: u16,
    peer: Option<TcpStream>,
}

impl CommandChannel {
    /// Bind the first free port at or above `config.start_port` and listen.
    ///
    /// Ports are tried in ascending order with no gaps, sleeping
    /// `bind_backoff` between attempts. Gives up with
    /// [`ChannelError::BindRetryExhausted`] after `max_bind_attempts`
    /// (never when it is `0`) or when the port range runs out.
    pub fn open(config: &ChannelConfig) -> Result<Self> {
        let backoff = config.bind_backoff();
        let mut port = config.start_port;
        let mut attempts: u32 = 0;

        loop {
            attempts = attempts.saturating_add(1);
            match TcpListener::bind((config.bind_host.as_str(), port)) {
                Ok(listener) => {
                    set_backlog(&listener, 1)?;
                    let port = listener.local_addr()?.port();
                    info!(port, attempts, "command channel listening");
                    return Ok(Self {
                        listener,
                        port,
                        peer: None,
                    });
                }
                Err(e) => {
                    debug!(port, error = %e, "command channel port unavailable");
                    let capped =
                        config.max_bind_attempts != 0 && attempts >= config.max_bind_attempts;
                    if capped || port == u16::MAX {
                        return Err(ChannelError::BindRetryExhausted {
                            start_port: config.start_port,
                            attempts,
                            last_error: e.to_string(),
                        });
                    }
                    port += 1;
                    if !backoff.is_zero() {
                        thread::sleep(backoff);
                    }
                }
            }
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// False before `accept` and after a read left the connection unusable.
    pub fn is_connected(&self) -> bool {
        self.peer.is_some()
    }

    /// Block until the host connects.
    pub fn accept(&mut self) -> Result<SocketAddr> {
        if self.peer.is_some() {
            return Err(ChannelError::AlreadyConnected);
        }
        let (stream, addr) = self.listener.accept()?;
        stream.set_nodelay(true)?;
        debug!(port = self.port, peer = %addr, "host connected to command channel");
        self.peer = Some(stream);
        Ok(addr)
    }

    /// Read one framed message and return its kind and decoded payload.
    ///
    /// An `Error` message is turned into [`ChannelError::HostError`].
    pub fn receive_message(&mut self) -> Result<(MessageKind, serde_json::Value)> {
        let (kind, payload) = self.read_frame()?;
        Ok((kind, frame::decode_payload(&payload)?))
    }

    /// Read one framed message that must be of kind `expected`.
    pub fn receive_expected<T: DeserializeOwned>(&mut self, expected: MessageKind) -> Result<T> {
        let (kind, payload) = self.read_frame()?;
        if kind != expected {
            return Err(ChannelError::UnexpectedMessageKind {
                expected,
                actual: kind,
            });
        }
        Ok(frame::decode_payload(&payload)?)
    }

    /// A failed frame read drops the peer: after a short read or a rejected
    /// header the stream position no longer lines up with a frame boundary.
    fn read_frame(&mut self) -> Result<(MessageKind, Vec<u8>)> {
        let peer = self.peer.as_mut().ok_or(ChannelError::NotConnected)?;
        let (kind, payload) = match frame::read_frame(peer) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(port = self.port, error = %e, "dropping command channel peer");
                self.peer = None;
                return Err(e.into());
            }
        };
        if kind == MessageKind::Error {
            let ErrorPayload(code, text) = frame::decode_payload(&payload)?;
            return Err(ChannelError::HostError { code, text });
        }
        Ok((kind, payload))
    }
}

/// Shrink the pending-connection queue; std always listens with 128.
#[cfg(unix)]
fn set_backlog(listener: &TcpListener, backlog: i32) -> io::Result<()> {
    use std::os::fd::AsRawFd;

    // SAFETY: the fd is owned by `listener` and already listening; calling
    // listen() again only updates its backlog.
    let rc = unsafe { libc::listen(listener.as_raw_fd(), backlog) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn set_backlog(_listener: &TcpListener, _backlog: i32) -> io::Result<()> {
    Ok(())
}
