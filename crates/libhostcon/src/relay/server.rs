use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use futures_util::{SinkExt, StreamExt};
use hostcon_protocol::relay::MAX_RELAY_LINE_BYTES;
use hostcon_protocol::{RelayErrorCode, RelayRequest, RelayResponse};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LinesCodec};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::service::RelayService;
use super::{RelayError, RelayResult};
use crate::config::RelayConfig;

/// Serves one shared [`RelayService`] to every satellite that connects.
///
/// `start` blocks its thread until `stop` is called from another one.
/// Stopping cancels the accept loop, which drops the listening socket and
/// closes every open satellite connection.
pub struct RelayServer {
    listener: Mutex<Option<StdTcpListener>>,
    local_addr: SocketAddr,
    service: Arc<RelayService>,
    shutdown: CancellationToken,
}

impl RelayServer {
    pub fn bind(config: &RelayConfig, service: Arc<RelayService>) -> RelayResult<Self> {
        let addr = config.address();
        let listener = StdTcpListener::bind(addr.as_str()).map_err(|source| RelayError::Bind {
            addr: addr.clone(),
            source,
        })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener: Mutex::new(Some(listener)),
            local_addr,
            service,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn service(&self) -> &Arc<RelayService> {
        &self.service
    }

    pub fn start(&self) -> RelayResult<()> {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(RelayError::AlreadyStarted)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.serve(listener))
    }

    /// Safe to call before `start`, in which case `start` returns at once.
    pub fn stop(&self) {
        debug!(addr = %self.local_addr, "session relay stop requested");
        self.shutdown.cancel();
    }

    async fn serve(&self, listener: StdTcpListener) -> RelayResult<()> {
        let listener = TcpListener::from_std(listener)?;
        info!(addr = %self.local_addr, "session relay listening");

        let tracker = TaskTracker::new();
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "satellite connected");
                        let service = Arc::clone(&self.service);
                        let shutdown = self.shutdown.child_token();
                        tracker.spawn(async move {
                            handle_connection(stream, service, shutdown).await;
                            debug!(%peer, "satellite disconnected");
                        });
                    }
                    Err(e) => error!("accept error: {e}"),
                },
            }
        }

        drop(listener);
        tracker.close();
        tracker.wait().await;
        info!(addr = %self.local_addr, "session relay stopped");
        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    service: Arc<RelayService>,
    shutdown: CancellationToken,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(error = %e, "failed to set nodelay");
    }
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_RELAY_LINE_BYTES));

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = framed.next() => match next {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    warn!(error = %e, "relay read error");
                    break;
                }
                None => break,
            },
        };

        let response = match serde_json::from_str::<RelayRequest>(&line) {
            Ok(request) => {
                // stdout_relay may block on the output stream.
                let service = Arc::clone(&service);
                match tokio::task::spawn_blocking(move || service.handle(request)).await {
                    Ok(response) => response,
                    Err(e) => RelayResponse::error(RelayErrorCode::ServerError, e.to_string()),
                }
            }
            Err(e) => RelayResponse::error(
                RelayErrorCode::InvalidRequest,
                format!("invalid request: {e}"),
            ),
        };

        let json = match serde_json::to_string(&response) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "failed to encode relay response");
                break;
            }
        };
        if let Err(e) = framed.send(json).await {
            warn!(error = %e, "relay write error");
            break;
        }
    }
}

/// A [`RelayServer`] running on its own worker thread.
///
/// Dropping the handle stops the server and joins the worker.
pub struct RelayThread {
    server: Arc<RelayServer>,
    handle: Option<JoinHandle<RelayResult<()>>>,
}

impl RelayThread {
    pub fn spawn(server: RelayServer) -> RelayResult<Self> {
        let server = Arc::new(server);
        let worker = Arc::clone(&server);
        let handle = thread::Builder::new()
            .name("hostcon-relay".to_string())
            .spawn(move || worker.start())?;
        Ok(Self {
            server,
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the server and wait for the worker to exit.
    pub fn stop(mut self) -> RelayResult<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> RelayResult<()> {
        self.server.stop();
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| RelayError::WorkerPanicked)?,
            None => Ok(()),
        }
    }
}

impl Drop for RelayThread {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "session relay did not shut down cleanly");
        }
    }
}
