//! Lifecycle of one console launch.
//!
//! Launching captures nothing itself: the caller hands over the session
//! snapshot. The session then moves the process into the snapshot's
//! workdir and, when the relay is available, serves the snapshot to
//! satellites on a worker thread until the front-end finishes.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use crate::capability::Capabilities;
use crate::config::RelayConfig;
use crate::context::SessionContext;
use crate::error::ConsoleError;
#[cfg(feature = "relay")]
use crate::relay::{RelayServer, RelayService, RelayThread};

pub struct ConsoleSession {
    context: Arc<SessionContext>,
    #[cfg(feature = "relay")]
    relay: Option<RelayThread>,
}

impl ConsoleSession {
    /// Enter the session workdir and start the relay.
    ///
    /// Pass `None` for `relay` to run without one. When this build has no
    /// relay capability the request is ignored and reported in the log.
    pub fn launch(
        context: SessionContext,
        relay: Option<&RelayConfig>,
        output: Box<dyn Write + Send>,
    ) -> Result<Self, ConsoleError> {
        let context = Arc::new(context);
        context
            .enter_workdir()
            .map_err(|source| ConsoleError::Workdir {
                path: context.workdir().to_path_buf(),
                source,
            })?;
        info!(workdir = %context.workdir().display(), "entered session workdir");

        let relay = match relay {
            Some(config) if Capabilities::detect().relay => Some(config),
            Some(_) => {
                warn!("session relay is not available in this build");
                None
            }
            None => None,
        };

        #[cfg(feature = "relay")]
        let relay = match relay {
            Some(config) => {
                let service = RelayService::new(Arc::clone(&context), output)
                    .allow_public_attrs(config.allow_public_attrs);
                let server = RelayServer::bind(config, Arc::new(service))?;
                let thread = RelayThread::spawn(server)?;
                info!(addr = %thread.local_addr(), "session relay started");
                Some(thread)
            }
            None => None,
        };
        #[cfg(not(feature = "relay"))]
        let _ = (relay, output);

        Ok(Self {
            context,
            #[cfg(feature = "relay")]
            relay,
        })
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    /// Address satellites connect to, when the relay is running.
    pub fn relay_addr(&self) -> Option<SocketAddr> {
        #[cfg(feature = "relay")]
        {
            self.relay.as_ref().map(RelayThread::local_addr)
        }
        #[cfg(not(feature = "relay"))]
        {
            None
        }
    }

    /// Run the front-end to completion, then shut the session down.
    pub fn run<R>(self, front_end: impl FnOnce(&ConsoleSession) -> R) -> Result<R, ConsoleError> {
        let result = front_end(&self);
        self.shutdown()?;
        Ok(result)
    }

    /// Stop the relay and wait for its worker thread.
    #[cfg_attr(not(feature = "relay"), allow(unused_mut))]
    pub fn shutdown(mut self) -> Result<(), ConsoleError> {
        #[cfg(feature = "relay")]
        if let Some(relay) = self.relay.take() {
            relay.stop()?;
        }
        info!("console session closed");
        Ok(())
    }
}
