use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use hostcon_protocol::{RelayErrorCode, RelayRequest, RelayResponse};
use serde_json::json;
use tracing::warn;

use crate::context::SessionContext;

type OutputSink = Box<dyn Write + Send>;

/// Calls a satellite may make against the captured session.
///
/// The context is read-only and shared without locking. The output sink is
/// the only mutable state; each `stdout_relay` call writes and flushes its
/// text under one lock, so concurrent callers never interleave mid-call.
pub struct RelayService {
    context: Arc<SessionContext>,
    output: Mutex<OutputSink>,
    allow_public_attrs: bool,
}

impl RelayService {
    pub fn new(context: Arc<SessionContext>, output: OutputSink) -> Self {
        Self {
            context,
            output: Mutex::new(output),
            allow_public_attrs: true,
        }
    }

    /// Relay text to this process's stdout.
    pub fn with_stdout(context: Arc<SessionContext>) -> Self {
        Self::new(context, Box::new(std::io::stdout()))
    }

    pub fn allow_public_attrs(mut self, allow: bool) -> Self {
        self.allow_public_attrs = allow;
        self
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    pub fn get_plugin(&self) -> &str {
        self.context.plugin()
    }

    pub fn get_request_str(&self) -> &str {
        self.context.request()
    }

    pub fn get_opsys(&self) -> &str {
        self.context.opsys()
    }

    pub fn get_version(&self) -> &str {
        self.context.version()
    }

    pub fn get_serialnumber(&self) -> u64 {
        self.context.serial_number()
    }

    pub fn get_stage(&self) -> &str {
        self.context.stage()
    }

    pub fn get_owner(&self) -> &str {
        self.context.owner()
    }

    pub fn get_permissions(&self) -> u32 {
        self.context.permissions()
    }

    pub fn get_workdir(&self) -> &Path {
        self.context.workdir()
    }

    pub fn get_selection(&self) -> &[String] {
        self.context.selection()
    }

    pub fn get_com(&self) -> Option<u16> {
        self.context.com()
    }

    pub fn get_connection_info(&self) -> Option<&Path> {
        self.context.connection_info()
    }

    /// Append `text` to the output stream and flush it immediately.
    pub fn stdout_relay(&self, text: &str) -> std::io::Result<()> {
        let mut output = self.output.lock().unwrap_or_else(PoisonError::into_inner);
        output.write_all(text.as_bytes())?;
        output.flush()
    }

    /// Answer one remote call.
    pub fn handle(&self, request: RelayRequest) -> RelayResponse {
        match request {
            RelayRequest::GetPlugin => RelayResponse::ok(json!(self.get_plugin())),
            RelayRequest::GetRequestStr => RelayResponse::ok(json!(self.get_request_str())),
            RelayRequest::GetOpsys => RelayResponse::ok(json!(self.get_opsys())),
            RelayRequest::GetVersion => RelayResponse::ok(json!(self.get_version())),
            RelayRequest::GetSerialnumber => RelayResponse::ok(json!(self.get_serialnumber())),
            RelayRequest::GetStage => RelayResponse::ok(json!(self.get_stage())),
            RelayRequest::GetOwner => RelayResponse::ok(json!(self.get_owner())),
            RelayRequest::GetPermissions => RelayResponse::ok(json!(self.get_permissions())),
            RelayRequest::GetWorkdir => RelayResponse::ok(json!(self.get_workdir())),
            RelayRequest::GetSelection => RelayResponse::ok(json!(self.get_selection())),
            RelayRequest::GetCom => RelayResponse::ok(json!(self.get_com())),
            RelayRequest::GetConnectionInfo => {
                RelayResponse::ok(json!(self.get_connection_info()))
            }
            RelayRequest::GetAttr { name } => {
                if !self.allow_public_attrs {
                    return RelayResponse::error(
                        RelayErrorCode::AttributeDenied,
                        format!("public attribute access is disabled: {name}"),
                    );
                }
                match self.context.attribute(&name) {
                    Some(value) => RelayResponse::ok(value),
                    None => RelayResponse::error(
                        RelayErrorCode::UnknownAttribute,
                        format!("unknown attribute: {name}"),
                    ),
                }
            }
            RelayRequest::StdoutRelay { text } => match self.stdout_relay(&text) {
                Ok(()) => RelayResponse::empty(),
                Err(e) => {
                    warn!(error = %e, "stdout relay failed");
                    RelayResponse::error(RelayErrorCode::OutputFailed, e.to_string())
                }
            },
        }
    }
}
