use serde::{Deserialize, Serialize};

/// Maximum size of a JSON-lines frame on the relay socket (1 MiB).
pub const MAX_RELAY_LINE_BYTES: usize = 1024 * 1024;

/// Public names of the session attributes a satellite may read.
pub const ATTRIBUTE_NAMES: &[&str] = &[
    "plugin",
    "request",
    "opsys",
    "version",
    "serialnumber",
    "stage",
    "owner",
    "permissions",
    "workdir",
    "selection",
    "com",
    "connection_info",
];

/// Satellite-to-relay calls, one JSON object per line.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum RelayRequest {
    GetPlugin,
    GetRequestStr,
    GetOpsys,
    GetVersion,
    GetSerialnumber,
    GetStage,
    GetOwner,
    GetPermissions,
    GetWorkdir,
    GetSelection,
    GetCom,
    GetConnectionInfo,
    /// Read any public attribute by name. Only answered when the relay
    /// was registered with `allow_public_attrs`.
    GetAttr {
        name: String,
    },
    /// Append text to the console output stream and flush it.
    StdoutRelay {
        text: String,
    },
}

impl RelayRequest {
    /// The dedicated accessor call for a public attribute name.
    pub fn for_attribute(name: &str) -> Option<Self> {
        let request = match name {
            "plugin" => RelayRequest::GetPlugin,
            "request" => RelayRequest::GetRequestStr,
            "opsys" => RelayRequest::GetOpsys,
            "version" => RelayRequest::GetVersion,
            "serialnumber" => RelayRequest::GetSerialnumber,
            "stage" => RelayRequest::GetStage,
            "owner" => RelayRequest::GetOwner,
            "permissions" => RelayRequest::GetPermissions,
            "workdir" => RelayRequest::GetWorkdir,
            "selection" => RelayRequest::GetSelection,
            "com" => RelayRequest::GetCom,
            "connection_info" => RelayRequest::GetConnectionInfo,
            _ => return None,
        };
        Some(request)
    }
}

/// Relay-to-satellite replies.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayResponse {
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
    Error {
        message: String,
        code: RelayErrorCode,
    },
}

impl RelayResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        RelayResponse::Ok { data: Some(data) }
    }

    pub fn empty() -> Self {
        RelayResponse::Ok { data: None }
    }

    pub fn error(code: RelayErrorCode, message: impl Into<String>) -> Self {
        RelayResponse::Error {
            message: message.into(),
            code,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RelayErrorCode {
    InvalidRequest,
    UnknownAttribute,
    AttributeDenied,
    OutputFailed,
    ServerError,
}
