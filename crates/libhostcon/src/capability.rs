//! What this build can launch, and how the host asks about it.

/// Request string the host sends to launch the console.
pub const LAUNCH_REQUEST: &str = "HostCon";

/// Request string the host sends to ask whether the plugin is usable.
pub const CHECK_REQUEST: &str = "CheckIfDisabled";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// The session relay can be served to satellite processes.
    pub relay: bool,
}

impl Capabilities {
    pub fn detect() -> Self {
        Self {
            relay: cfg!(feature = "relay"),
        }
    }

    pub fn can_launch(&self) -> bool {
        self.relay
    }
}

/// Exit code the host expects from a `CheckIfDisabled` request:
/// `0` when the console can launch, `1` when its menu entry should be
/// disabled.
pub fn check_if_disabled() -> i32 {
    if Capabilities::detect().can_launch() { 0 } else { 1 }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginRequest {
    CheckIfDisabled,
    Launch,
    Other(String),
}

impl PluginRequest {
    pub fn parse(request: &str) -> Self {
        match request.trim() {
            CHECK_REQUEST => PluginRequest::CheckIfDisabled,
            LAUNCH_REQUEST => PluginRequest::Launch,
            other => PluginRequest::Other(other.to_string()),
        }
    }
}
