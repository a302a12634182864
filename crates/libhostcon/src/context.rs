//! Read-only snapshot of the host session handed to satellite processes.

use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::json;

use crate::error::ContextError;

/// Identity and state of the host session, captured once.
///
/// There are no setters: once built, a context is shared behind an `Arc`
/// and every reader sees the same values for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    plugin: String,
    request: String,
    opsys: String,
    version: String,
    serial_number: u64,
    stage: String,
    owner: String,
    permissions: u32,
    workdir: PathBuf,
    selection: Vec<String>,
    com: Option<u16>,
    connection_info: Option<PathBuf>,
}

impl SessionContext {
    pub fn builder() -> SessionContextBuilder {
        SessionContextBuilder::default()
    }

    /// Parse a snapshot the host wrote as a JSON object.
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, ContextError> {
        let builder: SessionContextBuilder = serde_json::from_reader(reader)?;
        builder.build()
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ContextError> {
        let file = std::fs::File::open(path)?;
        Self::from_json_reader(std::io::BufReader::new(file))
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn request(&self) -> &str {
        &self.request
    }

    pub fn opsys(&self) -> &str {
        &self.opsys
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn serial_number(&self) -> u64 {
        self.serial_number
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn permissions(&self) -> u32 {
        self.permissions
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    /// Port of the host command channel, if the session has one.
    pub fn com(&self) -> Option<u16> {
        self.com
    }

    /// Path of the console kernel's connection file.
    pub fn connection_info(&self) -> Option<&Path> {
        self.connection_info.as_deref()
    }

    /// Make the snapshot's workdir the working directory of this process.
    pub fn enter_workdir(&self) -> std::io::Result<()> {
        std::env::set_current_dir(&self.workdir)
    }

    /// Look up a field by its public attribute name.
    pub fn attribute(&self, name: &str) -> Option<serde_json::Value> {
        let value = match name {
            "plugin" => json!(self.plugin),
            "request" => json!(self.request),
            "opsys" => json!(self.opsys),
            "version" => json!(self.version),
            "serialnumber" => json!(self.serial_number),
            "stage" => json!(self.stage),
            "owner" => json!(self.owner),
            "permissions" => json!(self.permissions),
            "workdir" => json!(self.workdir),
            "selection" => json!(self.selection),
            "com" => json!(self.com),
            "connection_info" => json!(self.connection_info),
            _ => return None,
        };
        Some(value)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionContextBuilder {
    plugin: Option<String>,
    request: Option<String>,
    opsys: Option<String>,
    version: Option<String>,
    #[serde(alias = "serialnumber")]
    serial_number: u64,
    stage: Option<String>,
    owner: Option<String>,
    permissions: u32,
    workdir: Option<PathBuf>,
    selection: Vec<String>,
    com: Option<u16>,
    connection_info: Option<PathBuf>,
}

impl SessionContextBuilder {
    pub fn plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    pub fn request(mut self, request: impl Into<String>) -> Self {
        self.request = Some(request.into());
        self
    }

    pub fn opsys(mut self, opsys: impl Into<String>) -> Self {
        self.opsys = Some(opsys.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn serial_number(mut self, serial_number: u64) -> Self {
        self.serial_number = serial_number;
        self
    }

    pub fn stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    pub fn selection<I, S>(mut self, selection: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection = selection.into_iter().map(Into::into).collect();
        self
    }

    pub fn com(mut self, port: u16) -> Self {
        self.com = Some(port);
        self
    }

    pub fn connection_info(mut self, path: impl Into<PathBuf>) -> Self {
        self.connection_info = Some(path.into());
        self
    }

    /// Validate and freeze the snapshot.
    ///
    /// `plugin`, `request`, `version` and an absolute `workdir` are
    /// required; everything else defaults to empty.
    pub fn build(self) -> Result<SessionContext, ContextError> {
        let plugin = self.plugin.ok_or(ContextError::MissingField("plugin"))?;
        let request = self.request.ok_or(ContextError::MissingField("request"))?;
        let version = self.version.ok_or(ContextError::MissingField("version"))?;
        let workdir = self.workdir.ok_or(ContextError::MissingField("workdir"))?;
        if !workdir.is_absolute() {
            return Err(ContextError::RelativeWorkdir(workdir));
        }
        Ok(SessionContext {
            plugin,
            request,
            opsys: self.opsys.unwrap_or_else(|| std::env::consts::OS.to_string()),
            version,
            serial_number: self.serial_number,
            stage: self.stage.unwrap_or_default(),
            owner: self.owner.unwrap_or_default(),
            permissions: self.permissions,
            workdir,
            selection: self.selection,
            com: self.com,
            connection_info: self.connection_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostcon_protocol::relay::ATTRIBUTE_NAMES;

    fn minimal() -> SessionContextBuilder {
        SessionContext::builder()
            .plugin("console")
            .request("HostCon")
            .version("24.4.10")
            .workdir("/tmp")
    }

    #[test]
    fn builds_with_defaults() {
        let ctx = minimal().build().unwrap();
        assert_eq!(ctx.plugin(), "console");
        assert_eq!(ctx.request(), "HostCon");
        assert_eq!(ctx.opsys(), std::env::consts::OS);
        assert_eq!(ctx.workdir(), Path::new("/tmp"));
        assert!(ctx.selection().is_empty());
        assert_eq!(ctx.com(), None);
        assert_eq!(ctx.connection_info(), None);
    }

    #[test]
    fn missing_required_fields_fail_fast() {
        let err = SessionContext::builder()
            .request("HostCon")
            .version("1")
            .workdir("/tmp")
            .build()
            .unwrap_err();
        assert!(matches!(err, ContextError::MissingField("plugin")));

        let err = SessionContext::builder()
            .plugin("console")
            .request("HostCon")
            .version("1")
            .build()
            .unwrap_err();
        assert!(matches!(err, ContextError::MissingField("workdir")));
    }

    #[test]
    fn relative_workdir_is_rejected() {
        let err = minimal().workdir("relative/dir").build().unwrap_err();
        assert!(matches!(err, ContextError::RelativeWorkdir(_)));
    }

    #[test]
    fn parses_host_json() {
        let json = r#"{
            "plugin": "console",
            "request": "HostCon",
            "opsys": "Linux",
            "version": "24.4.10",
            "serialnumber": 123456,
            "stage": "Model",
            "owner": "lab",
            "permissions": 7,
            "workdir": "/tmp",
            "selection": ["Mol A", "Res 12"],
            "com": 10002,
            "connection_info": "/run/kernel-1.json"
        }"#;
        let ctx = SessionContext::from_json_reader(json.as_bytes()).unwrap();
        assert_eq!(ctx.serial_number(), 123456);
        assert_eq!(ctx.stage(), "Model");
        assert_eq!(ctx.permissions(), 7);
        assert_eq!(ctx.selection(), ["Mol A", "Res 12"]);
        assert_eq!(ctx.com(), Some(10002));
        assert_eq!(ctx.connection_info(), Some(Path::new("/run/kernel-1.json")));
    }

    #[test]
    fn json_without_request_fails() {
        let json = r#"{"plugin": "console", "version": "1", "workdir": "/tmp"}"#;
        assert!(matches!(
            SessionContext::from_json_reader(json.as_bytes()),
            Err(ContextError::MissingField("request"))
        ));
    }

    #[test]
    fn every_public_attribute_resolves() {
        let ctx = minimal()
            .selection(["Atom 1"])
            .com(10001)
            .connection_info("/run/k.json")
            .build()
            .unwrap();
        for name in ATTRIBUTE_NAMES {
            assert!(ctx.attribute(name).is_some(), "missing attribute {name}");
        }
        assert_eq!(ctx.attribute("workdir"), Some(json!("/tmp")));
        assert_eq!(ctx.attribute("com"), Some(json!(10001)));
        assert_eq!(ctx.attribute("_workdir"), None);
    }
}
