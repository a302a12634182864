use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use hostcon_protocol::RelayRequest;
use libhostcon::relay::RelayClient;
use libhostcon::{ConsoleSession, HostconConfig, PluginRequest, SessionContext, check_if_disabled};
use tracing::info;

/// Answer a host plugin request; returns the process exit code.
pub async fn plugin(
    config: &HostconConfig,
    request: &str,
    context: Option<PathBuf>,
) -> anyhow::Result<i32> {
    match PluginRequest::parse(request) {
        PluginRequest::CheckIfDisabled => Ok(check_if_disabled()),
        PluginRequest::Launch => {
            let context = context.context("--context is required to launch the console")?;
            serve(config, &context, true).await?;
            Ok(0)
        }
        PluginRequest::Other(other) => bail!("unsupported plugin request: {other}"),
    }
}

/// Launch a console session and keep the relay up until Ctrl-C.
pub async fn serve(config: &HostconConfig, context_path: &Path, relay: bool) -> anyhow::Result<()> {
    let context = SessionContext::from_json_file(context_path).with_context(|| {
        format!("failed to load session context from {}", context_path.display())
    })?;
    let relay_config = relay.then_some(&config.relay);
    let session = ConsoleSession::launch(context, relay_config, Box::new(io::stdout()))?;
    if let Some(addr) = session.relay_addr() {
        info!(%addr, "satellites may connect");
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down...");
    tokio::task::spawn_blocking(move || session.shutdown()).await??;
    Ok(())
}

pub async fn exec(config: &HostconConfig, command: String) -> anyhow::Result<()> {
    libhostcon::init_process_dispatcher(config.channel.clone());
    tokio::task::spawn_blocking(move || libhostcon::exec(&command)).await??;
    Ok(())
}

/// Run a result-bearing command; the result goes to stderr because stdout
/// belongs to the host.
pub async fn eval(config: &HostconConfig, command: String) -> anyhow::Result<()> {
    libhostcon::init_process_dispatcher(config.channel.clone());
    let value: serde_json::Value =
        tokio::task::spawn_blocking(move || libhostcon::exec_rv(&command)).await??;
    eprintln!("{value}");
    Ok(())
}

async fn connect(addr: &str) -> anyhow::Result<RelayClient> {
    RelayClient::connect(addr)
        .await
        .with_context(|| format!("failed to connect to session relay at {addr}"))
}

pub async fn get(addr: &str, attribute: &str) -> anyhow::Result<()> {
    let mut client = connect(addr).await?;
    let request = RelayRequest::for_attribute(attribute).unwrap_or_else(|| RelayRequest::GetAttr {
        name: attribute.to_string(),
    });
    let value = client
        .request(&request)
        .await?
        .unwrap_or(serde_json::Value::Null);
    match value {
        serde_json::Value::String(s) => println!("{s}"),
        other => println!("{other}"),
    }
    Ok(())
}

pub async fn print(addr: &str, text: &str) -> anyhow::Result<()> {
    let mut client = connect(addr).await?;
    client.stdout_relay(text).await?;
    Ok(())
}
