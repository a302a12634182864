use anyhow::{Context, Result};
use assert_cmd::cargo::cargo_bin_cmd;
use hostcon_protocol::HostLine;
use libhostcon::relay::{RelayServer, RelayService, RelayThread};
use libhostcon::{HostResponder, RelayConfig, SessionContext};
use predicates::prelude::*;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn spawn_relay() -> Result<(RelayThread, SharedBuf)> {
    let context = SessionContext::builder()
        .plugin("console")
        .request("HostCon")
        .version("24.4.10")
        .stage("Model")
        .workdir("/srv/session")
        .selection(["Mol A"])
        .build()?;
    let output = SharedBuf::default();
    let service = RelayService::new(Arc::new(context), Box::new(output.clone()));
    let config = RelayConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        allow_public_attrs: true,
    };
    let server = RelayServer::bind(&config, Arc::new(service))?;
    Ok((RelayThread::spawn(server)?, output))
}

#[test]
fn check_if_disabled_exits_zero() {
    cargo_bin_cmd!("hostcon")
        .args(["plugin", "CheckIfDisabled"])
        .assert()
        .success()
        .stdout("");
}

#[test]
fn unknown_plugin_request_fails() {
    cargo_bin_cmd!("hostcon")
        .args(["plugin", "Bogus"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported plugin request: Bogus"));
}

#[test]
fn launch_without_context_fails() {
    cargo_bin_cmd!("hostcon")
        .args(["plugin", "HostCon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--context is required"));
}

#[test]
fn exec_writes_host_line_to_stdout() {
    cargo_bin_cmd!("hostcon")
        .args(["exec", "ColorAtom", "all,", "red"])
        .assert()
        .success()
        .stdout("Exec: ColorAtom all, red\n");
}

#[test]
fn get_reads_attribute_from_relay() -> Result<()> {
    let (relay, _) = spawn_relay()?;
    let addr = relay.local_addr().to_string();

    cargo_bin_cmd!("hostcon")
        .args(["get", "workdir", "--relay", &addr])
        .assert()
        .success()
        .stdout("/srv/session\n");

    cargo_bin_cmd!("hostcon")
        .args(["get", "selection", "--relay", &addr])
        .assert()
        .success()
        .stdout("[\"Mol A\"]\n");

    relay.stop()?;
    Ok(())
}

#[test]
fn get_uses_relay_address_from_config() -> Result<()> {
    let (relay, _) = spawn_relay()?;
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("config.toml");
    std::fs::write(
        &config,
        format!(
            "[relay]\nhost = \"127.0.0.1\"\nport = {}\n",
            relay.local_addr().port()
        ),
    )?;

    cargo_bin_cmd!("hostcon")
        .arg("--config")
        .arg(&config)
        .args(["get", "stage"])
        .assert()
        .success()
        .stdout("Model\n");

    relay.stop()?;
    Ok(())
}

#[test]
fn print_relays_text_into_console_output() -> Result<()> {
    let (relay, output) = spawn_relay()?;
    let addr = relay.local_addr().to_string();

    cargo_bin_cmd!("hostcon")
        .args(["print", "frame 10 written", "--relay", &addr])
        .assert()
        .success();
    cargo_bin_cmd!("hostcon")
        .args(["print", "-n", "no newline", "--relay", &addr])
        .assert()
        .success();

    relay.stop()?;
    assert_eq!(
        String::from_utf8(output.0.lock().unwrap().clone())?,
        "frame 10 written\nno newline"
    );
    Ok(())
}

#[test]
fn get_without_relay_reports_connection_failure() -> Result<()> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?.to_string();
    drop(listener);

    cargo_bin_cmd!("hostcon")
        .args(["get", "workdir", "--relay", &addr])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to connect to session relay"));
    Ok(())
}

#[test]
fn serve_rejects_invalid_context() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let context = dir.path().join("context.json");
    std::fs::write(&context, r#"{"plugin": "console", "version": "1"}"#)?;

    cargo_bin_cmd!("hostcon")
        .arg("serve")
        .arg("--context")
        .arg(&context)
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing required field: request"));
    Ok(())
}

/// Config that lets the command channel bind any free port.
fn write_channel_config(dir: &Path) -> Result<std::path::PathBuf> {
    let config = dir.join("config.toml");
    std::fs::write(&config, "[channel]\nstart_port = 0\n")?;
    Ok(config)
}

/// Run `hostcon eval <command>` as the host would: read the announced
/// line from its stdout, connect back, and answer with `answer`.
fn eval_against_host(
    command: &str,
    answer: impl FnOnce(&mut HostResponder) -> Result<()>,
) -> Result<(HostLine, std::process::Output)> {
    let dir = tempfile::tempdir()?;
    let config = write_channel_config(dir.path())?;
    let mut child = Command::new(env!("CARGO_BIN_EXE_hostcon"))
        .arg("--config")
        .arg(&config)
        .args(["eval", command])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let mut stdout = BufReader::new(child.stdout.take().context("child stdout")?);
    let mut line = String::new();
    stdout.read_line(&mut line)?;
    let announced: HostLine = line.parse()?;
    let HostLine::ExecRv {
        port: Some(port), ..
    } = &announced
    else {
        anyhow::bail!("expected a port announcement, got {line:?}");
    };

    let mut responder = HostResponder::connect(*port)?;
    answer(&mut responder)?;
    drop(responder);

    let mut rest = String::new();
    stdout.read_to_string(&mut rest)?;
    assert_eq!(rest, "", "no further host lines expected");
    let output = child.wait_with_output()?;
    Ok((announced, output))
}

#[test]
fn eval_announces_channel_and_prints_result() -> Result<()> {
    let (announced, output) = eval_against_host("CountAtom all", |host| {
        host.send_result(&serde_json::json!(327))?;
        Ok(())
    })?;

    assert_eq!(announced.command(), "CountAtom all");
    assert!(output.status.success());
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.lines().any(|l| l == "327"), "stderr: {stderr}");
    Ok(())
}

#[test]
fn eval_reports_host_error() -> Result<()> {
    let (_, output) = eval_against_host("DelAtom nothing", |host| {
        host.send_error(42, "bad selection")?;
        Ok(())
    })?;

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("host error 42: bad selection"), "stderr: {stderr}");
    Ok(())
}
