mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use libhostcon::HostconConfig;

#[derive(Parser)]
#[command(name = "hostcon", about = "Host console link: command dispatch and session relay")]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/hostcon/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle a plugin request from the host
    Plugin {
        /// Request string sent by the host (CheckIfDisabled, HostCon)
        request: String,

        /// Session snapshot written by the host (JSON)
        #[arg(long)]
        context: Option<PathBuf>,
    },

    /// Launch a console session and serve the relay until interrupted
    Serve {
        /// Session snapshot written by the host (JSON)
        #[arg(long)]
        context: PathBuf,

        /// Do not start the session relay
        #[arg(long)]
        no_relay: bool,
    },

    /// Send a command to the host without waiting for it
    Exec {
        /// Command text
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
    },

    /// Send a command to the host and print its result on stderr
    Eval {
        /// Command text
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
    },

    /// Read a session attribute from a running relay
    Get {
        /// Attribute name (workdir, selection, stage, ...)
        attribute: String,

        /// Relay address (default from config)
        #[arg(long)]
        relay: Option<String>,
    },

    /// Write text into the console output through a running relay
    Print {
        /// Text to relay
        text: String,

        /// Do not append a newline
        #[arg(short = 'n')]
        no_newline: bool,

        /// Relay address (default from config)
        #[arg(long)]
        relay: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_json);
    let config = HostconConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Plugin { request, context } => {
            let code = commands::plugin(&config, &request, context).await?;
            std::process::exit(code);
        }
        Commands::Serve { context, no_relay } => {
            commands::serve(&config, &context, !no_relay).await
        }
        Commands::Exec { command } => commands::exec(&config, command.join(" ")).await,
        Commands::Eval { command } => commands::eval(&config, command.join(" ")).await,
        Commands::Get { attribute, relay } => {
            let addr = relay.unwrap_or_else(|| config.relay.address());
            commands::get(&addr, &attribute).await
        }
        Commands::Print {
            text,
            no_newline,
            relay,
        } => {
            let addr = relay.unwrap_or_else(|| config.relay.address());
            let text = if no_newline { text } else { format!("{text}\n") };
            commands::print(&addr, &text).await
        }
    }
}
