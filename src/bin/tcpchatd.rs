//! tcpchat daemon - multi-client TCP chat server
//!
//! Clients connect with any line-oriented TCP tool (`nc`, `telnet`),
//! pick a display name, and chat with everyone else connected.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default port (8989)
//! tcpchatd
//!
//! # Listen on a specific port
//! tcpchatd 9000
//!
//! # Load settings from a TOML file
//! tcpchatd --config tcpchat.toml
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tcpchatd::config::ServerConfig;
use tcpchatd::server::ChatServer;
use tcpchatd::transcript::Transcript;

/// Printed when the command line cannot be parsed
const USAGE: &str = "[USAGE]: ./TCPChat $port";

/// tcpchat daemon - multi-client TCP chat server
#[derive(Parser, Debug)]
#[command(name = "tcpchatd", version, about)]
struct Args {
    /// Port to listen on
    port: Option<u16>,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(_) => {
            println!("{USAGE}");
            return Ok(());
        }
    };

    let config = load_config(&args)?;
    run_server(config)
}

/// Layers defaults, the config file, environment and the port argument.
fn load_config(args: &Args) -> Result<ServerConfig> {
    let config_path = args
        .config
        .clone()
        .or_else(|| env::var_os("TCPCHAT_CONFIG").map(PathBuf::from));

    let mut config = match &config_path {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ServerConfig::default(),
    };

    if let Ok(host) = env::var("TCPCHAT_HOST") {
        config.host = host;
    }
    if let Ok(path) = env::var("TCPCHAT_TRANSCRIPT") {
        config.transcript_path = PathBuf::from(path);
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn run_server(config: ServerConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("tcpchatd=info".parse()?)
                .add_directive("tcpchat_core=info".parse()?)
                .add_directive("tcpchat_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "tcpchat daemon starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    if let Err(e) = serve(config, cancel_token).await {
        error!(error = %e, "Server error");
        return Err(e);
    }

    info!("Server OFF!");
    Ok(())
}

/// Opens the transcript, binds, and runs until `cancel_token` fires.
///
/// A transcript this call opened is removed afterwards when configured,
/// including when binding fails. A transcript that could not be opened
/// is never touched.
async fn serve(config: ServerConfig, cancel_token: CancellationToken) -> Result<()> {
    let transcript = match Transcript::open(&config.transcript_path).await {
        Ok(transcript) => transcript,
        Err(e) => {
            warn!(error = %e, "Transcript unavailable, chat history disabled");
            Transcript::disabled()
        }
    };

    let owned_transcript = config
        .remove_transcript_on_exit
        .then(|| transcript.path().map(Path::to_path_buf))
        .flatten();

    let result = match ChatServer::bind(config, transcript, cancel_token).await {
        Ok(server) => server.run().await.context("Server stopped with an error"),
        Err(e) => Err(anyhow::Error::new(e).context("Failed to start server")),
    };

    if let Some(path) = owned_transcript {
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "Failed to remove transcript");
        }
    }

    result
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
