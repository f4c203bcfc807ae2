//! Relay daemon - multi-client TCP text relay
//!
//! Clients connect over TCP, claim a display name with `JOIN:<name>`, and
//! every `MESSAGE:` they send is relayed to everyone in the room. The
//! operator can list users and broadcast from stdin.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default address (0.0.0.0:12345)
//! relayd
//!
//! # Custom address, no operator console
//! relayd --bind 127.0.0.1:4000 --no-console
//!
//! # Settings from a file, bind address from the environment
//! RELAY_BIND=[::]:12345 relayd --config relay.toml
//! ```

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use relayd::config::{parse_bind, RelayConfig};
use relayd::console::OperatorConsole;
use relayd::registry::spawn_registry;
use relayd::server::RelayServer;
use relayd::transcript::spawn_transcript;

/// How long to wait for background tasks once the server has stopped.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// Relay daemon - line-oriented chat relay
#[derive(Parser, Debug)]
#[command(name = "relayd", version, about)]
struct Args {
    /// Address to listen on (host:port)
    #[arg(short, long)]
    bind: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Drop inbound lines longer than this many bytes
    #[arg(long)]
    max_line_length: Option<usize>,

    /// Do not read operator commands from stdin
    #[arg(long)]
    no_console: bool,
}

impl Args {
    /// Resolves the effective configuration: flags > env > file > defaults.
    fn resolve(&self) -> Result<RelayConfig> {
        let config = match &self.config {
            Some(path) => RelayConfig::load(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => RelayConfig::default(),
        };

        let mut config = config.apply_env_overrides()?;

        if let Some(bind) = &self.bind {
            config.bind = parse_bind(bind)?;
        }
        if let Some(max) = self.max_line_length {
            anyhow::ensure!(max > 0, "--max-line-length must be greater than zero");
            config.max_line_length = max;
        }
        if self.no_console {
            config.console = false;
        }

        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("relayd=info".parse()?)
                .add_directive("relay_core=info".parse()?)
                .add_directive("relay_protocol=info".parse()?),
        )
        .init();

    let config = args.resolve()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let result = runtime.block_on(run_daemon(config));

    // A console blocked on stdin would otherwise keep the runtime alive
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    result
}

async fn run_daemon(config: RelayConfig) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        bind = %config.bind,
        "Relay daemon starting"
    );

    let cancel_token = CancellationToken::new();

    let registry = spawn_registry();
    info!("Name registry started");

    let transcript = spawn_transcript(&registry, tokio::io::stdout(), cancel_token.clone());

    let server = RelayServer::bind(config.bind, registry.clone(), cancel_token.clone())
        .await
        .with_context(|| format!("Cannot listen on {}", config.bind))?
        .with_max_line_length(config.max_line_length);

    if config.console {
        let console = OperatorConsole::new(
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
            registry.clone(),
        );
        tokio::spawn(async move {
            if let Err(e) = console.run().await {
                warn!(error = %e, "Operator console stopped");
            }
        });
    }

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    info!(addr = %server.local_addr(), "Starting server");
    server.run().await;

    cancel_token.cancel();
    if let Err(e) = transcript.await {
        warn!(error = %e, "Transcript task failed");
    }

    info!("Relay daemon stopped");
    Ok(())
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
