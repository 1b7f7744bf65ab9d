//! Puppetry Host
//!
//! The host process the editor talks to for dialogs, file watching and test
//! execution.

use clap::Parser;
use puppetry_host::{HostConfig, HostContext, HostServer, ModalDialogs, TerminalDialogs, WindowRole};
use puppetry_runtime::NodeBackend;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "puppetry-host")]
#[command(about = "Puppetry host - dialogs, file watching and test execution for the editor")]
#[command(version)]
struct Cli {
    /// Configuration file path (default: ~/.puppetry/host.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Socket the editor connects to
    #[arg(short, long, env = "PUPPETRY_SOCKET")]
    socket: Option<PathBuf>,

    /// Runtime-test directory
    #[arg(long)]
    runtime_test_dir: Option<PathBuf>,

    /// Settle window for project file changes, in milliseconds
    #[arg(long)]
    settle_ms: Option<u64>,

    /// Development mode (developer tools on secondary windows)
    #[arg(long)]
    dev: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn dev_mode_from_env() -> bool {
    std::env::var("PUPPETRY_ENV").map(|v| v == "dev").unwrap_or(false)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let dev_mode = cli.dev || dev_mode_from_env();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        let default = if dev_mode { "debug" } else { "info" };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };
    let (plain, json) = if cli.json_logs {
        (None, Some(fmt::layer().json()))
    } else {
        (Some(fmt::layer()), None)
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(json)
        .init();

    info!("Puppetry host v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration, flags win
    let config_path = cli
        .config
        .unwrap_or_else(|| puppetry_common::default_store_path().join("host.toml"));
    let mut config = HostConfig::load(&config_path)?;
    if let Some(socket) = cli.socket {
        config.socket_path = socket;
    }
    if let Some(dir) = cli.runtime_test_dir {
        config.runtime.runtime_test_dir = Some(dir);
    }
    if let Some(ms) = cli.settle_ms {
        config.watcher.settle_window_ms = ms;
    }
    config.dev_mode |= dev_mode;

    tokio::fs::create_dir_all(&config.store_path).await?;

    let backend = NodeBackend::new(config.node_config());
    if let Err(e) = backend.check_node_installed().await {
        tracing::warn!("{}", e);
    }
    info!("Runtime test directory: {}", config.runtime_test_dir().display());

    let socket_path = config.socket_path.clone();
    let ctx = Arc::new(HostContext::new(
        config,
        Arc::new(ModalDialogs::new(TerminalDialogs::stdio())),
        Arc::new(backend),
    ));
    ctx.windows.open(WindowRole::Main);

    let listener = puppetry_host::server::bind(&socket_path)?;
    let server = HostServer::new(ctx);
    let server_handle = tokio::spawn(async move { server.serve(listener).await });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = server_handle => {
            match result {
                Ok(Err(e)) => tracing::error!("Server error: {}", e),
                Err(e) => tracing::error!("Server task failed: {}", e),
                Ok(Ok(())) => {}
            }
        }
    }

    let _ = std::fs::remove_file(&socket_path);
    info!("Host shutdown complete");
    Ok(())
}
