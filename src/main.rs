//! Group plugin host.
//!
//! Serves the in-memory group capability on a Unix domain socket until a
//! termination signal arrives.
//!
//! ```text
//!   client ──line JSON──▶ unix socket ──▶ accept loop ──▶ worker per connection
//!                                              │                 │
//!                                              │                 ▼
//!                                              │           dispatch table ──▶ GroupPlugin
//!                                              ▼
//!   SIGTERM/SIGINT/... ──▶ trigger ──▶ shutdown tasks (close listener, cleanup) ──▶ outcome
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use plugin_host::config::{apply_overrides, load_config, ConfigOverrides, PluginConfig};
use plugin_host::group::{self, MemoryGroupPlugin};
use plugin_host::observability::{logging, metrics};
use plugin_host::{start_plugin, Dispatcher, TerminationOutcome};

#[derive(Parser)]
#[command(name = "plugin-host")]
#[command(about = "Serve the group plugin over a Unix domain socket", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Socket path (overrides the configuration file)
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset (overrides the configuration file)
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => PluginConfig::default(),
    };
    let config = apply_overrides(
        config,
        ConfigOverrides {
            socket_path: cli.socket,
            log_filter: cli.log_filter,
        },
    )?;

    logging::init(&config.observability.log_filter);
    tracing::info!("plugin-host v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut dispatcher = Dispatcher::new();
    group::register(&mut dispatcher, Arc::new(MemoryGroupPlugin::new()));

    let server = start_plugin(&config, dispatcher, Vec::new()).await?;

    match server.wait().await {
        TerminationOutcome::Clean { origin } => {
            tracing::info!(origin = %origin, "Shutdown complete");
            Ok(())
        }
        TerminationOutcome::Failed(err) => {
            tracing::error!(error = %err, "Plugin server failed");
            Err(err.into())
        }
    }
}
