//! pedalboard-sync: mirror a pedalboard device from the command line
//!
//! - `monitor`: follow the device websocket and log every state change
//! - `plugin`: print the merged catalog view of one plugin
//! - `catalog`: list the merged plugin catalog

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pedalboard_client::{ClientConfig, create_catalog, init_tracing, run_client};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "pedalboard-sync")]
#[command(about = "Mirror the state of a pedalboard device")]
#[command(version)]
struct Cli {
    /// Base URL of the device
    #[arg(
        long,
        global = true,
        env = "PEDALBOARD_DEVICE_URL",
        default_value = "http://127.0.0.1:8888"
    )]
    device: String,

    /// Cloud plugin catalog (offline when unset)
    #[arg(long, global = true, env = "PEDALBOARD_CLOUD_URL")]
    cloud: Option<String>,

    /// Plugin storefront (offline when unset)
    #[arg(long, global = true, env = "PEDALBOARD_STORE_URL")]
    store: Option<String>,

    /// JSON array of licensed plugin URIs
    #[arg(long, global = true)]
    license_file: Option<PathBuf>,

    /// Default log filter, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Seconds between reconnection attempts
    #[arg(long, global = true, default_value = "2")]
    reconnect_secs: u64,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow the device and log state changes until Ctrl-C
    Monitor,

    /// Print the merged view of a plugin as JSON
    Plugin {
        uri: String,
    },

    /// List the merged plugin catalog
    Catalog {
        /// Only featured plugins
        #[arg(long)]
        featured: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = ClientConfig {
        device_url: cli.device,
        cloud_url: cli.cloud,
        store_url: cli.store,
        license_file: cli.license_file,
        reconnect_delay: Duration::from_secs(cli.reconnect_secs),
        ..ClientConfig::default()
    };

    match cli.command.unwrap_or(Commands::Monitor) {
        Commands::Monitor => run_client(config).await,
        Commands::Plugin { uri } => {
            let (ui_tx, _ui_rx) = mpsc::unbounded_channel();
            let catalog = create_catalog(&config, ui_tx)?;
            catalog.load_all().await?;
            let view = catalog
                .get_plugin(&uri)
                .with_context(|| format!("unknown plugin {}", uri))?;
            println!("{}", serde_json::to_string_pretty(&view)?);
            Ok(())
        }
        Commands::Catalog { featured } => {
            let (ui_tx, _ui_rx) = mpsc::unbounded_channel();
            let catalog = create_catalog(&config, ui_tx)?;
            catalog.load_all().await?;
            let views = if featured {
                catalog.featured()
            } else {
                catalog.plugins()
            };
            for view in views {
                let version = view
                    .installed_version
                    .as_deref()
                    .or(view.latest_version.as_deref())
                    .unwrap_or("-");
                let marker = if view.outdated { " (update available)" } else { "" };
                println!("{:<40} {:<10} {}{}", view.name, version, view.uri, marker);
            }
            Ok(())
        }
    }
}
