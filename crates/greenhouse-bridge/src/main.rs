// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Greenhouse Bridge CLI
//!
//! # Usage
//!
//! ```bash
//! # Connect to a TLS broker and serve the dashboard on port 3000
//! greenhouse-bridge --mqtt-host broker.example.com --mqtt-user esp --mqtt-password secret
//!
//! # Plain MQTT, custom port, config file
//! greenhouse-bridge --config greenhouse.toml --mqtt-port 1883 --no-tls
//!
//! # Inspect stored snapshots
//! greenhouse-bridge history --limit 10
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use greenhouse_bridge::recorder;
use greenhouse_bridge::{
    build_router, AppState, BridgeConfig, Broker, GreenhouseBridge, MockBroker, MqttBroker,
    SnapshotStore, SqliteStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Greenhouse MQTT / WebSocket bridge
#[derive(Parser, Debug)]
#[command(name = "greenhouse-bridge")]
#[command(about = "Greenhouse bridge - MQTT sensors and actuators to WebSocket, REST and SQLite")]
#[command(version)]
struct Args {
    /// Configuration file path (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP server port
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// MQTT broker host
    #[arg(long, env = "MQTT_HOST")]
    mqtt_host: Option<String>,

    /// MQTT broker port
    #[arg(long, env = "MQTT_PORT")]
    mqtt_port: Option<u16>,

    /// MQTT username
    #[arg(long, env = "MQTT_USERNAME")]
    mqtt_user: Option<String>,

    /// MQTT password
    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    mqtt_password: Option<String>,

    /// Connect without TLS
    #[arg(long)]
    no_tls: bool,

    /// SQLite database path
    #[arg(short, long)]
    db: Option<String>,

    /// Scheduled save interval (seconds)
    #[arg(long)]
    save_interval: Option<u64>,

    /// Maximum concurrent WebSocket connections
    #[arg(long)]
    max_clients: Option<usize>,

    /// Disable the dashboard (API only)
    #[arg(long)]
    api_only: bool,

    /// Use an in-process broker (no network)
    #[arg(long)]
    mock: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "greenhouse.toml")]
        output: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print stored snapshots, newest first
    History {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Delete all stored snapshots
    Clear {
        /// Confirm deletion
        #[arg(long)]
        confirm: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = build_config(&args)?;

    if let Some(cmd) = args.command {
        return handle_command(cmd, &config);
    }

    info!("Greenhouse Bridge v{}", env!("CARGO_PKG_VERSION"));
    info!("  Database: {}", config.storage.db_path);
    info!("  Save interval: {}s", config.storage.save_interval_secs);

    let store = Arc::new(SqliteStore::new(&config.storage.db_path)?);
    let (msg_tx, msg_rx) = mpsc::channel(256);

    let broker: Arc<dyn Broker>;
    let mut broker_task = None;
    if args.mock {
        info!("Running with mock broker");
        broker = Arc::new(MockBroker::new());
    } else {
        let (client, eventloop) = MqttBroker::new(&config.mqtt);
        broker = Arc::new(client);
        broker_task = Some(tokio::spawn(eventloop.run(msg_tx)));
    }

    let bridge = Arc::new(GreenhouseBridge::new(broker, store));
    let ingest_task = tokio::spawn(bridge.clone().run_ingest(msg_rx));
    let save_task = tokio::spawn(recorder::run_schedule(
        bridge.clone(),
        config.storage.save_interval(),
    ));

    let addr = config.listen_addr();
    let state = Arc::new(AppState::new(bridge, config.server.clone()));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Server running on http://{}", addr);
    if !config.server.api_only {
        info!("Dashboard: http://{}/", addr);
    }
    info!("WebSocket: ws://{}/ws", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down...");
    save_task.abort();
    ingest_task.abort();
    if let Some(task) = broker_task {
        task.abort();
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// File values first, then CLI / environment overrides
fn build_config(args: &Args) -> Result<BridgeConfig> {
    let mut config = match args.config {
        Some(ref path) => BridgeConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => BridgeConfig::default(),
    };

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref bind) = args.bind {
        config.server.bind = bind.clone();
    }
    if let Some(max) = args.max_clients {
        config.server.max_clients = max;
    }
    if args.api_only {
        config.server.api_only = true;
    }
    if let Some(ref host) = args.mqtt_host {
        config.mqtt.host = host.clone();
    }
    if let Some(port) = args.mqtt_port {
        config.mqtt.port = port;
    }
    if let Some(ref user) = args.mqtt_user {
        config.mqtt.username = Some(user.clone());
    }
    if let Some(ref pass) = args.mqtt_password {
        config.mqtt.password = Some(pass.clone());
    }
    if args.no_tls {
        config.mqtt.tls = false;
    }
    if let Some(ref db) = args.db {
        config.storage.db_path = db.clone();
    }
    if let Some(secs) = args.save_interval {
        config.storage.save_interval_secs = secs;
    }

    config.validate()?;
    Ok(config)
}

fn handle_command(cmd: Commands, config: &BridgeConfig) -> Result<()> {
    match cmd {
        Commands::GenConfig { output } => {
            std::fs::write(&output, BridgeConfig::default().to_toml()?)?;
            println!("Configuration written to {}", output.display());
        }
        Commands::Validate { config } => {
            let loaded = BridgeConfig::from_file(&config)?;
            println!("Configuration is valid");
            println!("  Broker: {}:{}", loaded.mqtt.host, loaded.mqtt.port);
            println!("  Listen: {}", loaded.listen_addr());
            println!("  Database: {}", loaded.storage.db_path);
        }
        Commands::History { limit } => {
            let store = SqliteStore::new(&config.storage.db_path)?;
            let rows = store.history(limit)?;
            println!("{} snapshot(s):", rows.len());
            for row in rows {
                let s = &row.snapshot;
                println!(
                    "  #{} {} temp={} air={} soil={} pump={} valve={} relay1={} relay2={}",
                    row.id,
                    s.timestamp.to_rfc3339(),
                    s.temperature,
                    s.air_humidity,
                    s.soil_humidity,
                    s.pump_status,
                    s.valve_status,
                    s.relay1_status,
                    s.relay2_status,
                );
            }
        }
        Commands::Clear { confirm } => {
            let store = SqliteStore::new(&config.storage.db_path)?;
            if confirm {
                store.clear()?;
                println!("All snapshots cleared.");
            } else {
                println!(
                    "Use --confirm to actually delete {} snapshot(s).",
                    store.count()?
                );
            }
        }
    }

    Ok(())
}
