//! CLI for streamsync
//!
//! Subcommands:
//! - `apply`: connect, reconcile the configured topology, report, disconnect
//! - `run`: like `apply`, then hold the connection (optionally re-reconciling)
//!   until interrupted
//! - `streams`, `consumers`, `consumer`: print live broker state as JSON
//! - `delete-stream`, `delete-consumer`: explicit deletes

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info, warn};

use streamsync::config::{ConsumerProbe, Settings, load_config, load_config_from};
use streamsync::connection::{ConnectionManager, NatsConnection, NatsTransport};
use streamsync::management::NatsManagement;
use streamsync::topology::Topology;
use streamsync::utils::error::ManagementError;
use streamsync::utils::logging;
use streamsync::{Error, Reconciler, Result};

#[derive(Parser)]
#[command(name = "streamsync", version, about = "Declarative JetStream topology reconciliation")]
struct Cli {
    /// Configuration file (defaults to config/default.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Connect, reconcile the configured topology, and report the result
    Apply,
    /// Connect, reconcile, and keep the connection open until Ctrl-C
    Run {
        /// Re-run reconciliation every N seconds
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// List all streams
    Streams,
    /// List the consumers of a stream
    Consumers { stream: String },
    /// Show one consumer
    Consumer { stream: String, consumer: String },
    /// Delete a stream and everything in it
    DeleteStream { name: String },
    /// Delete a consumer from a stream
    DeleteConsumer { stream: String, consumer: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    logging::init(&settings.logging.level);

    match run_command(cli.command.unwrap_or(Command::Apply), settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("streamsync failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let settings = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(settings)
}

async fn run_command(command: Command, settings: Settings) -> Result<()> {
    match command {
        Command::Apply => {
            let manager = manager(&settings, settings.topology.clone())?;
            let outcome = match manager.connect().await {
                Ok(()) => report(&manager, settings.reconcile.probe_consumer.as_ref()).await,
                Err(e) => Err(e),
            };
            manager.shutdown_after(outcome).await
        }
        Command::Run { interval_secs } => {
            let manager = manager(&settings, settings.topology.clone())?;
            let outcome = match manager.connect().await {
                Ok(()) => report(&manager, settings.reconcile.probe_consumer.as_ref()).await,
                Err(e) => Err(e),
            };
            if outcome.is_ok() {
                hold(&manager, interval_secs.map(Duration::from_secs)).await;
            }
            manager.shutdown_after(outcome).await
        }
        Command::Streams => inspect(&settings, |r| async move { r.streams().await }).await,
        Command::Consumers { stream } => {
            inspect(&settings, |r| async move { r.consumers(&stream).await }).await
        }
        Command::Consumer { stream, consumer } => {
            inspect(&settings, |r| async move { r.consumer(&stream, &consumer).await }).await
        }
        Command::DeleteStream { name } => {
            let manager = manager(&settings, Topology::default())?;
            let outcome = async {
                manager.connect().await?;
                manager.reconciler().await?.delete_stream(&name).await?;
                Ok::<(), Error>(())
            }
            .await;
            manager.shutdown_after(outcome).await
        }
        Command::DeleteConsumer { stream, consumer } => {
            let manager = manager(&settings, Topology::default())?;
            let outcome = async {
                manager.connect().await?;
                manager
                    .reconciler()
                    .await?
                    .delete_consumer(&stream, &consumer)
                    .await?;
                Ok::<(), Error>(())
            }
            .await;
            manager.shutdown_after(outcome).await
        }
    }
}

fn manager(settings: &Settings, topology: Topology) -> Result<ConnectionManager<NatsTransport>> {
    let manager = ConnectionManager::validated(NatsTransport, settings.connection.clone(), topology)?
        .with_create_mode(settings.reconcile.stream_create_mode)
        .with_connected_hook(|connection: &NatsConnection| {
            let server = connection.client().server_info();
            info!(server = %server.server_name, version = %server.version, "broker handshake complete");
            Ok(())
        });
    Ok(manager)
}

/// Connects without reconciling, runs one read-only call, prints it as JSON.
async fn inspect<T, F, Fut>(settings: &Settings, call: F) -> Result<()>
where
    T: Serialize,
    F: FnOnce(Reconciler<NatsManagement>) -> Fut,
    Fut: Future<Output = std::result::Result<T, ManagementError>>,
{
    let manager = manager(settings, Topology::default())?;
    let outcome = async {
        manager.connect().await?;
        let value = call(manager.reconciler().await?).await?;
        println!("{}", serde_json::to_string_pretty(&value)?);
        Ok::<(), Error>(())
    }
    .await;
    manager.shutdown_after(outcome).await
}

async fn report(
    manager: &ConnectionManager<NatsTransport>,
    probe: Option<&ConsumerProbe>,
) -> Result<()> {
    let reconciler = manager.reconciler().await?;

    for stream in reconciler.streams().await? {
        info!(
            stream = %stream.name(),
            subjects = ?stream.config.subjects,
            messages = stream.state.messages,
            consumers = stream.state.consumer_count,
            "stream"
        );
    }

    if let Some(probe) = probe {
        let consumer = reconciler.consumer(&probe.stream, &probe.consumer).await?;
        info!(
            stream = %consumer.stream_name,
            consumer = %consumer.name,
            pending = consumer.num_pending,
            ack_pending = consumer.num_ack_pending,
            "consumer"
        );
    }

    Ok(())
}

async fn hold(manager: &ConnectionManager<NatsTransport>, interval: Option<Duration>) {
    let Some(interval) = interval else {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown signal received. Exiting gracefully.");
        return;
    };

    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = manager.reconcile().await {
                    error!("Periodic reconciliation failed: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received. Exiting gracefully.");
                return;
            }
        }
    }
}
