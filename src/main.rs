//! # Main Entry Point
//!
//! Wires the bridge together:
//! - Domain: Configuration, Types and Traits
//! - Infrastructure: Docker, Matrix, RCON, Server List Ping, Marker stores
//! - Application: Stream session, Classifier, Router, Confirmation, Relay
//! - Interface: Command Handlers
//!
//! The stream session's read loop runs on the main task. When it ends with an
//! error the process exits non-zero so the supervisor restarts it.

#![recursion_limit = "256"]

mod application;
mod domain;
mod infrastructure;
mod interface;
mod strings;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use matrix_sdk::{Client, config::SyncSettings};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tracing_appender::non_blocking::WorkerGuard;

use crate::application::confirm::{ConfirmSettings, ConfirmationWorkflow};
use crate::application::dispatch::{Dispatcher, Rooms};
use crate::application::executor::ExecConsole;
use crate::application::markers::MarkerService;
use crate::application::presence::PresenceLoop;
use crate::application::relay::{ChatToServer, ServerLog, ServerToChat};
use crate::application::router::{CommandHandler, CommandTable};
use crate::application::session::StreamSession;
use crate::domain::config::{AppConfig, ConsoleTransportKind, MarkerStoreKind};
use crate::domain::traits::{
    ChatProvider, ConsoleInput, ConsoleTransport, ContainerRuntime, MarkerStore,
};
use crate::infrastructure::docker::DockerClient;
use crate::infrastructure::marker_store::{FileMarkerStore, PanelMarkerStore};
use crate::infrastructure::matrix::MatrixService;
use crate::infrastructure::rcon::RconConsole;
use crate::infrastructure::status_ping::StatusPinger;
use crate::interface::commands::admin::{
    AdminContext, ClearRoom, ConsolePassthrough, Reboot, Whitelist, WhitelistAction,
};
use crate::interface::commands::markers::{MarkerAction, MarkerCommand};
use crate::strings::{help, logs};

const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "minebridge", version, about = "Bridges a Minecraft server console and Matrix rooms")]
struct Cli {
    /// Path to the YAML configuration
    #[arg(long, default_value = "data/config.yaml")]
    config: PathBuf,

    /// Overrides `bridge.container_label`
    #[arg(long)]
    container_label: Option<String>,

    /// Directory for the session log
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load Configuration
    let mut config = AppConfig::load(&cli.config)?;
    if let Some(label) = cli.container_label {
        config.bridge.container_label = label;
    }

    // 2. Logging Setup
    let guard = init_logging(&cli.data_dir)?;
    tracing::info!("{}", logs::STARTING);

    if let Err(e) = run(config).await {
        tracing::error!("{}", logs::bridge_stopped(&format!("{e:#}")));
        drop(guard);
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(data_dir: &Path) -> Result<WorkerGuard> {
    if !data_dir.exists() {
        fs::create_dir_all(data_dir).context("Failed to create data directory")?;
    }

    // Clear previous session log
    let log_path = data_dir.join("session.log");
    if log_path.exists() {
        let _ = fs::remove_file(&log_path);
    }

    let file_appender = tracing_appender::rolling::never(data_dir, "session.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(
            "info,matrix_sdk=warn,matrix_sdk_base=warn,matrix_sdk_crypto=error,ruma=warn,hyper=warn",
        )
    });

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);
    let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    Ok(guard)
}

async fn run(config: AppConfig) -> Result<()> {
    let start = Utc::now();
    let start_time = SystemTime::now();

    // 3. Server Container
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(DockerClient::new(&config.docker.socket));
    let label = &config.bridge.container_label;
    let container = runtime.find_by_label(label).await?;
    tracing::info!("{}", logs::container_found(label, &container.id));

    let connection = runtime.attach(&container).await?;
    let session = Arc::new(
        StreamSession::new(connection).with_read_timeout(config.bridge.read_timeout()),
    );
    let input: Arc<dyn ConsoleInput> = session.clone();

    let console_timeout = Duration::from_secs(config.console.exec_timeout_secs.max(1));
    let console: Arc<dyn ConsoleTransport> = match config.console.transport {
        ConsoleTransportKind::Exec => Arc::new(ExecConsole::new(
            runtime.clone(),
            container.clone(),
            &config.console.tool,
            console_timeout,
        )),
        ConsoleTransportKind::Rcon => {
            let rcon = config
                .console
                .rcon
                .as_ref()
                .context("console.transport is rcon but console.rcon is missing")?;
            Arc::new(RconConsole::new(&rcon.address, &rcon.password, console_timeout))
        }
    };

    // 4. Matrix Setup
    let matrix_config = &config.services.matrix;
    let client = Client::builder()
        .homeserver_url(&matrix_config.homeserver)
        .build()
        .await?;

    client
        .matrix_auth()
        .login_username(&matrix_config.username, &matrix_config.password)
        .send()
        .await?;

    tracing::info!("{}", logs::logged_in(&matrix_config.username));

    if let Some(name) = &matrix_config.display_name
        && let Err(e) = client.account().set_display_name(Some(name.as_str())).await
    {
        tracing::warn!("Failed to set display name: {}", e);
    }

    let matrix = MatrixService::new(client.clone());
    let inbound = matrix.inbound(start_time);
    let chat: Arc<dyn ChatProvider> = Arc::new(matrix);

    // 5. Command Tables
    let admin_room = config.bridge.admin_room.clone();
    let ctx = AdminContext {
        chat: chat.clone(),
        room: admin_room.clone(),
        confirm: ConfirmationWorkflow::new(
            chat.clone(),
            &admin_room,
            ConfirmSettings::from(&config.confirmation),
        ),
    };
    let gated = config.whitelist.gated;
    let whitelist = |action: WhitelistAction| -> Arc<dyn CommandHandler> {
        Arc::new(Whitelist::new(ctx.clone(), console.clone(), action, gated))
    };

    let admin = CommandTable::builder("admin")
        .with_help("!help", help::HELP, chat.clone(), &admin_room)
        .command("!clear-room", help::CLEAR_ROOM, Arc::new(ClearRoom::new(ctx.clone())))
        .command(
            "!reboot-server",
            help::REBOOT,
            Arc::new(Reboot::new(ctx.clone(), input.clone())),
        )
        .command("!whitelist-add", help::WHITELIST_ADD, whitelist(WhitelistAction::Add))
        .command(
            "!whitelist-remove",
            help::WHITELIST_REMOVE,
            whitelist(WhitelistAction::Remove),
        )
        .command("!whitelist-list", help::WHITELIST_LIST, whitelist(WhitelistAction::List))
        .command(
            "!console",
            help::CONSOLE,
            Arc::new(ConsolePassthrough::new(ctx.clone(), console.clone())),
        )
        .build();

    let markers_room = config.bridge.markers_room().to_string();
    let markers = if config.markers.enabled {
        let store: Arc<dyn MarkerStore> = match config.markers.store {
            MarkerStoreKind::File => Arc::new(FileMarkerStore::new(&config.markers.file)),
            MarkerStoreKind::Panel => {
                let panel = config
                    .markers
                    .panel
                    .clone()
                    .context("markers.store is panel but markers.panel is missing")?;
                Arc::new(PanelMarkerStore::new(panel)?)
            }
        };
        let service = Arc::new(MarkerService::new(
            console.clone(),
            store,
            config.markers.max_per_player,
        ));
        let command = |action: MarkerAction| -> Arc<dyn CommandHandler> {
            Arc::new(MarkerCommand::new(
                service.clone(),
                chat.clone(),
                &markers_room,
                action,
            ))
        };
        Some(
            CommandTable::builder("markers")
                .with_help("!help", help::HELP, chat.clone(), &markers_room)
                .command("!marker-add", help::MARKER_ADD, command(MarkerAction::Add))
                .command("!markers", help::MARKER_LIST, command(MarkerAction::List))
                .command("!marker-remove", help::MARKER_REMOVE, command(MarkerAction::Remove))
                .build(),
        )
    } else {
        None
    };

    // 6. Stream Consumers
    session.register_consumer("log", Arc::new(ServerLog)).await;
    session
        .register_consumer(
            "relay",
            Arc::new(ServerToChat::new(chat.clone(), &config.bridge.chat_room)),
        )
        .await;

    // 7. Start Loops
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let sync_client = client.clone();
    tokio::spawn(async move {
        tracing::info!("{}", logs::SYNC_LOOP_START);
        if let Err(e) = sync_client.sync(SyncSettings::default()).await {
            tracing::error!("{}", logs::sync_loop_fail(&e.to_string()));
        }
    });

    let dispatcher = Arc::new(Dispatcher::new(
        Rooms {
            chat: config.bridge.chat_room.clone(),
            admin: admin_room,
            markers: markers.as_ref().map(|_| markers_room.clone()),
        },
        config.bridge.admins.clone(),
        chat.clone(),
        ChatToServer::new(input),
        admin,
        markers,
    ));
    tokio::spawn(dispatcher.run(inbound));

    if config.status.enabled {
        let pinger = Arc::new(StatusPinger::new(
            &config.status.host,
            config.status.port,
            STATUS_TIMEOUT,
        ));
        let presence = PresenceLoop::new(
            pinger,
            chat.clone(),
            &config.bridge.chat_room,
            &config.status.host,
            Duration::from_secs(config.status.interval_secs.max(1)),
        );
        tokio::spawn(presence.run(cancel_rx.clone()));
    }

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("{}", logs::SHUTDOWN);
                cancel_tx.send_replace(true);
            }
            Err(e) => tracing::error!("{}", logs::shutdown_fail(&e.to_string())),
        }
    });

    // 8. Read loop
    let inactivity = config.bridge.inactivity_timeout();
    let inspect_timeout = config.bridge.read_timeout();
    session
        .listen(
            inactivity,
            || {
                let runtime = runtime.clone();
                let container = container.clone();
                async move {
                    match tokio::time::timeout(inspect_timeout, runtime.inspect(&container)).await {
                        Ok(Ok(state)) => state.is_alive_since(start),
                        Ok(Err(e)) => {
                            tracing::warn!("Failed to inspect server container: {}", e);
                            false
                        }
                        Err(_) => {
                            tracing::warn!("Inspecting the server container timed out");
                            false
                        }
                    }
                }
            },
            cancel_rx,
        )
        .await?;

    Ok(())
}
