//! Tidewire command-line client.
//!
//! Connects to a realtime server, logs events on the requested channels,
//! optionally performs one remote call, and runs until interrupted.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde_json::Value;
use tokio::sync::Notify;
use tracing_subscriber::{EnvFilter, fmt};

use tidewire_client::{ConnectionState, Session, SessionObserver, TimerService, WebSocketTransport};
use tidewire_core::config::ClientConfig;
use tidewire_core::AppResult;
use tidewire_core::error::AppError;

/// Tidewire: realtime channel and RPC client
#[derive(Debug, Parser)]
#[command(name = "tidewire", version, about, long_about = None)]
struct Cli {
    /// Configuration environment (loads config/{env}.toml over config/default.toml)
    #[arg(short, long, default_value = "development")]
    env: String,

    /// Server host, overriding the configuration
    #[arg(long)]
    host: Option<String>,

    /// Server port, overriding the configuration
    #[arg(short, long)]
    port: Option<u16>,

    /// Connect with wss://
    #[arg(long)]
    secure: bool,

    /// Channel to subscribe to (repeatable)
    #[arg(short, long = "bind", value_name = "CHANNEL")]
    bind: Vec<String>,

    /// Remote method to call once connected
    #[arg(long, value_name = "METHOD")]
    call: Option<String>,

    /// JSON array of call parameters
    #[arg(long, value_name = "JSON", default_value = "[]")]
    params: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::load(&cli.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(cli, config).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &ClientConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Logs lifecycle notifications and wakes the caller on connect.
struct LoggingObserver {
    connected: Notify,
}

impl SessionObserver for LoggingObserver {
    fn on_connected(&self) {
        tracing::info!("Connected");
        self.connected.notify_one();
    }

    fn on_reconnected(&self) {
        tracing::info!("Reconnected");
        self.connected.notify_one();
    }

    fn on_disconnected(&self) {
        tracing::warn!("Disconnected");
    }
}

async fn run(cli: Cli, mut config: ClientConfig) -> AppResult<()> {
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.server.secure |= cli.secure;
    config.validate()?;

    let params: Vec<Value> = serde_json::from_str(&cli.params)
        .map_err(|e| AppError::validation(format!("--params must be a JSON array: {}", e)))?;

    tracing::info!(
        "Starting tidewire v{} against {}:{}",
        env!("CARGO_PKG_VERSION"),
        config.server.host,
        config.server.port
    );

    let observer = Arc::new(LoggingObserver {
        connected: Notify::new(),
    });
    let dyn_observer: Arc<dyn SessionObserver> = observer.clone();
    let session = Session::spawn(
        &config,
        Arc::new(WebSocketTransport::new()),
        TimerService::new(),
        Arc::downgrade(&dyn_observer),
    );

    for channel in &cli.bind {
        let name = channel.clone();
        session.bind(channel.as_str(), move |params| {
            tracing::info!(channel = %name, params = %serde_json::Value::Array(params), "Event");
        })?;
    }

    session.connect(&config.server.host, config.server.port, config.server.secure);

    if let Some(method) = cli.call {
        tokio::select! {
            _ = observer.connected.notified() => {
                match session.call(method.as_str(), params).await {
                    Ok(result) => println!("{}", Value::Array(result)),
                    Err(e) => tracing::error!(method = %method, "Call failed: {}", e),
                }
            }
            _ = shutdown_signal() => {
                return shutdown(&session).await;
            }
        }
    }

    shutdown_signal().await;
    shutdown(&session).await
}

/// Disconnects and waits briefly for the close to go out.
async fn shutdown(session: &Session) -> AppResult<()> {
    tracing::info!("Shutting down");
    let mut state = session.subscribe_state();
    session.disconnect();
    let _ = tokio::time::timeout(
        Duration::from_secs(1),
        state.wait_for(|s| *s != ConnectionState::Connected),
    )
    .await;
    tracing::info!(metrics = ?session.metrics(), "Client stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
