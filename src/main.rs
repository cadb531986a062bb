//! Budget service entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use budget_service::api::{create_router, AppState};
use budget_service::config::{Config, StoreBackend};
use budget_service::error::ServiceError;
use budget_service::metrics;
use budget_service::store::{BudgetStore, MemoryBudgetStore, MongoBudgetStore};
use budget_service::utils::shutdown_signal;

/// HTTP CRUD service for budget entries.
#[derive(Parser, Debug)]
#[command(name = "budget-service")]
#[command(about = "HTTP CRUD service for budget entries backed by MongoDB")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// HTTP listening port (overrides PORT).
    #[arg(short, long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default).
    Serve {
        /// Store backend: mongo or memory (overrides STORE_BACKEND).
        #[arg(long)]
        store: Option<StoreBackend>,
    },

    /// Check configuration validity.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env must be loaded before clap reads env-backed flags
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("budget_service=debug,tower_http=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if args.log_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(),
        Some(Command::Serve { store }) => cmd_serve(args.port, store).await,
        None => cmd_serve(args.port, None).await,
    }
}

/// Check configuration validity.
fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("BUDGET SERVICE - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Store Backend: {}", config.store_backend);
    println!(
        "  MongoDB URI: {}",
        if config.mongo_uri().is_some() { "present" } else { "not set" }
    );
    if let Some(database) = &config.mongo_database {
        println!("  Database: {}", database);
    }
    println!("  Port: {}", config.port);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Build the configured store.
///
/// For MongoDB the connectivity check runs in the background: a failure is
/// logged and requests fail until the server becomes reachable.
async fn build_store(config: &Config) -> Result<Arc<dyn BudgetStore>, ServiceError> {
    match config.store_backend {
        StoreBackend::Mongo => {
            let uri = config.mongo_uri().ok_or(ServiceError::MissingMongoUri)?;
            let store = MongoBudgetStore::connect(uri, config.mongo_database.as_deref()).await?;
            info!(database = ?store.database(), "Using MongoDB store");

            let pinger = store.clone();
            tokio::spawn(async move {
                match pinger.ping().await {
                    Ok(()) => info!("Connected to MongoDB"),
                    Err(e) => error!(error = %e, "MongoDB connection error"),
                }
            });

            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store; data will be lost on shutdown");
            Ok(Arc::new(MemoryBudgetStore::new()))
        }
    }
}

/// Serve the HTTP API until a shutdown signal arrives.
async fn cmd_serve(port: Option<u16>, store_backend: Option<StoreBackend>) -> anyhow::Result<()> {
    info!("Loading configuration...");
    let mut config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    // Override with CLI args if provided
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(backend) = store_backend {
        config.store_backend = backend;
    }

    if let Err(e) = config.validate() {
        error!("{}", e);
        return Err(e.into());
    }

    let store = build_store(&config).await.map_err(|e| {
        error!("Failed to initialize store: {}", e);
        e
    })?;

    let mut app_state = AppState::new(store);
    match metrics::install_recorder() {
        Ok(handle) => app_state = app_state.with_metrics(handle),
        Err(e) => warn!("Metrics disabled: {}", e),
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Server is running on port {}", config.port);

    axum::serve(listener, create_router(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
