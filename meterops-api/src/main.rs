//! meterops-api - meter reading administration service
//!
//! Serves the sync, review, analytics and exceptions endpoints used by
//! capture devices and the supervisor dashboard.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use meterops_common::api::auth::{
    issue_token, load_signing_secret, Audience, HmacTokenVerifier, TokenClaims,
};
use meterops_common::config::{
    database_path, resolve_root_folder, ConfigOverrides, ServiceConfig,
};
use meterops_common::db::init_database;
use sqlx::SqlitePool;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meterops_api::{build_router, AppState};

/// Command-line arguments for meterops-api
#[derive(Parser, Debug)]
#[command(name = "meterops-api")]
#[command(about = "Meter reading administration service")]
#[command(version)]
struct Args {
    /// Config file (defaults to the platform config location)
    #[arg(short, long, env = "METEROPS_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding the database (also METEROPS_ROOT_FOLDER)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "METEROPS_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "METEROPS_PORT")]
    port: Option<u16>,

    /// Log level when RUST_LOG is not set
    #[arg(long, env = "METEROPS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Allowed CORS origins, comma separated (`*` allows any)
    #[arg(long, env = "METEROPS_CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Option<Vec<String>>,

    /// Request body limit in bytes
    #[arg(long, env = "METEROPS_MAX_BODY_BYTES")]
    max_body_bytes: Option<usize>,

    /// Required `aud` claim
    #[arg(long, env = "METEROPS_AUTH_AUDIENCE")]
    auth_audience: Option<String>,

    /// Required `iss` claim
    #[arg(long, env = "METEROPS_AUTH_ISSUER")]
    auth_issuer: Option<String>,

    /// Token signing secret (stored secret is used when unset)
    #[arg(long, env = "METEROPS_AUTH_SIGNING_SECRET", hide_env_values = true)]
    auth_signing_secret: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Print a signed bearer token for a user
    Token {
        /// User id placed in the `sub` claim
        #[arg(long)]
        uid: String,

        #[arg(long)]
        email: Option<String>,

        /// Lifetime in seconds
        #[arg(long, default_value_t = 3600)]
        ttl_secs: i64,
    },
}

impl Args {
    /// Settings that take precedence over the config file
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            log_level: self.log_level.clone(),
            cors_origins: self.cors_origins.clone(),
            max_body_bytes: self.max_body_bytes,
            audience: self.auth_audience.clone(),
            issuer: self.auth_issuer.clone(),
            signing_secret: self.auth_signing_secret.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, config_source) =
        ServiceConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    config
        .apply_overrides(args.overrides())
        .context("Invalid configuration override")?;

    init_tracing(&config.log_level);

    info!(
        "Starting MeterOps API (meterops-api) v{}",
        env!("CARGO_PKG_VERSION")
    );
    match &config_source {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => warn!("No config file found, using compiled defaults"),
    }

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
    let db_path = database_path(&root_folder, &config);
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;
    info!("✓ Database ready");

    let secret = signing_secret(&pool, &config).await?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(pool, secret, config).await,
        Command::Token {
            uid,
            email,
            ttl_secs,
        } => {
            let mut claims = TokenClaims::new(uid, ttl_secs);
            claims.email = email;
            claims.aud = config.auth.audience.clone().map(Audience::One);
            claims.iss = config.auth.issuer.clone();

            let token = issue_token(&claims, secret.as_bytes())?;
            println!("{}", token);
            Ok(())
        }
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "meterops_api={level},meterops_common={level},tower_http={level}",
                    level = level
                )
                .into()
            }),
        )
        // stderr keeps stdout clean for the token subcommand
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Signing secret from config, else from the settings table
async fn signing_secret(pool: &SqlitePool, config: &ServiceConfig) -> Result<String> {
    if let Some(secret) = &config.auth.signing_secret {
        info!("Using token signing secret from configuration");
        return Ok(secret.clone());
    }

    let secret = load_signing_secret(pool)
        .await
        .context("Failed to load token signing secret")?;
    info!("✓ Loaded token signing secret from database");
    Ok(secret)
}

async fn serve(pool: SqlitePool, secret: String, config: ServiceConfig) -> Result<()> {
    let verifier = HmacTokenVerifier::new(secret.into_bytes())
        .with_audience(config.auth.audience.clone())
        .with_issuer(config.auth.issuer.clone());

    let state = AppState::from_config(pool, Arc::new(verifier), &config);
    let app = build_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("meterops-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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

    info!("Shutdown signal received");
}
