//! humor-api - caption upload, voting and scoreboard service
//!
//! Bootstrap order: configuration, tracing, database, outbound clients,
//! router.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use humor_api::auth::RemoteSessionVerifier;
use humor_api::pipeline::{build_http_client, CaptionPipeline, CaptionServiceClient};
use humor_api::store::SqliteRowStore;
use humor_api::{build_router, AppState};
use humor_common::config::{load_toml_config, ConfigOverrides, ConfigSource};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "humor-api")]
#[command(about = "Caption upload, voting and scoreboard service")]
#[command(version)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long, env = "HUMOR_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP bind address (host:port)
    #[arg(long, env = "HUMOR_BIND")]
    bind: Option<String>,

    /// SQLite database file
    #[arg(long, env = "HUMOR_DATABASE")]
    database: Option<PathBuf>,

    /// Base URL of the caption-generation service
    #[arg(long, env = "HUMOR_API_BASE")]
    api_base: Option<String>,

    /// Base URL of the identity provider
    #[arg(long, env = "HUMOR_AUTH_URL")]
    auth_url: Option<String>,

    /// Public API key sent to the identity provider
    #[arg(long, env = "HUMOR_AUTH_API_KEY", hide_env_values = true)]
    auth_api_key: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "HUMOR_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (toml_config, source) = load_toml_config(args.config.as_deref())?;
    let config = toml_config.with_overrides(ConfigOverrides {
        bind: args.bind,
        database_path: args.database,
        api_base: args.api_base,
        auth_url: args.auth_url,
        auth_api_key: args.auth_api_key,
        log_level: args.log_level,
    });

    // Initialize tracing; RUST_LOG directives override the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!(
        "Starting humor-api v{} on {}",
        env!("CARGO_PKG_VERSION"),
        config.bind
    );
    match &source {
        ConfigSource::File(path) => info!("Config: {}", path.display()),
        ConfigSource::Missing(path) => {
            warn!("Config file not found at {}, using defaults", path.display())
        }
        ConfigSource::Defaults => warn!("No config directory available, using defaults"),
    }

    let auth_url = config.require_auth_url()?.to_string();

    let db_path = config.database_path();
    info!("Database: {}", db_path.display());
    let pool = match humor_common::db::init_database(&db_path).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let http_client = build_http_client(Duration::from_secs(config.http_timeout_secs))?;
    let pipeline = CaptionPipeline::new(CaptionServiceClient::new(
        http_client.clone(),
        config.api_base.clone(),
    ));
    let sessions =
        RemoteSessionVerifier::new(http_client, &auth_url, config.auth_api_key.clone());
    info!("Caption service: {}", config.api_base);
    info!("Identity provider: {}", auth_url);

    let state = AppState::new(
        Arc::new(SqliteRowStore::new(pool)),
        pipeline,
        Arc::new(sessions),
    )
    .with_limits(config.scoreboard_limit, config.max_upload_bytes);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!("Listening on http://{}", config.bind);
    info!("Health check: http://{}/health", config.bind);

    axum::serve(listener, app).await?;

    Ok(())
}
