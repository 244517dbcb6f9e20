use anyhow::{Context, Result};
use idleness_cloud::{GcpClient, RetryingClient, TokenSource};
use idleness_collector::{CollectorContext, CollectorRegistry};
use idleness_server::config::ServerConfig;
use idleness_server::state::AppState;
use idleness_server::{app, identity, logging};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;

const DEFAULT_CONFIG_PATH: &str = "config/idleness.toml";

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  idleness-exporter [config.toml]    Start the exporter (default {DEFAULT_CONFIG_PATH})");
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init()?;

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(|s| s.as_str()) {
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        Some(path) => run_server(Some(path)).await,
        None => run_server(None).await,
    }
}

fn load_config(path: Option<&str>) -> Result<ServerConfig> {
    let mut config = match path {
        Some(path) => ServerConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => ServerConfig::load(DEFAULT_CONFIG_PATH)?,
        None => {
            tracing::info!(path = DEFAULT_CONFIG_PATH, "No config file, using defaults and environment");
            ServerConfig::default()
        }
    };
    config.apply_env()?;
    config.validate()?;
    Ok(config)
}

async fn run_server(config_path: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;

    let credentials = std::env::var_os(identity::CREDENTIALS_ENV).map(PathBuf::from);
    let project = identity::resolve_project_id(
        config.project_id.as_deref(),
        credentials.as_deref(),
        &config.gcp.metadata_endpoint,
    )
    .await?;

    let token = match config.gcp.static_token() {
        Some(token) => TokenSource::Static(token.to_string()),
        None => TokenSource::metadata(config.gcp.metadata_endpoint.as_str()),
    };
    let http = RetryingClient::new(config.gcp.retry_policy(), config.gcp.http_timeout(), token)
        .context("Failed to build HTTP client")?;
    let api = GcpClient::new(
        http,
        &config.gcp.compute_endpoint,
        &config.gcp.dataproc_endpoint,
    )
    .context("Failed to build GCP client")?;

    let mut registry = CollectorRegistry::with_builtin()?;
    registry.apply_selection(
        config.collectors.disable_defaults,
        &config.collectors.enabled,
        &config.collectors.disabled,
    )?;

    tracing::info!(
        project = %project,
        regions = ?config.regions,
        listen = %config.listen_address,
        max_retries = config.gcp.max_retries,
        collectors = ?registry.enabled_names(),
        "idleness-exporter starting"
    );

    let context = CollectorContext {
        project,
        monitored_regions: config.regions.clone(),
        api: Arc::new(api),
    };
    let state = AppState::new(registry, context);

    let addr: SocketAddr = config.listen_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(http = %addr, "Server started");

    axum::serve(listener, app::build_http_app(state))
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            tracing::info!("Shutting down gracefully");
        })
        .await?;

    Ok(())
}
