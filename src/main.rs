use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use beat_relay::config::{Config, LoggingConfig};
use beat_relay::server::{self, AppState};
use beat_relay::service::{CatalogProvider, YtDlpCatalog};

#[derive(Debug, Parser)]
#[command(name = "beat-relay", version, about = "YouTube Music search and playback relay")]
struct Args {
    /// Path to the config file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port
    #[arg(short, long)]
    port: Option<u16>,

    /// Print the default configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn init_logging(config: &LoggingConfig) {
    // RUST_LOG wins over the configured filter
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
    }
}

/// Periodically drop expired cache entries so idle keys don't pile up.
fn spawn_cache_janitor(state: &AppState, interval: Duration) {
    let search = state.search.clone();
    let playlists = state.playlists.clone();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let searches = search.purge_expired();
            let lists = playlists.purge_expired();
            if searches + lists > 0 {
                tracing::debug!(searches, playlists = lists, "Purged expired cache entries");
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print!("{}", Config::example_config());
        return Ok(());
    }

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    init_logging(&config.logging);

    let catalog = YtDlpCatalog::new(config.catalog.ytdlp_path.as_deref(), config.catalog.timeout())
        .await
        .context("Failed to initialize catalog")?;
    let catalog: Arc<dyn CatalogProvider> = Arc::new(catalog);

    if config.catalog.verify_on_startup {
        let sample = catalog
            .search("test", 1)
            .await
            .context("Catalog startup probe failed")?;
        tracing::info!(
            catalog = catalog.name(),
            sample_results = sample.len(),
            "Catalog verified"
        );
    }

    let state = AppState::new(catalog, &config);

    if config.cache.purge_interval_secs > 0 {
        spawn_cache_janitor(&state, Duration::from_secs(config.cache.purge_interval_secs));
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let app = server::router(state, config.server.cors_permissive);
    server::serve(listener, app, shutdown_signal()).await?;

    tracing::info!("Relay stopped");
    Ok(())
}
