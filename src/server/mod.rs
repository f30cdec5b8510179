//! HTTP and WebSocket surface.
//!
//! | Path | Description |
//! |------|-------------|
//! | `GET /health` | Liveness check |
//! | `GET /catalog/check` | One-item probe search against the catalog |
//! | `GET /search/{query}?limit=N` | Categorized search |
//! | `GET /playlist/{id}` | Raw playlist document |
//! | `POST /playlist/{id}/refresh` | Force a playlist re-fetch |
//! | `GET /playlist/{id}/first-song` | First playable track of a playlist |
//! | `GET /ws` | WebSocket relay |

mod http;
mod ws;

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::hub::ConnectionHub;
use crate::playlist::PlaylistService;
use crate::search::SearchService;
use crate::service::CatalogProvider;

/// Services shared by every request handler and socket task
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogProvider>,
    pub search: Arc<SearchService>,
    pub playlists: Arc<PlaylistService>,
    pub hub: Arc<ConnectionHub>,
    /// Per-category cap for HTTP searches without `limit`
    pub default_limit: usize,
}

impl AppState {
    /// Wire up the services around one catalog.
    pub fn new(catalog: Arc<dyn CatalogProvider>, config: &Config) -> Self {
        let search = Arc::new(SearchService::new(
            catalog.clone(),
            &config.search,
            config.cache.search_ttl(),
        ));
        let playlists = Arc::new(PlaylistService::new(
            catalog.clone(),
            config.cache.playlist_ttl(),
        ));
        let hub = Arc::new(ConnectionHub::new(search.clone(), config.search.ws_limit));

        Self {
            catalog,
            search,
            playlists,
            hub,
            default_limit: config.search.default_limit,
        }
    }
}

/// Build the router with all relay endpoints.
pub fn router(state: AppState, cors_permissive: bool) -> Router {
    let app = Router::new()
        .route("/health", get(http::health))
        .route("/catalog/check", get(http::catalog_check))
        .route("/search/{query}", get(http::search))
        .route("/playlist/{id}", get(http::get_playlist))
        .route("/playlist/{id}/refresh", post(http::refresh_playlist))
        .route("/playlist/{id}/first-song", get(http::first_song))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors_permissive {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Serve `app` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "Relay listening");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Relay server terminated unexpectedly")
}
