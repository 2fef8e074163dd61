//! The form UI: upload a photo and story, tweak the dialogue, download the comic.

use std::num::NonZeroU16;
use std::sync::Arc;

use ab_glyph::FontVec;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};
use tracing::{error, info};

use crate::config::ModelConfig;
use crate::constants::{MAX_UPLOAD_BYTES, RUN_TTL_MINUTES};

mod csrf;
mod flash;
mod images;
mod prelude;
mod runs;
mod views;

use runs::RunStore;
use views::{
    comic_handler, create_comic_handler, frame_handler, home_handler, page_image_handler,
    panel_image_handler, render_comic_handler, style_guide_handler, styles_handler,
};

/// Shared state for every request.
#[derive(Clone)]
pub struct AppState {
    model: Arc<ModelConfig>,
    http: reqwest::Client,
    font: Arc<Option<FontVec>>,
    runs: RunStore,
}

impl AppState {
    /// Bundles the model settings, HTTP client and bubble font.
    pub fn new(model: ModelConfig, http: reqwest::Client, font: Option<FontVec>) -> Self {
        Self {
            model: Arc::new(model),
            http,
            font: Arc::new(font),
            runs: RunStore::default(),
        }
    }
}

/// Builds the router, sessions and body limit included.
pub fn create_router(state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            RUN_TTL_MINUTES,
        )));

    Router::new()
        .route("/", get(home_handler))
        .route("/comics", post(create_comic_handler))
        .route("/comics/{run_id}", get(comic_handler))
        .route("/comics/{run_id}/render", post(render_comic_handler))
        .route("/comics/{run_id}/comic.png", get(page_image_handler))
        .route("/comics/{run_id}/panels/{file}", get(panel_image_handler))
        .route("/static/frames/{file}", get(frame_handler))
        .route("/static/styles.css", get(styles_handler))
        .route("/style-guide", get(style_guide_handler))
        .layer(session_layer)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the listener and serves until ctrl-c.
pub async fn setup_server(
    listen_addr: &str,
    port: NonZeroU16,
    state: AppState,
) -> Result<(), anyhow::Error> {
    let app = create_router(state);

    let addr = format!("{}:{}", listen_addr, port);
    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", err);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
