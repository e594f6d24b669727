//! HTTP front end.
//!
//! Routes:
//! - `GET /static/{*path}`: files under the static root
//! - `GET /content/{*path}`: corpus document rendered to HTML
//! - `GET /search?query=...`: JSON array of matching document identifiers
//! - `GET /health`: liveness
//! - `GET /ready`: 200 once the index is built, 503 before

mod handlers;
mod paths;

pub use paths::resolve_document_path;

use crate::config::Settings;
use crate::index::build_index;
use crate::search::{SearchEngine, SearchOptions};
use crate::vector::{Embedder, FastEmbedGenerator};
use axum::Router;
use axum::routing::get;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler.
///
/// The search engine is installed once, after the index build completes.
/// Until then `/search` answers 503.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<StateInner>,
}

struct StateInner {
    content_root: PathBuf,
    static_root: PathBuf,
    request_timeout: Duration,
    engine: OnceLock<SearchEngine>,
}

impl AppState {
    pub fn new(settings: &Settings) -> Self {
        Self {
            inner: Arc::new(StateInner {
                content_root: settings.content_root.clone(),
                static_root: settings.static_root.clone(),
                request_timeout: settings.server.request_timeout(),
                engine: OnceLock::new(),
            }),
        }
    }

    /// State that is ready immediately.
    pub fn with_engine(settings: &Settings, engine: SearchEngine) -> Self {
        let state = Self::new(settings);
        state.install(engine);
        state
    }

    /// Install the engine. Returns false if one was already installed.
    pub fn install(&self, engine: SearchEngine) -> bool {
        self.inner.engine.set(engine).is_ok()
    }

    pub fn engine(&self) -> Option<&SearchEngine> {
        self.inner.engine.get()
    }

    /// True once the index build has installed an engine.
    pub fn is_ready(&self) -> bool {
        self.engine().is_some()
    }

    pub fn content_root(&self) -> &Path {
        &self.inner.content_root
    }

    pub fn static_root(&self) -> &Path {
        &self.inner.static_root
    }

    pub fn request_timeout(&self) -> Duration {
        self.inner.request_timeout
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let static_files = ServeDir::new(state.static_root());

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness))
        .route("/search", get(handlers::search))
        .route("/content/{*path}", get(handlers::content))
        .nest_service("/static", static_files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the server until ctrl-c.
///
/// The listener binds before the index is built so that `/health` and
/// `/ready` answer during startup. A failed build stops the server.
pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    let addr = settings.bind_addr()?;
    let state = AppState::new(&settings);
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");
    tracing::info!("Serving content from {}", settings.content_root.display());

    let build_settings = settings.clone();
    let build_state = state.clone();
    let build = tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let embedder: Arc<dyn Embedder> =
            Arc::new(FastEmbedGenerator::from_config(&build_settings.embedding)?);
        let (index, report) = build_index(
            &build_settings.content_root,
            &build_settings,
            embedder.as_ref(),
        )?;
        if !report.skipped.is_empty() {
            tracing::warn!("{} documents were skipped", report.skipped.len());
        }
        let engine = SearchEngine::new(
            Arc::new(index),
            embedder,
            SearchOptions::from_settings(&build_settings),
        );
        build_state.install(engine);
        tracing::info!("Ready to serve search requests");
        Ok(())
    });

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    let build_failed = async {
        match build.await {
            Ok(Ok(())) => std::future::pending::<anyhow::Error>().await,
            Ok(Err(e)) => e,
            Err(join_error) => anyhow::anyhow!("index build panicked: {join_error}"),
        }
    };

    tokio::select! {
        result = server => {
            result?;
        }
        error = build_failed => {
            tracing::error!("Index build failed: {error}");
            return Err(error);
        }
    }

    // The runtime waits for blocking tasks on drop, and a build in the
    // middle of a model download cannot be interrupted.
    if !state.is_ready() {
        tracing::warn!("Shut down before the index build finished, abandoning the build");
        std::process::exit(0);
    }

    tracing::info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
