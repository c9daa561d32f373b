//! Web layer module
//!
//! Thin axum handlers over the upload and lookup services. Handlers never talk
//! to the database or the broker directly, apart from the health check.

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::{
    config::Config,
    database::Database,
    services::{ImageLookupService, ImageUploadService},
};

pub mod handlers;
pub mod middleware;
pub mod responses;
pub mod utils;

pub use responses::{ErrorBody, handle_error};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub database: Database,
    pub upload_service: ImageUploadService,
    pub lookup_service: ImageLookupService,
}

/// Build the application router
pub fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route(
            "/",
            get(handlers::index::index).post(handlers::images::upload_image),
        )
        .route("/images/{nickname}", get(handlers::images::get_image))
        .route("/sniff-mime", post(handlers::images::sniff_mime))
        .route("/dbtype", get(handlers::system::dbtype))
        .route("/health", get(handlers::system::health))
        .fallback(handlers::index::serve_embedded_asset)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(middleware::access_log_middleware))
        .with_state(state)
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: &Config, app: Router) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port)
            .parse()
            .with_context(|| {
                format!(
                    "Invalid listen address {}:{}",
                    config.web.host, config.web.port
                )
            })?;

        Ok(Self { app, addr })
    }

    /// Serve until `cancellation_token` fires, then finish in-flight requests.
    ///
    /// `ready_signal` reports whether the listener could be bound.
    pub async fn serve_with_cancellation(
        self,
        ready_signal: tokio::sync::oneshot::Sender<Result<()>>,
        cancellation_token: CancellationToken,
    ) -> Result<()> {
        match tokio::net::TcpListener::bind(&self.addr).await {
            Ok(listener) => {
                let _ = ready_signal.send(Ok(()));

                let shutdown_signal = async move {
                    cancellation_token.cancelled().await;
                    tracing::info!(
                        "Web server received cancellation signal, shutting down gracefully"
                    );
                };

                axum::serve(listener, self.app)
                    .with_graceful_shutdown(shutdown_signal)
                    .await?;
                Ok(())
            }
            Err(bind_error) => {
                let bind_err_msg = format!("Failed to bind to {}: {}", self.addr, bind_error);
                let _ = ready_signal.send(Err(anyhow::anyhow!("{}", bind_err_msg)));
                Err(anyhow::anyhow!("{}", bind_err_msg))
            }
        }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}
