//! # icebox: CSV upload-and-archive service
//!
//! `icebox` is a small web service that accepts CSV file uploads, dumps their
//! lines to the operational log, and forwards each file to an S3-compatible
//! object-storage bucket together with a storage-class transition request
//! (Glacier by default, after a configured number of days).
//!
//! ## Request Flow
//!
//! A `POST /process_csv` multipart request carrying a `csv_file` field is
//! buffered fully into memory, decoded as UTF-8, and split on newlines; each
//! line is logged at info level. The same buffered bytes are then uploaded to
//! the configured bucket under the file's original name, and a lifecycle rule
//! requesting the cold-storage transition for that key is written to the
//! bucket. `GET /` serves a static upload page.
//!
//! There is deliberately no retry, no queueing, and no persistence beyond the
//! single upload-and-tag operation: a failure anywhere in the chain fails the
//! request, and a lifecycle failure after a successful upload leaves the
//! object stored but untransitioned.
//!
//! ## Architecture
//!
//! The HTTP layer is built on [Axum](https://github.com/tokio-rs/axum).
//! Handlers talk to storage through the [`storage::ObjectStore`] trait; the
//! production implementation ([`storage::s3::S3ObjectStore`]) wraps the AWS
//! SDK, and tests inject an in-memory fake. Configuration is loaded from a
//! YAML file with `ICEBOX_`-prefixed environment overrides (see [`config`]).
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use icebox::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = icebox::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     icebox::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod errors;
mod static_assets;
pub mod storage;
pub mod telemetry;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use crate::config::Config;
use crate::storage::ObjectStore;
use crate::storage::s3::S3ObjectStore;

/// Shared application state passed to all handlers.
///
/// The store handle is process-wide but explicitly constructed and injected,
/// so tests can substitute a fake.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
    pub config: Config,
}

/// Build the application router over the given state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(api::handlers::static_assets::index))
        .route("/process_csv", post(api::handlers::csv::process_csv))
        // Uploads are fully buffered, so the body cap also bounds memory use
        .layer(DefaultBodyLimit::max(state.config.limits.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The application, with all resources initialized and ready to serve.
///
/// Lifecycle:
///
/// 1. **Create**: [`Application::new`] builds the S3 client and the router
/// 2. **Serve**: [`Application::serve`] binds a TCP port and handles requests
/// 3. **Shutdown**: stops gracefully when the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance backed by the configured S3 bucket
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Arc::new(S3ObjectStore::from_config(&config.storage).await);
        Ok(Self::with_store(config, store))
    }

    /// Create an application with an injected store (used by tests)
    pub fn with_store(config: Config, store: Arc<dyn ObjectStore>) -> Self {
        let state = AppState {
            store,
            config: config.clone(),
        };
        let router = build_router(state);
        Self { router, config }
    }

    /// Convert the application into a test server (for tests)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "icebox listening on http://{}, archiving to bucket '{}'",
            bind_addr, self.config.storage.bucket
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
