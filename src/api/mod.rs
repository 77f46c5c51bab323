//! HTTP API server for the relay

pub mod extract;
pub mod health;
pub mod webhooks;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::channels::LineChannel;
use crate::conversation::MessageRouter;
use crate::extractor::EventExtractor;
use crate::{Error, Result};

/// Shared state for API handlers
pub struct ApiState {
    /// LINE adapter, used for signature checks and replies
    pub line: Arc<LineChannel>,
    /// The conversation router
    pub router: Arc<MessageRouter>,
    /// Extractor backing the `img_url` redirect route
    pub extractor: Arc<dyn EventExtractor>,
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Create a server over the shared state
    #[must_use]
    pub fn new(state: Arc<ApiState>, port: u16) -> Self {
        Self { state, port }
    }

    /// Build the router with all routes
    fn router(&self) -> Router {
        Router::new()
            .nest("/webhooks", webhooks::router(self.state.clone()))
            .merge(extract::router(self.state.clone()))
            .merge(health::router())
            .layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if the server fails to bind or run.
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }
}
