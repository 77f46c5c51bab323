//! Webhook endpoints for messaging platforms

pub mod line;

use std::sync::Arc;

use axum::{Router, routing::post};

use super::ApiState;

/// Build the webhooks router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/line", post(line::handle_callback))
        .with_state(state)
}
