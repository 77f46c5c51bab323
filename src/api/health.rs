//! Health check endpoint

use axum::{Router, routing::get};

/// Liveness probe - is the service running?
async fn health() -> &'static str {
    "ok"
}

/// Build the health router (stateless)
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_answers_ok() {
        assert_eq!(health().await, "ok");
    }
}
