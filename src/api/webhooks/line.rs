//! LINE webhook handler
//!
//! Verifies the signature over the raw body before anything else; once it
//! checks out, the call always returns 200 so the platform does not
//! re-deliver, no matter what happens downstream.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::Error;
use crate::api::ApiState;
use crate::channels::ReplySender;

const SIGNATURE_HEADER: &str = "X-Line-Signature";

/// Handle an incoming LINE webhook call
pub async fn handle_callback(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let events = match state.line.handle_webhook(&body, signature) {
        Ok(events) => events,
        Err(Error::InvalidSignature) => {
            tracing::warn!("webhook rejected: invalid signature");
            return (
                StatusCode::BAD_REQUEST,
                axum::Json(serde_json::json!({ "detail": "Invalid signature" })),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "webhook body could not be parsed");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    for event in events {
        let reply = state.router.route(&event).await;
        // At most one reply per inbound event; a failed send is logged and
        // dropped, the reply token cannot be reused anyway.
        if let Err(e) = state.line.reply(&event.reply_token, &reply).await {
            tracing::error!(user = %event.user_id, error = %e, "reply send failed");
        }
    }

    (StatusCode::OK, "OK").into_response()
}
