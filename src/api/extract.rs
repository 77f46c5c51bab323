//! Image-URL calendar redirect
//!
//! `GET /?img_url=<url>` runs the extraction pipeline on a hosted image and
//! redirects to the resulting Google Calendar template URL.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;

use super::ApiState;
use crate::calendar;
use crate::extractor::ImageInput;

/// Query parameters for the redirect route
#[derive(Debug, Deserialize)]
pub struct ExtractParams {
    /// Image to extract an event from
    pub img_url: String,
}

/// Extract an event from the image and redirect to the calendar URL
async fn extract_calendar(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<ExtractParams>,
) -> Response {
    match state
        .extractor
        .extract(ImageInput::Url(&params.img_url))
        .await
    {
        Ok(details) => {
            let url = calendar::google_calendar_url(&details);
            if calendar::is_url_valid(&url) {
                (StatusCode::FOUND, [(header::LOCATION, url)]).into_response()
            } else {
                "Error".into_response()
            }
        }
        Err(e) => {
            tracing::warn!(img_url = %params.img_url, error = %e, "image extraction failed");
            "Error".into_response()
        }
    }
}

/// Build the extract router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(extract_calendar))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::Value;

    use super::*;
    use crate::channels::{ContentFetcher, LineChannel};
    use crate::conversation::{ChatModel, ChatTurn, MessageRouter};
    use crate::extractor::{EventDetails, EventExtractor};
    use crate::store::DocumentStore;
    use crate::{Error, Result};

    struct StubExtractor {
        fail: bool,
    }

    #[async_trait]
    impl EventExtractor for StubExtractor {
        async fn extract(&self, _input: ImageInput<'_>) -> Result<EventDetails> {
            if self.fail {
                return Err(Error::MalformedExtraction("no JSON found".to_string()));
            }
            Ok(EventDetails {
                time: "20240409T070000Z/20240409T080000Z".to_string(),
                location: "Taipei".to_string(),
                title: "Opening ceremony".to_string(),
                content: "Everyone is welcome.".to_string(),
            })
        }
    }

    struct StubChat;

    #[async_trait]
    impl ChatModel for StubChat {
        async fn generate(&self, _turns: &[ChatTurn]) -> Result<String> {
            Ok(String::new())
        }
    }

    struct StubStore;

    #[async_trait]
    impl DocumentStore for StubStore {
        async fn get(&self, _path: &str, _key: Option<&str>) -> Result<Option<Value>> {
            Ok(None)
        }

        async fn put(&self, _path: &str, _key: Option<&str>, _value: Value) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _path: &str, _key: Option<&str>) -> Result<()> {
            Ok(())
        }
    }

    struct StubContent;

    #[async_trait]
    impl ContentFetcher for StubContent {
        async fn fetch_content(&self, _message_id: &str) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    fn state(extractor_fails: bool) -> Arc<ApiState> {
        let extractor: Arc<dyn EventExtractor> = Arc::new(StubExtractor {
            fail: extractor_fails,
        });
        let router = Arc::new(MessageRouter::new(
            Arc::new(StubChat),
            Arc::new(StubStore),
            Arc::clone(&extractor),
            Arc::new(StubContent),
            None,
        ));
        Arc::new(ApiState {
            line: Arc::new(LineChannel::new("secret".to_string(), "token".to_string())),
            router,
            extractor,
        })
    }

    fn params() -> Query<ExtractParams> {
        Query(ExtractParams {
            img_url: "https://example.com/poster.png".to_string(),
        })
    }

    #[tokio::test]
    async fn extracted_event_redirects_to_the_calendar_url() {
        let response = extract_calendar(State(state(false)), params()).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert!(location.starts_with("https://www.google.com/calendar/render"));
        assert!(location.contains("dates=20240409T070000Z/20240409T080000Z"));
    }

    #[tokio::test]
    async fn failed_extraction_answers_error_text() {
        let response = extract_calendar(State(state(true)), params()).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Error");
    }
}
