//! Image event extractor
//!
//! Sends an image to the Gemini vision model and decodes the answer into a
//! fixed four-field shape. The model enforces no schema, so the output is
//! validated here and bad output becomes `Error::MalformedExtraction`
//! instead of crashing the request path.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::gemini::GeminiClient;
use crate::{Error, Result};

/// Instruction sent alongside the image
const EXTRACTION_PROMPT: &str = "\
Extract the event time, location, title and description from this image.
The time must be a Google Calendar compatible UTC interval such as
\"20240409T070000Z/20240409T080000Z\"; convert local times to UTC.
Keep the description as plain text with a few bullet-pointed notes, no HTML
and no markdown. Answer with a JSON object only, with exactly these keys:
{
    \"time\": \"20240409T070000Z/20240409T080000Z\",
    \"location\": \"Taipei\",
    \"title\": \"Opening ceremony\",
    \"content\": \"Everyone is welcome.\"
}";

/// Image input for extraction; exactly one source by construction
#[derive(Debug, Clone, Copy)]
pub enum ImageInput<'a> {
    /// Publicly fetchable image URL
    Url(&'a str),
    /// Raw image bytes
    Bytes(&'a [u8]),
}

/// Structured event fields extracted from an image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetails {
    /// Calendar-compatible UTC interval, e.g. `20240409T070000Z/20240409T080000Z`
    pub time: String,
    /// Event location
    pub location: String,
    /// Event title
    pub title: String,
    /// Plain-text event description
    pub content: String,
}

/// Turns an image into structured event fields
#[async_trait]
pub trait EventExtractor: Send + Sync {
    /// Extract event details from the given image
    async fn extract(&self, input: ImageInput<'_>) -> Result<EventDetails>;
}

/// Gemini-backed event extractor
pub struct GeminiExtractor {
    gemini: Arc<GeminiClient>,
    client: reqwest::Client,
}

impl GeminiExtractor {
    /// Create an extractor over the shared Gemini client
    #[must_use]
    pub fn new(gemini: Arc<GeminiClient>) -> Self {
        Self {
            gemini,
            client: reqwest::Client::new(),
        }
    }

    /// Download an image URL into bytes
    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("image download failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Channel(format!(
                "image download failed: {}",
                response.status()
            )));
        }
        Ok(response
            .bytes()
            .await
            .map_err(|e| Error::Channel(format!("image read failed: {e}")))?
            .to_vec())
    }
}

#[async_trait]
impl EventExtractor for GeminiExtractor {
    async fn extract(&self, input: ImageInput<'_>) -> Result<EventDetails> {
        let bytes = match input {
            ImageInput::Url(url) => self.download(url).await?,
            ImageInput::Bytes(bytes) => bytes.to_vec(),
        };

        let mime_type = sniff_mime(&bytes);
        let raw = self
            .gemini
            .generate_vision(EXTRACTION_PROMPT, &bytes, mime_type)
            .await?;
        tracing::debug!(raw = %raw, "extraction answer received");

        parse_event_details(&raw)
    }
}

/// Decode and validate the model's answer
///
/// # Errors
///
/// Returns `Error::MalformedExtraction` when the answer is not a JSON
/// object with exactly the four string fields, or `time` is not a valid
/// calendar interval.
pub fn parse_event_details(raw: &str) -> Result<EventDetails> {
    let stripped = strip_code_fences(raw);
    let details: EventDetails = serde_json::from_str(stripped)
        .map_err(|e| Error::MalformedExtraction(format!("not the expected JSON shape: {e}")))?;

    if !is_calendar_interval(&details.time) {
        return Err(Error::MalformedExtraction(format!(
            "time is not a calendar interval: {}",
            details.time
        )));
    }
    Ok(details)
}

/// Strip a surrounding markdown code fence, if present
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line, then the closing fence.
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim().strip_suffix("```").unwrap_or(rest).trim()
}

/// Check a `YYYYMMDDTHHMMSSZ[/YYYYMMDDTHHMMSSZ]` interval
fn is_calendar_interval(time: &str) -> bool {
    let parts: Vec<&str> = time.split('/').collect();
    if parts.is_empty() || parts.len() > 2 {
        return false;
    }
    parts
        .iter()
        .all(|part| NaiveDateTime::parse_from_str(part, "%Y%m%dT%H%M%SZ").is_ok())
}

/// Best-effort MIME detection from magic bytes; the platform content API
/// does not always report a type
pub(crate) fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() > 11 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_ANSWER: &str = r#"{
        "time": "20240409T070000Z/20240409T080000Z",
        "location": "Taipei",
        "title": "Opening ceremony",
        "content": "Everyone is welcome."
    }"#;

    #[test]
    fn valid_answer_parses() {
        let details = parse_event_details(VALID_ANSWER).unwrap();
        assert_eq!(details.title, "Opening ceremony");
        assert_eq!(details.time, "20240409T070000Z/20240409T080000Z");
    }

    #[test]
    fn fenced_answer_parses() {
        let fenced = format!("```json\n{VALID_ANSWER}\n```");
        assert!(parse_event_details(&fenced).is_ok());

        let bare_fence = format!("```\n{VALID_ANSWER}\n```");
        assert!(parse_event_details(&bare_fence).is_ok());
    }

    #[test]
    fn single_instant_time_is_accepted() {
        let answer = VALID_ANSWER.replace("20240409T070000Z/20240409T080000Z", "20240409T070000Z");
        assert!(parse_event_details(&answer).is_ok());
    }

    #[test]
    fn missing_field_is_malformed() {
        let err = parse_event_details(r#"{"time": "20240409T070000Z"}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedExtraction(_)));
    }

    #[test]
    fn prose_answer_is_malformed() {
        let err = parse_event_details("The event is on Tuesday at the park.").unwrap_err();
        assert!(matches!(err, Error::MalformedExtraction(_)));
    }

    #[test]
    fn bad_time_format_is_malformed() {
        let answer = VALID_ANSWER.replace("20240409T070000Z/20240409T080000Z", "next Tuesday");
        let err = parse_event_details(&answer).unwrap_err();
        assert!(matches!(err, Error::MalformedExtraction(_)));
    }

    #[test]
    fn mime_sniffing_recognizes_common_formats() {
        assert_eq!(sniff_mime(&[0x89, b'P', b'N', b'G', 0x0d]), "image/png");
        assert_eq!(sniff_mime(b"GIF89a..."), "image/gif");
        assert_eq!(sniff_mime(b"RIFF\x00\x00\x00\x00WEBPVP8 "), "image/webp");
        assert_eq!(sniff_mime(&[0xff, 0xd8, 0xff]), "image/jpeg");
    }
}
