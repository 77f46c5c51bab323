//! Gemini API client
//!
//! Chat generation goes through the SSE streaming endpoint; the token
//! stream is folded into a single accumulated string rather than surfaced
//! incrementally, since LINE replies are sent in one piece anyway. Vision
//! calls use the non-streaming endpoint because the extractor needs the
//! whole JSON answer at once.

use async_trait::async_trait;
use base64::Engine as _;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::conversation::{ChatModel, ChatTurn};
use crate::{Error, Result};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini API client for chat and vision
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    vision_model: String,
}

/// Request body for `generateContent` / `streamGenerateContent`
#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<WireContent>,
}

/// A content entry on the wire
#[derive(Debug, Serialize)]
struct WireContent {
    role: &'static str,
    parts: Vec<WirePart>,
}

/// A part of a content entry (text or inline image data)
#[derive(Debug, Serialize)]
struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl WirePart {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

/// Base64-encoded inline media
#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

/// Response body (full or a single streamed chunk)
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenate all candidate text parts
    fn text(self) -> String {
        self.candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect()
    }
}

impl GeminiClient {
    /// Create a new Gemini client
    #[must_use]
    pub fn new(api_key: String, model: String, vision_model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            vision_model,
        }
    }

    /// Analyze an image together with a text prompt
    ///
    /// # Errors
    ///
    /// Returns `Error::UpstreamAi` if the API call fails or comes back
    /// empty.
    pub async fn generate_vision(
        &self,
        prompt: &str,
        image: &[u8],
        mime_type: &str,
    ) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![WireContent {
                role: "user",
                parts: vec![
                    WirePart::text(prompt),
                    WirePart {
                        text: None,
                        inline_data: Some(InlineData {
                            mime_type: mime_type.to_string(),
                            data: base64::engine::general_purpose::STANDARD.encode(image),
                        }),
                    },
                ],
            }],
        };

        let url = format!(
            "{GEMINI_API_BASE}/{}:generateContent?key={}",
            self.vision_model, self.api_key
        );
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::UpstreamAi(format!("vision request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UpstreamAi(format!("API error {status}: {body}")));
        }

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::UpstreamAi(format!("vision parse error: {e}")))?;

        let text = result.text();
        if text.is_empty() {
            return Err(Error::UpstreamAi("empty vision response".to_string()));
        }
        Ok(text)
    }

    /// Convert stored turns into the wire representation
    fn wire_contents(turns: &[ChatTurn]) -> Vec<WireContent> {
        turns
            .iter()
            .map(|turn| WireContent {
                role: turn.role.as_wire_str(),
                parts: turn.parts.iter().map(|p| WirePart::text(p.as_str())).collect(),
            })
            .collect()
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn generate(&self, turns: &[ChatTurn]) -> Result<String> {
        let request = GenerateRequest {
            contents: Self::wire_contents(turns),
        };

        let url = format!(
            "{GEMINI_API_BASE}/{}:streamGenerateContent?alt=sse&key={}",
            self.model, self.api_key
        );
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::UpstreamAi(format!("chat request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UpstreamAi(format!("API error {status}: {body}")));
        }

        // Fold the streamed chunks into one accumulated reply. The stream is
        // finite and not restartable; a transport error mid-stream aborts the
        // whole generation.
        let mut stream = response.bytes_stream();
        let mut pending = Vec::new();
        let mut accumulated = String::new();
        while let Some(chunk) = stream
            .try_next()
            .await
            .map_err(|e| Error::UpstreamAi(format!("stream error: {e}")))?
        {
            pending.extend_from_slice(&chunk);
            while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                accumulate_sse_line(&mut accumulated, &line);
            }
        }
        accumulate_sse_line(&mut accumulated, &pending);

        if accumulated.is_empty() {
            return Err(Error::UpstreamAi("empty chat response".to_string()));
        }
        Ok(accumulated)
    }
}

/// Append the text carried by one SSE line, if any
fn accumulate_sse_line(accumulated: &mut String, line: &[u8]) {
    let Ok(line) = std::str::from_utf8(line) else {
        return;
    };
    let Some(payload) = line.trim().strip_prefix("data:") else {
        return;
    };
    match serde_json::from_str::<GenerateResponse>(payload.trim()) {
        Ok(chunk) => accumulated.push_str(&chunk.text()),
        Err(e) => tracing::debug!(error = %e, "skipping unparseable SSE chunk"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_lines_accumulate_text_in_order() {
        let mut acc = String::new();
        accumulate_sse_line(
            &mut acc,
            br#"data: {"candidates":[{"content":{"parts":[{"text":"Hello"}]}}]}"#,
        );
        accumulate_sse_line(&mut acc, b"\n");
        accumulate_sse_line(
            &mut acc,
            br#"data: {"candidates":[{"content":{"parts":[{"text":", world"}]}}]}"#,
        );
        assert_eq!(acc, "Hello, world");
    }

    #[test]
    fn non_data_and_malformed_lines_are_ignored() {
        let mut acc = String::new();
        accumulate_sse_line(&mut acc, b": keep-alive comment");
        accumulate_sse_line(&mut acc, b"data: {not json");
        accumulate_sse_line(&mut acc, b"");
        assert!(acc.is_empty());
    }

    #[test]
    fn wire_contents_map_roles_and_parts() {
        let turns = vec![ChatTurn::user("hi"), ChatTurn::model("hello")];
        let contents = GeminiClient::wire_contents(&turns);

        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0].role, "user");
        assert_eq!(contents[1].role, "model");

        let json = serde_json::to_value(&contents[0]).unwrap();
        assert_eq!(json["parts"][0]["text"], "hi");
        // inline_data must not leak into text-only parts
        assert!(json["parts"][0].get("inline_data").is_none());
    }

    #[test]
    fn response_text_concatenates_all_parts() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"a"},{"text":"b"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(response.text(), "ab");
    }
}
