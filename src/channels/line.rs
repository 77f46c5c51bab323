//! LINE channel adapter
//!
//! Receives events through the LINE Messaging API webhook and sends replies
//! via the Reply API. The webhook boundary verifies the `X-Line-Signature`
//! HMAC before anything else touches the body; the ingress itself never
//! calls the AI backend or the store.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;

use super::{ContentFetcher, InboundEvent, InboundKind, ReplySender};
use crate::{Error, Result};

const REPLY_API_URL: &str = "https://api.line.me/v2/bot/message/reply";
const CONTENT_API_BASE: &str = "https://api-data.line.me/v2/bot/message";

type HmacSha256 = Hmac<Sha256>;

/// LINE channel adapter
pub struct LineChannel {
    channel_secret: String,
    access_token: String,
    client: Client,
}

impl LineChannel {
    /// Create a new LINE channel adapter
    #[must_use]
    pub fn new(channel_secret: String, access_token: String) -> Self {
        Self {
            channel_secret,
            access_token,
            client: Client::new(),
        }
    }

    /// Verify the webhook signature over the raw request body
    ///
    /// The signature header carries the base64 of an HMAC-SHA256 over the
    /// body, keyed by the channel secret. Comparison happens in constant
    /// time via `Mac::verify_slice`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidSignature` on any mismatch or undecodable
    /// header.
    pub fn verify_signature(&self, body: &[u8], signature: &str) -> Result<()> {
        let expected = BASE64
            .decode(signature)
            .map_err(|_| Error::InvalidSignature)?;

        let mut mac = HmacSha256::new_from_slice(self.channel_secret.as_bytes())
            .map_err(|_| Error::InvalidSignature)?;
        mac.update(body);
        mac.verify_slice(&expected)
            .map_err(|_| Error::InvalidSignature)
    }

    /// Verify the signature and parse the body into normalized events
    ///
    /// Non-message events and unsupported message types are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidSignature` on signature mismatch, or a
    /// serialization error if a correctly signed body is not a valid event
    /// envelope.
    pub fn handle_webhook(&self, body: &[u8], signature: &str) -> Result<Vec<InboundEvent>> {
        self.verify_signature(body, signature)?;

        let envelope: LineWebhookBody = serde_json::from_slice(body)?;
        Ok(envelope
            .events
            .into_iter()
            .filter_map(LineEvent::normalize)
            .collect())
    }
}

#[async_trait]
impl ReplySender for LineChannel {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<()> {
        let response = self
            .client
            .post(REPLY_API_URL)
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({
                "replyToken": reply_token,
                "messages": [{ "type": "text", "text": text }],
            }))
            .send()
            .await
            .map_err(|e| Error::Channel(format!("LINE reply failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Channel(format!(
                "LINE reply API error: {status} - {body}"
            )));
        }

        tracing::debug!("LINE reply sent");
        Ok(())
    }
}

#[async_trait]
impl ContentFetcher for LineChannel {
    async fn fetch_content(&self, message_id: &str) -> Result<Vec<u8>> {
        let url = format!("{CONTENT_API_BASE}/{message_id}/content");
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("LINE content fetch failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Channel(format!(
                "LINE content API error: {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Channel(format!("LINE content read failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}

/// LINE webhook event envelope
#[derive(Debug, Deserialize)]
struct LineWebhookBody {
    /// Events delivered in this webhook call
    events: Vec<LineEvent>,
}

/// A single LINE webhook event (simplified)
#[derive(Debug, Deserialize)]
struct LineEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(rename = "replyToken")]
    reply_token: Option<String>,
    source: Option<LineSource>,
    message: Option<LineMessage>,
}

#[derive(Debug, Deserialize)]
struct LineSource {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LineMessage {
    id: String,
    #[serde(rename = "type")]
    message_type: String,
    text: Option<String>,
}

impl LineEvent {
    /// Normalize a platform event; `None` for anything we don't relay
    fn normalize(self) -> Option<InboundEvent> {
        if self.event_type != "message" {
            return None;
        }
        let reply_token = self.reply_token?;
        let user_id = self.source.and_then(|s| s.user_id)?;
        let message = self.message?;

        let kind = match message.message_type.as_str() {
            "text" => InboundKind::Text {
                text: message.text?,
            },
            "image" => InboundKind::Image {
                message_id: message.id,
            },
            other => {
                tracing::debug!(message_type = other, "skipping unsupported message type");
                return None;
            }
        };

        Some(InboundEvent {
            reply_token,
            user_id,
            kind,
        })
    }
}
