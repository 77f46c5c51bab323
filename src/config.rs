//! Environment-driven configuration
//!
//! All credentials come from the environment. Mandatory values missing at
//! startup are a fatal error before the server binds.

use crate::{Error, Result};

/// Default Gemini chat model
pub const DEFAULT_CHAT_MODEL: &str = "gemini-1.5-pro";

/// Default Gemini vision model for event extraction
pub const DEFAULT_VISION_MODEL: &str = "gemini-1.5-flash";

/// Runtime configuration for the relay
#[derive(Debug, Clone)]
pub struct Config {
    /// LINE channel secret (webhook signature key)
    pub channel_secret: String,

    /// LINE channel access token (reply/content API)
    pub channel_access_token: String,

    /// Gemini API key
    pub gemini_api_key: String,

    /// Gemini chat model id
    pub gemini_model: String,

    /// Gemini vision model id
    pub gemini_vision_model: String,

    /// Base URL of the Firebase realtime database
    pub firebase_url: String,

    /// reurl.cc API key; when absent, calendar URLs are returned unshortened
    pub reurl_api_key: Option<String>,

    /// HTTP port to listen on
    pub port: u16,

    /// Whether we run in production mode (affects default log verbosity only)
    pub production: bool,
}

impl Config {
    /// Load configuration from the environment
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first missing mandatory variable.
    pub fn from_env(port: u16) -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok(), port)
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first missing mandatory variable.
    pub fn from_lookup<F>(lookup: F, port: u16) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let required =
            |name: &str| optional(name).ok_or_else(|| Error::Config(format!("{name} must be set")));

        Ok(Self {
            channel_secret: required("LINE_CHANNEL_SECRET")?,
            channel_access_token: required("LINE_CHANNEL_ACCESS_TOKEN")?,
            gemini_api_key: required("GEMINI_API_KEY")?,
            gemini_model: optional("GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            gemini_vision_model: optional("GEMINI_VISION_MODEL")
                .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
            firebase_url: required("FIREBASE_URL")?.trim_end_matches('/').to_string(),
            reurl_api_key: optional("REURL_API_KEY"),
            port,
            production: optional("API_ENV").as_deref() == Some("production"),
        })
    }
}
