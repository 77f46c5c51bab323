//! Messaging channel types and the LINE adapter
//!
//! Inbound platform events are normalized into [`InboundEvent`] before any
//! routing happens, so the router never sees platform wire formats.

mod line;

use async_trait::async_trait;

pub use line::LineChannel;

use crate::Result;

/// Kind of content carried by an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    /// Plain text message
    Text {
        /// Message text as entered by the user
        text: String,
    },
    /// Image message; bytes must be fetched from the platform content API
    Image {
        /// Platform message id used to fetch the binary content
        message_id: String,
    },
}

/// A normalized inbound event from the messaging platform
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Single-use handle for sending exactly one reply
    pub reply_token: String,

    /// Platform-assigned sender identity (primary key for all state)
    pub user_id: String,

    /// Message content
    pub kind: InboundKind,
}

/// Sends replies back through the messaging platform
#[async_trait]
pub trait ReplySender: Send + Sync {
    /// Send a single text reply for the given reply token
    async fn reply(&self, reply_token: &str, text: &str) -> Result<()>;
}

/// Fetches binary message content from the messaging platform
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Download the raw bytes of a media message
    async fn fetch_content(&self, message_id: &str) -> Result<Vec<u8>>;
}
