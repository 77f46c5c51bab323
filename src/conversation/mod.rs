//! Conversation state and the message router
//!
//! Holds the per-user onboarding state machine and the chat-history model.
//! The router is the only writer of conversation state.

mod router;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use router::MessageRouter;

use crate::Result;

/// Onboarding state of a user
///
/// `Complete` is absorbing; once reached, text messages go to the AI branch
/// instead of re-running onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum ConversationState {
    /// First contact, no profile collected yet
    #[default]
    New,
    /// Waiting for a `Country/Language` answer
    WaitingForCountryLanguage,
    /// Waiting for a `Major/Grade` answer
    WaitingForMajorGrade,
    /// Onboarding finished; all messages go to the assistant
    Complete,
}

impl From<String> for ConversationState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "waiting_for_country_language" => Self::WaitingForCountryLanguage,
            "waiting_for_major_grade" => Self::WaitingForMajorGrade,
            "complete" => Self::Complete,
            // Unknown stored values restart onboarding rather than failing.
            _ => Self::New,
        }
    }
}

/// Durable per-user record, stored at `profiles/{user_id}`
///
/// Profile fields are only written once their onboarding step completes;
/// invalid input never persists partial data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    /// Current onboarding state; unknown stored values decode as `New`
    #[serde(default)]
    pub state: ConversationState,

    /// Opaque assistant-conversation id, minted once and never rotated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,

    /// Best-effort cache of the last assistant reply (write-only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_assistant_reply: Option<String>,
}

/// Role of a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The assistant
    Model,
}

impl Role {
    /// Wire name used by both the store schema and the Gemini API
    #[must_use]
    pub fn as_wire_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// One turn of chat history, stored at `chat/{user_id}` as an append-only
/// array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Who produced this turn
    pub role: Role,
    /// Text parts of the turn
    pub parts: Vec<String>,
}

impl ChatTurn {
    /// Create a user turn
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![text.into()],
        }
    }

    /// Create a model turn
    #[must_use]
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![text.into()],
        }
    }

    /// Joined text of all parts
    #[must_use]
    pub fn text(&self) -> String {
        self.parts.join("\n")
    }
}

/// Generates assistant replies from an ordered list of turns
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Produce one reply for the given conversation
    async fn generate(&self, turns: &[ChatTurn]) -> Result<String>;
}
