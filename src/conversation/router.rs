//! Message router / conversation state machine
//!
//! Given a normalized inbound event, looks up the user's state, applies one
//! transition, calls collaborators as needed, and produces the reply text.
//! All collaborators are injected behind traits so the machine can be
//! exercised with test doubles.

use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use uuid::Uuid;

use super::{ChatModel, ChatTurn, ConversationState, UserProfile};
use crate::channels::{ContentFetcher, InboundEvent, InboundKind};
use crate::extractor::{EventExtractor, ImageInput};
use crate::shortener::ShortenUrl;
use crate::store::{DocumentStore, put_detached};
use crate::{Error, Result, calendar};

/// Store path prefix for user profiles
const PROFILE_PATH: &str = "profiles";
/// Store path prefix for chat history
const CHAT_PATH: &str = "chat";

/// Clears chat history in any state
const CLEAR_COMMAND: &str = "C";
/// Summarizes stored history in the completed state
const SUMMARY_COMMAND: &str = "A";

const HISTORY_CLEARED_REPLY: &str = "Chat history cleared.";
const COUNTRY_LANGUAGE_PROMPT: &str =
    "Welcome! Please tell me your country and language as Country/Language \
     (for example Japan/Japanese).";
const COUNTRY_LANGUAGE_REPROMPT: &str =
    "That doesn't look right. Please use the Country/Language format, for \
     example Japan/Japanese.";
const MAJOR_GRADE_PROMPT: &str =
    "Thanks! Now tell me your major and grade as Major/Grade (for example CS/26).";
const MAJOR_GRADE_REPROMPT: &str =
    "That doesn't look right. Please use the Major/Grade format with a numeric \
     grade, for example CS/26.";
const ONBOARDING_COMPLETE_REPLY: &str =
    "You're all set! Ask me anything, or send \"A\" for a summary of our conversation.";
const FALLBACK_REPLY: &str = "Sorry, I couldn't process your request. Please try again later.";
const EXTRACTION_FAILED_REPLY: &str =
    "I couldn't read an event out of that image. Please try another one.";

static COUNTRY_LANGUAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)/(\w+)$").expect("valid pattern"));
static MAJOR_GRADE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)/(\d+)$").expect("valid pattern"));
static CITATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("【[^】]*】").expect("valid pattern"));

/// Routes inbound events through the onboarding/conversation state machine
pub struct MessageRouter {
    chat: Arc<dyn ChatModel>,
    store: Arc<dyn DocumentStore>,
    extractor: Arc<dyn EventExtractor>,
    content: Arc<dyn ContentFetcher>,
    shortener: Option<Arc<dyn ShortenUrl>>,
}

impl MessageRouter {
    /// Create a router over the injected collaborators
    #[must_use]
    pub fn new(
        chat: Arc<dyn ChatModel>,
        store: Arc<dyn DocumentStore>,
        extractor: Arc<dyn EventExtractor>,
        content: Arc<dyn ContentFetcher>,
        shortener: Option<Arc<dyn ShortenUrl>>,
    ) -> Self {
        Self {
            chat,
            store,
            extractor,
            content,
            shortener,
        }
    }

    /// Route one inbound event to a reply
    ///
    /// Steady-state failures are absorbed into a user-visible message here;
    /// the webhook must acknowledge receipt regardless of downstream
    /// outcome, so nothing propagates to the transport layer.
    pub async fn route(&self, event: &InboundEvent) -> String {
        let result = match &event.kind {
            InboundKind::Text { text } => self.route_text(&event.user_id, text).await,
            InboundKind::Image { message_id } => self.route_image(message_id).await,
        };

        match result {
            Ok(reply) => reply,
            Err(Error::MalformedExtraction(detail)) => {
                tracing::warn!(user = %event.user_id, %detail, "extraction produced unusable output");
                EXTRACTION_FAILED_REPLY.to_string()
            }
            Err(e) => {
                tracing::error!(user = %event.user_id, error = %e, "event handling failed");
                FALLBACK_REPLY.to_string()
            }
        }
    }

    /// Handle a text message through the state machine
    async fn route_text(&self, user_id: &str, text: &str) -> Result<String> {
        // "C" is honored in every state and leaves `state` untouched.
        if text == CLEAR_COMMAND {
            self.store.delete(&chat_path(user_id), None).await?;
            tracing::info!(user = %user_id, "chat history cleared");
            return Ok(HISTORY_CLEARED_REPLY.to_string());
        }

        let mut profile = self.load_profile(user_id).await?;
        match profile.state {
            ConversationState::New => {
                profile.state = ConversationState::WaitingForCountryLanguage;
                self.save_profile(user_id, &profile).await?;
                Ok(COUNTRY_LANGUAGE_PROMPT.to_string())
            }
            ConversationState::WaitingForCountryLanguage => {
                let Some(caps) = COUNTRY_LANGUAGE_RE.captures(text) else {
                    // Invalid input never persists partial data.
                    return Ok(COUNTRY_LANGUAGE_REPROMPT.to_string());
                };
                profile.country = Some(caps[1].to_string());
                profile.language = Some(caps[2].to_string());
                profile.state = ConversationState::WaitingForMajorGrade;
                self.save_profile(user_id, &profile).await?;
                Ok(MAJOR_GRADE_PROMPT.to_string())
            }
            ConversationState::WaitingForMajorGrade => {
                let Some(caps) = MAJOR_GRADE_RE.captures(text) else {
                    return Ok(MAJOR_GRADE_REPROMPT.to_string());
                };
                profile.major = Some(caps[1].to_string());
                profile.grade = Some(caps[2].to_string());
                profile.state = ConversationState::Complete;
                self.save_profile(user_id, &profile).await?;
                Ok(ONBOARDING_COMPLETE_REPLY.to_string())
            }
            ConversationState::Complete => {
                if text == SUMMARY_COMMAND {
                    self.summarize_history(user_id).await
                } else {
                    self.assistant_exchange(user_id, &mut profile, text).await
                }
            }
        }
    }

    /// Summarize stored history on the "A" command
    async fn summarize_history(&self, user_id: &str) -> Result<String> {
        let history = self.load_history(user_id).await?;
        let transcript = history
            .iter()
            .map(|turn| format!("{}: {}", turn.role.as_wire_str(), turn.text()))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Summarize the following conversation in at most 5 bullet points.\n{transcript}"
        );
        let raw = self.chat.generate(&[ChatTurn::user(prompt)]).await?;
        Ok(strip_citations(&raw))
    }

    /// One normal assistant exchange in the completed state
    async fn assistant_exchange(
        &self,
        user_id: &str,
        profile: &mut UserProfile,
        text: &str,
    ) -> Result<String> {
        let thread_id = self.ensure_thread_id(user_id, profile).await?;

        let mut history = self.load_history(user_id).await?;
        let mut turns = history.clone();
        turns.push(ChatTurn::user(format!(
            "{}\n{text}",
            system_instruction(profile)
        )));

        let raw = self.chat.generate(&turns).await?;
        let reply = strip_citations(&raw);
        tracing::info!(user = %user_id, thread = %thread_id, "assistant exchange completed");

        // History grows by exactly one user/model pair per exchange and is
        // persisted without blocking the reply.
        history.push(ChatTurn::user(text));
        history.push(ChatTurn::model(reply.clone()));
        put_detached(
            &self.store,
            chat_path(user_id),
            None,
            serde_json::to_value(&history)?,
        );

        profile.last_assistant_reply = Some(reply.clone());
        put_detached(
            &self.store,
            profile_path(user_id),
            None,
            serde_json::to_value(&*profile)?,
        );

        Ok(reply)
    }

    /// Mint the thread id on first use; it is immutable afterwards
    async fn ensure_thread_id(&self, user_id: &str, profile: &mut UserProfile) -> Result<String> {
        if let Some(thread_id) = &profile.thread_id {
            return Ok(thread_id.clone());
        }
        let thread_id = Uuid::new_v4().to_string();
        profile.thread_id = Some(thread_id.clone());
        self.save_profile(user_id, profile).await?;
        tracing::debug!(user = %user_id, thread = %thread_id, "assistant thread created");
        Ok(thread_id)
    }

    /// Stateless image path: fetch, extract, build calendar URL, shorten
    async fn route_image(&self, message_id: &str) -> Result<String> {
        let bytes = self.content.fetch_content(message_id).await?;
        let details = self.extractor.extract(ImageInput::Bytes(&bytes)).await?;
        let url = calendar::google_calendar_url(&details);

        let Some(shortener) = &self.shortener else {
            return Ok(url);
        };
        match shortener.shorten(&url).await {
            Ok(short) => Ok(short),
            Err(e) => {
                // The long URL still works; shortening is cosmetic.
                tracing::warn!(error = %e, "shortener failed, replying with full URL");
                Ok(url)
            }
        }
    }

    /// Load the user profile, defaulting when no record exists yet
    async fn load_profile(&self, user_id: &str) -> Result<UserProfile> {
        match self.store.get(&profile_path(user_id), None).await? {
            Some(value) => Ok(decode_or_default(value)),
            None => Ok(UserProfile::default()),
        }
    }

    async fn save_profile(&self, user_id: &str, profile: &UserProfile) -> Result<()> {
        self.store
            .put(&profile_path(user_id), None, serde_json::to_value(profile)?)
            .await
    }

    /// Load chat history, treating a missing document as empty
    async fn load_history(&self, user_id: &str) -> Result<Vec<ChatTurn>> {
        match self.store.get(&chat_path(user_id), None).await? {
            Some(value) => Ok(decode_or_default(value)),
            None => Ok(Vec::new()),
        }
    }
}

fn profile_path(user_id: &str) -> String {
    format!("{PROFILE_PATH}/{user_id}")
}

fn chat_path(user_id: &str) -> String {
    format!("{CHAT_PATH}/{user_id}")
}

/// Decode a stored document, falling back to defaults on shape drift
fn decode_or_default<T: serde::de::DeserializeOwned + Default>(value: Value) -> T {
    serde_json::from_value(value).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "stored document has an unexpected shape, using defaults");
        T::default()
    })
}

/// Build the instruction prepended to completed-state messages
fn system_instruction(profile: &UserProfile) -> String {
    let unknown = || "unknown".to_string();
    format!(
        "You are a study assistant for a {} student in grade {} from {}. \
         Always answer in {}.",
        profile.major.clone().unwrap_or_else(unknown),
        profile.grade.clone().unwrap_or_else(unknown),
        profile.country.clone().unwrap_or_else(unknown),
        profile.language.clone().unwrap_or_else(unknown),
    )
}

/// Remove bracketed citation markers from assistant output
fn strip_citations(text: &str) -> String {
    CITATION_RE.replace_all(text, "").into_owned()
}
