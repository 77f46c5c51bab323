//! Line Relay - webhook-driven LINE chat relay for Gemini assistants
//!
//! This library provides the core functionality for the relay:
//! - LINE webhook ingress (signature verification, event parsing)
//! - Per-user onboarding/conversation state machine
//! - Gemini chat and vision clients
//! - Firebase-backed conversation store
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 LINE Platform                        │
//! │   webhook events  │  reply API  │  content API      │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Line Relay                          │
//! │   Ingress  │  Router/State Machine  │  Extractor    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │            External collaborators                    │
//! │   Gemini  │  Firebase store  │  reurl shortener     │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod calendar;
pub mod channels;
pub mod config;
pub mod conversation;
pub mod error;
pub mod extractor;
pub mod gemini;
pub mod shortener;
pub mod store;

pub use config::Config;
pub use conversation::{ChatModel, ChatTurn, ConversationState, MessageRouter, UserProfile};
pub use error::{Error, Result};
pub use extractor::{EventDetails, EventExtractor, ImageInput};
pub use store::DocumentStore;
