//! Conversation partner client and the visible message history

pub mod client;
pub mod message;

pub use client::{ConversationClient, HttpConversationClient, FALLBACK_REPLY};
pub use message::{Message, MessageLog, Sender};
