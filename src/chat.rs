use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::store::{KeyValueStore, keys};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub content: String,
    pub message_type: MessageType,
}

impl Message {
    pub fn new(content: impl Into<String>, message_type: MessageType) -> Self {
        Self {
            content: content.into(),
            message_type,
        }
    }
}

/// Canned quick action for extending a scene without typing.
pub const CONTINUE_DIRECTIVE: &str = "Continue the scene with more detail and intensity.";

// Summary kicks in once the transcript outgrows this many messages.
const SUMMARY_TRIGGER: usize = 4;
const SUMMARY_CHARS: usize = 200;

const TURN_SEPARATOR: &str = "\n\n---\n\n";

/// Chat-style follow-up transcript with a persisted continuity summary.
pub struct SceneChat {
    store: Arc<dyn KeyValueStore>,
    pub messages: Vec<Message>,
    context_summary: String,
}

impl SceneChat {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let context_summary = store
            .get(keys::CHAT_CONTEXT)
            .ok()
            .flatten()
            .unwrap_or_default();
        Self {
            store,
            messages: Vec::new(),
            context_summary,
        }
    }

    pub fn context_summary(&self) -> &str {
        &self.context_summary
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::new(content, MessageType::User));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages
            .push(Message::new(content, MessageType::Assistant));
    }

    /// Prompt for the next turn: optional continuity line, the labeled
    /// history, the new input, and the continuation cue.
    pub fn continuation_prompt(&self, user_input: &str) -> String {
        let history = self
            .messages
            .iter()
            .map(|m| {
                let label = match m.message_type {
                    MessageType::User => "User",
                    _ => "Assistant",
                };
                format!("{label}: {}", m.content)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        if self.context_summary.is_empty() {
            format!("Conversation:\n{history}\n\nUser: {user_input}\n\nContinue the scene:")
        } else {
            format!(
                "Previous context: {}\n\nConversation:\n{history}\n\nUser: {user_input}\n\nContinue the scene:",
                self.context_summary
            )
        }
    }

    /// Keep continuity cheap: once the transcript is long enough, the summary
    /// is the first two messages truncated and joined.
    pub fn refresh_summary(&mut self) {
        if self.messages.len() <= SUMMARY_TRIGGER {
            return;
        }
        let summary = self
            .messages
            .iter()
            .take(2)
            .map(|m| m.content.chars().take(SUMMARY_CHARS).collect::<String>())
            .collect::<Vec<_>>()
            .join(" ")
            + "...";
        self.context_summary = summary;
        if let Err(e) = self.store.set(keys::CHAT_CONTEXT, &self.context_summary) {
            log::warn!("failed to persist chat context: {e}");
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.context_summary.clear();
        if let Err(e) = self.store.remove(keys::CHAT_CONTEXT) {
            log::warn!("failed to clear chat context: {e}");
        }
    }

    /// Transcript rendered for the scenario archive: user turns prefixed
    /// with `> `.
    pub fn archive_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| {
                if m.message_type == MessageType::User {
                    format!("> {}", m.content)
                } else {
                    m.content.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(TURN_SEPARATOR)
    }

    /// Plain rendering for the clipboard.
    pub fn copy_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.clone())
            .collect::<Vec<_>>()
            .join(TURN_SEPARATOR)
    }
}
