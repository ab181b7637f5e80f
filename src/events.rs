// WHY: Typed lifecycle input for the engine; host event names are translated here and nowhere else

use serde::{Deserialize, Serialize};

use crate::stream::TurnKey;

/// Everything the engine reacts to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    TurnStarted { key: TurnKey },
    Token { key: TurnKey, text: String },
    TurnEnded { key: TurnKey },
    MessageFinalized { key: TurnKey },
    ConversationReset,
}

/// Raw event as delivered by a chat host
#[derive(Debug, Clone, Copy, Default)]
pub struct HostEvent<'a> {
    pub name: &'a str,
    pub message_id: Option<&'a str>,
    pub token: Option<&'a str>,
}

impl<'a> HostEvent<'a> {
    pub fn new(name: &'a str) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    pub fn with_message_id(mut self, id: &'a str) -> Self {
        self.message_id = Some(id);
        self
    }

    pub fn with_token(mut self, token: &'a str) -> Self {
        self.token = Some(token);
        self
    }

    /// Map a host event name onto a lifecycle event
    /// Unknown names and token events without text yield None.
    pub fn from_host_name(name: &str, message_id: Option<&str>, token: Option<&str>) -> Option<LifecycleEvent> {
        let key = message_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map_or(TurnKey::Live, TurnKey::message);

        let event = match name.trim().to_ascii_lowercase().as_str() {
            "generation_started" => LifecycleEvent::TurnStarted { key },
            "stream_token_received" | "smooth_stream_token_received" => LifecycleEvent::Token {
                key,
                text: token.filter(|t| !t.is_empty())?.to_string(),
            },
            "generation_ended" | "generation_stopped" => LifecycleEvent::TurnEnded { key },
            "message_received" | "character_message_rendered" => LifecycleEvent::MessageFinalized { key },
            "chat_changed" | "chat_id_changed" => LifecycleEvent::ConversationReset,
            _ => return None,
        };
        Some(event)
    }

    pub fn to_lifecycle(&self) -> Option<LifecycleEvent> {
        Self::from_host_name(self.name, self.message_id, self.token)
    }
}
