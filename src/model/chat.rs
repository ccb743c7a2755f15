use crate::model::types::ChatId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRegistration {
    pub title: String,
    pub active: bool,
    pub registered_by: String,
    /// Unix timestamp of the registration event.
    pub registered_at: u64,
}

pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Durable mapping of every chat that has ever registered. The engine only
/// ever upserts entries; `active` is carried for external management and
/// honored by start-all, but never toggled here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatDirectory {
    chats: HashMap<ChatId, ChatRegistration>,
}

impl ChatDirectory {
    pub fn register(&mut self, chat_id: ChatId, title: String, registered_by: String) {
        self.chats.insert(
            chat_id,
            ChatRegistration {
                title,
                active: true,
                registered_by,
                registered_at: epoch_secs(),
            },
        );
    }

    pub fn get(&self, chat_id: ChatId) -> Option<&ChatRegistration> {
        self.chats.get(&chat_id)
    }

    pub fn active_chats(&self) -> impl Iterator<Item = ChatId> + '_ {
        self.chats
            .iter()
            .filter(|(_, reg)| reg.active)
            .map(|(id, _)| *id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChatId, &ChatRegistration)> {
        self.chats.iter().map(|(id, reg)| (*id, reg))
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }
}
