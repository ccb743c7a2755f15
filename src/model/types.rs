use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// === Identifiers ===
// Chat and user ids come from the messaging platform and are opaque to the
// engine. Poll ids are platform-minted strings returned by send_poll.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PollId(pub String);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for PollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl UserId {
    /// The direct-message address for a user. The platform routes private
    /// chats under the same id namespace as group chats.
    pub fn as_direct_chat(self) -> ChatId {
        ChatId(self.0)
    }
}

// === Participant key ===
// Single composite key for all per-participant state (score, progress,
// display name, first-seen). Participants in different chats never share
// state even when the underlying user is the same.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticipantKey {
    pub chat: ChatId,
    pub user: UserId,
}

impl ParticipantKey {
    pub fn new(chat: ChatId, user: UserId) -> Self {
        Self { chat, user }
    }
}

// === Quiz Settings ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSettings {
    /// How long each poll stays open before the timeout finalizes it.
    pub answer_window_secs: u64,
    /// Gap between finalizing one question and posting the next.
    pub pacing_delay_ms: u64,
    /// Points awarded for a correct answer.
    pub points_per_correct: u32,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            answer_window_secs: 30,
            pacing_delay_ms: 800,
            points_per_correct: 10,
        }
    }
}

impl QuizSettings {
    pub fn answer_window(&self) -> Duration {
        Duration::from_secs(self.answer_window_secs)
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }
}
