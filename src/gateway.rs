use crate::model::types::{ChatId, PollId, UserId};
use async_trait::async_trait;
use log::info;
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("gateway send failed: {0}")]
pub struct SendError(pub String);

/// Outbound half of the messaging platform. The engine consumes this
/// capability and never implements the transport itself; hosts wire in a
/// platform adapter (or [`ConsoleGateway`] for dry runs).
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<(), SendError>;

    /// Post a multiple-choice poll and return the platform-assigned poll id.
    async fn send_poll(
        &self,
        chat_id: ChatId,
        question: &str,
        options: &[String],
        correct: usize,
        open_secs: u64,
    ) -> Result<PollId, SendError>;
}

/// Inbound half: discrete events the transport delivers to the engine.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// Someone issued the join/start command in a chat.
    Join {
        chat_id: ChatId,
        title: String,
        requester_name: String,
    },
    /// A participant picked a poll option.
    PollAnswer {
        poll_id: PollId,
        user_id: UserId,
        display_name: String,
        option: usize,
    },
    /// The platform closed a poll on its own (e.g. the open window elapsed
    /// server-side). Routed through the same finalize guard as local timers.
    PollClosed { poll_id: PollId },
}

fn mint_poll_id() -> PollId {
    let id: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    PollId(id)
}

/// Stand-in transport that logs outbound traffic and mints poll ids locally,
/// so the engine can be driven end to end without a chat platform.
#[derive(Debug, Default)]
pub struct ConsoleGateway;

#[async_trait]
impl MessagingGateway for ConsoleGateway {
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<(), SendError> {
        info!("[chat {chat_id}] {text}");
        Ok(())
    }

    async fn send_poll(
        &self,
        chat_id: ChatId,
        question: &str,
        options: &[String],
        _correct: usize,
        open_secs: u64,
    ) -> Result<PollId, SendError> {
        let poll_id = mint_poll_id();
        info!("[chat {chat_id}] poll {poll_id} ({open_secs}s): {question} {options:?}");
        Ok(poll_id)
    }
}
