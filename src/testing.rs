//! In-process gateway double for exercising the engine without a platform.

use crate::gateway::{MessagingGateway, SendError};
use crate::model::types::{ChatId, PollId};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub chat_id: ChatId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentPoll {
    pub chat_id: ChatId,
    pub poll_id: PollId,
    pub question: String,
    pub options: Vec<String>,
    pub correct: usize,
    pub open_secs: u64,
}

/// Records every outbound send and mints sequential poll ids. Individual
/// chats can be marked unreachable to exercise send-failure paths.
#[derive(Debug, Default)]
pub struct FakeGateway {
    next_poll: AtomicUsize,
    messages: Mutex<Vec<SentMessage>>,
    polls: Mutex<Vec<SentPoll>>,
    unreachable: Mutex<HashSet<ChatId>>,
    poll_failures: Mutex<HashSet<ChatId>>,
}

impl FakeGateway {
    pub fn messages(&self) -> Vec<SentMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn messages_to(&self, chat_id: ChatId) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .map(|m| m.text.clone())
            .collect()
    }

    pub fn polls(&self) -> Vec<SentPoll> {
        self.polls.lock().unwrap().clone()
    }

    pub fn polls_to(&self, chat_id: ChatId) -> Vec<SentPoll> {
        self.polls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.chat_id == chat_id)
            .cloned()
            .collect()
    }

    pub fn last_poll(&self) -> Option<SentPoll> {
        self.polls.lock().unwrap().last().cloned()
    }

    /// Make every message send to this chat fail until cleared.
    pub fn set_unreachable(&self, chat_id: ChatId) {
        self.unreachable.lock().unwrap().insert(chat_id);
    }

    pub fn set_reachable(&self, chat_id: ChatId) {
        self.unreachable.lock().unwrap().remove(&chat_id);
    }

    /// Make poll sends to this chat fail until cleared.
    pub fn fail_polls_to(&self, chat_id: ChatId) {
        self.poll_failures.lock().unwrap().insert(chat_id);
    }
}

#[async_trait]
impl MessagingGateway for FakeGateway {
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<(), SendError> {
        if self.unreachable.lock().unwrap().contains(&chat_id) {
            return Err(SendError(format!("chat {chat_id} is unreachable")));
        }
        self.messages.lock().unwrap().push(SentMessage {
            chat_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_poll(
        &self,
        chat_id: ChatId,
        question: &str,
        options: &[String],
        correct: usize,
        open_secs: u64,
    ) -> Result<PollId, SendError> {
        if self.poll_failures.lock().unwrap().contains(&chat_id) {
            return Err(SendError(format!("cannot post poll to chat {chat_id}")));
        }
        let poll_id = PollId(format!("poll-{}", self.next_poll.fetch_add(1, Ordering::SeqCst) + 1));
        self.polls.lock().unwrap().push(SentPoll {
            chat_id,
            poll_id: poll_id.clone(),
            question: question.to_string(),
            options: options.to_vec(),
            correct,
            open_secs,
        });
        Ok(poll_id)
    }
}
