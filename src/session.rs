use crate::model::types::{ChatId, PollId, UserId};
use std::collections::HashMap;

/// Lifecycle of one chat's quiz. `Advancing` covers the pacing gap between a
/// finalized poll and the next question; `Complete` is terminal until an
/// explicit restart, which resumes at the stored index rather than resetting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    QuestionActive,
    Advancing,
    Complete,
}

#[derive(Debug)]
pub struct ChatSession {
    pub chat_id: ChatId,
    pub current_index: usize,
    pub active_poll: Option<PollId>,
    pub answers: HashMap<UserId, usize>,
    pub phase: Phase,
}

impl ChatSession {
    fn new(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            current_index: 0,
            active_poll: None,
            answers: HashMap::new(),
            phase: Phase::Idle,
        }
    }

    /// Record a participant's choice. The first answer wins; a change of
    /// mind is dropped.
    pub fn record_answer(&mut self, user: UserId, option: usize) -> bool {
        if self.answers.contains_key(&user) {
            return false;
        }
        self.answers.insert(user, option);
        true
    }

    /// Close out the active poll: hand back the collected answers, advance
    /// the question index and enter the pacing gap.
    pub fn complete_question(&mut self) -> HashMap<UserId, usize> {
        self.active_poll = None;
        self.current_index += 1;
        self.phase = Phase::Advancing;
        std::mem::take(&mut self.answers)
    }
}

/// Single owner of all per-chat session state and of the poll routing table.
/// Every mutation goes through the engine's one command loop, which is what
/// keeps the unique-active-poll and single-finalize invariants.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<ChatId, ChatSession>,
    poll_index: HashMap<PollId, ChatId>,
}

impl SessionRegistry {
    /// Fetch or create the session for a chat. An existing session keeps its
    /// question index, so restarting a finished or paused quiz resumes it.
    pub fn session_entry(&mut self, chat_id: ChatId) -> &mut ChatSession {
        self.sessions
            .entry(chat_id)
            .or_insert_with(|| ChatSession::new(chat_id))
    }

    pub fn session(&self, chat_id: ChatId) -> Option<&ChatSession> {
        self.sessions.get(&chat_id)
    }

    pub fn session_mut(&mut self, chat_id: ChatId) -> Option<&mut ChatSession> {
        self.sessions.get_mut(&chat_id)
    }

    pub fn chat_for_poll(&self, poll_id: &PollId) -> Option<ChatId> {
        self.poll_index.get(poll_id).copied()
    }

    /// Make `poll_id` the chat's active poll. Any previous poll for the chat
    /// is unrouted first, so at most one index entry per chat exists.
    pub fn begin_question(&mut self, chat_id: ChatId, poll_id: PollId) {
        let session = self.session_entry(chat_id);
        if let Some(old) = session.active_poll.take() {
            self.poll_index.remove(&old);
        }
        let session = self.session_entry(chat_id);
        session.active_poll = Some(poll_id.clone());
        session.answers.clear();
        session.phase = Phase::QuestionActive;
        self.poll_index.insert(poll_id, chat_id);
    }

    /// At-most-once finalize guard, keyed by poll id: only the first caller
    /// for a given poll gets the owning chat back. A stale timeout firing
    /// after a quorum finalize (or after a fast restart replaced the poll)
    /// finds no entry and becomes a no-op.
    pub fn claim_finalize(&mut self, poll_id: &PollId) -> Option<ChatId> {
        self.poll_index.remove(poll_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poll(id: &str) -> PollId {
        PollId(id.to_string())
    }

    #[test]
    fn first_answer_wins() {
        let mut registry = SessionRegistry::default();
        registry.begin_question(ChatId(1), poll("p1"));
        let session = registry.session_mut(ChatId(1)).unwrap();
        assert!(session.record_answer(UserId(5), 2));
        assert!(!session.record_answer(UserId(5), 0));
        assert_eq!(session.answers[&UserId(5)], 2);
    }

    #[test]
    fn begin_question_unroutes_the_previous_poll() {
        let mut registry = SessionRegistry::default();
        registry.begin_question(ChatId(1), poll("p1"));
        registry.begin_question(ChatId(1), poll("p2"));
        assert_eq!(registry.chat_for_poll(&poll("p1")), None);
        assert_eq!(registry.chat_for_poll(&poll("p2")), Some(ChatId(1)));
        let session = registry.session(ChatId(1)).unwrap();
        assert_eq!(session.active_poll, Some(poll("p2")));
    }

    #[test]
    fn claim_finalize_succeeds_at_most_once() {
        let mut registry = SessionRegistry::default();
        registry.begin_question(ChatId(1), poll("p1"));
        assert_eq!(registry.claim_finalize(&poll("p1")), Some(ChatId(1)));
        assert_eq!(registry.claim_finalize(&poll("p1")), None);
    }

    #[test]
    fn complete_question_advances_and_clears() {
        let mut registry = SessionRegistry::default();
        registry.begin_question(ChatId(1), poll("p1"));
        let session = registry.session_mut(ChatId(1)).unwrap();
        session.record_answer(UserId(5), 1);
        let answers = session.complete_question();
        assert_eq!(answers[&UserId(5)], 1);
        assert_eq!(session.current_index, 1);
        assert_eq!(session.active_poll, None);
        assert!(session.answers.is_empty());
        assert_eq!(session.phase, Phase::Advancing);
    }

    #[test]
    fn session_entry_resumes_existing_state() {
        let mut registry = SessionRegistry::default();
        registry.begin_question(ChatId(1), poll("p1"));
        registry.session_mut(ChatId(1)).unwrap().complete_question();
        let session = registry.session_entry(ChatId(1));
        assert_eq!(session.current_index, 1);
    }

    #[test]
    fn sessions_are_per_chat() {
        let mut registry = SessionRegistry::default();
        registry.begin_question(ChatId(1), poll("p1"));
        registry.begin_question(ChatId(2), poll("p2"));
        assert_eq!(registry.chat_for_poll(&poll("p1")), Some(ChatId(1)));
        assert_eq!(registry.chat_for_poll(&poll("p2")), Some(ChatId(2)));
    }
}
