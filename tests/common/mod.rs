#![allow(dead_code)]

use chatquiz::engine::{EngineHandle, QuizEngine};
use chatquiz::gateway::GatewayEvent;
use chatquiz::model::types::{ChatId, PollId, QuizSettings, UserId};
use chatquiz::persistence::QuizStore;
use chatquiz::testing::{FakeGateway, SentPoll};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

static NEXT_STORE: AtomicUsize = AtomicUsize::new(0);

/// Engine wired to a [`FakeGateway`] over a scratch store. Timing-sensitive
/// tests should run with `#[tokio::test(start_paused = true)]` so the answer
/// window and pacing delay elapse in virtual time.
pub struct TestEngine {
    pub handle: EngineHandle,
    pub gateway: Arc<FakeGateway>,
    pub questions_path: PathBuf,
    pub chats_path: PathBuf,
    task: JoinHandle<()>,
}

impl TestEngine {
    pub async fn start(questions: serde_json::Value) -> Self {
        Self::start_with_chats(questions, None).await
    }

    /// Optionally seed the chat registry file before the engine loads it.
    pub async fn start_with_chats(
        questions: serde_json::Value,
        chats: Option<serde_json::Value>,
    ) -> Self {
        let n = NEXT_STORE.fetch_add(1, Ordering::SeqCst);
        let pid = std::process::id();
        let dir = std::env::temp_dir();
        let questions_path = dir.join(format!("chatquiz-it-{pid}-{n}-questions.json"));
        let chats_path = dir.join(format!("chatquiz-it-{pid}-{n}-chats.json"));
        std::fs::write(&questions_path, serde_json::to_string(&questions).unwrap()).unwrap();
        if let Some(chats) = chats {
            std::fs::write(&chats_path, serde_json::to_string(&chats).unwrap()).unwrap();
        }

        let gateway = Arc::new(FakeGateway::default());
        let store = QuizStore::new(&questions_path, &chats_path);
        let (handle, task) =
            QuizEngine::start(gateway.clone(), store, QuizSettings::default()).await;
        Self {
            handle,
            gateway,
            questions_path,
            chats_path,
            task,
        }
    }

    /// Abort the engine loop, so handle calls start failing with NotRunning.
    pub async fn stop(self) -> EngineHandle {
        self.task.abort();
        let _ = self.task.await;
        self.handle
    }

    pub async fn join(&self, chat_id: ChatId, title: &str, requester: &str) {
        self.handle
            .deliver(GatewayEvent::Join {
                chat_id,
                title: title.to_string(),
                requester_name: requester.to_string(),
            })
            .await
            .expect("engine should accept join event");
    }

    pub async fn answer(&self, poll_id: &PollId, user_id: UserId, name: &str, option: usize) {
        self.handle
            .deliver(GatewayEvent::PollAnswer {
                poll_id: poll_id.clone(),
                user_id,
                display_name: name.to_string(),
                option,
            })
            .await
            .expect("engine should accept answer event");
    }

    pub async fn close_poll(&self, poll_id: &PollId) {
        self.handle
            .deliver(GatewayEvent::PollClosed {
                poll_id: poll_id.clone(),
            })
            .await
            .expect("engine should accept poll-closed event");
    }

    /// Poll the gateway until `probe` yields, advancing (virtual) time.
    pub async fn wait_for<T>(&self, what: &str, mut probe: impl FnMut() -> Option<T>) -> T {
        for _ in 0..400 {
            if let Some(found) = probe() {
                return found;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
        panic!("Timed out waiting for {what}");
    }

    /// Wait until `count` polls have been posted to the chat; returns the latest.
    pub async fn wait_for_poll_count(&self, chat_id: ChatId, count: usize) -> SentPoll {
        let gateway = self.gateway.clone();
        self.wait_for(&format!("poll #{count} in chat {chat_id}"), move || {
            let polls = gateway.polls_to(chat_id);
            (polls.len() >= count).then(|| polls[count - 1].clone())
        })
        .await
    }

    pub async fn wait_for_message_containing(&self, chat_id: ChatId, needle: &str) -> String {
        let gateway = self.gateway.clone();
        let needle = needle.to_string();
        self.wait_for(&format!("message containing {needle:?}"), move || {
            gateway
                .messages_to(chat_id)
                .into_iter()
                .find(|m| m.contains(&needle))
        })
        .await
    }
}

/// Fixture used across the suites: Q1 expects option 1, Q2 option 0, Q3 option 2.
pub fn three_questions() -> serde_json::Value {
    serde_json::json!([
        {
            "question": "Which planet is known as the Red Planet?",
            "options": ["Venus", "Mars", "Jupiter"],
            "correct": 1
        },
        {
            "question": "What is 7 x 8?",
            "options": ["56", "54", "64"],
            "correct": 0
        },
        {
            "question": "Which ocean is the largest?",
            "options": ["Atlantic", "Indian", "Pacific"],
            "correct": 2
        },
    ])
}
