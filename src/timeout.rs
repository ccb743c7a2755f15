use crate::model::types::ChatId;
use log::debug;
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::AbortHandle;

/// One cancellable delayed action per chat. Arming replaces whatever was
/// pending for that chat, so a chat never has both a question timeout and a
/// pacing delay in flight. Timers are process-local; none survive a restart.
///
/// An aborted task never runs its action. A timer that has already fired may
/// still race the cancel; whatever the action enqueues must be validated
/// downstream (the finalize path checks the poll index).
#[derive(Debug, Default)]
pub struct TimeoutScheduler {
    timers: HashMap<ChatId, AbortHandle>,
}

impl TimeoutScheduler {
    pub fn arm<F>(&mut self, chat_id: ChatId, delay: Duration, on_fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel(chat_id);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire();
        });
        self.timers.insert(chat_id, task.abort_handle());
    }

    /// Best-effort: a timer that already fired is gone and this is a no-op.
    pub fn cancel(&mut self, chat_id: ChatId) {
        if let Some(handle) = self.timers.remove(&chat_id) {
            debug!("Cancelling pending timer for chat {chat_id}");
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::time::{advance, sleep};

    #[tokio::test(start_paused = true)]
    async fn armed_timer_fires_once_after_delay() {
        let mut scheduler = TimeoutScheduler::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        scheduler.arm(ChatId(1), Duration::from_secs(30), move || {
            tx.send("fired").unwrap();
        });

        tokio::task::yield_now().await;
        advance(Duration::from_secs(29)).await;
        assert!(rx.try_recv().is_err());

        advance(Duration::from_secs(2)).await;
        sleep(Duration::from_millis(1)).await;
        assert_eq!(rx.try_recv().unwrap(), "fired");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let mut scheduler = TimeoutScheduler::default();
        let (tx, mut rx) = mpsc::unbounded_channel::<&str>();
        scheduler.arm(ChatId(1), Duration::from_secs(30), move || {
            tx.send("fired").unwrap();
        });
        scheduler.cancel(ChatId(1));

        advance(Duration::from_secs(60)).await;
        sleep(Duration::from_millis(1)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_the_previous_timer() {
        let mut scheduler = TimeoutScheduler::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tx1 = tx.clone();
        scheduler.arm(ChatId(1), Duration::from_secs(10), move || {
            tx1.send("first").unwrap();
        });
        scheduler.arm(ChatId(1), Duration::from_secs(10), move || {
            tx.send("second").unwrap();
        });

        tokio::task::yield_now().await;
        advance(Duration::from_secs(11)).await;
        sleep(Duration::from_millis(1)).await;
        assert_eq!(rx.try_recv().unwrap(), "second");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn timers_for_different_chats_are_independent() {
        let mut scheduler = TimeoutScheduler::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tx1 = tx.clone();
        scheduler.arm(ChatId(1), Duration::from_secs(10), move || {
            tx1.send(1).unwrap();
        });
        scheduler.arm(ChatId(2), Duration::from_secs(20), move || {
            tx.send(2).unwrap();
        });
        scheduler.cancel(ChatId(1));

        tokio::task::yield_now().await;
        advance(Duration::from_secs(21)).await;
        sleep(Duration::from_millis(1)).await;
        assert_eq!(rx.try_recv().unwrap(), 2);
        assert!(rx.try_recv().is_err());
    }
}
