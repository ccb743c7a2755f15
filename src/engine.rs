use crate::gateway::{GatewayEvent, MessagingGateway, SendError};
use crate::model::chat::{ChatDirectory, ChatRegistration};
use crate::model::question::QuestionSet;
use crate::model::types::{ChatId, ParticipantKey, PollId, QuizSettings, UserId};
use crate::persistence::QuizStore;
use crate::scoreboard::{LeaderboardRow, ScoreBoard, render_leaderboard};
use crate::session::{Phase, SessionRegistry};
use crate::timeout::TimeoutScheduler;
use log::{debug, error, info, warn};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("quiz engine is not running")]
    NotRunning,
    #[error("no scoreboard entry for user {user} in chat {chat}")]
    UnknownParticipant { chat: ChatId, user: UserId },
    #[error(transparent)]
    Send(#[from] SendError),
}

/// Everything the engine does is an enqueued command; the single loop in
/// [`QuizEngine::run`] is the only place any of this state mutates.
enum Command {
    Event {
        event: GatewayEvent,
        done: oneshot::Sender<()>,
    },
    /// From the per-chat answer-window timer (or a platform poll-closed
    /// event): finalize if the poll is still live.
    FinalizePoll { poll_id: PollId },
    /// From the pacing timer after a finalize: post the next question.
    Advance {
        chat_id: ChatId,
        expected_index: usize,
    },
    RegisterChat {
        chat_id: ChatId,
        title: String,
        registered_by: String,
        reply: oneshot::Sender<()>,
    },
    StartQuiz {
        chat_id: ChatId,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    StartQuizAll {
        reply: oneshot::Sender<usize>,
    },
    ReloadQuestions {
        reply: oneshot::Sender<usize>,
    },
    RegisteredChats {
        reply: oneshot::Sender<Vec<(ChatId, ChatRegistration)>>,
    },
    Leaderboard {
        chat_id: ChatId,
        reply: oneshot::Sender<Vec<LeaderboardRow>>,
    },
}

/// Clonable public surface of the engine. Hosts (a CLI, a service wrapper,
/// an editor UI) and the transport adapter both talk to the loop through
/// this. Every call fails with [`EngineError::NotRunning`] once the engine
/// task has stopped.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .map_err(|_| EngineError::NotRunning)?;
        reply_rx.await.map_err(|_| EngineError::NotRunning)
    }

    /// Feed one inbound transport event to the engine. Resolves once the
    /// event has been fully processed; stale or duplicate events are
    /// swallowed silently, so this only errors when the engine is gone.
    pub async fn deliver(&self, event: GatewayEvent) -> Result<(), EngineError> {
        self.request(|done| Command::Event { event, done }).await
    }

    /// Register a chat without starting a quiz in it (host-driven
    /// registration; a join event does this implicitly).
    pub async fn register_chat(
        &self,
        chat_id: ChatId,
        title: String,
        registered_by: String,
    ) -> Result<(), EngineError> {
        self.request(|reply| Command::RegisterChat {
            chat_id,
            title,
            registered_by,
            reply,
        })
        .await
    }

    pub async fn start_quiz_in_chat(&self, chat_id: ChatId) -> Result<(), EngineError> {
        self.request(|reply| Command::StartQuiz { chat_id, reply })
            .await?
    }

    /// Start the quiz in every active registered chat; returns how many
    /// chats actually started. Per-chat failures are logged, not propagated.
    pub async fn start_quiz_in_all_active_chats(&self) -> Result<usize, EngineError> {
        self.request(|reply| Command::StartQuizAll { reply }).await
    }

    /// Re-read the question file and swap the active set. Returns the number
    /// of accepted questions.
    pub async fn reload_questions(&self) -> Result<usize, EngineError> {
        self.request(|reply| Command::ReloadQuestions { reply })
            .await
    }

    pub async fn registered_chats(&self) -> Result<Vec<(ChatId, ChatRegistration)>, EngineError> {
        self.request(|reply| Command::RegisteredChats { reply })
            .await
    }

    pub async fn leaderboard(&self, chat_id: ChatId) -> Result<Vec<LeaderboardRow>, EngineError> {
        self.request(|reply| Command::Leaderboard { chat_id, reply })
            .await
    }
}

/// Orchestrates sessions, scoring and the gateway for any number of chats,
/// each progressing through its own question sequence at its own pace.
pub struct QuizEngine {
    gateway: Arc<dyn MessagingGateway>,
    store: QuizStore,
    settings: QuizSettings,
    questions: QuestionSet,
    directory: ChatDirectory,
    scoreboard: ScoreBoard,
    registry: SessionRegistry,
    scheduler: TimeoutScheduler,
    commands: mpsc::UnboundedReceiver<Command>,
    command_tx: mpsc::UnboundedSender<Command>,
}

impl QuizEngine {
    /// Load persisted state and spawn the engine loop. The returned task
    /// runs until every [`EngineHandle`] clone has been dropped.
    pub async fn start(
        gateway: Arc<dyn MessagingGateway>,
        store: QuizStore,
        settings: QuizSettings,
    ) -> (EngineHandle, JoinHandle<()>) {
        let questions = store.load_questions().await;
        let directory = store.load_chats().await;
        let (command_tx, commands) = mpsc::unbounded_channel();

        let engine = QuizEngine {
            gateway,
            store,
            settings,
            questions,
            directory,
            scoreboard: ScoreBoard::default(),
            registry: SessionRegistry::default(),
            scheduler: TimeoutScheduler::default(),
            commands,
            command_tx: command_tx.clone(),
        };
        let handle = EngineHandle { tx: command_tx };
        let task = tokio::spawn(engine.run());
        (handle, task)
    }

    async fn run(mut self) {
        info!(
            "Quiz engine started: {} questions, {} registered chats",
            self.questions.len(),
            self.directory.len()
        );
        while let Some(command) = self.commands.recv().await {
            self.handle_command(command).await;
        }
        info!("Quiz engine stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Event { event, done } => {
                self.handle_event(event).await;
                let _ = done.send(());
            }
            Command::FinalizePoll { poll_id } => self.finalize(&poll_id).await,
            Command::Advance {
                chat_id,
                expected_index,
            } => {
                let still_pacing = self.registry.session(chat_id).is_some_and(|session| {
                    session.phase == Phase::Advancing && session.current_index == expected_index
                });
                if !still_pacing {
                    debug!("Dropping stale advance for chat {chat_id}");
                    return;
                }
                if let Err(e) = self.ask_question(chat_id).await {
                    warn!("Could not continue quiz in chat {chat_id}: {e}");
                }
            }
            Command::RegisterChat {
                chat_id,
                title,
                registered_by,
                reply,
            } => {
                self.register_chat(chat_id, title, registered_by).await;
                let _ = reply.send(());
            }
            Command::StartQuiz { chat_id, reply } => {
                let _ = reply.send(self.start_quiz(chat_id).await);
            }
            Command::StartQuizAll { reply } => {
                let chats: Vec<ChatId> = self.directory.active_chats().collect();
                let mut started = 0;
                for chat_id in chats {
                    match self.start_quiz(chat_id).await {
                        Ok(()) => started += 1,
                        Err(e) => warn!("Could not start quiz in chat {chat_id}: {e}"),
                    }
                }
                let _ = reply.send(started);
            }
            Command::ReloadQuestions { reply } => {
                self.questions = self.store.load_questions().await;
                let _ = reply.send(self.questions.len());
            }
            Command::RegisteredChats { reply } => {
                let mut chats: Vec<_> = self
                    .directory
                    .iter()
                    .map(|(id, reg)| (id, reg.clone()))
                    .collect();
                chats.sort_by_key(|(id, _)| *id);
                let _ = reply.send(chats);
            }
            Command::Leaderboard { chat_id, reply } => {
                let rows = self.scoreboard.leaderboard(
                    chat_id,
                    self.questions.len(),
                    self.settings.points_per_correct,
                );
                let _ = reply.send(rows);
            }
        }
    }

    async fn handle_event(&mut self, event: GatewayEvent) {
        match event {
            GatewayEvent::Join {
                chat_id,
                title,
                requester_name,
            } => {
                info!("Chat registered: {title} (id {chat_id}) by {requester_name}");
                self.register_chat(chat_id, title.clone(), requester_name)
                    .await;
                let welcome = format!(
                    "🎉 Welcome to Quiz Bot, {title}!\n\n\
                     📝 I'll automatically start the quiz now. Get ready!\n\
                     ✅ You're registered and ready to play."
                );
                if let Err(e) = self.gateway.send_message(chat_id, &welcome).await {
                    warn!("Could not welcome chat {chat_id}: {e}");
                    return;
                }
                if let Err(e) = self.start_quiz(chat_id).await {
                    warn!("Could not start quiz in chat {chat_id}: {e}");
                }
            }
            GatewayEvent::PollAnswer {
                poll_id,
                user_id,
                display_name,
                option,
            } => {
                self.record_answer(poll_id, user_id, display_name, option)
                    .await;
            }
            GatewayEvent::PollClosed { poll_id } => self.finalize(&poll_id).await,
        }
    }

    async fn register_chat(&mut self, chat_id: ChatId, title: String, registered_by: String) {
        self.directory.register(chat_id, title, registered_by);
        if let Err(e) = self.store.save_chats(&self.directory).await {
            warn!("Failed to save chat registry: {e:#}");
        }
    }

    /// Announce and post the current question. An existing session resumes
    /// at its stored index; a finished one re-posts its leaderboard.
    async fn start_quiz(&mut self, chat_id: ChatId) -> Result<(), EngineError> {
        self.gateway
            .send_message(chat_id, "📢 Quiz starting now! Get ready...")
            .await
            .inspect_err(|e| warn!("Could not announce quiz to chat {chat_id}: {e}"))?;
        self.registry.session_entry(chat_id);
        self.ask_question(chat_id).await
    }

    /// Post the question at the session's current index as a poll, or the
    /// final leaderboard once the index is past the end.
    async fn ask_question(&mut self, chat_id: ChatId) -> Result<(), EngineError> {
        let index = self.registry.session_entry(chat_id).current_index;
        let Some(question) = self.questions.at(index).cloned() else {
            return self.finish_quiz(chat_id).await;
        };

        let text = format!("Q{}: {}", index + 1, question.question);
        let poll_id = self
            .gateway
            .send_poll(
                chat_id,
                &text,
                &question.options,
                question.correct,
                self.settings.answer_window_secs,
            )
            .await
            .inspect_err(|e| warn!("Could not post question to chat {chat_id}: {e}"))?;
        info!("Posted poll {poll_id} in chat {chat_id} for question {}", index + 1);

        self.registry.begin_question(chat_id, poll_id.clone());
        let tx = self.command_tx.clone();
        self.scheduler
            .arm(chat_id, self.settings.answer_window(), move || {
                let _ = tx.send(Command::FinalizePoll { poll_id });
            });
        Ok(())
    }

    async fn finish_quiz(&mut self, chat_id: ChatId) -> Result<(), EngineError> {
        self.registry.session_entry(chat_id).phase = Phase::Complete;
        let rows = self.scoreboard.leaderboard(
            chat_id,
            self.questions.len(),
            self.settings.points_per_correct,
        );
        let text = if rows.is_empty() {
            "No scores yet in this group.".to_string()
        } else {
            render_leaderboard(&rows)
        };
        self.gateway
            .send_message(chat_id, &text)
            .await
            .inspect_err(|e| warn!("Could not send leaderboard to chat {chat_id}: {e}"))?;
        info!("Quiz complete in chat {chat_id}");
        Ok(())
    }

    async fn record_answer(
        &mut self,
        poll_id: PollId,
        user_id: UserId,
        display_name: String,
        option: usize,
    ) {
        let Some(chat_id) = self.registry.chat_for_poll(&poll_id) else {
            debug!("Ignoring answer for unknown or finalized poll {poll_id}");
            return;
        };
        let Some(session) = self.registry.session_mut(chat_id) else {
            return;
        };
        if session.active_poll.as_ref() != Some(&poll_id) {
            debug!("Ignoring answer for replaced poll {poll_id} in chat {chat_id}");
            return;
        }
        if !session.record_answer(user_id, option) {
            debug!("User {user_id} already answered poll {poll_id}, dropping");
            return;
        }
        self.scoreboard
            .ensure(ParticipantKey::new(chat_id, user_id), &display_name);

        // Early finalize once every participant ever seen in this chat has
        // answered. On a chat's first question that set is just the users
        // who have answered so far, so a lone first answer closes the poll
        // immediately; intentional, pinned by test.
        let everyone = self.scoreboard.users_in_chat(chat_id);
        let session = self
            .registry
            .session(chat_id)
            .expect("session exists, checked above");
        let all_answered = everyone
            .iter()
            .all(|user| session.answers.contains_key(user));
        if all_answered {
            info!("All known participants in chat {chat_id} answered poll {poll_id}, finalizing early");
            self.scheduler.cancel(chat_id);
            self.finalize(&poll_id).await;
        }
    }

    /// Score and notify everyone, advance the question index, and schedule
    /// the next question. Runs at most once per poll: the first caller to
    /// claim the poll id wins, and the losing trigger (timeout racing a full
    /// quorum, a stale timer racing a restart) finds nothing to claim.
    async fn finalize(&mut self, poll_id: &PollId) {
        let Some(chat_id) = self.registry.claim_finalize(poll_id) else {
            debug!("Poll {poll_id} already finalized or replaced, ignoring");
            return;
        };
        self.scheduler.cancel(chat_id);

        let Some(session) = self.registry.session_mut(chat_id) else {
            warn!("No session for chat {chat_id} while finalizing poll {poll_id}");
            return;
        };
        if session.active_poll.as_ref() != Some(poll_id) {
            warn!("Poll {poll_id} is no longer active in chat {chat_id}, ignoring");
            return;
        }

        let index = session.current_index;
        let answers = session.complete_question();
        let expected_index = session.current_index;

        if let Some(question) = self.questions.at(index).cloned() {
            let points = self.settings.points_per_correct;

            // Everyone ever seen in the chat gets processed; answerers
            // without a scoreboard entry are added first so the award
            // below cannot miss.
            for &user in answers.keys() {
                self.scoreboard
                    .ensure(ParticipantKey::new(chat_id, user), "Anonymous");
            }

            for user in self.scoreboard.users_in_chat(chat_id) {
                let key = ParticipantKey::new(chat_id, user);
                let dm = user.as_direct_chat();
                match answers.get(&user) {
                    Some(&choice) if choice == question.correct => {
                        match self.scoreboard.award(key, points) {
                            Ok(total) => {
                                self.notify(dm, &format!("✅ Correct! +{points} pts. Total: {total} pts"))
                                    .await;
                            }
                            Err(e) => error!("Failed to award user {user} in chat {chat_id}: {e}"),
                        }
                    }
                    Some(_) => {
                        let total = self.scoreboard.score_of(key);
                        self.notify(
                            dm,
                            &format!(
                                "❌ Wrong. Correct: {}\nTotal: {total} pts",
                                question.correct_option()
                            ),
                        )
                        .await;
                    }
                    None => {
                        self.notify(
                            dm,
                            &format!("⏰ Time's up — you skipped Q{}. No points.", index + 1),
                        )
                        .await;
                    }
                }
                self.scoreboard.bump_progress(key);
            }
        } else {
            // The question set shrank under a reload while this poll was
            // open. Nothing to score; still advance so the chat ends cleanly.
            warn!("Question {index} gone after reload, skipping scoring for chat {chat_id}");
        }

        info!("Finalized poll {poll_id} in chat {chat_id}, advancing to question {expected_index}");
        let tx = self.command_tx.clone();
        self.scheduler
            .arm(chat_id, self.settings.pacing_delay(), move || {
                let _ = tx.send(Command::Advance {
                    chat_id,
                    expected_index,
                });
            });
    }

    /// Best-effort private notice; a participant who cannot be messaged is
    /// skipped without affecting the rest of the finalize.
    async fn notify(&self, chat: ChatId, text: &str) {
        if let Err(e) = self.gateway.send_message(chat, text).await {
            debug!("Could not deliver notice to {chat}: {e}");
        }
    }
}
