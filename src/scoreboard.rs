use crate::engine::EngineError;
use crate::model::types::{ChatId, ParticipantKey, UserId};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct ParticipantRecord {
    pub display_name: String,
    pub score: u32,
    /// Questions this participant has been through (answered or skipped).
    pub progress: u32,
    pub first_seen: Instant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub display_name: String,
    pub score: u32,
    pub percentage: f64,
    pub elapsed_secs: u64,
}

/// Per-(chat, user) score and progress store, shared across all chats but
/// partitioned by the chat half of the key. Scores only change inside poll
/// finalization, never on raw answer receipt.
#[derive(Debug, Default)]
pub struct ScoreBoard {
    entries: HashMap<ParticipantKey, ParticipantRecord>,
}

impl ScoreBoard {
    /// Create the entry with a zero score if absent. The first display name
    /// seen for a participant sticks.
    pub fn ensure(&mut self, key: ParticipantKey, display_name: &str) -> &ParticipantRecord {
        self.entries.entry(key).or_insert_with(|| ParticipantRecord {
            display_name: display_name.to_string(),
            score: 0,
            progress: 0,
            first_seen: Instant::now(),
        })
    }

    /// Add points to an existing participant and return the new total.
    pub fn award(&mut self, key: ParticipantKey, points: u32) -> Result<u32, EngineError> {
        let record = self
            .entries
            .get_mut(&key)
            .ok_or(EngineError::UnknownParticipant {
                chat: key.chat,
                user: key.user,
            })?;
        record.score += points;
        Ok(record.score)
    }

    pub fn bump_progress(&mut self, key: ParticipantKey) {
        if let Some(record) = self.entries.get_mut(&key) {
            record.progress += 1;
        }
    }

    pub fn get(&self, key: ParticipantKey) -> Option<&ParticipantRecord> {
        self.entries.get(&key)
    }

    pub fn score_of(&self, key: ParticipantKey) -> u32 {
        self.entries.get(&key).map(|r| r.score).unwrap_or(0)
    }

    /// Every user ever seen in this chat, in stable id order.
    pub fn users_in_chat(&self, chat: ChatId) -> Vec<UserId> {
        let mut users: Vec<UserId> = self
            .entries
            .keys()
            .filter(|k| k.chat == chat)
            .map(|k| k.user)
            .collect();
        users.sort();
        users
    }

    /// Rank this chat's participants by score (descending), breaking ties by
    /// elapsed time since first seen (ascending): at equal score, the
    /// participant observed for a shorter time ranks higher.
    pub fn leaderboard(
        &self,
        chat: ChatId,
        total_questions: usize,
        points_per_correct: u32,
    ) -> Vec<LeaderboardRow> {
        let now = Instant::now();
        // Elapsed times are snapshotted once so the sort sees a fixed order.
        let mut entries: Vec<(&ParticipantRecord, Duration)> = self
            .entries
            .iter()
            .filter(|(key, _)| key.chat == chat)
            .map(|(_, record)| (record, now.saturating_duration_since(record.first_seen)))
            .collect();
        entries.sort_by(|(a, elapsed_a), (b, elapsed_b)| {
            b.score.cmp(&a.score).then(elapsed_a.cmp(elapsed_b))
        });

        let max_score = total_questions as f64 * f64::from(points_per_correct);
        entries
            .into_iter()
            .enumerate()
            .map(|(i, (record, elapsed))| LeaderboardRow {
                rank: i + 1,
                display_name: record.display_name.clone(),
                score: record.score,
                percentage: if max_score > 0.0 {
                    f64::from(record.score) / max_score * 100.0
                } else {
                    0.0
                },
                elapsed_secs: elapsed.as_secs(),
            })
            .collect()
    }
}

/// Chat-facing leaderboard text. The caller handles the no-participants case.
pub fn render_leaderboard(rows: &[LeaderboardRow]) -> String {
    let mut lines = vec![format!("🏆 Group Leaderboard ({} players):\n", rows.len())];
    for row in rows {
        let (m, s) = (row.elapsed_secs / 60, row.elapsed_secs % 60);
        lines.push(format!(
            "{}. {} — {} pts ({:.0}%) | ⏱ {m}m{s}s",
            row.rank, row.display_name, row.score, row.percentage,
        ));
    }
    lines.join("\n")
}
