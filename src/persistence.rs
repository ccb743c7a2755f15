use crate::model::chat::ChatDirectory;
use crate::model::question::QuestionSet;
use anyhow::{Context, Result};
use log::{info, warn};
use std::path::{Path, PathBuf};

/// File-backed storage for the question collection and the chat registry.
/// Loads are tolerant: a missing or malformed file yields an empty
/// collection so the engine always starts. Saves are best-effort snapshots.
#[derive(Debug, Clone)]
pub struct QuizStore {
    questions_path: PathBuf,
    chats_path: PathBuf,
}

impl QuizStore {
    pub fn new(questions_path: impl Into<PathBuf>, chats_path: impl Into<PathBuf>) -> Self {
        Self {
            questions_path: questions_path.into(),
            chats_path: chats_path.into(),
        }
    }

    pub async fn load_questions(&self) -> QuestionSet {
        let set = match read_file(&self.questions_path).await {
            Some(raw) => QuestionSet::from_json_str(&raw),
            None => QuestionSet::default(),
        };
        info!(
            "Loaded {} questions from {}",
            set.len(),
            self.questions_path.display()
        );
        set
    }

    pub async fn load_chats(&self) -> ChatDirectory {
        let Some(raw) = read_file(&self.chats_path).await else {
            return ChatDirectory::default();
        };
        match serde_json::from_str::<ChatDirectory>(&raw) {
            Ok(directory) => {
                info!("Loaded {} registered chats", directory.len());
                directory
            }
            Err(e) => {
                warn!("Chat registry file is malformed, starting empty: {e}");
                ChatDirectory::default()
            }
        }
    }

    pub async fn save_chats(&self, directory: &ChatDirectory) -> Result<()> {
        let body = serde_json::to_string_pretty(directory)?;
        tokio::fs::write(&self.chats_path, body)
            .await
            .with_context(|| format!("writing chat registry to {}", self.chats_path.display()))?;
        Ok(())
    }
}

async fn read_file(path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => Some(raw),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("{} not found, starting empty", path.display());
            None
        }
        Err(e) => {
            warn!("Failed to read {}: {e}", path.display());
            None
        }
    }
}
