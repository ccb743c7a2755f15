use anyhow::Result;
use axum::{Router, routing::get};
use chatquiz::engine::QuizEngine;
use chatquiz::gateway::ConsoleGateway;
use chatquiz::model::types::QuizSettings;
use chatquiz::persistence::QuizStore;
use log::*;
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

async fn health_check() -> &'static str {
    "OK"
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    info!("Starting chatquiz engine");

    let store = QuizStore::new(
        env::var("QUESTIONS_FILE").unwrap_or_else(|_| "questions.json".into()),
        env::var("CHATS_FILE").unwrap_or_else(|_| "active_chats.json".into()),
    );
    let defaults = QuizSettings::default();
    let settings = QuizSettings {
        answer_window_secs: env_or("ANSWER_WINDOW_SECS", defaults.answer_window_secs),
        pacing_delay_ms: env_or("PACING_DELAY_MS", defaults.pacing_delay_ms),
        points_per_correct: env_or("POINTS_PER_CORRECT", defaults.points_per_correct),
    };

    // The console gateway stands in for a real platform adapter; a host
    // embedding this crate wires its transport to the returned handle.
    let (handle, engine_task) = QuizEngine::start(Arc::new(ConsoleGateway), store, settings).await;
    info!(
        "{} chats registered from previous runs",
        handle.registered_chats().await?.len()
    );

    let health_app = Router::new().route("/health", get(health_check));
    let health_listener = TcpListener::bind("0.0.0.0:8080").await?;

    tokio::select! {
        _ = engine_task => {},
        _ = axum::serve(health_listener, health_app) => {},
    }

    Ok(())
}
