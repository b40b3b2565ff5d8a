pub mod config;
pub mod history;
pub mod models;
pub mod service;

pub use config::ServiceConfig;
pub use history::{ChatHistoryStore, ChatRecord, InMemoryChatHistory, PostgresChatHistory};
pub use models::*;
pub use service::{AppState, build_router, create_app, spawn_session_sweeper};
