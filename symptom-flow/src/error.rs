use thiserror::Error;

/// Errors raised by the intake core and its collaborators
#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Failed to read knowledge source: {0}")]
    KnowledgeLoad(String),

    #[error("Invalid knowledge data: {0}")]
    KnowledgeFormat(String),

    #[error("Reply generation failed: {0}")]
    ReplyFailed(String),

    #[error("Reply generation timed out after {0} ms")]
    ReplyTimeout(u128),

    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, IntakeError>;
