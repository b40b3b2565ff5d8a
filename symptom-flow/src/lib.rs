pub mod detector;
pub mod engine;
pub mod error;
pub mod knowledge;
#[cfg(feature = "rig")]
pub mod llm;
pub mod questions;
pub mod reply;
pub mod state;
pub mod storage;
pub mod suggestions;

// Re-export commonly used types
pub use detector::{MatchMode, SymptomDetector};
pub use engine::{
    ConversationEngine, ConversationEngineBuilder, ConversationTurn, EngineConfig, RESET_KEYWORDS,
};
pub use error::{IntakeError, Result};
pub use knowledge::{
    CareRecommendations, ConditionInfo, KnowledgeSource, MedicalKnowledgeBase, SymptomInfo,
};
pub use questions::{FollowUp, QuestionCatalog, QuestionSet};
pub use reply::{
    FallbackReplyGenerator, NoReplyGenerator, REPLY_DISCLAIMER, ReplyGenerator,
    RuleBasedReplyGenerator, fallback_reply,
};
pub use state::{ConversationState, RiskLevel, Stage};
pub use storage::{InMemorySessionStore, SessionStore, SharedState};
pub use suggestions::{SuggestionCatalog, SuggestionEntry, Suggestions, SymptomAdvice};
