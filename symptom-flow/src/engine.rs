//! The conversation engine: one `process` call per user message.
//!
//! Turn handling per stage:
//! * `Initial` - detect symptoms; on a match start gathering, otherwise reply free-form.
//! * `Gathering` - record the answer and ask the next follow-up, or move to suggestions
//!   once the active symptom's questions are exhausted.
//! * `Suggesting` - a reset keyword starts over, anything else gets a free-form reply.
//!
//! The session lock is held for the whole turn, so turns of one session never interleave.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{
    detector::{MatchMode, SymptomDetector},
    error::{IntakeError, Result},
    knowledge::KnowledgeSource,
    questions::QuestionCatalog,
    reply::{NoReplyGenerator, ReplyGenerator, fallback_reply},
    state::{ConversationState, Stage},
    storage::SessionStore,
    suggestions::{SuggestionCatalog, SuggestionEntry},
};

/// Phrases that restart the intake once suggestions were given
pub const RESET_KEYWORDS: [&str; 5] = ["new", "another", "different", "reset", "start over"];

const RESET_RESPONSE: &str = "Okay, I'm ready to help you with a new symptom or health concern. What would you like to ask about?";

/// Tunables for the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound for a single free-form reply
    pub reply_timeout: Duration,
    pub match_mode: MatchMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_secs(30),
            match_mode: MatchMode::Substring,
        }
    }
}

/// Result of a single turn. This is the engine's only external contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub response: String,
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medications: Option<Vec<SuggestionEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<String>>,
}

impl ConversationTurn {
    fn reply(response: String, stage: Stage) -> Self {
        Self {
            response,
            stage,
            next_question: None,
            medications: None,
            recommendations: None,
        }
    }
}

/// Per-session symptom intake controller
pub struct ConversationEngine {
    store: Arc<dyn SessionStore>,
    knowledge: Arc<dyn KnowledgeSource>,
    replies: Arc<dyn ReplyGenerator>,
    questions: QuestionCatalog,
    suggestions: SuggestionCatalog,
    detector: SymptomDetector,
    config: EngineConfig,
}

impl ConversationEngine {
    pub fn builder(
        store: Arc<dyn SessionStore>,
        knowledge: Arc<dyn KnowledgeSource>,
    ) -> ConversationEngineBuilder {
        ConversationEngineBuilder::new(store, knowledge)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn knowledge(&self) -> &Arc<dyn KnowledgeSource> {
        &self.knowledge
    }

    /// Symptom keys found in `message`
    pub fn detect_symptoms(&self, message: &str) -> Vec<String> {
        self.detector.detect(message, self.knowledge.as_ref())
    }

    /// Handle one user message for `session_id`.
    ///
    /// Collaborator failures never surface here; only a session store error can.
    pub async fn process(&self, session_id: &str, message: &str) -> Result<ConversationTurn> {
        let shared = self.store.acquire(session_id).await?;
        let mut state = shared.lock().await;
        state.touch();

        let previous = state.stage;
        let turn = match previous {
            Stage::Initial => self.handle_initial(&mut state, message).await,
            Stage::Gathering => self.handle_gathering(&mut state, message),
            Stage::Suggesting => self.handle_suggesting(&mut state, message).await,
        };

        info!(
            session_id = %session_id,
            from = %previous,
            to = %turn.stage,
            question_index = state.question_index,
            "Processed message"
        );

        Ok(turn)
    }

    /// Force a session back to `Initial`. Unknown sessions are left uncreated.
    pub async fn reset(&self, session_id: &str) -> Result<()> {
        let Some(shared) = self.store.get(session_id).await? else {
            debug!(session_id = %session_id, "Reset of unknown session ignored");
            return Ok(());
        };
        shared.lock().await.reset();
        info!(session_id = %session_id, "Session reset");
        Ok(())
    }

    pub async fn snapshot(&self, session_id: &str) -> Result<Option<ConversationState>> {
        self.store.snapshot(session_id).await
    }

    /// Eviction hook for retention policies owned by the caller
    pub async fn evict(&self, session_id: &str) -> Result<bool> {
        self.store.evict(session_id).await
    }

    pub async fn sweep_idle(&self, max_idle: Duration) -> Result<usize> {
        self.store.sweep_idle(max_idle).await
    }

    /// A symptom whose question set is empty goes straight to `Suggesting`.
    /// The built-in catalog never does this; only custom catalogs reach that path.
    async fn handle_initial(
        &self,
        state: &mut ConversationState,
        message: &str,
    ) -> ConversationTurn {
        let detected = self.detect_symptoms(message);
        let Some(first) = detected.first().cloned() else {
            debug!("No symptom detected, replying free-form");
            return ConversationTurn::reply(self.general_reply(message).await, Stage::Initial);
        };

        state.risk_level = self.knowledge.assess_urgency(&detected);
        state.symptoms = detected;
        state.symptom_details.insert(first.clone(), message.to_string());

        match self.questions.first_follow_up(&first) {
            Some(follow_up) => {
                state.stage = Stage::Gathering;
                state.question_index = 1;
                debug!(symptom = %first, risk = %state.risk_level, "Started gathering");
                ConversationTurn {
                    response: follow_up.response,
                    stage: Stage::Gathering,
                    next_question: Some(follow_up.question),
                    medications: None,
                    recommendations: None,
                }
            }
            None => {
                warn!(symptom = %first, "No follow-up questions configured");
                self.finish_gathering(state)
            }
        }
    }

    fn handle_gathering(&self, state: &mut ConversationState, message: &str) -> ConversationTurn {
        let Some(active) = state.active_symptom().map(str::to_string) else {
            warn!("Gathering without an active symptom");
            return self.finish_gathering(state);
        };

        state
            .symptom_details
            .insert(active.clone(), message.to_string());

        match self.questions.next_follow_up(&active, state.question_index) {
            Some(follow_up) => {
                state.question_index += 1;
                ConversationTurn {
                    response: follow_up.response,
                    stage: Stage::Gathering,
                    next_question: Some(follow_up.question),
                    medications: None,
                    recommendations: None,
                }
            }
            None => self.finish_gathering(state),
        }
    }

    fn finish_gathering(&self, state: &mut ConversationState) -> ConversationTurn {
        state.stage = Stage::Suggesting;
        let suggestions = self.suggestions.generate(&state.symptoms);
        debug!(
            medications = suggestions.medications.len(),
            recommendations = suggestions.recommendations.len(),
            "Generated suggestions"
        );
        ConversationTurn {
            response: suggestions.response,
            stage: Stage::Suggesting,
            next_question: None,
            medications: Some(suggestions.medications),
            recommendations: Some(suggestions.recommendations),
        }
    }

    async fn handle_suggesting(
        &self,
        state: &mut ConversationState,
        message: &str,
    ) -> ConversationTurn {
        let lowered = message.to_lowercase();
        if RESET_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
            state.reset();
            return ConversationTurn::reply(RESET_RESPONSE.to_string(), Stage::Initial);
        }

        ConversationTurn::reply(self.general_reply(message).await, Stage::Suggesting)
    }

    async fn general_reply(&self, message: &str) -> String {
        if !self.replies.is_available() {
            return fallback_reply(message);
        }

        let outcome = tokio::time::timeout(self.config.reply_timeout, self.replies.generate(message))
            .await
            .unwrap_or_else(|_| {
                Err(IntakeError::ReplyTimeout(
                    self.config.reply_timeout.as_millis(),
                ))
            });

        match outcome {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Reply generator failed, using fallback");
                fallback_reply(message)
            }
        }
    }
}

/// Builder for creating engines
pub struct ConversationEngineBuilder {
    store: Arc<dyn SessionStore>,
    knowledge: Arc<dyn KnowledgeSource>,
    replies: Arc<dyn ReplyGenerator>,
    questions: QuestionCatalog,
    suggestions: SuggestionCatalog,
    config: EngineConfig,
}

impl ConversationEngineBuilder {
    pub fn new(store: Arc<dyn SessionStore>, knowledge: Arc<dyn KnowledgeSource>) -> Self {
        Self {
            store,
            knowledge,
            replies: Arc::new(NoReplyGenerator),
            questions: QuestionCatalog::builtin(),
            suggestions: SuggestionCatalog::builtin(),
            config: EngineConfig::default(),
        }
    }

    pub fn reply_generator(mut self, replies: Arc<dyn ReplyGenerator>) -> Self {
        self.replies = replies;
        self
    }

    pub fn questions(mut self, questions: QuestionCatalog) -> Self {
        self.questions = questions;
        self
    }

    pub fn suggestions(mut self, suggestions: SuggestionCatalog) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> ConversationEngine {
        ConversationEngine {
            store: self.store,
            knowledge: self.knowledge,
            replies: self.replies,
            questions: self.questions,
            suggestions: self.suggestions,
            detector: SymptomDetector::new(self.config.match_mode),
            config: self.config,
        }
    }
}
