//! OpenRouter-backed reply generator built on `rig`.

use async_trait::async_trait;
use rig::{
    agent::Agent,
    client::CompletionClient,
    completion::Prompt,
    providers::openrouter,
};
use tracing::{debug, info};

use crate::error::{IntakeError, Result};
use crate::reply::{REPLY_DISCLAIMER, ReplyGenerator};

pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

const MEDICAL_ASSISTANT_PREAMBLE: &str = r#"You are a helpful and knowledgeable medical assistant. Provide accurate, helpful general health information.

GUIDELINES:
- Keep answers short and practical (a few sentences or a short list)
- Never diagnose; suggest seeing a healthcare professional for anything serious
- For emergencies (chest pain, difficulty breathing, severe bleeding) tell the user to call emergency services
- If the user describes a symptom, invite them to describe it so you can ask follow-up questions
"#;

/// Free-form replies from an OpenRouter-hosted model
pub struct OpenRouterReplyGenerator {
    agent: Agent<openrouter::CompletionModel>,
    model: String,
}

impl OpenRouterReplyGenerator {
    pub fn new(api_key: &str, model: &str) -> Self {
        let client = openrouter::Client::new(api_key);
        let agent = client
            .agent(model)
            .preamble(MEDICAL_ASSISTANT_PREAMBLE)
            .build();
        info!(model = %model, "Configured OpenRouter reply generator");
        Self {
            agent,
            model: model.to_string(),
        }
    }

    /// Build from `OPENROUTER_API_KEY`
    pub fn from_env(model: &str) -> Result<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| IntakeError::Config("OPENROUTER_API_KEY not set".to_string()))?;
        Ok(Self::new(&api_key, model))
    }
}

#[async_trait]
impl ReplyGenerator for OpenRouterReplyGenerator {
    fn is_available(&self) -> bool {
        true
    }

    async fn generate(&self, text: &str) -> Result<String> {
        debug!(model = %self.model, "Requesting free-form reply");
        let raw = self
            .agent
            .prompt(text)
            .await
            .map_err(|e| IntakeError::ReplyFailed(e.to_string()))?;

        format_reply(&raw)
            .ok_or_else(|| IntakeError::ReplyFailed("model returned an empty reply".to_string()))
    }
}

/// Clean a raw model reply: drop any echoed prompt and make sure a disclaimer is present
pub(crate) fn format_reply(raw: &str) -> Option<String> {
    let mut reply = raw.trim();
    if let Some((_, tail)) = reply.rsplit_once("Assistant:") {
        reply = tail.trim();
    }
    if reply.is_empty() {
        return None;
    }

    if reply.contains("⚠️") || reply.contains("Important") {
        Some(reply.to_string())
    } else {
        Some(format!("{reply}\n\n{REPLY_DISCLAIMER}"))
    }
}
