use std::time::Duration;

use symptom_flow::{EngineConfig, IntakeError, MatchMode, Result, llm::DEFAULT_MODEL};

/// Service configuration, read from the environment
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub port: u16,
    pub knowledge_path: String,
    pub database_url: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub llm_model: String,
    pub reply_timeout: Duration,
    pub session_idle: Duration,
    pub precise_matching: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            knowledge_path: "data/medical_knowledge.json".to_string(),
            database_url: None,
            openrouter_api_key: None,
            llm_model: DEFAULT_MODEL.to_string(),
            reply_timeout: Duration::from_secs(30),
            session_idle: Duration::from_secs(3600),
            precise_matching: false,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Self {
            port: parse_or(var("PORT"), "PORT", defaults.port)?,
            knowledge_path: var("KNOWLEDGE_PATH").unwrap_or(defaults.knowledge_path),
            database_url: var("DATABASE_URL"),
            openrouter_api_key: var("OPENROUTER_API_KEY"),
            llm_model: var("LLM_MODEL").unwrap_or(defaults.llm_model),
            reply_timeout: Duration::from_secs(parse_or(
                var("REPLY_TIMEOUT_SECS"),
                "REPLY_TIMEOUT_SECS",
                defaults.reply_timeout.as_secs(),
            )?),
            session_idle: Duration::from_secs(parse_or(
                var("SESSION_IDLE_SECS"),
                "SESSION_IDLE_SECS",
                defaults.session_idle.as_secs(),
            )?),
            precise_matching: parse_or(
                var("PRECISE_MATCHING"),
                "PRECISE_MATCHING",
                defaults.precise_matching,
            )?,
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            reply_timeout: self.reply_timeout,
            match_mode: if self.precise_matching {
                MatchMode::WordBoundary
            } else {
                MatchMode::Substring
            },
        }
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| IntakeError::Config(format!("{key} has invalid value '{raw}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = ServiceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.engine_config().match_mode, MatchMode::Substring);
    }

    #[test]
    fn reads_overrides() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/intake"),
            ("REPLY_TIMEOUT_SECS", "5"),
            ("PRECISE_MATCHING", "true"),
            ("OPENROUTER_API_KEY", ""),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/intake"));
        assert_eq!(config.openrouter_api_key, None);
        assert_eq!(config.engine_config().reply_timeout, Duration::from_secs(5));
        assert_eq!(config.engine_config().match_mode, MatchMode::WordBoundary);
    }

    #[test]
    fn rejects_invalid_numbers() {
        let err = ServiceConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, IntakeError::Config(_)));
    }
}
