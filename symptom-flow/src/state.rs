use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Coarse phase of a session's dialogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Stage {
    /// Waiting for a symptom report
    #[default]
    #[serde(rename = "initial")]
    Initial,
    /// Walking through the follow-up questions of the active symptom
    #[serde(rename = "gathering_symptoms")]
    Gathering,
    /// Suggestions have been delivered
    #[serde(rename = "suggesting")]
    Suggesting,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Initial => "initial",
            Stage::Gathering => "gathering_symptoms",
            Stage::Suggesting => "suggesting",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advisory urgency level. Recorded on the state, never consulted by transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Moderate,
    Emergency,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::Emergency => "emergency",
        };
        f.write_str(label)
    }
}

/// Per-session dialogue state, owned by the session store and written only by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub stage: Stage,
    /// Detected symptom keys; the last one is the active symptom
    pub symptoms: Vec<String>,
    /// Raw user text keyed by symptom
    pub symptom_details: HashMap<String, String>,
    /// Cursor into the active symptom's question list
    pub question_index: usize,
    pub risk_level: RiskLevel,
    pub last_activity: DateTime<Utc>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self {
            stage: Stage::Initial,
            symptoms: Vec::new(),
            symptom_details: HashMap::new(),
            question_index: 0,
            risk_level: RiskLevel::Low,
            last_activity: Utc::now(),
        }
    }

    /// The symptom currently being interviewed
    pub fn active_symptom(&self) -> Option<&str> {
        self.symptoms.last().map(String::as_str)
    }

    /// Return to fresh `Initial` defaults, keeping the activity timestamp
    pub fn reset(&mut self) {
        let last_activity = self.last_activity;
        *self = Self::new();
        self.last_activity = last_activity;
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_serializes_to_wire_names() {
        assert_eq!(
            serde_json::to_value(Stage::Gathering).unwrap(),
            serde_json::json!("gathering_symptoms")
        );
        assert_eq!(Stage::Suggesting.to_string(), "suggesting");
        assert_eq!(Stage::default(), Stage::Initial);
    }

    #[test]
    fn reset_clears_everything_but_activity() {
        let mut state = ConversationState::new();
        state.stage = Stage::Suggesting;
        state.symptoms.push("headache".to_string());
        state
            .symptom_details
            .insert("headache".to_string(), "bad".to_string());
        state.question_index = 4;
        state.risk_level = RiskLevel::Moderate;
        let stamp = state.last_activity;

        state.reset();

        assert_eq!(state.stage, Stage::Initial);
        assert!(state.symptoms.is_empty());
        assert!(state.symptom_details.is_empty());
        assert_eq!(state.question_index, 0);
        assert_eq!(state.risk_level, RiskLevel::Low);
        assert_eq!(state.last_activity, stamp);
        assert_eq!(state.active_symptom(), None);
    }
}
