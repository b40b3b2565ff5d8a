use dashmap::DashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::knowledge::KnowledgeSource;

/// How symptom keys and cause phrases are matched against a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Plain substring containment on the lower-cased message
    #[default]
    Substring,
    /// Whole-word matches only
    WordBoundary,
}

/// Classifies free text into known symptom keys
#[derive(Debug, Clone, Default)]
pub struct SymptomDetector {
    mode: MatchMode,
    // word-boundary patterns, compiled on first use per needle
    patterns: DashMap<String, Regex>,
}

impl SymptomDetector {
    pub fn new(mode: MatchMode) -> Self {
        Self {
            mode,
            patterns: DashMap::new(),
        }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Symptom keys mentioned in `message`, in knowledge-source order.
    ///
    /// A symptom matches when its key or any of its common causes occurs in
    /// the message. Empty messages never match.
    pub fn detect(&self, message: &str, knowledge: &dyn KnowledgeSource) -> Vec<String> {
        let message = message.to_lowercase();
        if message.trim().is_empty() {
            return Vec::new();
        }

        let detected: Vec<String> = knowledge
            .symptom_keys()
            .into_iter()
            .filter(|key| {
                if self.contains(&message, key) {
                    return true;
                }
                knowledge.symptom(key).is_some_and(|info| {
                    info.common_causes
                        .iter()
                        .any(|cause| self.contains(&message, &cause.to_lowercase()))
                })
            })
            .map(str::to_string)
            .collect();

        debug!(symptoms = ?detected, mode = ?self.mode, "Symptom detection finished");
        detected
    }

    fn contains(&self, message: &str, needle: &str) -> bool {
        if needle.is_empty() {
            return false;
        }
        match self.mode {
            MatchMode::Substring => message.contains(needle),
            MatchMode::WordBoundary => match self.word_pattern(needle) {
                Some(re) => re.is_match(message),
                None => message.contains(needle),
            },
        }
    }

    fn word_pattern(&self, needle: &str) -> Option<Regex> {
        if let Some(re) = self.patterns.get(needle) {
            return Some(re.value().clone());
        }

        let pattern = format!(r"\b{}\b", regex::escape(needle));
        match Regex::new(&pattern) {
            Ok(re) => {
                self.patterns.insert(needle.to_string(), re.clone());
                Some(re)
            }
            Err(e) => {
                warn!(needle = %needle, error = %e, "Falling back to substring match");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::MedicalKnowledgeBase;

    #[test]
    fn detects_in_knowledge_order() {
        let kb = MedicalKnowledgeBase::builtin();
        let detector = SymptomDetector::default();

        assert_eq!(
            detector.detect("I have a headache and a fever", &kb),
            vec!["headache".to_string(), "fever".to_string()]
        );
        assert_eq!(
            detector.detect("Fever first, then a HEADACHE", &kb),
            vec!["headache".to_string(), "fever".to_string()]
        );
    }

    #[test]
    fn matches_common_causes() {
        let kb = MedicalKnowledgeBase::builtin();
        let detector = SymptomDetector::default();

        assert_eq!(
            detector.detect("I think it's a migraine", &kb),
            vec!["headache".to_string()]
        );
        assert_eq!(
            detector.detect("probably food poisoning", &kb),
            vec!["abdominal_pain".to_string()]
        );
    }

    #[test]
    fn substring_mode_accepts_partial_words() {
        let kb = MedicalKnowledgeBase::builtin();

        // "flu" is a cause of cough and sits inside "fluids"
        assert_eq!(
            SymptomDetector::default().detect("drinking fluids all day", &kb),
            vec!["cough".to_string()]
        );
        assert!(
            SymptomDetector::new(MatchMode::WordBoundary)
                .detect("drinking fluids all day", &kb)
                .is_empty()
        );
    }

    #[test]
    fn word_boundary_mode_still_matches_whole_words() {
        let kb = MedicalKnowledgeBase::builtin();
        let detector = SymptomDetector::new(MatchMode::WordBoundary);
        assert_eq!(
            detector.detect("I caught the flu", &kb),
            vec!["cough".to_string()]
        );
    }

    #[test]
    fn word_patterns_are_compiled_once() {
        let kb = MedicalKnowledgeBase::builtin();
        let detector = SymptomDetector::new(MatchMode::WordBoundary);

        detector.detect("nothing to see here", &kb);
        let compiled = detector.patterns.len();
        assert!(compiled > 0);

        detector.detect("still nothing relevant", &kb);
        assert_eq!(detector.patterns.len(), compiled);
        assert!(SymptomDetector::default().patterns.is_empty());
    }

    #[test]
    fn nothing_matches_empty_input_or_empty_knowledge() {
        let detector = SymptomDetector::default();
        assert!(
            detector
                .detect("", &MedicalKnowledgeBase::builtin())
                .is_empty()
        );
        assert!(
            detector
                .detect("I have a headache", &MedicalKnowledgeBase::empty())
                .is_empty()
        );
        assert!(
            detector
                .detect("hello there", &MedicalKnowledgeBase::builtin())
                .is_empty()
        );
    }
}
