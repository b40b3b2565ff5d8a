use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write;

const CONSULT_RESPONSE: &str = "Based on our conversation, I recommend consulting with a healthcare professional for personalized advice.";
const CONSULT_RECOMMENDATION: &str = "Consult with a healthcare professional";

const SUMMARY_HEADER: &str =
    "Based on your symptoms and our conversation, here's what I recommend:\n\n**Suggested Medications:**\n";

const DISCLAIMER: &str = "\n⚠️ **Important Disclaimer:**\n\
Please consult with a healthcare professional before taking any medications, especially if you:\n\
- Are pregnant or breastfeeding\n\
- Have existing medical conditions\n\
- Are taking other medications\n\
- Have allergies to medications";

/// One over-the-counter medication suggestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionEntry {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub notes: String,
}

impl SuggestionEntry {
    pub fn new(name: &str, dosage: &str, frequency: &str, notes: &str) -> Self {
        Self {
            name: name.to_string(),
            dosage: dosage.to_string(),
            frequency: frequency.to_string(),
            notes: notes.to_string(),
        }
    }
}

/// Static advice configured for a symptom
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymptomAdvice {
    pub medications: Vec<SuggestionEntry>,
    pub recommendations: Vec<String>,
}

/// Output of the suggestion phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestions {
    pub response: String,
    pub medications: Vec<SuggestionEntry>,
    pub recommendations: Vec<String>,
}

/// Maps a completed symptom list to medications, recommendations and a summary
#[derive(Debug, Clone, Default)]
pub struct SuggestionCatalog {
    advice: HashMap<String, SymptomAdvice>,
}

impl SuggestionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_advice(
        mut self,
        symptom: impl Into<String>,
        medications: Vec<SuggestionEntry>,
        recommendations: &[&str],
    ) -> Self {
        self.advice.insert(
            symptom.into(),
            SymptomAdvice {
                medications,
                recommendations: recommendations.iter().map(|r| r.to_string()).collect(),
            },
        );
        self
    }

    pub fn builtin() -> Self {
        Self::new()
            .with_advice(
                "headache",
                vec![
                    SuggestionEntry::new(
                        "Acetaminophen (Tylenol)",
                        "500-1000mg",
                        "Every 4-6 hours",
                        "For mild to moderate pain",
                    ),
                    SuggestionEntry::new(
                        "Ibuprofen (Advil)",
                        "200-400mg",
                        "Every 4-6 hours",
                        "Anti-inflammatory, take with food",
                    ),
                ],
                &["Rest in a dark room", "Apply cold compress", "Stay hydrated"],
            )
            .with_advice(
                "fever",
                vec![
                    SuggestionEntry::new(
                        "Acetaminophen (Tylenol)",
                        "500-1000mg",
                        "Every 4-6 hours",
                        "Reduces fever",
                    ),
                    SuggestionEntry::new(
                        "Ibuprofen (Advil)",
                        "200-400mg",
                        "Every 6-8 hours",
                        "If fever persists",
                    ),
                ],
                &["Rest", "Stay hydrated", "Use cool compresses", "Light clothing"],
            )
            .with_advice(
                "cough",
                vec![
                    SuggestionEntry::new(
                        "Dextromethorphan (Cough Suppressant)",
                        "15-30mg",
                        "Every 4-6 hours",
                        "For dry cough",
                    ),
                    SuggestionEntry::new(
                        "Guaifenesin (Expectorant)",
                        "200-400mg",
                        "Every 4 hours",
                        "For productive cough",
                    ),
                ],
                &["Stay hydrated", "Use humidifier", "Honey and warm liquids"],
            )
            .with_advice(
                "abdominal_pain",
                vec![
                    SuggestionEntry::new(
                        "Antacids (Tums, Rolaids)",
                        "As directed",
                        "When needed",
                        "For indigestion",
                    ),
                    SuggestionEntry::new(
                        "Simethicone (Gas-X)",
                        "40-125mg",
                        "After meals",
                        "For gas",
                    ),
                ],
                &["Avoid trigger foods", "Small meals", "Apply heat to abdomen"],
            )
    }

    pub fn advice_for(&self, symptom: &str) -> Option<&SymptomAdvice> {
        self.advice.get(symptom)
    }

    /// Accumulate advice for every symptom in order. Repeats are kept.
    ///
    /// When nothing is configured for any of the symptoms (including an empty
    /// list) the generic consult message is returned instead of a summary.
    pub fn generate(&self, symptoms: &[String]) -> Suggestions {
        let mut medications = Vec::new();
        let mut recommendations = Vec::new();

        for symptom in symptoms {
            if let Some(advice) = self.advice.get(symptom) {
                medications.extend(advice.medications.iter().cloned());
                recommendations.extend(advice.recommendations.iter().cloned());
            }
        }

        if medications.is_empty() && recommendations.is_empty() {
            return Suggestions {
                response: CONSULT_RESPONSE.to_string(),
                medications: Vec::new(),
                recommendations: vec![CONSULT_RECOMMENDATION.to_string()],
            };
        }

        Suggestions {
            response: render_summary(&medications, &recommendations),
            medications,
            recommendations,
        }
    }
}

fn render_summary(medications: &[SuggestionEntry], recommendations: &[String]) -> String {
    let mut response = String::from(SUMMARY_HEADER);

    // Writing into a String cannot fail
    for med in medications {
        let _ = write!(
            response,
            "\n• {}\n  - Dosage: {}\n  - Frequency: {}\n  - Note: {}\n",
            med.name, med.dosage, med.frequency, med.notes
        );
    }

    response.push_str("\n**Additional Recommendations:**\n");
    for rec in recommendations {
        let _ = writeln!(response, "• {}", rec);
    }

    response.push_str(DISCLAIMER);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symptoms(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_list_returns_consult_message() {
        let result = SuggestionCatalog::builtin().generate(&[]);
        assert_eq!(result.response, CONSULT_RESPONSE);
        assert!(result.medications.is_empty());
        assert_eq!(result.recommendations, vec![CONSULT_RECOMMENDATION.to_string()]);
    }

    #[test]
    fn unconfigured_symptoms_return_consult_message() {
        let result = SuggestionCatalog::builtin().generate(&symptoms(&["chest_pain"]));
        assert_eq!(result.response, CONSULT_RESPONSE);
        assert!(result.medications.is_empty());
    }

    #[test]
    fn summary_matches_golden_text() {
        let result = SuggestionCatalog::builtin().generate(&symptoms(&["headache"]));

        let expected = "Based on your symptoms and our conversation, here's what I recommend:\n\n\
**Suggested Medications:**\n\
\n• Acetaminophen (Tylenol)\n  - Dosage: 500-1000mg\n  - Frequency: Every 4-6 hours\n  - Note: For mild to moderate pain\n\
\n• Ibuprofen (Advil)\n  - Dosage: 200-400mg\n  - Frequency: Every 4-6 hours\n  - Note: Anti-inflammatory, take with food\n\
\n**Additional Recommendations:**\n\
• Rest in a dark room\n• Apply cold compress\n• Stay hydrated\n\
\n⚠️ **Important Disclaimer:**\n\
Please consult with a healthcare professional before taking any medications, especially if you:\n\
- Are pregnant or breastfeeding\n\
- Have existing medical conditions\n\
- Are taking other medications\n\
- Have allergies to medications";

        assert_eq!(result.response, expected);
        assert_eq!(result.medications.len(), 2);
    }

    #[test]
    fn advice_accumulates_in_order_without_dedup() {
        let result =
            SuggestionCatalog::builtin().generate(&symptoms(&["headache", "fever", "dizziness"]));

        let names: Vec<&str> = result.medications.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Acetaminophen (Tylenol)",
                "Ibuprofen (Advil)",
                "Acetaminophen (Tylenol)",
                "Ibuprofen (Advil)",
            ]
        );
        assert_eq!(
            result
                .recommendations
                .iter()
                .filter(|r| r.as_str() == "Stay hydrated")
                .count(),
            2
        );
        assert_eq!(result.recommendations.len(), 7);
    }
}
