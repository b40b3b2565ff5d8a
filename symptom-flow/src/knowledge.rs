//! Read-only medical knowledge consumed by the conversation engine.
//!
//! The engine only needs the ordered symptom table (for detection) but the
//! knowledge base also carries conditions, emergency signs and first-aid
//! notes that the HTTP layer exposes directly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{IntakeError, Result};
use crate::state::RiskLevel;

/// Symptoms that raise urgency to `Moderate` when contained in a reported symptom
const MODERATE_SYMPTOMS: [&str; 5] = [
    "fever",
    "persistent cough",
    "severe pain",
    "dizziness",
    "nausea",
];

/// Metadata for a single symptom key
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SymptomInfo {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub common_causes: Vec<String>,
    #[serde(default)]
    pub self_care: Vec<String>,
    #[serde(default)]
    pub when_to_see_doctor: Vec<String>,
}

/// Metadata for a medical condition. Fields vary per condition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionInfo {
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub treatment: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prevention: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub management: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub monitoring: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub complications: Vec<String>,
}

/// Care advice derived from an urgency assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareRecommendations {
    pub urgency_level: RiskLevel,
    pub immediate_actions: Vec<String>,
    pub self_care: Vec<String>,
    pub when_to_seek_help: Vec<String>,
}

/// Keyed, read-only source of symptom metadata
pub trait KnowledgeSource: Send + Sync {
    /// Look up a symptom by key (case-insensitive)
    fn symptom(&self, key: &str) -> Option<&SymptomInfo>;

    /// All symptom keys in source order
    fn symptom_keys(&self) -> Vec<&str>;

    fn emergency_signs(&self) -> &[String];

    /// Advisory urgency for a list of reported symptoms
    fn assess_urgency(&self, symptoms: &[String]) -> RiskLevel {
        let signs: Vec<String> = self
            .emergency_signs()
            .iter()
            .map(|sign| sign.to_lowercase())
            .collect();

        let lowered: Vec<String> = symptoms.iter().map(|s| s.to_lowercase()).collect();

        if lowered
            .iter()
            .any(|symptom| signs.iter().any(|sign| symptom.contains(sign.as_str())))
        {
            return RiskLevel::Emergency;
        }

        if lowered
            .iter()
            .any(|symptom| MODERATE_SYMPTOMS.iter().any(|m| symptom.contains(m)))
        {
            return RiskLevel::Moderate;
        }

        RiskLevel::Low
    }
}

/// In-memory knowledge base with an ordered symptom table
#[derive(Debug, Clone, Default)]
pub struct MedicalKnowledgeBase {
    symptoms: Vec<(String, SymptomInfo)>,
    conditions: HashMap<String, ConditionInfo>,
    emergency_signs: Vec<String>,
    first_aid: HashMap<String, String>,
}

impl MedicalKnowledgeBase {
    /// A knowledge base with no entries. Every turn against it takes the fallback path.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load from a JSON file, or YAML when the extension is `yaml`/`yml`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| IntakeError::KnowledgeLoad(format!("{}: {}", path.display(), e)))?;

        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );

        let value: Value = if is_yaml {
            serde_yaml::from_str(&raw).map_err(|e| IntakeError::KnowledgeFormat(e.to_string()))?
        } else {
            serde_json::from_str(&raw).map_err(|e| IntakeError::KnowledgeFormat(e.to_string()))?
        };

        let knowledge = Self::from_value(value)?;
        info!(
            path = %path.display(),
            symptoms = knowledge.symptoms.len(),
            conditions = knowledge.conditions.len(),
            "Loaded medical knowledge"
        );
        Ok(knowledge)
    }

    /// Load from `path`, falling back to the built-in data set on any failure
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path.as_ref()) {
            Ok(knowledge) => knowledge,
            Err(e) => {
                warn!(
                    path = %path.as_ref().display(),
                    error = %e,
                    "Using built-in medical knowledge"
                );
                Self::builtin()
            }
        }
    }

    /// Build from a parsed document. Symptom order follows the document order.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut root) = value else {
            return Err(IntakeError::KnowledgeFormat(
                "top level must be an object".to_string(),
            ));
        };

        let symptoms = match root.remove("symptoms") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(entries)) => entries
                .into_iter()
                .map(|(key, entry)| {
                    serde_json::from_value::<SymptomInfo>(entry)
                        .map(|info| (key.to_lowercase(), info))
                        .map_err(|e| IntakeError::KnowledgeFormat(format!("symptom {key}: {e}")))
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => {
                return Err(IntakeError::KnowledgeFormat(
                    "symptoms must be an object".to_string(),
                ));
            }
        };

        let conditions = take_field(&mut root, "conditions")?;
        let emergency_signs = take_field(&mut root, "emergency_signs")?;
        let first_aid = take_field(&mut root, "first_aid")?;

        Ok(Self {
            symptoms,
            conditions,
            emergency_signs,
            first_aid,
        })
    }

    pub fn builtin() -> Self {
        let symptoms = vec![
            symptom(
                "headache",
                "Pain or discomfort in the head or neck area",
                &["Tension", "Migraine", "Dehydration", "Stress", "Eye strain"],
                &[
                    "Rest in a dark room",
                    "Apply cold compress",
                    "Stay hydrated",
                    "Over-the-counter pain relievers",
                ],
                &[
                    "Severe headache",
                    "Headache with fever",
                    "Sudden onset",
                    "Headache after head injury",
                ],
            ),
            symptom(
                "fever",
                "Elevated body temperature above normal (98.6°F/37°C)",
                &[
                    "Viral infections",
                    "Bacterial infections",
                    "Inflammatory conditions",
                ],
                &[
                    "Rest",
                    "Stay hydrated",
                    "Cool compress",
                    "Over-the-counter fever reducers",
                ],
                &[
                    "Fever above 103°F (39.4°C)",
                    "Fever lasting more than 3 days",
                    "Fever with rash",
                ],
            ),
            symptom(
                "cough",
                "Reflex action to clear airways of mucus and irritants",
                &["Common cold", "Flu", "Allergies", "Asthma", "Smoking"],
                &[
                    "Stay hydrated",
                    "Use humidifier",
                    "Honey and warm liquids",
                    "Avoid irritants",
                ],
                &[
                    "Persistent cough",
                    "Cough with blood",
                    "Cough with chest pain",
                ],
            ),
            symptom(
                "chest_pain",
                "Pain or discomfort in the chest area",
                &["Heart conditions", "Muscle strain", "Acid reflux", "Anxiety"],
                &["Rest", "Avoid strenuous activity", "Monitor symptoms"],
                &[
                    "Severe chest pain",
                    "Pain radiating to arm/jaw",
                    "Shortness of breath",
                    "Call 911 immediately",
                ],
            ),
            symptom(
                "abdominal_pain",
                "Pain or discomfort in the stomach or belly area",
                &[
                    "Indigestion",
                    "Gas",
                    "Food poisoning",
                    "Appendicitis",
                    "Gallstones",
                ],
                &["Rest", "Avoid solid foods", "Stay hydrated", "Apply heat"],
                &[
                    "Severe pain",
                    "Pain with vomiting",
                    "Pain lasting more than 24 hours",
                ],
            ),
        ];

        let mut conditions = HashMap::new();
        conditions.insert(
            "common_cold".to_string(),
            ConditionInfo {
                symptoms: strings(&["Runny nose", "Sneezing", "Sore throat", "Cough", "Mild fever"]),
                duration: Some("7-10 days".to_string()),
                treatment: strings(&[
                    "Rest",
                    "Hydration",
                    "Saline nasal spray",
                    "Over-the-counter medications",
                ]),
                prevention: strings(&[
                    "Hand washing",
                    "Avoid close contact with sick people",
                    "Boost immune system",
                ]),
                ..Default::default()
            },
        );
        conditions.insert(
            "influenza".to_string(),
            ConditionInfo {
                symptoms: strings(&["High fever", "Body aches", "Fatigue", "Cough", "Headache"]),
                duration: Some("1-2 weeks".to_string()),
                treatment: strings(&[
                    "Rest",
                    "Hydration",
                    "Antiviral medications",
                    "Symptom relief",
                ]),
                prevention: strings(&[
                    "Annual flu vaccine",
                    "Hand hygiene",
                    "Avoid crowds during flu season",
                ]),
                ..Default::default()
            },
        );
        conditions.insert(
            "hypertension".to_string(),
            ConditionInfo {
                symptoms: strings(&[
                    "Often asymptomatic",
                    "Headaches",
                    "Shortness of breath",
                    "Nosebleeds",
                ]),
                management: strings(&[
                    "Low-sodium diet",
                    "Regular exercise",
                    "Weight management",
                    "Medication",
                ]),
                monitoring: strings(&[
                    "Regular blood pressure checks",
                    "Lifestyle modifications",
                    "Medical follow-up",
                ]),
                ..Default::default()
            },
        );
        conditions.insert(
            "diabetes".to_string(),
            ConditionInfo {
                symptoms: strings(&[
                    "Increased thirst",
                    "Frequent urination",
                    "Fatigue",
                    "Blurred vision",
                ]),
                management: strings(&[
                    "Blood sugar monitoring",
                    "Healthy diet",
                    "Regular exercise",
                    "Medication",
                ]),
                complications: strings(&[
                    "Heart disease",
                    "Kidney damage",
                    "Nerve damage",
                    "Eye problems",
                ]),
                ..Default::default()
            },
        );

        let emergency_signs = strings(&[
            "Severe chest pain",
            "Difficulty breathing",
            "Loss of consciousness",
            "Severe bleeding",
            "Signs of stroke (facial drooping, arm weakness, speech difficulty)",
            "Severe allergic reaction",
            "High fever with rash",
            "Severe abdominal pain",
        ]);

        let first_aid = [
            ("choking", "Perform Heimlich maneuver or back blows"),
            ("bleeding", "Apply direct pressure, elevate if possible"),
            ("burns", "Cool with water, don't use ice, cover loosely"),
            ("fainting", "Lay person flat, elevate legs, check breathing"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            symptoms,
            conditions,
            emergency_signs,
            first_aid,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.symptoms.is_empty()
    }

    pub fn condition(&self, key: &str) -> Option<&ConditionInfo> {
        self.conditions.get(&key.to_lowercase())
    }

    pub fn first_aid(&self, situation: &str) -> Option<&str> {
        self.first_aid
            .get(&situation.to_lowercase())
            .map(String::as_str)
    }

    /// Symptom keys whose key, description or causes contain `query`
    pub fn search_symptoms(&self, query: &str) -> Vec<String> {
        let query = query.to_lowercase();
        self.symptoms
            .iter()
            .filter(|(key, info)| {
                key.contains(&query)
                    || info.description.to_lowercase().contains(&query)
                    || info
                        .common_causes
                        .iter()
                        .any(|cause| cause.to_lowercase().contains(&query))
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn recommendations(&self, symptoms: &[String]) -> CareRecommendations {
        let urgency_level = self.assess_urgency(symptoms);
        debug!(urgency = %urgency_level, "Assessed urgency");

        let mut recommendations = CareRecommendations {
            urgency_level,
            immediate_actions: Vec::new(),
            self_care: Vec::new(),
            when_to_seek_help: Vec::new(),
        };

        match urgency_level {
            RiskLevel::Emergency => recommendations
                .immediate_actions
                .push("Call 911 or go to emergency room immediately".to_string()),
            RiskLevel::Moderate => {
                recommendations
                    .immediate_actions
                    .push("Schedule appointment with healthcare provider".to_string());
                recommendations.self_care =
                    strings(&["Rest", "Stay hydrated", "Monitor symptoms"]);
            }
            RiskLevel::Low => {
                recommendations.self_care = strings(&[
                    "Rest",
                    "Stay hydrated",
                    "Over-the-counter medications if appropriate",
                ]);
                recommendations
                    .when_to_seek_help
                    .push("If symptoms worsen or persist for more than a few days".to_string());
            }
        }

        recommendations
    }
}

impl KnowledgeSource for MedicalKnowledgeBase {
    fn symptom(&self, key: &str) -> Option<&SymptomInfo> {
        let key = key.to_lowercase();
        self.symptoms
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, info)| info)
    }

    fn symptom_keys(&self) -> Vec<&str> {
        self.symptoms.iter().map(|(k, _)| k.as_str()).collect()
    }

    fn emergency_signs(&self) -> &[String] {
        &self.emergency_signs
    }
}

fn take_field<T: serde::de::DeserializeOwned + Default>(
    root: &mut serde_json::Map<String, Value>,
    field: &str,
) -> Result<T> {
    match root.remove(field) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value)
            .map_err(|e| IntakeError::KnowledgeFormat(format!("{field}: {e}"))),
    }
}

fn symptom(
    key: &str,
    description: &str,
    causes: &[&str],
    self_care: &[&str],
    when_to_see_doctor: &[&str],
) -> (String, SymptomInfo) {
    (
        key.to_string(),
        SymptomInfo {
            description: description.to_string(),
            common_causes: strings(causes),
            self_care: strings(self_care),
            when_to_see_doctor: strings(when_to_see_doctor),
        },
    )
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_keeps_symptom_order() {
        let kb = MedicalKnowledgeBase::builtin();
        assert_eq!(
            kb.symptom_keys(),
            vec!["headache", "fever", "cough", "chest_pain", "abdominal_pain"]
        );
        assert!(kb.symptom("Headache").is_some());
        assert!(kb.symptom("dizziness").is_none());
    }

    #[test]
    fn urgency_levels() {
        let kb = MedicalKnowledgeBase::builtin();
        assert_eq!(
            kb.assess_urgency(&["severe chest pain".to_string()]),
            RiskLevel::Emergency
        );
        assert_eq!(
            kb.assess_urgency(&["headache".to_string(), "fever".to_string()]),
            RiskLevel::Moderate
        );
        assert_eq!(kb.assess_urgency(&["headache".to_string()]), RiskLevel::Low);
        assert_eq!(kb.assess_urgency(&[]), RiskLevel::Low);
    }

    #[test]
    fn recommendations_follow_urgency() {
        let kb = MedicalKnowledgeBase::builtin();

        let low = kb.recommendations(&["cough".to_string()]);
        assert_eq!(low.urgency_level, RiskLevel::Low);
        assert!(low.immediate_actions.is_empty());
        assert_eq!(low.when_to_seek_help.len(), 1);

        let moderate = kb.recommendations(&["dizziness".to_string()]);
        assert_eq!(
            moderate.immediate_actions,
            vec!["Schedule appointment with healthcare provider".to_string()]
        );

        let emergency = kb.recommendations(&["difficulty breathing".to_string()]);
        assert_eq!(emergency.urgency_level, RiskLevel::Emergency);
        assert!(emergency.self_care.is_empty());
    }

    #[test]
    fn search_matches_descriptions_and_causes() {
        let kb = MedicalKnowledgeBase::builtin();
        assert_eq!(kb.search_symptoms("migraine"), vec!["headache".to_string()]);
        assert_eq!(kb.search_symptoms("CHEST"), vec!["chest_pain".to_string()]);
        assert!(kb.search_symptoms("zzz").is_empty());
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let kb = MedicalKnowledgeBase::builtin();
        assert_eq!(kb.condition("Influenza").unwrap().duration.as_deref(), Some("1-2 weeks"));
        assert_eq!(
            kb.first_aid("BURNS"),
            Some("Cool with water, don't use ice, cover loosely")
        );
        assert!(kb.first_aid("sunburn").is_none());
    }

    #[test]
    fn load_json_preserves_document_order() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{
                "symptoms": {{
                    "rash": {{"description": "Skin irritation", "common_causes": ["Eczema"]}},
                    "nausea": {{"description": "Queasy", "common_causes": []}},
                    "backache": {{}}
                }},
                "emergency_signs": ["Fainting"]
            }}"#
        )
        .unwrap();

        let kb = MedicalKnowledgeBase::load(file.path()).unwrap();
        assert_eq!(kb.symptom_keys(), vec!["rash", "nausea", "backache"]);
        assert_eq!(kb.emergency_signs(), &["Fainting".to_string()]);
        assert!(kb.condition("diabetes").is_none());
    }

    #[test]
    fn load_yaml_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            "symptoms:\n  sore_throat:\n    description: Scratchy\n    common_causes: [Strep]\n  earache:\n    description: Ear pain\n"
        )
        .unwrap();

        let kb = MedicalKnowledgeBase::load(file.path()).unwrap();
        assert_eq!(kb.symptom_keys(), vec!["sore_throat", "earache"]);
        assert_eq!(
            kb.symptom("sore_throat").unwrap().common_causes,
            vec!["Strep".to_string()]
        );
    }

    #[test]
    fn invalid_documents_are_rejected() {
        assert!(matches!(
            MedicalKnowledgeBase::from_value(serde_json::json!([1, 2])),
            Err(IntakeError::KnowledgeFormat(_))
        ));
        assert!(matches!(
            MedicalKnowledgeBase::from_value(serde_json::json!({"symptoms": ["headache"]})),
            Err(IntakeError::KnowledgeFormat(_))
        ));
        assert!(matches!(
            MedicalKnowledgeBase::load("/definitely/not/here.json"),
            Err(IntakeError::KnowledgeLoad(_))
        ));
    }

    #[test]
    fn load_or_default_falls_back_to_builtin() {
        let kb = MedicalKnowledgeBase::load_or_default("/definitely/not/here.json");
        assert_eq!(kb.symptom_keys().len(), 5);
        assert!(MedicalKnowledgeBase::empty().is_empty());
    }
}
