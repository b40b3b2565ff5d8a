use std::collections::HashMap;

const FIRST_PROMPT_SUFFIX: &str = "**Please respond with your answer.**";
const NEXT_PROMPT_SUFFIX: &str = "**Please provide your answer.**";

/// Introductory sentence plus the ordered follow-up questions for a symptom
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionSet {
    pub intro: String,
    pub questions: Vec<String>,
}

impl QuestionSet {
    pub fn new(intro: impl Into<String>, questions: &[&str]) -> Self {
        Self {
            intro: intro.into(),
            questions: questions.iter().map(|q| q.to_string()).collect(),
        }
    }

    pub fn question(&self, index: usize) -> Option<&str> {
        self.questions.get(index).map(String::as_str)
    }
}

/// A formatted follow-up ready to send to the user
#[derive(Debug, Clone, PartialEq)]
pub struct FollowUp {
    pub response: String,
    pub question: String,
}

/// Static question tables keyed by symptom, with a default set for everything else
#[derive(Debug, Clone)]
pub struct QuestionCatalog {
    sets: HashMap<String, QuestionSet>,
    default_set: QuestionSet,
    max_overrides: HashMap<String, usize>,
}

impl QuestionCatalog {
    pub fn new(default_set: QuestionSet) -> Self {
        Self {
            sets: HashMap::new(),
            default_set,
            max_overrides: HashMap::new(),
        }
    }

    pub fn with_set(mut self, symptom: impl Into<String>, set: QuestionSet) -> Self {
        self.sets.insert(symptom.into(), set);
        self
    }

    /// Cap the number of questions asked for `symptom`
    pub fn with_max_questions(mut self, symptom: impl Into<String>, max: usize) -> Self {
        self.max_overrides.insert(symptom.into(), max);
        self
    }

    pub fn builtin() -> Self {
        Self::new(QuestionSet::new(
            "Thank you for describing your symptoms. Let me ask a few questions.",
            &[
                "How long have you been experiencing this?",
                "How severe would you rate it on a scale of 1-10?",
                "Have you tried any treatments yet?",
                "Are there any other symptoms accompanying this?",
            ],
        ))
        .with_set(
            "headache",
            QuestionSet::new(
                "Thank you for describing your headache. Let me ask you a few questions to better understand your situation.",
                &[
                    "How long have you been experiencing this headache? (hours/days)",
                    "Can you rate the pain on a scale of 1-10?",
                    "Does anything seem to trigger or worsen it?",
                    "Have you tried any pain relievers already?",
                ],
            ),
        )
        .with_set(
            "fever",
            QuestionSet::new(
                "I understand you have a fever. Let me gather some important details.",
                &[
                    "What is your current temperature? (if you know)",
                    "How long have you had the fever?",
                    "Do you have any other symptoms? (chills, body aches, cough)",
                    "Have you taken any fever reducers?",
                ],
            ),
        )
        .with_set(
            "cough",
            QuestionSet::new(
                "Thank you for mentioning your cough. I'd like to understand it better.",
                &[
                    "How long have you been coughing?",
                    "Is it a dry cough or do you have mucus?",
                    "Does your cough worsen at certain times of day?",
                    "Have you been exposed to anyone who's been sick recently?",
                ],
            ),
        )
        .with_set(
            "abdominal_pain",
            QuestionSet::new(
                "I see you're experiencing abdominal pain. Let me ask you some questions to help assess this.",
                &[
                    "Where exactly is the pain located? (upper/lower abdomen)",
                    "How would you describe the pain? (sharp, dull, cramping)",
                    "How long has it been going on?",
                    "Are there any activities that make it better or worse?",
                ],
            ),
        )
        .with_set(
            "dizziness",
            QuestionSet::new(
                "Thank you for mentioning dizziness. I need to ask you a few questions.",
                &[
                    "When does the dizziness occur? (standing up, after eating, randomly)",
                    "Do you feel lightheaded or like the room is spinning?",
                    "How long do the episodes last?",
                    "Have you had any recent falls or injuries?",
                ],
            ),
        )
    }

    pub fn set_for(&self, symptom: &str) -> &QuestionSet {
        self.sets.get(symptom).unwrap_or(&self.default_set)
    }

    /// Number of follow-ups asked for `symptom`, never more than the set holds
    pub fn max_questions(&self, symptom: &str) -> usize {
        let available = self.set_for(symptom).questions.len();
        self.max_overrides
            .get(symptom)
            .map_or(available, |max| (*max).min(available))
    }

    /// Opening follow-up: intro, first question and the answer prompt
    pub fn first_follow_up(&self, symptom: &str) -> Option<FollowUp> {
        let set = self.set_for(symptom);
        let question = set.question(0)?;
        Some(FollowUp {
            response: format!("{}\n\n{}\n\n{}", set.intro, question, FIRST_PROMPT_SUFFIX),
            question: question.to_string(),
        })
    }

    /// Follow-up at `index`, or `None` once the questions are exhausted
    pub fn next_follow_up(&self, symptom: &str, index: usize) -> Option<FollowUp> {
        if index >= self.max_questions(symptom) {
            return None;
        }
        let question = self.set_for(symptom).question(index)?;
        Some(FollowUp {
            response: format!("{}\n\n{}", question, NEXT_PROMPT_SUFFIX),
            question: question.to_string(),
        })
    }
}

impl Default for QuestionCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
