//! Free-form reply generation for turns outside the symptom script.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use crate::error::{IntakeError, Result};

/// Appended to generated replies that carry no disclaimer of their own
pub const REPLY_DISCLAIMER: &str = "⚠️ **Important**: This is preliminary guidance only. Please consult a healthcare professional for proper medical advice.";

/// Capability that produces a free-form reply for arbitrary text
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    fn is_available(&self) -> bool;

    async fn generate(&self, text: &str) -> Result<String>;
}

/// Static paragraph used whenever no generator can answer
pub fn fallback_reply(message: &str) -> String {
    format!(
        "I understand you're asking about: {}\n\n\
I can help you with symptom analysis and general health information. \
If you're experiencing any symptoms, please describe them and I'll guide you through some questions.",
        message
    )
}

/// Null object for deployments without a model
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReplyGenerator;

#[async_trait]
impl ReplyGenerator for NoReplyGenerator {
    fn is_available(&self) -> bool {
        false
    }

    async fn generate(&self, _text: &str) -> Result<String> {
        Err(IntakeError::ReplyFailed(
            "no reply generator configured".to_string(),
        ))
    }
}

/// Tries `primary` first and uses `secondary` when it is unavailable or fails
pub struct FallbackReplyGenerator {
    primary: Arc<dyn ReplyGenerator>,
    secondary: Arc<dyn ReplyGenerator>,
}

impl FallbackReplyGenerator {
    pub fn new(primary: Arc<dyn ReplyGenerator>, secondary: Arc<dyn ReplyGenerator>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl ReplyGenerator for FallbackReplyGenerator {
    fn is_available(&self) -> bool {
        self.primary.is_available() || self.secondary.is_available()
    }

    async fn generate(&self, text: &str) -> Result<String> {
        if self.primary.is_available() {
            match self.primary.generate(text).await {
                Ok(reply) => return Ok(reply),
                Err(e) => warn!(error = %e, "Primary reply generator failed"),
            }
        }
        self.secondary.generate(text).await
    }
}

const KEYWORD_REPLIES: [(&str, &str); 9] = [
    (
        "cold",
        "Common cold symptoms include runny nose, sneezing, sore throat, and mild cough.

Suggestions:
- Rest and stay hydrated
- Use saline nasal spray for congestion
- Gargle with warm salt water for sore throat
- Over-the-counter cold medications if needed
- Symptoms typically resolve in 7-10 days

Important: Consult a doctor if symptoms worsen or persist.",
    ),
    (
        "headache",
        "Headaches can be caused by many factors including stress, tension, dehydration, or more serious conditions.

**Immediate Relief:**
- Rest in a quiet, dark room
- Apply cold compress to forehead
- Stay hydrated
- Over-the-counter pain relievers (if not contraindicated)
- Gentle neck massage

⚠️ **Seek immediate care** if you have a severe headache with fever, confusion, or neck stiffness.",
    ),
    (
        "fever",
        "Fever (temperature above 100.4F/38C) is often a sign of infection.

**Self-Care:**
- Rest and stay hydrated
- Cool compress on forehead
- Light, breathable clothing
- Over-the-counter fever reducers (acetaminophen or ibuprofen)
- Monitor temperature regularly

⚠️ **Seek medical attention** if fever is above 103F (39.4C), lasts more than 3 days, or is accompanied by severe symptoms.",
    ),
    (
        "cough",
        "Coughs can be caused by colds, flu, allergies, or infections.

**Relief Tips:**
- Stay well-hydrated with warm liquids
- Use a humidifier or steam
- Honey and lemon for soothing
- Cough drops or lozenges
- Avoid irritants (smoke, dust)

⚠️ **See a doctor** if cough persists more than 3 weeks, is accompanied by chest pain, or if you cough up blood.",
    ),
    (
        "nausea",
        "Nausea can be caused by many things including stomach bugs, motion sickness, or anxiety.

**Relief Methods:**
- Sit up and avoid lying flat
- Sip clear fluids (water, ginger tea)
- Eat bland foods (crackers, toast)
- Avoid strong smells
- Get fresh air

⚠️ **Seek care** if nausea is severe, persistent, or accompanied by other concerning symptoms.",
    ),
    (
        "pain",
        "Pain management depends on the type and location of pain.

**General Relief:**
- Rest the affected area
- Apply ice for acute pain (first 48 hours)
- Apply heat for chronic pain
- Over-the-counter pain relievers
- Gentle stretching if appropriate

⚠️ **Important**: For severe pain, chest pain, or pain after injury, seek immediate medical attention.",
    ),
    (
        "anxiety",
        "Anxiety is a normal stress response but can be debilitating when excessive.

**Coping Strategies:**
- Deep breathing exercises
- Progressive muscle relaxation
- Regular exercise
- Mindfulness meditation
- Adequate sleep
- Limit caffeine and alcohol

⚠️ **Seek professional help** if anxiety significantly impacts daily life or you experience panic attacks.",
    ),
    (
        "fitness",
        "Regular physical activity is essential for good health.

**Recommendations:**
- At least 150 minutes of moderate activity per week
- Include strength training 2x per week
- Find activities you enjoy
- Start slowly if new to exercise
- Stay hydrated during exercise
- Listen to your body

💡 **Remember**: Any movement is better than none!",
    ),
    (
        "nutrition",
        "Good nutrition is fundamental to health.

**General Guidelines:**
- Eat a variety of fruits and vegetables
- Choose whole grains over refined grains
- Include lean proteins
- Stay hydrated (8 glasses water/day)
- Limit processed foods and added sugars
- Watch portion sizes

💡 **Pro tip**: Follow a balanced diet with all food groups in moderation.",
    ),
];

/// Deterministic keyword-driven replies for general health questions
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedReplyGenerator;

impl RuleBasedReplyGenerator {
    pub fn reply(&self, text: &str) -> String {
        let lowered = text.to_lowercase();

        if let Some((_, reply)) = KEYWORD_REPLIES
            .iter()
            .find(|(keyword, _)| lowered.contains(keyword))
        {
            return reply.to_string();
        }

        if lowered.contains("what") || lowered.contains("how") || lowered.contains("tell me about")
        {
            return format!(
                "I'd be happy to help you with information about \"{text}\".

Based on my knowledge base, I can provide general health information. For specific medical concerns, I recommend:

1. **Consulting a healthcare provider** for personalized advice
2. **Using our symptom checker** to get specific guidance
3. **Contacting telehealth services** for immediate consultation
4. **Visiting urgent care** for non-emergency immediate needs

{REPLY_DISCLAIMER}"
            );
        }

        format!(
            "Thank you for your question about: \"{text}\"

I'm here to help with general health information and guidance. Here's what I can assist with:

**I can help you with:**
- General health information
- Symptom descriptions
- Basic first aid guidance
- Wellness and lifestyle tips
- Medication information

**For serious concerns:**
- Please contact a healthcare provider
- Visit urgent care for immediate needs
- Call 911 for emergencies

Would you like me to ask you some questions about your symptoms to provide more specific guidance?

{REPLY_DISCLAIMER}"
        )
    }
}

#[async_trait]
impl ReplyGenerator for RuleBasedReplyGenerator {
    fn is_available(&self) -> bool {
        true
    }

    async fn generate(&self, text: &str) -> Result<String> {
        Ok(self.reply(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingGenerator;

    #[async_trait]
    impl ReplyGenerator for FailingGenerator {
        fn is_available(&self) -> bool {
            true
        }

        async fn generate(&self, _text: &str) -> Result<String> {
            Err(IntakeError::ReplyFailed("backend down".to_string()))
        }
    }

    #[tokio::test]
    async fn null_generator_is_unavailable() {
        let generator = NoReplyGenerator;
        assert!(!generator.is_available());
        assert!(generator.generate("hi").await.is_err());
    }

    #[tokio::test]
    async fn rule_based_keyword_reply() {
        let reply = RuleBasedReplyGenerator
            .generate("Any advice on NUTRITION?")
            .await
            .unwrap();
        assert!(reply.starts_with("Good nutrition is fundamental to health."));
    }

    #[test]
    fn rule_based_question_and_default_replies() {
        let generator = RuleBasedReplyGenerator;

        let question = generator.reply("What is a normal heart rate?");
        assert!(question.contains("information about \"What is a normal heart rate?\""));
        assert!(question.ends_with(REPLY_DISCLAIMER));

        let default = generator.reply("thanks!");
        assert!(default.starts_with("Thank you for your question about: \"thanks!\""));
    }

    #[tokio::test]
    async fn fallback_chain_uses_secondary_on_error() {
        let chain = FallbackReplyGenerator::new(
            Arc::new(FailingGenerator),
            Arc::new(RuleBasedReplyGenerator),
        );
        assert!(chain.is_available());
        let reply = chain.generate("tell me about fitness").await.unwrap();
        assert!(reply.starts_with("Regular physical activity"));
    }

    #[tokio::test]
    async fn fallback_chain_skips_unavailable_primary() {
        let chain = FallbackReplyGenerator::new(Arc::new(NoReplyGenerator), Arc::new(NoReplyGenerator));
        assert!(!chain.is_available());
        assert!(chain.generate("hello").await.is_err());
    }

    #[test]
    fn fallback_paragraph_mentions_message() {
        let text = fallback_reply("sleep tips");
        assert!(text.starts_with("I understand you're asking about: sleep tips\n\n"));
    }
}
