//! Intent filter: keep the pipeline on-topic.
//!
//! The HTTP surface runs every incoming query through this filter before spending
//! five model calls on it. A tiny classifier call decides whether the text is
//! health/wellness related; when the classifier itself fails (quota, network), the
//! filter degrades to a keyword match so the endpoint stays usable.

use std::sync::Arc;

use crate::healthmesh::agents::send_with_rotation;
use crate::healthmesh::client_wrapper::{ClientFactory, Message};
use crate::healthmesh::key_pool::KeyPool;

const CLASSIFIER_SYSTEM_PROMPT: &str =
    "You are an intent classifier. Determine if the user's query is related to health, \
     wellness, medical symptoms, diet, fitness, mental health, or lifestyle.\n\n\
     Respond with ONLY \"YES\" if the query is health/wellness related.\n\
     Respond with ONLY \"NO\" if the query is completely unrelated (e.g., technology, \
     politics, entertainment, general knowledge).\n\n\
     Health-related topics include: symptoms, diseases, pain, medical conditions, \
     nutrition, diet, exercise, fitness, mental health, stress, sleep, lifestyle, \
     medications, preventive care, body conditions (acne, skin issues, etc.).";

/// Keyword fallback used when the classifier call fails.
const HEALTH_KEYWORDS: &[&str] = &[
    "symptom",
    "fever",
    "cough",
    "pain",
    "headache",
    "cold",
    "flu",
    "blood pressure",
    "bp",
    "sugar",
    "diabetes",
    "hypertension",
    "cholesterol",
    "heart",
    "breath",
    "breathing",
    "asthma",
    "diet",
    "food",
    "meal",
    "nutrition",
    "calorie",
    "exercise",
    "workout",
    "walking",
    "running",
    "yoga",
    "fitness",
    "sleep",
    "insomnia",
    "snoring",
    "stress",
    "anxiety",
    "depression",
    "fatigue",
    "tired",
    "doctor",
    "medicine",
    "tablet",
    "pill",
    "health",
    "wellness",
    "weight",
    "obesity",
    "acne",
    "pimples",
    "skin",
    "rash",
    "allergy",
    "itch",
    "stomach",
    "nausea",
    "suffering",
    "feel",
    "sick",
    "unwell",
    "condition",
];

/// Keyword match over the lowercased text.
pub fn matches_health_keywords(text: &str) -> bool {
    let lowered = text.to_lowercase();
    HEALTH_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}

/// Model-backed intent check with keyword fallback.
///
/// Blank text is never health-related. Any classifier failure falls back to
/// [`matches_health_keywords`] rather than rejecting the request.
pub async fn is_health_query(
    factory: &Arc<dyn ClientFactory>,
    pool: &Arc<KeyPool>,
    text: &str,
) -> bool {
    if text.trim().is_empty() {
        return false;
    }

    let messages = [
        Message::system(CLASSIFIER_SYSTEM_PROMPT),
        Message::user(format!(
            "Is this query health/wellness related?\n\nQuery: {}",
            text
        )),
    ];

    match send_with_rotation(&**factory, pool, &messages).await {
        Ok(reply) => reply.content.trim().to_uppercase().contains("YES"),
        Err(err) => {
            log::warn!("intent classifier unavailable ({}); using keyword fallback", err);
            matches_health_keywords(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_fallback_accepts_health_topics() {
        assert!(matches_health_keywords("I have a persistent headache"));
        assert!(matches_health_keywords("FEVER and chills since Monday"));
        assert!(matches_health_keywords("trouble with sleep lately"));
    }

    #[test]
    fn keyword_fallback_rejects_off_topic_text() {
        assert!(!matches_health_keywords("best rust web framework in 2026"));
        assert!(!matches_health_keywords(""));
    }
}
