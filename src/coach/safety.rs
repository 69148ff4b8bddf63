//! Urgent-symptom gate and supplement caution.
//!
//! The scan runs before any model traffic. A hit collapses to the single
//! `urgent_symptom_language` flag and the fixed emergency payload; remote
//! coaching never attempts to triage urgent symptoms itself.

use meridian_core::coaching::{CoachingResponse, RecommendedAction, DISCLAIMER};

use super::keywords::{kw_match, SUPPLEMENT_TOPIC_KW, URGENT_SYMPTOM_KW};

/// Returns `["urgent_symptom_language"]` when the question contains any
/// urgent symptom phrase, else an empty list.
pub(super) fn detect_urgent_flags(question: &str) -> Vec<String> {
    let lowered = question.to_lowercase();
    if kw_match(&lowered, URGENT_SYMPTOM_KW) {
        vec!["urgent_symptom_language".to_string()]
    } else {
        Vec::new()
    }
}

/// True when the question touches supplement territory. Layered onto any
/// response path as a caution, never a refusal.
pub(super) fn has_supplement_topic(question: &str) -> bool {
    kw_match(&question.to_lowercase(), SUPPLEMENT_TOPIC_KW)
}

pub(super) fn supplement_caution_text() -> &'static str {
    "Supplement guidance should be conservative; check with your clinician if you use medications or have conditions."
}

/// The fixed payload returned on the emergency short-circuit. Complete on
/// its own; no model call contributes to it.
pub(super) fn emergency_response() -> CoachingResponse {
    CoachingResponse {
        answer: "Your message includes symptoms that could need urgent care. \
                 Please seek immediate medical attention or call emergency services now."
            .to_string(),
        rationale_bullets: vec![
            "Some symptoms can signal a time-sensitive emergency.".to_string(),
            "Remote coaching is not safe for urgent symptom evaluation.".to_string(),
            "Fast in-person assessment is the safest next step.".to_string(),
        ],
        recommended_actions: vec![RecommendedAction {
            title: "Get urgent care now".to_string(),
            steps: vec![
                "Call local emergency services immediately.".to_string(),
                "Do not drive yourself if you feel faint or unstable.".to_string(),
                "Share your current symptoms clearly with clinicians.".to_string(),
            ],
        }],
        suggested_questions: vec![
            "Want a short summary you can read to emergency services?".to_string(),
            "Want a checklist of recent metrics to bring to clinicians?".to_string(),
            "Want guidance on what baseline information to share after urgent care?".to_string(),
        ],
        safety_flags: vec!["urgent_symptom_language".to_string()],
        disclaimer: DISCLAIMER.to_string(),
        thread_id: None,
        agent_trace: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgent_phrases_collapse_to_one_flag() {
        let flags = detect_urgent_flags("I have chest pain and slurred speech");
        assert_eq!(flags, vec!["urgent_symptom_language".to_string()]);
    }

    #[test]
    fn detection_is_case_insensitive() {
        assert!(!detect_urgent_flags("CHEST PAIN after climbing stairs").is_empty());
        assert!(!detect_urgent_flags("Feeling FAINT since lunch").is_empty());
    }

    #[test]
    fn benign_questions_produce_no_flags() {
        assert!(detect_urgent_flags("how can I sleep better").is_empty());
        assert!(detect_urgent_flags("what should I eat before training").is_empty());
    }

    #[test]
    fn supplement_topic_detection() {
        assert!(has_supplement_topic("Should I add creatine to my stack?"));
        assert!(has_supplement_topic("thoughts on ashwagandha before bed"));
        assert!(!has_supplement_topic("how many steps per day"));
    }

    #[test]
    fn emergency_payload_is_complete() {
        let resp = emergency_response();
        assert!(resp.answer.contains("emergency services"));
        assert_eq!(resp.rationale_bullets.len(), 3);
        assert_eq!(resp.recommended_actions.len(), 1);
        assert_eq!(resp.recommended_actions[0].steps.len(), 3);
        assert_eq!(resp.suggested_questions.len(), 3);
        assert_eq!(resp.safety_flags, vec!["urgent_symptom_language".to_string()]);
        assert_eq!(resp.disclaimer, DISCLAIMER);
    }
}
