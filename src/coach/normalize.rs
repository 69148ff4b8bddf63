//! Model-output normalization and the coaching voice transform.
//!
//! Specialist and synthesis replies arrive as loosely shaped JSON. This
//! module guarantees the response contract no matter what came back:
//! 3..=7 rationale bullets, 3..=8 suggested questions, at most 3
//! recommended actions of at most 5 steps. Under-populated or malformed
//! lists are replaced wholesale by fixed fallbacks, never patched.

use meridian_core::coaching::{CoachMode, CoachingResponse, RecommendedAction, DISCLAIMER};
use meridian_core::error::{MeridianError, ModelErrorKind};
use meridian_providers::parse_json_object;
use serde_json::Value;

/// Candidate keys for the main answer text, highest priority first.
const ANSWER_KEYS: [&str; 6] = [
    "answer",
    "final_answer",
    "response",
    "content",
    "message",
    "summary",
];

/// Paragraph cap applied to quick-mode answers.
const QUICK_PARAGRAPH_LIMIT: usize = 4;

pub(super) fn fallback_bullets() -> Vec<String> {
    vec![
        "Baseline and recent trends are the strongest inputs for tailored coaching.".to_string(),
        "Small, consistent changes beat aggressive short-term plans.".to_string(),
        "We can tighten recommendations once more data is available.".to_string(),
    ]
}

/// Rationale fallback used when the model answered but its bullet list
/// failed validation.
pub(super) fn model_path_bullets() -> Vec<String> {
    vec![
        "Your baseline and 7-day trends were used to shape this answer.".to_string(),
        "Focus on consistency before increasing plan complexity.".to_string(),
        "A weekly review helps adjust the plan with better signal.".to_string(),
    ]
}

pub(super) fn fallback_actions() -> Vec<RecommendedAction> {
    vec![RecommendedAction {
        title: "Take one low-friction next step".to_string(),
        steps: vec![
            "Pick one behavior to execute daily for 7 days.".to_string(),
            "Log the result at the same time each day.".to_string(),
            "Review trend direction before changing plan.".to_string(),
        ],
    }]
}

pub(super) fn fallback_questions() -> Vec<String> {
    vec![
        "Want a 7-day plan based on your current trends?".to_string(),
        "Want help choosing one metric to prioritize this week?".to_string(),
        "Want a quick daily check-in template?".to_string(),
    ]
}

fn clean_items(value: &Value) -> Option<Vec<String>> {
    let array = value.as_array()?;
    let mut cleaned = Vec::with_capacity(array.len());
    for item in array {
        let text = match item {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => continue,
        };
        if !text.is_empty() {
            cleaned.push(text);
        }
    }
    Some(cleaned)
}

/// Validate a string list against the contract bounds. Anything that is
/// not a list, or cleans up below `min_items`, is replaced by the
/// fallback; oversized lists are truncated to `max_items`.
pub(super) fn safe_list(
    value: Option<&Value>,
    min_items: usize,
    max_items: usize,
    fallback: Vec<String>,
) -> Vec<String> {
    let Some(mut cleaned) = value.and_then(clean_items) else {
        return fallback;
    };
    if cleaned.len() < min_items {
        return fallback;
    }
    cleaned.truncate(max_items);
    cleaned
}

/// Coerce the recommended_actions field. Entries must be objects with a
/// non-empty title and a non-empty step list; steps cap at 5, actions
/// at 3. An empty result means the caller substitutes the fallback.
pub(super) fn safe_actions(value: Option<&Value>) -> Vec<RecommendedAction> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut actions = Vec::new();
    for item in items {
        let Some(obj) = item.as_object() else {
            continue;
        };
        let title = obj
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if title.is_empty() {
            continue;
        }
        let Some(steps) = obj.get("steps").and_then(clean_items) else {
            continue;
        };
        if steps.is_empty() {
            continue;
        }
        actions.push(RecommendedAction {
            title: title.to_string(),
            steps: steps.into_iter().take(5).collect(),
        });
        if actions.len() == 3 {
            break;
        }
    }
    actions
}

/// A specialist occasionally echoes its whole JSON contract inside the
/// answer string. When the chosen text carries an embedded `"answer"`
/// key, extract the inner value instead of showing raw JSON to the user.
fn unwrap_embedded_answer(text: &str) -> Option<String> {
    if !text.contains("\"answer\"") {
        return None;
    }
    let value = parse_json_object(text).ok()?;
    let inner = value.get("answer")?.as_str()?.trim();
    if inner.is_empty() {
        None
    } else {
        Some(inner.to_string())
    }
}

fn pick_answer(raw: &Value) -> Option<String> {
    for key in ANSWER_KEYS {
        if let Some(text) = raw.get(key).and_then(Value::as_str) {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return Some(
                    unwrap_embedded_answer(trimmed).unwrap_or_else(|| trimmed.to_string()),
                );
            }
        }
    }
    None
}

/// Tone and layout normalization, applied to the answer as the final
/// step. Pure in (text, mode).
pub(super) fn apply_meridian_voice(text: &str, mode: CoachMode) -> String {
    let mut body = text.trim().to_string();
    if body.starts_with('#') {
        body = match body.split_once('\n') {
            Some((_, rest)) => rest.trim_start().to_string(),
            None => body.trim_start_matches('#').trim().to_string(),
        };
    }
    while body.contains("\n\n\n") {
        body = body.replace("\n\n\n", "\n\n");
    }
    if mode == CoachMode::Quick {
        let paragraphs: Vec<&str> = body.split("\n\n").collect();
        if paragraphs.len() > QUICK_PARAGRAPH_LIMIT {
            body = paragraphs[..QUICK_PARAGRAPH_LIMIT].join("\n\n");
        }
    }
    body.trim().to_string()
}

/// Shape one raw model reply into the response contract. Fails only
/// when no usable answer text exists anywhere in the payload; every
/// list field self-heals.
pub(super) fn normalize(raw: &Value, mode: CoachMode) -> Result<CoachingResponse, MeridianError> {
    let answer = pick_answer(raw).ok_or_else(|| {
        MeridianError::model(ModelErrorKind::Unavailable, "model reply carried no answer text")
    })?;
    let rationale_bullets = safe_list(raw.get("rationale_bullets"), 3, 7, model_path_bullets());
    let mut recommended_actions = safe_actions(raw.get("recommended_actions"));
    if recommended_actions.is_empty() {
        recommended_actions = fallback_actions();
    }
    let suggested_questions = safe_list(raw.get("suggested_questions"), 3, 8, fallback_questions());
    let safety_flags = safe_list(raw.get("safety_flags"), 0, 8, Vec::new());
    Ok(CoachingResponse {
        answer: apply_meridian_voice(&answer, mode),
        rationale_bullets,
        recommended_actions,
        suggested_questions,
        safety_flags,
        disclaimer: DISCLAIMER.to_string(),
        thread_id: None,
        agent_trace: Vec::new(),
    })
}
