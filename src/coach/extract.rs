//! Free-text signal extraction.
//!
//! One utility-tier model call turns a daily-log message into typed
//! events and a day rollup. A keyword pre-filter keeps chatter away from
//! the model entirely, and every returned field is re-validated here;
//! the model's claims are treated as untrusted input. When the call
//! fails, a keyword heuristic still flags the categories the message
//! touched so nothing is silently lost.

use std::str::FromStr;

use meridian_core::coaching::TaskType;
use meridian_core::daily::MetricType;
use meridian_core::signal::{
    CategoryFlags, EventType, ExtractedSignal, Extraction, ParseStatus, Rollup, FRAGMENT_MAX_LEN,
};
use meridian_core::traits::ModelClient;
use serde_json::Value;
use tracing::{debug, warn};

use super::keywords::{
    kw_match, padded, FOOD_MARKER_KW, HYDRATION_MARKER_KW, MEDS_MARKER_KW, SUPPLEMENT_MARKER_KW,
    UPDATE_HINT_KW, WORKOUT_MARKER_KW,
};

const UNIT_MAX_LEN: usize = 16;
const TIMESTAMP_MAX_LEN: usize = 40;

const EXTRACT_SYSTEM_INSTRUCTION: &str = "\
You extract structured daily-log signals from one user message. \
Return strict JSON with keys: has_progress_update (bool), events (array of \
{event_type, details, value, unit, timestamp}), rollup (object with sleep_hours, \
energy, mood, stress, training_done, nutrition_on_plan, hydration_progress, \
meds_taken, supplements_taken, nutrition_food_details, training_details, \
weight_kg, bp_systolic, bp_diastolic, resting_hr_bpm). \
event_type must be one of: food, hydration, medication, supplement, workout, \
sleep, weight, blood_pressure, heart_rate, fasting, note. \
Normalize units to metric (pounds to kilograms, 12h times to 24h). \
Use null for anything the message does not state. No prose outside the JSON.";

/// Extras categories subject to the clause-level contamination guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum FragmentCategory {
    Food,
    Hydration,
    Meds,
    Supplements,
    Workout,
}

impl FragmentCategory {
    const ALL: [FragmentCategory; 5] = [
        FragmentCategory::Food,
        FragmentCategory::Hydration,
        FragmentCategory::Meds,
        FragmentCategory::Supplements,
        FragmentCategory::Workout,
    ];

    fn markers(self) -> &'static [&'static str] {
        match self {
            FragmentCategory::Food => FOOD_MARKER_KW,
            FragmentCategory::Hydration => HYDRATION_MARKER_KW,
            FragmentCategory::Meds => MEDS_MARKER_KW,
            FragmentCategory::Supplements => SUPPLEMENT_MARKER_KW,
            FragmentCategory::Workout => WORKOUT_MARKER_KW,
        }
    }
}

fn clip(text: &str, max_chars: usize) -> String {
    text.trim().chars().take(max_chars).collect()
}

/// Split an update into clauses at `;`, `,`, and the word `and`.
fn split_clauses(text: &str) -> Vec<&str> {
    let mut clauses = Vec::new();
    for piece in text.split([';', ',']) {
        for clause in piece.split(" and ") {
            let trimmed = clause.trim();
            if !trimmed.is_empty() {
                clauses.push(trimmed);
            }
        }
    }
    clauses
}

/// Keep only the clauses that belong to `category`: each clause must
/// contain one of the category's markers and none of any other
/// category's markers. Survivors are re-joined with `; `. `None` means
/// no clause survived and the fragment must not be committed.
pub(super) fn guard_fragment(text: &str, category: FragmentCategory) -> Option<String> {
    let mut kept = Vec::new();
    for clause in split_clauses(text) {
        let probe = padded(&clause.to_lowercase());
        if !kw_match(&probe, category.markers()) {
            continue;
        }
        let foreign = FragmentCategory::ALL
            .iter()
            .any(|other| *other != category && kw_match(&probe, other.markers()));
        if !foreign {
            kept.push(clause);
        }
    }
    if kept.is_empty() {
        None
    } else {
        Some(clip(&kept.join("; "), FRAGMENT_MAX_LEN))
    }
}

/// Independent keyword-membership test per category, over the raw text.
pub(super) fn infer_category_flags(raw_text: &str) -> CategoryFlags {
    let probe = padded(&raw_text.to_lowercase());
    CategoryFlags {
        food: kw_match(&probe, FOOD_MARKER_KW),
        hydration: kw_match(&probe, HYDRATION_MARKER_KW),
        meds: kw_match(&probe, MEDS_MARKER_KW),
        supplements: kw_match(&probe, SUPPLEMENT_MARKER_KW),
        workout: kw_match(&probe, WORKOUT_MARKER_KW),
    }
}

/// Build the heuristic result used when the model path is unusable:
/// category flags from keyword membership, with guarded raw-text
/// fragments standing in for the rollup strings.
fn heuristic_extraction(raw_text: &str, parse_status: ParseStatus) -> Extraction {
    let flags = infer_category_flags(raw_text);
    let mut rollup = Rollup::default();
    if flags.food {
        rollup.nutrition_food_details = guard_fragment(raw_text, FragmentCategory::Food);
    }
    if flags.hydration {
        rollup.hydration_progress = guard_fragment(raw_text, FragmentCategory::Hydration);
    }
    if flags.meds {
        rollup.meds_taken = guard_fragment(raw_text, FragmentCategory::Meds);
    }
    if flags.supplements {
        rollup.supplements_taken = guard_fragment(raw_text, FragmentCategory::Supplements);
    }
    if flags.workout {
        rollup.training_details = guard_fragment(raw_text, FragmentCategory::Workout);
    }
    Extraction {
        has_update: flags.any(),
        signals: Vec::new(),
        rollup,
        parse_status,
        category_flags: flags,
    }
}

fn numeric_field(obj: &Value, key: &str, metric: MetricType) -> Option<f64> {
    let value = obj.get(key)?;
    if value.is_null() {
        return None;
    }
    let Some(number) = value.as_f64() else {
        debug!(key, "dropping non-numeric rollup field");
        return None;
    };
    if metric.accepts(number) {
        Some(number)
    } else {
        debug!(key, value = number, "dropping out-of-range rollup field");
        None
    }
}

fn bool_field(obj: &Value, key: &str) -> Option<bool> {
    let value = obj.get(key)?;
    if value.is_null() {
        return None;
    }
    let parsed = value.as_bool();
    if parsed.is_none() {
        debug!(key, "dropping non-boolean rollup field");
    }
    parsed
}

fn fragment_field(obj: &Value, key: &str, category: FragmentCategory) -> Option<String> {
    let text = obj.get(key)?.as_str()?.trim();
    if text.is_empty() {
        return None;
    }
    let guarded = guard_fragment(text, category);
    if guarded.is_none() {
        debug!(key, "contamination guard rejected rollup fragment");
    }
    guarded
}

fn validate_rollup(raw: &Value) -> Rollup {
    let Some(obj) = raw.get("rollup").filter(|v| v.is_object()) else {
        return Rollup::default();
    };
    Rollup {
        sleep_hours: numeric_field(obj, "sleep_hours", MetricType::SleepHours),
        energy: numeric_field(obj, "energy", MetricType::Energy),
        mood: numeric_field(obj, "mood", MetricType::Mood),
        stress: numeric_field(obj, "stress", MetricType::Stress),
        training_done: bool_field(obj, "training_done"),
        nutrition_on_plan: bool_field(obj, "nutrition_on_plan"),
        hydration_progress: fragment_field(obj, "hydration_progress", FragmentCategory::Hydration),
        meds_taken: fragment_field(obj, "meds_taken", FragmentCategory::Meds),
        supplements_taken: fragment_field(obj, "supplements_taken", FragmentCategory::Supplements),
        nutrition_food_details: fragment_field(obj, "nutrition_food_details", FragmentCategory::Food),
        training_details: fragment_field(obj, "training_details", FragmentCategory::Workout),
        weight_kg: numeric_field(obj, "weight_kg", MetricType::WeightKg),
        bp_systolic: numeric_field(obj, "bp_systolic", MetricType::BpSystolic),
        bp_diastolic: numeric_field(obj, "bp_diastolic", MetricType::BpDiastolic),
        resting_hr_bpm: numeric_field(obj, "resting_hr_bpm", MetricType::RestingHrBpm),
    }
}

fn validate_events(raw: &Value) -> Vec<ExtractedSignal> {
    let Some(items) = raw.get("events").and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut signals = Vec::new();
    for item in items {
        let Some(obj) = item.as_object() else {
            continue;
        };
        let Some(type_name) = obj.get("event_type").and_then(Value::as_str) else {
            continue;
        };
        let event_type = match EventType::from_str(type_name) {
            Ok(ty) => ty,
            Err(_) => {
                debug!(event_type = type_name, "dropping event of unknown type");
                continue;
            }
        };
        let details = obj
            .get("details")
            .and_then(Value::as_str)
            .map(|d| clip(d, FRAGMENT_MAX_LEN))
            .unwrap_or_default();
        signals.push(ExtractedSignal {
            event_type,
            details,
            value: obj.get("value").and_then(Value::as_f64).filter(|v| v.is_finite()),
            unit: obj
                .get("unit")
                .and_then(Value::as_str)
                .map(|u| clip(u, UNIT_MAX_LEN))
                .filter(|u| !u.is_empty()),
            timestamp: obj
                .get("timestamp")
                .and_then(Value::as_str)
                .map(|t| clip(t, TIMESTAMP_MAX_LEN))
                .filter(|t| !t.is_empty()),
        });
    }
    signals
}

fn validate_model_payload(raw_text: &str, payload: &Value) -> Extraction {
    if !payload.is_object() {
        return heuristic_extraction(raw_text, ParseStatus::NotAnObject);
    }
    let signals = validate_events(payload);
    let rollup = validate_rollup(payload);
    let claimed_update = payload
        .get("has_progress_update")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if signals.is_empty() && rollup.is_empty() {
        return heuristic_extraction(raw_text, ParseStatus::EmptyPayload);
    }
    Extraction {
        has_update: claimed_update || !signals.is_empty() || !rollup.is_empty(),
        signals,
        rollup,
        parse_status: ParseStatus::Ok,
        category_flags: infer_category_flags(raw_text),
    }
}

/// Run one extraction pass over a raw update. Never fails: a model
/// error degrades to the keyword heuristic, and text without any update
/// hint returns the skipped result with zero model traffic.
pub(crate) async fn extract(model: &dyn ModelClient, raw_text: &str) -> Extraction {
    let probe = padded(&raw_text.to_lowercase());
    if !kw_match(&probe, UPDATE_HINT_KW) {
        return Extraction::skipped();
    }
    let prompt = format!("Extract loggable signals from this message:\n{raw_text}");
    match model
        .generate_json(&prompt, TaskType::Utility, Some(EXTRACT_SYSTEM_INSTRUCTION))
        .await
    {
        Ok(payload) => validate_model_payload(raw_text, &payload),
        Err(err) => {
            warn!(error = %err, "signal extraction model call failed, using keyword heuristic");
            heuristic_extraction(raw_text, ParseStatus::ModelFailed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::MockModel;
    use super::*;
    use meridian_core::error::ModelErrorKind;
    use serde_json::json;

    #[tokio::test]
    async fn no_hint_skips_model_entirely() {
        let model = MockModel::failing(ModelErrorKind::Unavailable);
        let extraction = extract(&model, "what should my next focus be").await;
        assert_eq!(extraction.parse_status, ParseStatus::SkippedNoHint);
        assert!(!extraction.has_update);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn model_payload_is_revalidated_field_by_field() {
        let model = MockModel::scripted(vec![Ok(json!({
            "has_progress_update": true,
            "events": [
                {"event_type": "weight", "details": "morning weigh-in", "value": 74.8, "unit": "kg"},
                {"event_type": "exercise", "details": "unknown type is dropped"},
                {"event_type": "sleep", "details": "slept well", "value": "not a number"}
            ],
            "rollup": {
                "sleep_hours": 7.5,
                "energy": 99,
                "weight_kg": 74.8,
                "bp_systolic": "high",
                "training_done": "yes",
                "nutrition_on_plan": true
            }
        }))]);
        let extraction = extract(&model, "weighed 74.8 kg and slept 7.5 hours").await;

        assert_eq!(extraction.parse_status, ParseStatus::Ok);
        assert!(extraction.has_update);
        assert_eq!(extraction.signals.len(), 2);
        assert_eq!(extraction.signals[0].event_type, EventType::Weight);
        assert_eq!(extraction.signals[1].value, None);
        assert_eq!(extraction.rollup.sleep_hours, Some(7.5));
        // energy 99 is outside 1..=10, bp "high" is not numeric,
        // training_done "yes" is not a boolean.
        assert_eq!(extraction.rollup.energy, None);
        assert_eq!(extraction.rollup.bp_systolic, None);
        assert_eq!(extraction.rollup.training_done, None);
        assert_eq!(extraction.rollup.nutrition_on_plan, Some(true));
        assert_eq!(extraction.rollup.weight_kg, Some(74.8));
    }

    #[tokio::test]
    async fn model_failure_falls_back_to_heuristic_flags() {
        let model = MockModel::failing(ModelErrorKind::RateLimited);
        let extraction = extract(&model, "drank 2 liters of water and did my workout").await;

        assert_eq!(extraction.parse_status, ParseStatus::ModelFailed);
        assert!(extraction.has_update);
        assert!(extraction.category_flags.hydration);
        assert!(extraction.category_flags.workout);
        assert!(!extraction.category_flags.meds);
        assert!(extraction.rollup.hydration_progress.is_some());
        assert!(extraction.rollup.training_details.is_some());
    }

    #[tokio::test]
    async fn empty_payload_degrades_to_heuristic() {
        let model = MockModel::scripted(vec![Ok(json!({
            "has_progress_update": false,
            "events": [],
            "rollup": {}
        }))]);
        let extraction = extract(&model, "ate a salad for lunch").await;
        assert_eq!(extraction.parse_status, ParseStatus::EmptyPayload);
        assert!(extraction.category_flags.food);
        assert!(extraction.rollup.nutrition_food_details.is_some());
    }

    #[test]
    fn guard_isolates_meds_from_food() {
        let text = "took blood pressure meds and ate pizza for breakfast";

        let food = guard_fragment(text, FragmentCategory::Food).unwrap();
        assert!(food.contains("pizza"));
        assert!(!food.contains("blood pressure"));

        let meds = guard_fragment(text, FragmentCategory::Meds).unwrap();
        assert!(meds.contains("blood pressure"));
        assert!(!meds.contains("pizza"));
    }

    #[test]
    fn guard_drops_mixed_clauses_from_both_categories() {
        // One clause touching two categories survives in neither.
        let text = "ate pizza with my meds";
        assert!(guard_fragment(text, FragmentCategory::Food).is_none());
        assert!(guard_fragment(text, FragmentCategory::Meds).is_none());
    }

    #[test]
    fn guard_rejoins_multiple_surviving_clauses() {
        let text = "eggs for breakfast, salad for lunch, drank water all day";
        let food = guard_fragment(text, FragmentCategory::Food).unwrap();
        assert_eq!(food, "eggs for breakfast; salad for lunch");
    }

    #[tokio::test]
    async fn model_rollup_fragments_pass_through_guard() {
        let message = "took blood pressure meds and ate pizza for breakfast";
        let model = MockModel::scripted(vec![Ok(json!({
            "has_progress_update": true,
            "events": [],
            "rollup": {
                "nutrition_food_details": message,
                "meds_taken": message
            }
        }))]);
        let extraction = extract(&model, message).await;

        let food = extraction.rollup.nutrition_food_details.unwrap();
        assert!(food.contains("pizza") && !food.contains("blood pressure"));
        let meds = extraction.rollup.meds_taken.unwrap();
        assert!(meds.contains("blood pressure") && !meds.contains("pizza"));
    }
}
