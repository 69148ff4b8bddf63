//! Merging one extraction into a day's aggregate.
//!
//! Pure value-level merge, testable without a database; the store
//! commits the result in a single transaction afterwards. Incoming
//! values are already validated and contamination-guarded by the
//! extractor. Merging the same extraction twice changes nothing: extras
//! are first-writer-wins, booleans only latch to true, and duplicate
//! events are absorbed.

use meridian_core::daily::{
    AnswerEntry, DailyAggregate, DayEvent, MetricType, UnparsedUpdate, UNPARSED_KEPT,
};
use meridian_core::signal::{EventType, ExtractedSignal, Extraction, ParseStatus, FRAGMENT_MAX_LEN};
use serde_json::json;

pub(super) struct MergeOutcome {
    pub aggregate: DailyAggregate,
    /// Vitals to upsert as point measurements alongside the day row.
    pub measurements: Vec<(MetricType, f64)>,
}

fn clip(text: &str, max_chars: usize) -> String {
    text.trim().chars().take(max_chars).collect()
}

fn answer_entry(raw_text: &str, parsed_value: serde_json::Value, now: &str) -> AnswerEntry {
    AnswerEntry {
        source_text: clip(raw_text, FRAGMENT_MAX_LEN),
        parsed_value,
        specialist: "signal_extractor".to_string(),
        at: now.to_string(),
    }
}

/// Append an event unless an identical one (timestamp aside) is already
/// in the day's log.
fn push_event(aggregate: &mut DailyAggregate, event: DayEvent) {
    let duplicate = aggregate.events.iter().any(|existing| {
        existing.event_type == event.event_type
            && existing.details == event.details
            && existing.value == event.value
            && existing.unit == event.unit
    });
    if !duplicate {
        aggregate.events.push(event);
    }
}

fn signal_event(signal: &ExtractedSignal, now: &str) -> DayEvent {
    let details = match &signal.timestamp {
        Some(mention) if !mention.is_empty() => {
            clip(&format!("{} (at {mention})", signal.details), FRAGMENT_MAX_LEN)
        }
        _ => clip(&signal.details, FRAGMENT_MAX_LEN),
    };
    DayEvent {
        event_type: signal.event_type,
        details,
        value: signal.value,
        unit: signal.unit.clone(),
        at: now.to_string(),
    }
}

/// Merge one extraction into the day. `now` is the RFC 3339 instant
/// stamped on new events and provenance entries; `events_kept` bounds
/// the event log (oldest entries fall off first).
pub(super) fn merge_extraction(
    mut aggregate: DailyAggregate,
    raw_text: &str,
    extraction: &Extraction,
    now: &str,
    events_kept: usize,
) -> MergeOutcome {
    let mut measurements: Vec<(MetricType, f64)> = Vec::new();
    let rollup = &extraction.rollup;

    for signal in &extraction.signals {
        push_event(&mut aggregate, signal_event(signal, now));
    }

    // Day scalars overwrite when the update carries a value.
    let scalar_slots: [(&str, Option<f64>, &mut Option<f64>); 4] = [
        ("sleep_hours", rollup.sleep_hours, &mut aggregate.sleep_hours),
        ("energy", rollup.energy, &mut aggregate.energy),
        ("mood", rollup.mood, &mut aggregate.mood),
        ("stress", rollup.stress, &mut aggregate.stress),
    ];
    for (field, incoming, slot) in scalar_slots {
        if let Some(value) = incoming {
            *slot = Some(value);
            aggregate
                .answers
                .insert(field.to_string(), answer_entry(raw_text, json!(value), now));
        }
    }

    // Vitals become point measurements rather than day columns.
    let vital_slots = [
        ("weight_kg", MetricType::WeightKg, rollup.weight_kg),
        ("bp_systolic", MetricType::BpSystolic, rollup.bp_systolic),
        ("bp_diastolic", MetricType::BpDiastolic, rollup.bp_diastolic),
        ("resting_hr_bpm", MetricType::RestingHrBpm, rollup.resting_hr_bpm),
    ];
    for (field, metric, incoming) in vital_slots {
        if let Some(value) = incoming {
            measurements.push((metric, value));
            aggregate
                .answers
                .insert(field.to_string(), answer_entry(raw_text, json!(value), now));
        }
    }
    if let Some(hours) = rollup.sleep_hours {
        measurements.push((MetricType::SleepHours, hours));
    }

    // One-way booleans: OR with the existing value, never back to false.
    let food_logged = rollup.nutrition_food_details.is_some()
        || extraction.signals.iter().any(|s| s.event_type == EventType::Food);
    let training_logged = rollup.training_details.is_some()
        || extraction.signals.iter().any(|s| s.event_type == EventType::Workout);
    let boolean_slots: [(&str, Option<bool>, bool, &mut Option<bool>); 2] = [
        (
            "training_done",
            rollup.training_done,
            training_logged,
            &mut aggregate.training_done,
        ),
        (
            "nutrition_on_plan",
            rollup.nutrition_on_plan,
            food_logged,
            &mut aggregate.nutrition_on_plan,
        ),
    ];
    for (field, incoming, implied, slot) in boolean_slots {
        let merged = match (incoming, implied) {
            (Some(v), implied) => Some(v || implied),
            (None, true) => Some(true),
            (None, false) => None,
        };
        if let Some(value) = merged {
            let latched = slot.unwrap_or(false) || value;
            if *slot != Some(latched) {
                *slot = Some(latched);
                aggregate
                    .answers
                    .insert(field.to_string(), answer_entry(raw_text, json!(latched), now));
            }
        }
    }

    // Extras: first writer wins; a different later fragment is kept as
    // an event so the audit trail survives without overwriting.
    let extras_slots: [(&str, EventType, Option<&String>, &mut Option<String>); 5] = [
        (
            "hydration_progress",
            EventType::Hydration,
            rollup.hydration_progress.as_ref(),
            &mut aggregate.extras.hydration_progress,
        ),
        (
            "meds_taken",
            EventType::Medication,
            rollup.meds_taken.as_ref(),
            &mut aggregate.extras.meds_taken,
        ),
        (
            "supplements_taken",
            EventType::Supplement,
            rollup.supplements_taken.as_ref(),
            &mut aggregate.extras.supplements_taken,
        ),
        (
            "nutrition_food_details",
            EventType::Food,
            rollup.nutrition_food_details.as_ref(),
            &mut aggregate.extras.nutrition_food_details,
        ),
        (
            "training_details",
            EventType::Workout,
            rollup.training_details.as_ref(),
            &mut aggregate.extras.training_details,
        ),
    ];
    let mut displaced: Vec<DayEvent> = Vec::new();
    for (field, event_type, incoming, slot) in extras_slots {
        let Some(fragment) = incoming else {
            continue;
        };
        match slot {
            None => {
                *slot = Some(fragment.clone());
                aggregate
                    .answers
                    .insert(field.to_string(), answer_entry(raw_text, json!(fragment), now));
            }
            Some(existing) if existing != fragment => {
                displaced.push(DayEvent {
                    event_type,
                    details: clip(fragment, FRAGMENT_MAX_LEN),
                    value: None,
                    unit: None,
                    at: now.to_string(),
                });
            }
            Some(_) => {}
        }
    }
    for event in displaced {
        push_event(&mut aggregate, event);
    }

    if matches!(
        extraction.parse_status,
        ParseStatus::ModelFailed | ParseStatus::NotAnObject | ParseStatus::EmptyPayload
    ) {
        let text = clip(raw_text, FRAGMENT_MAX_LEN);
        let already = aggregate.unparsed.iter().any(|u| u.text == text);
        if !already {
            aggregate.unparsed.push(UnparsedUpdate {
                text,
                flags: extraction
                    .category_flags
                    .names()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                at: now.to_string(),
            });
        }
        let excess = aggregate.unparsed.len().saturating_sub(UNPARSED_KEPT);
        if excess > 0 {
            aggregate.unparsed.drain(..excess);
        }
    }

    let excess = aggregate.events.len().saturating_sub(events_kept);
    if excess > 0 {
        aggregate.events.drain(..excess);
    }

    MergeOutcome {
        aggregate,
        measurements,
    }
}
