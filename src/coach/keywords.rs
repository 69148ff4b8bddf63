//! Static keyword tables and matching helpers for the coaching pipeline.
//!
//! Three consumers share this module: the safety gate (urgent symptom and
//! supplement phrases), the roster (per-specialist trigger sets), and the
//! signal extractor (update pre-filter plus the per-category marker sets
//! used by the clause-level contamination guard). All matching is
//! lowercase substring containment; short tokens that would collide with
//! larger words (`ate` in `water`, `hr` in `three`) are stored with
//! explicit spaces and matched against space-padded text.

/// Substring match against a lowercased haystack.
pub(super) fn kw_match(text_lower: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| text_lower.contains(kw))
}

/// Pad with single spaces so space-delimited keywords match at the
/// ends of the text as well as in the middle.
pub(super) fn padded(text_lower: &str) -> String {
    format!(" {text_lower} ")
}

// --- Safety gate ---

/// Phrases that force the emergency short-circuit. `faint` intentionally
/// also matches `fainting` and `feeling faint`.
pub(super) const URGENT_SYMPTOM_KW: &[&str] = &[
    "chest pain",
    "pressure in chest",
    "shortness of breath",
    "faint",
    "fainting",
    "passed out",
    "stroke",
    "face droop",
    "slurred speech",
    "one side weak",
];

/// Phrases that layer the supplement caution onto any response path.
pub(super) const SUPPLEMENT_TOPIC_KW: &[&str] = &[
    "supplement",
    "stack",
    "creatine",
    "berberine",
    "ashwagandha",
    "omega-3",
];

// --- Roster trigger sets ---

/// Goal strategist: long-horizon planning and phase questions.
pub(super) const GOAL_KW: &[&str] = &[
    "goal",
    "plan",
    "strategy",
    "target",
    "milestone",
    "phase",
    "priorit",
    "long-term",
    "long term",
    "plateau",
];

/// Cardiometabolic strategist: lipids, blood pressure, metabolic markers.
pub(super) const CARDIOMETABOLIC_KW: &[&str] = &[
    "blood pressure",
    "cholesterol",
    "lipid",
    "ldl",
    "hdl",
    "triglyceride",
    "glucose",
    "a1c",
    "insulin",
    "cardiovascular",
    "heart health",
    "sodium",
];

/// Nutritionist: food, macros, caloric structure.
pub(super) const NUTRITION_KW: &[&str] = &[
    "food",
    "diet",
    "meal",
    "protein",
    "carb",
    "calorie",
    "nutrition",
    "eat",
    "snack",
    "breakfast",
    "lunch",
    "dinner",
    "fasting",
    "alcohol",
];

/// Sleep expert: duration, quality, circadian timing.
pub(super) const SLEEP_KW: &[&str] = &[
    "sleep",
    "insomnia",
    "bedtime",
    "wake",
    "nap",
    "circadian",
    "melatonin",
    "tired",
];

/// Movement coach: training load and structure.
pub(super) const TRAINING_KW: &[&str] = &[
    "train",
    "workout",
    "exercise",
    "gym",
    "lift",
    "strength",
    "cardio",
    "zone 2",
    "hiit",
    "running",
    "steps",
    "walk",
    "mobility",
];

/// Supplement auditor trigger: the safety-gate topic list plus common
/// stack components.
pub(super) const SUPPLEMENT_TRIGGER_KW: &[&str] = &[
    "supplement",
    "stack",
    "creatine",
    "berberine",
    "ashwagandha",
    "omega-3",
    "vitamin",
    "magnesium",
    "fish oil",
    "protein powder",
];

/// Behavior coach: adherence and habit mechanics.
pub(super) const BEHAVIOR_KW: &[&str] = &[
    "habit",
    "consisten",
    "adherence",
    "stick to",
    "routine",
    "motivat",
    "accountab",
    "procrastinat",
    "skipped",
    "missed",
];

/// Recovery strategist: stress load and recuperation.
pub(super) const RECOVERY_KW: &[&str] = &[
    "stress",
    "recover",
    "burnout",
    "overtrain",
    "hrv",
    "rest day",
    "sore",
    "fatigue",
    "deload",
];

// --- Signal extraction ---

/// Broad hint set gating the extraction model call. Matched against
/// space-padded text; a miss means the message cannot be a loggable
/// update and the extractor returns without any model traffic.
pub(super) const UPDATE_HINT_KW: &[&str] = &[
    " ate ",
    " eat ",
    " eating ",
    " meal ",
    "breakfast",
    "lunch",
    "dinner",
    "snack",
    " drank ",
    " drink ",
    "water",
    "hydrat",
    "coffee",
    " med ",
    " meds ",
    "medication",
    " pill ",
    " dose ",
    "supplement",
    "creatine",
    "magnesium",
    "vitamin",
    "workout",
    "trained",
    "training",
    " gym ",
    " ran ",
    " run ",
    "walked",
    " lift ",
    "lifted",
    "exercise",
    "weigh",
    " lbs",
    " lb ",
    " kg ",
    "blood pressure",
    " bp ",
    "heart rate",
    " hr ",
    "resting",
    "slept",
    "sleep",
    " bed ",
    "woke",
    " fast ",
    "fasting",
    "fasted",
    "steps",
    "energy",
    " mood ",
];

// --- Contamination guard marker sets ---
//
// Each category's markers are its include-terms; the other categories'
// markers are its exclude-terms. A clause survives for a category only
// when it matches that category and no other. Matched space-padded.

/// Food clause markers.
pub(super) const FOOD_MARKER_KW: &[&str] = &[
    " ate ",
    " eat ",
    " eating ",
    " meal ",
    "breakfast",
    "lunch",
    "dinner",
    "snack",
    "pizza",
    "salad",
    " food ",
    "calorie",
    "protein",
    " carb",
    "fasted",
    "fasting",
];

/// Hydration clause markers.
pub(super) const HYDRATION_MARKER_KW: &[&str] = &[
    "water",
    "hydrat",
    " drank ",
    " drink ",
    "electrolyte",
    " oz ",
    "liter",
    "litre",
];

/// Medication clause markers.
pub(super) const MEDS_MARKER_KW: &[&str] = &[
    " med ",
    " meds ",
    "medication",
    " pill ",
    " dose ",
    "prescription",
    "statin",
    "ezetimibe",
    "lisinopril",
];

/// Supplement clause markers.
pub(super) const SUPPLEMENT_MARKER_KW: &[&str] = &[
    "supplement",
    "creatine",
    "magnesium",
    "berberine",
    "ashwagandha",
    "omega-3",
    "fish oil",
    "vitamin",
];

/// Workout clause markers.
pub(super) const WORKOUT_MARKER_KW: &[&str] = &[
    "workout",
    "trained",
    "training",
    " gym ",
    " lift ",
    "lifted",
    " ran ",
    " run ",
    "walked",
    "zone 2",
    "hiit",
    "exercise",
    "strength",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kw_match_is_substring_containment() {
        assert!(kw_match("i have been feeling faint today", URGENT_SYMPTOM_KW));
        assert!(kw_match("is my creatine timing ok", SUPPLEMENT_TOPIC_KW));
        assert!(!kw_match("how is my weight trend", URGENT_SYMPTOM_KW));
    }

    #[test]
    fn padded_terms_respect_word_edges() {
        let text = padded("drank more water today");
        assert!(kw_match(&text, HYDRATION_MARKER_KW));
        // "water" contains "ate" only as an interior substring; the
        // space-padded food marker must not fire on it.
        assert!(!kw_match(&text, FOOD_MARKER_KW));
    }

    #[test]
    fn hint_set_covers_vitals_shorthand() {
        assert!(kw_match(&padded("bp 128/82 this morning"), UPDATE_HINT_KW));
        assert!(kw_match(&padded("slept 7.5 hours"), UPDATE_HINT_KW));
        assert!(!kw_match(&padded("what should i focus on"), UPDATE_HINT_KW));
    }
}
