use serde::{Deserialize, Serialize};

use crate::error::MeridianError;

/// Maximum length kept for any free-text fragment pulled out of an update.
pub const FRAGMENT_MAX_LEN: usize = 280;

/// Categories of day events the extractor recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Food,
    Hydration,
    Medication,
    Supplement,
    Workout,
    Sleep,
    Weight,
    BloodPressure,
    HeartRate,
    Fasting,
    Note,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Food => "food",
            EventType::Hydration => "hydration",
            EventType::Medication => "medication",
            EventType::Supplement => "supplement",
            EventType::Workout => "workout",
            EventType::Sleep => "sleep",
            EventType::Weight => "weight",
            EventType::BloodPressure => "blood_pressure",
            EventType::HeartRate => "heart_rate",
            EventType::Fasting => "fasting",
            EventType::Note => "note",
        }
    }
}

impl std::str::FromStr for EventType {
    type Err = MeridianError;

    /// Model output uses these literal names; anything else is rejected so
    /// the caller can drop the event instead of storing junk.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "food" => Ok(EventType::Food),
            "hydration" => Ok(EventType::Hydration),
            "medication" => Ok(EventType::Medication),
            "supplement" => Ok(EventType::Supplement),
            "workout" => Ok(EventType::Workout),
            "sleep" => Ok(EventType::Sleep),
            "weight" => Ok(EventType::Weight),
            "blood_pressure" => Ok(EventType::BloodPressure),
            "heart_rate" => Ok(EventType::HeartRate),
            "fasting" => Ok(EventType::Fasting),
            "note" => Ok(EventType::Note),
            other => Err(MeridianError::Invalid(format!(
                "unknown event type: {other}"
            ))),
        }
    }
}

/// One discrete event pulled out of a free-text update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSignal {
    pub event_type: EventType,
    pub details: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    /// Original timestamp text if the update mentioned one.
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Day-level rollup fields. Everything is optional; only fields the update
/// actually mentioned are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rollup {
    #[serde(default)]
    pub sleep_hours: Option<f64>,
    #[serde(default)]
    pub energy: Option<f64>,
    #[serde(default)]
    pub mood: Option<f64>,
    #[serde(default)]
    pub stress: Option<f64>,
    #[serde(default)]
    pub training_done: Option<bool>,
    #[serde(default)]
    pub nutrition_on_plan: Option<bool>,
    #[serde(default)]
    pub hydration_progress: Option<String>,
    #[serde(default)]
    pub meds_taken: Option<String>,
    #[serde(default)]
    pub supplements_taken: Option<String>,
    #[serde(default)]
    pub nutrition_food_details: Option<String>,
    #[serde(default)]
    pub training_details: Option<String>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub bp_systolic: Option<f64>,
    #[serde(default)]
    pub bp_diastolic: Option<f64>,
    #[serde(default)]
    pub resting_hr_bpm: Option<f64>,
}

impl Rollup {
    pub fn is_empty(&self) -> bool {
        self == &Rollup::default()
    }
}

/// How the extraction pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStatus {
    /// Model output validated cleanly.
    Ok,
    /// Pre-filter found no update-like terms; no model call was made.
    SkippedNoHint,
    /// Model call failed; heuristic fallback was used.
    ModelFailed,
    /// Model replied with something other than a JSON object.
    NotAnObject,
    /// Model object carried no usable fields.
    EmptyPayload,
}

impl ParseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseStatus::Ok => "ok",
            ParseStatus::SkippedNoHint => "skipped_no_hint",
            ParseStatus::ModelFailed => "model_failed",
            ParseStatus::NotAnObject => "not_an_object",
            ParseStatus::EmptyPayload => "empty_payload",
        }
    }
}

/// Which hint categories the raw text matched. Used for the contamination
/// guard and for tagging unparsed updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFlags {
    pub food: bool,
    pub hydration: bool,
    pub meds: bool,
    pub supplements: bool,
    pub workout: bool,
}

impl CategoryFlags {
    pub fn any(&self) -> bool {
        self.food || self.hydration || self.meds || self.supplements || self.workout
    }

    /// Names of the set flags, for storage alongside unparsed text.
    pub fn names(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.food {
            out.push("food");
        }
        if self.hydration {
            out.push("hydration");
        }
        if self.meds {
            out.push("meds");
        }
        if self.supplements {
            out.push("supplements");
        }
        if self.workout {
            out.push("workout");
        }
        out
    }
}

/// Full result of one extraction pass over a raw update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    /// Whether the text looked like a progress update at all.
    pub has_update: bool,
    pub signals: Vec<ExtractedSignal>,
    pub rollup: Rollup,
    pub parse_status: ParseStatus,
    pub category_flags: CategoryFlags,
}

impl Extraction {
    /// The "nothing here" result for text that never reached the model.
    pub fn skipped() -> Self {
        Extraction {
            has_update: false,
            signals: Vec::new(),
            rollup: Rollup::default(),
            parse_status: ParseStatus::SkippedNoHint,
            category_flags: CategoryFlags::default(),
        }
    }
}
