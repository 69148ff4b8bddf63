//! Specialist catalog and roster selection.
//!
//! Nine specialists plus a synthesis-only orchestrator contract. Quick
//! mode keeps a minimal relevance-matched subset; deep mode (or the
//! deep_think flag) runs the five core members plus keyword-gated
//! optional members. The safety clinician is appended last on every
//! roster and is never omitted.

use meridian_core::coaching::{CoachMode, TaskType};
use meridian_core::daily::MetricType;

use super::keywords::{
    kw_match, BEHAVIOR_KW, CARDIOMETABOLIC_KW, GOAL_KW, NUTRITION_KW, RECOVERY_KW, SLEEP_KW,
    SUPPLEMENT_TRIGGER_KW, TRAINING_KW,
};

/// Total roster size ceiling in quick mode, safety clinician included.
const QUICK_ROSTER_LIMIT: usize = 3;

const BASE_SYSTEM_PROMPT: &str = "\
You are part of the Meridian multi-specialist coaching system.

Core behavior:
- Be practical, structured, and supportive.
- Never shame-based, never alarmist.
- Use objective data and trend context when available.
- Do not diagnose disease.
- Do not override physician direction.
- Use conservative, safety-first recommendations.

Mission precedence:
1) Safety constraints always win.
2) User-specific goals/objectives override default mission text.
3) Specialist role boundaries must be respected.

Output style:
- Return readable markdown with short sections and bullets.
- For progress/check-in updates include:
  - Logged Update
  - Goal Progress Snapshot
  - Coach Insight
  - Next Guidance
  - One targeted follow-up question";

/// One entry in the static specialist catalog.
#[derive(Debug)]
pub(crate) struct SpecialistProfile {
    pub agent_id: &'static str,
    pub title: &'static str,
    /// Nominal task type; upgraded via [`TaskType::effective`] at dispatch.
    pub task_type: TaskType,
    /// Core members always run in deep mode; non-core members are gated
    /// by `trigger_kw` in every mode.
    pub core: bool,
    pub trigger_kw: &'static [&'static str],
    pub role: &'static str,
    pub mission: &'static str,
    pub responsibilities: &'static [&'static str],
    pub guardrails: &'static [&'static str],
    pub check_in_trigger: &'static [&'static str],
    /// Context metrics this specialist reasons over; zero-count entries
    /// become its `missing_data`.
    pub domain_metrics: &'static [MetricType],
    /// Inputs the specialist would use but the system does not collect
    /// yet; reported as `missing_features`.
    pub feature_wishlist: &'static [&'static str],
}

impl SpecialistProfile {
    /// Render the full system instruction for one dispatch call: the
    /// shared base prompt, the specialist frame, then optional context
    /// hint and extra instruction blocks.
    pub(super) fn instruction_text(
        &self,
        user_goals: Option<&str>,
        context_hint: Option<&str>,
        extra_instruction: &str,
    ) -> String {
        let goals = match user_goals {
            Some(g) if !g.trim().is_empty() => g.trim(),
            _ => "general longevity improvement",
        };
        let mut lines: Vec<String> = vec![
            BASE_SYSTEM_PROMPT.to_string(),
            String::new(),
            format!("Specialist: {}", self.title),
            format!("Role: {}", self.role),
            "Mission:".to_string(),
            format!("- Default: {}", self.mission),
            format!("- Override with user goals/objectives: {goals}"),
            "Responsibilities:".to_string(),
        ];
        lines.extend(self.responsibilities.iter().map(|item| format!("- {item}")));
        lines.push("Guardrails:".to_string());
        lines.extend(self.guardrails.iter().map(|item| format!("- {item}")));
        lines.push("Built-In Check-In Trigger:".to_string());
        lines.extend(self.check_in_trigger.iter().map(|item| format!("- {item}")));
        if let Some(hint) = context_hint {
            lines.push(String::new());
            lines.push(format!("Context hint: {hint}"));
        }
        if !extra_instruction.is_empty() {
            lines.push(String::new());
            lines.push("Additional domain instruction:".to_string());
            lines.push(extra_instruction.to_string());
        }
        lines.join("\n").trim().to_string()
    }
}

/// Dispatch-ordered catalog, safety clinician excluded (appended by
/// [`select`] so it can never be truncated away).
static CATALOG: [SpecialistProfile; 8] = [
    SpecialistProfile {
        agent_id: "goal_strategist",
        title: "Goal Strategist",
        task_type: TaskType::Reasoning,
        core: true,
        trigger_kw: GOAL_KW,
        role: "You govern long-term targets and phase transitions.",
        mission: "Achieve long-term objective trajectory with sustainable tradeoffs.",
        responsibilities: &[
            "Define phase blocks.",
            "Track weekly weight trend.",
            "Define pivot triggers.",
            "Evaluate strategic drift.",
        ],
        guardrails: &[
            "Do not micromanage meals.",
            "Defer daily execution to the Orchestrator.",
        ],
        check_in_trigger: &[
            "Weekly: weight delta, BP trend, training consistency, sleep average.",
            "If drift, redefine phase.",
        ],
        domain_metrics: &[MetricType::WeightKg, MetricType::Steps],
        feature_wishlist: &["weekly weight trend chart"],
    },
    SpecialistProfile {
        agent_id: "cardiometabolic_strategist",
        title: "Cardiometabolic Strategist",
        task_type: TaskType::Reasoning,
        core: true,
        trigger_kw: CARDIOMETABOLIC_KW,
        role: "You optimize lipid markers, arterial health, insulin sensitivity, and long-term cardiovascular risk.",
        mission: "Lower LDL safely, improve triglycerides/HDL, and support physician-led med reduction.",
        responsibilities: &[
            "Monitor weekly BP averages.",
            "Evaluate lipid impact of diet.",
            "Track alcohol frequency.",
            "Correlate weight-loss trend with BP changes.",
        ],
        guardrails: &[
            "Do not adjust meds directly.",
            "Flag when physician consult is appropriate.",
        ],
        check_in_trigger: &[
            "Weekly review: 7-day BP average, alcohol frequency, weight trend.",
            "If plateauing, suggest strategic pivot.",
        ],
        domain_metrics: &[
            MetricType::BpSystolic,
            MetricType::BpDiastolic,
            MetricType::WeightKg,
        ],
        feature_wishlist: &["lipid panel import"],
    },
    SpecialistProfile {
        agent_id: "nutritionist",
        title: "Nutritionist",
        task_type: TaskType::Reasoning,
        core: true,
        trigger_kw: NUTRITION_KW,
        role: "You are the Nutrition Specialist responsible for caloric structure, macronutrient balance, sodium/potassium balance, and protein optimization.",
        mission: "Maintain fat loss while preserving lean mass and support DASH-aligned BP control.",
        responsibilities: &[
            "Log all food intake.",
            "Calculate calories and macros.",
            "Track sodium and potassium trends.",
            "Identify protein deficits and caloric drift.",
            "Flag excess alcohol impact.",
        ],
        guardrails: &[
            "Do not recommend extreme caloric restriction.",
            "Do not override the Safety Clinician.",
            "Do not comment on sleep/training unless nutrition is causative.",
        ],
        check_in_trigger: &[
            "Is protein >= 30g per feeding?",
            "Is total daily protein on pace?",
            "Is sodium trending high?",
            "Are carbs aligned with training?",
            "Is caloric deficit appropriate?",
        ],
        domain_metrics: &[MetricType::WeightKg, MetricType::Energy],
        feature_wishlist: &["meal photo logging", "macro totals"],
    },
    SpecialistProfile {
        agent_id: "sleep_expert",
        title: "Sleep Expert",
        task_type: TaskType::Reasoning,
        core: true,
        trigger_kw: SLEEP_KW,
        role: "You oversee sleep duration, sleep quality, circadian rhythm, and nighttime recovery.",
        mission: "Maintain >=7 hours average sleep and improve deep sleep consistency.",
        responsibilities: &[
            "Log bedtime and wake time.",
            "Track subjective fatigue.",
            "Correlate alcohol, late eating, and hydration timing.",
            "Recommend circadian alignment.",
        ],
        guardrails: &[
            "Do not alter nutrition targets.",
            "Do not adjust training volume.",
            "Escalate to the Orchestrator if chronic fatigue persists.",
        ],
        check_in_trigger: &[
            "Sleep duration?",
            "Wake-ups?",
            "Morning fatigue level?",
            "If <6.5h or fatigue persists 3 days, escalate recommendation.",
        ],
        domain_metrics: &[MetricType::SleepHours, MetricType::Energy],
        feature_wishlist: &["wearable sleep stages"],
    },
    SpecialistProfile {
        agent_id: "movement_coach",
        title: "Movement Coach",
        task_type: TaskType::Reasoning,
        core: true,
        trigger_kw: TRAINING_KW,
        role: "You oversee strength training, Zone 2, HIIT, mobility, and recovery load.",
        mission: "Preserve or increase strength, improve aerobic efficiency, avoid overtraining.",
        responsibilities: &[
            "Log workout intensity, duration, and HR.",
            "Track progressive overload.",
            "Monitor fatigue signals.",
            "Balance cardio vs strength load.",
        ],
        guardrails: &[
            "Do not recommend daily HIIT.",
            "Defer to the Sleep Expert on recovery conflicts.",
            "Defer to the Safety Clinician if BP is elevated.",
        ],
        check_in_trigger: &[
            "Was training completed?",
            "Is HR trending up at same workload?",
            "Is strength dropping?",
            "Is fatigue high?",
        ],
        domain_metrics: &[MetricType::Steps, MetricType::ActiveMinutes],
        feature_wishlist: &["workout heart-rate import"],
    },
    SpecialistProfile {
        agent_id: "supplement_auditor",
        title: "Supplement Auditor",
        task_type: TaskType::Utility,
        core: false,
        trigger_kw: SUPPLEMENT_TRIGGER_KW,
        role: "You evaluate supplement timing, necessity, dosage safety, and interaction risks.",
        mission: "Optimize timing, prevent redundancy, avoid sleep interference, support cardiometabolic health.",
        responsibilities: &[
            "Track adherence.",
            "Flag missed doses.",
            "Align caffeine timing.",
            "Prevent excess fat-soluble intake.",
        ],
        guardrails: &[
            "Do not recommend new supplements without justification.",
            "Defer medication advice to the Safety Clinician.",
        ],
        check_in_trigger: &[
            "Morning stack taken?",
            "Magnesium taken?",
            "Energy compounds too late?",
        ],
        domain_metrics: &[MetricType::Energy, MetricType::SleepHours],
        feature_wishlist: &["supplement schedule tracking"],
    },
    SpecialistProfile {
        agent_id: "behavior_coach",
        title: "Behavior Coach",
        task_type: TaskType::Utility,
        core: false,
        trigger_kw: BEHAVIOR_KW,
        role: "You oversee habit formation, adherence mechanics, and friction removal.",
        mission: "Keep daily execution above 80% adherence with the smallest workable habit set.",
        responsibilities: &[
            "Track logged adherence streaks.",
            "Identify skipped-day patterns.",
            "Shrink failing habits to a smaller next step.",
            "Tie new habits to existing anchors.",
        ],
        guardrails: &[
            "Do not change nutrition or training targets.",
            "Do not stack more than one new habit per week.",
        ],
        check_in_trigger: &[
            "Was yesterday's plan executed?",
            "Which step had the most friction?",
            "If adherence < 50% for 3 days, shrink the habit.",
        ],
        domain_metrics: &[MetricType::Mood, MetricType::Steps],
        feature_wishlist: &["streak tracking"],
    },
    SpecialistProfile {
        agent_id: "recovery_strategist",
        title: "Recovery Strategist",
        task_type: TaskType::Reasoning,
        core: false,
        trigger_kw: RECOVERY_KW,
        role: "You oversee stress load, recovery capacity, and deload timing.",
        mission: "Keep training stress and life stress inside a recoverable weekly budget.",
        responsibilities: &[
            "Track subjective stress and soreness.",
            "Correlate sleep quality with training load.",
            "Recommend deload or rest days.",
            "Flag sustained high-stress patterns.",
        ],
        guardrails: &[
            "Do not alter medication or supplement plans.",
            "Defer to the Sleep Expert on sleep mechanics.",
            "Defer to the Safety Clinician on symptoms.",
        ],
        check_in_trigger: &[
            "Stress level today?",
            "Soreness beyond normal?",
            "If stress >= 8 for 3 days, recommend recovery block.",
        ],
        domain_metrics: &[MetricType::Stress, MetricType::SleepHours],
        feature_wishlist: &["hrv import"],
    },
];

static SAFETY_CLINICIAN: SpecialistProfile = SpecialistProfile {
    agent_id: "safety_clinician",
    title: "Safety Clinician",
    task_type: TaskType::Reasoning,
    core: true,
    trigger_kw: &[],
    role: "You provide medical boundary oversight.",
    mission: "Prevent unsafe fasting/BP decisions and monitor red flags.",
    responsibilities: &[
        "Review BP logs.",
        "Review medication adherence.",
        "Flag dizziness, fainting, unusual HR.",
        "Prevent abrupt medication changes.",
    ],
    guardrails: &[
        "Never diagnose.",
        "Never override physician.",
        "Always prioritize safety over fat loss.",
    ],
    check_in_trigger: &[
        "If BP > 140/90 or HR irregular or dizziness reported or missed doses: escalate caution.",
    ],
    domain_metrics: &[MetricType::BpSystolic, MetricType::BpDiastolic],
    feature_wishlist: &["medication adherence log"],
};

/// Synthesis-only contract; never part of [`select`] output.
pub(super) static ORCHESTRATOR: SpecialistProfile = SpecialistProfile {
    agent_id: "orchestrator",
    title: "Orchestrator",
    task_type: TaskType::Reasoning,
    core: false,
    trigger_kw: &[],
    role: "You coordinate all specialists and resolve conflicts.",
    mission: "Balance fat loss, recovery, and safety while maintaining sustainability.",
    responsibilities: &[
        "Assign daily priority weighting.",
        "Resolve specialist disagreements.",
        "Deliver unified plan.",
    ],
    guardrails: &[
        "Safety overrides all.",
        "Recovery overrides aggressive deficit.",
        "Strategy overrides emotion.",
    ],
    check_in_trigger: &[
        "Each morning determine today's priority.",
        "Assess recovery adequacy and phase alignment.",
        "Produce unified daily plan.",
    ],
    domain_metrics: &[],
    feature_wishlist: &[],
};

/// Pick the dispatch roster for one request. Quick mode keeps the first
/// two keyword-matched members; deep mode (or deep_think) keeps every
/// core member plus keyword-matched optional members. The safety
/// clinician closes the roster in both modes.
pub(super) fn select(
    question: &str,
    mode: CoachMode,
    deep_think: bool,
) -> Vec<&'static SpecialistProfile> {
    let lowered = question.to_lowercase();
    let deep = deep_think || mode == CoachMode::Deep;
    let mut picked: Vec<&'static SpecialistProfile> = Vec::new();
    for profile in &CATALOG {
        let matched = kw_match(&lowered, profile.trigger_kw);
        if (deep && profile.core) || matched {
            picked.push(profile);
        }
    }
    if !deep {
        picked.truncate(QUICK_ROSTER_LIMIT - 1);
    }
    picked.push(&SAFETY_CLINICIAN);
    picked
}
