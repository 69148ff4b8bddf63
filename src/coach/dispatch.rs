//! Sequential specialist dispatch and synthesis.
//!
//! Specialists run strictly in roster order; each prompt carries every
//! prior output so later members can react to earlier findings. One
//! synthesis call closes the run and produces the canonical response.
//! Any model failure anywhere in the sequence aborts with the typed
//! error; fallback substitution belongs to the orchestrator, not this
//! loop.

use meridian_core::coaching::{AgentOutput, CoachingRequest, CoachingResponse, TaskType};
use meridian_core::context::CoachingContext;
use meridian_core::error::MeridianError;
use meridian_core::traits::{FeedbackSink, ModelClient};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::normalize::{
    fallback_actions, fallback_questions, model_path_bullets, normalize, safe_actions, safe_list,
};
use super::roster::{self, SpecialistProfile, ORCHESTRATOR};

/// Extra instruction appended to the orchestrator frame for the final
/// synthesis call.
const SYNTHESIS_PRIORITY: &str = "\
You are the final synthesis step. Merge the specialist outputs into one \
unified, actionable coaching answer. Priority order for conflicts: safety \
findings override cardiometabolic and sleep risk findings; cardiometabolic \
and sleep risk findings override movement and nutrition optimization \
findings.";

fn build_prompt(
    request: &CoachingRequest,
    context: &CoachingContext,
    prior: &[AgentOutput],
    missing_data: &[String],
) -> Result<String, MeridianError> {
    let prior_outputs: Vec<Value> = prior
        .iter()
        .map(|output| {
            json!({
                "agent_id": output.agent_id,
                "title": output.title,
                "answer": output.answer,
                "rationale_bullets": output.rationale_bullets,
                "safety_flags": output.safety_flags,
            })
        })
        .collect();
    let body = json!({
        "question": request.question,
        "context_hint": request.context_hint,
        "context": context.to_prompt_value(),
        "prior_agent_outputs": prior_outputs,
        "missing_data": missing_data,
        "instructions": {
            "tone": "warm, practical, science-informed, never shame-based",
            "mode": request.mode.as_str(),
            "must_include": [
                "answer",
                "rationale_bullets (3-7)",
                "recommended_actions (1-3 items with title + steps)",
                "suggested_questions (3-8)",
                "safety_flags",
            ],
        },
    });
    Ok(serde_json::to_string(&body)?)
}

/// Shape one specialist reply into an [`AgentOutput`]. Lists self-heal
/// the same way the final response does; a missing answer stays empty
/// rather than aborting a run the synthesis step may still rescue.
fn coerce_output(
    profile: &SpecialistProfile,
    task_type: TaskType,
    raw: &Value,
    missing_data: Vec<String>,
) -> AgentOutput {
    let answer = raw
        .get("answer")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    let mut recommended_actions = safe_actions(raw.get("recommended_actions"));
    if recommended_actions.is_empty() {
        recommended_actions = fallback_actions();
    }
    AgentOutput {
        agent_id: profile.agent_id.to_string(),
        title: profile.title.to_string(),
        task_type,
        answer,
        rationale_bullets: safe_list(raw.get("rationale_bullets"), 3, 7, model_path_bullets()),
        recommended_actions,
        suggested_questions: safe_list(raw.get("suggested_questions"), 3, 8, fallback_questions()),
        safety_flags: safe_list(raw.get("safety_flags"), 0, 8, Vec::new()),
        missing_data,
        missing_features: profile
            .feature_wishlist
            .iter()
            .map(|s| s.to_string())
            .collect(),
    }
}

/// Report a specialist's input gaps to the feedback sink. The sink
/// deduplicates per (user, title) inside the window; sink failures are
/// logged and never abort the run.
async fn report_gaps(
    feedback: &dyn FeedbackSink,
    user_id: i64,
    profile: &SpecialistProfile,
    missing_data: &[String],
) {
    let mut parts = Vec::new();
    if !missing_data.is_empty() {
        parts.push(format!("missing data: {}", missing_data.join(", ")));
    }
    if !profile.feature_wishlist.is_empty() {
        parts.push(format!(
            "missing features: {}",
            profile.feature_wishlist.join(", ")
        ));
    }
    let title = format!("{}: missing data", profile.title);
    match feedback
        .record(user_id, &title, &parts.join("; "), chrono::Duration::hours(24))
        .await
    {
        Ok(true) => debug!(specialist = profile.title, "reported specialist input gaps"),
        Ok(false) => {}
        Err(err) => warn!(
            error = %err,
            specialist = profile.title,
            "feedback sink rejected input-gap report"
        ),
    }
}

/// Run the full dispatch sequence for one request and return the
/// synthesized response plus the complete agent trace (orchestrator
/// entry last).
pub(super) async fn run(
    model: &dyn ModelClient,
    feedback: &dyn FeedbackSink,
    request: &CoachingRequest,
    context: &CoachingContext,
    user_goals: Option<&str>,
) -> Result<(CoachingResponse, Vec<AgentOutput>), MeridianError> {
    let roster = roster::select(&request.question, request.mode, request.deep_think);
    debug!(
        user_id = request.user_id,
        roster_len = roster.len(),
        mode = request.mode.as_str(),
        deep_think = request.deep_think,
        "dispatching specialist roster"
    );

    let mut outputs: Vec<AgentOutput> = Vec::with_capacity(roster.len() + 1);
    for profile in &roster {
        let missing_data = context.missing_of(profile.domain_metrics);
        if !missing_data.is_empty() || !profile.feature_wishlist.is_empty() {
            report_gaps(feedback, request.user_id, profile, &missing_data).await;
        }
        let prompt = build_prompt(request, context, &outputs, &missing_data)?;
        let instruction =
            profile.instruction_text(user_goals, request.context_hint.as_deref(), "");
        let task = profile.task_type.effective(request.deep_think);
        let raw = model.generate_json(&prompt, task, Some(&instruction)).await?;
        outputs.push(coerce_output(profile, task, &raw, missing_data));
    }

    let prompt = build_prompt(request, context, &outputs, &[])?;
    let instruction = ORCHESTRATOR.instruction_text(
        user_goals,
        request.context_hint.as_deref(),
        SYNTHESIS_PRIORITY,
    );
    let task = ORCHESTRATOR.task_type.effective(request.deep_think);
    let raw = model.generate_json(&prompt, task, Some(&instruction)).await?;
    let response = normalize(&raw, request.mode)?;
    outputs.push(coerce_output(&ORCHESTRATOR, task, &raw, Vec::new()));
    Ok((response, outputs))
}
