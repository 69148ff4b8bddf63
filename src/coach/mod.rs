//! The coaching pipeline.
//!
//! One entry point, [`Coach::answer_question`], runs the full flow:
//! sanitize, cache lookup, safety gate, signal extraction into the daily
//! log, context build, sequential specialist dispatch with synthesis,
//! supplement caution layering, persistence, cache fill. Model failures
//! never surface to the caller; every path ends in a structurally
//! complete response. [`Coach::log_update`] exposes extraction and the
//! daily merge on their own for explicit check-ins.

mod cache;
mod dispatch;
mod extract;
mod keywords;
mod merge;
mod normalize;
mod roster;
mod safety;

use std::sync::Arc;

use chrono::Utc;
use meridian_core::coaching::{CoachingRequest, CoachingResponse, DISCLAIMER};
use meridian_core::config::Config;
use meridian_core::context::CoachingContext;
use meridian_core::daily::DailyAggregate;
use meridian_core::error::{MeridianError, ModelErrorKind};
use meridian_core::sanitize::{sanitize_hint, sanitize_question};
use meridian_core::signal::{Extraction, ParseStatus};
use meridian_core::traits::ModelClient;
use meridian_store::{format_ts, today, Store};
use tracing::{info, warn};
use uuid::Uuid;

use self::cache::ResponseCache;

/// Guidance returned when the user has not completed baseline intake.
const BASELINE_MISSING_ANSWER: &str = "I can give more precise guidance once your baseline is \
complete. Please complete baseline intake first, then ask this again for personalized coaching.";

/// Result of running one free-text update through extraction and the
/// daily merge.
pub struct LogOutcome {
    pub extraction: Extraction,
    pub aggregate: DailyAggregate,
}

/// A complete fallback response: fixed answer text plus the caller-owned
/// fallback lists, so no failure path ever returns partial fields.
fn fallback_response(answer: &str, safety_flags: Vec<String>) -> CoachingResponse {
    CoachingResponse {
        answer: answer.to_string(),
        rationale_bullets: normalize::fallback_bullets(),
        recommended_actions: normalize::fallback_actions(),
        suggested_questions: normalize::fallback_questions(),
        safety_flags,
        disclaimer: DISCLAIMER.to_string(),
        thread_id: None,
        agent_trace: Vec::new(),
    }
}

fn fallback_for_kind(kind: ModelErrorKind) -> CoachingResponse {
    let answer = match kind {
        ModelErrorKind::AuthError | ModelErrorKind::ModelNotFound => {
            "I could not reach the coaching model with the current configuration. \
             A practical next step is below while access is restored."
        }
        ModelErrorKind::RateLimited => {
            "I hit provider limits while generating your full coaching response. \
             Please retry shortly; a practical next step is below."
        }
        ModelErrorKind::ProviderError | ModelErrorKind::Unavailable => {
            "I could not generate a full coaching response right now. \
             Please retry in a moment, and I can still help with a practical next step."
        }
    };
    fallback_response(answer, vec![kind.flag().to_string()])
}

/// Append the supplement caution to any response: the flag joins the
/// set and the caution closes the rationale list, keeping it within
/// the seven-bullet bound.
fn apply_supplement_caution(response: &mut CoachingResponse) {
    if !response.safety_flags.iter().any(|f| f == "supplement_caution") {
        response.safety_flags.push("supplement_caution".to_string());
    }
    response.rationale_bullets.truncate(6);
    response
        .rationale_bullets
        .push(safety::supplement_caution_text().to_string());
}

pub struct Coach {
    store: Store,
    model: Arc<dyn ModelClient>,
    cache: ResponseCache,
    events_kept: usize,
    recent_conversations: usize,
}

impl Coach {
    pub fn new(store: Store, model: Arc<dyn ModelClient>, config: &Config) -> Self {
        Coach {
            store,
            model,
            cache: ResponseCache::new(config.cache.ttl_secs),
            events_kept: config.coach.events_kept,
            recent_conversations: config.coach.recent_conversations,
        }
    }

    /// Answer one coaching question end to end.
    pub async fn answer_question(
        &self,
        request: CoachingRequest,
    ) -> Result<CoachingResponse, MeridianError> {
        let request_id = Uuid::new_v4();
        let question = sanitize_question(&request.question)?;
        let context_hint = sanitize_hint(request.context_hint.as_deref());
        let request = CoachingRequest {
            question,
            context_hint,
            ..request
        };
        info!(
            request_id = %request_id,
            user_id = request.user_id,
            mode = request.mode.as_str(),
            deep_think = request.deep_think,
            "coach question received"
        );

        // A cache hit bypasses everything; the stored response was
        // safety-checked when first produced.
        if let Some(cached) = self
            .cache
            .get(request.user_id, &request.question, request.mode, request.deep_think)
            .await
        {
            info!(request_id = %request_id, "answer served from cache");
            return Ok(cached);
        }

        let urgent_flags = safety::detect_urgent_flags(&request.question);
        if !urgent_flags.is_empty() {
            warn!(
                request_id = %request_id,
                user_id = request.user_id,
                "urgent symptom language detected, returning emergency guidance"
            );
            let mut response = safety::emergency_response();
            let tags = vec!["safety".to_string(), "urgent".to_string()];
            let thread_id = self.persist_exchange(&request, &response, &tags).await?;
            response.thread_id = Some(thread_id);
            return Ok(response);
        }

        // The question may itself carry loggable updates ("slept 6h,
        // how do I improve?"). Extraction failures never block coaching.
        if let Err(err) = self.ingest_update(request.user_id, &request.question).await {
            warn!(
                request_id = %request_id,
                error = %err,
                "signal extraction failed, continuing without daily-log update"
            );
        }

        let context = self
            .store
            .build_context(request.user_id, self.recent_conversations)
            .await?;

        if !context.baseline_present {
            info!(request_id = %request_id, "baseline missing, returning intake guidance");
            let mut response =
                fallback_response(BASELINE_MISSING_ANSWER, vec!["baseline_missing".to_string()]);
            let tags = self.tags_for(&request, &context);
            let thread_id = self.persist_exchange(&request, &response, &tags).await?;
            response.thread_id = Some(thread_id);
            return Ok(response);
        }

        let user_goals = context
            .baseline
            .as_ref()
            .and_then(|b| b.primary_goal.as_deref());
        let dispatched = dispatch::run(
            self.model.as_ref(),
            &self.store,
            &request,
            &context,
            user_goals,
        )
        .await;

        let (mut response, cacheable) = match dispatched {
            Ok((mut response, trace)) => {
                response.agent_trace = trace;
                (response, true)
            }
            Err(err) => {
                let kind = err.model_kind().unwrap_or(ModelErrorKind::Unavailable);
                warn!(
                    request_id = %request_id,
                    error = %err,
                    kind = kind.flag(),
                    "dispatch failed, substituting deterministic fallback"
                );
                (fallback_for_kind(kind), false)
            }
        };

        if safety::has_supplement_topic(&request.question) {
            apply_supplement_caution(&mut response);
        }

        let tags = self.tags_for(&request, &context);
        let thread_id = self.persist_exchange(&request, &response, &tags).await?;
        response.thread_id = Some(thread_id);

        if cacheable {
            self.cache
                .set(
                    request.user_id,
                    &request.question,
                    request.mode,
                    request.deep_think,
                    &response,
                )
                .await;
        }
        info!(
            request_id = %request_id,
            cached = cacheable,
            flags = response.safety_flags.join(",").as_str(),
            "coach answer ready"
        );
        Ok(response)
    }

    /// Run one free-text update through extraction and the daily merge.
    /// Returns `None` when the text carries no update hints at all.
    pub async fn log_update(
        &self,
        user_id: i64,
        raw_text: &str,
    ) -> Result<Option<LogOutcome>, MeridianError> {
        let text = sanitize_question(raw_text)?;
        self.ingest_update(user_id, &text).await
    }

    async fn ingest_update(
        &self,
        user_id: i64,
        text: &str,
    ) -> Result<Option<LogOutcome>, MeridianError> {
        let extraction = extract::extract(self.model.as_ref(), text).await;
        if extraction.parse_status == ParseStatus::SkippedNoHint {
            return Ok(None);
        }
        let now = Utc::now();
        let date = today();
        let day = self.store.get_daily(user_id, &date).await?;
        let outcome = merge::merge_extraction(day, text, &extraction, &format_ts(now), self.events_kept);
        self.store
            .commit_daily(&outcome.aggregate, &outcome.measurements, now)
            .await?;
        info!(
            user_id,
            date = date.as_str(),
            parse_status = extraction.parse_status.as_str(),
            measurements = outcome.measurements.len(),
            "daily log updated from free text"
        );
        Ok(Some(LogOutcome {
            extraction,
            aggregate: outcome.aggregate,
        }))
    }

    fn tags_for(&self, request: &CoachingRequest, context: &CoachingContext) -> Vec<String> {
        let mut tags = vec![request.mode.as_str().to_string()];
        if request.deep_think {
            tags.push("deep_think".to_string());
        }
        if let Some(hint) = &request.context_hint {
            tags.push(hint.to_lowercase().replace(' ', "_"));
        }
        if !context.missing_data.is_empty() {
            tags.push("missing_data".to_string());
        }
        tags.truncate(5);
        tags
    }

    /// Persist the conversation summary and chat-thread turn; returns
    /// the thread id the turn landed in.
    async fn persist_exchange(
        &self,
        request: &CoachingRequest,
        response: &CoachingResponse,
        tags: &[String],
    ) -> Result<i64, MeridianError> {
        let trace_json = if response.agent_trace.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&response.agent_trace)?)
        };
        self.store
            .record_summary(
                request.user_id,
                &request.question,
                &response.answer,
                tags,
                &response.safety_flags,
                trace_json.as_deref(),
            )
            .await?;
        let thread_id = self
            .store
            .resolve_thread(request.user_id, request.thread_id, &request.question)
            .await?;
        self.store
            .append_chat_turn(
                thread_id,
                &request.question,
                &response.answer,
                request.mode.as_str(),
            )
            .await?;
        Ok(thread_id)
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use meridian_core::coaching::TaskType;
    use meridian_core::error::{MeridianError, ModelErrorKind};
    use meridian_core::traits::{FeedbackSink, ModelClient};
    use serde_json::{json, Value};

    /// A minimal well-formed specialist reply.
    pub(crate) fn specialist_reply(answer: &str) -> Value {
        json!({
            "answer": answer,
            "rationale_bullets": [
                "Trend data supports this.",
                "Consistency matters more than intensity.",
                "Review again in a week.",
            ],
            "recommended_actions": [
                {"title": "Do one thing", "steps": ["Pick it.", "Do it daily."]}
            ],
            "suggested_questions": [
                "Want a weekly plan?",
                "Want a metric to watch?",
                "Want a check-in template?",
            ],
            "safety_flags": []
        })
    }

    enum Fallback {
        Exhausted,
        Repeat(Value),
        Fail(ModelErrorKind),
    }

    /// Scripted model client recording every call.
    pub(crate) struct MockModel {
        script: Mutex<VecDeque<Result<Value, MeridianError>>>,
        fallback: Fallback,
        prompts: Mutex<Vec<String>>,
        instructions: Mutex<Vec<Option<String>>>,
        tasks: Mutex<Vec<TaskType>>,
    }

    impl MockModel {
        fn build(script: Vec<Result<Value, MeridianError>>, fallback: Fallback) -> Self {
            MockModel {
                script: Mutex::new(script.into_iter().collect()),
                fallback,
                prompts: Mutex::new(Vec::new()),
                instructions: Mutex::new(Vec::new()),
                tasks: Mutex::new(Vec::new()),
            }
        }

        /// Replies in order; errors once the script runs out.
        pub(crate) fn scripted(script: Vec<Result<Value, MeridianError>>) -> Self {
            Self::build(script, Fallback::Exhausted)
        }

        /// The same reply for every call.
        pub(crate) fn repeating(value: Value) -> Self {
            Self::build(Vec::new(), Fallback::Repeat(value))
        }

        /// Every call fails with the given kind.
        pub(crate) fn failing(kind: ModelErrorKind) -> Self {
            Self::build(Vec::new(), Fallback::Fail(kind))
        }

        pub(crate) fn call_count(&self) -> usize {
            self.tasks.lock().unwrap().len()
        }

        pub(crate) fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }

        pub(crate) fn instructions(&self) -> Vec<Option<String>> {
            self.instructions.lock().unwrap().clone()
        }

        pub(crate) fn tasks(&self) -> Vec<TaskType> {
            self.tasks.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelClient for MockModel {
        fn name(&self) -> &str {
            "mock"
        }

        async fn generate_json(
            &self,
            prompt: &str,
            task_type: TaskType,
            system_instruction: Option<&str>,
        ) -> Result<Value, MeridianError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.instructions
                .lock()
                .unwrap()
                .push(system_instruction.map(str::to_string));
            self.tasks.lock().unwrap().push(task_type);
            if let Some(reply) = self.script.lock().unwrap().pop_front() {
                return reply;
            }
            match &self.fallback {
                Fallback::Repeat(value) => Ok(value.clone()),
                Fallback::Fail(kind) => Err(MeridianError::model(*kind, "scripted failure")),
                Fallback::Exhausted => Err(MeridianError::model(
                    ModelErrorKind::Unavailable,
                    "mock script exhausted",
                )),
            }
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    /// Feedback sink recording titles, optionally failing every call.
    #[derive(Default)]
    pub(crate) struct MockFeedback {
        titles: Mutex<Vec<String>>,
        fail: bool,
    }

    impl MockFeedback {
        pub(crate) fn failing() -> Self {
            MockFeedback {
                titles: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub(crate) fn titles(&self) -> Vec<String> {
            self.titles.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FeedbackSink for MockFeedback {
        async fn record(
            &self,
            _user_id: i64,
            title: &str,
            _details: &str,
            _dedupe_window: chrono::Duration,
        ) -> Result<bool, MeridianError> {
            if self.fail {
                return Err(MeridianError::Store("feedback sink offline".to_string()));
            }
            self.titles.lock().unwrap().push(title.to_string());
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::{specialist_reply, MockModel};
    use super::*;
    use meridian_core::coaching::CoachMode;
    use meridian_core::daily::{MetricType, EVENTS_KEPT_DEFAULT};
    use meridian_store::BaselineRecord;
    use serde_json::json;

    async fn coach_with(model: Arc<MockModel>, ttl_secs: i64, with_baseline: bool) -> Coach {
        let store = Store::in_memory().await.unwrap();
        if with_baseline {
            store
                .upsert_baseline(&BaselineRecord {
                    user_id: 1,
                    primary_goal: Some("steady fat loss".into()),
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        Coach {
            store,
            model,
            cache: ResponseCache::new(ttl_secs),
            events_kept: EVENTS_KEPT_DEFAULT,
            recent_conversations: 3,
        }
    }

    fn request(question: &str) -> CoachingRequest {
        CoachingRequest {
            user_id: 1,
            question: question.to_string(),
            mode: CoachMode::Quick,
            deep_think: false,
            context_hint: None,
            thread_id: None,
        }
    }

    #[tokio::test]
    async fn urgent_language_short_circuits_without_model_calls() {
        let model = Arc::new(MockModel::failing(ModelErrorKind::Unavailable));
        let coach = coach_with(model.clone(), 75, true).await;

        let response = coach
            .answer_question(request("I have chest pain since this morning"))
            .await
            .unwrap();

        assert_eq!(model.call_count(), 0);
        assert_eq!(response.safety_flags, vec!["urgent_symptom_language".to_string()]);
        assert!(response.answer.contains("emergency services"));
        assert!(response.thread_id.is_some());

        let summaries = coach.store.recent_summaries(1, 5).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].tags, "safety,urgent");
    }

    #[tokio::test]
    async fn every_error_kind_yields_a_complete_fallback() {
        for kind in [
            ModelErrorKind::AuthError,
            ModelErrorKind::ModelNotFound,
            ModelErrorKind::RateLimited,
            ModelErrorKind::ProviderError,
            ModelErrorKind::Unavailable,
        ] {
            let model = Arc::new(MockModel::failing(kind));
            let coach = coach_with(model.clone(), 75, true).await;

            let response = coach
                .answer_question(request("what should my focus be this week"))
                .await
                .unwrap();

            assert!(!response.answer.is_empty(), "{kind:?}");
            assert!(
                (3..=7).contains(&response.rationale_bullets.len()),
                "{kind:?}"
            );
            assert!(
                (3..=8).contains(&response.suggested_questions.len()),
                "{kind:?}"
            );
            assert!(!response.recommended_actions.is_empty(), "{kind:?}");
            assert!(response.recommended_actions.len() <= 3, "{kind:?}");
            assert!(
                response.safety_flags.contains(&kind.flag().to_string()),
                "{kind:?}"
            );
            if kind == ModelErrorKind::RateLimited {
                assert!(response.answer.contains("provider limits"));
            }
        }
    }

    #[tokio::test]
    async fn cache_hit_returns_identical_answer_without_recompute() {
        let model = Arc::new(MockModel::repeating(specialist_reply("keep it simple")));
        let coach = coach_with(model.clone(), 75, true).await;

        let first = coach
            .answer_question(request("what is the best next focus for me"))
            .await
            .unwrap();
        let calls_after_first = model.call_count();

        let second = coach
            .answer_question(request("What  is the BEST next focus for me"))
            .await
            .unwrap();

        assert_eq!(model.call_count(), calls_after_first);
        assert_eq!(first.answer, second.answer);
    }

    #[tokio::test]
    async fn expired_cache_entry_triggers_recompute() {
        let model = Arc::new(MockModel::repeating(specialist_reply("keep it simple")));
        let coach = coach_with(model.clone(), 75, true).await;
        let question = "what is the best next focus for me";

        coach.answer_question(request(question)).await.unwrap();
        let calls_after_first = model.call_count();
        coach
            .cache
            .backdate(1, question, CoachMode::Quick, false, std::time::Duration::from_secs(76))
            .await;

        coach.answer_question(request(question)).await.unwrap();
        assert_eq!(model.call_count(), calls_after_first * 2);
    }

    #[tokio::test]
    async fn disabled_cache_always_recomputes() {
        let model = Arc::new(MockModel::repeating(specialist_reply("keep it simple")));
        let coach = coach_with(model.clone(), 0, true).await;
        let question = "what is the best next focus for me";

        coach.answer_question(request(question)).await.unwrap();
        let calls_after_first = model.call_count();
        coach.answer_question(request(question)).await.unwrap();
        assert_eq!(model.call_count(), calls_after_first * 2);
    }

    #[tokio::test]
    async fn missing_baseline_bypasses_dispatch() {
        let model = Arc::new(MockModel::failing(ModelErrorKind::Unavailable));
        let coach = coach_with(model.clone(), 75, false).await;

        let response = coach
            .answer_question(request("what should my focus be this week"))
            .await
            .unwrap();

        assert_eq!(model.call_count(), 0);
        assert!(response.answer.contains("complete baseline"));
        assert_eq!(response.safety_flags, vec!["baseline_missing".to_string()]);
        assert!((3..=7).contains(&response.rationale_bullets.len()));
    }

    #[tokio::test]
    async fn supplement_topic_layers_caution_on_success() {
        let model = Arc::new(MockModel::repeating(specialist_reply("timing looks fine")));
        let coach = coach_with(model.clone(), 75, true).await;

        let response = coach
            .answer_question(request("should I keep creatine in my stack"))
            .await
            .unwrap();

        assert!(response
            .safety_flags
            .contains(&"supplement_caution".to_string()));
        assert_eq!(
            response.rationale_bullets.last().map(String::as_str),
            Some(safety::supplement_caution_text())
        );
        assert!(response.rationale_bullets.len() <= 7);
    }

    #[tokio::test]
    async fn supplement_caution_survives_fallback_paths() {
        let model = Arc::new(MockModel::failing(ModelErrorKind::ProviderError));
        let coach = coach_with(model.clone(), 75, true).await;

        let response = coach
            .answer_question(request("should I keep creatine in my stack"))
            .await
            .unwrap();

        assert!(response
            .safety_flags
            .contains(&"llm_provider_error".to_string()));
        assert!(response
            .safety_flags
            .contains(&"supplement_caution".to_string()));
        assert_eq!(
            response.rationale_bullets.last().map(String::as_str),
            Some(safety::supplement_caution_text())
        );
    }

    #[tokio::test]
    async fn repeated_weight_update_keeps_one_measurement() {
        let payload = json!({
            "has_progress_update": true,
            "events": [
                {"event_type": "weight", "details": "morning weigh-in", "value": 74.8, "unit": "kg"}
            ],
            "rollup": {"weight_kg": 74.8}
        });
        let model = Arc::new(MockModel::repeating(payload));
        let coach = coach_with(model.clone(), 75, true).await;

        let first = coach.log_update(1, "165 lbs this morning").await.unwrap().unwrap();
        assert_eq!(first.extraction.parse_status, ParseStatus::Ok);
        assert!(first.aggregate.answers.contains_key("weight_kg"));

        let second = coach.log_update(1, "165 lbs this morning").await.unwrap().unwrap();
        assert_eq!(second.aggregate.events.len(), first.aggregate.events.len());

        let count = coach.store.metric_count(1, MetricType::WeightKg).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn hint_free_text_is_not_logged() {
        let model = Arc::new(MockModel::failing(ModelErrorKind::Unavailable));
        let coach = coach_with(model.clone(), 75, true).await;

        let outcome = coach.log_update(1, "thanks, that was helpful").await.unwrap();
        assert!(outcome.is_none());
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn thread_id_round_trips_across_turns() {
        let model = Arc::new(MockModel::repeating(specialist_reply("ok")));
        let coach = coach_with(model.clone(), 0, true).await;

        let first = coach
            .answer_question(request("what is the best next focus for me"))
            .await
            .unwrap();
        let thread_id = first.thread_id.unwrap();

        let mut follow_up = request("and after that, what comes next");
        follow_up.thread_id = Some(thread_id);
        let second = coach.answer_question(follow_up).await.unwrap();

        assert_eq!(second.thread_id, Some(thread_id));
        let count = coach.store.thread_message_count(thread_id).await.unwrap();
        assert_eq!(count, 4);
    }

    #[tokio::test]
    async fn tags_capture_mode_hint_and_gaps() {
        let model = Arc::new(MockModel::repeating(specialist_reply("ok")));
        let coach = coach_with(model.clone(), 75, true).await;

        let mut req = request("what is the best next focus for me");
        req.deep_think = true;
        req.context_hint = Some("Focus On Sleep".to_string());
        let response = coach.answer_question(req).await.unwrap();
        assert!(!response.agent_trace.is_empty());
        assert_eq!(response.agent_trace.last().unwrap().agent_id, "orchestrator");

        let summaries = coach.store.recent_summaries(1, 5).await.unwrap();
        let tags = &summaries[0].tags;
        assert!(tags.contains("quick"));
        assert!(tags.contains("deep_think"));
        assert!(tags.contains("focus_on_sleep"));
        // A fresh store has no metrics, so the context reports gaps.
        assert!(tags.contains("missing_data"));
    }
}
