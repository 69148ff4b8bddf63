use super::conversations::derive_thread_title;
use super::{BaselineRecord, Store};
use chrono::{Duration, TimeZone, Utc};
use meridian_core::daily::{AnswerEntry, DailyAggregate, DayEvent, MetricType};
use meridian_core::signal::EventType;
use meridian_core::traits::FeedbackSink;

async fn test_store() -> Store {
    Store::in_memory().await.unwrap()
}

fn test_instant() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn test_baseline_roundtrip() {
    let store = test_store().await;
    assert!(store.get_baseline(1).await.unwrap().is_none());

    let record = BaselineRecord {
        user_id: 1,
        primary_goal: Some("lower blood pressure".into()),
        activity_level: Some("moderate".into()),
        weight_kg: Some(82.5),
        bp_systolic: Some(132),
        bp_diastolic: Some(84),
        sleep_hours: Some(6.5),
        energy_1_10: Some(6),
        stress_1_10: Some(7),
        ..Default::default()
    };
    store.upsert_baseline(&record).await.unwrap();

    let loaded = store.get_baseline(1).await.unwrap().unwrap();
    assert_eq!(loaded.primary_goal.as_deref(), Some("lower blood pressure"));
    assert_eq!(loaded.bp_systolic, Some(132));

    let summary = loaded.to_summary();
    assert_eq!(summary.stress, Some(7));
    assert_eq!(summary.sleep_hours, Some(6.5));
}

#[tokio::test]
async fn test_baseline_upsert_overwrites() {
    let store = test_store().await;
    store
        .upsert_baseline(&BaselineRecord {
            user_id: 1,
            primary_goal: Some("sleep better".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    store
        .upsert_baseline(&BaselineRecord {
            user_id: 1,
            primary_goal: Some("run a 10k".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    let loaded = store.get_baseline(1).await.unwrap().unwrap();
    assert_eq!(loaded.primary_goal.as_deref(), Some("run a 10k"));
}

#[tokio::test]
async fn test_metric_validation_rejected() {
    let store = test_store().await;
    let now = test_instant();

    assert!(store
        .insert_metric(1, MetricType::WeightKg, 20.0, now)
        .await
        .is_err());
    assert!(store
        .insert_metric(1, MetricType::BpSystolic, 120.5, now)
        .await
        .is_err());
    assert!(store
        .insert_metric(1, MetricType::Energy, 11.0, now)
        .await
        .is_err());
    assert_eq!(store.metric_count(1, MetricType::WeightKg).await.unwrap(), 0);
}

#[tokio::test]
async fn test_windowed_upsert_absorbs_repeat() {
    let store = test_store().await;
    let first = test_instant();

    let inserted = store
        .upsert_metric_windowed(1, MetricType::WeightKg, 74.8, first)
        .await
        .unwrap();
    assert!(inserted);

    // Same reading restated twenty minutes later: update, not duplicate.
    let second = first + Duration::minutes(20);
    let inserted = store
        .upsert_metric_windowed(1, MetricType::WeightKg, 74.8, second)
        .await
        .unwrap();
    assert!(!inserted);
    assert_eq!(store.metric_count(1, MetricType::WeightKg).await.unwrap(), 1);
}

#[tokio::test]
async fn test_windowed_upsert_outside_window_inserts() {
    let store = test_store().await;
    let first = test_instant();
    store
        .upsert_metric_windowed(1, MetricType::WeightKg, 74.8, first)
        .await
        .unwrap();

    let later = first + Duration::hours(4);
    let inserted = store
        .upsert_metric_windowed(1, MetricType::WeightKg, 75.2, later)
        .await
        .unwrap();
    assert!(inserted);
    assert_eq!(store.metric_count(1, MetricType::WeightKg).await.unwrap(), 2);
}

#[tokio::test]
async fn test_metric_summaries_7d() {
    let store = test_store().await;
    let now = test_instant();

    store
        .insert_metric(1, MetricType::SleepHours, 7.0, now - Duration::days(2))
        .await
        .unwrap();
    store
        .insert_metric(1, MetricType::SleepHours, 8.0, now - Duration::days(1))
        .await
        .unwrap();
    // Outside the window: ignored.
    store
        .insert_metric(1, MetricType::SleepHours, 4.0, now - Duration::days(9))
        .await
        .unwrap();

    let summaries = store.metric_summaries_7d(1, now).await.unwrap();
    let sleep = &summaries[&MetricType::SleepHours];
    assert_eq!(sleep.count, 2);
    assert_eq!(sleep.latest, Some(8.0));
    assert_eq!(sleep.avg_7d, Some(7.5));

    // Types with no readings get a zero-count entry.
    let steps = &summaries[&MetricType::Steps];
    assert_eq!(steps.count, 0);
    assert!(steps.latest.is_none());
}

#[tokio::test]
async fn test_daily_get_missing_returns_empty() {
    let store = test_store().await;
    let agg = store.get_daily(1, "2025-06-01").await.unwrap();
    assert_eq!(agg.user_id, 1);
    assert_eq!(agg.date, "2025-06-01");
    assert!(agg.sleep_hours.is_none());
    assert!(agg.events.is_empty());
}

#[tokio::test]
async fn test_daily_commit_roundtrip() {
    let store = test_store().await;
    let now = test_instant();

    let mut agg = DailyAggregate::new(1, "2025-06-01");
    agg.sleep_hours = Some(7.5);
    agg.training_done = Some(true);
    agg.extras.nutrition_food_details = Some("eggs and toast".into());
    agg.events.push(DayEvent {
        event_type: EventType::Food,
        details: "eggs and toast".into(),
        value: None,
        unit: None,
        at: super::format_ts(now),
    });
    agg.answers.insert(
        "sleep_hours".into(),
        AnswerEntry {
            source_text: "slept 7.5h".into(),
            parsed_value: serde_json::json!(7.5),
            specialist: "signal_extractor".into(),
            at: super::format_ts(now),
        },
    );

    store.commit_daily(&agg, &[], now).await.unwrap();

    let loaded = store.get_daily(1, "2025-06-01").await.unwrap();
    assert_eq!(loaded, agg);
}

#[tokio::test]
async fn test_daily_commit_measurements_idempotent() {
    let store = test_store().await;
    let now = test_instant();
    let agg = DailyAggregate::new(1, "2025-06-01");

    store
        .commit_daily(&agg, &[(MetricType::WeightKg, 74.8)], now)
        .await
        .unwrap();
    // Replay of the same update lands in the window and updates in place.
    store
        .commit_daily(&agg, &[(MetricType::WeightKg, 74.8)], now)
        .await
        .unwrap();

    assert_eq!(store.metric_count(1, MetricType::WeightKg).await.unwrap(), 1);
}

#[tokio::test]
async fn test_daily_commit_rejects_bad_measurement() {
    let store = test_store().await;
    let now = test_instant();
    let agg = DailyAggregate::new(1, "2025-06-01");

    let result = store
        .commit_daily(&agg, &[(MetricType::BpDiastolic, 500.0)], now)
        .await;
    assert!(result.is_err());
    assert_eq!(
        store.metric_count(1, MetricType::BpDiastolic).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_daily_rollup_digest() {
    let store = test_store().await;
    let now = test_instant();

    let mut day1 = DailyAggregate::new(1, "2025-05-30");
    day1.training_done = Some(true);
    day1.sleep_hours = Some(7.0);
    store.commit_daily(&day1, &[], now).await.unwrap();

    let mut day2 = DailyAggregate::new(1, "2025-05-31");
    day2.nutrition_on_plan = Some(true);
    day2.sleep_hours = Some(8.0);
    store.commit_daily(&day2, &[], now).await.unwrap();

    let digest = store.daily_rollup_7d(1, now).await.unwrap().unwrap();
    assert!(digest.contains("2 logged days"), "digest: {digest}");
    assert!(digest.contains("training 1"), "digest: {digest}");
    assert!(digest.contains("avg sleep 7.5h"), "digest: {digest}");

    assert!(store.daily_rollup_7d(2, now).await.unwrap().is_none());
}

#[tokio::test]
async fn test_summary_record_and_briefs() {
    let store = test_store().await;

    let long_question = "why ".repeat(400);
    store
        .record_summary(
            1,
            &long_question,
            "short answer",
            &["deep".into(), "missing_data".into()],
            &["llm_unavailable".into()],
            Some("[]"),
        )
        .await
        .unwrap();
    store
        .record_summary(1, "how is my sleep?", "sleep answer", &[], &[], None)
        .await
        .unwrap();

    let briefs = store.recent_conversation_briefs(1, 5).await.unwrap();
    assert_eq!(briefs.len(), 2);
    assert_eq!(briefs[0].question, "how is my sleep?");

    let summaries = store.recent_summaries(1, 5).await.unwrap();
    assert_eq!(summaries[1].question.chars().count(), 512);
    assert_eq!(summaries[1].tags, "deep,missing_data");
    assert_eq!(summaries[1].safety_flags, "llm_unavailable");
}

#[tokio::test]
async fn test_thread_resolution() {
    let store = test_store().await;

    let id = store
        .resolve_thread(1, None, "How do I lower my blood pressure?")
        .await
        .unwrap();
    assert!(id > 0);

    // Existing owned thread is reused.
    let same = store.resolve_thread(1, Some(id), "follow up").await.unwrap();
    assert_eq!(same, id);

    // Another user's thread id is not honored.
    let other = store.resolve_thread(2, Some(id), "hijack?").await.unwrap();
    assert_ne!(other, id);
}

#[test]
fn test_derive_thread_title() {
    assert_eq!(derive_thread_title(""), "New Chat");
    assert_eq!(derive_thread_title("  short   one "), "short one");
    let long = "word ".repeat(40);
    let title = derive_thread_title(&long);
    assert!(title.ends_with("..."));
    assert_eq!(title.chars().count(), 93);
}

#[tokio::test]
async fn test_chat_turn_append() {
    let store = test_store().await;
    let id = store.resolve_thread(1, None, "first question").await.unwrap();
    store
        .append_chat_turn(id, "first question", "the answer", "quick")
        .await
        .unwrap();
    assert_eq!(store.thread_message_count(id).await.unwrap(), 2);
}

#[tokio::test]
async fn test_feedback_dedupe() {
    let store = test_store().await;
    let window = Duration::hours(24);

    let wrote = store
        .record(1, "nutritionist: missing data", "weight_kg", window)
        .await
        .unwrap();
    assert!(wrote);

    let wrote = store
        .record(1, "nutritionist: missing data", "weight_kg again", window)
        .await
        .unwrap();
    assert!(!wrote, "second report inside the window should dedupe");

    // Different title is a different item.
    let wrote = store
        .record(1, "sleep_expert: missing data", "sleep_hours", window)
        .await
        .unwrap();
    assert!(wrote);

    assert_eq!(store.feedback_count(1).await.unwrap(), 2);
}

#[tokio::test]
async fn test_build_context_missing_data() {
    let store = test_store().await;

    let ctx = store.build_context(1, 3).await.unwrap();
    assert!(!ctx.baseline_present);
    assert_eq!(ctx.missing_data.len(), 9);

    store
        .upsert_baseline(&BaselineRecord {
            user_id: 1,
            primary_goal: Some("more energy".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    store
        .insert_metric(1, MetricType::SleepHours, 7.0, Utc::now())
        .await
        .unwrap();

    let ctx = store.build_context(1, 3).await.unwrap();
    assert!(ctx.baseline_present);
    assert!(!ctx.missing_data.contains(&"sleep_hours".to_string()));
    assert!(ctx.missing_data.contains(&"steps".to_string()));
    assert_eq!(ctx.metrics_7d[&MetricType::SleepHours].count, 1);
}
