//! Coaching-context assembly.

use super::Store;
use chrono::Utc;
use meridian_core::{context::CoachingContext, error::MeridianError};

impl Store {
    /// Assemble the per-request view of one user: baseline projection,
    /// seven-day metric summaries, recent exchanges, and the daily-log
    /// digest. Missing data is derived from zero-count metric types.
    pub async fn build_context(
        &self,
        user_id: i64,
        recent_limit: usize,
    ) -> Result<CoachingContext, MeridianError> {
        let now = Utc::now();

        let baseline = self.get_baseline(user_id).await?;
        let metrics_7d = self.metric_summaries_7d(user_id, now).await?;
        let missing_data: Vec<String> = metrics_7d
            .iter()
            .filter(|(_, summary)| summary.count == 0)
            .map(|(metric_type, _)| metric_type.as_str().to_string())
            .collect();
        let recent_conversations = self
            .recent_conversation_briefs(user_id, recent_limit)
            .await?;
        let daily_rollup_7d = self.daily_rollup_7d(user_id, now).await?;

        Ok(CoachingContext {
            baseline_present: baseline.is_some(),
            baseline: baseline.map(|b| b.to_summary()),
            metrics_7d,
            recent_conversations,
            daily_rollup_7d,
            missing_data,
        })
    }
}
