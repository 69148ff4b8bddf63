//! Conversation summaries and chat threads.

use super::{now_ts, Store};
use meridian_core::{context::ConversationBrief, error::MeridianError};

/// Stored length caps. Questions and answers are summarized, not archived;
/// the chat log keeps the full turn (bounded).
const SUMMARY_QUESTION_KEPT: usize = 512;
const SUMMARY_ANSWER_KEPT: usize = 1024;
const CHAT_USER_KEPT: usize = 8000;
const CHAT_ASSISTANT_KEPT: usize = 20000;
const THREAD_TITLE_LEN: usize = 90;

/// One stored conversation summary row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SummaryRecord {
    pub id: i64,
    pub question: String,
    pub answer_summary: String,
    pub tags: String,
    pub safety_flags: String,
    pub created_at: String,
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Derive a thread title from the opening question: whitespace collapsed,
/// first 90 characters, ellipsis when cut.
pub(crate) fn derive_thread_title(question: &str) -> String {
    let collapsed = question.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return "New Chat".to_string();
    }
    if collapsed.chars().count() <= THREAD_TITLE_LEN {
        collapsed
    } else {
        format!("{}...", truncate_chars(&collapsed, THREAD_TITLE_LEN))
    }
}

impl Store {
    /// Record one coaching exchange summary.
    pub async fn record_summary(
        &self,
        user_id: i64,
        question: &str,
        answer: &str,
        tags: &[String],
        safety_flags: &[String],
        agent_trace_json: Option<&str>,
    ) -> Result<i64, MeridianError> {
        let result = sqlx::query(
            "INSERT INTO conversation_summaries \
             (user_id, question, answer_summary, tags, safety_flags, agent_trace_json, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(truncate_chars(question, SUMMARY_QUESTION_KEPT))
        .bind(truncate_chars(answer, SUMMARY_ANSWER_KEPT))
        .bind(tags.join(","))
        .bind(safety_flags.join(","))
        .bind(agent_trace_json)
        .bind(now_ts())
        .execute(&self.pool)
        .await
        .map_err(|e| MeridianError::Store(format!("summary insert failed: {e}")))?;

        Ok(result.last_insert_rowid())
    }

    /// Most recent summaries for a user, newest first.
    pub async fn recent_summaries(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<SummaryRecord>, MeridianError> {
        let rows: Vec<SummaryRecord> = sqlx::query_as(
            "SELECT id, question, answer_summary, tags, safety_flags, created_at \
             FROM conversation_summaries WHERE user_id = ? \
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MeridianError::Store(format!("summary list failed: {e}")))?;

        Ok(rows)
    }

    /// Recent exchanges as prompt-sized briefs.
    pub async fn recent_conversation_briefs(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<ConversationBrief>, MeridianError> {
        let summaries = self.recent_summaries(user_id, limit).await?;
        Ok(summaries
            .into_iter()
            .map(|s| ConversationBrief {
                question: s.question,
                answer_summary: s.answer_summary,
                created_at: s.created_at,
            })
            .collect())
    }

    /// Resolve the chat thread for a request: verify ownership of an
    /// explicit id, otherwise create a new thread titled from the question.
    pub async fn resolve_thread(
        &self,
        user_id: i64,
        thread_id: Option<i64>,
        question: &str,
    ) -> Result<i64, MeridianError> {
        if let Some(id) = thread_id {
            let owned: Option<(i64,)> =
                sqlx::query_as("SELECT id FROM chat_threads WHERE id = ? AND user_id = ?")
                    .bind(id)
                    .bind(user_id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| MeridianError::Store(format!("thread lookup failed: {e}")))?;
            if let Some((id,)) = owned {
                return Ok(id);
            }
            // Unknown or foreign thread id: fall through and open a fresh one.
        }

        let now = now_ts();
        let result = sqlx::query(
            "INSERT INTO chat_threads (user_id, title, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(derive_thread_title(question))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| MeridianError::Store(format!("thread create failed: {e}")))?;

        Ok(result.last_insert_rowid())
    }

    /// Append one user/assistant turn to a thread and bump its timestamps.
    pub async fn append_chat_turn(
        &self,
        thread_id: i64,
        question: &str,
        answer: &str,
        mode: &str,
    ) -> Result<(), MeridianError> {
        let now = now_ts();

        sqlx::query(
            "INSERT INTO chat_messages (thread_id, role, content, mode, created_at) \
             VALUES (?, 'user', ?, NULL, ?)",
        )
        .bind(thread_id)
        .bind(truncate_chars(question, CHAT_USER_KEPT))
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| MeridianError::Store(format!("chat insert failed: {e}")))?;

        sqlx::query(
            "INSERT INTO chat_messages (thread_id, role, content, mode, created_at) \
             VALUES (?, 'assistant', ?, ?, ?)",
        )
        .bind(thread_id)
        .bind(truncate_chars(answer, CHAT_ASSISTANT_KEPT))
        .bind(mode)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| MeridianError::Store(format!("chat insert failed: {e}")))?;

        sqlx::query("UPDATE chat_threads SET last_message_at = ?, updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(&now)
            .bind(thread_id)
            .execute(&self.pool)
            .await
            .map_err(|e| MeridianError::Store(format!("thread bump failed: {e}")))?;

        Ok(())
    }

    /// Number of messages in a thread.
    pub async fn thread_message_count(&self, thread_id: i64) -> Result<i64, MeridianError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM chat_messages WHERE thread_id = ?")
                .bind(thread_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| MeridianError::Store(format!("chat count failed: {e}")))?;
        Ok(count)
    }
}
