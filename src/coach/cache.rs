//! Short-TTL response cache for repeated questions.
//!
//! Keyed by user, normalized question text, mode, and deep_think so
//! rapid duplicate asks skip the whole dispatch pipeline. Only
//! successful dispatch responses are stored; emergency, intake, and
//! error fallbacks are always recomputed. A non-positive TTL disables
//! both reads and writes.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use meridian_core::coaching::{CoachMode, CoachingResponse};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    user_id: i64,
    question: String,
    mode: CoachMode,
    deep_think: bool,
}

struct CacheEntry {
    stored_at: Instant,
    response: CoachingResponse,
}

/// Lowercase and collapse whitespace so trivial retypes of the same
/// question share one cache slot.
fn normalize_question(question: &str) -> String {
    question
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) struct ResponseCache {
    ttl: Option<Duration>,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl ResponseCache {
    pub(crate) fn new(ttl_secs: i64) -> Self {
        let ttl = if ttl_secs > 0 {
            Some(Duration::from_secs(ttl_secs as u64))
        } else {
            None
        };
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn key(user_id: i64, question: &str, mode: CoachMode, deep_think: bool) -> CacheKey {
        CacheKey {
            user_id,
            question: normalize_question(question),
            mode,
            deep_think,
        }
    }

    /// Fetch a live entry, evicting it if the TTL has lapsed.
    pub(crate) async fn get(
        &self,
        user_id: i64,
        question: &str,
        mode: CoachMode,
        deep_think: bool,
    ) -> Option<CoachingResponse> {
        let ttl = self.ttl?;
        let key = Self::key(user_id, question, mode, deep_think);
        let mut entries = self.entries.lock().await;
        match entries.get(&key) {
            Some(entry) if entry.stored_at.elapsed() < ttl => {
                debug!(user_id, "coach cache hit");
                Some(entry.response.clone())
            }
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub(crate) async fn set(
        &self,
        user_id: i64,
        question: &str,
        mode: CoachMode,
        deep_think: bool,
        response: &CoachingResponse,
    ) {
        if self.ttl.is_none() {
            return;
        }
        let key = Self::key(user_id, question, mode, deep_think);
        let mut entries = self.entries.lock().await;
        entries.insert(
            key,
            CacheEntry {
                stored_at: Instant::now(),
                response: response.clone(),
            },
        );
    }

    /// Rewind one entry's timestamp so expiry paths are testable
    /// without sleeping through a real TTL.
    #[cfg(test)]
    pub(super) async fn backdate(
        &self,
        user_id: i64,
        question: &str,
        mode: CoachMode,
        deep_think: bool,
        by: Duration,
    ) {
        let key = Self::key(user_id, question, mode, deep_think);
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(&key) {
            entry.stored_at -= by;
        }
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
