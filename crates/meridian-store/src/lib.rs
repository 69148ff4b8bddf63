//! # meridian-store
//!
//! SQLite-backed persistence for Meridian: baselines, point measurements,
//! merged daily logs, conversation summaries, chat threads, feedback
//! entries, and the coaching-context builder.

pub mod store;

pub use store::{format_ts, now_ts, today, BaselineRecord, Store, SummaryRecord};
