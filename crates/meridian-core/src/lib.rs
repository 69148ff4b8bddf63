//! # meridian-core
//!
//! Core types, traits, configuration, and error handling for the Meridian
//! coaching pipeline.

pub mod coaching;
pub mod config;
pub mod context;
pub mod daily;
pub mod error;
pub mod sanitize;
pub mod signal;
pub mod traits;
