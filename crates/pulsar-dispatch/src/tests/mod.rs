//! Behavioral tests for the dispatch core.
//!
//! - `harness.rs`   - Scripted producer and connector standing in for the broker
//! - `retry.rs`     - Retry rounds, backoff timing, and budget exhaustion
//! - `isolation.rs` - Partial-failure and per-caller isolation
//! - `lifecycle.rs` - Startup validation, shutdown, and record construction

mod isolation;

#[allow(unused_imports)]
pub use harness::{Fate, ScriptedConnector, ScriptedProducer};
