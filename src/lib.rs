//! Client-side synchronization engine for a live classroom-polling
//! service.
//!
//! The service owns the ground truth (polls, votes, chat, roster) and
//! pushes events over a WebSocket. This crate reconciles those events
//! into consistent local view state: poll lifecycle and timing
//! ([`engine`], [`timer`]), optimistic vote submission ([`overlay`]),
//! result aggregation ([`results`]), and presence/chat diffing ([`sync`]).
//! Delivery may be reordered or duplicated; every reconciliation path is
//! an idempotent replace or an identity-keyed dedup, so replays converge.

pub mod cli;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod identity;
pub mod model;
pub mod overlay;
pub mod results;
pub mod sync;
pub mod timer;
pub mod transport;

pub use engine::{PollEngine, PollPhase};
pub use error::PollError;
pub use events::{ClientRequest, ServerEvent};
pub use identity::{Role, SessionIdentity};
pub use sync::PresenceChatSync;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix epoch in milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
