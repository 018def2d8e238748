//! Ingestion and query orchestration for skirmish.
//!
//! [`BattleService`] is the entry point: it parses battle logs with
//! `skirmish-log`, reconciles names against the live roster, persists kills
//! in retried batches, correlates blessings, and answers leaderboard queries
//! through any [`BattleStore`](skirmish_core::store::BattleStore).

pub mod clock;
pub mod coordinator;
pub mod error;
pub mod retry;
pub mod roster;
pub mod service;

pub use clock::{Clock, FixedClock, SystemClock};
pub use coordinator::{
  BatchFailure, IngestConfig, IngestCoordinator, IngestReport, IngestSummary, Stage,
};
pub use error::{Error, Result};
pub use retry::RetryPolicy;
pub use roster::{Resolution, ResolvedName, RosterIndex};
pub use service::{BattleService, ParseOutcome, PersistOutcome, parse_log};
