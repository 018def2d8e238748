//! Error types for `skirmish-core`.

use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown faction: {0:?}")]
  UnknownFaction(String),

  #[error("unknown time window preset: {0:?}")]
  UnknownWindow(String),

  #[error("time window ends ({end}) before it starts ({start})")]
  InvertedWindow {
    start: NaiveDateTime,
    end:   NaiveDateTime,
  },

  #[error("time window end {0} is out of range")]
  WindowOutOfRange(NaiveDateTime),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
