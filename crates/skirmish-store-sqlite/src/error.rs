//! Error type for `skirmish-store-sqlite`.

use skirmish_core::store::Transient;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] skirmish_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// An identity referenced an alias group that does not exist.
  #[error("alias group not found: {0:?}")]
  GroupNotFound(String),
}

impl Transient for Error {
  fn is_transient(&self) -> bool {
    let Error::Database(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(
      e,
      _,
    ))) = self
    else {
      return false;
    };
    // A unique-key conflict means another writer raced us to the same dedup
    // key; re-running the batch sees it as a duplicate.
    matches!(
      e.code,
      rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
    ) || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
