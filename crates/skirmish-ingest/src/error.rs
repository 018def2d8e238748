//! Error type for `skirmish-ingest`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] skirmish_core::Error),

  #[error(transparent)]
  Log(#[from] skirmish_log::Error),

  /// Any backend failure, boxed so the service stays generic over the store.
  #[error("storage error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn store(err: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
