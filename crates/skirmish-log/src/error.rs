//! Error types for the skirmish-log codec.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("battle log is empty")]
  EmptyInput,

  #[error("no candidate encoding could decode the battle log (tried: {})", tried.join(", "))]
  EncodingUnresolved { tried: Vec<&'static str> },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
