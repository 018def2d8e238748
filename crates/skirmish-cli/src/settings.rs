//! Layered configuration: optional TOML file, then `SKIRMISH_*` variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;
use skirmish_ingest::IngestConfig;
use skirmish_log::EncodingConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  /// SQLite database file; `~/` is expanded.
  pub store_path: PathBuf,
  pub encoding:   EncodingConfig,
  pub ingest:     IngestConfig,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      store_path: PathBuf::from("skirmish.db"),
      encoding:   EncodingConfig::default(),
      ingest:     IngestConfig::default(),
    }
  }
}

impl AppConfig {
  /// Read `path` if it exists and overlay the environment.
  ///
  /// Nested keys use a double underscore, e.g. `SKIRMISH_INGEST__BATCH_SIZE`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("SKIRMISH")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .with_context(|| format!("failed to read config file {}", path.display()))?;

    let mut cfg: AppConfig = settings
      .try_deserialize()
      .context("failed to deserialise AppConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    Ok(cfg)
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_yields_defaults() {
    let cfg = AppConfig::load(Path::new("/nonexistent/skirmish.toml")).unwrap();
    assert_eq!(cfg.ingest.batch_size, 500);
    assert_eq!(cfg.ingest.retry.max_attempts, 3);
    assert!(cfg.encoding.detect);
  }

  #[test]
  fn partial_toml_keeps_other_defaults() {
    let cfg: AppConfig = toml::from_str(
      r#"
        store_path = "/var/lib/skirmish.db"

        [ingest]
        batch_size = 100
      "#,
    )
    .unwrap();
    assert_eq!(cfg.store_path, PathBuf::from("/var/lib/skirmish.db"));
    assert_eq!(cfg.ingest.batch_size, 100);
    assert_eq!(cfg.ingest.retry.max_attempts, 3);
    assert_eq!(cfg.encoding.fallbacks, ["UTF-8", "GB18030", "Big5"]);
  }

  #[test]
  fn relative_paths_are_untouched() {
    assert_eq!(expand_tilde(Path::new("data/skirmish.db")), PathBuf::from("data/skirmish.db"));
  }
}
