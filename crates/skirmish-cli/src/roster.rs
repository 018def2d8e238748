//! TOML roster files for `skirmish roster`.
//!
//! ```toml
//! [[groups]]
//! name = "Mains"
//! description = "Alice's characters"
//!
//! [[identities]]
//! name = "Alice"
//! faction = "brahma"   # or 梵天
//! job = "warrior"
//! group = "Mains"
//! ```

use std::path::Path;

use anyhow::Context as _;
use serde::Deserialize;
use skirmish_store_sqlite::{NewIdentity, SqliteStore};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct GroupEntry {
  pub name:        String,
  #[serde(default)]
  pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RosterFile {
  #[serde(default)]
  pub groups:     Vec<GroupEntry>,
  #[serde(default)]
  pub identities: Vec<NewIdentity>,
}

impl RosterFile {
  pub fn read(path: &Path) -> anyhow::Result<Self> {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading roster file {}", path.display()))?;
    toml::from_str(&raw).context("parsing roster file")
  }

  /// Upsert groups first so identities can reference them.
  pub async fn load_into(self, store: &SqliteStore) -> anyhow::Result<(usize, usize)> {
    let groups = self.groups.len();
    for group in self.groups {
      let name = group.name.clone();
      store
        .upsert_alias_group(group.name, group.description)
        .await
        .with_context(|| format!("saving alias group {name:?}"))?;
    }

    let identities = self.identities.len();
    for identity in self.identities {
      let name = identity.name.clone();
      store
        .upsert_identity(identity)
        .await
        .with_context(|| format!("saving identity {name:?}"))?;
    }

    info!(groups, identities, "roster loaded");
    Ok((groups, identities))
  }
}
