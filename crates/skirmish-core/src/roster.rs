//! Roster types: the combatants a battle log is reconciled against.
//!
//! The roster is owned by an external management tool. The engine only reads
//! the live (non-deleted) part of it.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::{Error, Result};

/// One of the three fixed factions of the game.
///
/// The canonical spelling is the lowercase English name; the in-game Chinese
/// names are accepted when parsing.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Faction {
  #[serde(alias = "梵天")]
  #[strum(to_string = "brahma", serialize = "梵天")]
  Brahma,
  #[serde(alias = "比湿奴")]
  #[strum(to_string = "vishnu", serialize = "比湿奴")]
  Vishnu,
  #[serde(alias = "湿婆")]
  #[strum(to_string = "shiva", serialize = "湿婆")]
  Shiva,
}

impl Faction {
  /// Parse either spelling, mapping failure onto [`Error::UnknownFaction`].
  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s.trim()).map_err(|_| Error::UnknownFaction(s.to_owned()))
  }
}

/// A named set of identities that are ranked as one logical player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasGroup {
  pub group_id:    i64,
  pub name:        String,
  pub description: Option<String>,
}

/// A live roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  pub identity_id:    i64,
  /// Display name exactly as it appears in battle logs.
  pub name:           String,
  pub faction:        Faction,
  pub job:            String,
  /// At most one group per identity.
  pub alias_group_id: Option<i64>,
}

impl Identity {
  /// The key this identity is ranked under in alias-group mode.
  pub fn canonical(&self) -> Canonical {
    match self.alias_group_id {
      Some(id) => Canonical::Group(id),
      None => Canonical::Solo(self.identity_id),
    }
  }
}

/// The logical player an identity rolls up into.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Canonical {
  Group(i64),
  Solo(i64),
}
