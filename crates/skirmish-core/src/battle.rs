//! Battle events and the records they are persisted as.
//!
//! Parsed events are ephemeral: they live from the parser to the ingestion
//! coordinator. Battle records are the persisted unit, one per resolved kill.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Parsed events ───────────────────────────────────────────────────────────

/// One kill line from a battle log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillEvent {
  pub killer:    String,
  pub victim:    String,
  pub x:         i32,
  pub y:         i32,
  /// Game-local time; logs carry no timezone.
  pub timestamp: NaiveDateTime,
}

impl KillEvent {
  /// Names are trimmed so the key matches the roster spelling.
  pub fn dedup_key(&self) -> DedupKey {
    DedupKey {
      winner:    self.killer.trim().to_owned(),
      loser:     self.victim.trim().to_owned(),
      fought_at: self.timestamp,
    }
  }
}

/// One blessing line from a battle log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlessingEvent {
  pub recipient: String,
  /// Name of the blessing; informational only.
  pub label:     String,
  pub timestamp: NaiveDateTime,
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// The triple that identifies a unique kill among non-deleted records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DedupKey {
  pub winner:    String,
  pub loser:     String,
  pub fought_at: NaiveDateTime,
}

/// Input to [`crate::store::BattleStore::write_kills`].
#[derive(Debug, Clone)]
pub struct NewBattleRecord {
  pub key:        DedupKey,
  pub x:          i32,
  pub y:          i32,
  /// Identity id of the winner.
  pub created_by: i64,
  /// The import run that produced this record.
  pub import_id:  Uuid,
}

/// The parts of a persisted record the correlation pass needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStamp {
  pub record_id: i64,
  pub winner:    String,
  pub fought_at: NaiveDateTime,
  pub blessed:   bool,
}

impl RecordStamp {
  /// The correlation index key: winner and calendar day.
  pub fn winner_day(&self) -> (String, NaiveDate) {
    (self.winner.clone(), self.fought_at.date())
  }
}

/// What happened to one kill handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillWrite {
  Inserted(RecordStamp),
  /// A non-deleted record with the same dedup key already existed.
  Duplicate(RecordStamp),
}

impl KillWrite {
  pub fn stamp(&self) -> &RecordStamp {
    match self {
      Self::Inserted(s) | Self::Duplicate(s) => s,
    }
  }

  pub fn is_inserted(&self) -> bool { matches!(self, Self::Inserted(_)) }
}

/// A full battle record as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleRecord {
  pub record_id:  i64,
  pub winner:     String,
  pub loser:      String,
  pub x:          i32,
  pub y:          i32,
  pub blessed:    bool,
  pub fought_at:  NaiveDateTime,
  pub created_by: Option<i64>,
  pub import_id:  Option<Uuid>,
}
