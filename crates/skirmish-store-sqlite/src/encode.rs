//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Game timestamps are stored as `YYYY-MM-DD HH:MM:SS` so that string order
//! is time order. Server-assigned instants are RFC 3339. Factions use their
//! canonical lowercase spelling.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use skirmish_core::{
  battle::{BattleRecord, RecordStamp},
  ranking::{OpponentTally, RankingRow, Tally},
  roster::{AliasGroup, Faction, Identity},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Game time ───────────────────────────────────────────────────────────────

const GAME_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn encode_ts(ts: NaiveDateTime) -> String { ts.format(GAME_TIME_FORMAT).to_string() }

pub fn decode_ts(s: &str) -> Result<NaiveDateTime> {
  NaiveDateTime::parse_from_str(s, GAME_TIME_FORMAT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

/// `[day 00:00, next day 00:00)` as encoded bounds.
pub fn encode_day(day: NaiveDate) -> (String, String) {
  let start = day.and_time(NaiveTime::MIN);
  (encode_ts(start), encode_ts(start + Duration::days(1)))
}

// ─── Server time ─────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

// ─── Faction ─────────────────────────────────────────────────────────────────

pub fn encode_faction(f: Faction) -> String { f.to_string() }

pub fn decode_faction(s: &str) -> Result<Faction> { Ok(Faction::parse(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw columns of an `identities` row.
pub struct RawIdentity {
  pub identity_id:    i64,
  pub name:           String,
  pub faction:        String,
  pub job:            String,
  pub alias_group_id: Option<i64>,
}

impl RawIdentity {
  pub const COLUMNS: &'static str = "identity_id, name, faction, job, alias_group_id";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      identity_id:    row.get(0)?,
      name:           row.get(1)?,
      faction:        row.get(2)?,
      job:            row.get(3)?,
      alias_group_id: row.get(4)?,
    })
  }

  pub fn into_identity(self) -> Result<Identity> {
    Ok(Identity {
      identity_id:    self.identity_id,
      name:           self.name,
      faction:        decode_faction(&self.faction)?,
      job:            self.job,
      alias_group_id: self.alias_group_id,
    })
  }
}

pub fn group_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AliasGroup> {
  Ok(AliasGroup {
    group_id:    row.get(0)?,
    name:        row.get(1)?,
    description: row.get(2)?,
  })
}

/// Raw columns of a record stamp (`record_id, winner, fought_at, blessed`).
pub struct RawStamp {
  pub record_id: i64,
  pub winner:    String,
  pub fought_at: String,
  pub blessed:   bool,
}

impl RawStamp {
  pub const COLUMNS: &'static str = "record_id, winner, fought_at, blessed";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id: row.get(0)?,
      winner:    row.get(1)?,
      fought_at: row.get(2)?,
      blessed:   row.get(3)?,
    })
  }

  pub fn into_stamp(self) -> Result<RecordStamp> {
    Ok(RecordStamp {
      record_id: self.record_id,
      winner:    self.winner,
      fought_at: decode_ts(&self.fought_at)?,
      blessed:   self.blessed,
    })
  }
}

/// Raw columns of a `battle_records` row.
pub struct RawRecord {
  pub record_id:  i64,
  pub winner:     String,
  pub loser:      String,
  pub x:          i32,
  pub y:          i32,
  pub blessed:    bool,
  pub fought_at:  String,
  pub created_by: Option<i64>,
  pub import_id:  Option<String>,
}

impl RawRecord {
  pub const COLUMNS: &'static str =
    "record_id, winner, loser, pos_x, pos_y, blessed, fought_at, created_by, import_id";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:  row.get(0)?,
      winner:     row.get(1)?,
      loser:      row.get(2)?,
      x:          row.get(3)?,
      y:          row.get(4)?,
      blessed:    row.get(5)?,
      fought_at:  row.get(6)?,
      created_by: row.get(7)?,
      import_id:  row.get(8)?,
    })
  }

  pub fn into_record(self) -> Result<BattleRecord> {
    Ok(BattleRecord {
      record_id:  self.record_id,
      winner:     self.winner,
      loser:      self.loser,
      x:          self.x,
      y:          self.y,
      blessed:    self.blessed,
      fought_at:  decode_ts(&self.fought_at)?,
      created_by: self.created_by,
      import_id:  self.import_id.as_deref().map(Uuid::parse_str).transpose()?,
    })
  }
}

/// Raw counts of one leaderboard line before derived stats are computed.
pub struct RawTallyRow {
  pub name:      String,
  pub jobs:      Vec<String>,
  pub faction:   Option<String>,
  pub members:   i64,
  pub kills:     i64,
  pub deaths:    i64,
  pub blessings: i64,
}

/// Distinct non-empty jobs from a JSON array column, sorted.
fn decode_jobs(json: &str) -> rusqlite::Result<Vec<String>> {
  let jobs: Vec<Option<String>> = serde_json::from_str(json).map_err(|e| {
    rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
  })?;
  let jobs: BTreeSet<String> = jobs.into_iter().flatten().filter(|j| !j.is_empty()).collect();
  Ok(jobs.into_iter().collect())
}

impl RawTallyRow {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      name:      row.get(0)?,
      jobs:      decode_jobs(&row.get::<_, String>(1)?)?,
      faction:   row.get(2)?,
      members:   row.get(3)?,
      kills:     row.get(4)?,
      deaths:    row.get(5)?,
      blessings: row.get(6)?,
    })
  }

  pub fn tally(&self) -> Tally {
    Tally {
      kills:     self.kills.max(0) as u64,
      deaths:    self.deaths.max(0) as u64,
      blessings: self.blessings.max(0) as u64,
    }
  }

  pub fn into_row(self) -> Result<RankingRow> {
    let tally = self.tally();
    let faction = self.faction.as_deref().map(decode_faction).transpose()?;
    Ok(RankingRow::new(
      self.name,
      self.jobs.join("/"),
      faction,
      self.members.max(0) as u32,
      tally,
    ))
  }
}

/// Raw columns of an opponent breakdown line.
pub struct RawOpponent {
  pub name:    String,
  pub faction: Option<String>,
  pub count:   i64,
  pub last_at: String,
}

impl RawOpponent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      name:    row.get(0)?,
      faction: row.get(1)?,
      count:   row.get(2)?,
      last_at: row.get(3)?,
    })
  }

  pub fn into_opponent(self) -> Result<OpponentTally> {
    Ok(OpponentTally {
      name:    self.name,
      faction: self.faction.as_deref().map(decode_faction).transpose()?,
      count:   self.count.max(0) as u64,
      last_at: decode_ts(&self.last_at)?,
    })
  }
}
