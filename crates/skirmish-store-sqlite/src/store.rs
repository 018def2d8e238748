//! [`SqliteStore`], the SQLite implementation of [`BattleStore`].

use std::{collections::HashMap, path::Path};

use chrono::{NaiveDate, Utc};
use rusqlite::OptionalExtension as _;
use strum::IntoEnumIterator as _;
use tracing::{debug, info};

use skirmish_core::{
  battle::{KillWrite, NewBattleRecord, RecordStamp},
  ranking::{
    FactionTally, GroupDetail, PlayerDetail, RankingFilter, RankingRow, Tally, TimeBounds,
    rank_rows,
  },
  roster::{AliasGroup, Faction, Identity},
  store::BattleStore,
};

use crate::{
  Error, Result,
  aggregate::{self, Side},
  encode::{
    RawIdentity, RawOpponent, RawStamp, RawTallyRow, decode_faction, encode_day, encode_dt,
    encode_ts, group_from_row,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A battle store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

fn decode_rows(raws: Vec<RawTallyRow>) -> Result<Vec<RankingRow>> {
  let mut rows = raws
    .into_iter()
    .map(RawTallyRow::into_row)
    .collect::<Result<Vec<_>>>()?;
  rank_rows(&mut rows);
  Ok(rows)
}

// ─── BattleStore impl ────────────────────────────────────────────────────────

impl BattleStore for SqliteStore {
  type Error = Error;

  // ── Roster ────────────────────────────────────────────────────────────────

  async fn live_roster(&self) -> Result<Vec<Identity>> {
    let raws: Vec<RawIdentity> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM identities WHERE deleted_at IS NULL ORDER BY identity_id",
          RawIdentity::COLUMNS
        ))?;
        let rows = stmt
          .query_map([], RawIdentity::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawIdentity::into_identity).collect()
  }

  async fn alias_groups(&self) -> Result<Vec<AliasGroup>> {
    let groups = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT group_id, name, description FROM alias_groups ORDER BY name")?;
        let rows = stmt
          .query_map([], group_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(groups)
  }

  // ── Battle records ────────────────────────────────────────────────────────

  async fn write_kills(&self, batch: Vec<NewBattleRecord>) -> Result<Vec<KillWrite>> {
    if batch.is_empty() {
      return Ok(Vec::new());
    }

    let created_at = encode_dt(Utc::now());
    let rows: Vec<_> = batch
      .iter()
      .map(|r| {
        (
          r.key.winner.clone(),
          r.key.loser.clone(),
          encode_ts(r.key.fought_at),
          r.x,
          r.y,
          r.created_by,
          r.import_id.to_string(),
        )
      })
      .collect();

    // (record_id, blessed, inserted) per input, in input order.
    let outcomes: Vec<(i64, bool, bool)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut out = Vec::with_capacity(rows.len());
        {
          let mut find = tx.prepare_cached(
            "SELECT record_id, blessed FROM battle_records
             WHERE winner = ?1 AND loser = ?2 AND fought_at = ?3 AND deleted_at IS NULL",
          )?;
          let mut insert = tx.prepare_cached(
            "INSERT INTO battle_records
               (winner, loser, pos_x, pos_y, blessed, fought_at, created_by, import_id, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7, ?8)",
          )?;
          for (winner, loser, fought_at, x, y, created_by, import_id) in &rows {
            let existing: Option<(i64, bool)> = find
              .query_row(rusqlite::params![winner, loser, fought_at], |r| {
                Ok((r.get(0)?, r.get(1)?))
              })
              .optional()?;
            match existing {
              Some((id, blessed)) => out.push((id, blessed, false)),
              None => {
                insert.execute(rusqlite::params![
                  winner, loser, x, y, fought_at, created_by, import_id, created_at
                ])?;
                out.push((tx.last_insert_rowid(), false, true));
              }
            }
          }
        }
        tx.commit()?;
        Ok(out)
      })
      .await?;

    let writes: Vec<KillWrite> = batch
      .into_iter()
      .zip(outcomes)
      .map(|(record, (record_id, blessed, inserted))| {
        let stamp = RecordStamp {
          record_id,
          winner: record.key.winner,
          fought_at: record.key.fought_at,
          blessed,
        };
        if inserted {
          KillWrite::Inserted(stamp)
        } else {
          KillWrite::Duplicate(stamp)
        }
      })
      .collect();

    debug!(
      batch = writes.len(),
      inserted = writes.iter().filter(|w| w.is_inserted()).count(),
      "kill batch committed"
    );
    Ok(writes)
  }

  async fn records_won_on(&self, keys: Vec<(String, NaiveDate)>) -> Result<Vec<RecordStamp>> {
    if keys.is_empty() {
      return Ok(Vec::new());
    }
    let keys: Vec<(String, (String, String))> = keys
      .into_iter()
      .map(|(winner, day)| (winner, encode_day(day)))
      .collect();

    let raws: Vec<RawStamp> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(&format!(
          "SELECT {} FROM battle_records
           WHERE winner = ?1 AND fought_at >= ?2 AND fought_at < ?3 AND deleted_at IS NULL
           ORDER BY fought_at, record_id",
          RawStamp::COLUMNS
        ))?;
        let mut out = Vec::new();
        for (winner, (start, end)) in &keys {
          let rows = stmt.query_map(rusqlite::params![winner, start, end], RawStamp::from_row)?;
          for row in rows {
            out.push(row?);
          }
        }
        Ok(out)
      })
      .await?;

    raws.into_iter().map(RawStamp::into_stamp).collect()
  }

  async fn mark_blessed(&self, record_ids: Vec<i64>) -> Result<u64> {
    if record_ids.is_empty() {
      return Ok(0);
    }
    let changed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut changed = 0u64;
        {
          let mut stmt = tx.prepare_cached(
            "UPDATE battle_records SET blessed = 1
             WHERE record_id = ?1 AND blessed = 0 AND deleted_at IS NULL",
          )?;
          for id in &record_ids {
            changed += stmt.execute(rusqlite::params![id])? as u64;
          }
        }
        tx.commit()?;
        Ok(changed)
      })
      .await?;

    debug!(changed, "blessing batch committed");
    Ok(changed)
  }

  async fn count_records(&self) -> Result<u64> {
    let count: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM battle_records WHERE deleted_at IS NULL",
          [],
          |r| r.get(0),
        )?)
      })
      .await?;
    Ok(count.max(0) as u64)
  }

  async fn reset(&self) -> Result<u64> {
    let removed = self
      .conn
      .call(|conn| Ok(conn.execute("DELETE FROM battle_records", [])?))
      .await?;
    info!(removed, "battle records reset");
    Ok(removed as u64)
  }

  // ── Aggregation ───────────────────────────────────────────────────────────

  async fn rankings<'a>(&'a self, filter: &'a RankingFilter) -> Result<Vec<RankingRow>> {
    let filter = filter.clone();
    let raws = self
      .conn
      .call(move |conn| Ok(aggregate::ranking_rows(conn, &filter)?))
      .await?;
    decode_rows(raws)
  }

  async fn player_detail(&self, name: String, bounds: TimeBounds) -> Result<Option<PlayerDetail>> {
    let raw = self
      .conn
      .call(move |conn| {
        let Some(identity) = aggregate::identity_by_name(conn, &name)? else {
          return Ok(None);
        };
        let counts = aggregate::player_counts(conn, &name, &bounds)?;
        let victims = aggregate::opponents(conn, &name, Side::Won, &bounds)?;
        let killers = aggregate::opponents(conn, &name, Side::Lost, &bounds)?;
        Ok(Some((identity, counts, victims, killers)))
      })
      .await?;

    let Some((identity, (kills, deaths, blessings), victims, killers)) = raw else {
      return Ok(None);
    };
    let tally = Tally {
      kills:     kills.max(0) as u64,
      deaths:    deaths.max(0) as u64,
      blessings: blessings.max(0) as u64,
    };
    Ok(Some(PlayerDetail {
      identity: identity.into_identity()?,
      tally,
      kd_ratio: tally.kd_ratio(),
      score: tally.score(),
      victims: victims.into_iter().map(RawOpponent::into_opponent).collect::<Result<_>>()?,
      killers: killers.into_iter().map(RawOpponent::into_opponent).collect::<Result<_>>()?,
    }))
  }

  async fn group_detail(
    &self,
    group_name: String,
    faction: Option<Faction>,
    bounds: TimeBounds,
  ) -> Result<Option<GroupDetail>> {
    let raw = self
      .conn
      .call(move |conn| {
        let Some(group) = aggregate::group_by_name(conn, &group_name)? else {
          return Ok(None);
        };
        let members = aggregate::group_member_rows(conn, group.group_id, faction, &bounds)?;
        Ok(Some((group, members)))
      })
      .await?;

    raw
      .map(|(group, members)| Ok(GroupDetail { group, members: decode_rows(members)? }))
      .transpose()
  }

  async fn faction_summary(&self, bounds: TimeBounds) -> Result<Vec<FactionTally>> {
    let raws = self
      .conn
      .call(move |conn| Ok(aggregate::faction_rows(conn, &bounds)?))
      .await?;

    let mut by_faction: HashMap<Faction, FactionTally> = HashMap::new();
    for (faction, kills, deaths, blessings, active) in raws {
      let faction = decode_faction(&faction)?;
      by_faction.insert(faction, FactionTally {
        faction,
        tally: Tally {
          kills:     kills.max(0) as u64,
          deaths:    deaths.max(0) as u64,
          blessings: blessings.max(0) as u64,
        },
        active_players: active.max(0) as u64,
      });
    }

    Ok(
      Faction::iter()
        .map(|faction| {
          by_faction.remove(&faction).unwrap_or(FactionTally {
            faction,
            tally: Tally::default(),
            active_players: 0,
          })
        })
        .collect(),
    )
  }

  async fn list_jobs(&self) -> Result<Vec<String>> {
    let jobs = self
      .conn
      .call(|conn| Ok(aggregate::jobs(conn)?))
      .await?;
    Ok(jobs)
  }
}
