//! Aggregation SQL: leaderboards, player and group detail, faction totals.
//!
//! Each function runs on the connection thread and returns raw rows; the
//! store decodes them and applies the ranking rules from `skirmish-core`.

use rusqlite::{Connection, OptionalExtension as _};
use skirmish_core::{
  ranking::{RankingFilter, TimeBounds},
  roster::{AliasGroup, Faction},
};

use crate::{
  encode::{RawIdentity, RawOpponent, RawTallyRow, group_from_row},
  filter::{Predicate, identity_predicate, ranking_predicates, record_predicate},
};

/// Per-identity counts over the filtered window, as the CTE `member_stats`.
///
/// Kills and blessings are counted from the winner side, deaths from the
/// loser side, each joined to identities by display name.
fn member_stats(records: &Predicate, identities: &Predicate) -> String {
  format!(
    "WITH windowed AS (
       SELECT b.winner, b.loser, b.blessed
       FROM battle_records b
       WHERE {records}
     ),
     wins AS (
       SELECT winner AS name, COUNT(*) AS kills, SUM(blessed) AS blessings
       FROM windowed
       GROUP BY winner
     ),
     losses AS (
       SELECT loser AS name, COUNT(*) AS deaths
       FROM windowed
       GROUP BY loser
     ),
     member_stats AS (
       SELECT p.identity_id, p.name, p.job, p.faction, p.alias_group_id,
              COALESCE(w.kills, 0)     AS kills,
              COALESCE(l.deaths, 0)    AS deaths,
              COALESCE(w.blessings, 0) AS blessings
       FROM identities p
       LEFT JOIN wins   w ON w.name = p.name
       LEFT JOIN losses l ON l.name = p.name
       WHERE {identities}
     )",
    records = records.sql(),
    identities = identities.sql(),
  )
}

// The job column is a JSON array so group rows can carry every member job.
const SOLO_SELECT: &str = "
  SELECT name, json_array(job), faction, 1, kills, deaths, blessings
  FROM member_stats
  WHERE kills > 0 OR deaths > 0";

// Members without a group form a group of one, keyed by their own id.
const GROUP_SELECT: &str = "
  SELECT COALESCE(g.name, MIN(m.name)),
         json_group_array(DISTINCT m.job),
         CASE WHEN COUNT(DISTINCT m.faction) = 1 THEN MIN(m.faction) END,
         COUNT(*),
         SUM(m.kills),
         SUM(m.deaths),
         SUM(m.blessings)
  FROM member_stats m
  LEFT JOIN alias_groups g ON g.group_id = m.alias_group_id
  GROUP BY m.alias_group_id,
           CASE WHEN m.alias_group_id IS NULL THEN m.identity_id END
  HAVING SUM(m.kills) > 0 OR SUM(m.deaths) > 0";

fn tally_rows(
  conn: &Connection,
  records: &Predicate,
  identities: &Predicate,
  select: &str,
) -> rusqlite::Result<Vec<RawTallyRow>> {
  let sql = format!("{} {select}", member_stats(records, identities));
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map(
      Predicate::bind(&[records, identities]).as_slice(),
      RawTallyRow::from_row,
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

// ─── Leaderboards ────────────────────────────────────────────────────────────

pub fn ranking_rows(
  conn: &Connection,
  filter: &RankingFilter,
) -> rusqlite::Result<Vec<RawTallyRow>> {
  let (records, identities) = ranking_predicates(filter);
  let select = if filter.group_mode { GROUP_SELECT } else { SOLO_SELECT };
  tally_rows(conn, &records, &identities, select)
}

pub fn group_by_name(conn: &Connection, name: &str) -> rusqlite::Result<Option<AliasGroup>> {
  conn
    .query_row(
      "SELECT group_id, name, description FROM alias_groups WHERE name = ?1",
      rusqlite::params![name],
      group_from_row,
    )
    .optional()
}

/// Individual rows for the live members of one group.
pub fn group_member_rows(
  conn: &Connection,
  group_id: i64,
  faction: Option<Faction>,
  bounds: &TimeBounds,
) -> rusqlite::Result<Vec<RawTallyRow>> {
  let records = record_predicate(bounds);
  let identities = identity_predicate(faction, None).slot(
    "p.alias_group_id = :group_id",
    ":group_id",
    Some(group_id),
  );
  tally_rows(conn, &records, &identities, SOLO_SELECT)
}

// ─── Player detail ───────────────────────────────────────────────────────────

pub fn identity_by_name(conn: &Connection, name: &str) -> rusqlite::Result<Option<RawIdentity>> {
  conn
    .query_row(
      &format!(
        "SELECT {} FROM identities WHERE name = ?1 AND deleted_at IS NULL",
        RawIdentity::COLUMNS
      ),
      rusqlite::params![name],
      RawIdentity::from_row,
    )
    .optional()
}

/// `(kills, deaths, blessings)` for one name.
pub fn player_counts(
  conn: &Connection,
  name: &str,
  bounds: &TimeBounds,
) -> rusqlite::Result<(i64, i64, i64)> {
  let records = record_predicate(bounds).slot(
    "(b.winner = :name OR b.loser = :name)",
    ":name",
    Some(name.to_owned()),
  );
  let sql = format!(
    "SELECT COALESCE(SUM(b.winner = :name), 0),
            COALESCE(SUM(b.loser = :name), 0),
            COALESCE(SUM(CASE WHEN b.winner = :name THEN b.blessed ELSE 0 END), 0)
     FROM battle_records b
     WHERE {}",
    records.sql()
  );
  conn.query_row(&sql, Predicate::bind(&[&records]).as_slice(), |row| {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
  })
}

/// Which side of the record the player is on for an opponent breakdown.
#[derive(Debug, Clone, Copy)]
pub enum Side {
  /// The player won; opponents are the losers.
  Won,
  /// The player lost; opponents are the winners.
  Lost,
}

pub fn opponents(
  conn: &Connection,
  name: &str,
  side: Side,
  bounds: &TimeBounds,
) -> rusqlite::Result<Vec<RawOpponent>> {
  let (clause, opponent) = match side {
    Side::Won => ("b.winner = :name", "b.loser"),
    Side::Lost => ("b.loser = :name", "b.winner"),
  };
  let records = record_predicate(bounds).slot(clause, ":name", Some(name.to_owned()));
  let sql = format!(
    "SELECT {opponent}, p.faction, COUNT(*), MAX(b.fought_at)
     FROM battle_records b
     LEFT JOIN identities p ON p.name = {opponent} AND p.deleted_at IS NULL
     WHERE {}
     GROUP BY {opponent}
     ORDER BY COUNT(*) DESC, MAX(b.fought_at) DESC",
    records.sql()
  );
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map(
      Predicate::bind(&[&records]).as_slice(),
      RawOpponent::from_row,
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

// ─── Faction summary ─────────────────────────────────────────────────────────

/// `(faction, kills, deaths, blessings, active_players)` per faction present.
pub fn faction_rows(
  conn: &Connection,
  bounds: &TimeBounds,
) -> rusqlite::Result<Vec<(String, i64, i64, i64, i64)>> {
  let records = record_predicate(bounds);
  let identities = identity_predicate(None, None);
  let sql = format!(
    "{}
     SELECT faction, SUM(kills), SUM(deaths), SUM(blessings),
            SUM(kills > 0 OR deaths > 0)
     FROM member_stats
     GROUP BY faction",
    member_stats(&records, &identities)
  );
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map(
      Predicate::bind(&[&records, &identities]).as_slice(),
      |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

pub fn jobs(conn: &Connection) -> rusqlite::Result<Vec<String>> {
  let mut stmt = conn.prepare(
    "SELECT DISTINCT job FROM identities
     WHERE deleted_at IS NULL AND job <> ''
     ORDER BY job",
  )?;
  let rows = stmt
    .query_map([], |row| row.get(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}
