//! Plain-text rendering for terminal output.

use std::{fmt::Write as _, io};

use anyhow::{Context as _, Result};
use serde::Serialize;
use skirmish_core::{
  ranking::{FactionTally, OpponentTally, PlayerDetail, RankingRow},
  roster::AliasGroup,
};

fn faction_label(faction: Option<impl ToString>) -> String {
  faction.map(|f| f.to_string()).unwrap_or_else(|| "-".into())
}

/// Leaderboard rows with 1-based ranks. `members` adds the group-size column.
pub fn ranking_table(rows: &[RankingRow], members: bool) -> String {
  if rows.is_empty() {
    return "no activity in this window\n".into();
  }

  let name_w = rows.iter().map(|r| r.name.chars().count()).max().unwrap_or(0).max(4);
  let job_w = rows.iter().map(|r| r.job.chars().count()).max().unwrap_or(0).max(3);

  let mut out = String::new();
  let _ = write!(out, "{:>4}  {:<name_w$}  {:<7}  {:<job_w$}", "#", "name", "faction", "job");
  if members {
    let _ = write!(out, "  {:>7}", "members");
  }
  let _ = writeln!(
    out,
    "  {:>5}  {:>6}  {:>9}  {:>6}  {:>6}",
    "kills", "deaths", "blessings", "k/d", "score"
  );

  for (rank, row) in rows.iter().enumerate() {
    let _ = write!(
      out,
      "{:>4}  {:<name_w$}  {:<7}  {:<job_w$}",
      rank + 1,
      row.name,
      faction_label(row.faction),
      row.job,
    );
    if members {
      let _ = write!(out, "  {:>7}", row.members);
    }
    let _ = writeln!(
      out,
      "  {:>5}  {:>6}  {:>9}  {:>6.2}  {:>6}",
      row.kills, row.deaths, row.blessings, row.kd_ratio, row.score,
    );
  }
  out
}

fn opponents(out: &mut String, title: &str, list: &[OpponentTally]) {
  let _ = writeln!(out, "{title}:");
  if list.is_empty() {
    let _ = writeln!(out, "  (none)");
  }
  for o in list {
    let _ = writeln!(
      out,
      "  {:<16}  {:<7}  {:>4}  last {}",
      o.name,
      faction_label(o.faction),
      o.count,
      o.last_at,
    );
  }
}

pub fn player_detail(detail: &PlayerDetail) -> String {
  let id = &detail.identity;
  let mut out = String::new();
  let job = if id.job.is_empty() { "-" } else { id.job.as_str() };
  let _ = writeln!(out, "{} ({}, {job})", id.name, id.faction);
  let _ = writeln!(
    out,
    "kills {}  deaths {}  blessings {}  k/d {:.2}  score {}",
    detail.tally.kills, detail.tally.deaths, detail.tally.blessings, detail.kd_ratio, detail.score,
  );
  opponents(&mut out, "victims", &detail.victims);
  opponents(&mut out, "killed by", &detail.killers);
  out
}

pub fn faction_table(factions: &[FactionTally]) -> String {
  let mut out = String::new();
  let _ = writeln!(
    out,
    "{:<7}  {:>5}  {:>6}  {:>9}  {:>6}",
    "faction", "kills", "deaths", "blessings", "active"
  );
  for f in factions {
    let _ = writeln!(
      out,
      "{:<7}  {:>5}  {:>6}  {:>9}  {:>6}",
      f.faction.to_string(),
      f.tally.kills,
      f.tally.deaths,
      f.tally.blessings,
      f.active_players,
    );
  }
  out
}

pub fn group_list(groups: &[AliasGroup]) -> String {
  let mut out = String::new();
  for g in groups {
    match &g.description {
      Some(description) => {
        let _ = writeln!(out, "{}  {description}", g.name);
      }
      None => {
        let _ = writeln!(out, "{}", g.name);
      }
    }
  }
  out
}

/// One CSV record per row, headed by the field names.
pub fn write_csv<T: Serialize>(rows: &[T], out: impl io::Write) -> Result<()> {
  let mut writer = csv::Writer::from_writer(out);
  for row in rows {
    writer.serialize(row).context("writing CSV row")?;
  }
  writer.flush().context("flushing CSV output")?;
  Ok(())
}
