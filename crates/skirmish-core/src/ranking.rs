//! Leaderboard rules: time windows, tallies, derived stats and ordering.
//!
//! Storage backends only count. Everything derived from the counts (score,
//! K/D ratio, rank order) is computed here so every backend ranks the same
//! way.

use std::{cmp::Ordering, ops::Add};

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
  Error, Result,
  roster::{AliasGroup, Faction, Identity},
};

// ─── Windows ─────────────────────────────────────────────────────────────────

/// Named time windows, relative to the start of the current day.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
pub enum WindowPreset {
  #[default]
  #[serde(rename = "today")]
  #[strum(serialize = "today")]
  Today,
  #[serde(rename = "yesterday")]
  #[strum(serialize = "yesterday")]
  Yesterday,
  #[serde(rename = "7d")]
  #[strum(to_string = "7d", serialize = "week")]
  Last7Days,
  #[serde(rename = "30d")]
  #[strum(to_string = "30d", serialize = "month")]
  Last30Days,
  #[serde(rename = "90d")]
  #[strum(to_string = "90d", serialize = "three_months")]
  Last90Days,
  #[serde(rename = "365d")]
  #[strum(to_string = "365d", serialize = "year")]
  Last365Days,
  #[serde(rename = "all")]
  #[strum(serialize = "all")]
  All,
}

impl WindowPreset {
  pub fn parse(s: &str) -> Result<Self> {
    s.trim()
      .parse()
      .map_err(|_| Error::UnknownWindow(s.to_owned()))
  }

  /// Resolve against `now`. Day-based presets start at midnight.
  pub fn bounds(self, now: NaiveDateTime) -> TimeBounds {
    let midnight = now.date().and_time(NaiveTime::MIN);
    let since = |days: i64| TimeBounds {
      start: Some(midnight - Duration::days(days)),
      end:   None,
    };
    match self {
      Self::Today => TimeBounds {
        start: Some(midnight),
        end:   Some(midnight + Duration::days(1)),
      },
      Self::Yesterday => TimeBounds {
        start: Some(midnight - Duration::days(1)),
        end:   Some(midnight),
      },
      Self::Last7Days => since(7),
      Self::Last30Days => since(30),
      Self::Last90Days => since(90),
      Self::Last365Days => since(365),
      Self::All => TimeBounds::default(),
    }
  }
}

/// A caller-supplied range, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplicitRange {
  pub start: NaiveDateTime,
  pub end:   NaiveDateTime,
}

impl ExplicitRange {
  pub fn bounds(self) -> Result<TimeBounds> {
    if self.end < self.start {
      return Err(Error::InvertedWindow { start: self.start, end: self.end });
    }
    // Timestamps have second precision, so `<= end` is `< end + 1s`.
    let end = self
      .end
      .checked_add_signed(Duration::seconds(1))
      .ok_or(Error::WindowOutOfRange(self.end))?;
    Ok(TimeBounds { start: Some(self.start), end: Some(end) })
  }
}

/// A resolved half-open interval `[start, end)`; `None` is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBounds {
  pub start: Option<NaiveDateTime>,
  pub end:   Option<NaiveDateTime>,
}

impl TimeBounds {
  pub fn contains(&self, at: NaiveDateTime) -> bool {
    self.start.is_none_or(|s| at >= s) && self.end.is_none_or(|e| at < e)
  }
}

// ─── Queries ─────────────────────────────────────────────────────────────────

/// A leaderboard request as a caller phrases it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankingQuery {
  pub faction:    Option<Faction>,
  pub job:        Option<String>,
  #[serde(default)]
  pub preset:     WindowPreset,
  /// Takes precedence over `preset` when present.
  pub range:      Option<ExplicitRange>,
  #[serde(default)]
  pub group_mode: bool,
}

impl RankingQuery {
  pub fn bounds(&self, now: NaiveDateTime) -> Result<TimeBounds> {
    match self.range {
      Some(range) => range.bounds(),
      None => Ok(self.preset.bounds(now)),
    }
  }

  /// Pin the window to concrete instants.
  pub fn resolve(&self, now: NaiveDateTime) -> Result<RankingFilter> {
    Ok(RankingFilter {
      faction:    self.faction,
      job:        self.job.clone().filter(|j| !j.trim().is_empty()),
      bounds:     self.bounds(now)?,
      group_mode: self.group_mode,
    })
  }
}

/// A [`RankingQuery`] with its window resolved; what storage backends see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankingFilter {
  pub faction:    Option<Faction>,
  pub job:        Option<String>,
  pub bounds:     TimeBounds,
  pub group_mode: bool,
}

// ─── Tallies ─────────────────────────────────────────────────────────────────

/// Raw counts for one identity or group within a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
  pub kills:     u64,
  pub deaths:    u64,
  pub blessings: u64,
}

impl Tally {
  /// `kills × 3 + blessings − deaths`.
  pub fn score(&self) -> i64 {
    self.kills as i64 * 3 + self.blessings as i64 - self.deaths as i64
  }

  /// `kills / deaths`, or plain `kills` when there are no deaths.
  pub fn kd_ratio(&self) -> f64 {
    if self.deaths > 0 {
      self.kills as f64 / self.deaths as f64
    } else {
      self.kills as f64
    }
  }

  pub fn is_active(&self) -> bool { self.kills > 0 || self.deaths > 0 }

  /// Score desc, then kills desc, then deaths asc. Names never break ties.
  pub fn rank_cmp(&self, other: &Self) -> Ordering {
    other
      .score()
      .cmp(&self.score())
      .then_with(|| other.kills.cmp(&self.kills))
      .then_with(|| self.deaths.cmp(&other.deaths))
  }
}

impl Add for Tally {
  type Output = Tally;

  fn add(self, rhs: Self) -> Self {
    Tally {
      kills:     self.kills + rhs.kills,
      deaths:    self.deaths + rhs.deaths,
      blessings: self.blessings + rhs.blessings,
    }
  }
}

impl std::iter::Sum for Tally {
  fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
    iter.fold(Tally::default(), Add::add)
  }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// One leaderboard line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingRow {
  /// Identity name, or the alias-group name in group mode.
  pub name:      String,
  /// Distinct member jobs joined with `/` for group rows.
  pub job:       String,
  /// `None` for a group whose members span factions.
  pub faction:   Option<Faction>,
  /// Number of identities rolled into this row.
  pub members:   u32,
  pub kills:     u64,
  pub deaths:    u64,
  pub blessings: u64,
  pub kd_ratio:  f64,
  pub score:     i64,
}

impl RankingRow {
  pub fn new(
    name: String,
    job: String,
    faction: Option<Faction>,
    members: u32,
    tally: Tally,
  ) -> Self {
    Self {
      name,
      job,
      faction,
      members,
      kills: tally.kills,
      deaths: tally.deaths,
      blessings: tally.blessings,
      kd_ratio: tally.kd_ratio(),
      score: tally.score(),
    }
  }

  pub fn tally(&self) -> Tally {
    Tally {
      kills:     self.kills,
      deaths:    self.deaths,
      blessings: self.blessings,
    }
  }
}

/// Drop inactive rows and sort into leaderboard order (stable).
pub fn rank_rows(rows: &mut Vec<RankingRow>) {
  rows.retain(|r| r.tally().is_active());
  rows.sort_by(|a, b| a.tally().rank_cmp(&b.tally()));
}

// ─── Detail views ────────────────────────────────────────────────────────────

/// Kills or deaths against one opponent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpponentTally {
  pub name:    String,
  /// `None` when the opponent has since left the roster.
  pub faction: Option<Faction>,
  pub count:   u64,
  pub last_at: NaiveDateTime,
}

/// A single identity's record within a window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerDetail {
  pub identity: Identity,
  pub tally:    Tally,
  pub kd_ratio: f64,
  pub score:    i64,
  /// Opponents this identity killed, most frequent first.
  pub victims:  Vec<OpponentTally>,
  /// Opponents that killed this identity, most frequent first.
  pub killers:  Vec<OpponentTally>,
}

/// Totals for one faction within a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionTally {
  pub faction:        Faction,
  pub tally:          Tally,
  /// Identities with at least one kill or death in the window.
  pub active_players: u64,
}

/// An alias group with its members ranked individually.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDetail {
  pub group:   AliasGroup,
  pub members: Vec<RankingRow>,
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  fn at(d: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, d)
      .unwrap()
      .and_hms_opt(h, m, s)
      .unwrap()
  }

  fn tally(kills: u64, deaths: u64, blessings: u64) -> Tally {
    Tally { kills, deaths, blessings }
  }

  #[test]
  fn score_formula() {
    assert_eq!(tally(4, 2, 1).score(), 4 * 3 + 1 - 2);
    assert_eq!(tally(0, 5, 0).score(), -5);
  }

  #[test]
  fn kd_ratio_degenerates_to_kills() {
    assert_eq!(tally(7, 0, 0).kd_ratio(), 7.0);
    assert_eq!(tally(0, 0, 0).kd_ratio(), 0.0);
    assert_eq!(tally(3, 2, 0).kd_ratio(), 1.5);
  }

  #[test]
  fn tallies_sum_fieldwise() {
    let total: Tally = [tally(1, 2, 3), tally(10, 20, 30)].into_iter().sum();
    assert_eq!(total, tally(11, 22, 33));
  }

  #[test]
  fn rank_order_is_score_then_kills_then_deaths() {
    let mut rows = vec![
      RankingRow::new("low".into(), "".into(), None, 1, tally(1, 0, 0)),
      RankingRow::new("idle".into(), "".into(), None, 1, tally(0, 0, 0)),
      // Same score (6) as `more_kills` but fewer kills.
      RankingRow::new("fewer_kills".into(), "".into(), None, 1, tally(2, 0, 0)),
      RankingRow::new("more_kills".into(), "".into(), None, 1, tally(3, 3, 0)),
      RankingRow::new("top".into(), "".into(), None, 1, tally(5, 1, 2)),
    ];
    rank_rows(&mut rows);
    let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["top", "more_kills", "fewer_kills", "low"]);

    assert_eq!(
      tally(2, 1, 1).rank_cmp(&tally(2, 2, 2)),
      Ordering::Less,
      "fewer deaths ranks first on equal score and kills"
    );
  }

  #[test]
  fn today_is_a_half_open_day() {
    let b = WindowPreset::Today.bounds(at(2, 13, 0, 0));
    assert!(b.contains(at(2, 0, 0, 0)));
    assert!(b.contains(at(2, 23, 59, 59)));
    assert!(!b.contains(at(3, 0, 0, 0)));
    assert!(!b.contains(at(1, 23, 59, 59)));
  }

  #[test]
  fn yesterday_excludes_today() {
    let b = WindowPreset::Yesterday.bounds(at(2, 13, 0, 0));
    assert!(b.contains(at(1, 8, 0, 0)));
    assert!(!b.contains(at(2, 0, 0, 0)));
  }

  #[test]
  fn day_presets_are_open_ended() {
    let b = WindowPreset::Last7Days.bounds(at(10, 13, 0, 0));
    assert_eq!(b.start, Some(at(3, 0, 0, 0)));
    assert_eq!(b.end, None);
    assert_eq!(WindowPreset::All.bounds(at(10, 0, 0, 0)), TimeBounds::default());
  }

  #[test]
  fn presets_parse_short_and_legacy_names() {
    assert_eq!(WindowPreset::parse("7d").unwrap(), WindowPreset::Last7Days);
    assert_eq!(WindowPreset::parse("month").unwrap(), WindowPreset::Last30Days);
    assert_eq!(WindowPreset::parse("year").unwrap(), WindowPreset::Last365Days);
    assert_eq!(WindowPreset::Last365Days.to_string(), "365d");
    assert_eq!(WindowPreset::Last7Days.to_string(), "7d");
    assert_eq!(WindowPreset::Last90Days.to_string(), "90d");
    assert!(matches!(
      WindowPreset::parse("fortnight"),
      Err(Error::UnknownWindow(_))
    ));
  }

  #[test]
  fn explicit_range_wins_and_is_inclusive() {
    let query = RankingQuery {
      preset: WindowPreset::Today,
      range: Some(ExplicitRange {
        start: at(1, 20, 0, 0),
        end:   at(1, 21, 0, 0),
      }),
      ..Default::default()
    };
    let filter = query.resolve(at(9, 0, 0, 0)).unwrap();
    assert!(filter.bounds.contains(at(1, 20, 0, 0)));
    assert!(filter.bounds.contains(at(1, 21, 0, 0)));
    assert!(!filter.bounds.contains(at(1, 21, 0, 1)));
  }

  #[test]
  fn inverted_range_is_rejected() {
    let range = ExplicitRange { start: at(2, 0, 0, 0), end: at(1, 0, 0, 0) };
    assert!(matches!(range.bounds(), Err(Error::InvertedWindow { .. })));
  }

  #[test]
  fn range_ending_at_the_last_instant_is_an_error() {
    let range = ExplicitRange { start: at(1, 0, 0, 0), end: NaiveDateTime::MAX };
    assert!(matches!(range.bounds(), Err(Error::WindowOutOfRange(_))));
  }

  #[test]
  fn blank_job_filter_is_dropped() {
    let query = RankingQuery { job: Some("  ".into()), ..Default::default() };
    assert_eq!(query.resolve(at(1, 0, 0, 0)).unwrap().job, None);
  }
}
