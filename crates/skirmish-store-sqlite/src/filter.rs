//! Parameterized predicate builder for the aggregation queries.
//!
//! Every optional filter is a named slot. A slot contributes its clause and
//! its bound parameter only when populated, so the SQL text never contains
//! caller data and a statement never binds a parameter it does not use.

use rusqlite::{ToSql, types::Value};
use skirmish_core::ranking::{RankingFilter, TimeBounds};
use skirmish_core::roster::Faction;

use crate::encode::{encode_faction, encode_ts};

/// An `AND`-joined list of clauses plus their named parameters.
#[derive(Debug, Clone, Default)]
pub struct Predicate {
  clauses: Vec<&'static str>,
  params:  Vec<(&'static str, Value)>,
}

impl Predicate {
  /// Start from an unconditional clause (e.g. the soft-delete check).
  pub fn always(clause: &'static str) -> Self {
    Self { clauses: vec![clause], params: Vec::new() }
  }

  /// Add `clause` bound to `name` when `value` is present.
  pub fn slot(
    mut self,
    clause: &'static str,
    name: &'static str,
    value: Option<impl Into<Value>>,
  ) -> Self {
    if let Some(value) = value {
      self.clauses.push(clause);
      self.params.push((name, value.into()));
    }
    self
  }

  pub fn sql(&self) -> String {
    if self.clauses.is_empty() {
      "1 = 1".to_owned()
    } else {
      self.clauses.join(" AND ")
    }
  }

  /// Combine the parameters of several predicates used in one statement.
  pub fn bind<'a>(parts: &[&'a Predicate]) -> Vec<(&'a str, &'a dyn ToSql)> {
    let mut out: Vec<(&'a str, &'a dyn ToSql)> = Vec::new();
    for &part in parts {
      for (name, value) in &part.params {
        if !out.iter().any(|(n, _)| n == name) {
          out.push((*name, value as &dyn ToSql));
        }
      }
    }
    out
  }
}

/// Clauses over `battle_records b`: live records inside the window.
pub fn record_predicate(bounds: &TimeBounds) -> Predicate {
  Predicate::always("b.deleted_at IS NULL")
    .slot("b.fought_at >= :start", ":start", bounds.start.map(encode_ts))
    .slot("b.fought_at < :end", ":end", bounds.end.map(encode_ts))
}

/// Clauses over `identities p`: live identities matching faction and job.
pub fn identity_predicate(faction: Option<Faction>, job: Option<&str>) -> Predicate {
  Predicate::always("p.deleted_at IS NULL")
    .slot("p.faction = :faction", ":faction", faction.map(encode_faction))
    .slot("p.job = :job", ":job", job.map(str::to_owned))
}

/// The two predicates a leaderboard query needs.
pub fn ranking_predicates(filter: &RankingFilter) -> (Predicate, Predicate) {
  (
    record_predicate(&filter.bounds),
    identity_predicate(filter.faction, filter.job.as_deref()),
  )
}
