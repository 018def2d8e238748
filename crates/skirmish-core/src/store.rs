//! The `BattleStore` trait.
//!
//! Implemented by storage backends (e.g. `skirmish-store-sqlite`). The
//! ingestion coordinator and the service facade depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use chrono::NaiveDate;

use crate::{
  battle::{KillWrite, NewBattleRecord, RecordStamp},
  ranking::{FactionTally, GroupDetail, PlayerDetail, RankingFilter, RankingRow, TimeBounds},
  roster::{AliasGroup, Faction, Identity},
};

/// Classifies backend errors for the batch retry policy.
pub trait Transient {
  /// `true` when retrying the same operation may succeed: lock contention, a
  /// busy database, or a dedup-key race with another writer. Other constraint
  /// violations and decode errors are permanent.
  fn is_transient(&self) -> bool;
}

/// Abstraction over a battle-record store.
///
/// Battle records are append-mostly: the only in-place update is setting the
/// blessing flag, and the only delete is [`BattleStore::reset`].
pub trait BattleStore: Send + Sync {
  type Error: std::error::Error + Transient + Send + Sync + 'static;

  // ── Roster (read-only) ────────────────────────────────────────────────

  /// All identities that are not soft-deleted.
  fn live_roster(
    &self,
  ) -> impl Future<Output = Result<Vec<Identity>, Self::Error>> + Send + '_;

  fn alias_groups(
    &self,
  ) -> impl Future<Output = Result<Vec<AliasGroup>, Self::Error>> + Send + '_;

  // ── Battle records ────────────────────────────────────────────────────

  /// Persist one batch of kills in a single transaction.
  ///
  /// Each input yields one [`KillWrite`] in input order: `Inserted` with the
  /// new record, or `Duplicate` with the live record that already holds the
  /// same dedup key. Either the whole batch commits or none of it does.
  fn write_kills(
    &self,
    batch: Vec<NewBattleRecord>,
  ) -> impl Future<Output = Result<Vec<KillWrite>, Self::Error>> + Send + '_;

  /// Live records won by `winner` on `day`, for each requested pair.
  fn records_won_on(
    &self,
    keys: Vec<(String, NaiveDate)>,
  ) -> impl Future<Output = Result<Vec<RecordStamp>, Self::Error>> + Send + '_;

  /// Set the blessing flag on a batch of records in a single transaction.
  /// Returns how many flags actually changed; already-set flags are a no-op.
  fn mark_blessed(
    &self,
    record_ids: Vec<i64>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Number of live battle records.
  fn count_records(
    &self,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Hard-delete every battle record. Returns the number removed.
  fn reset(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Aggregation ───────────────────────────────────────────────────────

  /// Leaderboard rows for `filter`, already in rank order.
  fn rankings<'a>(
    &'a self,
    filter: &'a RankingFilter,
  ) -> impl Future<Output = Result<Vec<RankingRow>, Self::Error>> + Send + 'a;

  /// One identity's tally and opponent breakdown. `None` if no live identity
  /// has that name.
  fn player_detail(
    &self,
    name: String,
    bounds: TimeBounds,
  ) -> impl Future<Output = Result<Option<PlayerDetail>, Self::Error>> + Send + '_;

  /// A group's members ranked individually. `None` if the group is unknown.
  fn group_detail(
    &self,
    group_name: String,
    faction: Option<Faction>,
    bounds: TimeBounds,
  ) -> impl Future<Output = Result<Option<GroupDetail>, Self::Error>> + Send + '_;

  /// Per-faction totals, one entry per faction.
  fn faction_summary(
    &self,
    bounds: TimeBounds,
  ) -> impl Future<Output = Result<Vec<FactionTally>, Self::Error>> + Send + '_;

  /// Distinct jobs among live identities, sorted.
  fn list_jobs(
    &self,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;
}
