//! Ingestion: persist resolved kills, then correlate blessings onto them.
//!
//! Writes are committed in bounded batches, one store transaction per batch.
//! A batch that still fails after the retry policy gives up stops the run;
//! everything committed before it stays committed and is reported.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{Instrument as _, debug, error, info, info_span, warn};
use uuid::Uuid;

use skirmish_core::{
  battle::{BlessingEvent, KillEvent, NewBattleRecord, RecordStamp},
  store::BattleStore,
};

use crate::{
  Error, Result,
  retry::RetryPolicy,
  roster::RosterIndex,
};

/// Tuning for an ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
  /// Events per committed batch. `0` behaves like `1`.
  pub batch_size: usize,
  pub retry:      RetryPolicy,
}

impl Default for IngestConfig {
  fn default() -> Self {
    Self { batch_size: 500, retry: RetryPolicy::default() }
  }
}

/// Counts for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
  pub inserted:             u64,
  pub duplicates:           u64,
  pub unresolved_kills:     u64,
  pub unresolved_blessings: u64,
  /// Blessings matched to a record, whether or not the flag was already set.
  pub correlated:           u64,
  /// Flags that went from cleared to set in this run.
  pub newly_blessed:        u64,
  pub uncorrelated:         u64,
  pub committed_batches:    u64,
  pub unresolved_names:     BTreeSet<String>,
}

impl IngestSummary {
  /// One-line human summary.
  pub fn message(&self) -> String {
    let mut msg = format!(
      "{} inserted, {} duplicate, {} blessed ({} correlated, {} uncorrelated)",
      self.inserted, self.duplicates, self.newly_blessed, self.correlated, self.uncorrelated,
    );
    if self.unresolved_kills > 0 || self.unresolved_blessings > 0 {
      msg.push_str(&format!(
        "; skipped {} kills and {} blessings with {} unregistered names",
        self.unresolved_kills,
        self.unresolved_blessings,
        self.unresolved_names.len(),
      ));
    }
    msg
  }
}

/// Which pass a failed batch belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
  Kills,
  Blessings,
}

/// The batch that stopped a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
  pub stage:       Stage,
  /// 0-based batch index within the stage.
  pub batch:       usize,
  /// Resolved items of the stage committed before this batch.
  pub committed:   usize,
  /// Resolved items of the stage that were not committed.
  pub uncommitted: usize,
  pub error:       String,
}

/// Result of an ingestion run: counts so far plus the failure, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
  pub import_id: Uuid,
  pub summary:   IngestSummary,
  pub failure:   Option<BatchFailure>,
}

/// Live records grouped by `(winner, calendar day)` for blessing lookup.
#[derive(Debug, Default)]
struct DayIndex(HashMap<(String, NaiveDate), Vec<RecordStamp>>);

impl DayIndex {
  fn insert(&mut self, stamp: RecordStamp) {
    let bucket = self.0.entry(stamp.winner_day()).or_default();
    if !bucket.iter().any(|s| s.record_id == stamp.record_id) {
      bucket.push(stamp);
    }
  }

  fn find_mut(&mut self, winner: &str, event: &BlessingEvent) -> Option<&mut RecordStamp> {
    self
      .0
      .get_mut(&(winner.to_owned(), event.timestamp.date()))?
      .iter_mut()
      .find(|s| s.fought_at == event.timestamp)
  }
}

/// Drives one ingestion run against a store.
pub struct IngestCoordinator<'a, S> {
  store:  &'a S,
  config: &'a IngestConfig,
}

impl<'a, S: BattleStore> IngestCoordinator<'a, S> {
  pub fn new(store: &'a S, config: &'a IngestConfig) -> Self { Self { store, config } }

  /// Persist `kills` and correlate `blessings`.
  ///
  /// Errors only when the roster cannot be read. Batch failures are reported
  /// inside the returned [`IngestReport`].
  pub async fn ingest(
    &self,
    kills: &[KillEvent],
    blessings: &[BlessingEvent],
  ) -> Result<IngestReport> {
    let import_id = Uuid::new_v4();
    let span = info_span!("ingest", %import_id);
    self.run(import_id, kills, blessings).instrument(span).await
  }

  async fn run(
    &self,
    import_id: Uuid,
    kills: &[KillEvent],
    blessings: &[BlessingEvent],
  ) -> Result<IngestReport> {
    let roster = RosterIndex::new(self.store.live_roster().await.map_err(Error::store)?);
    info!(
      kills = kills.len(),
      blessings = blessings.len(),
      roster = roster.len(),
      "ingestion started"
    );

    let mut summary = IngestSummary::default();
    let mut days = DayIndex::default();
    let batch_size = self.config.batch_size.max(1);

    // ── Kills ───────────────────────────────────────────────────────────────

    let mut records = Vec::with_capacity(kills.len());
    for kill in kills {
      let killer = roster.lookup(&kill.killer);
      let victim = roster.lookup(&kill.victim);
      match (killer, victim) {
        (Some(killer), Some(_)) => records.push(NewBattleRecord {
          key: kill.dedup_key(),
          x: kill.x,
          y: kill.y,
          created_by: killer.identity_id,
          import_id,
        }),
        _ => {
          summary.unresolved_kills += 1;
          for (name, found) in [(&kill.killer, killer), (&kill.victim, victim)] {
            if found.is_none() {
              summary.unresolved_names.insert(name.trim().to_owned());
            }
          }
          debug!(killer = %kill.killer, victim = %kill.victim, "kill skipped: unresolved name");
        }
      }
    }

    for (batch, chunk) in records.chunks(batch_size).enumerate() {
      let result = self
        .config
        .retry
        .run("kill batch", || self.store.write_kills(chunk.to_vec()))
        .await;
      match result {
        Ok(writes) => {
          summary.committed_batches += 1;
          for write in writes {
            if write.is_inserted() {
              summary.inserted += 1;
            } else {
              summary.duplicates += 1;
            }
            days.insert(write.stamp().clone());
          }
        }
        Err(e) => {
          let committed = batch * batch_size;
          error!(batch, committed, "kill batch failed: {e}");
          return Ok(failed(import_id, summary, BatchFailure {
            stage: Stage::Kills,
            batch,
            committed,
            uncommitted: records.len() - committed,
            error: e.to_string(),
          }));
        }
      }
    }

    // ── Blessings ───────────────────────────────────────────────────────────

    let mut resolved = Vec::with_capacity(blessings.len());
    for blessing in blessings {
      if roster.lookup(&blessing.recipient).is_some() {
        resolved.push(blessing);
      } else {
        summary.unresolved_blessings += 1;
        summary.unresolved_names.insert(blessing.recipient.trim().to_owned());
      }
    }

    // Earlier imports may hold records this log's blessings refer to.
    let wanted: BTreeSet<(String, NaiveDate)> = resolved
      .iter()
      .map(|b| (b.recipient.trim().to_owned(), b.timestamp.date()))
      .collect();
    if !wanted.is_empty() {
      let wanted: Vec<_> = wanted.into_iter().collect();
      let result = self
        .config
        .retry
        .run("blessing lookup", || self.store.records_won_on(wanted.clone()))
        .await;
      match result {
        Ok(stamps) => stamps.into_iter().for_each(|stamp| days.insert(stamp)),
        Err(e) => {
          error!("blessing lookup failed: {e}");
          return Ok(failed(import_id, summary, BatchFailure {
            stage: Stage::Blessings,
            batch: 0,
            committed: 0,
            uncommitted: resolved.len(),
            error: e.to_string(),
          }));
        }
      }
    }

    let mut to_flag = Vec::new();
    for blessing in resolved {
      match days.find_mut(blessing.recipient.trim(), blessing) {
        Some(stamp) => {
          summary.correlated += 1;
          if !stamp.blessed {
            stamp.blessed = true;
            to_flag.push(stamp.record_id);
          }
        }
        None => {
          summary.uncorrelated += 1;
          warn!(
            recipient = %blessing.recipient,
            at = %blessing.timestamp,
            "blessing has no kill at the same time"
          );
        }
      }
    }

    for (batch, chunk) in to_flag.chunks(batch_size).enumerate() {
      let result = self
        .config
        .retry
        .run("blessing batch", || self.store.mark_blessed(chunk.to_vec()))
        .await;
      match result {
        Ok(changed) => {
          summary.committed_batches += 1;
          summary.newly_blessed += changed;
        }
        Err(e) => {
          let committed = batch * batch_size;
          error!(batch, committed, "blessing batch failed: {e}");
          return Ok(failed(import_id, summary, BatchFailure {
            stage: Stage::Blessings,
            batch,
            committed,
            uncommitted: to_flag.len() - committed,
            error: e.to_string(),
          }));
        }
      }
    }

    if !summary.unresolved_names.is_empty() {
      warn!(
        names = summary.unresolved_names.len(),
        "battle log references unregistered names"
      );
    }
    info!(
      inserted = summary.inserted,
      duplicates = summary.duplicates,
      newly_blessed = summary.newly_blessed,
      uncorrelated = summary.uncorrelated,
      "ingestion finished"
    );
    Ok(IngestReport { import_id, summary, failure: None })
  }
}

fn failed(import_id: Uuid, summary: IngestSummary, failure: BatchFailure) -> IngestReport {
  IngestReport { import_id, summary, failure: Some(failure) }
}
