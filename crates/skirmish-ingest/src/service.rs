//! The `BattleService` facade: parse, persist and aggregate.

use serde::Serialize;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use skirmish_core::{
  battle::{BlessingEvent, KillEvent},
  ranking::{FactionTally, GroupDetail, PlayerDetail, RankingQuery, RankingRow, TimeBounds},
  roster::AliasGroup,
  store::BattleStore,
};
use skirmish_log::{EncodingConfig, MalformedLine, parse_bytes};

use crate::{
  Error, Result,
  clock::Clock,
  coordinator::{BatchFailure, IngestConfig, IngestCoordinator, IngestSummary},
};

/// Result of [`BattleService::parse`].
#[derive(Debug, Clone, Serialize)]
pub struct ParseOutcome {
  pub success:         bool,
  pub message:         String,
  /// `None` when no encoding could decode the input.
  pub encoding:        Option<&'static str>,
  pub kill_events:     Vec<KillEvent>,
  pub blessing_events: Vec<BlessingEvent>,
  pub malformed:       Vec<MalformedLine>,
}

/// Result of [`BattleService::persist`].
#[derive(Debug, Clone, Serialize)]
pub struct PersistOutcome {
  pub success:   bool,
  pub message:   String,
  pub import_id: Option<Uuid>,
  pub summary:   IngestSummary,
  /// The batch that stopped the run; earlier batches stay committed.
  pub failure:   Option<BatchFailure>,
}

/// Decode and parse one battle log. Needs no store.
pub fn parse_log(bytes: &[u8], encoding: &EncodingConfig) -> ParseOutcome {
  let _span = info_span!("parse", bytes = bytes.len()).entered();
  match parse_bytes(bytes, encoding) {
    Ok(file) => {
      let mut message = format!(
        "decoded as {}: {} kills, {} blessings",
        file.encoding,
        file.log.kills.len(),
        file.log.blessings.len(),
      );
      if !file.log.malformed.is_empty() {
        message.push_str(&format!(", {} malformed lines skipped", file.log.malformed.len()));
      }
      if file.had_replacements {
        message.push_str(" (some characters could not be decoded)");
      }
      info!("{message}");
      ParseOutcome {
        success: true,
        message,
        encoding: Some(file.encoding),
        kill_events: file.log.kills,
        blessing_events: file.log.blessings,
        malformed: file.log.malformed,
      }
    }
    Err(e) => {
      warn!("parse failed: {e}");
      ParseOutcome {
        success: false,
        message: e.to_string(),
        encoding: None,
        kill_events: Vec::new(),
        blessing_events: Vec::new(),
        malformed: Vec::new(),
      }
    }
  }
}

/// Entry point for everything the engine does.
pub struct BattleService<S, C> {
  store:    S,
  clock:    C,
  encoding: EncodingConfig,
  ingest:   IngestConfig,
}

impl<S: BattleStore, C: Clock> BattleService<S, C> {
  pub fn new(store: S, clock: C, encoding: EncodingConfig, ingest: IngestConfig) -> Self {
    Self { store, clock, encoding, ingest }
  }

  pub fn store(&self) -> &S { &self.store }

  /// Decode and parse one battle log.
  pub fn parse(&self, bytes: &[u8]) -> ParseOutcome { parse_log(bytes, &self.encoding) }

  /// Persist parsed events and correlate blessings.
  pub async fn persist(&self, kills: &[KillEvent], blessings: &[BlessingEvent]) -> PersistOutcome {
    let coordinator = IngestCoordinator::new(&self.store, &self.ingest);
    match coordinator.ingest(kills, blessings).await {
      Ok(report) => {
        let mut message = report.summary.message();
        if let Some(failure) = &report.failure {
          message = format!(
            "{message}; stopped at {:?} batch {} ({} committed, {} not committed): {}",
            failure.stage, failure.batch, failure.committed, failure.uncommitted, failure.error,
          );
        }
        PersistOutcome {
          success: report.failure.is_none(),
          message,
          import_id: Some(report.import_id),
          summary: report.summary,
          failure: report.failure,
        }
      }
      Err(e) => PersistOutcome {
        success:   false,
        message:   e.to_string(),
        import_id: None,
        summary:   IngestSummary::default(),
        failure:   None,
      },
    }
  }

  /// Parse then persist; the persist step is skipped when parsing fails.
  pub async fn import(&self, bytes: &[u8]) -> (ParseOutcome, Option<PersistOutcome>) {
    let parsed = self.parse(bytes);
    if !parsed.success {
      return (parsed, None);
    }
    let persisted = self.persist(&parsed.kill_events, &parsed.blessing_events).await;
    (parsed, Some(persisted))
  }

  /// The window `query` selects, relative to the service clock.
  pub fn bounds(&self, query: &RankingQuery) -> Result<TimeBounds> {
    Ok(query.bounds(self.clock.now())?)
  }

  /// Leaderboard rows in rank order.
  pub async fn aggregate(&self, query: &RankingQuery) -> Result<Vec<RankingRow>> {
    let filter = query.resolve(self.clock.now())?;
    self.store.rankings(&filter).await.map_err(Error::store)
  }

  /// One identity's tally and opponents over the query's window.
  pub async fn player(&self, name: &str, query: &RankingQuery) -> Result<Option<PlayerDetail>> {
    let bounds = self.bounds(query)?;
    self
      .store
      .player_detail(name.trim().to_owned(), bounds)
      .await
      .map_err(Error::store)
  }

  /// A group's members over the query's window, filtered by its faction.
  pub async fn group(&self, name: &str, query: &RankingQuery) -> Result<Option<GroupDetail>> {
    let bounds = self.bounds(query)?;
    self
      .store
      .group_detail(name.trim().to_owned(), query.faction, bounds)
      .await
      .map_err(Error::store)
  }

  pub async fn factions(&self, query: &RankingQuery) -> Result<Vec<FactionTally>> {
    let bounds = self.bounds(query)?;
    self.store.faction_summary(bounds).await.map_err(Error::store)
  }

  /// Every alias group, by name.
  pub async fn groups(&self) -> Result<Vec<AliasGroup>> {
    self.store.alias_groups().await.map_err(Error::store)
  }

  pub async fn jobs(&self) -> Result<Vec<String>> {
    self.store.list_jobs().await.map_err(Error::store)
  }

  /// Hard-delete every battle record.
  pub async fn reset(&self) -> Result<u64> {
    let removed = self.store.reset().await.map_err(Error::store)?;
    warn!(removed, "all battle records deleted");
    Ok(removed)
  }
}
