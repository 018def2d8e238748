//! Roster loading and operator maintenance.
//!
//! These are inherent methods on [`SqliteStore`] rather than part of
//! [`BattleStore`](skirmish_core::store::BattleStore): ingestion only ever
//! reads the roster.

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use serde::Deserialize;
use tracing::info;

use skirmish_core::{
  battle::BattleRecord,
  roster::{AliasGroup, Faction, Identity},
};

use crate::{
  Error, Result,
  encode::{RawIdentity, RawRecord, encode_dt, encode_faction},
  store::SqliteStore,
};

/// Input for [`SqliteStore::upsert_identity`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewIdentity {
  pub name:    String,
  pub faction: Faction,
  #[serde(default)]
  pub job:     String,
  /// Name of the alias group this identity belongs to.
  #[serde(default)]
  pub group:   Option<String>,
}

impl SqliteStore {
  /// Create the group, or update its description if it already exists.
  pub async fn upsert_alias_group(
    &self,
    name: String,
    description: Option<String>,
  ) -> Result<AliasGroup> {
    let group_id: i64 = self
      .conn
      .call({
        let name = name.clone();
        let description = description.clone();
        move |conn| {
          Ok(conn.query_row(
            "INSERT INTO alias_groups (name, description) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET description = excluded.description
             RETURNING group_id",
            rusqlite::params![name, description],
            |r| r.get(0),
          )?)
        }
      })
      .await?;

    Ok(AliasGroup { group_id, name, description })
  }

  /// Insert a live identity, or update the live identity with that name.
  ///
  /// Fails with [`Error::GroupNotFound`] when `input.group` names a group
  /// that does not exist.
  pub async fn upsert_identity(&self, input: NewIdentity) -> Result<Identity> {
    let name = input.name.trim().to_owned();
    let faction = encode_faction(input.faction);
    let job = input.job.trim().to_owned();
    let group = input.group.clone();

    let raw: Option<RawIdentity> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let group_id: Option<i64> = match &group {
          Some(g) => {
            let id = tx
              .query_row(
                "SELECT group_id FROM alias_groups WHERE name = ?1",
                rusqlite::params![g],
                |r| r.get(0),
              )
              .optional()?;
            if id.is_none() {
              return Ok(None);
            }
            id
          }
          None => None,
        };

        let existing: Option<i64> = tx
          .query_row(
            "SELECT identity_id FROM identities WHERE name = ?1 AND deleted_at IS NULL",
            rusqlite::params![name],
            |r| r.get(0),
          )
          .optional()?;

        let identity_id = match existing {
          Some(id) => {
            tx.execute(
              "UPDATE identities SET faction = ?2, job = ?3, alias_group_id = ?4
               WHERE identity_id = ?1",
              rusqlite::params![id, faction, job, group_id],
            )?;
            id
          }
          None => {
            tx.execute(
              "INSERT INTO identities (name, faction, job, alias_group_id)
               VALUES (?1, ?2, ?3, ?4)",
              rusqlite::params![name, faction, job, group_id],
            )?;
            tx.last_insert_rowid()
          }
        };

        tx.commit()?;
        Ok(Some(RawIdentity {
          identity_id,
          name,
          faction,
          job,
          alias_group_id: group_id,
        }))
      })
      .await?;

    match raw {
      Some(raw) => raw.into_identity(),
      None => Err(Error::GroupNotFound(input.group.unwrap_or_default())),
    }
  }

  /// Soft-delete the live identity with `name`. Returns `false` if none.
  pub async fn soft_delete_identity(&self, name: String) -> Result<bool> {
    let now = encode_dt(Utc::now());
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE identities SET deleted_at = ?2 WHERE name = ?1 AND deleted_at IS NULL",
          rusqlite::params![name, now],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  /// Soft-delete one battle record. Returns `false` if it was not live.
  pub async fn soft_delete_record(&self, record_id: i64) -> Result<bool> {
    let now = encode_dt(Utc::now());
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE battle_records SET deleted_at = ?2 WHERE record_id = ?1 AND deleted_at IS NULL",
          rusqlite::params![record_id, now],
        )?)
      })
      .await?;
    if changed > 0 {
      info!(record_id, "battle record soft-deleted");
    }
    Ok(changed > 0)
  }

  /// All live battle records in fight order.
  pub async fn list_records(&self) -> Result<Vec<BattleRecord>> {
    let raws: Vec<RawRecord> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM battle_records WHERE deleted_at IS NULL ORDER BY fought_at, record_id",
          RawRecord::COLUMNS
        ))?;
        let rows = stmt
          .query_map([], RawRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }
}
