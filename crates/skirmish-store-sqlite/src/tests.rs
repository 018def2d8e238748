//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{NaiveDate, NaiveDateTime};
use skirmish_core::{
  battle::{DedupKey, KillWrite, NewBattleRecord},
  ranking::{RankingFilter, TimeBounds, WindowPreset},
  roster::Faction,
  store::{BattleStore, Transient},
};
use uuid::Uuid;

use crate::{Error, NewIdentity, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn at(day: u32, hour: u32, min: u32) -> NaiveDateTime {
  NaiveDate::from_ymd_opt(2025, 1, day)
    .unwrap()
    .and_hms_opt(hour, min, 0)
    .unwrap()
}

fn kill(winner: &str, loser: &str, fought_at: NaiveDateTime) -> NewBattleRecord {
  NewBattleRecord {
    key:        DedupKey { winner: winner.into(), loser: loser.into(), fought_at },
    x:          10,
    y:          20,
    created_by: 0,
    import_id:  Uuid::nil(),
  }
}

async fn add(s: &SqliteStore, name: &str, faction: Faction, job: &str, group: Option<&str>) {
  s.upsert_identity(NewIdentity {
    name:    name.into(),
    faction,
    job:     job.into(),
    group:   group.map(Into::into),
  })
  .await
  .unwrap();
}

/// Alice (brahma warrior), Bob (vishnu mage), Carol (shiva warrior).
async fn seeded() -> SqliteStore {
  let s = store().await;
  add(&s, "Alice", Faction::Brahma, "warrior", None).await;
  add(&s, "Bob", Faction::Vishnu, "mage", None).await;
  add(&s, "Carol", Faction::Shiva, "warrior", None).await;
  s
}

fn all_time() -> RankingFilter { RankingFilter::default() }

// ─── Writes ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_kills_collapse_to_one_record() {
  let s = seeded().await;

  let writes = s
    .write_kills(vec![kill("Alice", "Bob", at(1, 20, 0)), kill("Alice", "Bob", at(1, 20, 0))])
    .await
    .unwrap();
  assert!(writes[0].is_inserted());
  assert!(matches!(&writes[1], KillWrite::Duplicate(_)));
  assert_eq!(writes[0].stamp().record_id, writes[1].stamp().record_id);

  let again = s.write_kills(vec![kill("Alice", "Bob", at(1, 20, 0))]).await.unwrap();
  assert!(!again[0].is_inserted());
  assert_eq!(s.count_records().await.unwrap(), 1);
}

#[tokio::test]
async fn write_kills_preserves_input_order() {
  let s = seeded().await;
  let writes = s
    .write_kills(vec![
      kill("Bob", "Carol", at(1, 9, 0)),
      kill("Alice", "Bob", at(1, 8, 0)),
    ])
    .await
    .unwrap();
  assert_eq!(writes[0].stamp().winner, "Bob");
  assert_eq!(writes[1].stamp().winner, "Alice");
  assert!(writes.iter().all(|w| !w.stamp().blessed));
}

#[tokio::test]
async fn records_won_on_matches_winner_and_day() {
  let s = seeded().await;
  s.write_kills(vec![
    kill("Alice", "Bob", at(1, 20, 0)),
    kill("Alice", "Carol", at(1, 23, 59)),
    kill("Alice", "Bob", at(2, 0, 0)),
    kill("Bob", "Alice", at(1, 21, 0)),
  ])
  .await
  .unwrap();

  let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
  let stamps = s.records_won_on(vec![("Alice".into(), day)]).await.unwrap();
  let times: Vec<_> = stamps.iter().map(|st| st.fought_at).collect();
  assert_eq!(times, [at(1, 20, 0), at(1, 23, 59)]);
}

#[tokio::test]
async fn mark_blessed_only_counts_changes() {
  let s = seeded().await;
  let writes = s.write_kills(vec![kill("Alice", "Bob", at(1, 20, 0))]).await.unwrap();
  let id = writes[0].stamp().record_id;

  assert_eq!(s.mark_blessed(vec![id]).await.unwrap(), 1);
  assert_eq!(s.mark_blessed(vec![id]).await.unwrap(), 0);

  let dup = s.write_kills(vec![kill("Alice", "Bob", at(1, 20, 0))]).await.unwrap();
  assert!(dup[0].stamp().blessed);
}

/// Inserts a record behind `write_kills`' back, as a second writer would.
async fn insert_directly(
  s: &SqliteStore,
  fought_at: &'static str,
  blessed: i64,
) -> Result<(), Error> {
  s.conn
    .call(move |conn| {
      conn.execute(
        "INSERT INTO battle_records
           (winner, loser, pos_x, pos_y, blessed, fought_at, created_at)
         VALUES ('Alice', 'Bob', 0, 0, ?1, ?2, '2025-01-01T00:00:00Z')",
        rusqlite::params![blessed, fought_at],
      )?;
      Ok(())
    })
    .await?;
  Ok(())
}

#[tokio::test]
async fn dedup_conflict_is_transient_and_resolves_as_duplicate() {
  let s = seeded().await;
  s.write_kills(vec![kill("Alice", "Bob", at(1, 20, 0))]).await.unwrap();

  let err = insert_directly(&s, "2025-01-01 20:00:00", 0).await.unwrap_err();
  assert!(err.is_transient(), "{err}");

  // Re-running the losing write sees the winner's row.
  let again = s.write_kills(vec![kill("Alice", "Bob", at(1, 20, 0))]).await.unwrap();
  assert!(matches!(&again[0], KillWrite::Duplicate(_)));
  assert_eq!(s.count_records().await.unwrap(), 1);

  let err = insert_directly(&s, "2025-01-01 21:00:00", 2).await.unwrap_err();
  assert!(!err.is_transient(), "CHECK violations are permanent: {err}");
}

#[tokio::test]
async fn soft_deleted_record_is_invisible() {
  let s = seeded().await;
  let writes = s.write_kills(vec![kill("Alice", "Bob", at(1, 20, 0))]).await.unwrap();
  assert!(s.soft_delete_record(writes[0].stamp().record_id).await.unwrap());

  assert_eq!(s.count_records().await.unwrap(), 0);
  assert!(s.rankings(&all_time()).await.unwrap().is_empty());

  // The dedup key is free again once the old record is deleted.
  let again = s.write_kills(vec![kill("Alice", "Bob", at(1, 20, 0))]).await.unwrap();
  assert!(again[0].is_inserted());
  assert_eq!(s.list_records().await.unwrap().len(), 1);
}

#[tokio::test]
async fn reset_removes_everything() {
  let s = seeded().await;
  s.write_kills(vec![kill("Alice", "Bob", at(1, 20, 0)), kill("Bob", "Alice", at(1, 21, 0))])
    .await
    .unwrap();
  assert_eq!(s.reset().await.unwrap(), 2);
  assert_eq!(s.count_records().await.unwrap(), 0);
}

// ─── Rankings ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rankings_score_and_order() {
  let s = seeded().await;
  add(&s, "Dave", Faction::Shiva, "priest", None).await;
  let writes = s
    .write_kills(vec![
      kill("Alice", "Bob", at(1, 20, 0)),
      kill("Alice", "Bob", at(1, 20, 5)),
      kill("Bob", "Carol", at(1, 21, 0)),
    ])
    .await
    .unwrap();
  s.mark_blessed(vec![writes[0].stamp().record_id]).await.unwrap();

  let rows = s.rankings(&all_time()).await.unwrap();
  let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
  assert_eq!(names, ["Alice", "Bob", "Carol"]);

  let alice = &rows[0];
  assert_eq!((alice.kills, alice.deaths, alice.blessings), (2, 0, 1));
  assert_eq!(alice.score, 7);
  assert_eq!(alice.kd_ratio, 2.0);
  assert_eq!(alice.faction, Some(Faction::Brahma));
  assert_eq!(alice.job, "warrior");
  assert_eq!(alice.members, 1);

  let bob = &rows[1];
  assert_eq!(bob.score, 1);
  assert_eq!(bob.kd_ratio, 0.5);
  assert_eq!(rows[2].score, -1);
}

#[tokio::test]
async fn unknown_names_never_rank() {
  let s = seeded().await;
  s.write_kills(vec![kill("Alice", "Mallory", at(1, 20, 0))]).await.unwrap();
  let rows = s.rankings(&all_time()).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].name, "Alice");
}

#[tokio::test]
async fn soft_deleted_identity_is_excluded() {
  let s = seeded().await;
  s.write_kills(vec![kill("Alice", "Bob", at(1, 20, 0))]).await.unwrap();
  assert!(s.soft_delete_identity("Bob".into()).await.unwrap());
  assert!(!s.soft_delete_identity("Bob".into()).await.unwrap());

  let rows = s.rankings(&all_time()).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].name, "Alice");
  assert_eq!(s.live_roster().await.unwrap().len(), 2);
}

#[tokio::test]
async fn faction_and_job_filters() {
  let s = seeded().await;
  s.write_kills(vec![kill("Alice", "Bob", at(1, 20, 0)), kill("Carol", "Bob", at(1, 21, 0))])
    .await
    .unwrap();

  let shiva = RankingFilter { faction: Some(Faction::Shiva), ..all_time() };
  let rows = s.rankings(&shiva).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].name, "Carol");

  let warriors = RankingFilter { job: Some("warrior".into()), ..all_time() };
  let names: Vec<_> = s
    .rankings(&warriors)
    .await
    .unwrap()
    .into_iter()
    .map(|r| r.name)
    .collect();
  assert_eq!(names.len(), 2);
  assert!(!names.contains(&"Bob".to_owned()));
}

#[tokio::test]
async fn today_window_ignores_yesterday() {
  let s = seeded().await;
  s.write_kills(vec![kill("Alice", "Bob", at(1, 20, 0))]).await.unwrap();

  let now = at(2, 12, 0);
  let today = RankingFilter { bounds: WindowPreset::Today.bounds(now), ..all_time() };
  assert!(s.rankings(&today).await.unwrap().is_empty());

  let yesterday = RankingFilter { bounds: WindowPreset::Yesterday.bounds(now), ..all_time() };
  assert_eq!(s.rankings(&yesterday).await.unwrap().len(), 2);
}

#[tokio::test]
async fn window_end_is_exclusive() {
  let s = seeded().await;
  s.write_kills(vec![kill("Alice", "Bob", at(2, 0, 0))]).await.unwrap();
  let bounds = TimeBounds { start: Some(at(1, 0, 0)), end: Some(at(2, 0, 0)) };
  let filter = RankingFilter { bounds, ..all_time() };
  assert!(s.rankings(&filter).await.unwrap().is_empty());
}

// ─── Alias groups ────────────────────────────────────────────────────────────

#[tokio::test]
async fn group_mode_sums_members() {
  let s = seeded().await;
  s.upsert_alias_group("Mains".into(), None).await.unwrap();
  add(&s, "Alice", Faction::Brahma, "warrior", Some("Mains")).await;
  add(&s, "Alt", Faction::Brahma, "mage", Some("Mains")).await;

  s.write_kills(vec![
    kill("Alice", "Bob", at(1, 20, 0)),
    kill("Alt", "Bob", at(1, 20, 1)),
    kill("Bob", "Alt", at(1, 20, 2)),
  ])
  .await
  .unwrap();

  let solo = s.rankings(&all_time()).await.unwrap();
  let grouped = s
    .rankings(&RankingFilter { group_mode: true, ..all_time() })
    .await
    .unwrap();

  let mains = grouped.iter().find(|r| r.name == "Mains").unwrap();
  let alice = solo.iter().find(|r| r.name == "Alice").unwrap();
  let alt = solo.iter().find(|r| r.name == "Alt").unwrap();
  assert_eq!(mains.tally(), alice.tally() + alt.tally());
  assert_eq!(mains.members, 2);
  assert_eq!(mains.faction, Some(Faction::Brahma));
  assert!(mains.job.contains("warrior") && mains.job.contains("mage"));
  assert!(mains.job.contains('/'));

  assert!(!grouped.iter().any(|r| r.name == "Alice" || r.name == "Alt"));
  assert!(grouped.iter().any(|r| r.name == "Bob" && r.members == 1));
}

#[tokio::test]
async fn mixed_faction_group_has_no_faction() {
  let s = seeded().await;
  s.upsert_alias_group("Split".into(), Some("two factions".into())).await.unwrap();
  add(&s, "Alice", Faction::Brahma, "warrior", Some("Split")).await;
  add(&s, "Bob", Faction::Vishnu, "mage", Some("Split")).await;
  s.write_kills(vec![kill("Alice", "Carol", at(1, 20, 0))]).await.unwrap();

  let grouped = s
    .rankings(&RankingFilter { group_mode: true, ..all_time() })
    .await
    .unwrap();
  let split = grouped.iter().find(|r| r.name == "Split").unwrap();
  assert_eq!(split.faction, None);
}

#[tokio::test]
async fn group_mode_applies_faction_and_job_filters_to_members() {
  let s = seeded().await;
  s.upsert_alias_group("Split".into(), None).await.unwrap();
  add(&s, "Alice", Faction::Brahma, "warrior", Some("Split")).await;
  add(&s, "Bob", Faction::Vishnu, "mage", Some("Split")).await;
  s.write_kills(vec![kill("Alice", "Carol", at(1, 20, 0)), kill("Bob", "Carol", at(1, 20, 1))])
    .await
    .unwrap();

  let brahma = RankingFilter { faction: Some(Faction::Brahma), group_mode: true, ..all_time() };
  let rows = s.rankings(&brahma).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].name, "Split");
  assert_eq!((rows[0].kills, rows[0].members), (1, 1));
  assert_eq!(rows[0].faction, Some(Faction::Brahma));
  assert_eq!(rows[0].job, "warrior");

  let warriors = RankingFilter { job: Some("warrior".into()), group_mode: true, ..all_time() };
  let rows = s.rankings(&warriors).await.unwrap();
  let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
  assert_eq!(names, ["Split", "Carol"]);
  assert_eq!(rows[0].kills, 1);
  assert_eq!(rows[1].deaths, 2);
}

#[tokio::test]
async fn group_jobs_keep_commas_inside_names() {
  let s = seeded().await;
  s.upsert_alias_group("Mains".into(), None).await.unwrap();
  add(&s, "Alice", Faction::Brahma, "sword,shield", Some("Mains")).await;
  add(&s, "Alt", Faction::Brahma, "mage", Some("Mains")).await;
  add(&s, "Alt2", Faction::Brahma, "", Some("Mains")).await;
  add(&s, "Alt3", Faction::Brahma, "mage", Some("Mains")).await;
  s.write_kills(vec![kill("Alice", "Bob", at(1, 20, 0))]).await.unwrap();

  let grouped = s
    .rankings(&RankingFilter { group_mode: true, ..all_time() })
    .await
    .unwrap();
  let mains = grouped.iter().find(|r| r.name == "Mains").unwrap();
  assert_eq!(mains.job, "mage/sword,shield");
  assert_eq!(mains.members, 4);
}

#[tokio::test]
async fn group_detail_lists_members() {
  let s = seeded().await;
  s.upsert_alias_group("Mains".into(), None).await.unwrap();
  add(&s, "Alice", Faction::Brahma, "warrior", Some("Mains")).await;
  add(&s, "Alt", Faction::Brahma, "mage", Some("Mains")).await;
  s.write_kills(vec![kill("Alice", "Bob", at(1, 20, 0)), kill("Alice", "Carol", at(1, 20, 1))])
    .await
    .unwrap();

  let detail = s
    .group_detail("Mains".into(), None, TimeBounds::default())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(detail.group.name, "Mains");
  // Alt has no activity, so only Alice is listed.
  assert_eq!(detail.members.len(), 1);
  assert_eq!(detail.members[0].kills, 2);

  assert!(s
    .group_detail("Nobody".into(), None, TimeBounds::default())
    .await
    .unwrap()
    .is_none());
}

#[tokio::test]
async fn upsert_alias_group_updates_description() {
  let s = store().await;
  let first = s.upsert_alias_group("Mains".into(), None).await.unwrap();
  let second = s.upsert_alias_group("Mains".into(), Some("main chars".into())).await.unwrap();
  assert_eq!(first.group_id, second.group_id);

  let groups = s.alias_groups().await.unwrap();
  assert_eq!(groups.len(), 1);
  assert_eq!(groups[0].description.as_deref(), Some("main chars"));
}

// ─── Roster ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_identity_updates_by_name() {
  let s = seeded().await;
  add(&s, "Alice", Faction::Shiva, "mage", None).await;

  let roster = s.live_roster().await.unwrap();
  assert_eq!(roster.len(), 3);
  let alice = roster.iter().find(|i| i.name == "Alice").unwrap();
  assert_eq!(alice.faction, Faction::Shiva);
  assert_eq!(alice.job, "mage");
}

#[tokio::test]
async fn upsert_identity_rejects_unknown_group() {
  let s = store().await;
  let err = s
    .upsert_identity(NewIdentity {
      name:    "Alice".into(),
      faction: Faction::Brahma,
      job:     String::new(),
      group:   Some("Ghosts".into()),
    })
    .await
    .unwrap_err();
  assert!(matches!(&err, Error::GroupNotFound(g) if g == "Ghosts"));
  assert!(!err.is_transient());
  assert!(s.live_roster().await.unwrap().is_empty());
}

// ─── Detail views ────────────────────────────────────────────────────────────

#[tokio::test]
async fn player_detail_breaks_down_opponents() {
  let s = seeded().await;
  let writes = s
    .write_kills(vec![
      kill("Alice", "Bob", at(1, 20, 0)),
      kill("Alice", "Bob", at(1, 20, 5)),
      kill("Alice", "Carol", at(1, 21, 0)),
      kill("Carol", "Alice", at(1, 22, 0)),
    ])
    .await
    .unwrap();
  s.mark_blessed(vec![writes[2].stamp().record_id]).await.unwrap();

  let detail = s
    .player_detail("Alice".into(), TimeBounds::default())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(detail.identity.name, "Alice");
  assert_eq!((detail.tally.kills, detail.tally.deaths, detail.tally.blessings), (3, 1, 1));
  assert_eq!(detail.score, 9);
  assert_eq!(detail.kd_ratio, 3.0);

  assert_eq!(detail.victims[0].name, "Bob");
  assert_eq!(detail.victims[0].count, 2);
  assert_eq!(detail.victims[0].last_at, at(1, 20, 5));
  assert_eq!(detail.victims[0].faction, Some(Faction::Vishnu));
  assert_eq!(detail.victims[1].name, "Carol");

  assert_eq!(detail.killers.len(), 1);
  assert_eq!(detail.killers[0].name, "Carol");

  assert!(s
    .player_detail("Nobody".into(), TimeBounds::default())
    .await
    .unwrap()
    .is_none());
}

#[tokio::test]
async fn faction_summary_covers_every_faction() {
  let s = seeded().await;
  s.write_kills(vec![kill("Alice", "Bob", at(1, 20, 0)), kill("Alice", "Bob", at(1, 20, 1))])
    .await
    .unwrap();

  let summary = s.faction_summary(TimeBounds::default()).await.unwrap();
  assert_eq!(summary.len(), 3);

  let brahma = summary.iter().find(|f| f.faction == Faction::Brahma).unwrap();
  assert_eq!(brahma.tally.kills, 2);
  assert_eq!(brahma.active_players, 1);

  let vishnu = summary.iter().find(|f| f.faction == Faction::Vishnu).unwrap();
  assert_eq!(vishnu.tally.deaths, 2);

  let shiva = summary.iter().find(|f| f.faction == Faction::Shiva).unwrap();
  assert_eq!(shiva.active_players, 0);
  assert_eq!(shiva.tally.kills, 0);
}

#[tokio::test]
async fn jobs_are_distinct_and_sorted() {
  let s = seeded().await;
  add(&s, "Erin", Faction::Shiva, "", None).await;
  assert_eq!(s.list_jobs().await.unwrap(), ["mage", "warrior"]);
}
