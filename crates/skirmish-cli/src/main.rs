//! `skirmish`: operator CLI for the battle-log leaderboard.
//!
//! # Usage
//!
//! ```text
//! skirmish roster roster.toml
//! skirmish import battle.log
//! skirmish leaderboard --window 7d --faction brahma --groups
//! skirmish player Alice --window all
//! skirmish export --window 30d --output report.csv
//! ```

mod output;
mod roster;
mod settings;

use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use skirmish_core::{
  ranking::{ExplicitRange, RankingQuery, WindowPreset},
  roster::Faction,
};
use skirmish_ingest::{BattleService, ParseOutcome, SystemClock, parse_log};
use skirmish_store_sqlite::SqliteStore;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

use crate::{roster::RosterFile, settings::AppConfig};

type Service = BattleService<SqliteStore, SystemClock>;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "skirmish", version, about = "Battle-log ingestion and PvP leaderboards")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "skirmish.toml")]
  config: PathBuf,

  /// Database file; overrides `store_path` from the config.
  #[arg(long, value_name = "FILE")]
  store: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Decode and parse a battle log, printing the events as JSON.
  Parse { file: PathBuf },

  /// Parse a battle log and persist it.
  Import {
    file: PathBuf,
    /// Print the full outcome as JSON.
    #[arg(long)]
    json: bool,
  },

  /// Ranked kills, deaths and blessings.
  Leaderboard {
    #[command(flatten)]
    window: WindowArgs,
    #[arg(long)]
    faction: Option<String>,
    #[arg(long)]
    job: Option<String>,
    /// Fold alias groups into one row each.
    #[arg(long)]
    groups: bool,
    #[arg(long)]
    json: bool,
  },

  /// One player's tally and opponents.
  Player {
    name: String,
    #[command(flatten)]
    window: WindowArgs,
    #[arg(long)]
    json: bool,
  },

  /// An alias group's members ranked individually.
  Group {
    name: String,
    #[command(flatten)]
    window: WindowArgs,
    #[arg(long)]
    faction: Option<String>,
    #[arg(long)]
    json: bool,
  },

  /// Totals per faction.
  Factions {
    #[command(flatten)]
    window: WindowArgs,
    #[arg(long)]
    json: bool,
  },

  /// Distinct jobs on the roster.
  Jobs,

  /// Alias groups on the roster.
  Groups,

  /// Write the leaderboard, or the raw battle records, as CSV.
  Export {
    #[command(flatten)]
    window: WindowArgs,
    #[arg(long)]
    faction: Option<String>,
    #[arg(long)]
    job: Option<String>,
    #[arg(long)]
    groups: bool,
    /// Export battle records in the window instead of ranked rows.
    #[arg(long, conflicts_with_all = ["faction", "job", "groups"])]
    records: bool,
    /// Output file; stdout when omitted.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
  },

  /// Load alias groups and identities from a TOML file.
  Roster { file: PathBuf },

  /// Delete every battle record.
  Reset {
    /// Required; there is no undo.
    #[arg(long)]
    yes: bool,
  },
}

#[derive(Args, Debug)]
struct WindowArgs {
  /// today, yesterday, 7d, 30d, 90d, 365d or all.
  #[arg(long, default_value = "today")]
  window: String,
  /// Range start, `YYYY-MM-DD[ HH:MM:SS]`; needs --end.
  #[arg(long)]
  start: Option<String>,
  /// Inclusive range end, `YYYY-MM-DD[ HH:MM:SS]`; needs --start.
  #[arg(long)]
  end: Option<String>,
}

impl WindowArgs {
  fn query(
    &self,
    faction: Option<&str>,
    job: Option<String>,
    group_mode: bool,
  ) -> Result<RankingQuery> {
    let range = match (&self.start, &self.end) {
      (Some(start), Some(end)) => Some(ExplicitRange {
        start: parse_instant(start, NaiveTime::MIN)?,
        end:   parse_instant(end, end_of_day())?,
      }),
      (None, None) => None,
      _ => bail!("--start and --end must be given together"),
    };
    Ok(RankingQuery {
      faction: faction.map(Faction::parse).transpose()?,
      job,
      preset: WindowPreset::parse(&self.window)?,
      range,
      group_mode,
    })
  }
}

fn end_of_day() -> NaiveTime {
  NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

/// A full timestamp, or a bare date at `time_of_day`.
fn parse_instant(s: &str, time_of_day: NaiveTime) -> Result<NaiveDateTime> {
  let s = s.trim();
  for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
      return Ok(dt);
    }
  }
  let day = NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .with_context(|| format!("invalid date/time {s:?}"))?;
  Ok(day.and_time(time_of_day))
}

fn print_json(value: &impl Serialize) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value).context("serialising output")?);
  Ok(())
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let mut cfg = AppConfig::load(&cli.config)?;
  if let Some(store) = &cli.store {
    cfg.store_path = settings::expand_tilde(store);
  }

  // Parsing never touches the store.
  if let Command::Parse { file } = &cli.command {
    return report_parse(&parse_log(&read_log(file)?, &cfg.encoding));
  }

  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;
  let svc = BattleService::new(store, SystemClock, cfg.encoding, cfg.ingest);

  run(&svc, cli.command).await
}

async fn run(svc: &Service, command: Command) -> Result<()> {
  match command {
    Command::Parse { file } => report_parse(&svc.parse(&read_log(&file)?))?,

    Command::Import { file, json } => {
      let bytes = read_log(&file)?;
      let (parsed, persisted) = svc.import(&bytes).await;
      let Some(persisted) = persisted else {
        bail!("{}", parsed.message);
      };
      if json {
        print_json(&persisted)?;
      } else {
        println!("{}", parsed.message);
        println!("{}", persisted.message);
      }
      if !persisted.success {
        bail!("import incomplete");
      }
    }

    Command::Leaderboard { window, faction, job, groups, json } => {
      let query = window.query(faction.as_deref(), job, groups)?;
      let rows = svc.aggregate(&query).await?;
      if json {
        print_json(&rows)?;
      } else {
        print!("{}", output::ranking_table(&rows, groups));
      }
    }

    Command::Player { name, window, json } => {
      let query = window.query(None, None, false)?;
      let Some(detail) = svc.player(&name, &query).await? else {
        bail!("no live identity named {name:?}");
      };
      if json {
        print_json(&detail)?;
      } else {
        print!("{}", output::player_detail(&detail));
      }
    }

    Command::Group { name, window, faction, json } => {
      let query = window.query(faction.as_deref(), None, false)?;
      let Some(detail) = svc.group(&name, &query).await? else {
        bail!("no alias group named {name:?}");
      };
      if json {
        print_json(&detail)?;
      } else {
        if let Some(description) = &detail.group.description {
          println!("{} ({description})", detail.group.name);
        } else {
          println!("{}", detail.group.name);
        }
        print!("{}", output::ranking_table(&detail.members, false));
      }
    }

    Command::Factions { window, json } => {
      let query = window.query(None, None, false)?;
      let factions = svc.factions(&query).await?;
      if json {
        print_json(&factions)?;
      } else {
        print!("{}", output::faction_table(&factions));
      }
    }

    Command::Jobs => {
      for job in svc.jobs().await? {
        println!("{job}");
      }
    }

    Command::Groups => {
      print!("{}", output::group_list(&svc.groups().await?));
    }

    Command::Export { window, faction, job, groups, records, output } => {
      let query = window.query(faction.as_deref(), job, groups)?;
      let sink: Box<dyn std::io::Write> = match &output {
        Some(path) => Box::new(
          std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout().lock()),
      };
      if records {
        let bounds = svc.bounds(&query)?;
        let mut rows = svc.store().list_records().await?;
        rows.retain(|r| bounds.contains(r.fought_at));
        output::write_csv(&rows, sink)?;
        info!(records = rows.len(), "battle records exported");
      } else {
        let rows = svc.aggregate(&query).await?;
        output::write_csv(&rows, sink)?;
        info!(rows = rows.len(), "leaderboard exported");
      }
    }

    Command::Roster { file } => {
      let (groups, identities) = RosterFile::read(&file)?.load_into(svc.store()).await?;
      println!("loaded {groups} alias groups and {identities} identities");
    }

    Command::Reset { yes } => {
      if !yes {
        bail!("refusing to delete all battle records without --yes");
      }
      let removed = svc.reset().await?;
      println!("deleted {removed} battle records");
    }
  }
  Ok(())
}

fn report_parse(outcome: &ParseOutcome) -> Result<()> {
  print_json(outcome)?;
  if !outcome.success {
    bail!("{}", outcome.message);
  }
  Ok(())
}

fn read_log(path: &std::path::Path) -> Result<Vec<u8>> {
  std::fs::read(path).with_context(|| format!("reading battle log {}", path.display()))
}
