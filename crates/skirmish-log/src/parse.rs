//! Battle-log line parser.
//!
//! Pipeline:
//!   decoded &str
//!     └─ lines()              → numbered lines
//!          └─ KILL_LINE / BLESSING_LINE → captures
//!               └─ parse_stamp()   → KillEvent | BlessingEvent | MalformedLine
//!
//! Lines matching neither grammar are chat noise and are skipped silently.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::{Captures, Regex};
use serde::Serialize;
use skirmish_core::battle::{BlessingEvent, KillEvent};
use tracing::{debug, info, warn};

// ─── Grammars ────────────────────────────────────────────────────────────────

/// `[战况]<killer> 击杀 <victim> !坐标:<x>，<y> (<YYYYMMDD>,<HH:MM:SS>)`
static KILL_LINE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r"\[战况\]\s*(?P<killer>\S.*?)\s+击杀\s+(?P<victim>\S.*?)\s*[!！]\s*坐标[:：]\s*(?P<x>\d+)\s*[，,]\s*(?P<y>\d+)\s*\((?P<date>\d{8}),\s*(?P<time>\d{2}:\d{2}:\d{2})\)",
  )
  .expect("kill grammar is a valid regex")
});

/// `[公告] <recipient> 得到了 <label> 的祝福! (<YYYYMMDD>,<HH:MM:SS>)`
static BLESSING_LINE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r"\[公告\]\s*(?P<recipient>\S.*?)\s+得到了\s*(?P<label>.*?)\s*的祝福\s*[!！]\s*\((?P<date>\d{8}),\s*(?P<time>\d{2}:\d{2}:\d{2})\)",
  )
  .expect("blessing grammar is a valid regex")
});

// ─── Output ──────────────────────────────────────────────────────────────────

/// Which grammar a malformed line matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
  Kill,
  Blessing,
}

/// A line that matched a grammar but whose fields could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedLine {
  /// 1-based.
  pub line_no: usize,
  pub kind:    LineKind,
  pub reason:  String,
}

/// Events extracted from one log, each list in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedLog {
  pub kills:     Vec<KillEvent>,
  pub blessings: Vec<BlessingEvent>,
  pub malformed: Vec<MalformedLine>,
}

// ─── Parser ──────────────────────────────────────────────────────────────────

/// Extract kill and blessing events from decoded log text.
///
/// Deterministic: identical text always yields an identical [`ParsedLog`].
pub fn parse_text(text: &str) -> ParsedLog {
  let mut log = ParsedLog::default();
  let mut total = 0usize;

  for (idx, line) in text.lines().enumerate() {
    total += 1;
    let line_no = idx + 1;

    if let Some(caps) = KILL_LINE.captures(line) {
      match kill_event(&caps) {
        Ok(event) => log.kills.push(event),
        Err(reason) => reject(&mut log, line_no, LineKind::Kill, reason),
      }
      continue;
    }

    if let Some(caps) = BLESSING_LINE.captures(line) {
      match blessing_event(&caps) {
        Ok(event) => {
          debug!(
            line_no,
            recipient = %event.recipient,
            label = %event.label,
            "blessing line"
          );
          log.blessings.push(event)
        }
        Err(reason) => reject(&mut log, line_no, LineKind::Blessing, reason),
      }
    }
  }

  info!(
    lines = total,
    kills = log.kills.len(),
    blessings = log.blessings.len(),
    malformed = log.malformed.len(),
    "battle log parsed"
  );
  log
}

fn reject(log: &mut ParsedLog, line_no: usize, kind: LineKind, reason: String) {
  warn!(line_no, ?kind, %reason, "dropping malformed battle-log line");
  log.malformed.push(MalformedLine { line_no, kind, reason });
}

fn kill_event(caps: &Captures<'_>) -> Result<KillEvent, String> {
  Ok(KillEvent {
    killer:    caps["killer"].trim().to_owned(),
    victim:    caps["victim"].trim().to_owned(),
    x:         coordinate(&caps["x"])?,
    y:         coordinate(&caps["y"])?,
    timestamp: parse_stamp(&caps["date"], &caps["time"])?,
  })
}

fn blessing_event(caps: &Captures<'_>) -> Result<BlessingEvent, String> {
  Ok(BlessingEvent {
    recipient: caps["recipient"].trim().to_owned(),
    label:     caps["label"].trim().to_owned(),
    timestamp: parse_stamp(&caps["date"], &caps["time"])?,
  })
}

fn coordinate(s: &str) -> Result<i32, String> {
  s.parse().map_err(|_| format!("coordinate out of range: {s}"))
}

/// Reassemble `YYYYMMDD` and `HH:MM:SS` into one instant.
///
/// `\d` is Unicode-aware, so `date` may hold non-ASCII digits; those are
/// rejected here rather than sliced.
fn parse_stamp(date: &str, time: &str) -> Result<NaiveDateTime, String> {
  if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
    return Err(format!("invalid date: {date}"));
  }
  let field = |range: std::ops::Range<usize>| -> Result<u32, String> {
    date
      .get(range)
      .and_then(|digits| digits.parse().ok())
      .ok_or_else(|| format!("invalid date: {date}"))
  };
  let year = field(0..4)? as i32;
  let day = NaiveDate::from_ymd_opt(year, field(4..6)?, field(6..8)?)
    .ok_or_else(|| format!("invalid date: {date}"))?;
  let time = NaiveTime::parse_from_str(time, "%H:%M:%S")
    .map_err(|_| format!("invalid time: {time}"))?;
  Ok(day.and_time(time))
}
