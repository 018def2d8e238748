//! Encoding resolution for raw battle-log bytes.
//!
//! Game clients write logs in whatever code page the host OS uses, so the
//! bytes are decoded by trying an ordered list of candidates:
//!
//!   byte-order mark → confident detector guess → configured fallbacks
//!
//! UTF-8 is decoded strictly; every other candidate is decoded with
//! replacement, which only fails for encodings that cannot decode anything.

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, GB18030, GBK, REPLACEMENT, UTF_8};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{Error, Result};

// ─── Configuration ───────────────────────────────────────────────────────────

/// How the resolver picks candidate encodings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
  /// Run statistical detection before the fallback list.
  pub detect:     bool,
  /// Leading bytes fed to the detector.
  pub sample_len: usize,
  /// WHATWG encoding labels tried after detection, in order.
  pub fallbacks:  Vec<String>,
}

impl Default for EncodingConfig {
  fn default() -> Self {
    Self {
      detect:     true,
      sample_len: 64 * 1024,
      fallbacks:  vec!["UTF-8".into(), "GB18030".into(), "Big5".into()],
    }
  }
}

// ─── Output ──────────────────────────────────────────────────────────────────

/// Decoded log text and how it was obtained.
#[derive(Debug, Clone)]
pub struct Decoded {
  pub text:             String,
  pub encoding:         &'static str,
  pub had_replacements: bool,
}

// ─── Resolution ──────────────────────────────────────────────────────────────

/// Decode `bytes` with the first candidate encoding that succeeds.
pub fn decode(bytes: &[u8], config: &EncodingConfig) -> Result<Decoded> {
  if bytes.is_empty() {
    return Err(Error::EmptyInput);
  }

  let (bom, body) = match Encoding::for_bom(bytes) {
    Some((enc, len)) => (Some(enc), &bytes[len..]),
    None => (None, bytes),
  };

  let mut tried = Vec::new();
  for enc in candidates(bytes, bom, config) {
    tried.push(enc.name());
    // The BOM only belongs to the encoding it announces.
    let input = if Some(enc) == bom { body } else { bytes };

    let Some(decoded) = try_decode(input, enc) else {
      debug!(encoding = enc.name(), "candidate encoding rejected");
      continue;
    };

    if decoded.had_replacements {
      let replaced = decoded.text.chars().filter(|&c| c == '\u{FFFD}').count();
      warn!(
        encoding = decoded.encoding,
        replaced, "battle log decoded with replacement characters"
      );
    } else {
      info!(encoding = decoded.encoding, "battle log decoded");
    }
    return Ok(decoded);
  }

  Err(Error::EncodingUnresolved { tried })
}

/// Build the de-duplicated candidate order.
fn candidates(
  bytes: &[u8],
  bom: Option<&'static Encoding>,
  config: &EncodingConfig,
) -> Vec<&'static Encoding> {
  let mut out: Vec<&'static Encoding> = Vec::new();
  let mut push = |enc: &'static Encoding| {
    let enc = normalize(enc);
    if enc != REPLACEMENT && !out.contains(&enc) {
      out.push(enc);
    }
  };

  if let Some(enc) = bom {
    push(enc);
  }

  if config.detect {
    let sample = &bytes[..bytes.len().min(config.sample_len)];
    let mut detector = EncodingDetector::new();
    detector.feed(sample, sample.len() == bytes.len());
    let (guess, confident) = detector.guess_assess(None, true);
    debug!(guess = guess.name(), confident, "encoding detector verdict");
    if confident {
      push(guess);
    }
  }

  for label in &config.fallbacks {
    match Encoding::for_label(label.trim().as_bytes()) {
      Some(enc) => push(enc),
      None => warn!(label = %label, "ignoring unknown fallback encoding label"),
    }
  }

  out
}

/// Collapse regional multi-byte families onto their superset.
fn normalize(enc: &'static Encoding) -> &'static Encoding {
  if enc == GBK { GB18030 } else { enc }
}

fn try_decode(input: &[u8], enc: &'static Encoding) -> Option<Decoded> {
  if enc == UTF_8 {
    let text = enc.decode_without_bom_handling_and_without_replacement(input)?;
    return Some(Decoded {
      text:             text.into_owned(),
      encoding:         enc.name(),
      had_replacements: false,
    });
  }

  let (text, had_replacements) = enc.decode_without_bom_handling(input);
  Some(Decoded {
    text: text.into_owned(),
    encoding: enc.name(),
    had_replacements,
  })
}
