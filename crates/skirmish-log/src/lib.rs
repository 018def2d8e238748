//! Battle-log codec for skirmish.
//!
//! Turns raw transcript bytes into kill and blessing events. Pure synchronous;
//! no database dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! use skirmish_log::{EncodingConfig, parse_bytes};
//!
//! let raw = std::fs::read("battle.log").unwrap();
//! let file = parse_bytes(&raw, &EncodingConfig::default()).unwrap();
//! println!(
//!   "{}: {} kills, {} blessings",
//!   file.encoding,
//!   file.log.kills.len(),
//!   file.log.blessings.len()
//! );
//! ```

mod encoding;
pub mod error;
mod parse;

pub use encoding::{Decoded, EncodingConfig, decode};
pub use error::{Error, Result};
pub use parse::{LineKind, MalformedLine, ParsedLog, parse_text};

/// A decoded and parsed battle log.
#[derive(Debug, Clone)]
pub struct ParsedFile {
  /// The encoding the bytes were decoded with.
  pub encoding:         &'static str,
  /// Whether undecodable sequences were replaced with U+FFFD.
  pub had_replacements: bool,
  pub log:              ParsedLog,
}

/// Decode `bytes` and parse the resulting text.
///
/// Fails only when no encoding candidate can decode the input; malformed
/// lines are reported inside [`ParsedLog::malformed`].
pub fn parse_bytes(bytes: &[u8], config: &EncodingConfig) -> Result<ParsedFile> {
  let decoded = decode(bytes, config)?;
  let log = parse_text(&decoded.text);
  Ok(ParsedFile {
    encoding: decoded.encoding,
    had_replacements: decoded.had_replacements,
    log,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn gbk_log_end_to_end() {
    let text = "[系统] 欢迎来到战场\r\n\
                [战况]Alice 击杀 Bob !坐标:10，20  (20250101,20:00:00)\r\n\
                [公告]  Alice 得到了 烈焰祝福 的祝福! (20250101,20:00:00)\r\n";
    let (bytes, _, unmappable) = encoding_rs::GBK.encode(text);
    assert!(!unmappable);

    let file = parse_bytes(&bytes, &EncodingConfig::default()).unwrap();
    assert_eq!(file.encoding, "gb18030");
    assert!(!file.had_replacements);
    assert_eq!(file.log.kills.len(), 1);
    assert_eq!(file.log.blessings.len(), 1);
    assert_eq!(file.log.kills[0].killer, "Alice");
  }

  #[test]
  fn empty_bytes_fail() {
    assert!(matches!(
      parse_bytes(b"", &EncodingConfig::default()),
      Err(Error::EmptyInput)
    ));
  }
}
