//! Bounded retry with exponential backoff for batch commits.

use std::{fmt::Display, future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use skirmish_core::store::Transient;
use tracing::{debug, error, warn};

/// How a failed batch is retried.
///
/// Only errors whose [`Transient::is_transient`] is `true` are retried; any
/// other error is returned on the first attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
  /// Total attempts including the first. `0` behaves like `1`.
  pub max_attempts:       u32,
  /// Delay before the first retry; doubles on each further retry.
  pub initial_backoff_ms: u64,
  pub max_backoff_ms:     u64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts:       3,
      initial_backoff_ms: 500,
      max_backoff_ms:     8_000,
    }
  }
}

impl RetryPolicy {
  /// Delay before retry number `retry` (1-based).
  pub fn backoff(&self, retry: u32) -> Duration {
    let factor = 2u64.saturating_pow(retry.saturating_sub(1));
    let ms = self
      .initial_backoff_ms
      .saturating_mul(factor)
      .min(self.max_backoff_ms);
    Duration::from_millis(ms)
  }

  /// Run `operation` until it succeeds, fails permanently, or attempts run out.
  pub async fn run<T, E, F, Fut>(&self, description: &str, mut operation: F) -> Result<T, E>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + Display,
  {
    let max_attempts = self.max_attempts.max(1);
    let mut attempt = 1;
    loop {
      debug!("{description} (attempt {attempt}/{max_attempts})");
      match operation().await {
        Ok(value) => return Ok(value),
        Err(e) if !e.is_transient() => {
          error!("permanent error for {description}: {e}");
          return Err(e);
        }
        Err(e) if attempt >= max_attempts => {
          error!("max attempts ({max_attempts}) exceeded for {description}: {e}");
          return Err(e);
        }
        Err(e) => {
          let backoff = self.backoff(attempt);
          warn!("retrying {description} (attempt {attempt}/{max_attempts}) after {backoff:?}: {e}");
          tokio::time::sleep(backoff).await;
          attempt += 1;
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use super::*;

  #[derive(Debug)]
  struct Flaky(bool);

  impl Display for Flaky {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      write!(f, "flaky(transient = {})", self.0)
    }
  }

  impl Transient for Flaky {
    fn is_transient(&self) -> bool { self.0 }
  }

  fn instant(max_attempts: u32) -> RetryPolicy {
    RetryPolicy { max_attempts, initial_backoff_ms: 0, max_backoff_ms: 0 }
  }

  #[test]
  fn backoff_doubles_then_caps() {
    let policy = RetryPolicy { max_attempts: 5, initial_backoff_ms: 100, max_backoff_ms: 350 };
    assert_eq!(policy.backoff(1), Duration::from_millis(100));
    assert_eq!(policy.backoff(2), Duration::from_millis(200));
    assert_eq!(policy.backoff(3), Duration::from_millis(350));
    assert_eq!(policy.backoff(40), Duration::from_millis(350));
  }

  #[tokio::test]
  async fn transient_errors_are_retried() {
    let calls = AtomicU32::new(0);
    let counter = &calls;
    let result = instant(3)
      .run("test", move || async move {
        if counter.fetch_add(1, Ordering::SeqCst) < 2 { Err(Flaky(true)) } else { Ok(7) }
      })
      .await;
    assert_eq!(result.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn attempts_are_bounded() {
    let calls = AtomicU32::new(0);
    let counter = &calls;
    let result: Result<(), _> = instant(3)
      .run("test", move || async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(Flaky(true))
      })
      .await;
    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn permanent_errors_fail_fast() {
    let calls = AtomicU32::new(0);
    let counter = &calls;
    let result: Result<(), _> = instant(5)
      .run("test", move || async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(Flaky(false))
      })
      .await;
    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }
}
