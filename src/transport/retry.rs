//! Bounded retry with a fixed delay between attempts.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use super::TransportError;

fn default_max_attempts() -> u32 {
  3
}

fn default_fixed_delay_ms() -> u64 {
  1000
}

/// Retry configuration for transport calls.
///
/// Only transient failures (`Timeout`, `NetworkUnreachable`) are retried.
/// When attempts run out the last failure is returned unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
  /// Total tries, including the first one
  #[serde(default = "default_max_attempts", alias = "maxAttempts")]
  pub max_attempts: u32,
  /// Wait between tries, in milliseconds
  #[serde(default = "default_fixed_delay_ms", alias = "fixedDelayMs")]
  pub fixed_delay_ms: u64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: default_max_attempts(),
      fixed_delay_ms: default_fixed_delay_ms(),
    }
  }
}

impl RetryPolicy {
  pub fn new(max_attempts: u32, fixed_delay: Duration) -> Self {
    Self {
      max_attempts,
      fixed_delay_ms: u64::try_from(fixed_delay.as_millis()).unwrap_or(u64::MAX),
    }
  }

  pub fn fixed_delay(&self) -> Duration {
    Duration::from_millis(self.fixed_delay_ms)
  }

  /// Run `operation` until it succeeds, fails permanently, or attempts run out.
  ///
  /// A policy configured with zero attempts still makes one.
  pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, TransportError>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
  {
    let max_attempts = self.max_attempts.max(1);
    let mut attempt = 1;

    loop {
      match operation().await {
        Ok(value) => return Ok(value),
        Err(err) if err.is_transient() && attempt < max_attempts => {
          debug!(attempt, max_attempts, error = %err, "Transient failure, retrying");
          tokio::time::sleep(self.fixed_delay()).await;
          attempt += 1;
        }
        Err(err) => return Err(err),
      }
    }
  }
}
