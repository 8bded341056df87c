//! The one retry policy shared by every external call.
//!
//! Attempts are bounded and backoff doubles per attempt, capped at two
//! seconds. The terminal failure is whatever error the last attempt
//! produced; callers decide whether that degrades (decomposition) or
//! propagates (embedding).

use std::{future::Future, time::Duration};

use color_eyre::Result;

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	pub backoff: Duration,
}
impl RetryPolicy {
	pub fn from_config(cfg: &lici_config::SearchRetry) -> Self {
		Self {
			max_attempts: cfg.max_attempts.max(1),
			backoff: Duration::from_millis(cfg.backoff_ms),
		}
	}
}

pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T>>,
{
	let mut backoff = policy.backoff;
	let mut last_err = None;

	for attempt in 1..=policy.max_attempts {
		match op().await {
			Ok(value) => return Ok(value),
			Err(err) => {
				tracing::warn!(
					error = %err,
					attempt,
					max_attempts = policy.max_attempts,
					"{label} call failed."
				);
				last_err = Some(err);
			},
		}

		if attempt < policy.max_attempts {
			tokio::time::sleep(backoff).await;

			backoff = backoff.saturating_mul(2).min(Duration::from_secs(2));
		}
	}

	Err(last_err.unwrap_or_else(|| color_eyre::eyre::eyre!("{label} retry loop ran no attempts.")))
}
