// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client-side token bucket that drops calls instead of queueing them.

use std::sync::Mutex;

use tokio::time::Instant;
use tracing::{trace, warn};

use crate::config::LimiterSettings;
use crate::error::GithubAppError;

#[derive(Debug)]
struct Bucket {
	tokens: f64,
	last_refill: Instant,
}

#[derive(Debug)]
pub struct NonBlockingLimiter {
	bucket: Mutex<Bucket>,
	refill_rate: f64,
	max_tokens: f64,
}

impl NonBlockingLimiter {
	/// A full bucket of `settings.burst` tokens refilled at
	/// `settings.rate_per_sec`.
	pub fn new(settings: LimiterSettings) -> Self {
		let max_tokens = f64::from(settings.burst.max(1));
		Self {
			bucket: Mutex::new(Bucket {
				tokens: max_tokens,
				last_refill: Instant::now(),
			}),
			refill_rate: settings.rate_per_sec.max(0.0),
			max_tokens,
		}
	}

	/// Take a token if one is available. Never waits.
	pub fn try_acquire(&self) -> bool {
		let mut bucket = match self.bucket.lock() {
			Ok(guard) => guard,
			Err(poisoned) => poisoned.into_inner(),
		};

		let now = Instant::now();
		let elapsed = now.saturating_duration_since(bucket.last_refill);
		bucket.tokens = (bucket.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.max_tokens);
		bucket.last_refill = now;

		if bucket.tokens >= 1.0 {
			bucket.tokens -= 1.0;
			trace!(remaining = bucket.tokens, "limiter token taken");
			true
		} else {
			false
		}
	}

	/// [`Self::try_acquire`] as a `Result`.
	pub fn check(&self) -> Result<(), GithubAppError> {
		if self.try_acquire() {
			Ok(())
		} else {
			warn!("non-blocking limiter dropped a GitHub call");
			Err(GithubAppError::LimiterDropped)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;

	fn limiter(rate_per_sec: f64, burst: u32) -> NonBlockingLimiter {
		NonBlockingLimiter::new(LimiterSettings {
			rate_per_sec,
			burst,
		})
	}

	#[tokio::test(start_paused = true)]
	async fn burst_then_drop() {
		let limiter = limiter(1.0, 3);
		assert!(limiter.try_acquire());
		assert!(limiter.try_acquire());
		assert!(limiter.try_acquire());
		assert!(!limiter.try_acquire());
		assert!(matches!(limiter.check(), Err(GithubAppError::LimiterDropped)));
	}

	#[tokio::test(start_paused = true)]
	async fn refills_over_time() {
		let limiter = limiter(2.0, 1);
		assert!(limiter.try_acquire());
		assert!(!limiter.try_acquire());

		tokio::time::advance(Duration::from_millis(600)).await;
		assert!(limiter.try_acquire());
		assert!(!limiter.try_acquire());
	}

	#[tokio::test(start_paused = true)]
	async fn never_exceeds_burst() {
		let limiter = limiter(100.0, 2);
		tokio::time::advance(Duration::from_secs(60)).await;
		assert!(limiter.try_acquire());
		assert!(limiter.try_acquire());
		assert!(!limiter.try_acquire());
	}

	#[tokio::test(start_paused = true)]
	async fn zero_burst_still_admits_one() {
		let limiter = limiter(0.0, 0);
		assert!(limiter.try_acquire());
		assert!(!limiter.try_acquire());
	}
}
