// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Expiring credentials cached per key.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::error::GithubAppError;

struct Issued {
	token: String,
	expires_at: Instant,
}

impl Issued {
	fn usable(&self, margin: Duration) -> bool {
		Instant::now() + margin < self.expires_at
	}
}

type Slot = Arc<Mutex<Option<Issued>>>;

/// One slot per key. A slot's lock is held across its refresh, so concurrent
/// callers for the same key wait for a single mint instead of racing.
pub(crate) struct TokenSlots<K> {
	kind: &'static str,
	margin: Duration,
	slots: Mutex<HashMap<K, Slot>>,
}

impl<K> TokenSlots<K>
where
	K: Eq + Hash + Copy + Debug,
{
	pub(crate) fn new(kind: &'static str, margin: Duration) -> Self {
		Self {
			kind,
			margin,
			slots: Mutex::new(HashMap::new()),
		}
	}

	async fn slot(&self, key: K) -> Slot {
		self.slots.lock().await.entry(key).or_default().clone()
	}

	/// The cached token for `key`, or the result of `mint` when it is missing
	/// or inside the refresh margin.
	pub(crate) async fn get_or_mint<F, Fut>(&self, key: K, mint: F) -> Result<String, GithubAppError>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<(String, Duration), GithubAppError>>,
	{
		let slot = self.slot(key).await;
		let mut held = slot.lock().await;
		if let Some(issued) = held.as_ref().filter(|i| i.usable(self.margin)) {
			trace!(kind = self.kind, ?key, "token cache hit");
			return Ok(issued.token.clone());
		}

		let (token, valid_for) = mint().await?;
		*held = Some(Issued {
			token: token.clone(),
			expires_at: Instant::now() + valid_for,
		});
		debug!(kind = self.kind, ?key, "token minted");
		Ok(token)
	}

	/// Forget `key`'s token. Returns whether one was cached.
	pub(crate) async fn invalidate(&self, key: K) -> bool {
		let slot = self.slot(key).await;
		let dropped = slot.lock().await.take().is_some();
		dropped
	}

	#[cfg(test)]
	pub(crate) async fn seed(&self, key: K, token: &str, valid_for: Duration) {
		let slot = self.slot(key).await;
		*slot.lock().await = Some(Issued {
			token: token.to_string(),
			expires_at: Instant::now() + valid_for,
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};

	fn mint_counting(
		counter: &AtomicUsize,
		valid_for: Duration,
	) -> impl Future<Output = Result<(String, Duration), GithubAppError>> + '_ {
		async move {
			let n = counter.fetch_add(1, Ordering::SeqCst);
			Ok((format!("tok-{n}"), valid_for))
		}
	}

	#[tokio::test]
	async fn caches_until_margin() {
		let slots = TokenSlots::new("test", Duration::from_secs(60));
		let minted = AtomicUsize::new(0);
		let hour = Duration::from_secs(3600);

		let a = slots.get_or_mint(1i64, || mint_counting(&minted, hour)).await.unwrap();
		let b = slots.get_or_mint(1i64, || mint_counting(&minted, hour)).await.unwrap();
		assert_eq!(a, b);
		assert_eq!(minted.load(Ordering::SeqCst), 1);

		slots.get_or_mint(2i64, || mint_counting(&minted, hour)).await.unwrap();
		assert_eq!(minted.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn token_inside_margin_is_reminted() {
		let slots = TokenSlots::new("test", Duration::from_secs(60));
		let minted = AtomicUsize::new(0);
		let short = Duration::from_secs(30);

		slots.get_or_mint((), || mint_counting(&minted, short)).await.unwrap();
		slots.get_or_mint((), || mint_counting(&minted, short)).await.unwrap();
		assert_eq!(minted.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn invalidate_reports_and_forces_mint() {
		let slots = TokenSlots::new("test", Duration::from_secs(60));
		assert!(!slots.invalidate(7i64).await);

		slots.seed(7i64, "seeded", Duration::from_secs(3600)).await;
		assert!(slots.invalidate(7i64).await);

		let minted = AtomicUsize::new(0);
		let token = slots
			.get_or_mint(7i64, || mint_counting(&minted, Duration::from_secs(3600)))
			.await
			.unwrap();
		assert_eq!(token, "tok-0");
	}

	#[tokio::test]
	async fn failed_mint_leaves_slot_empty() {
		let slots: TokenSlots<i64> = TokenSlots::new("test", Duration::from_secs(60));
		let err = slots
			.get_or_mint(3, || async { Err(GithubAppError::Unauthorized) })
			.await
			.unwrap_err();
		assert!(matches!(err, GithubAppError::Unauthorized));
		assert!(!slots.invalidate(3).await);
	}

	#[tokio::test]
	async fn concurrent_callers_share_one_mint() {
		let slots = Arc::new(TokenSlots::new("test", Duration::from_secs(60)));
		let minted = Arc::new(AtomicUsize::new(0));

		let mut handles = Vec::new();
		for _ in 0..8 {
			let slots = slots.clone();
			let minted = minted.clone();
			handles.push(tokio::spawn(async move {
				slots
					.get_or_mint(9i64, || async move {
						tokio::time::sleep(Duration::from_millis(10)).await;
						minted.fetch_add(1, Ordering::SeqCst);
						Ok(("shared".to_string(), Duration::from_secs(3600)))
					})
					.await
			}));
		}
		for handle in handles {
			assert_eq!(handle.await.unwrap().unwrap(), "shared");
		}
		assert_eq!(minted.load(Ordering::SeqCst), 1);
	}
}
