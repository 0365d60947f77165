// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-request execution context.
//!
//! Every outbound call made while serving a request (catalog, GitHub, the
//! local store) is wrapped in [`RequestContext::run`]. Cancelling the token
//! or passing the deadline aborts the in-flight call by dropping its future;
//! nothing is compensated.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
	#[error("request cancelled")]
	Cancelled,

	#[error("request deadline exceeded")]
	DeadlineExceeded,
}

#[derive(Debug, Clone)]
pub struct RequestContext {
	request_id: Uuid,
	cancel: CancellationToken,
	deadline: Option<Instant>,
}

impl RequestContext {
	pub fn new() -> Self {
		Self {
			request_id: Uuid::new_v4(),
			cancel: CancellationToken::new(),
			deadline: None,
		}
	}

	pub fn with_timeout(timeout: Duration) -> Self {
		Self::new().with_deadline(Instant::now() + timeout)
	}

	pub fn with_deadline(mut self, deadline: Instant) -> Self {
		self.deadline = Some(deadline);
		self
	}

	pub fn with_request_id(mut self, request_id: Uuid) -> Self {
		self.request_id = request_id;
		self
	}

	/// A context sharing the request id and deadline whose cancellation is
	/// also triggered when `self` is cancelled.
	pub fn child(&self) -> Self {
		Self {
			request_id: self.request_id,
			cancel: self.cancel.child_token(),
			deadline: self.deadline,
		}
	}

	pub fn request_id(&self) -> Uuid {
		self.request_id
	}

	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	pub fn remaining(&self) -> Option<Duration> {
		self
			.deadline
			.map(|deadline| deadline.saturating_duration_since(Instant::now()))
	}

	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	pub fn cancellation_token(&self) -> CancellationToken {
		self.cancel.clone()
	}

	/// Fails fast without running anything.
	pub fn check(&self) -> Result<(), ContextError> {
		if self.is_cancelled() {
			return Err(ContextError::Cancelled);
		}
		if let Some(deadline) = self.deadline {
			if Instant::now() >= deadline {
				return Err(ContextError::DeadlineExceeded);
			}
		}
		Ok(())
	}

	/// Drive `fut` to completion unless the context is cancelled or its
	/// deadline passes first. Cancellation wins over a simultaneously expired
	/// deadline.
	pub async fn run<F, T>(&self, fut: F) -> Result<T, ContextError>
	where
		F: Future<Output = T>,
	{
		self.check()?;

		match self.deadline {
			Some(deadline) => {
				tokio::select! {
					biased;
					_ = self.cancel.cancelled() => Err(ContextError::Cancelled),
					_ = tokio::time::sleep_until(deadline) => {
						tracing::debug!(request_id = %self.request_id, "request deadline exceeded");
						Err(ContextError::DeadlineExceeded)
					}
					value = fut => Ok(value),
				}
			}
			None => {
				tokio::select! {
					biased;
					_ = self.cancel.cancelled() => Err(ContextError::Cancelled),
					value = fut => Ok(value),
				}
			}
		}
	}
}

impl Default for RequestContext {
	fn default() -> Self {
		Self::new()
	}
}
