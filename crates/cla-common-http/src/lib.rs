// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP plumbing shared by the catalog and GitHub adapters.
//!
//! - a `reqwest` client builder carrying the server's User-Agent
//! - [`retry`] with exponential backoff and jitter for transient failures

mod client;
mod retry;

pub use client::{builder, new_client, new_client_with_timeout, user_agent};
pub use retry::{retry, RetryConfig, RetryableError};
