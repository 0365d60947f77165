// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! GitHub App gateway for the CLA server.
//!
//! Authenticates as an App installation (JWT exchanged for a cached
//! installation token), hydrates repositories by numeric id, and reconciles
//! branch-protection rules so the CLA status check is required.

pub mod branch_protection;
pub mod client;
pub mod code_host;
pub mod config;
pub mod error;
pub mod jwt;
pub mod limiter;
mod tokens;
pub mod types;

pub use branch_protection::{
	is_enforce_admin_enabled, merge_status_checks, BranchProtectionEngine, BranchProtectionOptions,
	BranchProtectionRepository,
};
pub use client::GithubAppClient;
pub use cla_common_http::RetryConfig;
pub use code_host::{clean_repo_name, CodeHost};
pub use config::{GithubAppConfig, LimiterSettings};
pub use error::GithubAppError;
pub use limiter::NonBlockingLimiter;
pub use types::{
	BranchProtectionRule, PullRequestReviews, Repository, RequiredStatusChecks, Restrictions,
	StatusCheck,
};
