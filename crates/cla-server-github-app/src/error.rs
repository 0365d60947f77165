// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the GitHub App gateway.

use cla_common_http::RetryableError;
use thiserror::Error;

/// Errors that can occur when interacting with the GitHub App API.
#[derive(Debug, Error)]
pub enum GithubAppError {
	/// Network-level error during HTTP communication.
	#[error("Network error: {0}")]
	Network(#[from] reqwest::Error),

	/// Request timed out.
	#[error("Request timed out")]
	Timeout,

	/// Invalid installation token or app configuration.
	#[error("Unauthorized or invalid app configuration")]
	Unauthorized,

	/// Forbidden - insufficient permissions.
	#[error("Forbidden or insufficient permissions")]
	Forbidden,

	/// Rate limit exceeded on GitHub's side.
	#[error("Rate limit exceeded")]
	RateLimited,

	/// The client-side non-blocking limiter refused the call.
	#[error("Request dropped by the non-blocking limiter")]
	LimiterDropped,

	/// GitHub API returned an error.
	#[error("GitHub API error: {status} - {message}")]
	ApiError { status: u16, message: String },

	/// The repository has no branch with this name.
	#[error("Branch {branch} not found in {owner}/{repo}")]
	BranchNotFound {
		owner: String,
		repo: String,
		branch: String,
	},

	/// Invalid or unparseable response.
	#[error("Invalid response from GitHub: {0}")]
	InvalidResponse(String),

	/// Configuration error.
	#[error("Configuration error: {0}")]
	Config(String),

	/// JWT signing/encoding error.
	#[error("JWT error: {0}")]
	Jwt(String),
}

impl RetryableError for GithubAppError {
	fn is_retryable(&self) -> bool {
		match self {
			GithubAppError::Network(e) => e.is_retryable(),
			GithubAppError::Timeout => true,
			GithubAppError::RateLimited => true,
			GithubAppError::ApiError { status, .. } => *status >= 500,
			_ => false,
		}
	}
}

impl GithubAppError {
	/// Create an API error from status code and message.
	pub fn api_error(status: u16, message: impl Into<String>) -> Self {
		Self::ApiError {
			status,
			message: message.into(),
		}
	}

	pub fn branch_not_found(
		owner: impl Into<String>,
		repo: impl Into<String>,
		branch: impl Into<String>,
	) -> Self {
		Self::BranchNotFound {
			owner: owner.into(),
			repo: repo.into(),
			branch: branch.into(),
		}
	}

	/// True for a 404 from GitHub.
	pub fn is_not_found(&self) -> bool {
		matches!(self, GithubAppError::ApiError { status: 404, .. })
	}

	/// Failures a caller may repeat later without changing the request.
	pub fn is_transient(&self) -> bool {
		self.is_retryable() || matches!(self, GithubAppError::LimiterDropped)
	}
}
