// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use cla_common_core::ContextError;
use cla_common_http::RetryableError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectServiceError {
	#[error("Project not found: {0}")]
	NotFound(String),

	/// The catalog would accept the write but our rules forbid it.
	#[error("Policy violation: {0}")]
	PolicyViolation(String),

	#[error("Unauthorized by the project service")]
	Unauthorized,

	#[error("Forbidden by the project service")]
	Forbidden,

	#[error("Rate limit exceeded")]
	RateLimited,

	#[error("Request timed out")]
	Timeout,

	#[error("Network error: {0}")]
	Network(#[from] reqwest::Error),

	#[error("Project service error: {status} - {message}")]
	ApiError { status: u16, message: String },

	#[error("Invalid response from project service: {0}")]
	InvalidResponse(String),

	#[error("Token error: {0}")]
	Token(String),

	#[error("Configuration error: {0}")]
	Config(String),

	#[error("Request cancelled")]
	Cancelled,
}

impl RetryableError for ProjectServiceError {
	fn is_retryable(&self) -> bool {
		match self {
			ProjectServiceError::Network(e) => e.is_retryable(),
			ProjectServiceError::Timeout => true,
			ProjectServiceError::RateLimited => true,
			ProjectServiceError::ApiError { status, .. } => *status >= 500,
			_ => false,
		}
	}
}

impl From<ContextError> for ProjectServiceError {
	fn from(e: ContextError) -> Self {
		match e {
			ContextError::Cancelled => ProjectServiceError::Cancelled,
			ContextError::DeadlineExceeded => ProjectServiceError::Timeout,
		}
	}
}
