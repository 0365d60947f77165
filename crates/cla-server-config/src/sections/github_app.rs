// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! GitHub App configuration section.

use cla_common_config::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_APP_SLUG: &str = "easycla";
const DEFAULT_BASE_URL: &str = "https://api.github.com";
const DEFAULT_LIMITER_RATE_PER_SEC: f64 = 10.0;
const DEFAULT_LIMITER_BURST: u32 = 20;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitHubAppConfigLayer {
	pub app_id: Option<u64>,
	/// PEM-encoded RSA private key used to sign App JWTs.
	#[serde(skip_serializing)]
	pub private_key_pem: Option<SecretString>,
	pub app_slug: Option<String>,
	/// REST API root; GitHub Enterprise uses `https://<host>/api/v3`.
	pub base_url: Option<String>,
	/// Drop branch-protection calls instead of waiting when over budget.
	pub non_blocking_limiter: Option<bool>,
	pub limiter_rate_per_sec: Option<f64>,
	pub limiter_burst: Option<u32>,
}

impl GitHubAppConfigLayer {
	pub fn merge(&mut self, other: GitHubAppConfigLayer) {
		if other.app_id.is_some() {
			self.app_id = other.app_id;
		}
		if other.private_key_pem.is_some() {
			self.private_key_pem = other.private_key_pem;
		}
		if other.app_slug.is_some() {
			self.app_slug = other.app_slug;
		}
		if other.base_url.is_some() {
			self.base_url = other.base_url;
		}
		if other.non_blocking_limiter.is_some() {
			self.non_blocking_limiter = other.non_blocking_limiter;
		}
		if other.limiter_rate_per_sec.is_some() {
			self.limiter_rate_per_sec = other.limiter_rate_per_sec;
		}
		if other.limiter_burst.is_some() {
			self.limiter_burst = other.limiter_burst;
		}
	}

	pub fn is_configured(&self) -> bool {
		self.app_id.is_some()
	}

	/// `Ok(None)` when neither the app id nor the key is set; a half-set
	/// section is a validation error.
	pub fn build(self) -> Result<Option<GitHubAppConfig>, ConfigError> {
		if self.app_id.is_none() && self.private_key_pem.is_none() {
			return Ok(None);
		}

		let app_id = self
			.app_id
			.ok_or_else(|| ConfigError::Validation("GitHub App app_id is required".to_string()))?;

		let private_key_pem = self.private_key_pem.ok_or_else(|| {
			ConfigError::Validation(
				"GitHub App private_key_pem is required when app_id is set".to_string(),
			)
		})?;

		if private_key_pem.is_empty() {
			return Err(ConfigError::Validation(
				"GitHub App private_key_pem cannot be empty".to_string(),
			));
		}

		let base_url = self
			.base_url
			.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
		validate_base_url(&base_url)?;

		let limiter = if self.non_blocking_limiter.unwrap_or(false) {
			let rate_per_sec = self
				.limiter_rate_per_sec
				.unwrap_or(DEFAULT_LIMITER_RATE_PER_SEC);
			if rate_per_sec.is_nan() || rate_per_sec <= 0.0 {
				return Err(ConfigError::Validation(format!(
					"GitHub App limiter_rate_per_sec must be positive, got {rate_per_sec}"
				)));
			}
			Some(LimiterConfig {
				rate_per_sec,
				burst: self.limiter_burst.unwrap_or(DEFAULT_LIMITER_BURST).max(1),
			})
		} else {
			None
		};

		Ok(Some(GitHubAppConfig {
			app_id,
			private_key_pem,
			app_slug: self
				.app_slug
				.unwrap_or_else(|| DEFAULT_APP_SLUG.to_string()),
			base_url,
			limiter,
		}))
	}
}

fn validate_base_url(url: &str) -> Result<(), ConfigError> {
	if !url.starts_with("https://") {
		return Err(ConfigError::Validation(format!(
			"GitHub App base_url must use HTTPS, got: {url}"
		)));
	}

	if url.contains("localhost") || url.contains("127.0.0.1") || url.contains("[::1]") {
		return Err(ConfigError::Validation(
			"GitHub App base_url must not be localhost".to_string(),
		));
	}

	Ok(())
}

/// Token-bucket parameters for the non-blocking limiter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimiterConfig {
	pub rate_per_sec: f64,
	pub burst: u32,
}

#[derive(Debug, Clone)]
pub struct GitHubAppConfig {
	pub app_id: u64,
	pub private_key_pem: SecretString,
	pub app_slug: String,
	pub base_url: String,
	/// `Some` when the non-blocking limiter is switched on.
	pub limiter: Option<LimiterConfig>,
}
