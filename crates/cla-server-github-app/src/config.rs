// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the GitHub App client.

use cla_common_config::{Secret, SecretString};
use cla_common_http::RetryConfig;
use reqwest::Url;
use tracing::warn;

use crate::error::GithubAppError;

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const DEFAULT_APP_SLUG: &str = "easycla";

/// Token-bucket parameters for [`crate::NonBlockingLimiter`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimiterSettings {
	pub rate_per_sec: f64,
	pub burst: u32,
}

impl Default for LimiterSettings {
	fn default() -> Self {
		Self {
			rate_per_sec: 10.0,
			burst: 20,
		}
	}
}

/// Configuration for the GitHub App client.
///
/// The private key is held as a [`SecretString`] so it never reaches logs.
#[derive(Clone)]
pub struct GithubAppConfig {
	/// GitHub App numeric ID
	app_id: u64,

	/// PEM-encoded RSA private key for JWT signing
	private_key_pem: SecretString,

	app_slug: String,

	/// Base URL for GitHub API (validated HTTPS, parsed)
	base_url: Url,

	/// Bucket used when a caller asks for the non-blocking limiter.
	limiter: LimiterSettings,

	/// HTTP retry configuration
	pub retry_config: RetryConfig,
}

impl std::fmt::Debug for GithubAppConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("GithubAppConfig")
			.field("app_id", &self.app_id)
			.field("private_key_pem", &self.private_key_pem)
			.field("app_slug", &self.app_slug)
			.field("base_url", &self.base_url.as_str())
			.field("limiter", &self.limiter)
			.field("retry_config", &self.retry_config)
			.finish()
	}
}

impl GithubAppConfig {
	/// Parse a base URL and require HTTPS with a non-loopback host.
	///
	/// A trailing slash is appended so relative joins keep any path prefix
	/// (GitHub Enterprise serves the API under `/api/v3`).
	fn validate_and_normalize_base_url(raw: &str) -> Result<Url, GithubAppError> {
		let mut url = Url::parse(raw)
			.map_err(|e| GithubAppError::Config(format!("Invalid GitHub base URL '{raw}': {e}")))?;

		if url.scheme() != "https" {
			return Err(GithubAppError::Config(format!(
				"GitHub base URL must use https, got '{}'",
				url.scheme()
			)));
		}

		let host = url
			.host_str()
			.ok_or_else(|| GithubAppError::Config("GitHub base URL must include a host".to_string()))?;

		if host == "localhost" || host == "127.0.0.1" || host == "[::1]" {
			return Err(GithubAppError::Config(
				"GitHub base URL must not be localhost".to_string(),
			));
		}

		if !url.path().ends_with('/') {
			let path = format!("{}/", url.path());
			url.set_path(&path);
		}

		Ok(url)
	}

	/// Create a configuration against api.github.com.
	pub fn new(app_id: u64, private_key_pem: impl Into<String>) -> Self {
		Self {
			app_id,
			private_key_pem: Secret::new(private_key_pem.into()),
			app_slug: DEFAULT_APP_SLUG.to_string(),
			base_url: Url::parse(DEFAULT_BASE_URL).expect("default URL is valid"),
			limiter: LimiterSettings::default(),
			retry_config: RetryConfig::default(),
		}
	}

	/// Build from an already-loaded secret.
	pub fn with_secret_key(app_id: u64, private_key_pem: SecretString) -> Self {
		Self {
			private_key_pem,
			..Self::new(app_id, String::new())
		}
	}

	/// Set a custom base URL (GitHub Enterprise).
	///
	/// Unlike [`Self::with_base_url`] a bad URL is an error here.
	pub fn try_with_base_url(mut self, url: &str) -> Result<Self, GithubAppError> {
		self.base_url = Self::validate_and_normalize_base_url(url)?;
		Ok(self)
	}

	/// Set a custom base URL. An invalid URL is logged and the previous
	/// value kept.
	pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
		let url_str = url.into();
		match Self::validate_and_normalize_base_url(&url_str) {
			Ok(validated) => self.base_url = validated,
			Err(e) => {
				warn!(error = %e, url = %url_str, "Invalid base_url in with_base_url, keeping previous value");
			}
		}
		self
	}

	/// Point at a local mock server.
	#[cfg(test)]
	pub(crate) fn with_test_base_url(mut self, url: &str) -> Self {
		self.base_url = Url::parse(&format!("{}/", url.trim_end_matches('/'))).unwrap();
		self
	}

	pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
		self.retry_config = config;
		self
	}

	pub fn with_app_slug(mut self, slug: impl Into<String>) -> Self {
		self.app_slug = slug.into();
		self
	}

	pub fn with_limiter(mut self, settings: LimiterSettings) -> Self {
		self.limiter = settings;
		self
	}

	pub fn app_id(&self) -> u64 {
		self.app_id
	}

	pub(crate) fn private_key_pem(&self) -> &str {
		self.private_key_pem.expose()
	}

	pub fn app_slug(&self) -> &str {
		&self.app_slug
	}

	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	pub fn limiter(&self) -> LimiterSettings {
		self.limiter
	}

	/// Where an organization admin installs the App.
	pub fn installation_url(&self) -> String {
		if self.base_url.as_str().starts_with(DEFAULT_BASE_URL) {
			format!(
				"https://github.com/apps/{}/installations/new",
				self.app_slug
			)
		} else {
			let base = self
				.base_url
				.as_str()
				.trim_end_matches('/')
				.trim_end_matches("/api/v3");
			format!("{}/apps/{}/installations/new", base, self.app_slug)
		}
	}
}
