// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Project catalog (project-service) configuration section.

use cla_common_config::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_CACHE_CAPACITY: usize = 1024;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectServiceConfigLayer {
	/// e.g. `https://api-gw.platform.linuxfoundation.org/project-service/v1`
	pub base_url: Option<String>,
	/// Pre-issued bearer token. Takes precedence over client credentials.
	#[serde(skip_serializing)]
	pub token: Option<SecretString>,
	pub token_url: Option<String>,
	pub client_id: Option<String>,
	#[serde(skip_serializing)]
	pub client_secret: Option<SecretString>,
	pub audience: Option<String>,
	pub cache_capacity: Option<usize>,
	pub timeout_secs: Option<u64>,
	/// Permit plain `http://` URLs. Local development only.
	pub allow_insecure: Option<bool>,
}

impl ProjectServiceConfigLayer {
	pub fn merge(&mut self, other: ProjectServiceConfigLayer) {
		if other.base_url.is_some() {
			self.base_url = other.base_url;
		}
		if other.token.is_some() {
			self.token = other.token;
		}
		if other.token_url.is_some() {
			self.token_url = other.token_url;
		}
		if other.client_id.is_some() {
			self.client_id = other.client_id;
		}
		if other.client_secret.is_some() {
			self.client_secret = other.client_secret;
		}
		if other.audience.is_some() {
			self.audience = other.audience;
		}
		if other.cache_capacity.is_some() {
			self.cache_capacity = other.cache_capacity;
		}
		if other.timeout_secs.is_some() {
			self.timeout_secs = other.timeout_secs;
		}
		if other.allow_insecure.is_some() {
			self.allow_insecure = other.allow_insecure;
		}
	}

	/// `Ok(None)` when no catalog URL is configured.
	pub fn build(self) -> Result<Option<ProjectServiceConfig>, ConfigError> {
		let Some(base_url) = self.base_url else {
			return Ok(None);
		};

		let allow_insecure = self.allow_insecure.unwrap_or(false);
		validate_url("project_service.base_url", &base_url, allow_insecure)?;

		let auth = match (self.token, self.client_id, self.client_secret) {
			(Some(token), _, _) => ProjectServiceAuth::Static { token },
			(None, Some(client_id), Some(client_secret)) => {
				let token_url = self.token_url.ok_or_else(|| {
					ConfigError::Validation(
						"project_service.token_url is required for client credentials".to_string(),
					)
				})?;
				validate_url("project_service.token_url", &token_url, allow_insecure)?;
				ProjectServiceAuth::ClientCredentials {
					token_url,
					client_id,
					client_secret,
					audience: self.audience,
				}
			}
			_ => {
				return Err(ConfigError::Validation(
					"project_service needs either a token or client_id and client_secret"
						.to_string(),
				))
			}
		};

		let cache_capacity = self.cache_capacity.unwrap_or(DEFAULT_CACHE_CAPACITY);
		if cache_capacity == 0 {
			return Err(ConfigError::Validation(
				"project_service.cache_capacity must be at least 1".to_string(),
			));
		}

		Ok(Some(ProjectServiceConfig {
			base_url,
			auth,
			cache_capacity,
			timeout_secs: self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
		}))
	}
}

fn validate_url(key: &str, url: &str, allow_insecure: bool) -> Result<(), ConfigError> {
	if url.starts_with("https://") || (allow_insecure && url.starts_with("http://")) {
		return Ok(());
	}
	Err(ConfigError::InvalidValue {
		key: key.to_string(),
		message: format!("must be an https:// URL, got '{url}'"),
	})
}

#[derive(Debug, Clone)]
pub enum ProjectServiceAuth {
	Static {
		token: SecretString,
	},
	ClientCredentials {
		token_url: String,
		client_id: String,
		client_secret: SecretString,
		audience: Option<String>,
	},
}

#[derive(Debug, Clone)]
pub struct ProjectServiceConfig {
	pub base_url: String,
	pub auth: ProjectServiceAuth,
	/// Upper bound on memoized projects per client scope.
	pub cache_capacity: usize,
	pub timeout_secs: u64,
}
