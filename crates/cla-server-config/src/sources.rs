// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, a TOML file, the environment.

use std::path::PathBuf;

use cla_common_config::load_secret_env;
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	DatabaseConfigLayer, GitHubAppConfigLayer, LogFormat, LoggingConfigLayer,
	ProjectServiceConfigLayer, RepositoriesConfigLayer,
};

pub const SYSTEM_CONFIG_PATH: &str = "/etc/cla/server.toml";

/// Higher precedence overrides lower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		Ok(ServerConfigLayer::default())
	}
}

pub struct TomlSource {
	path: PathBuf,
	required: bool,
}

impl TomlSource {
	/// A file the operator named explicitly; it must exist.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			required: true,
		}
	}

	/// `/etc/cla/server.toml`, skipped when absent.
	pub fn system() -> Self {
		Self {
			path: PathBuf::from(SYSTEM_CONFIG_PATH),
			required: false,
		}
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.required && !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!(path = %self.path.display(), "parsed config layer from TOML");
		Ok(layer)
	}
}

/// `CLA_SERVER_<SECTION>_<FIELD>`
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		Ok(ServerConfigLayer {
			database: Some(load_database_from_env()),
			github_app: Some(load_github_app_from_env()?),
			project_service: Some(load_project_service_from_env()?),
			repositories: Some(load_repositories_from_env()?),
			logging: Some(load_logging_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_parse<T: std::str::FromStr>(name: &str, kind: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid {kind} value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn load_database_from_env() -> DatabaseConfigLayer {
	DatabaseConfigLayer {
		url: env_var("CLA_SERVER_DATABASE_URL"),
		stage: env_var("CLA_SERVER_STAGE"),
	}
}

fn load_github_app_from_env() -> Result<GitHubAppConfigLayer, ConfigError> {
	Ok(GitHubAppConfigLayer {
		app_id: env_parse("CLA_SERVER_GITHUB_APP_ID", "u64")?,
		private_key_pem: load_secret_env("CLA_SERVER_GITHUB_APP_PRIVATE_KEY")?,
		app_slug: env_var("CLA_SERVER_GITHUB_APP_SLUG"),
		base_url: env_var("CLA_SERVER_GITHUB_APP_BASE_URL"),
		non_blocking_limiter: env_bool("CLA_SERVER_GITHUB_APP_NON_BLOCKING_LIMITER"),
		limiter_rate_per_sec: env_parse("CLA_SERVER_GITHUB_APP_LIMITER_RATE_PER_SEC", "f64")?,
		limiter_burst: env_parse("CLA_SERVER_GITHUB_APP_LIMITER_BURST", "u32")?,
	})
}

fn load_project_service_from_env() -> Result<ProjectServiceConfigLayer, ConfigError> {
	Ok(ProjectServiceConfigLayer {
		base_url: env_var("CLA_SERVER_PROJECT_SERVICE_URL"),
		token: load_secret_env("CLA_SERVER_PROJECT_SERVICE_TOKEN")?,
		token_url: env_var("CLA_SERVER_PROJECT_SERVICE_TOKEN_URL"),
		client_id: env_var("CLA_SERVER_PROJECT_SERVICE_CLIENT_ID"),
		client_secret: load_secret_env("CLA_SERVER_PROJECT_SERVICE_CLIENT_SECRET")?,
		audience: env_var("CLA_SERVER_PROJECT_SERVICE_AUDIENCE"),
		cache_capacity: env_parse("CLA_SERVER_PROJECT_SERVICE_CACHE_CAPACITY", "usize")?,
		timeout_secs: env_parse("CLA_SERVER_PROJECT_SERVICE_TIMEOUT_SECS", "u64")?,
		allow_insecure: env_bool("CLA_SERVER_PROJECT_SERVICE_ALLOW_INSECURE"),
	})
}

fn load_repositories_from_env() -> Result<RepositoriesConfigLayer, ConfigError> {
	Ok(RepositoriesConfigLayer {
		request_timeout_secs: env_parse("CLA_SERVER_REQUEST_TIMEOUT_SECS", "u64")?,
		strict_disable_sweep: env_bool("CLA_SERVER_REPOSITORIES_STRICT_DISABLE_SWEEP"),
	})
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	let format = match env_var("CLA_SERVER_LOG_FORMAT") {
		Some(v) => Some(LogFormat::parse(&v).ok_or_else(|| ConfigError::InvalidValue {
			key: "CLA_SERVER_LOG_FORMAT".to_string(),
			message: format!("expected 'text' or 'json', got '{v}'"),
		})?),
		None => None,
	};

	Ok(LoggingConfigLayer {
		level: env_var("CLA_SERVER_LOG_LEVEL"),
		format,
	})
}
