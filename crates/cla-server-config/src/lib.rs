// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for the CLA server.
//!
//! Sources, lowest to highest precedence:
//! 1. built-in defaults
//! 2. a TOML file (`/etc/cla/server.toml`, or the path given on the command line)
//! 3. environment variables (`CLA_SERVER_*`)
//!
//! ```ignore
//! let config = cla_server_config::load_config()?;
//! println!("tables prefixed with cla-{}-", config.database.stage);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub database: DatabaseConfig,
	pub github_app: Option<GitHubAppConfig>,
	pub project_service: Option<ProjectServiceConfig>,
	pub repositories: RepositoriesConfig,
	pub logging: LoggingConfig,
}

pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Like [`load_config`] with an explicit file that must exist.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Resolve a merged layer, applying defaults and cross-field validation.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let database = layer.database.unwrap_or_default().finalize();
	let github_app = layer.github_app.unwrap_or_default().build()?;
	let project_service = layer.project_service.unwrap_or_default().build()?;
	let repositories = layer.repositories.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_stage(&database.stage)?;

	info!(
		database = %database.url,
		stage = %database.stage,
		github_app_configured = github_app.is_some(),
		project_service_configured = project_service.is_some(),
		strict_disable_sweep = repositories.strict_disable_sweep,
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		database,
		github_app,
		project_service,
		repositories,
		logging,
	})
}

/// The stage is spliced into table names.
fn validate_stage(stage: &str) -> Result<(), ConfigError> {
	let valid = !stage.is_empty()
		&& stage
			.chars()
			.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

	if valid {
		Ok(())
	} else {
		Err(ConfigError::Validation(format!(
			"stage must be lowercase letters, digits or '-', got '{stage}'"
		)))
	}
}
