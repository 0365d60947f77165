// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration merged from every source.

use serde::Deserialize;

use crate::sections::{
	DatabaseConfigLayer, GitHubAppConfigLayer, LoggingConfigLayer, ProjectServiceConfigLayer,
	RepositoriesConfigLayer,
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub github_app: Option<GitHubAppConfigLayer>,
	#[serde(default)]
	pub project_service: Option<ProjectServiceConfigLayer>,
	#[serde(default)]
	pub repositories: Option<RepositoriesConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl ServerConfigLayer {
	/// Merge `other` on top of `self`.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_option(
			&mut self.database,
			other.database,
			DatabaseConfigLayer::merge,
		);
		merge_option(
			&mut self.github_app,
			other.github_app,
			GitHubAppConfigLayer::merge,
		);
		merge_option(
			&mut self.project_service,
			other.project_service,
			ProjectServiceConfigLayer::merge,
		);
		merge_option(
			&mut self.repositories,
			other.repositories,
			RepositoriesConfigLayer::merge,
		);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_merge_stays_empty() {
		let mut base = ServerConfigLayer::default();
		base.merge(ServerConfigLayer::default());
		assert!(base.database.is_none());
		assert!(base.github_app.is_none());
	}

	#[test]
	fn overlay_fills_missing_sections_and_overrides_fields() {
		let mut base = ServerConfigLayer {
			database: Some(DatabaseConfigLayer {
				url: Some("sqlite:./a.db".to_string()),
				stage: Some("dev".to_string()),
			}),
			..Default::default()
		};
		base.merge(ServerConfigLayer {
			database: Some(DatabaseConfigLayer {
				url: None,
				stage: Some("prod".to_string()),
			}),
			repositories: Some(RepositoriesConfigLayer {
				strict_disable_sweep: Some(true),
				..Default::default()
			}),
			..Default::default()
		});

		let database = base.database.unwrap();
		assert_eq!(database.url.as_deref(), Some("sqlite:./a.db"));
		assert_eq!(database.stage.as_deref(), Some("prod"));
		assert_eq!(
			base.repositories.unwrap().strict_disable_sweep,
			Some(true)
		);
	}

	#[test]
	fn parses_full_toml_file() {
		let layer: ServerConfigLayer = toml::from_str(
			r#"
[database]
url = "sqlite:/var/lib/cla/cla.db"
stage = "prod"

[github_app]
app_id = 42
non_blocking_limiter = true

[project_service]
base_url = "https://api.example.org/project-service/v1"
cache_capacity = 64

[logging]
level = "debug"
format = "json"
"#,
		)
		.unwrap();

		assert_eq!(layer.github_app.unwrap().app_id, Some(42));
		assert_eq!(layer.project_service.unwrap().cache_capacity, Some(64));
		assert!(layer.repositories.is_none());
	}
}
