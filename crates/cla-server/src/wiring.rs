// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Builds the service graph from a resolved [`ServerConfig`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use cla_server_config::{GitHubAppConfig, ProjectServiceAuth, ProjectServiceConfig, ServerConfig};
use cla_server_db::{
	create_pool, ensure_schema, GithubRepoRepository, OrganizationRepository,
	ProjectClaGroupRepository, TableNames,
};
use cla_server_github_app::{GithubAppClient, GithubAppConfig, LimiterSettings};
use cla_server_project_service::{
	ClientCredentialsTokenProvider, ProjectServiceClient, StaticTokenProvider, TokenProvider,
};
use cla_server_repositories::RepositoriesService;
use sqlx::SqlitePool;
use tracing::info;

pub struct Database {
	pub pool: SqlitePool,
	pub tables: TableNames,
}

pub async fn connect(config: &ServerConfig) -> Result<Database> {
	let pool = create_pool(&config.database.url)
		.await
		.with_context(|| format!("failed to open database {}", config.database.url))?;
	let tables = TableNames::for_stage(&config.database.stage);
	Ok(Database { pool, tables })
}

pub async fn migrate(db: &Database) -> Result<()> {
	ensure_schema(&db.pool, &db.tables)
		.await
		.context("failed to create tables")?;
	info!(table = %db.tables.repositories, "schema ready");
	Ok(())
}

pub fn github_client(config: &GitHubAppConfig) -> Result<GithubAppClient> {
	let mut app = GithubAppConfig::with_secret_key(config.app_id, config.private_key_pem.clone())
		.try_with_base_url(&config.base_url)?
		.with_app_slug(config.app_slug.clone());
	if let Some(limiter) = &config.limiter {
		app = app.with_limiter(LimiterSettings {
			rate_per_sec: limiter.rate_per_sec,
			burst: limiter.burst,
		});
	}
	Ok(GithubAppClient::new(app)?)
}

pub fn token_provider(config: &ProjectServiceConfig) -> Result<Arc<dyn TokenProvider>> {
	let provider: Arc<dyn TokenProvider> = match &config.auth {
		ProjectServiceAuth::Static { token } => Arc::new(StaticTokenProvider::new(token.clone())),
		ProjectServiceAuth::ClientCredentials {
			token_url,
			client_id,
			client_secret,
			audience,
		} => {
			let http =
				cla_common_http::new_client_with_timeout(Duration::from_secs(config.timeout_secs))
					.context("failed to create token HTTP client")?;
			Arc::new(ClientCredentialsTokenProvider::new(
				http,
				token_url.clone(),
				client_id.clone(),
				client_secret.clone(),
				audience.clone(),
			))
		}
	};
	Ok(provider)
}

pub fn project_client(config: &ProjectServiceConfig) -> Result<ProjectServiceClient> {
	Ok(ProjectServiceClient::new(
		&config.base_url,
		token_provider(config)?,
		config.cache_capacity,
		Duration::from_secs(config.timeout_secs),
	)?)
}

/// Wire the linker. Both outbound integrations must be configured.
pub fn repositories_service(config: &ServerConfig, db: &Database) -> Result<RepositoriesService> {
	let Some(github) = &config.github_app else {
		bail!("GitHub App is not configured (set CLA_SERVER_GITHUB_APP_ID)");
	};
	let Some(catalog) = &config.project_service else {
		bail!("project service is not configured (set CLA_SERVER_PROJECT_SERVICE_URL)");
	};

	let code_host = github_client(github)?;
	let catalog = project_client(catalog)?;

	Ok(RepositoriesService::new(
		Arc::new(catalog),
		Arc::new(OrganizationRepository::new(db.pool.clone(), &db.tables)),
		Arc::new(GithubRepoRepository::new(db.pool.clone(), &db.tables)),
		Arc::new(ProjectClaGroupRepository::new(db.pool.clone(), &db.tables)),
		Arc::new(code_host),
	)
	.with_non_blocking_limiter(github.limiter.is_some()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use cla_common_config::SecretString;
	use cla_server_config::LimiterConfig;

	#[test]
	fn static_catalog_token_builds() {
		let config = ProjectServiceConfig {
			base_url: "https://api.example.org/project-service/v1".to_string(),
			auth: ProjectServiceAuth::Static {
				token: SecretString::new("t".to_string()),
			},
			cache_capacity: 8,
			timeout_secs: 5,
		};
		assert!(project_client(&config).is_ok());
	}

	#[tokio::test]
	async fn migrate_is_idempotent() {
		let dir = tempfile::tempdir().unwrap();
		let mut config = ServerConfig::default();
		config.database.url = format!("sqlite:{}", dir.path().join("cla.db").display());
		let db = connect(&config).await.unwrap();
		migrate(&db).await.unwrap();
		migrate(&db).await.unwrap();
	}

	#[test]
	fn bad_github_base_url_is_rejected() {
		let config = GitHubAppConfig {
			app_id: 1,
			private_key_pem: SecretString::new("pem".to_string()),
			app_slug: "easycla".to_string(),
			base_url: "not a url".to_string(),
			limiter: Some(LimiterConfig {
				rate_per_sec: 1.0,
				burst: 1,
			}),
		};
		assert!(github_client(&config).is_err());
	}

	#[tokio::test]
	async fn missing_integrations_fail_wiring() {
		let config = ServerConfig::default();
		let (pool, tables) = cla_server_db::testing::create_cla_test_pool().await;
		let db = Database { pool, tables };
		let err = repositories_service(&config, &db).err().unwrap();
		assert!(err.to_string().contains("GitHub App"));
	}
}
