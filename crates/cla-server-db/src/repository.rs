// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::error::{conflict_on_unique, DbError};
use crate::schema::TableNames;
use crate::types::{
	parse_timestamp, timestamp, NewGithubRepository, OrganizationRepositories, RepositoryRecord,
	RepositoryUpdate, RECORD_VERSION,
};

#[async_trait]
pub trait RepositoryStore: Send + Sync {
	/// Insert a new enabled repository. At most one enabled row may carry a
	/// given name; a second one is a `Conflict`.
	async fn add_github_repository(
		&self,
		parent_sfid: &str,
		project_sfid: &str,
		input: &NewGithubRepository,
	) -> Result<RepositoryRecord, DbError>;
	async fn update_github_repository(
		&self,
		repository_id: Uuid,
		update: &RepositoryUpdate,
	) -> Result<RepositoryRecord, DbError>;
	async fn enable_repository(&self, repository_id: Uuid) -> Result<(), DbError>;
	async fn disable_repository(&self, repository_id: Uuid) -> Result<(), DbError>;
	async fn get_repository(&self, repository_id: Uuid) -> Result<Option<RepositoryRecord>, DbError>;
	/// Prefers the enabled row, then the most recently modified one.
	async fn get_repository_by_name(&self, name: &str) -> Result<Option<RepositoryRecord>, DbError>;
	async fn list_project_repositories(
		&self,
		project_sfid: &str,
		enabled: Option<bool>,
	) -> Result<Vec<RepositoryRecord>, DbError>;
	async fn get_cla_group_repositories_group_by_orgs(
		&self,
		cla_group_id: &str,
		enabled_only: bool,
	) -> Result<Vec<OrganizationRepositories>, DbError>;
}

const COLUMNS: &str = "repository_id, external_id, name, url, repository_type, organization_name, \
	cla_group_id, project_sfid, parent_project_sfid, enabled, note, version, date_created, \
	date_modified";

#[derive(Clone)]
pub struct GithubRepoRepository {
	pool: SqlitePool,
	table: String,
}

impl GithubRepoRepository {
	pub fn new(pool: SqlitePool, tables: &TableNames) -> Self {
		Self {
			pool,
			table: tables.repositories.clone(),
		}
	}

	// =========================================================================
	// Writes
	// =========================================================================

	#[tracing::instrument(skip(self, input), fields(project_sfid = %project_sfid, name = %input.name))]
	pub async fn add_github_repository(
		&self,
		parent_sfid: &str,
		project_sfid: &str,
		input: &NewGithubRepository,
	) -> Result<RepositoryRecord, DbError> {
		// stored timestamps keep microseconds
		let now = Utc::now().trunc_subsecs(6);
		let record = RepositoryRecord {
			repository_id: Uuid::new_v4(),
			external_id: input.external_id.clone(),
			name: input.name.clone(),
			url: input.url.clone(),
			repository_type: input.repository_type.clone(),
			organization_name: input.organization_name.clone(),
			cla_group_id: input.cla_group_id.clone(),
			project_sfid: project_sfid.to_string(),
			parent_project_sfid: parent_sfid.to_string(),
			enabled: true,
			note: None,
			version: RECORD_VERSION.to_string(),
			date_created: now,
			date_modified: now,
		};

		sqlx::query(&format!(
			"INSERT INTO {} ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
			self.table
		))
		.bind(record.repository_id.to_string())
		.bind(&record.external_id)
		.bind(&record.name)
		.bind(&record.url)
		.bind(&record.repository_type)
		.bind(&record.organization_name)
		.bind(&record.cla_group_id)
		.bind(&record.project_sfid)
		.bind(&record.parent_project_sfid)
		.bind(record.enabled)
		.bind(&record.note)
		.bind(&record.version)
		.bind(timestamp(record.date_created))
		.bind(timestamp(record.date_modified))
		.execute(&self.pool)
		.await
		.map_err(|e| {
			conflict_on_unique(e, format!("repository {} is already enabled", input.name))
		})?;

		tracing::debug!(repository_id = %record.repository_id, "repository added");
		Ok(record)
	}

	#[tracing::instrument(skip(self, update), fields(repository_id = %repository_id))]
	pub async fn update_github_repository(
		&self,
		repository_id: Uuid,
		update: &RepositoryUpdate,
	) -> Result<RepositoryRecord, DbError> {
		let result = sqlx::query(&format!(
			r#"
			UPDATE {}
			SET enabled = COALESCE(?, enabled),
				organization_name = COALESCE(?, organization_name),
				cla_group_id = COALESCE(?, cla_group_id),
				note = COALESCE(?, note),
				date_modified = ?
			WHERE repository_id = ?
			"#,
			self.table
		))
		.bind(update.enabled)
		.bind(&update.organization_name)
		.bind(&update.cla_group_id)
		.bind(&update.note)
		.bind(timestamp(Utc::now()))
		.bind(repository_id.to_string())
		.execute(&self.pool)
		.await
		.map_err(|e| conflict_on_unique(e, format!("repository {repository_id} name is already enabled")))?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("repository {repository_id}")));
		}

		self
			.get_repository(repository_id)
			.await?
			.ok_or_else(|| DbError::NotFound(format!("repository {repository_id}")))
	}

	#[tracing::instrument(skip(self), fields(repository_id = %repository_id))]
	pub async fn enable_repository(&self, repository_id: Uuid) -> Result<(), DbError> {
		self.set_enabled(repository_id, true).await
	}

	#[tracing::instrument(skip(self), fields(repository_id = %repository_id))]
	pub async fn disable_repository(&self, repository_id: Uuid) -> Result<(), DbError> {
		self.set_enabled(repository_id, false).await
	}

	async fn set_enabled(&self, repository_id: Uuid, enabled: bool) -> Result<(), DbError> {
		let result = sqlx::query(&format!(
			"UPDATE {} SET enabled = ?, date_modified = ? WHERE repository_id = ?",
			self.table
		))
		.bind(enabled)
		.bind(timestamp(Utc::now()))
		.bind(repository_id.to_string())
		.execute(&self.pool)
		.await
		.map_err(|e| conflict_on_unique(e, format!("repository {repository_id} name is already enabled")))?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("repository {repository_id}")));
		}

		Ok(())
	}

	// =========================================================================
	// Reads
	// =========================================================================

	#[tracing::instrument(skip(self), fields(repository_id = %repository_id))]
	pub async fn get_repository(
		&self,
		repository_id: Uuid,
	) -> Result<Option<RepositoryRecord>, DbError> {
		let row = sqlx::query(&format!(
			"SELECT {COLUMNS} FROM {} WHERE repository_id = ?",
			self.table
		))
		.bind(repository_id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_repository(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(name = %name))]
	pub async fn get_repository_by_name(
		&self,
		name: &str,
	) -> Result<Option<RepositoryRecord>, DbError> {
		let row = sqlx::query(&format!(
			r#"
			SELECT {COLUMNS} FROM {}
			WHERE name = ?
			ORDER BY enabled DESC, date_modified DESC
			LIMIT 1
			"#,
			self.table
		))
		.bind(name)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_repository(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(project_sfid = %project_sfid))]
	pub async fn list_project_repositories(
		&self,
		project_sfid: &str,
		enabled: Option<bool>,
	) -> Result<Vec<RepositoryRecord>, DbError> {
		let rows = sqlx::query(&format!(
			r#"
			SELECT {COLUMNS} FROM {}
			WHERE project_sfid = ? AND (? IS NULL OR enabled = ?)
			ORDER BY name, date_modified DESC
			"#,
			self.table
		))
		.bind(project_sfid)
		.bind(enabled)
		.bind(enabled)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_repository).collect()
	}

	#[tracing::instrument(skip(self), fields(cla_group_id = %cla_group_id))]
	pub async fn get_cla_group_repositories_group_by_orgs(
		&self,
		cla_group_id: &str,
		enabled_only: bool,
	) -> Result<Vec<OrganizationRepositories>, DbError> {
		let rows = sqlx::query(&format!(
			r#"
			SELECT {COLUMNS} FROM {}
			WHERE cla_group_id = ? AND (? = 0 OR enabled = 1)
			ORDER BY organization_name COLLATE NOCASE, name
			"#,
			self.table
		))
		.bind(cla_group_id)
		.bind(enabled_only)
		.fetch_all(&self.pool)
		.await?;

		let mut buckets: Vec<OrganizationRepositories> = Vec::new();
		for row in &rows {
			let record = row_to_repository(row)?;
			match buckets.last_mut() {
				Some(bucket) if bucket.organization_name.eq_ignore_ascii_case(&record.organization_name) => {
					bucket.repositories.push(record);
				}
				_ => buckets.push(OrganizationRepositories {
					organization_name: record.organization_name.clone(),
					repositories: vec![record],
				}),
			}
		}

		Ok(buckets)
	}
}

#[async_trait]
impl RepositoryStore for GithubRepoRepository {
	async fn add_github_repository(
		&self,
		parent_sfid: &str,
		project_sfid: &str,
		input: &NewGithubRepository,
	) -> Result<RepositoryRecord, DbError> {
		GithubRepoRepository::add_github_repository(self, parent_sfid, project_sfid, input).await
	}

	async fn update_github_repository(
		&self,
		repository_id: Uuid,
		update: &RepositoryUpdate,
	) -> Result<RepositoryRecord, DbError> {
		GithubRepoRepository::update_github_repository(self, repository_id, update).await
	}

	async fn enable_repository(&self, repository_id: Uuid) -> Result<(), DbError> {
		GithubRepoRepository::enable_repository(self, repository_id).await
	}

	async fn disable_repository(&self, repository_id: Uuid) -> Result<(), DbError> {
		GithubRepoRepository::disable_repository(self, repository_id).await
	}

	async fn get_repository(&self, repository_id: Uuid) -> Result<Option<RepositoryRecord>, DbError> {
		GithubRepoRepository::get_repository(self, repository_id).await
	}

	async fn get_repository_by_name(&self, name: &str) -> Result<Option<RepositoryRecord>, DbError> {
		GithubRepoRepository::get_repository_by_name(self, name).await
	}

	async fn list_project_repositories(
		&self,
		project_sfid: &str,
		enabled: Option<bool>,
	) -> Result<Vec<RepositoryRecord>, DbError> {
		GithubRepoRepository::list_project_repositories(self, project_sfid, enabled).await
	}

	async fn get_cla_group_repositories_group_by_orgs(
		&self,
		cla_group_id: &str,
		enabled_only: bool,
	) -> Result<Vec<OrganizationRepositories>, DbError> {
		GithubRepoRepository::get_cla_group_repositories_group_by_orgs(self, cla_group_id, enabled_only)
			.await
	}
}

fn row_to_repository(row: &sqlx::sqlite::SqliteRow) -> Result<RepositoryRecord, DbError> {
	let repository_id: String = row.try_get("repository_id")?;
	let date_created: String = row.try_get("date_created")?;
	let date_modified: String = row.try_get("date_modified")?;

	Ok(RepositoryRecord {
		repository_id: Uuid::parse_str(&repository_id)
			.map_err(|e| DbError::Internal(format!("invalid repository id '{repository_id}': {e}")))?,
		external_id: row.try_get("external_id")?,
		name: row.try_get("name")?,
		url: row.try_get("url")?,
		repository_type: row.try_get("repository_type")?,
		organization_name: row.try_get("organization_name")?,
		cla_group_id: row.try_get("cla_group_id")?,
		project_sfid: row.try_get("project_sfid")?,
		parent_project_sfid: row.try_get("parent_project_sfid")?,
		enabled: row.try_get("enabled")?,
		note: row.try_get("note")?,
		version: row.try_get("version")?,
		date_created: parse_timestamp(&date_created)?,
		date_modified: parse_timestamp(&date_modified)?,
	})
}
