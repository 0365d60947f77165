// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::DbError;
use crate::schema::TableNames;
use crate::types::{
	parse_timestamp, timestamp, NewProjectClaGroupMapping, ProjectClaGroupMapping, RECORD_VERSION,
};

/// Which projects are governed by which CLA group. A project belongs to at
/// most one CLA group.
#[async_trait]
pub trait ProjectClaGroupStore: Send + Sync {
	async fn get_projects_ids_for_cla_group(
		&self,
		cla_group_id: &str,
	) -> Result<Vec<ProjectClaGroupMapping>, DbError>;
	async fn get_cla_group_for_project(
		&self,
		project_sfid: &str,
	) -> Result<Option<ProjectClaGroupMapping>, DbError>;
	async fn associate(
		&self,
		input: &NewProjectClaGroupMapping,
	) -> Result<ProjectClaGroupMapping, DbError>;
	async fn remove_association(&self, project_sfid: &str) -> Result<(), DbError>;
}

const COLUMNS: &str = "project_sfid, foundation_sfid, cla_group_id, project_name, foundation_name, \
	repositories_count, version, date_created, date_modified";

#[derive(Clone)]
pub struct ProjectClaGroupRepository {
	pool: SqlitePool,
	table: String,
}

impl ProjectClaGroupRepository {
	pub fn new(pool: SqlitePool, tables: &TableNames) -> Self {
		Self {
			pool,
			table: tables.projects_cla_groups.clone(),
		}
	}

	#[tracing::instrument(skip(self), fields(cla_group_id = %cla_group_id))]
	pub async fn get_projects_ids_for_cla_group(
		&self,
		cla_group_id: &str,
	) -> Result<Vec<ProjectClaGroupMapping>, DbError> {
		let rows = sqlx::query(&format!(
			"SELECT {COLUMNS} FROM {} WHERE cla_group_id = ? ORDER BY project_sfid",
			self.table
		))
		.bind(cla_group_id)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_mapping).collect()
	}

	#[tracing::instrument(skip(self), fields(project_sfid = %project_sfid))]
	pub async fn get_cla_group_for_project(
		&self,
		project_sfid: &str,
	) -> Result<Option<ProjectClaGroupMapping>, DbError> {
		let row = sqlx::query(&format!(
			"SELECT {COLUMNS} FROM {} WHERE project_sfid = ?",
			self.table
		))
		.bind(project_sfid)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_mapping(&r)).transpose()
	}

	/// Insert or move a project onto a CLA group. `date_created` survives a
	/// move.
	#[tracing::instrument(skip(self, input), fields(project_sfid = %input.project_sfid, cla_group_id = %input.cla_group_id))]
	pub async fn associate(
		&self,
		input: &NewProjectClaGroupMapping,
	) -> Result<ProjectClaGroupMapping, DbError> {
		let now = timestamp(Utc::now());

		sqlx::query(&format!(
			r#"
			INSERT INTO {} ({COLUMNS}) VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?)
			ON CONFLICT(project_sfid) DO UPDATE SET
				foundation_sfid = excluded.foundation_sfid,
				cla_group_id = excluded.cla_group_id,
				project_name = excluded.project_name,
				foundation_name = excluded.foundation_name,
				date_modified = excluded.date_modified
			"#,
			self.table
		))
		.bind(&input.project_sfid)
		.bind(&input.foundation_sfid)
		.bind(&input.cla_group_id)
		.bind(&input.project_name)
		.bind(&input.foundation_name)
		.bind(RECORD_VERSION)
		.bind(&now)
		.bind(&now)
		.execute(&self.pool)
		.await?;

		self
			.get_cla_group_for_project(&input.project_sfid)
			.await?
			.ok_or_else(|| DbError::Internal(format!("mapping for {} vanished", input.project_sfid)))
	}

	#[tracing::instrument(skip(self), fields(project_sfid = %project_sfid))]
	pub async fn remove_association(&self, project_sfid: &str) -> Result<(), DbError> {
		let result = sqlx::query(&format!("DELETE FROM {} WHERE project_sfid = ?", self.table))
			.bind(project_sfid)
			.execute(&self.pool)
			.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!(
				"CLA group mapping for project {project_sfid}"
			)));
		}

		Ok(())
	}
}

#[async_trait]
impl ProjectClaGroupStore for ProjectClaGroupRepository {
	async fn get_projects_ids_for_cla_group(
		&self,
		cla_group_id: &str,
	) -> Result<Vec<ProjectClaGroupMapping>, DbError> {
		ProjectClaGroupRepository::get_projects_ids_for_cla_group(self, cla_group_id).await
	}

	async fn get_cla_group_for_project(
		&self,
		project_sfid: &str,
	) -> Result<Option<ProjectClaGroupMapping>, DbError> {
		ProjectClaGroupRepository::get_cla_group_for_project(self, project_sfid).await
	}

	async fn associate(
		&self,
		input: &NewProjectClaGroupMapping,
	) -> Result<ProjectClaGroupMapping, DbError> {
		ProjectClaGroupRepository::associate(self, input).await
	}

	async fn remove_association(&self, project_sfid: &str) -> Result<(), DbError> {
		ProjectClaGroupRepository::remove_association(self, project_sfid).await
	}
}

fn row_to_mapping(row: &sqlx::sqlite::SqliteRow) -> Result<ProjectClaGroupMapping, DbError> {
	let date_created: String = row.try_get("date_created")?;
	let date_modified: String = row.try_get("date_modified")?;

	Ok(ProjectClaGroupMapping {
		project_sfid: row.try_get("project_sfid")?,
		foundation_sfid: row.try_get("foundation_sfid")?,
		cla_group_id: row.try_get("cla_group_id")?,
		project_name: row.try_get("project_name")?,
		foundation_name: row.try_get("foundation_name")?,
		repositories_count: row.try_get("repositories_count")?,
		version: row.try_get("version")?,
		date_created: parse_timestamp(&date_created)?,
		date_modified: parse_timestamp(&date_modified)?,
	})
}
