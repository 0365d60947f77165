// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::DbError;
use crate::schema::TableNames;
use crate::types::{
	parse_timestamp, timestamp, GithubOrgRecord, NewGithubOrg, RECORD_VERSION,
};

/// GitHub organizations known to the CLA service. Names compare
/// case-insensitively everywhere.
#[async_trait]
pub trait GithubOrgStore: Send + Sync {
	/// All records whose name matches, ignoring case. Empty when the App
	/// has never been installed on the organization.
	async fn get_by_name(&self, name: &str) -> Result<Vec<GithubOrgRecord>, DbError>;
	async fn get_one(&self, name: &str) -> Result<Option<GithubOrgRecord>, DbError>;
	async fn get_by_parent(&self, parent_sfid: &str) -> Result<Vec<GithubOrgRecord>, DbError>;
	async fn get_by_project(&self, project_sfid: &str) -> Result<Vec<GithubOrgRecord>, DbError>;
	async fn add(
		&self,
		project_sfid: &str,
		parent_sfid: Option<&str>,
		input: &NewGithubOrg,
	) -> Result<GithubOrgRecord, DbError>;
	async fn update(
		&self,
		project_sfid: &str,
		name: &str,
		auto_enabled: bool,
		branch_protection_enabled: bool,
		auto_enabled_cla_group_id: Option<&str>,
	) -> Result<GithubOrgRecord, DbError>;
	async fn delete(&self, project_sfid: &str, name: &str) -> Result<(), DbError>;
	async fn delete_by_parent(&self, parent_sfid: &str, name: &str) -> Result<(), DbError>;
	async fn set_installation_id(
		&self,
		name: &str,
		installation_id: Option<i64>,
	) -> Result<(), DbError>;
}

const COLUMNS: &str = "organization_name, installation_id, project_sfid, parent_project_sfid, \
	auto_enabled, auto_enabled_cla_group_id, branch_protection_enabled, version, date_created, \
	date_modified";

#[derive(Clone)]
pub struct OrganizationRepository {
	pool: SqlitePool,
	table: String,
}

impl OrganizationRepository {
	pub fn new(pool: SqlitePool, tables: &TableNames) -> Self {
		Self {
			pool,
			table: tables.github_orgs.clone(),
		}
	}

	#[tracing::instrument(skip(self), fields(organization_name = %name))]
	pub async fn get_by_name(&self, name: &str) -> Result<Vec<GithubOrgRecord>, DbError> {
		let rows = sqlx::query(&format!(
			"SELECT {COLUMNS} FROM {} WHERE organization_name = ? COLLATE NOCASE",
			self.table
		))
		.bind(name)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_org).collect()
	}

	#[tracing::instrument(skip(self), fields(organization_name = %name))]
	pub async fn get_one(&self, name: &str) -> Result<Option<GithubOrgRecord>, DbError> {
		let row = sqlx::query(&format!(
			"SELECT {COLUMNS} FROM {} WHERE organization_name = ? COLLATE NOCASE",
			self.table
		))
		.bind(name)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_org(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(parent_project_sfid = %parent_sfid))]
	pub async fn get_by_parent(&self, parent_sfid: &str) -> Result<Vec<GithubOrgRecord>, DbError> {
		let rows = sqlx::query(&format!(
			"SELECT {COLUMNS} FROM {} WHERE parent_project_sfid = ? ORDER BY organization_name",
			self.table
		))
		.bind(parent_sfid)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_org).collect()
	}

	#[tracing::instrument(skip(self), fields(project_sfid = %project_sfid))]
	pub async fn get_by_project(&self, project_sfid: &str) -> Result<Vec<GithubOrgRecord>, DbError> {
		let rows = sqlx::query(&format!(
			"SELECT {COLUMNS} FROM {} WHERE project_sfid = ? ORDER BY organization_name",
			self.table
		))
		.bind(project_sfid)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_org).collect()
	}

	#[tracing::instrument(skip(self, input), fields(project_sfid = %project_sfid, organization_name = %input.organization_name))]
	pub async fn add(
		&self,
		project_sfid: &str,
		parent_sfid: Option<&str>,
		input: &NewGithubOrg,
	) -> Result<GithubOrgRecord, DbError> {
		// stored timestamps keep microseconds
		let now = Utc::now().trunc_subsecs(6);
		let record = GithubOrgRecord {
			organization_name: input.organization_name.clone(),
			installation_id: input.installation_id,
			project_sfid: project_sfid.to_string(),
			parent_project_sfid: parent_sfid.map(str::to_string),
			auto_enabled: input.auto_enabled,
			auto_enabled_cla_group_id: input.auto_enabled_cla_group_id.clone(),
			branch_protection_enabled: input.branch_protection_enabled,
			version: RECORD_VERSION.to_string(),
			date_created: now,
			date_modified: now,
		};

		sqlx::query(&format!(
			"INSERT INTO {} ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
			self.table
		))
		.bind(&record.organization_name)
		.bind(record.installation_id)
		.bind(&record.project_sfid)
		.bind(&record.parent_project_sfid)
		.bind(record.auto_enabled)
		.bind(&record.auto_enabled_cla_group_id)
		.bind(record.branch_protection_enabled)
		.bind(&record.version)
		.bind(timestamp(record.date_created))
		.bind(timestamp(record.date_modified))
		.execute(&self.pool)
		.await
		.map_err(|e| match e {
			sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
				DbError::AlreadyExists(format!(
					"GitHub organization {} already exists",
					input.organization_name
				))
			}
			_ => DbError::Sqlx(e),
		})?;

		tracing::debug!("github organization added");
		Ok(record)
	}

	#[tracing::instrument(skip(self), fields(project_sfid = %project_sfid, organization_name = %name))]
	pub async fn update(
		&self,
		project_sfid: &str,
		name: &str,
		auto_enabled: bool,
		branch_protection_enabled: bool,
		auto_enabled_cla_group_id: Option<&str>,
	) -> Result<GithubOrgRecord, DbError> {
		let result = sqlx::query(&format!(
			r#"
			UPDATE {}
			SET auto_enabled = ?,
				branch_protection_enabled = ?,
				auto_enabled_cla_group_id = COALESCE(?, auto_enabled_cla_group_id),
				date_modified = ?
			WHERE project_sfid = ? AND organization_name = ? COLLATE NOCASE
			"#,
			self.table
		))
		.bind(auto_enabled)
		.bind(branch_protection_enabled)
		.bind(auto_enabled_cla_group_id)
		.bind(timestamp(Utc::now()))
		.bind(project_sfid)
		.bind(name)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!(
				"GitHub organization {name} for project {project_sfid}"
			)));
		}

		self
			.get_one(name)
			.await?
			.ok_or_else(|| DbError::NotFound(format!("GitHub organization {name}")))
	}

	#[tracing::instrument(skip(self), fields(project_sfid = %project_sfid, organization_name = %name))]
	pub async fn delete(&self, project_sfid: &str, name: &str) -> Result<(), DbError> {
		let result = sqlx::query(&format!(
			"DELETE FROM {} WHERE project_sfid = ? AND organization_name = ? COLLATE NOCASE",
			self.table
		))
		.bind(project_sfid)
		.bind(name)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!(
				"GitHub organization {name} for project {project_sfid}"
			)));
		}

		Ok(())
	}

	#[tracing::instrument(skip(self), fields(parent_project_sfid = %parent_sfid, organization_name = %name))]
	pub async fn delete_by_parent(&self, parent_sfid: &str, name: &str) -> Result<(), DbError> {
		let result = sqlx::query(&format!(
			"DELETE FROM {} WHERE parent_project_sfid = ? AND organization_name = ? COLLATE NOCASE",
			self.table
		))
		.bind(parent_sfid)
		.bind(name)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!(
				"GitHub organization {name} for parent {parent_sfid}"
			)));
		}

		Ok(())
	}

	#[tracing::instrument(skip(self), fields(organization_name = %name))]
	pub async fn set_installation_id(
		&self,
		name: &str,
		installation_id: Option<i64>,
	) -> Result<(), DbError> {
		let result = sqlx::query(&format!(
			"UPDATE {} SET installation_id = ?, date_modified = ? WHERE organization_name = ? COLLATE NOCASE",
			self.table
		))
		.bind(installation_id)
		.bind(timestamp(Utc::now()))
		.bind(name)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("GitHub organization {name}")));
		}

		Ok(())
	}
}

#[async_trait]
impl GithubOrgStore for OrganizationRepository {
	async fn get_by_name(&self, name: &str) -> Result<Vec<GithubOrgRecord>, DbError> {
		OrganizationRepository::get_by_name(self, name).await
	}

	async fn get_one(&self, name: &str) -> Result<Option<GithubOrgRecord>, DbError> {
		OrganizationRepository::get_one(self, name).await
	}

	async fn get_by_parent(&self, parent_sfid: &str) -> Result<Vec<GithubOrgRecord>, DbError> {
		OrganizationRepository::get_by_parent(self, parent_sfid).await
	}

	async fn get_by_project(&self, project_sfid: &str) -> Result<Vec<GithubOrgRecord>, DbError> {
		OrganizationRepository::get_by_project(self, project_sfid).await
	}

	async fn add(
		&self,
		project_sfid: &str,
		parent_sfid: Option<&str>,
		input: &NewGithubOrg,
	) -> Result<GithubOrgRecord, DbError> {
		OrganizationRepository::add(self, project_sfid, parent_sfid, input).await
	}

	async fn update(
		&self,
		project_sfid: &str,
		name: &str,
		auto_enabled: bool,
		branch_protection_enabled: bool,
		auto_enabled_cla_group_id: Option<&str>,
	) -> Result<GithubOrgRecord, DbError> {
		OrganizationRepository::update(
			self,
			project_sfid,
			name,
			auto_enabled,
			branch_protection_enabled,
			auto_enabled_cla_group_id,
		)
		.await
	}

	async fn delete(&self, project_sfid: &str, name: &str) -> Result<(), DbError> {
		OrganizationRepository::delete(self, project_sfid, name).await
	}

	async fn delete_by_parent(&self, parent_sfid: &str, name: &str) -> Result<(), DbError> {
		OrganizationRepository::delete_by_parent(self, parent_sfid, name).await
	}

	async fn set_installation_id(
		&self,
		name: &str,
		installation_id: Option<i64>,
	) -> Result<(), DbError> {
		OrganizationRepository::set_installation_id(self, name, installation_id).await
	}
}

fn row_to_org(row: &sqlx::sqlite::SqliteRow) -> Result<GithubOrgRecord, DbError> {
	let date_created: String = row.try_get("date_created")?;
	let date_modified: String = row.try_get("date_modified")?;

	Ok(GithubOrgRecord {
		organization_name: row.try_get("organization_name")?,
		installation_id: row.try_get("installation_id")?,
		project_sfid: row.try_get("project_sfid")?,
		parent_project_sfid: row.try_get("parent_project_sfid")?,
		auto_enabled: row.try_get("auto_enabled")?,
		auto_enabled_cla_group_id: row.try_get("auto_enabled_cla_group_id")?,
		branch_protection_enabled: row.try_get("branch_protection_enabled")?,
		version: row.try_get("version")?,
		date_created: parse_timestamp(&date_created)?,
		date_modified: parse_timestamp(&date_modified)?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	async fn make_repo() -> OrganizationRepository {
		let (pool, tables) = crate::testing::create_cla_test_pool().await;
		OrganizationRepository::new(pool, &tables)
	}

	fn new_org(name: &str, installation_id: Option<i64>) -> NewGithubOrg {
		NewGithubOrg {
			organization_name: name.to_string(),
			installation_id,
			..Default::default()
		}
	}

	#[tokio::test]
	async fn add_and_lookup_ignoring_case() {
		let repo = make_repo().await;
		repo
			.add("P1", Some("F1"), &new_org("Acme", Some(17)))
			.await
			.unwrap();

		let found = repo.get_by_name("acme").await.unwrap();
		assert_eq!(found.len(), 1);
		assert_eq!(found[0].organization_name, "Acme");
		assert_eq!(found[0].usable_installation_id(), Some(17));
		assert_eq!(found[0].parent_project_sfid.as_deref(), Some("F1"));

		assert!(repo.get_one("ACME").await.unwrap().is_some());
		assert!(repo.get_by_name("other").await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn duplicate_add_is_already_exists() {
		let repo = make_repo().await;
		repo.add("P1", None, &new_org("acme", None)).await.unwrap();

		let err = repo
			.add("P2", None, &new_org("ACME", None))
			.await
			.unwrap_err();
		assert!(matches!(err, DbError::AlreadyExists(_)));
	}

	#[tokio::test]
	async fn lookups_by_project_and_parent() {
		let repo = make_repo().await;
		repo.add("P1", Some("F1"), &new_org("a", None)).await.unwrap();
		repo.add("P1", Some("F1"), &new_org("b", None)).await.unwrap();
		repo.add("P2", Some("F2"), &new_org("c", None)).await.unwrap();

		let by_project = repo.get_by_project("P1").await.unwrap();
		let names: Vec<_> = by_project.iter().map(|o| o.organization_name.as_str()).collect();
		assert_eq!(names, vec!["a", "b"]);

		assert_eq!(repo.get_by_parent("F2").await.unwrap().len(), 1);
		assert!(repo.get_by_parent("F3").await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn update_flags_and_keep_cla_group_when_absent() {
		let repo = make_repo().await;
		repo.add("P1", None, &new_org("acme", None)).await.unwrap();

		let updated = repo
			.update("P1", "ACME", true, true, Some("G1"))
			.await
			.unwrap();
		assert!(updated.auto_enabled);
		assert!(updated.branch_protection_enabled);
		assert_eq!(updated.auto_enabled_cla_group_id.as_deref(), Some("G1"));

		let updated = repo.update("P1", "acme", false, true, None).await.unwrap();
		assert!(!updated.auto_enabled);
		assert_eq!(updated.auto_enabled_cla_group_id.as_deref(), Some("G1"));
	}

	#[tokio::test]
	async fn update_under_wrong_project_is_not_found() {
		let repo = make_repo().await;
		repo.add("P1", None, &new_org("acme", None)).await.unwrap();

		let err = repo.update("P2", "acme", true, true, None).await.unwrap_err();
		assert!(matches!(err, DbError::NotFound(_)));
	}

	#[tokio::test]
	async fn delete_and_delete_by_parent() {
		let repo = make_repo().await;
		repo.add("P1", Some("F1"), &new_org("a", None)).await.unwrap();
		repo.add("P1", Some("F1"), &new_org("b", None)).await.unwrap();

		repo.delete("P1", "A").await.unwrap();
		assert!(repo.get_one("a").await.unwrap().is_none());
		assert!(matches!(
			repo.delete("P1", "a").await,
			Err(DbError::NotFound(_))
		));

		repo.delete_by_parent("F1", "b").await.unwrap();
		assert!(repo.get_by_project("P1").await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn set_installation_id_round_trips() {
		let repo = make_repo().await;
		repo.add("P1", None, &new_org("acme", None)).await.unwrap();

		repo.set_installation_id("acme", Some(99)).await.unwrap();
		let org = repo.get_one("acme").await.unwrap().unwrap();
		assert_eq!(org.usable_installation_id(), Some(99));

		repo.set_installation_id("acme", None).await.unwrap();
		let org = repo.get_one("acme").await.unwrap().unwrap();
		assert_eq!(org.usable_installation_id(), None);

		assert!(matches!(
			repo.set_installation_id("missing", Some(1)).await,
			Err(DbError::NotFound(_))
		));
	}
}
