// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Stage-prefixed table names and schema bootstrap.

use sqlx::sqlite::SqlitePool;

use crate::error::DbError;

/// Quoted table identifiers for one deployment stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
	pub repositories: String,
	pub github_orgs: String,
	pub projects_cla_groups: String,
}

impl TableNames {
	/// `cla-<stage>-repositories`, `cla-<stage>-github-orgs`,
	/// `cla-<stage>-projects-cla-groups`.
	///
	/// The stage is validated by the config layer; embedded quotes are
	/// doubled here regardless.
	pub fn for_stage(stage: &str) -> Self {
		Self {
			repositories: quote(&format!("cla-{stage}-repositories")),
			github_orgs: quote(&format!("cla-{stage}-github-orgs")),
			projects_cla_groups: quote(&format!("cla-{stage}-projects-cla-groups")),
		}
	}
}

fn quote(ident: &str) -> String {
	format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Index names derive from the table so two stages can share a database.
fn index_name(table: &str, suffix: &str) -> String {
	quote(&format!("{}-{suffix}", table.trim_matches('"')))
}

/// Create the three tables and their indexes if they do not exist.
#[tracing::instrument(skip(pool))]
pub async fn ensure_schema(pool: &SqlitePool, tables: &TableNames) -> Result<(), DbError> {
	let statements = [
		format!(
			r#"
			CREATE TABLE IF NOT EXISTS {t} (
				organization_name TEXT NOT NULL COLLATE NOCASE PRIMARY KEY,
				installation_id INTEGER,
				project_sfid TEXT NOT NULL,
				parent_project_sfid TEXT,
				auto_enabled INTEGER NOT NULL DEFAULT 0,
				auto_enabled_cla_group_id TEXT,
				branch_protection_enabled INTEGER NOT NULL DEFAULT 0,
				version TEXT NOT NULL,
				date_created TEXT NOT NULL,
				date_modified TEXT NOT NULL
			)
			"#,
			t = tables.github_orgs
		),
		format!(
			"CREATE INDEX IF NOT EXISTS {} ON {}(project_sfid)",
			index_name(&tables.github_orgs, "project-sfid"),
			tables.github_orgs
		),
		format!(
			"CREATE INDEX IF NOT EXISTS {} ON {}(parent_project_sfid)",
			index_name(&tables.github_orgs, "parent-project-sfid"),
			tables.github_orgs
		),
		format!(
			r#"
			CREATE TABLE IF NOT EXISTS {t} (
				repository_id TEXT PRIMARY KEY,
				external_id TEXT NOT NULL,
				name TEXT NOT NULL,
				url TEXT NOT NULL,
				repository_type TEXT NOT NULL,
				organization_name TEXT NOT NULL,
				cla_group_id TEXT NOT NULL,
				project_sfid TEXT NOT NULL,
				parent_project_sfid TEXT NOT NULL,
				enabled INTEGER NOT NULL DEFAULT 1,
				note TEXT,
				version TEXT NOT NULL,
				date_created TEXT NOT NULL,
				date_modified TEXT NOT NULL
			)
			"#,
			t = tables.repositories
		),
		// A name may appear on many disabled rows but on one enabled row.
		format!(
			"CREATE UNIQUE INDEX IF NOT EXISTS {} ON {}(name) WHERE enabled = 1",
			index_name(&tables.repositories, "enabled-name"),
			tables.repositories
		),
		format!(
			"CREATE INDEX IF NOT EXISTS {} ON {}(name)",
			index_name(&tables.repositories, "name"),
			tables.repositories
		),
		format!(
			"CREATE INDEX IF NOT EXISTS {} ON {}(project_sfid)",
			index_name(&tables.repositories, "project-sfid"),
			tables.repositories
		),
		format!(
			"CREATE INDEX IF NOT EXISTS {} ON {}(cla_group_id)",
			index_name(&tables.repositories, "cla-group-id"),
			tables.repositories
		),
		format!(
			r#"
			CREATE TABLE IF NOT EXISTS {t} (
				project_sfid TEXT PRIMARY KEY,
				foundation_sfid TEXT NOT NULL,
				cla_group_id TEXT NOT NULL,
				project_name TEXT,
				foundation_name TEXT,
				repositories_count INTEGER NOT NULL DEFAULT 0,
				version TEXT NOT NULL,
				date_created TEXT NOT NULL,
				date_modified TEXT NOT NULL
			)
			"#,
			t = tables.projects_cla_groups
		),
		format!(
			"CREATE INDEX IF NOT EXISTS {} ON {}(cla_group_id)",
			index_name(&tables.projects_cla_groups, "cla-group-id"),
			tables.projects_cla_groups
		),
	];

	for statement in &statements {
		sqlx::query(statement).execute(pool).await?;
	}

	tracing::debug!(
		repositories = %tables.repositories,
		github_orgs = %tables.github_orgs,
		projects_cla_groups = %tables.projects_cla_groups,
		"schema ensured"
	);
	Ok(())
}
