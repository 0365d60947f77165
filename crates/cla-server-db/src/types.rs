// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DbError;

pub const RECORD_VERSION: &str = "v1";

// =========================================================================
// GitHub organizations
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubOrgRecord {
	pub organization_name: String,
	/// Issued by GitHub when the App is installed. `None` or `0` means the
	/// App is not installed on this organization.
	pub installation_id: Option<i64>,
	pub project_sfid: String,
	pub parent_project_sfid: Option<String>,
	pub auto_enabled: bool,
	pub auto_enabled_cla_group_id: Option<String>,
	pub branch_protection_enabled: bool,
	pub version: String,
	pub date_created: DateTime<Utc>,
	pub date_modified: DateTime<Utc>,
}

impl GithubOrgRecord {
	/// The installation id, if the App is actually installed.
	pub fn usable_installation_id(&self) -> Option<i64> {
		self.installation_id.filter(|id| *id != 0)
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGithubOrg {
	pub organization_name: String,
	pub installation_id: Option<i64>,
	pub auto_enabled: bool,
	pub auto_enabled_cla_group_id: Option<String>,
	pub branch_protection_enabled: bool,
}

// =========================================================================
// Repositories
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryRecord {
	pub repository_id: Uuid,
	/// GitHub's numeric repository id, stringified.
	pub external_id: String,
	/// Canonical `owner/repo`.
	pub name: String,
	pub url: String,
	#[serde(rename = "type")]
	pub repository_type: String,
	pub organization_name: String,
	pub cla_group_id: String,
	pub project_sfid: String,
	pub parent_project_sfid: String,
	pub enabled: bool,
	pub note: Option<String>,
	pub version: String,
	pub date_created: DateTime<Utc>,
	pub date_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGithubRepository {
	pub external_id: String,
	pub name: String,
	pub url: String,
	pub repository_type: String,
	pub organization_name: String,
	pub cla_group_id: String,
}

/// Fields left `None` keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryUpdate {
	pub enabled: Option<bool>,
	pub organization_name: Option<String>,
	pub cla_group_id: Option<String>,
	pub note: Option<String>,
}

/// One bucket of the CLA-group view, keyed by GitHub organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationRepositories {
	pub organization_name: String,
	pub repositories: Vec<RepositoryRecord>,
}

// =========================================================================
// Project / CLA group mappings
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectClaGroupMapping {
	pub project_sfid: String,
	pub foundation_sfid: String,
	pub cla_group_id: String,
	pub project_name: Option<String>,
	pub foundation_name: Option<String>,
	pub repositories_count: i64,
	pub version: String,
	pub date_created: DateTime<Utc>,
	pub date_modified: DateTime<Utc>,
}

impl ProjectClaGroupMapping {
	/// True when `project_sfid` is bound to this mapping either directly or
	/// as its foundation.
	pub fn links_project(&self, project_sfid: &str) -> bool {
		self.project_sfid == project_sfid || self.foundation_sfid == project_sfid
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProjectClaGroupMapping {
	pub project_sfid: String,
	pub foundation_sfid: String,
	pub cla_group_id: String,
	pub project_name: Option<String>,
	pub foundation_name: Option<String>,
}

// =========================================================================
// Timestamps
// =========================================================================

/// Fixed-width RFC 3339 so stored timestamps sort lexically.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
	at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DbError> {
	DateTime::parse_from_rfc3339(value)
		.map(|d| d.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("invalid timestamp '{value}': {e}")))
}
