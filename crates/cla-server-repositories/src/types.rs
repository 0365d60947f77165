// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use cla_common_core::ALLOWED_STATUS_CHECKS;
use cla_server_github_app::BranchProtectionRule;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRepositoriesInput {
	pub cla_group_id: String,
	pub organization_name: String,
	#[serde(default)]
	pub repository_github_ids: Vec<String>,
	/// Deprecated singular form, merged ahead of `repository_github_ids`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub repository_github_id: Option<String>,
}

impl LinkRepositoriesInput {
	/// Every requested external id, trimmed, in first-seen order without
	/// duplicates. A blank singular id means it was not supplied.
	pub fn external_ids(&self) -> Vec<&str> {
		let mut ids: Vec<&str> = Vec::new();
		let singular = self
			.repository_github_id
			.as_deref()
			.map(str::trim)
			.filter(|id| !id.is_empty());
		let all = singular
			.into_iter()
			.chain(self.repository_github_ids.iter().map(|id| id.trim()));
		for id in all {
			if !ids.contains(&id) {
				ids.push(id);
			}
		}
		ids
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCheckView {
	pub name: String,
	pub enabled: bool,
}

/// What a caller sees of a branch's protection rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchProtectionView {
	pub branch_name: String,
	pub protection_enabled: bool,
	#[serde(default)]
	pub enforce_admin: bool,
	#[serde(default)]
	pub status_checks: Vec<StatusCheckView>,
}

impl BranchProtectionView {
	pub fn unprotected(branch_name: impl Into<String>) -> Self {
		Self {
			branch_name: branch_name.into(),
			protection_enabled: false,
			enforce_admin: false,
			status_checks: Vec::new(),
		}
	}

	/// The allow-listed checks projected onto `rule`.
	pub fn from_rule(rule: &BranchProtectionRule) -> Self {
		Self {
			branch_name: rule.branch_name.clone(),
			protection_enabled: true,
			enforce_admin: rule.enforce_admins,
			status_checks: ALLOWED_STATUS_CHECKS
				.iter()
				.map(|name| StatusCheckView {
					name: name.to_string(),
					enabled: rule.has_context(name),
				})
				.collect(),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBranchProtectionInput {
	/// Blank means the repository's default branch.
	#[serde(default)]
	pub branch_name: Option<String>,
	pub enforce_admin: bool,
	#[serde(default)]
	pub status_checks: Vec<StatusCheckView>,
}

impl UpdateBranchProtectionInput {
	pub fn branch(&self) -> Option<&str> {
		self
			.branch_name
			.as_deref()
			.map(str::trim)
			.filter(|b| !b.is_empty())
	}

	/// `(required, disabled)` check names.
	pub fn partition_checks(&self) -> (Vec<String>, Vec<String>) {
		let (on, off): (Vec<&StatusCheckView>, Vec<&StatusCheckView>) =
			self.status_checks.iter().partition(|c| c.enabled);
		(
			on.into_iter().map(|c| c.name.clone()).collect(),
			off.into_iter().map(|c| c.name.clone()).collect(),
		)
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepMode {
	/// Log and skip repositories that fail to disable.
	#[default]
	BestEffort,
	/// Stop at the first failure.
	Strict,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisableSweepReport {
	pub disabled: usize,
	pub failed: usize,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub failed_repository_ids: Vec<Uuid>,
}
