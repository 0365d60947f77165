// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Repository and branch-protection types, plus the GitHub wire shapes they
//! are read from.

use serde::{Deserialize, Serialize};

/// Repository metadata as seen by the installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
	/// GitHub repository ID.
	pub id: i64,
	/// `owner/repo`.
	pub full_name: String,
	pub name: String,
	pub owner_login: String,
	/// API URL.
	pub url: String,
	/// Browser URL.
	pub html_url: String,
	pub default_branch: String,
	pub private: bool,
}

// =========================================================================
// Branch protection
// =========================================================================

/// One required status check. `app_id` pins the check to a GitHub App;
/// `None` lets GitHub pick whichever app last reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCheck {
	pub context: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub app_id: Option<i64>,
}

impl StatusCheck {
	pub fn new(context: impl Into<String>) -> Self {
		Self {
			context: context.into(),
			app_id: None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredStatusChecks {
	pub strict: bool,
	pub checks: Vec<StatusCheck>,
}

/// Users, teams and apps by login or slug.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restrictions {
	pub users: Vec<String>,
	pub teams: Vec<String>,
	#[serde(default)]
	pub apps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestReviews {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub dismissal_restrictions: Option<Restrictions>,
	pub dismiss_stale_reviews: bool,
	pub require_code_owner_reviews: bool,
	pub required_approving_review_count: u32,
	pub require_last_push_approval: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub bypass_pull_request_allowances: Option<Restrictions>,
}

/// A branch-protection rule with every field GitHub lets us write back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchProtectionRule {
	pub branch_name: String,
	pub enforce_admins: bool,
	pub required_status_checks: Option<RequiredStatusChecks>,
	pub required_pull_request_reviews: Option<PullRequestReviews>,
	pub restrictions: Option<Restrictions>,
	pub required_linear_history: bool,
	pub allow_force_pushes: bool,
	pub allow_deletions: bool,
	pub block_creations: bool,
	pub required_conversation_resolution: bool,
	pub lock_branch: bool,
	pub allow_fork_syncing: bool,
}

impl BranchProtectionRule {
	/// A rule with nothing switched on, the starting point for a branch that
	/// has never been protected.
	pub fn unprotected(branch_name: impl Into<String>) -> Self {
		Self {
			branch_name: branch_name.into(),
			enforce_admins: false,
			required_status_checks: None,
			required_pull_request_reviews: None,
			restrictions: None,
			required_linear_history: false,
			allow_force_pushes: false,
			allow_deletions: false,
			block_creations: false,
			required_conversation_resolution: false,
			lock_branch: false,
			allow_fork_syncing: false,
		}
	}

	/// Required status-check names in rule order.
	pub fn contexts(&self) -> Vec<&str> {
		self
			.required_status_checks
			.as_ref()
			.map(|r| r.checks.iter().map(|c| c.context.as_str()).collect())
			.unwrap_or_default()
	}

	pub fn has_context(&self, name: &str) -> bool {
		self.contexts().contains(&name)
	}
}

/// Body of `PUT /repos/{owner}/{repo}/branches/{branch}/protection`.
///
/// GitHub requires the four nullable keys to be present, so `None`
/// serializes as `null` rather than being skipped.
#[derive(Debug, Serialize)]
pub(crate) struct UpdateProtectionRequest<'a> {
	pub required_status_checks: Option<&'a RequiredStatusChecks>,
	pub enforce_admins: bool,
	pub required_pull_request_reviews: Option<&'a PullRequestReviews>,
	pub restrictions: Option<&'a Restrictions>,
	pub required_linear_history: bool,
	pub allow_force_pushes: bool,
	pub allow_deletions: bool,
	pub block_creations: bool,
	pub required_conversation_resolution: bool,
	pub lock_branch: bool,
	pub allow_fork_syncing: bool,
}

impl<'a> From<&'a BranchProtectionRule> for UpdateProtectionRequest<'a> {
	fn from(rule: &'a BranchProtectionRule) -> Self {
		Self {
			required_status_checks: rule.required_status_checks.as_ref(),
			enforce_admins: rule.enforce_admins,
			required_pull_request_reviews: rule.required_pull_request_reviews.as_ref(),
			restrictions: rule.restrictions.as_ref(),
			required_linear_history: rule.required_linear_history,
			allow_force_pushes: rule.allow_force_pushes,
			allow_deletions: rule.allow_deletions,
			block_creations: rule.block_creations,
			required_conversation_resolution: rule.required_conversation_resolution,
			lock_branch: rule.lock_branch,
			allow_fork_syncing: rule.allow_fork_syncing,
		}
	}
}

// =========================================================================
// Wire format
// =========================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct AccessTokenResponse {
	pub token: String,
	pub expires_at: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitHubRepoResponse {
	pub id: i64,
	pub name: String,
	pub full_name: String,
	pub owner: GitHubLogin,
	pub url: String,
	pub html_url: String,
	#[serde(default)]
	pub default_branch: String,
	#[serde(default)]
	pub private: bool,
}

impl From<GitHubRepoResponse> for Repository {
	fn from(r: GitHubRepoResponse) -> Self {
		Self {
			id: r.id,
			full_name: r.full_name,
			name: r.name,
			owner_login: r.owner.login,
			url: r.url,
			html_url: r.html_url,
			default_branch: r.default_branch,
			private: r.private,
		}
	}
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitHubLogin {
	pub login: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitHubSlug {
	pub slug: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GitHubEnabled {
	#[serde(default)]
	pub enabled: bool,
}

fn flag(value: Option<GitHubEnabled>) -> bool {
	value.map(|v| v.enabled).unwrap_or(false)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GitHubRestrictions {
	#[serde(default)]
	pub users: Vec<GitHubLogin>,
	#[serde(default)]
	pub teams: Vec<GitHubSlug>,
	#[serde(default)]
	pub apps: Vec<GitHubSlug>,
}

impl From<GitHubRestrictions> for Restrictions {
	fn from(r: GitHubRestrictions) -> Self {
		Self {
			users: r.users.into_iter().map(|u| u.login).collect(),
			teams: r.teams.into_iter().map(|t| t.slug).collect(),
			apps: r.apps.into_iter().map(|a| a.slug).collect(),
		}
	}
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitHubStatusChecks {
	#[serde(default)]
	pub strict: bool,
	#[serde(default)]
	pub contexts: Vec<String>,
	#[serde(default)]
	pub checks: Vec<StatusCheck>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitHubPullRequestReviews {
	pub dismissal_restrictions: Option<GitHubRestrictions>,
	#[serde(default)]
	pub dismiss_stale_reviews: bool,
	#[serde(default)]
	pub require_code_owner_reviews: bool,
	#[serde(default)]
	pub required_approving_review_count: u32,
	#[serde(default)]
	pub require_last_push_approval: bool,
	pub bypass_pull_request_allowances: Option<GitHubRestrictions>,
}

/// `GET .../protection` (and the `PUT` response).
#[derive(Debug, Deserialize)]
pub(crate) struct GitHubProtectionResponse {
	pub required_status_checks: Option<GitHubStatusChecks>,
	pub enforce_admins: Option<GitHubEnabled>,
	pub required_pull_request_reviews: Option<GitHubPullRequestReviews>,
	pub restrictions: Option<GitHubRestrictions>,
	pub required_linear_history: Option<GitHubEnabled>,
	pub allow_force_pushes: Option<GitHubEnabled>,
	pub allow_deletions: Option<GitHubEnabled>,
	pub block_creations: Option<GitHubEnabled>,
	pub required_conversation_resolution: Option<GitHubEnabled>,
	pub lock_branch: Option<GitHubEnabled>,
	pub allow_fork_syncing: Option<GitHubEnabled>,
}

impl GitHubProtectionResponse {
	pub fn into_rule(self, branch_name: &str) -> BranchProtectionRule {
		let required_status_checks = self.required_status_checks.map(|s| {
			// Older GitHub Enterprise servers only report `contexts`.
			let checks = if s.checks.is_empty() {
				s.contexts.into_iter().map(StatusCheck::new).collect()
			} else {
				s.checks
			};
			RequiredStatusChecks {
				strict: s.strict,
				checks,
			}
		});

		BranchProtectionRule {
			branch_name: branch_name.to_string(),
			enforce_admins: flag(self.enforce_admins),
			required_status_checks,
			required_pull_request_reviews: self.required_pull_request_reviews.map(|p| {
				PullRequestReviews {
					dismissal_restrictions: p.dismissal_restrictions.map(Into::into),
					dismiss_stale_reviews: p.dismiss_stale_reviews,
					require_code_owner_reviews: p.require_code_owner_reviews,
					required_approving_review_count: p.required_approving_review_count,
					require_last_push_approval: p.require_last_push_approval,
					bypass_pull_request_allowances: p.bypass_pull_request_allowances.map(Into::into),
				}
			}),
			restrictions: self.restrictions.map(Into::into),
			required_linear_history: flag(self.required_linear_history),
			allow_force_pushes: flag(self.allow_force_pushes),
			allow_deletions: flag(self.allow_deletions),
			block_creations: flag(self.block_creations),
			required_conversation_resolution: flag(self.required_conversation_resolution),
			lock_branch: flag(self.lock_branch),
			allow_fork_syncing: flag(self.allow_fork_syncing),
		}
	}
}
