// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Branch protection bound to one App installation.
//!
//! Every write is a full reconciliation: read the current rule, compute the
//! desired status-check set, and `PUT` the rule back with all other fields
//! untouched. Identical calls after the first issue no write.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::client::GithubAppClient;
use crate::error::GithubAppError;
use crate::limiter::NonBlockingLimiter;
use crate::types::{BranchProtectionRule, RequiredStatusChecks, StatusCheck};

#[async_trait]
pub trait BranchProtectionEngine: Send + Sync {
	async fn default_branch(&self, owner: &str, repo: &str) -> Result<String, GithubAppError>;

	/// `None` when the branch has no protection rule.
	async fn get_protected_branch(
		&self,
		owner: &str,
		repo: &str,
		branch: &str,
	) -> Result<Option<BranchProtectionRule>, GithubAppError>;

	/// Leave the branch with admin enforcement set to `enforce_admin` and
	/// required checks equal to `(previous ∪ required) \ disabled`.
	async fn enable_branch_protection(
		&self,
		owner: &str,
		repo: &str,
		branch: &str,
		enforce_admin: bool,
		required: &[String],
		disabled: &[String],
	) -> Result<BranchProtectionRule, GithubAppError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BranchProtectionOptions {
	non_blocking_limiter: bool,
}

impl BranchProtectionOptions {
	pub fn new() -> Self {
		Self::default()
	}

	/// Drop calls over the installation's rate budget instead of waiting.
	pub fn enable_non_blocking_limiter(mut self) -> Self {
		self.non_blocking_limiter = true;
		self
	}

	pub fn non_blocking_limiter(&self) -> bool {
		self.non_blocking_limiter
	}
}

pub fn is_enforce_admin_enabled(rule: &BranchProtectionRule) -> bool {
	rule.enforce_admins
}

/// `(previous ∪ required) \ disabled`, keeping previous order then the order
/// of `required`, without duplicates.
pub fn merge_status_checks(previous: &[&str], required: &[String], disabled: &[String]) -> Vec<String> {
	let mut merged: Vec<String> = Vec::with_capacity(previous.len() + required.len());
	for name in previous
		.iter()
		.copied()
		.chain(required.iter().map(String::as_str))
	{
		if disabled.iter().any(|d| d == name) || merged.iter().any(|m| m == name) {
			continue;
		}
		merged.push(name.to_string());
	}
	merged
}

/// Apply `enforce_admin` and the merged check list to `current`. Checks that
/// survive keep their `app_id`.
fn desired_rule(
	current: Option<&BranchProtectionRule>,
	branch: &str,
	enforce_admin: bool,
	required: &[String],
	disabled: &[String],
) -> BranchProtectionRule {
	let mut rule = current
		.cloned()
		.unwrap_or_else(|| BranchProtectionRule::unprotected(branch));
	let previous = current.map(|r| r.contexts()).unwrap_or_default();
	let merged = merge_status_checks(&previous, required, disabled);

	let old_checks: &[StatusCheck] = current
		.and_then(|r| r.required_status_checks.as_ref())
		.map(|r| r.checks.as_slice())
		.unwrap_or(&[]);
	let checks: Vec<StatusCheck> = merged
		.into_iter()
		.map(|name| {
			old_checks
				.iter()
				.find(|c| c.context == name)
				.cloned()
				.unwrap_or_else(|| StatusCheck::new(name))
		})
		.collect();

	rule.required_status_checks = match rule.required_status_checks.take() {
		Some(existing) => Some(RequiredStatusChecks {
			strict: existing.strict,
			checks,
		}),
		None if checks.is_empty() => None,
		None => Some(RequiredStatusChecks {
			strict: false,
			checks,
		}),
	};
	rule.enforce_admins = enforce_admin;
	rule
}

/// [`BranchProtectionEngine`] over the GitHub REST API.
#[derive(Clone)]
pub struct BranchProtectionRepository {
	client: GithubAppClient,
	installation_id: i64,
	limiter: Option<Arc<NonBlockingLimiter>>,
}

impl BranchProtectionRepository {
	pub async fn new(
		client: GithubAppClient,
		installation_id: i64,
		options: BranchProtectionOptions,
	) -> Self {
		let limiter = if options.non_blocking_limiter() {
			Some(client.limiter_for(installation_id).await)
		} else {
			None
		};

		Self {
			client,
			installation_id,
			limiter,
		}
	}

	pub fn installation_id(&self) -> i64 {
		self.installation_id
	}

	fn admit(&self) -> Result<(), GithubAppError> {
		match &self.limiter {
			Some(limiter) => limiter.check(),
			None => Ok(()),
		}
	}
}

#[async_trait]
impl BranchProtectionEngine for BranchProtectionRepository {
	#[instrument(skip(self), fields(installation_id = self.installation_id))]
	async fn default_branch(&self, owner: &str, repo: &str) -> Result<String, GithubAppError> {
		self.admit()?;
		let repository = self
			.client
			.get_repository(self.installation_id, owner, repo)
			.await?;
		Ok(repository.default_branch)
	}

	#[instrument(skip(self), fields(installation_id = self.installation_id))]
	async fn get_protected_branch(
		&self,
		owner: &str,
		repo: &str,
		branch: &str,
	) -> Result<Option<BranchProtectionRule>, GithubAppError> {
		self.admit()?;
		self
			.client
			.get_branch_protection(self.installation_id, owner, repo, branch)
			.await
	}

	#[instrument(skip(self), fields(installation_id = self.installation_id))]
	async fn enable_branch_protection(
		&self,
		owner: &str,
		repo: &str,
		branch: &str,
		enforce_admin: bool,
		required: &[String],
		disabled: &[String],
	) -> Result<BranchProtectionRule, GithubAppError> {
		let current = self.get_protected_branch(owner, repo, branch).await?;
		let desired = desired_rule(current.as_ref(), branch, enforce_admin, required, disabled);

		if current.as_ref() == Some(&desired) {
			debug!("branch protection already in desired state");
			return Ok(desired);
		}

		self.admit()?;
		let updated = self
			.client
			.put_branch_protection(self.installation_id, owner, repo, &desired)
			.await?;

		info!(
			owner,
			repo,
			branch,
			enforce_admin,
			checks = ?updated.contexts(),
			"branch protection reconciled"
		);
		Ok(updated)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::client::tests::{repo_body, test_client};
	use crate::config::{GithubAppConfig, LimiterSettings};
	use cla_common_http::RetryConfig;
	use proptest::prelude::*;
	use serde_json::json;
	use wiremock::matchers::{body_partial_json, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn strings(names: &[&str]) -> Vec<String> {
		names.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn merge_keeps_order_and_drops_disabled() {
		let merged = merge_status_checks(
			&["ci/build", "EasyCLA", "lint"],
			&strings(&["EasyCLA", "docs"]),
			&strings(&["lint"]),
		);
		assert_eq!(merged, strings(&["ci/build", "EasyCLA", "docs"]));
	}

	#[test]
	fn disabled_wins_over_required() {
		let merged = merge_status_checks(&[], &strings(&["EasyCLA"]), &strings(&["EasyCLA"]));
		assert!(merged.is_empty());
	}

	#[test]
	fn desired_rule_preserves_other_fields() {
		let mut current = BranchProtectionRule::unprotected("main");
		current.required_linear_history = true;
		current.required_status_checks = Some(RequiredStatusChecks {
			strict: true,
			checks: vec![StatusCheck {
				context: "ci/build".to_string(),
				app_id: Some(7),
			}],
		});

		let desired = desired_rule(Some(&current), "main", true, &strings(&["EasyCLA"]), &[]);
		assert!(desired.enforce_admins);
		assert!(desired.required_linear_history);
		let checks = desired.required_status_checks.unwrap();
		assert!(checks.strict);
		assert_eq!(checks.checks[0].app_id, Some(7));
		assert_eq!(checks.checks[1], StatusCheck::new("EasyCLA"));
	}

	#[test]
	fn desired_rule_for_unprotected_branch() {
		let desired = desired_rule(None, "main", false, &strings(&["EasyCLA"]), &[]);
		assert_eq!(desired.contexts(), vec!["EasyCLA"]);
		assert!(!desired.required_status_checks.as_ref().unwrap().strict);

		let empty = desired_rule(None, "main", false, &[], &[]);
		assert!(empty.required_status_checks.is_none());
	}

	proptest! {
		#[test]
		fn merge_is_set_closure(
			previous in proptest::collection::vec("[a-d]", 0..6),
			required in proptest::collection::vec("[a-d]", 0..4),
			disabled in proptest::collection::vec("[a-d]", 0..4),
		) {
			let prev: Vec<&str> = previous.iter().map(String::as_str).collect();
			let merged = merge_status_checks(&prev, &required, &disabled);

			for name in previous.iter().chain(required.iter()) {
				prop_assert_eq!(merged.contains(name), !disabled.contains(name));
			}
			for name in &merged {
				prop_assert!(previous.contains(name) || required.contains(name));
			}
			let mut deduped = merged.clone();
			deduped.dedup();
			prop_assert_eq!(deduped.len(), merged.len());
		}
	}

	fn protected_body(contexts: &[&str], enforce_admins: bool) -> serde_json::Value {
		json!({
			"required_status_checks": {"strict": true, "contexts": contexts},
			"enforce_admins": {"enabled": enforce_admins},
			"required_linear_history": {"enabled": true}
		})
	}

	#[tokio::test]
	async fn enable_writes_merged_rule() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/repos/acme/widgets/branches/main/protection"))
			.respond_with(ResponseTemplate::new(200).set_body_json(protected_body(&["ci/build"], false)))
			.mount(&server)
			.await;
		Mock::given(method("PUT"))
			.and(path("/repos/acme/widgets/branches/main/protection"))
			.and(body_partial_json(json!({
				"enforce_admins": true,
				"required_linear_history": true,
				"required_status_checks": {
					"strict": true,
					"checks": [{"context": "ci/build"}, {"context": "EasyCLA"}]
				}
			})))
			.respond_with(
				ResponseTemplate::new(200).set_body_json(protected_body(&["ci/build", "EasyCLA"], true)),
			)
			.expect(1)
			.mount(&server)
			.await;

		let client = test_client(&server).await;
		let engine = BranchProtectionRepository::new(client, 17, BranchProtectionOptions::new()).await;
		let rule = engine
			.enable_branch_protection("acme", "widgets", "main", true, &strings(&["EasyCLA"]), &[])
			.await
			.unwrap();

		assert!(is_enforce_admin_enabled(&rule));
		assert_eq!(rule.contexts(), vec!["ci/build", "EasyCLA"]);
	}

	#[tokio::test]
	async fn enable_skips_write_when_rule_matches() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/repos/acme/widgets/branches/main/protection"))
			.respond_with(ResponseTemplate::new(200).set_body_json(protected_body(&["EasyCLA"], true)))
			.mount(&server)
			.await;
		Mock::given(method("PUT"))
			.respond_with(ResponseTemplate::new(500))
			.expect(0)
			.mount(&server)
			.await;

		let client = test_client(&server).await;
		let engine = BranchProtectionRepository::new(client, 17, BranchProtectionOptions::new()).await;
		let rule = engine
			.enable_branch_protection("acme", "widgets", "main", true, &strings(&["EasyCLA"]), &[])
			.await
			.unwrap();
		assert_eq!(rule.contexts(), vec!["EasyCLA"]);
	}

	#[tokio::test]
	async fn default_branch_comes_from_repository() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/repos/acme/widgets"))
			.respond_with(ResponseTemplate::new(200).set_body_json(repo_body(42, "acme/widgets")))
			.mount(&server)
			.await;

		let client = test_client(&server).await;
		let engine = BranchProtectionRepository::new(client, 17, BranchProtectionOptions::new()).await;
		assert_eq!(engine.default_branch("acme", "widgets").await.unwrap(), "main");
	}

	#[tokio::test]
	async fn limiter_drops_excess_calls() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/repos/acme/widgets/branches/main/protection"))
			.respond_with(ResponseTemplate::new(200).set_body_json(protected_body(&[], false)))
			.expect(1)
			.mount(&server)
			.await;

		let config = GithubAppConfig::new(1, "unused")
			.with_test_base_url(&server.uri())
			.with_retry_config(RetryConfig::no_retry())
			.with_limiter(LimiterSettings {
				rate_per_sec: 0.0,
				burst: 1,
			});
		let client = GithubAppClient::new(config).unwrap();
		client.seed_installation_token(17, "inst-token").await;

		let options = BranchProtectionOptions::new().enable_non_blocking_limiter();
		let engine = BranchProtectionRepository::new(client, 17, options).await;

		assert!(engine
			.get_protected_branch("acme", "widgets", "main")
			.await
			.unwrap()
			.is_some());
		let err = engine
			.get_protected_branch("acme", "widgets", "main")
			.await
			.unwrap_err();
		assert!(matches!(err, GithubAppError::LimiterDropped));
	}
}
