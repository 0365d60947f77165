// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use crate::branch_protection::{
	BranchProtectionEngine, BranchProtectionOptions, BranchProtectionRepository,
};
use crate::client::GithubAppClient;
use crate::error::GithubAppError;
use crate::types::Repository;

/// The slice of the code host the repository linker needs. Every call acts
/// as an App installation.
#[async_trait]
pub trait CodeHost: Send + Sync {
	async fn get_repository_by_external_id(
		&self,
		installation_id: i64,
		external_id: i64,
	) -> Result<Repository, GithubAppError>;

	/// Canonical owner login for `org/repo`. May be empty; callers reject
	/// that.
	async fn get_owner_name(
		&self,
		installation_id: i64,
		org: &str,
		repo: &str,
	) -> Result<String, GithubAppError>;

	async fn branch_protection(
		&self,
		installation_id: i64,
		options: BranchProtectionOptions,
	) -> Arc<dyn BranchProtectionEngine>;
}

#[async_trait]
impl CodeHost for GithubAppClient {
	async fn get_repository_by_external_id(
		&self,
		installation_id: i64,
		external_id: i64,
	) -> Result<Repository, GithubAppError> {
		self.get_repository_by_id(installation_id, external_id).await
	}

	#[instrument(skip(self))]
	async fn get_owner_name(
		&self,
		installation_id: i64,
		org: &str,
		repo: &str,
	) -> Result<String, GithubAppError> {
		let repository = self.get_repository(installation_id, org, repo).await?;
		Ok(repository.owner_login)
	}

	async fn branch_protection(
		&self,
		installation_id: i64,
		options: BranchProtectionOptions,
	) -> Arc<dyn BranchProtectionEngine> {
		Arc::new(BranchProtectionRepository::new(self.clone(), installation_id, options).await)
	}
}

/// `owner/repo` to `repo`. Names without a slash pass through.
pub fn clean_repo_name(full_name: &str) -> &str {
	match full_name.rsplit_once('/') {
		Some((_, repo)) => repo,
		None => full_name,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::client::tests::{repo_body, test_client};
	use proptest::prelude::*;
	use wiremock::matchers::{method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	#[test]
	fn clean_repo_name_strips_owner() {
		assert_eq!(clean_repo_name("acme/widgets"), "widgets");
		assert_eq!(clean_repo_name("widgets"), "widgets");
		assert_eq!(clean_repo_name(""), "");
	}

	proptest! {
		#[test]
		fn cleaned_name_has_no_slash(owner in "[a-z0-9-]{1,10}", repo in "[a-z0-9._-]{1,10}") {
			let full = format!("{owner}/{repo}");
			prop_assert_eq!(clean_repo_name(&full), repo.as_str());
		}
	}

	#[tokio::test]
	async fn owner_name_is_canonical_login() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/repos/ACME/widgets"))
			.respond_with(ResponseTemplate::new(200).set_body_json(repo_body(42, "acme/widgets")))
			.mount(&server)
			.await;

		let client = test_client(&server).await;
		let host: &dyn CodeHost = &client;
		assert_eq!(host.get_owner_name(17, "ACME", "widgets").await.unwrap(), "acme");
	}

	#[tokio::test]
	async fn engine_is_bound_to_installation() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/repos/acme/widgets"))
			.respond_with(ResponseTemplate::new(200).set_body_json(repo_body(42, "acme/widgets")))
			.mount(&server)
			.await;

		let client = test_client(&server).await;
		let engine = client
			.branch_protection(17, BranchProtectionOptions::new())
			.await;
		assert_eq!(engine.default_branch("acme", "widgets").await.unwrap(), "main");
	}
}
