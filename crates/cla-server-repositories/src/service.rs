// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The repository linker.
//!
//! Every outbound call goes through [`RequestContext::run`], so a cancelled
//! request stops at the next suspension point without compensating writes.

use std::future::Future;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use cla_common_core::{is_allowed_status_check, RequestContext, REPOSITORY_TYPE_GITHUB};
use cla_server_db::{
	GithubOrgRecord, GithubOrgStore, NewGithubRepository, ProjectClaGroupStore, RepositoryRecord,
	RepositoryStore, RepositoryUpdate,
};
use cla_server_github_app::{
	clean_repo_name, BranchProtectionEngine, BranchProtectionOptions, CodeHost,
};
use cla_server_project_service::ProjectCatalog;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::types::{
	BranchProtectionView, DisableSweepReport, LinkRepositoriesInput, SweepMode,
	UpdateBranchProtectionInput,
};

/// Run `fut` under `ctx`, folding both layers of error into
/// [`RepositoryError`].
async fn call<T, E, F>(ctx: &RequestContext, fut: F) -> Result<T, RepositoryError>
where
	F: Future<Output = Result<T, E>>,
	RepositoryError: From<E>,
{
	Ok(ctx.run(fut).await??)
}

/// Resolved prologue of the branch-protection operations.
struct ProtectionTarget {
	engine: Arc<dyn BranchProtectionEngine>,
	owner: String,
	repo: String,
}

pub struct RepositoriesService {
	catalog: Arc<dyn ProjectCatalog>,
	orgs: Arc<dyn GithubOrgStore>,
	repositories: Arc<dyn RepositoryStore>,
	mappings: Arc<dyn ProjectClaGroupStore>,
	code_host: Arc<dyn CodeHost>,
	non_blocking_limiter: bool,
}

impl RepositoriesService {
	pub fn new(
		catalog: Arc<dyn ProjectCatalog>,
		orgs: Arc<dyn GithubOrgStore>,
		repositories: Arc<dyn RepositoryStore>,
		mappings: Arc<dyn ProjectClaGroupStore>,
		code_host: Arc<dyn CodeHost>,
	) -> Self {
		Self {
			catalog,
			orgs,
			repositories,
			mappings,
			code_host,
			non_blocking_limiter: false,
		}
	}

	/// Build branch-protection engines that drop calls over the installation's
	/// rate budget.
	pub fn with_non_blocking_limiter(mut self, enabled: bool) -> Self {
		self.non_blocking_limiter = enabled;
		self
	}

	// =========================================================================
	// Linking
	// =========================================================================

	/// Link GitHub repositories to a project's CLA group. Returns the records
	/// that were inserted or re-enabled; repositories already enabled are
	/// skipped.
	///
	/// Stops at the first failure. Records written before it stay written;
	/// calling again with the same input converges.
	#[instrument(
		skip(self, ctx, input),
		fields(
			request_id = %ctx.request_id(),
			cla_group_id = %input.cla_group_id,
			organization = %input.organization_name,
		)
	)]
	pub async fn link_repositories(
		&self,
		ctx: &RequestContext,
		project_sfid: &str,
		input: &LinkRepositoriesInput,
	) -> Result<Vec<RepositoryRecord>, RepositoryError> {
		let external_ids = input
			.external_ids()
			.into_iter()
			.map(|raw| {
				raw.parse::<i64>()
					.map_err(|_| RepositoryError::BadExternalId(raw.to_string()))
			})
			.collect::<Result<Vec<_>, _>>()?;

		let project = call(ctx, self.catalog.get_project(ctx, project_sfid)).await?;
		let parent_sfid = project.effective_parent_sfid().to_string();

		let mappings = call(
			ctx,
			self.mappings
				.get_projects_ids_for_cla_group(&input.cla_group_id),
		)
		.await?;
		if !mappings.iter().any(|m| m.links_project(project_sfid)) {
			warn!("project is not associated with the CLA group");
			return Err(RepositoryError::tenancy(
				project_sfid,
				format!("CLA group {}", input.cla_group_id),
			));
		}

		let org = self.installed_org(ctx, &input.organization_name).await?;
		let installation_id = installation_id(&org)?;

		let mut linked = Vec::new();
		for external_id in external_ids {
			let hydrated = call(
				ctx,
				self.code_host
					.get_repository_by_external_id(installation_id, external_id),
			)
			.await?;

			let existing = call(
				ctx,
				self.repositories.get_repository_by_name(&hydrated.full_name),
			)
			.await?;

			match existing {
				None => {
					let record = call(
						ctx,
						self.repositories.add_github_repository(
							&parent_sfid,
							project_sfid,
							&NewGithubRepository {
								external_id: external_id.to_string(),
								name: hydrated.full_name.clone(),
								url: hydrated.html_url.clone(),
								repository_type: REPOSITORY_TYPE_GITHUB.to_string(),
								organization_name: org.organization_name.clone(),
								cla_group_id: input.cla_group_id.clone(),
							},
						),
					)
					.await?;
					info!(repository_id = %record.repository_id, name = %record.name, "repository linked");
					linked.push(record);
				}
				Some(record) if !record.enabled => {
					let update = RepositoryUpdate {
						enabled: Some(true),
						organization_name: Some(org.organization_name.clone()),
						cla_group_id: Some(input.cla_group_id.clone()),
						note: Some(reenable_note()),
					};
					let record = call(
						ctx,
						self.repositories
							.update_github_repository(record.repository_id, &update),
					)
					.await?;
					info!(repository_id = %record.repository_id, name = %record.name, "repository re-enabled");
					linked.push(record);
				}
				Some(record) => {
					debug!(repository_id = %record.repository_id, name = %record.name, "repository already enabled");
				}
			}
		}

		Ok(linked)
	}

	async fn installed_org(
		&self,
		ctx: &RequestContext,
		name: &str,
	) -> Result<GithubOrgRecord, RepositoryError> {
		let mut orgs = call(ctx, self.orgs.get_by_name(name)).await?;
		if orgs.is_empty() {
			warn!(organization = name, "organization not found");
			return Err(RepositoryError::OrganizationNotInstalled(name.to_string()));
		}
		Ok(orgs.swap_remove(0))
	}

	// =========================================================================
	// Lookups and toggles
	// =========================================================================

	/// Enabled repositories of a project that exists in the catalog.
	#[instrument(skip(self, ctx), fields(request_id = %ctx.request_id()))]
	pub async fn list_project_repositories(
		&self,
		ctx: &RequestContext,
		project_sfid: &str,
	) -> Result<Vec<RepositoryRecord>, RepositoryError> {
		call(ctx, self.catalog.get_project(ctx, project_sfid)).await?;
		call(
			ctx,
			self.repositories
				.list_project_repositories(project_sfid, Some(true)),
		)
		.await
	}

	#[instrument(skip(self, ctx), fields(request_id = %ctx.request_id()))]
	pub async fn get_repository(
		&self,
		ctx: &RequestContext,
		repository_id: Uuid,
	) -> Result<RepositoryRecord, RepositoryError> {
		call(ctx, self.repositories.get_repository(repository_id))
			.await?
			.ok_or_else(|| RepositoryError::RepositoryNotFound(repository_id.to_string()))
	}

	#[instrument(skip(self, ctx), fields(request_id = %ctx.request_id()))]
	pub async fn get_repository_by_name(
		&self,
		ctx: &RequestContext,
		name: &str,
	) -> Result<RepositoryRecord, RepositoryError> {
		call(ctx, self.repositories.get_repository_by_name(name))
			.await?
			.ok_or_else(|| RepositoryError::RepositoryNotFound(name.to_string()))
	}

	#[instrument(skip(self, ctx), fields(request_id = %ctx.request_id()))]
	pub async fn enable_repository(
		&self,
		ctx: &RequestContext,
		repository_id: Uuid,
	) -> Result<(), RepositoryError> {
		call(ctx, self.repositories.enable_repository(repository_id)).await?;
		info!("repository enabled");
		Ok(())
	}

	#[instrument(skip(self, ctx), fields(request_id = %ctx.request_id()))]
	pub async fn disable_repository(
		&self,
		ctx: &RequestContext,
		repository_id: Uuid,
	) -> Result<(), RepositoryError> {
		call(ctx, self.repositories.disable_repository(repository_id)).await?;
		info!("repository disabled");
		Ok(())
	}

	/// Disable every enabled repository of a CLA group.
	///
	/// In [`SweepMode::BestEffort`] a failing repository is logged and
	/// skipped; only cancellation stops the sweep. [`SweepMode::Strict`]
	/// returns the first failure.
	#[instrument(skip(self, ctx), fields(request_id = %ctx.request_id()))]
	pub async fn disable_cla_group_repositories(
		&self,
		ctx: &RequestContext,
		cla_group_id: &str,
		mode: SweepMode,
	) -> Result<DisableSweepReport, RepositoryError> {
		let buckets = call(
			ctx,
			self.repositories
				.get_cla_group_repositories_group_by_orgs(cla_group_id, true),
		)
		.await?;

		let mut report = DisableSweepReport::default();
		for bucket in &buckets {
			for repository in &bucket.repositories {
				let result = call(
					ctx,
					self.repositories.disable_repository(repository.repository_id),
				)
				.await;
				match result {
					Ok(()) => report.disabled += 1,
					Err(RepositoryError::Cancelled) => return Err(RepositoryError::Cancelled),
					Err(e) if mode == SweepMode::Strict => return Err(e),
					Err(e) => {
						warn!(
							repository_id = %repository.repository_id,
							organization = %bucket.organization_name,
							error = %e,
							"failed to disable repository"
						);
						report.failed += 1;
						report.failed_repository_ids.push(repository.repository_id);
					}
				}
			}
		}

		info!(
			disabled = report.disabled,
			failed = report.failed,
			"CLA group repositories disabled"
		);
		Ok(report)
	}

	// =========================================================================
	// Branch protection
	// =========================================================================

	async fn protection_target(
		&self,
		ctx: &RequestContext,
		project_sfid: &str,
		repository_id: Uuid,
	) -> Result<(RepositoryRecord, ProtectionTarget), RepositoryError> {
		call(ctx, self.catalog.get_project(ctx, project_sfid)).await?;

		let repository = self.get_repository(ctx, repository_id).await?;
		if repository.project_sfid != project_sfid {
			warn!(owner_project = %repository.project_sfid, "repository belongs to another project");
			return Err(RepositoryError::tenancy(
				project_sfid,
				format!("repository {repository_id}"),
			));
		}

		let org = call(ctx, self.orgs.get_one(&repository.organization_name))
			.await?
			.ok_or_else(|| {
				RepositoryError::OrganizationNotInstalled(repository.organization_name.clone())
			})?;
		let installation_id = installation_id(&org)?;

		let mut options = BranchProtectionOptions::new();
		if self.non_blocking_limiter {
			options = options.enable_non_blocking_limiter();
		}
		let engine = ctx
			.run(self.code_host.branch_protection(installation_id, options))
			.await?;

		let repo = clean_repo_name(&repository.name).to_string();
		let owner = call(
			ctx,
			self.code_host
				.get_owner_name(installation_id, &org.organization_name, &repo),
		)
		.await?;
		if owner.is_empty() {
			return Err(RepositoryError::NotFound(format!(
				"owner of repository {}",
				repository.name
			)));
		}

		Ok((repository, ProtectionTarget { engine, owner, repo }))
	}

	async fn resolve_branch(
		ctx: &RequestContext,
		target: &ProtectionTarget,
		branch: Option<&str>,
	) -> Result<String, RepositoryError> {
		match branch.map(str::trim).filter(|b| !b.is_empty()) {
			Some(branch) => Ok(branch.to_string()),
			None => call(ctx, target.engine.default_branch(&target.owner, &target.repo)).await,
		}
	}

	async fn read_protection(
		ctx: &RequestContext,
		target: &ProtectionTarget,
		branch: &str,
	) -> Result<BranchProtectionView, RepositoryError> {
		let rule = call(
			ctx,
			target
				.engine
				.get_protected_branch(&target.owner, &target.repo, branch),
		)
		.await?;
		Ok(match rule {
			Some(rule) => BranchProtectionView::from_rule(&rule),
			None => BranchProtectionView::unprotected(branch),
		})
	}

	/// The protection state of `branch`, or of the default branch when blank.
	#[instrument(skip(self, ctx), fields(request_id = %ctx.request_id()))]
	pub async fn get_protected_branch(
		&self,
		ctx: &RequestContext,
		project_sfid: &str,
		repository_id: Uuid,
		branch: Option<&str>,
	) -> Result<BranchProtectionView, RepositoryError> {
		let (_, target) = self
			.protection_target(ctx, project_sfid, repository_id)
			.await?;
		let branch = Self::resolve_branch(ctx, &target, branch).await?;
		Self::read_protection(ctx, &target, &branch).await
	}

	/// Reconcile a branch's protection with `input` and read it back.
	#[instrument(skip(self, ctx, input), fields(request_id = %ctx.request_id()))]
	pub async fn update_protected_branch(
		&self,
		ctx: &RequestContext,
		project_sfid: &str,
		repository_id: Uuid,
		input: &UpdateBranchProtectionInput,
	) -> Result<BranchProtectionView, RepositoryError> {
		if let Some(bad) = input
			.status_checks
			.iter()
			.find(|c| !is_allowed_status_check(&c.name))
		{
			warn!(check = %bad.name, "rejected status check");
			return Err(RepositoryError::InvalidBranchProtectionName(
				bad.name.clone(),
			));
		}
		let (required, disabled) = input.partition_checks();

		let (repository, target) = self
			.protection_target(ctx, project_sfid, repository_id)
			.await?;
		let branch = Self::resolve_branch(ctx, &target, input.branch()).await?;

		call(
			ctx,
			target.engine.enable_branch_protection(
				&target.owner,
				&target.repo,
				&branch,
				input.enforce_admin,
				&required,
				&disabled,
			),
		)
		.await?;
		info!(repository = %repository.name, branch = %branch, "branch protection updated");

		Self::read_protection(ctx, &target, &branch).await
	}
}

fn installation_id(org: &GithubOrgRecord) -> Result<i64, RepositoryError> {
	org.usable_installation_id().ok_or_else(|| {
		warn!(organization = %org.organization_name, "GitHub App not installed");
		RepositoryError::OrganizationNotInstalled(org.organization_name.clone())
	})
}

pub(crate) fn reenable_note() -> String {
	format!(
		"re-enabling repository on {}",
		Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reenable_note_is_rfc3339_utc() {
		let note = reenable_note();
		let stamp = note.strip_prefix("re-enabling repository on ").unwrap();
		assert!(stamp.ends_with('Z'));
		assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
	}
}
