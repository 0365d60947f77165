// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use cla_common_core::ContextError;
use cla_server_db::DbError;
use cla_server_github_app::GithubAppError;
use cla_server_project_service::ProjectServiceError;
use thiserror::Error;

/// Everything the linker reports to its callers.
///
/// Lower-level errors fold into these kinds; anything worth retrying becomes
/// `Transient` with the underlying message.
#[derive(Debug, Error)]
pub enum RepositoryError {
	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Repository not found: {0}")]
	RepositoryNotFound(String),

	#[error("GitHub App is not installed on organization {0}")]
	OrganizationNotInstalled(String),

	#[error("Project {project_sfid} is not associated with {resource}")]
	TenancyViolation {
		project_sfid: String,
		resource: String,
	},

	#[error("Invalid branch protection status check: {0}")]
	InvalidBranchProtectionName(String),

	#[error("Invalid repository external id: {0:?}")]
	BadExternalId(String),

	#[error("Policy violation: {0}")]
	PolicyViolation(String),

	#[error("Transient failure: {0}")]
	Transient(String),

	#[error("Request cancelled")]
	Cancelled,
}

impl RepositoryError {
	pub fn tenancy(project_sfid: &str, resource: impl Into<String>) -> Self {
		RepositoryError::TenancyViolation {
			project_sfid: project_sfid.to_string(),
			resource: resource.into(),
		}
	}

	pub fn is_transient(&self) -> bool {
		matches!(self, RepositoryError::Transient(_))
	}
}

impl From<ContextError> for RepositoryError {
	fn from(e: ContextError) -> Self {
		match e {
			ContextError::Cancelled => RepositoryError::Cancelled,
			ContextError::DeadlineExceeded => RepositoryError::Transient(e.to_string()),
		}
	}
}

impl From<DbError> for RepositoryError {
	fn from(e: DbError) -> Self {
		match e {
			DbError::NotFound(what) => RepositoryError::RepositoryNotFound(what),
			other => RepositoryError::Transient(other.to_string()),
		}
	}
}

impl From<ProjectServiceError> for RepositoryError {
	fn from(e: ProjectServiceError) -> Self {
		match e {
			ProjectServiceError::NotFound(sfid) => {
				RepositoryError::NotFound(format!("project {sfid}"))
			}
			ProjectServiceError::PolicyViolation(msg) => RepositoryError::PolicyViolation(msg),
			ProjectServiceError::Cancelled => RepositoryError::Cancelled,
			other => RepositoryError::Transient(other.to_string()),
		}
	}
}

impl From<GithubAppError> for RepositoryError {
	fn from(e: GithubAppError) -> Self {
		match e {
			GithubAppError::BranchNotFound { .. } => RepositoryError::NotFound(e.to_string()),
			e if e.is_not_found() => RepositoryError::NotFound(e.to_string()),
			other => RepositoryError::Transient(other.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn context_errors() {
		assert!(matches!(
			RepositoryError::from(ContextError::Cancelled),
			RepositoryError::Cancelled
		));
		assert!(RepositoryError::from(ContextError::DeadlineExceeded).is_transient());
	}

	#[test]
	fn limiter_drop_is_transient() {
		assert!(RepositoryError::from(GithubAppError::LimiterDropped).is_transient());
		assert!(RepositoryError::from(GithubAppError::RateLimited).is_transient());
	}

	#[test]
	fn github_404_is_not_found() {
		let err = RepositoryError::from(GithubAppError::ApiError {
			status: 404,
			message: "Not Found".into(),
		});
		assert!(matches!(err, RepositoryError::NotFound(_)));
	}

	#[test]
	fn store_not_found_is_repository_not_found() {
		let err = RepositoryError::from(DbError::NotFound("repository r1".into()));
		assert!(matches!(err, RepositoryError::RepositoryNotFound(_)));
		assert!(RepositoryError::from(DbError::Conflict("dup".into())).is_transient());
	}

	#[test]
	fn catalog_errors() {
		assert!(matches!(
			RepositoryError::from(ProjectServiceError::NotFound("P9".into())),
			RepositoryError::NotFound(_)
		));
		assert!(matches!(
			RepositoryError::from(ProjectServiceError::PolicyViolation("root".into())),
			RepositoryError::PolicyViolation(_)
		));
		assert!(RepositoryError::from(ProjectServiceError::Timeout).is_transient());
	}

	#[test]
	fn tenancy_message_names_both_ids() {
		let msg = RepositoryError::tenancy("P1", "CLA group G1").to_string();
		assert!(msg.contains("P1"));
		assert!(msg.contains("G1"));
	}
}
