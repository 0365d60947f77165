// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use cla_common_core::RequestContext;

use crate::client::ProjectServiceClient;
use crate::error::ProjectServiceError;
use crate::types::Project;

/// Catalog reads the repository linker depends on.
#[async_trait]
pub trait ProjectCatalog: Send + Sync {
	async fn get_project(
		&self,
		ctx: &RequestContext,
		sfid: &str,
	) -> Result<Project, ProjectServiceError>;
}

#[async_trait]
impl ProjectCatalog for ProjectServiceClient {
	async fn get_project(
		&self,
		ctx: &RequestContext,
		sfid: &str,
	) -> Result<Project, ProjectServiceError> {
		ctx.run(ProjectServiceClient::get_project(self, sfid)).await?
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::client::tests::{project_body, test_client};
	use serde_json::json;
	use std::sync::Arc;
	use std::time::Duration;
	use wiremock::matchers::{method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	#[tokio::test]
	async fn catalog_seam_reads_through_client() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/projects/P1"))
			.respond_with(
				ResponseTemplate::new(200)
					.set_body_json(project_body("P1", "Kubernetes", None, json!([]))),
			)
			.mount(&server)
			.await;

		let catalog: Arc<dyn ProjectCatalog> = Arc::new(test_client(&server));
		let project = catalog.get_project(&RequestContext::new(), "P1").await.unwrap();
		assert_eq!(project.name, "Kubernetes");
	}

	#[tokio::test]
	async fn slow_catalog_hits_deadline() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/projects/P1"))
			.respond_with(
				ResponseTemplate::new(200)
					.set_body_json(project_body("P1", "Kubernetes", None, json!([])))
					.set_delay(Duration::from_millis(500)),
			)
			.mount(&server)
			.await;

		let ctx = RequestContext::with_timeout(Duration::from_millis(50));
		let client = test_client(&server);
		let err = ProjectCatalog::get_project(&client, &ctx, "P1")
			.await
			.unwrap_err();
		assert!(matches!(err, ProjectServiceError::Timeout));
	}
}
