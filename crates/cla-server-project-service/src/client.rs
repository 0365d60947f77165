// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client for the foundation's project catalog.

use std::sync::Arc;
use std::time::Duration;

use cla_common_core::{RequestContext, CLA_SERVICE, NO_SERVICES_SENTINEL};
use cla_common_http::{retry, RetryConfig};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::ProjectCache;
use crate::error::ProjectServiceError;
use crate::token::TokenProvider;
use crate::types::{EnabledServicesUpdate, ListEnvelope, Project, ProjectSummary};

const SUMMARY_PAGE_SIZE: &str = "100";

/// Catalog client with a bounded per-instance project cache.
///
/// Clones share the HTTP client, the token provider and the cache. Use
/// [`ProjectServiceClient::scoped`] for a client with its own cache.
#[derive(Clone)]
pub struct ProjectServiceClient {
	http: Client,
	base_url: Url,
	tokens: Arc<dyn TokenProvider>,
	retry_config: RetryConfig,
	cache: Arc<ProjectCache>,
}

impl ProjectServiceClient {
	pub fn new(
		base_url: &str,
		tokens: Arc<dyn TokenProvider>,
		cache_capacity: usize,
		timeout: Duration,
	) -> Result<Self, ProjectServiceError> {
		let base_url = normalize_base_url(base_url)?;
		let http = cla_common_http::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| ProjectServiceError::Config(format!("Failed to create HTTP client: {e}")))?;

		info!(base_url = %base_url, cache_capacity, "Created project service client");

		Ok(Self {
			http,
			base_url,
			tokens,
			retry_config: RetryConfig::default(),
			cache: Arc::new(ProjectCache::new(cache_capacity)),
		})
	}

	pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
		self.retry_config = retry_config;
		self
	}

	/// Same HTTP client and token provider, empty cache of the same capacity.
	pub fn scoped(&self) -> Self {
		Self {
			cache: Arc::new(ProjectCache::new(self.cache.capacity())),
			..self.clone()
		}
	}

	pub fn cache(&self) -> &ProjectCache {
		&self.cache
	}

	pub async fn clear_cache(&self) {
		self.cache.clear().await;
	}

	// =========================================================================
	// Requests
	// =========================================================================

	async fn request<T: DeserializeOwned>(
		&self,
		method: Method,
		path: &str,
		query: &[(&str, &str)],
		body: Option<&serde_json::Value>,
	) -> Result<T, ProjectServiceError> {
		retry(&self.retry_config, || {
			self.request_once(method.clone(), path, query, body)
		})
		.await
	}

	async fn request_once<T: DeserializeOwned>(
		&self,
		method: Method,
		path: &str,
		query: &[(&str, &str)],
		body: Option<&serde_json::Value>,
	) -> Result<T, ProjectServiceError> {
		let url = self
			.base_url
			.join(path)
			.map_err(|e| ProjectServiceError::Config(format!("Invalid URL: {e}")))?;
		let token = self.tokens.token().await?;

		debug!(method = %method, url = %url, "Sending catalog request");

		let mut request = self
			.http
			.request(method, url)
			.bearer_auth(token.expose())
			.header("Accept", "application/json");
		if !query.is_empty() {
			request = request.query(query);
		}
		if let Some(body) = body {
			request = request.json(body);
		}

		let response = request.send().await.map_err(|e| {
			if e.is_timeout() {
				return ProjectServiceError::Timeout;
			}
			ProjectServiceError::Network(e)
		})?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			let err = map_catalog_error(status, &body);
			if matches!(err, ProjectServiceError::Unauthorized) {
				self.tokens.invalidate().await;
			}
			return Err(err);
		}

		response.json().await.map_err(|e| {
			error!(error = %e, path, "Failed to parse catalog response");
			ProjectServiceError::InvalidResponse(format!("JSON parse error: {e}"))
		})
	}

	async fn fetch_project(&self, sfid: &str) -> Result<Project, ProjectServiceError> {
		let path = project_path(sfid);
		self.request::<Project>(Method::GET, &path, &[], None)
			.await
			.map_err(|e| match e {
				ProjectServiceError::ApiError { status: 404, .. } => {
					ProjectServiceError::NotFound(sfid.to_string())
				}
				other => other,
			})
	}

	// =========================================================================
	// Projects
	// =========================================================================

	/// `GET projects/{sfid}`, memoized by sfid.
	#[instrument(skip(self))]
	pub async fn get_project(&self, sfid: &str) -> Result<Project, ProjectServiceError> {
		if let Some(project) = self.cache.get(sfid).await {
			debug!("Project cache hit");
			return Ok(project);
		}

		debug!("Project cache miss");
		let project = self.fetch_project(sfid).await?;
		self.cache.insert(sfid, project.clone()).await;
		Ok(project)
	}

	/// Effective parent sfid; the input sfid when the project stands alone.
	#[instrument(skip(self))]
	pub async fn get_parent_project(&self, sfid: &str) -> Result<String, ProjectServiceError> {
		let project = self.get_project(sfid).await?;
		Ok(project.effective_parent_sfid().to_string())
	}

	/// The effective parent record, or `None` when the project stands alone.
	/// The parent is cached under the project's own `parent` sfid.
	#[instrument(skip(self))]
	pub async fn get_parent_project_model(
		&self,
		sfid: &str,
	) -> Result<Option<Project>, ProjectServiceError> {
		let project = self.get_project(sfid).await?;
		match project.effective_parent() {
			Some(parent_sfid) => Ok(Some(self.get_project(parent_sfid).await?)),
			None => Ok(None),
		}
	}

	#[instrument(skip(self))]
	pub async fn is_the_linux_foundation(&self, sfid: &str) -> Result<bool, ProjectServiceError> {
		Ok(self.get_project(sfid).await?.is_root())
	}

	#[instrument(skip(self))]
	pub async fn is_parent_the_linux_foundation(
		&self,
		sfid: &str,
	) -> Result<bool, ProjectServiceError> {
		let project = self.get_project(sfid).await?;
		match project.parent_sfid() {
			Some(parent) => Ok(self.get_project(parent).await?.is_root()),
			None => Ok(false),
		}
	}

	/// Add the CLA tag to the project's enabled services. Root projects are
	/// refused without a write.
	#[instrument(skip(self))]
	pub async fn enable_cla_service(&self, sfid: &str) -> Result<(), ProjectServiceError> {
		let project = self.fetch_project(sfid).await?;
		if project.is_root() {
			warn!(name = %project.name, "Refusing to enable CLA on a foundation root");
			return Err(ProjectServiceError::PolicyViolation(format!(
				"CLA cannot be enabled on {}",
				project.name
			)));
		}
		if project.has_cla_service() {
			debug!("CLA already enabled");
			return Ok(());
		}

		let mut services: Vec<String> = project
			.enabled_services
			.into_iter()
			.filter(|s| s != NO_SERVICES_SENTINEL)
			.collect();
		services.push(CLA_SERVICE.to_string());
		self.write_enabled_services(sfid, services).await?;
		info!("CLA service enabled");
		Ok(())
	}

	/// Remove the CLA tag from the project's enabled services.
	#[instrument(skip(self))]
	pub async fn disable_cla_service(&self, sfid: &str) -> Result<(), ProjectServiceError> {
		let project = self.fetch_project(sfid).await?;
		if !project.has_cla_service() {
			debug!("CLA already disabled");
			return Ok(());
		}

		let services: Vec<String> = project
			.enabled_services
			.into_iter()
			.filter(|s| s != CLA_SERVICE)
			.collect();
		self.write_enabled_services(sfid, services).await?;
		info!("CLA service disabled");
		Ok(())
	}

	async fn write_enabled_services(
		&self,
		sfid: &str,
		mut services: Vec<String>,
	) -> Result<(), ProjectServiceError> {
		// the catalog rejects an empty list
		if services.is_empty() {
			services.push(NO_SERVICES_SENTINEL.to_string());
		}
		let body = serde_json::to_value(EnabledServicesUpdate {
			enabled_services: &services,
		})
		.map_err(|e| ProjectServiceError::InvalidResponse(format!("JSON encode error: {e}")))?;

		let result: Result<serde_json::Value, _> = self
			.request(Method::PUT, &project_path(sfid), &[], Some(&body))
			.await;
		self.cache.invalidate(sfid).await;
		result.map(|_| ())
	}

	/// The catalog's tree slice rooted at `sfid`. Aborts when `ctx` is
	/// cancelled or past its deadline.
	#[instrument(skip(self, ctx), fields(request_id = %ctx.request_id()))]
	pub async fn get_summary(
		&self,
		ctx: &RequestContext,
		sfid: &str,
	) -> Result<Vec<ProjectSummary>, ProjectServiceError> {
		let filter = format!("id eq {sfid}");
		let query = [
			("$filter", filter.as_str()),
			("offset", "0"),
			("pageSize", SUMMARY_PAGE_SIZE),
			("orderBy", "createddate"),
			("view", "pcc"),
		];

		let envelope: ListEnvelope<ProjectSummary> = ctx
			.run(self.request(Method::GET, "projects/summary", &query, None))
			.await??;
		Ok(envelope.data)
	}

	#[instrument(skip(self))]
	pub async fn search_projects_by_name(
		&self,
		name: &str,
	) -> Result<Vec<Project>, ProjectServiceError> {
		let envelope: ListEnvelope<Project> = self
			.request(Method::GET, "projects/search", &[("name", name)], None)
			.await?;
		Ok(envelope.data)
	}
}

fn normalize_base_url(raw: &str) -> Result<Url, ProjectServiceError> {
	let with_slash = if raw.ends_with('/') {
		raw.to_string()
	} else {
		format!("{raw}/")
	};
	Url::parse(&with_slash)
		.map_err(|e| ProjectServiceError::Config(format!("Invalid base URL {raw}: {e}")))
}

fn project_path(sfid: &str) -> String {
	format!("projects/{}", urlencoding::encode(sfid))
}

pub(crate) fn map_catalog_error(status: StatusCode, body: &str) -> ProjectServiceError {
	let status_code = status.as_u16();
	match status_code {
		401 => {
			warn!(status = status_code, "Unauthorized request to project service");
			ProjectServiceError::Unauthorized
		}
		403 => {
			warn!(status = status_code, "Forbidden request to project service");
			ProjectServiceError::Forbidden
		}
		429 => {
			warn!(status = status_code, "Project service rate limit exceeded");
			ProjectServiceError::RateLimited
		}
		404 => {
			debug!(status = status_code, "Catalog resource not found");
			ProjectServiceError::ApiError {
				status: status_code,
				message: body.to_string(),
			}
		}
		_ => {
			error!(status = status_code, body = %body, "Project service error");
			ProjectServiceError::ApiError {
				status: status_code,
				message: body.to_string(),
			}
		}
	}
}
