// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! GitHub App client with JWT authentication and installation token caching.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cla_common_http::{retry, RetryConfig};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::config::GithubAppConfig;
use crate::error::GithubAppError;
use crate::jwt::{generate_app_jwt, JWT_VALIDITY_SECS};
use crate::limiter::NonBlockingLimiter;
use crate::tokens::TokenSlots;
use crate::types::{
	AccessTokenResponse, BranchProtectionRule, GitHubProtectionResponse, GitHubRepoResponse,
	Repository, UpdateProtectionRequest,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Installation tokens live an hour; mint a new one with this much left.
const INSTALLATION_TOKEN_MARGIN: Duration = Duration::from_secs(120);
const APP_JWT_MARGIN: Duration = Duration::from_secs(30);

/// GitHub's 404 message for a branch without a protection rule.
const BRANCH_NOT_PROTECTED: &str = "Branch not protected";

/// Client for the GitHub REST API, authenticated as an App installation.
///
/// Cloning is cheap; clones share token caches and limiters.
#[derive(Clone)]
pub struct GithubAppClient {
	http_client: Client,
	config: GithubAppConfig,
	app_jwt: Arc<TokenSlots<()>>,
	installation_tokens: Arc<TokenSlots<i64>>,
	/// One bucket per installation, shared by every engine bound to it
	limiters: Arc<Mutex<HashMap<i64, Arc<NonBlockingLimiter>>>>,
}

impl GithubAppClient {
	pub fn new(config: GithubAppConfig) -> Result<Self, GithubAppError> {
		let http_client = cla_common_http::builder()
			.timeout(REQUEST_TIMEOUT)
			.build()
			.map_err(|e| GithubAppError::Config(format!("http client: {e}")))?;

		info!(
			app_id = config.app_id(),
			base_url = %config.base_url(),
			"GitHub App client ready"
		);

		Ok(Self {
			http_client,
			config,
			app_jwt: Arc::new(TokenSlots::new("app_jwt", APP_JWT_MARGIN)),
			installation_tokens: Arc::new(TokenSlots::new(
				"installation",
				INSTALLATION_TOKEN_MARGIN,
			)),
			limiters: Arc::new(Mutex::new(HashMap::new())),
		})
	}

	pub fn config(&self) -> &GithubAppConfig {
		&self.config
	}

	pub fn retry_config(&self) -> &RetryConfig {
		&self.config.retry_config
	}

	/// The shared non-blocking limiter for an installation.
	pub(crate) async fn limiter_for(&self, installation_id: i64) -> Arc<NonBlockingLimiter> {
		let mut limiters = self.limiters.lock().await;
		limiters
			.entry(installation_id)
			.or_insert_with(|| Arc::new(NonBlockingLimiter::new(self.config.limiter())))
			.clone()
	}

	// =========================================================================
	// Tokens
	// =========================================================================

	async fn app_jwt(&self) -> Result<String, GithubAppError> {
		self.app_jwt
			.get_or_mint((), || async {
				let jwt = generate_app_jwt(self.config.app_id(), self.config.private_key_pem())?;
				Ok((jwt, Duration::from_secs(JWT_VALIDITY_SECS)))
			})
			.await
	}

	#[instrument(skip(self))]
	pub(crate) async fn installation_token(
		&self,
		installation_id: i64,
	) -> Result<String, GithubAppError> {
		self.installation_tokens
			.get_or_mint(installation_id, || self.mint_installation_token(installation_id))
			.await
	}

	/// Exchange the App JWT for an installation access token.
	async fn mint_installation_token(
		&self,
		installation_id: i64,
	) -> Result<(String, Duration), GithubAppError> {
		let jwt = self.app_jwt().await?;
		let url = self
			.config
			.base_url()
			.join(&format!("app/installations/{installation_id}/access_tokens"))
			.map_err(|e| GithubAppError::Config(format!("access token url: {e}")))?;

		let response = self
			.http_client
			.post(url)
			.bearer_auth(&jwt)
			.header("Accept", "application/vnd.github+json")
			.header("X-GitHub-Api-Version", "2022-11-28")
			.send()
			.await
			.map_err(|e| {
				if e.is_timeout() {
					warn!(installation_id, "installation token request timed out");
					return GithubAppError::Timeout;
				}
				GithubAppError::Network(e)
			})?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			let err = map_github_error(status, &body);
			// a rejected JWT will not recover on its own
			if matches!(err, GithubAppError::Unauthorized) && self.app_jwt.invalidate(()).await {
				info!("dropped rejected App JWT");
			}
			return Err(err);
		}

		let issued: AccessTokenResponse = response.json().await.map_err(|e| {
			error!(installation_id, error = %e, "unreadable access token response");
			GithubAppError::InvalidResponse(format!("access token: {e}"))
		})?;
		let valid_for = parse_expiry_duration(&issued.expires_at)?;
		info!(installation_id, "installation token refreshed");
		Ok((issued.token, valid_for))
	}

	/// Pre-load an installation token so tests skip the JWT exchange.
	#[cfg(test)]
	pub(crate) async fn seed_installation_token(&self, installation_id: i64, token: &str) {
		self.installation_tokens
			.seed(installation_id, token, Duration::from_secs(3600))
			.await;
	}

	// =========================================================================
	// Requests
	// =========================================================================

	/// Send an installation-authenticated request with retry and one token
	/// refresh on 401.
	async fn request<T: DeserializeOwned>(
		&self,
		installation_id: i64,
		method: Method,
		path: &str,
		body: Option<&serde_json::Value>,
	) -> Result<T, GithubAppError> {
		retry(&self.config.retry_config, || {
			self.request_with_refresh(installation_id, method.clone(), path, body)
		})
		.await
	}

	async fn request_with_refresh<T: DeserializeOwned>(
		&self,
		installation_id: i64,
		method: Method,
		path: &str,
		body: Option<&serde_json::Value>,
	) -> Result<T, GithubAppError> {
		let token = self.installation_token(installation_id).await?;

		match self.request_inner(&token, method.clone(), path, body).await {
			Ok(resp) => Ok(resp),
			Err(GithubAppError::Unauthorized) => {
				info!(installation_id, "Got 401, refreshing installation token");
				self.installation_tokens.invalidate(installation_id).await;
				let fresh_token = self.installation_token(installation_id).await?;
				self.request_inner(&fresh_token, method, path, body).await
			}
			Err(e) => Err(e),
		}
	}

	async fn request_inner<T: DeserializeOwned>(
		&self,
		token: &str,
		method: Method,
		path: &str,
		body: Option<&serde_json::Value>,
	) -> Result<T, GithubAppError> {
		let url = self
			.config
			.base_url()
			.join(path)
			.map_err(|e| GithubAppError::Config(format!("Invalid URL: {e}")))?;

		debug!(method = %method, url = %url, "Sending GitHub request");

		let mut request = self
			.http_client
			.request(method, url)
			.header("Authorization", format!("Bearer {token}"))
			.header("Accept", "application/vnd.github+json")
			.header("X-GitHub-Api-Version", "2022-11-28");
		if let Some(body) = body {
			request = request.json(body);
		}

		let response = request.send().await.map_err(|e| {
			if e.is_timeout() {
				return GithubAppError::Timeout;
			}
			GithubAppError::Network(e)
		})?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(map_github_error(status, &body));
		}

		response.json().await.map_err(|e| {
			error!(error = %e, path, "Failed to parse GitHub response");
			GithubAppError::InvalidResponse(format!("JSON parse error: {e}"))
		})
	}

	// =========================================================================
	// Endpoints
	// =========================================================================

	/// `GET /repositories/{id}`.
	#[instrument(skip(self))]
	pub async fn get_repository_by_id(
		&self,
		installation_id: i64,
		repository_id: i64,
	) -> Result<Repository, GithubAppError> {
		let repo: GitHubRepoResponse = self
			.request(
				installation_id,
				Method::GET,
				&format!("repositories/{repository_id}"),
				None,
			)
			.await?;

		debug!(full_name = %repo.full_name, "Repository info fetched");
		Ok(repo.into())
	}

	/// `GET /repos/{owner}/{repo}`.
	#[instrument(skip(self))]
	pub async fn get_repository(
		&self,
		installation_id: i64,
		owner: &str,
		repo: &str,
	) -> Result<Repository, GithubAppError> {
		let repo: GitHubRepoResponse = self
			.request(
				installation_id,
				Method::GET,
				&format!("repos/{owner}/{repo}"),
				None,
			)
			.await?;

		debug!(full_name = %repo.full_name, "Repository info fetched");
		Ok(repo.into())
	}

	/// `GET .../branches/{branch}/protection`. `None` when the branch exists
	/// but carries no rule.
	#[instrument(skip(self))]
	pub async fn get_branch_protection(
		&self,
		installation_id: i64,
		owner: &str,
		repo: &str,
		branch: &str,
	) -> Result<Option<BranchProtectionRule>, GithubAppError> {
		let path = protection_path(owner, repo, branch);

		match self
			.request::<GitHubProtectionResponse>(installation_id, Method::GET, &path, None)
			.await
		{
			Ok(raw) => Ok(Some(raw.into_rule(branch))),
			Err(GithubAppError::ApiError { status: 404, message })
				if message.contains(BRANCH_NOT_PROTECTED) =>
			{
				debug!("Branch not protected");
				Ok(None)
			}
			Err(e) if e.is_not_found() => Err(GithubAppError::branch_not_found(owner, repo, branch)),
			Err(e) => Err(e),
		}
	}

	/// `PUT .../branches/{branch}/protection` with the complete rule.
	#[instrument(skip(self, rule), fields(branch = %rule.branch_name))]
	pub async fn put_branch_protection(
		&self,
		installation_id: i64,
		owner: &str,
		repo: &str,
		rule: &BranchProtectionRule,
	) -> Result<BranchProtectionRule, GithubAppError> {
		let path = protection_path(owner, repo, &rule.branch_name);
		let body = serde_json::to_value(UpdateProtectionRequest::from(rule))
			.map_err(|e| GithubAppError::InvalidResponse(format!("JSON encode error: {e}")))?;

		let raw: GitHubProtectionResponse = self
			.request(installation_id, Method::PUT, &path, Some(&body))
			.await
			.map_err(|e| {
				if e.is_not_found() {
					GithubAppError::branch_not_found(owner, repo, &rule.branch_name)
				} else {
					e
				}
			})?;

		info!(owner, repo, "Branch protection updated");
		Ok(raw.into_rule(&rule.branch_name))
	}
}

fn protection_path(owner: &str, repo: &str, branch: &str) -> String {
	format!(
		"repos/{owner}/{repo}/branches/{}/protection",
		urlencoding::encode(branch)
	)
}

/// Map GitHub API error responses to GithubAppError.
pub(crate) fn map_github_error(status: StatusCode, body: &str) -> GithubAppError {
	let status_code = status.as_u16();

	match status_code {
		401 => {
			warn!(status = status_code, "Unauthorized request to GitHub");
			GithubAppError::Unauthorized
		}
		403 | 429 => {
			let lower = body.to_lowercase();
			if status_code == 429 || lower.contains("rate limit") || lower.contains("api rate") {
				warn!(status = status_code, "GitHub rate limit exceeded");
				GithubAppError::RateLimited
			} else {
				warn!(status = status_code, "Forbidden request to GitHub");
				GithubAppError::Forbidden
			}
		}
		404 => {
			debug!(status = status_code, body = %body, "GitHub resource not found");
			GithubAppError::api_error(status_code, body)
		}
		_ => {
			error!(status = status_code, body = %body, "GitHub API error");
			GithubAppError::api_error(status_code, body)
		}
	}
}

/// Time left until GitHub's `expires_at`.
pub(crate) fn parse_expiry_duration(expires_at: &str) -> Result<Duration, GithubAppError> {
	let expires_at_dt: DateTime<Utc> = expires_at.parse().map_err(|e| {
		GithubAppError::InvalidResponse(format!("Invalid expires_at: {expires_at} - {e}"))
	})?;

	Ok(expires_at_dt
		.signed_duration_since(Utc::now())
		.to_std()
		.unwrap_or(Duration::ZERO))
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use serde_json::json;
	use wiremock::matchers::{header, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	pub(crate) async fn test_client(server: &MockServer) -> GithubAppClient {
		let config = GithubAppConfig::new(1, "unused")
			.with_test_base_url(&server.uri())
			.with_retry_config(RetryConfig::no_retry());
		let client = GithubAppClient::new(config).unwrap();
		client.seed_installation_token(17, "inst-token").await;
		client
	}

	pub(crate) fn repo_body(id: i64, full_name: &str) -> serde_json::Value {
		let (owner, name) = full_name.split_once('/').unwrap();
		json!({
			"id": id,
			"name": name,
			"full_name": full_name,
			"owner": {"login": owner},
			"url": format!("https://api.github.com/repos/{full_name}"),
			"html_url": format!("https://github.com/{full_name}"),
			"default_branch": "main",
			"private": false
		})
	}

	#[test]
	fn test_map_github_error_unauthorized() {
		let err = map_github_error(StatusCode::UNAUTHORIZED, "Bad credentials");
		assert!(matches!(err, GithubAppError::Unauthorized));
	}

	#[test]
	fn test_map_github_error_rate_limit() {
		let err = map_github_error(StatusCode::FORBIDDEN, "API rate limit exceeded");
		assert!(matches!(err, GithubAppError::RateLimited));
		let err = map_github_error(StatusCode::TOO_MANY_REQUESTS, "");
		assert!(matches!(err, GithubAppError::RateLimited));
	}

	#[test]
	fn test_map_github_error_forbidden() {
		let err = map_github_error(StatusCode::FORBIDDEN, "Not allowed");
		assert!(matches!(err, GithubAppError::Forbidden));
	}

	#[test]
	fn test_map_github_error_500() {
		let err = map_github_error(StatusCode::INTERNAL_SERVER_ERROR, "Server error");
		assert!(matches!(err, GithubAppError::ApiError { status: 500, .. }));
	}

	#[test]
	fn test_parse_expiry_duration() {
		let future = (Utc::now() + chrono::Duration::minutes(30)).to_rfc3339();
		let d = parse_expiry_duration(&future).unwrap();
		assert!(d > Duration::from_secs(25 * 60));

		let past = (Utc::now() - chrono::Duration::minutes(1)).to_rfc3339();
		assert_eq!(parse_expiry_duration(&past).unwrap(), Duration::ZERO);

		assert!(parse_expiry_duration("yesterday").is_err());
	}

	#[test]
	fn test_protection_path_encodes_branch() {
		assert_eq!(
			protection_path("acme", "widgets", "release/1.0"),
			"repos/acme/widgets/branches/release%2F1.0/protection"
		);
	}

	#[tokio::test]
	async fn test_get_repository_by_id_uses_installation_token() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/repositories/42"))
			.and(header("authorization", "Bearer inst-token"))
			.respond_with(ResponseTemplate::new(200).set_body_json(repo_body(42, "acme/widgets")))
			.expect(1)
			.mount(&server)
			.await;

		let client = test_client(&server).await;
		let repo = client.get_repository_by_id(17, 42).await.unwrap();
		assert_eq!(repo.full_name, "acme/widgets");
		assert_eq!(repo.owner_login, "acme");
		assert_eq!(repo.html_url, "https://github.com/acme/widgets");
	}

	#[tokio::test]
	async fn test_rejected_token_is_reminted_once() {
		use rsa::{pkcs8::EncodePrivateKey, RsaPrivateKey};

		let key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
		let pem = key.to_pkcs8_pem(rsa::pkcs8::LineEnding::LF).unwrap();

		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/app/installations/17/access_tokens"))
			.respond_with(ResponseTemplate::new(201).set_body_json(json!({
				"token": "fresh-token",
				"expires_at": (Utc::now() + chrono::Duration::hours(1)).to_rfc3339()
			})))
			.expect(1)
			.mount(&server)
			.await;
		Mock::given(method("GET"))
			.and(path("/repositories/42"))
			.and(header("authorization", "Bearer stale-token"))
			.respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
			.expect(1)
			.mount(&server)
			.await;
		Mock::given(method("GET"))
			.and(path("/repositories/42"))
			.and(header("authorization", "Bearer fresh-token"))
			.respond_with(ResponseTemplate::new(200).set_body_json(repo_body(42, "acme/widgets")))
			.expect(2)
			.mount(&server)
			.await;

		let config = GithubAppConfig::new(1, pem.as_str())
			.with_test_base_url(&server.uri())
			.with_retry_config(RetryConfig::no_retry());
		let client = GithubAppClient::new(config).unwrap();
		client.installation_tokens.seed(17, "stale-token", Duration::from_secs(3600)).await;

		client.get_repository_by_id(17, 42).await.unwrap();
		// the re-minted token is cached for the next call
		client.get_repository_by_id(17, 42).await.unwrap();
	}

	#[tokio::test]
	async fn test_missing_repository_is_404() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/repositories/9"))
			.respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
			.mount(&server)
			.await;

		let client = test_client(&server).await;
		let err = client.get_repository_by_id(17, 9).await.unwrap_err();
		assert!(err.is_not_found());
	}

	#[tokio::test]
	async fn test_unprotected_branch_is_none() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/repos/acme/widgets/branches/main/protection"))
			.respond_with(
				ResponseTemplate::new(404).set_body_json(json!({"message": "Branch not protected"})),
			)
			.mount(&server)
			.await;

		let client = test_client(&server).await;
		let rule = client
			.get_branch_protection(17, "acme", "widgets", "main")
			.await
			.unwrap();
		assert!(rule.is_none());
	}

	#[tokio::test]
	async fn test_missing_branch_is_branch_not_found() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/repos/acme/widgets/branches/nope/protection"))
			.respond_with(
				ResponseTemplate::new(404).set_body_json(json!({"message": "Branch not found"})),
			)
			.mount(&server)
			.await;

		let client = test_client(&server).await;
		let err = client
			.get_branch_protection(17, "acme", "widgets", "nope")
			.await
			.unwrap_err();
		assert!(matches!(err, GithubAppError::BranchNotFound { .. }));
	}

	#[tokio::test]
	async fn test_server_errors_are_retried() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/repositories/42"))
			.respond_with(ResponseTemplate::new(502))
			.up_to_n_times(1)
			.mount(&server)
			.await;
		Mock::given(method("GET"))
			.and(path("/repositories/42"))
			.respond_with(ResponseTemplate::new(200).set_body_json(repo_body(42, "acme/widgets")))
			.mount(&server)
			.await;

		let config = GithubAppConfig::new(1, "unused")
			.with_test_base_url(&server.uri())
			.with_retry_config(RetryConfig {
				base_delay: Duration::from_millis(1),
				jitter: false,
				..RetryConfig::default()
			});
		let client = GithubAppClient::new(config).unwrap();
		client.seed_installation_token(17, "inst-token").await;

		let repo = client.get_repository_by_id(17, 42).await.unwrap();
		assert_eq!(repo.id, 42);
	}

	#[tokio::test]
	async fn test_limiters_are_shared_per_installation() {
		let server = MockServer::start().await;
		let client = test_client(&server).await;
		let a = client.limiter_for(17).await;
		let b = client.clone().limiter_for(17).await;
		let c = client.limiter_for(18).await;
		assert!(Arc::ptr_eq(&a, &b));
		assert!(!Arc::ptr_eq(&a, &c));
	}
}
