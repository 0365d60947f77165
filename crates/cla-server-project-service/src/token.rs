// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bearer tokens for the project catalog.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use cla_common_config::SecretString;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

use crate::error::ProjectServiceError;

/// Refresh this long before the issuer's expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Supplies the bearer token sent with every catalog call.
#[async_trait]
pub trait TokenProvider: Send + Sync {
	async fn token(&self) -> Result<SecretString, ProjectServiceError>;

	/// Drop any cached token; called after the catalog answers 401.
	async fn invalidate(&self) {}
}

/// A pre-issued token.
pub struct StaticTokenProvider {
	token: SecretString,
}

impl StaticTokenProvider {
	pub fn new(token: SecretString) -> Self {
		Self { token }
	}
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
	async fn token(&self) -> Result<SecretString, ProjectServiceError> {
		Ok(self.token.clone())
	}
}

#[derive(Debug, Serialize)]
struct ClientCredentialsRequest<'a> {
	grant_type: &'static str,
	client_id: &'a str,
	client_secret: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	audience: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
	access_token: String,
	#[serde(default)]
	expires_in: Option<u64>,
}

struct CachedToken {
	token: SecretString,
	expires_at: Instant,
}

/// OAuth2 client-credentials grant against the identity provider.
///
/// The token is cached until [`REFRESH_MARGIN`] before expiry. Refreshes are
/// serialized so concurrent callers trigger a single exchange.
pub struct ClientCredentialsTokenProvider {
	http: Client,
	token_url: String,
	client_id: String,
	client_secret: SecretString,
	audience: Option<String>,
	cached: Mutex<Option<CachedToken>>,
}

impl ClientCredentialsTokenProvider {
	pub fn new(
		http: Client,
		token_url: impl Into<String>,
		client_id: impl Into<String>,
		client_secret: SecretString,
		audience: Option<String>,
	) -> Self {
		Self {
			http,
			token_url: token_url.into(),
			client_id: client_id.into(),
			client_secret,
			audience,
			cached: Mutex::new(None),
		}
	}

	async fn exchange(&self) -> Result<CachedToken, ProjectServiceError> {
		let request = ClientCredentialsRequest {
			grant_type: "client_credentials",
			client_id: &self.client_id,
			client_secret: self.client_secret.expose(),
			audience: self.audience.as_deref(),
		};

		let response = self
			.http
			.post(&self.token_url)
			.json(&request)
			.send()
			.await
			.map_err(|e| {
				if e.is_timeout() {
					return ProjectServiceError::Timeout;
				}
				ProjectServiceError::Network(e)
			})?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			error!(status = status.as_u16(), "Token exchange rejected");
			return Err(ProjectServiceError::Token(format!(
				"token endpoint returned {status}: {body}"
			)));
		}

		let parsed: TokenResponse = response
			.json()
			.await
			.map_err(|e| ProjectServiceError::Token(format!("invalid token response: {e}")))?;

		if parsed.access_token.is_empty() {
			return Err(ProjectServiceError::Token("empty access token".to_string()));
		}

		let valid_for = Duration::from_secs(parsed.expires_in.unwrap_or(3600));
		Ok(CachedToken {
			token: SecretString::new(parsed.access_token),
			expires_at: Instant::now() + valid_for,
		})
	}
}

#[async_trait]
impl TokenProvider for ClientCredentialsTokenProvider {
	#[instrument(skip(self), fields(client_id = %self.client_id))]
	async fn token(&self) -> Result<SecretString, ProjectServiceError> {
		let mut cached = self.cached.lock().await;
		if let Some(current) = cached.as_ref() {
			if Instant::now() + REFRESH_MARGIN < current.expires_at {
				debug!("Using cached catalog token");
				return Ok(current.token.clone());
			}
		}

		let fresh = self.exchange().await?;
		let token = fresh.token.clone();
		*cached = Some(fresh);
		info!("Catalog token refreshed");
		Ok(token)
	}

	async fn invalidate(&self) {
		if self.cached.lock().await.take().is_some() {
			info!("Invalidated catalog token");
		}
	}
}
