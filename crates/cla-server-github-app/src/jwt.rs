// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! App JWTs, exchanged for installation access tokens.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::GithubAppError;

/// GitHub caps App JWTs at ten minutes.
pub(crate) const JWT_VALIDITY_SECS: u64 = 9 * 60;

/// Backdated to absorb clock drift between us and GitHub.
const CLOCK_SKEW_SECS: u64 = 60;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
	pub iat: u64,
	pub exp: u64,
	/// The App id.
	pub iss: String,
}

/// Sign an RS256 JWT identifying the App.
#[instrument(skip(private_key_pem))]
pub fn generate_app_jwt(app_id: u64, private_key_pem: &str) -> Result<String, GithubAppError> {
	let now = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map_err(|e| GithubAppError::Jwt(format!("System time error: {e}")))?
		.as_secs();

	let claims = Claims {
		iat: now.saturating_sub(CLOCK_SKEW_SECS),
		exp: now + JWT_VALIDITY_SECS,
		iss: app_id.to_string(),
	};

	let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
		.map_err(|e| GithubAppError::Jwt(format!("Invalid RSA private key: {e}")))?;

	let token = encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
		.map_err(|e| GithubAppError::Jwt(format!("Failed to encode JWT: {e}")))?;

	debug!(app_id, exp = claims.exp, "Generated GitHub App JWT");

	Ok(token)
}
