// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Loading secrets from the process environment.
//!
//! Every secret the server reads (GitHub App private key, catalog client
//! secret, pre-issued catalog token) can be given either inline as `VAR` or
//! as a mounted file referenced by `VAR_FILE`.

use std::path::PathBuf;
use std::{env, fs};

use cla_common_secret::SecretString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretEnvError {
	#[error("failed to read secret file at {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("secret file path in {var} is empty")]
	EmptyPath { var: String },
}

#[derive(Debug, Error)]
pub enum RequiredSecretError {
	#[error("required secret not found: set either {var} or {file_var}")]
	Missing { var: String, file_var: String },

	#[error(transparent)]
	Load(#[from] SecretEnvError),
}

/// Read `var` as a secret.
///
/// `{var}_FILE` wins over `{var}`. File contents lose exactly one trailing
/// newline; PEM keys keep their inner line breaks. Returns `Ok(None)` when
/// neither is set.
///
/// ```no_run
/// use cla_common_config::load_secret_env;
///
/// // CLA_SERVER_GITHUB_APP_PRIVATE_KEY_FILE=/run/secrets/github-app.pem
/// let key = load_secret_env("CLA_SERVER_GITHUB_APP_PRIVATE_KEY")?;
/// # Ok::<(), cla_common_config::SecretEnvError>(())
/// ```
pub fn load_secret_env(var: &str) -> Result<Option<SecretString>, SecretEnvError> {
	let file_var = format!("{var}_FILE");

	if let Ok(path) = env::var(&file_var) {
		if path.is_empty() {
			return Err(SecretEnvError::EmptyPath { var: file_var });
		}

		let path = PathBuf::from(path);
		let content = fs::read_to_string(&path).map_err(|source| SecretEnvError::Io {
			path: path.clone(),
			source,
		})?;

		let value = match content.strip_suffix('\n') {
			Some(stripped) => stripped.to_string(),
			None => content,
		};
		return Ok(Some(SecretString::new(value)));
	}

	Ok(env::var(var).ok().map(SecretString::new))
}

/// Like [`load_secret_env`] but absence is an error.
pub fn require_secret_env(var: &str) -> Result<SecretString, RequiredSecretError> {
	load_secret_env(var)?.ok_or_else(|| RequiredSecretError::Missing {
		var: var.to_string(),
		file_var: format!("{var}_FILE"),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use tempfile::NamedTempFile;

	// Each test owns a distinct variable name so parallel test threads never
	// observe each other's environment.

	#[test]
	fn unset_is_none() {
		let var = "CLA_TEST_SECRET_UNSET";
		env::remove_var(var);
		env::remove_var(format!("{var}_FILE"));

		assert!(load_secret_env(var).unwrap().is_none());
	}

	#[test]
	fn inline_value_is_used() {
		let var = "CLA_TEST_SECRET_INLINE";
		env::remove_var(format!("{var}_FILE"));
		env::set_var(var, "catalog-client-secret");

		let secret = load_secret_env(var).unwrap().unwrap();
		assert_eq!(secret.expose(), "catalog-client-secret");

		env::remove_var(var);
	}

	#[test]
	fn file_value_wins_and_loses_one_newline() {
		let var = "CLA_TEST_SECRET_FILE";
		let mut file = NamedTempFile::new().unwrap();
		write!(file, "-----BEGIN KEY-----\nabc\n-----END KEY-----\n\n").unwrap();

		env::set_var(var, "inline");
		env::set_var(format!("{var}_FILE"), file.path());

		let secret = load_secret_env(var).unwrap().unwrap();
		assert_eq!(secret.expose(), "-----BEGIN KEY-----\nabc\n-----END KEY-----\n");

		env::remove_var(var);
		env::remove_var(format!("{var}_FILE"));
	}

	#[test]
	fn missing_file_is_io_error() {
		let var = "CLA_TEST_SECRET_MISSING_FILE";
		env::set_var(format!("{var}_FILE"), "/nonexistent/cla/secret");

		assert!(matches!(
			load_secret_env(var),
			Err(SecretEnvError::Io { .. })
		));

		env::remove_var(format!("{var}_FILE"));
	}

	#[test]
	fn empty_file_path_is_rejected() {
		let var = "CLA_TEST_SECRET_EMPTY_PATH";
		env::set_var(format!("{var}_FILE"), "");

		assert!(matches!(
			load_secret_env(var),
			Err(SecretEnvError::EmptyPath { .. })
		));

		env::remove_var(format!("{var}_FILE"));
	}

	#[test]
	fn require_reports_both_names() {
		let var = "CLA_TEST_SECRET_REQUIRED";
		env::remove_var(var);
		env::remove_var(format!("{var}_FILE"));

		let err = require_secret_env(var).unwrap_err();
		let message = err.to_string();
		assert!(message.contains("CLA_TEST_SECRET_REQUIRED"));
		assert!(message.contains("CLA_TEST_SECRET_REQUIRED_FILE"));
	}
}
