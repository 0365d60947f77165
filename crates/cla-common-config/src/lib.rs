// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration primitives shared across the CLA server crates.
//!
//! - [`Secret<T>`] re-exported from [`cla_common_secret`]
//! - [`load_secret_env`] / [`require_secret_env`] for the `VAR` / `VAR_FILE`
//!   convention used by the GitHub App key and catalog credentials

pub mod env;

pub use cla_common_secret::{Secret, SecretString, REDACTED};

pub use env::{load_secret_env, require_secret_env, RequiredSecretError, SecretEnvError};
