// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Repository linker configuration.

use serde::Deserialize;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct RepositoriesConfig {
	/// Deadline applied to each linker request.
	pub request_timeout_secs: u64,
	/// Fail the CLA-group disable sweep on the first error instead of
	/// logging and continuing.
	pub strict_disable_sweep: bool,
}

impl Default for RepositoriesConfig {
	fn default() -> Self {
		RepositoriesConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepositoriesConfigLayer {
	#[serde(default)]
	pub request_timeout_secs: Option<u64>,
	#[serde(default)]
	pub strict_disable_sweep: Option<bool>,
}

impl RepositoriesConfigLayer {
	pub fn merge(&mut self, other: RepositoriesConfigLayer) {
		if other.request_timeout_secs.is_some() {
			self.request_timeout_secs = other.request_timeout_secs;
		}
		if other.strict_disable_sweep.is_some() {
			self.strict_disable_sweep = other.strict_disable_sweep;
		}
	}

	pub fn finalize(self) -> RepositoriesConfig {
		RepositoriesConfig {
			request_timeout_secs: self
				.request_timeout_secs
				.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
			strict_disable_sweep: self.strict_disable_sweep.unwrap_or(false),
		}
	}
}
