// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use reqwest::{Client, ClientBuilder};

/// Builder preloaded with the server User-Agent. GitHub rejects requests
/// without one.
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

pub fn new_client() -> reqwest::Result<Client> {
	builder().build()
}

pub fn new_client_with_timeout(timeout: Duration) -> reqwest::Result<Client> {
	builder().timeout(timeout).build()
}

/// `cla-server/{version} ({os}-{arch})`
pub fn user_agent() -> String {
	format!(
		"cla-server/{} ({}-{})",
		env!("CARGO_PKG_VERSION"),
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn user_agent_names_the_server_and_version() {
		let ua = user_agent();
		assert!(ua.starts_with("cla-server/"));
		assert!(ua.contains(env!("CARGO_PKG_VERSION")));
		assert!(ua.contains(std::env::consts::OS));
	}

	#[test]
	fn clients_build() {
		assert!(new_client().is_ok());
		assert!(new_client_with_timeout(Duration::from_secs(5)).is_ok());
	}
}
