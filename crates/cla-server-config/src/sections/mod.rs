// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

pub mod database;
pub mod github_app;
pub mod logging;
pub mod project_service;
pub mod repositories;

pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use github_app::{GitHubAppConfig, GitHubAppConfigLayer, LimiterConfig};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use project_service::{ProjectServiceAuth, ProjectServiceConfig, ProjectServiceConfigLayer};
pub use repositories::{RepositoriesConfig, RepositoriesConfigLayer};
