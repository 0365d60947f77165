// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite persistence for the CLA repository linker.
//!
//! Three stores, one table each, every table name prefixed with the
//! deployment stage (`cla-<stage>-...`):
//!
//! - [`GithubOrgStore`]: GitHub organizations and their App installation
//! - [`RepositoryStore`]: linked repositories
//! - [`ProjectClaGroupStore`]: project to CLA-group mappings

pub mod error;
pub mod github_org;
pub mod pool;
pub mod project_cla_group;
pub mod repository;
pub mod schema;
pub mod testing;
pub mod types;

pub use error::{DbError, Result};
pub use github_org::{GithubOrgStore, OrganizationRepository};
pub use pool::create_pool;
pub use project_cla_group::{ProjectClaGroupRepository, ProjectClaGroupStore};
pub use repository::{GithubRepoRepository, RepositoryStore};
pub use schema::{ensure_schema, TableNames};
pub use types::*;
