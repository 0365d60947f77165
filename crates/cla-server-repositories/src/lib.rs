// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Repository linking and branch-protection reconciliation.
//!
//! [`RepositoriesService`] ties a project's CLA group to GitHub repositories
//! reachable through an App installation, and keeps the `EasyCLA` status
//! check on their protected branches. The catalog, the stores and the code
//! host are injected as trait objects.

pub mod error;
pub mod service;
pub mod types;

pub use error::RepositoryError;
pub use service::RepositoriesService;
pub use types::{
	BranchProtectionView, DisableSweepReport, LinkRepositoriesInput, StatusCheckView, SweepMode,
	UpdateBranchProtectionInput,
};
