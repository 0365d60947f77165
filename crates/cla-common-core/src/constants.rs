// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

/// Service tag a project carries in `EnabledServices` once CLA is enabled.
pub const CLA_SERVICE: &str = "CLA";

/// Written in place of an empty `EnabledServices` list.
pub const NO_SERVICES_SENTINEL: &str = "N/A";

/// The only status-check context callers may toggle on a protected branch.
pub const EASYCLA_STATUS_CHECK: &str = "EasyCLA";

/// Status checks accepted by branch-protection updates.
pub const ALLOWED_STATUS_CHECKS: &[&str] = &[EASYCLA_STATUS_CHECK];

pub const THE_LINUX_FOUNDATION: &str = "The Linux Foundation";
pub const LF_PROJECTS_LLC: &str = "LF Projects, LLC";

/// Foundation names that act as the root of the project hierarchy.
pub const FOUNDATION_ROOT_NAMES: &[&str] = &[THE_LINUX_FOUNDATION, LF_PROJECTS_LLC];

pub const REPOSITORY_TYPE_GITHUB: &str = "github";

pub const RECORD_VERSION: &str = "v1";

pub fn is_foundation_root_name(name: &str) -> bool {
	FOUNDATION_ROOT_NAMES.contains(&name)
}

pub fn is_allowed_status_check(name: &str) -> bool {
	ALLOWED_STATUS_CHECKS.contains(&name)
}
