// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

/// Link GitHub repositories to CLA groups and manage their branch protection.
#[derive(Parser, Debug)]
#[command(name = "cla-server", version, about, long_about = None)]
pub struct Cli {
	/// Path to a TOML configuration file
	#[arg(short, long, global = true, env = "CLA_SERVER_CONFIG")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Show version information
	Version,
	/// Create the stage's tables if they do not exist
	Migrate,
	/// Link GitHub repositories to a project's CLA group
	Link(LinkArgs),
	/// List a project's enabled repositories
	List {
		/// Project SFID
		#[arg(long)]
		project: String,
	},
	/// Show one repository
	GetRepository { repository_id: Uuid },
	/// Show a repository by its `owner/repo` name
	GetRepositoryByName { name: String },
	/// Enable a repository
	Enable { repository_id: Uuid },
	/// Disable a repository
	Disable { repository_id: Uuid },
	/// Disable every repository of a CLA group
	DisableClaGroup {
		cla_group_id: String,
		/// Stop at the first failure
		#[arg(long)]
		strict: bool,
	},
	/// Show a branch's protection
	GetBranchProtection(BranchArgs),
	/// Reconcile a branch's protection
	UpdateBranchProtection(UpdateBranchArgs),
}

#[derive(Args, Debug)]
pub struct LinkArgs {
	/// Project SFID
	#[arg(long)]
	pub project: String,
	#[arg(long)]
	pub cla_group: String,
	/// GitHub organization the App is installed on
	#[arg(long)]
	pub org: String,
	/// GitHub repository id (repeatable)
	#[arg(long = "repo-id", required = true)]
	pub repo_ids: Vec<String>,
}

#[derive(Args, Debug)]
pub struct BranchArgs {
	/// Project SFID
	#[arg(long)]
	pub project: String,
	#[arg(long)]
	pub repository: Uuid,
	/// Defaults to the repository's default branch
	#[arg(long)]
	pub branch: Option<String>,
}

#[derive(Args, Debug)]
pub struct UpdateBranchArgs {
	#[command(flatten)]
	pub target: BranchArgs,
	/// Apply the rule to administrators too
	#[arg(long)]
	pub enforce_admin: bool,
	/// Status check to require (repeatable)
	#[arg(long = "require-check", value_name = "NAME")]
	pub require_checks: Vec<String>,
	/// Status check to stop requiring (repeatable)
	#[arg(long = "drop-check", value_name = "NAME")]
	pub drop_checks: Vec<String>,
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::CommandFactory;

	#[test]
	fn cli_definition_is_valid() {
		Cli::command().debug_assert();
	}

	#[test]
	fn parses_link_with_repeated_ids() {
		let cli = Cli::try_parse_from([
			"cla-server",
			"link",
			"--project",
			"P1",
			"--cla-group",
			"G1",
			"--org",
			"acme",
			"--repo-id",
			"42",
			"--repo-id",
			"43",
		])
		.unwrap();
		match cli.command {
			Command::Link(args) => {
				assert_eq!(args.project, "P1");
				assert_eq!(args.repo_ids, vec!["42", "43"]);
			}
			other => panic!("unexpected command {other:?}"),
		}
	}

	#[test]
	fn link_requires_a_repository() {
		let result = Cli::try_parse_from([
			"cla-server",
			"link",
			"--project",
			"P1",
			"--cla-group",
			"G1",
			"--org",
			"acme",
		]);
		assert!(result.is_err());
	}

	#[test]
	fn parses_update_branch_protection() {
		let id = Uuid::new_v4();
		let cli = Cli::try_parse_from([
			"cla-server",
			"--config",
			"/tmp/cla.toml",
			"update-branch-protection",
			"--project",
			"P1",
			"--repository",
			&id.to_string(),
			"--enforce-admin",
			"--require-check",
			"EasyCLA",
		])
		.unwrap();
		assert_eq!(cli.config, Some(PathBuf::from("/tmp/cla.toml")));
		match cli.command {
			Command::UpdateBranchProtection(args) => {
				assert_eq!(args.target.repository, id);
				assert_eq!(args.target.branch, None);
				assert!(args.enforce_admin);
				assert_eq!(args.require_checks, vec!["EasyCLA"]);
				assert!(args.drop_checks.is_empty());
			}
			other => panic!("unexpected command {other:?}"),
		}
	}

	#[test]
	fn rejects_malformed_repository_id() {
		assert!(Cli::try_parse_from(["cla-server", "enable", "not-a-uuid"]).is_err());
	}

	#[test]
	fn disable_cla_group_strict_flag() {
		let cli = Cli::try_parse_from(["cla-server", "disable-cla-group", "G1", "--strict"]).unwrap();
		assert!(matches!(
			cli.command,
			Command::DisableClaGroup { strict: true, .. }
		));
	}
}
