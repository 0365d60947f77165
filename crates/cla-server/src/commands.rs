// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use anyhow::{bail, Result};
use cla_common_core::RequestContext;
use cla_server_repositories::{
	LinkRepositoriesInput, RepositoriesService, StatusCheckView, SweepMode,
	UpdateBranchProtectionInput,
};
use serde::Serialize;

use crate::cli::{Command, LinkArgs, UpdateBranchArgs};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

fn link_input(args: &LinkArgs) -> LinkRepositoriesInput {
	LinkRepositoriesInput {
		cla_group_id: args.cla_group.clone(),
		organization_name: args.org.clone(),
		repository_github_ids: args.repo_ids.clone(),
		repository_github_id: None,
	}
}

fn update_input(args: &UpdateBranchArgs) -> UpdateBranchProtectionInput {
	let required = args.require_checks.iter().map(|name| StatusCheckView {
		name: name.clone(),
		enabled: true,
	});
	let dropped = args.drop_checks.iter().map(|name| StatusCheckView {
		name: name.clone(),
		enabled: false,
	});
	UpdateBranchProtectionInput {
		branch_name: args.target.branch.clone(),
		enforce_admin: args.enforce_admin,
		status_checks: required.chain(dropped).collect(),
	}
}

pub fn sweep_mode(strict_flag: bool, strict_by_default: bool) -> SweepMode {
	if strict_flag || strict_by_default {
		SweepMode::Strict
	} else {
		SweepMode::BestEffort
	}
}

/// Run one service command and print its result as JSON.
pub async fn run(
	service: &RepositoriesService,
	ctx: &RequestContext,
	command: Command,
	strict_by_default: bool,
) -> Result<()> {
	match command {
		Command::Link(args) => {
			let linked = service
				.link_repositories(ctx, &args.project, &link_input(&args))
				.await?;
			print_json(&linked)
		}
		Command::List { project } => {
			print_json(&service.list_project_repositories(ctx, &project).await?)
		}
		Command::GetRepository { repository_id } => {
			print_json(&service.get_repository(ctx, repository_id).await?)
		}
		Command::GetRepositoryByName { name } => {
			print_json(&service.get_repository_by_name(ctx, &name).await?)
		}
		Command::Enable { repository_id } => {
			service.enable_repository(ctx, repository_id).await?;
			print_json(&service.get_repository(ctx, repository_id).await?)
		}
		Command::Disable { repository_id } => {
			service.disable_repository(ctx, repository_id).await?;
			print_json(&service.get_repository(ctx, repository_id).await?)
		}
		Command::DisableClaGroup {
			cla_group_id,
			strict,
		} => {
			let mode = sweep_mode(strict, strict_by_default);
			print_json(
				&service
					.disable_cla_group_repositories(ctx, &cla_group_id, mode)
					.await?,
			)
		}
		Command::GetBranchProtection(args) => print_json(
			&service
				.get_protected_branch(ctx, &args.project, args.repository, args.branch.as_deref())
				.await?,
		),
		Command::UpdateBranchProtection(args) => print_json(
			&service
				.update_protected_branch(
					ctx,
					&args.target.project,
					args.target.repository,
					&update_input(&args),
				)
				.await?,
		),
		Command::Version | Command::Migrate => {
			bail!("{command:?} does not use the repository service")
		}
	}
}
