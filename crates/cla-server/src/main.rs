// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! CLA repository linker binary.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use cla_common_core::RequestContext;
use cla_server_config::{LogFormat, LoggingConfig, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod commands;
mod version;
mod wiring;

use cli::{Cli, Command};

fn load_config(cli: &Cli) -> Result<ServerConfig> {
	let config = match &cli.config {
		Some(path) => cla_server_config::load_config_with_file(path)?,
		None => cla_server_config::load_config()?,
	};
	Ok(config)
}

/// Logs go to stderr; stdout carries command output.
fn init_tracing(logging: &LoggingConfig) {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| logging.level.clone().into());
	let registry = tracing_subscriber::registry().with(filter);
	match logging.format {
		LogFormat::Json => registry
			.with(
				tracing_subscriber::fmt::layer()
					.json()
					.with_writer(std::io::stderr),
			)
			.init(),
		LogFormat::Text => registry
			.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
			.init(),
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	if let Command::Version = cli.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = load_config(&cli)?;
	init_tracing(&config.logging);

	tracing::info!(
		database = %config.database.url,
		stage = %config.database.stage,
		"starting cla-server"
	);

	let db = wiring::connect(&config).await?;
	if let Command::Migrate = cli.command {
		return wiring::migrate(&db).await;
	}

	let service = wiring::repositories_service(&config, &db)?;

	let ctx = RequestContext::with_timeout(Duration::from_secs(
		config.repositories.request_timeout_secs,
	));
	let interrupt = ctx.clone();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			tracing::warn!("interrupted, cancelling request");
			interrupt.cancel();
		}
	});

	commands::run(
		&service,
		&ctx,
		cli.command,
		config.repositories.strict_disable_sweep,
	)
	.await
}
