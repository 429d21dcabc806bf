// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Warden authorization server binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warden_server::{version, Server};

/// Warden server - OPA-backed HTTP authorization.
#[derive(Parser, Debug)]
#[command(name = "warden-server", about = "OPA-backed HTTP authorization server", version)]
struct Args {
	/// Path to the TOML config file (defaults to /etc/warden/server.toml)
	#[arg(long, env = "WARDEN_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version and build information
	Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	// Load .env file if present
	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => warden_server_config::load_config_with_file(path)?,
		None => warden_server_config::load_config()?,
	};

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		management_mode = %config.management.mode,
		opa_enabled = config.opa.enabled,
		environment = %config.environment,
		"starting warden-server"
	);

	let server = Server::bind(&config).await?;

	if !server.check_opa().await {
		tracing::warn!(
			base_url = %config.opa.base_url,
			"OPA is not reachable; requests needing a policy decision will be denied until it is"
		);
	}

	server.serve(shutdown_signal()).await?;
	Ok(())
}

async fn shutdown_signal() {
	match tokio::signal::ctrl_c().await {
		Ok(()) => tracing::info!("Received shutdown signal"),
		Err(e) => {
			tracing::error!(error = %e, "Failed to listen for shutdown signal");
			std::future::pending::<()>().await;
		}
	}
}
