// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Startup and serving errors.

use std::net::SocketAddr;

use warden_authz_core::RegistryError;
use warden_opa_client::OpaError;
use warden_server_authz::GateBuildError;
use warden_server_config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	#[error("Configuration error: {0}")]
	Config(#[from] ConfigError),

	#[error("Input extension registry error: {0}")]
	Registry(#[from] RegistryError),

	#[error("Access gate error: {0}")]
	Gate(#[from] GateBuildError),

	#[error("OPA client error: {0}")]
	Opa(#[from] OpaError),

	#[error("Failed to bind {addr}: {source}")]
	Bind {
		addr: String,
		#[source]
		source: std::io::Error,
	},

	#[error("Server error on {addr}: {source}")]
	Serve {
		addr: SocketAddr,
		#[source]
		source: std::io::Error,
	},

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}
