// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the warden authorization server.
//!
//! This crate provides:
//! - Layered configuration from built-in defaults, a TOML file and the environment
//! - Type-safe sections with cross-field validation
//! - Consistent environment variable naming (`WARDEN_*`)
//!
//! # Usage
//!
//! ```ignore
//! use warden_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("Server listening on {}", config.socket_addr());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{
	ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, SYSTEM_CONFIG_PATH,
};

use std::path::PathBuf;

use tracing::{debug, info};

pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const PRODUCTION_ENVIRONMENT: &str = "production";

/// Fully resolved server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub management: ManagementConfig,
	pub opa: OpaConfig,
	pub logging: LoggingConfig,
	/// Deployment environment name, e.g. `development` or `production`.
	pub environment: String,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			http: HttpConfig::default(),
			management: ManagementConfig::default(),
			opa: OpaConfig::default(),
			logging: LoggingConfig::default(),
			environment: DEFAULT_ENVIRONMENT.to_string(),
		}
	}
}

impl ServerConfig {
	/// Get the socket address string for binding the application listener.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}

	/// Socket address for the separate management listener.
	pub fn management_socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.management.port)
	}

	pub fn is_production(&self) -> bool {
		self.environment.eq_ignore_ascii_case(PRODUCTION_ENVIRONMENT)
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`WARDEN_*`)
/// 2. Config file (`/etc/warden/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	];
	load_from_sources(sources)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<ServerConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	];
	load_from_sources(sources)
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![Box::new(DefaultsSource), Box::new(EnvSource)];
	load_from_sources(sources)
}

/// Merges `sources` in precedence order and resolves the result.
pub fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let config = ServerConfig {
		http: layer.http.unwrap_or_default().finalize(),
		management: layer.management.unwrap_or_default().finalize(),
		opa: layer.opa.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
		environment: layer
			.environment
			.unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
	};

	validate_config(&config)?;

	info!(
		host = %config.http.host,
		port = config.http.port,
		management_mode = %config.management.mode,
		management_port = config.management.port,
		opa_enabled = config.opa.enabled,
		opa_base_url = %config.opa.base_url,
		opa_policy_path = %config.opa.policy_path,
		excluded_paths = config.opa.excluded_paths.len(),
		environment = %config.environment,
		"Server configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
pub fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
	if !config.opa.enabled && config.is_production() {
		return Err(ConfigError::Validation(
			"WARDEN_OPA_ENABLED=false is set while WARDEN_ENV=production. \
			 This would authorize every request. Enable OPA or set WARDEN_ENV \
			 to a non-production value."
				.to_string(),
		));
	}

	if config.opa.connect_timeout_ms == 0 {
		return Err(ConfigError::InvalidValue {
			key: "opa.connect_timeout_ms".to_string(),
			message: "must be greater than zero".to_string(),
		});
	}

	if config.opa.read_timeout_ms == 0 {
		return Err(ConfigError::InvalidValue {
			key: "opa.read_timeout_ms".to_string(),
			message: "must be greater than zero".to_string(),
		});
	}

	if config.management.mode == ManagementMode::Separate
		&& config.management.port != 0
		&& config.management.port == config.http.port
	{
		return Err(ConfigError::Validation(format!(
			"management port {} equals the application port; use management.mode = \"same\" \
			 to serve management endpoints on the application listener",
			config.management.port
		)));
	}

	Ok(())
}
