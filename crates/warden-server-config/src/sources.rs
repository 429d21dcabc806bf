// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, TOML files and environment variables.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	HttpConfigLayer, LoggingConfigLayer, ManagementConfigLayer, ManagementMode, OpaConfigLayer,
};

/// Default location of the TOML config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/warden/server.toml";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults. Defaults live in each section's `finalize`, so this
/// contributes an empty layer.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file source. A missing file is skipped; an unreadable or invalid one is an error.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new(SYSTEM_CONFIG_PATH)
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!(?layer, "parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `WARDEN_<SECTION>_<FIELD>`, except the application listener
/// (`WARDEN_HOST`, `WARDEN_PORT`) and `WARDEN_ENV`. Empty values are treated
/// as unset.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			http: Some(load_http_from_env()?),
			management: Some(load_management_from_env()?),
			opa: Some(load_opa_from_env()?),
			logging: Some(LoggingConfigLayer {
				level: env_var("WARDEN_LOG_LEVEL"),
			}),
			environment: env_var("WARDEN_ENV"),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Result<Option<bool>, ConfigError> {
	env_var(name).map(|v| parse_bool(name, &v)).transpose()
}

fn env_u16(name: &str) -> Result<Option<u16>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u16 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u64 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
	match value.trim().to_ascii_lowercase().as_str() {
		"true" | "1" | "yes" | "on" => Ok(true),
		"false" | "0" | "no" | "off" => Ok(false),
		_ => Err(ConfigError::InvalidValue {
			key: key.to_string(),
			message: format!("invalid boolean value '{value}'"),
		}),
	}
}

/// Splits a comma-separated list, dropping blank entries.
///
/// Commas inside `{...}` or `[...]`, or escaped as `\,`, belong to the entry,
/// so regex quantifiers such as `/a{1,3}` survive intact.
fn parse_list(value: &str) -> Vec<String> {
	let mut entries = Vec::new();
	let mut current = String::new();
	let mut depth = 0usize;
	let mut chars = value.chars();

	while let Some(c) = chars.next() {
		match c {
			'\\' => {
				current.push(c);
				if let Some(escaped) = chars.next() {
					current.push(escaped);
				}
			}
			'{' | '[' => {
				depth += 1;
				current.push(c);
			}
			'}' | ']' => {
				depth = depth.saturating_sub(1);
				current.push(c);
			}
			',' if depth == 0 => entries.push(std::mem::take(&mut current)),
			_ => current.push(c),
		}
	}
	entries.push(current);

	entries
		.iter()
		.map(|entry| entry.trim())
		.filter(|entry| !entry.is_empty())
		.map(str::to_string)
		.collect()
}

fn load_http_from_env() -> Result<HttpConfigLayer, ConfigError> {
	Ok(HttpConfigLayer {
		host: env_var("WARDEN_HOST"),
		port: env_u16("WARDEN_PORT")?,
	})
}

fn load_management_from_env() -> Result<ManagementConfigLayer, ConfigError> {
	let mode = env_var("WARDEN_MANAGEMENT_MODE")
		.map(|v| {
			v.parse::<ManagementMode>()
				.map_err(|_| ConfigError::InvalidValue {
					key: "WARDEN_MANAGEMENT_MODE".to_string(),
					message: format!("unknown mode '{v}', expected separate, same or disabled"),
				})
		})
		.transpose()?;

	Ok(ManagementConfigLayer {
		mode,
		port: env_u16("WARDEN_MANAGEMENT_PORT")?,
	})
}

fn load_opa_from_env() -> Result<OpaConfigLayer, ConfigError> {
	Ok(OpaConfigLayer {
		enabled: env_bool("WARDEN_OPA_ENABLED")?,
		base_url: env_var("WARDEN_OPA_BASE_URL"),
		policy_path: env_var("WARDEN_OPA_POLICY_PATH"),
		connect_timeout_ms: env_u64("WARDEN_OPA_CONNECT_TIMEOUT_MS")?,
		read_timeout_ms: env_u64("WARDEN_OPA_READ_TIMEOUT_MS")?,
		excluded_paths: env_var("WARDEN_OPA_EXCLUDED_PATHS").map(|v| parse_list(&v)),
		include_headers: env_bool("WARDEN_OPA_INCLUDE_HEADERS")?,
	})
}
