// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Management (health/info) listener configuration.
//!
//! Requests arriving on a separate management listener bypass policy
//! evaluation entirely, so the management port must never be reachable from
//! untrusted networks.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_MANAGEMENT_PORT: u16 = 8081;

/// Where management endpoints are served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagementMode {
	/// On their own listener; requests on it are always authorized.
	#[default]
	Separate,
	/// On the application listener, subject to policy like any other route.
	Same,
	/// Not served at all.
	Disabled,
}

impl ManagementMode {
	pub fn as_str(&self) -> &'static str {
		match self {
			ManagementMode::Separate => "separate",
			ManagementMode::Same => "same",
			ManagementMode::Disabled => "disabled",
		}
	}
}

impl fmt::Display for ManagementMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ManagementMode {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"separate" => Ok(ManagementMode::Separate),
			"same" => Ok(ManagementMode::Same),
			"disabled" => Ok(ManagementMode::Disabled),
			other => Err(ConfigError::InvalidValue {
				key: "management.mode".to_string(),
				message: format!("unknown mode '{other}', expected separate, same or disabled"),
			}),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagementConfig {
	pub mode: ManagementMode,
	/// Port for the separate listener. `0` binds an ephemeral port.
	pub port: u16,
}

impl Default for ManagementConfig {
	fn default() -> Self {
		Self {
			mode: ManagementMode::default(),
			port: DEFAULT_MANAGEMENT_PORT,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManagementConfigLayer {
	#[serde(default)]
	pub mode: Option<ManagementMode>,
	#[serde(default)]
	pub port: Option<u16>,
}

impl ManagementConfigLayer {
	pub fn merge(&mut self, other: ManagementConfigLayer) {
		if other.mode.is_some() {
			self.mode = other.mode;
		}
		if other.port.is_some() {
			self.port = other.port;
		}
	}

	pub fn finalize(self) -> ManagementConfig {
		ManagementConfig {
			mode: self.mode.unwrap_or_default(),
			port: self.port.unwrap_or(DEFAULT_MANAGEMENT_PORT),
		}
	}
}
