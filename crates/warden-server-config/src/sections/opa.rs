// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Policy decision point configuration.

use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8181";
pub const DEFAULT_POLICY_PATH: &str = "http/authz";
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 500;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 2000;

fn default_excluded_paths() -> Vec<String> {
	vec!["/ping".to_string(), "/ping/.*".to_string()]
}

/// OPA authorization configuration (runtime, fully resolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaConfig {
	/// When false every request is authorized with default constraints.
	pub enabled: bool,
	pub base_url: String,
	pub policy_path: String,
	pub connect_timeout_ms: u64,
	pub read_timeout_ms: u64,
	/// Regular expressions matched against the whole request path.
	pub excluded_paths: Vec<String>,
	/// Adds request headers to the policy input under `headers`.
	pub include_headers: bool,
}

impl OpaConfig {
	pub fn connect_timeout(&self) -> Duration {
		Duration::from_millis(self.connect_timeout_ms)
	}

	pub fn read_timeout(&self) -> Duration {
		Duration::from_millis(self.read_timeout_ms)
	}
}

impl Default for OpaConfig {
	fn default() -> Self {
		OpaConfigLayer::default().finalize()
	}
}

/// OPA configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpaConfigLayer {
	#[serde(default)]
	pub enabled: Option<bool>,
	#[serde(default)]
	pub base_url: Option<String>,
	#[serde(default)]
	pub policy_path: Option<String>,
	#[serde(default)]
	pub connect_timeout_ms: Option<u64>,
	#[serde(default)]
	pub read_timeout_ms: Option<u64>,
	#[serde(default)]
	pub excluded_paths: Option<Vec<String>>,
	#[serde(default)]
	pub include_headers: Option<bool>,
}

impl OpaConfigLayer {
	pub fn merge(&mut self, other: OpaConfigLayer) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.base_url.is_some() {
			self.base_url = other.base_url;
		}
		if other.policy_path.is_some() {
			self.policy_path = other.policy_path;
		}
		if other.connect_timeout_ms.is_some() {
			self.connect_timeout_ms = other.connect_timeout_ms;
		}
		if other.read_timeout_ms.is_some() {
			self.read_timeout_ms = other.read_timeout_ms;
		}
		if other.excluded_paths.is_some() {
			self.excluded_paths = other.excluded_paths;
		}
		if other.include_headers.is_some() {
			self.include_headers = other.include_headers;
		}
	}

	pub fn finalize(self) -> OpaConfig {
		OpaConfig {
			enabled: self.enabled.unwrap_or(true),
			base_url: self
				.base_url
				.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
			policy_path: self
				.policy_path
				.unwrap_or_else(|| DEFAULT_POLICY_PATH.to_string()),
			connect_timeout_ms: self.connect_timeout_ms.unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
			read_timeout_ms: self.read_timeout_ms.unwrap_or(DEFAULT_READ_TIMEOUT_MS),
			excluded_paths: self.excluded_paths.unwrap_or_else(default_excluded_paths),
			include_headers: self.include_headers.unwrap_or(false),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = OpaConfig::default();
		assert!(config.enabled);
		assert_eq!(config.base_url, "http://localhost:8181");
		assert_eq!(config.policy_path, "http/authz");
		assert_eq!(config.connect_timeout(), Duration::from_millis(500));
		assert_eq!(config.read_timeout(), Duration::from_secs(2));
		assert_eq!(config.excluded_paths, vec!["/ping", "/ping/.*"]);
		assert!(!config.include_headers);
	}

	#[test]
	fn test_empty_exclusions_stay_empty() {
		let layer = OpaConfigLayer {
			excluded_paths: Some(vec![]),
			..Default::default()
		};
		assert!(layer.finalize().excluded_paths.is_empty());
	}

	#[test]
	fn test_merge_overwrites_only_present_fields() {
		let mut base = OpaConfigLayer {
			base_url: Some("http://opa:8181".to_string()),
			read_timeout_ms: Some(1000),
			..Default::default()
		};
		base.merge(OpaConfigLayer {
			read_timeout_ms: Some(250),
			include_headers: Some(true),
			..Default::default()
		});

		let config = base.finalize();
		assert_eq!(config.base_url, "http://opa:8181");
		assert_eq!(config.read_timeout_ms, 250);
		assert!(config.include_headers);
	}
}
