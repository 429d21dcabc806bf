// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration as produced by a single source.

use serde::Deserialize;

use crate::sections::{HttpConfigLayer, LoggingConfigLayer, ManagementConfigLayer, OpaConfigLayer};

/// One source's view of the configuration. Absent values defer to
/// lower-precedence sources.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub http: Option<HttpConfigLayer>,
	#[serde(default)]
	pub management: Option<ManagementConfigLayer>,
	#[serde(default)]
	pub opa: Option<OpaConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
	#[serde(default)]
	pub environment: Option<String>,
}

impl ServerConfigLayer {
	/// Overlays `other` onto `self`; values present in `other` win.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_section(&mut self.http, other.http, HttpConfigLayer::merge);
		merge_section(&mut self.management, other.management, ManagementConfigLayer::merge);
		merge_section(&mut self.opa, other.opa, OpaConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
		if other.environment.is_some() {
			self.environment = other.environment;
		}
	}
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: fn(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(existing), Some(incoming)) => merge(existing, incoming),
		(None, Some(incoming)) => *base = Some(incoming),
		(_, None) => {}
	}
}
