// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Policy decision returned by OPA.
//!
//! Parsing is fail-closed: [`PolicyDecision::is_allow`] is `true` only when
//! `result` is an object whose `allow` field is the JSON boolean `true`.
//! A missing field, a non-boolean `allow`, a `null` result or a result that is
//! not an object all read as deny.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Field carrying the verdict. Every other field is a constraint value.
pub const ALLOW_FIELD: &str = "allow";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
	#[serde(default, deserialize_with = "object_or_none")]
	pub result: Option<Map<String, Value>>,
}

fn object_or_none<'de, D>(deserializer: D) -> Result<Option<Map<String, Value>>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(match Option::<Value>::deserialize(deserializer)? {
		Some(Value::Object(map)) => Some(map),
		_ => None,
	})
}

impl PolicyDecision {
	/// Builds a decision from a `result` value. Non-object values become `None`.
	pub fn from_result(result: Value) -> Self {
		match result {
			Value::Object(map) => Self { result: Some(map) },
			_ => Self { result: None },
		}
	}

	pub fn is_allow(&self) -> bool {
		matches!(
			self.result.as_ref().and_then(|r| r.get(ALLOW_FIELD)),
			Some(Value::Bool(true))
		)
	}

	/// Returns a single constraint value by name. `allow` is not a constraint.
	pub fn constraint(&self, name: &str) -> Option<&Value> {
		if name == ALLOW_FIELD {
			return None;
		}
		self.result.as_ref()?.get(name)
	}

	/// All result fields except `allow`.
	pub fn constraint_values(&self) -> Map<String, Value> {
		self
			.result
			.iter()
			.flatten()
			.filter(|(key, _)| key.as_str() != ALLOW_FIELD)
			.map(|(key, value)| (key.clone(), value.clone()))
			.collect()
	}
}
