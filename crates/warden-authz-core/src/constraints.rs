// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Materializing policy constraints onto an application-defined type.
//!
//! Applications describe the extra decision fields they care about as a plain
//! struct:
//!
//! ```ignore
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct OrderConstraints {
//!     admin: bool,
//!     max_amount: Option<u64>,
//! }
//! ```
//!
//! Decision fields are matched to struct fields by name. Unknown fields are
//! ignored and fields the policy did not return keep their `Default` value.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::decision::PolicyDecision;

/// Marker for types that can hold policy constraints.
///
/// Implemented for every `Serialize + DeserializeOwned + Default + Clone` type,
/// including `()` for services that ignore constraints and
/// `serde_json::Map<String, Value>` for services that want them untyped.
pub trait Constraints: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {}

impl<T> Constraints for T where T: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {}

#[derive(Debug, Error)]
pub enum ConstraintsError {
	#[error("policy constraints do not match the constraints type: {0}")]
	Mismatch(#[from] serde_json::Error),
}

/// Populates `C` from the constraint values of `decision`.
///
/// The defaults of `C` are laid down first and the decision's values are
/// overlaid, so `C` does not need `#[serde(default)]` for missing fields.
/// A value of the wrong type (e.g. `"admin": "yes"` for a `bool`) is an error.
pub fn materialize<C: Constraints>(decision: &PolicyDecision) -> Result<C, ConstraintsError> {
	let Value::Object(mut merged) = serde_json::to_value(C::default())? else {
		return Ok(C::default());
	};

	merged.extend(decision.constraint_values());
	Ok(serde_json::from_value(Value::Object(merged))?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde::Deserialize;
	use serde_json::{json, Map};

	#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
	struct OrderConstraints {
		admin: bool,
		region: String,
		max_amount: Option<u64>,
	}

	impl OrderConstraints {
		fn is_admin(&self) -> bool {
			self.admin
		}
	}

	fn decision(result: Value) -> PolicyDecision {
		PolicyDecision::from_result(result)
	}

	#[test]
	fn maps_fields_by_name() {
		let c: OrderConstraints = materialize(&decision(json!({
			"allow": true,
			"admin": true,
			"region": "eu",
			"max_amount": 500
		})))
		.unwrap();

		assert!(c.is_admin());
		assert_eq!(c.region, "eu");
		assert_eq!(c.max_amount, Some(500));
	}

	#[test]
	fn missing_fields_keep_defaults() {
		let c: OrderConstraints = materialize(&decision(json!({ "allow": true }))).unwrap();
		assert_eq!(c, OrderConstraints::default());
	}

	#[test]
	fn unknown_fields_are_ignored() {
		let c: OrderConstraints = materialize(&decision(json!({
			"allow": true,
			"admin": true,
			"unrelated": [1, 2, 3]
		})))
		.unwrap();
		assert!(c.admin);
	}

	#[test]
	fn type_mismatch_is_an_error() {
		let result: Result<OrderConstraints, _> =
			materialize(&decision(json!({ "allow": true, "admin": "yes" })));
		assert!(matches!(result, Err(ConstraintsError::Mismatch(_))));
	}

	#[test]
	fn unit_constraints_ignore_everything() {
		let result: Result<(), _> = materialize(&decision(json!({ "allow": true, "admin": true })));
		assert!(result.is_ok());
	}

	#[test]
	fn untyped_constraints_keep_all_values() {
		let c: Map<String, Value> =
			materialize(&decision(json!({ "allow": true, "admin": true }))).unwrap();
		assert_eq!(c.len(), 1);
		assert_eq!(c["admin"], json!(true));
	}
}
