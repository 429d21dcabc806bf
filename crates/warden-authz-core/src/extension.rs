// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Pluggable policy input extensions.
//!
//! Each extension contributes one JSON value to `input.extensions` under its
//! namespace. Extensions are registered once at startup into an immutable
//! [`InputExtensionRegistry`]; namespaces must be unique and non-empty.
//!
//! # Namespaces
//!
//! By default the namespace is derived from the implementing type's name:
//! one of the suffixes `OpaInputExtension`, `InputExtension` or `Extension` is
//! stripped (longest first) and the first character is lower-cased, so
//! `CustomDataOpaInputExtension`, `CustomDataInputExtension` and
//! `CustomDataExtension` all become `customData`. Override
//! [`InputExtension::namespace`] or use
//! [`InputExtensionRegistryBuilder::register_as`] to pick a name explicitly.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::header::{AUTHORIZATION, COOKIE, PROXY_AUTHORIZATION};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::request::RequestContext;

/// Suffixes stripped from type names, longest first.
const NAMESPACE_SUFFIXES: [&str; 3] = ["OpaInputExtension", "InputExtension", "Extension"];

/// A provider of one namespaced sub-document of the policy input.
///
/// Implementations must be pure: the same request yields the same value.
pub trait InputExtension: Send + Sync + 'static {
	fn namespace(&self) -> Cow<'static, str> {
		Cow::Owned(derive_namespace(std::any::type_name::<Self>()))
	}

	fn compute(&self, request: &RequestContext<'_>) -> Value;
}

/// Derives an extension namespace from a (possibly fully qualified) type name.
///
/// Module paths and generic arguments are discarded before the suffix is
/// stripped. May return an empty string, which the registry rejects.
pub fn derive_namespace(type_name: &str) -> String {
	let base = type_name.split('<').next().unwrap_or(type_name);
	let short = base.rsplit("::").next().unwrap_or(base);
	let stripped = NAMESPACE_SUFFIXES
		.iter()
		.find_map(|suffix| short.strip_suffix(suffix))
		.unwrap_or(short);

	let mut chars = stripped.chars();
	match chars.next() {
		Some(first) => first.to_lowercase().chain(chars).collect(),
		None => String::new(),
	}
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
	#[error("input extensions {first} and {second} both use namespace '{namespace}'")]
	DuplicateNamespace {
		namespace: String,
		first: String,
		second: String,
	},

	#[error("input extension {type_name} resolves to an empty namespace")]
	EmptyNamespace { type_name: String },
}

struct RegisteredExtension {
	namespace: String,
	extension: Arc<dyn InputExtension>,
}

/// Immutable, shared set of input extensions.
#[derive(Clone, Default)]
pub struct InputExtensionRegistry {
	entries: Arc<[RegisteredExtension]>,
}

impl InputExtensionRegistry {
	pub fn builder() -> InputExtensionRegistryBuilder {
		InputExtensionRegistryBuilder::default()
	}

	pub fn empty() -> Self {
		Self::default()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn InputExtension)> {
		self
			.entries
			.iter()
			.map(|e| (e.namespace.as_str(), e.extension.as_ref()))
	}

	pub fn namespaces(&self) -> Vec<&str> {
		self.entries.iter().map(|e| e.namespace.as_str()).collect()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl fmt::Debug for InputExtensionRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("InputExtensionRegistry")
			.field("namespaces", &self.namespaces())
			.finish()
	}
}

struct PendingExtension {
	type_name: &'static str,
	namespace: Option<String>,
	extension: Arc<dyn InputExtension>,
}

#[derive(Default)]
pub struct InputExtensionRegistryBuilder {
	pending: Vec<PendingExtension>,
}

impl InputExtensionRegistryBuilder {
	/// Registers an extension under its own namespace.
	pub fn register<E: InputExtension>(mut self, extension: E) -> Self {
		self.pending.push(PendingExtension {
			type_name: std::any::type_name::<E>(),
			namespace: None,
			extension: Arc::new(extension),
		});
		self
	}

	/// Registers an extension under an explicit namespace, ignoring the one it reports.
	pub fn register_as<E: InputExtension>(mut self, namespace: impl Into<String>, extension: E) -> Self {
		self.pending.push(PendingExtension {
			type_name: std::any::type_name::<E>(),
			namespace: Some(namespace.into()),
			extension: Arc::new(extension),
		});
		self
	}

	pub fn register_shared(mut self, extension: Arc<dyn InputExtension>) -> Self {
		self.pending.push(PendingExtension {
			type_name: "dyn InputExtension",
			namespace: None,
			extension,
		});
		self
	}

	/// Resolves namespaces and checks that they are unique and non-empty.
	pub fn build(self) -> Result<InputExtensionRegistry, RegistryError> {
		let mut owners: HashMap<String, &'static str> = HashMap::new();
		let mut entries = Vec::with_capacity(self.pending.len());

		for pending in self.pending {
			let namespace = pending
				.namespace
				.unwrap_or_else(|| pending.extension.namespace().into_owned());

			if namespace.is_empty() {
				return Err(RegistryError::EmptyNamespace {
					type_name: pending.type_name.to_string(),
				});
			}

			if let Some(first) = owners.get(&namespace) {
				return Err(RegistryError::DuplicateNamespace {
					namespace,
					first: first.to_string(),
					second: pending.type_name.to_string(),
				});
			}

			debug!(namespace = %namespace, extension = pending.type_name, "registered policy input extension");
			owners.insert(namespace.clone(), pending.type_name);
			entries.push(RegisteredExtension {
				namespace,
				extension: pending.extension,
			});
		}

		Ok(InputExtensionRegistry {
			entries: entries.into(),
		})
	}
}

/// Contributes the request headers under the `headers` namespace.
///
/// Header names are lower-cased; repeated headers are joined with `", "`.
/// Credentials (`authorization`, `proxy-authorization`, `cookie`) and values
/// that are not valid UTF-8 are left out.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadersInputExtension;

impl InputExtension for HeadersInputExtension {
	fn compute(&self, request: &RequestContext<'_>) -> Value {
		let mut headers = Map::new();

		for name in request.headers().keys() {
			if *name == AUTHORIZATION || *name == PROXY_AUTHORIZATION || *name == COOKIE {
				continue;
			}

			let values: Vec<&str> = request
				.headers()
				.get_all(name)
				.iter()
				.filter_map(|v| v.to_str().ok())
				.collect();

			if !values.is_empty() {
				headers.insert(name.as_str().to_string(), Value::String(values.join(", ")));
			}
		}

		Value::Object(headers)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use http::Request;
	use proptest::prelude::*;
	use serde_json::json;

	struct CustomDataOpaInputExtension;
	impl InputExtension for CustomDataOpaInputExtension {
		fn compute(&self, _: &RequestContext<'_>) -> Value {
			json!(1)
		}
	}

	struct CustomDataInputExtension;
	impl InputExtension for CustomDataInputExtension {
		fn compute(&self, _: &RequestContext<'_>) -> Value {
			json!(2)
		}
	}

	struct CustomDataExtension;
	impl InputExtension for CustomDataExtension {
		fn compute(&self, _: &RequestContext<'_>) -> Value {
			json!(3)
		}
	}

	struct Extension;
	impl InputExtension for Extension {
		fn compute(&self, _: &RequestContext<'_>) -> Value {
			Value::Null
		}
	}

	struct NamedExtension;
	impl InputExtension for NamedExtension {
		fn namespace(&self) -> Cow<'static, str> {
			Cow::Borrowed("explicit")
		}

		fn compute(&self, _: &RequestContext<'_>) -> Value {
			json!("named")
		}
	}

	#[test]
	fn derive_strips_known_suffixes() {
		assert_eq!(derive_namespace("CustomDataOpaInputExtension"), "customData");
		assert_eq!(derive_namespace("CustomDataInputExtension"), "customData");
		assert_eq!(derive_namespace("CustomDataExtension"), "customData");
		assert_eq!(derive_namespace("Headers"), "headers");
	}

	#[test]
	fn derive_ignores_module_path_and_generics() {
		assert_eq!(
			derive_namespace("my_service::authz::TenantInputExtension<alloc::string::String>"),
			"tenant"
		);
	}

	#[test]
	fn derive_strips_only_one_suffix() {
		assert_eq!(derive_namespace("ExtensionExtension"), "extension");
	}

	#[test]
	fn trait_default_namespace_uses_type_name() {
		assert_eq!(CustomDataOpaInputExtension.namespace(), "customData");
		assert_eq!(HeadersInputExtension.namespace(), "headers");
		assert_eq!(NamedExtension.namespace(), "explicit");
	}

	#[test]
	fn duplicate_namespaces_are_rejected() {
		let err = InputExtensionRegistry::builder()
			.register(CustomDataOpaInputExtension)
			.register(CustomDataExtension)
			.build()
			.unwrap_err();

		assert!(matches!(
			err,
			RegistryError::DuplicateNamespace { ref namespace, .. } if namespace == "customData"
		));
	}

	#[test]
	fn explicit_namespace_wins() {
		let registry = InputExtensionRegistry::builder()
			.register(CustomDataOpaInputExtension)
			.register_as("other", CustomDataInputExtension)
			.register(NamedExtension)
			.build()
			.unwrap();

		assert_eq!(registry.namespaces(), vec!["customData", "other", "explicit"]);
	}

	#[test]
	fn empty_namespace_is_rejected() {
		let err = InputExtensionRegistry::builder()
			.register(Extension)
			.build()
			.unwrap_err();
		assert!(matches!(err, RegistryError::EmptyNamespace { .. }));

		let err = InputExtensionRegistry::builder()
			.register_as("", CustomDataExtension)
			.build()
			.unwrap_err();
		assert!(matches!(err, RegistryError::EmptyNamespace { .. }));
	}

	#[test]
	fn headers_extension_skips_credentials() {
		let request = Request::builder()
			.uri("/")
			.header("Authorization", "Bearer abc")
			.header("Cookie", "session=1")
			.header("Accept", "application/json")
			.header("X-Forwarded-For", "10.0.0.1")
			.header("X-Forwarded-For", "10.0.0.2")
			.body(())
			.unwrap();

		let value = HeadersInputExtension.compute(&RequestContext::from_request(&request));

		assert_eq!(
			value,
			json!({
				"accept": "application/json",
				"x-forwarded-for": "10.0.0.1, 10.0.0.2"
			})
		);
	}

	proptest! {
		#[test]
		fn every_suffix_normalizes_the_same(stem in "[A-Z][a-z]{0,12}") {
			let expected = derive_namespace(&stem);
			for suffix in NAMESPACE_SUFFIXES {
				prop_assert_eq!(derive_namespace(&format!("{stem}{suffix}")), expected.clone());
			}
		}
	}
}
