// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Policy input document construction.
//!
//! The input is a pure function of the request and the extension registry:
//!
//! ```text
//! {
//!   "jwt": "<bearer token, omitted when unauthenticated>",
//!   "path": ["api", "v1", "thing"],
//!   "httpMethod": "GET",
//!   "traceToken": "<Trace-Token header or null>",
//!   "extensions": { "<namespace>": <extension output>, ... }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::extension::InputExtensionRegistry;
use crate::request::RequestContext;

/// Inbound header carrying the correlation id.
pub const TRACE_TOKEN_HEADER: &str = "Trace-Token";

/// The document sent to OPA as `{"input": <PolicyInput>}`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyInput {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub jwt: Option<String>,
	pub path: Vec<String>,
	pub http_method: String,
	pub trace_token: Option<String>,
	#[serde(default)]
	pub extensions: BTreeMap<String, Value>,
}

impl fmt::Debug for PolicyInput {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PolicyInput")
			.field("jwt", &self.jwt.as_ref().map(|_| "[REDACTED]"))
			.field("path", &self.path)
			.field("http_method", &self.http_method)
			.field("trace_token", &self.trace_token)
			.field("extensions", &self.extensions)
			.finish()
	}
}

/// Splits a request path into its non-empty, percent-decoded segments.
///
/// `"/api/v1/thing/"` becomes `["api", "v1", "thing"]`; `""` and `"/"` become `[]`.
/// Splitting happens before decoding, so an encoded `%2F` stays inside its
/// segment. Invalid UTF-8 is replaced with `U+FFFD`.
pub fn path_segments(path: &str) -> Vec<String> {
	path
		.split('/')
		.filter(|segment| !segment.is_empty())
		.map(|segment| {
			let decoded = urlencoding::decode_binary(segment.as_bytes());
			String::from_utf8_lossy(&decoded).into_owned()
		})
		.collect()
}

/// Builds [`PolicyInput`] documents for requests.
///
/// Cheap to clone; the registry is shared.
#[derive(Debug, Clone, Default)]
pub struct PolicyInputBuilder {
	registry: InputExtensionRegistry,
}

impl PolicyInputBuilder {
	pub fn new(registry: InputExtensionRegistry) -> Self {
		Self { registry }
	}

	pub fn registry(&self) -> &InputExtensionRegistry {
		&self.registry
	}

	#[instrument(
		level = "trace",
		skip_all,
		fields(method = %request.method(), path = request.path())
	)]
	pub fn build(&self, request: &RequestContext<'_>) -> PolicyInput {
		let extensions = self
			.registry
			.iter()
			.map(|(namespace, extension)| (namespace.to_string(), extension.compute(request)))
			.collect();

		PolicyInput {
			jwt: request.bearer_token().map(|t| t.expose().to_string()),
			path: path_segments(request.path()),
			http_method: request.method().as_str().to_ascii_uppercase(),
			trace_token: request.header_str(TRACE_TOKEN_HEADER).map(str::to_string),
			extensions,
		}
	}
}
