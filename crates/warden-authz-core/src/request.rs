// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Borrowed view of an inbound request.

use std::fmt;

use http::request::Parts;
use http::{Extensions, HeaderMap, Method, Request, Uri};

/// Raw bearer token of an already-authenticated principal.
///
/// Inserted into request extensions by whatever authenticates the request
/// upstream. The value is never validated here and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
	pub fn new(token: impl Into<String>) -> Self {
		Self(token.into())
	}

	/// Returns the raw token. Do not log the result.
	pub fn expose(&self) -> &str {
		&self.0
	}
}

impl fmt::Debug for BearerToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("BearerToken([REDACTED])")
	}
}

/// Local port of the listener that accepted the request.
///
/// The hosting server inserts this per listener so the management-port voter
/// can tell monitoring traffic apart from application traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerPort(pub u16);

/// Everything the authorization pipeline reads from a request.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
	method: &'a Method,
	uri: &'a Uri,
	headers: &'a HeaderMap,
	extensions: &'a Extensions,
}

impl<'a> RequestContext<'a> {
	pub fn new(
		method: &'a Method,
		uri: &'a Uri,
		headers: &'a HeaderMap,
		extensions: &'a Extensions,
	) -> Self {
		Self {
			method,
			uri,
			headers,
			extensions,
		}
	}

	pub fn from_parts(parts: &'a Parts) -> Self {
		Self::new(&parts.method, &parts.uri, &parts.headers, &parts.extensions)
	}

	pub fn from_request<B>(request: &'a Request<B>) -> Self {
		Self::new(
			request.method(),
			request.uri(),
			request.headers(),
			request.extensions(),
		)
	}

	pub fn method(&self) -> &'a Method {
		self.method
	}

	/// The request path without query string.
	pub fn path(&self) -> &'a str {
		self.uri.path()
	}

	pub fn headers(&self) -> &'a HeaderMap {
		self.headers
	}

	pub fn extensions(&self) -> &'a Extensions {
		self.extensions
	}

	/// Returns a header value if present and valid UTF-8.
	pub fn header_str(&self, name: &str) -> Option<&'a str> {
		self.headers.get(name)?.to_str().ok()
	}

	pub fn bearer_token(&self) -> Option<&'a BearerToken> {
		self.extensions.get::<BearerToken>()
	}

	pub fn listener_port(&self) -> Option<u16> {
		self.extensions.get::<ListenerPort>().map(|p| p.0)
	}
}
