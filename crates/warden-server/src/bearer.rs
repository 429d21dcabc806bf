// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Minimal bearer token pickup.
//!
//! Copies the raw `Authorization: Bearer <token>` value into the request
//! extensions as a [`BearerToken`] so it ends up in the policy input. The
//! token is not validated here; policies decide what it is worth.

use axum::{
	body::Body,
	http::{header::AUTHORIZATION, HeaderMap, Request},
	middleware::Next,
	response::Response,
};
use tracing::instrument;
use warden_authz_core::BearerToken;

/// Returns the bearer token from the `Authorization` header, if any.
///
/// The scheme is matched case-insensitively; an empty token is ignored.
pub fn bearer_from_headers(headers: &HeaderMap) -> Option<BearerToken> {
	let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
	let (scheme, token) = value.split_once(' ')?;
	let token = token.trim();
	if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
		return None;
	}
	Some(BearerToken::new(token))
}

#[instrument(name = "bearer_layer", skip_all)]
pub async fn bearer_layer(mut request: Request<Body>, next: Next) -> Response {
	if let Some(token) = bearer_from_headers(request.headers()) {
		tracing::trace!("bearer token present");
		request.extensions_mut().insert(token);
	}
	next.run(request).await
}
