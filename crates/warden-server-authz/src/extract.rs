// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::ops::Deref;

use axum::{
	extract::FromRequestParts,
	http::request::Parts,
	response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, instrument};
use warden_authz_core::Constraints;

use crate::context::AuthzContext;
use crate::response::internal_error_response;

/// Extractor for the authorization context of a granted request.
///
/// # Example
///
/// ```ignore
/// async fn list_orders(Authz(ctx): Authz<OrderConstraints>) -> impl IntoResponse {
///     if ctx.constraints().admin {
///         // ...
///     }
/// }
/// ```
///
/// The constraints type must match the one [`AuthzLayer`](crate::AuthzLayer)
/// was built with; otherwise extraction fails with `500`.
pub struct Authz<C>(pub AuthzContext<C>);

impl<C> Deref for Authz<C> {
	type Target = AuthzContext<C>;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

#[derive(Debug, Error)]
#[error("authorization context missing from request")]
pub struct MissingAuthzContext;

impl IntoResponse for MissingAuthzContext {
	fn into_response(self) -> Response {
		internal_error_response("Authorization context unavailable")
	}
}

impl<C, S> FromRequestParts<S> for Authz<C>
where
	C: Constraints,
	S: Send + Sync,
{
	type Rejection = MissingAuthzContext;

	#[instrument(name = "Authz::from_request_parts", skip_all)]
	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		match parts.extensions.get::<AuthzContext<C>>() {
			Some(ctx) => Ok(Authz(ctx.clone())),
			None => {
				error!(
					constraints = std::any::type_name::<C>(),
					path = parts.uri.path(),
					"no authorization context for this constraints type; is AuthzLayer installed?"
				);
				Err(MissingAuthzContext)
			}
		}
	}
}
