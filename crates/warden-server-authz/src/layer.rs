// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Tower layer that runs the [`AccessGate`] in front of a service.

use std::marker::PhantomData;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{body::Body, http::Request, response::Response};
use futures::future::BoxFuture;
use tower::{Layer, Service};
use tracing::{info_span, Instrument};
use warden_authz_core::{Constraints, RequestContext, TRACE_TOKEN_HEADER};

use crate::context::AuthzContext;
use crate::gate::{AccessGate, AuthzOutcome};
use crate::response::forbidden_response;

/// Authorizes every request before it reaches the wrapped service.
///
/// Denied requests are answered with `403 Forbidden`. Granted requests carry
/// an [`AuthzContext<C>`] in their extensions.
pub struct AuthzLayer<C> {
	gate: Arc<AccessGate>,
	_constraints: PhantomData<fn() -> C>,
}

impl<C> AuthzLayer<C> {
	pub fn new(gate: AccessGate) -> Self {
		Self::shared(Arc::new(gate))
	}

	pub fn shared(gate: Arc<AccessGate>) -> Self {
		Self {
			gate,
			_constraints: PhantomData,
		}
	}
}

impl<C> Clone for AuthzLayer<C> {
	fn clone(&self) -> Self {
		Self::shared(Arc::clone(&self.gate))
	}
}

impl<S, C> Layer<S> for AuthzLayer<C> {
	type Service = AuthzService<S, C>;

	fn layer(&self, inner: S) -> Self::Service {
		AuthzService {
			inner,
			gate: Arc::clone(&self.gate),
			_constraints: PhantomData,
		}
	}
}

/// Service wrapper for [`AuthzLayer`].
pub struct AuthzService<S, C> {
	inner: S,
	gate: Arc<AccessGate>,
	_constraints: PhantomData<fn() -> C>,
}

impl<S: Clone, C> Clone for AuthzService<S, C> {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
			gate: Arc::clone(&self.gate),
			_constraints: PhantomData,
		}
	}
}

impl<S, C> Service<Request<Body>> for AuthzService<S, C>
where
	S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
	S::Future: Send,
	C: Constraints,
{
	type Response = Response;
	type Error = S::Error;
	type Future = BoxFuture<'static, Result<Response, S::Error>>;

	fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.inner.poll_ready(cx)
	}

	fn call(&mut self, req: Request<Body>) -> Self::Future {
		// The readied service goes into the future; a fresh clone stays behind.
		let clone = self.inner.clone();
		let mut inner = std::mem::replace(&mut self.inner, clone);
		let gate = Arc::clone(&self.gate);

		let span = info_span!(
			"authz",
			method = %req.method(),
			path = %req.uri().path(),
			trace_token = req
				.headers()
				.get(TRACE_TOKEN_HEADER)
				.and_then(|v| v.to_str().ok())
				.unwrap_or(""),
		);

		Box::pin(
			async move {
				let (mut parts, body) = req.into_parts();

				let context = {
					let request = RequestContext::from_parts(&parts);
					match gate.authorize::<C>(&request).await {
						AuthzOutcome::Granted { via, constraints } => {
							AuthzContext::new(constraints, via, &request)
						}
						AuthzOutcome::Denied { reason } => {
							tracing::info!(reason = %reason, "request forbidden");
							return Ok(forbidden_response());
						}
					}
				};

				parts.extensions.insert(context);
				inner.call(Request::from_parts(parts, body)).await
			}
			.instrument(span),
		)
	}
}
