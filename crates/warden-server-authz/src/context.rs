// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Request-scoped authorization state and its hand-off to spawned tasks.
//!
//! The gate stores an [`AuthzContext`] in the request extensions of every
//! granted request. It lives exactly as long as the request unless a handler
//! clones it into other work. Nothing is ambient: a spawned task only sees
//! the constraints it was explicitly given.
//!
//! ```ignore
//! async fn handler(Authz(ctx): Authz<OrderConstraints>) {
//!     ctx.spawn(|ctx| async move {
//!         audit(ctx.constraints()).await;
//!     });
//! }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use http::Method;
use tokio::task::JoinHandle;
use tracing::{info_span, instrument::Instrumented, Instrument, Span};
use warden_authz_core::{RequestContext, TRACE_TOKEN_HEADER};

use crate::voter::GrantSource;

/// Snapshot of one granted request's authorization.
///
/// Cloning shares the constraints; it does not copy them.
pub struct AuthzContext<C> {
	constraints: Arc<C>,
	source: GrantSource,
	trace_token: Option<String>,
	method: Method,
	path: String,
}

impl<C> AuthzContext<C> {
	pub fn new(constraints: C, source: GrantSource, request: &RequestContext<'_>) -> Self {
		Self {
			constraints: Arc::new(constraints),
			source,
			trace_token: request.header_str(TRACE_TOKEN_HEADER).map(str::to_string),
			method: request.method().clone(),
			path: request.path().to_string(),
		}
	}

	pub fn constraints(&self) -> &C {
		&self.constraints
	}

	pub fn shared_constraints(&self) -> Arc<C> {
		Arc::clone(&self.constraints)
	}

	pub fn source(&self) -> GrantSource {
		self.source
	}

	pub fn trace_token(&self) -> Option<&str> {
		self.trace_token.as_deref()
	}

	pub fn method(&self) -> &Method {
		&self.method
	}

	pub fn path(&self) -> &str {
		&self.path
	}

	/// A span carrying this request's trace token, method and path.
	pub fn span(&self) -> Span {
		info_span!(
			"authz_context",
			trace_token = self.trace_token.as_deref().unwrap_or(""),
			method = %self.method,
			path = %self.path,
			via = %self.source,
		)
	}

	/// Runs `future` inside [`span`](Self::span) on the current task.
	pub fn scope<F: Future>(&self, future: F) -> Instrumented<F> {
		future.instrument(self.span())
	}
}

impl<C> AuthzContext<C>
where
	C: Send + Sync + 'static,
{
	/// Spawns `f(snapshot)` on the tokio runtime inside [`span`](Self::span).
	///
	/// The continuation receives its own handle to this context and may
	/// outlive the request.
	pub fn spawn<F, Fut>(&self, f: F) -> JoinHandle<Fut::Output>
	where
		F: FnOnce(AuthzContext<C>) -> Fut,
		Fut: Future + Send + 'static,
		Fut::Output: Send + 'static,
	{
		let span = self.span();
		tokio::spawn(f(self.clone()).instrument(span))
	}
}

impl<C> Clone for AuthzContext<C> {
	fn clone(&self) -> Self {
		Self {
			constraints: Arc::clone(&self.constraints),
			source: self.source,
			trace_token: self.trace_token.clone(),
			method: self.method.clone(),
			path: self.path.clone(),
		}
	}
}

impl<C: fmt::Debug> fmt::Debug for AuthzContext<C> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AuthzContext")
			.field("constraints", &self.constraints)
			.field("source", &self.source)
			.field("trace_token", &self.trace_token)
			.field("method", &self.method)
			.field("path", &self.path)
			.finish()
	}
}
