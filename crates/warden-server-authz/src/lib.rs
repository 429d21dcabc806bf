// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! OPA-backed authorization for axum services.
//!
//! # Architecture
//!
//! Every request passes through an [`AccessGate`] that consults its voters in
//! a fixed order and stops at the first grant or deny:
//!
//! 1. [`ManagementPortVoter`] - grants requests that arrived on the separate
//!    management listener
//! 2. [`PathExclusionVoter`] - grants requests whose path matches an excluded
//!    pattern
//! 3. [`OpaVoter`] - asks OPA and grants only on an explicit `allow: true`
//!
//! If nobody grants, the request is denied. A voter that panics counts as a
//! deny. Denied requests get `403 Forbidden` and never reach the handler.
//!
//! On a grant the policy's constraint values are materialized onto the
//! service's constraints type and stored as an [`AuthzContext`] in the request
//! extensions, where handlers read it through the [`Authz`] extractor.
//!
//! # Example
//!
//! ```ignore
//! use warden_server_authz::{AccessGate, Authz, AuthzLayer};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct Constraints { admin: bool }
//!
//! async fn handler(Authz(ctx): Authz<Constraints>) -> String {
//!     format!("admin: {}", ctx.constraints().admin)
//! }
//!
//! let gate = AccessGate::builder()
//!     .excluded_paths(["/ping"])
//!     .decision_client(opa_client)
//!     .build()?;
//!
//! let app = Router::new()
//!     .route("/orders", get(handler))
//!     .layer(AuthzLayer::<Constraints>::new(gate));
//! ```

mod context;
mod extract;
mod gate;
mod layer;
mod response;
mod voter;

pub use context::AuthzContext;
pub use extract::{Authz, MissingAuthzContext};
pub use gate::{AccessGate, AccessGateBuilder, AuthzOutcome, GateBuildError};
pub use layer::{AuthzLayer, AuthzService};
pub use response::{forbidden_response, ErrorResponse};
pub use voter::{
	DenyReason, Grant, GrantSource, ManagementPort, ManagementPortVoter, OpaVoter,
	PathExclusionVoter, Vote, Voter,
};
