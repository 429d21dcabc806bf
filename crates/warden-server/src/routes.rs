// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! HTTP routes for the application and management listeners.

use axum::{routing::get, Json, Router};
use serde::Serialize;
use serde_json::{Map, Value};
use warden_server_authz::Authz;

use crate::version::BuildInfo;

/// Constraints as returned by the policy, untyped.
pub type ServiceConstraints = Map<String, Value>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
	pub status: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintsResponse {
	pub granted_via: &'static str,
	pub trace_token: Option<String>,
	pub constraints: ServiceConstraints,
}

pub async fn health() -> Json<HealthResponse> {
	Json(HealthResponse { status: "ok" })
}

pub async fn info() -> Json<BuildInfo> {
	Json(BuildInfo::current())
}

pub async fn ping() -> &'static str {
	"pong"
}

pub async fn constraints(Authz(ctx): Authz<ServiceConstraints>) -> Json<ConstraintsResponse> {
	Json(ConstraintsResponse {
		granted_via: ctx.source().as_str(),
		trace_token: ctx.trace_token().map(str::to_string),
		constraints: ctx.constraints().clone(),
	})
}

/// `GET /health` and `GET /info`.
pub fn management_routes() -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/info", get(info))
}

/// `GET /ping` and `GET /constraints`.
pub fn application_routes() -> Router {
	Router::new()
		.route("/ping", get(ping))
		.route("/constraints", get(constraints))
}
