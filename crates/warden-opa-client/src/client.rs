// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! OPA REST API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use tracing::{debug, instrument, trace, warn};
use warden_authz_core::{PolicyDecision, PolicyInput};

use crate::error::OpaError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8181";
pub const DEFAULT_POLICY_PATH: &str = "http/authz";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Source of policy decisions.
///
/// Implemented by [`OpaClient`]; tests substitute their own.
#[async_trait]
pub trait PolicyDecisionClient: Send + Sync {
	async fn decide(&self, input: &PolicyInput) -> Result<PolicyDecision, OpaError>;
}

#[derive(Debug, Clone)]
pub struct OpaClientConfig {
	/// OPA server URL, e.g. `http://localhost:8181`.
	pub base_url: String,
	/// Package path under `/v1/data/`, e.g. `http/authz`.
	pub policy_path: String,
	pub connect_timeout: Duration,
	pub read_timeout: Duration,
}

impl Default for OpaClientConfig {
	fn default() -> Self {
		Self {
			base_url: DEFAULT_BASE_URL.to_string(),
			policy_path: DEFAULT_POLICY_PATH.to_string(),
			connect_timeout: DEFAULT_CONNECT_TIMEOUT,
			read_timeout: DEFAULT_READ_TIMEOUT,
		}
	}
}

#[derive(Serialize)]
struct OpaRequest<'a> {
	input: &'a PolicyInput,
}

/// HTTP client for the OPA data API.
#[derive(Debug, Clone)]
pub struct OpaClient {
	http_client: Client,
	decision_url: Url,
	health_url: Url,
}

impl OpaClient {
	pub fn new(config: OpaClientConfig) -> Result<Self, OpaError> {
		let base_url = config.base_url.trim_end_matches('/');
		let policy_path = config.policy_path.trim_matches('/');

		let decision_url = parse_url(format!("{base_url}/v1/data/{policy_path}"))?;
		let health_url = parse_url(format!("{base_url}/health"))?;

		let http_client =
			warden_common_http::new_client_with_timeouts(config.connect_timeout, config.read_timeout)
				.map_err(OpaError::ClientBuild)?;

		debug!(
			url = %decision_url,
			connect_timeout_ms = config.connect_timeout.as_millis() as u64,
			read_timeout_ms = config.read_timeout.as_millis() as u64,
			"OPA client configured"
		);

		Ok(Self {
			http_client,
			decision_url,
			health_url,
		})
	}

	pub fn decision_url(&self) -> &str {
		self.decision_url.as_str()
	}

	/// Returns true if OPA answers its health endpoint with a success status.
	#[instrument(skip(self), fields(url = %self.health_url))]
	pub async fn health(&self) -> bool {
		match self.http_client.get(self.health_url.clone()).send().await {
			Ok(response) => {
				let healthy = response.status().is_success();
				debug!(status = %response.status(), healthy, "OPA health probe");
				healthy
			}
			Err(e) => {
				warn!(error = %e, "OPA health probe failed");
				false
			}
		}
	}
}

fn parse_url(url: String) -> Result<Url, OpaError> {
	Url::parse(&url).map_err(|e| OpaError::InvalidUrl {
		message: e.to_string(),
		url,
	})
}

#[async_trait]
impl PolicyDecisionClient for OpaClient {
	#[instrument(
		skip_all,
		fields(
			url = %self.decision_url,
			method = %input.http_method,
			trace_token = input.trace_token.as_deref().unwrap_or("")
		)
	)]
	async fn decide(&self, input: &PolicyInput) -> Result<PolicyDecision, OpaError> {
		let response = self
			.http_client
			.post(self.decision_url.clone())
			.json(&OpaRequest { input })
			.send()
			.await
			.map_err(OpaError::from_transport)?;

		let status = response.status();
		debug!(status = %status, "received OPA response");

		if status != StatusCode::OK {
			let body = response.text().await.unwrap_or_default();
			return Err(OpaError::UnexpectedStatus {
				status: status.as_u16(),
				body,
			});
		}

		let body = response.text().await.map_err(OpaError::from_transport)?;
		trace!(body = %body, "OPA response body");

		let decision: PolicyDecision = serde_json::from_str(&body)
			.map_err(|e| OpaError::InvalidResponse(format!("JSON parse error: {e}")))?;

		debug!(allow = decision.is_allow(), "policy decision parsed");
		Ok(decision)
	}
}
