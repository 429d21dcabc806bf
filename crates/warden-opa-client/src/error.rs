// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Error types for the OPA client.

use thiserror::Error;

/// A policy decision could not be obtained.
#[derive(Debug, Error)]
pub enum OpaError {
	/// Network-level error during HTTP communication.
	#[error("policy decision unavailable: network error: {0}")]
	Network(#[source] reqwest::Error),

	/// Connect or read timeout elapsed.
	#[error("policy decision unavailable: request timed out")]
	Timeout,

	/// OPA answered with something other than 200 OK.
	#[error("policy decision unavailable: OPA returned {status}: {body}")]
	UnexpectedStatus { status: u16, body: String },

	/// The response body was not a decision document.
	#[error("policy decision unavailable: invalid response: {0}")]
	InvalidResponse(String),

	/// The configured base URL and policy path do not form a valid URL.
	#[error("invalid OPA URL '{url}': {message}")]
	InvalidUrl { url: String, message: String },

	/// The underlying HTTP client could not be constructed.
	#[error("failed to build OPA HTTP client: {0}")]
	ClientBuild(#[source] reqwest::Error),
}

impl OpaError {
	pub(crate) fn from_transport(e: reqwest::Error) -> Self {
		if e.is_timeout() {
			OpaError::Timeout
		} else {
			OpaError::Network(e)
		}
	}

	/// Short, stable label for logs.
	pub fn kind(&self) -> &'static str {
		match self {
			OpaError::Network(_) => "network",
			OpaError::Timeout => "timeout",
			OpaError::UnexpectedStatus { .. } => "unexpected_status",
			OpaError::InvalidResponse(_) => "invalid_response",
			OpaError::InvalidUrl { .. } => "invalid_url",
			OpaError::ClientBuild(_) => "client_build",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn messages_mark_decision_unavailable() {
		assert!(OpaError::Timeout
			.to_string()
			.starts_with("policy decision unavailable"));
		assert!(OpaError::UnexpectedStatus {
			status: 500,
			body: "boom".to_string()
		}
		.to_string()
		.contains("500"));
	}

	#[test]
	fn kinds_are_stable() {
		assert_eq!(OpaError::Timeout.kind(), "timeout");
		assert_eq!(
			OpaError::InvalidResponse("x".to_string()).kind(),
			"invalid_response"
		);
	}
}
