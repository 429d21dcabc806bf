// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use serde::{Deserialize, Serialize};

/// JSON error body. Never carries the reason for a denial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
}

pub fn forbidden_response() -> Response {
	(
		StatusCode::FORBIDDEN,
		Json(ErrorResponse {
			error: "forbidden".to_string(),
			message: "Access denied".to_string(),
		}),
	)
		.into_response()
}

pub(crate) fn internal_error_response(message: &str) -> Response {
	(
		StatusCode::INTERNAL_SERVER_ERROR,
		Json(ErrorResponse {
			error: "internal_error".to_string(),
			message: message.to_string(),
		}),
	)
		.into_response()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn forbidden_body_is_generic() {
		let response = forbidden_response();
		assert_eq!(response.status(), StatusCode::FORBIDDEN);

		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
		assert_eq!(body.error, "forbidden");
		assert_eq!(body.message, "Access denied");
	}
}
