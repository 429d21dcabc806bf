// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP client with consistent User-Agent header.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::debug;

/// Creates a new HTTP client builder with the standard Warden User-Agent header.
///
/// # Example
/// ```ignore
/// let client = warden_common_http::builder()
///     .timeout(Duration::from_secs(30))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Creates a client whose connect and read phases are bounded independently.
///
/// The whole request is additionally capped at `connect + read` so that a
/// slow trickle of bytes cannot hold a caller forever.
pub fn new_client_with_timeouts(
	connect_timeout: Duration,
	read_timeout: Duration,
) -> Result<Client, reqwest::Error> {
	debug!(
		connect_timeout_ms = connect_timeout.as_millis() as u64,
		read_timeout_ms = read_timeout.as_millis() as u64,
		"building HTTP client"
	);

	builder()
		.connect_timeout(connect_timeout)
		.read_timeout(read_timeout)
		.timeout(connect_timeout + read_timeout)
		.build()
}

/// Returns the standard Warden User-Agent string.
///
/// Format: `warden/{platform}/{version}`
pub fn user_agent() -> String {
	format!(
		"warden/{}-{}/{}",
		std::env::consts::OS,
		std::env::consts::ARCH,
		env!("CARGO_PKG_VERSION")
	)
}
