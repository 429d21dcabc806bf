// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Open Policy Agent decision client.
//!
//! [`OpaClient`] posts `{"input": <PolicyInput>}` to
//! `{base_url}/v1/data/{policy_path}` and parses the response into a
//! [`PolicyDecision`](warden_authz_core::PolicyDecision).
//!
//! Every transport or parsing failure is returned as an [`OpaError`]; nothing
//! at this layer turns a failure into a deny. The voting gate decides that.
//! There are no retries: a timeout is final for the request that hit it.

mod client;
mod error;

pub use client::{
	OpaClient, OpaClientConfig, PolicyDecisionClient, DEFAULT_BASE_URL, DEFAULT_CONNECT_TIMEOUT,
	DEFAULT_POLICY_PATH, DEFAULT_READ_TIMEOUT,
};
pub use error::OpaError;
