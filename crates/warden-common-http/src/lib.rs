// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for Warden.
//!
//! This crate provides a pre-configured HTTP client builder with a consistent
//! User-Agent header and separately bounded connect and read phases.

mod client;

pub use client::{builder, new_client_with_timeouts, user_agent};
