// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Warden authorization server.
//!
//! Hosts an application listener whose routes are guarded by OPA, and an
//! optional separate management listener for health and info endpoints.

pub mod bearer;
pub mod error;
pub mod routes;
pub mod server;
pub mod version;

pub use error::ServerError;
pub use routes::ServiceConstraints;
pub use server::{build_gate, resolve_management_port, Server};
pub use warden_server_config::ServerConfig;
