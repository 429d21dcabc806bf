// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Core types for OPA-backed HTTP authorization.
//!
//! This crate provides:
//! - [`PolicyInput`] and [`PolicyInputBuilder`] - the document sent to OPA
//! - [`InputExtension`] and [`InputExtensionRegistry`] - pluggable, namespaced
//!   contributions to the policy input
//! - [`PolicyDecision`] - the fail-closed view of an OPA response
//! - [`materialize`] - mapping decision fields onto an application constraints type
//! - [`RequestContext`] - a borrowed, framework-neutral view of the inbound request
//!
//! Nothing in this crate performs I/O. The HTTP call lives in `warden-opa-client`
//! and the voting gate in `warden-server-authz`.

pub mod constraints;
pub mod decision;
pub mod extension;
pub mod input;
pub mod request;

pub use constraints::{materialize, Constraints, ConstraintsError};
pub use decision::PolicyDecision;
pub use extension::{
	derive_namespace, HeadersInputExtension, InputExtension, InputExtensionRegistry,
	InputExtensionRegistryBuilder, RegistryError,
};
pub use input::{path_segments, PolicyInput, PolicyInputBuilder, TRACE_TOKEN_HEADER};
pub use request::{BearerToken, ListenerPort, RequestContext};
