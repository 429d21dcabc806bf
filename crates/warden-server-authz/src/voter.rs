// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Access decision voters.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use regex::RegexSet;
use tracing::{debug, info, instrument, warn};
use warden_authz_core::{PolicyDecision, PolicyInputBuilder, RequestContext};
use warden_opa_client::PolicyDecisionClient;

/// Why a request was let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantSource {
	/// Arrived on the separate management listener.
	ManagementPort,
	/// Path matched an excluded pattern.
	ExcludedPath,
	/// OPA returned `allow: true`.
	Policy,
	/// Authorization is switched off.
	Disabled,
}

impl GrantSource {
	pub fn as_str(&self) -> &'static str {
		match self {
			GrantSource::ManagementPort => "management_port",
			GrantSource::ExcludedPath => "excluded_path",
			GrantSource::Policy => "policy",
			GrantSource::Disabled => "disabled",
		}
	}
}

impl fmt::Display for GrantSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Why a request was refused. Every reason results in `403 Forbidden`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
	/// OPA answered and did not allow the request.
	PolicyDenied,
	/// OPA could not be asked or its answer could not be read.
	DecisionUnavailable,
	/// Every voter abstained.
	NoGrant,
	/// A voter panicked while voting.
	VoterPanicked,
	/// The policy's constraint values do not fit the service's constraints type.
	ConstraintsInvalid,
}

impl DenyReason {
	pub fn as_str(&self) -> &'static str {
		match self {
			DenyReason::PolicyDenied => "policy_denied",
			DenyReason::DecisionUnavailable => "decision_unavailable",
			DenyReason::NoGrant => "no_grant",
			DenyReason::VoterPanicked => "voter_panicked",
			DenyReason::ConstraintsInvalid => "constraints_invalid",
		}
	}
}

impl fmt::Display for DenyReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A positive vote, with the decision it rests on when it came from policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Grant {
	pub source: GrantSource,
	pub decision: Option<PolicyDecision>,
}

impl Grant {
	/// A grant that skips policy evaluation; constraints take their defaults.
	pub fn bypass(source: GrantSource) -> Self {
		Self {
			source,
			decision: None,
		}
	}

	pub fn policy(decision: PolicyDecision) -> Self {
		Self {
			source: GrantSource::Policy,
			decision: Some(decision),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Vote {
	Grant(Grant),
	Deny(DenyReason),
	Abstain,
}

/// One participant in the access decision.
#[async_trait]
pub trait Voter: Send + Sync {
	/// Name used in logs.
	fn name(&self) -> &'static str;

	async fn vote(&self, request: &RequestContext<'_>) -> Vote;
}

/// How management endpoints are exposed, resolved once the listeners are bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagementPort {
	/// A dedicated listener on this port.
	SeparatePort(u16),
	/// Management endpoints share the application listener.
	SamePort,
	Disabled,
}

/// Grants every request accepted by the separate management listener.
#[derive(Debug, Clone, Copy)]
pub struct ManagementPortVoter {
	port: ManagementPort,
}

impl ManagementPortVoter {
	pub fn new(port: ManagementPort) -> Self {
		Self { port }
	}
}

#[async_trait]
impl Voter for ManagementPortVoter {
	fn name(&self) -> &'static str {
		"management_port"
	}

	async fn vote(&self, request: &RequestContext<'_>) -> Vote {
		match (self.port, request.listener_port()) {
			(ManagementPort::SeparatePort(expected), Some(actual)) if expected == actual => {
				debug!(port = actual, "request on management port");
				Vote::Grant(Grant::bypass(GrantSource::ManagementPort))
			}
			_ => Vote::Abstain,
		}
	}
}

/// Grants requests whose path fully matches one of a set of patterns.
///
/// Patterns are anchored at both ends, so `/ping` matches `/ping` but not
/// `/pingpong` or `/api/ping`.
#[derive(Debug, Clone)]
pub struct PathExclusionVoter {
	patterns: Vec<String>,
	set: RegexSet,
}

impl PathExclusionVoter {
	pub fn new<I, P>(patterns: I) -> Result<Self, regex::Error>
	where
		I: IntoIterator<Item = P>,
		P: AsRef<str>,
	{
		let patterns: Vec<String> = patterns
			.into_iter()
			.map(|p| p.as_ref().to_string())
			.collect();
		let set = RegexSet::new(patterns.iter().map(|p| format!("^(?:{p})$")))?;
		Ok(Self { patterns, set })
	}

	pub fn patterns(&self) -> &[String] {
		&self.patterns
	}

	pub fn is_excluded(&self, path: &str) -> bool {
		self.set.is_match(path)
	}
}

#[async_trait]
impl Voter for PathExclusionVoter {
	fn name(&self) -> &'static str {
		"path_exclusion"
	}

	async fn vote(&self, request: &RequestContext<'_>) -> Vote {
		if self.is_excluded(request.path()) {
			debug!(path = request.path(), "path excluded from authorization");
			Vote::Grant(Grant::bypass(GrantSource::ExcludedPath))
		} else {
			Vote::Abstain
		}
	}
}

/// Asks OPA. Never abstains: the answer is a grant or a deny.
#[derive(Clone)]
pub struct OpaVoter {
	input_builder: PolicyInputBuilder,
	client: Arc<dyn PolicyDecisionClient>,
}

impl OpaVoter {
	pub fn new(input_builder: PolicyInputBuilder, client: Arc<dyn PolicyDecisionClient>) -> Self {
		Self {
			input_builder,
			client,
		}
	}
}

impl fmt::Debug for OpaVoter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("OpaVoter")
			.field("input_builder", &self.input_builder)
			.finish_non_exhaustive()
	}
}

#[async_trait]
impl Voter for OpaVoter {
	fn name(&self) -> &'static str {
		"opa"
	}

	#[instrument(name = "OpaVoter::vote", skip_all, fields(method = %request.method(), path = request.path()))]
	async fn vote(&self, request: &RequestContext<'_>) -> Vote {
		let input = self.input_builder.build(request);
		let trace_token = input.trace_token.clone().unwrap_or_default();

		match self.client.decide(&input).await {
			Ok(decision) if decision.is_allow() => {
				debug!(trace_token = %trace_token, "policy allowed request");
				Vote::Grant(Grant::policy(decision))
			}
			Ok(_) => {
				info!(trace_token = %trace_token, "policy denied request");
				Vote::Deny(DenyReason::PolicyDenied)
			}
			Err(e) => {
				warn!(
					trace_token = %trace_token,
					error = %e,
					kind = e.kind(),
					"policy decision unavailable, denying request"
				);
				Vote::Deny(DenyReason::DecisionUnavailable)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use http::Request;
	use proptest::prelude::*;
	use serde_json::json;
	use warden_authz_core::{ListenerPort, PolicyInput};
	use warden_opa_client::OpaError;

	struct FixedClient {
		result: fn() -> Result<PolicyDecision, OpaError>,
	}

	#[async_trait]
	impl PolicyDecisionClient for FixedClient {
		async fn decide(&self, _input: &PolicyInput) -> Result<PolicyDecision, OpaError> {
			(self.result)()
		}
	}

	fn opa_voter(result: fn() -> Result<PolicyDecision, OpaError>) -> OpaVoter {
		OpaVoter::new(
			PolicyInputBuilder::default(),
			Arc::new(FixedClient { result }),
		)
	}

	fn request_on(port: Option<u16>, path: &str) -> Request<()> {
		let mut builder = Request::builder().uri(path);
		if let Some(port) = port {
			builder = builder.extension(ListenerPort(port));
		}
		builder.body(()).unwrap()
	}

	#[tokio::test]
	async fn management_voter_grants_only_on_its_port() {
		let voter = ManagementPortVoter::new(ManagementPort::SeparatePort(8081));

		let on_mgmt = request_on(Some(8081), "/health");
		let on_app = request_on(Some(8080), "/health");
		let unknown = request_on(None, "/health");

		assert_eq!(
			voter.vote(&RequestContext::from_request(&on_mgmt)).await,
			Vote::Grant(Grant::bypass(GrantSource::ManagementPort))
		);
		assert_eq!(voter.vote(&RequestContext::from_request(&on_app)).await, Vote::Abstain);
		assert_eq!(voter.vote(&RequestContext::from_request(&unknown)).await, Vote::Abstain);
	}

	#[tokio::test]
	async fn management_voter_abstains_in_shared_and_disabled_modes() {
		let request = request_on(Some(8081), "/health");
		for port in [ManagementPort::SamePort, ManagementPort::Disabled] {
			let voter = ManagementPortVoter::new(port);
			assert_eq!(voter.vote(&RequestContext::from_request(&request)).await, Vote::Abstain);
		}
	}

	#[test]
	fn exclusions_are_fully_anchored() {
		let voter = PathExclusionVoter::new(["/ping", "/ping/.*"]).unwrap();

		assert!(voter.is_excluded("/ping"));
		assert!(voter.is_excluded("/ping/deep/path"));
		assert!(!voter.is_excluded("/pingpong"));
		assert!(!voter.is_excluded("/api/ping"));
		assert!(!voter.is_excluded("/ping2/x"));
	}

	#[test]
	fn alternation_does_not_escape_anchors() {
		let voter = PathExclusionVoter::new(["/a|/b"]).unwrap();
		assert!(voter.is_excluded("/a"));
		assert!(voter.is_excluded("/b"));
		assert!(!voter.is_excluded("/a/x"));
		assert!(!voter.is_excluded("/x/b"));
	}

	#[test]
	fn malformed_pattern_is_an_error() {
		assert!(PathExclusionVoter::new(["/ping/("]).is_err());
	}

	#[test]
	fn no_patterns_excludes_nothing() {
		let voter = PathExclusionVoter::new(Vec::<String>::new()).unwrap();
		assert!(!voter.is_excluded("/"));
		assert!(voter.patterns().is_empty());
	}

	#[tokio::test]
	async fn opa_voter_grants_on_allow() {
		let voter = opa_voter(|| Ok(PolicyDecision::from_result(json!({"allow": true, "admin": true}))));
		let request = request_on(None, "/orders");

		match voter.vote(&RequestContext::from_request(&request)).await {
			Vote::Grant(grant) => {
				assert_eq!(grant.source, GrantSource::Policy);
				assert_eq!(grant.decision.unwrap().constraint("admin"), Some(&json!(true)));
			}
			other => panic!("expected grant, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn opa_voter_denies_on_explicit_deny() {
		let voter = opa_voter(|| Ok(PolicyDecision::from_result(json!({"allow": false}))));
		let request = request_on(None, "/orders");
		assert_eq!(
			voter.vote(&RequestContext::from_request(&request)).await,
			Vote::Deny(DenyReason::PolicyDenied)
		);
	}

	#[tokio::test]
	async fn opa_voter_denies_when_decision_unavailable() {
		let voter = opa_voter(|| Err(OpaError::Timeout));
		let request = request_on(None, "/orders");
		assert_eq!(
			voter.vote(&RequestContext::from_request(&request)).await,
			Vote::Deny(DenyReason::DecisionUnavailable)
		);
	}

	proptest! {
		#[test]
		fn literal_pattern_matches_only_itself(
			a in "/[a-z]{1,8}",
			b in "/[a-z]{1,8}",
		) {
			let voter = PathExclusionVoter::new([a.as_str()]).unwrap();
			prop_assert!(voter.is_excluded(&a));
			prop_assert_eq!(voter.is_excluded(&b), a == b);
			let extended = format!("{a}x");
			prop_assert!(!voter.is_excluded(&extended));
		}
	}
}
