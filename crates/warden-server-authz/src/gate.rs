// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The access gate: ordered, fail-closed voting.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};
use warden_authz_core::{
	materialize, Constraints, InputExtensionRegistry, PolicyInputBuilder, RequestContext,
};
use warden_opa_client::PolicyDecisionClient;

use crate::voter::{
	DenyReason, Grant, GrantSource, ManagementPort, ManagementPortVoter, OpaVoter,
	PathExclusionVoter, Vote, Voter,
};

/// Result of authorizing one request.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthzOutcome<C> {
	Granted { via: GrantSource, constraints: C },
	Denied { reason: DenyReason },
}

impl<C> AuthzOutcome<C> {
	pub fn is_granted(&self) -> bool {
		matches!(self, AuthzOutcome::Granted { .. })
	}
}

#[derive(Debug, Error)]
pub enum GateBuildError {
	#[error("invalid excluded path pattern: {0}")]
	InvalidExcludedPath(#[from] regex::Error),

	#[error("no policy decision client configured")]
	MissingDecisionClient,
}

/// Consults voters in order; the first grant or deny wins and silence is a deny.
///
/// Cheap to clone. Build one at startup and share it between listeners.
#[derive(Clone)]
pub struct AccessGate {
	voters: Arc<[Box<dyn Voter>]>,
	enabled: bool,
}

impl AccessGate {
	pub fn builder() -> AccessGateBuilder {
		AccessGateBuilder::default()
	}

	/// A gate with a custom voter list, evaluated in the given order.
	pub fn from_voters(voters: Vec<Box<dyn Voter>>) -> Self {
		Self {
			voters: voters.into(),
			enabled: true,
		}
	}

	/// A gate that grants every request with default constraints.
	pub fn disabled() -> Self {
		warn!("authorization is disabled, every request will be granted");
		Self {
			voters: Vec::new().into(),
			enabled: false,
		}
	}

	pub fn is_enabled(&self) -> bool {
		self.enabled
	}

	pub fn voter_names(&self) -> Vec<&'static str> {
		self.voters.iter().map(|v| v.name()).collect()
	}

	/// Runs the vote and returns the winning grant or the reason for denial.
	pub async fn decide(&self, request: &RequestContext<'_>) -> Result<Grant, DenyReason> {
		if !self.enabled {
			return Ok(Grant::bypass(GrantSource::Disabled));
		}

		for voter in self.voters.iter() {
			let vote = AssertUnwindSafe(voter.vote(request))
				.catch_unwind()
				.await
				.unwrap_or_else(|panic| {
					error!(
						voter = voter.name(),
						panic = %panic_message(panic.as_ref()),
						"voter panicked, denying request"
					);
					Vote::Deny(DenyReason::VoterPanicked)
				});

			match vote {
				Vote::Grant(grant) => {
					debug!(voter = voter.name(), via = %grant.source, "access granted");
					return Ok(grant);
				}
				Vote::Deny(reason) => {
					debug!(voter = voter.name(), reason = %reason, "access denied");
					return Err(reason);
				}
				Vote::Abstain => continue,
			}
		}

		warn!("no voter granted access, denying request");
		Err(DenyReason::NoGrant)
	}

	/// Decides and materializes the constraints of a granted request onto `C`.
	#[instrument(
		name = "AccessGate::authorize",
		skip_all,
		fields(method = %request.method(), path = request.path())
	)]
	pub async fn authorize<C: Constraints>(&self, request: &RequestContext<'_>) -> AuthzOutcome<C> {
		let grant = match self.decide(request).await {
			Ok(grant) => grant,
			Err(reason) => return AuthzOutcome::Denied { reason },
		};

		let constraints = match &grant.decision {
			Some(decision) => match materialize::<C>(decision) {
				Ok(constraints) => constraints,
				Err(e) => {
					warn!(error = %e, "policy constraints rejected, denying request");
					return AuthzOutcome::Denied {
						reason: DenyReason::ConstraintsInvalid,
					};
				}
			},
			None => C::default(),
		};

		AuthzOutcome::Granted {
			via: grant.source,
			constraints,
		}
	}
}

impl fmt::Debug for AccessGate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AccessGate")
			.field("enabled", &self.enabled)
			.field("voters", &self.voter_names())
			.finish()
	}
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
	if let Some(s) = panic.downcast_ref::<&str>() {
		s.to_string()
	} else if let Some(s) = panic.downcast_ref::<String>() {
		s.clone()
	} else {
		"unknown panic".to_string()
	}
}

/// Assembles the standard voter chain: management port, path exclusions, OPA.
#[derive(Default)]
pub struct AccessGateBuilder {
	management_port: Option<ManagementPort>,
	excluded_paths: Vec<String>,
	extensions: InputExtensionRegistry,
	client: Option<Arc<dyn PolicyDecisionClient>>,
}

impl AccessGateBuilder {
	pub fn management_port(mut self, port: ManagementPort) -> Self {
		self.management_port = Some(port);
		self
	}

	pub fn excluded_paths<I, P>(mut self, patterns: I) -> Self
	where
		I: IntoIterator<Item = P>,
		P: Into<String>,
	{
		self.excluded_paths = patterns.into_iter().map(Into::into).collect();
		self
	}

	pub fn input_extensions(mut self, registry: InputExtensionRegistry) -> Self {
		self.extensions = registry;
		self
	}

	pub fn decision_client(mut self, client: Arc<dyn PolicyDecisionClient>) -> Self {
		self.client = Some(client);
		self
	}

	pub fn build(self) -> Result<AccessGate, GateBuildError> {
		let client = self.client.ok_or(GateBuildError::MissingDecisionClient)?;
		let management_port = self.management_port.unwrap_or(ManagementPort::Disabled);
		let exclusions = PathExclusionVoter::new(&self.excluded_paths)?;

		debug!(
			management_port = ?management_port,
			excluded_paths = ?exclusions.patterns(),
			extensions = ?self.extensions.namespaces(),
			"access gate configured"
		);

		let voters: Vec<Box<dyn Voter>> = vec![
			Box::new(ManagementPortVoter::new(management_port)),
			Box::new(exclusions),
			Box::new(OpaVoter::new(PolicyInputBuilder::new(self.extensions), client)),
		];
		Ok(AccessGate::from_voters(voters))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use http::Request;
	use serde::{Deserialize, Serialize};
	use serde_json::json;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use warden_authz_core::{ListenerPort, PolicyDecision, PolicyInput};
	use warden_opa_client::OpaError;

	#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
	struct TestConstraints {
		admin: bool,
	}

	#[derive(Default)]
	struct CountingClient {
		result: serde_json::Value,
		calls: AtomicUsize,
	}

	#[async_trait]
	impl PolicyDecisionClient for CountingClient {
		async fn decide(&self, _input: &PolicyInput) -> Result<PolicyDecision, OpaError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			Ok(PolicyDecision::from_result(self.result.clone()))
		}
	}

	struct PanickingVoter;

	#[async_trait]
	impl Voter for PanickingVoter {
		fn name(&self) -> &'static str {
			"panicking"
		}

		async fn vote(&self, _request: &RequestContext<'_>) -> Vote {
			panic!("voter exploded");
		}
	}

	struct FixedVoter(Vote);

	#[async_trait]
	impl Voter for FixedVoter {
		fn name(&self) -> &'static str {
			"fixed"
		}

		async fn vote(&self, _request: &RequestContext<'_>) -> Vote {
			self.0.clone()
		}
	}

	fn gate_with(client: Arc<CountingClient>) -> AccessGate {
		AccessGate::builder()
			.management_port(ManagementPort::SeparatePort(8081))
			.excluded_paths(["/ping", "/ping/.*"])
			.decision_client(client)
			.build()
			.unwrap()
	}

	fn request(port: u16, path: &str) -> Request<()> {
		Request::builder()
			.uri(path)
			.extension(ListenerPort(port))
			.body(())
			.unwrap()
	}

	#[tokio::test]
	async fn policy_grant_materializes_constraints() {
		let client = Arc::new(CountingClient {
			result: json!({"allow": true, "admin": true}),
			..Default::default()
		});
		let gate = gate_with(client.clone());
		let req = request(8080, "/orders");

		let outcome = gate
			.authorize::<TestConstraints>(&RequestContext::from_request(&req))
			.await;

		assert_eq!(
			outcome,
			AuthzOutcome::Granted {
				via: GrantSource::Policy,
				constraints: TestConstraints { admin: true },
			}
		);
		assert_eq!(client.calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn management_port_skips_policy() {
		let client = Arc::new(CountingClient::default());
		let gate = gate_with(client.clone());
		let req = request(8081, "/orders");

		let outcome = gate
			.authorize::<TestConstraints>(&RequestContext::from_request(&req))
			.await;

		assert_eq!(
			outcome,
			AuthzOutcome::Granted {
				via: GrantSource::ManagementPort,
				constraints: TestConstraints::default(),
			}
		);
		assert_eq!(client.calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn excluded_path_skips_policy() {
		let client = Arc::new(CountingClient::default());
		let gate = gate_with(client.clone());
		let req = request(8080, "/ping/deep");

		let grant = gate.decide(&RequestContext::from_request(&req)).await.unwrap();

		assert_eq!(grant.source, GrantSource::ExcludedPath);
		assert_eq!(client.calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn constraint_type_mismatch_denies() {
		let client = Arc::new(CountingClient {
			result: json!({"allow": true, "admin": "yes"}),
			..Default::default()
		});
		let gate = gate_with(client);
		let req = request(8080, "/orders");

		let outcome = gate
			.authorize::<TestConstraints>(&RequestContext::from_request(&req))
			.await;

		assert_eq!(
			outcome,
			AuthzOutcome::Denied {
				reason: DenyReason::ConstraintsInvalid
			}
		);
	}

	#[tokio::test]
	async fn panicking_voter_denies() {
		let gate = AccessGate::from_voters(vec![
			Box::new(PanickingVoter),
			Box::new(FixedVoter(Vote::Grant(Grant::bypass(GrantSource::Policy)))),
		]);
		let req = request(8080, "/orders");

		assert_eq!(
			gate.decide(&RequestContext::from_request(&req)).await,
			Err(DenyReason::VoterPanicked)
		);
	}

	#[tokio::test]
	async fn all_abstain_denies() {
		let gate = AccessGate::from_voters(vec![
			Box::new(FixedVoter(Vote::Abstain)),
			Box::new(FixedVoter(Vote::Abstain)),
		]);
		let req = request(8080, "/orders");

		assert_eq!(
			gate.decide(&RequestContext::from_request(&req)).await,
			Err(DenyReason::NoGrant)
		);
		assert_eq!(
			AccessGate::from_voters(vec![])
				.decide(&RequestContext::from_request(&req))
				.await,
			Err(DenyReason::NoGrant)
		);
	}

	#[tokio::test]
	async fn first_deny_wins_over_later_grant() {
		let gate = AccessGate::from_voters(vec![
			Box::new(FixedVoter(Vote::Abstain)),
			Box::new(FixedVoter(Vote::Deny(DenyReason::PolicyDenied))),
			Box::new(FixedVoter(Vote::Grant(Grant::bypass(GrantSource::ExcludedPath)))),
		]);
		let req = request(8080, "/orders");

		assert_eq!(
			gate.decide(&RequestContext::from_request(&req)).await,
			Err(DenyReason::PolicyDenied)
		);
	}

	#[tokio::test]
	async fn disabled_gate_grants_defaults() {
		let gate = AccessGate::disabled();
		let req = request(8080, "/orders");

		assert!(!gate.is_enabled());
		assert_eq!(
			gate.authorize::<TestConstraints>(&RequestContext::from_request(&req))
				.await,
			AuthzOutcome::Granted {
				via: GrantSource::Disabled,
				constraints: TestConstraints::default(),
			}
		);
	}

	#[test]
	fn builder_requires_client_and_valid_patterns() {
		assert!(matches!(
			AccessGate::builder().build(),
			Err(GateBuildError::MissingDecisionClient)
		));

		let err = AccessGate::builder()
			.excluded_paths(["/ping/("])
			.decision_client(Arc::new(CountingClient::default()))
			.build()
			.unwrap_err();
		assert!(matches!(err, GateBuildError::InvalidExcludedPath(_)));
	}

	#[test]
	fn builder_orders_voters() {
		let gate = gate_with(Arc::new(CountingClient::default()));
		assert_eq!(gate.voter_names(), vec!["management_port", "path_exclusion", "opa"]);
	}
}
