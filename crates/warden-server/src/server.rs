// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Listener binding, gate assembly and serving.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{middleware, Extension, Router};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use warden_authz_core::{HeadersInputExtension, InputExtensionRegistry, ListenerPort};
use warden_opa_client::{OpaClient, OpaClientConfig, PolicyDecisionClient};
use warden_server_authz::{AccessGate, AuthzLayer, GateBuildError, ManagementPort, PathExclusionVoter};
use warden_server_config::{ManagementMode, OpaConfig, ServerConfig};

use crate::bearer::bearer_layer;
use crate::error::ServerError;
use crate::routes::{application_routes, management_routes, ServiceConstraints};

/// Maps the configured mode and the port the management listener actually
/// bound to the value the management-port voter works from.
pub fn resolve_management_port(mode: ManagementMode, bound_port: Option<u16>) -> ManagementPort {
	match (mode, bound_port) {
		(ManagementMode::Separate, Some(port)) => ManagementPort::SeparatePort(port),
		(ManagementMode::Separate, None) | (ManagementMode::Disabled, _) => ManagementPort::Disabled,
		(ManagementMode::Same, _) => ManagementPort::SamePort,
	}
}

pub fn build_opa_client(config: &OpaConfig) -> Result<OpaClient, ServerError> {
	Ok(OpaClient::new(OpaClientConfig {
		base_url: config.base_url.clone(),
		policy_path: config.policy_path.clone(),
		connect_timeout: config.connect_timeout(),
		read_timeout: config.read_timeout(),
	})?)
}

/// Assembles the access gate.
///
/// Exclusion patterns are compiled even when authorization is disabled, so a
/// malformed pattern fails startup in every mode. A disabled configuration
/// yields a gate that grants everything and needs no `client`.
pub fn build_gate(
	config: &OpaConfig,
	management: ManagementPort,
	client: Option<Arc<dyn PolicyDecisionClient>>,
) -> Result<AccessGate, ServerError> {
	if !config.enabled {
		PathExclusionVoter::new(&config.excluded_paths).map_err(GateBuildError::from)?;
		return Ok(AccessGate::disabled());
	}

	let mut registry = InputExtensionRegistry::builder();
	if config.include_headers {
		registry = registry.register(HeadersInputExtension);
	}

	let mut gate = AccessGate::builder()
		.management_port(management)
		.excluded_paths(config.excluded_paths.iter().cloned())
		.input_extensions(registry.build()?);
	if let Some(client) = client {
		gate = gate.decision_client(client);
	}
	Ok(gate.build()?)
}

/// Wraps `routes` with authorization, bearer pickup and request tracing for
/// the listener on `port`.
pub fn guard(routes: Router, gate: Arc<AccessGate>, port: u16) -> Router {
	routes
		.layer(AuthzLayer::<ServiceConstraints>::shared(gate))
		.layer(middleware::from_fn(bearer_layer))
		.layer(Extension(ListenerPort(port)))
		.layer(TraceLayer::new_for_http())
}

async fn bind(addr: &str) -> Result<TcpListener, ServerError> {
	TcpListener::bind(addr)
		.await
		.map_err(|source| ServerError::Bind {
			addr: addr.to_string(),
			source,
		})
}

/// A server with its listeners bound and its gate built, ready to serve.
pub struct Server {
	app_listener: TcpListener,
	app_addr: SocketAddr,
	management_listener: Option<(TcpListener, SocketAddr)>,
	management: ManagementPort,
	gate: Arc<AccessGate>,
	opa_client: Option<Arc<OpaClient>>,
}

impl Server {
	pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
		let app_listener = bind(&config.socket_addr()).await?;
		let app_addr = app_listener.local_addr()?;

		let management_listener = match config.management.mode {
			ManagementMode::Separate => {
				let listener = bind(&config.management_socket_addr()).await?;
				let addr = listener.local_addr()?;
				Some((listener, addr))
			}
			ManagementMode::Same | ManagementMode::Disabled => None,
		};

		let management = resolve_management_port(
			config.management.mode,
			management_listener.as_ref().map(|(_, addr)| addr.port()),
		);

		let opa_client = if config.opa.enabled {
			Some(Arc::new(build_opa_client(&config.opa)?))
		} else {
			None
		};
		let decision_client = opa_client
			.clone()
			.map(|client| client as Arc<dyn PolicyDecisionClient>);
		let gate = build_gate(&config.opa, management, decision_client)?;

		info!(
			app_addr = %app_addr,
			management = ?management,
			gate = ?gate,
			"listeners bound"
		);

		Ok(Self {
			app_listener,
			app_addr,
			management_listener,
			management,
			gate: Arc::new(gate),
			opa_client,
		})
	}

	pub fn app_addr(&self) -> SocketAddr {
		self.app_addr
	}

	pub fn management_addr(&self) -> Option<SocketAddr> {
		self.management_listener.as_ref().map(|(_, addr)| *addr)
	}

	pub fn management_port(&self) -> ManagementPort {
		self.management
	}

	/// Probes OPA's health endpoint. Always true when authorization is disabled.
	pub async fn check_opa(&self) -> bool {
		match &self.opa_client {
			Some(client) => client.health().await,
			None => true,
		}
	}

	fn app_router(&self) -> Router {
		let routes = match self.management {
			ManagementPort::SamePort => application_routes().merge(management_routes()),
			ManagementPort::SeparatePort(_) | ManagementPort::Disabled => application_routes(),
		};
		guard(routes, Arc::clone(&self.gate), self.app_addr.port())
	}

	/// Serves until `shutdown` resolves, then drains in-flight requests.
	pub async fn serve<F>(self, shutdown: F) -> Result<(), ServerError>
	where
		F: Future<Output = ()> + Send + 'static,
	{
		let app_router = self.app_router();
		let (stop_tx, stop_rx) = watch::channel(false);

		tokio::spawn(async move {
			shutdown.await;
			let _ = stop_tx.send(true);
		});

		let app_addr = self.app_addr;
		info!(addr = %app_addr, "application listener serving");
		let app = axum::serve(self.app_listener, app_router)
			.with_graceful_shutdown(stopped(stop_rx.clone()));
		let app = async move { app.await.map_err(|source| ServerError::Serve { addr: app_addr, source }) };

		match self.management_listener {
			Some((listener, addr)) => {
				info!(addr = %addr, "management listener serving");
				let router = guard(management_routes(), self.gate, addr.port());
				let management = axum::serve(listener, router).with_graceful_shutdown(stopped(stop_rx));
				let management =
					async move { management.await.map_err(|source| ServerError::Serve { addr, source }) };
				tokio::try_join!(app, management)?;
			}
			None => app.await?,
		}

		info!("server shutdown complete");
		Ok(())
	}
}

async fn stopped(mut rx: watch::Receiver<bool>) {
	if rx.changed().await.is_err() {
		warn!("shutdown channel closed");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::Body;
	use axum::http::{Request, StatusCode};
	use tower::ServiceExt;

	fn unreachable_opa() -> OpaConfig {
		OpaConfig {
			base_url: "http://127.0.0.1:9".to_string(),
			connect_timeout_ms: 100,
			read_timeout_ms: 100,
			..Default::default()
		}
	}

	fn client(config: &OpaConfig) -> Option<Arc<dyn PolicyDecisionClient>> {
		Some(Arc::new(build_opa_client(config).unwrap()))
	}

	#[test]
	fn test_resolve_management_port() {
		assert_eq!(
			resolve_management_port(ManagementMode::Separate, Some(9001)),
			ManagementPort::SeparatePort(9001)
		);
		assert_eq!(
			resolve_management_port(ManagementMode::Same, None),
			ManagementPort::SamePort
		);
		assert_eq!(
			resolve_management_port(ManagementMode::Disabled, Some(9001)),
			ManagementPort::Disabled
		);
	}

	#[test]
	fn test_build_gate_disabled() {
		let config = OpaConfig {
			enabled: false,
			..unreachable_opa()
		};
		let gate = build_gate(&config, ManagementPort::Disabled, None).unwrap();
		assert!(!gate.is_enabled());
	}

	#[test]
	fn test_build_gate_disabled_still_rejects_bad_exclusion() {
		let config = OpaConfig {
			enabled: false,
			excluded_paths: vec!["/ping/(".to_string()],
			..unreachable_opa()
		};
		let result = build_gate(&config, ManagementPort::Disabled, None);
		assert!(matches!(
			result,
			Err(ServerError::Gate(GateBuildError::InvalidExcludedPath(_)))
		));
	}

	#[test]
	fn test_build_gate_enabled_requires_client() {
		let result = build_gate(&unreachable_opa(), ManagementPort::Disabled, None);
		assert!(matches!(
			result,
			Err(ServerError::Gate(GateBuildError::MissingDecisionClient))
		));
	}

	#[tokio::test]
	async fn test_disabled_bind_ignores_bad_opa_url() {
		let mut config = ServerConfig::default();
		config.http.host = "127.0.0.1".to_string();
		config.http.port = 0;
		config.management.mode = ManagementMode::Disabled;
		config.opa.enabled = false;
		config.opa.base_url = "not a url".to_string();

		let server = Server::bind(&config).await.unwrap();

		assert!(server.check_opa().await);
	}

	#[tokio::test]
	async fn test_enabled_bind_rejects_bad_opa_url() {
		let mut config = ServerConfig::default();
		config.http.host = "127.0.0.1".to_string();
		config.http.port = 0;
		config.management.mode = ManagementMode::Disabled;
		config.opa.base_url = "not a url".to_string();

		let result = Server::bind(&config).await;

		assert!(matches!(result, Err(ServerError::Opa(_))));
	}

	#[test]
	fn test_build_gate_rejects_bad_exclusion() {
		let config = OpaConfig {
			excluded_paths: vec!["/ping/(".to_string()],
			..unreachable_opa()
		};
		let result = build_gate(&config, ManagementPort::Disabled, client(&config));
		assert!(matches!(result, Err(ServerError::Gate(_))));
	}

	#[tokio::test]
	async fn test_management_listener_bypasses_policy() {
		let config = unreachable_opa();
		let gate = Arc::new(
			build_gate(&config, ManagementPort::SeparatePort(9001), client(&config)).unwrap(),
		);

		let response = guard(management_routes(), gate, 9001)
			.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
			.await
			.unwrap();

		assert_eq!(response.status(), StatusCode::OK);
	}

	#[tokio::test]
	async fn test_application_listener_fails_closed() {
		let config = unreachable_opa();
		let gate = Arc::new(
			build_gate(&config, ManagementPort::SeparatePort(9001), client(&config)).unwrap(),
		);

		let app = guard(application_routes(), gate, 9000);

		let ping = app
			.clone()
			.oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
			.await
			.unwrap();
		assert_eq!(ping.status(), StatusCode::OK);

		let constraints = app
			.oneshot(Request::builder().uri("/constraints").body(Body::empty()).unwrap())
			.await
			.unwrap();
		assert_eq!(constraints.status(), StatusCode::FORBIDDEN);
	}
}
