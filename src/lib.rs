//! Session gatekeeper for dashboards that sit in front of an OAuth-protected upstream API:
//! authorization-code exchange, transparent refresh, and a two-tier rate limiter with bounded
//! throttling backoff in front of every upstream call.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

#[macro_use]
mod macros;

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod limiter;
pub mod obs;
pub mod session;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::collections::VecDeque;
	// self
	use crate::{
		config::GatewayConfig,
		gateway::GatewayClient,
		http::{GatewayTransport, HttpRequest, HttpResponse, TransportFuture},
	};
	#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

	/// Client id used by every test configuration.
	pub const TEST_CLIENT_ID: &str = "client-test";
	/// Client secret used by every test configuration.
	pub const TEST_CLIENT_SECRET: &str = "secret-test";

	/// Builds a gateway configuration whose upstream API lives at `api_base`.
	pub fn test_config(api_base: &str) -> GatewayConfig {
		GatewayConfig::builder()
			.client_id(TEST_CLIENT_ID)
			.client_secret(TEST_CLIENT_SECRET)
			.public_url(
				Url::parse("https://dashboard.example.com")
					.expect("Dashboard URL fixture should parse successfully."),
			)
			.api_base(Url::parse(api_base).expect("API base fixture should parse successfully."))
			.build()
			.expect("Test gateway configuration should build successfully.")
	}

	/// Request observed by a [`ScriptedTransport`].
	#[derive(Clone, Debug)]
	pub struct RecordedRequest {
		/// Instant the transport received the request.
		pub at: Instant,
		/// HTTP method.
		pub method: String,
		/// Request path (without query).
		pub path: String,
		/// Value of the `Authorization` header, if any.
		pub authorization: Option<String>,
		/// Value of the `User-Agent` header, if any.
		pub user_agent: Option<String>,
		/// Raw request body.
		pub body: Vec<u8>,
	}

	/// Canned reply handed out by a [`ScriptedTransport`].
	#[derive(Clone, Debug)]
	pub struct ScriptedReply {
		/// HTTP status code.
		pub status: u16,
		/// Extra response headers.
		pub headers: Vec<(&'static str, String)>,
		/// Response body.
		pub body: String,
	}
	impl ScriptedReply {
		/// A JSON reply with the given status.
		pub fn json(status: u16, body: impl Into<String>) -> Self {
			Self { status, headers: vec![("content-type", "application/json".into())], body: body.into() }
		}

		/// A `429 Too Many Requests` reply carrying `retry-after`.
		pub fn throttled(retry_after: impl Into<String>) -> Self {
			Self {
				status: 429,
				headers: vec![("retry-after", retry_after.into())],
				body: "{\"message\":\"You are being rate limited.\"}".into(),
			}
		}
	}

	/// Fake network layer that replays queued replies and records every request it sees.
	///
	/// Once the queue is drained it answers with the fallback reply (`200 {}` by default).
	#[derive(Debug)]
	pub struct ScriptedTransport {
		replies: Mutex<VecDeque<ScriptedReply>>,
		fallback: ScriptedReply,
		requests: Mutex<Vec<RecordedRequest>>,
	}
	impl ScriptedTransport {
		/// Creates a transport that replays `replies` in order.
		pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
			Self {
				replies: Mutex::new(replies.into_iter().collect()),
				fallback: ScriptedReply::json(200, "{}"),
				requests: Default::default(),
			}
		}

		/// Overrides the reply used once the queue is empty.
		pub fn with_fallback(mut self, reply: ScriptedReply) -> Self {
			self.fallback = reply;

			self
		}

		/// Snapshot of every request received so far.
		pub fn requests(&self) -> Vec<RecordedRequest> {
			self.requests.lock().clone()
		}

		fn respond(&self, request: &HttpRequest) -> HttpResponse {
			let header = |name: &str| {
				request.headers().get(name).and_then(|value| value.to_str().ok()).map(str::to_owned)
			};

			self.requests.lock().push(RecordedRequest {
				at: Instant::now(),
				method: request.method().as_str().to_owned(),
				path: request.uri().path().to_owned(),
				authorization: header("authorization"),
				user_agent: header("user-agent"),
				body: request.body().clone(),
			});

			let reply = self.replies.lock().pop_front().unwrap_or_else(|| self.fallback.clone());
			let mut response = HttpResponse::new(reply.body.into_bytes());

			*response.status_mut() = oauth2::http::StatusCode::from_u16(reply.status)
				.expect("Scripted status codes should be valid.");

			for (name, value) in reply.headers {
				response.headers_mut().insert(
					name,
					value.parse().expect("Scripted header values should be valid."),
				);
			}

			response
		}
	}
	impl GatewayTransport for ScriptedTransport {
		type TransportError = std::io::Error;

		fn execute(&self, request: HttpRequest) -> TransportFuture<'_, Self::TransportError> {
			let response = self.respond(&request);

			Box::pin(async move { Ok(response) })
		}
	}

	/// Builds a gateway over a [`ScriptedTransport`] for deterministic, clock-driven tests.
	pub fn build_scripted_gateway(
		replies: impl IntoIterator<Item = ScriptedReply>,
	) -> (GatewayClient<ScriptedTransport>, Arc<ScriptedTransport>) {
		let transport = Arc::new(ScriptedTransport::new(replies));
		let gateway = GatewayClient::with_transport(
			test_config("https://upstream.example.com/api/v10"),
			transport.clone(),
		)
		.expect("Scripted gateway should build successfully.");

		(gateway, transport)
	}

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	#[cfg(feature = "reqwest")]
	pub fn test_reqwest_transport() -> ReqwestTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTransport::with_client(client)
	}

	/// Constructs a reqwest-backed [`GatewayClient`] whose upstream API lives at `api_base`.
	#[cfg(feature = "reqwest")]
	pub fn build_reqwest_test_gateway(api_base: &str) -> GatewayClient<ReqwestTransport> {
		GatewayClient::with_transport(test_config(api_base), Arc::new(test_reqwest_transport()))
			.expect("Reqwest test gateway should build successfully.")
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use tokio::time::Instant;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
