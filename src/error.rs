//! Gatekeeper-level error types shared by the limiter, gateway, and session guard.

// self
use crate::_prelude::*;

/// Gatekeeper-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Upstream responses are classified once, at the transport boundary, so callers match on
/// variants instead of re-inspecting error strings.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Gateway configuration is unusable.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// No response arrived from the upstream.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Upstream answered with a failure other than a credentials problem.
	#[error(transparent)]
	Upstream(#[from] UpstreamError),
	/// Cookie store failure.
	#[error("{0}")]
	Cookie(
		#[from]
		#[source]
		crate::session::CookieError,
	),

	/// Upstream rejected the application credentials (`invalid_client`).
	#[error(
		"Upstream rejected the client credentials; check the configured client id and secret: {reason}."
	)]
	InvalidClient {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Upstream kept answering `429 Too Many Requests` past the configured retry budget.
	#[error("Upstream is persistently throttling: gave up after {attempts} attempts and {waited:?} of backoff.")]
	Throttled {
		/// Number of requests issued, including the first.
		attempts: u32,
		/// Total backoff slept before giving up.
		waited: Duration,
	},
}

/// Configuration and validation failures raised while constructing the gateway.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Building the transport's HTTP client failed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Builder error.
		#[source]
		source: BoxError,
	},
	/// An outgoing request could not be assembled.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),

	/// Client identifier is missing or empty.
	#[error("Client id is missing.")]
	MissingClientId,
	/// Client secret is missing or empty.
	#[error("Client secret is missing.")]
	MissingClientSecret,
	/// Neither a redirect URI nor a public URL to derive it from was supplied.
	#[error("Redirect URI cannot be computed without a public URL.")]
	MissingRedirect,
	/// A configured URL cannot be parsed.
	#[error("The {field} URL is invalid.")]
	InvalidUrl {
		/// Configuration field that failed to parse.
		field: &'static str,
		/// Parser error.
		#[source]
		source: url::ParseError,
	},
	/// Upstream endpoints must use HTTPS outside loopback hosts.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Endpoint name.
		endpoint: &'static str,
		/// Rejected URL.
		url: String,
	},
	/// Scope list is empty.
	#[error("At least one scope must be requested.")]
	EmptyScopes,
	/// Scope list contains an invalid entry.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
}
impl ConfigError {
	/// Boxes a client-builder error.
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Non-credential upstream failures.
#[derive(Debug, ThisError)]
pub enum UpstreamError {
	/// Upstream answered with a non-success response.
	#[error("Upstream rejected the {operation} request: {message}.")]
	Rejected {
		/// Gateway operation that failed.
		operation: &'static str,
		/// Upstream-provided description, or a summary of the response.
		message: String,
		/// OAuth `error` code, when the upstream sent one.
		code: Option<String>,
		/// Response status, if one arrived.
		status: Option<u16>,
	},
	/// Upstream responded with a body that could not be decoded.
	#[error("Upstream returned a malformed {operation} response.")]
	Malformed {
		/// Gateway operation that failed.
		operation: &'static str,
		/// Decoder error with the path of the failing field.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// Response status, if one arrived.
		status: Option<u16>,
	},
}
impl UpstreamError {
	/// HTTP status attached to the failure, if known.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. } | Self::Malformed { status, .. } => *status,
		}
	}
}

/// Failures below the HTTP layer.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// The HTTP client could not reach the upstream.
	#[error("Network error occurred while calling the upstream API.")]
	Network {
		/// Client error.
		#[source]
		source: BoxError,
	},
	/// Socket-level failure.
	#[error("I/O error occurred while calling the upstream API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Boxes a client network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
