//! Transport primitives for upstream calls.
//!
//! [`GatewayTransport`] is the gatekeeper's only dependency on an HTTP stack. The gateway wraps
//! every implementation with the rate limiter and the throttling retry loop, so a transport only
//! has to move bytes. [`ResponseMetadataSlot`] carries the status and retry hint of the most
//! recent response back to the error-mapping layer after `oauth2` has consumed the body.

// crates.io
use oauth2::http::{HeaderMap, header::RETRY_AFTER};
// self
use crate::_prelude::*;

pub use oauth2::{HttpRequest, HttpResponse};

/// Boxed future returned by [`GatewayTransport::execute`].
pub type TransportFuture<'a, E> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, E>> + 'a + Send + Sync>>;

/// HTTP stack used to reach the upstream API.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared behind an
/// `Arc` by every gateway operation, and the futures they return must be `Send + Sync` so the
/// gateway can hand them to `oauth2` unchanged.
pub trait GatewayTransport
where
	Self: 'static + Send + Sync,
{
	/// Error raised when no response arrives.
	type TransportError: 'static + Send + Sync + StdError;

	/// Performs a single request without retrying or throttling.
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_, Self::TransportError>;
}

/// Status and throttling hint of one upstream response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the upstream, if available.
	pub status: Option<u16>,
	/// Parsed `Retry-After` header.
	pub retry_after: Option<Duration>,
}
impl ResponseMetadata {
	/// Reads status and retry hint from a response.
	pub fn from_response(response: &HttpResponse) -> Self {
		Self {
			status: Some(response.status().as_u16()),
			retry_after: parse_retry_after(response.headers()),
		}
	}
}

/// Last [`ResponseMetadata`] seen by a dispatcher, read back when mapping token errors.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Replaces the stored metadata.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Removes and returns the stored metadata.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Thin wrapper around [`ReqwestClient`].
///
/// Upstream token endpoints answer directly, so any custom client should disable redirect
/// following before it is wrapped here.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Uses a preconfigured reqwest client.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl GatewayTransport for ReqwestTransport {
	type TransportError = ReqwestError;

	fn execute(&self, request: HttpRequest) -> TransportFuture<'_, Self::TransportError> {
		let client = self.0.clone();

		Box::pin(async move {
			let response = client.execute(request.try_into()?).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new = HttpResponse::new(response.bytes().await?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Parses a `Retry-After` header expressed in (possibly fractional) seconds.
///
/// The HTTP-date form is not supported and yields `None`, as do negative or non-finite values.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
	let secs = raw.parse::<f64>().ok()?;

	if !secs.is_finite() || secs < 0. {
		return None;
	}

	Duration::try_from_secs_f64(secs).ok()
}
