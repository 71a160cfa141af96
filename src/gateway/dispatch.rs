//! Request primitive shared by every gateway operation.
//!
//! A [`Dispatcher`] is built per call. It passes the limiter once, stamps the client
//! identification header, and absorbs `429 Too Many Requests` answers with a bounded retry
//! loop that never re-enters the limiter. It also implements [`AsyncHttpClient`] so the
//! `oauth2` token requests run through the same path.

// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError,
	http::{HeaderValue, StatusCode, header::USER_AGENT},
};
// self
use crate::{
	_prelude::*,
	error::TransportError,
	http::{GatewayTransport, HttpRequest, HttpResponse, ResponseMetadata, ResponseMetadataSlot},
	limiter::{Admission, RateLimiter},
	obs,
};

/// Backoff applied when a `429` answer carries no usable `Retry-After` header.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Bounds on how long the gateway keeps retrying a throttled request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThrottlePolicy {
	/// Maximum number of requests issued per call, including the first one.
	pub max_attempts: u32,
	/// Maximum cumulative backoff slept per call.
	pub max_backoff: Duration,
}
impl Default for ThrottlePolicy {
	fn default() -> Self {
		Self { max_attempts: 5, max_backoff: Duration::from_secs(60) }
	}
}

/// Failure raised by [`Dispatcher::send`].
#[derive(Debug, ThisError)]
pub enum DispatchError<E>
where
	E: 'static + StdError,
{
	/// The transport failed before a response arrived.
	#[error("Transport failed while calling the upstream API.")]
	Transport(#[source] E),
	/// The upstream kept throttling past the [`ThrottlePolicy`].
	#[error("Upstream kept throttling after {attempts} attempts.")]
	Throttled {
		/// Number of requests issued, including the first.
		attempts: u32,
		/// Total backoff slept before giving up.
		waited: Duration,
	},
}
impl<E> From<DispatchError<E>> for Error
where
	E: 'static + Send + Sync + StdError,
{
	fn from(e: DispatchError<E>) -> Self {
		match e {
			DispatchError::Transport(source) => TransportError::network(source).into(),
			DispatchError::Throttled { attempts, waited } => Error::Throttled { attempts, waited },
		}
	}
}

/// Per-call request primitive; see the module docs.
pub struct Dispatcher<T>
where
	T: ?Sized + GatewayTransport,
{
	pub(crate) transport: Arc<T>,
	pub(crate) limiter: Arc<RateLimiter>,
	pub(crate) policy: ThrottlePolicy,
	pub(crate) admission: Admission,
	pub(crate) slot: ResponseMetadataSlot,
	pub(crate) user_agent: HeaderValue,
}
impl<T> Dispatcher<T>
where
	T: ?Sized + GatewayTransport,
{
	/// Metadata of the last response this dispatcher saw.
	pub fn metadata(&self) -> Option<ResponseMetadata> {
		self.slot.take()
	}

	/// Issues `request`, retrying throttled answers within the [`ThrottlePolicy`].
	pub async fn send(
		&self,
		mut request: HttpRequest,
	) -> Result<HttpResponse, DispatchError<T::TransportError>> {
		self.limiter.acquire(&self.admission).await;

		request.headers_mut().insert(USER_AGENT, self.user_agent.clone());

		let mut attempts = 0;
		let mut waited = Duration::ZERO;

		loop {
			attempts += 1;

			self.slot.take();

			let response =
				self.transport.execute(replicate(&request)).await.map_err(DispatchError::Transport)?;
			let meta = ResponseMetadata::from_response(&response);

			if response.status() != StatusCode::TOO_MANY_REQUESTS {
				self.slot.store(meta);

				return Ok(response);
			}

			let backoff = meta.retry_after.unwrap_or(DEFAULT_RETRY_AFTER);

			self.slot.store(meta);
			obs::record_throttled(self.admission.resource());

			if attempts >= self.policy.max_attempts || waited + backoff > self.policy.max_backoff {
				log_warn!(
					uri = %request.uri(),
					attempts,
					?waited,
					"Upstream kept throttling; giving up."
				);

				return Err(DispatchError::Throttled { attempts, waited });
			}

			log_debug!(uri = %request.uri(), attempts, ?backoff, "Upstream throttled request; backing off.");

			tokio::time::sleep(backoff).await;

			waited += backoff;
		}
	}
}
impl<'c, T> AsyncHttpClient<'c> for Dispatcher<T>
where
	T: ?Sized + GatewayTransport,
{
	type Error = HttpClientError<DispatchError<T::TransportError>>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.send(request).await.map_err(|e| HttpClientError::Reqwest(Box::new(e)))
		})
	}
}

fn replicate(request: &HttpRequest) -> HttpRequest {
	let mut copy = HttpRequest::new(request.body().clone());

	*copy.method_mut() = request.method().clone();
	*copy.uri_mut() = request.uri().clone();
	*copy.version_mut() = request.version();
	*copy.headers_mut() = request.headers().clone();

	copy
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::*,
		auth::SubjectId,
		gateway::GatewayClient,
		limiter::{RateLimitConfig, Resource},
	};

	fn profile_request() -> HttpRequest {
		oauth2::http::Request::builder()
			.uri("https://upstream.example.com/api/v10/users/@me")
			.body(Vec::new())
			.expect("Request fixture should build.")
	}

	fn limited() -> Admission {
		Admission::limited(
			SubjectId::new("u1").expect("Subject fixture should be valid."),
			Resource::Profile,
		)
	}

	#[tokio::test(start_paused = true)]
	async fn throttled_requests_are_retried_after_the_hint() {
		let (gateway, transport) = build_scripted_gateway([
			ScriptedReply::throttled("2"),
			ScriptedReply::json(200, "{\"ok\":true}"),
		]);
		// Admissions stay in the window well past the hint.
		let gateway = gateway.with_limiter(Arc::new(RateLimiter::new(RateLimitConfig {
			window: Duration::from_secs(10),
			..Default::default()
		})));
		let dispatcher = gateway.dispatcher(limited());
		let response =
			dispatcher.send(profile_request()).await.expect("Retry should eventually succeed.");
		let requests = transport.requests();

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(requests.len(), 2);
		assert!(requests[1].at - requests[0].at >= Duration::from_secs(2));
		assert_eq!(
			gateway.limiter().budget_len(),
			1,
			"The retry must not pass through the limiter again."
		);
		assert!(requests.iter().all(|request| request.user_agent.is_some()));
		assert_eq!(dispatcher.metadata().and_then(|meta| meta.status), Some(200));
	}

	#[tokio::test(start_paused = true)]
	async fn persistent_throttling_hits_the_attempt_cap() {
		let transport =
			Arc::new(ScriptedTransport::new([]).with_fallback(ScriptedReply::throttled("1")));
		let gateway = GatewayClient::<ScriptedTransport>::with_transport(
			test_config("https://upstream.example.com/api/v10"),
			transport.clone(),
		)
		.expect("Gateway should build.")
		.with_throttle_policy(ThrottlePolicy { max_attempts: 3, max_backoff: Duration::from_secs(60) });
		let err = gateway
			.dispatcher(Admission::Bypass)
			.send(profile_request())
			.await
			.expect_err("Persistent throttling must surface an error.");

		assert!(matches!(
			err,
			DispatchError::Throttled { attempts: 3, waited } if waited == Duration::from_secs(2)
		));
		assert_eq!(transport.requests().len(), 3);
	}

	#[tokio::test(start_paused = true)]
	async fn oversized_hint_fails_without_sleeping() {
		let (gateway, transport) = build_scripted_gateway([ScriptedReply::throttled("120")]);
		let started = Instant::now();
		let err = gateway
			.dispatcher(Admission::Bypass)
			.send(profile_request())
			.await
			.expect_err("A hint beyond the backoff cap must fail immediately.");

		assert!(matches!(err, DispatchError::Throttled { attempts: 1, waited } if waited.is_zero()));
		assert_eq!(transport.requests().len(), 1);
		assert_eq!(Instant::now(), started);
		assert!(matches!(Error::from(err), Error::Throttled { attempts: 1, .. }));
	}
}
