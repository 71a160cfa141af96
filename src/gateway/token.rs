//! Token-endpoint operations: authorization-code exchange and refresh.
//!
//! Both calls bypass the limiter and go through `oauth2` with client credentials in the form
//! body. Upstream errors are classified here, once: `invalid_client` becomes
//! [`Error::InvalidClient`], every other OAuth error becomes [`UpstreamError::Rejected`].

// crates.io
use oauth2::{
	AuthorizationCode, HttpClientError, RefreshToken, RequestTokenError, TokenResponse,
	basic::{BasicErrorResponse, BasicErrorResponseType, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, SessionTokenSet},
	error::{ConfigError, TransportError, UpstreamError},
	gateway::{DispatchError, GatewayClient},
	http::{GatewayTransport, ResponseMetadata},
	limiter::Admission,
	obs::{self, CallKind, CallOutcome, CallSpan},
};

/// How long a rotated token set is handed to callers presenting the same refresh token.
pub const REFRESH_REUSE_WINDOW: Duration = Duration::from_secs(10);

type TokenRequestError<E> = RequestTokenError<HttpClientError<DispatchError<E>>, BasicErrorResponse>;

impl<T> GatewayClient<T>
where
	T: ?Sized + GatewayTransport,
{
	/// Exchanges an authorization code for a session token set.
	pub async fn exchange_code(&self, code: &str) -> Result<SessionTokenSet> {
		const KIND: CallKind = CallKind::ExchangeCode;

		let span = CallSpan::new(KIND, "exchange_code");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				let dispatcher = self.dispatcher(Admission::Bypass);
				let response = self
					.oauth_client
					.exchange_code(AuthorizationCode::new(code.to_owned()))
					.request_async(&dispatcher)
					.await
					.map_err(|e| map_token_error(KIND, dispatcher.metadata(), e))?;

				token_set(KIND, &response, None)
			})
			.await;

		record_outcome(KIND, &result);

		result
	}

	/// Exchanges a refresh token for a new session token set.
	///
	/// Concurrent refreshes of the same token are coalesced: one request reaches the upstream
	/// and every caller presenting that token within [`REFRESH_REUSE_WINDOW`] receives its
	/// result. A response without a new refresh token keeps the presented one.
	pub async fn refresh_token(&self, refresh_token: &str) -> Result<SessionTokenSet> {
		const KIND: CallKind = CallKind::RefreshToken;

		let span = CallSpan::new(KIND, "refresh_token");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				let slot = self.refreshes.enter(refresh_token);
				let _singleflight = slot.lock().await;

				if let Some(tokens) = self.refreshes.recent(refresh_token, Instant::now()) {
					log_debug!("Reusing a refresh completed by a concurrent caller.");

					return Ok(tokens);
				}

				let result = self.request_refresh(refresh_token).await;

				if let Ok(tokens) = &result {
					self.refreshes.remember(refresh_token, tokens.clone(), Instant::now());
				}

				result
			})
			.await;

		record_outcome(KIND, &result);

		result
	}

	async fn request_refresh(&self, refresh_token: &str) -> Result<SessionTokenSet> {
		const KIND: CallKind = CallKind::RefreshToken;

		let dispatcher = self.dispatcher(Admission::Bypass);
		let secret = RefreshToken::new(refresh_token.to_owned());
		let response = self
			.oauth_client
			.exchange_refresh_token(&secret)
			.request_async(&dispatcher)
			.await
			.map_err(|e| map_token_error(KIND, dispatcher.metadata(), e))?;

		token_set(KIND, &response, Some(refresh_token))
	}
}

/// A caller's claim on the singleflight guard of one refresh token.
///
/// Dropping the slot, including when the caller's future is cancelled, removes the map entry
/// once no other caller shares it.
struct RefreshSlot<'a> {
	coalescer: &'a RefreshCoalescer,
	refresh_token: &'a str,
	guard: Arc<AsyncMutex<()>>,
}
impl RefreshSlot<'_> {
	async fn lock(&self) -> async_lock::MutexGuard<'_, ()> {
		self.guard.lock().await
	}
}
impl Drop for RefreshSlot<'_> {
	fn drop(&mut self) {
		let mut guards = self.coalescer.guards.lock();

		// One reference in the map plus this slot's.
		if Arc::strong_count(&self.guard) <= 2 {
			guards.remove(self.refresh_token);
		}
	}
}

/// Singleflight guards and recently rotated token sets, keyed by refresh token.
#[derive(Debug, Default)]
pub(crate) struct RefreshCoalescer {
	guards: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
	recent: Mutex<HashMap<String, (Instant, SessionTokenSet)>>,
}
impl RefreshCoalescer {
	fn enter<'a>(&'a self, refresh_token: &'a str) -> RefreshSlot<'a> {
		let guard = self
			.guards
			.lock()
			.entry(refresh_token.to_owned())
			.or_insert_with(|| Arc::new(AsyncMutex::new(())))
			.clone();

		RefreshSlot { coalescer: self, refresh_token, guard }
	}

	fn recent(&self, refresh_token: &str, now: Instant) -> Option<SessionTokenSet> {
		let recent = self.recent.lock();
		let (at, tokens) = recent.get(refresh_token)?;

		(now.duration_since(*at) < REFRESH_REUSE_WINDOW).then(|| tokens.clone())
	}

	fn remember(&self, refresh_token: &str, tokens: SessionTokenSet, now: Instant) {
		let mut recent = self.recent.lock();

		recent.retain(|_, (at, _)| now.duration_since(*at) < REFRESH_REUSE_WINDOW);
		recent.insert(refresh_token.to_owned(), (now, tokens));
	}
}

fn token_set(
	kind: CallKind,
	response: &BasicTokenResponse,
	presented_refresh: Option<&str>,
) -> Result<SessionTokenSet> {
	let refresh_token = match (response.refresh_token(), presented_refresh) {
		(Some(rotated), _) => rotated.secret().to_owned(),
		(None, Some(presented)) => presented.to_owned(),
		(None, None) =>
			return Err(UpstreamError::Rejected {
				operation: kind.as_str(),
				message: "Token response did not include a refresh token".into(),
				code: None,
				status: None,
			}
			.into()),
	};
	let mut tokens = SessionTokenSet::new(response.access_token().secret().to_owned(), refresh_token);

	if let Some(scopes) = response.scopes() {
		// `oauth2` splits on single spaces, so a stray separator yields blank entries.
		let wire = scopes.iter().map(|scope| scope.as_str()).collect::<Vec<_>>().join(" ");

		tokens = tokens.with_scope(ScopeSet::parse(&wire));
	}
	if let Some(expires_in) = response.expires_in() {
		tokens = tokens.with_lifetime(OffsetDateTime::now_utc(), expires_in);
	}

	Ok(tokens)
}

fn map_token_error<E>(
	kind: CallKind,
	meta: Option<ResponseMetadata>,
	err: TokenRequestError<E>,
) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	let operation = kind.as_str();
	let status = meta.and_then(|value| value.status);

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response(operation, &response, status),
		RequestTokenError::Request(HttpClientError::Reqwest(inner)) => Error::from(*inner),
		RequestTokenError::Request(HttpClientError::Http(inner)) => ConfigError::from(inner).into(),
		RequestTokenError::Request(HttpClientError::Io(inner)) => TransportError::Io(inner).into(),
		RequestTokenError::Request(HttpClientError::Other(message)) =>
			UpstreamError::Rejected { operation, message, code: None, status }.into(),
		RequestTokenError::Request(_) => UpstreamError::Rejected {
			operation,
			message: "HTTP client error occurred while calling the token endpoint".into(),
			code: None,
			status,
		}
		.into(),
		RequestTokenError::Parse(source, _body) =>
			UpstreamError::Malformed { operation, source, status }.into(),
		RequestTokenError::Other(message) =>
			UpstreamError::Rejected { operation, message, code: None, status }.into(),
	}
}

fn map_server_response(
	operation: &'static str,
	response: &BasicErrorResponse,
	status: Option<u16>,
) -> Error {
	let code = response.error().as_ref().to_owned();
	let message = response.error_description().cloned().unwrap_or_else(|| code.clone());

	if matches!(response.error(), BasicErrorResponseType::InvalidClient) {
		log_warn!(operation, "Upstream rejected the client credentials.");

		return Error::InvalidClient { reason: message };
	}

	UpstreamError::Rejected { operation, message, code: Some(code), status }.into()
}

fn record_outcome<V>(kind: CallKind, result: &Result<V>) {
	match result {
		Ok(_) => obs::record_call_outcome(kind, CallOutcome::Success),
		Err(_) => obs::record_call_outcome(kind, CallOutcome::Failure),
	}
}
