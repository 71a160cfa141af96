//! Upstream gateway: every outbound call to the OAuth-protected API goes through here.
//!
//! [`GatewayClient`] owns the rate limiter, the throttling policy, and the `oauth2` client
//! used for the token endpoint. One instance is built per process and shared behind an
//! [`Arc`]; tests build isolated instances with their own budgets.

pub mod dispatch;
pub mod resource;
pub mod token;

pub use dispatch::*;

// crates.io
use oauth2::{
	AuthType, AuthUrl, ClientId, ClientSecret, EndpointNotSet, EndpointSet, RedirectUrl, TokenUrl,
	basic::BasicClient, http::HeaderValue,
};
// self
use crate::{
	_prelude::*,
	auth::{SessionTokenSet, SubjectId, UserProfile},
	config::GatewayConfig,
	error::ConfigError,
	gateway::token::RefreshCoalescer,
	http::GatewayTransport,
	limiter::{Admission, RateLimiter},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Boxed future returned by fallible [`SessionGateway`] operations.
pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;
/// Boxed future returned by [`SessionGateway::validate_token`].
pub type ValidationFuture<'a> = Pin<Box<dyn Future<Output = bool> + 'a + Send>>;

#[cfg(feature = "reqwest")]
/// Gateway specialized for the crate's default reqwest transport.
pub type ReqwestGateway = GatewayClient<ReqwestTransport>;

/// Gateway contract consumed by the session guard.
///
/// [`GatewayClient`] is the production implementation; tests inject doubles that script
/// validation, refresh, and profile outcomes without touching the network.
pub trait SessionGateway
where
	Self: Send + Sync,
{
	/// Consent-screen URL unauthenticated visitors are redirected to.
	fn authorization_url(&self) -> Url;

	/// Returns `true` when the upstream accepts the access token.
	fn validate_token<'a>(
		&'a self,
		access_token: &'a str,
		subject: Option<&'a SubjectId>,
	) -> ValidationFuture<'a>;

	/// Exchanges a refresh token for a new token set.
	fn refresh_token<'a>(&'a self, refresh_token: &'a str) -> GatewayFuture<'a, SessionTokenSet>;

	/// Fetches the profile of the user owning the access token.
	fn user_info<'a>(
		&'a self,
		access_token: &'a str,
		subject: Option<&'a SubjectId>,
	) -> GatewayFuture<'a, UserProfile>;
}

/// Rate-limited client for the upstream OAuth and resource endpoints.
pub struct GatewayClient<T>
where
	T: ?Sized + GatewayTransport,
{
	config: GatewayConfig,
	transport: Arc<T>,
	limiter: Arc<RateLimiter>,
	throttle: ThrottlePolicy,
	user_agent: HeaderValue,
	oauth_client: ConfiguredBasicClient,
	refreshes: RefreshCoalescer,
}
impl<T> GatewayClient<T>
where
	T: ?Sized + GatewayTransport,
{
	/// Creates a gateway that sends every request through `transport`.
	pub fn with_transport(config: GatewayConfig, transport: impl Into<Arc<T>>) -> Result<Self> {
		let auth_url = AuthUrl::from_url(config.endpoints.authorization.clone());
		let token_url = TokenUrl::from_url(config.endpoints.token.clone());
		let redirect_url = RedirectUrl::from_url(config.redirect_uri.clone());
		let oauth_client = BasicClient::new(ClientId::new(config.client_id.clone()))
			.set_client_secret(ClientSecret::new(config.client_secret.clone()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_redirect_uri(redirect_url)
			.set_auth_type(AuthType::RequestBody);
		let user_agent = HeaderValue::from_str(&config.user_agent)
			.map_err(|err| ConfigError::from(oauth2::http::Error::from(err)))?;

		Ok(Self {
			config,
			transport: transport.into(),
			limiter: Default::default(),
			throttle: ThrottlePolicy::default(),
			user_agent,
			oauth_client,
			refreshes: Default::default(),
		})
	}

	/// Shares an existing limiter, e.g. between several gateways talking to the same upstream.
	pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
		self.limiter = limiter;

		self
	}

	/// Overrides the throttling retry policy.
	pub fn with_throttle_policy(mut self, policy: ThrottlePolicy) -> Self {
		self.throttle = policy;

		self
	}

	/// Returns the active configuration.
	pub fn config(&self) -> &GatewayConfig {
		&self.config
	}

	/// Returns the limiter every non-bypassed call passes through.
	pub fn limiter(&self) -> &Arc<RateLimiter> {
		&self.limiter
	}

	/// Builds the consent-screen URL.
	///
	/// The output depends only on configuration: `client_id`, `redirect_uri`,
	/// `response_type=code`, and the space-joined scope list, in that order.
	pub fn authorization_url(&self) -> Url {
		let mut url = self.config.endpoints.authorization.clone();

		url.query_pairs_mut()
			.append_pair("client_id", &self.config.client_id)
			.append_pair("redirect_uri", self.config.redirect_uri.as_str())
			.append_pair("response_type", "code")
			.append_pair("scope", &self.config.scopes.normalized());

		url
	}

	pub(crate) fn dispatcher(&self, admission: Admission) -> Dispatcher<T> {
		Dispatcher {
			transport: self.transport.clone(),
			limiter: self.limiter.clone(),
			policy: self.throttle,
			admission,
			slot: Default::default(),
			user_agent: self.user_agent.clone(),
		}
	}
}
#[cfg(feature = "reqwest")]
impl GatewayClient<ReqwestTransport> {
	/// Creates a gateway backed by a fresh reqwest client with redirects disabled.
	pub fn new(config: GatewayConfig) -> Result<Self> {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(ConfigError::from)?;

		Self::with_transport(config, ReqwestTransport::with_client(client))
	}
}
impl<T> SessionGateway for GatewayClient<T>
where
	T: ?Sized + GatewayTransport,
{
	fn authorization_url(&self) -> Url {
		GatewayClient::authorization_url(self)
	}

	fn validate_token<'a>(
		&'a self,
		access_token: &'a str,
		subject: Option<&'a SubjectId>,
	) -> ValidationFuture<'a> {
		Box::pin(GatewayClient::validate_token(self, access_token, subject))
	}

	fn refresh_token<'a>(&'a self, refresh_token: &'a str) -> GatewayFuture<'a, SessionTokenSet> {
		Box::pin(GatewayClient::refresh_token(self, refresh_token))
	}

	fn user_info<'a>(
		&'a self,
		access_token: &'a str,
		subject: Option<&'a SubjectId>,
	) -> GatewayFuture<'a, UserProfile> {
		Box::pin(GatewayClient::user_info(self, access_token, subject))
	}
}
impl<T> Debug for GatewayClient<T>
where
	T: ?Sized + GatewayTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("GatewayClient")
			.field("config", &self.config)
			.field("throttle", &self.throttle)
			.finish()
	}
}
