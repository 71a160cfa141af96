//! Gateway configuration: credentials, redirect URI, scopes, and upstream endpoints.
//!
//! [`GatewayConfigBuilder`] validates everything once at construction so the gateway never
//! discovers a half-configured client in the middle of a request.

// self
use crate::{_prelude::*, auth::ScopeSet, error::ConfigError};

/// Upstream API base used when none is configured.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";
/// Callback path appended to the public URL to compute the redirect URI.
pub const DEFAULT_CALLBACK_PATH: &str = "api/auth/callback";
/// Scopes requested during authorization: identity, group membership, and email.
pub const DEFAULT_SCOPES: [&str; 3] = ["identify", "guilds", "email"];
/// Client identification string sent with every upstream request.
pub const DEFAULT_USER_AGENT: &str =
	concat!("oauth2-gatekeeper/", env!("CARGO_PKG_VERSION"), " (+https://github.com/hack-ink/oauth2-gatekeeper)");

/// Environment variable holding the client id.
pub const ENV_CLIENT_ID: &str = "OAUTH2_CLIENT_ID";
/// Environment variable holding the client secret.
pub const ENV_CLIENT_SECRET: &str = "OAUTH2_CLIENT_SECRET";
/// Environment variable holding the dashboard's public URL.
pub const ENV_PUBLIC_URL: &str = "OAUTH2_PUBLIC_URL";
/// Environment variable overriding the computed redirect URI.
pub const ENV_REDIRECT_URI: &str = "OAUTH2_REDIRECT_URI";
/// Environment variable overriding the upstream API base.
pub const ENV_API_BASE: &str = "OAUTH2_API_BASE";
/// Environment variable overriding the client identification string.
pub const ENV_USER_AGENT: &str = "OAUTH2_USER_AGENT";

/// Upstream endpoints derived from the API base.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamEndpoints {
	/// Consent screen the browser is redirected to.
	pub authorization: Url,
	/// Token endpoint used for code exchange and refresh.
	pub token: Url,
	/// Token-introspection resource used for validation.
	pub introspection: Url,
	/// Profile resource of the authorizing user.
	pub profile: Url,
}
impl UpstreamEndpoints {
	/// Derives the endpoint set from an API base such as `https://discord.com/api/v10`.
	pub fn from_api_base(api_base: &Url) -> Result<Self, ConfigError> {
		Ok(Self {
			authorization: join("authorization", api_base, "oauth2/authorize")?,
			token: join("token", api_base, "oauth2/token")?,
			introspection: join("introspection", api_base, "oauth2/@me")?,
			profile: join("profile", api_base, "users/@me")?,
		})
	}

	fn validate(&self) -> Result<(), ConfigError> {
		validate_endpoint("authorization", &self.authorization)?;
		validate_endpoint("token", &self.token)?;
		validate_endpoint("introspection", &self.introspection)?;
		validate_endpoint("profile", &self.profile)?;

		Ok(())
	}
}

/// Immutable, validated gateway configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret; never serialized.
	#[serde(skip_serializing)]
	pub client_secret: String,
	/// Redirect URI registered with the upstream application.
	pub redirect_uri: Url,
	/// Scopes requested during authorization.
	pub scopes: ScopeSet,
	/// Upstream endpoints.
	pub endpoints: UpstreamEndpoints,
	/// Client identification string sent as `User-Agent`.
	pub user_agent: String,
}
impl GatewayConfig {
	/// Creates a new builder.
	pub fn builder() -> GatewayConfigBuilder {
		GatewayConfigBuilder::default()
	}

	/// Reads the configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Reads the configuration through `lookup`, using the `OAUTH2_*` variable names.
	///
	/// Blank values count as absent.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
		let parse = |field: &'static str, key: &str| {
			read(key)
				.map(|raw| Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl { field, source }))
				.transpose()
		};
		let mut builder = Self::builder();

		builder.client_id = read(ENV_CLIENT_ID);
		builder.client_secret = read(ENV_CLIENT_SECRET);
		builder.public_url = parse("public", ENV_PUBLIC_URL)?;
		builder.redirect_uri = parse("redirect", ENV_REDIRECT_URI)?;
		builder.api_base = parse("api base", ENV_API_BASE)?;

		if let Some(user_agent) = read(ENV_USER_AGENT) {
			builder.user_agent = user_agent;
		}

		builder.build()
	}
}
impl Debug for GatewayConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("GatewayConfig")
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.field("redirect_uri", &self.redirect_uri)
			.field("scopes", &self.scopes)
			.field("endpoints", &self.endpoints)
			.field("user_agent", &self.user_agent)
			.finish()
	}
}

/// Builder for [`GatewayConfig`] values.
#[derive(Debug)]
pub struct GatewayConfigBuilder {
	/// OAuth client identifier.
	pub client_id: Option<String>,
	/// OAuth client secret.
	pub client_secret: Option<String>,
	/// Public URL of the dashboard; the redirect URI is computed from it.
	pub public_url: Option<Url>,
	/// Explicit redirect URI, overriding the computed one.
	pub redirect_uri: Option<Url>,
	/// Upstream API base the endpoints are derived from; defaults to [`DEFAULT_API_BASE`].
	pub api_base: Option<Url>,
	/// Scopes requested during authorization.
	pub scopes: Vec<String>,
	/// Client identification string.
	pub user_agent: String,
}
impl Default for GatewayConfigBuilder {
	fn default() -> Self {
		Self {
			client_id: None,
			client_secret: None,
			public_url: None,
			redirect_uri: None,
			api_base: None,
			scopes: DEFAULT_SCOPES.iter().map(|scope| (*scope).to_owned()).collect(),
			user_agent: DEFAULT_USER_AGENT.to_owned(),
		}
	}
}
impl GatewayConfigBuilder {
	/// Sets the client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the client secret.
	pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
		self.client_secret = Some(client_secret.into());

		self
	}

	/// Sets the dashboard's public URL.
	pub fn public_url(mut self, url: Url) -> Self {
		self.public_url = Some(url);

		self
	}

	/// Overrides the computed redirect URI.
	pub fn redirect_uri(mut self, url: Url) -> Self {
		self.redirect_uri = Some(url);

		self
	}

	/// Overrides the upstream API base.
	pub fn api_base(mut self, url: Url) -> Self {
		self.api_base = Some(url);

		self
	}

	/// Replaces the requested scopes.
	pub fn scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes = scopes.into_iter().map(Into::into).collect();

		self
	}

	/// Overrides the client identification string.
	pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = user_agent.into();

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<GatewayConfig, ConfigError> {
		let client_id = self
			.client_id
			.filter(|value| !value.trim().is_empty())
			.ok_or(ConfigError::MissingClientId)?;
		let client_secret = self
			.client_secret
			.filter(|value| !value.trim().is_empty())
			.ok_or(ConfigError::MissingClientSecret)?;
		let redirect_uri = match (self.redirect_uri, self.public_url) {
			(Some(redirect), _) => redirect,
			(None, Some(public)) => join("redirect", &public, DEFAULT_CALLBACK_PATH)?,
			(None, None) => return Err(ConfigError::MissingRedirect),
		};
		let scopes = ScopeSet::new(self.scopes)?;

		if scopes.is_empty() {
			return Err(ConfigError::EmptyScopes);
		}

		let api_base = match self.api_base {
			Some(api_base) => api_base,
			None => Url::parse(DEFAULT_API_BASE)
				.map_err(|source| ConfigError::InvalidUrl { field: "api base", source })?,
		};
		let endpoints = UpstreamEndpoints::from_api_base(&api_base)?;

		endpoints.validate()?;

		Ok(GatewayConfig {
			client_id,
			client_secret,
			redirect_uri,
			scopes,
			endpoints,
			user_agent: self.user_agent,
		})
	}
}

fn join(field: &'static str, base: &Url, path: &str) -> Result<Url, ConfigError> {
	let mut base = base.clone();

	if !base.path().ends_with('/') {
		let path = format!("{}/", base.path());

		base.set_path(&path);
	}

	base.join(path).map_err(|source| ConfigError::InvalidUrl { field, source })
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigError> {
	let loopback = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));

	if url.scheme() == "https" || (url.scheme() == "http" && loopback) {
		Ok(())
	} else {
		Err(ConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("URL fixture should parse successfully.")
	}

	fn credentials() -> GatewayConfigBuilder {
		GatewayConfig::builder().client_id("client").client_secret("secret")
	}

	#[test]
	fn builder_computes_redirect_and_endpoints() {
		let config = credentials()
			.public_url(url("https://dashboard.example.com"))
			.build()
			.expect("Configuration should build with defaults.");

		assert_eq!(config.redirect_uri.as_str(), "https://dashboard.example.com/api/auth/callback");
		assert_eq!(config.endpoints.authorization.as_str(), "https://discord.com/api/v10/oauth2/authorize");
		assert_eq!(config.endpoints.token.as_str(), "https://discord.com/api/v10/oauth2/token");
		assert_eq!(config.endpoints.introspection.as_str(), "https://discord.com/api/v10/oauth2/@me");
		assert_eq!(config.endpoints.profile.as_str(), "https://discord.com/api/v10/users/@me");
		assert_eq!(config.scopes.normalized(), "email guilds identify");
	}

	#[test]
	fn builder_rejects_partial_credentials() {
		let err = GatewayConfig::builder()
			.client_id("client")
			.public_url(url("https://dashboard.example.com"))
			.build()
			.expect_err("A missing secret must be rejected.");

		assert!(matches!(err, ConfigError::MissingClientSecret));

		let err = GatewayConfig::builder()
			.client_id("   ")
			.client_secret("secret")
			.public_url(url("https://dashboard.example.com"))
			.build()
			.expect_err("A blank client id must be rejected.");

		assert!(matches!(err, ConfigError::MissingClientId));

		let err = credentials().build().expect_err("A missing redirect must be rejected.");

		assert!(matches!(err, ConfigError::MissingRedirect));
	}

	#[test]
	fn builder_rejects_insecure_endpoints_and_empty_scopes() {
		let err = credentials()
			.public_url(url("https://dashboard.example.com"))
			.api_base(url("http://upstream.example.com/api"))
			.build()
			.expect_err("Plain HTTP upstreams must be rejected.");

		assert!(matches!(err, ConfigError::InsecureEndpoint { endpoint: "authorization", .. }));

		let err = credentials()
			.public_url(url("https://dashboard.example.com"))
			.scopes(Vec::<String>::new())
			.build()
			.expect_err("An empty scope list must be rejected.");

		assert!(matches!(err, ConfigError::EmptyScopes));
	}

	#[test]
	fn loopback_upstreams_may_use_http() {
		let config = credentials()
			.redirect_uri(url("http://localhost:3000/callback"))
			.api_base(url("http://127.0.0.1:8080/api/"))
			.build()
			.expect("Loopback upstreams should be accepted.");

		assert_eq!(config.endpoints.token.as_str(), "http://127.0.0.1:8080/api/oauth2/token");
		assert_eq!(config.redirect_uri.as_str(), "http://localhost:3000/callback");
	}

	#[test]
	fn serialized_config_omits_the_secret() {
		let config = credentials()
			.public_url(url("https://dashboard.example.com"))
			.build()
			.expect("Configuration should build with defaults.");
		let payload = serde_json::to_string(&config).expect("Configuration should serialize.");

		assert!(payload.contains("\"client_id\":\"client\""));
		assert!(!payload.contains("client_secret"));
		assert!(!payload.contains("\"secret\""));
	}

	#[test]
	fn lookup_reads_oauth2_variables() {
		let vars = HashMap::from([
			(ENV_CLIENT_ID, "client-env"),
			(ENV_CLIENT_SECRET, "secret-env"),
			(ENV_PUBLIC_URL, "https://dash.example.com/"),
			(ENV_USER_AGENT, ""),
		]);
		let config = GatewayConfig::from_lookup(|key| vars.get(key).map(|value| (*value).to_owned()))
			.expect("Configuration should build from lookup values.");

		assert_eq!(config.client_id, "client-env");
		assert_eq!(config.redirect_uri.as_str(), "https://dash.example.com/api/auth/callback");
		assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
		assert!(!format!("{config:?}").contains("secret-env"));

		let err = GatewayConfig::from_lookup(|key| (key == ENV_CLIENT_ID).then(|| "client".to_owned()))
			.expect_err("Partial credentials must be rejected.");

		assert!(matches!(err, ConfigError::MissingClientSecret));
	}
}
