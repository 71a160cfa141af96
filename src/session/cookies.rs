//! Cookie-store contract the guard reads and writes session state through.

// self
use crate::{
	_prelude::*,
	auth::{SessionTokenSet, SubjectId, TokenSecret, UserProfile},
};

/// Boxed future returned by [`SessionCookieStore`] operations.
pub type CookieFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CookieError>> + 'a + Send>>;

/// Request-scoped access to the session cookies.
///
/// The guard is the only component that calls these methods, and only after a gateway call has
/// settled.
pub trait SessionCookieStore
where
	Self: Send + Sync,
{
	/// Reads the access token, refresh token, and subject cookies.
	fn read(&self) -> CookieFuture<'_, SessionCookies>;

	/// Replaces the session with a fresh token set and the profile fetched for it.
	fn write<'a>(
		&'a self,
		tokens: &'a SessionTokenSet,
		profile: &'a UserProfile,
	) -> CookieFuture<'a, ()>;

	/// Removes every session cookie.
	fn clear(&self) -> CookieFuture<'_, ()>;
}

/// Error type produced by [`SessionCookieStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CookieError {
	/// A cookie value could not be encoded or decoded.
	#[error("Cookie serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// The cookie backend failed.
	#[error("Cookie backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Session cookies as read at the start of a request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookies {
	/// Access token cookie.
	pub access_token: Option<TokenSecret>,
	/// Refresh token cookie.
	pub refresh_token: Option<TokenSecret>,
	/// Subject cookie, set once a profile has been fetched.
	pub subject: Option<SubjectId>,
}
impl SessionCookies {
	/// Returns the access/refresh pair when both cookies are present and non-empty.
	pub fn credentials(&self) -> Option<(&TokenSecret, &TokenSecret)> {
		let access = self.access_token.as_ref().filter(|secret| !secret.is_empty())?;
		let refresh = self.refresh_token.as_ref().filter(|secret| !secret.is_empty())?;

		Some((access, refresh))
	}
}

#[derive(Debug, Default)]
struct JarState {
	cookies: SessionCookies,
	profile: Option<UserProfile>,
}

/// In-process [`SessionCookieStore`] for demos and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryCookieJar(Arc<Mutex<JarState>>);
impl MemoryCookieJar {
	/// Creates a jar already holding a session.
	pub fn with_session(
		access_token: impl Into<String>,
		refresh_token: impl Into<String>,
		subject: Option<SubjectId>,
	) -> Self {
		let jar = Self::default();

		jar.0.lock().cookies = SessionCookies {
			access_token: Some(TokenSecret::new(access_token)),
			refresh_token: Some(TokenSecret::new(refresh_token)),
			subject,
		};

		jar
	}

	/// Current cookie values.
	pub fn cookies(&self) -> SessionCookies {
		self.0.lock().cookies.clone()
	}

	/// Profile stored by the last write, if any.
	pub fn profile(&self) -> Option<UserProfile> {
		self.0.lock().profile.clone()
	}
}
impl SessionCookieStore for MemoryCookieJar {
	fn read(&self) -> CookieFuture<'_, SessionCookies> {
		let cookies = self.cookies();

		Box::pin(async move { Ok(cookies) })
	}

	fn write<'a>(
		&'a self,
		tokens: &'a SessionTokenSet,
		profile: &'a UserProfile,
	) -> CookieFuture<'a, ()> {
		let state = self.0.clone();

		Box::pin(async move {
			let mut state = state.lock();

			state.cookies = SessionCookies {
				access_token: Some(tokens.access_token.clone()),
				refresh_token: Some(tokens.refresh_token.clone()),
				subject: Some(profile.id.clone()),
			};
			state.profile = Some(profile.clone());

			Ok(())
		})
	}

	fn clear(&self) -> CookieFuture<'_, ()> {
		let state = self.0.clone();

		Box::pin(async move {
			*state.lock() = JarState::default();

			Ok(())
		})
	}
}
