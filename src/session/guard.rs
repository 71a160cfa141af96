//! Session state machine evaluated once per incoming request.

// self
use crate::{
	_prelude::*,
	auth::SubjectId,
	gateway::SessionGateway,
	obs,
	session::{RouteTable, SessionCookieStore},
};

/// State a guarded request ends in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
	/// The route needs no session.
	Public,
	/// The route needs a session and the cookies carry none.
	Unauthenticated,
	/// The session was valid or has been refreshed.
	Authenticated,
	/// The session could not be trusted and has been cleared.
	RefreshFailed,
}
impl SessionState {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			SessionState::Public => "public",
			SessionState::Unauthenticated => "unauthenticated",
			SessionState::Authenticated => "authenticated",
			SessionState::RefreshFailed => "refresh_failed",
		}
	}
}
impl Display for SessionState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Where a guarded request is sent instead of the downstream handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RedirectTarget {
	/// The upstream consent screen.
	Authorize(Url),
	/// The application root.
	Root,
}
impl RedirectTarget {
	/// Value for the `Location` header.
	pub fn location(&self) -> &str {
		match self {
			RedirectTarget::Authorize(url) => url.as_str(),
			RedirectTarget::Root => "/",
		}
	}
}

/// Outcome of [`SessionGuard::handle`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardResponse<R> {
	/// The downstream handler ran and produced `response`.
	Forward {
		/// Final session state.
		state: SessionState,
		/// Whether the matched route is force-dynamic.
		force_dynamic: bool,
		/// Downstream response.
		response: R,
	},
	/// The downstream handler did not run.
	Redirect {
		/// Final session state.
		state: SessionState,
		/// Redirect destination.
		target: RedirectTarget,
	},
}
impl<R> GuardResponse<R> {
	/// Final session state.
	pub fn state(&self) -> SessionState {
		match self {
			GuardResponse::Forward { state, .. } | GuardResponse::Redirect { state, .. } => *state,
		}
	}

	/// Downstream response, if the handler ran.
	pub fn into_response(self) -> Option<R> {
		match self {
			GuardResponse::Forward { response, .. } => Some(response),
			GuardResponse::Redirect { .. } => None,
		}
	}
}

/// Request guard driving the session state machine.
///
/// Holds no per-request state; one guard serves every request.
pub struct SessionGuard<G>
where
	G: ?Sized + SessionGateway,
{
	gateway: Arc<G>,
	routes: RouteTable,
}
impl<G> SessionGuard<G>
where
	G: ?Sized + SessionGateway,
{
	/// Creates a guard over `gateway` using `routes`.
	pub fn new(gateway: impl Into<Arc<G>>, routes: RouteTable) -> Self {
		Self { gateway: gateway.into(), routes }
	}

	/// Returns the route table.
	pub fn routes(&self) -> &RouteTable {
		&self.routes
	}

	/// Evaluates one request to `path`, invoking `next` at most once.
	pub async fn handle<S, F, Fut, R>(&self, path: &str, cookies: &S, next: F) -> GuardResponse<R>
	where
		S: ?Sized + SessionCookieStore,
		F: FnOnce() -> Fut,
		Fut: Future<Output = R>,
	{
		let response = self.evaluate(path, cookies, next).await;

		obs::record_session_state(response.state());

		response
	}

	async fn evaluate<S, F, Fut, R>(&self, path: &str, cookies: &S, next: F) -> GuardResponse<R>
	where
		S: ?Sized + SessionCookieStore,
		F: FnOnce() -> Fut,
		Fut: Future<Output = R>,
	{
		let rule = self.routes.match_path(path);
		let force_dynamic = rule.is_some_and(|rule| rule.force_dynamic);

		if !rule.is_some_and(|rule| rule.requires_auth) {
			return forward(SessionState::Public, force_dynamic, next).await;
		}

		let session = match cookies.read().await {
			Ok(session) => session,
			Err(e) => return fail_closed(cookies, e.into()).await,
		};
		let Some((access, refresh)) = session.credentials() else {
			return GuardResponse::Redirect {
				state: SessionState::Unauthenticated,
				target: RedirectTarget::Authorize(self.gateway.authorization_url()),
			};
		};

		if self.gateway.validate_token(access.expose(), session.subject.as_ref()).await {
			return forward(SessionState::Authenticated, force_dynamic, next).await;
		}

		match self.renew(cookies, refresh.expose(), session.subject.as_ref()).await {
			Ok(()) => forward(SessionState::Authenticated, force_dynamic, next).await,
			Err(e) => fail_closed(cookies, e).await,
		}
	}

	async fn renew<S>(
		&self,
		cookies: &S,
		refresh_token: &str,
		subject: Option<&SubjectId>,
	) -> Result<()>
	where
		S: ?Sized + SessionCookieStore,
	{
		let tokens = self.gateway.refresh_token(refresh_token).await?;
		let profile = self.gateway.user_info(tokens.access_token.expose(), subject).await?;
		let tokens = tokens.with_subject(profile.id.clone());

		cookies.write(&tokens, &profile).await?;

		Ok(())
	}
}
impl<G> Debug for SessionGuard<G>
where
	G: ?Sized + SessionGateway,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionGuard").field("routes", &self.routes).finish()
	}
}

async fn forward<F, Fut, R>(state: SessionState, force_dynamic: bool, next: F) -> GuardResponse<R>
where
	F: FnOnce() -> Fut,
	Fut: Future<Output = R>,
{
	GuardResponse::Forward { state, force_dynamic, response: next().await }
}

#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
async fn fail_closed<S, R>(cookies: &S, reason: Error) -> GuardResponse<R>
where
	S: ?Sized + SessionCookieStore,
{
	log_warn!(error = %reason, "Session cannot be trusted; signing the user out.");

	if let Err(e) = cookies.clear().await {
		log_warn!(error = %e, "Failed to clear session cookies.");
	}

	GuardResponse::Redirect { state: SessionState::RefreshFailed, target: RedirectTarget::Root }
}
