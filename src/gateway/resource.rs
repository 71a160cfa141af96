//! Bearer-authenticated resource calls: token validation and profile retrieval.

// crates.io
use oauth2::http::{
	Method, Request,
	header::{ACCEPT, AUTHORIZATION},
};
// self
use crate::{
	_prelude::*,
	auth::{SubjectId, TokenSecret, UserProfile},
	error::{ConfigError, UpstreamError},
	gateway::GatewayClient,
	http::{GatewayTransport, HttpResponse},
	limiter::{Admission, Resource},
	obs::{self, CallKind, CallOutcome, CallSpan},
};

impl<T> GatewayClient<T>
where
	T: ?Sized + GatewayTransport,
{
	/// Fetches the profile of the user owning `access_token`.
	///
	/// The call is charged to `subject`, or to a pseudo-subject derived from the token when the
	/// identity is not known yet.
	pub async fn user_info(
		&self,
		access_token: &str,
		subject: Option<&SubjectId>,
	) -> Result<UserProfile> {
		const KIND: CallKind = CallKind::UserInfo;

		let span = CallSpan::new(KIND, "user_info");
		let subject = charge_to(access_token, subject);

		span.record_subject(&subject);
		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result: Result<UserProfile> = span
			.instrument(async move {
				let url = self.config.endpoints.profile.clone();
				let response = self.get_bearer(url, access_token, subject, Resource::Profile).await?;
				let status = response.status();

				if !status.is_success() {
					return Err(rejected(KIND, &response).into());
				}

				let mut deserializer = serde_json::Deserializer::from_slice(response.body());

				serde_path_to_error::deserialize::<_, UserProfile>(&mut deserializer).map_err(|source| {
					UpstreamError::Malformed {
						operation: KIND.as_str(),
						source,
						status: Some(status.as_u16()),
					}
					.into()
				})
			})
			.await;

		match &result {
			Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(KIND, CallOutcome::Failure),
		}

		result
	}

	/// Asks the introspection resource whether `access_token` is still accepted.
	///
	/// `Ok(false)` means the upstream answered and refused the token; transport failures and
	/// exhausted throttling surface as errors.
	pub async fn check_token(
		&self,
		access_token: &str,
		subject: Option<&SubjectId>,
	) -> Result<bool> {
		const KIND: CallKind = CallKind::ValidateToken;

		let span = CallSpan::new(KIND, "check_token");
		let subject = charge_to(access_token, subject);

		span.record_subject(&subject);
		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result: Result<bool> = span
			.instrument(async move {
				let url = self.config.endpoints.introspection.clone();
				let response =
					self.get_bearer(url, access_token, subject, Resource::Introspection).await?;

				Ok(response.status().is_success())
			})
			.await;

		match &result {
			Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(KIND, CallOutcome::Failure),
		}

		result
	}

	/// Infallible form of [`check_token`](Self::check_token): any failure counts as invalid.
	#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
	pub async fn validate_token(&self, access_token: &str, subject: Option<&SubjectId>) -> bool {
		match self.check_token(access_token, subject).await {
			Ok(valid) => valid,
			Err(e) => {
				log_warn!(error = %e, "Token validation failed; treating the token as invalid.");

				false
			},
		}
	}

	async fn get_bearer(
		&self,
		url: Url,
		access_token: &str,
		subject: SubjectId,
		resource: Resource,
	) -> Result<HttpResponse> {
		let request = Request::builder()
			.method(Method::GET)
			.uri(url.as_str())
			.header(AUTHORIZATION, TokenSecret::new(access_token).bearer())
			.header(ACCEPT, "application/json")
			.body(Vec::new())
			.map_err(ConfigError::from)?;
		let dispatcher = self.dispatcher(Admission::limited(subject, resource));

		Ok(dispatcher.send(request).await?)
	}
}

fn charge_to(access_token: &str, subject: Option<&SubjectId>) -> SubjectId {
	subject.cloned().unwrap_or_else(|| SubjectId::pseudonymous(access_token))
}

fn rejected(kind: CallKind, response: &HttpResponse) -> UpstreamError {
	let status = response.status();
	let message = serde_json::from_slice::<serde_json::Value>(response.body())
		.ok()
		.and_then(|body| body.get("message").and_then(|m| m.as_str()).map(str::to_owned))
		.unwrap_or_else(|| format!("HTTP {status}"));

	UpstreamError::Rejected {
		operation: kind.as_str(),
		message,
		code: None,
		status: Some(status.as_u16()),
	}
}
