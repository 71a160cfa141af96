//! Session token set handed to the cookie store after an exchange or refresh.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, SubjectId, TokenSecret},
};

/// Access/refresh pair issued by the upstream token endpoint.
///
/// The gateway only produces these values; persisting them is the cookie store's job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokenSet {
	/// Bearer token sent to upstream resources.
	pub access_token: TokenSecret,
	/// Secret used to mint the next access token.
	pub refresh_token: TokenSecret,
	/// Identity the tokens belong to, once a profile has been fetched.
	pub subject: Option<SubjectId>,
	/// Scopes the upstream actually granted.
	pub scope: ScopeSet,
	/// Wall-clock expiry derived from `expires_in`, when the upstream reported one.
	pub expires_at: Option<OffsetDateTime>,
}
impl SessionTokenSet {
	/// Creates a token set without subject, scope, or expiry metadata.
	pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: TokenSecret::new(refresh_token),
			subject: None,
			scope: ScopeSet::default(),
			expires_at: None,
		}
	}

	/// Attaches the identity the tokens belong to.
	pub fn with_subject(mut self, subject: SubjectId) -> Self {
		self.subject = Some(subject);

		self
	}

	/// Records the granted scopes.
	pub fn with_scope(mut self, scope: ScopeSet) -> Self {
		self.scope = scope;

		self
	}

	/// Derives the expiry from a relative lifetime starting at `issued_at`.
	///
	/// Lifetimes that overflow the calendar leave the expiry unset.
	pub fn with_lifetime(mut self, issued_at: OffsetDateTime, expires_in: Duration) -> Self {
		self.expires_at = time::Duration::try_from(expires_in)
			.ok()
			.and_then(|delta| issued_at.checked_add(delta));

		self
	}

	/// Returns `true` if the access token is known to be expired at `instant`.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| instant >= expires_at)
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn lifetime_sets_expiry() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let tokens = SessionTokenSet::new("access", "refresh")
			.with_lifetime(issued, Duration::from_secs(604_800));

		assert_eq!(tokens.expires_at, Some(macros::datetime!(2025-01-08 00:00 UTC)));
		assert!(!tokens.is_expired_at(macros::datetime!(2025-01-07 23:59 UTC)));
		assert!(tokens.is_expired_at(macros::datetime!(2025-01-08 00:00 UTC)));
	}

	#[test]
	fn overflowing_lifetime_leaves_expiry_unset() {
		let tokens = SessionTokenSet::new("access", "refresh")
			.with_lifetime(OffsetDateTime::now_utc(), Duration::MAX);

		assert_eq!(tokens.expires_at, None);
		assert!(!tokens.is_expired_at(OffsetDateTime::now_utc()));
	}

	#[test]
	fn debug_output_redacts_secrets() {
		let tokens = SessionTokenSet::new("access-secret", "refresh-secret")
			.with_subject(SubjectId::new("u1").expect("Subject fixture should be valid."));
		let rendered = format!("{tokens:?}");

		assert!(!rendered.contains("access-secret"));
		assert!(!rendered.contains("refresh-secret"));
		assert!(rendered.contains("u1"));
	}
}
