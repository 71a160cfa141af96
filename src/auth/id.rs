//! Rate-limit partition key.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

const SUBJECT_MAX_LEN: usize = 128;
const PSEUDONYM_PREFIX: &str = "anon-";
const PSEUDONYM_TAIL_LEN: usize = 10;

/// Error returned when a subject identifier is rejected.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("Subject identifier cannot be empty.")]
	Empty,
	/// The identifier contains whitespace.
	#[error("Subject identifier `{0}` contains whitespace.")]
	Whitespace(String),
	/// The identifier is longer than any upstream user id.
	#[error("Subject identifier exceeds {SUBJECT_MAX_LEN} bytes.")]
	TooLong,
}

/// End-user identity; the upstream user id once known.
///
/// Before the profile has been fetched the gateway keys calls on
/// [`pseudonymous`](Self::pseudonymous) subjects instead.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);
impl SubjectId {
	/// Validates and wraps an upstream user id.
	pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
		let value = value.into();

		if value.is_empty() {
			return Err(IdentifierError::Empty);
		}
		if value.contains(char::is_whitespace) {
			return Err(IdentifierError::Whitespace(value));
		}
		if value.len() > SUBJECT_MAX_LEN {
			return Err(IdentifierError::TooLong);
		}

		Ok(Self(value))
	}

	/// Derives a subject from the last characters of an access token.
	///
	/// Only the tail is kept, so the cooldown table never holds a usable token.
	pub fn pseudonymous(access_token: &str) -> Self {
		let visible = access_token.chars().filter(|c| !c.is_whitespace()).collect::<Vec<_>>();
		let tail = visible[visible.len().saturating_sub(PSEUDONYM_TAIL_LEN)..]
			.iter()
			.collect::<String>();

		Self(format!("{PSEUDONYM_PREFIX}{tail}"))
	}

	/// Returns `true` for subjects built by [`pseudonymous`](Self::pseudonymous).
	pub fn is_pseudonymous(&self) -> bool {
		self.0.starts_with(PSEUDONYM_PREFIX)
	}
}
impl Deref for SubjectId {
	type Target = str;

	fn deref(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for SubjectId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for SubjectId {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl TryFrom<String> for SubjectId {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl From<SubjectId> for String {
	fn from(value: SubjectId) -> Self {
		value.0
	}
}
impl FromStr for SubjectId {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl Debug for SubjectId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Subject({})", self.0)
	}
}
impl Display for SubjectId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
