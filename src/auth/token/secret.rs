//! Access and refresh token values.

// self
use crate::_prelude::*;

/// Opaque token value; formatting never prints it.
///
/// Only [`expose`](Self::expose) and [`bearer`](Self::bearer) reveal the value, and only the
/// gateway and cookie stores should call them.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a token value.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Raw token value.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns `true` for a blank cookie or response field.
	pub fn is_empty(&self) -> bool {
		self.0.trim().is_empty()
	}

	/// `Authorization` header value carrying this token.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.0)
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "TokenSecret(<{} chars>)", self.0.chars().count())
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<token>")
	}
}
