//! Upstream user profile returned by the profile resource.

// self
use crate::{_prelude::*, auth::SubjectId};

/// Profile of the user who authorized the application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
	/// Stable user identifier; doubles as the rate-limit subject.
	pub id: SubjectId,
	/// Account handle.
	pub username: String,
	/// Display name, when the user set one.
	#[serde(default)]
	pub global_name: Option<String>,
	/// Legacy discriminator, when present.
	#[serde(default)]
	pub discriminator: Option<String>,
	/// Avatar hash.
	#[serde(default)]
	pub avatar: Option<String>,
	/// Email address; only present with the email scope.
	#[serde(default)]
	pub email: Option<String>,
	/// Whether the email address has been verified.
	#[serde(default)]
	pub verified: Option<bool>,
	/// Preferred locale.
	#[serde(default)]
	pub locale: Option<String>,
}
impl UserProfile {
	/// Name to show in the dashboard: the display name, falling back to the handle.
	pub fn display_name(&self) -> &str {
		self.global_name.as_deref().unwrap_or(&self.username)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn decodes_sparse_profiles() {
		let profile: UserProfile =
			serde_json::from_str("{\"id\":\"80351110224678912\",\"username\":\"nelly\"}")
				.expect("Sparse profile should decode.");

		assert_eq!(profile.id.as_ref(), "80351110224678912");
		assert_eq!(profile.display_name(), "nelly");
		assert_eq!(profile.email, None);
	}

	#[test]
	fn display_name_prefers_global_name() {
		let profile: UserProfile = serde_json::from_str(
			"{\"id\":\"1\",\"username\":\"nelly\",\"global_name\":\"Nelly\",\"email\":\"nelly@example.com\",\"verified\":true}",
		)
		.expect("Full profile should decode.");

		assert_eq!(profile.display_name(), "Nelly");
		assert_eq!(profile.verified, Some(true));
	}
}
