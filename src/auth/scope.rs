//! Requested and granted OAuth scopes.

// std
use std::collections::BTreeSet;
// self
use crate::_prelude::*;

/// Error returned when a scope entry cannot be sent upstream.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ScopeValidationError {
	/// A scope entry was empty.
	#[error("Scope list contains a blank entry.")]
	Blank,
	/// A scope entry would split into several scopes once space-joined.
	#[error("Scope `{scope}` contains whitespace.")]
	Whitespace {
		/// Offending entry.
		scope: String,
	},
}

/// Sorted, deduplicated scope list.
///
/// Sorting makes the rendered `scope` parameter independent of the order scopes were
/// configured or granted in. Serialized as the space-separated wire form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ScopeSet(BTreeSet<String>);
impl ScopeSet {
	/// Validates and collects individual scope entries.
	pub fn new<I, S>(scopes: I) -> Result<Self, ScopeValidationError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		scopes
			.into_iter()
			.map(|scope| {
				let scope = scope.into();

				if scope.is_empty() {
					Err(ScopeValidationError::Blank)
				} else if scope.contains(char::is_whitespace) {
					Err(ScopeValidationError::Whitespace { scope })
				} else {
					Ok(scope)
				}
			})
			.collect::<Result<_, _>>()
			.map(Self)
	}

	/// Splits a space-separated `scope` value; runs of whitespace count as one separator.
	pub fn parse(wire: &str) -> Self {
		Self(wire.split_whitespace().map(str::to_owned).collect())
	}

	/// Number of distinct scopes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when no scope is present.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Returns `true` when `scope` is present.
	pub fn contains(&self, scope: &str) -> bool {
		self.0.contains(scope)
	}

	/// Scopes in sorted order.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}

	/// Space-separated wire form.
	pub fn normalized(&self) -> String {
		self.iter().collect::<Vec<_>>().join(" ")
	}
}
impl Display for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.normalized())
	}
}
impl From<String> for ScopeSet {
	fn from(value: String) -> Self {
		Self::parse(&value)
	}
}
impl From<ScopeSet> for String {
	fn from(value: ScopeSet) -> Self {
		value.normalized()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn order_and_duplicates_do_not_matter() {
		let configured = ScopeSet::new(["identify", "guilds", "email", "guilds"])
			.expect("Configured scopes should be valid.");

		assert_eq!(configured, ScopeSet::parse("email  identify guilds"));
		assert_eq!(configured.len(), 3);
		assert_eq!(configured.to_string(), "email guilds identify");
		assert!(configured.contains("guilds"));
		assert!(!configured.contains("guilds.join"));
	}

	#[test]
	fn entries_must_be_single_tokens() {
		assert_eq!(ScopeSet::new([""]), Err(ScopeValidationError::Blank));
		assert!(matches!(
			ScopeSet::new(["identify email"]),
			Err(ScopeValidationError::Whitespace { ref scope }) if scope == "identify email"
		));
		assert!(ScopeSet::parse("   ").is_empty());
	}

	#[test]
	fn serializes_as_the_wire_form() {
		let scopes = ScopeSet::parse("identify email");
		let payload = serde_json::to_string(&scopes).expect("Scope set should serialize.");

		assert_eq!(payload, "\"email identify\"");
		assert_eq!(
			serde_json::from_str::<ScopeSet>(&payload).expect("Scope set should deserialize."),
			scopes
		);
	}
}
