//! Ordered route rules matched by first prefix.

// std
use std::borrow::Cow;
// self
use crate::_prelude::*;

/// Error returned when a route table contains a rule that can never match.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RouteTableError {
	/// An earlier, more general prefix captures every path the rule would match.
	#[error("Route `{rule}` can never match because `{by}` is listed before it.")]
	Shadowed {
		/// Prefix of the unreachable rule.
		rule: String,
		/// Prefix of the earlier rule that captures it.
		by: String,
	},
}

/// Access policy for every path starting with `prefix`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteRule {
	/// Path prefix matched with `starts_with`.
	pub prefix: Cow<'static, str>,
	/// Whether the route needs a valid session.
	pub requires_auth: bool,
	/// Whether responses for the route must never be cached or statically rendered.
	pub force_dynamic: bool,
}
impl RouteRule {
	/// A rule that requires a valid session.
	pub fn protected(prefix: impl Into<Cow<'static, str>>) -> Self {
		Self { prefix: prefix.into(), requires_auth: true, force_dynamic: false }
	}

	/// A rule that lets every request through.
	pub fn public(prefix: impl Into<Cow<'static, str>>) -> Self {
		Self { prefix: prefix.into(), requires_auth: false, force_dynamic: false }
	}

	/// Marks the route as force-dynamic.
	pub fn dynamic(mut self) -> Self {
		self.force_dynamic = true;

		self
	}

	/// Returns `true` if the rule applies to `path`.
	pub fn matches(&self, path: &str) -> bool {
		path.starts_with(self.prefix.as_ref())
	}
}

/// Ordered rule list; the first rule whose prefix matches wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteTable(Arc<[RouteRule]>);
impl RouteTable {
	/// Builds a table, rejecting rules shadowed by an earlier, more general prefix.
	pub fn new(rules: impl IntoIterator<Item = RouteRule>) -> Result<Self, RouteTableError> {
		let rules = rules.into_iter().collect::<Vec<_>>();

		for (idx, rule) in rules.iter().enumerate() {
			if let Some(earlier) = rules[..idx].iter().find(|earlier| earlier.matches(&rule.prefix)) {
				return Err(RouteTableError::Shadowed {
					rule: rule.prefix.to_string(),
					by: earlier.prefix.to_string(),
				});
			}
		}

		Ok(Self(rules.into()))
	}

	/// Route table of the dashboard.
	///
	/// The webhook endpoint authenticates its callers itself, so it is listed ahead of its
	/// protected parent.
	pub fn dashboard() -> Self {
		Self(Arc::from([
			RouteRule::public("/api/guilds/webhooks").dynamic(),
			RouteRule::protected("/dashboard"),
			RouteRule::protected("/api/guilds"),
			RouteRule::protected("/api/users"),
			RouteRule::public("/api/auth"),
			RouteRule::public("/api/public"),
			RouteRule::public("/"),
		]))
	}

	/// Returns the first rule matching `path`.
	pub fn match_path(&self, path: &str) -> Option<&RouteRule> {
		self.0.iter().find(|rule| rule.matches(path))
	}

	/// Rules in match order.
	pub fn rules(&self) -> &[RouteRule] {
		&self.0
	}
}
impl Default for RouteTable {
	fn default() -> Self {
		Self::dashboard()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn dashboard_table_is_well_ordered() {
		let table = RouteTable::dashboard();
		let rebuilt = RouteTable::new(table.rules().iter().cloned())
			.expect("Dashboard table should pass shadowing checks.");

		assert_eq!(table, rebuilt);
	}

	#[test]
	fn first_matching_prefix_wins() {
		let table = RouteTable::dashboard();
		let webhook = table.match_path("/api/guilds/webhooks/123").expect("Webhook path should match.");

		assert!(!webhook.requires_auth);
		assert!(webhook.force_dynamic);
		assert!(table.match_path("/api/guilds/123/settings").is_some_and(|rule| rule.requires_auth));
		assert!(table.match_path("/dashboard").is_some_and(|rule| rule.requires_auth));
		assert!(table.match_path("/pricing").is_some_and(|rule| !rule.requires_auth));
		assert!(table.match_path("relative").is_none());
	}

	#[test]
	fn shadowed_rules_are_rejected() {
		let err = RouteTable::new([
			RouteRule::protected("/api/guilds"),
			RouteRule::public("/api/guilds/webhooks"),
		])
		.expect_err("A nested rule listed after its parent can never match.");

		assert_eq!(
			err,
			RouteTableError::Shadowed { rule: "/api/guilds/webhooks".into(), by: "/api/guilds".into() }
		);
	}
}
