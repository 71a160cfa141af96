//! Optional observability helpers for gateway calls and guard decisions.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oauth2_gatekeeper.call` with the `call`
//!   (gateway operation) and `stage` (call site) fields, plus warn/debug events on throttling
//!   and fail-closed transitions.
//! - Enable `metrics` to increment `oauth2_gatekeeper_call_total` (labeled by `call` +
//!   `outcome`), `oauth2_gatekeeper_throttled_total` (labeled by `resource`), and
//!   `oauth2_gatekeeper_session_total` (labeled by `state`).

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Gateway operations observed by the gatekeeper.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
	/// Authorization-code exchange.
	ExchangeCode,
	/// Refresh-token exchange.
	RefreshToken,
	/// Token validation against the introspection resource.
	ValidateToken,
	/// Profile fetch.
	UserInfo,
}
impl CallKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallKind::ExchangeCode => "exchange_code",
			CallKind::RefreshToken => "refresh_token",
			CallKind::ValidateToken => "validate_token",
			CallKind::UserInfo => "user_info",
		}
	}
}
impl Display for CallKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// Entry to a gateway operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl CallOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallOutcome::Attempt => "attempt",
			CallOutcome::Success => "success",
			CallOutcome::Failure => "failure",
		}
	}
}
impl Display for CallOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
