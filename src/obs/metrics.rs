// self
use crate::{
	limiter::Resource,
	obs::{CallKind, CallOutcome},
	session::SessionState,
};

/// Records a gateway call outcome via the global metrics recorder (when enabled).
pub fn record_call_outcome(kind: CallKind, outcome: CallOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_gatekeeper_call_total",
			"call" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records one upstream `429` answer; bypassed calls are labeled `token`.
pub fn record_throttled(resource: Option<Resource>) {
	let label = resource.unwrap_or(Resource::Token).as_str();

	#[cfg(feature = "metrics")]
	{
		metrics::counter!("oauth2_gatekeeper_throttled_total", "resource" => label).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = label;
	}
}

/// Records the state a guarded request ended in.
pub fn record_session_state(state: SessionState) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("oauth2_gatekeeper_session_total", "state" => state.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = state;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_noop_without_metrics() {
		record_call_outcome(CallKind::ExchangeCode, CallOutcome::Failure);
		record_throttled(Some(Resource::Profile));
		record_throttled(None);
		record_session_state(SessionState::RefreshFailed);
	}
}
