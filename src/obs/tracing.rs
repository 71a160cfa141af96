// self
use crate::{_prelude::*, auth::SubjectId, obs::CallKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedCall<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedCall<F> = F;

/// A span builder used by gateway operations.
#[derive(Clone, Debug)]
pub struct CallSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl CallSpan {
	/// Creates a new span tagged with the provided call kind + stage.
	pub fn new(kind: CallKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"oauth2_gatekeeper.call",
				call = kind.as_str(),
				stage,
				subject = tracing::field::Empty
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Tags the span with the rate-limit subject the call is charged to.
	pub fn record_subject(&self, subject: &SubjectId) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("subject", subject.as_ref());
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = subject;
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedCall<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrumented_calls_carry_the_subject() {
		let span = CallSpan::new(CallKind::UserInfo, "instrumented_calls_carry_the_subject");

		span.record_subject(&SubjectId::new("u1").expect("Subject fixture should be valid."));

		assert_eq!(span.instrument(async { 42 }).await, 42);
	}
}
