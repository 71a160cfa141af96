// Structured log events that compile away when the `tracing` feature is disabled.

macro_rules! log_warn {
	($($arg:tt)*) => {
		#[cfg(feature = "tracing")]
		{
			tracing::warn!($($arg)*);
		}
	};
}

macro_rules! log_debug {
	($($arg:tt)*) => {
		#[cfg(feature = "tracing")]
		{
			tracing::debug!($($arg)*);
		}
	};
}
