//! Two-tier admission control in front of every upstream call.
//!
//! The [`RateLimiter`] enforces a global sliding-window budget shared by all callers plus a
//! cooldown per `(subject, resource)` key. It never rejects: contention only shows up as added
//! latency, and every wait re-checks both tiers under the lock before admitting.

// std
use std::collections::VecDeque;
// self
use crate::{_prelude::*, auth::SubjectId};

/// Upstream resource partitions tracked by the per-key cooldown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
	/// Token endpoint (code exchange and refresh).
	Token,
	/// Token-introspection resource used for validation.
	Introspection,
	/// Profile resource.
	Profile,
}
impl Resource {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Resource::Token => "token",
			Resource::Introspection => "introspection",
			Resource::Profile => "profile",
		}
	}
}
impl Display for Resource {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// How a single upstream call passes the limiter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Admission {
	/// Skip admission entirely and record nothing.
	///
	/// Used for one-shot operations such as code exchange.
	Bypass,
	/// Wait for the global budget and the cooldown of `(subject, resource)`.
	Limited {
		/// Rate-limit partition key.
		subject: SubjectId,
		/// Resource being called.
		resource: Resource,
	},
}
impl Admission {
	/// Shorthand for [`Admission::Limited`].
	pub fn limited(subject: SubjectId, resource: Resource) -> Self {
		Self::Limited { subject, resource }
	}

	/// Resource label used for observability; bypassed calls report `None`.
	pub fn resource(&self) -> Option<Resource> {
		match self {
			Self::Bypass => None,
			Self::Limited { resource, .. } => Some(*resource),
		}
	}
}

/// Limiter tuning knobs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
	/// Length of the trailing global window.
	pub window: Duration,
	/// Maximum admissions inside one window.
	pub global_ceiling: usize,
	/// Minimum spacing between two admissions of the same key.
	pub cooldown: Duration,
	/// Number of tracked subjects above which stale cooldowns are collected.
	pub gc_threshold: usize,
	/// Age after which a cooldown entry is considered stale.
	pub stale_after: Duration,
}
impl Default for RateLimitConfig {
	fn default() -> Self {
		Self {
			window: Duration::from_secs(1),
			global_ceiling: 50,
			cooldown: Duration::from_secs(1),
			gc_threshold: 50,
			stale_after: Duration::from_secs(300),
		}
	}
}

/// Global budget plus per-key cooldowns, shared by every call made through one gateway.
#[derive(Debug, Default)]
pub struct RateLimiter {
	config: RateLimitConfig,
	state: Mutex<LimiterState>,
}
impl RateLimiter {
	/// Creates a limiter with the provided configuration.
	///
	/// A zero `global_ceiling` would never admit a call and is raised to one.
	pub fn new(mut config: RateLimitConfig) -> Self {
		config.global_ceiling = config.global_ceiling.max(1);

		Self { config, state: Default::default() }
	}

	/// Returns the active configuration.
	pub fn config(&self) -> &RateLimitConfig {
		&self.config
	}

	/// Completes once the call described by `admission` may be issued.
	///
	/// Admission order across concurrent waiters follows whichever timer fires first.
	pub async fn acquire(&self, admission: &Admission) {
		let Admission::Limited { subject, resource } = admission else {
			return;
		};

		loop {
			let wait = {
				let mut state = self.state.lock();

				match state.admit(&self.config, subject, *resource, Instant::now()) {
					Ok(()) => return,
					Err(wait) => wait,
				}
			};

			log_debug!(subject = %subject, resource = resource.as_str(), ?wait, "Rate limiter delaying call.");

			tokio::time::sleep(wait).await;
		}
	}

	/// Number of subjects currently holding cooldown entries.
	pub fn tracked_subjects(&self) -> usize {
		self.state.lock().cooldowns.len()
	}

	/// Number of admissions inside the current global window.
	pub fn budget_len(&self) -> usize {
		let mut state = self.state.lock();

		state.prune_budget(&self.config, Instant::now());

		state.budget.len()
	}
}

#[derive(Debug, Default)]
struct LimiterState {
	budget: VecDeque<Instant>,
	cooldowns: HashMap<SubjectId, HashMap<Resource, Instant>>,
}
impl LimiterState {
	/// Admits and records the call, or returns how long to wait before re-checking.
	fn admit(
		&mut self,
		config: &RateLimitConfig,
		subject: &SubjectId,
		resource: Resource,
		now: Instant,
	) -> Result<(), Duration> {
		self.prune_budget(config, now);

		if self.budget.len() >= config.global_ceiling {
			let oldest = self.budget.front().copied().unwrap_or(now);

			return Err(config.window.saturating_sub(now.duration_since(oldest)));
		}
		if let Some(last) = self.cooldowns.get(subject).and_then(|entries| entries.get(&resource)) {
			let elapsed = now.duration_since(*last);

			if elapsed < config.cooldown {
				return Err(config.cooldown - elapsed);
			}
		}

		self.budget.push_back(now);
		self.cooldowns.entry(subject.clone()).or_default().insert(resource, now);

		if self.cooldowns.len() > config.gc_threshold {
			self.collect_stale(config, now);
		}

		Ok(())
	}

	fn prune_budget(&mut self, config: &RateLimitConfig, now: Instant) {
		while self.budget.front().is_some_and(|at| now.duration_since(*at) >= config.window) {
			self.budget.pop_front();
		}
	}

	fn collect_stale(&mut self, config: &RateLimitConfig, now: Instant) {
		self.cooldowns.retain(|_, entries| {
			entries.retain(|_, at| now.duration_since(*at) < config.stale_after);

			!entries.is_empty()
		});
	}
}
