// self
use oauth2_gatekeeper::{
	_preludet::*,
	auth::SubjectId,
	limiter::{Admission, RateLimitConfig, RateLimiter, Resource},
};

fn subject(value: &str) -> SubjectId {
	SubjectId::new(value).expect("Failed to build subject identifier for limiter tests.")
}

async fn admit_concurrently(
	limiter: Arc<RateLimiter>,
	admissions: Vec<Admission>,
) -> Vec<Instant> {
	let handles = admissions
		.into_iter()
		.map(|admission| {
			let limiter = limiter.clone();

			tokio::spawn(async move {
				limiter.acquire(&admission).await;

				Instant::now()
			})
		})
		.collect::<Vec<_>>();
	let mut admitted = Vec::with_capacity(handles.len());

	for handle in handles {
		admitted.push(handle.await.expect("Limiter task should not panic."));
	}

	admitted.sort();

	admitted
}

#[tokio::test(start_paused = true)]
async fn same_key_admissions_are_spaced_by_the_cooldown() {
	let limiter = Arc::new(RateLimiter::default());
	let admissions = (0..5).map(|_| Admission::limited(subject("u1"), Resource::Profile)).collect();
	let admitted = admit_concurrently(limiter, admissions).await;

	assert_eq!(admitted.len(), 5);

	for pair in admitted.windows(2) {
		assert!(
			pair[1] - pair[0] >= Duration::from_millis(1_000),
			"Admissions of one key must be at least a cooldown apart."
		);
	}
}

#[tokio::test(start_paused = true)]
async fn distinct_keys_share_the_global_window() {
	let limiter = Arc::new(RateLimiter::default());
	let start = Instant::now();
	let admissions = (0..120)
		.map(|idx| Admission::limited(subject(&format!("user-{idx}")), Resource::Profile))
		.collect();
	let admitted = admit_concurrently(limiter.clone(), admissions).await;

	assert_eq!(admitted.len(), 120);

	for (idx, at) in admitted.iter().enumerate() {
		let in_window =
			admitted[..=idx].iter().filter(|earlier| *at - **earlier < Duration::from_secs(1)).count();

		assert!(in_window <= 50, "Trailing window held {in_window} admissions.");
	}

	assert_eq!(admitted.iter().filter(|at| **at - start < Duration::from_secs(1)).count(), 50);
	assert!(
		admitted[119] - start >= Duration::from_secs(2),
		"The third batch cannot start before two full windows elapsed."
	);
}

#[tokio::test(start_paused = true)]
async fn resources_cool_down_independently() {
	let limiter = RateLimiter::default();
	let start = Instant::now();

	limiter.acquire(&Admission::limited(subject("u1"), Resource::Profile)).await;
	limiter.acquire(&Admission::limited(subject("u1"), Resource::Introspection)).await;
	limiter.acquire(&Admission::limited(subject("u2"), Resource::Profile)).await;

	assert_eq!(Instant::now(), start, "Different keys must not wait on each other.");
	assert_eq!(limiter.budget_len(), 3);

	limiter.acquire(&Admission::limited(subject("u1"), Resource::Profile)).await;

	assert!(Instant::now() - start >= Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn stale_cooldowns_are_collected_once_the_table_grows() {
	let limiter = RateLimiter::new(RateLimitConfig { gc_threshold: 3, ..Default::default() });

	for name in ["old-1", "old-2", "old-3"] {
		limiter.acquire(&Admission::limited(subject(name), Resource::Profile)).await;
	}

	tokio::time::advance(Duration::from_secs(301)).await;

	assert_eq!(limiter.tracked_subjects(), 3, "Collection only runs above the threshold.");

	limiter.acquire(&Admission::limited(subject("fresh"), Resource::Profile)).await;

	assert_eq!(limiter.tracked_subjects(), 1);
}

#[tokio::test(start_paused = true)]
async fn recent_cooldowns_survive_collection() {
	let limiter = RateLimiter::new(RateLimitConfig { gc_threshold: 2, ..Default::default() });

	limiter.acquire(&Admission::limited(subject("old"), Resource::Profile)).await;

	tokio::time::advance(Duration::from_secs(301)).await;

	limiter.acquire(&Admission::limited(subject("recent-1"), Resource::Profile)).await;
	limiter.acquire(&Admission::limited(subject("recent-2"), Resource::Profile)).await;

	assert_eq!(limiter.tracked_subjects(), 2);
}
