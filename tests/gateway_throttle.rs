// self
use oauth2_gatekeeper::{
	_preludet::*,
	auth::SubjectId,
	gateway::{GatewayClient, ThrottlePolicy},
	limiter::{RateLimitConfig, RateLimiter},
};

const PROFILE: &str = "{\"id\":\"u1\",\"username\":\"nelly\"}";
const TOKENS: &str = "{\"access_token\":\"access-1\",\"token_type\":\"Bearer\",\"expires_in\":604800,\"refresh_token\":\"refresh-1\",\"scope\":\"identify guilds email\"}";

fn u1() -> SubjectId {
	SubjectId::new("u1").expect("Failed to build subject identifier for gateway tests.")
}

fn always_throttled(retry_after: &str) -> (GatewayClient<ScriptedTransport>, Arc<ScriptedTransport>) {
	let transport =
		Arc::new(ScriptedTransport::new([]).with_fallback(ScriptedReply::throttled(retry_after)));
	let gateway = GatewayClient::with_transport(
		test_config("https://upstream.example.com/api/v10"),
		transport.clone(),
	)
	.expect("Throttled gateway should build successfully.");

	(gateway, transport)
}

#[tokio::test(start_paused = true)]
async fn back_to_back_profile_calls_respect_the_cooldown() {
	let (gateway, transport) =
		build_scripted_gateway([ScriptedReply::json(200, PROFILE), ScriptedReply::json(200, PROFILE)]);
	let subject = u1();
	let first = gateway.user_info("access-1", Some(&subject)).await.expect("First fetch should succeed.");
	let second =
		gateway.user_info("access-1", Some(&subject)).await.expect("Second fetch should succeed.");
	let requests = transport.requests();

	assert_eq!(first, second);
	assert_eq!(requests.len(), 2);
	assert!(requests[1].at - requests[0].at >= Duration::from_millis(1_000));
}

#[tokio::test(start_paused = true)]
async fn throttled_retries_skip_the_limiter() {
	let (gateway, transport) =
		build_scripted_gateway([ScriptedReply::throttled("3"), ScriptedReply::json(200, PROFILE)]);
	let gateway = gateway.with_limiter(Arc::new(RateLimiter::new(RateLimitConfig {
		cooldown: Duration::from_secs(10),
		..Default::default()
	})));
	let profile =
		gateway.user_info("access-1", Some(&u1())).await.expect("Retried fetch should succeed.");
	let requests = transport.requests();
	let gap = requests[1].at - requests[0].at;

	assert_eq!(profile.username, "nelly");
	assert!(gap >= Duration::from_secs(3), "The retry must honor the Retry-After hint.");
	assert!(gap < Duration::from_secs(10), "The retry must not wait for another cooldown.");
}

#[tokio::test(start_paused = true)]
async fn missing_retry_hints_fall_back_to_one_second() {
	let (gateway, transport) =
		build_scripted_gateway([ScriptedReply::throttled(""), ScriptedReply::json(200, PROFILE)]);

	gateway.user_info("access-1", Some(&u1())).await.expect("Retried fetch should succeed.");

	let requests = transport.requests();

	assert!(requests[1].at - requests[0].at >= Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn persistent_throttling_ends_in_a_distinct_error() {
	let (gateway, transport) = always_throttled("1");
	let err = gateway
		.user_info("access-1", Some(&u1()))
		.await
		.expect_err("Persistent throttling must surface as an error.");

	assert!(matches!(err, Error::Throttled { attempts: 5, waited } if waited == Duration::from_secs(4)));
	assert_eq!(transport.requests().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn custom_policies_bound_the_backoff() {
	let (gateway, transport) = always_throttled("2");
	let gateway = gateway
		.with_throttle_policy(ThrottlePolicy { max_attempts: 10, max_backoff: Duration::from_secs(5) });
	let err = gateway
		.check_token("access-1", Some(&u1()))
		.await
		.expect_err("Backoff beyond the policy must fail.");

	assert!(matches!(err, Error::Throttled { attempts: 3, waited } if waited == Duration::from_secs(4)));
	assert_eq!(transport.requests().len(), 3);
	assert!(
		!gateway.validate_token("access-1", Some(&u1())).await,
		"Exhausted throttling counts as an invalid token."
	);
}

#[tokio::test(start_paused = true)]
async fn token_endpoint_throttling_is_bounded_too() {
	let (gateway, transport) = always_throttled("1");
	let err =
		gateway.exchange_code("code-123").await.expect_err("Persistent throttling must fail.");

	assert!(matches!(err, Error::Throttled { attempts: 5, .. }));
	assert!(transport.requests().iter().all(|request| request.path == "/api/v10/oauth2/token"));
}

#[tokio::test(start_paused = true)]
async fn code_exchange_posts_client_credentials_in_the_body() {
	let (gateway, transport) = build_scripted_gateway([ScriptedReply::json(200, TOKENS)]);
	let start = Instant::now();
	let tokens = gateway.exchange_code("code-123").await.expect("Code exchange should succeed.");
	let requests = transport.requests();
	let body = String::from_utf8(requests[0].body.clone()).expect("Form body should be UTF-8.");

	assert_eq!(tokens.access_token.expose(), "access-1");
	assert_eq!(tokens.refresh_token.expose(), "refresh-1");
	assert!(tokens.scope.contains("guilds"));
	assert!(tokens.expires_at.is_some());
	assert_eq!(requests[0].method, "POST");
	assert_eq!(requests[0].path, "/api/v10/oauth2/token");
	assert!(
		requests[0].user_agent.as_deref().is_some_and(|agent| agent.starts_with("oauth2-gatekeeper/"))
	);
	assert!(body.contains("grant_type=authorization_code"));
	assert!(body.contains("code=code-123"));
	assert!(body.contains(&format!("client_id={TEST_CLIENT_ID}")));
	assert!(body.contains(&format!("client_secret={TEST_CLIENT_SECRET}")));
	assert!(body.contains("redirect_uri=https%3A%2F%2Fdashboard.example.com%2Fapi%2Fauth%2Fcallback"));
	assert_eq!(Instant::now(), start, "Code exchange bypasses the limiter.");
	assert_eq!(gateway.limiter().budget_len(), 0);
}
