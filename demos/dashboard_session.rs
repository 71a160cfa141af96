//! Wires a gateway and a session guard in front of the dashboard routes, then walks a few
//! requests through the guard without touching the network.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use url::Url;
// self
use oauth2_gatekeeper::{
	config::GatewayConfig,
	gateway::ReqwestGateway,
	session::{GuardResponse, MemoryCookieJar, RouteTable, SessionGuard},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	// Falls back to demo credentials when `OAUTH2_*` variables are not exported.
	let config = match GatewayConfig::from_env() {
		Ok(config) => config,
		Err(e) => {
			eprintln!("Environment configuration unavailable ({e}); using demo credentials.");

			GatewayConfig::builder()
				.client_id("demo-client")
				.client_secret("demo-secret")
				.public_url(Url::parse("https://dashboard.example.com")?)
				.build()?
		},
	};
	let gateway = Arc::new(ReqwestGateway::new(config)?);
	let guard = SessionGuard::<ReqwestGateway>::new(gateway.clone(), RouteTable::dashboard());
	let cookies = MemoryCookieJar::default();

	println!("Send visitors to {}.", gateway.authorization_url());

	for path in ["/", "/api/guilds/webhooks/42", "/dashboard"] {
		match guard.handle(path, &cookies, || async { format!("rendered {path}") }).await {
			GuardResponse::Forward { state, force_dynamic, response } => {
				println!("{path}: {state} (force-dynamic: {force_dynamic}) -> {response}.");
			},
			GuardResponse::Redirect { state, target } => {
				println!("{path}: {state} -> redirect to {}.", target.location());
			},
		}
	}

	Ok(())
}
