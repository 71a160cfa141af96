//! Per-request session guard for the dashboard.
//!
//! [`SessionGuard`] matches the request path against an ordered [`RouteTable`], validates the
//! session cookies through a [`SessionGateway`](crate::gateway::SessionGateway), refreshes
//! expired sessions transparently, and fails closed on anything it cannot trust.

pub mod cookies;
pub mod guard;
pub mod routes;

pub use cookies::*;
pub use guard::*;
pub use routes::*;
