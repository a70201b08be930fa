//! Contains all HTTP endpoint handlers.
//!
//! Use [`routes`] to create a router with all endpoints.

use axum::Router;

use crate::state::ServiceState;

pub mod health;
mod kv;

/// Creates the router with all endpoints of the gateway.
pub fn routes() -> Router<ServiceState> {
    Router::new().merge(health::router()).merge(kv::router())
}
