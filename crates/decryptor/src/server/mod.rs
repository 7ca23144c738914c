//! Axum HTTP server, routing, and middleware.
//!
//! # Responsibilities
//! - Define the Axum router with all routes and shared middleware.
//! - Validate request shape and map pipeline errors to status codes.
//! - Inject shared application state (`AppState`) into handlers.

pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;
