//! fin-daemon library surface.
//!
//! Split from `main.rs` so route tests can build the router in-process.

pub mod api_types;
pub mod auth;
pub mod error;
pub mod routes;
pub mod state;
