//! HTTP and session surface of the sync hub.
//!
//! Exposes the building blocks used by the binary and the integration
//! tests: configuration, the shared [`state::AppState`], the router, the
//! session registry and fan-out engine, and the background janitor.

pub mod auth;
pub mod background;
pub mod config;
pub mod error;
pub mod fanout;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod query;
pub mod router;
pub mod routes;
pub mod state;
pub mod storage;
pub mod ws;
