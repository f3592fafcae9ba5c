//! Duplex sessions between devices and the hub.
//!
//! Provides the session registry, the per-connection reader/writer tasks,
//! and the HTTP upgrade handler mounted at `/ws`.

mod handler;
pub mod registry;
pub mod session;

pub use handler::ws_handler;
pub use registry::{SessionHandle, SessionRegistry};
