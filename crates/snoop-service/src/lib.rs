//! Snoop Service - the registry server.
//!
//! Hosts the registration and heartbeat WebSocket channels that feed the
//! client registry, and the read-only lookup API over it.

pub mod handler;
pub mod server;
pub mod status;

pub use server::{build_router, start_server, AppState, ServerHandle, ServerOptions};
