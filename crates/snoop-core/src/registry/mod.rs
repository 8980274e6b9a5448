//! Liveness-tracking registry of service clients.
//!
//! Maps each identity to its latest descriptor and heartbeat time. The
//! registry is one explicitly constructed, internally thread-safe instance
//! owned by the service process; share it as `Arc<ClientRegistry>`.

pub mod client_registry;

pub use client_registry::{spawn_eviction_task, ClientRegistry, ClientStatus, LivenessRecord};
