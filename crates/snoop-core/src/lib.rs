//! Snoop Core - service registry protocol and liveness-tracking store.
//!
//! This crate holds everything both sides of the registry agree on: the
//! service descriptor and its wire codec, registry addresses, and the
//! server-side pieces that carry state (the concurrent client registry and
//! the per-channel heartbeat session). It has no HTTP or WebSocket layer;
//! see `snoop-service` and `snoop-client` for those.
//!
//! # Example
//!
//! ```rust
//! use snoop_core::{ClientRegistry, ServiceDescriptor};
//!
//! let registry = ClientRegistry::new();
//! registry.register(ServiceDescriptor::new("svc-a", "10.0.0.1:8080", "api/"));
//!
//! assert!(registry.live_identities().contains("svc-a"));
//! assert_eq!(registry.lookup("svc-a").unwrap().home, "10.0.0.1:8080");
//! ```

pub mod clock;
pub mod codec;
pub mod config;
pub mod descriptor;
pub mod endpoints;
pub mod error;
pub mod registry;
pub mod session;

// Re-export commonly used types
pub use clock::{Clock, DynClock, ManualClock, SystemClock};
pub use codec::StatusMessage;
pub use config::{ClientConfig, RegistryConfig};
pub use descriptor::ServiceDescriptor;
pub use endpoints::RegistryEndpoints;
pub use error::{Result, SnoopError};
pub use registry::{ClientRegistry, ClientStatus, LivenessRecord};
pub use session::{SessionEvent, SessionState, StatusSession};
