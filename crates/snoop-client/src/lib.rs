//! Snoop Client - registers a service with the registry and finds others.
//!
//! [`HeartbeatAgent`] announces this process and keeps it live with a
//! heartbeat every ten seconds. [`ServiceClient`] resolves another service
//! by name and issues HTTP requests against its API root.
//!
//! # Example
//!
//! ```rust,no_run
//! use snoop_client::{AgentConfig, HeartbeatAgent, WsTransport};
//! use std::sync::Arc;
//!
//! # async fn run() -> snoop_core::Result<()> {
//! let config = AgentConfig::new("http://localhost:8080/")
//!     .identity("svc-a")
//!     .home("10.0.0.1:8080")
//!     .root("api/");
//!
//! if let Some(agent) = HeartbeatAgent::start_if_enabled(&config, Arc::new(WsTransport::new()))? {
//!     // ... serve traffic ...
//!     agent.shutdown().await;
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod lookup;
pub mod transport;

pub use agent::{AgentHandle, AgentState, AgentStats, HeartbeatAgent};
pub use config::{AgentConfig, ResolvedConfig};
pub use lookup::ServiceClient;
pub use transport::{DynTransport, Transport, WsTransport};
