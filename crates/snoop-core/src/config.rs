//! Centralized configuration for Snoop.
//!
//! This module provides the protocol constants shared by the registry service
//! and its clients: liveness window, heartbeat cadence, endpoint paths and
//! channel limits.

use std::time::Duration;

/// Registry-side configuration.
pub struct RegistryConfig;

impl RegistryConfig {
    /// An identity is live while its last heartbeat is younger than this.
    pub const CLIENT_TTL: Duration = Duration::from_secs(60);

    // Endpoint paths, relative to the registry base URL
    pub const REGISTER_PATH: &'static str = "snoop";
    pub const STATUS_PATH: &'static str = "snoopstatus";
    pub const SERVICES_PATH: &'static str = "api/services";
    pub const CLIENTS_PATH: &'static str = "api/clients";
    pub const STATUS_SNAPSHOT_PATH: &'static str = "api/status";
    pub const HEALTH_PATH: &'static str = "health";

    /// Shortest pause between eviction passes.
    pub const MIN_EVICTION_INTERVAL: Duration = Duration::from_secs(1);

    /// Largest accepted channel message.
    pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

    pub const DEFAULT_HOST: &'static str = "127.0.0.1";
    pub const DEFAULT_PORT: u16 = 8080;
}

/// Client-side configuration.
pub struct ClientConfig;

impl ClientConfig {
    /// Fixed heartbeat period.
    pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(10);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const SEND_TIMEOUT: Duration = Duration::from_secs(5);
    pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_REGISTRY_URL: &'static str = "http://localhost:8080/";
}
