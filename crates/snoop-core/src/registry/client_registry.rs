//! Concurrent in-memory registry of service descriptors and heartbeats.

use crate::clock::{DynClock, SystemClock};
use crate::config::RegistryConfig;
use crate::descriptor::ServiceDescriptor;
use crate::{Result, SnoopError};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// When an identity last proved it was alive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessRecord {
    pub identity: String,
    pub last_heartbeat_at: DateTime<Utc>,
}

/// Snapshot of one stored client, as shown by the status listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientStatus {
    #[serde(flatten)]
    pub descriptor: ServiceDescriptor,
    pub last_heartbeat_at: DateTime<Utc>,
    pub live: bool,
}

/// Stored value: descriptor and liveness for one identity, updated together.
#[derive(Debug, Clone)]
struct ClientEntry {
    descriptor: ServiceDescriptor,
    last_heartbeat_at: DateTime<Utc>,
}

/// Registry of clients that have registered themselves.
///
/// Backed by a sharded concurrent map, so callers working on unrelated
/// identities never wait on each other. Liveness is derived at read time
/// (`now - last_heartbeat_at < TTL`); nothing is removed by the passage of
/// time unless [`ClientRegistry::evict_stale`] is called.
pub struct ClientRegistry {
    clients: DashMap<String, ClientEntry>,
    clock: DynClock,
    ttl: chrono::Duration,
}

impl ClientRegistry {
    /// Create a registry that reads the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a registry driven by the given clock.
    pub fn with_clock(clock: DynClock) -> Self {
        Self {
            clients: DashMap::new(),
            clock,
            ttl: to_chrono(RegistryConfig::CLIENT_TTL),
        }
    }

    /// Liveness window.
    pub fn ttl(&self) -> Duration {
        RegistryConfig::CLIENT_TTL
    }

    // ========================================
    // Mutations
    // ========================================

    /// Register a descriptor. Idempotent: re-registering refreshes the
    /// timestamp and replaces the descriptor.
    ///
    /// Returns `true` when the identity was not stored before.
    pub fn register(&self, descriptor: ServiceDescriptor) -> bool {
        let now = self.clock.now();
        let identity = descriptor.identity.clone();

        let previous = self.clients.insert(
            identity.clone(),
            ClientEntry {
                descriptor,
                last_heartbeat_at: now,
            },
        );

        if previous.is_none() {
            info!("Client {} registered at {}", identity, now.to_rfc3339());
            true
        } else {
            debug!("Client {} refreshed at {}", identity, now.to_rfc3339());
            false
        }
    }

    /// Remove an identity. Absent identities are a no-op.
    ///
    /// Returns `true` when something was removed.
    pub fn deregister(&self, identity: &str) -> bool {
        let removed = self.clients.remove(identity).is_some();
        if removed {
            info!(
                "Client {} deregistered at {}",
                identity,
                self.clock.now().to_rfc3339()
            );
        } else {
            debug!("Deregister for unknown client {}", identity);
        }
        removed
    }

    /// Remove every entry whose last heartbeat is at least `max_age` old.
    ///
    /// `max_age` is raised to the TTL, so live entries are never removed.
    /// Returns the number of removed entries.
    pub fn evict_stale(&self, max_age: Duration) -> usize {
        let now = self.clock.now();
        let max_age = to_chrono(max_age.max(RegistryConfig::CLIENT_TTL));
        let mut removed = 0;

        self.clients.retain(|identity, entry| {
            let keep = now.signed_duration_since(entry.last_heartbeat_at) < max_age;
            if !keep {
                debug!("Evicting stale client {}", identity);
                removed += 1;
            }
            keep
        });

        removed
    }

    // ========================================
    // Queries
    // ========================================

    /// Identities whose last heartbeat is inside the TTL window.
    pub fn live_identities(&self) -> BTreeSet<String> {
        let now = self.clock.now();
        self.clients
            .iter()
            .filter(|entry| self.is_live_at(entry.value(), now))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// The descriptor for `identity`, only while it is live.
    pub fn get_descriptor(&self, identity: &str) -> Option<ServiceDescriptor> {
        let now = self.clock.now();
        self.clients
            .get(identity)
            .filter(|entry| self.is_live_at(entry.value(), now))
            .map(|entry| entry.descriptor.clone())
    }

    /// Like [`get_descriptor`](Self::get_descriptor), reporting absence as an error.
    pub fn lookup(&self, identity: &str) -> Result<ServiceDescriptor> {
        self.get_descriptor(identity)
            .ok_or_else(|| SnoopError::NotFound {
                identity: identity.to_string(),
            })
    }

    /// Every stored descriptor, live or not, ordered by identity.
    pub fn all_descriptors(&self) -> Vec<ServiceDescriptor> {
        let mut descriptors: Vec<ServiceDescriptor> = self
            .clients
            .iter()
            .map(|entry| entry.descriptor.clone())
            .collect();
        descriptors.sort_by(|a, b| a.identity.cmp(&b.identity));
        descriptors
    }

    /// Last heartbeat for `identity`, whether or not it is still live.
    pub fn liveness(&self, identity: &str) -> Option<LivenessRecord> {
        self.clients.get(identity).map(|entry| LivenessRecord {
            identity: identity.to_string(),
            last_heartbeat_at: entry.last_heartbeat_at,
        })
    }

    /// Snapshot of every stored client with its liveness, ordered by identity.
    pub fn records(&self) -> Vec<ClientStatus> {
        let now = self.clock.now();
        let mut records: Vec<ClientStatus> = self
            .clients
            .iter()
            .map(|entry| ClientStatus {
                descriptor: entry.descriptor.clone(),
                last_heartbeat_at: entry.last_heartbeat_at,
                live: self.is_live_at(entry.value(), now),
            })
            .collect();
        records.sort_by(|a, b| a.descriptor.identity.cmp(&b.descriptor.identity));
        records
    }

    /// Number of stored identities, live or not.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    fn is_live_at(&self, entry: &ClientEntry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.last_heartbeat_at) < self.ttl
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

/// Spawn a background task that periodically evicts entries older than `max_age`.
///
/// `max_age` is raised to the TTL and `interval` to
/// [`RegistryConfig::MIN_EVICTION_INTERVAL`].
pub fn spawn_eviction_task(
    registry: Arc<ClientRegistry>,
    max_age: Duration,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    let max_age = max_age.max(RegistryConfig::CLIENT_TTL);
    let interval = interval.max(RegistryConfig::MIN_EVICTION_INTERVAL);
    info!(
        "Client eviction task started (max age {:?}, every {:?})",
        max_age, interval
    );
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let removed = registry.evict_stale(max_age);
            if removed > 0 {
                info!("Evicted {} stale clients", removed);
            }
            debug!("Registry holds {} clients", registry.len());
        }
    })
}
