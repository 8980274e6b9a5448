//! HeartbeatAgent - keeps one service registered with the registry.
//!
//! On start the agent sends its descriptor on the registration channel, then
//! repeats it on the identity's heartbeat channel once per period until shut
//! down. Shutdown sends the empty deregistration message and closes the
//! channels. Failed sends are logged and counted; the next tick simply tries
//! again.

use crate::config::{AgentConfig, ResolvedConfig};
use crate::transport::DynTransport;
use snoop_core::codec::{self, StatusMessage};
use snoop_core::{RegistryEndpoints, Result, ServiceDescriptor};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use url::Url;

/// Lifecycle of the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// Created, nothing sent yet.
    Init = 0,
    /// Sending the registration message.
    Connecting = 1,
    /// Registration attempted, waiting for the first heartbeat tick.
    Registered = 2,
    /// Periodic heartbeats running.
    Heartbeating = 3,
    /// Sending the deregistration message.
    Deregistering = 4,
    /// All channels closed. Terminal.
    Closed = 5,
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentState::Init => write!(f, "init"),
            AgentState::Connecting => write!(f, "connecting"),
            AgentState::Registered => write!(f, "registered"),
            AgentState::Heartbeating => write!(f, "heartbeating"),
            AgentState::Deregistering => write!(f, "deregistering"),
            AgentState::Closed => write!(f, "closed"),
        }
    }
}

struct AtomicAgentState(AtomicU8);

impl AtomicAgentState {
    fn new(state: AgentState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    fn load(&self) -> AgentState {
        match self.0.load(Ordering::SeqCst) {
            0 => AgentState::Init,
            1 => AgentState::Connecting,
            2 => AgentState::Registered,
            3 => AgentState::Heartbeating,
            4 => AgentState::Deregistering,
            _ => AgentState::Closed,
        }
    }

    fn store(&self, state: AgentState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

/// Counters for messages the agent has sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentStats {
    pub registrations: u64,
    pub heartbeats: u64,
    pub failures: u64,
}

#[derive(Default)]
struct AtomicStats {
    registrations: AtomicU64,
    heartbeats: AtomicU64,
    failures: AtomicU64,
}

impl AtomicStats {
    fn snapshot(&self) -> AgentStats {
        AgentStats {
            registrations: self.registrations.load(Ordering::Relaxed),
            heartbeats: self.heartbeats.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

struct Shared {
    state: AtomicAgentState,
    stats: AtomicStats,
}

/// A configured agent that has not started yet.
pub struct HeartbeatAgent {
    descriptor: ServiceDescriptor,
    endpoints: RegistryEndpoints,
    registration_url: Url,
    heartbeat_url: Url,
    period: Duration,
    transport: DynTransport,
}

impl HeartbeatAgent {
    /// Resolve `config` into an agent. Nothing is sent until [`start`](Self::start).
    pub fn new(config: &AgentConfig, transport: DynTransport) -> Result<Self> {
        let ResolvedConfig {
            descriptor,
            endpoints,
            heartbeat_period,
        } = config.resolve()?;

        let registration_url = endpoints.registration()?;
        let heartbeat_url = endpoints.heartbeat(&descriptor.identity)?;

        Ok(Self {
            descriptor,
            endpoints,
            registration_url,
            heartbeat_url,
            period: heartbeat_period,
            transport,
        })
    }

    /// Start an agent for `config`, or return `None` when it is disabled.
    ///
    /// Configuration is only checked for enabled agents.
    pub fn start_if_enabled(
        config: &AgentConfig,
        transport: DynTransport,
    ) -> Result<Option<AgentHandle>> {
        if !config.enabled {
            debug!("Registry agent disabled");
            return Ok(None);
        }
        Ok(Some(Self::new(config, transport)?.start()))
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    pub fn endpoints(&self) -> &RegistryEndpoints {
        &self.endpoints
    }

    /// Spawn the agent task on the current runtime.
    pub fn start(self) -> AgentHandle {
        let shared = Arc::new(Shared {
            state: AtomicAgentState::new(AgentState::Init),
            stats: AtomicStats::default(),
        });
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let descriptor = self.descriptor.clone();

        let task_shared = shared.clone();
        let task_handle = tokio::spawn(async move {
            self.run(task_shared, shutdown_rx).await;
        });

        AgentHandle {
            descriptor,
            shared,
            shutdown_tx: Some(shutdown_tx),
            task_handle: Some(task_handle),
        }
    }

    async fn run(self, shared: Arc<Shared>, mut shutdown_rx: oneshot::Receiver<()>) {
        let payload = match codec::encode(&self.descriptor) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Cannot encode descriptor for {}: {}", self.descriptor, e);
                shared.state.store(AgentState::Closed);
                return;
            }
        };

        shared.state.store(AgentState::Connecting);
        match self.transport.send(&self.registration_url, &payload).await {
            Ok(()) => {
                shared.stats.registrations.fetch_add(1, Ordering::Relaxed);
                info!("Registered {} with {}", self.descriptor, self.endpoints.base());
            }
            Err(e) => {
                shared.stats.failures.fetch_add(1, Ordering::Relaxed);
                warn!("Registration of {} failed: {}", self.descriptor.identity, e);
            }
        }
        self.transport.close(&self.registration_url).await;
        shared.state.store(AgentState::Registered);

        let mut ticker = tokio::time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => {
                    shared.state.store(AgentState::Heartbeating);
                    match self.transport.send(&self.heartbeat_url, &payload).await {
                        Ok(()) => {
                            shared.stats.heartbeats.fetch_add(1, Ordering::Relaxed);
                            debug!("Heartbeat sent for {}", self.descriptor.identity);
                        }
                        Err(e) => {
                            shared.stats.failures.fetch_add(1, Ordering::Relaxed);
                            warn!("Heartbeat for {} failed: {}", self.descriptor.identity, e);
                        }
                    }
                }
            }
        }

        shared.state.store(AgentState::Deregistering);
        let sentinel = codec::encode_status(&StatusMessage::Deregister).unwrap_or_default();
        match self.transport.send(&self.heartbeat_url, &sentinel).await {
            Ok(()) => info!("Deregistered {}", self.descriptor.identity),
            Err(e) => {
                shared.stats.failures.fetch_add(1, Ordering::Relaxed);
                warn!("Deregistration of {} failed: {}", self.descriptor.identity, e);
            }
        }
        self.transport.close(&self.heartbeat_url).await;
        shared.state.store(AgentState::Closed);
    }
}

/// Handle to a running agent.
///
/// Dropping the handle asks the agent to deregister; call
/// [`shutdown`](Self::shutdown) to wait for it.
pub struct AgentHandle {
    descriptor: ServiceDescriptor,
    shared: Arc<Shared>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task_handle: Option<JoinHandle<()>>,
}

impl AgentHandle {
    pub fn state(&self) -> AgentState {
        self.shared.state.load()
    }

    pub fn stats(&self) -> AgentStats {
        self.shared.stats.snapshot()
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    /// Stop heartbeating, deregister and wait for the channels to close.
    ///
    /// Returns the state the agent ended in.
    pub async fn shutdown(mut self) -> AgentState {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.task_handle.take() {
            if let Err(e) = handle.await {
                warn!("Agent task for {} ended abnormally: {}", self.descriptor.identity, e);
            }
        }
        self.state()
    }
}

impl Drop for AgentHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
