//! Heartbeat listener session.
//!
//! One [`StatusSession`] exists per client channel and turns inbound text
//! messages into registry mutations:
//!
//! ```text
//! Connected --descriptor--> Registered --descriptor--> Registered (refreshed)
//!     |                         |
//!     +------- "" (empty) ------+--> Deregistered (terminal)
//! ```
//!
//! Undecodable messages are dropped without a transition. Nothing is ever
//! sent back to the client.

use crate::codec::{self, StatusMessage};
use crate::registry::ClientRegistry;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Protocol state of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Channel open, nothing registered yet.
    Connected,
    /// At least one descriptor accepted.
    Registered,
    /// Deregistration received; the channel should be closed.
    Deregistered,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Connected => write!(f, "connected"),
            SessionState::Registered => write!(f, "registered"),
            SessionState::Deregistered => write!(f, "deregistered"),
        }
    }
}

/// What a single inbound message did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// First descriptor on this channel.
    Registered { identity: String },
    /// Later descriptor refreshing the registration.
    Refreshed { identity: String },
    /// Empty payload removed the identity.
    Deregistered { identity: String },
    /// Message rejected; state unchanged.
    Dropped { reason: String },
    /// Message arrived after deregistration.
    Ignored,
}

/// Per-channel heartbeat listener state machine.
pub struct StatusSession {
    id: Uuid,
    identity: Option<String>,
    state: SessionState,
    registry: Arc<ClientRegistry>,
}

impl StatusSession {
    /// Session for the registration channel; its identity comes from the
    /// first accepted descriptor.
    pub fn registration(registry: Arc<ClientRegistry>) -> Self {
        Self::with_identity(registry, None)
    }

    /// Session for the heartbeat channel of `identity`.
    ///
    /// Stricter than the wire protocol: descriptors naming another identity
    /// are dropped instead of registered.
    pub fn heartbeat(registry: Arc<ClientRegistry>, identity: impl Into<String>) -> Self {
        Self::with_identity(registry, Some(identity.into()))
    }

    fn with_identity(registry: Arc<ClientRegistry>, identity: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity,
            state: SessionState::Connected,
            registry,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Identity the channel is bound to, if known yet.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Whether the session reached its terminal state.
    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Deregistered
    }

    /// Apply one inbound message.
    pub fn handle(&mut self, payload: &str) -> SessionEvent {
        debug!(
            "Session {} ({}), status: {}",
            self.id,
            self.identity.as_deref().unwrap_or("-"),
            payload
        );

        if self.is_closed() {
            debug!("Session {} already deregistered, ignoring message", self.id);
            return SessionEvent::Ignored;
        }

        let message = match codec::decode_status(payload) {
            Ok(message) => message,
            Err(e) => {
                warn!("Session {}: dropping undecodable message: {}", self.id, e);
                return SessionEvent::Dropped {
                    reason: e.to_string(),
                };
            }
        };

        match message {
            StatusMessage::Register(descriptor) => {
                if let Some(bound) = &self.identity {
                    if *bound != descriptor.identity {
                        let reason = format!(
                            "descriptor for '{}' sent on channel of '{}'",
                            descriptor.identity, bound
                        );
                        warn!("Session {}: dropping message: {}", self.id, reason);
                        return SessionEvent::Dropped { reason };
                    }
                }

                let identity = descriptor.identity.clone();
                self.registry.register(descriptor);
                self.identity = Some(identity.clone());

                if self.state == SessionState::Connected {
                    self.state = SessionState::Registered;
                    SessionEvent::Registered { identity }
                } else {
                    SessionEvent::Refreshed { identity }
                }
            }
            StatusMessage::Deregister => match self.identity.clone() {
                Some(identity) => {
                    self.registry.deregister(&identity);
                    self.state = SessionState::Deregistered;
                    SessionEvent::Deregistered { identity }
                }
                None => {
                    let reason = "deregistration before any registration".to_string();
                    warn!("Session {}: dropping message: {}", self.id, reason);
                    SessionEvent::Dropped { reason }
                }
            },
        }
    }
}
