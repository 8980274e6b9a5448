//! HTTP/WebSocket server implementation using Axum.

use crate::handler::{handle_clients, handle_health, handle_lookup, handle_services, handle_status};
use crate::status::{handle_heartbeat_channel, handle_registration_channel};
use axum::{routing::get, Router};
use snoop_core::registry::spawn_eviction_task;
use snoop_core::{ClientRegistry, RegistryConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers.
pub struct AppState {
    /// The one registry instance owned by this server.
    pub registry: Arc<ClientRegistry>,
}

/// Runtime options for the server.
#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    /// Remove entries whose last heartbeat is older than this. Must be at
    /// least the client TTL. `None` keeps stale entries until they are
    /// deregistered or overwritten.
    pub evict_after: Option<Duration>,
}

/// Handle to a running server. Dropping shuts it down.
pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
    eviction_handle: Option<tokio::task::JoinHandle<()>>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and let in-flight requests finish.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(eviction) = self.eviction_handle.take() {
            eviction.abort();
        }
    }

    /// Shut down and wait for the serve loop to exit.
    pub async fn stopped(mut self) {
        self.shutdown();
        if let Some(task) = self.task_handle.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

/// Build the router for the registration/heartbeat channels and the lookup API.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            &format!("/{}", RegistryConfig::REGISTER_PATH),
            get(handle_registration_channel),
        )
        .route(
            &format!("/{}/:identity", RegistryConfig::STATUS_PATH),
            get(handle_heartbeat_channel),
        )
        .route(
            &format!("/{}", RegistryConfig::SERVICES_PATH),
            get(handle_services),
        )
        .route(
            &format!("/{}/:identity", RegistryConfig::SERVICES_PATH),
            get(handle_lookup),
        )
        .route(
            &format!("/{}", RegistryConfig::CLIENTS_PATH),
            get(handle_clients),
        )
        .route(
            &format!("/{}", RegistryConfig::STATUS_SNAPSHOT_PATH),
            get(handle_status),
        )
        .route(&format!("/{}", RegistryConfig::HEALTH_PATH), get(handle_health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the registry server.
///
/// Returns a handle carrying the actual bound address (useful when port=0).
pub async fn start_server(
    registry: Arc<ClientRegistry>,
    host: &str,
    port: u16,
    options: ServerOptions,
) -> anyhow::Result<ServerHandle> {
    if let Some(max_age) = options.evict_after {
        if max_age < RegistryConfig::CLIENT_TTL {
            anyhow::bail!(
                "eviction age {:?} is shorter than the client TTL {:?}",
                max_age,
                RegistryConfig::CLIENT_TTL
            );
        }
    }

    let eviction_handle = options.evict_after.map(|max_age| {
        spawn_eviction_task(
            registry.clone(),
            max_age,
            max_age.min(RegistryConfig::CLIENT_TTL),
        )
    });

    let state = Arc::new(AppState { registry });
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task_handle = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
        match result {
            Ok(()) => info!("Server stopped"),
            Err(e) => error!("Server error: {}", e),
        }
    });

    Ok(ServerHandle {
        addr: actual_addr,
        shutdown_tx: Some(shutdown_tx),
        task_handle: Some(task_handle),
        eviction_handle,
    })
}
