//! Integration tests for the client registry.
//!
//! These tests drive the registry through a manual clock so liveness
//! boundaries can be crossed without sleeping.

use snoop_core::{Clock, ClientRegistry, ManualClock, ServiceDescriptor, SnoopError};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Create a registry and the clock that drives it.
fn create_registry() -> (Arc<ClientRegistry>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_now());
    let registry = Arc::new(ClientRegistry::with_clock(clock.clone()));
    (registry, clock)
}

fn svc_a() -> ServiceDescriptor {
    ServiceDescriptor::new("svc-a", "10.0.0.1:8080", "api/")
}

#[test]
fn test_idempotent_registration_keeps_latest_timestamp() {
    let (registry, clock) = create_registry();

    registry.register(svc_a());
    clock.advance(Duration::from_secs(5));
    let second_call_at = clock.now();
    registry.register(svc_a());

    assert_eq!(registry.all_descriptors(), vec![svc_a()]);
    assert_eq!(
        registry.liveness("svc-a").unwrap().last_heartbeat_at,
        second_call_at
    );
}

#[test]
fn test_ttl_boundary() {
    let (registry, clock) = create_registry();
    registry.register(svc_a());

    clock.advance(Duration::from_secs(59));
    assert!(registry.live_identities().contains("svc-a"));
    assert!(registry.get_descriptor("svc-a").is_some());

    clock.advance(Duration::from_secs(2));
    assert!(!registry.live_identities().contains("svc-a"));
    assert!(registry.get_descriptor("svc-a").is_none());
    assert_eq!(registry.all_descriptors(), vec![svc_a()]);
}

#[test]
fn test_heartbeat_restores_liveness() {
    let (registry, clock) = create_registry();
    registry.register(svc_a());

    clock.advance(Duration::from_secs(61));
    assert!(registry.live_identities().is_empty());

    registry.register(svc_a());
    assert!(registry.live_identities().contains("svc-a"));
}

#[test]
fn test_deregistration() {
    let (registry, _) = create_registry();
    registry.register(svc_a());
    registry.register(ServiceDescriptor::new("svc-b", "10.0.0.2:8080", "api/"));

    assert!(registry.deregister("svc-a"));

    assert!(matches!(
        registry.lookup("svc-a"),
        Err(SnoopError::NotFound { .. })
    ));
    let identities: Vec<String> = registry
        .all_descriptors()
        .into_iter()
        .map(|d| d.identity)
        .collect();
    assert_eq!(identities, vec!["svc-b".to_string()]);

    // Second deregistration is a no-op
    assert!(!registry.deregister("svc-a"));
}

#[test]
fn test_concurrent_registration() {
    const N: usize = 64;
    let (registry, _) = create_registry();

    std::thread::scope(|scope| {
        for i in 0..N {
            let registry = registry.clone();
            scope.spawn(move || {
                registry.register(ServiceDescriptor::new(
                    format!("svc-{i}"),
                    format!("10.0.0.{i}:8080"),
                    "api/",
                ));
            });
        }
    });

    assert_eq!(registry.live_identities().len(), N);
    assert_eq!(registry.all_descriptors().len(), N);
}

#[test]
fn test_reads_tolerate_concurrent_mutation() {
    const WRITERS: usize = 8;
    const ROUNDS: usize = 200;
    let (registry, _) = create_registry();

    // Stable identities that are never touched by writers
    for i in 0..10 {
        registry.register(ServiceDescriptor::new(format!("stable-{i}"), "10.0.0.1:80", "/"));
    }

    std::thread::scope(|scope| {
        for w in 0..WRITERS {
            let registry = registry.clone();
            scope.spawn(move || {
                for r in 0..ROUNDS {
                    let identity = format!("churn-{w}-{}", r % 5);
                    registry.register(ServiceDescriptor::new(identity.as_str(), "10.0.0.2:80", "/"));
                    if r % 2 == 0 {
                        registry.deregister(&identity);
                    }
                }
            });
        }

        let reader = registry.clone();
        scope.spawn(move || {
            for _ in 0..ROUNDS {
                let live = reader.live_identities();
                let stable = live.iter().filter(|id| id.starts_with("stable-")).count();
                assert_eq!(stable, 10);
            }
        });
    });
}

#[test]
fn test_concrete_scenario() {
    let (registry, clock) = create_registry();

    registry.register(svc_a());
    assert_eq!(
        registry.live_identities(),
        BTreeSet::from(["svc-a".to_string()])
    );

    clock.advance(Duration::from_secs(61));

    assert!(registry.live_identities().is_empty());
    assert!(matches!(
        registry.lookup("svc-a"),
        Err(SnoopError::NotFound { .. })
    ));
    assert_eq!(registry.all_descriptors(), vec![svc_a()]);
}
