//! Attachment, refresh and reattachment through the injection service

use memory_injection::config::ServiceConfig;
use memory_injection::memory::OffsetChain;
use memory_injection::process::simulated::DEFAULT_BASE;
use memory_injection::process::{SimulatedProcess, SimulatedSystem};
use memory_injection::{
    Address, InjectionService, MemoryError, ProcessHandle, ProcessSelector, ServiceState, Vector,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

const WATCH: Duration = Duration::from_millis(100);
const TICK: Duration = Duration::from_millis(16);

/// A target with `base+0x10 -> 0x5000`, an i32 at 0x5020 and a Vector at 0x5040
fn game(pid: u32, health: i32) -> SimulatedProcess {
    let process = SimulatedProcess::new(pid, "ffxiv_dx11.exe");
    process.write_pointer(DEFAULT_BASE.wrapping_add(0x10), Address::new(0x5000));
    process.map(Address::new(0x5020), 0x40);
    process.map_bytes(Address::new(0x5020), &health.to_le_bytes());
    process
}

fn health_chain() -> Vec<OffsetChain> {
    vec![
        OffsetChain::base(vec![0x10]).unwrap(),
        OffsetChain::relative(vec![0x20]).unwrap(),
    ]
}

async fn attached(system: &Arc<SimulatedSystem>) -> InjectionService {
    let service = InjectionService::new(
        system.clone(),
        ProcessSelector::name_contains("ffxiv_dx11"),
        ServiceConfig::default(),
    )
    .unwrap();
    service.initialize().await.unwrap();
    service.start().unwrap();
    service
}

#[tokio::test(start_paused = true)]
async fn test_typed_handle_reads_and_writes() {
    let system = Arc::new(SimulatedSystem::new());
    let process = system.spawn(game(1, 1234));
    let service = attached(&system).await;

    let health = service.get_memory::<i32>(&health_chain()).unwrap();
    assert_eq!(health.address(), Address::new(0x5020));
    assert_eq!(health.get().unwrap(), 1234);
    assert_eq!(health.describe(), "i32 [10, 20] (0x0000000000005020)");

    health.set(99).unwrap();
    let raw = process.read_bytes(Address::new(0x5020), 4).unwrap();
    assert_eq!(i32::from_le_bytes(raw.try_into().unwrap()), 99);

    let position = service
        .get_memory::<Vector>(&[
            OffsetChain::base(vec![0x10]).unwrap(),
            OffsetChain::relative(vec![0x40]).unwrap(),
        ])
        .unwrap();
    position.set(Vector::new(1.0, 2.0, 3.0)).unwrap();
    assert_eq!(position.get().unwrap(), Vector::new(1.0, 2.0, 3.0));

    service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_ticker_refreshes_cached_value() {
    let system = Arc::new(SimulatedSystem::new());
    let process = system.spawn(game(1, 10));
    let service = attached(&system).await;

    let health = service.get_memory::<i32>(&health_chain()).unwrap();
    let mut updates = health.subscribe();

    sleep(TICK * 3).await;
    assert!(health.refresh_count() >= 2);
    assert_eq!(health.value(), Some(10));
    assert_eq!(*updates.borrow_and_update(), Some(10));

    process.map_bytes(Address::new(0x5020), &25i32.to_le_bytes());
    updates.changed().await.unwrap();
    assert_eq!(*updates.borrow(), Some(25));

    service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_retired_handle_stops_refreshing() {
    let system = Arc::new(SimulatedSystem::new());
    system.spawn(game(1, 10));
    let service = attached(&system).await;

    let retired = service.get_memory::<i32>(&health_chain()).unwrap();
    let kept = service.get_memory::<i32>(&health_chain()).unwrap();
    assert_eq!(service.active_count(), 2);

    sleep(TICK * 2).await;
    retired.retire();
    assert!(!retired.is_active());
    assert_eq!(service.active_count(), 1);

    let frozen = retired.refresh_count();
    let before = kept.refresh_count();
    sleep(TICK * 10).await;

    assert_eq!(retired.refresh_count(), frozen);
    assert!(kept.refresh_count() > before);

    // Dropping the last reference also leaves the refresh set
    drop(kept);
    assert_eq!(service.active_count(), 0);

    service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_process_exit_and_reattach() {
    let system = Arc::new(SimulatedSystem::new());
    let first = system.spawn(game(1, 10));
    let service = attached(&system).await;
    let health = service.get_memory::<i32>(&health_chain()).unwrap();

    sleep(WATCH * 2).await;
    assert!(health.refresh_count() > 0);

    first.kill();

    // The watcher notices within one watch interval
    sleep(WATCH + Duration::from_millis(1)).await;
    assert!(!service.is_alive());
    assert_eq!(service.exit_count(), 1);
    assert!(matches!(
        service.get_address(&health_chain()),
        Err(MemoryError::ProcessNotReady(_))
    ));
    assert!(matches!(
        service.get_memory::<i32>(&health_chain()),
        Err(MemoryError::ProcessNotReady(_))
    ));

    // The ticker stops within one tick interval of that
    sleep(TICK).await;
    let stopped_at = health.refresh_count();
    sleep(WATCH * 5).await;
    assert_eq!(health.refresh_count(), stopped_at);

    let second = system.spawn(game(2, 77));
    // Longer than the largest backoff delay
    sleep(Duration::from_secs(6)).await;

    assert_eq!(service.state(), ServiceState::Attached);
    assert!(service.is_alive());
    assert_eq!(service.process().unwrap().pid(), second.pid());

    let fresh = service.get_memory::<i32>(&health_chain()).unwrap();
    assert_eq!(fresh.get().unwrap(), 77);

    // A ticker runs again for the new attachment, and only one
    let before = fresh.refresh_count();
    sleep(TICK * 10).await;
    let refreshed = fresh.refresh_count() - before;
    assert!((9..=11).contains(&refreshed), "refreshed {refreshed} times in 10 ticks");
    assert_eq!(fresh.value(), Some(77));

    // Handles bound before the exit still target the dead process
    assert!(matches!(health.get(), Err(MemoryError::ProcessExited(1))));

    service.shutdown().await;
    assert_eq!(service.state(), ServiceState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_exit_is_reported_once_per_transition() {
    let system = Arc::new(SimulatedSystem::new());
    let first = system.spawn(game(1, 0));
    let service = attached(&system).await;
    assert_eq!(service.exit_count(), 0);

    first.kill();
    // Gone for many watch intervals
    sleep(WATCH * 30).await;
    assert_eq!(service.state(), ServiceState::Attaching);
    assert_eq!(service.exit_count(), 1);

    let second = system.spawn(game(2, 0));
    sleep(Duration::from_secs(6)).await;
    assert_eq!(service.state(), ServiceState::Attached);
    assert_eq!(service.exit_count(), 1);

    second.kill();
    sleep(WATCH * 30).await;
    assert_eq!(service.exit_count(), 2);

    service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_ambiguous_target_waits_for_single_match() {
    let system = Arc::new(SimulatedSystem::new());
    let first = system.spawn(game(1, 0));
    system.spawn(game(2, 0));

    let service = InjectionService::new(
        system.clone(),
        ProcessSelector::name_contains("ffxiv"),
        ServiceConfig::default(),
    )
    .unwrap();

    let init = {
        let service = service.clone();
        tokio::spawn(async move { service.initialize().await })
    };
    sleep(Duration::from_secs(1)).await;
    assert_eq!(service.state(), ServiceState::Attaching);

    first.kill();
    sleep(Duration::from_secs(6)).await;

    init.await.unwrap().unwrap();
    assert_eq!(service.process().unwrap().pid(), 2);
    service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_base_address_and_bulk_resolution() {
    let system = Arc::new(SimulatedSystem::new());
    system.spawn(game(1, 0));
    let service = attached(&system).await;

    assert_eq!(
        service.get_base_address(0x10).unwrap(),
        DEFAULT_BASE.wrapping_add(0x10)
    );

    let results = service
        .get_addresses(&[
            health_chain(),
            vec![OffsetChain::base(vec![0x900, 0x8]).unwrap()],
        ])
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(*results[0].as_ref().unwrap(), Address::new(0x5020));
    assert!(matches!(
        results[1],
        Err(MemoryError::UnresolvedPointer { step: 0, .. })
    ));

    service.shutdown().await;
}
