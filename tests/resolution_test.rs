//! Offset chain resolution against a simulated process

use memory_injection::memory::{ChainResolver, OffsetChain};
use memory_injection::process::simulated::DEFAULT_BASE;
use memory_injection::process::SimulatedProcess;
use memory_injection::{Address, MemoryError};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

/// Lays out a pointer chain for `deltas` and returns the expected final address.
/// When `broken` is `Some(k)`, the pointer for step `k` is left unmapped.
fn build_chain(process: &SimulatedProcess, deltas: &[u64], broken: Option<usize>) -> Address {
    let mut at = DEFAULT_BASE.wrapping_add(deltas[0]);
    for (step, delta) in deltas.iter().enumerate().skip(1) {
        let target = Address::new(0x10_0000 * (step as u64 + 1));
        if broken != Some(step - 1) {
            process.write_pointer(at, target);
        }
        at = target.wrapping_add(*delta);
    }
    at
}

#[test]
fn test_base_then_chain_scenario() {
    let process = SimulatedProcess::new(1, "game.exe");
    process.write_pointer(DEFAULT_BASE.wrapping_add(0x10), Address::new(0x5000));
    process.map_bytes(Address::new(0x5020), &1234i32.to_le_bytes());

    let chains = [
        OffsetChain::base(vec![0x10]).unwrap(),
        OffsetChain::relative(vec![0x20]).unwrap(),
    ];
    let resolver = ChainResolver::new(&process);

    let address = resolver.resolve(&chains).unwrap();
    assert_eq!(address, Address::new(0x5020));
    assert_eq!(process.read_count(), 1);
}

#[test]
fn test_composed_chains_equal_flat_chain() {
    let process = SimulatedProcess::new(1, "game.exe");
    let expected = build_chain(&process, &[0x18, 0x30, 0x8, 0x40], None);
    let resolver = ChainResolver::new(&process);

    let flat = [OffsetChain::base(vec![0x18, 0x30, 0x8, 0x40]).unwrap()];
    let composed = [
        OffsetChain::base(vec![0x18]).unwrap(),
        OffsetChain::relative(vec![0x30, 0x8]).unwrap(),
        OffsetChain::relative(vec![0x40]).unwrap(),
    ];

    assert_eq!(resolver.resolve(&flat).unwrap(), expected);
    assert_eq!(resolver.resolve(&composed).unwrap(), expected);
}

#[test]
fn test_resolution_on_32_bit_target() {
    let process = SimulatedProcess::new(1, "game.exe")
        .with_base(Address::new(0x40_0000))
        .with_pointer_size(4);
    process.write_pointer(Address::new(0x40_0010), Address::new(0x8000));

    let chain = OffsetChain::base(vec![0x10, 0x4]).unwrap();
    let address = ChainResolver::new(&process).resolve(&[chain]).unwrap();
    assert_eq!(address, Address::new(0x8004));
}

#[test]
fn test_dead_process_breaks_first_step() {
    let process = SimulatedProcess::new(3, "game.exe");
    build_chain(&process, &[0x10, 0x20], None);
    process.kill();

    let chain = OffsetChain::base(vec![0x10, 0x20]).unwrap();
    match ChainResolver::new(&process).resolve(&[chain]) {
        Err(MemoryError::UnresolvedPointer { step, reason, .. }) => {
            assert_eq!(step, 0);
            assert!(reason.contains("exited"));
        }
        other => panic!("Expected unresolved pointer, got {other:?}"),
    }
}

fn deltas() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec((0u64..0x80).prop_map(|d| d * 8), 1..8)
}

proptest! {
    #[test]
    fn prop_chain_costs_one_read_per_dereference(deltas in deltas()) {
        let process = SimulatedProcess::new(1, "game.exe");
        let expected = build_chain(&process, &deltas, None);

        let chain = OffsetChain::base(deltas.clone()).unwrap();
        let address = ChainResolver::new(&process).resolve(&[chain]).unwrap();

        prop_assert_eq!(address, expected);
        prop_assert_eq!(process.read_count(), deltas.len() as u64 - 1);
    }

    #[test]
    fn prop_broken_step_is_reported(deltas in deltas(), pick in any::<prop::sample::Index>()) {
        prop_assume!(deltas.len() >= 2);
        let broken = pick.index(deltas.len() - 1);

        let process = SimulatedProcess::new(1, "game.exe");
        build_chain(&process, &deltas, Some(broken));

        let chain = OffsetChain::base(deltas.clone()).unwrap();
        let result = ChainResolver::new(&process).resolve(&[chain]);

        let step = match result {
            Err(MemoryError::UnresolvedPointer { step, .. }) => step,
            other => panic!("Expected unresolved pointer, got {other:?}"),
        };
        prop_assert_eq!(step, broken);
        // Nothing past the broken step is read
        prop_assert_eq!(process.read_count(), broken as u64 + 1);
    }
}
