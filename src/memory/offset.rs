//! Offset chains and their resolution into live addresses
//!
//! A chain is a list of byte deltas. Resolution starts at an anchor, and for
//! every delta but the last reads a pointer at `current + delta`, which becomes
//! the new `current`. The last delta is only added, never dereferenced. So a
//! chain of `n` deltas costs exactly `n - 1` pointer reads.

use crate::core::types::{Address, MemoryError, MemoryResult};
use crate::process::ProcessHandle;
use rayon::prelude::*;
use std::fmt;
use tracing::trace;

/// Where the first delta of a chain is measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// The primary module's base address
    ModuleBase,
    /// A previously resolved address
    Address(Address),
    /// Whatever the preceding chain resolved to; at the start of a request
    /// this is the null address, i.e. the first delta is absolute
    Relative,
}

/// An immutable, non-empty sequence of deltas with an anchor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetChain {
    anchor: Anchor,
    deltas: Vec<u64>,
}

impl OffsetChain {
    /// Creates a chain, rejecting an empty delta list
    pub fn new(anchor: Anchor, deltas: impl Into<Vec<u64>>) -> MemoryResult<Self> {
        let deltas = deltas.into();
        if deltas.is_empty() {
            return Err(MemoryError::InvalidChain(
                "offset chain has no deltas".to_string(),
            ));
        }
        Ok(OffsetChain { anchor, deltas })
    }

    /// A chain whose first delta is relative to the module base
    pub fn base(deltas: impl Into<Vec<u64>>) -> MemoryResult<Self> {
        Self::new(Anchor::ModuleBase, deltas)
    }

    /// A chain continuing from the previous chain of the same request
    pub fn relative(deltas: impl Into<Vec<u64>>) -> MemoryResult<Self> {
        Self::new(Anchor::Relative, deltas)
    }

    /// A chain starting at an already-resolved address
    pub fn from_address(address: Address, deltas: impl Into<Vec<u64>>) -> MemoryResult<Self> {
        Self::new(Anchor::Address(address), deltas)
    }

    /// One single-delta base chain per value, for offsets that name several
    /// instances of the same structure
    pub fn instances(values: &[u64]) -> MemoryResult<Vec<Self>> {
        if values.is_empty() {
            return Err(MemoryError::InvalidChain(
                "no base offsets given".to_string(),
            ));
        }
        values.iter().map(|v| Self::base(vec![*v])).collect()
    }

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    pub fn deltas(&self) -> &[u64] {
        &self.deltas
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    /// Always false; chains are non-empty by construction
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }
}

impl fmt::Display for OffsetChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", join_deltas(&self.deltas))
    }
}

fn join_deltas<'a>(deltas: impl IntoIterator<Item = &'a u64>) -> String {
    deltas
        .into_iter()
        .map(|d| format!("{d:02X}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `TypeName [d1, d2, ...] (address)` for diagnostics; never parsed back
pub fn describe(type_name: &str, chains: &[OffsetChain], address: Address) -> String {
    let deltas = join_deltas(chains.iter().flat_map(|c| c.deltas.iter()));
    format!("{type_name} [{deltas}] ({address})")
}

/// Resolves offset chains against one process.
///
/// Holds no state of its own, so any number of resolutions may run in parallel.
pub struct ChainResolver<'a> {
    process: &'a dyn ProcessHandle,
}

impl<'a> ChainResolver<'a> {
    pub fn new(process: &'a dyn ProcessHandle) -> Self {
        ChainResolver { process }
    }

    /// Maps composed chains onto one flat list of steps.
    ///
    /// Only the first chain may carry a non-relative anchor; its first delta
    /// becomes absolute (`anchor + delta`).
    pub fn flatten(&self, chains: &[OffsetChain]) -> MemoryResult<Vec<u64>> {
        let (first, rest) = chains.split_first().ok_or_else(|| {
            MemoryError::InvalidChain("no offset chains given".to_string())
        })?;

        if let Some(pos) = rest.iter().position(|c| c.anchor != Anchor::Relative) {
            return Err(MemoryError::InvalidChain(format!(
                "chain {} is anchored but only the first chain may be",
                pos + 1
            )));
        }

        let origin = match first.anchor {
            Anchor::ModuleBase => self.process.base_address(),
            Anchor::Address(address) => address,
            Anchor::Relative => Address::null(),
        };

        let mut steps = Vec::with_capacity(chains.iter().map(OffsetChain::len).sum());
        steps.push(origin.wrapping_add(first.deltas[0]).as_u64());
        steps.extend_from_slice(&first.deltas[1..]);
        for chain in rest {
            steps.extend_from_slice(&chain.deltas);
        }
        Ok(steps)
    }

    /// Resolves composed chains to the final address.
    ///
    /// Fails with [`MemoryError::UnresolvedPointer`] naming the step whose
    /// pointer read failed; later steps are not attempted.
    pub fn resolve(&self, chains: &[OffsetChain]) -> MemoryResult<Address> {
        let steps = self.flatten(chains)?;
        let Some((last, derefs)) = steps.split_last() else {
            return Err(MemoryError::InvalidChain("offset chain has no deltas".to_string()));
        };

        let mut current = Address::null();
        for (step, delta) in derefs.iter().enumerate() {
            let at = current.wrapping_add(*delta);
            current = self
                .process
                .read_pointer(at)
                .map_err(|e| MemoryError::unresolved_pointer(step, at, e.to_string()))?;
            trace!(step, %at, pointer = %current, "followed pointer");
        }

        Ok(current.wrapping_add(*last))
    }

    /// Resolves many independent requests in parallel
    pub fn resolve_many(&self, requests: &[Vec<OffsetChain>]) -> Vec<MemoryResult<Address>> {
        requests
            .par_iter()
            .map(|chains| self.resolve(chains))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::simulated::{SimulatedProcess, DEFAULT_BASE};

    fn chain_process() -> SimulatedProcess {
        // base+0x10 -> 0x5000, 0x5000+0x20 -> 0x6000
        let process = SimulatedProcess::new(1, "game.exe");
        process.write_pointer(DEFAULT_BASE.wrapping_add(0x10), Address::new(0x5000));
        process.write_pointer(Address::new(0x5020), Address::new(0x6000));
        process
    }

    #[test]
    fn test_empty_chain_is_rejected() {
        assert!(matches!(
            OffsetChain::base(Vec::new()),
            Err(MemoryError::InvalidChain(_))
        ));
        assert!(OffsetChain::instances(&[]).is_err());
    }

    #[test]
    fn test_single_delta_resolves_without_reads() {
        let process = chain_process();
        let resolver = ChainResolver::new(&process);
        let chain = OffsetChain::base(vec![0x40]).unwrap();

        let address = resolver.resolve(&[chain]).unwrap();
        assert_eq!(address, DEFAULT_BASE.wrapping_add(0x40));
        assert_eq!(process.read_count(), 0);
    }

    #[test]
    fn test_base_then_relative_chain() {
        let process = chain_process();
        let resolver = ChainResolver::new(&process);
        let chains = [
            OffsetChain::base(vec![0x10]).unwrap(),
            OffsetChain::relative(vec![0x20, 0x8]).unwrap(),
        ];

        // deref(base+0x10) = 0x5000, deref(0x5020) = 0x6000, + 0x8
        assert_eq!(resolver.resolve(&chains).unwrap(), Address::new(0x6008));
        assert_eq!(process.read_count(), 2);
    }

    #[test]
    fn test_multi_delta_base_chain_chases_from_anchor() {
        let process = chain_process();
        let resolver = ChainResolver::new(&process);
        let chain = OffsetChain::base(vec![0x10, 0x20, 0x8]).unwrap();

        assert_eq!(resolver.resolve(&[chain]).unwrap(), Address::new(0x6008));
    }

    #[test]
    fn test_failed_step_is_reported_and_stops() {
        let process = chain_process();
        let resolver = ChainResolver::new(&process);
        // 0x6000 + 0x30 is unmapped, so step 2 fails and step 3 never runs
        let chain = OffsetChain::base(vec![0x10, 0x20, 0x30, 0x4]).unwrap();

        match resolver.resolve(&[chain]) {
            Err(MemoryError::UnresolvedPointer { step, address, .. }) => {
                assert_eq!(step, 2);
                assert_eq!(address, Address::new(0x6030).to_string());
            }
            other => panic!("Expected unresolved pointer, got {other:?}"),
        }
        assert_eq!(process.read_count(), 3);
    }

    #[test]
    fn test_address_anchor() {
        let process = chain_process();
        let resolver = ChainResolver::new(&process);
        let chain = OffsetChain::from_address(Address::new(0x5000), vec![0x20, 0x4]).unwrap();

        assert_eq!(resolver.resolve(&[chain]).unwrap(), Address::new(0x6004));
    }

    #[test]
    fn test_only_first_chain_may_be_anchored() {
        let process = chain_process();
        let resolver = ChainResolver::new(&process);
        let chains = [
            OffsetChain::relative(vec![0x10]).unwrap(),
            OffsetChain::base(vec![0x20]).unwrap(),
        ];

        assert!(matches!(
            resolver.resolve(&chains),
            Err(MemoryError::InvalidChain(_))
        ));
        assert!(matches!(resolver.resolve(&[]), Err(MemoryError::InvalidChain(_))));
    }

    #[test]
    fn test_instances_expand_to_single_delta_chains() {
        let process = chain_process();
        let resolver = ChainResolver::new(&process);
        let requests: Vec<Vec<OffsetChain>> = OffsetChain::instances(&[0x100, 0x200])
            .unwrap()
            .into_iter()
            .map(|c| vec![c])
            .collect();

        let resolved: Vec<Address> = resolver
            .resolve_many(&requests)
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(
            resolved,
            vec![DEFAULT_BASE.wrapping_add(0x100), DEFAULT_BASE.wrapping_add(0x200)]
        );
    }

    #[test]
    fn test_describe_format() {
        let chains = [
            OffsetChain::base(vec![0x10]).unwrap(),
            OffsetChain::relative(vec![0x20, 0x1A8]).unwrap(),
        ];
        assert_eq!(
            describe("i32", &chains, Address::new(0x6008)),
            "i32 [10, 20, 1A8] (0x0000000000006008)"
        );
        assert_eq!(chains[1].to_string(), "[20, 1A8]");
    }
}
