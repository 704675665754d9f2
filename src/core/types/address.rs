//! Absolute address inside the target process

use super::error::{MemoryError, MemoryResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An absolute virtual address in the attached process.
///
/// Addresses are always 64-bit wide so that a 32-bit host can still talk about
/// a 64-bit target; arithmetic wraps like the target's pointer arithmetic does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Address(pub u64);

impl Address {
    /// Creates a new address from a raw value
    pub const fn new(value: u64) -> Self {
        Address(value)
    }

    /// Creates a null address (0x0)
    pub const fn null() -> Self {
        Address(0)
    }

    /// Checks if the address is null
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Adds an unsigned delta, wrapping on overflow
    pub const fn wrapping_add(&self, delta: u64) -> Self {
        Address(self.0.wrapping_add(delta))
    }

    /// Adds a signed offset, wrapping on overflow
    pub const fn offset(&self, offset: i64) -> Self {
        Address(self.0.wrapping_add(offset as u64))
    }

    /// Returns the raw value
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the raw value as a host-sized integer, if it fits
    pub fn as_usize(&self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl FromStr for Address {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        u64::from_str_radix(digits, 16)
            .map(Address::new)
            .map_err(|_| MemoryError::InvalidOffset(s.to_string()))
    }
}

/// Parses a single hex offset as written in offset files (`"1D8F4A0"`, `"0x10"`)
pub fn parse_hex(s: &str) -> MemoryResult<u64> {
    Address::from_str(s).map(|a| a.as_u64())
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

impl fmt::UpperHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Address::new(value)
    }
}

impl From<usize> for Address {
    fn from(value: usize) -> Self {
        Address::new(value as u64)
    }
}
