//! Actor addresses
//!
//! An [`Address`] is the opaque, globally-unique identity of one actor. Two
//! factories exist: a time-ordered 128-bit identifier (the default used by
//! the stage) and a monotonically-incremented integer (useful in tests where
//! readable, ordered addresses help). Both are interchangeable behind the
//! same value type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

static NEXT_SEQUENTIAL: AtomicU64 = AtomicU64::new(1);

/// Opaque, globally-unique actor identifier
///
/// Equality and hashing are strictly by value. An address is created by the
/// stage at actor birth and persists until the directory removes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(AddressRepr);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
enum AddressRepr {
    /// Time-ordered 128-bit identifier (UUID v7)
    TimeOrdered(Uuid),
    /// Monotonic counter, process-local
    Sequential(u64),
}

impl Address {
    /// New time-ordered address (default factory)
    pub fn new() -> Self {
        Address(AddressRepr::TimeOrdered(Uuid::now_v7()))
    }

    /// New sequential address from the process-wide counter
    pub fn sequential() -> Self {
        Address(AddressRepr::Sequential(
            NEXT_SEQUENTIAL.fetch_add(1, Ordering::Relaxed),
        ))
    }

    /// Stable string projection, used as the directory key
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl Default for Address {
    fn default() -> Self {
        Address::new()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            AddressRepr::TimeOrdered(id) => write!(f, "{id}"),
            AddressRepr::Sequential(n) => write!(f, "#{n}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_addresses_are_unique() {
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(Address::new()));
        }
    }

    #[test]
    fn test_sequential_addresses_are_ordered() {
        let a = Address::sequential();
        let b = Address::sequential();
        assert!(a < b);
        assert_ne!(a, b);
    }

    #[test]
    fn test_equality_is_by_value() {
        let a = Address::sequential();
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_display_projection() {
        let a = Address::sequential();
        assert!(a.to_string().starts_with('#'));
        let t = Address::new();
        assert_eq!(t.to_string().len(), 36);
    }
}
