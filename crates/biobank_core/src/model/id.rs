//! Identifier strategy for generated keys.
//!
//! # Responsibility
//! - Produce globally unique identifiers at record construction time.
//! - Keep generation pluggable so imports and tests can supply their own.
//!
//! # Invariants
//! - A generator never returns the same identifier twice.
//! - Storage never assigns identifiers; records arrive with their key set.

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Source of identifiers for entities with generated keys.
pub trait IdGenerator {
    fn next_id(&self) -> Uuid;
}

/// Random (version 4) UUIDs. Default strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Deterministic identifiers for reproducible imports and fixtures.
///
/// Values are `prefix << 64 | counter`, starting at counter `1`.
#[derive(Debug, Default)]
pub struct SequentialIds {
    prefix: u64,
    counter: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: u64) -> Self {
        Self {
            prefix,
            counter: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> Uuid {
        let next = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        Uuid::from_u128((u128::from(self.prefix) << 64) | u128::from(next))
    }
}

impl<G: IdGenerator + ?Sized> IdGenerator for &G {
    fn next_id(&self) -> Uuid {
        (**self).next_id()
    }
}

/// Generates an identifier with the default strategy.
pub fn generate_id() -> Uuid {
    RandomIds.next_id()
}
