//! Keyward Store - in-process implementation of the store boundary
//!
//! `MemoryStore` stands in for a single-threaded remote key-value store:
//! every primitive runs atomically per key and keys carry an optional expiry
//! evaluated against an injected [`LeaseClock`](keyward_common::LeaseClock).

mod memory;

pub use memory::{KeyTtl, MemoryStore};
