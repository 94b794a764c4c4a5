//! Response caching subsystem.
//!
//! # Data Flow
//! ```text
//! (tenant, query)
//!     → key.rs (normalize query, hash it, prefix tenant)
//!     → store.rs (LRU order + TTL check under one lock)
//!     → Hit(payload) | Miss
//!
//! Document ingestion for a tenant:
//!     → store.rs invalidate_tenant (drop every key with that prefix)
//! ```
//!
//! # Design Decisions
//! - Tenant boundary is never hashed away
//! - Cache faults degrade to a miss; the caller can always recompute

pub mod key;
pub mod store;

pub use key::{normalize_query, CacheKey};
pub use store::{CacheStats, ResponseCache};
