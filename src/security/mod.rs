//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client_ip.rs (who is the client behind the proxy chain)
//!     → rate_limit.rs (burst / minute / hour sliding windows)
//!     → Pass to cache and answer service
//! ```
//!
//! # Design Decisions
//! - Fail closed: a broken limiter rejects rather than admitting everything
//! - No trust in client input: forwarded headers only count from trusted peers

pub mod client_ip;
pub mod rate_limit;

pub use client_ip::{resolve, TrustPolicy};
pub use rate_limit::{Decision, Quota, RateKey, Rejection, SlidingWindowLimiter, Window};
