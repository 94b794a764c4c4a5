//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, timeout, body limit)
//!     → middleware/identity.rs (resolve client IP, rate key)
//!     → middleware/audit.rs (audit event for sensitive paths)
//!     → middleware/rate_limit.rs (admit or 429)
//!     → query.rs (cache or answer service)
//!     → Send to client
//! ```

pub mod middleware;
pub mod query;
pub mod server;

pub use server::{build_router, AppState, HttpServer};
