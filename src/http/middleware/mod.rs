//! Request middleware, outermost first:
//! identity → audit → rate limit → handler.

pub mod audit;
pub mod identity;
pub mod rate_limit;

pub use audit::audit_middleware;
pub use identity::identity_middleware;
pub use rate_limit::rate_limit_middleware;
