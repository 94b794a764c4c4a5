//! Cache key derivation.

use std::fmt;

use sha2::{Digest, Sha256};

/// Tenant-scoped key: `"<tenant_id>:<hex sha256 of normalized query>"`.
///
/// Only the query is hashed. The tenant stays readable so invalidation can
/// select a tenant's entries without a second index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(tenant_id: &str, query: &str) -> Self {
        let digest = Sha256::digest(normalize_query(query).as_bytes());
        Self(format!("{}:{}", tenant_id, hex::encode(digest)))
    }

    /// The tenant this key was derived from.
    ///
    /// Split on the last `:` since hex digests never contain one.
    pub fn tenant(&self) -> &str {
        self.0.rsplit_once(':').map(|(tenant, _)| tenant).unwrap_or("")
    }

    pub fn belongs_to(&self, tenant_id: &str) -> bool {
        self.tenant() == tenant_id
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trim and case-fold a query.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}
