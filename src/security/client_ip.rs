//! Client IP resolution behind proxy chains.
//!
//! # Responsibilities
//! - Parse the trusted-proxy list once at startup
//! - Decide which address is "the client" for limiting and auditing
//!
//! # Design Decisions
//! - A forwarded-for header is only honoured when the direct peer is trusted
//! - The header is walked right-to-left: the first hop outside the trust
//!   boundary is the client
//! - Anything that fails to parse is untrusted, never trusted

use std::net::IpAddr;

use ipnet::{IpNet, Ipv4Net, Ipv6Net};

/// Returned when neither a peer address nor a forwarded-for entry exists.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Which network hops are allowed to rewrite `X-Forwarded-For`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Every hop is trusted (`"*"`). Development only.
    TrustAll,
    /// Only hops inside these networks are trusted.
    Networks(Vec<IpNet>),
}

impl TrustPolicy {
    /// Parse `"*"` or a comma-separated list of IPs and CIDR ranges.
    ///
    /// Bare addresses become host networks (/32 or /128). Entries that parse
    /// as neither are skipped; config validation rejects them before startup.
    pub fn parse(list: &str) -> Self {
        if list.trim() == "*" {
            return Self::TrustAll;
        }

        let networks = list
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .filter_map(|entry| match parse_trusted_entry(entry) {
                Some(net) => Some(net),
                None => {
                    tracing::warn!(entry = %entry, "Ignoring unparseable trusted proxy entry");
                    None
                }
            })
            .collect();

        Self::Networks(networks)
    }

    /// Whether `addr` is a trusted hop. Malformed literals are never trusted.
    pub fn is_trusted(&self, addr: &str) -> bool {
        match self {
            Self::TrustAll => true,
            Self::Networks(networks) => match addr.trim().parse::<IpAddr>() {
                Ok(ip) => networks.iter().any(|net| net.contains(&ip)),
                Err(_) => false,
            },
        }
    }

    pub fn is_trusted_ip(&self, ip: IpAddr) -> bool {
        match self {
            Self::TrustAll => true,
            Self::Networks(networks) => networks.iter().any(|net| net.contains(&ip)),
        }
    }

    /// Whether the direct peer may assert identity headers such as
    /// `X-User-Id` and `X-Tenant-Id`. A missing peer only passes under `*`.
    pub fn vouches_for(&self, peer: Option<IpAddr>) -> bool {
        match (self, peer) {
            (Self::TrustAll, _) => true,
            (_, Some(ip)) => self.is_trusted_ip(ip),
            (_, None) => false,
        }
    }
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self::parse("127.0.0.1")
    }
}

/// Parse one trusted-proxy entry as a CIDR range or a single address.
pub fn parse_trusted_entry(entry: &str) -> Option<IpNet> {
    if let Ok(net) = entry.parse::<IpNet>() {
        return Some(net);
    }
    match entry.parse::<IpAddr>().ok()? {
        IpAddr::V4(v4) => Ipv4Net::new(v4, 32).ok().map(IpNet::V4),
        IpAddr::V6(v6) => Ipv6Net::new(v6, 128).ok().map(IpNet::V6),
    }
}

/// Compute the address to treat as the client.
///
/// `forwarded_for` is the raw `X-Forwarded-For` value, oldest hop first.
pub fn resolve(peer: Option<IpAddr>, forwarded_for: Option<&str>, policy: &TrustPolicy) -> String {
    let hops: Vec<&str> = forwarded_for
        .map(|header| {
            header
                .split(',')
                .map(str::trim)
                .filter(|hop| !hop.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let peer_or_unknown = || {
        peer.map(|ip| ip.to_string())
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
    };

    let Some(&oldest) = hops.first() else {
        return peer_or_unknown();
    };

    if matches!(policy, TrustPolicy::TrustAll) {
        return oldest.to_string();
    }

    // An untrusted peer may have forged the whole header.
    if let Some(ip) = peer {
        if !policy.is_trusted_ip(ip) {
            return ip.to_string();
        }
    }

    for hop in hops.iter().rev() {
        if !policy.is_trusted(hop) {
            if hop.parse::<IpAddr>().is_err() {
                tracing::warn!(
                    hop = %hop,
                    "Malformed forwarded-for entry ended the trust walk"
                );
            }
            return (*hop).to_string();
        }
    }

    oldest.to_string()
}
