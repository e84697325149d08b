//! Settings key → operation table
//!
//! Every top-level settings key resolves to exactly one [`Operation`]
//! through a static table. Keys missing from the table are unrecognized.

use crate::items::ResourceKind;

/// Operation registered for one settings key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// One provider call setting a zone-level value
    Scalar(&'static str),
    /// Collection reconciliation of one resource kind
    Collection(ResourceKind),
}

/// Registered settings, in documentation order
pub static OPERATIONS: &[(&str, Operation)] = &[
    // SSL/TLS
    ("ssl", Operation::Scalar("ssl")),
    ("always_use_https", Operation::Scalar("always_use_https")),
    ("min_tls_version", Operation::Scalar("min_tls_version")),
    ("tls_1_3", Operation::Scalar("tls_1_3")),
    ("automatic_https_rewrites", Operation::Scalar("automatic_https_rewrites")),
    ("opportunistic_encryption", Operation::Scalar("opportunistic_encryption")),
    // Speed
    ("brotli", Operation::Scalar("brotli")),
    ("early_hints", Operation::Scalar("early_hints")),
    ("http2", Operation::Scalar("http2")),
    ("http3", Operation::Scalar("http3")),
    ("0rtt", Operation::Scalar("0rtt")),
    ("rocket_loader", Operation::Scalar("rocket_loader")),
    // Network
    ("ipv6", Operation::Scalar("ipv6")),
    ("websockets", Operation::Scalar("websockets")),
    ("opportunistic_onion", Operation::Scalar("opportunistic_onion")),
    // Caching
    ("cache_level", Operation::Scalar("cache_level")),
    ("browser_cache_ttl", Operation::Scalar("browser_cache_ttl")),
    ("development_mode", Operation::Scalar("development_mode")),
    ("always_online", Operation::Scalar("always_online")),
    ("tiered_caching", Operation::Scalar("tiered_caching")),
    // Security
    ("security_level", Operation::Scalar("security_level")),
    ("challenge_ttl", Operation::Scalar("challenge_ttl")),
    ("browser_check", Operation::Scalar("browser_check")),
    ("email_obfuscation", Operation::Scalar("email_obfuscation")),
    ("hotlink_protection", Operation::Scalar("hotlink_protection")),
    // Collections
    ("dns_records", Operation::Collection(ResourceKind::DnsRecords)),
    ("firewall_rules", Operation::Collection(ResourceKind::FirewallRules)),
    ("redirect_rules", Operation::Collection(ResourceKind::RedirectRules)),
    ("worker_routes", Operation::Collection(ResourceKind::WorkerRoutes)),
    ("page_rules", Operation::Collection(ResourceKind::PageRules)),
];

/// Resolve a settings key to its operation
pub fn lookup(key: &str) -> Option<Operation> {
    OPERATIONS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, operation)| *operation)
}
