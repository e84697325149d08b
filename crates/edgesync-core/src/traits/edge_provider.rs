// # Edge Provider Trait
//
// Defines the capability surface the reconciler and the dispatcher consume:
// fetch / create / update / delete per resource kind, scalar setters, and
// lazy ruleset creation.
//
// ## Implementations
//
// - Cloudflare: `edgesync-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use edgesync_core::{EdgeProvider, ResourceKind};
//
// async fn show(provider: &dyn EdgeProvider, zone: &ZoneContext) -> edgesync_core::Result<()> {
//     let current = provider.fetch_collection(zone, ResourceKind::DnsRecords).await?;
//     println!("{} records", current.items.len());
//     Ok(())
// }
// ```

use crate::error::Result;
use crate::items::{RemoteCollection, ResourceKind};
use crate::zone::ZoneContext;
use async_trait::async_trait;
use serde_json::Value;

/// Trait for edge provider implementations
///
/// Each method performs exactly one authenticated request and returns
/// either the parsed result or a typed failure carrying the provider's raw
/// error payload.
///
/// # Thread Safety
///
/// Implementations must be thread-safe: worker-route deletes and creates
/// are issued concurrently against the same provider.
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Parse provider-specific responses
/// - ✅ Return success or failure (the caller isolates failures)
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (no retry policy exists; a failed call is final)
/// - ❌ Decide whether an item needs creating or updating (owned by the reconciler)
/// - ❌ Cache remote state between calls
/// - ❌ Sleep for pacing (owned by [`ZoneContext::pace`])
#[async_trait]
pub trait EdgeProvider: Send + Sync {
    /// Fetch the current collection of `kind` for a zone
    ///
    /// For ruleset-backed kinds the result carries the ruleset id. When the
    /// ruleset does not exist, implementations return `Error::NotFound`.
    async fn fetch_collection(
        &self,
        zone: &ZoneContext,
        kind: ResourceKind,
    ) -> Result<RemoteCollection>;

    /// Create one item and return the provider's representation of it
    async fn create_item(
        &self,
        zone: &ZoneContext,
        kind: ResourceKind,
        container_id: Option<&str>,
        payload: &Value,
    ) -> Result<Value>;

    /// Update one existing item by id and return the provider's representation of it
    async fn update_item(
        &self,
        zone: &ZoneContext,
        kind: ResourceKind,
        container_id: Option<&str>,
        item_id: &str,
        payload: &Value,
    ) -> Result<Value>;

    /// Delete one item by id
    async fn delete_item(&self, zone: &ZoneContext, kind: ResourceKind, item_id: &str)
    -> Result<()>;

    /// Set one scalar zone setting
    async fn set_scalar(&self, zone: &ZoneContext, setting: &str, value: &Value) -> Result<()>;

    /// Create an empty ruleset container for `kind` and return its id
    async fn create_container(&self, zone: &ZoneContext, kind: ResourceKind) -> Result<String>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
