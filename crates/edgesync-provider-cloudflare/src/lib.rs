// # Cloudflare Edge Provider
//
// This crate implements `EdgeProvider` against the Cloudflare API v4.
//
// ## Implementation Status
//
// - ✅ One HTTP request per provider call (DNS listings follow pagination)
// - ✅ Full error propagation (the reconciler isolates failures per item)
// - ✅ HTTP timeout configured (30 seconds)
// - ✅ Status and envelope checking (2xx AND `success: true`)
// - ✅ Token and email + global key authentication, per zone
// - ✅ Dry-run mode for safe testing
// - ❌ NO retry logic (a failed call is final)
// - ❌ NO pacing (owned by `ZoneContext::pace`)
// - ❌ NO caching of remote state between calls
//
// ## Security Requirements
//
// - Credentials NEVER appear in logs or Debug output
// - Credentials come from the zone context, never from provider state
//
// ## API Reference
//
// - DNS records:     `/zones/:zone_id/dns_records[/:id]`
// - Ruleset phases:  `/zones/:zone_id/rulesets/phases/:phase/entrypoint`
// - Ruleset rules:   `/zones/:zone_id/rulesets/:ruleset_id/rules[/:id]`
// - Worker routes:   `/zones/:zone_id/workers/routes[/:id]`
// - Page rules:      `/zones/:zone_id/pagerules[/:id]`
// - Zone settings:   `/zones/:zone_id/settings/:name`
// - Tiered caching:  `/zones/:zone_id/argo/tiered_caching`

use async_trait::async_trait;
use edgesync_core::{
    Credential, EdgeProvider, Error, RemoteCollection, RemoteItem, ResourceKind, Result,
    ZoneContext,
};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size used when listing DNS records
const DNS_PAGE_SIZE: u32 = 100;

/// Id returned for mutations skipped in dry-run mode
pub const DRY_RUN_ID: &str = "dry-run";

const PROVIDER: &str = "cloudflare";

/// Response envelope shared by every Cloudflare API v4 endpoint
#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    errors: Vec<Value>,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    page: u32,
    #[serde(default)]
    total_pages: u32,
}

/// Cloudflare edge provider
///
/// # Trust Level: Untrusted
///
/// This provider is stateless and single-shot. Deciding what to create,
/// update or delete is owned by the reconciler.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests (collection fetches)
/// - Log every intended mutation with its method, URL and payload
/// - **NOT** send any mutation, and report it as a success
pub struct CloudflareProvider {
    /// API base URL (overridable for testing against a local server)
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip mutations
    dry_run: bool,
}

impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Errors
    ///
    /// Returns `Error::Http` if the HTTP client cannot be built.
    pub fn new(dry_run: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Create a new Cloudflare provider (production/live mode)
    pub fn new_live() -> Result<Self> {
        Self::new(false)
    }

    /// Create a new Cloudflare provider (dry-run mode)
    pub fn new_dry_run() -> Result<Self> {
        Self::new(true)
    }

    /// Use a different API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether mutations are skipped
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn zone_url(&self, zone_id: &str) -> String {
        format!("{}/zones/{}", self.base_url, zone_id)
    }

    /// URL of a plain (non-ruleset) collection
    fn collection_url(&self, zone_id: &str, kind: ResourceKind) -> Result<String> {
        let path = match kind {
            ResourceKind::DnsRecords => "dns_records",
            ResourceKind::WorkerRoutes => "workers/routes",
            ResourceKind::PageRules => "pagerules",
            ResourceKind::FirewallRules | ResourceKind::RedirectRules => {
                return Err(Error::invalid_input(format!(
                    "{} live in a ruleset, not a plain collection",
                    kind
                )));
            }
        };
        Ok(format!("{}/{}", self.zone_url(zone_id), path))
    }

    fn entrypoint_url(&self, zone_id: &str, phase: &str) -> String {
        format!(
            "{}/rulesets/phases/{}/entrypoint",
            self.zone_url(zone_id),
            phase
        )
    }

    fn rules_url(&self, zone_id: &str, ruleset_id: &str) -> String {
        format!("{}/rulesets/{}/rules", self.zone_url(zone_id), ruleset_id)
    }

    fn scalar_url(&self, zone_id: &str, setting: &str) -> String {
        match setting {
            "tiered_caching" => format!("{}/argo/tiered_caching", self.zone_url(zone_id)),
            _ => format!("{}/settings/{}", self.zone_url(zone_id), setting),
        }
    }

    /// Build an authenticated request for a zone
    fn request(&self, zone: &ZoneContext, method: Method, url: &str) -> reqwest::RequestBuilder {
        let request = self
            .client
            .request(method, url)
            .header("Content-Type", "application/json");

        match zone.credential() {
            Credential::Token(token) => request.bearer_auth(token),
            Credential::ApiKey { email, key } => request
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", key),
        }
    }

    /// Send a request and return the checked envelope
    async fn send(&self, what: &str, request: reqwest::RequestBuilder) -> Result<Envelope> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::http(format!("{}: request failed: {}", what, e)))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        if !(200..300).contains(&status) {
            return Err(status_error(what, status, &text));
        }

        parse_envelope(what, &text)
    }

    /// Log a mutation instead of sending it
    fn skip_mutation(&self, method: &Method, url: &str, payload: Option<&Value>) {
        match payload {
            Some(payload) => tracing::info!(
                "[DRY-RUN] Would send {} {} with payload: {}",
                method,
                url,
                payload
            ),
            None => tracing::info!("[DRY-RUN] Would send {} {}", method, url),
        }
    }

    /// Send a mutation, or log it in dry-run mode
    ///
    /// Returns `None` when the mutation was skipped.
    async fn mutate(
        &self,
        zone: &ZoneContext,
        what: &str,
        method: Method,
        url: &str,
        payload: Option<&Value>,
    ) -> Result<Option<Value>> {
        if self.dry_run {
            self.skip_mutation(&method, url, payload);
            return Ok(None);
        }

        let mut request = self.request(zone, method, url);
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        Ok(Some(self.send(what, request).await?.result))
    }

    async fn fetch_dns_records(&self, zone: &ZoneContext) -> Result<RemoteCollection> {
        let url = self.collection_url(zone.zone_id(), ResourceKind::DnsRecords)?;
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            let request = self
                .request(zone, Method::GET, &url)
                .query(&[("page", page), ("per_page", DNS_PAGE_SIZE)]);
            let envelope = self.send("list DNS records", request).await?;

            items.extend(remote_items("DNS record", envelope.result)?);

            match envelope.result_info {
                Some(info) if info.page.max(page) < info.total_pages => page += 1,
                _ => break,
            }
        }

        tracing::debug!("Fetched {} DNS record(s) for {}", items.len(), zone.domain());
        Ok(RemoteCollection::new(items))
    }

    async fn fetch_ruleset(&self, zone: &ZoneContext, kind: ResourceKind) -> Result<RemoteCollection> {
        let phase = ruleset_phase(kind)?;
        let url = self.entrypoint_url(zone.zone_id(), phase);
        let request = self.request(zone, Method::GET, &url);

        let envelope = self
            .send(&format!("fetch {} ruleset", phase), request)
            .await?;

        let ruleset_id = envelope
            .result
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string);
        let rules = envelope
            .result
            .get("rules")
            .cloned()
            .unwrap_or_else(|| json!([]));

        Ok(RemoteCollection {
            container_id: ruleset_id,
            items: remote_items("rule", rules)?,
        })
    }
}

#[async_trait]
impl EdgeProvider for CloudflareProvider {
    /// Fetch the current collection of `kind`
    ///
    /// # API Calls
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?page=N&per_page=100
    /// GET /zones/:zone_id/rulesets/phases/:phase/entrypoint
    /// GET /zones/:zone_id/workers/routes
    /// GET /zones/:zone_id/pagerules
    /// ```
    ///
    /// A 404 on a phase entrypoint is `Error::NotFound`: the zone has no
    /// ruleset for that phase yet.
    async fn fetch_collection(
        &self,
        zone: &ZoneContext,
        kind: ResourceKind,
    ) -> Result<RemoteCollection> {
        match kind {
            ResourceKind::DnsRecords => self.fetch_dns_records(zone).await,
            ResourceKind::FirewallRules | ResourceKind::RedirectRules => {
                self.fetch_ruleset(zone, kind).await
            }
            ResourceKind::WorkerRoutes | ResourceKind::PageRules => {
                let url = self.collection_url(zone.zone_id(), kind)?;
                let request = self.request(zone, Method::GET, &url);
                let envelope = self.send(&format!("list {}", kind), request).await?;
                Ok(RemoteCollection::new(remote_items(kind.setting_key(), envelope.result)?))
            }
        }
    }

    async fn create_item(
        &self,
        zone: &ZoneContext,
        kind: ResourceKind,
        container_id: Option<&str>,
        payload: &Value,
    ) -> Result<Value> {
        let url = match kind {
            ResourceKind::FirewallRules | ResourceKind::RedirectRules => {
                let ruleset_id = container_id.ok_or_else(|| {
                    Error::invalid_input(format!("cannot create {} without a ruleset id", kind))
                })?;
                self.rules_url(zone.zone_id(), ruleset_id)
            }
            _ => self.collection_url(zone.zone_id(), kind)?,
        };

        let what = format!("create {}", kind);
        match self.mutate(zone, &what, Method::POST, &url, Some(payload)).await? {
            // Rule creation answers with the whole ruleset; the new rule is last
            Some(result) if kind.is_ruleset() => result
                .get("rules")
                .and_then(Value::as_array)
                .and_then(|rules| rules.last())
                .cloned()
                .ok_or_else(|| Error::provider(PROVIDER, format!("{}: ruleset has no rules", what))),
            Some(result) => Ok(result),
            None => Ok(with_id(payload, DRY_RUN_ID)),
        }
    }

    async fn update_item(
        &self,
        zone: &ZoneContext,
        kind: ResourceKind,
        container_id: Option<&str>,
        item_id: &str,
        payload: &Value,
    ) -> Result<Value> {
        let (method, url) = match kind {
            ResourceKind::FirewallRules | ResourceKind::RedirectRules => {
                let ruleset_id = container_id.ok_or_else(|| {
                    Error::invalid_input(format!("cannot update {} without a ruleset id", kind))
                })?;
                (
                    Method::PATCH,
                    format!("{}/{}", self.rules_url(zone.zone_id(), ruleset_id), item_id),
                )
            }
            _ => (
                Method::PUT,
                format!("{}/{}", self.collection_url(zone.zone_id(), kind)?, item_id),
            ),
        };

        let what = format!("update {} {}", kind, item_id);
        match self.mutate(zone, &what, method, &url, Some(payload)).await? {
            Some(result) if kind.is_ruleset() => result
                .get("rules")
                .and_then(Value::as_array)
                .and_then(|rules| {
                    rules
                        .iter()
                        .find(|rule| rule.get("id").and_then(Value::as_str) == Some(item_id))
                })
                .cloned()
                .ok_or_else(|| {
                    Error::provider(PROVIDER, format!("{}: rule missing from ruleset", what))
                }),
            Some(result) => Ok(result),
            None => Ok(with_id(payload, item_id)),
        }
    }

    /// Delete one item
    ///
    /// Rules are only ever created or updated, so ruleset-backed kinds are
    /// rejected here.
    async fn delete_item(
        &self,
        zone: &ZoneContext,
        kind: ResourceKind,
        item_id: &str,
    ) -> Result<()> {
        let url = format!("{}/{}", self.collection_url(zone.zone_id(), kind)?, item_id);
        self.mutate(zone, &format!("delete {} {}", kind, item_id), Method::DELETE, &url, None)
            .await?;
        Ok(())
    }

    /// Set one scalar zone setting
    ///
    /// # API Call
    ///
    /// ```http
    /// PATCH /zones/:zone_id/settings/:name
    /// { "value": <value> }
    /// ```
    ///
    /// `tiered_caching` is sent to `/zones/:zone_id/argo/tiered_caching`.
    async fn set_scalar(&self, zone: &ZoneContext, setting: &str, value: &Value) -> Result<()> {
        let url = self.scalar_url(zone.zone_id(), setting);
        let payload = json!({ "value": value });
        self.mutate(zone, &format!("set {}", setting), Method::PATCH, &url, Some(&payload))
            .await?;
        Ok(())
    }

    /// Create the zone's entrypoint ruleset for `kind`
    ///
    /// # API Call
    ///
    /// ```http
    /// POST /zones/:zone_id/rulesets
    /// { "name": "...", "kind": "zone", "phase": "<phase>", "rules": [] }
    /// ```
    async fn create_container(&self, zone: &ZoneContext, kind: ResourceKind) -> Result<String> {
        let phase = ruleset_phase(kind)?;
        let url = format!("{}/rulesets", self.zone_url(zone.zone_id()));
        let payload = json!({
            "name": format!("{} entrypoint", phase),
            "kind": "zone",
            "phase": phase,
            "rules": [],
        });

        let what = format!("create {} ruleset", phase);
        match self.mutate(zone, &what, Method::POST, &url, Some(&payload)).await? {
            Some(result) => result
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| Error::provider(PROVIDER, format!("{}: response has no id", what))),
            None => Ok(DRY_RUN_ID.to_string()),
        }
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Ruleset phase holding `kind`
fn ruleset_phase(kind: ResourceKind) -> Result<&'static str> {
    match kind {
        ResourceKind::FirewallRules => Ok("http_request_firewall_custom"),
        ResourceKind::RedirectRules => Ok("http_request_dynamic_redirect"),
        _ => Err(Error::invalid_input(format!("{} are not ruleset-backed", kind))),
    }
}

/// Map a non-2xx status to an error carrying the raw body
fn status_error(what: &str, status: u16, body: &str) -> Error {
    match status {
        401 | 403 => Error::auth(format!(
            "{}: invalid credential or insufficient permissions (status {}): {}",
            what, status, body
        )),
        404 => Error::not_found(format!("{} (status 404): {}", what, body)),
        429 => Error::rate_limited(format!("{} (status 429): {}", what, body)),
        500..=599 => Error::provider(
            PROVIDER,
            format!("{}: server error (transient) {}: {}", what, status, body),
        ),
        _ => Error::provider(PROVIDER, format!("{}: status {}: {}", what, status, body)),
    }
}

/// Parse a 2xx body and require `success: true`
fn parse_envelope(what: &str, text: &str) -> Result<Envelope> {
    let envelope: Envelope = serde_json::from_str(text)
        .map_err(|e| Error::provider(PROVIDER, format!("{}: failed to parse response: {}", what, e)))?;

    if !envelope.success {
        return Err(Error::provider(
            PROVIDER,
            format!("{}: request unsuccessful: {}", what, Value::Array(envelope.errors)),
        ));
    }

    Ok(envelope)
}

fn remote_items(what: &str, result: Value) -> Result<Vec<RemoteItem>> {
    match result {
        Value::Array(items) => items.into_iter().map(RemoteItem::from_value).collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(Error::provider(
            PROVIDER,
            format!("Invalid response format: {} list is not an array: {}", what, other),
        )),
    }
}

fn with_id(payload: &Value, id: &str) -> Value {
    let mut body = payload.clone();
    if let Some(object) = body.as_object_mut() {
        object.insert("id".to_string(), json!(id));
    }
    body
}
