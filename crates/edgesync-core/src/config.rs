//! Configuration types for the edgesync system
//!
//! This module defines the configuration document consumed by the
//! [`Runner`](crate::Runner): which domains to manage, how to authenticate,
//! and the settings template applied to every domain.

use crate::error::{Error, Result};
use crate::template::{DEFAULT_PLACEHOLDER, Template, is_plain_placeholder};
use crate::zone::{Credential, ZoneContext};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// Main edgesync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyConfig {
    /// Master switch; when false the run makes no provider calls
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Account-level credentials, used by domains without their own token
    #[serde(default)]
    pub account: AccountCredentials,

    /// Delay inserted before each sequential provider call (milliseconds)
    #[serde(default)]
    pub pacing_ms: u64,

    /// Token replaced by the domain name when instantiating the template
    #[serde(default = "default_placeholder")]
    pub placeholder: String,

    /// Managed domains, applied in this order
    #[serde(default)]
    pub domains: Vec<DomainConfig>,

    /// Settings template
    #[serde(default)]
    pub settings: Value,
}

impl ApplyConfig {
    /// Create a new configuration with defaults
    pub fn new(settings: Value) -> Self {
        Self {
            enabled: true,
            account: AccountCredentials::default(),
            pacing_ms: 0,
            placeholder: default_placeholder(),
            domains: Vec::new(),
            settings,
        }
    }

    /// Parse a configuration document from JSON text
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a configuration document from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    /// Add a managed domain
    pub fn with_domain(mut self, domain: DomainConfig) -> Self {
        self.domains.push(domain);
        self
    }

    /// Set the account-level credentials
    pub fn with_account(mut self, account: AccountCredentials) -> Self {
        self.account = account;
        self
    }

    /// Enable or disable the whole run
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Validate the run-level configuration
    ///
    /// Zone-level problems (missing zone id, missing credential) are not
    /// checked here; they fail only the affected zone at setup time. A
    /// disabled document is always valid: it never reaches the provider.
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.domains.is_empty() {
            return Err(Error::config("No domains configured"));
        }

        if !self.settings.is_object() {
            return Err(Error::config("settings must be an object"));
        }

        if self.placeholder.is_empty() {
            return Err(Error::config("placeholder cannot be empty"));
        }

        if !is_plain_placeholder(&self.placeholder) {
            return Err(Error::config(format!(
                "placeholder {:?} must not contain quotes, backslashes or control characters",
                self.placeholder
            )));
        }

        Ok(())
    }

    /// The settings template
    pub fn template(&self) -> Template {
        Template::with_placeholder(self.settings.clone(), self.placeholder.clone())
    }

    /// Configured pacing delay
    pub fn pacing(&self) -> Option<Duration> {
        (self.pacing_ms > 0).then(|| Duration::from_millis(self.pacing_ms))
    }

    /// Build the zone context for one domain
    ///
    /// # Errors
    ///
    /// - The zone id is missing or empty
    /// - No credential can be resolved
    pub fn zone_context(&self, domain: &DomainConfig) -> Result<ZoneContext> {
        let zone_id = domain
            .zone_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| Error::config(format!("zone id is missing for {}", domain.domain)))?;

        let credential = Credential::resolve(
            domain.credential_token.as_deref(),
            self.account.token.as_deref(),
            self.account.email.as_deref(),
            self.account.key.as_deref(),
        )?;

        Ok(ZoneContext::new(zone_id, domain.domain.clone(), credential)?.with_pacing(self.pacing()))
    }
}

/// Account-level credentials
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AccountCredentials {
    /// Account email (legacy API key auth)
    #[serde(default)]
    pub email: Option<String>,
    /// Global API key (legacy API key auth)
    #[serde(default)]
    pub key: Option<String>,
    /// Account-wide API token
    #[serde(default)]
    pub token: Option<String>,
}

impl std::fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("email", &self.email)
            .field("key", &self.key.as_ref().map(|_| "<REDACTED>"))
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

/// One managed domain
#[derive(Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Provider zone identifier
    #[serde(default)]
    pub zone_id: Option<String>,

    /// Domain name substituted into the template
    pub domain: String,

    /// Per-zone API token; overrides the account credentials
    #[serde(default)]
    pub credential_token: Option<String>,
}

impl DomainConfig {
    /// Create a domain configuration
    pub fn new(zone_id: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            zone_id: Some(zone_id.into()),
            domain: domain.into(),
            credential_token: None,
        }
    }

    /// Set a per-zone token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.credential_token = Some(token.into());
        self
    }
}

impl std::fmt::Debug for DomainConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainConfig")
            .field("zone_id", &self.zone_id)
            .field("domain", &self.domain)
            .field(
                "credential_token",
                &self.credential_token.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

fn default_enabled() -> bool {
    true
}

fn default_placeholder() -> String {
    DEFAULT_PLACEHOLDER.to_string()
}
