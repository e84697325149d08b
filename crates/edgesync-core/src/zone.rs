//! Zone context and credentials
//!
//! A [`ZoneContext`] is the explicit handle threaded through every provider
//! call: which zone, which domain, which credential and how fast to go.

use crate::error::{Error, Result};
use std::time::Duration;

/// Credential used to authenticate provider calls for a zone
///
/// Exactly one form is ever set. The Debug implementation never exposes
/// the secret values.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Legacy account email + global API key
    ApiKey {
        /// Account email
        email: String,
        /// Global API key
        key: String,
    },
    /// Scoped API token (bearer)
    Token(String),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::ApiKey { email, .. } => f
                .debug_struct("ApiKey")
                .field("email", email)
                .field("key", &"<REDACTED>")
                .finish(),
            Credential::Token(_) => f.debug_tuple("Token").field(&"<REDACTED>").finish(),
        }
    }
}

impl Credential {
    /// Resolve the credential for one zone
    ///
    /// A per-zone token wins over the account token, which wins over the
    /// account email + key pair. Empty strings count as absent.
    pub fn resolve(
        zone_token: Option<&str>,
        account_token: Option<&str>,
        email: Option<&str>,
        key: Option<&str>,
    ) -> Result<Self> {
        fn present(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|s| !s.is_empty())
        }

        if let Some(token) = present(zone_token).or(present(account_token)) {
            return Ok(Credential::Token(token.to_string()));
        }

        match (present(email), present(key)) {
            (Some(email), Some(key)) => Ok(Credential::ApiKey {
                email: email.to_string(),
                key: key.to_string(),
            }),
            (Some(_), None) => Err(Error::credential("account email is set but API key is missing")),
            (None, Some(_)) => Err(Error::credential("API key is set but account email is missing")),
            (None, None) => Err(Error::credential(
                "no credential: set a zone token, an account token, or account email + key",
            )),
        }
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::ApiKey { .. } => "api-key",
            Credential::Token(_) => "token",
        }
    }
}

/// Per-zone context passed to the reconciler, the dispatcher and the provider
#[derive(Debug, Clone)]
pub struct ZoneContext {
    zone_id: String,
    domain: String,
    credential: Credential,
    pacing: Option<Duration>,
}

impl ZoneContext {
    /// Create a zone context
    ///
    /// Fails with a configuration error when the zone id or domain is empty.
    pub fn new(
        zone_id: impl Into<String>,
        domain: impl Into<String>,
        credential: Credential,
    ) -> Result<Self> {
        let zone_id = zone_id.into();
        let domain = domain.into();

        if zone_id.trim().is_empty() {
            return Err(Error::config(format!("zone id is missing for {}", domain)));
        }
        if domain.trim().is_empty() {
            return Err(Error::config("domain name cannot be empty"));
        }

        Ok(Self {
            zone_id,
            domain,
            credential,
            pacing: None,
        })
    }

    /// Insert a delay before each sequential provider call
    pub fn with_pacing(mut self, pacing: Option<Duration>) -> Self {
        self.pacing = pacing.filter(|d| !d.is_zero());
        self
    }

    /// Provider zone identifier
    pub fn zone_id(&self) -> &str {
        &self.zone_id
    }

    /// Domain name managed by this zone
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Credential for this zone
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Configured inter-call delay
    pub fn pacing(&self) -> Option<Duration> {
        self.pacing
    }

    /// Wait out the configured inter-call delay, if any
    pub async fn pace(&self) {
        if let Some(delay) = self.pacing {
            tokio::time::sleep(delay).await;
        }
    }
}
