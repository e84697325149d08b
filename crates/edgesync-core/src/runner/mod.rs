//! Multi-zone runner
//!
//! The Runner is responsible for:
//! - Validating the configuration before any provider call
//! - Resolving each zone's credential and context
//! - Instantiating the settings template per domain
//! - Handing each zone to the [`Dispatcher`]
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ ApplyConfig  │
//! └──────────────┘
//!        │ validate()
//!        ▼
//! ┌──────────────┐   per domain, in order
//! │    Runner    │──────────────────────────┐
//! └──────────────┘                          │
//!        │                                  ▼
//!        │                        ┌──────────────────┐
//!        │                        │ zone setup       │  missing zone id / credential
//!        │                        │ + instantiate    │──► ZoneRun::SetupFailed
//!        │                        └──────────────────┘
//!        │                                  │
//!        ▼                                  ▼
//! ┌──────────────┐                ┌──────────────────┐
//! │ EdgeProvider │◄───────────────│   Dispatcher     │──► ZoneRun::Applied
//! └──────────────┘                └──────────────────┘
//! ```
//!
//! Zones are processed sequentially; nothing is shared between them.

use crate::config::ApplyConfig;
use crate::dispatcher::{Dispatcher, ZoneReport};
use crate::error::Result;
use crate::template::SettingsDocument;
use crate::traits::EdgeProvider;
use crate::zone::ZoneContext;
use tracing::{debug, error, info, warn};

/// Result of one zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneRun {
    /// Zone setup succeeded and the dispatcher ran
    Applied(ZoneReport),
    /// Zone setup failed; no provider call was made for this zone
    SetupFailed {
        /// Domain name
        domain: String,
        /// Why setup failed
        reason: String,
    },
}

impl ZoneRun {
    /// Domain this result belongs to
    pub fn domain(&self) -> &str {
        match self {
            ZoneRun::Applied(report) => &report.domain,
            ZoneRun::SetupFailed { domain, .. } => domain,
        }
    }

    /// Failures in this zone (a failed setup counts as one)
    pub fn failure_count(&self) -> usize {
        match self {
            ZoneRun::Applied(report) => report.failure_count(),
            ZoneRun::SetupFailed { .. } => 1,
        }
    }
}

/// Report of a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// One entry per processed zone, in configuration order
    pub zones: Vec<ZoneRun>,
}

impl RunReport {
    /// Total failures across every zone
    pub fn failure_count(&self) -> usize {
        self.zones.iter().map(ZoneRun::failure_count).sum()
    }

    /// Whether every zone, setting and item succeeded
    pub fn is_clean(&self) -> bool {
        self.failure_count() == 0
    }

    /// Result for one domain
    pub fn zone(&self, domain: &str) -> Option<&ZoneRun> {
        self.zones.iter().find(|z| z.domain() == domain)
    }
}

/// Applies the settings template to every configured zone
///
/// ## Lifecycle
///
/// 1. Create with [`Runner::new()`] (validates configuration)
/// 2. Optionally restrict with [`Runner::with_domain_filter()`]
/// 3. Call [`Runner::run()`]; each run is stateless and may be repeated
pub struct Runner {
    /// Provider used for every zone
    provider: Box<dyn EdgeProvider>,

    /// Validated configuration
    config: ApplyConfig,

    /// Only these domains are applied, when set
    domain_filter: Option<Vec<String>>,
}

impl Runner {
    /// Create a new runner
    ///
    /// # Returns
    ///
    /// - `Ok(Runner)`: configuration is valid
    /// - `Err(Error)`: run-level configuration error; nothing was called
    pub fn new(provider: Box<dyn EdgeProvider>, config: ApplyConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            provider,
            config,
            domain_filter: None,
        })
    }

    /// Restrict the run to the listed domains
    pub fn with_domain_filter(mut self, domains: Vec<String>) -> Self {
        for wanted in &domains {
            if !self.config.domains.iter().any(|d| &d.domain == wanted) {
                warn!("Domain filter names {} which is not configured", wanted);
            }
        }
        self.domain_filter = Some(domains);
        self
    }

    /// Apply the template to every selected zone
    ///
    /// Zone setup failures are logged and reported; they never stop the
    /// remaining zones. Per-setting and per-item failures stay inside the
    /// zone's report.
    pub async fn run(&self) -> RunReport {
        if !self.config.enabled {
            info!("Settings application is disabled, nothing to do");
            return RunReport::default();
        }

        let template = self.config.template();
        let dispatcher = Dispatcher::new(self.provider.as_ref());
        let mut report = RunReport::default();

        info!(
            "Applying settings to {} domain(s) via {}",
            self.config.domains.len(),
            self.provider.provider_name()
        );

        for domain in &self.config.domains {
            if !self.is_selected(&domain.domain) {
                debug!("Skipping {} (not in domain filter)", domain.domain);
                continue;
            }

            let setup = self
                .config
                .zone_context(domain)
                .and_then(|zone| Ok((template.instantiate(&domain.domain)?, zone)));

            let (settings, zone): (SettingsDocument, ZoneContext) = match setup {
                Ok(ready) => ready,
                Err(e) => {
                    error!("Zone setup failed for {}: {}", domain.domain, e);
                    report.zones.push(ZoneRun::SetupFailed {
                        domain: domain.domain.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            debug!(
                "Zone {} ready ({} credential)",
                zone.domain(),
                zone.credential().kind()
            );

            let zone_report = dispatcher.apply_all(&zone, &settings).await;
            report.zones.push(ZoneRun::Applied(zone_report));
        }

        info!(
            "Run complete: {} zone(s), {} failure(s)",
            report.zones.len(),
            report.failure_count()
        );

        report
    }

    fn is_selected(&self, domain: &str) -> bool {
        self.domain_filter
            .as_ref()
            .is_none_or(|filter| filter.iter().any(|d| d == domain))
    }
}
