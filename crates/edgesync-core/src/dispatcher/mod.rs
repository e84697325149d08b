//! Setting dispatcher
//!
//! Applies every top-level key of one zone's [`SettingsDocument`], in
//! document order. Scalar keys become a single provider call; collection
//! keys run the [`Reconciler`].
//!
//! Failures are caught per key: an unrecognized key, a malformed value, a
//! failed provider call or a failed collection fetch is logged and recorded
//! in the [`ZoneReport`], and the next key is still applied.

pub mod operations;

use crate::error::Error;
use crate::items::{ManagedItem, ResourceKind};
use crate::reconciler::{ItemAction, ItemOutcome, Reconciler};
use crate::template::SettingsDocument;
use crate::traits::EdgeProvider;
use crate::zone::ZoneContext;
use operations::Operation;
use serde_json::Value;
use tracing::{debug, error, info};

/// Outcome of one settings key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingOutcome {
    /// Scalar setting applied
    Applied,
    /// Collection reconciled; per-item outcomes inside
    Reconciled(Vec<ItemOutcome>),
    /// The setting could not be applied
    Failed(String),
    /// No operation is registered for the key
    Unrecognized,
}

/// Report for one settings key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingReport {
    /// Settings key
    pub key: String,
    /// What happened
    pub outcome: SettingOutcome,
}

impl SettingReport {
    /// Number of failures under this key (the key itself, or its items)
    pub fn failure_count(&self) -> usize {
        match &self.outcome {
            SettingOutcome::Applied => 0,
            SettingOutcome::Reconciled(items) => items.iter().filter(|i| i.is_failure()).count(),
            SettingOutcome::Failed(_) | SettingOutcome::Unrecognized => 1,
        }
    }
}

/// Report for one zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneReport {
    /// Domain name
    pub domain: String,
    /// One report per settings key, in document order
    pub settings: Vec<SettingReport>,
}

impl ZoneReport {
    /// Total failures in this zone
    pub fn failure_count(&self) -> usize {
        self.settings.iter().map(SettingReport::failure_count).sum()
    }

    /// Report for one key
    pub fn setting(&self, key: &str) -> Option<&SettingReport> {
        self.settings.iter().find(|s| s.key == key)
    }
}

/// Dispatches settings keys to provider operations
pub struct Dispatcher<'a> {
    provider: &'a dyn EdgeProvider,
}

impl<'a> Dispatcher<'a> {
    /// Create a dispatcher over a provider
    pub fn new(provider: &'a dyn EdgeProvider) -> Self {
        Self { provider }
    }

    /// Apply every key of `settings` to `zone`
    ///
    /// Never fails: every key is attempted and its outcome reported.
    pub async fn apply_all(&self, zone: &ZoneContext, settings: &SettingsDocument) -> ZoneReport {
        info!(
            "Applying {} setting(s) to {} (zone {})",
            settings.len(),
            zone.domain(),
            zone.zone_id()
        );

        let mut reports = Vec::with_capacity(settings.len());

        for (key, value) in settings.iter() {
            let outcome = match operations::lookup(key) {
                Some(operation) => self.apply_one(zone, key, operation, value).await,
                None => {
                    error!("{}: {}", zone.domain(), Error::unknown_setting(key.as_str()));
                    SettingOutcome::Unrecognized
                }
            };

            reports.push(SettingReport {
                key: key.clone(),
                outcome,
            });
        }

        let report = ZoneReport {
            domain: zone.domain().to_string(),
            settings: reports,
        };

        info!(
            "Finished {}: {} setting(s), {} failure(s)",
            zone.domain(),
            report.settings.len(),
            report.failure_count()
        );

        report
    }

    async fn apply_one(
        &self,
        zone: &ZoneContext,
        key: &str,
        operation: Operation,
        value: &Value,
    ) -> SettingOutcome {
        match operation {
            Operation::Scalar(setting) => self.apply_scalar(zone, setting, value).await,
            Operation::Collection(kind) => self.apply_collection(zone, key, kind, value).await,
        }
    }

    async fn apply_scalar(&self, zone: &ZoneContext, setting: &str, value: &Value) -> SettingOutcome {
        zone.pace().await;

        match self.provider.set_scalar(zone, setting, value).await {
            Ok(()) => {
                info!("{}: set {} = {}", zone.domain(), setting, value);
                SettingOutcome::Applied
            }
            Err(e) => {
                error!(
                    "{}: failed to set {} = {}: {}",
                    zone.domain(),
                    setting,
                    value,
                    e
                );
                SettingOutcome::Failed(e.to_string())
            }
        }
    }

    async fn apply_collection(
        &self,
        zone: &ZoneContext,
        key: &str,
        kind: ResourceKind,
        value: &Value,
    ) -> SettingOutcome {
        let parsed = match ManagedItem::parse_each(kind, value) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!("{}: invalid `{}`: {} (value: {})", zone.domain(), key, e, value);
                return SettingOutcome::Failed(e.to_string());
            }
        };

        // Malformed elements are reported first; their siblings still run
        let mut rejected = Vec::new();
        let mut desired = Vec::with_capacity(parsed.len());
        for (index, (entry, item)) in value.as_array().into_iter().flatten().zip(parsed).enumerate() {
            match item {
                Ok(item) => desired.push(item),
                Err(e) => {
                    let item_key = ManagedItem::fallback_key(kind, index, entry);
                    error!(
                        "{}: invalid {} `{}`: {} (payload: {})",
                        zone.domain(),
                        kind,
                        item_key,
                        e,
                        entry
                    );
                    rejected.push(ItemOutcome {
                        key: item_key,
                        action: ItemAction::Failed {
                            reason: e.to_string(),
                        },
                    });
                }
            }
        }

        debug!("{}: {} desired {} item(s)", zone.domain(), desired.len(), kind);

        match Reconciler::new(self.provider, zone).reconcile(kind, &desired).await {
            Ok(outcomes) => {
                rejected.extend(outcomes);
                SettingOutcome::Reconciled(rejected)
            }
            Err(e) => {
                error!("{}: failed to reconcile `{}`: {}", zone.domain(), key, e);
                SettingOutcome::Failed(e.to_string())
            }
        }
    }
}
