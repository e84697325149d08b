//! Collection reconciler
//!
//! Synchronizes a desired, ordered sequence of [`ManagedItem`]s of one kind
//! against the provider's current collection for a zone.
//!
//! ## Strategies
//!
//! ```text
//! create-or-update (DNS, firewall, redirect, page rules)
//!
//!   fetch current ──► for each desired item, in order:
//!                         match by natural key?
//!                           yes ─► update(existing id, payload)
//!                           no  ─► create(payload)
//!                         failure ─► logged, recorded, loop continues
//!
//! replace-all (worker routes)
//!
//!   fetch current ──► delete every existing route   (concurrent, all settle)
//!                 ──► create every desired route    (concurrent, all settle)
//! ```
//!
//! Nothing absent from the desired set is ever deleted, except under
//! replace-all.

use crate::error::{Error, Result};
use crate::items::{ManagedItem, RemoteCollection, RemoteItem, ResourceKind};
use crate::traits::EdgeProvider;
use crate::zone::ZoneContext;
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, error, info};

/// What happened to one item during reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemAction {
    /// Item did not exist and was created
    Created {
        /// Id assigned by the provider, when it returned one
        id: Option<String>,
    },
    /// Existing item was updated in place
    Updated {
        /// Id of the existing item
        id: String,
    },
    /// Existing item was deleted (replace-all only)
    Deleted {
        /// Id of the deleted item
        id: String,
    },
    /// The provider call for this item failed
    Failed {
        /// Error reported by the provider
        reason: String,
    },
}

/// Outcome of one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    /// Natural key of the item (or remote id for deletes)
    pub key: String,
    /// Action taken
    pub action: ItemAction,
}

impl ItemOutcome {
    /// Whether the item's provider call failed
    pub fn is_failure(&self) -> bool {
        matches!(self.action, ItemAction::Failed { .. })
    }
}

/// Reconciler bound to one provider and one zone
pub struct Reconciler<'a> {
    provider: &'a dyn EdgeProvider,
    zone: &'a ZoneContext,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler for one zone
    pub fn new(provider: &'a dyn EdgeProvider, zone: &'a ZoneContext) -> Self {
        Self { provider, zone }
    }

    /// Reconcile `desired` against the provider's current `kind` collection
    ///
    /// Every desired item is attempted exactly once, in order. Per-item
    /// failures are logged and returned as [`ItemAction::Failed`]; they never
    /// abort the loop.
    ///
    /// # Returns
    ///
    /// - `Ok(outcomes)`: one outcome per attempted operation
    /// - `Err(Error)`: the current collection could not be fetched (or the
    ///   redirect ruleset could not be initialized); no item was attempted
    pub async fn reconcile(
        &self,
        kind: ResourceKind,
        desired: &[ManagedItem],
    ) -> Result<Vec<ItemOutcome>> {
        if kind.uses_replace_all() {
            return self.replace_all(kind, desired).await;
        }

        let mut current = self.fetch_current(kind).await?;
        let container_id = current.container_id.clone();
        let mut outcomes = Vec::with_capacity(desired.len());

        debug!(
            "Reconciling {} {} item(s) against {} existing for {}",
            desired.len(),
            kind,
            current.items.len(),
            self.zone.domain()
        );

        for item in desired {
            let key = item.natural_key();

            if let Some(mismatch) = self.kind_mismatch(kind, item) {
                outcomes.push(mismatch);
                continue;
            }

            let payload = item.payload();
            let existing_id = current
                .items
                .iter()
                .find(|remote| item.matches(remote))
                .map(|remote| remote.id.clone());

            self.zone.pace().await;

            let action = match existing_id {
                Some(id) => {
                    match self
                        .provider
                        .update_item(self.zone, kind, container_id.as_deref(), &id, &payload)
                        .await
                    {
                        Ok(_) => {
                            info!("{}: updated {} `{}` ({})", self.zone.domain(), kind, key, id);
                            ItemAction::Updated { id }
                        }
                        Err(e) => self.failed("update", kind, &key, &payload, e),
                    }
                }
                None => {
                    match self
                        .provider
                        .create_item(self.zone, kind, container_id.as_deref(), &payload)
                        .await
                    {
                        Ok(created) => {
                            info!("{}: created {} `{}`", self.zone.domain(), kind, key);
                            // Later duplicates of this natural key update the new item.
                            let id = match RemoteItem::from_value(created) {
                                Ok(remote) => {
                                    let id = remote.id.clone();
                                    current.items.push(remote);
                                    Some(id)
                                }
                                Err(_) => None,
                            };
                            ItemAction::Created { id }
                        }
                        Err(e) => self.failed("create", kind, &key, &payload, e),
                    }
                }
            };

            outcomes.push(ItemOutcome { key, action });
        }

        Ok(outcomes)
    }

    /// Fetch the current collection, initializing a missing redirect ruleset
    async fn fetch_current(&self, kind: ResourceKind) -> Result<RemoteCollection> {
        self.zone.pace().await;

        let fetched = self.provider.fetch_collection(self.zone, kind).await;

        let missing_ruleset = match &fetched {
            Err(e) => kind.is_ruleset() && e.is_not_found(),
            Ok(collection) => kind.is_ruleset() && collection.container_id.is_none(),
        };

        if !missing_ruleset {
            return fetched;
        }

        if !kind.creates_missing_ruleset() {
            return Err(Error::not_found(format!(
                "{} ruleset does not exist for {}",
                kind,
                self.zone.domain()
            )));
        }

        info!(
            "{}: {} ruleset does not exist, creating it",
            self.zone.domain(),
            kind
        );
        self.zone.pace().await;
        let container_id = self.provider.create_container(self.zone, kind).await?;

        Ok(RemoteCollection::in_container(container_id, Vec::new()))
    }

    /// Delete every existing item, then create every desired item
    ///
    /// Each batch runs concurrently and every operation settles on its own;
    /// one failure never cancels a sibling.
    async fn replace_all(
        &self,
        kind: ResourceKind,
        desired: &[ManagedItem],
    ) -> Result<Vec<ItemOutcome>> {
        self.zone.pace().await;
        let current = self.provider.fetch_collection(self.zone, kind).await?;

        info!(
            "{}: replacing {} existing {} with {} desired",
            self.zone.domain(),
            current.items.len(),
            kind,
            desired.len()
        );

        let deletes = current.items.iter().map(|remote| async move {
            let key = remote
                .body
                .get("pattern")
                .and_then(Value::as_str)
                .unwrap_or(remote.id.as_str())
                .to_string();

            let action = match self.provider.delete_item(self.zone, kind, &remote.id).await {
                Ok(()) => {
                    info!("{}: deleted {} `{}`", self.zone.domain(), kind, key);
                    ItemAction::Deleted {
                        id: remote.id.clone(),
                    }
                }
                Err(e) => self.failed("delete", kind, &key, &remote.body, e),
            };

            ItemOutcome { key, action }
        });

        let mut outcomes = join_all(deletes).await;

        let creates = desired.iter().map(|item| async move {
            if let Some(mismatch) = self.kind_mismatch(kind, item) {
                return mismatch;
            }

            let key = item.natural_key();
            let payload = item.payload();

            let action = match self.provider.create_item(self.zone, kind, None, &payload).await {
                Ok(created) => {
                    info!("{}: created {} `{}`", self.zone.domain(), kind, key);
                    ItemAction::Created {
                        id: created.get("id").and_then(Value::as_str).map(str::to_string),
                    }
                }
                Err(e) => self.failed("create", kind, &key, &payload, e),
            };

            ItemOutcome { key, action }
        });

        outcomes.extend(join_all(creates).await);

        Ok(outcomes)
    }

    /// Failed outcome for an item of another kind; it is never sent
    fn kind_mismatch(&self, kind: ResourceKind, item: &ManagedItem) -> Option<ItemOutcome> {
        if item.kind() == kind {
            return None;
        }

        let key = item.natural_key();
        let reason = format!("{} item `{}` cannot be applied as {}", item.kind(), key, kind);
        error!("{}: {}", self.zone.domain(), reason);
        Some(ItemOutcome {
            key,
            action: ItemAction::Failed { reason },
        })
    }

    fn failed(
        &self,
        operation: &str,
        kind: ResourceKind,
        key: &str,
        payload: &Value,
        err: Error,
    ) -> ItemAction {
        error!(
            "{}: failed to {} {} `{}`: {} (payload: {})",
            self.zone.domain(),
            operation,
            kind,
            key,
            err,
            payload
        );
        ItemAction::Failed {
            reason: err.to_string(),
        }
    }
}
