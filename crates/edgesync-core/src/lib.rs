// # edgesync-core
//
// Core library for applying an edge settings template across many zones.
//
// ## Architecture Overview
//
// - **EdgeProvider**: Trait for the provider's fetch/create/update/delete surface
// - **ManagedItem**: Tagged union of reconcilable items, each with its natural key
// - **Reconciler**: Create-or-update (or replace-all) of one collection
// - **Template**: Per-domain instantiation of the settings template
// - **Dispatcher**: Settings key → operation, applied key by key for one zone
// - **Runner**: Zone setup and the per-zone apply loop
//
// ## Design Principles
//
// 1. **Failure Isolation**: One bad item, key or zone never stops its siblings
// 2. **Explicit Context**: Credentials, zone id and pacing travel in `ZoneContext`
// 3. **Create-or-Update**: Nothing is deleted, except worker routes (replace-all)
// 4. **Library-First**: The binary only wires configuration and logging
// 5. **Idempotency**: Re-running an unchanged template converges to updates only

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod items;
pub mod reconciler;
pub mod runner;
pub mod template;
pub mod traits;
pub mod zone;

// Re-export core types for convenience
pub use config::{AccountCredentials, ApplyConfig, DomainConfig};
pub use dispatcher::{Dispatcher, SettingOutcome, SettingReport, ZoneReport};
pub use error::{Error, Result};
pub use items::{ManagedItem, RemoteCollection, RemoteItem, ResourceKind};
pub use reconciler::{ItemAction, ItemOutcome, Reconciler};
pub use runner::{RunReport, Runner, ZoneRun};
pub use template::{SettingsDocument, Template};
pub use traits::EdgeProvider;
pub use zone::{Credential, ZoneContext};
