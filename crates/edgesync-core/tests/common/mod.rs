//! Test doubles and common utilities for contract tests
//!
//! [`RecordingProvider`] is a stateful in-memory provider: creates, updates
//! and deletes change what the next fetch returns, every call is recorded,
//! and any call can be made to fail.

#![allow(dead_code)]

use async_trait::async_trait;
use edgesync_core::error::{Error, Result};
use edgesync_core::{
    Credential, EdgeProvider, RemoteCollection, RemoteItem, ResourceKind, ZoneContext,
};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub const ZONE_ID: &str = "zone-1";
pub const DOMAIN: &str = "example.com";
pub const FIREWALL_RULESET: &str = "firewall-ruleset";

/// One provider call, as observed by the test double
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Fetch(ResourceKind),
    Create {
        kind: ResourceKind,
        container: Option<String>,
        payload: Value,
    },
    Update {
        kind: ResourceKind,
        container: Option<String>,
        id: String,
        payload: Value,
    },
    Delete {
        kind: ResourceKind,
        id: String,
    },
    SetScalar {
        setting: String,
        value: Value,
    },
    CreateContainer(ResourceKind),
}

impl Call {
    pub fn is_create(&self) -> bool {
        matches!(self, Call::Create { .. })
    }

    pub fn is_update(&self) -> bool {
        matches!(self, Call::Update { .. })
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Call::Delete { .. })
    }

    pub fn is_fetch(&self) -> bool {
        matches!(self, Call::Fetch(_))
    }

    pub fn kind(&self) -> Option<ResourceKind> {
        match self {
            Call::Fetch(kind) | Call::CreateContainer(kind) => Some(*kind),
            Call::Create { kind, .. } | Call::Update { kind, .. } | Call::Delete { kind, .. } => {
                Some(*kind)
            }
            Call::SetScalar { .. } => None,
        }
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            Call::Create { payload, .. } | Call::Update { payload, .. } => Some(payload),
            _ => None,
        }
    }
}

type FailurePredicate = Arc<dyn Fn(&Call) -> bool + Send + Sync>;

#[derive(Default)]
struct State {
    collections: HashMap<(String, ResourceKind), RemoteCollection>,
    missing_rulesets: HashSet<ResourceKind>,
    calls: Vec<(String, Call)>,
    credentials: HashMap<String, Credential>,
    scalars: HashMap<(String, String), Value>,
    failures: Vec<FailurePredicate>,
    next_id: usize,
}

/// A stateful provider that records every call
pub struct RecordingProvider {
    state: Arc<Mutex<State>>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Create a provider that shares state and call log with `other`
    pub fn sharing_state_with(other: &Self) -> Self {
        Self {
            state: Arc::clone(&other.state),
        }
    }

    /// Seed existing items of `kind` in the default zone
    pub fn with_items(self, kind: ResourceKind, items: Vec<Value>) -> Self {
        self.with_zone_items(ZONE_ID, kind, items)
    }

    /// Seed existing items of `kind` in `zone_id`
    pub fn with_zone_items(self, zone_id: &str, kind: ResourceKind, items: Vec<Value>) -> Self {
        let items = items
            .into_iter()
            .map(|body| RemoteItem::from_value(body).expect("seeded items need an id"))
            .collect();
        let collection = match kind {
            ResourceKind::FirewallRules => RemoteCollection::in_container(FIREWALL_RULESET, items),
            ResourceKind::RedirectRules => RemoteCollection::in_container("redirect-ruleset", items),
            _ => RemoteCollection::new(items),
        };
        self.state
            .lock()
            .unwrap()
            .collections
            .insert((zone_id.to_string(), kind), collection);
        self
    }

    /// Make fetches of a ruleset-backed kind report a missing ruleset
    pub fn without_ruleset(self, kind: ResourceKind) -> Self {
        self.state.lock().unwrap().missing_rulesets.insert(kind);
        self
    }

    /// Fail every call for which `predicate` returns true
    pub fn fail_when(self, predicate: impl Fn(&Call) -> bool + Send + Sync + 'static) -> Self {
        self.state.lock().unwrap().failures.push(Arc::new(predicate));
        self
    }

    /// Every recorded call, in order
    pub fn calls(&self) -> Vec<Call> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|(_, call)| call.clone())
            .collect()
    }

    /// Recorded calls against one zone
    pub fn calls_for(&self, zone_id: &str) -> Vec<Call> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(zone, _)| zone == zone_id)
            .map(|(_, call)| call.clone())
            .collect()
    }

    /// Recorded calls that change provider state
    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(|c| !c.is_fetch()).collect()
    }

    /// Forget recorded calls, keep state
    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Current items of `kind` in the default zone
    pub fn items(&self, kind: ResourceKind) -> Vec<RemoteItem> {
        self.state
            .lock()
            .unwrap()
            .collections
            .get(&(ZONE_ID.to_string(), kind))
            .map(|c| c.items.clone())
            .unwrap_or_default()
    }

    /// Current value of a scalar setting in `zone_id`
    pub fn scalar(&self, zone_id: &str, setting: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .scalars
            .get(&(zone_id.to_string(), setting.to_string()))
            .cloned()
    }

    /// Credential last used for `zone_id`
    pub fn credential_for(&self, zone_id: &str) -> Option<Credential> {
        self.state.lock().unwrap().credentials.get(zone_id).cloned()
    }

    /// Record the call and check injected failures
    fn record(&self, zone: &ZoneContext, call: Call) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .credentials
            .insert(zone.zone_id().to_string(), zone.credential().clone());
        state.calls.push((zone.zone_id().to_string(), call.clone()));

        if state.failures.iter().any(|fails| (**fails)(&call)) {
            return Err(Error::provider("recording", format!("injected failure: {:?}", call)));
        }
        Ok(())
    }

    fn next_id(&self, kind: ResourceKind) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        format!("{}-{}", kind, state.next_id)
    }
}

fn with_id(payload: &Value, id: &str) -> Value {
    let mut body = payload.clone();
    if let Some(object) = body.as_object_mut() {
        object.insert("id".to_string(), json!(id));
    }
    body
}

#[async_trait]
impl EdgeProvider for RecordingProvider {
    async fn fetch_collection(
        &self,
        zone: &ZoneContext,
        kind: ResourceKind,
    ) -> Result<RemoteCollection> {
        self.record(zone, Call::Fetch(kind))?;

        let mut state = self.state.lock().unwrap();
        let key = (zone.zone_id().to_string(), kind);

        if let Some(collection) = state.collections.get(&key) {
            return Ok(collection.clone());
        }

        if kind == ResourceKind::RedirectRules || state.missing_rulesets.contains(&kind) {
            return Err(Error::not_found(format!("{} ruleset", kind)));
        }

        let collection = if kind == ResourceKind::FirewallRules {
            RemoteCollection::in_container(FIREWALL_RULESET, Vec::new())
        } else {
            RemoteCollection::default()
        };
        state.collections.insert(key, collection.clone());
        Ok(collection)
    }

    async fn create_item(
        &self,
        zone: &ZoneContext,
        kind: ResourceKind,
        container_id: Option<&str>,
        payload: &Value,
    ) -> Result<Value> {
        self.record(
            zone,
            Call::Create {
                kind,
                container: container_id.map(str::to_string),
                payload: payload.clone(),
            },
        )?;

        let id = self.next_id(kind);
        let body = with_id(payload, &id);

        let mut state = self.state.lock().unwrap();
        let collection = state
            .collections
            .entry((zone.zone_id().to_string(), kind))
            .or_default();
        if collection.container_id.as_deref() != container_id {
            return Err(Error::provider("recording", "create targeted the wrong ruleset"));
        }
        collection.items.push(RemoteItem {
            id,
            body: body.clone(),
        });
        Ok(body)
    }

    async fn update_item(
        &self,
        zone: &ZoneContext,
        kind: ResourceKind,
        container_id: Option<&str>,
        item_id: &str,
        payload: &Value,
    ) -> Result<Value> {
        self.record(
            zone,
            Call::Update {
                kind,
                container: container_id.map(str::to_string),
                id: item_id.to_string(),
                payload: payload.clone(),
            },
        )?;

        let mut state = self.state.lock().unwrap();
        let item = state
            .collections
            .get_mut(&(zone.zone_id().to_string(), kind))
            .and_then(|c| c.items.iter_mut().find(|i| i.id == item_id))
            .ok_or_else(|| Error::not_found(format!("{} {}", kind, item_id)))?;
        item.body = with_id(payload, item_id);
        Ok(item.body.clone())
    }

    async fn delete_item(
        &self,
        zone: &ZoneContext,
        kind: ResourceKind,
        item_id: &str,
    ) -> Result<()> {
        self.record(
            zone,
            Call::Delete {
                kind,
                id: item_id.to_string(),
            },
        )?;

        let mut state = self.state.lock().unwrap();
        if let Some(collection) = state.collections.get_mut(&(zone.zone_id().to_string(), kind)) {
            collection.items.retain(|i| i.id != item_id);
        }
        Ok(())
    }

    async fn set_scalar(&self, zone: &ZoneContext, setting: &str, value: &Value) -> Result<()> {
        self.record(
            zone,
            Call::SetScalar {
                setting: setting.to_string(),
                value: value.clone(),
            },
        )?;

        self.state
            .lock()
            .unwrap()
            .scalars
            .insert((zone.zone_id().to_string(), setting.to_string()), value.clone());
        Ok(())
    }

    async fn create_container(&self, zone: &ZoneContext, kind: ResourceKind) -> Result<String> {
        self.record(zone, Call::CreateContainer(kind))?;

        let id = format!("{}-ruleset", kind);
        self.state.lock().unwrap().collections.insert(
            (zone.zone_id().to_string(), kind),
            RemoteCollection::in_container(id.clone(), Vec::new()),
        );
        Ok(id)
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

/// Zone context for the default test zone
pub fn zone() -> ZoneContext {
    ZoneContext::new(ZONE_ID, DOMAIN, Credential::Token("test-token".to_string()))
        .expect("valid zone")
}

/// DNS record payload
pub fn dns(name: &str, content: &str) -> Value {
    json!({ "name": name, "type": "A", "content": content, "proxied": true })
}

/// Existing DNS record with an id
pub fn existing_dns(id: &str, name: &str) -> Value {
    json!({ "id": id, "name": name, "type": "A", "content": "198.51.100.1" })
}

/// Page-rule target
pub fn target(value: &str) -> Value {
    json!({ "target": "url", "constraint": { "operator": "matches", "value": value } })
}
