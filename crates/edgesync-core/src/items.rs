//! Resource kinds and managed items
//!
//! A [`ManagedItem`] is one element of a reconcilable collection. Each
//! variant keeps the fields that form its natural key typed, and keeps the
//! authored object as-is so every other field reaches the provider untouched.
//!
//! | Kind            | Natural key                         | Strategy          |
//! |-----------------|-------------------------------------|-------------------|
//! | DNS records     | `name`                              | create-or-update  |
//! | Firewall rules  | `description`                       | create-or-update  |
//! | Redirect rules  | `description`                       | create-or-update  |
//! | Page rules      | `targets` (subset match)            | create-or-update  |
//! | Worker routes   | `pattern`                           | replace-all       |

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Reconcilable resource collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// DNS records
    DnsRecords,
    /// Custom firewall rules (ruleset-backed)
    FirewallRules,
    /// Dynamic redirect rules (ruleset-backed, ruleset created lazily)
    RedirectRules,
    /// Worker routes
    WorkerRoutes,
    /// Page rules
    PageRules,
}

impl ResourceKind {
    /// Every kind, in a stable order
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::DnsRecords,
        ResourceKind::FirewallRules,
        ResourceKind::RedirectRules,
        ResourceKind::WorkerRoutes,
        ResourceKind::PageRules,
    ];

    /// Settings document key that carries this collection
    pub fn setting_key(self) -> &'static str {
        match self {
            ResourceKind::DnsRecords => "dns_records",
            ResourceKind::FirewallRules => "firewall_rules",
            ResourceKind::RedirectRules => "redirect_rules",
            ResourceKind::WorkerRoutes => "worker_routes",
            ResourceKind::PageRules => "page_rules",
        }
    }

    /// Look up a kind by its settings document key
    pub fn from_setting_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.setting_key() == key)
    }

    /// Whether items of this kind live inside a remote ruleset
    pub fn is_ruleset(self) -> bool {
        matches!(self, ResourceKind::FirewallRules | ResourceKind::RedirectRules)
    }

    /// Whether a missing ruleset is created on demand instead of failing
    ///
    /// Only redirect rules initialize their ruleset; a missing firewall
    /// ruleset is reported as a failure.
    pub fn creates_missing_ruleset(self) -> bool {
        matches!(self, ResourceKind::RedirectRules)
    }

    /// Whether this kind is synchronized by deleting everything and recreating
    pub fn uses_replace_all(self) -> bool {
        matches!(self, ResourceKind::WorkerRoutes)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.setting_key())
    }
}

/// An item as it currently exists on the provider
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteItem {
    /// Provider-assigned identifier
    pub id: String,
    /// Full provider representation
    pub body: Value,
}

impl RemoteItem {
    /// Build a remote item from a provider object, reading its `id` field
    pub fn from_value(body: Value) -> Result<Self> {
        let id = body
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::invalid_input("remote item has no string `id`"))?
            .to_string();
        Ok(Self { id, body })
    }

    fn str_field(&self, field: &str) -> Option<&str> {
        self.body.get(field).and_then(Value::as_str)
    }
}

/// The current state of one collection on the provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteCollection {
    /// Ruleset id for ruleset-backed kinds
    pub container_id: Option<String>,
    /// Items currently present
    pub items: Vec<RemoteItem>,
}

impl RemoteCollection {
    /// A plain collection with no container
    pub fn new(items: Vec<RemoteItem>) -> Self {
        Self {
            container_id: None,
            items,
        }
    }

    /// A collection held by a ruleset
    pub fn in_container(container_id: impl Into<String>, items: Vec<RemoteItem>) -> Self {
        Self {
            container_id: Some(container_id.into()),
            items,
        }
    }
}

/// One page-rule target: target type, operator and value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRuleTarget {
    /// Target type, e.g. `url`
    pub target: String,
    /// Matching constraint
    pub constraint: TargetConstraint,
}

/// Operator and value of a page-rule target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConstraint {
    /// Operator, e.g. `matches`
    pub operator: String,
    /// Value, e.g. `*example.com/*`
    pub value: String,
}

impl fmt::Display for PageRuleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.target, self.constraint.operator, self.constraint.value
        )
    }
}

#[derive(Deserialize)]
struct PageRuleTargets {
    targets: Vec<PageRuleTarget>,
}

/// One desired element of a reconcilable collection
#[derive(Debug, Clone, PartialEq)]
pub enum ManagedItem {
    /// DNS record, keyed by `name`
    DnsRecord {
        name: String,
        body: Map<String, Value>,
    },
    /// Firewall rule, keyed by `description`
    FirewallRule {
        description: String,
        body: Map<String, Value>,
    },
    /// Redirect rule, keyed by `description`
    RedirectRule {
        description: String,
        body: Map<String, Value>,
    },
    /// Worker route, keyed by `pattern`
    WorkerRoute {
        pattern: String,
        body: Map<String, Value>,
    },
    /// Page rule, keyed by its full target list
    PageRule {
        targets: Vec<PageRuleTarget>,
        body: Map<String, Value>,
    },
}

impl ManagedItem {
    /// Parse one authored element of `kind`
    pub fn parse(kind: ResourceKind, value: &Value) -> Result<Self> {
        let body = value
            .as_object()
            .cloned()
            .ok_or_else(|| Error::invalid_input(format!("{} entry must be an object", kind)))?;

        let item = match kind {
            ResourceKind::DnsRecords => ManagedItem::DnsRecord {
                name: required_str(&body, kind, "name")?,
                body,
            },
            ResourceKind::FirewallRules | ResourceKind::RedirectRules => {
                let description = required_str(&body, kind, "description")?;
                match body.get("filter") {
                    None | Some(Value::Null) | Some(Value::Object(_)) => {}
                    Some(_) => {
                        return Err(Error::invalid_input(format!(
                            "{} `{}`: filter must be an object",
                            kind, description
                        )));
                    }
                }
                if kind == ResourceKind::FirewallRules {
                    ManagedItem::FirewallRule { description, body }
                } else {
                    ManagedItem::RedirectRule { description, body }
                }
            }
            ResourceKind::WorkerRoutes => ManagedItem::WorkerRoute {
                pattern: required_str(&body, kind, "pattern")?,
                body,
            },
            ResourceKind::PageRules => {
                let parsed: PageRuleTargets = serde_json::from_value(Value::Object(body.clone()))
                    .map_err(|e| {
                        Error::invalid_input(format!("{} entry has invalid targets: {}", kind, e))
                    })?;
                if parsed.targets.is_empty() {
                    return Err(Error::invalid_input(format!(
                        "{} entry must have at least one target",
                        kind
                    )));
                }
                ManagedItem::PageRule {
                    targets: parsed.targets,
                    body,
                }
            }
        };

        Ok(item)
    }

    /// Parse a desired sequence of `kind`
    ///
    /// The whole sequence is rejected when any element is malformed, before
    /// any provider call is made for it.
    pub fn parse_all(kind: ResourceKind, value: &Value) -> Result<Vec<Self>> {
        let entries = value
            .as_array()
            .ok_or_else(|| Error::invalid_input(format!("{} must be an array", kind)))?;

        entries.iter().map(|entry| Self::parse(kind, entry)).collect()
    }

    /// Parse every element of a collection value independently
    ///
    /// Only a non-array value is an error; a malformed element becomes an
    /// `Err` at its position and its siblings still parse.
    pub fn parse_each(kind: ResourceKind, value: &Value) -> Result<Vec<Result<Self>>> {
        let entries = value
            .as_array()
            .ok_or_else(|| Error::invalid_input(format!("{} must be an array", kind)))?;

        Ok(entries.iter().map(|entry| Self::parse(kind, entry)).collect())
    }

    /// Best-effort key for an element that failed to parse
    ///
    /// Uses the natural-key field when it is a string, otherwise the
    /// element's position, e.g. `page_rules[2]`.
    pub fn fallback_key(kind: ResourceKind, index: usize, entry: &Value) -> String {
        let field = match kind {
            ResourceKind::DnsRecords => Some("name"),
            ResourceKind::FirewallRules | ResourceKind::RedirectRules => Some("description"),
            ResourceKind::WorkerRoutes => Some("pattern"),
            ResourceKind::PageRules => None,
        };

        field
            .and_then(|f| entry.get(f))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}[{}]", kind, index))
    }

    /// Kind of this item
    pub fn kind(&self) -> ResourceKind {
        match self {
            ManagedItem::DnsRecord { .. } => ResourceKind::DnsRecords,
            ManagedItem::FirewallRule { .. } => ResourceKind::FirewallRules,
            ManagedItem::RedirectRule { .. } => ResourceKind::RedirectRules,
            ManagedItem::WorkerRoute { .. } => ResourceKind::WorkerRoutes,
            ManagedItem::PageRule { .. } => ResourceKind::PageRules,
        }
    }

    /// Human-readable natural key, for logs and reports
    pub fn natural_key(&self) -> String {
        match self {
            ManagedItem::DnsRecord { name, .. } => name.clone(),
            ManagedItem::FirewallRule { description, .. }
            | ManagedItem::RedirectRule { description, .. } => description.clone(),
            ManagedItem::WorkerRoute { pattern, .. } => pattern.clone(),
            ManagedItem::PageRule { targets, .. } => targets
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Whether `remote` is the existing counterpart of this item
    pub fn matches(&self, remote: &RemoteItem) -> bool {
        match self {
            ManagedItem::DnsRecord { name, .. } => remote.str_field("name") == Some(name),
            ManagedItem::FirewallRule { description, .. }
            | ManagedItem::RedirectRule { description, .. } => {
                remote.str_field("description") == Some(description)
            }
            ManagedItem::WorkerRoute { pattern, .. } => remote.str_field("pattern") == Some(pattern),
            ManagedItem::PageRule { targets, .. } => {
                let Ok(existing) = serde_json::from_value::<PageRuleTargets>(remote.body.clone())
                else {
                    return false;
                };
                targets
                    .iter()
                    .all(|wanted| existing.targets.iter().any(|have| have == wanted))
            }
        }
    }

    /// Wire payload for create/update
    ///
    /// Rules authored in the legacy nested shape have their `filter` fields
    /// lifted to the top level and the `filter` key removed.
    pub fn payload(&self) -> Value {
        match self {
            ManagedItem::FirewallRule { body, .. } | ManagedItem::RedirectRule { body, .. } => {
                Value::Object(flatten_filter(body.clone()))
            }
            ManagedItem::DnsRecord { body, .. }
            | ManagedItem::WorkerRoute { body, .. }
            | ManagedItem::PageRule { body, .. } => Value::Object(body.clone()),
        }
    }
}

fn required_str(body: &Map<String, Value>, kind: ResourceKind, field: &str) -> Result<String> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::invalid_input(format!("{} entry is missing `{}`", kind, field)))
}

fn flatten_filter(mut body: Map<String, Value>) -> Map<String, Value> {
    if let Some(Value::Object(filter)) = body.remove("filter") {
        for (key, value) in filter {
            body.insert(key, value);
        }
    }
    body
}
