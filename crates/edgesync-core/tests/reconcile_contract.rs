//! Contract Test: Create-or-Update Reconciliation
//!
//! Constraints verified:
//! - Desired items matching an existing natural key are updated by the existing id
//! - Desired items with no match are created
//! - Existing items absent from the desired set are never touched
//! - Rule payloads are flattened before reaching the provider
//! - Only the redirect ruleset is created when missing
//!
//! If this test fails, the reconciler no longer converges remote state.

mod common;

use common::*;
use edgesync_core::{ItemAction, ManagedItem, Reconciler, ResourceKind};
use serde_json::{Value, json};

fn parse(kind: ResourceKind, items: Value) -> Vec<ManagedItem> {
    ManagedItem::parse_all(kind, &items).expect("valid items")
}

#[tokio::test]
async fn dns_records_update_matches_and_create_the_rest() {
    let provider = RecordingProvider::new().with_items(
        ResourceKind::DnsRecords,
        vec![
            existing_dns("rec-www", "www.example.com"),
            existing_dns("rec-mail", "mail.example.com"),
            existing_dns("rec-legacy", "legacy.example.com"),
        ],
    );
    let zone = zone();

    let desired = parse(
        ResourceKind::DnsRecords,
        json!([
            dns("www.example.com", "192.0.2.10"),
            dns("api.example.com", "192.0.2.11"),
            dns("mail.example.com", "192.0.2.12"),
        ]),
    );

    let outcomes = Reconciler::new(&provider, &zone)
        .reconcile(ResourceKind::DnsRecords, &desired)
        .await
        .expect("fetch succeeds");

    assert_eq!(outcomes.len(), 3);
    assert_eq!(
        outcomes[0].action,
        ItemAction::Updated {
            id: "rec-www".to_string()
        }
    );
    assert!(matches!(outcomes[1].action, ItemAction::Created { .. }));
    assert_eq!(
        outcomes[2].action,
        ItemAction::Updated {
            id: "rec-mail".to_string()
        }
    );

    let mutations = provider.mutations();
    assert_eq!(mutations.len(), 3, "one call per desired record: {:?}", mutations);
    assert_eq!(
        mutations[0],
        Call::Update {
            kind: ResourceKind::DnsRecords,
            container: None,
            id: "rec-www".to_string(),
            payload: dns("www.example.com", "192.0.2.10"),
        }
    );
    assert_eq!(
        mutations[1],
        Call::Create {
            kind: ResourceKind::DnsRecords,
            container: None,
            payload: dns("api.example.com", "192.0.2.11"),
        }
    );

    // Nothing is ever sent for the record the template no longer mentions
    assert!(!mutations.iter().any(|c| matches!(c, Call::Update { id, .. } if id == "rec-legacy")));
    assert!(!mutations.iter().any(Call::is_delete));
    assert!(provider
        .items(ResourceKind::DnsRecords)
        .iter()
        .any(|i| i.id == "rec-legacy"));
}

#[tokio::test]
async fn firewall_rules_match_by_description_only() {
    let provider = RecordingProvider::new().with_items(
        ResourceKind::FirewallRules,
        vec![json!({
            "id": "rule-1",
            "description": "block admin",
            "action": "challenge",
            "expression": "(http.request.uri.path contains \"/wp-admin\")"
        })],
    );
    let zone = zone();

    let desired = parse(
        ResourceKind::FirewallRules,
        json!([
            {
                "description": "block admin",
                "action": "block",
                "filter": { "expression": "(http.request.uri.path contains \"/admin\")", "enabled": true }
            },
            {
                "description": "Block Admin",
                "action": "block",
                "filter": { "expression": "(ip.src eq 192.0.2.1)" }
            }
        ]),
    );

    Reconciler::new(&provider, &zone)
        .reconcile(ResourceKind::FirewallRules, &desired)
        .await
        .unwrap();

    let mutations = provider.mutations();
    assert_eq!(mutations.len(), 2);
    assert!(matches!(&mutations[0], Call::Update { id, .. } if id == "rule-1"));
    // Description equality is exact; a different case is a different rule
    assert!(mutations[1].is_create());

    for call in &mutations {
        match call {
            Call::Update { container, .. } | Call::Create { container, .. } => {
                assert_eq!(container.as_deref(), Some(FIREWALL_RULESET));
            }
            other => panic!("unexpected call {:?}", other),
        }
    }
}

#[tokio::test]
async fn duplicate_descriptions_hit_the_same_target_in_order() {
    let provider = RecordingProvider::new();
    let zone = zone();

    let desired = parse(
        ResourceKind::RedirectRules,
        json!([
            { "description": "www redirect", "action": "redirect", "expression": "true", "version": 1 },
            { "description": "www redirect", "action": "redirect", "expression": "true", "version": 2 }
        ]),
    );

    let outcomes = Reconciler::new(&provider, &zone)
        .reconcile(ResourceKind::RedirectRules, &desired)
        .await
        .unwrap();

    let created_id = match &outcomes[0].action {
        ItemAction::Created { id: Some(id) } => id.clone(),
        other => panic!("expected create, got {:?}", other),
    };
    assert_eq!(outcomes[1].action, ItemAction::Updated { id: created_id });

    let mutations: Vec<Call> = provider
        .mutations()
        .into_iter()
        .filter(|c| c.is_create() || c.is_update())
        .collect();
    assert_eq!(mutations.len(), 2);
    assert_eq!(mutations[0].payload().unwrap()["version"], 1);
    assert_eq!(mutations[1].payload().unwrap()["version"], 2);
}

#[tokio::test]
async fn rule_filter_is_flattened_on_the_wire() {
    let provider = RecordingProvider::new();
    let zone = zone();

    let desired = parse(
        ResourceKind::FirewallRules,
        json!([{
            "description": "block bots",
            "action": "block",
            "filter": { "enabled": true, "expression": "(cf.client.bot)" }
        }]),
    );

    Reconciler::new(&provider, &zone)
        .reconcile(ResourceKind::FirewallRules, &desired)
        .await
        .unwrap();

    let payload = provider.mutations()[0].payload().cloned().unwrap();
    assert_eq!(payload["enabled"], true);
    assert_eq!(payload["expression"], "(cf.client.bot)");
    assert_eq!(payload["description"], "block bots");
    assert_eq!(payload["action"], "block");
    assert!(payload.get("filter").is_none());
}

#[tokio::test]
async fn page_rule_match_requires_all_desired_targets() {
    let provider = RecordingProvider::new().with_items(
        ResourceKind::PageRules,
        vec![
            json!({ "id": "pr-partial", "targets": [target("*example.com/static/*")] }),
            json!({
                "id": "pr-full",
                "targets": [target("*example.com/assets/*"), target("*example.com/static/*")]
            }),
        ],
    );
    let zone = zone();

    let desired = parse(
        ResourceKind::PageRules,
        json!([
            {
                "targets": [target("*example.com/static/*"), target("*example.com/assets/*")],
                "actions": [{ "id": "cache_level", "value": "cache_everything" }]
            },
            {
                "targets": [target("*example.com/static/*"), target("*example.com/media/*")],
                "actions": [{ "id": "cache_level", "value": "bypass" }]
            }
        ]),
    );

    let outcomes = Reconciler::new(&provider, &zone)
        .reconcile(ResourceKind::PageRules, &desired)
        .await
        .unwrap();

    // pr-partial is listed first but lacks the assets target
    assert_eq!(
        outcomes[0].action,
        ItemAction::Updated {
            id: "pr-full".to_string()
        }
    );
    // No existing rule carries the media target
    assert!(matches!(outcomes[1].action, ItemAction::Created { .. }));
}

#[tokio::test]
async fn missing_redirect_ruleset_is_created_then_filled() {
    let provider = RecordingProvider::new();
    let zone = zone();

    let desired = parse(
        ResourceKind::RedirectRules,
        json!([{ "description": "apex to www", "action": "redirect", "expression": "true" }]),
    );

    let outcomes = Reconciler::new(&provider, &zone)
        .reconcile(ResourceKind::RedirectRules, &desired)
        .await
        .expect("missing redirect ruleset is initialization, not an error");

    assert!(matches!(outcomes[0].action, ItemAction::Created { .. }));

    let calls = provider.calls();
    assert_eq!(calls[0], Call::Fetch(ResourceKind::RedirectRules));
    assert_eq!(calls[1], Call::CreateContainer(ResourceKind::RedirectRules));
    assert!(matches!(
        &calls[2],
        Call::Create { container: Some(c), .. } if c == "redirect_rules-ruleset"
    ));
}

#[tokio::test]
async fn missing_firewall_ruleset_is_an_error_not_created() {
    let provider = RecordingProvider::new().without_ruleset(ResourceKind::FirewallRules);
    let zone = zone();

    let desired = parse(
        ResourceKind::FirewallRules,
        json!([{ "description": "block", "action": "block", "expression": "true" }]),
    );

    let result = Reconciler::new(&provider, &zone)
        .reconcile(ResourceKind::FirewallRules, &desired)
        .await;

    assert!(result.unwrap_err().is_not_found());
    assert_eq!(provider.calls(), vec![Call::Fetch(ResourceKind::FirewallRules)]);
}

#[tokio::test]
async fn pacing_delays_each_sequential_call() {
    let provider = RecordingProvider::new();
    let zone = zone().with_pacing(Some(std::time::Duration::from_millis(15)));

    let desired = parse(
        ResourceKind::DnsRecords,
        json!([dns("a.example.com", "192.0.2.1"), dns("b.example.com", "192.0.2.2")]),
    );

    let started = std::time::Instant::now();
    Reconciler::new(&provider, &zone)
        .reconcile(ResourceKind::DnsRecords, &desired)
        .await
        .unwrap();

    // One fetch + two creates
    assert!(started.elapsed() >= std::time::Duration::from_millis(45));
    assert_eq!(provider.calls().len(), 3);
}
