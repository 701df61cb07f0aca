//! Audit trail integration tests.

mod common;

use common::{TestApp, TEST_ACTOR};
use futures::StreamExt;
use subscription_service::models::{entity, AppendAudit, AuditAction, ServiceKind};
use subscription_service::services::ServiceLedger;

#[tokio::test]
async fn entries_stream_in_append_order() {
    let app = TestApp::spawn().await;
    let (_, project) = app.seed_client_and_project().await;
    let ledger = ServiceLedger::new(&app.db);

    let subscription = ledger
        .activate(project.project_id, ServiceKind::Mdm, TEST_ACTOR)
        .await
        .unwrap();
    ledger
        .deactivate(project.project_id, ServiceKind::Mdm, TEST_ACTOR)
        .await
        .unwrap();
    ledger
        .activate(project.project_id, ServiceKind::Mdm, TEST_ACTOR)
        .await
        .unwrap();

    let entries: Vec<_> = app
        .db
        .audit()
        .entries_for(entity::SERVICE_SUBSCRIPTION, subscription.subscription_id)
        .collect()
        .await;

    let actions: Vec<String> = entries
        .into_iter()
        .map(|e| e.unwrap().action)
        .collect();
    assert_eq!(
        actions,
        vec![
            "service_activated".to_string(),
            "service_deactivated".to_string(),
            "service_activated".to_string(),
        ]
    );

    app.cleanup().await;
}

#[tokio::test]
async fn entry_ids_are_strictly_ascending() {
    let app = TestApp::spawn().await;
    let (_, project) = app.seed_client_and_project().await;
    let ledger = ServiceLedger::new(&app.db);

    let subscription = ledger
        .toggle(project.project_id, ServiceKind::Elearning, TEST_ACTOR)
        .await
        .unwrap();
    ledger
        .toggle(project.project_id, ServiceKind::Elearning, TEST_ACTOR)
        .await
        .unwrap();
    ledger
        .toggle(project.project_id, ServiceKind::Elearning, TEST_ACTOR)
        .await
        .unwrap();

    let entries: Vec<_> = app
        .db
        .audit()
        .entries_for(entity::SERVICE_SUBSCRIPTION, subscription.subscription_id)
        .collect()
        .await;
    assert_eq!(entries.len(), 3);

    let ids: Vec<i64> = entries.iter().map(|e| e.as_ref().unwrap().entry_id).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    app.cleanup().await;
}

#[tokio::test]
async fn stream_is_restartable() {
    let app = TestApp::spawn().await;
    let (_, project) = app.seed_client_and_project().await;
    let ledger = ServiceLedger::new(&app.db);

    let subscription = ledger
        .activate(project.project_id, ServiceKind::Reporting, TEST_ACTOR)
        .await
        .unwrap();

    let first: Vec<_> = app
        .db
        .audit()
        .entries_for(entity::SERVICE_SUBSCRIPTION, subscription.subscription_id)
        .collect()
        .await;
    let second: Vec<_> = app
        .db
        .audit()
        .entries_for(entity::SERVICE_SUBSCRIPTION, subscription.subscription_id)
        .collect()
        .await;

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(
        first[0].as_ref().unwrap().entry_id,
        second[0].as_ref().unwrap().entry_id
    );

    app.cleanup().await;
}

#[tokio::test]
async fn direct_append_stores_values_verbatim() {
    let app = TestApp::spawn().await;
    let entity_id = uuid::Uuid::new_v4();

    let entry = app
        .db
        .audit()
        .record(AppendAudit {
            actor: "admin@example.com".to_string(),
            action: AuditAction::BillingAdjusted,
            entity_type: entity::BILLING_RECORD,
            entity_id,
            old_values: Some(serde_json::json!({ "total_cost": "100.00" })),
            new_values: Some(serde_json::json!({ "total_cost": "90.00" })),
            ip_address: Some("10.0.0.1".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(entry.actor, "admin@example.com");
    assert_eq!(entry.action, "billing_adjusted");
    assert_eq!(entry.entity_id, entity_id);
    assert_eq!(entry.ip_address.as_deref(), Some("10.0.0.1"));
    assert_eq!(
        entry.old_values,
        Some(serde_json::json!({ "total_cost": "100.00" }))
    );

    app.cleanup().await;
}

#[tokio::test]
async fn unknown_entity_yields_an_empty_stream() {
    let app = TestApp::spawn().await;

    let entries: Vec<_> = app
        .db
        .audit()
        .entries_for(entity::CLIENT, uuid::Uuid::new_v4())
        .collect()
        .await;
    assert!(entries.is_empty());

    app.cleanup().await;
}
