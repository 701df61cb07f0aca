//! Service activation lifecycle integration tests.

mod common;

use common::{TestApp, TEST_ACTOR};
use futures::StreamExt;
use subscription_service::models::{entity, ServiceKind};
use subscription_service::services::ServiceLedger;

#[tokio::test]
async fn project_creation_fans_out_one_inactive_subscription_per_kind() {
    let app = TestApp::spawn().await;
    let (_, project) = app.seed_client_and_project().await;

    let subscriptions = app
        .db
        .list_project_subscriptions(project.project_id)
        .await
        .unwrap();

    assert_eq!(subscriptions.len(), ServiceKind::ALL.len());
    for subscription in &subscriptions {
        assert!(!subscription.is_active);
        assert!(subscription.activated_at.is_none());
        assert!(subscription.deactivated_at.is_none());
        assert!(subscription.parsed_kind().is_some());
    }

    app.cleanup().await;
}

#[tokio::test]
async fn activate_sets_flag_and_timestamp() {
    let app = TestApp::spawn().await;
    let (_, project) = app.seed_client_and_project().await;
    let ledger = ServiceLedger::new(&app.db);

    let subscription = ledger
        .activate(project.project_id, ServiceKind::Mdm, TEST_ACTOR)
        .await
        .unwrap();

    assert!(subscription.is_active);
    assert!(subscription.activated_at.is_some());
    assert!(subscription.deactivated_at.is_none());

    app.cleanup().await;
}

#[tokio::test]
async fn activate_is_idempotent_and_skips_audit_on_noop() {
    let app = TestApp::spawn().await;
    let (_, project) = app.seed_client_and_project().await;
    let ledger = ServiceLedger::new(&app.db);

    let first = ledger
        .activate(project.project_id, ServiceKind::Reporting, TEST_ACTOR)
        .await
        .unwrap();
    let second = ledger
        .activate(project.project_id, ServiceKind::Reporting, TEST_ACTOR)
        .await
        .unwrap();

    assert!(second.is_active);
    assert_eq!(first.activated_at, second.activated_at);

    let entries: Vec<_> = app
        .db
        .audit()
        .entries_for(entity::SERVICE_SUBSCRIPTION, first.subscription_id)
        .collect()
        .await;
    assert_eq!(entries.len(), 1, "No-op activation must not write audit");

    app.cleanup().await;
}

#[tokio::test]
async fn deactivate_clears_activated_at() {
    let app = TestApp::spawn().await;
    let (_, project) = app.seed_client_and_project().await;
    let ledger = ServiceLedger::new(&app.db);

    ledger
        .activate(project.project_id, ServiceKind::Omnichannel, TEST_ACTOR)
        .await
        .unwrap();
    let subscription = ledger
        .deactivate(project.project_id, ServiceKind::Omnichannel, TEST_ACTOR)
        .await
        .unwrap();

    assert!(!subscription.is_active);
    assert!(subscription.activated_at.is_none());
    assert!(subscription.deactivated_at.is_some());

    app.cleanup().await;
}

#[tokio::test]
async fn deactivate_inactive_subscription_is_a_noop() {
    let app = TestApp::spawn().await;
    let (_, project) = app.seed_client_and_project().await;
    let ledger = ServiceLedger::new(&app.db);

    // Fresh subscriptions start inactive.
    let subscription = ledger
        .deactivate(project.project_id, ServiceKind::Elearning, TEST_ACTOR)
        .await
        .unwrap();

    assert!(!subscription.is_active);
    assert!(subscription.deactivated_at.is_none());

    let entries: Vec<_> = app
        .db
        .audit()
        .entries_for(entity::SERVICE_SUBSCRIPTION, subscription.subscription_id)
        .collect()
        .await;
    assert!(entries.is_empty());

    app.cleanup().await;
}

#[tokio::test]
async fn toggle_twice_restores_state_but_writes_two_audit_entries() {
    let app = TestApp::spawn().await;
    let (_, project) = app.seed_client_and_project().await;
    let ledger = ServiceLedger::new(&app.db);

    let after_first = ledger
        .toggle(project.project_id, ServiceKind::DynamicForms, TEST_ACTOR)
        .await
        .unwrap();
    assert!(after_first.is_active);
    assert!(after_first.activated_at.is_some());

    let after_second = ledger
        .toggle(project.project_id, ServiceKind::DynamicForms, TEST_ACTOR)
        .await
        .unwrap();
    assert!(!after_second.is_active);
    assert!(after_second.activated_at.is_none());
    assert!(after_second.deactivated_at.is_some());

    let entries: Vec<_> = app
        .db
        .audit()
        .entries_for(entity::SERVICE_SUBSCRIPTION, after_first.subscription_id)
        .collect()
        .await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].as_ref().unwrap().action, "service_activated");
    assert_eq!(entries[1].as_ref().unwrap().action, "service_deactivated");

    app.cleanup().await;
}

#[tokio::test]
async fn ledger_operations_on_unknown_project_return_not_found() {
    let app = TestApp::spawn().await;
    let ledger = ServiceLedger::new(&app.db);
    let missing = uuid::Uuid::new_v4();

    let activate = ledger.activate(missing, ServiceKind::Mdm, TEST_ACTOR).await;
    assert!(matches!(
        activate,
        Err(service_core::error::AppError::NotFound(_))
    ));

    let toggle = ledger.toggle(missing, ServiceKind::Mdm, TEST_ACTOR).await;
    assert!(matches!(
        toggle,
        Err(service_core::error::AppError::NotFound(_))
    ));

    app.cleanup().await;
}
