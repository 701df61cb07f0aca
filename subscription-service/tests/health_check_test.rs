//! Database health and metrics exposition tests.

mod common;

use common::{TestApp, TEST_ACTOR};
use subscription_service::models::ServiceKind;
use subscription_service::services::{get_metrics, ServiceLedger};

#[tokio::test]
async fn health_check_succeeds_against_migrated_schema() {
    let app = TestApp::spawn().await;

    app.db.health_check().await.expect("Health check failed");

    app.cleanup().await;
}

#[tokio::test]
async fn ledger_transitions_show_up_in_metrics_output() {
    let app = TestApp::spawn().await;
    let (_, project) = app.seed_client_and_project().await;
    let ledger = ServiceLedger::new(&app.db);

    ledger
        .activate(project.project_id, ServiceKind::Mdm, TEST_ACTOR)
        .await
        .unwrap();

    let metrics = get_metrics();
    assert!(metrics.contains("subscription_ledger_operations_total"));
    assert!(metrics.contains("subscription_db_query_duration_seconds"));

    app.cleanup().await;
}
