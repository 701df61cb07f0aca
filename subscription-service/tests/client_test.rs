//! Client and project lifecycle integration tests.

mod common;

use common::{TestApp, TEST_ACTOR};
use futures::StreamExt;
use service_core::error::AppError;
use subscription_service::models::{
    entity, CreateClient, CreateClientUser, ProjectStatus, ServiceKind,
};

#[tokio::test]
async fn duplicate_client_email_conflicts() {
    let app = TestApp::spawn().await;

    let input = CreateClient {
        name: "Acme".to_string(),
        email: "billing@acme.example".to_string(),
        legal_representative: None,
        contact_person: None,
        phone: None,
        logo_url: None,
    };
    app.db.create_client(&input, TEST_ACTOR).await.unwrap();

    let duplicate = CreateClient {
        name: "Acme Two".to_string(),
        ..input
    };
    let result = app.db.create_client(&duplicate, TEST_ACTOR).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    app.cleanup().await;
}

#[tokio::test]
async fn delete_client_refused_while_projects_are_active() {
    let app = TestApp::spawn().await;
    let (client, project) = app.seed_client_and_project().await;

    // Projects start active, so the delete is blocked.
    let blocked = app.db.delete_client(client.client_id, TEST_ACTOR).await;
    assert!(matches!(blocked, Err(AppError::Conflict(_))));

    // A completed project no longer blocks.
    app.db
        .update_project_status(project.project_id, ProjectStatus::Completed)
        .await
        .unwrap();
    app.db
        .delete_client(client.client_id, TEST_ACTOR)
        .await
        .unwrap();

    assert!(app.db.get_client(client.client_id).await.unwrap().is_none());

    app.cleanup().await;
}

#[tokio::test]
async fn suspended_projects_also_block_client_deletion() {
    let app = TestApp::spawn().await;
    let (client, project) = app.seed_client_and_project().await;

    app.db
        .update_project_status(project.project_id, ProjectStatus::Suspended)
        .await
        .unwrap();

    let result = app.db.delete_client(client.client_id, TEST_ACTOR).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    app.cleanup().await;
}

#[tokio::test]
async fn delete_client_cascades_to_projects_and_subscriptions() {
    let app = TestApp::spawn().await;
    let (client, project) = app.seed_client_and_project().await;

    app.db
        .update_project_status(project.project_id, ProjectStatus::Completed)
        .await
        .unwrap();
    app.db
        .delete_client(client.client_id, TEST_ACTOR)
        .await
        .unwrap();

    assert!(app
        .db
        .get_project(project.project_id)
        .await
        .unwrap()
        .is_none());
    let subscriptions = app
        .db
        .list_project_subscriptions(project.project_id)
        .await
        .unwrap();
    assert!(subscriptions.is_empty());

    app.cleanup().await;
}

#[tokio::test]
async fn delete_missing_client_fails() {
    let app = TestApp::spawn().await;

    let result = app
        .db
        .delete_client(uuid::Uuid::new_v4(), TEST_ACTOR)
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    app.cleanup().await;
}

#[tokio::test]
async fn create_project_for_missing_client_fails() {
    let app = TestApp::spawn().await;

    let input = subscription_service::models::CreateProject {
        client_id: uuid::Uuid::new_v4(),
        name: "Orphan".to_string(),
        description: None,
        start_date: chrono::Utc::now(),
        end_date: None,
        logo_url: None,
        primary_color: None,
        secondary_color: None,
        brand_colors: None,
        billing_mode: subscription_service::models::BillingMode::Monthly,
        billing_rate: None,
    };
    let result = app.db.create_project(&input, TEST_ACTOR).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    app.cleanup().await;
}

#[tokio::test]
async fn client_creation_and_deletion_are_audited() {
    let app = TestApp::spawn().await;
    let client = app.seed_client().await;

    app.db
        .delete_client(client.client_id, TEST_ACTOR)
        .await
        .unwrap();

    let entries: Vec<_> = app
        .db
        .audit()
        .entries_for(entity::CLIENT, client.client_id)
        .collect()
        .await;
    let actions: Vec<String> = entries.into_iter().map(|e| e.unwrap().action).collect();
    assert_eq!(
        actions,
        vec!["client_created".to_string(), "client_deleted".to_string()]
    );

    app.cleanup().await;
}

#[tokio::test]
async fn client_users_default_to_owner_role() {
    let app = TestApp::spawn().await;
    let (_, project) = app.seed_client_and_project().await;

    let user = app
        .db
        .create_client_user(&CreateClientUser {
            project_id: project.project_id,
            email: "viewer@acme.example".to_string(),
            username: "viewer".to_string(),
            full_name: Some("Portal Viewer".to_string()),
            role: None,
            permissions: None,
        })
        .await
        .unwrap();

    assert_eq!(user.role, "owner");
    assert!(user.is_active);

    let users = app.db.list_client_users(project.project_id).await.unwrap();
    assert_eq!(users.len(), 1);

    app.cleanup().await;
}

#[tokio::test]
async fn client_user_for_missing_project_fails() {
    let app = TestApp::spawn().await;

    let result = app
        .db
        .create_client_user(&CreateClientUser {
            project_id: uuid::Uuid::new_v4(),
            email: "nobody@acme.example".to_string(),
            username: "nobody".to_string(),
            full_name: None,
            role: None,
            permissions: None,
        })
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    app.cleanup().await;
}

#[tokio::test]
async fn delete_project_tears_down_subscriptions_and_users() {
    let app = TestApp::spawn().await;
    let (_, project) = app.seed_client_and_project().await;

    app.db
        .create_client_user(&CreateClientUser {
            project_id: project.project_id,
            email: "owner@acme.example".to_string(),
            username: "owner".to_string(),
            full_name: None,
            role: None,
            permissions: None,
        })
        .await
        .unwrap();

    app.db.delete_project(project.project_id).await.unwrap();

    assert!(app
        .db
        .get_project_subscription(project.project_id, ServiceKind::Mdm)
        .await
        .unwrap()
        .is_none());
    let users = app.db.list_client_users(project.project_id).await.unwrap();
    assert!(users.is_empty());

    app.cleanup().await;
}
