//! Database service for subscription-service.

use crate::models::{
    entity, AppendAudit, AuditAction, Client, ClientUser, CreateClient, CreateClientUser,
    CreateProject, Project, ServiceKind, ServiceSubscription, SubscriptionPricing,
};
use crate::services::audit::AuditTrail;
use crate::services::metrics::DB_QUERY_DURATION;
use serde_json::json;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Database connection pool wrapper and record persistence.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    audit: AuditTrail,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "subscription-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        let audit = AuditTrail::new(pool.clone());
        Ok(Self { pool, audit })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get the audit trail bound to this pool.
    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // =========================================================================
    // Client Operations
    // =========================================================================

    /// Create a new client. Email is unique across clients.
    #[instrument(skip(self, input, actor), fields(email = %input.email))]
    pub async fn create_client(
        &self,
        input: &CreateClient,
        actor: &str,
    ) -> Result<Client, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_client"])
            .start_timer();

        let client_id = Uuid::new_v4();
        let client = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (client_id, name, email, legal_representative, contact_person, phone, logo_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING client_id, name, email, legal_representative, contact_person, phone, logo_url, created_utc, updated_utc
            "#,
        )
        .bind(client_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.legal_representative)
        .bind(&input.contact_person)
        .bind(&input.phone)
        .bind(&input.logo_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "A client with email {} already exists",
                    input.email
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create client: {}", e)),
        })?;

        timer.observe_duration();
        info!(client_id = %client.client_id, name = %client.name, "Client created");

        self.audit
            .record_best_effort(AppendAudit {
                actor: actor.to_string(),
                action: AuditAction::ClientCreated,
                entity_type: entity::CLIENT,
                entity_id: client.client_id,
                old_values: None,
                new_values: Some(json!({ "name": client.name, "email": client.email })),
                ip_address: None,
            })
            .await;

        Ok(client)
    }

    /// Get a client by ID.
    #[instrument(skip(self), fields(client_id = %client_id))]
    pub async fn get_client(&self, client_id: Uuid) -> Result<Option<Client>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_client"])
            .start_timer();

        let client = sqlx::query_as::<_, Client>(
            r#"
            SELECT client_id, name, email, legal_representative, contact_person, phone, logo_url, created_utc, updated_utc
            FROM clients
            WHERE client_id = $1
            "#,
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get client: {}", e)))?;

        timer.observe_duration();

        Ok(client)
    }

    /// Delete a client. Refused while the client owns any project in an
    /// active or suspended state; a permitted delete cascades to owned
    /// projects and everything they own.
    #[instrument(skip(self, actor), fields(client_id = %client_id))]
    pub async fn delete_client(&self, client_id: Uuid, actor: &str) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_client"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let client = sqlx::query_as::<_, Client>(
            r#"
            SELECT client_id, name, email, legal_representative, contact_person, phone, logo_url, created_utc, updated_utc
            FROM clients
            WHERE client_id = $1
            FOR UPDATE
            "#,
        )
        .bind(client_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get client: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

        let blocking: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM projects
            WHERE client_id = $1 AND status IN ('active', 'suspended')
            "#,
        )
        .bind(client_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to count active projects: {}", e))
        })?;

        if blocking > 0 {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Client has {} active or suspended project(s)",
                blocking
            )));
        }

        sqlx::query("DELETE FROM clients WHERE client_id = $1")
            .bind(client_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete client: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(client_id = %client_id, "Client deleted");

        self.audit
            .record_best_effort(AppendAudit {
                actor: actor.to_string(),
                action: AuditAction::ClientDeleted,
                entity_type: entity::CLIENT,
                entity_id: client_id,
                old_values: Some(json!({ "name": client.name, "email": client.email })),
                new_values: None,
                ip_address: None,
            })
            .await;

        Ok(())
    }

    // =========================================================================
    // Project Operations
    // =========================================================================

    /// Create a new project and fan out one inactive subscription per
    /// catalog kind, all in a single transaction.
    #[instrument(skip(self, input, actor), fields(client_id = %input.client_id))]
    pub async fn create_project(
        &self,
        input: &CreateProject,
        actor: &str,
    ) -> Result<Project, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_project"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let owner_exists: Option<Uuid> =
            sqlx::query_scalar("SELECT client_id FROM clients WHERE client_id = $1")
                .bind(input.client_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to check client: {}", e))
                })?;
        if owner_exists.is_none() {
            return Err(AppError::NotFound(anyhow::anyhow!("Client not found")));
        }

        let project_id = Uuid::new_v4();
        let project = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (project_id, client_id, name, description, start_date, end_date, logo_url, primary_color, secondary_color, brand_colors, billing_mode, billing_rate)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING project_id, client_id, name, description, status, start_date, end_date, logo_url, primary_color, secondary_color, brand_colors, billing_mode, billing_rate, created_utc, updated_utc
            "#,
        )
        .bind(project_id)
        .bind(input.client_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(&input.logo_url)
        .bind(&input.primary_color)
        .bind(&input.secondary_color)
        .bind(&input.brand_colors)
        .bind(input.billing_mode.as_str())
        .bind(input.billing_rate)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create project: {}", e)))?;

        for kind in ServiceKind::ALL {
            sqlx::query(
                r#"
                INSERT INTO service_subscriptions (subscription_id, project_id, service_kind)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(project_id)
            .bind(kind.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!(
                    "Failed to create {} subscription: {}",
                    kind,
                    e
                ))
            })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(project_id = %project.project_id, name = %project.name, "Project created");

        self.audit
            .record_best_effort(AppendAudit {
                actor: actor.to_string(),
                action: AuditAction::ProjectCreated,
                entity_type: entity::PROJECT,
                entity_id: project.project_id,
                old_values: None,
                new_values: Some(json!({
                    "name": project.name,
                    "client_id": project.client_id,
                    "billing_mode": project.billing_mode,
                })),
                ip_address: None,
            })
            .await;

        Ok(project)
    }

    /// Get a project by ID.
    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_project"])
            .start_timer();

        let project = sqlx::query_as::<_, Project>(
            r#"
            SELECT project_id, client_id, name, description, status, start_date, end_date, logo_url, primary_color, secondary_color, brand_colors, billing_mode, billing_rate, created_utc, updated_utc
            FROM projects
            WHERE project_id = $1
            "#,
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get project: {}", e)))?;

        timer.observe_duration();

        Ok(project)
    }

    /// Update a project's lifecycle status.
    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn update_project_status(
        &self,
        project_id: Uuid,
        status: crate::models::ProjectStatus,
    ) -> Result<Option<Project>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_project_status"])
            .start_timer();

        let project = sqlx::query_as::<_, Project>(
            r#"
            UPDATE projects
            SET status = $2, updated_utc = NOW()
            WHERE project_id = $1
            RETURNING project_id, client_id, name, description, status, start_date, end_date, logo_url, primary_color, secondary_color, brand_colors, billing_mode, billing_rate, created_utc, updated_utc
            "#,
        )
        .bind(project_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update project status: {}", e))
        })?;

        timer.observe_duration();

        Ok(project)
    }

    /// Delete a project. Full teardown: cascades to subscriptions, their
    /// usage events, portal users and billing records.
    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn delete_project(&self, project_id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_project"])
            .start_timer();

        let result = sqlx::query("DELETE FROM projects WHERE project_id = $1")
            .bind(project_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete project: {}", e))
            })?;

        timer.observe_duration();

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Project not found")));
        }

        info!(project_id = %project_id, "Project deleted");
        Ok(())
    }

    // =========================================================================
    // Subscription Operations
    // =========================================================================

    /// Get a subscription by ID.
    #[instrument(skip(self), fields(subscription_id = %subscription_id))]
    pub async fn get_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<ServiceSubscription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_subscription"])
            .start_timer();

        let subscription = sqlx::query_as::<_, ServiceSubscription>(
            r#"
            SELECT subscription_id, project_id, service_kind, is_active, monthly_cost, cost_per_unit, service_config, activated_at, deactivated_at, created_utc, updated_utc
            FROM service_subscriptions
            WHERE subscription_id = $1
            "#,
        )
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get subscription: {}", e)))?;

        timer.observe_duration();

        Ok(subscription)
    }

    /// Get the subscription for one (project, service kind) pair.
    #[instrument(skip(self), fields(project_id = %project_id, kind = %kind))]
    pub async fn get_project_subscription(
        &self,
        project_id: Uuid,
        kind: ServiceKind,
    ) -> Result<Option<ServiceSubscription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_project_subscription"])
            .start_timer();

        let subscription = sqlx::query_as::<_, ServiceSubscription>(
            r#"
            SELECT subscription_id, project_id, service_kind, is_active, monthly_cost, cost_per_unit, service_config, activated_at, deactivated_at, created_utc, updated_utc
            FROM service_subscriptions
            WHERE project_id = $1 AND service_kind = $2
            "#,
        )
        .bind(project_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get subscription: {}", e)))?;

        timer.observe_duration();

        Ok(subscription)
    }

    /// List every subscription a project owns, in catalog order.
    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn list_project_subscriptions(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<ServiceSubscription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_project_subscriptions"])
            .start_timer();

        let subscriptions = sqlx::query_as::<_, ServiceSubscription>(
            r#"
            SELECT subscription_id, project_id, service_kind, is_active, monthly_cost, cost_per_unit, service_config, activated_at, deactivated_at, created_utc, updated_utc
            FROM service_subscriptions
            WHERE project_id = $1
            ORDER BY service_kind
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list subscriptions: {}", e))
        })?;

        timer.observe_duration();

        Ok(subscriptions)
    }

    /// Update a subscription's pricing or configuration blob. `None` fields
    /// keep the stored value.
    #[instrument(skip(self, input), fields(project_id = %project_id, kind = %kind))]
    pub async fn update_subscription_pricing(
        &self,
        project_id: Uuid,
        kind: ServiceKind,
        input: &SubscriptionPricing,
    ) -> Result<ServiceSubscription, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_subscription_pricing"])
            .start_timer();

        let subscription = sqlx::query_as::<_, ServiceSubscription>(
            r#"
            UPDATE service_subscriptions
            SET monthly_cost = COALESCE($3, monthly_cost),
                cost_per_unit = COALESCE($4, cost_per_unit),
                service_config = COALESCE($5, service_config),
                updated_utc = NOW()
            WHERE project_id = $1 AND service_kind = $2
            RETURNING subscription_id, project_id, service_kind, is_active, monthly_cost, cost_per_unit, service_config, activated_at, deactivated_at, created_utc, updated_utc
            "#,
        )
        .bind(project_id)
        .bind(kind.as_str())
        .bind(input.monthly_cost)
        .bind(input.cost_per_unit)
        .bind(&input.service_config)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update pricing: {}", e))
        })?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Subscription not found")))?;

        timer.observe_duration();

        Ok(subscription)
    }

    // =========================================================================
    // Client User Operations
    // =========================================================================

    /// Create a portal user scoped to a project.
    #[instrument(skip(self, input), fields(project_id = %input.project_id))]
    pub async fn create_client_user(
        &self,
        input: &CreateClientUser,
    ) -> Result<ClientUser, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_client_user"])
            .start_timer();

        let user_id = Uuid::new_v4();
        let role = input.role.as_deref().unwrap_or("owner");
        let user = sqlx::query_as::<_, ClientUser>(
            r#"
            INSERT INTO client_users (user_id, project_id, email, username, full_name, role, permissions)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING user_id, project_id, email, username, full_name, role, permissions, is_active, created_utc, updated_utc
            "#,
        )
        .bind(user_id)
        .bind(input.project_id)
        .bind(&input.email)
        .bind(&input.username)
        .bind(&input.full_name)
        .bind(role)
        .bind(&input.permissions)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::NotFound(anyhow::anyhow!("Project not found"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create client user: {}", e)),
        })?;

        timer.observe_duration();

        Ok(user)
    }

    /// List portal users for a project.
    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn list_client_users(&self, project_id: Uuid) -> Result<Vec<ClientUser>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_client_users"])
            .start_timer();

        let users = sqlx::query_as::<_, ClientUser>(
            r#"
            SELECT user_id, project_id, email, username, full_name, role, permissions, is_active, created_utc, updated_utc
            FROM client_users
            WHERE project_id = $1
            ORDER BY username
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list client users: {}", e))
        })?;

        timer.observe_duration();

        Ok(users)
    }
}
