//! Service activation ledger: the per-(project, kind) state machine.

use crate::models::{entity, AppendAudit, AuditAction, ServiceKind, ServiceSubscription};
use crate::services::audit::AuditTrail;
use crate::services::database::Database;
use crate::services::metrics::{record_ledger_operation, DB_QUERY_DURATION};
use serde_json::json;
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;

/// Owns the activation state of every (project, service kind) pair.
///
/// Every transition is a single `UPDATE ... RETURNING` statement, so two
/// concurrent callers race to one of the two valid outcomes and can never
/// tear the flag/timestamp pair.
#[derive(Clone)]
pub struct ServiceLedger {
    pool: PgPool,
    audit: AuditTrail,
}

impl ServiceLedger {
    pub fn new(db: &Database) -> Self {
        let pool = db.pool().clone();
        let audit = AuditTrail::new(pool.clone());
        Self { pool, audit }
    }

    /// Activate a service for a project. No-op (without an audit entry)
    /// when already active.
    #[instrument(skip(self, actor), fields(project_id = %project_id, kind = %kind))]
    pub async fn activate(
        &self,
        project_id: Uuid,
        kind: ServiceKind,
        actor: &str,
    ) -> Result<ServiceSubscription, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["ledger_activate"])
            .start_timer();

        let transitioned = sqlx::query_as::<_, ServiceSubscription>(
            r#"
            UPDATE service_subscriptions
            SET is_active = TRUE, activated_at = NOW(), deactivated_at = NULL, updated_utc = NOW()
            WHERE project_id = $1 AND service_kind = $2 AND is_active = FALSE
            RETURNING subscription_id, project_id, service_kind, is_active, monthly_cost, cost_per_unit, service_config, activated_at, deactivated_at, created_utc, updated_utc
            "#,
        )
        .bind(project_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to activate service: {}", e)))?;

        timer.observe_duration();

        let subscription = match transitioned {
            Some(subscription) => subscription,
            // Already active, or the row is missing entirely.
            None => {
                return self
                    .current(project_id, kind)
                    .await?
                    .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Subscription not found")));
            }
        };

        info!(subscription_id = %subscription.subscription_id, kind = %kind, "Service activated");
        record_ledger_operation("activate", kind.as_str());
        self.audit
            .record_best_effort(self.transition_audit(&subscription, actor))
            .await;

        Ok(subscription)
    }

    /// Deactivate a service for a project. No-op (without an audit entry)
    /// when already inactive. The previous `activated_at` survives only in
    /// the audit trail, not on the live record.
    #[instrument(skip(self, actor), fields(project_id = %project_id, kind = %kind))]
    pub async fn deactivate(
        &self,
        project_id: Uuid,
        kind: ServiceKind,
        actor: &str,
    ) -> Result<ServiceSubscription, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["ledger_deactivate"])
            .start_timer();

        let transitioned = sqlx::query_as::<_, ServiceSubscription>(
            r#"
            UPDATE service_subscriptions
            SET is_active = FALSE, deactivated_at = NOW(), activated_at = NULL, updated_utc = NOW()
            WHERE project_id = $1 AND service_kind = $2 AND is_active = TRUE
            RETURNING subscription_id, project_id, service_kind, is_active, monthly_cost, cost_per_unit, service_config, activated_at, deactivated_at, created_utc, updated_utc
            "#,
        )
        .bind(project_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to deactivate service: {}", e))
        })?;

        timer.observe_duration();

        let subscription = match transitioned {
            Some(subscription) => subscription,
            None => {
                return self
                    .current(project_id, kind)
                    .await?
                    .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Subscription not found")));
            }
        };

        info!(subscription_id = %subscription.subscription_id, kind = %kind, "Service deactivated");
        record_ledger_operation("deactivate", kind.as_str());
        self.audit
            .record_best_effort(self.transition_audit(&subscription, actor))
            .await;

        Ok(subscription)
    }

    /// Unconditionally invert the active flag and stamp the matching
    /// timestamp. Not idempotent: two toggles in a row restore the visible
    /// state but write two audit entries.
    #[instrument(skip(self, actor), fields(project_id = %project_id, kind = %kind))]
    pub async fn toggle(
        &self,
        project_id: Uuid,
        kind: ServiceKind,
        actor: &str,
    ) -> Result<ServiceSubscription, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["ledger_toggle"])
            .start_timer();

        // In the SET expressions is_active still reads the pre-update value.
        let subscription = sqlx::query_as::<_, ServiceSubscription>(
            r#"
            UPDATE service_subscriptions
            SET is_active = NOT is_active,
                activated_at = CASE WHEN NOT is_active THEN NOW() ELSE NULL END,
                deactivated_at = CASE WHEN NOT is_active THEN NULL ELSE NOW() END,
                updated_utc = NOW()
            WHERE project_id = $1 AND service_kind = $2
            RETURNING subscription_id, project_id, service_kind, is_active, monthly_cost, cost_per_unit, service_config, activated_at, deactivated_at, created_utc, updated_utc
            "#,
        )
        .bind(project_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to toggle service: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Subscription not found")))?;

        timer.observe_duration();

        info!(
            subscription_id = %subscription.subscription_id,
            kind = %kind,
            is_active = subscription.is_active,
            "Service toggled"
        );
        record_ledger_operation("toggle", kind.as_str());
        self.audit
            .record_best_effort(self.transition_audit(&subscription, actor))
            .await;

        Ok(subscription)
    }

    /// Read the current state without transitioning.
    #[instrument(skip(self), fields(project_id = %project_id, kind = %kind))]
    pub async fn current(
        &self,
        project_id: Uuid,
        kind: ServiceKind,
    ) -> Result<Option<ServiceSubscription>, AppError> {
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

        Ok(subscription)
    }

    fn transition_audit(&self, subscription: &ServiceSubscription, actor: &str) -> AppendAudit {
        let action = if subscription.is_active {
            AuditAction::ServiceActivated
        } else {
            AuditAction::ServiceDeactivated
        };
        AppendAudit {
            actor: actor.to_string(),
            action,
            entity_type: entity::SERVICE_SUBSCRIPTION,
            entity_id: subscription.subscription_id,
            old_values: Some(json!({ "is_active": !subscription.is_active })),
            new_values: Some(json!({
                "is_active": subscription.is_active,
                "activated_at": subscription.activated_at,
                "deactivated_at": subscription.deactivated_at,
            })),
            ip_address: None,
        }
    }
}
