//! Usage recorder: append-only consumption ledger for usage-priced services.

use crate::models::{entity, AppendAudit, AuditAction, RecordUsage, ServiceSubscription, UsageEvent};
use crate::services::audit::AuditTrail;
use crate::services::database::Database;
use crate::services::metrics::{record_usage_event, DB_QUERY_DURATION};
use rust_decimal::Decimal;
use serde_json::json;
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use tracing::{info, instrument};

/// Appends immutable usage events against active subscriptions.
///
/// There is no update or delete: a wrong record is corrected with a
/// compensating negative-quantity event.
#[derive(Clone)]
pub struct UsageRecorder {
    pool: PgPool,
    audit: AuditTrail,
}

impl UsageRecorder {
    pub fn new(db: &Database) -> Self {
        let pool = db.pool().clone();
        let audit = AuditTrail::new(pool.clone());
        Self { pool, audit }
    }

    /// Record one usage event. The subscription must exist and be active;
    /// the cost snapshot is `quantity * cost_per_unit` at the current rate
    /// (zero for flat-fee services with no per-unit rate), so later rate
    /// changes never rewrite history.
    #[instrument(skip(self, input, actor), fields(subscription_id = %input.subscription_id, usage_kind = %input.usage_kind))]
    pub async fn record(&self, input: &RecordUsage, actor: &str) -> Result<UsageEvent, AppError> {
        if input.quantity == 0 {
            return Err(AppError::ValidationError(anyhow::anyhow!(
                "Usage quantity must be non-zero"
            )));
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_usage"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let subscription = sqlx::query_as::<_, ServiceSubscription>(
            r#"
            SELECT subscription_id, project_id, service_kind, is_active, monthly_cost, cost_per_unit, service_config, activated_at, deactivated_at, created_utc, updated_utc
            FROM service_subscriptions
            WHERE subscription_id = $1
            "#,
        )
        .bind(input.subscription_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get subscription: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Subscription not found")))?;

        if !subscription.is_active {
            return Err(AppError::InvalidState(anyhow::anyhow!(
                "Cannot record usage against an inactive {} subscription",
                subscription.service_kind
            )));
        }

        let rate = subscription.cost_per_unit.unwrap_or(Decimal::ZERO);
        let cost = Decimal::from(input.quantity) * rate;

        let event_id = uuid::Uuid::new_v4();
        let event = sqlx::query_as::<_, UsageEvent>(
            r#"
            INSERT INTO usage_events (event_id, subscription_id, usage_kind, quantity, cost, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING event_id, subscription_id, recorded_at, usage_kind, quantity, cost, metadata
            "#,
        )
        .bind(event_id)
        .bind(input.subscription_id)
        .bind(&input.usage_kind)
        .bind(input.quantity)
        .bind(cost)
        .bind(&input.metadata)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to record usage: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(
            event_id = %event.event_id,
            quantity = event.quantity,
            cost = %event.cost,
            "Usage recorded"
        );
        record_usage_event(&event.usage_kind);

        self.audit
            .record_best_effort(AppendAudit {
                actor: actor.to_string(),
                action: AuditAction::UsageRecorded,
                entity_type: entity::USAGE_EVENT,
                entity_id: event.event_id,
                old_values: None,
                new_values: Some(json!({
                    "subscription_id": event.subscription_id,
                    "usage_kind": event.usage_kind,
                    "quantity": event.quantity,
                    "cost": event.cost,
                })),
                ip_address: None,
            })
            .await;

        Ok(event)
    }

    /// List usage events for a subscription, oldest first.
    #[instrument(skip(self), fields(subscription_id = %subscription_id))]
    pub async fn list_for_subscription(
        &self,
        subscription_id: uuid::Uuid,
    ) -> Result<Vec<UsageEvent>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_usage_events"])
            .start_timer();

        let events = sqlx::query_as::<_, UsageEvent>(
            r#"
            SELECT event_id, subscription_id, recorded_at, usage_kind, quantity, cost, metadata
            FROM usage_events
            WHERE subscription_id = $1
            ORDER BY recorded_at, event_id
            "#,
        )
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list usage events: {}", e))
        })?;

        timer.observe_duration();

        Ok(events)
    }
}
