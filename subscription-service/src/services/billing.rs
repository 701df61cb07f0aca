//! Billing engine: turns subscription state and usage history into
//! immutable billing records.

use std::collections::HashMap;

use crate::models::{
    aggregate, entity, AppendAudit, AuditAction, BillingRecord, ServiceSubscription,
};
use crate::services::audit::AuditTrail;
use crate::services::database::Database;
use crate::services::metrics::{record_billing_record, DB_QUERY_DURATION};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::{info, instrument};
use uuid::Uuid;

/// Computes and adjusts billing records.
#[derive(Clone)]
pub struct BillingEngine {
    pool: PgPool,
    audit: AuditTrail,
}

impl BillingEngine {
    pub fn new(db: &Database) -> Self {
        let pool = db.pool().clone();
        let audit = AuditTrail::new(pool.clone());
        Self { pool, audit }
    }

    /// Compute billing for a project over the half-open period
    /// `[period_start, period_end)` and persist one new record.
    ///
    /// Not idempotent: the engine does not dedupe by period, so two calls
    /// over overlapping windows create two records and the caller is
    /// responsible for not double-invoicing. Monthly costs count for
    /// subscriptions that are active at computation time (no proration).
    /// The scan runs under REPEATABLE READ so concurrent usage inserts are
    /// wholly included or wholly excluded.
    #[instrument(skip(self, actor), fields(project_id = %project_id))]
    pub async fn compute(
        &self,
        project_id: Uuid,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        actor: &str,
    ) -> Result<BillingRecord, AppError> {
        if period_start >= period_end {
            return Err(AppError::ValidationError(anyhow::anyhow!(
                "Billing period start must precede period end"
            )));
        }

        let timer = DB_QUERY_DURATION
            .with_label_values(&["compute_billing"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to set isolation level: {}", e))
            })?;

        let project_exists: Option<Uuid> =
            sqlx::query_scalar("SELECT project_id FROM projects WHERE project_id = $1")
                .bind(project_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to check project: {}", e))
                })?;
        if project_exists.is_none() {
            return Err(AppError::NotFound(anyhow::anyhow!("Project not found")));
        }

        let subscriptions = sqlx::query_as::<_, ServiceSubscription>(
            r#"
            SELECT subscription_id, project_id, service_kind, is_active, monthly_cost, cost_per_unit, service_config, activated_at, deactivated_at, created_utc, updated_utc
            FROM service_subscriptions
            WHERE project_id = $1
            ORDER BY service_kind
            "#,
        )
        .bind(project_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list subscriptions: {}", e))
        })?;

        let usage_rows = sqlx::query(
            r#"
            SELECT e.subscription_id, COALESCE(SUM(e.cost), 0) AS usage_cost
            FROM usage_events e
            JOIN service_subscriptions s ON e.subscription_id = s.subscription_id
            WHERE s.project_id = $1 AND e.recorded_at >= $2 AND e.recorded_at < $3
            GROUP BY e.subscription_id
            "#,
        )
        .bind(project_id)
        .bind(period_start)
        .bind(period_end)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sum usage: {}", e)))?;

        let mut usage_sums: HashMap<Uuid, Decimal> = HashMap::with_capacity(usage_rows.len());
        for row in &usage_rows {
            usage_sums.insert(row.get("subscription_id"), row.get("usage_cost"));
        }

        let totals = aggregate(&subscriptions, &usage_sums);
        let breakdown = serde_json::to_value(&totals.breakdown)
            .map_err(|e| AppError::InternalError(anyhow::Error::new(e)))?;

        let record_id = Uuid::new_v4();
        let record = sqlx::query_as::<_, BillingRecord>(
            r#"
            INSERT INTO billing_records (record_id, project_id, period_start, period_end, monthly_subtotal, usage_subtotal, total_cost, cost_breakdown)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING record_id, project_id, period_start, period_end, monthly_subtotal, usage_subtotal, manual_adjustment, adjustment_notes, total_cost, cost_breakdown, created_utc, updated_utc
            "#,
        )
        .bind(record_id)
        .bind(project_id)
        .bind(period_start)
        .bind(period_end)
        .bind(totals.monthly_subtotal)
        .bind(totals.usage_subtotal)
        .bind(totals.total())
        .bind(&breakdown)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create billing record: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(
            record_id = %record.record_id,
            monthly_subtotal = %record.monthly_subtotal,
            usage_subtotal = %record.usage_subtotal,
            total_cost = %record.total_cost,
            "Billing computed"
        );
        record_billing_record("compute");

        self.audit
            .record_best_effort(AppendAudit {
                actor: actor.to_string(),
                action: AuditAction::BillingComputed,
                entity_type: entity::BILLING_RECORD,
                entity_id: record.record_id,
                old_values: None,
                new_values: Some(json!({
                    "project_id": record.project_id,
                    "period_start": record.period_start,
                    "period_end": record.period_end,
                    "total_cost": record.total_cost,
                })),
                ip_address: None,
            })
            .await;

        Ok(record)
    }

    /// Apply a manual adjustment to an existing billing record.
    ///
    /// The delta accumulates into `manual_adjustment` (not overwrite), the
    /// notes are replaced, and `total_cost` is recomputed in the same
    /// statement so the record invariant holds at every point in time.
    #[instrument(skip(self, notes, actor), fields(record_id = %record_id))]
    pub async fn adjust(
        &self,
        record_id: Uuid,
        delta: Decimal,
        notes: &str,
        actor: &str,
    ) -> Result<BillingRecord, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["adjust_billing"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let old_total: Decimal = sqlx::query_scalar(
            "SELECT total_cost FROM billing_records WHERE record_id = $1 FOR UPDATE",
        )
        .bind(record_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get billing record: {}", e))
        })?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Billing record not found")))?;

        let record = sqlx::query_as::<_, BillingRecord>(
            r#"
            UPDATE billing_records
            SET manual_adjustment = manual_adjustment + $2,
                adjustment_notes = $3,
                total_cost = monthly_subtotal + usage_subtotal + manual_adjustment + $2,
                updated_utc = NOW()
            WHERE record_id = $1
            RETURNING record_id, project_id, period_start, period_end, monthly_subtotal, usage_subtotal, manual_adjustment, adjustment_notes, total_cost, cost_breakdown, created_utc, updated_utc
            "#,
        )
        .bind(record_id)
        .bind(delta)
        .bind(notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to adjust billing record: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(
            record_id = %record.record_id,
            old_total = %old_total,
            new_total = %record.total_cost,
            adjustment = %record.manual_adjustment,
            "Billing adjusted"
        );
        record_billing_record("adjust");

        self.audit
            .record_best_effort(AppendAudit {
                actor: actor.to_string(),
                action: AuditAction::BillingAdjusted,
                entity_type: entity::BILLING_RECORD,
                entity_id: record.record_id,
                old_values: Some(json!({ "total_cost": old_total })),
                new_values: Some(json!({
                    "total_cost": record.total_cost,
                    "manual_adjustment": record.manual_adjustment,
                    "adjustment_notes": record.adjustment_notes,
                })),
                ip_address: None,
            })
            .await;

        Ok(record)
    }

    /// Get a billing record by ID.
    #[instrument(skip(self), fields(record_id = %record_id))]
    pub async fn get_record(&self, record_id: Uuid) -> Result<Option<BillingRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_billing_record"])
            .start_timer();

        let record = sqlx::query_as::<_, BillingRecord>(
            r#"
            SELECT record_id, project_id, period_start, period_end, monthly_subtotal, usage_subtotal, manual_adjustment, adjustment_notes, total_cost, cost_breakdown, created_utc, updated_utc
            FROM billing_records
            WHERE record_id = $1
            "#,
        )
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get billing record: {}", e))
        })?;

        timer.observe_duration();

        Ok(record)
    }

    /// List billing records for a project, newest period first.
    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn list_for_project(&self, project_id: Uuid) -> Result<Vec<BillingRecord>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_billing_records"])
            .start_timer();

        let records = sqlx::query_as::<_, BillingRecord>(
            r#"
            SELECT record_id, project_id, period_start, period_end, monthly_subtotal, usage_subtotal, manual_adjustment, adjustment_notes, total_cost, cost_breakdown, created_utc, updated_utc
            FROM billing_records
            WHERE project_id = $1
            ORDER BY period_start DESC, created_utc DESC
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list billing records: {}", e))
        })?;

        timer.observe_duration();

        Ok(records)
    }
}
