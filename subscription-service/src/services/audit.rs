//! Append-only audit trail.

use crate::models::{AppendAudit, AuditEntry};
use crate::services::metrics::{record_audit_append, record_error, DB_QUERY_DURATION};
use futures::stream::BoxStream;
use futures::StreamExt;
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Append-only log of every state-changing action, for compliance and
/// debugging. Entries are never updated or deleted.
#[derive(Clone)]
pub struct AuditTrail {
    pool: PgPool,
}

impl AuditTrail {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append one audit entry. Pure append, no business validation.
    #[instrument(skip(self, input), fields(action = %input.action, entity_type = input.entity_type))]
    pub async fn record(&self, input: AppendAudit) -> Result<AuditEntry, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["audit_record"])
            .start_timer();

        let entry = sqlx::query_as::<_, AuditEntry>(
            r#"
            INSERT INTO audit_entries (actor, action, entity_type, entity_id, old_values, new_values, ip_address)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING entry_id, actor, action, entity_type, entity_id, old_values, new_values, ip_address, recorded_utc
            "#,
        )
        .bind(&input.actor)
        .bind(input.action.as_str())
        .bind(input.entity_type)
        .bind(input.entity_id)
        .bind(&input.old_values)
        .bind(&input.new_values)
        .bind(&input.ip_address)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to append audit entry: {}", e)))?;

        timer.observe_duration();
        record_audit_append(input.action.as_str());

        Ok(entry)
    }

    /// Append an audit entry after the primary operation has committed.
    /// A failed append must not undo the committed change, so the failure
    /// is surfaced as a warning plus an error metric instead of an `Err`.
    pub async fn record_best_effort(&self, input: AppendAudit) {
        let action = input.action;
        if let Err(e) = self.record(input).await {
            warn!(
                action = action.as_str(),
                error = %e,
                "Audit append failed after committed state change"
            );
            record_error("audit_append", action.as_str());
        }
    }

    /// Lazy, time-ascending stream of audit entries for one entity.
    /// Finite and restartable: every call re-reads from storage.
    pub fn entries_for<'a>(
        &'a self,
        entity_type: &'a str,
        entity_id: Uuid,
    ) -> BoxStream<'a, Result<AuditEntry, AppError>> {
        sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT entry_id, actor, action, entity_type, entity_id, old_values, new_values, ip_address, recorded_utc
            FROM audit_entries
            WHERE entity_type = $1 AND entity_id = $2
            ORDER BY entry_id
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch(&self.pool)
        .map(|row| {
            row.map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to read audit entries: {}", e))
            })
        })
        .boxed()
    }
}
