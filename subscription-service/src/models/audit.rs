//! Audit trail models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Action tag written with every state-changing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    ClientCreated,
    ClientDeleted,
    ProjectCreated,
    ServiceActivated,
    ServiceDeactivated,
    UsageRecorded,
    BillingComputed,
    BillingAdjusted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::ClientCreated => "client_created",
            AuditAction::ClientDeleted => "client_deleted",
            AuditAction::ProjectCreated => "project_created",
            AuditAction::ServiceActivated => "service_activated",
            AuditAction::ServiceDeactivated => "service_deactivated",
            AuditAction::UsageRecorded => "usage_recorded",
            AuditAction::BillingComputed => "billing_computed",
            AuditAction::BillingAdjusted => "billing_adjusted",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Entity type labels used for the (entity_type, entity_id) weak reference.
pub mod entity {
    pub const CLIENT: &str = "client";
    pub const PROJECT: &str = "project";
    pub const SERVICE_SUBSCRIPTION: &str = "service_subscription";
    pub const USAGE_EVENT: &str = "usage_event";
    pub const BILLING_RECORD: &str = "billing_record";
}

/// Immutable audit fact. Never updated or deleted; `entry_id` is the
/// append (and therefore time) order.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditEntry {
    pub entry_id: i64,
    pub actor: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub recorded_utc: DateTime<Utc>,
}

/// Input for appending an audit entry.
#[derive(Debug, Clone)]
pub struct AppendAudit {
    pub actor: String,
    pub action: AuditAction,
    pub entity_type: &'static str,
    pub entity_id: Uuid,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub ip_address: Option<String>,
}
