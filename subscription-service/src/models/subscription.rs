//! Service subscription model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::catalog::ServiceKind;

/// Activation and pricing state for one (project, service kind) pair.
/// Unique per pair; every project has exactly one row per catalog entry.
///
/// Invariant: `activated_at` is set and `deactivated_at` is null while
/// active, and vice versa while inactive.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ServiceSubscription {
    pub subscription_id: Uuid,
    pub project_id: Uuid,
    pub service_kind: String,
    pub is_active: bool,
    pub monthly_cost: Option<Decimal>,
    pub cost_per_unit: Option<Decimal>,
    pub service_config: Option<serde_json::Value>,
    pub activated_at: Option<DateTime<Utc>>,
    pub deactivated_at: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl ServiceSubscription {
    /// Get parsed service kind. `None` only if the row predates a catalog
    /// change, which the closed enum is meant to prevent.
    pub fn parsed_kind(&self) -> Option<ServiceKind> {
        ServiceKind::parse(&self.service_kind)
    }
}

/// Pricing/configuration update for a subscription. `None` fields keep the
/// stored value (COALESCE semantics).
#[derive(Debug, Clone, Default)]
pub struct SubscriptionPricing {
    pub monthly_cost: Option<Decimal>,
    pub cost_per_unit: Option<Decimal>,
    pub service_config: Option<serde_json::Value>,
}
