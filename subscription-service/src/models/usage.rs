//! Usage event model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One immutable unit-of-consumption record. `cost` is snapshotted at
/// recording time from the subscription's then-current per-unit rate, so
/// later rate changes never rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsageEvent {
    pub event_id: Uuid,
    pub subscription_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub usage_kind: String,
    pub quantity: i32,
    pub cost: Decimal,
    pub metadata: Option<serde_json::Value>,
}

/// Input for recording usage against an active subscription.
///
/// Negative quantities are the compensating-entry convention for correcting
/// a wrongly recorded event; zero is rejected.
#[derive(Debug, Clone)]
pub struct RecordUsage {
    pub subscription_id: Uuid,
    pub usage_kind: String,
    pub quantity: i32,
    pub metadata: Option<serde_json::Value>,
}
