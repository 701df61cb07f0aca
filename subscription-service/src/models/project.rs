//! Project model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::catalog::{BillingMode, ProjectStatus};

/// Project: the unit of billing and service configuration. Owned by exactly
/// one client; holds a non-owning `client_id` back-reference.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub project_id: Uuid,
    pub client_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub brand_colors: Option<serde_json::Value>,
    pub billing_mode: String,
    pub billing_rate: Option<Decimal>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Project {
    pub fn parsed_status(&self) -> ProjectStatus {
        ProjectStatus::from_string(&self.status)
    }

    pub fn parsed_billing_mode(&self) -> BillingMode {
        BillingMode::from_string(&self.billing_mode)
    }
}

/// Input for creating a project. Creation also fans out one inactive
/// subscription per catalog kind in the same transaction.
#[derive(Debug, Clone)]
pub struct CreateProject {
    pub client_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub brand_colors: Option<serde_json::Value>,
    pub billing_mode: BillingMode,
    pub billing_rate: Option<Decimal>,
}
