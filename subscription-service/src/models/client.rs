//! Client organization and project-scoped portal user models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Client organization. Owns zero or more projects.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Client {
    pub client_id: Uuid,
    pub name: String,
    pub email: String,
    pub legal_representative: Option<String>,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub logo_url: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating a client. Email must be unique across clients.
#[derive(Debug, Clone)]
pub struct CreateClient {
    pub name: String,
    pub email: String,
    pub legal_representative: Option<String>,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub logo_url: Option<String>,
}

/// Portal user scoped to one project. The core stores and lists these;
/// credential issuance is the collaborator layer's concern.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClientUser {
    pub user_id: Uuid,
    pub project_id: Uuid,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub role: String,
    pub permissions: Option<serde_json::Value>,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating a project-scoped portal user.
#[derive(Debug, Clone)]
pub struct CreateClientUser {
    pub project_id: Uuid,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    /// Defaults to "owner" when unset.
    pub role: Option<String>,
    pub permissions: Option<serde_json::Value>,
}
