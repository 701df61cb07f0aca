//! Closed catalog of service kinds plus project-level enumerations.

use serde::{Deserialize, Serialize};

/// Service module kind. Closed set: adding a kind is a code change, which
/// keeps match exhaustiveness checkable across the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Mdm,
    DynamicForms,
    Reporting,
    Elearning,
    Omnichannel,
    CommunicationCampaigns,
}

impl ServiceKind {
    /// Every catalog entry, in subscription fan-out order.
    pub const ALL: [ServiceKind; 6] = [
        ServiceKind::Mdm,
        ServiceKind::DynamicForms,
        ServiceKind::Reporting,
        ServiceKind::Elearning,
        ServiceKind::Omnichannel,
        ServiceKind::CommunicationCampaigns,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Mdm => "mdm",
            ServiceKind::DynamicForms => "dynamic_forms",
            ServiceKind::Reporting => "reporting",
            ServiceKind::Elearning => "elearning",
            ServiceKind::Omnichannel => "omnichannel",
            ServiceKind::CommunicationCampaigns => "communication_campaigns",
        }
    }

    /// Parse the database string form. Returns `None` for anything outside
    /// the catalog; there is no fallback kind.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mdm" => Some(ServiceKind::Mdm),
            "dynamic_forms" => Some(ServiceKind::DynamicForms),
            "reporting" => Some(ServiceKind::Reporting),
            "elearning" => Some(ServiceKind::Elearning),
            "omnichannel" => Some(ServiceKind::Omnichannel),
            "communication_campaigns" => Some(ServiceKind::CommunicationCampaigns),
            _ => None,
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Project lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Inactive,
    Suspended,
    Completed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Inactive => "inactive",
            ProjectStatus::Suspended => "suspended",
            ProjectStatus::Completed => "completed",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "inactive" => ProjectStatus::Inactive,
            "suspended" => ProjectStatus::Suspended,
            "completed" => ProjectStatus::Completed,
            _ => ProjectStatus::Active,
        }
    }

    /// A client owning a project in one of these states cannot be deleted.
    pub fn blocks_client_deletion(&self) -> bool {
        matches!(self, ProjectStatus::Active | ProjectStatus::Suspended)
    }
}

/// How a project is billed overall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingMode {
    Monthly,
    Usage,
}

impl BillingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingMode::Monthly => "monthly",
            BillingMode::Usage => "usage",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "usage" => BillingMode::Usage,
            _ => BillingMode::Monthly,
        }
    }
}
