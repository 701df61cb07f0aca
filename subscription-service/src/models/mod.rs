//! Domain models for subscription-service.

mod audit;
mod billing;
mod catalog;
mod client;
mod project;
mod subscription;
mod usage;

pub use audit::{entity, AppendAudit, AuditAction, AuditEntry};
pub use billing::{aggregate, BillingRecord, BillingTotals, ServiceCost};
pub use catalog::{BillingMode, ProjectStatus, ServiceKind};
pub use client::{Client, ClientUser, CreateClient, CreateClientUser};
pub use project::{CreateProject, Project};
pub use subscription::{ServiceSubscription, SubscriptionPricing};
pub use usage::{RecordUsage, UsageEvent};
