//! Services module for subscription-service.

pub mod audit;
pub mod billing;
pub mod database;
pub mod ledger;
pub mod metrics;
pub mod usage;

pub use audit::AuditTrail;
pub use billing::BillingEngine;
pub use database::Database;
pub use ledger::ServiceLedger;
pub use metrics::{
    get_metrics, init_metrics, record_audit_append, record_billing_record, record_error,
    record_ledger_operation, record_usage_event,
};
pub use usage::UsageRecorder;
