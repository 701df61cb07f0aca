//! Subscription Service - per-project service module lifecycle and billing core.
//!
//! The HTTP/CRUD layer lives elsewhere; it drives this crate through the
//! service structs in [`services`]: `ServiceLedger` for activation state,
//! `UsageRecorder` for the append-only usage ledger, `BillingEngine` for
//! period billing, and `AuditTrail` for the compliance log.

pub mod config;
pub mod models;
pub mod services;
