//! Billing record model and the period aggregation arithmetic.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::subscription::ServiceSubscription;

/// Closed billing computation for a project over a half-open period
/// `[period_start, period_end)`.
///
/// Invariant: `total_cost = monthly_subtotal + usage_subtotal +
/// manual_adjustment`, including after any adjustment edit. Only the
/// adjustment fields mutate post-creation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BillingRecord {
    pub record_id: Uuid,
    pub project_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub monthly_subtotal: Decimal,
    pub usage_subtotal: Decimal,
    pub manual_adjustment: Decimal,
    pub adjustment_notes: Option<String>,
    pub total_cost: Decimal,
    pub cost_breakdown: serde_json::Value,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Per-service contribution inside a billing record's breakdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCost {
    pub monthly: Decimal,
    pub usage: Decimal,
}

/// Subtotals plus the per-kind breakdown, before persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BillingTotals {
    pub monthly_subtotal: Decimal,
    pub usage_subtotal: Decimal,
    /// Keyed by `ServiceKind::as_str`; only non-zero contributors appear.
    pub breakdown: BTreeMap<String, ServiceCost>,
}

impl BillingTotals {
    /// Total before any manual adjustment.
    pub fn total(&self) -> Decimal {
        self.monthly_subtotal + self.usage_subtotal
    }
}

/// Aggregate a project's subscriptions and their per-subscription usage sums
/// into billing subtotals.
///
/// Monthly cost counts when the subscription is active *now* (the current
/// flag, not a historical snapshot over the period; no proration). Usage
/// sums are whatever the caller summed over the period. Subscriptions that
/// contribute nothing are left out of the breakdown.
pub fn aggregate(
    subscriptions: &[ServiceSubscription],
    usage_sums: &HashMap<Uuid, Decimal>,
) -> BillingTotals {
    let mut totals = BillingTotals::default();

    for subscription in subscriptions {
        let monthly = if subscription.is_active {
            subscription.monthly_cost.unwrap_or(Decimal::ZERO)
        } else {
            Decimal::ZERO
        };
        let usage = usage_sums
            .get(&subscription.subscription_id)
            .copied()
            .unwrap_or(Decimal::ZERO);

        totals.monthly_subtotal += monthly;
        totals.usage_subtotal += usage;

        if !monthly.is_zero() || !usage.is_zero() {
            let entry = totals
                .breakdown
                .entry(subscription.service_kind.clone())
                .or_default();
            entry.monthly += monthly;
            entry.usage += usage;
        }
    }

    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::ServiceKind;
    use chrono::Utc;

    fn subscription(
        kind: ServiceKind,
        is_active: bool,
        monthly_cost: Option<Decimal>,
    ) -> ServiceSubscription {
        let now = Utc::now();
        ServiceSubscription {
            subscription_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            service_kind: kind.as_str().to_string(),
            is_active,
            monthly_cost,
            cost_per_unit: None,
            service_config: None,
            activated_at: is_active.then_some(now),
            deactivated_at: (!is_active).then_some(now),
            created_utc: now,
            updated_utc: now,
        }
    }

    #[test]
    fn sums_flat_monthly_costs_for_active_subscriptions() {
        let subs = vec![
            subscription(ServiceKind::Mdm, true, Some(Decimal::new(800, 0))),
            subscription(ServiceKind::Reporting, true, Some(Decimal::new(400, 0))),
            subscription(ServiceKind::Elearning, true, Some(Decimal::new(300, 0))),
        ];

        let totals = aggregate(&subs, &HashMap::new());

        assert_eq!(totals.monthly_subtotal, Decimal::new(1500, 0));
        assert_eq!(totals.usage_subtotal, Decimal::ZERO);
        assert_eq!(totals.total(), Decimal::new(1500, 0));
        assert_eq!(totals.breakdown.len(), 3);
    }

    #[test]
    fn inactive_subscription_contributes_no_monthly_cost() {
        let subs = vec![
            subscription(ServiceKind::Mdm, true, Some(Decimal::new(800, 0))),
            subscription(ServiceKind::Reporting, false, Some(Decimal::new(400, 0))),
        ];

        let totals = aggregate(&subs, &HashMap::new());

        assert_eq!(totals.monthly_subtotal, Decimal::new(800, 0));
        assert!(!totals.breakdown.contains_key("reporting"));
    }

    #[test]
    fn usage_sums_land_in_the_usage_subtotal_and_breakdown() {
        let sub = subscription(ServiceKind::Omnichannel, true, None);
        let mut sums = HashMap::new();
        // 50 events of quantity 1 at 0.10 per unit
        sums.insert(sub.subscription_id, Decimal::new(500, 2));

        let totals = aggregate(std::slice::from_ref(&sub), &sums);

        assert_eq!(totals.monthly_subtotal, Decimal::ZERO);
        assert_eq!(totals.usage_subtotal, Decimal::new(500, 2));
        let entry = &totals.breakdown["omnichannel"];
        assert_eq!(entry.usage, Decimal::new(500, 2));
        assert_eq!(entry.monthly, Decimal::ZERO);
    }

    #[test]
    fn unset_monthly_cost_counts_as_zero_and_stays_out_of_breakdown() {
        let subs = vec![subscription(ServiceKind::DynamicForms, true, None)];

        let totals = aggregate(&subs, &HashMap::new());

        assert_eq!(totals.total(), Decimal::ZERO);
        assert!(totals.breakdown.is_empty());
    }
}
