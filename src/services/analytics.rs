// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin dashboard summary.

use crate::db::SupabaseDb;
use crate::error::Result;
use crate::models::{CertificationStatus, Entitlement, PaymentRecord, UserCertification};
use serde::Serialize;
use std::collections::BTreeMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AnalyticsSummary {
    pub total_users: usize,
    pub active_subscribers: usize,
    /// Active or trialing entitlements per plan
    pub subscribers_by_plan: BTreeMap<String, usize>,
    /// Every certification status is present, zero included
    pub certifications_by_status: BTreeMap<String, usize>,
    /// Revenue in minor units per (lowercase) currency
    pub revenue_cents: BTreeMap<String, i64>,
    pub event_registrations: usize,
}

/// Fold raw rows into dashboard totals.
pub fn summarize(
    total_users: usize,
    entitlements: &[Entitlement],
    certifications: &[UserCertification],
    payments: &[PaymentRecord],
    event_registrations: usize,
) -> AnalyticsSummary {
    let mut summary = AnalyticsSummary {
        total_users,
        event_registrations,
        ..Default::default()
    };

    for entitlement in entitlements.iter().filter(|e| e.status.grants_access()) {
        summary.active_subscribers += 1;
        let plan = entitlement.plan.as_deref().unwrap_or("unknown");
        *summary.subscribers_by_plan.entry(plan.to_string()).or_default() += 1;
    }

    for status in CertificationStatus::ALL {
        summary
            .certifications_by_status
            .insert(status.as_str().to_string(), 0);
    }
    for uc in certifications {
        *summary
            .certifications_by_status
            .entry(uc.status.as_str().to_string())
            .or_default() += 1;
    }

    for payment in payments {
        *summary
            .revenue_cents
            .entry(payment.currency.to_lowercase())
            .or_default() += payment.amount_cents;
    }

    summary
}

#[derive(Clone)]
pub struct AnalyticsService {
    db: SupabaseDb,
}

impl AnalyticsService {
    pub fn new(db: SupabaseDb) -> Self {
        Self { db }
    }

    pub async fn summary(&self) -> Result<AnalyticsSummary> {
        let (profiles, entitlements, certifications, payments, registrations) = tokio::try_join!(
            self.db.list_profiles(),
            self.db.list_entitlements(),
            self.db.list_user_certifications(None),
            self.db.list_payments(),
            self.db.list_event_registrations(None),
        )?;

        let summary = summarize(
            profiles.len(),
            &entitlements,
            &certifications,
            &payments,
            registrations.len(),
        );
        tracing::debug!(
            users = summary.total_users,
            subscribers = summary.active_subscribers,
            "Computed analytics summary"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentKind, SubscriptionStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn entitlement(plan: &str, status: SubscriptionStatus) -> Entitlement {
        Entitlement {
            user_id: Uuid::new_v4(),
            plan: Some(plan.to_string()),
            status,
            stripe_subscription_id: None,
            started_at: None,
            updated_at: Utc::now(),
        }
    }

    fn payment(amount_cents: i64, currency: &str) -> PaymentRecord {
        PaymentRecord {
            id: Uuid::new_v4().to_string(),
            user_id: None,
            stripe_customer_id: None,
            kind: PaymentKind::Subscription,
            certification_id: None,
            amount_cents,
            currency: currency.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_summary_counts() {
        let entitlements = vec![
            entitlement("pro", SubscriptionStatus::Active),
            entitlement("pro", SubscriptionStatus::Trialing),
            entitlement("basic", SubscriptionStatus::Active),
            entitlement("basic", SubscriptionStatus::Canceled),
        ];
        let mut approved = UserCertification::new_pending(Uuid::new_v4(), Uuid::new_v4(), Utc::now());
        approved.status = CertificationStatus::Approved;
        let certifications = vec![
            approved,
            UserCertification::new_pending(Uuid::new_v4(), Uuid::new_v4(), Utc::now()),
        ];
        let payments = vec![payment(4900, "usd"), payment(100, "USD"), payment(2000, "eur")];

        let summary = summarize(12, &entitlements, &certifications, &payments, 3);

        assert_eq!(summary.total_users, 12);
        assert_eq!(summary.active_subscribers, 3);
        assert_eq!(summary.subscribers_by_plan["pro"], 2);
        assert_eq!(summary.subscribers_by_plan["basic"], 1);
        assert_eq!(summary.certifications_by_status["approved"], 1);
        assert_eq!(summary.certifications_by_status["pending"], 1);
        assert_eq!(summary.certifications_by_status["rejected"], 0);
        assert_eq!(summary.revenue_cents["usd"], 5000);
        assert_eq!(summary.revenue_cents["eur"], 2000);
        assert_eq!(summary.event_registrations, 3);
    }
}
