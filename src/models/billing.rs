// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Billing records mirrored from Stripe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Subscription status, one variant per value of Stripe's status enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Incomplete,
    IncompleteExpired,
    Trialing,
    Active,
    PastDue,
    Canceled,
    Unpaid,
    Paused,
}

impl SubscriptionStatus {
    /// Map a Stripe `subscription.status` string.
    pub fn from_stripe(status: &str) -> Option<Self> {
        match status {
            "incomplete" => Some(Self::Incomplete),
            "incomplete_expired" => Some(Self::IncompleteExpired),
            "trialing" => Some(Self::Trialing),
            "active" => Some(Self::Active),
            "past_due" => Some(Self::PastDue),
            "canceled" => Some(Self::Canceled),
            "unpaid" => Some(Self::Unpaid),
            "paused" => Some(Self::Paused),
            _ => None,
        }
    }

    /// Whether the subscriber currently gets paid content.
    pub fn grants_access(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }
}

/// Stripe price id mapped to an internal plan name (`price_plans`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePlan {
    pub price_id: String,
    pub plan: String,
}

/// One-to-one mirror of a Stripe subscription (`subscriptions`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub stripe_subscription_id: String,
    pub stripe_customer_id: String,
    pub user_id: Option<Uuid>,
    pub price_id: Option<String>,
    pub plan: Option<String>,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub updated_at: DateTime<Utc>,
}

/// A user's current access tier (`entitlements`, keyed by user).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entitlement {
    pub user_id: Uuid,
    pub plan: Option<String>,
    pub status: SubscriptionStatus,
    pub stripe_subscription_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// What a ledger row paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    Subscription,
    Certification,
}

/// Payment ledger row (`payments`), keyed by the Stripe object id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    pub user_id: Option<Uuid>,
    pub stripe_customer_id: Option<String>,
    pub kind: PaymentKind,
    pub certification_id: Option<Uuid>,
    pub amount_cents: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// Stripe event id that has already been handled (`stripe_events`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedStripeEvent {
    pub id: String,
    pub event_type: String,
    pub processed_at: DateTime<Utc>,
}
