// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile and notification preference records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User profile stored in `profiles` (id matches the auth user id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    /// City shown in the stylist directory
    pub city: Option<String>,
    pub avatar_url: Option<String>,
    /// Stripe customer linked at first checkout
    pub stripe_customer_id: Option<String>,
    /// Opted in to the public stylist directory
    #[serde(default)]
    pub directory_listed: bool,
    pub created_at: DateTime<Utc>,
}

/// Categories of email a user can opt out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCategory {
    CertificationUpdates,
    Billing,
    Events,
    Marketing,
}

/// Per-user notification preferences (`notification_preferences`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct NotificationPreferences {
    pub user_id: Uuid,
    pub certification_updates: bool,
    pub billing: bool,
    pub events: bool,
    pub marketing: bool,
}

impl NotificationPreferences {
    /// Preferences assumed when the user never saved any:
    /// transactional mail on, marketing off.
    pub fn defaults_for(user_id: Uuid) -> Self {
        Self {
            user_id,
            certification_updates: true,
            billing: true,
            events: true,
            marketing: false,
        }
    }

    pub fn allows(&self, category: NotificationCategory) -> bool {
        match category {
            NotificationCategory::CertificationUpdates => self.certification_updates,
            NotificationCategory::Billing => self.billing,
            NotificationCategory::Events => self.events,
            NotificationCategory::Marketing => self.marketing,
        }
    }
}
