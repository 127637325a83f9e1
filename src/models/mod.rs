// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod billing;
pub mod certification;
pub mod course;
pub mod event;
pub mod user;

pub use billing::{
    Entitlement, PaymentKind, PaymentRecord, PricePlan, ProcessedStripeEvent,
    SubscriptionRecord, SubscriptionStatus,
};
pub use certification::{CertificationSetting, CertificationStatus, UserCertification};
pub use course::{Module, Video, VideoProgress};
pub use event::{Event, EventRegistration};
pub use user::{NotificationCategory, NotificationPreferences, Profile};
