// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (Supabase Postgres via PostgREST).

pub mod query;
pub mod supabase;

pub use query::Query;
pub use supabase::{SupabaseDb, VideoSchedule};

/// Table names as constants.
pub mod tables {
    pub const PROFILES: &str = "profiles";
    pub const NOTIFICATION_PREFERENCES: &str = "notification_preferences";
    pub const MODULES: &str = "modules";
    pub const VIDEOS: &str = "videos";
    pub const VIDEO_PROGRESS: &str = "video_progress";
    pub const CERTIFICATION_SETTINGS: &str = "certification_settings";
    pub const USER_CERTIFICATIONS: &str = "user_certifications";
    pub const PRICE_PLANS: &str = "price_plans";
    pub const SUBSCRIPTIONS: &str = "subscriptions";
    pub const ENTITLEMENTS: &str = "entitlements";
    pub const PAYMENTS: &str = "payments";
    /// Stripe event ids already dispatched
    pub const STRIPE_EVENTS: &str = "stripe_events";
    pub const EVENTS: &str = "events";
    pub const EVENT_REGISTRATIONS: &str = "event_registrations";
}

/// Storage buckets.
pub mod buckets {
    pub const CERTIFICATION_SUBMISSIONS: &str = "certification-submissions";
}

/// Public URL of an object in a Supabase storage bucket.
pub fn storage_public_url(supabase_url: &str, bucket: &str, path: &str) -> String {
    let encoded_path = path
        .trim_start_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!(
        "{}/storage/v1/object/public/{}/{}",
        supabase_url.trim_end_matches('/'),
        bucket,
        encoded_path
    )
}
