// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::sync::Arc;
use stylist_academy::config::Config;
use stylist_academy::db::{tables, SupabaseDb};
use stylist_academy::models::{
    CertificationSetting, Entitlement, Module, NotificationPreferences, Profile,
    SubscriptionStatus, Video,
};
use stylist_academy::routes::create_router;
use stylist_academy::services::{stripe, CrmService, EmailService};
use stylist_academy::AppState;
use uuid::Uuid;

/// Create a test app with an in-memory database and mock integrations.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(
        Config::test_default(),
        SupabaseDb::new_in_memory(),
        EmailService::new_mock(),
        CrmService::new_mock(),
    ));
    (create_router(state.clone()), state)
}

/// Create a Supabase-style access token.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: Uuid, role: Option<&str>, signing_key: &[u8]) -> String {
    #[derive(Serialize)]
    struct AppMetadata<'a> {
        role: Option<&'a str>,
    }

    #[derive(Serialize)]
    struct Claims<'a> {
        sub: String,
        exp: usize,
        aud: &'a str,
        app_metadata: AppMetadata<'a>,
    }

    let claims = Claims {
        sub: user_id.to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
        aud: "authenticated",
        app_metadata: AppMetadata { role },
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )
    .unwrap()
}

/// Authenticated request with an optional JSON body.
#[allow(dead_code)]
pub fn authed_request(
    method: &str,
    uri: &str,
    token: &str,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Stripe webhook delivery signed with `secret`.
#[allow(dead_code)]
pub fn signed_webhook_request(event: &serde_json::Value, secret: &str) -> Request<Body> {
    let payload = event.to_string();
    let signature =
        stripe::signature_header(payload.as_bytes(), Utc::now().timestamp(), secret).unwrap();

    Request::builder()
        .method("POST")
        .uri("/webhooks/stripe")
        .header(header::CONTENT_TYPE, "application/json")
        .header("Stripe-Signature", signature)
        .body(Body::from(payload))
        .unwrap()
}

/// Stripe event envelope around one object.
#[allow(dead_code)]
pub fn stripe_event(id: &str, event_type: &str, object: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "object": "event",
        "type": event_type,
        "created": Utc::now().timestamp(),
        "data": { "object": object }
    })
}

#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
}

// ─── Seed Data ───────────────────────────────────────────────

#[allow(dead_code)]
pub async fn seed_profile(db: &SupabaseDb, email: &str, created_at: DateTime<Utc>) -> Profile {
    let profile = Profile {
        id: Uuid::new_v4(),
        email: email.to_string(),
        full_name: Some("Test Stylist".to_string()),
        city: Some("Portland".to_string()),
        avatar_url: None,
        stripe_customer_id: None,
        directory_listed: true,
        created_at,
    };
    db.upsert_profile(&profile).await.unwrap();
    profile
}

/// Entitlement for a user, started at `started_at`.
#[allow(dead_code)]
pub async fn seed_entitlement(
    db: &SupabaseDb,
    user_id: Uuid,
    status: SubscriptionStatus,
    started_at: DateTime<Utc>,
) -> Entitlement {
    let entitlement = Entitlement {
        user_id,
        plan: Some("pro".to_string()),
        status,
        stripe_subscription_id: Some(format!("sub_{}", user_id.simple())),
        started_at: Some(started_at),
        updated_at: Utc::now(),
    };
    db.upsert_entitlement(&entitlement).await.unwrap();
    entitlement
}

/// Profile with an active subscription started at `created_at`.
#[allow(dead_code)]
pub async fn seed_subscriber(db: &SupabaseDb, email: &str, created_at: DateTime<Utc>) -> Profile {
    let profile = seed_profile(db, email, created_at).await;
    seed_entitlement(db, profile.id, SubscriptionStatus::Active, created_at).await;
    profile
}

#[allow(dead_code)]
pub async fn opt_in_marketing(db: &SupabaseDb, user_id: Uuid) {
    let mut prefs = NotificationPreferences::defaults_for(user_id);
    prefs.marketing = true;
    db.upsert_notification_preferences(&prefs).await.unwrap();
}

/// A published module with `n` published videos spaced one week apart.
#[allow(dead_code)]
pub async fn seed_module(db: &SupabaseDb, title: &str, n: usize) -> (Module, Vec<Video>) {
    let module = Module {
        id: Uuid::new_v4(),
        course_id: None,
        title: title.to_string(),
        sort_order: 0,
        published: true,
    };
    db.upsert(tables::MODULES, &module, "id").await.unwrap();

    let mut videos = Vec::with_capacity(n);
    for i in 0..n {
        let video = Video {
            id: Uuid::new_v4(),
            module_id: Some(module.id),
            title: format!("{} part {}", title, i + 1),
            mux_playback_id: Some(format!("playback{}", i)),
            duration_seconds: Some(600),
            sort_order: i as i32,
            drip_days: (i * 7) as i32,
            published: true,
        };
        db.upsert(tables::VIDEOS, &video, "id").await.unwrap();
        videos.push(video);
    }
    (module, videos)
}

#[allow(dead_code)]
pub async fn seed_certification(
    db: &SupabaseDb,
    title: &str,
    price_cents: i64,
    required_module_ids: Vec<Uuid>,
) -> CertificationSetting {
    let setting = CertificationSetting {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: None,
        price_cents,
        required_module_ids,
        is_active: true,
    };
    db.upsert(tables::CERTIFICATION_SETTINGS, &setting, "id")
        .await
        .unwrap();
    setting
}

/// Enrollment far enough back that every seeded video is unlocked.
#[allow(dead_code)]
pub fn long_ago() -> DateTime<Utc> {
    Utc::now() - Duration::days(365)
}
