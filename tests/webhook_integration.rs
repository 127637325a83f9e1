// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Integration tests for the Stripe webhook endpoint.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use stylist_academy::db::tables;
use stylist_academy::models::{
    CertificationStatus, PaymentKind, PricePlan, Profile, SubscriptionStatus,
};
use tower::ServiceExt;

mod common;

const SECRET: &str = "whsec_test_secret"; // Matches Config::test_default()

async fn customer(state: &stylist_academy::AppState, email: &str, customer_id: &str) -> Profile {
    let mut profile = common::seed_profile(&state.db, email, common::long_ago()).await;
    profile.stripe_customer_id = Some(customer_id.to_string());
    state.db.upsert_profile(&profile).await.unwrap();
    profile
}

fn subscription(id: &str, customer: &str, status: &str, price: &str) -> serde_json::Value {
    json!({
        "id": id,
        "object": "subscription",
        "customer": customer,
        "status": status,
        "cancel_at_period_end": false,
        "current_period_end": 1_900_000_000,
        "start_date": 1_700_000_000,
        "items": {"object": "list", "data": [{"price": {"id": price}}]},
        "metadata": {}
    })
}

#[tokio::test]
async fn test_missing_signature_rejected() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/stripe")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"id":"evt_1"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "invalid_signature");
}

#[tokio::test]
async fn test_wrong_secret_rejected() {
    let (app, state) = common::create_test_app();
    let event = common::stripe_event("evt_bad", "invoice.paid", json!({}));

    let response = app
        .oneshot(common::signed_webhook_request(&event, "whsec_attacker"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!state.db.is_stripe_event_processed("evt_bad").await.unwrap());
}

#[tokio::test]
async fn test_malformed_payload_rejected() {
    let (app, _) = common::create_test_app();

    // Signed correctly, but not an event envelope
    let response = app
        .oneshot(common::signed_webhook_request(&json!({"hello": "world"}), SECRET))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unhandled_event_type_acknowledged() {
    let (app, _) = common::create_test_app();
    let event = common::stripe_event("evt_other", "customer.created", json!({"id": "cus_1"}));

    let response = app
        .oneshot(common::signed_webhook_request(&event, SECRET))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["received"], true);
}

#[tokio::test]
async fn test_subscription_created_grants_entitlement() {
    let (app, state) = common::create_test_app();
    let profile = customer(&state, "pro@example.com", "cus_pro").await;
    common::opt_in_marketing(&state.db, profile.id).await;
    state
        .db
        .upsert(
            tables::PRICE_PLANS,
            &PricePlan {
                price_id: "price_pro".to_string(),
                plan: "pro".to_string(),
            },
            "price_id",
        )
        .await
        .unwrap();

    let event = common::stripe_event(
        "evt_sub_created",
        "customer.subscription.created",
        subscription("sub_1", "cus_pro", "active", "price_pro"),
    );
    let response = app
        .oneshot(common::signed_webhook_request(&event, SECRET))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let entitlement = state.db.get_entitlement(profile.id).await.unwrap().unwrap();
    assert_eq!(entitlement.status, SubscriptionStatus::Active);
    assert_eq!(entitlement.plan.as_deref(), Some("pro"));
    assert_eq!(entitlement.stripe_subscription_id.as_deref(), Some("sub_1"));

    let record = state.db.get_subscription("sub_1").await.unwrap().unwrap();
    assert_eq!(record.user_id, Some(profile.id));
    assert_eq!(record.status, SubscriptionStatus::Active);

    assert_eq!(
        state.crm.recorded_tags(),
        vec![("pro@example.com".to_string(), vec!["plan-pro".to_string()])]
    );
}

#[tokio::test]
async fn test_subscription_not_tagged_without_marketing_consent() {
    let (app, state) = common::create_test_app();
    let profile = customer(&state, "quiet@example.com", "cus_quiet").await;
    state
        .db
        .upsert(
            tables::PRICE_PLANS,
            &PricePlan {
                price_id: "price_pro".to_string(),
                plan: "pro".to_string(),
            },
            "price_id",
        )
        .await
        .unwrap();

    let event = common::stripe_event(
        "evt_sub_quiet",
        "customer.subscription.created",
        subscription("sub_quiet", "cus_quiet", "active", "price_pro"),
    );
    let response = app
        .oneshot(common::signed_webhook_request(&event, SECRET))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let entitlement = state.db.get_entitlement(profile.id).await.unwrap().unwrap();
    assert_eq!(entitlement.status, SubscriptionStatus::Active);
    assert!(state.crm.recorded_tags().is_empty());
}

#[tokio::test]
async fn test_subscription_deleted_without_plan_row_cancels() {
    let (app, state) = common::create_test_app();
    let profile = customer(&state, "gone@example.com", "cus_gone").await;

    // No price_plans row exists for this price
    let created = common::stripe_event(
        "evt_a",
        "customer.subscription.updated",
        subscription("sub_gone", "cus_gone", "active", "price_retired"),
    );
    let response = app
        .clone()
        .oneshot(common::signed_webhook_request(&created, SECRET))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let deleted = common::stripe_event(
        "evt_b",
        "customer.subscription.deleted",
        subscription("sub_gone", "cus_gone", "canceled", "price_retired"),
    );
    let response = app
        .oneshot(common::signed_webhook_request(&deleted, SECRET))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let entitlement = state.db.get_entitlement(profile.id).await.unwrap().unwrap();
    assert_eq!(entitlement.status, SubscriptionStatus::Canceled);
    assert_eq!(entitlement.plan, None);
    let record = state.db.get_subscription("sub_gone").await.unwrap().unwrap();
    assert_eq!(record.status, SubscriptionStatus::Canceled);
}

#[tokio::test]
async fn test_deleting_old_subscription_keeps_newer_entitlement() {
    let (app, state) = common::create_test_app();
    let profile = customer(&state, "switch@example.com", "cus_switch").await;

    for (id, event_type, sub) in [
        ("evt_1", "customer.subscription.created", "sub_old"),
        ("evt_2", "customer.subscription.created", "sub_new"),
    ] {
        let event = common::stripe_event(
            id,
            event_type,
            subscription(sub, "cus_switch", "active", "price_x"),
        );
        app.clone()
            .oneshot(common::signed_webhook_request(&event, SECRET))
            .await
            .unwrap();
    }

    let deleted = common::stripe_event(
        "evt_3",
        "customer.subscription.deleted",
        subscription("sub_old", "cus_switch", "canceled", "price_x"),
    );
    let response = app
        .oneshot(common::signed_webhook_request(&deleted, SECRET))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let entitlement = state.db.get_entitlement(profile.id).await.unwrap().unwrap();
    assert_eq!(entitlement.status, SubscriptionStatus::Active);
    assert_eq!(entitlement.stripe_subscription_id.as_deref(), Some("sub_new"));
}

#[tokio::test]
async fn test_unknown_subscription_status_is_client_error() {
    let (app, _) = common::create_test_app();
    let event = common::stripe_event(
        "evt_weird",
        "customer.subscription.updated",
        subscription("sub_w", "cus_w", "suspended_by_aliens", "price_x"),
    );

    let response = app
        .oneshot(common::signed_webhook_request(&event, SECRET))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invoice_paid_records_payment_once() {
    let (app, state) = common::create_test_app();
    let profile = customer(&state, "payer@example.com", "cus_pay").await;

    let event = common::stripe_event(
        "evt_inv",
        "invoice.payment_succeeded",
        json!({
            "id": "in_1",
            "object": "invoice",
            "customer": "cus_pay",
            "subscription": "sub_1",
            "amount_paid": 4900,
            "currency": "usd"
        }),
    );

    // Stripe redelivers the same event id
    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(common::signed_webhook_request(&event, SECRET))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let payments = state.db.list_payments().await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].amount_cents, 4900);
    assert_eq!(payments[0].user_id, Some(profile.id));
    assert_eq!(payments[0].kind, PaymentKind::Subscription);

    let sent = state.email.sent_messages();
    assert_eq!(sent.len(), 1, "receipt must not be sent twice");
    assert_eq!(sent[0].to, "payer@example.com");
    assert!(sent[0].html.contains("49.00 USD"));
    assert!(state.db.is_stripe_event_processed("evt_inv").await.unwrap());
}

#[tokio::test]
async fn test_invoice_failed_marks_past_due() {
    let (app, state) = common::create_test_app();
    let profile = customer(&state, "late@example.com", "cus_late").await;

    let created = common::stripe_event(
        "evt_c",
        "customer.subscription.created",
        subscription("sub_late", "cus_late", "active", "price_x"),
    );
    app.clone()
        .oneshot(common::signed_webhook_request(&created, SECRET))
        .await
        .unwrap();

    let failed = common::stripe_event(
        "evt_f",
        "invoice.payment_failed",
        json!({
            "id": "in_f",
            "customer": "cus_late",
            "subscription": "sub_late",
            "amount_paid": 0,
            "currency": "usd"
        }),
    );
    let response = app
        .oneshot(common::signed_webhook_request(&failed, SECRET))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let entitlement = state.db.get_entitlement(profile.id).await.unwrap().unwrap();
    assert_eq!(entitlement.status, SubscriptionStatus::PastDue);
    let sent = state.email.sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "late@example.com");
}

#[tokio::test]
async fn test_certification_checkout_starts_certification() {
    let (app, state) = common::create_test_app();
    let profile = common::seed_profile(&state.db, "buyer@example.com", common::long_ago()).await;
    let setting = common::seed_certification(&state.db, "Bridal Styling", 19900, vec![]).await;

    let event = common::stripe_event(
        "evt_checkout",
        "checkout.session.completed",
        json!({
            "id": "cs_1",
            "object": "checkout.session",
            "customer": "cus_buyer",
            "mode": "payment",
            "payment_status": "paid",
            "amount_total": 19900,
            "currency": "usd",
            "client_reference_id": profile.id.to_string(),
            "metadata": {"certification_id": setting.id.to_string()}
        }),
    );
    let response = app
        .oneshot(common::signed_webhook_request(&event, SECRET))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let uc = state
        .db
        .get_user_certification(profile.id, setting.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(uc.status, CertificationStatus::Pending);

    let linked = state.db.get_profile(profile.id).await.unwrap().unwrap();
    assert_eq!(linked.stripe_customer_id.as_deref(), Some("cus_buyer"));

    let payments = state.db.list_payments().await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].kind, PaymentKind::Certification);
    assert_eq!(payments[0].certification_id, Some(setting.id));
}

#[tokio::test]
async fn test_checkout_for_deleted_certification_acknowledged() {
    let (app, state) = common::create_test_app();
    let profile = common::seed_profile(&state.db, "late@example.com", common::long_ago()).await;
    let missing = uuid::Uuid::new_v4();

    let event = common::stripe_event(
        "evt_checkout_gone",
        "checkout.session.completed",
        json!({
            "id": "cs_gone",
            "object": "checkout.session",
            "mode": "payment",
            "payment_status": "paid",
            "amount_total": 19900,
            "currency": "usd",
            "client_reference_id": profile.id.to_string(),
            "metadata": {"certification_id": missing.to_string()}
        }),
    );
    let response = app
        .oneshot(common::signed_webhook_request(&event, SECRET))
        .await
        .unwrap();

    // Acknowledged so Stripe stops redelivering; the payment is kept
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.db.list_payments().await.unwrap().len(), 1);
    assert!(state
        .db
        .get_user_certification(profile.id, missing)
        .await
        .unwrap()
        .is_none());
}
