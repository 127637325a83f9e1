// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stripe webhook endpoint.

use crate::error::AppError;
use crate::services::stripe::{self, StripeEvent};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhooks/stripe", post(handle_stripe_event))
}

#[derive(Serialize)]
struct WebhookAck {
    received: bool,
}

/// Verify, decode and dispatch one Stripe delivery.
///
/// The body must be taken raw: the signature covers the exact bytes sent.
/// Any error response makes Stripe redeliver later.
async fn handle_stripe_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookAck>), AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::InvalidSignature("missing Stripe-Signature header".to_string()))?;

    stripe::verify_signature(
        &body,
        signature,
        &state.config.stripe_webhook_secret,
        chrono::Utc::now().timestamp(),
        stripe::SIGNATURE_TOLERANCE_SECS,
    )?;

    let event: StripeEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Malformed Stripe event: {}", e)))?;

    tracing::info!(event_id = %event.id, event_type = %event.event_type, "Stripe webhook received");

    match state.billing.handle_event(&event, chrono::Utc::now()).await {
        Ok(_) => Ok((StatusCode::OK, Json(WebhookAck { received: true }))),
        // Bad object shapes will never succeed on retry
        Err(AppError::Stripe(msg)) => {
            tracing::error!(event_id = %event.id, error = %msg, "Rejected Stripe event");
            Err(AppError::Stripe(msg))
        }
        Err(e) => {
            tracing::error!(event_id = %event.id, error = %e, "Stripe event dispatch failed");
            Err(AppError::Internal(anyhow::anyhow!(
                "Failed to process event {}: {}",
                event.id,
                e
            )))
        }
    }
}
