// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stylist Academy API Server
//!
//! Serves the academy app: course modules with drip unlocks, certification
//! submissions and reviews, and the Stripe webhook endpoint.

use std::sync::Arc;
use stylist_academy::{
    config::Config,
    db::SupabaseDb,
    services::{CrmService, EmailService},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Stylist Academy API");

    let db = SupabaseDb::new(&config.supabase_url, &config.supabase_service_key);

    let email = EmailService::new(config.resend_api_key.clone(), config.email_from.clone());
    tracing::info!(from = %config.email_from, "Email service initialized");

    let crm = CrmService::new(config.crm_api_url.clone(), config.crm_api_key.clone());

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), db, email, crm));

    // Build router
    let app = stylist_academy::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stylist_academy=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
