// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stylist Academy: course delivery and certification backend.
//!
//! This crate provides the API behind the academy app: drip-scheduled video
//! modules, certification qualification and review, Stripe billing webhooks,
//! and transactional email and CRM sync.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::SupabaseDb;
use services::{
    AnalyticsService, BillingService, CertificationService, CrmService, CurriculumService,
    DirectoryService, EmailService, EventService, QualificationService,
};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: SupabaseDb,
    pub email: EmailService,
    pub crm: CrmService,
    pub curriculum: CurriculumService,
    pub qualification: QualificationService,
    pub certifications: CertificationService,
    pub billing: BillingService,
    pub events: EventService,
    pub directory: DirectoryService,
    pub analytics: AnalyticsService,
}

impl AppState {
    /// Wire every service onto one database client and one set of integrations.
    pub fn new(config: Config, db: SupabaseDb, email: EmailService, crm: CrmService) -> Self {
        let certifications = CertificationService::new(
            db.clone(),
            email.clone(),
            crm.clone(),
            config.supabase_url.clone(),
        );
        Self {
            curriculum: CurriculumService::new(db.clone(), config.default_drip_interval_days),
            qualification: QualificationService::new(db.clone()),
            billing: BillingService::new(
                db.clone(),
                email.clone(),
                crm.clone(),
                certifications.clone(),
            ),
            certifications,
            events: EventService::new(db.clone(), email.clone()),
            directory: DirectoryService::new(db.clone()),
            analytics: AnalyticsService::new(db.clone()),
            config,
            db,
            email,
            crm,
        }
    }
}
