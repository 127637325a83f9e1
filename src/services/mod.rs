// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod analytics;
pub mod billing;
pub mod certification;
pub mod crm;
pub mod directory;
pub mod drip;
pub mod email;
pub mod events;
pub mod mux;
pub mod qualification;
pub mod stripe;

pub use analytics::{AnalyticsService, AnalyticsSummary};
pub use billing::{BillingService, EventOutcome};
pub use certification::{CertificationService, ReviewDecision, SubmissionSummary};
pub use crm::CrmService;
pub use directory::{DirectoryEntry, DirectoryService};
pub use drip::{CurriculumService, DripSchedule, Membership, VideoAccess};
pub use email::{EmailMessage, EmailService};
pub use events::EventService;
pub use qualification::{Qualification, QualificationService};
