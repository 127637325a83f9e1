// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Certification workflow.
//!
//! Status moves:
//! - `pending` → `submitted` on the first submission (attempt 1)
//! - `rejected` → `resubmitted` on every later submission (attempt + 1)
//! - `submitted` / `resubmitted` → `approved` or `rejected` by an admin
//!
//! `approved` is terminal.

use crate::db::{buckets, storage_public_url, SupabaseDb};
use crate::error::{AppError, Result};
use crate::models::{
    CertificationSetting, CertificationStatus, NotificationCategory, UserCertification,
};
use crate::services::email::{self, EmailService};
use crate::services::{CrmService, QualificationService};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Admin decision on a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

/// Move a certification into the submitted state.
pub fn apply_submission(
    uc: &mut UserCertification,
    video_path: &str,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<()> {
    match uc.status {
        CertificationStatus::Pending => {
            uc.status = CertificationStatus::Submitted;
            uc.attempt_number = 1;
        }
        CertificationStatus::Rejected => {
            uc.status = CertificationStatus::Resubmitted;
            uc.attempt_number += 1;
        }
        CertificationStatus::Submitted | CertificationStatus::Resubmitted => {
            return Err(AppError::Conflict(
                "A submission is already awaiting review".to_string(),
            ));
        }
        CertificationStatus::Approved => {
            return Err(AppError::Conflict(
                "Certification is already approved".to_string(),
            ));
        }
    }

    uc.submission_video_path = Some(video_path.to_string());
    uc.submission_notes = notes;
    uc.submitted_at = Some(now);
    uc.reviewer_id = None;
    uc.reviewed_at = None;
    uc.feedback = None;
    Ok(())
}

/// Record an admin decision on a pending submission.
pub fn apply_review(
    uc: &mut UserCertification,
    decision: ReviewDecision,
    feedback: Option<String>,
    reviewer_id: Uuid,
    now: DateTime<Utc>,
) -> Result<()> {
    if !uc.status.is_awaiting_review() {
        return Err(AppError::Conflict(format!(
            "Cannot review a certification in status {}",
            uc.status
        )));
    }

    let feedback = feedback.map(|f| f.trim().to_string()).filter(|f| !f.is_empty());
    if decision == ReviewDecision::Reject && feedback.is_none() {
        return Err(AppError::BadRequest(
            "Feedback is required when rejecting a submission".to_string(),
        ));
    }

    uc.status = match decision {
        ReviewDecision::Approve => CertificationStatus::Approved,
        ReviewDecision::Reject => CertificationStatus::Rejected,
    };
    uc.feedback = feedback;
    uc.reviewer_id = Some(reviewer_id);
    uc.reviewed_at = Some(now);
    Ok(())
}

/// Submission paths live under the submitting user's folder.
fn validate_video_path(user_id: Uuid, path: &str) -> Result<()> {
    let prefix = format!("{}/", user_id);
    let valid = path.starts_with(&prefix)
        && path.len() > prefix.len()
        && !path.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if !valid {
        return Err(AppError::BadRequest(
            "Submission video must be uploaded to your own folder".to_string(),
        ));
    }
    Ok(())
}

/// CRM tag applied when a certification is approved.
pub fn certified_tag(title: &str) -> String {
    let slug = title
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    format!("certified-{}", slug)
}

/// Submission awaiting review, as listed for admins.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SubmissionSummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub certification_id: Uuid,
    pub status: String,
    pub attempt_number: i32,
    pub video_url: Option<String>,
    pub notes: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Certification workflow backed by the database.
#[derive(Clone)]
pub struct CertificationService {
    db: SupabaseDb,
    qualification: QualificationService,
    email: EmailService,
    crm: CrmService,
    supabase_url: String,
}

impl CertificationService {
    pub fn new(
        db: SupabaseDb,
        email: EmailService,
        crm: CrmService,
        supabase_url: String,
    ) -> Self {
        Self {
            qualification: QualificationService::new(db.clone()),
            db,
            email,
            crm,
            supabase_url,
        }
    }

    async fn setting(&self, certification_id: Uuid) -> Result<CertificationSetting> {
        self.db
            .get_certification_setting(certification_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Certification {} not found", certification_id))
            })
    }

    /// Open a certification for a user. Returns the existing row if there is one.
    pub async fn start(
        &self,
        user_id: Uuid,
        certification_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<UserCertification> {
        self.setting(certification_id).await?;

        if let Some(existing) = self
            .db
            .get_user_certification(user_id, certification_id)
            .await?
        {
            return Ok(existing);
        }

        let uc = UserCertification::new_pending(user_id, certification_id, now);
        self.db.save_user_certification(&uc).await?;
        tracing::info!(%user_id, %certification_id, "Certification started");
        Ok(uc)
    }

    /// Submit (or resubmit) a video for review.
    ///
    /// Free certifications are opened on first submission; paid ones must
    /// have been started by checkout.
    pub async fn submit(
        &self,
        user_id: Uuid,
        certification_id: Uuid,
        video_path: &str,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<UserCertification> {
        let setting = self.setting(certification_id).await?;
        if !setting.is_active {
            return Err(AppError::BadRequest(
                "Certification is not accepting submissions".to_string(),
            ));
        }
        validate_video_path(user_id, video_path)?;

        let mut uc = match self
            .db
            .get_user_certification(user_id, certification_id)
            .await?
        {
            Some(uc) => uc,
            None if setting.price_cents == 0 => {
                UserCertification::new_pending(user_id, certification_id, now)
            }
            None => return Err(AppError::Forbidden),
        };

        let progress = self.qualification.progress_for(user_id, &setting).await?;
        if !progress.qualified {
            return Err(AppError::BadRequest(format!(
                "Complete all required modules before submitting ({}% done)",
                progress.progress_percentage
            )));
        }

        apply_submission(&mut uc, video_path, notes, now)?;
        self.db.save_user_certification(&uc).await?;

        tracing::info!(
            %user_id,
            %certification_id,
            status = %uc.status,
            attempt = uc.attempt_number,
            "Certification submitted"
        );
        Ok(uc)
    }

    /// Approve or reject a submission, then notify the user.
    pub async fn review(
        &self,
        reviewer_id: Uuid,
        user_certification_id: Uuid,
        decision: ReviewDecision,
        feedback: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<UserCertification> {
        let mut uc = self
            .db
            .get_user_certification_by_id(user_certification_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "User certification {} not found",
                    user_certification_id
                ))
            })?;

        apply_review(&mut uc, decision, feedback, reviewer_id, now)?;
        self.db.save_user_certification(&uc).await?;

        tracing::info!(
            %reviewer_id,
            user_certification_id = %uc.id,
            status = %uc.status,
            "Certification reviewed"
        );

        // The decision is stored; notification problems are only logged.
        if let Err(e) = self.notify_review(&uc).await {
            tracing::warn!(error = %e, user_certification_id = %uc.id, "Failed to send review notification");
        }

        Ok(uc)
    }

    async fn notify_review(&self, uc: &UserCertification) -> Result<()> {
        let Some(profile) = self.db.get_profile(uc.user_id).await? else {
            tracing::warn!(user_id = %uc.user_id, "No profile for reviewed certification");
            return Ok(());
        };
        let setting = self.setting(uc.certification_id).await?;

        let message = match uc.status {
            CertificationStatus::Approved => email::certification_approved(
                &profile.email,
                profile.full_name.as_deref(),
                &setting.title,
            ),
            _ => email::certification_rejected(
                &profile.email,
                profile.full_name.as_deref(),
                &setting.title,
                uc.feedback.as_deref().unwrap_or_default(),
            ),
        };
        self.email
            .send_gated(
                &self.db,
                uc.user_id,
                NotificationCategory::CertificationUpdates,
                &message,
            )
            .await?;

        if uc.status == CertificationStatus::Approved {
            self.crm
                .tag_contact_gated(
                    &self.db,
                    uc.user_id,
                    &profile.email,
                    &[certified_tag(&setting.title)],
                )
                .await?;
        }
        Ok(())
    }

    /// Submissions waiting on a decision, oldest first.
    pub async fn pending_reviews(&self) -> Result<Vec<SubmissionSummary>> {
        let mut awaiting = self
            .db
            .list_user_certifications(Some(CertificationStatus::Submitted))
            .await?;
        awaiting.extend(
            self.db
                .list_user_certifications(Some(CertificationStatus::Resubmitted))
                .await?,
        );
        awaiting.sort_by_key(|uc| uc.submitted_at);

        Ok(awaiting
            .into_iter()
            .map(|uc| SubmissionSummary {
                id: uc.id,
                user_id: uc.user_id,
                certification_id: uc.certification_id,
                status: uc.status.to_string(),
                attempt_number: uc.attempt_number,
                video_url: uc.submission_video_path.as_deref().map(|path| {
                    storage_public_url(
                        &self.supabase_url,
                        buckets::CERTIFICATION_SUBMISSIONS,
                        path,
                    )
                }),
                notes: uc.submission_notes,
                submitted_at: uc.submitted_at,
            })
            .collect())
    }
}
