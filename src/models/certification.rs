// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Certification settings and per-user certification attempts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An admin-defined certification (`certification_settings`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificationSetting {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Price in the smallest currency unit (cents)
    pub price_cents: i64,
    /// Modules whose published videos must all be completed
    #[serde(default)]
    pub required_module_ids: Vec<Uuid>,
    pub is_active: bool,
}

/// Review state of a user's certification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificationStatus {
    Pending,
    Submitted,
    Resubmitted,
    Approved,
    Rejected,
}

impl CertificationStatus {
    pub const ALL: [CertificationStatus; 5] = [
        CertificationStatus::Pending,
        CertificationStatus::Submitted,
        CertificationStatus::Resubmitted,
        CertificationStatus::Approved,
        CertificationStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CertificationStatus::Pending => "pending",
            CertificationStatus::Submitted => "submitted",
            CertificationStatus::Resubmitted => "resubmitted",
            CertificationStatus::Approved => "approved",
            CertificationStatus::Rejected => "rejected",
        }
    }

    /// A submission is waiting on an admin decision.
    pub fn is_awaiting_review(&self) -> bool {
        matches!(
            self,
            CertificationStatus::Submitted | CertificationStatus::Resubmitted
        )
    }
}

impl std::fmt::Display for CertificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row per (user, certification) pair (`user_certifications`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCertification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub certification_id: Uuid,
    pub status: CertificationStatus,
    /// Number of submissions made; 0 until the first submission
    #[serde(default)]
    pub attempt_number: i32,
    /// Storage path of the submitted video in the submissions bucket
    pub submission_video_path: Option<String>,
    pub submission_notes: Option<String>,
    pub feedback: Option<String>,
    pub reviewer_id: Option<Uuid>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserCertification {
    /// A fresh `pending` row.
    pub fn new_pending(user_id: Uuid, certification_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            certification_id,
            status: CertificationStatus::Pending,
            attempt_number: 0,
            submission_video_path: None,
            submission_notes: None,
            feedback: None,
            reviewer_id: None,
            submitted_at: None,
            reviewed_at: None,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&CertificationStatus::Resubmitted).unwrap();
        assert_eq!(json, "\"resubmitted\"");

        let parsed: CertificationStatus = serde_json::from_str("\"approved\"").unwrap();
        assert_eq!(parsed, CertificationStatus::Approved);

        for status in CertificationStatus::ALL {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, status.as_str());
        }
    }
}
