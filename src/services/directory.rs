// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Public directory of certified stylists.

use crate::db::SupabaseDb;
use crate::error::Result;
use crate::models::{CertificationSetting, CertificationStatus, Profile, UserCertification};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DirectoryEntry {
    pub user_id: Uuid,
    pub full_name: Option<String>,
    pub city: Option<String>,
    pub avatar_url: Option<String>,
    /// Titles of approved certifications, alphabetical
    pub certifications: Vec<String>,
}

/// Join listed profiles with their approved certifications.
///
/// Profiles without any approved certification are left out.
pub fn build_directory(
    profiles: Vec<Profile>,
    approved: &[UserCertification],
    settings: &[CertificationSetting],
) -> Vec<DirectoryEntry> {
    let titles: HashMap<Uuid, &str> = settings.iter().map(|s| (s.id, s.title.as_str())).collect();

    let mut by_user: HashMap<Uuid, Vec<String>> = HashMap::new();
    for uc in approved
        .iter()
        .filter(|uc| uc.status == CertificationStatus::Approved)
    {
        if let Some(title) = titles.get(&uc.certification_id) {
            by_user.entry(uc.user_id).or_default().push(title.to_string());
        }
    }

    profiles
        .into_iter()
        .filter(|p| p.directory_listed)
        .filter_map(|p| {
            let mut certifications = by_user.remove(&p.id)?;
            certifications.sort();
            certifications.dedup();
            Some(DirectoryEntry {
                user_id: p.id,
                full_name: p.full_name,
                city: p.city,
                avatar_url: p.avatar_url,
                certifications,
            })
        })
        .collect()
}

#[derive(Clone)]
pub struct DirectoryService {
    db: SupabaseDb,
}

impl DirectoryService {
    pub fn new(db: SupabaseDb) -> Self {
        Self { db }
    }

    /// Listed, certified stylists, optionally in one city.
    pub async fn list(&self, city: Option<&str>) -> Result<Vec<DirectoryEntry>> {
        let city = city.map(str::trim).filter(|c| !c.is_empty());
        let (profiles, approved, settings) = tokio::try_join!(
            self.db.list_directory_profiles(city),
            self.db
                .list_user_certifications(Some(CertificationStatus::Approved)),
            self.db.list_certification_settings(false),
        )?;

        let entries = build_directory(profiles, &approved, &settings);
        tracing::debug!(?city, count = entries.len(), "Directory listed");
        Ok(entries)
    }
}
