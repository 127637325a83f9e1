// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Event registration.

use crate::db::SupabaseDb;
use crate::error::{AppError, Result};
use crate::models::{Event, EventRegistration, NotificationCategory};
use crate::services::email::{self, EmailService};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Check whether a user may register for an event right now.
pub fn check_registration_open(event: &Event, registered: usize, now: DateTime<Utc>) -> Result<()> {
    if !event.published {
        return Err(AppError::NotFound(format!("Event {} not found", event.id)));
    }
    if event.starts_at <= now {
        return Err(AppError::BadRequest("Event has already started".to_string()));
    }
    if let Some(capacity) = event.capacity {
        if registered >= usize::try_from(capacity).unwrap_or(0) {
            return Err(AppError::Conflict("Event is full".to_string()));
        }
    }
    Ok(())
}

#[derive(Clone)]
pub struct EventService {
    db: SupabaseDb,
    email: EmailService,
}

impl EventService {
    pub fn new(db: SupabaseDb, email: EmailService) -> Self {
        Self { db, email }
    }

    async fn event(&self, event_id: Uuid) -> Result<Event> {
        self.db
            .get_event(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", event_id)))
    }

    /// Register a user and send a confirmation.
    pub async fn register(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<EventRegistration> {
        let event = self.event(event_id).await?;

        if self
            .db
            .get_event_registration(event_id, user_id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "Already registered for this event".to_string(),
            ));
        }

        let registered = self.db.list_event_registrations(Some(event_id)).await?.len();
        check_registration_open(&event, registered, now)?;

        let registration = EventRegistration {
            event_id,
            user_id,
            registered_at: now,
        };
        self.db.insert_event_registration(&registration).await?;
        tracing::info!(%user_id, %event_id, registered = registered + 1, "Registered for event");

        if let Some(profile) = self.db.get_profile(user_id).await? {
            let message = email::event_registration(
                &profile.email,
                profile.full_name.as_deref(),
                &event.title,
                event.starts_at,
                event.location.as_deref(),
            );
            if let Err(e) = self
                .email
                .send_gated(&self.db, user_id, NotificationCategory::Events, &message)
                .await
            {
                tracing::warn!(error = %e, %user_id, %event_id, "Failed to send registration email");
            }
        }

        Ok(registration)
    }

    /// Remove a registration.
    pub async fn cancel(&self, user_id: Uuid, event_id: Uuid) -> Result<()> {
        let removed = self.db.delete_event_registration(event_id, user_id).await?;
        if removed == 0 {
            return Err(AppError::NotFound(
                "No registration for this event".to_string(),
            ));
        }
        tracing::info!(%user_id, %event_id, "Event registration cancelled");
        Ok(())
    }
}
