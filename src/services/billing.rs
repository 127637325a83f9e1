// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stripe event dispatch.
//!
//! Each handled event type maps to upserts into the billing mirrors
//! (`subscriptions`, `entitlements`, `payments`) plus best-effort
//! notifications. Writes are keyed by Stripe ids, so a redelivered event
//! converges to the same rows.

use crate::db::SupabaseDb;
use crate::error::{AppError, Result};
use crate::models::{
    Entitlement, NotificationCategory, PaymentKind, PaymentRecord, ProcessedStripeEvent, Profile,
    SubscriptionRecord, SubscriptionStatus,
};
use crate::services::email::{self, EmailService};
use crate::services::stripe::{CheckoutSession, Invoice, StripeEvent, Subscription};
use crate::services::{CertificationService, CrmService};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// What happened to a delivered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Processed,
    /// Event id was already handled by an earlier delivery
    Duplicate,
    /// Event type has no handler
    Ignored,
}

fn from_unix(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

fn parse_user_id(raw: Option<&String>) -> Option<Uuid> {
    raw.and_then(|s| Uuid::parse_str(s.trim()).ok())
}

/// Stripe webhook dispatcher.
#[derive(Clone)]
pub struct BillingService {
    db: SupabaseDb,
    email: EmailService,
    crm: CrmService,
    certifications: CertificationService,
}

impl BillingService {
    pub fn new(
        db: SupabaseDb,
        email: EmailService,
        crm: CrmService,
        certifications: CertificationService,
    ) -> Self {
        Self {
            db,
            email,
            crm,
            certifications,
        }
    }

    /// Dispatch one verified event.
    pub async fn handle_event(&self, event: &StripeEvent, now: DateTime<Utc>) -> Result<EventOutcome> {
        if self.db.is_stripe_event_processed(&event.id).await? {
            tracing::info!(event_id = %event.id, event_type = %event.event_type, "Duplicate Stripe event");
            return Ok(EventOutcome::Duplicate);
        }

        let outcome = match event.event_type.as_str() {
            "checkout.session.completed" => {
                self.checkout_completed(event.object()?, now).await?;
                EventOutcome::Processed
            }
            "customer.subscription.created" | "customer.subscription.updated" => {
                self.subscription_changed(event.object()?, now).await?;
                EventOutcome::Processed
            }
            "customer.subscription.deleted" => {
                self.subscription_deleted(event.object()?, now).await?;
                EventOutcome::Processed
            }
            "invoice.payment_succeeded" | "invoice.paid" => {
                self.invoice_paid(event.object()?, now).await?;
                EventOutcome::Processed
            }
            "invoice.payment_failed" => {
                self.invoice_failed(event.object()?, now).await?;
                EventOutcome::Processed
            }
            other => {
                tracing::debug!(event_type = other, event_id = %event.id, "Ignoring unhandled Stripe event type");
                EventOutcome::Ignored
            }
        };

        if outcome == EventOutcome::Processed {
            self.db
                .record_stripe_event(&ProcessedStripeEvent {
                    id: event.id.clone(),
                    event_type: event.event_type.clone(),
                    processed_at: now,
                })
                .await?;
        }

        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            ?outcome,
            "Stripe event handled"
        );
        Ok(outcome)
    }

    // ─── Checkout ────────────────────────────────────────────────

    async fn checkout_completed(&self, session: CheckoutSession, now: DateTime<Utc>) -> Result<()> {
        let user_id = parse_user_id(session.metadata.get("user_id"))
            .or_else(|| parse_user_id(session.client_reference_id.as_ref()));

        if let (Some(user_id), Some(customer)) = (user_id, session.customer.as_deref()) {
            match self.db.link_stripe_customer(user_id, customer).await {
                Ok(()) => tracing::debug!(%user_id, customer, "Linked Stripe customer"),
                Err(AppError::NotFound(_)) => {
                    tracing::warn!(%user_id, customer, "Checkout for unknown profile")
                }
                Err(e) => return Err(e),
            }
        }

        let Some(certification_id) = parse_user_id(session.metadata.get("certification_id"))
        else {
            // Subscription checkouts are mirrored by the subscription events
            tracing::debug!(session_id = %session.id, mode = ?session.mode, "Checkout without certification");
            return Ok(());
        };

        if session.payment_status.as_deref() != Some("paid") {
            tracing::info!(
                session_id = %session.id,
                payment_status = ?session.payment_status,
                "Certification checkout not paid yet"
            );
            return Ok(());
        }

        let user_id = user_id.ok_or_else(|| {
            AppError::Stripe(format!(
                "Certification checkout {} has no user reference",
                session.id
            ))
        })?;

        self.db
            .upsert_payment(&PaymentRecord {
                id: session.id.clone(),
                user_id: Some(user_id),
                stripe_customer_id: session.customer.clone(),
                kind: PaymentKind::Certification,
                certification_id: Some(certification_id),
                amount_cents: session.amount_total.unwrap_or(0),
                currency: session.currency.clone().unwrap_or_else(|| "usd".to_string()),
                created_at: now,
            })
            .await?;

        match self.certifications.start(user_id, certification_id, now).await {
            Ok(_) => {}
            Err(AppError::NotFound(_)) => {
                tracing::error!(
                    %user_id,
                    %certification_id,
                    session_id = %session.id,
                    "Paid checkout for unknown certification"
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        tracing::info!(%user_id, %certification_id, session_id = %session.id, "Certification purchased");
        Ok(())
    }

    // ─── Subscriptions ───────────────────────────────────────────

    /// Owner of a subscription: explicit metadata first, then the linked customer.
    async fn subscription_owner(&self, sub: &Subscription) -> Result<Option<Profile>> {
        if let Some(user_id) = parse_user_id(sub.metadata.get("user_id")) {
            if let Some(profile) = self.db.get_profile(user_id).await? {
                return Ok(Some(profile));
            }
        }
        self.db.get_profile_by_customer(&sub.customer).await
    }

    async fn plan_for(&self, sub: &Subscription) -> Result<Option<String>> {
        let Some(price_id) = sub.price_id() else {
            return Ok(None);
        };
        let plan = self.db.get_price_plan(price_id).await?.map(|p| p.plan);
        if plan.is_none() {
            tracing::warn!(subscription_id = %sub.id, price_id, "No plan mapped for price");
        }
        Ok(plan)
    }

    async fn subscription_changed(&self, sub: Subscription, now: DateTime<Utc>) -> Result<()> {
        let status = SubscriptionStatus::from_stripe(&sub.status).ok_or_else(|| {
            AppError::Stripe(format!("Unknown subscription status {}", sub.status))
        })?;
        let plan = self.plan_for(&sub).await?;
        let owner = self.subscription_owner(&sub).await?;

        self.db
            .upsert_subscription(&SubscriptionRecord {
                stripe_subscription_id: sub.id.clone(),
                stripe_customer_id: sub.customer.clone(),
                user_id: owner.as_ref().map(|p| p.id),
                price_id: sub.price_id().map(str::to_string),
                plan: plan.clone(),
                status,
                current_period_end: sub.current_period_end.and_then(from_unix),
                cancel_at_period_end: sub.cancel_at_period_end,
                updated_at: now,
            })
            .await?;

        let Some(owner) = owner else {
            tracing::warn!(subscription_id = %sub.id, customer = %sub.customer, "Subscription for unknown customer");
            return Ok(());
        };

        self.db
            .upsert_entitlement(&Entitlement {
                user_id: owner.id,
                plan: plan.clone(),
                status,
                stripe_subscription_id: Some(sub.id.clone()),
                started_at: sub.start_date.and_then(from_unix),
                updated_at: now,
            })
            .await?;

        tracing::info!(user_id = %owner.id, subscription_id = %sub.id, ?status, ?plan, "Entitlement updated");

        if let (true, Some(plan)) = (status.grants_access(), plan) {
            if let Err(e) = self
                .crm
                .tag_contact_gated(&self.db, owner.id, &owner.email, &[format!("plan-{}", plan)])
                .await
            {
                tracing::warn!(error = %e, user_id = %owner.id, "Failed to tag CRM contact");
            }
        }
        Ok(())
    }

    async fn subscription_deleted(&self, sub: Subscription, now: DateTime<Utc>) -> Result<()> {
        let plan = self.plan_for(&sub).await?;
        let owner = self.subscription_owner(&sub).await?;

        self.db
            .upsert_subscription(&SubscriptionRecord {
                stripe_subscription_id: sub.id.clone(),
                stripe_customer_id: sub.customer.clone(),
                user_id: owner.as_ref().map(|p| p.id),
                price_id: sub.price_id().map(str::to_string),
                plan: plan.clone(),
                status: SubscriptionStatus::Canceled,
                current_period_end: sub.current_period_end.and_then(from_unix),
                cancel_at_period_end: sub.cancel_at_period_end,
                updated_at: now,
            })
            .await?;

        let Some(owner) = owner else {
            tracing::warn!(subscription_id = %sub.id, "Deleted subscription for unknown customer");
            return Ok(());
        };

        let existing = self.db.get_entitlement(owner.id).await?;
        // A newer subscription may already own the entitlement
        if let Some(current) = existing
            .as_ref()
            .and_then(|e| e.stripe_subscription_id.as_deref())
        {
            if current != sub.id {
                tracing::info!(
                    user_id = %owner.id,
                    deleted = %sub.id,
                    current,
                    "Entitlement belongs to another subscription, leaving it"
                );
                return Ok(());
            }
        }

        self.db
            .upsert_entitlement(&Entitlement {
                user_id: owner.id,
                plan: plan.or_else(|| existing.as_ref().and_then(|e| e.plan.clone())),
                status: SubscriptionStatus::Canceled,
                stripe_subscription_id: Some(sub.id.clone()),
                started_at: existing.and_then(|e| e.started_at),
                updated_at: now,
            })
            .await?;

        tracing::info!(user_id = %owner.id, subscription_id = %sub.id, "Entitlement canceled");
        Ok(())
    }

    // ─── Invoices ────────────────────────────────────────────────

    async fn invoice_owner(&self, invoice: &Invoice) -> Result<Option<Profile>> {
        match invoice.customer.as_deref() {
            Some(customer) => self.db.get_profile_by_customer(customer).await,
            None => Ok(None),
        }
    }

    async fn invoice_paid(&self, invoice: Invoice, now: DateTime<Utc>) -> Result<()> {
        let owner = self.invoice_owner(&invoice).await?;

        self.db
            .upsert_payment(&PaymentRecord {
                id: invoice.id.clone(),
                user_id: owner.as_ref().map(|p| p.id),
                stripe_customer_id: invoice.customer.clone(),
                kind: PaymentKind::Subscription,
                certification_id: None,
                amount_cents: invoice.amount_paid,
                currency: invoice.currency.clone(),
                created_at: now,
            })
            .await?;

        tracing::info!(
            invoice_id = %invoice.id,
            amount = invoice.amount_paid,
            currency = %invoice.currency,
            "Invoice payment recorded"
        );

        if let Some(owner) = owner.filter(|_| invoice.amount_paid > 0) {
            let message = email::payment_receipt(
                &owner.email,
                owner.full_name.as_deref(),
                invoice.amount_paid,
                &invoice.currency,
            );
            self.notify(owner.id, NotificationCategory::Billing, &message)
                .await;
        }
        Ok(())
    }

    async fn invoice_failed(&self, invoice: Invoice, now: DateTime<Utc>) -> Result<()> {
        let Some(owner) = self.invoice_owner(&invoice).await? else {
            tracing::warn!(invoice_id = %invoice.id, "Failed invoice for unknown customer");
            return Ok(());
        };

        if let Some(mut entitlement) = self.db.get_entitlement(owner.id).await? {
            let same_subscription = match (&invoice.subscription, &entitlement.stripe_subscription_id) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            };
            if same_subscription && entitlement.status != SubscriptionStatus::Canceled {
                entitlement.status = SubscriptionStatus::PastDue;
                entitlement.updated_at = now;
                self.db.upsert_entitlement(&entitlement).await?;
                tracing::info!(user_id = %owner.id, "Entitlement marked past due");
            }
        }

        let message = email::payment_failed(&owner.email, owner.full_name.as_deref());
        self.notify(owner.id, NotificationCategory::Billing, &message)
            .await;
        Ok(())
    }

    /// Best-effort email; failures must not make Stripe redeliver.
    async fn notify(&self, user_id: Uuid, category: NotificationCategory, message: &email::EmailMessage) {
        if let Err(e) = self
            .email
            .send_gated(&self.db, user_id, category, message)
            .await
        {
            tracing::warn!(error = %e, %user_id, "Failed to send billing email");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service(db: &SupabaseDb) -> BillingService {
        let email = EmailService::new_mock();
        let crm = CrmService::new_mock();
        let certifications =
            CertificationService::new(db.clone(), email.clone(), crm.clone(), String::new());
        BillingService::new(db.clone(), email, crm, certifications)
    }

    fn event(id: &str, event_type: &str, object: serde_json::Value) -> StripeEvent {
        serde_json::from_value(json!({
            "id": id,
            "type": event_type,
            "created": 0,
            "data": {"object": object}
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_user_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_user_id(Some(&format!(" {} ", id))), Some(id));
        assert_eq!(parse_user_id(Some(&"not-a-uuid".to_string())), None);
        assert_eq!(parse_user_id(None), None);
    }

    #[tokio::test]
    async fn test_redelivery_is_reported_as_duplicate() {
        let db = SupabaseDb::new_in_memory();
        let billing = service(&db);
        let e = event(
            "evt_1",
            "invoice.paid",
            json!({"id": "in_1", "customer": null, "amount_paid": 100, "currency": "usd"}),
        );

        assert_eq!(billing.handle_event(&e, Utc::now()).await.unwrap(), EventOutcome::Processed);
        assert_eq!(billing.handle_event(&e, Utc::now()).await.unwrap(), EventOutcome::Duplicate);
        assert_eq!(db.list_payments().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ignored_events_are_not_recorded() {
        let db = SupabaseDb::new_in_memory();
        let billing = service(&db);
        let e = event("evt_2", "charge.refunded", json!({}));

        assert_eq!(billing.handle_event(&e, Utc::now()).await.unwrap(), EventOutcome::Ignored);
        assert!(!db.is_stripe_event_processed("evt_2").await.unwrap());
    }

    #[tokio::test]
    async fn test_unpaid_certification_checkout_does_nothing() {
        let db = SupabaseDb::new_in_memory();
        let billing = service(&db);
        let user = Uuid::new_v4();
        let cert = Uuid::new_v4();
        let e = event(
            "evt_3",
            "checkout.session.completed",
            json!({
                "id": "cs_1",
                "payment_status": "unpaid",
                "metadata": {"user_id": user.to_string(), "certification_id": cert.to_string()}
            }),
        );

        billing.handle_event(&e, Utc::now()).await.unwrap();
        assert!(db.get_user_certification(user, cert).await.unwrap().is_none());
        assert!(db.list_payments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_paid_checkout_for_unknown_certification_is_acknowledged() {
        let db = SupabaseDb::new_in_memory();
        let billing = service(&db);
        let user = Uuid::new_v4();
        let cert = Uuid::new_v4();
        let e = event(
            "evt_4",
            "checkout.session.completed",
            json!({
                "id": "cs_2",
                "payment_status": "paid",
                "amount_total": 25000,
                "currency": "usd",
                "metadata": {"user_id": user.to_string(), "certification_id": cert.to_string()}
            }),
        );

        assert_eq!(billing.handle_event(&e, Utc::now()).await.unwrap(), EventOutcome::Processed);
        assert_eq!(db.list_payments().await.unwrap().len(), 1);
        assert!(db.get_user_certification(user, cert).await.unwrap().is_none());
        assert!(db.is_stripe_event_processed("evt_4").await.unwrap());
    }
}
