// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credit ledger shared by the web app, the WhatsApp bot and the payment webhook.
//!
//! Balance is the only persisted fact. Debits are conditional atomic
//! decrements; credits are applied at most once per payment event.

use crate::db::{DebitOutcome, GrantOutcome, Store};
use crate::error::AppError;
use crate::models::UserProfile;
use std::sync::Arc;

#[derive(Clone)]
pub struct CreditLedger {
    db: Arc<dyn Store>,
}

impl CreditLedger {
    pub fn new(db: Arc<dyn Store>) -> Self {
        Self { db }
    }

    /// True iff the profile may start a generation.
    pub fn has_available_credit(profile: &UserProfile) -> bool {
        profile.is_pro || profile.credits_remaining > 0
    }

    /// Consume one credit after a successful generation.
    pub async fn debit(&self, profile_id: &str) -> Result<DebitOutcome, AppError> {
        let outcome = self.db.debit_credit(profile_id).await?;

        match outcome {
            DebitOutcome::Debited { remaining } => {
                tracing::info!(profile_id, remaining, "Credit debited");
            }
            DebitOutcome::Unlimited => {
                tracing::debug!(profile_id, "Pro profile, no debit");
            }
            DebitOutcome::Insufficient => {
                tracing::warn!(profile_id, "Debit refused: balance exhausted");
            }
            DebitOutcome::NotFound => {
                tracing::warn!(profile_id, "Debit refused: profile not found");
            }
        }

        Ok(outcome)
    }

    /// Add credits for a confirmed payment event. Replays are no-ops.
    pub async fn credit(
        &self,
        profile_id: &str,
        amount: i64,
        event_id: &str,
    ) -> Result<GrantOutcome, AppError> {
        if amount <= 0 {
            return Err(AppError::BadRequest(format!(
                "Credit amount must be positive, got {}",
                amount
            )));
        }
        if event_id.trim().is_empty() {
            return Err(AppError::BadRequest("Missing payment event ID".to_string()));
        }

        let outcome = self
            .db
            .apply_credit_grant(profile_id, amount, event_id)
            .await?;

        match outcome {
            GrantOutcome::Applied { balance } => {
                tracing::info!(profile_id, event_id, amount, balance, "Credits added");
            }
            GrantOutcome::AlreadyProcessed => {
                tracing::info!(event_id, "Payment event already processed (idempotent skip)");
            }
            GrantOutcome::NotFound => {
                tracing::warn!(profile_id, event_id, "Payment for unknown profile");
            }
        }

        Ok(outcome)
    }
}
