// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store for tests and local development.
//!
//! Atomicity comes from DashMap entry locks: a debit or grant holds the
//! profile's shard lock for the whole read-modify-write.

use crate::db::{
    new_id, DebitOutcome, DraftStore, GrantOutcome, PaymentEventRecord, ProfileStore,
};
use crate::error::AppError;
use crate::models::{DraftPost, DraftStatus, UserProfile};
use crate::time_utils::now_rfc3339;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Draft plus its insertion sequence (tie-breaker for equal timestamps).
#[derive(Clone)]
struct StoredDraft {
    seq: u64,
    draft: DraftPost,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    profiles: Arc<DashMap<String, UserProfile>>,
    drafts: Arc<DashMap<String, StoredDraft>>,
    payment_events: Arc<DashMap<String, PaymentEventRecord>>,
    next_seq: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All drafts owned by a profile, oldest first.
    pub fn drafts_for(&self, profile_id: &str) -> Vec<DraftPost> {
        let mut drafts: Vec<StoredDraft> = self
            .drafts
            .iter()
            .filter(|d| d.draft.user_id == profile_id)
            .map(|d| d.value().clone())
            .collect();
        drafts.sort_by_key(|d| d.seq);
        drafts.into_iter().map(|d| d.draft).collect()
    }

    pub fn processed_payment_events(&self) -> usize {
        self.payment_events.len()
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_profile(&self, profile_id: &str) -> Result<Option<UserProfile>, AppError> {
        Ok(self.profiles.get(profile_id).map(|p| p.clone()))
    }

    async fn find_profile_by_phone(&self, phone: &str) -> Result<Option<UserProfile>, AppError> {
        Ok(self
            .profiles
            .iter()
            .find(|p| p.whatsapp_number.as_deref() == Some(phone))
            .map(|p| p.value().clone()))
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), AppError> {
        self.profiles.insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn debit_credit(&self, profile_id: &str) -> Result<DebitOutcome, AppError> {
        let Some(mut profile) = self.profiles.get_mut(profile_id) else {
            return Ok(DebitOutcome::NotFound);
        };

        if profile.is_pro {
            return Ok(DebitOutcome::Unlimited);
        }
        if profile.credits_remaining <= 0 {
            return Ok(DebitOutcome::Insufficient);
        }

        profile.credits_remaining -= 1;
        Ok(DebitOutcome::Debited {
            remaining: profile.credits_remaining,
        })
    }

    async fn apply_credit_grant(
        &self,
        profile_id: &str,
        amount: i64,
        event_id: &str,
    ) -> Result<GrantOutcome, AppError> {
        // Lock order: event entry, then profile. Debits only take the profile lock.
        let entry = match self.payment_events.entry(event_id.to_string()) {
            Entry::Occupied(_) => return Ok(GrantOutcome::AlreadyProcessed),
            Entry::Vacant(v) => v,
        };

        let Some(mut profile) = self.profiles.get_mut(profile_id) else {
            return Ok(GrantOutcome::NotFound);
        };

        profile.credits_remaining = profile.credits_remaining.max(0) + amount;
        let balance = profile.credits_remaining;

        entry.insert(PaymentEventRecord {
            event_id: event_id.to_string(),
            profile_id: profile_id.to_string(),
            credits: amount,
            processed_at: now_rfc3339(),
        });

        Ok(GrantOutcome::Applied { balance })
    }
}

#[async_trait]
impl DraftStore for MemoryStore {
    async fn create_draft(
        &self,
        profile_id: &str,
        image_url: &str,
        caption: &str,
    ) -> Result<DraftPost, AppError> {
        let draft = DraftPost {
            id: new_id(),
            user_id: profile_id.to_string(),
            image_url: image_url.to_string(),
            caption: caption.to_string(),
            status: DraftStatus::Draft,
            created_at: now_rfc3339(),
        };

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.drafts.insert(
            draft.id.clone(),
            StoredDraft {
                seq,
                draft: draft.clone(),
            },
        );
        Ok(draft)
    }

    async fn most_recent_draft(
        &self,
        profile_id: &str,
        status: Option<DraftStatus>,
    ) -> Result<Option<DraftPost>, AppError> {
        Ok(self
            .drafts
            .iter()
            .filter(|d| d.draft.user_id == profile_id)
            .filter(|d| status.map_or(true, |s| d.draft.status == s))
            .max_by(|a, b| {
                a.draft
                    .created_at
                    .cmp(&b.draft.created_at)
                    .then(a.seq.cmp(&b.seq))
            })
            .map(|d| d.draft.clone()))
    }

    async fn update_draft_caption(&self, draft_id: &str, caption: &str) -> Result<(), AppError> {
        let mut stored = self
            .drafts
            .get_mut(draft_id)
            .ok_or_else(|| AppError::NotFound(format!("Draft {}", draft_id)))?;
        stored.draft.caption = caption.to_string();
        Ok(())
    }

    async fn mark_draft_status(
        &self,
        draft_id: &str,
        status: DraftStatus,
    ) -> Result<(), AppError> {
        let mut stored = self
            .drafts
            .get_mut(draft_id)
            .ok_or_else(|| AppError::NotFound(format!("Draft {}", draft_id)))?;
        stored.draft.status = status;
        Ok(())
    }
}
