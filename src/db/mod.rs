//! Database layer.
//!
//! Storage is reached through the [`ProfileStore`] and [`DraftStore`] traits so
//! request handlers never depend on a concrete backend. Firestore is used in
//! production; [`MemoryStore`] backs tests and local development.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{DraftPost, DraftStatus, UserProfile};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const PROFILES: &str = "profiles";
    pub const DRAFT_POSTS: &str = "draft_posts";
    /// Processed payment event IDs (keyed by event ID)
    pub const PAYMENT_EVENTS: &str = "payment_events";
}

/// Result of an atomic conditional debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    Debited { remaining: i64 },
    /// Pro profile: nothing decremented.
    Unlimited,
    Insufficient,
    NotFound,
}

/// Result of applying a payment's credit grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    Applied { balance: i64 },
    /// The payment event was seen before; nothing changed.
    AlreadyProcessed,
    NotFound,
}

/// Record kept per processed payment event.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PaymentEventRecord {
    pub event_id: String,
    pub profile_id: String,
    pub credits: i64,
    pub processed_at: String,
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, profile_id: &str) -> Result<Option<UserProfile>, AppError>;

    /// Look up the profile linked to a chat identity.
    async fn find_profile_by_phone(&self, phone: &str) -> Result<Option<UserProfile>, AppError>;

    /// Create or replace a profile.
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), AppError>;

    /// Decrement the balance by one if (and only if) it is positive.
    ///
    /// Must be a single atomic operation at the storage layer.
    async fn debit_credit(&self, profile_id: &str) -> Result<DebitOutcome, AppError>;

    /// Add `amount` credits once per `event_id`.
    ///
    /// Recording the event and incrementing the balance happen atomically.
    async fn apply_credit_grant(
        &self,
        profile_id: &str,
        amount: i64,
        event_id: &str,
    ) -> Result<GrantOutcome, AppError>;
}

#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn create_draft(
        &self,
        profile_id: &str,
        image_url: &str,
        caption: &str,
    ) -> Result<DraftPost, AppError>;

    /// Latest draft for a profile by creation time, optionally filtered by status.
    async fn most_recent_draft(
        &self,
        profile_id: &str,
        status: Option<DraftStatus>,
    ) -> Result<Option<DraftPost>, AppError>;

    async fn update_draft_caption(&self, draft_id: &str, caption: &str) -> Result<(), AppError>;

    async fn mark_draft_status(&self, draft_id: &str, status: DraftStatus)
        -> Result<(), AppError>;
}

/// Everything the application needs from storage.
pub trait Store: ProfileStore + DraftStore {}

impl<T: ProfileStore + DraftStore> Store for T {}

/// New opaque document ID.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
