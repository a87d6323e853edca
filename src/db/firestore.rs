// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Profiles (merchant metadata, credits, onboarding state)
//! - Draft posts (generated captions awaiting confirmation)
//! - Payment events (processed IDs for webhook idempotency)

use crate::db::{
    collections, new_id, DebitOutcome, DraftStore, GrantOutcome, PaymentEventRecord,
    ProfileStore,
};
use crate::error::AppError;
use crate::models::{DraftPost, DraftStatus, UserProfile};
use crate::time_utils::now_rfc3339;
use async_trait::async_trait;
use firestore::errors::{BackoffError, FirestoreError};
use futures_util::FutureExt;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    async fn get_draft(&self, draft_id: &str) -> Result<DraftPost, AppError> {
        let draft: Option<DraftPost> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::DRAFT_POSTS)
            .obj()
            .one(draft_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        draft.ok_or_else(|| AppError::NotFound(format!("Draft {}", draft_id)))
    }

    async fn put_draft(&self, draft: &DraftPost) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::DRAFT_POSTS)
            .document_id(&draft.id)
            .object(draft)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for FirestoreDb {
    async fn get_profile(&self, profile_id: &str) -> Result<Option<UserProfile>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(profile_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_profile_by_phone(&self, phone: &str) -> Result<Option<UserProfile>, AppError> {
        let phone = phone.to_string();
        let profiles: Vec<UserProfile> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::PROFILES)
            .filter(move |q| q.field("whatsapp_number").eq(phone.clone()))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(profiles.into_iter().next())
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PROFILES)
            .document_id(&profile.id)
            .object(profile)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Conditional decrement inside a Firestore transaction.
    ///
    /// The read happens through the transaction's consistency selector, so a
    /// concurrent debit makes the commit fail and Firestore retries the closure
    /// with fresh data.
    async fn debit_credit(&self, profile_id: &str) -> Result<DebitOutcome, AppError> {
        let profile_id = profile_id.to_string();

        self.get_client()?
            .run_transaction(|db, transaction| {
                let profile_id = profile_id.clone();
                async move {
                    let profile: Option<UserProfile> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::PROFILES)
                        .obj()
                        .one(&profile_id)
                        .await?;

                    let Some(mut profile) = profile else {
                        return Ok(DebitOutcome::NotFound);
                    };
                    if profile.is_pro {
                        return Ok(DebitOutcome::Unlimited);
                    }
                    if profile.credits_remaining <= 0 {
                        return Ok(DebitOutcome::Insufficient);
                    }

                    profile.credits_remaining -= 1;

                    db.fluent()
                        .update()
                        .in_col(collections::PROFILES)
                        .document_id(&profile_id)
                        .object(&profile)
                        .add_to_transaction(transaction)?;

                    Ok::<_, BackoffError<FirestoreError>>(DebitOutcome::Debited {
                        remaining: profile.credits_remaining,
                    })
                }
                .boxed()
            })
            .await
            .map_err(|e| AppError::Database(format!("Credit debit transaction failed: {}", e)))
    }

    /// Increment credits and record the payment event in one transaction.
    async fn apply_credit_grant(
        &self,
        profile_id: &str,
        amount: i64,
        event_id: &str,
    ) -> Result<GrantOutcome, AppError> {
        let profile_id = profile_id.to_string();
        let event_id = event_id.to_string();

        let outcome = self
            .get_client()?
            .run_transaction(|db, transaction| {
                let profile_id = profile_id.clone();
                let event_id = event_id.clone();
                async move {
                    // Firestore transactions require all reads before any write.
                    let seen: Option<PaymentEventRecord> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::PAYMENT_EVENTS)
                        .obj()
                        .one(&event_id)
                        .await?;
                    if seen.is_some() {
                        return Ok(GrantOutcome::AlreadyProcessed);
                    }

                    let profile: Option<UserProfile> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::PROFILES)
                        .obj()
                        .one(&profile_id)
                        .await?;
                    let Some(mut profile) = profile else {
                        return Ok(GrantOutcome::NotFound);
                    };

                    profile.credits_remaining = profile.credits_remaining.max(0) + amount;

                    let record = PaymentEventRecord {
                        event_id: event_id.clone(),
                        profile_id: profile_id.clone(),
                        credits: amount,
                        processed_at: now_rfc3339(),
                    };

                    db.fluent()
                        .update()
                        .in_col(collections::PROFILES)
                        .document_id(&profile_id)
                        .object(&profile)
                        .add_to_transaction(transaction)?;

                    db.fluent()
                        .update()
                        .in_col(collections::PAYMENT_EVENTS)
                        .document_id(&event_id)
                        .object(&record)
                        .add_to_transaction(transaction)?;

                    Ok::<_, BackoffError<FirestoreError>>(GrantOutcome::Applied {
                        balance: profile.credits_remaining,
                    })
                }
                .boxed()
            })
            .await
            .map_err(|e| AppError::Database(format!("Credit grant transaction failed: {}", e)))?;

        if let GrantOutcome::Applied { balance } = outcome {
            tracing::info!(
                profile_id = %profile_id,
                event_id = %event_id,
                amount,
                balance,
                "Credit grant committed"
            );
        }

        Ok(outcome)
    }
}

#[async_trait]
impl DraftStore for FirestoreDb {
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

        self.put_draft(&draft).await?;
        Ok(draft)
    }

    async fn most_recent_draft(
        &self,
        profile_id: &str,
        status: Option<DraftStatus>,
    ) -> Result<Option<DraftPost>, AppError> {
        let profile_id = profile_id.to_string();
        let query = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::DRAFT_POSTS);

        let query = if let Some(status) = status {
            query.filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(profile_id.clone()),
                    q.field("status").eq(status.as_str()),
                ])
            })
        } else {
            query.filter(move |q| q.field("user_id").eq(profile_id.clone()))
        };

        let drafts: Vec<DraftPost> = query
            .order_by([("created_at", firestore::FirestoreQueryDirection::Descending)])
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(drafts.into_iter().next())
    }

    async fn update_draft_caption(&self, draft_id: &str, caption: &str) -> Result<(), AppError> {
        let mut draft = self.get_draft(draft_id).await?;
        draft.caption = caption.to_string();
        self.put_draft(&draft).await
    }

    async fn mark_draft_status(
        &self,
        draft_id: &str,
        status: DraftStatus,
    ) -> Result<(), AppError> {
        let mut draft = self.get_draft(draft_id).await?;
        draft.status = status;
        self.put_draft(&draft).await
    }
}
