// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Forwarding of confirmed drafts to an external automation hook.
//!
//! The hook owns the actual posting to social networks; it receives the
//! profile's opaque social identifiers alongside the draft. Every request
//! carries the draft ID as `Idempotency-Key`.

use crate::error::AppError;
use crate::models::{DraftPost, UserProfile};
use async_trait::async_trait;
use serde::Serialize;

/// Hands a confirmed draft to whatever does the posting.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, profile: &UserProfile, draft: &DraftPost) -> Result<(), AppError>;
}

/// Posts confirmed drafts as JSON to a configured webhook URL.
#[derive(Clone)]
pub struct AutomationHookPublisher {
    http: reqwest::Client,
    url: String,
}

impl AutomationHookPublisher {
    pub fn new(url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishPayload<'a> {
    user_id: &'a str,
    draft_id: &'a str,
    image_url: &'a str,
    caption: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    facebook_page_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instagram_account_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    access_token: Option<&'a str>,
}

#[async_trait]
impl Publisher for AutomationHookPublisher {
    async fn publish(&self, profile: &UserProfile, draft: &DraftPost) -> Result<(), AppError> {
        let payload = PublishPayload {
            user_id: &profile.id,
            draft_id: &draft.id,
            image_url: &draft.image_url,
            caption: &draft.caption,
            facebook_page_id: profile.facebook_page_id.as_deref(),
            instagram_account_id: profile.instagram_account_id.as_deref(),
            access_token: profile.social_access_token.as_deref(),
        };

        let response = self
            .http
            .post(&self.url)
            .header("Idempotency-Key", &draft.id)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Publish hook unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Internal(anyhow::anyhow!(
                "Publish hook returned HTTP {}",
                response.status()
            )));
        }

        tracing::info!(profile_id = %profile.id, draft_id = %draft.id, "Draft forwarded to publish hook");
        Ok(())
    }
}
