// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Merchant profile model for storage and API.

use serde::{Deserialize, Serialize};

/// Stage of the guided WhatsApp Q&A.
///
/// Unrecognized values read back from storage land in `Unknown`, which the
/// conversation treats as inert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    AskName,
    AskActivity,
    AskCity,
    Completed,
    #[serde(other)]
    Unknown,
}

impl OnboardingStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnboardingStep::AskName => "ask_name",
            OnboardingStep::AskActivity => "ask_activity",
            OnboardingStep::AskCity => "ask_city",
            OnboardingStep::Completed => "completed",
            OnboardingStep::Unknown => "unknown",
        }
    }
}

/// Merchant profile stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Opaque profile ID (also used as document ID)
    pub id: String,
    /// Linked WhatsApp identity, e.g. `whatsapp:+33612345678`
    #[serde(default)]
    pub whatsapp_number: Option<String>,

    // ─── Business Metadata ───────────────────────────────────────
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub activity: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub opening_hours: Option<String>,
    #[serde(default)]
    pub brand_tone: Option<String>,
    /// Hosted logo URL, overlaid on retouched photos
    #[serde(default)]
    pub logo_url: Option<String>,

    // ─── Commercial State ────────────────────────────────────────
    #[serde(default)]
    pub credits_remaining: i64,
    /// Unlimited generations
    #[serde(default)]
    pub is_pro: bool,

    // ─── Conversation ────────────────────────────────────────────
    /// `None` is a legacy profile, treated as already onboarded
    #[serde(default)]
    pub onboarding_step: Option<OnboardingStep>,

    // ─── Social Linkage (opaque, consumed by the publisher) ──────
    #[serde(default)]
    pub facebook_page_id: Option<String>,
    #[serde(default)]
    pub instagram_account_id: Option<String>,
    #[serde(default)]
    pub social_access_token: Option<String>,

    /// When the profile was created (RFC3339)
    pub created_at: String,
}

impl UserProfile {
    /// A fresh profile with the starter credit grant.
    pub fn new(id: impl Into<String>, starter_credits: i64, created_at: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            whatsapp_number: None,
            business_name: None,
            activity: None,
            city: None,
            address: None,
            opening_hours: None,
            brand_tone: None,
            logo_url: None,
            credits_remaining: starter_credits.max(0),
            is_pro: false,
            onboarding_step: None,
            facebook_page_id: None,
            instagram_account_id: None,
            social_access_token: None,
            created_at: created_at.into(),
        }
    }

    /// Balance as shown to users; never negative.
    pub fn available_credits(&self) -> i64 {
        self.credits_remaining.max(0)
    }

    /// Onboarding has started and is not finished.
    pub fn is_onboarding(&self) -> bool {
        matches!(self.onboarding_step, Some(step) if step != OnboardingStep::Completed)
    }

    /// Structured context handed to the caption generator.
    pub fn business_context(&self) -> BusinessContext {
        BusinessContext {
            business_name: self.business_name.clone(),
            activity: self.activity.clone(),
            city: self.city.clone(),
            brand_tone: self.brand_tone.clone(),
        }
    }
}

/// Business facts that steer caption writing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusinessContext {
    pub business_name: Option<String>,
    pub activity: Option<String>,
    pub city: Option<String>,
    pub brand_tone: Option<String>,
}

impl BusinessContext {
    /// Fill empty fields from `fallback`.
    pub fn or(self, fallback: BusinessContext) -> Self {
        Self {
            business_name: non_empty(self.business_name).or(fallback.business_name),
            activity: non_empty(self.activity).or(fallback.activity),
            city: non_empty(self.city).or(fallback.city),
            brand_tone: non_empty(self.brand_tone).or(fallback.brand_tone),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
