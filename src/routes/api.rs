// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Web app API: caption generation, logo upload, guest profiles.

use crate::conversation::command::LINK_PHRASE;
use crate::db::{new_id, DebitOutcome};
use crate::error::{AppError, Result};
use crate::models::{BusinessContext, CaptionSet, ImagePayload, UserProfile};
use crate::services::CreditLedger;
use crate::time_utils::now_rfc3339;
use crate::AppState;
use axum::{
    extract::{DefaultBodyLimit, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Base64 photos are large; allow up to 10 MiB request bodies on these routes.
const MAX_IMAGE_BODY_BYTES: usize = 10 * 1024 * 1024;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/generate", post(generate))
        .route("/api/logo", post(upload_logo))
        .route("/api/profiles/guest", post(create_guest_profile))
        .route("/api/profiles/{id}", get(get_profile))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BODY_BYTES))
}

fn validate<T: Validate>(request: &T) -> Result<()> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

async fn load_profile(state: &AppState, profile_id: &str) -> Result<UserProfile> {
    state
        .db
        .get_profile(profile_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Profile {}", profile_id)))
}

// ─── Generation ──────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Data URL or bare base64.
    #[serde(default, alias = "image")]
    pub image_base64: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub tone: Option<String>,
    #[validate(length(max = 200))]
    pub business_name: Option<String>,
    #[validate(length(max = 100))]
    pub activity: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub user_id: Option<String>,
}

/// Generate multi-platform captions for one photo.
///
/// With a `userId`, the profile must hold a credit before the model is
/// called, and one credit is debited once the captions exist.
async fn generate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<CaptionSet>> {
    validate(&request)?;

    let encoded = request
        .image_base64
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Aucune image fournie".to_string()))?;
    let image = ImagePayload::from_base64(encoded).map_err(AppError::BadRequest)?;

    let mut context = BusinessContext {
        business_name: request.business_name,
        activity: request.activity,
        city: request.city,
        brand_tone: request.tone,
    };

    let user_id = request.user_id.as_deref();
    if let Some(user_id) = user_id {
        let profile = load_profile(&state, user_id).await?;
        if !CreditLedger::has_available_credit(&profile) {
            return Err(AppError::InsufficientCredits);
        }
        context = context.or(profile.business_context());
    }

    let captions = state.captions.generate(&image, &context).await?;

    if let Some(user_id) = user_id {
        match state.ledger.debit(user_id).await? {
            DebitOutcome::Debited { .. } | DebitOutcome::Unlimited => {}
            DebitOutcome::Insufficient => return Err(AppError::InsufficientCredits),
            DebitOutcome::NotFound => {
                return Err(AppError::NotFound(format!("Profile {}", user_id)))
            }
        }
    }

    tracing::info!(user_id, "Web captions generated");
    Ok(Json(captions))
}

// ─── Logo ────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LogoRequest {
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
    #[validate(length(min = 1))]
    pub logo_base64: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct LogoResponse {
    pub logo_url: String,
}

/// Host a merchant logo and store its URL on the profile.
async fn upload_logo(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LogoRequest>,
) -> Result<Json<LogoResponse>> {
    validate(&request)?;

    let logo = ImagePayload::from_base64(&request.logo_base64).map_err(AppError::BadRequest)?;
    let mut profile = load_profile(&state, &request.user_id).await?;

    let logo_url = state.finisher.host_logo(&logo, &profile.id).await?;
    profile.logo_url = Some(logo_url.clone());
    state.db.upsert_profile(&profile).await?;

    Ok(Json(LogoResponse { logo_url }))
}

// ─── Profiles ────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GuestProfileRequest {
    #[validate(length(max = 200))]
    pub business_name: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub tone: Option<String>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct GuestProfileResponse {
    pub user_id: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub credits_remaining: i64,
    /// Message to send on WhatsApp to link this profile.
    pub link_command: String,
}

/// Create a profile with the starter credit grant.
async fn create_guest_profile(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GuestProfileRequest>,
) -> Result<Json<GuestProfileResponse>> {
    validate(&request)?;

    let mut profile = UserProfile::new(new_id(), state.config.starter_credits, now_rfc3339());
    profile.business_name = request.business_name.filter(|s| !s.trim().is_empty());
    profile.city = request.city.filter(|s| !s.trim().is_empty());
    profile.brand_tone = request.tone.filter(|s| !s.trim().is_empty());
    state.db.upsert_profile(&profile).await?;

    tracing::info!(
        profile_id = %profile.id,
        credits = profile.credits_remaining,
        "Guest profile created"
    );

    Ok(Json(GuestProfileResponse {
        link_command: format!("{} {}", LINK_PHRASE, profile.id),
        credits_remaining: profile.available_credits(),
        user_id: profile.id,
    }))
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub user_id: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub credits_remaining: i64,
    pub is_pro: bool,
    pub onboarding_step: Option<String>,
    pub business_name: Option<String>,
    pub activity: Option<String>,
    pub city: Option<String>,
    pub brand_tone: Option<String>,
    pub logo_url: Option<String>,
    pub whatsapp_linked: bool,
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProfileResponse>> {
    let profile = load_profile(&state, &id).await?;

    Ok(Json(ProfileResponse {
        credits_remaining: profile.available_credits(),
        onboarding_step: profile.onboarding_step.map(|s| s.as_str().to_string()),
        whatsapp_linked: profile.whatsapp_number.is_some(),
        user_id: profile.id,
        is_pro: profile.is_pro,
        business_name: profile.business_name,
        activity: profile.activity,
        city: profile.city,
        brand_tone: profile.brand_tone,
        logo_url: profile.logo_url,
    }))
}
