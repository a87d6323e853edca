// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! WhatsApp conversation scenarios, driven through the engine against the
//! in-memory store.

use async_trait::async_trait;
use pictopost::conversation::{messages, ConversationEngine, InboundMessage};
use pictopost::db::{DraftStore, MemoryStore, ProfileStore};
use pictopost::error::AppError;
use pictopost::models::{BusinessContext, CaptionSet, DraftStatus, ImagePayload, OnboardingStep};
use pictopost::services::{CaptionGenerator, OutboundMessage};
use std::sync::atomic::Ordering;
use std::sync::Arc;

mod common;
use common::{
    caption_set, create_test_app, create_test_app_with, credits_of, seed_profile, TestApp,
    TestOptions, PHONE,
};

const PHOTO_URL: &str = "https://api.twilio.test/Media/ME1";

fn text(body: &str) -> InboundMessage {
    InboundMessage {
        from: PHONE.to_string(),
        body: body.to_string(),
        media_url: None,
    }
}

fn photo() -> InboundMessage {
    InboundMessage {
        from: PHONE.to_string(),
        body: String::new(),
        media_url: Some(PHOTO_URL.to_string()),
    }
}

async fn send(app: &TestApp, inbound: InboundMessage) -> Vec<OutboundMessage> {
    app.state.conversation.handle(&inbound).await.unwrap()
}

fn bodies(replies: &[OutboundMessage]) -> Vec<&str> {
    replies.iter().map(|m| m.body.as_str()).collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// GENERATION & CREDITS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_single_credit_allows_exactly_one_generation() {
    let app = create_test_app();
    seed_profile(&app.store, "u1", Some(PHONE), 1, Some(OnboardingStep::Completed)).await;

    let replies = send(&app, photo()).await;
    assert_eq!(replies.len(), 1);
    assert_eq!(
        replies[0].media_url.as_deref(),
        Some("https://img.test/finished/1.jpg")
    );
    assert!(replies[0].body.contains("Caption 1"));
    assert!(replies[0].body.contains(&messages::balance(Some(0))));

    let drafts = app.store.drafts_for("u1");
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].status, DraftStatus::Draft);
    assert_eq!(drafts[0].image_url, "https://img.test/finished/1.jpg");
    assert_eq!(credits_of(&app.store, "u1").await, 0);

    let replies = send(&app, photo()).await;
    assert_eq!(bodies(&replies), vec![messages::OUT_OF_CREDITS]);
    assert_eq!(app.store.drafts_for("u1").len(), 1);
    assert_eq!(credits_of(&app.store, "u1").await, 0);
    assert_eq!(app.captions.generate_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_pro_profile_generates_without_credits() {
    let app = create_test_app();
    let mut profile = seed_profile(&app.store, "pro", Some(PHONE), 0, None).await;
    profile.is_pro = true;
    app.store.upsert_profile(&profile).await.unwrap();

    let replies = send(&app, photo()).await;
    assert_eq!(replies.len(), 1);
    assert!(replies[0].body.contains(&messages::balance(None)));
    assert_eq!(app.store.drafts_for("pro").len(), 1);
    assert_eq!(credits_of(&app.store, "pro").await, 0);
}

#[tokio::test]
async fn test_photo_during_onboarding_is_refused() {
    let app = create_test_app();
    seed_profile(&app.store, "u1", Some(PHONE), 3, Some(OnboardingStep::AskActivity)).await;

    let replies = send(&app, photo()).await;
    assert_eq!(bodies(&replies), vec![messages::FINISH_ONBOARDING]);
    assert!(app.store.drafts_for("u1").is_empty());
    assert_eq!(credits_of(&app.store, "u1").await, 3);
    assert_eq!(app.finisher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_stored_logo_is_overlaid() {
    let app = create_test_app();
    let mut profile = seed_profile(&app.store, "u1", Some(PHONE), 2, None).await;
    profile.logo_url = Some("https://img.test/logos/u1.png".to_string());
    profile.business_name = Some("Chez Marcel".to_string());
    app.store.upsert_profile(&profile).await.unwrap();

    send(&app, photo()).await;

    assert_eq!(
        app.finisher.logos.lock().unwrap().clone(),
        vec![Some("https://img.test/logos/u1.png".to_string())]
    );
    assert_eq!(
        app.captions.contexts.lock().unwrap()[0].business_name.as_deref(),
        Some("Chez Marcel")
    );
}

#[tokio::test]
async fn test_upstream_failure_has_no_side_effects() {
    let app = create_test_app();
    seed_profile(&app.store, "u1", Some(PHONE), 2, None).await;
    app.captions.fail.store(true, Ordering::SeqCst);

    let result = app.state.conversation.handle(&photo()).await;
    assert!(matches!(result, Err(AppError::CaptionApi(_))));
    assert!(app.store.drafts_for("u1").is_empty());
    assert_eq!(credits_of(&app.store, "u1").await, 2);

    app.captions.fail.store(false, Ordering::SeqCst);
    app.finisher.fail.store(true, Ordering::SeqCst);
    let result = app.state.conversation.handle(&photo()).await;
    assert!(matches!(result, Err(AppError::ImageHost(_))));
    assert_eq!(credits_of(&app.store, "u1").await, 2);

    app.finisher.fail.store(false, Ordering::SeqCst);
    app.channel.fail_fetch.store(true, Ordering::SeqCst);
    let result = app.state.conversation.handle(&photo()).await;
    assert!(matches!(result, Err(AppError::Messaging(_))));
    assert!(app.store.drafts_for("u1").is_empty());
    assert_eq!(credits_of(&app.store, "u1").await, 2);
}

/// Spends the profile's last credit while captions are being written,
/// as a concurrent generation would.
struct RacingCaptions {
    store: Arc<MemoryStore>,
}

#[async_trait]
impl CaptionGenerator for RacingCaptions {
    async fn generate(
        &self,
        _image: &ImagePayload,
        _context: &BusinessContext,
    ) -> Result<CaptionSet, AppError> {
        self.store.debit_credit("u1").await?;
        Ok(caption_set("Too late"))
    }

    async fn revise(
        &self,
        previous: &str,
        _instructions: &str,
        _context: &BusinessContext,
    ) -> Result<String, AppError> {
        Ok(previous.to_string())
    }
}

#[tokio::test]
async fn test_losing_the_debit_race_discards_the_draft() {
    let app = create_test_app();
    seed_profile(&app.store, "u1", Some(PHONE), 1, None).await;

    let engine = ConversationEngine::new(
        app.store.clone(),
        Arc::new(RacingCaptions {
            store: app.store.clone(),
        }),
        app.finisher.clone(),
        app.channel.clone(),
        None,
    );

    let replies = engine.handle(&photo()).await.unwrap();
    assert_eq!(bodies(&replies), vec![messages::OUT_OF_CREDITS]);

    let drafts = app.store.drafts_for("u1");
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].status, DraftStatus::Discarded);
    assert_eq!(credits_of(&app.store, "u1").await, 0);

    // The discarded draft is never offered for confirmation.
    let replies = engine.handle(&text("OUI")).await.unwrap();
    assert_eq!(bodies(&replies), vec![messages::NO_PENDING_POST]);
}

// ═══════════════════════════════════════════════════════════════════════════
// ONBOARDING
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_onboarding_follows_fixed_order() {
    let app = create_test_app();
    seed_profile(&app.store, "u1", Some(PHONE), 3, Some(OnboardingStep::AskName)).await;

    assert_eq!(
        bodies(&send(&app, text("Chez Marcel")).await),
        vec![messages::ASK_ACTIVITY]
    );
    assert_eq!(
        bodies(&send(&app, text("Boulangerie")).await),
        vec![messages::ASK_CITY]
    );
    assert_eq!(
        bodies(&send(&app, text("Lyon")).await),
        vec![messages::ONBOARDING_COMPLETE]
    );

    let profile = app.store.get_profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.business_name.as_deref(), Some("Chez Marcel"));
    assert_eq!(profile.activity.as_deref(), Some("Boulangerie"));
    assert_eq!(profile.city.as_deref(), Some("Lyon"));
    assert_eq!(profile.onboarding_step, Some(OnboardingStep::Completed));

    // Now photos go through.
    let replies = send(&app, photo()).await;
    assert!(replies[0].media_url.is_some());
}

#[tokio::test]
async fn test_onboarding_never_jumps_ahead() {
    let app = create_test_app();
    seed_profile(&app.store, "u1", Some(PHONE), 3, Some(OnboardingStep::AskName)).await;

    // A city sent while the name is pending is stored as the name.
    send(&app, text("Paris")).await;

    let profile = app.store.get_profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.business_name.as_deref(), Some("Paris"));
    assert_eq!(profile.city, None);
    assert_eq!(profile.onboarding_step, Some(OnboardingStep::AskActivity));
}

#[tokio::test]
async fn test_confirmation_keyword_is_an_answer_while_onboarding() {
    let app = create_test_app();
    seed_profile(&app.store, "u1", Some(PHONE), 3, Some(OnboardingStep::AskCity)).await;

    send(&app, text("OUI")).await;

    let profile = app.store.get_profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.city.as_deref(), Some("OUI"));
    assert_eq!(profile.onboarding_step, Some(OnboardingStep::Completed));
}

#[tokio::test]
async fn test_empty_onboarding_message_repeats_question() {
    let app = create_test_app();
    seed_profile(&app.store, "u1", Some(PHONE), 3, Some(OnboardingStep::AskActivity)).await;

    assert_eq!(
        bodies(&send(&app, text("  ")).await),
        vec![messages::ASK_ACTIVITY]
    );
    let profile = app.store.get_profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.onboarding_step, Some(OnboardingStep::AskActivity));
    assert_eq!(profile.activity, None);
}

#[tokio::test]
async fn test_unrecognized_step_is_inert() {
    let app = create_test_app();
    seed_profile(&app.store, "u1", Some(PHONE), 3, Some(OnboardingStep::Unknown)).await;

    assert!(send(&app, text("hello")).await.is_empty());
    let profile = app.store.get_profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.onboarding_step, Some(OnboardingStep::Unknown));
    assert_eq!(profile.business_name, None);
}

#[tokio::test]
async fn test_reset_restarts_onboarding() {
    let app = create_test_app();
    let mut profile = seed_profile(&app.store, "u1", Some(PHONE), 2, None).await;
    profile.business_name = Some("Old".to_string());
    profile.activity = Some("Old activity".to_string());
    profile.city = Some("Lyon".to_string());
    app.store.upsert_profile(&profile).await.unwrap();

    assert_eq!(
        bodies(&send(&app, text("reset")).await),
        vec![messages::RESET_DONE]
    );

    let profile = app.store.get_profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.business_name, None);
    assert_eq!(profile.activity, None);
    assert_eq!(profile.city.as_deref(), Some("Lyon"));
    assert_eq!(profile.onboarding_step, Some(OnboardingStep::AskName));
    assert_eq!(profile.credits_remaining, 2);
}

// ═══════════════════════════════════════════════════════════════════════════
// SENDER IDENTITY & LINKING
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_unknown_sender_is_told_to_link() {
    let app = create_test_app();

    assert_eq!(
        bodies(&send(&app, text("bonjour")).await),
        vec![messages::UNKNOWN_SENDER]
    );
    assert_eq!(
        bodies(&send(&app, photo()).await),
        vec![messages::UNKNOWN_SENDER]
    );
    assert!(app
        .store
        .find_profile_by_phone(PHONE)
        .await
        .unwrap()
        .is_none());
    assert_eq!(app.finisher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_link_attaches_number_and_starts_onboarding() {
    let app = create_test_app();
    let mut profile = seed_profile(&app.store, "web-1", None, 3, None).await;
    profile.business_name = Some("Stale".to_string());
    profile.city = Some("Stale".to_string());
    app.store.upsert_profile(&profile).await.unwrap();

    assert_eq!(
        bodies(&send(&app, text("LIER MON COMPTE web-1")).await),
        vec![messages::LINK_WELCOME]
    );

    let linked = app
        .store
        .find_profile_by_phone(PHONE)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(linked.id, "web-1");
    assert_eq!(linked.onboarding_step, Some(OnboardingStep::AskName));
    assert_eq!(linked.business_name, None);
    assert_eq!(linked.city, None);
    assert_eq!(linked.credits_remaining, 3);
}

#[tokio::test]
async fn test_link_to_unknown_profile_fails_without_changes() {
    let app = create_test_app();
    seed_profile(&app.store, "u1", Some(PHONE), 3, None).await;

    assert_eq!(
        bodies(&send(&app, text("LIER MON COMPTE nope")).await),
        vec![messages::LINK_FAILED]
    );
    let profile = app.store.get_profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.whatsapp_number.as_deref(), Some(PHONE));
    assert_eq!(profile.onboarding_step, None);
}

#[tokio::test]
async fn test_relinking_moves_the_number() {
    let app = create_test_app();
    seed_profile(&app.store, "old", Some(PHONE), 1, None).await;
    seed_profile(&app.store, "new", None, 5, None).await;

    send(&app, text("LIER MON COMPTE new")).await;

    let old = app.store.get_profile("old").await.unwrap().unwrap();
    assert_eq!(old.whatsapp_number, None);
    let routed = app
        .store
        .find_profile_by_phone(PHONE)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(routed.id, "new");
}

// ═══════════════════════════════════════════════════════════════════════════
// CORRECTION & CONFIRMATION
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_confirm_without_pending_draft() {
    let app = create_test_app();
    seed_profile(&app.store, "u1", Some(PHONE), 3, None).await;

    assert_eq!(
        bodies(&send(&app, text("oui")).await),
        vec![messages::NO_PENDING_POST]
    );
    assert!(app.store.drafts_for("u1").is_empty());
    assert_eq!(credits_of(&app.store, "u1").await, 3);
}

#[tokio::test]
async fn test_correction_then_confirmation_use_the_same_draft() {
    let app = create_test_app();
    seed_profile(&app.store, "u1", Some(PHONE), 3, None).await;

    send(&app, photo()).await;
    let draft_id = app.store.drafts_for("u1")[0].id.clone();

    let replies = send(&app, text("plus court")).await;
    assert_eq!(replies.len(), 1);
    assert!(replies[0].body.contains("[plus court]"));

    let drafts = app.store.drafts_for("u1");
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].id, draft_id);
    assert_eq!(drafts[0].status, DraftStatus::Draft);
    assert!(drafts[0].caption.ends_with("[plus court]"));
    // Corrections are free.
    assert_eq!(credits_of(&app.store, "u1").await, 2);

    let replies = send(&app, text("OUI")).await;
    assert_eq!(replies.len(), 3);
    assert!(replies[0].body.contains("[plus court]"));
    assert_eq!(replies[0].media_url, None);
    assert_eq!(
        replies[1].media_url.as_deref(),
        Some("https://img.test/finished/1.jpg")
    );
    assert_eq!(replies[2].body, messages::balance(Some(2)));

    let confirmed = app
        .store
        .most_recent_draft("u1", None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(confirmed.id, draft_id);
    assert_eq!(confirmed.status, DraftStatus::Delivered);
}

#[tokio::test]
async fn test_instruction_starting_with_lier_revises_the_draft() {
    let app = create_test_app();
    seed_profile(&app.store, "u1", Some(PHONE), 3, None).await;
    seed_profile(&app.store, "produit", None, 5, None).await;

    send(&app, photo()).await;
    let replies = send(&app, text("Lier le texte au produit")).await;

    assert_eq!(replies.len(), 1);
    assert!(replies[0].body.contains("[Lier le texte au produit]"));
    assert_eq!(app.captions.revise_calls.load(Ordering::SeqCst), 1);
    let routed = app
        .store
        .find_profile_by_phone(PHONE)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(routed.id, "u1");
}

#[tokio::test]
async fn test_text_without_draft_is_silent() {
    let app = create_test_app();
    seed_profile(&app.store, "u1", Some(PHONE), 3, None).await;

    assert!(send(&app, text("bonjour")).await.is_empty());
    assert!(send(&app, text("")).await.is_empty());
    assert_eq!(app.captions.revise_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_confirmed_draft_is_not_corrected() {
    let app = create_test_app();
    seed_profile(&app.store, "u1", Some(PHONE), 3, None).await;

    send(&app, photo()).await;
    send(&app, text("OUI")).await;

    assert!(send(&app, text("merci !")).await.is_empty());
    assert_eq!(app.captions.revise_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        bodies(&send(&app, text("OUI")).await),
        vec![messages::NO_PENDING_POST]
    );
}

#[tokio::test]
async fn test_confirm_forwards_to_publish_hook_when_configured() {
    let app = create_test_app_with(TestOptions {
        with_publisher: true,
        ..Default::default()
    });
    seed_profile(&app.store, "u1", Some(PHONE), 3, None).await;

    send(&app, photo()).await;
    let replies = send(&app, text("oui")).await;
    assert_eq!(replies.len(), 3);
    assert!(replies[0].body.contains(&messages::final_caption("", true)));

    let draft = app.store.drafts_for("u1").remove(0);
    assert_eq!(draft.status, DraftStatus::Published);

    let publisher = app.publisher.as_ref().unwrap();
    assert_eq!(publisher.published.lock().unwrap().clone(), vec![draft.id]);
}

#[tokio::test]
async fn test_failed_publish_reopens_draft_and_retry_publishes_once() {
    let app = create_test_app_with(TestOptions {
        with_publisher: true,
        ..Default::default()
    });
    seed_profile(&app.store, "u1", Some(PHONE), 3, None).await;
    send(&app, photo()).await;

    let publisher = app.publisher.as_ref().unwrap();
    publisher.fail.store(true, Ordering::SeqCst);
    let result = app.state.conversation.handle(&text("oui")).await;
    assert!(result.is_err());
    assert_eq!(app.store.drafts_for("u1")[0].status, DraftStatus::Draft);
    assert!(publisher.published.lock().unwrap().is_empty());

    publisher.fail.store(false, Ordering::SeqCst);
    assert_eq!(send(&app, text("oui")).await.len(), 3);
    assert_eq!(
        bodies(&send(&app, text("oui")).await),
        vec![messages::NO_PENDING_POST]
    );

    let draft = app.store.drafts_for("u1").remove(0);
    assert_eq!(draft.status, DraftStatus::Published);
    assert_eq!(publisher.published.lock().unwrap().clone(), vec![draft.id]);
}

#[tokio::test]
async fn test_confirm_picks_most_recent_pending_draft() {
    let app = create_test_app();
    seed_profile(&app.store, "u1", Some(PHONE), 3, None).await;

    send(&app, photo()).await;
    send(&app, photo()).await;
    send(&app, text("OUI")).await;

    let drafts = app.store.drafts_for("u1");
    assert_eq!(drafts[0].status, DraftStatus::Draft);
    assert_eq!(drafts[1].status, DraftStatus::Delivered);
    assert_eq!(credits_of(&app.store, "u1").await, 1);
}
