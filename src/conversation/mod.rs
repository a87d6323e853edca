// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! WhatsApp conversation state machine.
//!
//! One inbound message is first routed (pure, no I/O) and then executed
//! against the injected collaborators. Routing order, first match wins:
//! 1. `RESET` from a known sender
//! 2. account-linking phrase
//! 3. unknown sender
//! 4. onboarding answer (no media)
//! 5. caption correction (text, no media)
//! 6. `OUI` confirmation
//! 7. photo: generation
//! 8. anything else: silence
//!
//! Execution returns the replies instead of sending them, so every state
//! mutation (including the credit debit) completes before the user hears back.

pub mod command;
pub mod messages;
pub mod onboarding;

use crate::db::{DebitOutcome, Store};
use crate::error::{AppError, Result};
use crate::models::{DraftStatus, OnboardingStep, UserProfile};
use crate::services::{
    CaptionGenerator, ChatChannel, CreditLedger, ImageFinisher, OutboundMessage, Publisher,
};
use command::Command;
use std::sync::Arc;

/// One message received from the chat channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Channel identity, e.g. `whatsapp:+33612345678`
    pub from: String,
    pub body: String,
    pub media_url: Option<String>,
}

/// What to do with an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Reset,
    Link { profile_id: &'a str },
    UnknownSender,
    Onboarding { step: OnboardingStep, answer: &'a str },
    /// Rewrite the latest draft. A no-op when there is none.
    Correction { instructions: &'a str },
    Confirm,
    Generate { media_url: &'a str },
    Ignore,
}

impl Route<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Route::Reset => "reset",
            Route::Link { .. } => "link",
            Route::UnknownSender => "unknown_sender",
            Route::Onboarding { .. } => "onboarding",
            Route::Correction { .. } => "correction",
            Route::Confirm => "confirm",
            Route::Generate { .. } => "generate",
            Route::Ignore => "ignore",
        }
    }
}

/// Resolve an inbound message against the sender's profile (if any).
pub fn route<'a>(inbound: &'a InboundMessage, profile: Option<&UserProfile>) -> Route<'a> {
    let command = command::parse(&inbound.body);
    let media_url = inbound
        .media_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());

    match command {
        Command::Reset if profile.is_some() => return Route::Reset,
        Command::Link { profile_id } => return Route::Link { profile_id },
        _ => {}
    }

    let Some(profile) = profile else {
        return Route::UnknownSender;
    };

    if media_url.is_none() {
        if let Some(step) = profile.onboarding_step.filter(|_| profile.is_onboarding()) {
            return Route::Onboarding {
                step,
                answer: inbound.body.trim(),
            };
        }
        if let Command::Text(instructions) = command {
            return Route::Correction { instructions };
        }
    }

    if command == Command::Confirm {
        return Route::Confirm;
    }

    match media_url {
        Some(media_url) => Route::Generate { media_url },
        None => Route::Ignore,
    }
}

/// Executes routes against storage and the hosted collaborators.
pub struct ConversationEngine {
    db: Arc<dyn Store>,
    ledger: CreditLedger,
    captions: Arc<dyn CaptionGenerator>,
    finisher: Arc<dyn ImageFinisher>,
    channel: Arc<dyn ChatChannel>,
    publisher: Option<Arc<dyn Publisher>>,
}

impl ConversationEngine {
    pub fn new(
        db: Arc<dyn Store>,
        captions: Arc<dyn CaptionGenerator>,
        finisher: Arc<dyn ImageFinisher>,
        channel: Arc<dyn ChatChannel>,
        publisher: Option<Arc<dyn Publisher>>,
    ) -> Self {
        Self {
            ledger: CreditLedger::new(db.clone()),
            db,
            captions,
            finisher,
            channel,
            publisher,
        }
    }

    /// Process one inbound message and return the replies, in order.
    pub async fn handle(&self, inbound: &InboundMessage) -> Result<Vec<OutboundMessage>> {
        let profile = self.db.find_profile_by_phone(&inbound.from).await?;
        let route = route(inbound, profile.as_ref());

        tracing::info!(
            from = %inbound.from,
            route = route.name(),
            profile_id = profile.as_ref().map(|p| p.id.as_str()),
            has_media = inbound.media_url.is_some(),
            "Inbound WhatsApp message"
        );

        match (route, profile) {
            (Route::Link { profile_id }, _) => self.link(&inbound.from, profile_id).await,
            (Route::UnknownSender, _) => Ok(vec![OutboundMessage::text(messages::UNKNOWN_SENDER)]),
            (Route::Ignore, _) => Ok(vec![]),
            (route, Some(profile)) => self.handle_known(route, profile).await,
            (route, None) => Err(AppError::Internal(anyhow::anyhow!(
                "Route {} requires a profile",
                route.name()
            ))),
        }
    }

    async fn handle_known(
        &self,
        route: Route<'_>,
        mut profile: UserProfile,
    ) -> Result<Vec<OutboundMessage>> {
        match route {
            Route::Reset => {
                profile.business_name = None;
                profile.activity = None;
                profile.onboarding_step = Some(OnboardingStep::AskName);
                self.db.upsert_profile(&profile).await?;

                tracing::info!(profile_id = %profile.id, "Onboarding reset");
                Ok(vec![OutboundMessage::text(messages::RESET_DONE)])
            }
            Route::Onboarding { step, answer } => {
                if answer.is_empty() {
                    return Ok(onboarding::question(step)
                        .map(OutboundMessage::text)
                        .into_iter()
                        .collect());
                }

                let Some(prompt) = onboarding::advance(&mut profile, answer) else {
                    tracing::warn!(
                        profile_id = %profile.id,
                        step = step.as_str(),
                        "Onboarding step takes no answer; ignoring"
                    );
                    return Ok(vec![]);
                };
                self.db.upsert_profile(&profile).await?;

                tracing::info!(
                    profile_id = %profile.id,
                    from_step = step.as_str(),
                    "Onboarding advanced"
                );
                Ok(vec![OutboundMessage::text(prompt)])
            }
            Route::Correction { instructions } => self.correct(&profile, instructions).await,
            Route::Confirm => self.confirm(&profile).await,
            Route::Generate { media_url } => self.generate(&profile, media_url).await,
            Route::Link { .. } | Route::UnknownSender | Route::Ignore => Ok(vec![]),
        }
    }

    /// Attach `phone` to `profile_id` and restart onboarding.
    async fn link(&self, phone: &str, profile_id: &str) -> Result<Vec<OutboundMessage>> {
        let Some(mut target) = self.db.get_profile(profile_id).await? else {
            tracing::warn!(from = %phone, profile_id, "Link attempt for unknown profile");
            return Ok(vec![OutboundMessage::text(messages::LINK_FAILED)]);
        };

        // A number routes to exactly one profile.
        if let Some(mut previous) = self.db.find_profile_by_phone(phone).await? {
            if previous.id != target.id {
                previous.whatsapp_number = None;
                self.db.upsert_profile(&previous).await?;
                tracing::info!(profile_id = %previous.id, "WhatsApp number detached");
            }
        }

        target.whatsapp_number = Some(phone.to_string());
        target.business_name = None;
        target.activity = None;
        target.city = None;
        target.onboarding_step = Some(OnboardingStep::AskName);
        self.db.upsert_profile(&target).await?;

        tracing::info!(profile_id = %target.id, "WhatsApp number linked");
        Ok(vec![OutboundMessage::text(messages::LINK_WELCOME)])
    }

    async fn correct(
        &self,
        profile: &UserProfile,
        instructions: &str,
    ) -> Result<Vec<OutboundMessage>> {
        let draft = self.db.most_recent_draft(&profile.id, None).await?;

        // Only the pending draft is editable, so a later OUI confirms what was edited.
        let Some(draft) = draft.filter(|d| d.status == DraftStatus::Draft) else {
            tracing::debug!(profile_id = %profile.id, "No pending draft to correct");
            return Ok(vec![]);
        };

        let caption = self
            .captions
            .revise(&draft.caption, instructions, &profile.business_context())
            .await?;
        self.db.update_draft_caption(&draft.id, &caption).await?;

        tracing::info!(profile_id = %profile.id, draft_id = %draft.id, "Draft caption revised");
        Ok(vec![OutboundMessage::text(messages::revised(&caption))])
    }

    async fn confirm(&self, profile: &UserProfile) -> Result<Vec<OutboundMessage>> {
        let Some(draft) = self
            .db
            .most_recent_draft(&profile.id, Some(DraftStatus::Draft))
            .await?
        else {
            return Ok(vec![OutboundMessage::text(messages::NO_PENDING_POST)]);
        };

        // Recorded before forwarding: a forwarded draft is never confirmable again.
        let status = match &self.publisher {
            Some(_) => DraftStatus::Published,
            None => DraftStatus::Delivered,
        };
        self.db.mark_draft_status(&draft.id, status).await?;

        if let Some(publisher) = &self.publisher {
            if let Err(e) = publisher.publish(profile, &draft).await {
                if let Err(revert) = self
                    .db
                    .mark_draft_status(&draft.id, DraftStatus::Draft)
                    .await
                {
                    tracing::error!(
                        draft_id = %draft.id,
                        error = %revert,
                        "Failed to reopen draft after publish failure"
                    );
                }
                return Err(e);
            }
        }

        tracing::info!(
            profile_id = %profile.id,
            draft_id = %draft.id,
            status = status.as_str(),
            "Draft confirmed"
        );

        let credits = (!profile.is_pro).then(|| profile.available_credits());
        Ok(vec![
            OutboundMessage::text(messages::final_caption(
                &draft.caption,
                status == DraftStatus::Published,
            )),
            OutboundMessage::with_media(messages::FINAL_IMAGE, draft.image_url),
            OutboundMessage::text(messages::balance(credits)),
        ])
    }

    /// Photo to draft. The debit is the last side effect.
    async fn generate(
        &self,
        profile: &UserProfile,
        media_url: &str,
    ) -> Result<Vec<OutboundMessage>> {
        if !CreditLedger::has_available_credit(profile) {
            return Ok(vec![OutboundMessage::text(messages::OUT_OF_CREDITS)]);
        }
        if profile.is_onboarding() {
            return Ok(vec![OutboundMessage::text(messages::FINISH_ONBOARDING)]);
        }

        let image = self.channel.fetch_media(media_url).await?;
        let image_url = self
            .finisher
            .finish(&image, profile.logo_url.as_deref())
            .await?;
        let captions = self
            .captions
            .generate(&image, &profile.business_context())
            .await?;

        let caption = captions.chat_caption();
        if caption.is_empty() {
            return Err(AppError::CaptionApi("Generated caption is empty".to_string()));
        }

        let draft = self
            .db
            .create_draft(&profile.id, &image_url, &caption)
            .await?;

        let credits = match self.ledger.debit(&profile.id).await {
            Ok(DebitOutcome::Debited { remaining }) => Some(remaining),
            Ok(DebitOutcome::Unlimited) => None,
            Ok(DebitOutcome::Insufficient) | Ok(DebitOutcome::NotFound) => {
                // Lost a race with another generation.
                self.db
                    .mark_draft_status(&draft.id, DraftStatus::Discarded)
                    .await?;
                return Ok(vec![OutboundMessage::text(messages::OUT_OF_CREDITS)]);
            }
            Err(e) => {
                if let Err(discard_err) = self
                    .db
                    .mark_draft_status(&draft.id, DraftStatus::Discarded)
                    .await
                {
                    tracing::error!(
                        draft_id = %draft.id,
                        error = %discard_err,
                        "Failed to discard draft after debit failure"
                    );
                }
                return Err(e);
            }
        };

        tracing::info!(
            profile_id = %profile.id,
            draft_id = %draft.id,
            remaining = ?credits,
            "Draft generated"
        );

        Ok(vec![OutboundMessage::with_media(
            messages::proposal(&caption, credits),
            image_url,
        )])
    }
}
