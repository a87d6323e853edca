// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod caption;
pub mod draft;
pub mod profile;

pub use caption::{CaptionSet, FacebookPost, GooglePost, ImagePayload, InstagramPost, TikTokPost};
pub use draft::{DraftPost, DraftStatus};
pub use profile::{BusinessContext, OnboardingStep, UserProfile};
