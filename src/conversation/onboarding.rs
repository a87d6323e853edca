// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Onboarding transition table.
//!
//! `ask_name -> ask_activity -> ask_city -> completed`. Each answer is stored
//! in the field owned by the *current* step, so the machine never jumps ahead.

use super::messages;
use crate::models::{OnboardingStep, UserProfile};

/// Profile field collected by an onboarding step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    BusinessName,
    Activity,
    City,
}

impl ProfileField {
    pub fn apply(self, profile: &mut UserProfile, value: String) {
        match self {
            ProfileField::BusinessName => profile.business_name = Some(value),
            ProfileField::Activity => profile.activity = Some(value),
            ProfileField::City => profile.city = Some(value),
        }
    }
}

/// Effect of answering a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub field: ProfileField,
    pub next: OnboardingStep,
    /// Reply sent after the transition (next question, or completion).
    pub prompt: &'static str,
}

/// Transition for an answer received at `step`. `None` for steps that take no answer.
pub fn transition(step: OnboardingStep) -> Option<Transition> {
    match step {
        OnboardingStep::AskName => Some(Transition {
            field: ProfileField::BusinessName,
            next: OnboardingStep::AskActivity,
            prompt: messages::ASK_ACTIVITY,
        }),
        OnboardingStep::AskActivity => Some(Transition {
            field: ProfileField::Activity,
            next: OnboardingStep::AskCity,
            prompt: messages::ASK_CITY,
        }),
        OnboardingStep::AskCity => Some(Transition {
            field: ProfileField::City,
            next: OnboardingStep::Completed,
            prompt: messages::ONBOARDING_COMPLETE,
        }),
        OnboardingStep::Completed | OnboardingStep::Unknown => None,
    }
}

/// The question a step is waiting on.
pub fn question(step: OnboardingStep) -> Option<&'static str> {
    match step {
        OnboardingStep::AskName => Some(messages::ASK_NAME),
        OnboardingStep::AskActivity => Some(messages::ASK_ACTIVITY),
        OnboardingStep::AskCity => Some(messages::ASK_CITY),
        OnboardingStep::Completed | OnboardingStep::Unknown => None,
    }
}

/// Store `answer` for the current step and advance. Returns the reply, or
/// `None` if the profile is not at an answerable step.
pub fn advance(profile: &mut UserProfile, answer: &str) -> Option<&'static str> {
    let step = profile.onboarding_step?;
    let t = transition(step)?;

    t.field.apply(profile, answer.trim().to_string());
    profile.onboarding_step = Some(t.next);
    Some(t.prompt)
}
