// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic and hosted collaborators.

pub mod cloudinary;
pub mod ledger;
pub mod openai;
pub mod publisher;
pub mod stripe;
pub mod twilio;

pub use cloudinary::{CloudinaryClient, ImageFinisher};
pub use ledger::CreditLedger;
pub use openai::{CaptionGenerator, OpenAiClient};
pub use publisher::{AutomationHookPublisher, Publisher};
pub use stripe::StripeClient;
pub use twilio::{ChatChannel, OutboundMessage, TwilioClient};
