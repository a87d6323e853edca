// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Classification of an inbound message body.

/// Keyword that accepts the current draft.
pub const CONFIRM_KEYWORD: &str = "OUI";

/// Keyword that restarts onboarding.
pub const RESET_KEYWORD: &str = "RESET";

/// Account-linking phrase, as handed out by the web app.
pub const LINK_PHRASE: &str = "LIER MON COMPTE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Reset,
    /// Attach the sender to the profile with this ID.
    Link { profile_id: &'a str },
    Confirm,
    Text(&'a str),
    Empty,
}

/// Classify a message body. Keywords are matched case-insensitively after trimming.
pub fn parse(body: &str) -> Command<'_> {
    let body = body.trim();

    if body.is_empty() {
        return Command::Empty;
    }
    if body.eq_ignore_ascii_case(RESET_KEYWORD) {
        return Command::Reset;
    }
    if let Some(profile_id) = link_target(body) {
        return Command::Link { profile_id };
    }
    if body.eq_ignore_ascii_case(CONFIRM_KEYWORD) {
        return Command::Confirm;
    }

    Command::Text(body)
}

/// Trailing token of a linking phrase, if `body` is one.
fn link_target(body: &str) -> Option<&str> {
    let head = body.get(..LINK_PHRASE.len())?;
    if !head.eq_ignore_ascii_case(LINK_PHRASE) {
        return None;
    }

    let rest = &body[LINK_PHRASE.len()..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    rest.split_whitespace().last()
}
