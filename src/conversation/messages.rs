// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User-facing WhatsApp texts.

pub const ASK_NAME: &str = "Quel est le nom de votre commerce ?";
pub const ASK_ACTIVITY: &str =
    "Super ! Quelle est votre activité ? (ex : boulangerie, coiffeur, fleuriste)";
pub const ASK_CITY: &str = "Dans quelle ville êtes-vous situé ?";
pub const ONBOARDING_COMPLETE: &str =
    "🎉 C'est tout bon ! Envoyez-moi une photo et je rédige votre post.";

pub const RESET_DONE: &str = "🔄 Profil réinitialisé. Quel est le nom de votre commerce ?";
pub const LINK_WELCOME: &str =
    "✅ Compte lié, bienvenue sur Pictopost !\n\nPour commencer, quel est le nom de votre commerce ?";
pub const LINK_FAILED: &str =
    "❌ Identifiant inconnu. Vérifiez le code affiché sur le site et réessayez.";
pub const UNKNOWN_SENDER: &str = "❌ Numéro non reconnu. Liez votre compte depuis le site en envoyant « LIER MON COMPTE <identifiant> ».";

pub const OUT_OF_CREDITS: &str =
    "🚫 Vous n'avez plus de crédits. Rechargez depuis le site pour continuer.";
pub const FINISH_ONBOARDING: &str =
    "✋ Terminez d'abord la configuration de votre profil (répondez à la dernière question).";
pub const NO_PENDING_POST: &str = "🤷 Aucun post en attente. Envoyez une photo pour commencer.";
pub const FINAL_IMAGE: &str = "📸 Votre photo retouchée";
pub const GENERIC_ERROR: &str = "⚠️ Une erreur est survenue. Réessayez dans quelques instants.";

/// Balance line. `None` means unlimited.
pub fn balance(credits: Option<i64>) -> String {
    match credits {
        Some(n) => format!("💳 Crédits restants : {}", n.max(0)),
        None => "💳 Crédits restants : illimités".to_string(),
    }
}

/// Fresh caption sent with the retouched photo.
pub fn proposal(caption: &str, credits: Option<i64>) -> String {
    format!(
        "✨ *PROPOSITION :*\n\n{}\n\n✅ Répondez *OUI* pour valider, ou écrivez une correction.\n\n{}",
        caption,
        balance(credits)
    )
}

pub fn revised(caption: &str) -> String {
    format!(
        "✏️ *NOUVELLE VERSION :*\n\n{}\n\n✅ Répondez *OUI* pour valider.",
        caption
    )
}

/// Final caption after confirmation.
pub fn final_caption(caption: &str, published: bool) -> String {
    if published {
        format!("🚀 Post envoyé pour publication !\n\n{}", caption)
    } else {
        format!("✅ Voici votre post final, prêt à publier :\n\n{}", caption)
    }
}
