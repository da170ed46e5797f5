//! Avatar URL derivation.
//!
//! Avatars are cosmetic and never authoritative: a portrait picked from a
//! gendered template family, or a deterministic initials badge.

use rand::Rng;
use serde::Deserialize;
use url::Url;

use crate::types::Gender;

const PORTRAITS_MEN: &str = "https://randomuser.me/api/portraits/men";
const PORTRAITS_WOMEN: &str = "https://randomuser.me/api/portraits/women";
const INITIALS_BASE: &str = "https://ui-avatars.com/api/";
const PORTRAIT_COUNT: u32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvatarStyle {
    /// Random portrait keyed by gender.
    #[default]
    Portrait,
    /// Badge showing the name's initials.
    Initials,
}

/// Derives an avatar URL for a user.
///
/// Without a gender the portrait family is chosen at random.
pub fn generate<R: Rng + ?Sized>(name: &str, gender: Option<Gender>, style: AvatarStyle, rng: &mut R) -> String {
    match style {
        AvatarStyle::Initials => initials_url(name),
        AvatarStyle::Portrait => {
            let gender = gender.unwrap_or_else(|| if rng.gen_bool(0.5) { Gender::Male } else { Gender::Female });
            let base = match gender {
                Gender::Male => PORTRAITS_MEN,
                Gender::Female => PORTRAITS_WOMEN,
            };
            format!("{}/{}.jpg", base, rng.gen_range(0..PORTRAIT_COUNT))
        }
    }
}

/// Uppercased first letters of the first two words, `?` for an empty name.
pub fn initials(name: &str) -> String {
    let letters: String = name
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect();
    if letters.is_empty() {
        "?".to_string()
    } else {
        letters
    }
}

fn initials_url(name: &str) -> String {
    let initials = initials(name);
    match Url::parse_with_params(INITIALS_BASE, &[("name", initials.as_str()), ("background", "random")]) {
        Ok(url) => url.to_string(),
        // INITIALS_BASE is a constant, valid URL
        Err(_) => format!("{}?name={}", INITIALS_BASE, initials),
    }
}
