//! Rich presence image picker
//!
//! Users pick the large image shown on their Discord profile. Some images
//! are donation perks.

use crate::core::account::User;

pub const DONATE_URL: &str = "https://duelsplus.com/donate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceImage {
    pub key: &'static str,
    pub label: &'static str,
    pub perk: bool,
}

pub const IMAGES: &[PresenceImage] = &[
    PresenceImage {
        key: "logo",
        label: "Duels+ logo",
        perk: false,
    },
    PresenceImage {
        key: "logo_dark",
        label: "Dark logo",
        perk: true,
    },
    PresenceImage {
        key: "sword",
        label: "Sword",
        perk: true,
    },
    PresenceImage {
        key: "crown",
        label: "Crown",
        perk: true,
    },
];

pub fn image(key: &str) -> Option<&'static PresenceImage> {
    IMAGES.iter().find(|i| i.key == key)
}

/// Whether `user` may select `image`
pub fn is_unlocked(image: &PresenceImage, user: Option<&User>) -> bool {
    !image.perk || user.is_some_and(|u| u.has_perks())
}

/// Outcome of picking an image in the dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Send `rpc_set_image` and store the key
    Apply(&'static str),
    /// Image is a perk the user does not have
    Locked,
    Unknown,
}

pub fn select(key: &str, user: Option<&User>) -> Selection {
    match image(key) {
        Some(image) if is_unlocked(image, user) => Selection::Apply(image.key),
        Some(_) => Selection::Locked,
        None => Selection::Unknown,
    }
}
