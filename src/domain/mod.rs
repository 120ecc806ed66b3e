//! Domain value types and business rules shared by both storage backends.

pub mod normalize;
pub mod rules;

use serde::{Deserialize, Serialize};

/// Kind of a media entry in the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Music,
    MusicVideo,
}

impl MediaKind {
    pub fn to_int(self) -> i32 {
        match self {
            MediaKind::Music => 1,
            MediaKind::MusicVideo => 2,
        }
    }

    pub fn from_int(value: i32) -> Self {
        match value {
            2 => MediaKind::MusicVideo,
            _ => MediaKind::Music,
        }
    }
}

/// Roles assignable to users. Authorization is role-based only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    User,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::User => "user",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(UserRole::Admin),
            "user" => Some(UserRole::User),
            _ => None,
        }
    }
}
