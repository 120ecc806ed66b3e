//! Relational entity models. Identifiers are SQLite rowids, absent until
//! the insert assigns them. Relationship collections are loaded only by
//! tracked reads; untracked reads leave them empty.

use crate::domain::{MediaKind, UserRole};
use crate::store::{require_field, require_max_len, Entity, StoreResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: Option<i64>,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    #[serde(skip_serializing, default)]
    pub security_stamp: String,
    #[serde(skip_serializing, default)]
    pub concurrency_stamp: String,
    pub full_name: String,
    pub avatar_path: Option<String>,
    pub bio: Option<String>,
    pub is_active: bool,
    /// Loaded by tracked reads.
    #[serde(default)]
    pub roles: Vec<UserRole>,
}

impl Entity for User {
    type Id = i64;
    const NAME: &'static str = "user";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self) -> StoreResult<()> {
        require_field(&self.username, "username")?;
        require_max_len(&self.username, "username", 20)?;
        require_field(&self.full_name, "full_name")?;
        require_max_len(&self.full_name, "full_name", 100)?;
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Artist {
    pub id: Option<i64>,
    pub artistic_name: String,
    pub full_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub avatar_path: Option<String>,
    pub bio: Option<String>,
}

impl Entity for Artist {
    type Id = i64;
    const NAME: &'static str = "artist";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self) -> StoreResult<()> {
        require_field(&self.artistic_name, "artistic_name")?;
        require_max_len(&self.artistic_name, "artistic_name", 100)?;
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Album {
    pub id: Option<i64>,
    pub title: String,
    pub genre: String,
    pub release_date: NaiveDate,
    pub is_complete: bool,
    pub is_single: bool,
    pub copyright: Option<String>,
    pub artwork_path: Option<String>,
    /// Many-to-many membership, loaded by tracked reads.
    #[serde(default)]
    pub artist_ids: Vec<i64>,
}

impl Entity for Album {
    type Id = i64;
    const NAME: &'static str = "album";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self) -> StoreResult<()> {
        require_field(&self.title, "title")?;
        require_max_len(&self.title, "title", 100)?;
        require_field(&self.genre, "genre")?;
        require_max_len(&self.genre, "genre", 100)?;
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Media {
    pub id: Option<i64>,
    pub title: String,
    pub kind: MediaKind,
    pub file_path: String,
    pub release_date: Option<NaiveDate>,
    pub artwork_path: Option<String>,
    pub isrc: Option<String>,
    pub track_number: i32,
    pub lyric: Option<String>,
    pub album_id: i64,
}

impl Entity for Media {
    type Id = i64;
    const NAME: &'static str = "media";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self) -> StoreResult<()> {
        require_field(&self.title, "title")?;
        require_max_len(&self.title, "title", 100)?;
        require_field(&self.file_path, "file_path")?;
        if self.track_number < 1 {
            return Err(crate::store::StoreError::Validation(format!(
                "Field 'track_number' must be positive, got {}",
                self.track_number
            )));
        }
        Ok(())
    }
}

/// A user-follows-artist join row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Following {
    pub user_id: i64,
    pub artist_id: i64,
    pub created: i64,
}

/// A user-liked-media join row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LikedMedia {
    pub user_id: i64,
    pub media_id: i64,
    pub created: i64,
}

/// A user-visited-media join row. Re-visiting replaces the row so
/// `created` always holds the latest visit time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VisitedMedia {
    pub user_id: i64,
    pub media_id: i64,
    pub created: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    pub fn make_valid_media() -> Media {
        Media {
            id: None,
            title: "Comfortably Numb".to_string(),
            kind: MediaKind::Music,
            file_path: "medias/comfortably-numb.mp3".to_string(),
            release_date: None,
            artwork_path: None,
            isrc: None,
            track_number: 6,
            lyric: None,
            album_id: 1,
        }
    }

    #[test]
    fn media_requires_file_path() {
        let mut media = make_valid_media();
        media.file_path = " ".to_string();
        assert!(media.validate().is_err());
    }

    #[test]
    fn media_requires_positive_track_number() {
        let mut media = make_valid_media();
        media.track_number = 0;
        assert!(media.validate().is_err());
    }

    #[test]
    fn username_length_is_bounded() {
        let user = User {
            id: None,
            username: "a".repeat(21),
            password_hash: "x".to_string(),
            security_stamp: "s".to_string(),
            concurrency_stamp: "c".to_string(),
            full_name: "Someone".to_string(),
            avatar_path: None,
            bio: None,
            is_active: true,
            roles: vec![],
        };
        assert!(user.validate().is_err());
    }
}
