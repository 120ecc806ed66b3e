//! Document entity models. Relationships are embedded identifier lists,
//! denormalized on both sides of every relationship (two-way referencing)
//! so reads never need joins. Links carry no timestamp here.

use super::collection::Document;
use super::doc_id::DocId;
use crate::domain::MediaKind;
use crate::store::{require_field, require_max_len, Entity, StoreResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: Option<DocId>,
    pub username: String,
    pub password_hash: String,
    pub concurrency_stamp: String,
    pub security_stamp: String,
    pub full_name: String,
    pub avatar_path: Option<String>,
    pub bio: Option<String>,
    pub is_active: bool,
    pub roles: Vec<String>,
    pub following_artists: Vec<DocId>,
    pub liked_medias: Vec<DocId>,
    pub visited_medias: Vec<DocId>,
}

impl Document for User {
    const NAME: &'static str = "user";

    fn doc_id(&self) -> Option<DocId> {
        self.id
    }

    fn set_doc_id(&mut self, id: DocId) {
        self.id = Some(id);
    }
}

impl Entity for User {
    type Id = DocId;
    const NAME: &'static str = "user";

    fn id(&self) -> Option<DocId> {
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
    pub id: Option<DocId>,
    pub full_name: Option<String>,
    pub artistic_name: String,
    pub birth_date: Option<NaiveDate>,
    pub avatar_path: Option<String>,
    pub bio: Option<String>,
    pub followers: Vec<DocId>,
    pub albums: Vec<DocId>,
}

impl Document for Artist {
    const NAME: &'static str = "artist";

    fn doc_id(&self) -> Option<DocId> {
        self.id
    }

    fn set_doc_id(&mut self, id: DocId) {
        self.id = Some(id);
    }
}

impl Entity for Artist {
    type Id = DocId;
    const NAME: &'static str = "artist";

    fn id(&self) -> Option<DocId> {
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
    pub id: Option<DocId>,
    pub title: String,
    pub release_date: NaiveDate,
    pub genre: String,
    pub is_complete: bool,
    pub is_single: bool,
    pub copyright: Option<String>,
    pub artwork_path: Option<String>,
    pub artists: Vec<DocId>,
    pub medias: Vec<DocId>,
}

impl Document for Album {
    const NAME: &'static str = "album";

    fn doc_id(&self) -> Option<DocId> {
        self.id
    }

    fn set_doc_id(&mut self, id: DocId) {
        self.id = Some(id);
    }
}

impl Entity for Album {
    type Id = DocId;
    const NAME: &'static str = "album";

    fn id(&self) -> Option<DocId> {
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
    pub id: Option<DocId>,
    pub title: String,
    pub kind: MediaKind,
    pub file_path: String,
    pub release_date: Option<NaiveDate>,
    pub artwork_path: Option<String>,
    pub isrc: Option<String>,
    pub track_number: i32,
    pub lyric: Option<String>,
    pub album_id: DocId,
    pub liked_users: Vec<DocId>,
    pub visited_users: Vec<DocId>,
}

impl Document for Media {
    const NAME: &'static str = "media";

    fn doc_id(&self) -> Option<DocId> {
        self.id
    }

    fn set_doc_id(&mut self, id: DocId) {
        self.id = Some(id);
    }
}

impl Entity for Media {
    type Id = DocId;
    const NAME: &'static str = "media";

    fn id(&self) -> Option<DocId> {
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
