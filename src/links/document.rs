//! Document relationship maintenance over embedded id lists.
//!
//! Each mutation reads the target document, mutates its list, replaces it,
//! then does the same on the user document. The two replaces are
//! independent writes: a failure between them leaves the link one-sided,
//! and concurrent mutations of the same document follow last-write-wins.
//! Existence is decided against the owning user's list, read fresh at the
//! start of the call.

use crate::document::models::{Artist, Media, User};
use crate::document::{DocId, DocumentDb};
use crate::domain::rules;
use crate::store::{StoreError, StoreResult};
use std::sync::Arc;

#[derive(Clone)]
pub struct DocumentLinkService {
    db: Arc<DocumentDb>,
}

impl DocumentLinkService {
    pub fn new(db: Arc<DocumentDb>) -> Self {
        DocumentLinkService { db }
    }

    fn require_user(&self, user_id: &DocId) -> StoreResult<User> {
        self.db
            .users
            .find_by_id(user_id)
            .ok_or(StoreError::NotFound("user"))
    }

    fn require_artist(&self, artist_id: &DocId) -> StoreResult<Artist> {
        self.db
            .artists
            .find_by_id(artist_id)
            .ok_or(StoreError::NotFound("artist"))
    }

    fn require_media(&self, media_id: &DocId) -> StoreResult<Media> {
        self.db
            .medias
            .find_by_id(media_id)
            .ok_or(StoreError::NotFound("media"))
    }

    // =========================================================================
    // Follow
    // =========================================================================

    pub fn follow(&self, user_id: &DocId, artist_id: &DocId) -> StoreResult<()> {
        let mut user = self.require_user(user_id)?;
        let mut artist = self.require_artist(artist_id)?;
        rules::ensure_new_link(user.following_artists.contains(artist_id), "follow")?;

        if !artist.followers.contains(user_id) {
            artist.followers.push(*user_id);
        }
        self.db.artists.replace_one(&artist)?;
        // Second, independent write; the link is one-sided until it lands.
        user.following_artists.push(*artist_id);
        self.db.users.replace_one(&user)
    }

    pub fn unfollow(&self, user_id: &DocId, artist_id: &DocId) -> StoreResult<()> {
        let mut user = self.require_user(user_id)?;
        let mut artist = self.require_artist(artist_id)?;
        rules::ensure_link_exists(user.following_artists.contains(artist_id), "follow")?;

        artist.followers.retain(|f| f != user_id);
        self.db.artists.replace_one(&artist)?;
        user.following_artists.retain(|a| a != artist_id);
        self.db.users.replace_one(&user)
    }

    /// One fetch per stored id; ids whose target vanished are skipped.
    pub fn followings(&self, user_id: &DocId) -> StoreResult<Vec<Artist>> {
        let user = self.require_user(user_id)?;
        Ok(user
            .following_artists
            .iter()
            .filter_map(|artist_id| self.db.artists.find_by_id(artist_id))
            .collect())
    }

    pub fn followers(&self, artist_id: &DocId) -> StoreResult<Vec<User>> {
        let artist = self.require_artist(artist_id)?;
        Ok(artist
            .followers
            .iter()
            .filter_map(|follower_id| self.db.users.find_by_id(follower_id))
            .collect())
    }

    // =========================================================================
    // Like
    // =========================================================================

    pub fn like(&self, user_id: &DocId, media_id: &DocId) -> StoreResult<()> {
        let mut user = self.require_user(user_id)?;
        let mut media = self.require_media(media_id)?;
        rules::ensure_new_link(user.liked_medias.contains(media_id), "like")?;

        if !media.liked_users.contains(user_id) {
            media.liked_users.push(*user_id);
        }
        self.db.medias.replace_one(&media)?;
        user.liked_medias.push(*media_id);
        self.db.users.replace_one(&user)
    }

    pub fn dislike(&self, user_id: &DocId, media_id: &DocId) -> StoreResult<()> {
        let mut user = self.require_user(user_id)?;
        let mut media = self.require_media(media_id)?;
        rules::ensure_link_exists(user.liked_medias.contains(media_id), "like")?;

        media.liked_users.retain(|u| u != user_id);
        self.db.medias.replace_one(&media)?;
        user.liked_medias.retain(|m| m != media_id);
        self.db.users.replace_one(&user)
    }

    pub fn liked_medias(&self, user_id: &DocId) -> StoreResult<Vec<Media>> {
        let user = self.require_user(user_id)?;
        Ok(user
            .liked_medias
            .iter()
            .filter_map(|media_id| self.db.medias.find_by_id(media_id))
            .collect())
    }

    pub fn liked_users(&self, media_id: &DocId) -> StoreResult<Vec<User>> {
        let media = self.require_media(media_id)?;
        Ok(media
            .liked_users
            .iter()
            .filter_map(|user_id| self.db.users.find_by_id(user_id))
            .collect())
    }

    // =========================================================================
    // Visit
    // =========================================================================

    /// Idempotent: a repeat visit leaves both lists untouched. There is no
    /// timestamp to refresh on this backend.
    pub fn visit(&self, user_id: &DocId, media_id: &DocId) -> StoreResult<()> {
        let mut user = self.require_user(user_id)?;
        let mut media = self.require_media(media_id)?;
        if user.visited_medias.contains(media_id) {
            return Ok(());
        }
        if !media.visited_users.contains(user_id) {
            media.visited_users.push(*user_id);
        }
        self.db.medias.replace_one(&media)?;
        user.visited_medias.push(*media_id);
        self.db.users.replace_one(&user)
    }

    pub fn visited_medias(&self, user_id: &DocId) -> StoreResult<Vec<Media>> {
        let user = self.require_user(user_id)?;
        Ok(user
            .visited_medias
            .iter()
            .filter_map(|media_id| self.db.medias.find_by_id(media_id))
            .collect())
    }

    pub fn visited_users(&self, media_id: &DocId) -> StoreResult<Vec<User>> {
        let media = self.require_media(media_id)?;
        Ok(media
            .visited_users
            .iter()
            .filter_map(|user_id| self.db.users.find_by_id(user_id))
            .collect())
    }
}
