//! Relational relationship maintenance over join rows.
//!
//! Existence is always decided against the join table, and every link
//! mutation is one committed transaction, so a completed call leaves the
//! two sides consistent by construction.

use crate::domain::rules;
use crate::relational::link_store::JoinKind;
use crate::relational::models::{Artist, Media, User};
use crate::relational::{
    SqlArtistRepository, SqlBackend, SqlLinkStore, SqlMediaRepository, SqlUserRepository,
};
use crate::store::{ensure_live, Repository, StoreError, StoreResult};
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct RelationalLinkService {
    users: SqlUserRepository,
    artists: SqlArtistRepository,
    medias: SqlMediaRepository,
    links: SqlLinkStore,
}

impl RelationalLinkService {
    pub fn new(backend: SqlBackend) -> Self {
        RelationalLinkService {
            users: SqlUserRepository::new(backend.clone()),
            artists: SqlArtistRepository::new(backend.clone()),
            medias: SqlMediaRepository::new(backend.clone()),
            links: SqlLinkStore::new(backend),
        }
    }

    fn require_user(&self, user_id: i64) -> StoreResult<User> {
        self.users
            .get_by_id_tracked(&user_id)?
            .ok_or(StoreError::NotFound("user"))
    }

    fn require_artist(&self, artist_id: i64) -> StoreResult<Artist> {
        self.artists
            .get_by_id_tracked(&artist_id)?
            .ok_or(StoreError::NotFound("artist"))
    }

    fn require_media(&self, media_id: i64) -> StoreResult<Media> {
        self.medias
            .get_by_id_tracked(&media_id)?
            .ok_or(StoreError::NotFound("media"))
    }

    // =========================================================================
    // Follow
    // =========================================================================

    pub fn follow(&self, user_id: i64, artist_id: i64, cancel: &CancellationToken) -> StoreResult<()> {
        ensure_live(cancel)?;
        self.require_user(user_id)?;
        self.require_artist(artist_id)?;
        let exists = self.links.exists(JoinKind::Following, user_id, artist_id)?;
        rules::ensure_new_link(exists, "follow")?;
        self.links.insert(JoinKind::Following, user_id, artist_id)
    }

    pub fn unfollow(&self, user_id: i64, artist_id: i64, cancel: &CancellationToken) -> StoreResult<()> {
        ensure_live(cancel)?;
        self.require_user(user_id)?;
        self.require_artist(artist_id)?;
        let exists = self.links.exists(JoinKind::Following, user_id, artist_id)?;
        rules::ensure_link_exists(exists, "follow")?;
        self.links.remove(JoinKind::Following, user_id, artist_id)?;
        Ok(())
    }

    pub fn followings(&self, user_id: i64, cancel: &CancellationToken) -> StoreResult<Vec<Artist>> {
        ensure_live(cancel)?;
        self.require_user(user_id)?;
        self.links.followed_artists(user_id)
    }

    pub fn followers(&self, artist_id: i64, cancel: &CancellationToken) -> StoreResult<Vec<User>> {
        ensure_live(cancel)?;
        self.require_artist(artist_id)?;
        self.links.followers(artist_id)
    }

    // =========================================================================
    // Like
    // =========================================================================

    pub fn like(&self, user_id: i64, media_id: i64, cancel: &CancellationToken) -> StoreResult<()> {
        ensure_live(cancel)?;
        self.require_user(user_id)?;
        self.require_media(media_id)?;
        let exists = self.links.exists(JoinKind::LikedMedia, user_id, media_id)?;
        rules::ensure_new_link(exists, "like")?;
        self.links.insert(JoinKind::LikedMedia, user_id, media_id)
    }

    pub fn dislike(&self, user_id: i64, media_id: i64, cancel: &CancellationToken) -> StoreResult<()> {
        ensure_live(cancel)?;
        self.require_user(user_id)?;
        self.require_media(media_id)?;
        let exists = self.links.exists(JoinKind::LikedMedia, user_id, media_id)?;
        rules::ensure_link_exists(exists, "like")?;
        self.links.remove(JoinKind::LikedMedia, user_id, media_id)?;
        Ok(())
    }

    pub fn liked_medias(&self, user_id: i64, cancel: &CancellationToken) -> StoreResult<Vec<Media>> {
        ensure_live(cancel)?;
        self.require_user(user_id)?;
        self.links.linked_medias(JoinKind::LikedMedia, user_id)
    }

    pub fn liked_users(&self, media_id: i64, cancel: &CancellationToken) -> StoreResult<Vec<User>> {
        ensure_live(cancel)?;
        self.require_media(media_id)?;
        self.links.linked_users(JoinKind::LikedMedia, media_id)
    }

    // =========================================================================
    // Visit
    // =========================================================================

    /// Never fails on a repeat visit: the existing join row is replaced by
    /// a fresh one so the timestamp reflects the latest visit.
    pub fn visit(&self, user_id: i64, media_id: i64, cancel: &CancellationToken) -> StoreResult<()> {
        ensure_live(cancel)?;
        self.require_user(user_id)?;
        self.require_media(media_id)?;
        if self.links.exists(JoinKind::VisitedMedia, user_id, media_id)? {
            self.links.refresh(JoinKind::VisitedMedia, user_id, media_id)
        } else {
            self.links.insert(JoinKind::VisitedMedia, user_id, media_id)
        }
    }

    pub fn visited_medias(&self, user_id: i64, cancel: &CancellationToken) -> StoreResult<Vec<Media>> {
        ensure_live(cancel)?;
        self.require_user(user_id)?;
        self.links.linked_medias(JoinKind::VisitedMedia, user_id)
    }

    pub fn visited_users(&self, media_id: i64, cancel: &CancellationToken) -> StoreResult<Vec<User>> {
        ensure_live(cancel)?;
        self.require_media(media_id)?;
        self.links.linked_users(JoinKind::VisitedMedia, media_id)
    }

    /// Timestamp of a visit link, exposed for the revisit-refresh
    /// behavior checks.
    pub fn visit_timestamp(&self, user_id: i64, media_id: i64) -> StoreResult<Option<i64>> {
        self.links.timestamp(JoinKind::VisitedMedia, user_id, media_id)
    }

    pub fn follower_count(&self, artist_id: i64) -> StoreResult<usize> {
        self.links.count_for_target(JoinKind::Following, artist_id)
    }
}
