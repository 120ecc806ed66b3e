//! Document backend: one JSON-file collection per entity, direct
//! per-document read/replace/delete, no unit of work and no transactions.
//!
//! Every relationship mutation is a sequence of independent replaces; the
//! contract is last-write-wins and eventually-symmetric. The cancellation
//! token is accepted for contract parity but never observed here.

use super::collection::DocCollection;
use super::doc_id::DocId;
use super::models::{Album, Artist, Media, User};
use crate::domain::{rules, UserRole};
use crate::store::{random_string, Entity, Repository, StoreError, StoreResult};
use anyhow::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Fixed one-way digest used for document-backend credentials. Unsalted,
/// unlike the relational backend's argon2 hasher.
pub fn sha256_hash(password: &str) -> String {
    BASE64.encode(Sha256::digest(password.as_bytes()))
}

pub struct DocumentDb {
    pub users: DocCollection<User>,
    pub artists: DocCollection<Artist>,
    pub albums: DocCollection<Album>,
    pub medias: DocCollection<Media>,
}

impl DocumentDb {
    /// Opens the four collections under `dir`, creating it when missing.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<DocumentDb> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        Ok(DocumentDb {
            users: DocCollection::open(dir.join("users.json")),
            artists: DocCollection::open(dir.join("artists.json")),
            albums: DocCollection::open(dir.join("albums.json")),
            medias: DocCollection::open(dir.join("medias.json")),
        })
    }

    pub fn find_user_by_username(&self, username: &str) -> Option<User> {
        self.users.find_one(|u| u.username == username)
    }

    /// Hashes the password with the fixed digest and inserts the user.
    pub fn register(&self, mut user: User, password: &str) -> StoreResult<User> {
        if password.is_empty() {
            return Err(StoreError::Validation(
                "Field 'password' is required but was empty".to_string(),
            ));
        }
        user.password_hash = sha256_hash(password);
        user.security_stamp = random_string(32);
        user.concurrency_stamp = random_string(32);
        if user.roles.is_empty() {
            user.roles.push(UserRole::User.as_str().to_string());
        }
        self.add(&mut user, &CancellationToken::new())?;
        Ok(user)
    }

    /// Manual digest comparison; None for unknown, inactive, or wrong
    /// password.
    pub fn verify_login(&self, username: &str, password: &str) -> Option<User> {
        let user = self.find_user_by_username(username)?;
        if !user.is_active || user.password_hash != sha256_hash(password) {
            return None;
        }
        Some(user)
    }

    fn count_admins(&self) -> usize {
        self.users
            .filter_by(|u| u.roles.iter().any(|r| r == UserRole::Admin.as_str()))
            .len()
    }

    /// Idempotent bootstrap, guarded by "an admin already exists".
    pub fn ensure_admin(&self, bootstrap_password: &str) -> StoreResult<()> {
        if self.count_admins() > 0 {
            return Ok(());
        }
        let admin = User {
            id: None,
            username: "admin".to_string(),
            password_hash: String::new(),
            concurrency_stamp: String::new(),
            security_stamp: String::new(),
            full_name: "Site admin".to_string(),
            avatar_path: None,
            bio: None,
            is_active: true,
            roles: vec![UserRole::Admin.as_str().to_string()],
            following_artists: Vec::new(),
            liked_medias: Vec::new(),
            visited_medias: Vec::new(),
        };
        self.register(admin, bootstrap_password)?;
        info!("Bootstrapped document admin user");
        Ok(())
    }

    /// Deletes a user unless it is the last admin, then strips the user's
    /// id from every document referencing it.
    pub fn delete_user(&self, user_id: &DocId) -> StoreResult<()> {
        let user = self
            .users
            .find_by_id(user_id)
            .ok_or(StoreError::NotFound("user"))?;
        let is_admin = user.roles.iter().any(|r| r == UserRole::Admin.as_str());
        rules::ensure_not_last_admin(self.count_admins(), is_admin)?;
        Repository::<User>::delete_by_id(self, user_id, &CancellationToken::new())
    }
}

// =============================================================================
// Users
// =============================================================================

impl Repository<User> for DocumentDb {
    fn get_all(&self, _cancel: &CancellationToken) -> StoreResult<Vec<User>> {
        Ok(self.users.find_all())
    }

    fn get_by_id_tracked(&self, id: &DocId) -> StoreResult<Option<User>> {
        Ok(self.users.find_by_id(id))
    }

    fn get_by_id_untracked(&self, id: &DocId) -> StoreResult<Option<User>> {
        Ok(self.users.find_by_id(id))
    }

    fn add(&self, user: &mut User, _cancel: &CancellationToken) -> StoreResult<()> {
        user.validate()?;
        if self.find_user_by_username(&user.username).is_some() {
            return Err(StoreError::Duplicate(format!(
                "Username '{}' is already taken",
                user.username
            )));
        }
        self.users.insert_one(user)
    }

    fn update(&self, user: &User, _cancel: &CancellationToken) -> StoreResult<()> {
        user.validate()?;
        self.users.replace_one(user)
    }

    fn delete_by_id(&self, id: &DocId, _cancel: &CancellationToken) -> StoreResult<()> {
        let user = self.users.find_by_id(id).ok_or(StoreError::NotFound("user"))?;

        // Walk the other side of every relationship the user appears in.
        for artist_id in &user.following_artists {
            if let Some(mut artist) = self.artists.find_by_id(artist_id) {
                artist.followers.retain(|f| f != id);
                self.artists.replace_one(&artist)?;
            }
        }
        for media in self
            .medias
            .filter_by(|m| m.liked_users.contains(id) || m.visited_users.contains(id))
        {
            let mut media = media;
            media.liked_users.retain(|u| u != id);
            media.visited_users.retain(|u| u != id);
            self.medias.replace_one(&media)?;
        }

        self.users.delete_by_id(id)
    }
}

// =============================================================================
// Artists
// =============================================================================

impl Repository<Artist> for DocumentDb {
    fn get_all(&self, _cancel: &CancellationToken) -> StoreResult<Vec<Artist>> {
        Ok(self.artists.find_all())
    }

    fn get_by_id_tracked(&self, id: &DocId) -> StoreResult<Option<Artist>> {
        Ok(self.artists.find_by_id(id))
    }

    fn get_by_id_untracked(&self, id: &DocId) -> StoreResult<Option<Artist>> {
        Ok(self.artists.find_by_id(id))
    }

    fn add(&self, artist: &mut Artist, _cancel: &CancellationToken) -> StoreResult<()> {
        artist.validate()?;
        self.artists.insert_one(artist)
    }

    fn update(&self, artist: &Artist, _cancel: &CancellationToken) -> StoreResult<()> {
        artist.validate()?;
        self.artists.replace_one(artist)
    }

    fn delete_by_id(&self, id: &DocId, _cancel: &CancellationToken) -> StoreResult<()> {
        let artist = self
            .artists
            .find_by_id(id)
            .ok_or(StoreError::NotFound("artist"))?;
        rules::ensure_artist_deletable(artist.albums.len())?;

        // Strip the artist from every follower's list, one replace each.
        for user in self.users.filter_by(|u| u.following_artists.contains(id)) {
            let mut user = user;
            user.following_artists.retain(|a| a != id);
            self.users.replace_one(&user)?;
        }

        if let Some(avatar) = &artist.avatar_path {
            info!("Artist {} deleted, avatar path released: {}", id, avatar);
        }
        self.artists.delete_by_id(id)
    }
}

// =============================================================================
// Albums
// =============================================================================

impl DocumentDb {
    fn attach_album_to_artists(&self, album_id: DocId, artist_ids: &[DocId]) -> StoreResult<()> {
        for artist_id in artist_ids {
            let mut artist = self
                .artists
                .find_by_id(artist_id)
                .ok_or(StoreError::NotFound("artist"))?;
            if !artist.albums.contains(&album_id) {
                artist.albums.push(album_id);
                self.artists.replace_one(&artist)?;
            }
        }
        Ok(())
    }

    fn detach_album_from_artists(&self, album_id: &DocId, artist_ids: &[DocId]) -> StoreResult<()> {
        for artist_id in artist_ids {
            if let Some(mut artist) = self.artists.find_by_id(artist_id) {
                artist.albums.retain(|a| a != album_id);
                self.artists.replace_one(&artist)?;
            }
        }
        Ok(())
    }
}

impl Repository<Album> for DocumentDb {
    fn get_all(&self, _cancel: &CancellationToken) -> StoreResult<Vec<Album>> {
        Ok(self.albums.find_all())
    }

    fn get_by_id_tracked(&self, id: &DocId) -> StoreResult<Option<Album>> {
        Ok(self.albums.find_by_id(id))
    }

    fn get_by_id_untracked(&self, id: &DocId) -> StoreResult<Option<Album>> {
        Ok(self.albums.find_by_id(id))
    }

    fn add(&self, album: &mut Album, _cancel: &CancellationToken) -> StoreResult<()> {
        album.validate()?;
        rules::ensure_album_has_artists(album.artists.len())?;
        for artist_id in &album.artists {
            if self.artists.find_by_id(artist_id).is_none() {
                return Err(StoreError::NotFound("artist"));
            }
        }
        self.albums.insert_one(album)?;
        // Second side; a crash here leaves the membership one-sided.
        self.attach_album_to_artists(album.id.expect("id assigned on insert"), &album.artists)
    }

    fn update(&self, album: &Album, _cancel: &CancellationToken) -> StoreResult<()> {
        album.validate()?;
        rules::ensure_album_has_artists(album.artists.len())?;
        let id = album.id.ok_or(StoreError::NotFound("album"))?;
        for artist_id in &album.artists {
            if self.artists.find_by_id(artist_id).is_none() {
                return Err(StoreError::NotFound("artist"));
            }
        }
        let previous = self.albums.find_by_id(&id).ok_or(StoreError::NotFound("album"))?;
        self.albums.replace_one(album)?;

        let removed: Vec<DocId> = previous
            .artists
            .iter()
            .copied()
            .filter(|a| !album.artists.contains(a))
            .collect();
        self.detach_album_from_artists(&id, &removed)?;
        self.attach_album_to_artists(id, &album.artists)
    }

    fn delete_by_id(&self, id: &DocId, _cancel: &CancellationToken) -> StoreResult<()> {
        let album = self
            .albums
            .find_by_id(id)
            .ok_or(StoreError::NotFound("album"))?;
        rules::ensure_album_deletable(album.medias.len())?;
        self.detach_album_from_artists(id, &album.artists)?;
        if let Some(artwork) = &album.artwork_path {
            info!("Album {} deleted, artwork path released: {}", id, artwork);
        }
        self.albums.delete_by_id(id)
    }
}

// =============================================================================
// Medias
// =============================================================================

impl Repository<Media> for DocumentDb {
    fn get_all(&self, _cancel: &CancellationToken) -> StoreResult<Vec<Media>> {
        Ok(self.medias.find_all())
    }

    fn get_by_id_tracked(&self, id: &DocId) -> StoreResult<Option<Media>> {
        Ok(self.medias.find_by_id(id))
    }

    fn get_by_id_untracked(&self, id: &DocId) -> StoreResult<Option<Media>> {
        Ok(self.medias.find_by_id(id))
    }

    fn add(&self, media: &mut Media, _cancel: &CancellationToken) -> StoreResult<()> {
        media.validate()?;
        let mut album = self
            .albums
            .find_by_id(&media.album_id)
            .ok_or(StoreError::NotFound("album"))?;
        rules::ensure_album_accepts_media(album.is_single, album.is_complete, album.medias.len())?;
        self.medias.insert_one(media)?;
        // Second side of the membership.
        album.medias.push(media.id.expect("id assigned on insert"));
        self.albums.replace_one(&album)
    }

    fn update(&self, media: &Media, _cancel: &CancellationToken) -> StoreResult<()> {
        media.validate()?;
        let id = media.id.ok_or(StoreError::NotFound("media"))?;
        let previous = self.medias.find_by_id(&id).ok_or(StoreError::NotFound("media"))?;
        if previous.album_id != media.album_id {
            let mut target = self
                .albums
                .find_by_id(&media.album_id)
                .ok_or(StoreError::NotFound("album"))?;
            rules::ensure_album_accepts_media(
                target.is_single,
                target.is_complete,
                target.medias.len(),
            )?;
            self.medias.replace_one(media)?;
            if let Some(mut old_album) = self.albums.find_by_id(&previous.album_id) {
                old_album.medias.retain(|m| m != &id);
                self.albums.replace_one(&old_album)?;
            }
            target.medias.push(id);
            return self.albums.replace_one(&target);
        }
        self.medias.replace_one(media)
    }

    fn delete_by_id(&self, id: &DocId, _cancel: &CancellationToken) -> StoreResult<()> {
        let media = self
            .medias
            .find_by_id(id)
            .ok_or(StoreError::NotFound("media"))?;

        // Scan-and-strip: O(total users) per deletion.
        for user in self
            .users
            .filter_by(|u| u.liked_medias.contains(id) || u.visited_medias.contains(id))
        {
            let mut user = user;
            user.liked_medias.retain(|m| m != id);
            user.visited_medias.retain(|m| m != id);
            self.users.replace_one(&user)?;
        }

        if let Some(mut album) = self.albums.find_by_id(&media.album_id) {
            album.medias.retain(|m| m != id);
            self.albums.replace_one(&album)?;
        }

        info!("Media {} deleted, file path released: {}", id, media.file_path);
        if let Some(artwork) = &media.artwork_path {
            info!("Media {} deleted, artwork path released: {}", id, artwork);
        }
        self.medias.delete_by_id(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_digest_is_stable_and_unsalted() {
        let a = sha256_hash("masoud");
        let b = sha256_hash("masoud");
        assert_eq!(a, b);
        assert_ne!(a, sha256_hash("other"));
        // 32 bytes, base64-encoded
        assert_eq!(a.len(), 44);
    }
}
