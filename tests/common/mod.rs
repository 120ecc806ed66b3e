//! Shared fixtures: tempfile-backed stores seeded with a small catalog.
#![allow(dead_code)] // Not every test file uses every fixture

use chrono::NaiveDate;
use fonoteca_server::document::models as doc;
use fonoteca_server::document::{DocId, DocumentDb};
use fonoteca_server::domain::{MediaKind, UserRole};
use fonoteca_server::relational::models as sql;
use fonoteca_server::relational::{
    SqlAlbumRepository, SqlArtistRepository, SqlBackend, SqlIdentity, SqlMediaRepository,
};
use fonoteca_server::store::Repository;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub fn cancel() -> CancellationToken {
    CancellationToken::new()
}

// =============================================================================
// Relational fixtures
// =============================================================================

pub fn sql_backend() -> SqlBackend {
    SqlBackend::open_in_memory().expect("in-memory backend")
}

pub fn sql_file_backend() -> (TempDir, SqlBackend) {
    let dir = TempDir::new().expect("temp dir");
    let backend = SqlBackend::open(dir.path().join("catalog.db")).expect("file backend");
    (dir, backend)
}

pub fn seed_sql_user(backend: &SqlBackend, username: &str) -> i64 {
    let identity = SqlIdentity::new(backend.clone());
    let user = sql::User {
        id: None,
        username: username.to_string(),
        password_hash: String::new(),
        security_stamp: String::new(),
        concurrency_stamp: String::new(),
        full_name: format!("{} full name", username),
        avatar_path: None,
        bio: None,
        is_active: true,
        roles: vec![UserRole::User],
    };
    identity
        .register(user, "password", &cancel())
        .expect("seed user")
        .id
        .expect("assigned id")
}

pub fn seed_sql_artist(backend: &SqlBackend, artistic_name: &str) -> i64 {
    let repo = SqlArtistRepository::new(backend.clone());
    let mut artist = sql::Artist {
        id: None,
        artistic_name: artistic_name.to_string(),
        full_name: None,
        birth_date: NaiveDate::from_ymd_opt(1970, 6, 15),
        avatar_path: None,
        bio: None,
    };
    repo.add(&mut artist, &cancel()).expect("seed artist");
    artist.id.expect("assigned id")
}

pub fn seed_sql_album(backend: &SqlBackend, title: &str, artist_id: i64, is_single: bool) -> i64 {
    let repo = SqlAlbumRepository::new(backend.clone());
    let mut album = sql::Album {
        id: None,
        title: title.to_string(),
        genre: "Rock".to_string(),
        release_date: NaiveDate::from_ymd_opt(1979, 11, 30).unwrap(),
        is_complete: false,
        is_single,
        copyright: None,
        artwork_path: None,
        artist_ids: vec![artist_id],
    };
    repo.add(&mut album, &cancel()).expect("seed album");
    album.id.expect("assigned id")
}

pub fn seed_sql_media(backend: &SqlBackend, title: &str, album_id: i64) -> i64 {
    let repo = SqlMediaRepository::new(backend.clone());
    let mut media = sql::Media {
        id: None,
        title: title.to_string(),
        kind: MediaKind::Music,
        file_path: format!("medias/{}.mp3", title),
        release_date: None,
        artwork_path: None,
        isrc: None,
        track_number: 1,
        lyric: None,
        album_id,
    };
    repo.add(&mut media, &cancel()).expect("seed media");
    media.id.expect("assigned id")
}

// =============================================================================
// Document fixtures
// =============================================================================

pub fn doc_db() -> (TempDir, Arc<DocumentDb>) {
    let dir = TempDir::new().expect("temp dir");
    let db = DocumentDb::open(dir.path()).expect("document db");
    (dir, Arc::new(db))
}

pub fn seed_doc_user(db: &DocumentDb, username: &str) -> DocId {
    let user = doc::User {
        id: None,
        username: username.to_string(),
        password_hash: String::new(),
        concurrency_stamp: String::new(),
        security_stamp: String::new(),
        full_name: format!("{} full name", username),
        avatar_path: None,
        bio: None,
        is_active: true,
        roles: vec![],
        following_artists: vec![],
        liked_medias: vec![],
        visited_medias: vec![],
    };
    db.register(user, "password")
        .expect("seed user")
        .id
        .expect("assigned id")
}

pub fn seed_doc_artist(db: &DocumentDb, artistic_name: &str) -> DocId {
    let mut artist = doc::Artist {
        id: None,
        full_name: None,
        artistic_name: artistic_name.to_string(),
        birth_date: NaiveDate::from_ymd_opt(1970, 6, 15),
        avatar_path: None,
        bio: None,
        followers: vec![],
        albums: vec![],
    };
    db.add(&mut artist, &cancel()).expect("seed artist");
    artist.id.expect("assigned id")
}

pub fn seed_doc_album(db: &DocumentDb, title: &str, artist_id: DocId, is_single: bool) -> DocId {
    let mut album = doc::Album {
        id: None,
        title: title.to_string(),
        release_date: NaiveDate::from_ymd_opt(1979, 11, 30).unwrap(),
        genre: "Rock".to_string(),
        is_complete: false,
        is_single,
        copyright: None,
        artwork_path: None,
        artists: vec![artist_id],
        medias: vec![],
    };
    db.add(&mut album, &cancel()).expect("seed album");
    album.id.expect("assigned id")
}

pub fn seed_doc_media(db: &DocumentDb, title: &str, album_id: DocId) -> DocId {
    let mut media = doc::Media {
        id: None,
        title: title.to_string(),
        kind: MediaKind::Music,
        file_path: format!("medias/{}.mp3", title),
        release_date: None,
        artwork_path: None,
        isrc: None,
        track_number: 1,
        lyric: None,
        album_id,
        liked_users: vec![],
        visited_users: vec![],
    };
    db.add(&mut media, &cancel()).expect("seed media");
    media.id.expect("assigned id")
}
