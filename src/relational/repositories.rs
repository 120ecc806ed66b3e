//! Per-entity repositories over the relational backend.
//!
//! Every write validates first, then runs the text-normalization pass over
//! the entity's string fields, then executes inside one IMMEDIATE
//! transaction. Tracked reads load relationship collections through the
//! write connection; untracked reads are bare-row projections.

use super::models::{Album, Artist, Media, User};
use super::SqlBackend;
use crate::domain::normalize::clean_text;
use crate::domain::{rules, MediaKind, UserRole};
use crate::store::{ensure_live, Entity, Repository, StoreError, StoreResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio_util::sync::CancellationToken;
use tracing::info;

fn parse_date(column: usize, value: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    match value {
        None => Ok(None),
        Some(s) => s
            .parse::<NaiveDate>()
            .map(Some)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    column,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            }),
    }
}

// =============================================================================
// Users
// =============================================================================

pub(crate) const USER_COLUMNS: &str =
    "id, username, password_hash, security_stamp, concurrency_stamp, full_name, avatar_path, bio, is_active";

pub(crate) fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: Some(row.get(0)?),
        username: row.get(1)?,
        password_hash: row.get(2)?,
        security_stamp: row.get(3)?,
        concurrency_stamp: row.get(4)?,
        full_name: row.get(5)?,
        avatar_path: row.get(6)?,
        bio: row.get(7)?,
        is_active: row.get::<_, i64>(8)? != 0,
        roles: vec![],
    })
}

fn load_user_roles(conn: &Connection, user_id: i64) -> StoreResult<Vec<UserRole>> {
    let mut stmt = conn.prepare("SELECT role FROM user_role WHERE user_id = ?1")?;
    let roles = stmt
        .query_map(params![user_id], |r| r.get::<_, String>(0))?
        .filter_map(|r| r.ok())
        .filter_map(|s| UserRole::from_db_str(&s))
        .collect();
    Ok(roles)
}

fn replace_user_roles(conn: &Connection, user_id: i64, roles: &[UserRole]) -> StoreResult<()> {
    conn.execute("DELETE FROM user_role WHERE user_id = ?1", params![user_id])?;
    for role in roles {
        conn.execute(
            "INSERT INTO user_role (user_id, role) VALUES (?1, ?2)",
            params![user_id, role.as_str()],
        )?;
    }
    Ok(())
}

#[derive(Clone)]
pub struct SqlUserRepository {
    backend: SqlBackend,
}

impl SqlUserRepository {
    pub fn new(backend: SqlBackend) -> Self {
        SqlUserRepository { backend }
    }

    /// Tracked lookup by unique username, roles included.
    pub fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.backend.with_write_conn(|conn| {
            let user = conn
                .query_row(
                    &format!("SELECT {} FROM user WHERE username = ?1", USER_COLUMNS),
                    params![username],
                    user_from_row,
                )
                .optional()?;
            match user {
                None => Ok(None),
                Some(mut user) => {
                    user.roles = load_user_roles(conn, user.id.unwrap_or_default())?;
                    Ok(Some(user))
                }
            }
        })
    }

    pub fn count_admins(&self) -> StoreResult<usize> {
        self.backend.with_write_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM user_role WHERE role = ?1",
                params![UserRole::Admin.as_str()],
                |r| r.get(0),
            )?;
            Ok(count as usize)
        })
    }
}

impl Repository<User> for SqlUserRepository {
    fn get_all(&self, cancel: &CancellationToken) -> StoreResult<Vec<User>> {
        ensure_live(cancel)?;
        self.backend.with_read_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {} FROM user", USER_COLUMNS))?;
            let users = stmt
                .query_map([], user_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }

    fn get_by_id_tracked(&self, id: &i64) -> StoreResult<Option<User>> {
        self.backend.with_write_conn(|conn| {
            let user = conn
                .query_row(
                    &format!("SELECT {} FROM user WHERE id = ?1", USER_COLUMNS),
                    params![id],
                    user_from_row,
                )
                .optional()?;
            match user {
                None => Ok(None),
                Some(mut user) => {
                    user.roles = load_user_roles(conn, *id)?;
                    Ok(Some(user))
                }
            }
        })
    }

    fn get_by_id_untracked(&self, id: &i64) -> StoreResult<Option<User>> {
        self.backend.with_read_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {} FROM user WHERE id = ?1", USER_COLUMNS),
                    params![id],
                    user_from_row,
                )
                .optional()?)
        })
    }

    fn add(&self, user: &mut User, cancel: &CancellationToken) -> StoreResult<()> {
        ensure_live(cancel)?;
        user.validate()?;
        let id = self.backend.with_tx(|conn| {
            let username = clean_text(&user.username);
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM user WHERE username = ?1)",
                params![&username],
                |r| r.get(0),
            )?;
            if exists {
                return Err(StoreError::Duplicate(format!(
                    "Username '{}' is already taken",
                    username
                )));
            }
            conn.execute(
                "INSERT INTO user (username, password_hash, security_stamp, concurrency_stamp, full_name, avatar_path, bio, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    username,
                    clean_text(&user.password_hash),
                    clean_text(&user.security_stamp),
                    clean_text(&user.concurrency_stamp),
                    clean_text(&user.full_name),
                    user.avatar_path.as_deref().map(clean_text),
                    user.bio.as_deref().map(clean_text),
                    user.is_active as i64,
                ],
            )?;
            let id = conn.last_insert_rowid();
            replace_user_roles(conn, id, &user.roles)?;
            Ok(id)
        })?;
        user.id = Some(id);
        Ok(())
    }

    fn update(&self, user: &User, cancel: &CancellationToken) -> StoreResult<()> {
        ensure_live(cancel)?;
        user.validate()?;
        let id = user.id.ok_or(StoreError::NotFound(User::NAME))?;
        self.backend.with_tx(|conn| {
            let affected = conn.execute(
                "UPDATE user SET username = ?1, password_hash = ?2, security_stamp = ?3, concurrency_stamp = ?4,
                 full_name = ?5, avatar_path = ?6, bio = ?7, is_active = ?8 WHERE id = ?9",
                params![
                    clean_text(&user.username),
                    clean_text(&user.password_hash),
                    clean_text(&user.security_stamp),
                    clean_text(&user.concurrency_stamp),
                    clean_text(&user.full_name),
                    user.avatar_path.as_deref().map(clean_text),
                    user.bio.as_deref().map(clean_text),
                    user.is_active as i64,
                    id,
                ],
            )?;
            if affected == 0 {
                return Err(StoreError::NotFound(User::NAME));
            }
            replace_user_roles(conn, id, &user.roles)?;
            Ok(())
        })
    }

    fn delete_by_id(&self, id: &i64, cancel: &CancellationToken) -> StoreResult<()> {
        ensure_live(cancel)?;
        self.backend.with_tx(|conn| {
            let affected = conn.execute("DELETE FROM user WHERE id = ?1", params![id])?;
            if affected == 0 {
                return Err(StoreError::NotFound(User::NAME));
            }
            Ok(())
        })
    }
}

// =============================================================================
// Artists
// =============================================================================

pub(crate) const ARTIST_COLUMNS: &str = "id, artistic_name, full_name, birth_date, avatar_path, bio";

pub(crate) fn artist_from_row(row: &Row) -> rusqlite::Result<Artist> {
    Ok(Artist {
        id: Some(row.get(0)?),
        artistic_name: row.get(1)?,
        full_name: row.get(2)?,
        birth_date: parse_date(3, row.get(3)?)?,
        avatar_path: row.get(4)?,
        bio: row.get(5)?,
    })
}

#[derive(Clone)]
pub struct SqlArtistRepository {
    backend: SqlBackend,
}

impl SqlArtistRepository {
    pub fn new(backend: SqlBackend) -> Self {
        SqlArtistRepository { backend }
    }
}

impl Repository<Artist> for SqlArtistRepository {
    fn get_all(&self, cancel: &CancellationToken) -> StoreResult<Vec<Artist>> {
        ensure_live(cancel)?;
        self.backend.with_read_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {} FROM artist", ARTIST_COLUMNS))?;
            let artists = stmt
                .query_map([], artist_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(artists)
        })
    }

    fn get_by_id_tracked(&self, id: &i64) -> StoreResult<Option<Artist>> {
        self.backend.with_write_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {} FROM artist WHERE id = ?1", ARTIST_COLUMNS),
                    params![id],
                    artist_from_row,
                )
                .optional()?)
        })
    }

    fn get_by_id_untracked(&self, id: &i64) -> StoreResult<Option<Artist>> {
        self.backend.with_read_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {} FROM artist WHERE id = ?1", ARTIST_COLUMNS),
                    params![id],
                    artist_from_row,
                )
                .optional()?)
        })
    }

    fn add(&self, artist: &mut Artist, cancel: &CancellationToken) -> StoreResult<()> {
        ensure_live(cancel)?;
        artist.validate()?;
        let id = self.backend.with_tx(|conn| {
            conn.execute(
                "INSERT INTO artist (artistic_name, full_name, birth_date, avatar_path, bio)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    clean_text(&artist.artistic_name),
                    artist.full_name.as_deref().map(clean_text),
                    artist.birth_date.map(|d| d.to_string()),
                    artist.avatar_path.as_deref().map(clean_text),
                    artist.bio.as_deref().map(clean_text),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        artist.id = Some(id);
        Ok(())
    }

    fn update(&self, artist: &Artist, cancel: &CancellationToken) -> StoreResult<()> {
        ensure_live(cancel)?;
        artist.validate()?;
        let id = artist.id.ok_or(StoreError::NotFound(Artist::NAME))?;
        self.backend.with_tx(|conn| {
            let affected = conn.execute(
                "UPDATE artist SET artistic_name = ?1, full_name = ?2, birth_date = ?3, avatar_path = ?4, bio = ?5
                 WHERE id = ?6",
                params![
                    clean_text(&artist.artistic_name),
                    artist.full_name.as_deref().map(clean_text),
                    artist.birth_date.map(|d| d.to_string()),
                    artist.avatar_path.as_deref().map(clean_text),
                    artist.bio.as_deref().map(clean_text),
                    id,
                ],
            )?;
            if affected == 0 {
                return Err(StoreError::NotFound(Artist::NAME));
            }
            Ok(())
        })
    }

    fn delete_by_id(&self, id: &i64, cancel: &CancellationToken) -> StoreResult<()> {
        ensure_live(cancel)?;
        self.backend.with_tx(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM artist WHERE id = ?1)",
                params![id],
                |r| r.get(0),
            )?;
            if !exists {
                return Err(StoreError::NotFound(Artist::NAME));
            }
            let album_count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM album_artist WHERE artist_id = ?1",
                params![id],
                |r| r.get(0),
            )?;
            rules::ensure_artist_deletable(album_count as usize)?;
            conn.execute("DELETE FROM artist WHERE id = ?1", params![id])?;
            Ok(())
        })
    }
}

// =============================================================================
// Albums
// =============================================================================

pub(crate) const ALBUM_COLUMNS: &str =
    "id, title, genre, release_date, is_complete, is_single, copyright, artwork_path";

pub(crate) fn album_from_row(row: &Row) -> rusqlite::Result<Album> {
    Ok(Album {
        id: Some(row.get(0)?),
        title: row.get(1)?,
        genre: row.get(2)?,
        release_date: parse_date(3, row.get(3)?)?.unwrap_or_default(),
        is_complete: row.get::<_, i64>(4)? != 0,
        is_single: row.get::<_, i64>(5)? != 0,
        copyright: row.get(6)?,
        artwork_path: row.get(7)?,
        artist_ids: vec![],
    })
}

fn load_album_artists(conn: &Connection, album_id: i64) -> StoreResult<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT artist_id FROM album_artist WHERE album_id = ?1")?;
    let ids = stmt
        .query_map(params![album_id], |r| r.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}

fn replace_album_artists(conn: &Connection, album_id: i64, artist_ids: &[i64]) -> StoreResult<()> {
    rules::ensure_album_has_artists(artist_ids.len())?;
    for artist_id in artist_ids {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM artist WHERE id = ?1)",
            params![artist_id],
            |r| r.get(0),
        )?;
        if !exists {
            return Err(StoreError::NotFound(Artist::NAME));
        }
    }
    conn.execute(
        "DELETE FROM album_artist WHERE album_id = ?1",
        params![album_id],
    )?;
    for artist_id in artist_ids {
        conn.execute(
            "INSERT INTO album_artist (album_id, artist_id) VALUES (?1, ?2)",
            params![album_id, artist_id],
        )?;
    }
    Ok(())
}

#[derive(Clone)]
pub struct SqlAlbumRepository {
    backend: SqlBackend,
}

impl SqlAlbumRepository {
    pub fn new(backend: SqlBackend) -> Self {
        SqlAlbumRepository { backend }
    }

    /// Albums owned by an artist, resolved through the join table.
    pub fn get_by_artist(&self, artist_id: i64) -> StoreResult<Vec<Album>> {
        self.backend.with_read_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM album a JOIN album_artist aa ON aa.album_id = a.id WHERE aa.artist_id = ?1",
                ALBUM_COLUMNS
                    .split(", ")
                    .map(|c| format!("a.{}", c))
                    .collect::<Vec<_>>()
                    .join(", ")
            ))?;
            let albums = stmt
                .query_map(params![artist_id], album_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(albums)
        })
    }
}

impl Repository<Album> for SqlAlbumRepository {
    fn get_all(&self, cancel: &CancellationToken) -> StoreResult<Vec<Album>> {
        ensure_live(cancel)?;
        self.backend.with_read_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {} FROM album", ALBUM_COLUMNS))?;
            let albums = stmt
                .query_map([], album_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(albums)
        })
    }

    fn get_by_id_tracked(&self, id: &i64) -> StoreResult<Option<Album>> {
        self.backend.with_write_conn(|conn| {
            let album = conn
                .query_row(
                    &format!("SELECT {} FROM album WHERE id = ?1", ALBUM_COLUMNS),
                    params![id],
                    album_from_row,
                )
                .optional()?;
            match album {
                None => Ok(None),
                Some(mut album) => {
                    album.artist_ids = load_album_artists(conn, *id)?;
                    Ok(Some(album))
                }
            }
        })
    }

    fn get_by_id_untracked(&self, id: &i64) -> StoreResult<Option<Album>> {
        self.backend.with_read_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {} FROM album WHERE id = ?1", ALBUM_COLUMNS),
                    params![id],
                    album_from_row,
                )
                .optional()?)
        })
    }

    fn add(&self, album: &mut Album, cancel: &CancellationToken) -> StoreResult<()> {
        ensure_live(cancel)?;
        album.validate()?;
        let id = self.backend.with_tx(|conn| {
            conn.execute(
                "INSERT INTO album (title, genre, release_date, is_complete, is_single, copyright, artwork_path)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    clean_text(&album.title),
                    clean_text(&album.genre),
                    album.release_date.to_string(),
                    album.is_complete as i64,
                    album.is_single as i64,
                    album.copyright.as_deref().map(clean_text),
                    album.artwork_path.as_deref().map(clean_text),
                ],
            )?;
            let id = conn.last_insert_rowid();
            replace_album_artists(conn, id, &album.artist_ids)?;
            Ok(id)
        })?;
        album.id = Some(id);
        Ok(())
    }

    fn update(&self, album: &Album, cancel: &CancellationToken) -> StoreResult<()> {
        ensure_live(cancel)?;
        album.validate()?;
        let id = album.id.ok_or(StoreError::NotFound(Album::NAME))?;
        self.backend.with_tx(|conn| {
            let affected = conn.execute(
                "UPDATE album SET title = ?1, genre = ?2, release_date = ?3, is_complete = ?4,
                 is_single = ?5, copyright = ?6, artwork_path = ?7 WHERE id = ?8",
                params![
                    clean_text(&album.title),
                    clean_text(&album.genre),
                    album.release_date.to_string(),
                    album.is_complete as i64,
                    album.is_single as i64,
                    album.copyright.as_deref().map(clean_text),
                    album.artwork_path.as_deref().map(clean_text),
                    id,
                ],
            )?;
            if affected == 0 {
                return Err(StoreError::NotFound(Album::NAME));
            }
            replace_album_artists(conn, id, &album.artist_ids)?;
            Ok(())
        })
    }

    fn delete_by_id(&self, id: &i64, cancel: &CancellationToken) -> StoreResult<()> {
        ensure_live(cancel)?;
        self.backend.with_tx(|conn| {
            let artwork: Option<Option<String>> = conn
                .query_row(
                    "SELECT artwork_path FROM album WHERE id = ?1",
                    params![id],
                    |r| r.get(0),
                )
                .optional()?;
            let artwork = match artwork {
                None => return Err(StoreError::NotFound(Album::NAME)),
                Some(path) => path,
            };
            let media_count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM media WHERE album_id = ?1",
                params![id],
                |r| r.get(0),
            )?;
            rules::ensure_album_deletable(media_count as usize)?;
            conn.execute("DELETE FROM album WHERE id = ?1", params![id])?;
            if let Some(path) = artwork {
                info!("Album {} deleted, artwork path released: {}", id, path);
            }
            Ok(())
        })
    }
}

// =============================================================================
// Medias
// =============================================================================

pub(crate) const MEDIA_COLUMNS: &str =
    "id, title, kind, file_path, release_date, artwork_path, isrc, track_number, lyric, album_id";

pub(crate) fn media_from_row(row: &Row) -> rusqlite::Result<Media> {
    Ok(Media {
        id: Some(row.get(0)?),
        title: row.get(1)?,
        kind: MediaKind::from_int(row.get(2)?),
        file_path: row.get(3)?,
        release_date: parse_date(4, row.get(4)?)?,
        artwork_path: row.get(5)?,
        isrc: row.get(6)?,
        track_number: row.get(7)?,
        lyric: row.get(8)?,
        album_id: row.get(9)?,
    })
}

/// NotFound when the album is absent, rule violations when it is a full
/// single or already complete.
fn ensure_album_accepts(conn: &Connection, album_id: i64, ignore_media: Option<i64>) -> StoreResult<()> {
    let album: Option<(bool, bool)> = conn
        .query_row(
            "SELECT is_single, is_complete FROM album WHERE id = ?1",
            params![album_id],
            |r| Ok((r.get::<_, i64>(0)? != 0, r.get::<_, i64>(1)? != 0)),
        )
        .optional()?;
    let (is_single, is_complete) = album.ok_or(StoreError::NotFound(Album::NAME))?;
    let media_count: i64 = match ignore_media {
        Some(media_id) => conn.query_row(
            "SELECT COUNT(*) FROM media WHERE album_id = ?1 AND id != ?2",
            params![album_id, media_id],
            |r| r.get(0),
        )?,
        None => conn.query_row(
            "SELECT COUNT(*) FROM media WHERE album_id = ?1",
            params![album_id],
            |r| r.get(0),
        )?,
    };
    rules::ensure_album_accepts_media(is_single, is_complete, media_count as usize)?;
    Ok(())
}

#[derive(Clone)]
pub struct SqlMediaRepository {
    backend: SqlBackend,
}

impl SqlMediaRepository {
    pub fn new(backend: SqlBackend) -> Self {
        SqlMediaRepository { backend }
    }

    /// Medias belonging to an album, ordered by track number.
    pub fn get_by_album(&self, album_id: i64) -> StoreResult<Vec<Media>> {
        self.backend.with_read_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM media WHERE album_id = ?1 ORDER BY track_number",
                MEDIA_COLUMNS
            ))?;
            let medias = stmt
                .query_map(params![album_id], media_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(medias)
        })
    }
}

impl Repository<Media> for SqlMediaRepository {
    fn get_all(&self, cancel: &CancellationToken) -> StoreResult<Vec<Media>> {
        ensure_live(cancel)?;
        self.backend.with_read_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {} FROM media", MEDIA_COLUMNS))?;
            let medias = stmt
                .query_map([], media_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(medias)
        })
    }

    fn get_by_id_tracked(&self, id: &i64) -> StoreResult<Option<Media>> {
        self.backend.with_write_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {} FROM media WHERE id = ?1", MEDIA_COLUMNS),
                    params![id],
                    media_from_row,
                )
                .optional()?)
        })
    }

    fn get_by_id_untracked(&self, id: &i64) -> StoreResult<Option<Media>> {
        self.backend.with_read_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {} FROM media WHERE id = ?1", MEDIA_COLUMNS),
                    params![id],
                    media_from_row,
                )
                .optional()?)
        })
    }

    fn add(&self, media: &mut Media, cancel: &CancellationToken) -> StoreResult<()> {
        ensure_live(cancel)?;
        media.validate()?;
        let id = self.backend.with_tx(|conn| {
            ensure_album_accepts(conn, media.album_id, None)?;
            conn.execute(
                "INSERT INTO media (title, kind, file_path, release_date, artwork_path, isrc, track_number, lyric, album_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    clean_text(&media.title),
                    media.kind.to_int(),
                    clean_text(&media.file_path),
                    media.release_date.map(|d| d.to_string()),
                    media.artwork_path.as_deref().map(clean_text),
                    media.isrc.as_deref().map(clean_text),
                    media.track_number,
                    media.lyric.as_deref().map(clean_text),
                    media.album_id,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        media.id = Some(id);
        Ok(())
    }

    fn update(&self, media: &Media, cancel: &CancellationToken) -> StoreResult<()> {
        ensure_live(cancel)?;
        media.validate()?;
        let id = media.id.ok_or(StoreError::NotFound(Media::NAME))?;
        self.backend.with_tx(|conn| {
            let current_album: Option<i64> = conn
                .query_row(
                    "SELECT album_id FROM media WHERE id = ?1",
                    params![id],
                    |r| r.get(0),
                )
                .optional()?;
            let current_album = current_album.ok_or(StoreError::NotFound(Media::NAME))?;
            if current_album != media.album_id {
                ensure_album_accepts(conn, media.album_id, Some(id))?;
            }
            conn.execute(
                "UPDATE media SET title = ?1, kind = ?2, file_path = ?3, release_date = ?4,
                 artwork_path = ?5, isrc = ?6, track_number = ?7, lyric = ?8, album_id = ?9 WHERE id = ?10",
                params![
                    clean_text(&media.title),
                    media.kind.to_int(),
                    clean_text(&media.file_path),
                    media.release_date.map(|d| d.to_string()),
                    media.artwork_path.as_deref().map(clean_text),
                    media.isrc.as_deref().map(clean_text),
                    media.track_number,
                    media.lyric.as_deref().map(clean_text),
                    media.album_id,
                    id,
                ],
            )?;
            Ok(())
        })
    }

    fn delete_by_id(&self, id: &i64, cancel: &CancellationToken) -> StoreResult<()> {
        ensure_live(cancel)?;
        self.backend.with_tx(|conn| {
            let paths: Option<(String, Option<String>)> = conn
                .query_row(
                    "SELECT file_path, artwork_path FROM media WHERE id = ?1",
                    params![id],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .optional()?;
            let (file_path, artwork_path) = match paths {
                None => return Err(StoreError::NotFound(Media::NAME)),
                Some(p) => p,
            };
            // Likes and visits cascade with the row.
            conn.execute("DELETE FROM media WHERE id = ?1", params![id])?;
            info!("Media {} deleted, file path released: {}", id, file_path);
            if let Some(artwork) = artwork_path {
                info!("Media {} deleted, artwork path released: {}", id, artwork);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relational::SqlBackend;
    use chrono::NaiveDate;

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    fn backend() -> SqlBackend {
        SqlBackend::open_in_memory().unwrap()
    }

    fn seed_artist(backend: &SqlBackend) -> i64 {
        let repo = SqlArtistRepository::new(backend.clone());
        let mut artist = Artist {
            id: None,
            artistic_name: "Shajarian".to_string(),
            full_name: Some("Mohammad-Reza Shajarian".to_string()),
            birth_date: NaiveDate::from_ymd_opt(1940, 9, 23),
            avatar_path: None,
            bio: None,
        };
        repo.add(&mut artist, &token()).unwrap();
        artist.id.unwrap()
    }

    fn seed_album(backend: &SqlBackend, artist_id: i64, is_single: bool, is_complete: bool) -> i64 {
        let repo = SqlAlbumRepository::new(backend.clone());
        let mut album = Album {
            id: None,
            title: "Bidad".to_string(),
            genre: "Traditional".to_string(),
            release_date: NaiveDate::from_ymd_opt(1985, 1, 1).unwrap(),
            is_complete,
            is_single,
            copyright: None,
            artwork_path: None,
            artist_ids: vec![artist_id],
        };
        repo.add(&mut album, &token()).unwrap();
        album.id.unwrap()
    }

    fn make_media(album_id: i64, title: &str) -> Media {
        Media {
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
        }
    }

    #[test]
    fn add_assigns_increasing_ids() {
        let backend = backend();
        let repo = SqlArtistRepository::new(backend.clone());
        let first = seed_artist(&backend);
        let second = seed_artist(&backend);
        assert!(second > first);
        assert_eq!(repo.get_all(&token()).unwrap().len(), 2);
    }

    #[test]
    fn add_normalizes_string_fields() {
        let backend = backend();
        let repo = SqlArtistRepository::new(backend.clone());
        let mut artist = Artist {
            id: None,
            artistic_name: "علي ۱".to_string(),
            full_name: None,
            birth_date: None,
            avatar_path: None,
            bio: None,
        };
        repo.add(&mut artist, &token()).unwrap();
        let stored = repo
            .get_by_id_untracked(&artist.id.unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(stored.artistic_name, "علی 1");
    }

    #[test]
    fn update_normalizes_string_fields() {
        let backend = backend();
        let repo = SqlArtistRepository::new(backend.clone());
        let id = seed_artist(&backend);
        let mut artist = repo.get_by_id_tracked(&id).unwrap().unwrap();
        artist.bio = Some("متولد ۱۳۱۹".to_string());
        repo.update(&artist, &token()).unwrap();
        let stored = repo.get_by_id_untracked(&id).unwrap().unwrap();
        assert_eq!(stored.bio.as_deref(), Some("متولد 1319"));
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let backend = backend();
        let repo = SqlUserRepository::new(backend.clone());
        let mut user = User {
            id: None,
            username: "masoud".to_string(),
            password_hash: "h".to_string(),
            security_stamp: "s".to_string(),
            concurrency_stamp: "c".to_string(),
            full_name: "Masoud".to_string(),
            avatar_path: None,
            bio: None,
            is_active: true,
            roles: vec![UserRole::User],
        };
        repo.add(&mut user, &token()).unwrap();
        let mut duplicate = user.clone();
        duplicate.id = None;
        assert!(matches!(
            repo.add(&mut duplicate, &token()),
            Err(StoreError::Duplicate(_))
        ));
    }

    #[test]
    fn single_album_rejects_second_media() {
        let backend = backend();
        let artist_id = seed_artist(&backend);
        let album_id = seed_album(&backend, artist_id, true, false);
        let repo = SqlMediaRepository::new(backend.clone());

        let mut first = make_media(album_id, "only-track");
        repo.add(&mut first, &token()).unwrap();

        let mut second = make_media(album_id, "one-too-many");
        let err = repo.add(&mut second, &token()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Rule(rules::RuleViolation::SingleAlbumFull)
        ));
        assert_eq!(repo.get_by_album(album_id).unwrap().len(), 1);
    }

    #[test]
    fn complete_album_rejects_media() {
        let backend = backend();
        let artist_id = seed_artist(&backend);
        let album_id = seed_album(&backend, artist_id, false, true);
        let repo = SqlMediaRepository::new(backend.clone());
        let err = repo.add(&mut make_media(album_id, "late"), &token()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Rule(rules::RuleViolation::AlbumComplete)
        ));
    }

    #[test]
    fn artist_with_albums_cannot_be_deleted() {
        let backend = backend();
        let artist_id = seed_artist(&backend);
        seed_album(&backend, artist_id, false, false);
        let repo = SqlArtistRepository::new(backend.clone());
        let err = repo.delete_by_id(&artist_id, &token()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Rule(rules::RuleViolation::ArtistHasAlbums)
        ));
    }

    #[test]
    fn album_with_medias_cannot_be_deleted() {
        let backend = backend();
        let artist_id = seed_artist(&backend);
        let album_id = seed_album(&backend, artist_id, false, false);
        let media_repo = SqlMediaRepository::new(backend.clone());
        media_repo.add(&mut make_media(album_id, "t1"), &token()).unwrap();

        let album_repo = SqlAlbumRepository::new(backend.clone());
        let err = album_repo.delete_by_id(&album_id, &token()).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Rule(rules::RuleViolation::AlbumHasMedias)
        ));
    }

    #[test]
    fn delete_missing_media_is_not_found() {
        let backend = backend();
        let repo = SqlMediaRepository::new(backend);
        assert!(matches!(
            repo.delete_by_id(&99, &token()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn cancelled_token_aborts_writes() {
        let backend = backend();
        let repo = SqlArtistRepository::new(backend);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut artist = Artist {
            id: None,
            artistic_name: "Nobody".to_string(),
            full_name: None,
            birth_date: None,
            avatar_path: None,
            bio: None,
        };
        assert!(matches!(
            repo.add(&mut artist, &cancel),
            Err(StoreError::Cancelled)
        ));
    }
}
