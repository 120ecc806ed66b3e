//! Join-entity CRUD for the three tracked relationships. Each link is a
//! row keyed by the composite (user, target) pair; the join table is the
//! single source of truth on this backend, so existence checks and
//! relationship queries always resolve through it.

use super::models::{Artist, Media, User};
use super::repositories::{
    artist_from_row, media_from_row, user_from_row, ARTIST_COLUMNS, MEDIA_COLUMNS, USER_COLUMNS,
};
use super::{now_secs, SqlBackend};
use crate::store::StoreResult;
use rusqlite::{params, OptionalExtension};

/// The three join tables share one shape: (user_id, target_id, created).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKind {
    Following,
    LikedMedia,
    VisitedMedia,
}

impl JoinKind {
    fn table(self) -> &'static str {
        match self {
            JoinKind::Following => "following",
            JoinKind::LikedMedia => "liked_media",
            JoinKind::VisitedMedia => "visited_media",
        }
    }

    fn target_column(self) -> &'static str {
        match self {
            JoinKind::Following => "artist_id",
            JoinKind::LikedMedia => "media_id",
            JoinKind::VisitedMedia => "media_id",
        }
    }
}

#[derive(Clone)]
pub struct SqlLinkStore {
    backend: SqlBackend,
}

impl SqlLinkStore {
    pub fn new(backend: SqlBackend) -> Self {
        SqlLinkStore { backend }
    }

    /// Canonical duplicate check: consult the join table, never an
    /// entity's collection.
    pub fn exists(&self, kind: JoinKind, user_id: i64, target_id: i64) -> StoreResult<bool> {
        self.backend.with_write_conn(|conn| {
            let exists: bool = conn.query_row(
                &format!(
                    "SELECT EXISTS(SELECT 1 FROM {} WHERE user_id = ?1 AND {} = ?2)",
                    kind.table(),
                    kind.target_column()
                ),
                params![user_id, target_id],
                |r| r.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Inserts the join row in its own committed transaction.
    pub fn insert(&self, kind: JoinKind, user_id: i64, target_id: i64) -> StoreResult<()> {
        self.backend.with_tx(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {} (user_id, {}, created) VALUES (?1, ?2, ?3)",
                    kind.table(),
                    kind.target_column()
                ),
                params![user_id, target_id, now_secs()],
            )?;
            Ok(())
        })
    }

    /// Removes the join row. Returns false when no row matched.
    pub fn remove(&self, kind: JoinKind, user_id: i64, target_id: i64) -> StoreResult<bool> {
        self.backend.with_tx(|conn| {
            let affected = conn.execute(
                &format!(
                    "DELETE FROM {} WHERE user_id = ?1 AND {} = ?2",
                    kind.table(),
                    kind.target_column()
                ),
                params![user_id, target_id],
            )?;
            Ok(affected > 0)
        })
    }

    /// Replaces an existing join row with a fresh one so `created` holds
    /// the newest timestamp. Old row removal and re-insert share one
    /// transaction.
    pub fn refresh(&self, kind: JoinKind, user_id: i64, target_id: i64) -> StoreResult<()> {
        self.backend.with_tx(|conn| {
            conn.execute(
                &format!(
                    "DELETE FROM {} WHERE user_id = ?1 AND {} = ?2",
                    kind.table(),
                    kind.target_column()
                ),
                params![user_id, target_id],
            )?;
            conn.execute(
                &format!(
                    "INSERT INTO {} (user_id, {}, created) VALUES (?1, ?2, ?3)",
                    kind.table(),
                    kind.target_column()
                ),
                params![user_id, target_id, now_secs()],
            )?;
            Ok(())
        })
    }

    /// The link's timestamp, if the link exists.
    pub fn timestamp(&self, kind: JoinKind, user_id: i64, target_id: i64) -> StoreResult<Option<i64>> {
        self.backend.with_write_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT created FROM {} WHERE user_id = ?1 AND {} = ?2",
                        kind.table(),
                        kind.target_column()
                    ),
                    params![user_id, target_id],
                    |r| r.get(0),
                )
                .optional()?)
        })
    }

    pub fn count_for_target(&self, kind: JoinKind, target_id: i64) -> StoreResult<usize> {
        self.backend.with_read_conn(|conn| {
            let count: i64 = conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM {} WHERE {} = ?1",
                    kind.table(),
                    kind.target_column()
                ),
                params![target_id],
                |r| r.get(0),
            )?;
            Ok(count as usize)
        })
    }

    /// Artists the user follows, resolved through the join table.
    pub fn followed_artists(&self, user_id: i64) -> StoreResult<Vec<Artist>> {
        self.backend.with_read_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM artist a JOIN following f ON f.artist_id = a.id
                 WHERE f.user_id = ?1 ORDER BY f.created DESC",
                prefixed(ARTIST_COLUMNS, "a")
            ))?;
            let artists = stmt
                .query_map(params![user_id], artist_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(artists)
        })
    }

    /// Users following the artist.
    pub fn followers(&self, artist_id: i64) -> StoreResult<Vec<User>> {
        self.backend.with_read_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM user u JOIN following f ON f.user_id = u.id
                 WHERE f.artist_id = ?1 ORDER BY f.created DESC",
                prefixed(USER_COLUMNS, "u")
            ))?;
            let users = stmt
                .query_map(params![artist_id], user_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }

    /// Medias linked to the user via the given join, newest link first.
    pub fn linked_medias(&self, kind: JoinKind, user_id: i64) -> StoreResult<Vec<Media>> {
        self.backend.with_read_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM media m JOIN {} j ON j.media_id = m.id
                 WHERE j.user_id = ?1 ORDER BY j.created DESC",
                prefixed(MEDIA_COLUMNS, "m"),
                kind.table()
            ))?;
            let medias = stmt
                .query_map(params![user_id], media_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(medias)
        })
    }

    /// Users linked to the media via the given join.
    pub fn linked_users(&self, kind: JoinKind, media_id: i64) -> StoreResult<Vec<User>> {
        self.backend.with_read_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM user u JOIN {} j ON j.user_id = u.id
                 WHERE j.media_id = ?1 ORDER BY j.created DESC",
                prefixed(USER_COLUMNS, "u"),
                kind.table()
            ))?;
            let users = stmt
                .query_map(params![media_id], user_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }
}

fn prefixed(columns: &str, alias: &str) -> String {
    columns
        .split(", ")
        .map(|c| format!("{}.{}", alias, c))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_kind_maps_to_tables() {
        assert_eq!(JoinKind::Following.table(), "following");
        assert_eq!(JoinKind::Following.target_column(), "artist_id");
        assert_eq!(JoinKind::LikedMedia.table(), "liked_media");
        assert_eq!(JoinKind::VisitedMedia.target_column(), "media_id");
    }

    #[test]
    fn prefixed_qualifies_every_column() {
        assert_eq!(prefixed("id, name", "t"), "t.id, t.name");
    }
}
