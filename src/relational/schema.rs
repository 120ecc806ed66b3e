//! Versioned SQLite schema for the relational backend.
//!
//! Tables are declared as const structures; on open the database is either
//! created at the latest version or migrated up the ladder, then validated
//! against the declared shape.

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};

/// Offset added to the schema version stored in `PRAGMA user_version`, so a
/// random SQLite file is never mistaken for one of ours.
pub const BASE_DB_VERSION: i64 = 77000;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SqlType {
    Text,
    Integer,
}

impl SqlType {
    fn as_sql(self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
        }
    }
}

pub struct Column {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub constraints: &'static str,
}

macro_rules! col {
    ($name:expr, $sql_type:expr) => {
        Column {
            name: $name,
            sql_type: $sql_type,
            constraints: "",
        }
    };
    ($name:expr, $sql_type:expr, $constraints:expr) => {
        Column {
            name: $name,
            sql_type: $sql_type,
            constraints: $constraints,
        }
    };
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    /// Extra table-level constraint clauses (composite uniques, FKs).
    pub constraints: &'static [&'static str],
    pub indices: &'static [(&'static str, &'static str)],
}

impl Table {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let mut s = format!("{} {}", c.name, c.sql_type.as_sql());
                if !c.constraints.is_empty() {
                    s.push(' ');
                    s.push_str(c.constraints);
                }
                s
            })
            .collect();
        parts.extend(self.constraints.iter().map(|c| c.to_string()));
        conn.execute(
            &format!("CREATE TABLE {} ({});", self.name, parts.join(", ")),
            params![],
        )
        .with_context(|| format!("Failed to create table {}", self.name))?;
        for (index_name, column_name) in self.indices {
            conn.execute(
                &format!(
                    "CREATE INDEX {} ON {}({});",
                    index_name, self.name, column_name
                ),
                params![],
            )?;
        }
        Ok(())
    }

    /// Compares the on-disk column list against the declared one.
    pub fn validate(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", self.name))?;
        let actual: Vec<String> = stmt
            .query_map(params![], |row| row.get::<_, String>(1))?
            .collect::<std::result::Result<_, _>>()?;
        let expected: Vec<&str> = self.columns.iter().map(|c| c.name).collect();
        if actual != expected {
            bail!(
                "Table {} columns mismatch: found [{}], expected [{}]",
                self.name,
                actual.join(", "),
                expected.join(", ")
            );
        }
        Ok(())
    }
}

pub struct VersionedSchema {
    pub version: i64,
    pub tables: &'static [Table],
    pub migration: Option<fn(&Connection) -> Result<()>>,
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute("PRAGMA foreign_keys = ON;", params![])?;
        for table in self.tables {
            table.create(conn)?;
        }
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + self.version),
            [],
        )?;
        Ok(())
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.validate(conn)?;
        }
        Ok(())
    }
}

/// V 0
const USER_TABLE_V_0: Table = Table {
    name: "user",
    columns: &[
        col!("id", SqlType::Integer, "PRIMARY KEY AUTOINCREMENT"),
        col!("username", SqlType::Text, "NOT NULL UNIQUE"),
        col!("password_hash", SqlType::Text, "NOT NULL"),
        col!("security_stamp", SqlType::Text, "NOT NULL"),
        col!("concurrency_stamp", SqlType::Text, "NOT NULL"),
        col!("full_name", SqlType::Text, "NOT NULL"),
        col!("avatar_path", SqlType::Text),
        col!("bio", SqlType::Text),
        col!("is_active", SqlType::Integer, "NOT NULL DEFAULT 1"),
    ],
    constraints: &[],
    indices: &[("idx_user_username", "username")],
};

const USER_ROLE_TABLE_V_0: Table = Table {
    name: "user_role",
    columns: &[
        col!(
            "user_id",
            SqlType::Integer,
            "NOT NULL REFERENCES user(id) ON DELETE CASCADE"
        ),
        col!("role", SqlType::Text, "NOT NULL"),
        col!(
            "created",
            SqlType::Integer,
            "DEFAULT (cast(strftime('%s','now') as int))"
        ),
    ],
    constraints: &["UNIQUE (user_id, role)"],
    indices: &[("idx_user_role_user_id", "user_id")],
};

const ARTIST_TABLE_V_0: Table = Table {
    name: "artist",
    columns: &[
        col!("id", SqlType::Integer, "PRIMARY KEY AUTOINCREMENT"),
        col!("artistic_name", SqlType::Text, "NOT NULL"),
        col!("full_name", SqlType::Text),
        col!("birth_date", SqlType::Text),
        col!("avatar_path", SqlType::Text),
        col!("bio", SqlType::Text),
    ],
    constraints: &[],
    indices: &[],
};

const ALBUM_TABLE_V_0: Table = Table {
    name: "album",
    columns: &[
        col!("id", SqlType::Integer, "PRIMARY KEY AUTOINCREMENT"),
        col!("title", SqlType::Text, "NOT NULL"),
        col!("genre", SqlType::Text, "NOT NULL"),
        col!("release_date", SqlType::Text, "NOT NULL"),
        col!("is_complete", SqlType::Integer, "NOT NULL DEFAULT 0"),
        col!("is_single", SqlType::Integer, "NOT NULL DEFAULT 0"),
        col!("copyright", SqlType::Text),
        col!("artwork_path", SqlType::Text),
    ],
    constraints: &[],
    indices: &[],
};

const ALBUM_ARTIST_TABLE_V_0: Table = Table {
    name: "album_artist",
    columns: &[
        col!(
            "album_id",
            SqlType::Integer,
            "NOT NULL REFERENCES album(id) ON DELETE CASCADE"
        ),
        col!(
            "artist_id",
            SqlType::Integer,
            "NOT NULL REFERENCES artist(id) ON DELETE CASCADE"
        ),
    ],
    constraints: &["UNIQUE (album_id, artist_id)"],
    indices: &[("idx_album_artist_artist_id", "artist_id")],
};

const MEDIA_TABLE_V_0: Table = Table {
    name: "media",
    columns: &[
        col!("id", SqlType::Integer, "PRIMARY KEY AUTOINCREMENT"),
        col!("title", SqlType::Text, "NOT NULL"),
        col!("kind", SqlType::Integer, "NOT NULL"),
        col!("file_path", SqlType::Text, "NOT NULL"),
        col!("release_date", SqlType::Text),
        col!("artwork_path", SqlType::Text),
        col!("isrc", SqlType::Text),
        col!("track_number", SqlType::Integer, "NOT NULL"),
        col!("lyric", SqlType::Text),
        col!(
            "album_id",
            SqlType::Integer,
            "NOT NULL REFERENCES album(id) ON DELETE RESTRICT"
        ),
    ],
    constraints: &[],
    indices: &[("idx_media_album_id", "album_id")],
};

const FOLLOWING_TABLE_V_0: Table = Table {
    name: "following",
    columns: &[
        col!(
            "user_id",
            SqlType::Integer,
            "NOT NULL REFERENCES user(id) ON DELETE CASCADE"
        ),
        col!(
            "artist_id",
            SqlType::Integer,
            "NOT NULL REFERENCES artist(id) ON DELETE CASCADE"
        ),
        col!(
            "created",
            SqlType::Integer,
            "NOT NULL DEFAULT (cast(strftime('%s','now') as int))"
        ),
    ],
    constraints: &["UNIQUE (user_id, artist_id)"],
    indices: &[("idx_following_artist_id", "artist_id")],
};

const LIKED_MEDIA_TABLE_V_0: Table = Table {
    name: "liked_media",
    columns: &[
        col!(
            "user_id",
            SqlType::Integer,
            "NOT NULL REFERENCES user(id) ON DELETE CASCADE"
        ),
        col!(
            "media_id",
            SqlType::Integer,
            "NOT NULL REFERENCES media(id) ON DELETE CASCADE"
        ),
        col!(
            "created",
            SqlType::Integer,
            "NOT NULL DEFAULT (cast(strftime('%s','now') as int))"
        ),
    ],
    constraints: &["UNIQUE (user_id, media_id)"],
    indices: &[("idx_liked_media_media_id", "media_id")],
};

const VISITED_MEDIA_TABLE_V_0: Table = Table {
    name: "visited_media",
    columns: &[
        col!(
            "user_id",
            SqlType::Integer,
            "NOT NULL REFERENCES user(id) ON DELETE CASCADE"
        ),
        col!(
            "media_id",
            SqlType::Integer,
            "NOT NULL REFERENCES media(id) ON DELETE CASCADE"
        ),
        col!(
            "created",
            SqlType::Integer,
            "NOT NULL DEFAULT (cast(strftime('%s','now') as int))"
        ),
    ],
    constraints: &["UNIQUE (user_id, media_id)"],
    indices: &[("idx_visited_media_media_id", "media_id")],
};

pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        USER_TABLE_V_0,
        USER_ROLE_TABLE_V_0,
        ARTIST_TABLE_V_0,
        ALBUM_TABLE_V_0,
        ALBUM_ARTIST_TABLE_V_0,
        MEDIA_TABLE_V_0,
        FOLLOWING_TABLE_V_0,
        LIKED_MEDIA_TABLE_V_0,
        VISITED_MEDIA_TABLE_V_0,
    ],
    migration: None,
}];

/// Opens (or creates) the catalog database, walking the migration ladder
/// up to the latest version and validating the final shape.
pub fn open_database(conn: Connection) -> Result<Connection> {
    let stored_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;

    if stored_version == 0 {
        VERSIONED_SCHEMAS
            .last()
            .expect("at least one schema version")
            .create(&conn)?;
    } else {
        let version = stored_version - BASE_DB_VERSION;
        if version < 0 {
            bail!("Database user_version {} is not one of ours", stored_version);
        }
        if version >= VERSIONED_SCHEMAS.len() as i64 {
            bail!("Database version {} is too new", version);
        }
        for schema in &VERSIONED_SCHEMAS[(version as usize + 1)..] {
            let migration = schema
                .migration
                .with_context(|| format!("No migration to version {}", schema.version))?;
            migration(&conn)?;
            conn.execute(
                &format!("PRAGMA user_version = {}", BASE_DB_VERSION + schema.version),
                [],
            )?;
        }
        conn.execute("PRAGMA foreign_keys = ON;", params![])?;
    }

    VERSIONED_SCHEMAS
        .last()
        .expect("at least one schema version")
        .validate(&conn)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_and_validates_latest_schema() {
        let conn = Connection::open_in_memory().unwrap();
        let conn = open_database(conn).unwrap();
        VERSIONED_SCHEMAS.last().unwrap().validate(&conn).unwrap();
    }

    #[test]
    fn reopening_an_initialized_database_validates() {
        let dir = std::env::temp_dir().join(format!("fonoteca-schema-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("catalog.db");
        let _ = std::fs::remove_file(&path);

        let conn = Connection::open(&path).unwrap();
        drop(open_database(conn).unwrap());

        let conn = Connection::open(&path).unwrap();
        drop(open_database(conn).unwrap());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn validate_detects_missing_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE user (id INTEGER PRIMARY KEY);", [])
            .unwrap();
        let err = USER_TABLE_V_0.validate(&conn).unwrap_err();
        assert!(err.to_string().contains("columns mismatch"));
    }

    #[test]
    fn rejects_foreign_database() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("PRAGMA user_version = 5", []).unwrap();
        assert!(open_database(conn).is_err());
    }
}
